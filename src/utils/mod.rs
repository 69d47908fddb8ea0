use std::path::{Path, PathBuf};

/// Last path segment of an object key (`"01. Video/clip1.mp4"` -> `"clip1.mp4"`)
pub fn key_file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Join a prefix and a file name into an object key
pub fn object_key(prefix: &str, file_name: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{}{}", prefix, file_name)
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Local scratch path for a remote key
///
/// The file name is kept as-is so the produced audio keeps the video's base name.
pub fn scratch_path(scratch_dir: &Path, key: &str) -> PathBuf {
    let name = key_file_name(key);
    if name.is_empty() || name.chars().all(|c| c == '.') {
        scratch_dir.join(sanitize_filename(name))
    } else {
        scratch_dir.join(name)
    }
}

/// Check whether a key names a video by its suffix (case-insensitive)
pub fn has_video_extension(key: &str, extensions: &[String]) -> bool {
    if key.ends_with('/') {
        return false;
    }

    let lower = key_file_name(key).to_lowercase();
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.').to_lowercase();
        lower.ends_with(&format!(".{}", ext))
    })
}

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned = filename
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect::<String>();

    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Check the external tools and return a warning for each one that is missing
pub async fn check_dependencies(ffmpeg: &str, ffprobe: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(ffmpeg).await {
        missing.push(format!("{} - required to extract audio", ffmpeg));
    }

    if !check_command_available(ffprobe).await {
        missing.push(format!("{} - required to validate video containers", ffprobe));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
