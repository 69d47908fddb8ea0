use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use super::{Pipeline, ScanReport};

/// Totals accumulated over the lifetime of a [`Watcher`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Scans that ran to completion
    pub scans: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl WatchSummary {
    fn record(&mut self, report: &ScanReport) {
        self.scans += 1;
        self.delivered += report.delivered() as u64;
        self.failed += report.failed() as u64;
    }
}

/// Scan, sleep, repeat, until the shutdown future resolves
pub struct Watcher {
    pipeline: Pipeline,
    interval: Duration,
    summary: WatchSummary,
}

impl Watcher {
    pub fn new(pipeline: Pipeline, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            summary: WatchSummary::default(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn summary(&self) -> WatchSummary {
        self.summary
    }

    /// Run exactly one scan
    pub async fn run_once(&mut self) -> ScanReport {
        let report = self.pipeline.scan_once().await;
        log_report(&report);
        self.summary.record(&report);
        report
    }

    /// Poll until `shutdown` resolves
    ///
    /// Shutdown is checked before every scan, so a signal that arrives while sleeping
    /// never starts another listing. A signal during a scan drops the in-flight key,
    /// which kills any child process it was waiting on.
    pub async fn run<F>(&mut self, shutdown: F) -> WatchSummary
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tracing::info!(
            prefix = %self.pipeline.settings().video_prefix,
            interval_secs = self.interval.as_secs(),
            "Monitoring bucket for new videos (Ctrl+C to stop)"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                report = self.pipeline.scan_once() => {
                    log_report(&report);
                    self.summary.record(&report);
                }
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep(self.interval) => {}
            }
        }

        tracing::info!(
            scans = self.summary.scans,
            delivered = self.summary.delivered,
            failed = self.summary.failed,
            "Stopped"
        );

        self.summary
    }
}

fn log_report(report: &ScanReport) {
    if report.listing_error.is_some() {
        return;
    }

    if report.outcomes.is_empty() {
        tracing::debug!(
            listed = report.listed,
            ignored = report.ignored,
            already_seen = report.already_seen,
            "No new videos"
        );
    } else {
        tracing::info!(
            listed = report.listed,
            new = report.outcomes.len(),
            delivered = report.delivered(),
            failed = report.failed(),
            "Scan complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::media::{ContainerFormat, MockFormatProber, MockTranscoder};
    use crate::pipeline::PipelineSettings;
    use crate::storage::{MockObjectStore, RemoteObject};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    fn pipeline(store: MockObjectStore, prober: MockFormatProber, transcoder: MockTranscoder) -> Pipeline {
        let mut settings = PipelineSettings::from_config(&Config::default());
        settings.scratch_dir = "/scratch".into();
        Pipeline::new(Box::new(store), Box::new(prober), Box::new(transcoder), settings)
    }

    fn shutdown_after(rx: oneshot::Receiver<()>) -> impl Future<Output = ()> {
        async move {
            let _ = rx.await;
        }
    }

    #[tokio::test]
    async fn test_shutdown_before_first_scan_lists_nothing() {
        let mut store = MockObjectStore::new();
        store.expect_list_by_prefix().never();

        let mut watcher = Watcher::new(
            pipeline(store, MockFormatProber::new(), MockTranscoder::new()),
            Duration::from_secs(60),
        );

        let summary = watcher.run(std::future::ready(())).await;
        assert_eq!(summary, WatchSummary::default());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_sleep() {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));

        let mut store = MockObjectStore::new();
        store.expect_list_by_prefix().times(1).returning(move |_| {
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
            Ok(vec![])
        });

        let mut watcher = Watcher::new(
            pipeline(store, MockFormatProber::new(), MockTranscoder::new()),
            Duration::from_secs(3600),
        );

        let summary = tokio::time::timeout(Duration::from_secs(5), watcher.run(shutdown_after(rx)))
            .await
            .expect("watcher did not stop within the timeout");

        assert!(summary.scans <= 1);
    }

    #[tokio::test]
    async fn test_repeated_listings_process_each_video_once() {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let scans = Arc::new(AtomicUsize::new(0));
        let scans_seen = scans.clone();

        let mut store = MockObjectStore::new();
        store.expect_list_by_prefix().returning(move |_| {
            // Stop after the third listing; by then clip1 has been offered three times
            if scans_seen.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            }
            Ok(vec![
                RemoteObject::new("01. Video/clip1.mp4"),
                RemoteObject::new("01. Video/notes.txt"),
                RemoteObject::new("01. Video/clip1.mp4"),
            ])
        });
        store
            .expect_download()
            .withf(|key, _| key == "01. Video/clip1.mp4")
            .times(1)
            .returning(|_, _| Ok(()));
        store
            .expect_upload()
            .withf(|_, key| key == "02. Audio/clip1.mp3" || key == "08.Audio Backup/clip1.mp3")
            .times(2)
            .returning(|_, _| Ok(()));

        let mut prober = MockFormatProber::new();
        prober
            .expect_probe()
            .times(1)
            .returning(|_| ContainerFormat::Known("mov,mp4,m4a,3gp,3g2,mj2".into()));

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_transcode()
            .times(1)
            .returning(|video| Ok(video.with_extension("mp3")));

        let mut watcher = Watcher::new(pipeline(store, prober, transcoder), Duration::from_millis(5));

        let summary = tokio::time::timeout(Duration::from_secs(5), watcher.run(shutdown_after(rx)))
            .await
            .expect("watcher did not stop within the timeout");

        assert!(scans.load(Ordering::SeqCst) >= 3);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 0);
        assert!(!watcher.pipeline().tracker().contains("01. Video/notes.txt"));
    }

    #[tokio::test]
    async fn test_listing_errors_do_not_stop_the_loop() {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_seen = calls.clone();

        let mut store = MockObjectStore::new();
        store.expect_list_by_prefix().returning(move |_| {
            let n = calls_seen.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 2 {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            }
            Err(crate::BucketAudioError::Listing("SlowDown".into()))
        });

        let mut watcher = Watcher::new(
            pipeline(store, MockFormatProber::new(), MockTranscoder::new()),
            Duration::from_millis(5),
        );

        tokio::time::timeout(Duration::from_secs(5), watcher.run(shutdown_after(rx)))
            .await
            .expect("watcher did not stop within the timeout");

        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_run_once_records_summary() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_by_prefix()
            .times(1)
            .returning(|_| Ok(vec![RemoteObject::new("01. Video/clip1.mp4")]));
        store
            .expect_download()
            .returning(|key, _| Err(crate::BucketAudioError::NotFound(key.to_string())));

        let mut watcher = Watcher::new(
            pipeline(store, MockFormatProber::new(), MockTranscoder::new()),
            Duration::from_secs(60),
        );

        let report = watcher.run_once().await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(
            watcher.summary(),
            WatchSummary {
                scans: 1,
                delivered: 0,
                failed: 1
            }
        );
    }
}
