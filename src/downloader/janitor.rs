// Artifact janitor - age-based cleanup of the scratch directory

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Regular files examined
    pub scanned: usize,
    pub removed: usize,
    /// Files that disappeared between listing and deletion
    pub vanished: usize,
    pub failed: usize,
}

/// Deletes regular files in the scratch directory once they are older than
/// the expiry. Never surfaces errors to callers.
#[derive(Debug, Clone)]
pub struct Janitor {
    dir: PathBuf,
    expiry: Duration,
    running: Arc<AtomicBool>,
}

impl Janitor {
    pub fn new(dir: impl Into<PathBuf>, expiry: Duration) -> Self {
        Self {
            dir: dir.into(),
            expiry,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now()).await
    }

    /// Sweep as if the current time were `now`.
    ///
    /// A file is removed when `now - mtime > expiry`; a file exactly at the
    /// expiry is kept. A modification time in the future counts as age zero.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "scratch directory missing, nothing to sweep");
                return report;
            }
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "failed to list scratch directory");
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "failed to read directory entry");
                    report.failed += 1;
                    break;
                }
            };
            let path = entry.path();

            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    report.vanished += 1;
                    continue;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to stat file");
                    report.failed += 1;
                    continue;
                }
            };

            if !metadata.is_file() {
                continue;
            }
            report.scanned += 1;

            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "no modification time");
                    report.failed += 1;
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= self.expiry {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(
                        path = %path.display(),
                        age_secs = age.as_secs(),
                        "removed expired artifact"
                    );
                    report.removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => report.vanished += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove expired artifact");
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                removed = report.removed,
                vanished = report.vanished,
                failed = report.failed,
                "janitor sweep finished"
            );
        }

        report
    }

    /// Launch a background sweep unless one is already running.
    pub fn spawn_sweep(&self) -> Option<JoinHandle<SweepReport>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("janitor sweep already running, skipping");
            return None;
        }

        let janitor = self.clone();
        Some(tokio::spawn(async move {
            let _guard = RunningGuard(janitor.running.clone());
            janitor.sweep().await
        }))
    }

    pub fn is_sweeping(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Clears the running flag even if the sweep task panics
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const HOUR: Duration = Duration::from_secs(3600);

    fn mtime(path: &Path) -> SystemTime {
        std::fs::metadata(path).unwrap().modified().unwrap()
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();
        let written = mtime(&file);
        let janitor = Janitor::new(dir.path(), 2 * HOUR);

        // younger than expiry
        let report = janitor.sweep_at(written + HOUR).await;
        assert_eq!(report.removed, 0);
        assert!(file.exists());

        // exactly at expiry is kept
        let report = janitor.sweep_at(written + 2 * HOUR).await;
        assert_eq!(report.scanned, 1);
        assert_eq!(report.removed, 0);
        assert!(file.exists());

        // one second past expiry is removed
        let report = janitor.sweep_at(written + 2 * HOUR + Duration::from_secs(1)).await;
        assert_eq!(report.removed, 1);
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_future_mtime_is_age_zero() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("future.mp4");
        std::fs::write(&file, b"data").unwrap();
        let janitor = Janitor::new(dir.path(), Duration::ZERO);

        let report = janitor.sweep_at(mtime(&file) - HOUR).await;
        assert_eq!(report.removed, 0);
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_second_sweep_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.mp4", "b.mp3", "c.webm"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let janitor = Janitor::new(dir.path(), HOUR);
        let later = SystemTime::now() + 3 * HOUR;

        let first = janitor.sweep_at(later).await;
        assert_eq!(first.removed, 3);

        let second = janitor.sweep_at(later).await;
        assert_eq!(second, SweepReport::default());
    }

    #[tokio::test]
    async fn test_non_recursive_and_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("deep.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("top.mp4"), b"x").unwrap();

        let janitor = Janitor::new(dir.path(), HOUR);
        let report = janitor.sweep_at(SystemTime::now() + 3 * HOUR).await;

        assert_eq!(report.scanned, 1);
        assert_eq!(report.removed, 1);
        assert!(nested.join("deep.mp4").exists());
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty_report() {
        let janitor = Janitor::new("/nonexistent/vidgrab-scratch", HOUR);
        assert_eq!(janitor.sweep().await, SweepReport::default());
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_do_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..20 {
            std::fs::write(dir.path().join(format!("f{}.mp4", i)), b"x").unwrap();
        }
        let janitor = Janitor::new(dir.path(), HOUR);
        let later = SystemTime::now() + 3 * HOUR;

        let (a, b) = tokio::join!(janitor.sweep_at(later), janitor.sweep_at(later));

        assert_eq!(a.failed + b.failed, 0);
        assert!(a.removed + b.removed <= 20);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_sweep_coalesces() {
        let dir = tempfile::tempdir().unwrap();
        let janitor = Janitor::new(dir.path(), HOUR);

        janitor.running.store(true, Ordering::Release);
        assert!(janitor.spawn_sweep().is_none());

        janitor.running.store(false, Ordering::Release);
        let handle = janitor.spawn_sweep().unwrap();
        handle.await.unwrap();
        assert!(!janitor.is_sweeping());
    }
}
