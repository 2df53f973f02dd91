//! Background dataset loading.
//!
//! Each request reads, parses and sanitizes on its own thread and reports back
//! over a channel tagged with a generation number. Only the most recent request
//! is ever delivered; results of superseded requests are dropped when polled.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::dataset::{Dataset, DatasetOrigin};
use crate::error::LoadError;
use crate::sanitize::Sanitizer;

/// What to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// The configured default file, falling back to the demo set
    Default(PathBuf),
    /// A user-chosen file; failures are reported, never replaced by the demo
    File(PathBuf),
    /// JSON text already in memory
    Inline(String),
}

impl DatasetSource {
    /// Run the load synchronously on the calling thread
    pub fn load(&self, sanitizer: &Sanitizer) -> Result<Dataset, LoadError> {
        match self {
            DatasetSource::Default(path) => Dataset::load_default(path, sanitizer),
            DatasetSource::File(path) => Dataset::from_path(path, sanitizer),
            DatasetSource::Inline(text) => {
                Dataset::from_json_str(text, sanitizer, DatasetOrigin::Inline)
            }
        }
    }
}

/// A finished load
#[derive(Debug)]
pub struct LoadOutcome {
    pub generation: u64,
    pub result: Result<Dataset, LoadError>,
}

pub struct DatasetLoader {
    sanitizer: Sanitizer,
    tx: Sender<LoadOutcome>,
    rx: Receiver<LoadOutcome>,
    latest: u64,
    pending: bool,
}

impl DatasetLoader {
    pub fn new(sanitizer: Sanitizer) -> Self {
        let (tx, rx) = mpsc::channel::<LoadOutcome>();
        Self {
            sanitizer,
            tx,
            rx,
            latest: 0,
            pending: false,
        }
    }

    /// Whether the most recent request has not reported yet
    pub fn is_loading(&self) -> bool {
        self.pending
    }

    /// Start a load, superseding any load still in flight. Returns its generation.
    pub fn request(&mut self, source: DatasetSource) -> u64 {
        self.latest += 1;
        self.pending = true;
        let generation = self.latest;
        let sanitizer = self.sanitizer;
        let tx = self.tx.clone();

        thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                source.load(&sanitizer)
            }))
            .unwrap_or(Err(LoadError::WorkerPanicked));

            let _ = tx.send(LoadOutcome { generation, result });
        });

        debug!(generation, "requested dataset load");
        generation
    }

    /// Invalidate any load still in flight, e.g. because the caller installed a
    /// dataset itself. Results of earlier requests are dropped when they arrive.
    pub fn supersede(&mut self) {
        self.latest += 1;
        self.pending = false;
        debug!(generation = self.latest, "superseded in-flight loads");
    }

    /// Drain finished loads without blocking and return the latest one, if it arrived.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        let mut delivered = None;
        loop {
            match self.rx.try_recv() {
                Ok(outcome) => {
                    if let Some(outcome) = self.accept(outcome) {
                        delivered = Some(outcome);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        delivered
    }

    /// Block until the latest request reports or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<LoadOutcome> {
        if !self.pending {
            return None;
        }
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(outcome) => {
                    if let Some(outcome) = self.accept(outcome) {
                        return Some(outcome);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    fn accept(&mut self, outcome: LoadOutcome) -> Option<LoadOutcome> {
        if outcome.generation != self.latest {
            debug!(
                generation = outcome.generation,
                latest = self.latest,
                "dropping superseded load"
            );
            return None;
        }
        self.pending = false;
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_inline_load_reports() {
        let mut loader = DatasetLoader::new(Sanitizer::default());
        let generation =
            loader.request(DatasetSource::Inline(r#"{ "name": "Budget" }"#.to_string()));
        assert!(loader.is_loading());

        let outcome = loader.wait(WAIT).unwrap();
        assert_eq!(outcome.generation, generation);
        assert_eq!(outcome.result.unwrap().root_name(), "Budget");
        assert!(!loader.is_loading());
    }

    #[test]
    fn test_last_load_wins() {
        let mut loader = DatasetLoader::new(Sanitizer::default());
        loader.request(DatasetSource::Inline(r#"{ "name": "First" }"#.to_string()));
        let second = loader.request(DatasetSource::Inline(r#"{ "name": "Second" }"#.to_string()));

        let outcome = loader.wait(WAIT).unwrap();
        assert_eq!(outcome.generation, second);
        assert_eq!(outcome.result.unwrap().root_name(), "Second");

        // the first result, whenever it lands, is never delivered
        std::thread::sleep(Duration::from_millis(50));
        assert!(loader.poll().is_none());
    }

    #[test]
    fn test_supersede_drops_in_flight_load() {
        let mut loader = DatasetLoader::new(Sanitizer::default());
        loader.request(DatasetSource::Inline(r#"{ "name": "Stale" }"#.to_string()));
        loader.supersede();
        assert!(!loader.is_loading());

        std::thread::sleep(Duration::from_millis(50));
        assert!(loader.poll().is_none());
        assert!(loader.wait(Duration::from_millis(10)).is_none());

        let next = loader.request(DatasetSource::Inline(r#"{ "name": "Fresh" }"#.to_string()));
        let outcome = loader.wait(WAIT).unwrap();
        assert_eq!(outcome.generation, next);
        assert_eq!(outcome.result.unwrap().root_name(), "Fresh");
    }

    #[test]
    fn test_failed_file_load_is_reported() {
        let mut loader = DatasetLoader::new(Sanitizer::default());
        loader.request(DatasetSource::File(PathBuf::from("/no/such/budget.json")));
        let outcome = loader.wait(WAIT).unwrap();
        assert!(matches!(outcome.result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn test_wait_without_request() {
        let mut loader = DatasetLoader::new(Sanitizer::default());
        assert!(loader.wait(Duration::from_millis(10)).is_none());
    }
}
