//! A simple counter for tracking extraction results.
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

/// Outcome of processing one output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileResult {
    /// The file was written or verified.
    Ok,
    /// The file was left out (collision loser, filtered, ...).
    Skipped,
}

/// A counter for tracking extraction results.
pub struct Counter {
    ok: AtomicUsize,
    skipped: AtomicUsize,
    error: AtomicUsize,
    warning: AtomicUsize,
}

impl Counter {
    /// Creates a new Counter instance.
    pub fn new() -> Self {
        Self {
            ok: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            error: AtomicUsize::new(0),
            warning: AtomicUsize::new(0),
        }
    }

    /// Increments the count of errors.
    pub fn inc_error(&self) {
        self.error.fetch_add(1, SeqCst);
    }

    /// Increments the count of warnings.
    pub fn inc_warning(&self) {
        self.warning.fetch_add(1, SeqCst);
    }

    /// Increments the count of processed files.
    pub fn inc(&self, result: FileResult) {
        match result {
            FileResult::Ok => {
                self.ok.fetch_add(1, SeqCst);
            }
            FileResult::Skipped => {
                self.skipped.fetch_add(1, SeqCst);
            }
        }
    }

    pub fn warnings(&self) -> usize {
        self.warning.load(SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.error.load(SeqCst)
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OK: {}, Skipped: {}, Error: {}, Warning: {}",
            self.ok.load(SeqCst),
            self.skipped.load(SeqCst),
            self.error.load(SeqCst),
            self.warning.load(SeqCst),
        )
    }
}

#[test]
fn test_counter_display() {
    let counter = Counter::new();
    counter.inc(FileResult::Ok);
    counter.inc(FileResult::Ok);
    counter.inc(FileResult::Skipped);
    counter.inc_warning();
    assert_eq!(counter.warnings(), 1);
    assert_eq!(
        counter.to_string(),
        "OK: 2, Skipped: 1, Error: 0, Warning: 1"
    );
}
