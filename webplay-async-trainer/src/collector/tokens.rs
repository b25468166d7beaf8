use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// How much experience one gather collects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quota {
    /// Exactly this many episodes.
    Episodes(usize),

    /// Whole episodes until at least this many steps were taken in total.
    Steps(usize),
}

/// Source of "run one episode" tokens shared by the workers of a gather.
///
/// The source is closed at most once, by whichever caller first observes the
/// quota reached or an error; later closes are no-ops.
#[derive(Debug)]
pub struct TokenSource {
    quota: Quota,
    issued: AtomicUsize,
    steps: AtomicUsize,
    closed: AtomicBool,
}

impl TokenSource {
    /// Creates an open source.
    pub fn new(quota: Quota) -> Self {
        Self {
            quota,
            issued: AtomicUsize::new(0),
            steps: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Takes a token. Returns `false` once the source is closed or, in
    /// episode mode, exhausted.
    pub fn take(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.quota {
            Quota::Episodes(n) => {
                if self.issued.fetch_add(1, Ordering::SeqCst) < n {
                    true
                } else {
                    self.close();
                    false
                }
            }
            Quota::Steps(_) => {
                self.issued.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }

    /// Adds the steps of a finished episode. In step mode, closes the source
    /// when the threshold is crossed; returns `true` iff this call closed it.
    pub fn add_steps(&self, n: usize) -> bool {
        let total = self.steps.fetch_add(n, Ordering::SeqCst) + n;
        match self.quota {
            Quota::Steps(threshold) if total >= threshold => self.close(),
            _ => false,
        }
    }

    /// Closes the source. Returns `true` iff the source was open.
    pub fn close(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Returns `true` once the source is closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Total steps added so far.
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}
