//! Progress reporting for extraction runs.
//!
//! The engine reports through a caller-supplied sink invoked synchronously
//! from the worker with `(percent, message)`. Percent math lives in
//! [`ProgressMeter`] so the zero-total and monotonicity rules are enforced in
//! one place.

/// Caller-supplied progress sink: `(percent 0-100, status message)`.
///
/// Invoked synchronously from whichever thread drives the extraction.
/// Implementations must not panic across the boundary.
pub type ProgressFn<'a> = dyn Fn(u8, &str) + Send + Sync + 'a;

/// Tracks processed bytes against a precomputed total and yields a percent
/// value that is monotonically non-decreasing within one run.
///
/// A zero total (empty archive, or one made of empty files) never divides:
/// the percent simply holds until the run's terminal callback.
#[derive(Debug)]
pub struct ProgressMeter {
    total: u64,
    processed: u64,
    last_percent: u8,
}

impl ProgressMeter {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            processed: 0,
            last_percent: 0,
        }
    }

    /// Record `bytes` more processed bytes and return the current percent.
    pub fn add(&mut self, bytes: u64) -> u8 {
        self.processed = self.processed.saturating_add(bytes);
        if self.total > 0 {
            let pct = (self.processed.saturating_mul(100) / self.total).min(100) as u8;
            // Guard against a sizing pass that undercounted.
            self.last_percent = self.last_percent.max(pct);
        }
        self.last_percent
    }

    /// The last percent value handed out, without recording new bytes.
    pub fn percent(&self) -> u8 {
        self.last_percent
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }
}
