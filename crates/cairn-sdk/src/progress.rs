/// Progress units reported by the serializer.
pub mod units {
    /// Distinct records produced by decomposition, reported once.
    pub const DECOMPOSED: &str = "decomposed";
    /// Records handed to the transports, reported per chunk.
    pub const PERSISTED: &str = "persisted";
    /// Records fetched during deserialization, reported one at a time.
    pub const FETCHED: &str = "fetched";
}

/// Receives `(unit, delta)` progress updates.
///
/// Implemented for any `Fn(&str, usize)` closure.
pub trait Progress: Send + Sync {
    fn report(&self, unit: &str, delta: usize);
}

impl<F> Progress for F
where
    F: Fn(&str, usize) + Send + Sync,
{
    fn report(&self, unit: &str, delta: usize) {
        self(unit, delta)
    }
}

pub(crate) fn report(progress: Option<&dyn Progress>, unit: &str, delta: usize) {
    if let Some(progress) = progress {
        progress.report(unit, delta);
    }
}
