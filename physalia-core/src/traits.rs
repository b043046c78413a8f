//! Core traits shared across the Physalia ecosystem.

/// Types that can produce a short human-readable summary of themselves.
pub trait Summarizable {
    /// A one-line summary (e.g. for logging or REPL display).
    fn summary(&self) -> String;
}
