//! Severity levels for the per-instance logger override `arcus-server` and
//! `arcus-client` both expose alongside their ambient `tracing` output.

/// Severity of one log line passed to a registered logger override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Fine-grained internal detail (handshake substeps, readiness polls).
    Debug,
    /// Routine lifecycle events (listening, peer accepted, connected).
    Info,
    /// Recoverable trouble (a dropped malformed message, a failed connect).
    Warn,
    /// A connection just transitioned to its terminal error state.
    Error,
}
