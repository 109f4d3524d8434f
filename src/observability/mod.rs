//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → access_log.rs (one line per request, panics included)
//!     → metrics.rs (counters, histograms; Prometheus scrape endpoint)
//! ```
//!
//! # Design Decisions
//! - JSON log format in production, human-readable in development
//! - The correlation id appears on every access-log line for log joining
//! - Credentials never reach a log record: bearer tokens and API keys are
//!   logged only as claims or fingerprints

pub mod access_log;
pub mod logging;
pub mod metrics;
