//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Policy client, submitter, monitors produce:
//!     → logging.rs (structured log events, action_id correlation)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (human or JSON lines)
//!     → Prometheus scrape while `sentinel watch` runs
//! ```

pub mod logging;
pub mod metrics;
