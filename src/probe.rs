//! Probe Layer
//!
//! Turns a raw target line into one timed HTTP request and a classified
//! outcome.
//!
//! # Architecture
//!
//! - [`sanitize`]: host → metric-safe label
//! - [`ParsedTarget`]: trimmed, validated URL with its label
//! - [`Prober`]: trait with a provided `probe()` that times `fetch()`
//! - [`HttpProber`]: `reqwest`-backed implementation with a per-request timeout
//!
//! # Example
//!
//! ```rust,no_run
//! use extmon::probe::{HttpProber, ProbeOutcome, Prober};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let prober = HttpProber::new(Duration::from_secs(10))?;
//! if let Some(ProbeOutcome::Success { label, elapsed_ms, .. }) =
//!     prober.probe("https://example.com/").await
//! {
//!     println!("{label}: {elapsed_ms:.1}ms");
//! }
//! # Ok(())
//! # }
//! ```

pub mod http;
mod label;
mod target;
mod traits;

pub use http::HttpProber;
pub use label::sanitize;
pub use target::{ParsedTarget, TargetError, is_blank, trim_target};
pub use traits::{ProbeError, ProbeOutcome, Prober};
