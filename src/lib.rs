//! A Rust client for FeatureBoard feature flags.
//!
//! # Overview
//!
//! The client keeps a local copy of all feature definitions of an environment and evaluates
//! them in-process. Create one with [`ClientConfig`], then open an [`EvaluationScope`] per unit of
//! work (usually an inbound request) and read typed values from it:
//!
//! ```no_run
//! # use featureboard::ClientConfig;
//! let client = ClientConfig::from_api_key("environment-api-key").start()?;
//!
//! let scope = client.request(["plan-pro", "region-eu"]);
//! let limit = scope.get_number("upload-limit-mb", 10.0);
//! # Ok::<(), featureboard::Error>(())
//! ```
//!
//! [`FeatureStore`] is the central authority on which definitions are active. Whenever
//! definitions change, they are replaced completely. An evaluation scope captures a *snapshot* of
//! the store on first use and reads only from it, so all values within one scope are mutually
//! consistent even while the store is being refreshed.
//!
//! [`RefreshCoordinator`] fetches definitions (conditionally, using the last `ETag`) and replaces
//! the store. At most one fetch is in flight at a time; concurrent callers return immediately.
//! It is driven by one of the [`UpdateStrategy`] variants: a background [`PollerThread`], the
//! [`OnDemandThrottler`] on each request, or explicit [`FeatureBoardClient::refresh`] calls.
//!
//! # Error Handling
//!
//! Feature evaluation never fails. A missing feature, an unmatched audience, or a value of the
//! wrong type resolves to the default supplied by the caller. Refresh failures keep the last
//! known-good definitions and are reported through [`RefreshOutcome`] and the logs.
//!
//! # Logging
//!
//! The crate uses the [`log`](https://docs.rs/log/latest/log/) crate with the `featureboard`
//! target and structured key-values. Consider integrating a `log`-compatible logger
//! implementation for better visibility into refreshes and evaluations.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod eval;

mod audience;
mod client;
mod clock;
mod config;
mod decoder;
mod error;
mod models;
mod poller;
mod refresh;
mod store;
mod throttle;
mod transport;
mod validator;

#[cfg(test)]
mod test_utils;

pub use audience::AudienceSource;
pub use client::{EvaluationScope, FeatureBoardClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, UpdateStrategy};
pub use decoder::{Decoder, JsonDecoder};
pub use error::{Error, Result};
pub use eval::{EvaluationDetails, EvaluationReason, FeatureValue};
pub use models::{AudienceOverride, FeatureDefinition, Value};
pub use poller::{PollerThread, PollerThreadConfig};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use store::{FeatureSnapshot, FeatureStore};
pub use throttle::OnDemandThrottler;
pub use transport::{HttpTransport, Transport, TransportResponse, ALL_FEATURES_PATH, API_KEY_HEADER};
pub use validator::ValidatorCache;
