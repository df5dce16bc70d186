//! Loan application risk scoring with a synchronized weight configuration.
//!
//! The [`scoring`] module turns applicant attributes into a bucketed decision, while the
//! [`weights`] module keeps the flat and tabular weight stores consistent and publishes the
//! active weight set that scoring reads from. [`service::ScorecardService`] composes both.

pub mod config;
pub mod error;
pub mod router;
pub mod scoring;
pub mod service;
pub mod telemetry;
pub mod weights;

#[cfg(test)]
mod tests;

pub use router::scorecard_router;
pub use service::{ScorecardService, SetWeightsOutcome, WeightServiceError};
