//! Farm sensor reporting: pull water and pH readings from the sensor API,
//! aggregate them and render one static HTML report per run.
//!
//! Stages, in order: [`fetch`] → [`reshape`] → [`aggregate`] → [`chart`] →
//! [`report`]. [`pipeline::run`] strings them together.

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod reshape;

pub use config::Config;
pub use descriptor::RunDescriptor;
pub use error::{ReportError, Result};
pub use models::{AggregateRow, NormalizedReading, RawSample, SensorKind};
