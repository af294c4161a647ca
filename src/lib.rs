#![allow(clippy::result_large_err)]

pub mod app;
pub mod backpressure;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod session;
pub mod telemetry;
pub mod transport;
