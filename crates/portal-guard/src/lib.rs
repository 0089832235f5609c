pub mod config;
pub mod error;
pub mod leads;
pub mod safety;
pub mod telemetry;
