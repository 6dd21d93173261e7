//! Capacity and dispatch optimisation for multivalent heat supply networks.
#![warn(missing_docs)]
pub mod catalog;
pub mod cli;
pub mod decode;
pub mod error;
pub mod finance;
pub mod input;
pub mod kpi;
pub mod log;
pub mod model;
pub mod output;
pub mod parameters;
pub mod results;
pub mod settings;
pub mod simulation;
pub mod solver;
pub mod time_series;
pub mod topology;
pub mod units;

#[cfg(test)]
mod fixture;
