//! # btpresence
//!
//! Command-line front end: parses arguments, drives the observation window
//! and writes the report.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod app;
pub mod cli;
pub mod driver;
pub mod logging;
