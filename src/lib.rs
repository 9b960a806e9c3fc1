//! botlog - diagnostic logging pipeline for robot control programs
//!
//! Messages are echoed to the console or the driver-station channel as they
//! are logged, and batched in a parseable format to registered listeners by a
//! background flusher.

pub mod cli;
pub mod config;
pub mod error_codes;
pub mod logging;
