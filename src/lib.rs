//! # Battery Relay Library
//!
//! Poll battery telemetry from a Modbus-TCP gateway and relay it to a
//! companion display over a one-way serial link.
//!
//! This library provides the telemetry sources, the network and register
//! session lifecycles, the display frame publisher, and the polling
//! supervisor that ties them together.

pub mod config;
pub mod display;
pub mod error;
pub mod gateway;
pub mod link;
pub mod mode;
pub mod serial;
pub mod supervisor;
pub mod telemetry;
