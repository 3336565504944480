//! Userspace driver for the ADS1263 on the analog I/O board
//!
//! The register file is the source of truth: every configuration change is
//! expressed as masked [`ads1263::OpCode`]s on a copy of it, written out
//! register by register and read back for verification.

pub mod ads1263;
pub mod command_parser;
pub mod config;

pub use ads1263::{Adc, AdcError, AdcNum, Channel, ConfigureOptions};
pub use config::{Config, RegisterCache};
