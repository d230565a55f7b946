//! BACnet thermostat bridge library.
//!
//! This library keeps smart-home thermostat characteristics in sync with
//! the BACnet objects of a remote controller.

pub mod bacnet;
pub mod config;
pub mod error;
pub mod thermostat;
