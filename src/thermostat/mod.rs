//! Thermostat state synchronization.
//!
//! Keeps a local thermostat model in step with the BACnet objects it is
//! wired to: poll tasks read remote values, the reconciler maps and compares
//! them against the cache, and the write path commits local intents.

pub mod accessory;
pub mod cache;
pub mod mode;
pub mod property;
pub mod reconcile;
pub mod scheduler;
pub mod sink;
pub mod write;

pub use accessory::{AccessoryInfo, ThermostatAccessory};
pub use cache::{StateCache, StateKey};
pub use mode::{HeatingCoolingState, ModeMapper, ModeValues};
pub use property::{MonitoredObjects, MonitoredProperty};
pub use reconcile::{EngineSettings, Reconciler, TemperatureRange};
pub use scheduler::PollTask;
pub use sink::{ChannelSink, Characteristic, CharacteristicSink, CharacteristicUpdate, LogSink};
pub use write::WriteIntent;
