//! Thermostat accessory wiring.
//!
//! Builds the engine from configuration and owns the four poll tasks
//! (current mode, target mode, current temperature, target temperature).

use super::cache::StateKey;
use super::mode::{HeatingCoolingState, ModeValues};
use super::property::MonitoredObjects;
use super::reconcile::{EngineSettings, Reconciler, TemperatureRange};
use super::scheduler::PollTask;
use super::sink::CharacteristicSink;
use crate::bacnet::{DeviceAddress, ObjectRef, PropertyStore};
use crate::config::ThermostatConfig;
use crate::error::Result;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Accessory information characteristics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessoryInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
}

/// Thermostat bridged to one BACnet device.
pub struct ThermostatAccessory {
    info: AccessoryInfo,
    poll_interval: Duration,
    engine: Arc<Reconciler>,
    tasks: Mutex<Vec<PollTask>>,
}

impl ThermostatAccessory {
    pub fn new(
        config: &ThermostatConfig,
        store: Arc<dyn PropertyStore>,
        sink: Arc<dyn CharacteristicSink>,
    ) -> Result<Self> {
        config.validate()?;

        let objects = MonitoredObjects {
            current_heating_state: ObjectRef::parse(&config.current_heating_state),
            current_cooling_state: ObjectRef::parse(&config.current_cooling_state),
            target_heating_cooling_state: ObjectRef::parse(&config.target_heating_cooling_state),
            current_temperature: ObjectRef::parse(&config.current_temperature),
            target_temperature: ObjectRef::parse(&config.target_temperature),
        };

        let settings = EngineSettings {
            name: config.name.clone(),
            address: DeviceAddress::from_parts(&config.ip_address, config.net, config.adr),
            objects,
            mode_values: ModeValues {
                heat_only: config.target_heat_only_state_value,
                cool_only: config.target_cool_only_state_value,
                auto: config.target_auto_state_value,
                off: config.target_off_state_value,
            },
            range: TemperatureRange {
                min: config.min_temp,
                max: config.max_temp,
                step: config.temperature_step,
            },
            precision: config.temperature_precision,
        };

        info!("[Thermostat] {} at {} configured", settings.name, settings.address);

        Ok(Self {
            info: AccessoryInfo {
                name: config.name.clone(),
                manufacturer: config.manufacturer.clone(),
                model: config.model.clone(),
                serial: config.serial.clone(),
            },
            poll_interval: Duration::from_secs(config.poll_frequency),
            engine: Arc::new(Reconciler::new(settings, store, sink)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn info(&self) -> &AccessoryInfo {
        &self.info
    }

    /// Min/max/step properties of the target temperature characteristic.
    pub fn target_temperature_props(&self) -> TemperatureRange {
        self.engine.range()
    }

    pub fn engine(&self) -> &Arc<Reconciler> {
        &self.engine
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Spawn the poll tasks. Does nothing if they are already running.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            warn!("[Thermostat] {} already polling", self.info.name);
            return;
        }

        let engine = self.engine.clone();
        tasks.push(PollTask::spawn("current-mode", self.poll_interval, move || {
            let engine = engine.clone();
            async move {
                engine.update_current_mode().await;
            }
        }));

        let engine = self.engine.clone();
        tasks.push(PollTask::spawn("target-mode", self.poll_interval, move || {
            let engine = engine.clone();
            async move {
                engine.update_target_mode().await;
            }
        }));

        let engine = self.engine.clone();
        tasks.push(PollTask::spawn(
            "current-temperature",
            self.poll_interval,
            move || {
                let engine = engine.clone();
                async move {
                    engine.update_current_temperature().await;
                }
            },
        ));

        let engine = self.engine.clone();
        tasks.push(PollTask::spawn(
            "target-temperature",
            self.poll_interval,
            move || {
                let engine = engine.clone();
                async move {
                    engine.update_target_temperature().await;
                }
            },
        ));

        info!(
            "[Thermostat] {} polling every {:?}",
            self.info.name, self.poll_interval
        );
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    /// Stop all poll tasks and wait for them to exit.
    pub async fn shutdown(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.join().await;
        }
        info!("[Thermostat] {} stopped polling", self.info.name);
    }

    pub fn set_target_mode(&self, state: HeatingCoolingState) -> oneshot::Receiver<()> {
        self.engine.set_target_mode(state)
    }

    pub fn set_target_temperature(&self, celsius: f64) -> oneshot::Receiver<()> {
        self.engine.set_target_temperature(celsius)
    }

    pub fn display_units(&self) -> f64 {
        self.engine.display_units()
    }

    pub fn set_display_units(&self, units: f64) {
        self.engine.set_display_units(units)
    }

    /// Last known value of a cached quantity.
    pub fn state(&self, key: StateKey) -> f64 {
        self.engine.cache().get(key)
    }
}
