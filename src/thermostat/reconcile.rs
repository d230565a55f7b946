//! Read-compare-update passes for the thermostat properties.
//!
//! A pass reads one remote value, turns it into its local form and compares
//! it to the cache. Only a changed value reaches the sink. Read failures are
//! logged and leave the cache alone; the next pass gets another chance.

use super::cache::{StateCache, StateKey};
use super::mode::{HeatingCoolingState, ModeMapper, ModeValues};
use super::property::{MonitoredObjects, MonitoredProperty};
use super::sink::{Characteristic, CharacteristicSink};
use super::write::WriteQueue;
use crate::bacnet::{DeviceAddress, ObjectRef, PRESENT_VALUE, PropertyStore, value};
use crate::error::{BridgeError, Result};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Allowed target/current temperature range and step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Everything a [`Reconciler`] needs besides its collaborators.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Accessory name used in log lines
    pub name: String,
    pub address: DeviceAddress,
    pub objects: MonitoredObjects,
    pub mode_values: ModeValues,
    pub range: TemperatureRange,
    /// Decimal places temperatures are rounded to before clamping
    pub precision: Option<u32>,
}

/// Result of reading one monitored property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fetched {
    /// Object reference is not configured, nothing was read
    NotConfigured,
    /// The read failed and was logged
    Failed,
    Value(f64),
}

/// Outcome of one generic reconciliation step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reconciled {
    /// Value to use for this cycle
    pub value: f64,
    /// Whether the cache changed (and the sink was notified)
    pub changed: bool,
}

/// Round to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

/// Restrict a temperature into `[min, max]`.
pub fn clamp_temperature(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Current state from the raw heating and cooling status values.
pub fn derive_current_mode(heating: f64, cooling: f64) -> HeatingCoolingState {
    if heating > 0.0 {
        HeatingCoolingState::Heat
    } else if cooling > 0.0 {
        HeatingCoolingState::Cool
    } else {
        HeatingCoolingState::Off
    }
}

/// State synchronization engine for one thermostat accessory.
pub struct Reconciler {
    pub(super) name: String,
    pub(super) store: Arc<dyn PropertyStore>,
    pub(super) address: DeviceAddress,
    pub(super) objects: MonitoredObjects,
    pub(super) cache: StateCache,
    pub(super) mapper: ModeMapper,
    pub(super) sink: Arc<dyn CharacteristicSink>,
    pub(super) range: TemperatureRange,
    pub(super) precision: Option<u32>,
    // Only the target properties have a second writer (the write queue), so
    // only they get a lane.
    /// Serializes target mode polls and writes
    pub(super) target_mode_lane: AsyncMutex<()>,
    /// Serializes target temperature polls and writes
    pub(super) target_temperature_lane: AsyncMutex<()>,
    pub(super) writes: WriteQueue,
}

impl Reconciler {
    pub fn new(
        settings: EngineSettings,
        store: Arc<dyn PropertyStore>,
        sink: Arc<dyn CharacteristicSink>,
    ) -> Self {
        Self {
            name: settings.name,
            store,
            address: settings.address,
            objects: settings.objects,
            cache: StateCache::new(settings.range.min),
            mapper: ModeMapper::new(settings.mode_values),
            sink,
            range: settings.range,
            precision: settings.precision,
            target_mode_lane: AsyncMutex::new(()),
            target_temperature_lane: AsyncMutex::new(()),
            writes: WriteQueue::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn mapper(&self) -> &ModeMapper {
        &self.mapper
    }

    pub fn range(&self) -> TemperatureRange {
        self.range
    }

    pub fn objects(&self) -> &MonitoredObjects {
        &self.objects
    }

    async fn read_number(&self, object: &ObjectRef) -> Result<f64> {
        let response = self
            .store
            .read_property(&self.address, object, PRESENT_VALUE)
            .await?;
        let raw = value::decode(&response)?;
        value::as_number(&raw).ok_or_else(|| {
            BridgeError::MalformedResponse(format!(
                "{} present value {} is not numeric",
                object, raw
            ))
        })
    }

    /// Read one property, rounding to `precision` decimal places if given.
    pub async fn fetch(&self, property: MonitoredProperty, precision: Option<u32>) -> Fetched {
        let object = self.objects.get(property);
        if !object.is_configured() {
            debug!("[Thermostat] {} {} not configured, skipping read", self.name, property);
            return Fetched::NotConfigured;
        }

        match self.read_number(object).await {
            Ok(raw) => {
                debug!("[BACnet] {} read {} ({}): {}", self.name, property, object, raw);
                Fetched::Value(precision.map_or(raw, |p| round_to(raw, p)))
            }
            Err(e) => {
                error!("[BACnet] {} failed to read {}: {}", self.name, property, e);
                Fetched::Failed
            }
        }
    }

    /// Generic step: compare a fetched value (after `transform`) to the cache
    /// and notify `characteristic` once if it changed.
    pub fn reconcile(
        &self,
        key: StateKey,
        characteristic: Option<Characteristic>,
        fetched: Fetched,
        default: f64,
        transform: impl FnOnce(f64) -> f64,
    ) -> Reconciled {
        match fetched {
            Fetched::NotConfigured => {
                let value = if self.cache.is_unknown(key) {
                    default
                } else {
                    self.cache.get(key)
                };
                Reconciled {
                    value,
                    changed: false,
                }
            }
            Fetched::Failed => Reconciled {
                value: default,
                changed: false,
            },
            Fetched::Value(raw) => {
                let value = transform(raw);
                let changed = self.cache.set(key, value);
                if changed && let Some(characteristic) = characteristic {
                    self.sink.notify(characteristic, value);
                }
                Reconciled { value, changed }
            }
        }
    }

    /// Poll the heating and cooling status objects and derive the current
    /// state. Returns the new state if it was pushed downstream.
    pub async fn update_current_mode(&self) -> Option<HeatingCoolingState> {
        let heating = self.fetch(MonitoredProperty::CurrentHeatingState, None).await;
        let cooling = self.fetch(MonitoredProperty::CurrentCoolingState, None).await;

        let heating = self.current_mode_input(StateKey::CurrentHeatingRaw, heating);
        let cooling = self.current_mode_input(StateKey::CurrentCoolingRaw, cooling);
        let (Some(heating), Some(cooling)) = (heating, cooling) else {
            debug!(
                "[Thermostat] {} current state input unavailable, keeping {}",
                self.name,
                self.cache.get(StateKey::CurrentMode)
            );
            return None;
        };
        debug!(
            "[Thermostat] {} current state inputs: heat {}, cool {}",
            self.name, heating.value, cooling.value
        );

        let first_pass = self.cache.is_unknown(StateKey::CurrentMode);
        if !heating.changed && !cooling.changed && !first_pass {
            return None;
        }

        let state = derive_current_mode(heating.value, cooling.value);
        if !self.cache.set(StateKey::CurrentMode, state.as_value()) {
            return None;
        }
        info!("[Thermostat] {} current state: {}", self.name, state);
        self.sink.notify(Characteristic::CurrentHeatingCoolingState, state.as_value());
        Some(state)
    }

    /// One raw input of the current state. A failed read falls back to the
    /// last cached raw value, or `None` if there is none yet.
    fn current_mode_input(&self, key: StateKey, fetched: Fetched) -> Option<Reconciled> {
        match fetched {
            Fetched::Failed if self.cache.is_unknown(key) => None,
            Fetched::Failed => Some(Reconciled {
                value: self.cache.get(key),
                changed: false,
            }),
            fetched => Some(self.reconcile(key, None, fetched, 0.0, |v| v)),
        }
    }

    /// Poll the target mode object. Returns the new state if it changed.
    pub async fn update_target_mode(&self) -> Option<HeatingCoolingState> {
        let _lane = self.target_mode_lane.lock().await;
        let fetched = self
            .fetch(MonitoredProperty::TargetHeatingCoolingState, None)
            .await;
        let mapper = &self.mapper;
        let outcome = self.reconcile(
            StateKey::TargetMode,
            Some(Characteristic::TargetHeatingCoolingState),
            fetched,
            HeatingCoolingState::Off.as_value(),
            |raw| mapper.to_local(raw).as_value(),
        );

        if !outcome.changed {
            return None;
        }
        let state = HeatingCoolingState::from_value(outcome.value)?;
        info!("[Thermostat] {} target state: {}", self.name, state);
        Some(state)
    }

    async fn update_temperature(
        &self,
        property: MonitoredProperty,
        key: StateKey,
        characteristic: Characteristic,
    ) -> Option<f64> {
        let fetched = self.fetch(property, self.precision).await;
        let TemperatureRange { min, max, .. } = self.range;
        let outcome = self.reconcile(key, Some(characteristic), fetched, min, |v| {
            clamp_temperature(v, min, max)
        });

        if !outcome.changed {
            return None;
        }
        info!("[Thermostat] {} {}: {}", self.name, characteristic, outcome.value);
        Some(outcome.value)
    }

    /// Poll the current temperature. Returns the new value if it changed.
    pub async fn update_current_temperature(&self) -> Option<f64> {
        self.update_temperature(
            MonitoredProperty::CurrentTemperature,
            StateKey::CurrentTemperature,
            Characteristic::CurrentTemperature,
        )
        .await
    }

    /// Poll the target temperature. Returns the new value if it changed.
    pub async fn update_target_temperature(&self) -> Option<f64> {
        let _lane = self.target_temperature_lane.lock().await;
        self.update_temperature(
            MonitoredProperty::TargetTemperature,
            StateKey::TargetTemperature,
            Characteristic::TargetTemperature,
        )
        .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bacnet::{ApplicationTag, SimulatedPropertyStore};
    use crate::thermostat::sink::{ChannelSink, CharacteristicUpdate};
    use tokio::sync::mpsc::UnboundedReceiver;

    pub(crate) fn objects() -> MonitoredObjects {
        MonitoredObjects {
            current_heating_state: ObjectRef::parse("BV:1"),
            current_cooling_state: ObjectRef::parse("BV:2"),
            target_heating_cooling_state: ObjectRef::parse("MSV:3"),
            current_temperature: ObjectRef::parse("AI:4"),
            target_temperature: ObjectRef::parse("AV:5"),
        }
    }

    pub(crate) fn settings(objects: MonitoredObjects) -> EngineSettings {
        EngineSettings {
            name: "Test Thermostat".to_string(),
            address: DeviceAddress::from_parts("127.0.0.1", -1, -1),
            objects,
            mode_values: ModeValues {
                heat_only: Some(10),
                cool_only: Some(20),
                auto: Some(30),
                off: Some(0),
            },
            range: TemperatureRange {
                min: 10.0,
                max: 30.0,
                step: 0.5,
            },
            precision: Some(1),
        }
    }

    pub(crate) fn engine(
        objects: MonitoredObjects,
    ) -> (
        Arc<Reconciler>,
        Arc<SimulatedPropertyStore>,
        UnboundedReceiver<CharacteristicUpdate>,
    ) {
        let store = Arc::new(SimulatedPropertyStore::new());
        let (sink, rx) = ChannelSink::new();
        let reconciler = Reconciler::new(settings(objects), store.clone(), Arc::new(sink));
        (Arc::new(reconciler), store, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<CharacteristicUpdate>) -> Vec<CharacteristicUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[test]
    fn test_round_and_clamp() {
        assert_eq!(round_to(21.456, 1), 21.5);
        assert_eq!(round_to(21.456, 0), 21.0);
        assert_eq!(clamp_temperature(20.0, 10.0, 30.0), 20.0);
        assert_eq!(clamp_temperature(35.7, 10.0, 30.0), 30.0);
        assert_eq!(clamp_temperature(-5.0, 10.0, 30.0), 10.0);
        let once = clamp_temperature(42.0, 10.0, 30.0);
        assert_eq!(clamp_temperature(once, 10.0, 30.0), once);
    }

    #[test]
    fn test_derive_current_mode() {
        assert_eq!(derive_current_mode(0.0, 5.0), HeatingCoolingState::Cool);
        assert_eq!(derive_current_mode(0.0, 0.0), HeatingCoolingState::Off);
        assert_eq!(derive_current_mode(1.0, 1.0), HeatingCoolingState::Heat);
    }

    #[tokio::test]
    async fn test_identical_reads_notify_once() {
        let (engine, store, mut rx) = engine(objects());
        store.set_value(&engine.objects().current_temperature, 21.0);

        assert_eq!(engine.update_current_temperature().await, Some(21.0));
        assert_eq!(engine.update_current_temperature().await, None);
        assert_eq!(engine.update_current_temperature().await, None);

        let updates = drain(&mut rx);
        assert_eq!(
            updates,
            vec![CharacteristicUpdate {
                characteristic: Characteristic::CurrentTemperature,
                value: 21.0
            }]
        );
    }

    #[tokio::test]
    async fn test_value_equal_to_seeded_cache_is_silent() {
        let (engine, store, mut rx) = engine(objects());
        // Cache starts at the configured minimum
        store.set_value(&engine.objects().target_temperature, 10.0);

        assert_eq!(engine.update_target_temperature().await, None);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_clamped_after_rounding() {
        let (engine, store, mut rx) = engine(objects());
        store.set_value(&engine.objects().current_temperature, 35.7);

        assert_eq!(engine.update_current_temperature().await, Some(30.0));
        assert_eq!(engine.cache().get(StateKey::CurrentTemperature), 30.0);
        assert_eq!(drain(&mut rx)[0].value, 30.0);
    }

    #[tokio::test]
    async fn test_target_mode_mapped() {
        let (engine, store, mut rx) = engine(objects());
        store.set_tagged(
            &engine.objects().target_heating_cooling_state,
            ApplicationTag::UnsignedInteger,
            20,
        );

        assert_eq!(
            engine.update_target_mode().await,
            Some(HeatingCoolingState::Cool)
        );
        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].characteristic,
            Characteristic::TargetHeatingCoolingState
        );
        assert_eq!(updates[0].value, HeatingCoolingState::Cool.as_value());
    }

    #[tokio::test]
    async fn test_unrecognized_target_mode_is_off() {
        let (engine, store, _rx) = engine(objects());
        store.set_value(&engine.objects().target_heating_cooling_state, 99);

        assert_eq!(
            engine.update_target_mode().await,
            Some(HeatingCoolingState::Off)
        );
    }

    #[tokio::test]
    async fn test_current_mode_derivation() {
        let (engine, store, mut rx) = engine(objects());
        let objects = engine.objects().clone();
        store.set_value(&objects.current_heating_state, 0);
        store.set_value(&objects.current_cooling_state, 5);

        assert_eq!(
            engine.update_current_mode().await,
            Some(HeatingCoolingState::Cool)
        );
        assert_eq!(engine.update_current_mode().await, None);

        store.set_value(&objects.current_cooling_state, 0);
        assert_eq!(
            engine.update_current_mode().await,
            Some(HeatingCoolingState::Off)
        );

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 2);
        assert!(
            updates
                .iter()
                .all(|u| u.characteristic == Characteristic::CurrentHeatingCoolingState)
        );
    }

    #[tokio::test]
    async fn test_raw_change_without_state_change_is_silent() {
        let (engine, store, mut rx) = engine(objects());
        let objects = engine.objects().clone();
        store.set_value(&objects.current_heating_state, 1);
        store.set_value(&objects.current_cooling_state, 0);
        assert_eq!(
            engine.update_current_mode().await,
            Some(HeatingCoolingState::Heat)
        );

        store.set_value(&objects.current_heating_state, 3);
        assert_eq!(engine.update_current_mode().await, None);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_objects_are_never_read() {
        let mut objects = objects();
        objects.current_cooling_state = ObjectRef::parse("");
        objects.current_temperature = ObjectRef::parse("AI-4");
        let (engine, store, _rx) = engine(objects);
        store.set_value(&engine.objects().current_heating_state, 1);

        assert_eq!(engine.update_current_temperature().await, None);
        assert_eq!(
            engine.update_current_mode().await,
            Some(HeatingCoolingState::Heat)
        );

        let reads = store.reads();
        assert_eq!(reads, vec![engine.objects().current_heating_state.clone()]);
    }

    #[tokio::test]
    async fn test_nothing_configured_reports_off_once() {
        let (engine, store, mut rx) = engine(MonitoredObjects::default());

        assert_eq!(
            engine.update_current_mode().await,
            Some(HeatingCoolingState::Off)
        );
        assert_eq!(engine.update_current_mode().await, None);
        assert_eq!(engine.update_target_mode().await, None);
        assert!(store.reads().is_empty());
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_read_failure_keeps_cache() {
        let (engine, store, mut rx) = engine(objects());
        let object = engine.objects().current_temperature.clone();
        store.set_value(&object, 22.0);
        assert_eq!(engine.update_current_temperature().await, Some(22.0));

        store.fail_reads(true);
        let fetched = engine.fetch(MonitoredProperty::CurrentTemperature, Some(1)).await;
        assert_eq!(fetched, Fetched::Failed);
        let outcome = engine.reconcile(
            StateKey::CurrentTemperature,
            Some(Characteristic::CurrentTemperature),
            fetched,
            10.0,
            |v| v,
        );
        assert_eq!(outcome, Reconciled { value: 10.0, changed: false });
        assert_eq!(engine.update_current_temperature().await, None);
        assert_eq!(engine.cache().get(StateKey::CurrentTemperature), 22.0);

        store.fail_reads(false);
        store.set_value(&object, 23.0);
        assert_eq!(engine.update_current_temperature().await, Some(23.0));
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test]
    async fn test_failed_input_uses_cached_raw_value() {
        let (engine, store, mut rx) = engine(objects());
        let objects = engine.objects().clone();
        store.set_value(&objects.current_heating_state, 1);
        store.set_value(&objects.current_cooling_state, 0);
        assert_eq!(
            engine.update_current_mode().await,
            Some(HeatingCoolingState::Heat)
        );

        // Heating read fails in the same pass cooling switches on
        store.set_tagged(&objects.current_heating_state, ApplicationTag::CharacterString, "n/a");
        store.set_value(&objects.current_cooling_state, 1);
        assert_eq!(engine.update_current_mode().await, None);

        store.set_value(&objects.current_heating_state, 1);
        for _ in 0..3 {
            assert_eq!(engine.update_current_mode().await, None);
        }
        assert_eq!(
            engine.cache().get(StateKey::CurrentMode),
            derive_current_mode(1.0, 1.0).as_value()
        );
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_current_mode_waits_for_first_successful_read() {
        let (engine, store, mut rx) = engine(objects());
        let objects = engine.objects().clone();
        store.set_tagged(&objects.current_heating_state, ApplicationTag::CharacterString, "n/a");
        store.set_value(&objects.current_cooling_state, 1);

        assert_eq!(engine.update_current_mode().await, None);
        assert!(engine.cache().is_unknown(StateKey::CurrentMode));

        store.set_value(&objects.current_heating_state, 1);
        assert_eq!(
            engine.update_current_mode().await,
            Some(HeatingCoolingState::Heat)
        );
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_non_numeric_value_is_a_read_failure() {
        let (engine, store, mut rx) = engine(objects());
        store.set_tagged(
            &engine.objects().current_temperature,
            ApplicationTag::CharacterString,
            "n/a",
        );

        assert_eq!(
            engine.fetch(MonitoredProperty::CurrentTemperature, None).await,
            Fetched::Failed
        );
        assert_eq!(engine.update_current_temperature().await, None);
        assert!(drain(&mut rx).is_empty());
    }
}
