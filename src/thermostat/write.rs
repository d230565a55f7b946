//! Local set-intents committed to the remote device.
//!
//! The `set_*` entry points return as soon as the intent is queued. A single
//! writer task per engine drains the queue in submission order, so the last
//! intent submitted is the last one written. A failed write is logged and not
//! retried; the cache keeps its last known-good value until the next poll.

use super::cache::StateKey;
use super::mode::HeatingCoolingState;
use super::reconcile::Reconciler;
use crate::bacnet::{ApplicationTag, DEFAULT_WRITE_PRIORITY, PRESENT_VALUE, value};
use crate::error::{BridgeError, Result};
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};

/// A local change waiting to be written.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WriteIntent {
    TargetMode(HeatingCoolingState),
    TargetTemperature(f64),
}

struct PendingWrite {
    intent: WriteIntent,
    done: oneshot::Sender<()>,
}

/// Submission-ordered intent queue. The receiver moves into the writer task
/// on first use.
pub(super) struct WriteQueue {
    tx: mpsc::UnboundedSender<PendingWrite>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<PendingWrite>>>,
}

impl WriteQueue {
    pub(super) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }
}

impl Reconciler {
    /// Write a target mode and cache it on success.
    pub async fn commit_target_mode(&self, state: HeatingCoolingState) -> Result<()> {
        let object = &self.objects.target_heating_cooling_state;
        if !object.is_configured() {
            return Err(BridgeError::NotConfigured("target heating/cooling state"));
        }
        let remote = self
            .mapper
            .to_remote(state)
            .ok_or_else(|| BridgeError::MappingGap(state.to_string()))?;
        let values = value::encode(&Value::from(remote), Some(ApplicationTag::UnsignedInteger))?;

        let _lane = self.target_mode_lane.lock().await;
        self.store
            .write_property(
                &self.address,
                object,
                PRESENT_VALUE,
                &values,
                DEFAULT_WRITE_PRIORITY,
            )
            .await?;
        self.cache.set(StateKey::TargetMode, state.as_value());

        info!(
            "[Thermostat] {} wrote target state {} (remote value {})",
            self.name, state, remote
        );
        Ok(())
    }

    /// Write a target temperature and cache it on success.
    pub async fn commit_target_temperature(&self, celsius: f64) -> Result<()> {
        let object = &self.objects.target_temperature;
        if !object.is_configured() {
            return Err(BridgeError::NotConfigured("target temperature"));
        }
        if !celsius.is_finite() {
            return Err(BridgeError::UnsupportedValueKind("non-finite number"));
        }
        let values = value::encode(&Value::from(celsius), Some(ApplicationTag::Real))?;

        let _lane = self.target_temperature_lane.lock().await;
        self.store
            .write_property(
                &self.address,
                object,
                PRESENT_VALUE,
                &values,
                DEFAULT_WRITE_PRIORITY,
            )
            .await?;
        self.cache.set(StateKey::TargetTemperature, celsius);

        info!("[Thermostat] {} wrote target temperature {}", self.name, celsius);
        Ok(())
    }

    /// Queue a target mode intent. The receiver resolves once it was handled.
    pub fn set_target_mode(self: &Arc<Self>, state: HeatingCoolingState) -> oneshot::Receiver<()> {
        debug!("[Thermostat] {} set target state {}", self.name, state);
        self.submit(WriteIntent::TargetMode(state))
    }

    /// Queue a target temperature intent. The receiver resolves once it was
    /// handled.
    pub fn set_target_temperature(self: &Arc<Self>, celsius: f64) -> oneshot::Receiver<()> {
        debug!("[Thermostat] {} set target temperature {}", self.name, celsius);
        self.submit(WriteIntent::TargetTemperature(celsius))
    }

    fn submit(self: &Arc<Self>, intent: WriteIntent) -> oneshot::Receiver<()> {
        if let Some(rx) = self.writes.rx.lock().take() {
            tokio::spawn(Self::run_writer(Arc::downgrade(self), rx));
        }

        let (done, receipt) = oneshot::channel();
        if self.writes.tx.send(PendingWrite { intent, done }).is_err() {
            error!("[Thermostat] {} writer stopped, dropping {:?}", self.name, intent);
        }
        receipt
    }

    async fn run_writer(weak: Weak<Self>, mut rx: mpsc::UnboundedReceiver<PendingWrite>) {
        while let Some(PendingWrite { intent, done }) = rx.recv().await {
            let Some(engine) = weak.upgrade() else {
                break;
            };
            if AssertUnwindSafe(engine.apply(intent)).catch_unwind().await.is_err() {
                error!("[Thermostat] {} panicked while writing {:?}", engine.name, intent);
            }
            let _ = done.send(());
        }
    }

    async fn apply(&self, intent: WriteIntent) {
        match intent {
            WriteIntent::TargetMode(state) => match self.commit_target_mode(state).await {
                Ok(()) => {}
                Err(e @ (BridgeError::MappingGap(_) | BridgeError::NotConfigured(_))) => {
                    warn!("[Thermostat] {} target state not written: {}", self.name, e);
                }
                Err(e) => {
                    error!("[BACnet] {} failed to write target state: {}", self.name, e);
                }
            },
            WriteIntent::TargetTemperature(celsius) => {
                match self.commit_target_temperature(celsius).await {
                    Ok(()) => {}
                    Err(e @ BridgeError::NotConfigured(_)) => {
                        warn!("[Thermostat] {} target temperature not written: {}", self.name, e);
                    }
                    Err(e) => {
                        error!("[BACnet] {} failed to write target temperature: {}", self.name, e);
                    }
                }
            }
        }
    }

    /// Display unit preference; never leaves the bridge.
    pub fn display_units(&self) -> f64 {
        self.cache.get(StateKey::DisplayUnits)
    }

    pub fn set_display_units(&self, units: f64) {
        self.cache.set(StateKey::DisplayUnits, units);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bacnet::ObjectRef;
    use crate::thermostat::reconcile::tests::{engine, objects};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_target_mode_written_with_mapped_value() {
        let (engine, store, _rx) = engine(objects());

        engine
            .set_target_mode(HeatingCoolingState::Auto)
            .await
            .unwrap();

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].object, engine.objects().target_heating_cooling_state);
        assert_eq!(writes[0].property, PRESENT_VALUE);
        assert_eq!(writes[0].priority, DEFAULT_WRITE_PRIORITY);
        assert_eq!(writes[0].values[0].tag, ApplicationTag::UnsignedInteger);
        assert_eq!(writes[0].values[0].value, json!(30));
        assert_eq!(
            engine.cache().get(StateKey::TargetMode),
            HeatingCoolingState::Auto.as_value()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_last_submitted_intent_wins() {
        let (engine, store, _rx) = engine(objects());

        let first = engine.set_target_mode(HeatingCoolingState::Heat);
        let second = engine.set_target_mode(HeatingCoolingState::Cool);
        let third = engine.set_target_temperature(21.0);
        let fourth = engine.set_target_temperature(24.5);
        for receipt in [first, second, third, fourth] {
            receipt.await.unwrap();
        }

        let written: Vec<_> = store.writes().iter().map(|w| w.values[0].value.clone()).collect();
        assert_eq!(written, vec![json!(10), json!(20), json!(21.0), json!(24.5)]);
        assert_eq!(
            engine.cache().get(StateKey::TargetMode),
            HeatingCoolingState::Cool.as_value()
        );
        assert_eq!(engine.cache().get(StateKey::TargetTemperature), 24.5);
    }

    #[tokio::test]
    async fn test_writer_survives_failed_write() {
        let (engine, store, _rx) = engine(objects());
        store.fail_writes(true);
        engine.set_target_temperature(25.0).await.unwrap();

        store.fail_writes(false);
        engine.set_target_temperature(26.0).await.unwrap();
        assert_eq!(engine.cache().get(StateKey::TargetTemperature), 26.0);
    }

    #[tokio::test]
    async fn test_written_mode_does_not_echo_on_next_poll() {
        let (engine, _store, mut rx) = engine(objects());

        assert_ok!(engine.commit_target_mode(HeatingCoolingState::Heat).await);
        assert_eq!(engine.update_target_mode().await, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_target_temperature_written_as_real() {
        let (engine, store, _rx) = engine(objects());

        engine.set_target_temperature(22.5).await.unwrap();

        let writes = store.writes();
        assert_eq!(writes[0].values[0].tag, ApplicationTag::Real);
        assert_eq!(writes[0].values[0].value, json!(22.5));
        assert_eq!(engine.cache().get(StateKey::TargetTemperature), 22.5);
    }

    #[tokio::test]
    async fn test_mapping_gap_aborts_write() {
        let mut settings = crate::thermostat::reconcile::tests::settings(objects());
        settings.mode_values.auto = None;
        let store = Arc::new(crate::bacnet::SimulatedPropertyStore::new());
        let (sink, _rx) = crate::thermostat::sink::ChannelSink::new();
        let engine = Reconciler::new(settings, store.clone(), Arc::new(sink));

        let result = engine.commit_target_mode(HeatingCoolingState::Auto).await;
        assert!(matches!(result, Err(BridgeError::MappingGap(_))));
        assert!(store.writes().is_empty());
        assert!(engine.cache().is_unknown(StateKey::TargetMode));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache() {
        let (engine, store, _rx) = engine(objects());
        store.fail_writes(true);

        assert_err!(engine.commit_target_temperature(25.0).await);
        engine.set_target_temperature(26.0).await.unwrap();
        assert_eq!(engine.cache().get(StateKey::TargetTemperature), 10.0);
        assert_eq!(store.writes().len(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_target_is_not_written() {
        let mut objects = objects();
        objects.target_temperature = ObjectRef::parse("");
        let (engine, store, _rx) = engine(objects);

        let result = engine.commit_target_temperature(21.0).await;
        assert!(matches!(result, Err(BridgeError::NotConfigured(_))));
        assert!(store.writes().is_empty());
    }

    #[test]
    fn test_display_units_stay_local() {
        let (engine, store, _rx) = engine(objects());
        assert_eq!(engine.display_units(), 0.0);
        engine.set_display_units(1.0);
        assert_eq!(engine.display_units(), 1.0);
        assert!(store.writes().is_empty());
        assert!(store.reads().is_empty());
    }
}
