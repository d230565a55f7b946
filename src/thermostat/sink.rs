//! Downstream characteristic updates.
//!
//! The engine pushes a value only when it changed. Sinks may still see the
//! same value twice (e.g. after a write followed by a poll) and must tolerate it.

use log::info;
use strum::Display;
use tokio::sync::mpsc;

/// Thermostat characteristics the bridge keeps up to date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Characteristic {
    CurrentHeatingCoolingState,
    TargetHeatingCoolingState,
    CurrentTemperature,
    TargetTemperature,
    TemperatureDisplayUnits,
}

/// Receiver of characteristic updates.
pub trait CharacteristicSink: Send + Sync + 'static {
    fn notify(&self, characteristic: Characteristic, value: f64);
}

impl<F> CharacteristicSink for F
where
    F: Fn(Characteristic, f64) + Send + Sync + 'static,
{
    fn notify(&self, characteristic: Characteristic, value: f64) {
        self(characteristic, value)
    }
}

/// Sink that only logs updates.
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl CharacteristicSink for LogSink {
    fn notify(&self, characteristic: Characteristic, value: f64) {
        info!("[Thermostat] {} {} updated: {}", self.name, characteristic, value);
    }
}

/// A single update forwarded by [`ChannelSink`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CharacteristicUpdate {
    pub characteristic: Characteristic,
    pub value: f64,
}

/// Sink that forwards updates over a channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CharacteristicUpdate>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CharacteristicUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CharacteristicSink for ChannelSink {
    fn notify(&self, characteristic: Characteristic, value: f64) {
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(CharacteristicUpdate {
            characteristic,
            value,
        });
    }
}
