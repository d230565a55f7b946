//! Heating/cooling modes and their remote encoding.
//!
//! Each deployment decides which integer its controller uses for "heat only",
//! "cool only", "auto" and "off". [`ModeMapper`] translates between those
//! values and the fixed local states.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, FromRepr};

/// Local heating/cooling state, numbered as HomeKit characteristics expect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, FromRepr)]
#[repr(u8)]
pub enum HeatingCoolingState {
    Off = 0,
    Heat = 1,
    Cool = 2,
    Auto = 3,
}

impl HeatingCoolingState {
    /// Decode a cached characteristic value.
    pub fn from_value(value: f64) -> Option<Self> {
        if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
            return None;
        }
        Self::from_repr(value as u8)
    }

    pub fn as_value(self) -> f64 {
        f64::from(self as u8)
    }
}

/// Remote values configured for each target mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeValues {
    pub heat_only: Option<i64>,
    pub cool_only: Option<i64>,
    pub auto: Option<i64>,
    pub off: Option<i64>,
}

/// Bidirectional remote/local mode table.
#[derive(Clone, Debug)]
pub struct ModeMapper {
    forward: HashMap<i64, HeatingCoolingState>,
    reverse: HashMap<HeatingCoolingState, i64>,
}

impl ModeMapper {
    pub fn new(values: ModeValues) -> Self {
        let entries = [
            (values.heat_only, HeatingCoolingState::Heat),
            (values.cool_only, HeatingCoolingState::Cool),
            (values.auto, HeatingCoolingState::Auto),
            (values.off, HeatingCoolingState::Off),
        ];

        let mut forward = HashMap::new();
        let mut reverse = HashMap::new();
        for (remote, state) in entries {
            let Some(remote) = remote else {
                continue;
            };
            if let Some(previous) = forward.insert(remote, state) {
                warn!(
                    "[Thermostat] Remote mode value {} configured for both {} and {}, using {}",
                    remote, previous, state, state
                );
            }
            reverse.insert(state, remote);
        }

        Self { forward, reverse }
    }

    /// Map a raw remote value to a local state. Unknown values map to `Off`.
    pub fn to_local(&self, raw: f64) -> HeatingCoolingState {
        if raw.fract() != 0.0 {
            return HeatingCoolingState::Off;
        }
        self.forward
            .get(&(raw as i64))
            .copied()
            .unwrap_or(HeatingCoolingState::Off)
    }

    /// Remote encoding of a local state, if one is configured.
    pub fn to_remote(&self, state: HeatingCoolingState) -> Option<i64> {
        self.reverse.get(&state).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> ModeMapper {
        ModeMapper::new(ModeValues {
            heat_only: Some(10),
            cool_only: Some(20),
            auto: Some(30),
            off: Some(0),
        })
    }

    #[test]
    fn test_forward_mapping() {
        let mapper = mapper();
        assert_eq!(mapper.to_local(10.0), HeatingCoolingState::Heat);
        assert_eq!(mapper.to_local(20.0), HeatingCoolingState::Cool);
        assert_eq!(mapper.to_local(30.0), HeatingCoolingState::Auto);
        assert_eq!(mapper.to_local(0.0), HeatingCoolingState::Off);
    }

    #[test]
    fn test_unrecognized_maps_to_off() {
        let mapper = mapper();
        assert_eq!(mapper.to_local(7.0), HeatingCoolingState::Off);
        assert_eq!(mapper.to_local(20.5), HeatingCoolingState::Off);
        assert_eq!(mapper.to_local(-1.0), HeatingCoolingState::Off);
    }

    #[test]
    fn test_round_trip_for_configured_values() {
        let mapper = mapper();
        for remote in [10, 20, 30, 0] {
            let local = mapper.to_local(remote as f64);
            assert_eq!(mapper.to_remote(local), Some(remote));
        }
    }

    #[test]
    fn test_unconfigured_state_has_no_remote_value() {
        let mapper = ModeMapper::new(ModeValues {
            heat_only: Some(1),
            cool_only: None,
            auto: None,
            off: Some(0),
        });
        assert_eq!(mapper.to_remote(HeatingCoolingState::Auto), None);
        assert_eq!(mapper.to_remote(HeatingCoolingState::Heat), Some(1));
    }

    #[test]
    fn test_colliding_values_last_wins() {
        let mapper = ModeMapper::new(ModeValues {
            heat_only: Some(1),
            cool_only: Some(1),
            auto: Some(3),
            off: Some(0),
        });
        assert_eq!(mapper.to_local(1.0), HeatingCoolingState::Cool);
        assert_eq!(mapper.to_remote(HeatingCoolingState::Heat), Some(1));
    }

    #[test]
    fn test_state_value_round_trip() {
        assert_eq!(
            HeatingCoolingState::from_value(HeatingCoolingState::Cool.as_value()),
            Some(HeatingCoolingState::Cool)
        );
        assert_eq!(HeatingCoolingState::from_value(-1.0), None);
        assert_eq!(HeatingCoolingState::from_value(4.0), None);
    }
}
