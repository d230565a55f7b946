//! The fixed set of remote objects behind a thermostat.

use crate::bacnet::ObjectRef;
use strum::{Display, EnumIter};

/// Remote properties a thermostat monitors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum MonitoredProperty {
    CurrentHeatingState,
    CurrentCoolingState,
    TargetHeatingCoolingState,
    CurrentTemperature,
    TargetTemperature,
}

/// Object references for every [`MonitoredProperty`], parsed once at setup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitoredObjects {
    pub current_heating_state: ObjectRef,
    pub current_cooling_state: ObjectRef,
    pub target_heating_cooling_state: ObjectRef,
    pub current_temperature: ObjectRef,
    pub target_temperature: ObjectRef,
}

impl MonitoredObjects {
    pub fn get(&self, property: MonitoredProperty) -> &ObjectRef {
        match property {
            MonitoredProperty::CurrentHeatingState => &self.current_heating_state,
            MonitoredProperty::CurrentCoolingState => &self.current_cooling_state,
            MonitoredProperty::TargetHeatingCoolingState => &self.target_heating_cooling_state,
            MonitoredProperty::CurrentTemperature => &self.current_temperature,
            MonitoredProperty::TargetTemperature => &self.target_temperature,
        }
    }
}
