//! BACnet side of the bridge.
//!
//! Object references, the tagged value codec and the property store
//! interface the thermostat engine talks to.

pub mod client;
pub mod object;
pub mod simulated;
pub mod value;

pub use client::{DEFAULT_WRITE_PRIORITY, DeviceAddress, PRESENT_VALUE, PropertyStore};
pub use object::{ObjectRef, ObjectType};
pub use simulated::SimulatedPropertyStore;
pub use value::{ApplicationTag, ReadResponse, TaggedValue, ValueList};
