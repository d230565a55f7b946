//! In-memory property store for development and testing.
//!
//! Holds present values keyed by object, records every request and can be
//! told to fail reads or writes to simulate an unreachable device.

use super::client::{DeviceAddress, PropertyStore};
use super::object::ObjectRef;
use super::value::{ApplicationTag, ReadResponse, TaggedValue};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

type ObjectKey = (u16, u32);

/// A recorded property write.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedWrite {
    pub object: ObjectRef,
    pub property: u32,
    pub values: Vec<TaggedValue>,
    pub priority: u8,
}

/// Simulated BACnet device.
#[derive(Default)]
pub struct SimulatedPropertyStore {
    values: Mutex<HashMap<ObjectKey, TaggedValue>>,
    reads: Mutex<Vec<ObjectRef>>,
    writes: Mutex<Vec<RecordedWrite>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl SimulatedPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(object: &ObjectRef) -> Option<ObjectKey> {
        Some((object.type_code()?, object.instance?))
    }

    /// Seed the present value of an object, tagged as `Real`.
    pub fn set_value(&self, object: &ObjectRef, value: impl Into<Value>) {
        self.set_tagged(object, ApplicationTag::Real, value);
    }

    /// Seed the present value of an object with an explicit tag.
    pub fn set_tagged(&self, object: &ObjectRef, tag: ApplicationTag, value: impl Into<Value>) {
        if let Some(key) = Self::key(object) {
            self.values.lock().insert(
                key,
                TaggedValue {
                    tag,
                    value: value.into(),
                },
            );
        }
    }

    /// Current present value of an object, if any.
    pub fn value(&self, object: &ObjectRef) -> Option<Value> {
        let key = Self::key(object)?;
        self.values.lock().get(&key).map(|tagged| tagged.value.clone())
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Objects read so far, in order.
    pub fn reads(&self) -> Vec<ObjectRef> {
        self.reads.lock().clone()
    }

    /// Writes issued so far, in order.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl PropertyStore for SimulatedPropertyStore {
    async fn read_property(
        &self,
        address: &DeviceAddress,
        object: &ObjectRef,
        property: u32,
    ) -> Result<ReadResponse> {
        debug!("[Sim] read {} property {} at {}", object, property, address);
        self.reads.lock().push(object.clone());

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BridgeError::ReadFailed {
                object: object.to_string(),
                property,
                reason: "device unreachable".to_string(),
            });
        }

        let value = Self::key(object).and_then(|key| self.values.lock().get(&key).cloned());
        match value {
            Some(tagged) => Ok(ReadResponse {
                values: vec![tagged],
            }),
            None => Err(BridgeError::ReadFailed {
                object: object.to_string(),
                property,
                reason: "unknown object".to_string(),
            }),
        }
    }

    async fn write_property(
        &self,
        address: &DeviceAddress,
        object: &ObjectRef,
        property: u32,
        values: &[TaggedValue],
        priority: u8,
    ) -> Result<()> {
        debug!(
            "[Sim] write {} property {} at {}: {:?}",
            object, property, address, values
        );
        self.writes.lock().push(RecordedWrite {
            object: object.clone(),
            property,
            values: values.to_vec(),
            priority,
        });

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::WriteFailed {
                object: object.to_string(),
                property,
                reason: "device unreachable".to_string(),
            });
        }

        let (Some(key), Some(first)) = (Self::key(object), values.first()) else {
            return Err(BridgeError::WriteFailed {
                object: object.to_string(),
                property,
                reason: "empty value list".to_string(),
            });
        };
        self.values.lock().insert(key, first.clone());
        Ok(())
    }
}
