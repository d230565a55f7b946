//! Last-known thermostat state.
//!
//! One entry per [`StateKey`]. Values are stored as `f64` bits in atomics so
//! poll tasks and the write path can share the cache without locking. Each
//! entry carries a version counter that is bumped only on an actual change.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

/// Value of an entry that has never been read.
pub const UNKNOWN: f64 = -1.0;

/// Cached quantities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumCount, EnumIter)]
pub enum StateKey {
    /// Raw present value of the heating status object
    CurrentHeatingRaw,
    /// Raw present value of the cooling status object
    CurrentCoolingRaw,
    /// Derived current heating/cooling state
    CurrentMode,
    /// Mapped target heating/cooling state
    TargetMode,
    CurrentTemperature,
    TargetTemperature,
    /// Display unit preference (0 = Celsius, 1 = Fahrenheit), local only
    DisplayUnits,
}

struct CacheEntry {
    bits: AtomicU64,
    version: AtomicU32,
}

impl CacheEntry {
    fn new(initial: f64) -> Self {
        Self {
            bits: AtomicU64::new(initial.to_bits()),
            version: AtomicU32::new(0),
        }
    }
}

/// Per-accessory state cache.
pub struct StateCache {
    entries: [CacheEntry; StateKey::COUNT],
}

impl StateCache {
    /// Create a cache with every entry unknown except the temperatures, which
    /// start at `min_temp`, and the display units, which start at Celsius.
    pub fn new(min_temp: f64) -> Self {
        let entries = std::array::from_fn(|index| {
            let initial = match StateKey::iter().nth(index) {
                Some(StateKey::CurrentTemperature | StateKey::TargetTemperature) => min_temp,
                Some(StateKey::DisplayUnits) => 0.0,
                _ => UNKNOWN,
            };
            CacheEntry::new(initial)
        });
        Self { entries }
    }

    fn entry(&self, key: StateKey) -> &CacheEntry {
        &self.entries[key as usize]
    }

    pub fn get(&self, key: StateKey) -> f64 {
        f64::from_bits(self.entry(key).bits.load(Ordering::SeqCst))
    }

    /// Whether the entry still holds its never-read sentinel.
    pub fn is_unknown(&self, key: StateKey) -> bool {
        self.get(key) == UNKNOWN
    }

    /// Store a value. Returns `true` and increments the version if it changed.
    pub fn set(&self, key: StateKey, value: f64) -> bool {
        let entry = self.entry(key);
        let old = f64::from_bits(entry.bits.swap(value.to_bits(), Ordering::SeqCst));
        if old != value {
            entry.version.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    /// Number of changes recorded for an entry.
    pub fn version(&self, key: StateKey) -> u32 {
        self.entry(key).version.load(Ordering::SeqCst)
    }
}
