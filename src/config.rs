use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Load `KEY=value` lines from a dotenv file into the environment.
///
/// Variables already present in the environment win. Returns the number of
/// variables that were set.
pub fn load_dotenv(path: &Path) -> usize {
    let Ok(content) = fs::read_to_string(path) else {
        return 0;
    };

    let mut loaded = 0;
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
            .unwrap_or(value);

        if std::env::var_os(key).is_none() {
            // SAFETY: called from main before the async runtime spawns any threads
            unsafe { std::env::set_var(key, value) };
            loaded += 1;
        }
    }
    loaded
}

/// Default location of the bridge configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bacnet-thermostat-bridge")
        .join("config.json")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub accessories: Vec<ThermostatConfig>,
}

/// Configuration of one thermostat accessory.
///
/// Object designations use the `<Type>:<Instance>` shorthand (e.g. `AV:3`);
/// an empty designation leaves that property unwired.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatConfig {
    pub name: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub serial: String,

    pub ip_address: String,
    /// BACnet network number of the router, -1 for direct addressing
    #[serde(default = "no_route")]
    pub net: i64,
    /// MAC address behind the router, -1 for direct addressing
    #[serde(default = "no_route")]
    pub adr: i64,

    #[serde(default)]
    pub current_heating_state: String,
    #[serde(default)]
    pub current_cooling_state: String,
    #[serde(default)]
    pub target_heating_cooling_state: String,
    #[serde(default)]
    pub current_temperature: String,
    #[serde(default)]
    pub target_temperature: String,

    #[serde(default)]
    pub target_heat_only_state_value: Option<i64>,
    #[serde(default)]
    pub target_cool_only_state_value: Option<i64>,
    #[serde(default)]
    pub target_auto_state_value: Option<i64>,
    #[serde(default)]
    pub target_off_state_value: Option<i64>,

    #[serde(default = "default_min_temp")]
    pub min_temp: f64,
    #[serde(default = "default_max_temp")]
    pub max_temp: f64,
    #[serde(rename = "maxStep", default = "default_temperature_step")]
    pub temperature_step: f64,
    /// Decimal places temperatures are rounded to
    #[serde(default = "default_temperature_precision")]
    pub temperature_precision: Option<u32>,

    /// Poll interval in seconds
    #[serde(default = "default_poll_frequency")]
    pub poll_frequency: u64,
}

fn no_route() -> i64 {
    -1
}

fn default_min_temp() -> f64 {
    10.0
}

fn default_max_temp() -> f64 {
    38.0
}

fn default_temperature_step() -> f64 {
    0.5
}

fn default_temperature_precision() -> Option<u32> {
    Some(1)
}

fn default_poll_frequency() -> u64 {
    10
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            name: "Thermostat".to_string(),
            manufacturer: String::new(),
            model: String::new(),
            serial: String::new(),
            ip_address: "127.0.0.1".to_string(),
            net: no_route(),
            adr: no_route(),
            current_heating_state: String::new(),
            current_cooling_state: String::new(),
            target_heating_cooling_state: String::new(),
            current_temperature: String::new(),
            target_temperature: String::new(),
            target_heat_only_state_value: None,
            target_cool_only_state_value: None,
            target_auto_state_value: None,
            target_off_state_value: None,
            min_temp: default_min_temp(),
            max_temp: default_max_temp(),
            temperature_step: default_temperature_step(),
            temperature_precision: default_temperature_precision(),
            poll_frequency: default_poll_frequency(),
        }
    }
}

impl ThermostatConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.min_temp.is_finite() || !self.max_temp.is_finite() {
            return Err(BridgeError::InvalidConfig(format!(
                "{}: temperature limits must be finite",
                self.name
            )));
        }
        if self.min_temp > self.max_temp {
            return Err(BridgeError::InvalidConfig(format!(
                "{}: minTemp {} is above maxTemp {}",
                self.name, self.min_temp, self.max_temp
            )));
        }
        if self.poll_frequency == 0 {
            return Err(BridgeError::InvalidConfig(format!(
                "{}: pollFrequency must be at least one second",
                self.name
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Parse a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load the configuration from `path`, `BRIDGE_CONFIG` or the default
    /// location, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os("BRIDGE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(default_config_path),
        };

        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `POLL_FREQUENCY` overrides the poll interval of every accessory.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(frequency) = std::env::var("POLL_FREQUENCY")
            && let Ok(seconds) = frequency.parse::<u64>()
        {
            for accessory in &mut self.accessories {
                accessory.poll_frequency = seconds;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.accessories.iter().try_for_each(ThermostatConfig::validate)
    }
}
