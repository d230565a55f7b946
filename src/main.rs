use bacnet_thermostat_bridge::bacnet::{ApplicationTag, ObjectRef, SimulatedPropertyStore};
use bacnet_thermostat_bridge::config::{self, Config, ThermostatConfig};
use bacnet_thermostat_bridge::thermostat::{LogSink, ThermostatAccessory};
use clap::Parser;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;

/// Bridge BACnet thermostats to smart-home thermostat characteristics.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, env = "BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the poll interval (seconds) of every accessory
    #[arg(long)]
    poll_frequency: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// Seed a simulated device with plausible values for every wired object.
fn simulated_device(config: &ThermostatConfig) -> SimulatedPropertyStore {
    let store = SimulatedPropertyStore::new();
    store.set_tagged(
        &ObjectRef::parse(&config.current_heating_state),
        ApplicationTag::Enumerated,
        1,
    );
    store.set_tagged(
        &ObjectRef::parse(&config.current_cooling_state),
        ApplicationTag::Enumerated,
        0,
    );
    if let Some(heat) = config.target_heat_only_state_value {
        store.set_tagged(
            &ObjectRef::parse(&config.target_heating_cooling_state),
            ApplicationTag::UnsignedInteger,
            heat,
        );
    }
    store.set_value(&ObjectRef::parse(&config.current_temperature), 20.6);
    store.set_value(&ObjectRef::parse(&config.target_temperature), 21.0);
    store
}

fn main() {
    // Load .env file before the runtime starts its worker threads
    config::load_dotenv(Path::new(".env"));
    init_logger();
    info!("Starting BACnet Thermostat Bridge");

    let args = Args::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(args));
}

async fn run(args: Args) {
    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(seconds) = args.poll_frequency {
        for accessory in &mut config.accessories {
            accessory.poll_frequency = seconds;
        }
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    info!("Configuration loaded: {} accessory(s)", config.accessories.len());

    let mut accessories = Vec::new();
    for thermostat in &config.accessories {
        // No BACnet transport is linked in; every accessory talks to a simulated device
        let store = Arc::new(simulated_device(thermostat));
        let sink = Arc::new(LogSink::new(thermostat.name.clone()));
        match ThermostatAccessory::new(thermostat, store, sink) {
            Ok(accessory) => {
                accessory.start();
                accessories.push(accessory);
            }
            Err(e) => error!("Skipping accessory {}: {}", thermostat.name, e),
        }
    }

    info!("BACnet Thermostat Bridge is running");
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    for accessory in &accessories {
        accessory.shutdown().await;
    }
    info!("BACnet Thermostat Bridge stopped");
}
