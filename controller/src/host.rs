use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::OnceLock,
    time::{Duration, Instant},
};

use anyhow::Context;
use hvac_common::{
    driver::final_levels, ClimateManager, DriverKind, HostConfig, OutputDriver, RuntimeConfig,
    TemperatureSensor,
};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
    time::{Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    outputs::{OutputBus, SimulatedOutputs, SysfsOutputs},
    sensor::{ReadingError, SimulatedSensor},
};

const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

#[derive(Clone)]
pub struct ConfigStore {
    runtime_path: PathBuf,
}

impl ConfigStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_path: data_dir.into().join("runtime.json"),
        }
    }

    pub fn from_env() -> Self {
        let data_dir = std::env::var("HVAC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.hvac"));
        Self::new(data_dir)
    }

    pub async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(&self.runtime_path).await {
            Ok(raw) => RuntimeConfig::from_json(&raw)
                .with_context(|| format!("invalid config at {}", self.runtime_path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn save_runtime_config(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        if let Some(parent) = self.runtime_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(runtime)?;
        tokio::fs::write(&self.runtime_path, payload).await?;
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.runtime_path.exists()
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::from_env();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    if !store.exists() {
        if let Err(err) = store.save_runtime_config(&runtime).await {
            warn!("failed to seed runtime config: {err:#}");
        }
    }
    apply_env_overrides(&mut runtime.host);
    if let Err(err) = runtime.climate.validate() {
        warn!("{err}; every cycle will be skipped until the band is fixed");
    }

    let ambient = std::env::var("HVAC_SIM_AMBIENT")
        .ok()
        .and_then(|value| value.parse::<f32>().ok())
        .unwrap_or(82.0);
    let midpoint = (runtime.climate.temperature_max + runtime.climate.temperature_min) / 2.0;
    let mut sensor = SimulatedSensor::new(midpoint, ambient);
    info!(
        sensor = %sensor.info(),
        model = sensor.model().as_str(),
        "temperature sensor ready"
    );

    let driver = open_driver(&runtime)?;
    let mut climate = ClimateManager::new(runtime.climate.clone(), runtime.controller.clone());
    let mut host = runtime.host.clone();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut bus = OutputBus::new(driver, shutdown_rx.clone());
    spawn_shutdown_listener(shutdown_tx)?;

    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    let mut shutdown = shutdown_rx;
    let mut interval = cycle_interval(host.cycle_interval_ms);

    info!(
        mode = host.mode.as_str(),
        interval_ms = host.cycle_interval_ms,
        "climate control started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sensor.observe(climate.controller().state());
                if let Err(err) = run_cycle(&mut climate, &mut sensor, &mut bus, &host).await {
                    warn!("skipping cycle: {err}");
                }
            }
            _ = hangup.recv() => {
                if reload(&store, &mut climate, &mut host).await {
                    interval = cycle_interval(host.cycle_interval_ms);
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("shutting down, forcing all actuators off");
    let actions = climate.shutdown(monotonic_ms());
    bus.execute(actions).await;
    let driver = bus.release().context("failed to drive outputs low")?;
    drop(driver);

    let now_ms = monotonic_ms();
    match serde_json::to_string(&climate.status(now_ms)) {
        Ok(body) => info!("final status: {body}"),
        Err(err) => warn!("status serialization failed: {err}"),
    }
    Ok(())
}

async fn run_cycle<S, D>(
    climate: &mut ClimateManager,
    sensor: &mut S,
    bus: &mut OutputBus<D>,
    host: &HostConfig,
) -> Result<(), ReadingError>
where
    S: TemperatureSensor,
    D: OutputDriver,
{
    if !sensor.update_readings() {
        return Err(ReadingError::RefreshFailed(sensor.info()));
    }
    let temp = sensor.temperature();
    if !host.is_valid_reading(temp) {
        return Err(ReadingError::OutOfRange(temp));
    }
    climate.update_observed_temperature(temp);

    let now_ms = monotonic_ms();
    let before = climate.controller().state().clone();
    let actions = climate.evaluate(host.mode, now_ms);
    if actions.is_empty() {
        return Ok(());
    }

    debug!("plan leaves outputs at {:?}", final_levels(&actions));
    let failures = bus.execute(actions).await;
    if failures > 0 {
        warn!(failures, "some output writes failed this cycle");
    }

    if climate.controller().state() != &before {
        match serde_json::to_string(&climate.status(monotonic_ms())) {
            Ok(body) => info!("status: {body}"),
            Err(err) => warn!("status serialization failed: {err}"),
        }
    }
    Ok(())
}

async fn reload(store: &ConfigStore, climate: &mut ClimateManager, host: &mut HostConfig) -> bool {
    let mut runtime = match store.load_runtime_config().await {
        Ok(runtime) => runtime,
        Err(err) => {
            warn!("settings reload failed, keeping current settings: {err:#}");
            return false;
        }
    };
    apply_env_overrides(&mut runtime.host);

    if runtime.controller.pins != climate.controller().setting().pins {
        warn!("pin assignment changes take effect after restart");
        runtime.controller.pins = climate.controller().setting().pins.clone();
    }
    if runtime.host.driver != host.driver {
        warn!("driver changes take effect after restart");
        runtime.host.driver = host.driver;
    }
    if let Err(err) = runtime.climate.validate() {
        warn!("reloaded {err}");
    }

    let interval_changed = runtime.host.cycle_interval_ms != host.cycle_interval_ms;
    climate.update_climate_setting(runtime.climate);
    climate.update_controller_setting(runtime.controller);
    *host = runtime.host;
    info!(mode = host.mode.as_str(), "settings reloaded");
    interval_changed
}

fn open_driver(runtime: &RuntimeConfig) -> anyhow::Result<Box<dyn OutputDriver + Send>> {
    let pins = runtime.controller.pins.clone();
    let driver: Box<dyn OutputDriver + Send> = match runtime.host.driver {
        DriverKind::Simulated => Box::new(SimulatedOutputs::new(pins)),
        DriverKind::Sysfs => {
            let root = std::env::var("HVAC_SYSFS_ROOT")
                .unwrap_or_else(|_| DEFAULT_SYSFS_ROOT.to_string());
            Box::new(
                SysfsOutputs::open(&root, pins)
                    .with_context(|| format!("failed to open gpio lines under {root}"))?,
            )
        }
    };
    Ok(driver)
}

fn apply_env_overrides(host: &mut HostConfig) {
    if let Ok(value) = std::env::var("HVAC_MODE") {
        match hvac_common::ClimateMode::parse(&value) {
            Some(mode) => host.mode = mode,
            None => warn!("ignoring unknown HVAC_MODE {value:?}"),
        }
    }
    if let Ok(value) = std::env::var("HVAC_DRIVER") {
        match DriverKind::parse(&value) {
            Some(driver) => host.driver = driver,
            None => warn!("ignoring unknown HVAC_DRIVER {value:?}"),
        }
    }
}

fn spawn_shutdown_listener(shutdown_tx: watch::Sender<bool>) -> anyhow::Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!("ctrl-c listener failed: {err}");
                }
            }
            _ = terminate.recv() => {}
        }
        request_shutdown(&shutdown_tx);
    });
    Ok(())
}

fn request_shutdown(shutdown_tx: &watch::Sender<bool>) {
    if shutdown_tx.send(true).is_err() {
        debug!("control loop already gone, nothing to stop");
    }
}

fn cycle_interval(period_ms: u64) -> Interval {
    let mut interval = tokio::time::interval(Duration::from_millis(period_ms));
    // Cycles never overlap; a long settle plan just delays the next one.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
