use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use motionlink::analysis::Axis;
use motionlink::control::{BatteryMonitor, ControlListener};
use motionlink::core::MeasurementMode;
use motionlink::hal::mock::{SimulatedDevice, SimulatedTransport};
use motionlink::session::{SensorConnectionManager, ShutdownTrigger};
use motionlink::telemetry::{TelemetryForwarder, UdpControlSource, UdpSink};
use motionlink::{logging, AcquisitionConfig};

const CONTROL_QUEUE: usize = 64;

#[derive(Parser, Debug)]
#[command(name = "motionlink")]
#[command(about = "Multi-sensor IMU acquisition with windowed variance features", long_about = None)]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Telemetry sink host
    #[arg(long)]
    ip: Option<String>,

    /// Telemetry sink port
    #[arg(long)]
    port: Option<u16>,

    /// Control channel port
    #[arg(long)]
    control_port: Option<u16>,

    /// Sensor address, repeat for each sensor
    #[arg(long = "sensor", value_name = "ADDRESS")]
    sensors: Vec<String>,

    /// Measurement mode (free_acceleration, rate_quantities, high_fidelity, ...)
    #[arg(long)]
    mode: Option<String>,

    /// Variance window size in samples
    #[arg(long)]
    window: Option<usize>,

    /// Stop after this many seconds (0 = until Ctrl-C)
    #[arg(long, value_name = "SECONDS", default_value = "0")]
    duration_secs: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

fn build_config(args: &Args) -> Result<AcquisitionConfig> {
    let mut config = match &args.config {
        Some(path) => AcquisitionConfig::load(path)?,
        None => AcquisitionConfig::default(),
    };

    if let Some(ip) = &args.ip {
        config.sink.host = ip.clone();
    }
    if let Some(port) = args.port {
        config.sink.port = port;
    }
    if let Some(port) = args.control_port {
        config.control.port = port;
    }
    if !args.sensors.is_empty() {
        config.sensors = args.sensors.clone();
    }
    if let Some(mode) = &args.mode {
        config.mode = serde_json::from_value::<MeasurementMode>(serde_json::Value::String(mode.clone()))
            .with_context(|| format!("Unknown measurement mode '{}'", mode))?;
    }
    if let Some(window) = args.window {
        config.window_size = window;
    }

    config.validate()?;
    Ok(config)
}

/// No BLE backend is bundled; every configured address is served by a
/// simulated sensor, each moving mostly along a different axis.
fn simulated_transport(config: &AcquisitionConfig) -> Arc<SimulatedTransport> {
    let transport = SimulatedTransport::new();
    for (i, address) in config.sensors.iter().enumerate() {
        let device = SimulatedDevice::new(format!("Xsens DOT {}", i + 1))
            .with_dominant_axis(Axis::ALL[i % Axis::ALL.len()]);
        transport.add_device(address.clone(), device);
    }
    Arc::new(transport)
}

/// Ctrl-C also cancels sensors that are still starting.
async fn trigger_on_ctrl_c(trigger: ShutdownTrigger) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => trigger.trigger(),
        Err(e) => {
            error!(error = %e, "failed to listen for Ctrl-C");
            trigger.trigger();
        }
    }
}

async fn wait_for_exit(duration_secs: u64, mut shutdown: watch::Receiver<bool>) {
    let interrupted = async {
        let _ = shutdown.wait_for(|stop| *stop).await;
    };
    if duration_secs == 0 {
        interrupted.await;
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(duration_secs)) => {}
        _ = interrupted => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log);

    let config = build_config(&args)?;
    let settings = config.session_settings()?;
    info!(
        sensors = config.sensors.len(),
        mode = ?settings.mode,
        layout = ?settings.layout,
        window = settings.window_size,
        "configuration loaded"
    );

    let sink = UdpSink::connect(&config.sink.host, config.sink.port).await?;
    let (forwarder, writer) = TelemetryForwarder::channel(config.queue_capacity);
    let writer_task = tokio::spawn(writer.run(Box::new(sink)));

    let transport = simulated_transport(&config);
    let mut manager = SensorConnectionManager::new(
        config.identities(),
        settings,
        config.retry.clone(),
        transport,
        forwarder.clone(),
    );

    let trigger = manager.shutdown_trigger();
    let interrupt_task = tokio::spawn(trigger_on_ctrl_c(trigger.clone()));

    let summary = manager.start_all().await?;
    info!("connection summary\n{}", summary);

    if trigger.is_triggered() {
        let shutdown = manager.shutdown(config.shutdown_grace()).await;
        info!("shutdown summary\n{}", shutdown);
        bail!("interrupted during sensor start");
    }

    if !summary.meets_quorum(config.min_connected) {
        let shutdown = manager.shutdown(config.shutdown_grace()).await;
        info!("shutdown summary\n{}", shutdown);
        bail!(
            "only {} of {} sensors connected, {} required",
            summary.connected_count(),
            summary.entries.len(),
            config.min_connected
        );
    }

    let registry = manager.registry();
    let battery = BatteryMonitor::new(registry.clone(), forwarder.clone(), config.battery_timeout());
    let battery_task = tokio::spawn(
        battery
            .clone()
            .run_periodic(config.battery_interval(), manager.shutdown_signal()),
    );

    let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE);
    let control_source = UdpControlSource::bind(&config.control.host, config.control.port).await?;
    info!(addr = %control_source.local_addr()?, "control channel listening");
    let source_task = tokio::spawn(control_source.run(control_tx, manager.shutdown_signal()));
    let listener = ControlListener::new(battery, registry, forwarder.clone());
    let listener_task = tokio::spawn(listener.run(control_rx, manager.shutdown_signal()));

    wait_for_exit(args.duration_secs, manager.shutdown_signal()).await;
    info!("stopping acquisition");

    let shutdown = manager.shutdown(config.shutdown_grace()).await;
    info!("shutdown summary\n{}", shutdown);
    if shutdown.forced_count() > 0 {
        warn!(forced = shutdown.forced_count(), "some sensors were forced to disconnect");
    }

    interrupt_task.abort();
    for task in [battery_task, source_task, listener_task] {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }

    // The writer drains once every forwarder handle is gone
    drop(forwarder);
    drop(manager);
    let stats = writer_task.await.context("Telemetry writer task failed")?;
    info!(
        batches = stats.batches,
        messages = stats.messages,
        failures = stats.failures,
        "telemetry writer finished"
    );
    Ok(())
}
