//! # Servo Control Unit
//!
//! Loads the TOML configuration, creates the PWM backend, optionally merges
//! a project file, and runs the tick loop until SIGINT/SIGTERM. Outputs are
//! released on the way out.

use clap::Parser;
use servo_common::config::LogLevel;
use servo_common::consts::DEFAULT_CONFIG_PATH;
use servo_common::engine::config::OutputMode;
use servo_control_unit::config::{LoadedConfig, load_config};
use servo_control_unit::cycle::TickRunner;
use servo_control_unit::engine::Engine;
use servo_control_unit::output::OutputStage;
use servo_control_unit::store;
use servo_hal::{DriverRegistry, register_all_drivers};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Servo Control Unit: fixed-tick servo orchestration
#[derive(Parser, Debug)]
#[command(name = "servo_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Fixed-tick orchestration engine for PWM servos")]
struct Args {
    /// Path to the configuration TOML.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// PWM backend name; overrides `[engine] driver`.
    #[arg(long)]
    driver: Option<String>,

    /// Project JSON merged into the engine at startup.
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Print the preflight report as JSON and exit.
    #[arg(long)]
    preflight: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    // Read before tracing starts so `[shared] log_level` applies; a load
    // failure is reported once tracing is up.
    let loaded = load_config(&args.config);
    let level = loaded
        .as_ref()
        .map_or(LogLevel::Info, |l| l.config.shared.log_level);
    setup_tracing(&args, level);

    info!("Servo Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = loaded
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|loaded| run(&args, loaded));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Servo Control Unit shutdown complete");
}

fn run(args: &Args, loaded: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    let LoadedConfig { config, library } = loaded;
    info!(
        "Config OK: service '{}', tick {} Hz, {} servo(s), log level {}",
        config.shared.service_name,
        config.engine.tick_hz,
        config.servos.len(),
        config.shared.log_level.as_directive()
    );

    let mut drivers = DriverRegistry::new();
    register_all_drivers(&mut drivers);
    let driver = args.driver.as_deref().unwrap_or(&config.engine.driver);
    let backend = drivers.create_driver(driver)?;
    let output = match config.engine.output_mode {
        OutputMode::Inline => OutputStage::inline(backend),
        OutputMode::Offloaded => OutputStage::offloaded(backend)?,
    };

    let now = Instant::now();
    let mut engine = Engine::from_config(&config, library, output, now)?;
    if let Some(path) = &args.store {
        engine.apply_project(store::load(path)?)?;
    }

    if args.preflight {
        let report = engine.preflight();
        println!("{}", serde_json::to_string_pretty(&report)?);
        engine.shutdown();
        return Ok(());
    }

    let mut runner = TickRunner::new(engine, config.engine.queue_capacity, config.engine.period());

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    runner.run(&running);
    Ok(())
}

fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
