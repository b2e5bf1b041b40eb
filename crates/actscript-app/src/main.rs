//! actscript binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialise tracing (RUST_LOG, else --log-level, else config)
//! 3. Build the input driver and focus control (real or mock)
//! 4. Feed stdin lines into the action environment and report status

mod cli;

use std::sync::Arc;
use std::time::Duration;

use actscript_core::config::ActscriptConfig;
use actscript_engine::{format_script, parse_and_validate, ActionEnvironment};
use actscript_input::{
    FocusControl, InputDriver, KeyBindings, MockFocus, MockInputDriver, WindowsFocus,
    WindowsInputDriver,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use cli::{CliArgs, Command};

/// How often the drain loop checks whether the queue has emptied.
const DRAIN_POLL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let mut config = ActscriptConfig::load_or_default(&config_file);

    // Logs go to stderr; stdout carries script and status output.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(path = %config_file.display(), "actscript v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Command::Check { script } => check(&config, &script),
        Command::Run {
            dry_run,
            status_interval_ms,
            mode,
        } => {
            if let Some(mode) = mode {
                config.engine.queue_mode = mode;
            }
            run(&config, dry_run, status_interval_ms).await
        }
    }
}

fn check(config: &ActscriptConfig, script: &str) -> Result<(), Box<dyn std::error::Error>> {
    let groups = parse_and_validate(script, config.engine.max_action_duration_secs)?;
    let total_secs: f64 = groups.iter().map(|g| g.estimated_duration_secs).sum();

    println!("{}", format_script(&groups));
    println!(
        "{} group(s), estimated {} ms",
        groups.len(),
        (total_secs * 1000.0).round() as u64
    );
    Ok(())
}

async fn run(
    config: &ActscriptConfig,
    dry_run: bool,
    status_interval_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mock = Arc::new(MockInputDriver::new());
    let (input, focus): (Arc<dyn InputDriver>, Arc<dyn FocusControl>) = if dry_run {
        tracing::info!("Dry run: inputs are recorded, not sent");
        (mock.clone(), Arc::new(MockFocus::default()))
    } else {
        let bindings = KeyBindings::from_config(&config.keys)?;
        (
            Arc::new(WindowsInputDriver::new(bindings)),
            Arc::new(WindowsFocus::new(config.target.window_title.clone())),
        )
    };

    let env = ActionEnvironment::new(config, input, focus);
    env.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_millis(status_interval_ms.max(1)));
    let reporting = status_interval_ms > 0;

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => submit(&env, &line),
                None => {
                    tracing::info!("Input closed, waiting for queued actions");
                    drain(&env).await;
                    break;
                }
            },
            _ = ticker.tick(), if reporting => {
                println!("{}", serde_json::to_string(&env.status())?);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    env.stop().await;
    println!("{}", serde_json::to_string(&env.status())?);
    if dry_run {
        tracing::info!(events = mock.events().len(), "Dry run finished");
    }
    Ok(())
}

fn submit(env: &ActionEnvironment, line: &str) {
    let script = line.trim();
    if script.is_empty() || script.starts_with('#') {
        return;
    }
    match env.add_commands(script) {
        Ok(groups) => tracing::debug!(groups, script, "Script accepted"),
        Err(e) if e.is_limit_exceeded() => {
            tracing::error!(error = %e, "Too many invalid scripts in a row")
        }
        Err(e) => tracing::warn!(error = %e, script, "Script rejected"),
    }
}

/// Wait until nothing is pending or running, or until Ctrl-C.
async fn drain(env: &ActionEnvironment) {
    loop {
        let status = env.status();
        if status.pending_count == 0 && status.running_count == 0 {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(DRAIN_POLL) => {}
            _ = tokio::signal::ctrl_c() => return,
        }
    }
}
