//! kstatsd - kernel statistics telemetry daemon.
//!
//! Periodically extracts hardware health counters from sysfs on three
//! cadences and listens for kernel uevents, emitting normalized
//! telemetry events through the tracing layer under the
//! `ks_core::sink` target.

use clap::Parser;
use ks_core::config::DaemonConfig;
use ks_core::logging::{self, LogFormat};
use ks_core::sched::Scheduler;
use ks_core::sink::LogSink;
use ks_core::source::SysfsSource;
use ks_core::{collect, Error};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Kernel statistics telemetry daemon
#[derive(Parser, Debug)]
#[command(name = "kstatsd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file; defaults apply when omitted
    #[arg(long, env = "KSTATSD_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directive (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Diagnostic log format: human or json
    #[arg(long, default_value = "human")]
    log_format: LogFormat,

    /// Override the configured startup settle delay, in seconds
    #[arg(long)]
    settle_secs: Option<u64>,

    /// Override the configured sysfs root prefix
    #[arg(long)]
    sysfs_root: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        // tracing may not be installed yet when this fires.
        eprintln!("kstatsd: fatal ({}): {e}", e.category());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> ks_core::Result<()> {
    logging::init(&cli.log_level, cli.log_format)?;

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::load(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(settle_secs) = cli.settle_secs {
        config.settle_secs = settle_secs;
    }
    if let Some(sysfs_root) = cli.sysfs_root {
        config.sysfs_root = sysfs_root;
    }

    info!(
        settle_secs = config.settle_secs,
        sysfs_root = %config.sysfs_root.display(),
        "starting"
    );

    spawn_uevent_listener(&config)?;

    // Let late-probing drivers finish creating their sysfs nodes before
    // the warm-up batches read them.
    std::thread::sleep(Duration::from_secs(config.settle_secs));

    let batches = collect::build_batches(&config);
    let source = SysfsSource::new(config.sysfs_root.clone());
    let mut timer = make_timer()?;
    Scheduler::new(Default::default(), batches).run(timer.as_mut(), &LogSink, &source)
}

#[cfg(target_os = "linux")]
fn make_timer() -> ks_core::Result<Box<dyn ks_core::sched::WakeTimer>> {
    use ks_core::sched::{BootTimer, BASE_TICK};
    Ok(Box::new(BootTimer::new(BASE_TICK)?))
}

#[cfg(not(target_os = "linux"))]
fn make_timer() -> ks_core::Result<Box<dyn ks_core::sched::WakeTimer>> {
    Err(Error::Config("this daemon requires a Linux kernel".into()))
}

/// Start the uevent listener on its own thread. The scheduler keeps
/// running if the listener later trips its breaker; hardware event
/// uevents are lost but cadence telemetry continues.
#[cfg(target_os = "linux")]
fn spawn_uevent_listener(config: &DaemonConfig) -> ks_core::Result<()> {
    use ks_core::uevent::{build_handlers, Listener, NetlinkUeventSocket, Router, UeventParser};

    let parser = UeventParser::new(config.uevent.typec_partner_prefix.clone());
    let router = Router::new(build_handlers(&config.uevent));
    let source = SysfsSource::new(config.sysfs_root.clone());

    std::thread::Builder::new()
        .name("uevent".into())
        .spawn(move || {
            let mut socket = match NetlinkUeventSocket::open() {
                Ok(socket) => socket,
                Err(e) => {
                    error!(error = %e, "cannot open uevent netlink socket");
                    return;
                }
            };
            let cx = ks_core::uevent::HandlerCx {
                sink: &LogSink,
                source: &source,
            };
            if let Err(e) = Listener::new(parser, router).run(&mut socket, &cx) {
                error!(category = %e.category(), error = %e, "uevent listener stopped");
            }
        })
        .map_err(|e| Error::Config(format!("cannot spawn uevent thread: {e}")))?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn spawn_uevent_listener(_config: &DaemonConfig) -> ks_core::Result<()> {
    Ok(())
}
