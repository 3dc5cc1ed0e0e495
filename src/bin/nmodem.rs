//! `nmodem` — transparently bridges two emulated IBM 3705 SDLC lines to
//! each other, dialing out to both as a client (§4.6).

use std::net::IpAddr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;

use ibm3705_bridge::config::{resolve_endpoint, NullModemConfig};
use ibm3705_bridge::nullmodem;
use ibm3705_bridge::trace::Tracer;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Set by the SIGINT/SIGTERM/SIGHUP handlers; polled by `main`'s shutdown loop.
static SHUTDOWN: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Bridges two 3705 SDLC lines to each other, verbatim.
#[derive(Parser, Debug)]
#[command(name = "nmodem", about = "Transparent relay between two emulated 3705 SDLC lines")]
struct Cli {
    /// Hostname of the host running the first 3705's SDLC line.
    #[arg(long = "cchn1", conflicts_with = "ccip1")]
    cchn1: Option<String>,
    /// IPv4 address of the host running the first 3705's SDLC line.
    #[arg(long = "ccip1", conflicts_with = "cchn1")]
    ccip1: Option<IpAddr>,
    /// Line number on the first 3705.
    #[arg(long = "line1")]
    line1: u16,

    /// Hostname of the host running the second 3705's SDLC line.
    #[arg(long = "cchn2", conflicts_with = "ccip2")]
    cchn2: Option<String>,
    /// IPv4 address of the host running the second 3705's SDLC line.
    #[arg(long = "ccip2", conflicts_with = "cchn2")]
    ccip2: Option<IpAddr>,
    /// Line number on the second 3705.
    #[arg(long = "line2")]
    line2: u16,

    /// Enable trace to `trace_NModem.log`.
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let controller1 = resolve_endpoint(cli.cchn1, cli.ccip1)?;
    let controller2 = resolve_endpoint(cli.cchn2, cli.ccip2)?;
    let config = NullModemConfig {
        controller1,
        controller2,
        line1: cli.line1,
        line2: cli.line2,
        debug: cli.debug,
    };

    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;
    flag::register(SIGINT, Arc::clone(&SHUTDOWN))?;
    flag::register(SIGTERM, Arc::clone(&SHUTDOWN))?;
    flag::register(SIGHUP, Arc::clone(&SHUTDOWN))?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))
}

async fn run(config: NullModemConfig) -> Result<()> {
    let tracer = if config.debug { Some(Tracer::open("trace_NModem.log")?) } else { None };

    let mut relay_task = tokio::spawn(nullmodem::run(config, tracer));

    let mut shutdown_poll = tokio::time::interval(std::time::Duration::from_millis(200));
    loop {
        tokio::select! {
            _ = shutdown_poll.tick() => {
                if SHUTDOWN.load(std::sync::atomic::Ordering::Relaxed) {
                    log::info!("nmodem: shutdown signal received, exiting");
                    return Ok(());
                }
            }
            result = &mut relay_task => {
                return result.map_err(anyhow::Error::from).and_then(|r| r);
            }
        }
    }
}
