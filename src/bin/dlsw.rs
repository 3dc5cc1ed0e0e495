//! `dlsw` — bridges one emulated IBM 3705 SDLC line to a remote DLSw peer.
//!
//! Runs the LIB transport, the scanner's PCF sweep, and the DLSw worker as
//! sibling tasks of one process (§5), all sharing one [`Line`].

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8};
use std::sync::{Arc, LazyLock, Mutex};

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use tokio::sync::mpsc;

use ibm3705_bridge::config::{resolve_endpoint, DlswConfig};
use ibm3705_bridge::constants::LINE_PORT_BASE;
use ibm3705_bridge::dlsw;
use ibm3705_bridge::line::transport;
use ibm3705_bridge::scanner::{self, icw::LineCode, StationIdentity};
use ibm3705_bridge::trace::Tracer;
use ibm3705_bridge::Line;

/// mimalloc gives better multi-threaded allocation performance than the
/// system allocator under the scanner's tight polling loop.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Set by the SIGINT/SIGTERM/SIGHUP handlers; polled by `main`'s shutdown loop.
static SHUTDOWN: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Bridges one 3705 SDLC line to a remote DLSw peer (RFC 1795).
#[derive(Parser, Debug)]
#[command(name = "dlsw", about = "DLSw <-> LIB bridge for one emulated 3705 SDLC line")]
struct Cli {
    /// Remote DLSw peer hostname.
    #[arg(long = "peerhn", conflicts_with = "peerip")]
    peerhn: Option<String>,
    /// Remote DLSw peer IPv4 address.
    #[arg(long = "peerip", conflicts_with = "peerhn")]
    peerip: Option<IpAddr>,

    /// Hostname of the host running the 3705 SDLC line.
    #[arg(long = "cchn", conflicts_with = "ccip")]
    cchn: Option<String>,
    /// IPv4 address of the host running the 3705 SDLC line.
    #[arg(long = "ccip", conflicts_with = "cchn")]
    ccip: Option<IpAddr>,

    /// SDLC line number on the 3705.
    #[arg(long = "line", default_value_t = 20)]
    line: u16,

    /// Enable trace to `trace_DLSw.log`.
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let peer = resolve_endpoint(cli.peerhn, cli.peerip)?;
    let controller = resolve_endpoint(cli.cchn, cli.ccip)?;
    let config = DlswConfig { peer, controller, line: cli.line, debug: cli.debug };

    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;
    flag::register(SIGINT, Arc::clone(&SHUTDOWN))?;
    flag::register(SIGTERM, Arc::clone(&SHUTDOWN))?;
    flag::register(SIGHUP, Arc::clone(&SHUTDOWN))?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))
}

async fn run(config: DlswConfig) -> Result<()> {
    let tracer = if config.debug { Some(Tracer::open("trace_DLSw.log")?) } else { None };

    log::info!(
        "dlsw: bridging line {} on {} to peer {}",
        config.line,
        config.controller.host_str(),
        config.peer.host_str()
    );

    let port = LINE_PORT_BASE + config.line;
    let line = Arc::new(Line::new(config.line, port, LineCode::Sdlc8));

    let identity = Arc::new(Mutex::new(StationIdentity::default()));
    let lp_granted_units = Arc::new(AtomicU32::new(0));
    let current_nr = Arc::new(AtomicU8::new(0));

    let (transport_event_tx, mut transport_event_rx) = mpsc::unbounded_channel();
    let (l2_tx, mut l2_rx) = mpsc::unbounded_channel();
    let (sdlc_info_tx, sdlc_info_rx) = mpsc::unbounded_channel();

    tokio::spawn(transport::run(Arc::clone(&line), transport_event_tx));
    tokio::spawn(async move {
        while let Some((idx, event)) = transport_event_rx.recv().await {
            log::debug!("line {idx}: transport event {event:?}");
        }
    });
    tokio::spawn(async move {
        while let Some(event) = l2_rx.recv().await {
            log::trace!("line {}: level-2 service event", event.line_index);
        }
    });
    tokio::spawn(scanner::run(
        vec![Arc::clone(&line)],
        Arc::clone(&identity),
        Arc::clone(&lp_granted_units),
        Arc::clone(&current_nr),
        tracer.clone(),
        l2_tx,
        sdlc_info_tx,
    ));
    let dlsw_task = tokio::spawn(dlsw::run(
        config,
        Arc::clone(&line),
        identity,
        lp_granted_units,
        current_nr,
        sdlc_info_rx,
        tracer,
    ));

    let mut dlsw_task = dlsw_task;
    let mut shutdown_poll = tokio::time::interval(std::time::Duration::from_millis(200));
    loop {
        tokio::select! {
            _ = shutdown_poll.tick() => {
                if SHUTDOWN.load(std::sync::atomic::Ordering::Relaxed) {
                    log::info!("dlsw: shutdown signal received, exiting");
                    return Ok(());
                }
            }
            result = &mut dlsw_task => {
                return result.map_err(anyhow::Error::from).and_then(|r| r);
            }
        }
    }
}
