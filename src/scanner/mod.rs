//! The Communication Scanner Type 2: the cooperative PCF sweep across all
//! configured lines (§4.4, §5).

pub mod icw;
pub mod pcf;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::constants::SCANNER_CYCLE_DELAY;
use crate::line::Line;
use crate::sdlc::FrameAssembler;
use crate::trace::{self, OptionalTracer, CLASS_SCANNER, DIR_OUT};

/// A level-2 service event raised for one line this sweep.
#[derive(Debug, Clone, Copy)]
pub struct L2Event {
    pub line_index: u16,
}

/// Station identity used to answer SDLC XID Polls, as learned by the
/// DLSw engine from the peer's XID frame (§3, §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct StationIdentity {
    pub pu_type: u8,
    pub idblk: u16,
    pub idnum: u32,
}

/// Runs the cooperative scanner sweep over a fixed set of lines forever.
///
/// Each line keeps its own [`FrameAssembler`] (receive-side framing state
/// persists across cycles; it isn't part of the shared [`Line`] because
/// only the scanner ever touches it). `identity`/`lp_granted_units` are
/// shared, atomically-refreshed views into the DLSw circuit so the
/// scanner can answer RR/XID Polls without reaching across to the DLSw
/// worker on every cycle.
pub async fn run(
    lines: Vec<Arc<Line>>,
    identity: Arc<std::sync::Mutex<StationIdentity>>,
    lp_granted_units: Arc<std::sync::atomic::AtomicU32>,
    current_nr: Arc<std::sync::atomic::AtomicU8>,
    mut tracer: OptionalTracer,
    l2_tx: mpsc::UnboundedSender<L2Event>,
    sdlc_info_tx: mpsc::UnboundedSender<(u16, u8, u8, Vec<u8>)>,
) {
    let mut framers: Vec<FrameAssembler> = lines.iter().map(|_| FrameAssembler::new()).collect();

    loop {
        for (line, framer) in lines.iter().zip(framers.iter_mut()) {
            let mut icw = line.icw.lock().expect("icw mutex poisoned");
            let mut buffers = line.buffers.lock().expect("buffer mutex poisoned");
            let mut signal = line.signal.lock().expect("signal mutex poisoned");

            let id = *identity.lock().expect("identity mutex poisoned");
            let outcome = pcf::tick(
                &mut icw,
                &mut buffers,
                &mut signal,
                framer,
                (id.pu_type, id.idblk, id.idnum),
                lp_granted_units.load(std::sync::atomic::Ordering::Relaxed),
                current_nr.load(std::sync::atomic::Ordering::Relaxed),
            );

            if let Some(bytes) = outcome.response {
                let preview = hex_preview(&bytes);
                drop(icw);
                drop(buffers);
                drop(signal);
                trace::trace(&mut tracer, CLASS_SCANNER, line.index, DIR_OUT, &preview);
                line.send_data(bytes);
            }

            if let Some((ns, nr, payload)) = outcome.sdlc_info {
                let _ = sdlc_info_tx.send((line.index, ns, nr, payload));
            }

            if outcome.l2_raised {
                let _ = l2_tx.send(L2Event { line_index: line.index });
            }
        }

        tokio::time::sleep(SCANNER_CYCLE_DELAY).await;
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ")
}
