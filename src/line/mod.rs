//! The LIB (Line Interface Base) model: one [`Line`] per configured serial
//! line, shared between the transport accept loop and the scanner worker.

pub mod buffers;
pub mod signal;
pub mod transport;

use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::scanner::icw::{Icw, LineCode};
use buffers::LineBuffers;
use signal::SignalState;

/// Shared per-line state. Transport tasks and the scanner worker each hold
/// an `Arc<Line>` and communicate purely through the guarded fields below —
/// there is no message passing between them for the hot path, matching the
/// reference firmware's model of a scanner polling shared line registers.
#[derive(Debug)]
pub struct Line {
    /// 1-based line number, as used in trace output and port derivation.
    pub index: u16,
    /// TCP port this line's transport listens on.
    pub port: u16,
    /// The Interface Control Word: PCF/SCF/SDF register state.
    pub icw: Mutex<Icw>,
    /// Receive/transmit byte queues.
    pub buffers: Mutex<LineBuffers>,
    /// RS-232 signal register pair.
    pub signal: Mutex<SignalState>,
    /// `true` while both the data and signal channels are connected.
    pub connected: AtomicBool,
    /// Outbound data-channel sender for the current connection, if any.
    /// `None` while disconnected; writes attempted during that window are
    /// simply dropped, matching a line with DTR/DCD down.
    pub data_out: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl Line {
    /// A freshly constructed, disconnected line.
    pub fn new(index: u16, port: u16, lcd: LineCode) -> Self {
        Self {
            index,
            port,
            icw: Mutex::new(Icw::new(lcd)),
            buffers: Mutex::new(LineBuffers::new()),
            signal: Mutex::new(SignalState::new()),
            connected: AtomicBool::new(false),
            data_out: Mutex::new(None),
        }
    }

    /// Queue bytes for transmission on the data channel. A no-op while the
    /// line is disconnected.
    pub fn send_data(&self, bytes: Vec<u8>) {
        if let Some(tx) = self.data_out.lock().expect("data_out mutex poisoned").as_ref() {
            let _ = tx.send(bytes);
        }
    }

    /// `true` once both channels of the pair are up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_line_starts_disconnected_with_reset_icw() {
        let line = Line::new(1, 37501, LineCode::Sdlc8);
        assert!(!line.is_connected());
        assert_eq!(line.icw.lock().unwrap().pcf, 0xE);
    }

    #[test]
    fn send_data_while_disconnected_is_a_noop() {
        let line = Line::new(1, 37501, LineCode::Sdlc8);
        line.send_data(vec![0x7E]);
    }
}
