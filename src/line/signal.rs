//! RS-232 signal model: the causal rules deriving DCE-side signal state
//! from connection events and peer-asserted signals.

use crate::constants::{SIG_CTS, SIG_DCD, SIG_DSR, SIG_DTR, SIG_RI, SIG_RTS};

/// Per-line RS-232 signal register pair.
///
/// `local` is what the 3705-as-DCE presents to the scanner. `remote` is
/// the byte we assert to the peer over the signal channel; it is only
/// re-transmitted when it changes (`take_remote_update`).
#[derive(Debug, Clone, Default)]
pub struct SignalState {
    local: u8,
    remote: u8,
    remote_dirty: bool,
}

impl SignalState {
    /// A freshly constructed, all-clear signal state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current local signal byte, as read by the scanner / ICW register 0x46.
    pub fn local(&self) -> u8 {
        self.local
    }

    /// Take the pending remote-signal update, if the remote byte changed
    /// since the last call. `None` means nothing needs to be sent.
    pub fn take_remote_update(&mut self) -> Option<u8> {
        if self.remote_dirty {
            self.remote_dirty = false;
            Some(self.remote)
        } else {
            None
        }
    }

    fn set_remote(&mut self, bits: u8, asserted: bool) {
        let updated = if asserted {
            self.remote | bits
        } else {
            self.remote & !bits
        };
        if updated != self.remote {
            self.remote = updated;
            self.remote_dirty = true;
        }
    }

    /// The signal channel for this line was just accepted.
    pub fn signal_channel_accepted(&mut self) {
        self.local |= SIG_DCD | SIG_RI;
    }

    /// The data connection for this line was lost.
    pub fn data_connection_lost(&mut self) {
        self.local &= !(SIG_DCD | SIG_DSR | SIG_RI);
    }

    /// NCP set DTR via `ICW.sdf` bit `0x08`.
    pub fn ncp_set_dtr(&mut self) {
        self.local |= SIG_DTR | SIG_DSR;
    }

    /// NCP cleared DTR.
    pub fn ncp_clear_dtr(&mut self) {
        self.local &= !(SIG_DTR | SIG_DSR | SIG_RTS);
        self.set_remote(SIG_CTS, false);
    }

    /// NCP requested transmit (scanner entering PCF 8): raise RTS locally
    /// and propagate it to the remote peer.
    pub fn ncp_set_rts(&mut self) {
        self.local |= SIG_RTS;
        self.set_remote(SIG_RTS, true);
    }

    /// NCP released transmit: drop RTS locally and propagate the drop to
    /// the remote peer, leaving DTR/DSR untouched.
    pub fn ncp_drop_rts(&mut self) {
        self.local &= !SIG_RTS;
        self.set_remote(SIG_RTS, false);
    }

    /// Apply a signal byte received from the remote peer. `incoming` is
    /// already coalesced to the last byte read this cycle; `rx_buf_empty`
    /// gates the RTS→CTS handshake reply.
    pub fn on_remote_signal(&mut self, incoming: u8, rx_buf_empty: bool) {
        if incoming & SIG_RTS != 0 && self.local & SIG_DTR != 0 && rx_buf_empty {
            self.set_remote(SIG_CTS, true);
        }
        if incoming & SIG_CTS != 0 {
            self.local |= SIG_CTS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_channel_accepted_sets_dcd_and_ri() {
        let mut s = SignalState::new();
        s.signal_channel_accepted();
        assert_eq!(s.local(), SIG_DCD | SIG_RI);
    }

    #[test]
    fn data_connection_lost_clears_dcd_dsr_ri_only() {
        let mut s = SignalState::new();
        s.signal_channel_accepted();
        s.ncp_set_dtr();
        s.data_connection_lost();
        assert_eq!(s.local() & (SIG_DCD | SIG_DSR | SIG_RI), 0);
        assert_eq!(s.local() & SIG_DTR, SIG_DTR);
    }

    #[test]
    fn ncp_set_rts_propagates_to_remote() {
        let mut s = SignalState::new();
        s.ncp_set_rts();
        assert_eq!(s.local() & SIG_RTS, SIG_RTS);
        assert_eq!(s.take_remote_update(), Some(SIG_RTS));
        assert_eq!(s.take_remote_update(), None);
    }

    #[test]
    fn remote_rts_with_dtr_and_empty_rx_replies_cts() {
        let mut s = SignalState::new();
        s.ncp_set_dtr();
        s.take_remote_update();
        s.on_remote_signal(SIG_RTS, true);
        assert_eq!(s.take_remote_update(), Some(SIG_CTS));
    }

    #[test]
    fn remote_rts_without_dtr_does_not_reply() {
        let mut s = SignalState::new();
        s.on_remote_signal(SIG_RTS, true);
        assert_eq!(s.take_remote_update(), None);
    }

    #[test]
    fn ncp_drop_rts_clears_only_rts_and_propagates() {
        let mut s = SignalState::new();
        s.ncp_set_dtr();
        s.ncp_set_rts();
        s.take_remote_update();

        s.ncp_drop_rts();
        assert_eq!(s.local() & SIG_RTS, 0);
        assert_eq!(s.local() & (SIG_DTR | SIG_DSR), SIG_DTR | SIG_DSR);
        assert_eq!(s.take_remote_update(), Some(0));
    }

    #[test]
    fn remote_cts_sets_local_cts() {
        let mut s = SignalState::new();
        s.on_remote_signal(SIG_CTS, false);
        assert_eq!(s.local() & SIG_CTS, SIG_CTS);
    }

    #[test]
    fn ncp_clear_dtr_drops_local_bits_and_remote_cts() {
        let mut s = SignalState::new();
        s.ncp_set_dtr();
        s.on_remote_signal(SIG_RTS, true);
        assert_eq!(s.take_remote_update(), Some(SIG_CTS));

        s.ncp_clear_dtr();
        assert_eq!(s.local() & (SIG_DTR | SIG_DSR | SIG_RTS), 0);
        assert_eq!(s.take_remote_update(), Some(0));
    }
}
