//! Byte-at-a-time frame boundary detection for PCF 6/7 (receive states).
//!
//! Idle flag bytes (`0x7E`) are consumed without being buffered; a flag
//! byte immediately following the literal trailer `47 0F` closes the frame.

use super::{FLAG, TRAILER};

/// Accumulates SDLC frame bytes as they arrive from the line, yielding a
/// complete `addr | control | payload` frame (trailer stripped) once the
/// `47 0F 7E` sequence is observed.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: Vec<u8>,
}

impl FrameAssembler {
    /// A fresh assembler with no bytes accumulated.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one received byte. Returns the completed frame (address,
    /// control, and payload bytes — flag and trailer stripped) once a
    /// flag closes a non-empty, properly trailed buffer.
    pub fn feed(&mut self, byte: u8) -> Option<Vec<u8>> {
        if byte == FLAG {
            let closes_frame = self.buf.len() >= 2
                && self.buf[self.buf.len() - 2] == TRAILER[0]
                && self.buf[self.buf.len() - 1] == TRAILER[1];
            if closes_frame {
                let mut frame = std::mem::take(&mut self.buf);
                frame.truncate(frame.len() - TRAILER.len());
                return Some(frame);
            }
            // Idle fill flag, or a malformed frame abandoned mid-stream;
            // either way the buffer restarts here.
            self.buf.clear();
            return None;
        }
        self.buf.push(byte);
        None
    }

    /// Discard any partially accumulated frame.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(assembler: &mut FrameAssembler, bytes: &[u8]) -> Option<Vec<u8>> {
        let mut result = None;
        for &b in bytes {
            if let Some(frame) = assembler.feed(b) {
                result = Some(frame);
            }
        }
        result
    }

    #[test]
    fn closes_frame_on_trailer_flag() {
        let mut a = FrameAssembler::new();
        let frame = feed_all(&mut a, &[0xC1, 0x11, 0x47, 0x0F, 0x7E]);
        assert_eq!(frame, Some(vec![0xC1, 0x11]));
    }

    #[test]
    fn leading_idle_flags_are_ignored() {
        let mut a = FrameAssembler::new();
        assert_eq!(a.feed(FLAG), None);
        assert_eq!(a.feed(FLAG), None);
        let frame = feed_all(&mut a, &[0xC1, 0x11, 0x47, 0x0F, 0x7E]);
        assert_eq!(frame, Some(vec![0xC1, 0x11]));
    }

    #[test]
    fn a_bare_flag_with_no_trailer_yields_nothing_and_resets() {
        let mut a = FrameAssembler::new();
        a.feed(0xC1);
        a.feed(0x11);
        assert_eq!(a.feed(FLAG), None);
        let frame = feed_all(&mut a, &[0xC1, 0x11, 0x47, 0x0F, 0x7E]);
        assert_eq!(frame, Some(vec![0xC1, 0x11]));
    }
}
