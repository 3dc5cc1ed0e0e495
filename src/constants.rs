//! Application-wide constants for the bridge daemons.
//!
//! Centralizes the magic numbers taken from the reference 3705 firmware
//! behavior so they are documented once instead of scattered through the
//! scanner, LIB and DLSw modules.
//!
//! # Categories
//!
//! - **Ports**: TCP listen/connect port derivation
//! - **Timing**: scanner cycle cadence, DLSw poll interval
//! - **Keepalive**: TCP keepalive tuning matching the original LIB sockets
//! - **RS-232 signal bits**: the 6-bit signal register layout

use std::time::Duration;

// ============================================================================
// Ports
// ============================================================================

/// Base offset added to a line number to derive its TCP listen port.
///
/// TCP listen port for line `n` is `LINE_PORT_BASE + liblbase + n`.
pub const LINE_PORT_BASE: u16 = 37500;

/// Default DLSw peer port (listen and connect), per RFC 1795.
pub const DLSW_PORT: u16 = 2065;

// ============================================================================
// Timing
// ============================================================================

/// Inter-cycle delay of the scanner's cooperative sweep across all lines.
pub const SCANNER_CYCLE_DELAY: Duration = Duration::from_micros(500);

/// Busy-wait granularity while the scanner waits for the CPU to clear a
/// pending level-2 service request.
pub const L2_WAIT_POLL: Duration = Duration::from_millis(1);

/// Poll granularity for flushing a changed outbound RS-232 signal byte to
/// the signal channel.
pub const SIGNAL_WRITE_POLL: Duration = Duration::from_millis(1);

/// DLSw worker's poll interval for new connections / readable bytes.
pub const DLSW_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Null Modem's poll interval between relay cycles (kept equal to the DLSw
/// engine's for a consistent bridging cadence).
pub const NULLMODEM_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reconnect backoff for a Null Modem side whose pair has dropped.
pub const RECONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Keepalive
// ============================================================================

/// TCP keepalive idle time before the first probe.
pub const KEEPALIVE_IDLE: Duration = Duration::from_secs(5);

/// TCP keepalive probe interval.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(3);

/// TCP keepalive probe count before the connection is considered dead.
pub const KEEPALIVE_RETRIES: u32 = 3;

// ============================================================================
// Buffers
// ============================================================================

/// Bound on a line's receive/transmit buffers.
pub const LINE_BUFFER_CAP: usize = 16 * 1024;

// ============================================================================
// RS-232 signal bits (local_signals / remote_signals)
// ============================================================================

/// Clear To Send.
pub const SIG_CTS: u8 = 0x80;
/// Ring Indicator.
pub const SIG_RI: u8 = 0x40;
/// Data Set Ready.
pub const SIG_DSR: u8 = 0x20;
/// Data Carrier Detect.
pub const SIG_DCD: u8 = 0x10;
/// Request To Send.
pub const SIG_RTS: u8 = 0x08;
/// Data Terminal Ready.
pub const SIG_DTR: u8 = 0x04;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_values_are_sane() {
        assert!(SCANNER_CYCLE_DELAY < Duration::from_millis(1));
        assert!(DLSW_POLL_INTERVAL <= Duration::from_millis(100));
    }

    #[test]
    fn signal_bits_are_distinct() {
        let bits = [SIG_CTS, SIG_RI, SIG_DSR, SIG_DCD, SIG_RTS, SIG_DTR];
        for (i, a) in bits.iter().enumerate() {
            for (j, b) in bits.iter().enumerate() {
                if i != j {
                    assert_eq!(a & b, 0, "signal bits must not overlap");
                }
            }
        }
    }
}
