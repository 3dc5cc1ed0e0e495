//! DLSw header encode/decode (RFC 1795 §5.2): the 72-byte control header
//! and 16-byte info header, at the fixed offsets this implementation uses.

/// Length of a control-message header.
pub const CONTROL_HEADER_LEN: usize = 72;
/// Length of an info-message header (`INFOFRAME`).
pub const INFO_HEADER_LEN: usize = 16;
/// The only header version this implementation speaks.
pub const VERSION: u8 = 0x31;

/// Frame direction: request travelling from the originator to the target.
pub const DIR_ORIGIN_TO_TARGET: u8 = 0x01;
/// Frame direction: response travelling from the target back to the originator.
pub const DIR_TARGET_TO_ORIGIN: u8 = 0x02;

/// Explorer bit within the SSP flags byte (offset `0x15`).
pub const SSP_EXPLORER: u8 = 0x80;

/// The fields of a DLSw header this implementation actually reads or
/// writes. Every other byte in the 72/16-byte header is reserved and
/// encoded as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Header {
    pub header_length: u8,
    pub message_length: u16,
    pub remote_dlc_correlator: u32,
    pub remote_dlc_port_id: u32,
    pub message_type: u8,
    pub flow_control: u8,
    pub ssp_flags: u8,
    pub frame_direction: u8,
    pub origin_dlc_port_id: u32,
    pub origin_dlc_correlator: u32,
}

impl Header {
    /// A control-sized (72-byte) header for `message_type`, otherwise zeroed.
    pub fn control(message_type: u8) -> Self {
        Self { header_length: CONTROL_HEADER_LEN as u8, message_type, ..Default::default() }
    }

    /// An info-sized (16-byte) header for an `INFOFRAME`.
    pub fn info() -> Self {
        Self { header_length: INFO_HEADER_LEN as u8, ..Default::default() }
    }

    /// Encode to `header_length` bytes, zero-padded at reserved offsets.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.header_length as usize];
        buf[0x00] = VERSION;
        buf[0x01] = self.header_length;
        buf[0x02..0x04].copy_from_slice(&self.message_length.to_be_bytes());
        buf[0x04..0x08].copy_from_slice(&self.remote_dlc_correlator.to_be_bytes());
        buf[0x08..0x0C].copy_from_slice(&self.remote_dlc_port_id.to_be_bytes());
        if buf.len() > 0x0E {
            buf[0x0E] = self.message_type;
        }
        if buf.len() > 0x0F {
            buf[0x0F] = self.flow_control;
        }
        if buf.len() > 0x15 {
            buf[0x15] = self.ssp_flags;
        }
        if buf.len() > 0x26 {
            buf[0x26] = self.frame_direction;
            buf[0x2C..0x30].copy_from_slice(&self.origin_dlc_port_id.to_be_bytes());
            buf[0x30..0x34].copy_from_slice(&self.origin_dlc_correlator.to_be_bytes());
        }
        buf
    }

    /// Decode a header from its leading bytes. Returns `None` if `buf` is
    /// too short to hold the fields this implementation uses.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < 0x0C {
            return None;
        }
        let header_length = buf[0x01];
        let message_length = u16::from_be_bytes([buf[0x02], buf[0x03]]);
        let remote_dlc_correlator = u32::from_be_bytes(buf[0x04..0x08].try_into().ok()?);
        let remote_dlc_port_id = u32::from_be_bytes(buf[0x08..0x0C].try_into().ok()?);

        let message_type = buf.get(0x0E).copied().unwrap_or(0);
        let flow_control = buf.get(0x0F).copied().unwrap_or(0);
        let ssp_flags = buf.get(0x15).copied().unwrap_or(0);

        let (frame_direction, origin_dlc_port_id, origin_dlc_correlator) = if buf.len() >= 0x34 {
            (
                buf[0x26],
                u32::from_be_bytes(buf[0x2C..0x30].try_into().ok()?),
                u32::from_be_bytes(buf[0x30..0x34].try_into().ok()?),
            )
        } else {
            (0, 0, 0)
        };

        Some(Self {
            header_length,
            message_length,
            remote_dlc_correlator,
            remote_dlc_port_id,
            message_type,
            flow_control,
            ssp_flags,
            frame_direction,
            origin_dlc_port_id,
            origin_dlc_correlator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_header_round_trips() {
        let header = Header {
            header_length: CONTROL_HEADER_LEN as u8,
            message_length: 10,
            remote_dlc_correlator: 0x0102_0304,
            remote_dlc_port_id: 0x0A0B_0C0D,
            message_type: 0x03,
            flow_control: 0x80,
            ssp_flags: SSP_EXPLORER,
            frame_direction: DIR_ORIGIN_TO_TARGET,
            origin_dlc_port_id: 0x1111_2222,
            origin_dlc_correlator: 0x3333_4444,
        };
        let encoded = header.encode();
        assert_eq!(encoded.len(), CONTROL_HEADER_LEN);
        assert_eq!(encoded[0], VERSION);
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn info_header_is_sixteen_bytes() {
        let header = Header { message_length: 4, ..Header::info() };
        let encoded = header.encode();
        assert_eq!(encoded.len(), INFO_HEADER_LEN);
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(decoded.message_length, 4);
    }
}
