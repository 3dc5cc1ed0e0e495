//! The Interface Control Word: the scanner's per-line control/status
//! snapshot, visible to the (external) CPU emulator through the
//! `Eregs_Inp` register accessors.

/// Line-code definer: selects the framing discipline for a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCode {
    /// SDLC, code `8`.
    Sdlc8,
    /// SDLC, code `9`.
    Sdlc9,
    /// BSC/EBCDIC, code `C`.
    Bsc,
}

impl LineCode {
    /// The 4-bit `lcd` value as carried in the ICW.
    pub fn nibble(self) -> u8 {
        match self {
            Self::Sdlc8 => 0x8,
            Self::Sdlc9 => 0x9,
            Self::Bsc => 0xC,
        }
    }

    /// `true` for either SDLC line code.
    pub fn is_sdlc(self) -> bool {
        matches!(self, Self::Sdlc8 | Self::Sdlc9)
    }
}

/// Line turnaround tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Just adopted PCF 0; signals and framer state are being reset.
    Reset,
    /// Line is transmitting.
    Tx,
    /// Line is receiving.
    Rx,
}

/// Handshake flag for the parallel data field between scanner and NCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfReg {
    /// No byte is waiting to be consumed.
    Empty,
    /// A byte is waiting: the scanner (receive) or NCP (transmit) has
    /// placed a byte in `pdf` for the other side to take.
    Filled,
}

/// Secondary control flags (`scf`), packed as a byte on read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scf {
    /// A level-2 service request is pending for this line.
    pub service_request: bool,
    /// The framer observed a flag byte (`0x7E`) this cycle.
    pub flag_detected: bool,
    /// Data Carrier Detect, latched at the moment of observation.
    pub dcd: bool,
    /// Implementation-reserved check bits, carried through unmodified.
    pub check_bits: u8,
}

impl Scf {
    /// Pack into the byte layout the CPU emulator expects.
    pub fn pack(self) -> u8 {
        let mut b = self.check_bits & 0x1F;
        if self.service_request {
            b |= 0x80;
        }
        if self.flag_detected {
            b |= 0x40;
        }
        if self.dcd {
            b |= 0x20;
        }
        b
    }
}

/// The Interface Control Word for one line.
#[derive(Debug, Clone)]
pub struct Icw {
    /// Secondary control flags.
    pub scf: Scf,
    /// Parallel data field: the byte being transferred this scan cycle.
    pub pdf: u8,
    /// Line-code definer.
    pub lcd: LineCode,
    /// Primary control field: the automaton state, 0x0..=0xF.
    pub pcf: u8,
    /// Serial data field (includes the DTR bit, `0x08`).
    pub sdf: u8,
    /// Previously observed PCF, saved when a new one is adopted.
    pub pcf_prev: u8,
    /// Next PCF requested by the CPU (NCP); adopted at the top of a cycle.
    pub pcf_next: u8,
    /// Line turnaround state.
    pub lne_state: LineState,
    /// Handshake flag for `pdf`.
    pub pdf_reg: PdfReg,
    /// `true` while the scanner is mid-frame for transmit.
    pub sync: bool,
}

/// The `sdf` bit carrying the DTR request from the NCP.
pub const SDF_DTR: u8 = 0x08;

impl Icw {
    /// A freshly initialized ICW: PCF 0xE per the reference firmware's
    /// `Init_ICW`, not PCF 0 — the first adopted-PCF cycle immediately
    /// resets it to 0 since PCF 0xE is unused and falls through cleanly.
    pub fn new(lcd: LineCode) -> Self {
        Self {
            scf: Scf::default(),
            pdf: 0,
            lcd,
            pcf: 0xE,
            sdf: 0,
            pcf_prev: 0xE,
            pcf_next: 0,
            lne_state: LineState::Reset,
            pdf_reg: PdfReg::Empty,
            sync: false,
        }
    }

    /// `Eregs_Inp[0x44]` = `(scf << 8) | pdf`.
    pub fn reg_44(&self) -> u16 {
        (u16::from(self.scf.pack()) << 8) | u16::from(self.pdf)
    }

    /// `Eregs_Inp[0x45]` = `(lcd << 12) | (pcf << 8) | sdf`.
    pub fn reg_45(&self) -> u16 {
        (u16::from(self.lcd.nibble()) << 12) | (u16::from(self.pcf) << 8) | u16::from(self.sdf)
    }

    /// `Eregs_Inp[0x46]` = `((local_signals & 0xF0) | 0x02) << 8`. `local_signals`
    /// is the line's RS-232 signal byte (`SignalState::local`); the `0x02`
    /// low bit is a fixed marker this register always carries.
    pub fn reg_46(local_signals: u8) -> u16 {
        u16::from((local_signals & 0xF0) | 0x02) << 8
    }

    /// `Eregs_Inp[0x47]` = `Rflags`. This implementation tracks no status
    /// flags beyond `scf`, so `Rflags` is `scf` packed the same way as
    /// `reg_44`'s high byte.
    pub fn reg_47(&self) -> u16 {
        u16::from(self.scf.pack())
    }

    /// `abar_int` for this line: observable once a level-2 service request
    /// has been raised and the CPU is free to take it.
    pub fn abar_int(line: u16) -> u16 {
        line + 0x20
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scf_packs_bits_in_documented_positions() {
        let scf = Scf {
            service_request: true,
            flag_detected: false,
            dcd: true,
            check_bits: 0x03,
        };
        assert_eq!(scf.pack(), 0x80 | 0x20 | 0x03);
    }

    #[test]
    fn reg_44_combines_scf_and_pdf() {
        let mut icw = Icw::new(LineCode::Sdlc8);
        icw.scf.service_request = true;
        icw.pdf = 0xAB;
        assert_eq!(icw.reg_44(), (0x80u16 << 8) | 0xAB);
    }

    #[test]
    fn reg_45_combines_lcd_pcf_sdf() {
        let mut icw = Icw::new(LineCode::Bsc);
        icw.pcf = 0x7;
        icw.sdf = 0x08;
        assert_eq!(icw.reg_45(), (0xCu16 << 12) | (0x7 << 8) | 0x08);
    }

    #[test]
    fn reg_46_masks_and_marks_local_signals() {
        assert_eq!(Icw::reg_46(0b1010_1111), (0b1010_0000u16 | 0x02) << 8);
    }

    #[test]
    fn reg_47_mirrors_packed_scf() {
        let mut icw = Icw::new(LineCode::Sdlc8);
        icw.scf.flag_detected = true;
        assert_eq!(icw.reg_47(), u16::from(icw.scf.pack()));
    }

    #[test]
    fn abar_int_offsets_by_0x20() {
        assert_eq!(Icw::abar_int(20), 0x34);
    }

    #[test]
    fn new_icw_starts_at_pcf_e() {
        let icw = Icw::new(LineCode::Sdlc8);
        assert_eq!(icw.pcf, 0xE);
        assert_eq!(icw.pcf_prev, 0xE);
    }
}
