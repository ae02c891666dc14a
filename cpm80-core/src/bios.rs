//! BIOS entry point naming and the guest memory map.
//!
//! CP/M reaches its BIOS through a jump table of 3-byte entries. The
//! harness plants a RET at each entry, arms it as a breakpoint, and
//! dispatches on [`BiosCall`] when the guest lands there.

/// The 17 canonical CBIOS entry points, in jump-table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BiosCall {
    /// 0: Cold boot entry.
    Boot,
    /// 1: Warm boot - reload CCP and restart it.
    WBoot,
    /// 2: Console status.
    ConStatus,
    /// 3: Console input (blocking).
    ConIn,
    /// 4: Console output.
    ConOut,
    /// 5: List device output.
    List,
    /// 6: Punch device output.
    Punch,
    /// 7: Reader device input.
    Reader,
    /// 8: Seek to track 0.
    Home,
    /// 9: Select disk drive.
    SelDsk,
    /// 10: Set track number.
    SetTrk,
    /// 11: Set sector number.
    SetSec,
    /// 12: Set DMA address.
    SetDma,
    /// 13: Read the selected sector.
    Read,
    /// 14: Write the selected sector.
    Write,
    /// 15: List device status.
    ListStatus,
    /// 16: Logical-to-physical sector translation.
    SecTran,
}

impl BiosCall {
    /// Jump-table order; entry `i` lives at `BIOS + 3*i`.
    pub const TABLE: [BiosCall; 17] = [
        BiosCall::Boot,
        BiosCall::WBoot,
        BiosCall::ConStatus,
        BiosCall::ConIn,
        BiosCall::ConOut,
        BiosCall::List,
        BiosCall::Punch,
        BiosCall::Reader,
        BiosCall::Home,
        BiosCall::SelDsk,
        BiosCall::SetTrk,
        BiosCall::SetSec,
        BiosCall::SetDma,
        BiosCall::Read,
        BiosCall::Write,
        BiosCall::ListStatus,
        BiosCall::SecTran,
    ];

    /// Guest address of this entry's jump-table slot.
    pub fn vector(self) -> u16 {
        addr::BIOS + self as u16 * 3
    }
}

/// Memory addresses for the CP/M system.
pub mod addr {
    /// Transient Program Area - where .COM files load.
    pub const TPA: u16 = 0x0100;
    /// Console Command Processor image.
    pub const CCP: u16 = 0xE400;
    /// BDOS image base.
    pub const BDOS: u16 = 0xEC00;
    /// Entry point within the BDOS image.
    pub const BDOS_ENTRY: u16 = BDOS + 0x11;
    /// BIOS jump table base.
    pub const BIOS: u16 = 0xFA00;
    /// Default DMA buffer.
    pub const DEFAULT_DMA: u16 = 0x0080;
    /// Initial stack pointer (base of the TPA).
    pub const INITIAL_SP: u16 = 0x0100;
    /// Current-disk byte in page zero.
    pub const CURRENT_DISK: u16 = 0x0004;
    /// BDOS entry vector in page zero.
    pub const BDOS_VECTOR: u16 = 0x0005;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_canonical_order() {
        assert_eq!(BiosCall::TABLE.len(), 17);
        assert_eq!(BiosCall::TABLE[0], BiosCall::Boot);
        assert_eq!(BiosCall::TABLE[9], BiosCall::SelDsk);
        assert_eq!(BiosCall::TABLE[16], BiosCall::SecTran);
    }

    #[test]
    fn test_vector_addresses() {
        assert_eq!(BiosCall::Boot.vector(), addr::BIOS);
        assert_eq!(BiosCall::ConIn.vector(), addr::BIOS + 9);
        assert_eq!(BiosCall::SecTran.vector(), addr::BIOS + 48);
    }
}
