use std::fmt::{Display, Formatter};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use crate::utils::BitSlice;

/// Place value that requests a whole-line block transfer instead of a single element.
pub const PLACE_BLOCK: u8 = 0x7f;

#[derive(Debug, FromPrimitive, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Noop           = 0,
    LoadD          = 1,
    LoadDA         = 2,
    StoreD         = 3,
    StoreDA        = 4,
    LoadPC         = 5,
    LoadCC         = 6,
    Start          = 7,
    WaitReady      = 8,
    Finish         = 9,
    SelectDinLine  = 10,
    SelectDoutLine = 11,
    SelectPcLine   = 12,
    SelectCcLine   = 13,
}

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Noop => "NOOP",
            Opcode::LoadD => "LOADD",
            Opcode::LoadDA => "LOADDA",
            Opcode::StoreD => "STORED",
            Opcode::StoreDA => "STOREDA",
            Opcode::LoadPC => "LOADPC",
            Opcode::LoadCC => "LOADCC",
            Opcode::Start => "START",
            Opcode::WaitReady => "WAIT_READY",
            Opcode::Finish => "FINISH",
            Opcode::SelectDinLine => "SLCT_DIN_LINE",
            Opcode::SelectDoutLine => "SLCT_DOUT_LINE",
            Opcode::SelectPcLine => "SLCT_PC_LINE",
            Opcode::SelectCcLine => "SLCT_CC_LINE",
        }
    }
}

/// Fields of one 32-bit instruction word.
///
/// ```text
///  31            16 15  13 12       6 5      0
/// +----------------+------+----------+--------+
/// |    address     | line |  place   | opcode |
/// +----------------+------+----------+--------+
/// ```
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DecodedInst {
    pub opcode: u8,
    pub place: u8,
    pub line: u8,
    pub address: u16,
    pub raw: u32,
}

impl DecodedInst {
    /// `None` for opcode values outside the instruction set.
    pub fn op(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    pub fn is_block(&self) -> bool {
        self.place == PLACE_BLOCK
    }
}

impl Display for DecodedInst {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = self.op().map_or("<unknown>", Opcode::mnemonic);
        write!(
            f,
            "DecodedInst: {{ inst {:#010x} [ op: {} ({:#04x}), line: {}, place: {}, addr: {:#06x} ] }}",
            self.raw, name, self.opcode, self.line, self.place, self.address
        )
    }
}

#[derive(Debug)]
pub struct DecodeUnit;

impl DecodeUnit {
    pub fn decode(inst: u32) -> DecodedInst {
        DecodedInst {
            opcode: inst.sel(5, 0) as u8,
            place: inst.sel(12, 6) as u8,
            line: inst.sel(15, 13) as u8,
            address: inst.sel(31, 16) as u16,
            raw: inst,
        }
    }

    /// Inverse of [`DecodeUnit::decode`]; fields wider than their slot are truncated.
    pub fn encode(opcode: u8, line: u8, place: u8, address: u16) -> u32 {
        ((address as u32) << 16)
            | (((line as u32) & 0x7) << 13)
            | (((place as u32) & 0x7f) << 6)
            | ((opcode as u32) & 0x3f)
    }
}
