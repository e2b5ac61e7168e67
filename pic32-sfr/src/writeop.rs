/// Hardware-style write operation selected by the low address bits.
///
/// Every aliased register occupies four consecutive words: the base
/// register followed by its CLR, SET and INV views. All four views share
/// one storage cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Assign,
    Clear,
    Set,
    Invert,
}

impl WriteOp {
    pub const CLR_OFFSET: u32 = 0x4;
    pub const SET_OFFSET: u32 = 0x8;
    pub const INV_OFFSET: u32 = 0xC;

    /// The three alias views, in address order.
    pub const ALIASES: [WriteOp; 3] = [WriteOp::Clear, WriteOp::Set, WriteOp::Invert];

    /// Decode the operation from bits 2..3 of an offset.
    #[inline]
    pub fn from_offset(offset: u32) -> Self {
        match offset & 0xC {
            0x0 => WriteOp::Assign,
            0x4 => WriteOp::Clear,
            0x8 => WriteOp::Set,
            _ => WriteOp::Invert,
        }
    }

    /// Distance of this view from the base register.
    #[inline]
    pub fn alias_offset(self) -> u32 {
        match self {
            WriteOp::Assign => 0,
            WriteOp::Clear => Self::CLR_OFFSET,
            WriteOp::Set => Self::SET_OFFSET,
            WriteOp::Invert => Self::INV_OFFSET,
        }
    }

    #[inline]
    pub fn is_alias(self) -> bool {
        self != WriteOp::Assign
    }

    /// Combine the old cell value with write data.
    #[inline]
    pub fn apply(self, old: u32, data: u32) -> u32 {
        match self {
            WriteOp::Assign => data,
            WriteOp::Clear => old & !data,
            WriteOp::Set => old | data,
            WriteOp::Invert => old ^ data,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            WriteOp::Assign => "",
            WriteOp::Clear => "CLR",
            WriteOp::Set => "SET",
            WriteOp::Invert => "INV",
        }
    }
}
