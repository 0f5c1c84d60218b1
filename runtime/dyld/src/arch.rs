//! # Target Architectures
//!
//! Each supported machine contributes its `e_machine` code, its byte order
//! and a table mapping raw relocation codes to [`RelocKind`]. The relocation
//! engine only dispatches on `RelocKind`, so adding an architecture means
//! adding a variant and a table here.

use crate::bytes::ByteOrder;

/// Machine type: OpenRISC 1000.
pub const EM_OPENRISC: u16 = 92;

/// Machine type: RISC-V.
pub const EM_RISCV: u16 = 243;

/// OpenRISC 1000 relocation types.
pub mod r_or1k {
    pub const R_OR1K_NONE: u8 = 0;
    pub const R_OR1K_32: u8 = 1;
    pub const R_OR1K_GLOB_DAT: u8 = 20;
    pub const R_OR1K_JMP_SLOT: u8 = 21;
    pub const R_OR1K_RELATIVE: u8 = 22;
}

/// RISC-V relocation types (dynamic subset).
pub mod r_riscv {
    pub const R_RISCV_NONE: u8 = 0;
    pub const R_RISCV_32: u8 = 1;
    pub const R_RISCV_RELATIVE: u8 = 3;
    pub const R_RISCV_JUMP_SLOT: u8 = 5;
}

/// How a relocation computes its patch value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    /// Nothing to do.
    None,
    /// `base + addend`.
    Relative,
    /// Direct word referring to a symbol.
    Absolute,
    /// GOT slot referring to a symbol.
    GlobalData,
    /// PLT slot referring to a symbol.
    JumpSlot,
}

impl RelocKind {
    /// Whether the patch value comes from a symbol lookup.
    pub const fn resolves_symbol(self) -> bool {
        matches!(
            self,
            RelocKind::Absolute | RelocKind::GlobalData | RelocKind::JumpSlot
        )
    }
}

static OR1K_RELOCATIONS: [(u8, RelocKind); 5] = [
    (r_or1k::R_OR1K_NONE, RelocKind::None),
    (r_or1k::R_OR1K_RELATIVE, RelocKind::Relative),
    (r_or1k::R_OR1K_32, RelocKind::Absolute),
    (r_or1k::R_OR1K_GLOB_DAT, RelocKind::GlobalData),
    (r_or1k::R_OR1K_JMP_SLOT, RelocKind::JumpSlot),
];

static RISCV_RELOCATIONS: [(u8, RelocKind); 4] = [
    (r_riscv::R_RISCV_NONE, RelocKind::None),
    (r_riscv::R_RISCV_RELATIVE, RelocKind::Relative),
    (r_riscv::R_RISCV_32, RelocKind::Absolute),
    (r_riscv::R_RISCV_JUMP_SLOT, RelocKind::JumpSlot),
];

/// Target machine a loader build accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Machine {
    /// OpenRISC 1000, big-endian.
    #[default]
    OpenRisc,
    /// 32-bit RISC-V, little-endian.
    Riscv32,
}

impl Machine {
    /// The `e_machine` value of this architecture.
    pub const fn code(self) -> u16 {
        match self {
            Machine::OpenRisc => EM_OPENRISC,
            Machine::Riscv32 => EM_RISCV,
        }
    }

    /// Byte order images for this architecture must use.
    pub const fn byte_order(self) -> ByteOrder {
        match self {
            Machine::OpenRisc => ByteOrder::Big,
            Machine::Riscv32 => ByteOrder::Little,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Machine::OpenRisc => "OpenRISC",
            Machine::Riscv32 => "RISC-V",
        }
    }

    /// Error text for an image built for another machine.
    pub(crate) const fn mismatch_message(self) -> &'static str {
        match self {
            Machine::OpenRisc => "ELF object does not contain OpenRISC machine code",
            Machine::Riscv32 => "ELF object does not contain RISC-V machine code",
        }
    }

    /// Relocation code table.
    pub fn relocations(self) -> &'static [(u8, RelocKind)] {
        match self {
            Machine::OpenRisc => &OR1K_RELOCATIONS,
            Machine::Riscv32 => &RISCV_RELOCATIONS,
        }
    }

    /// Classifies a raw relocation code, `None` if it is not supported.
    pub fn reloc_kind(self, code: u8) -> Option<RelocKind> {
        self.relocations()
            .iter()
            .find(|(c, _)| *c == code)
            .map(|&(_, kind)| kind)
    }

    /// Looks up the machine for an `e_machine` value.
    pub fn from_code(code: u16) -> Option<Self> {
        [Machine::OpenRisc, Machine::Riscv32]
            .into_iter()
            .find(|m| m.code() == code)
    }
}
