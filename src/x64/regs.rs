//! Register designators for the x86-64 target.
//!
//! `Gp` and `Xmm` wrap the hardware encoding id (0-15) of a general-purpose
//! or vector register. The ids follow the actual x64 instruction encoding:
//! RSP is 4 and RBP is 5.

use std::fmt;

const GP_NAMES: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15",
];

const XMM_NAMES: [&str; 16] = [
    "xmm0", "xmm1", "xmm2", "xmm3", "xmm4", "xmm5", "xmm6", "xmm7", "xmm8", "xmm9", "xmm10",
    "xmm11", "xmm12", "xmm13", "xmm14", "xmm15",
];

/// A 64-bit general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gp(u8);

impl Gp {
    pub const RAX: Gp = Gp(0);
    pub const RCX: Gp = Gp(1);
    pub const RDX: Gp = Gp(2);
    pub const RBX: Gp = Gp(3);
    pub const RSP: Gp = Gp(4);
    pub const RBP: Gp = Gp(5);
    pub const RSI: Gp = Gp(6);
    pub const RDI: Gp = Gp(7);
    pub const R8: Gp = Gp(8);
    pub const R9: Gp = Gp(9);
    pub const R10: Gp = Gp(10);
    pub const R11: Gp = Gp(11);
    pub const R12: Gp = Gp(12);
    pub const R13: Gp = Gp(13);
    pub const R14: Gp = Gp(14);
    pub const R15: Gp = Gp(15);

    /// Create a register from its hardware encoding id.
    pub const fn from_id(id: u8) -> Gp {
        assert!(id < 16, "GP register id out of range");
        Gp(id)
    }

    pub const fn id(self) -> u8 {
        self.0
    }

    pub const fn mask(self) -> u32 {
        1 << self.0
    }

    pub fn name(self) -> &'static str {
        GP_NAMES[self.0 as usize]
    }
}

impl fmt::Display for Gp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A 128-bit vector register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Xmm(u8);

impl Xmm {
    pub const XMM0: Xmm = Xmm(0);
    pub const XMM1: Xmm = Xmm(1);
    pub const XMM2: Xmm = Xmm(2);
    pub const XMM3: Xmm = Xmm(3);
    pub const XMM4: Xmm = Xmm(4);
    pub const XMM5: Xmm = Xmm(5);
    pub const XMM6: Xmm = Xmm(6);
    pub const XMM7: Xmm = Xmm(7);
    pub const XMM8: Xmm = Xmm(8);
    pub const XMM9: Xmm = Xmm(9);
    pub const XMM10: Xmm = Xmm(10);
    pub const XMM11: Xmm = Xmm(11);
    pub const XMM12: Xmm = Xmm(12);
    pub const XMM13: Xmm = Xmm(13);
    pub const XMM14: Xmm = Xmm(14);
    pub const XMM15: Xmm = Xmm(15);

    /// Create a register from its hardware encoding id.
    pub const fn from_id(id: u8) -> Xmm {
        assert!(id < 16, "XMM register id out of range");
        Xmm(id)
    }

    pub const fn id(self) -> u8 {
        self.0
    }

    pub const fn mask(self) -> u32 {
        1 << self.0
    }

    pub fn name(self) -> &'static str {
        XMM_NAMES[self.0 as usize]
    }
}

impl fmt::Display for Xmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gp_encoding_ids() {
        assert_eq!(Gp::RSP.id(), 4);
        assert_eq!(Gp::RBP.id(), 5);
        assert_eq!(Gp::R15.id(), 15);
        assert_eq!(Gp::from_id(12), Gp::R12);
    }

    #[test]
    fn gp_masks() {
        assert_eq!(Gp::RAX.mask(), 1);
        assert_eq!(Gp::RSP.mask(), 0x10);
        assert_eq!(Gp::R12.mask(), 0x1000);
    }

    #[test]
    fn register_names() {
        assert_eq!(Gp::RBP.name(), "rbp");
        assert_eq!(Gp::R9.name(), "r9");
        assert_eq!(Xmm::XMM6.name(), "xmm6");
        assert_eq!(format!("{}", Gp::RBX), "rbx");
    }

    #[test]
    #[should_panic]
    fn gp_id_out_of_range() {
        let _ = Gp::from_id(16);
    }
}
