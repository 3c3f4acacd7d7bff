//! Windows x64 calling convention data.
//!
//! Register classification and parameter-passing assignments for the Windows
//! x64 ABI: the first four integer arguments arrive in RCX, RDX, R8, R9 and
//! the first four floating-point arguments in XMM0-XMM3. RAX, RCX, RDX,
//! R8-R11 and XMM0-XMM5 are volatile; everything else must be preserved by
//! the callee. A function that calls anything must also reserve four home
//! slots for its callees' register arguments.

use crate::x64::regs::{Gp, Xmm};

/// Registers a callee may freely clobber.
pub const RXX_VOLATILES_MASK: u32 = Gp::RAX.mask()
    | Gp::RCX.mask()
    | Gp::RDX.mask()
    | Gp::R8.mask()
    | Gp::R9.mask()
    | Gp::R10.mask()
    | Gp::R11.mask();

/// Registers a callee must preserve. RSP is included; it is preserved by the
/// frame allocation itself rather than by a save/restore pair.
pub const RXX_NONVOLATILES_MASK: u32 = Gp::RBX.mask()
    | Gp::RSP.mask()
    | Gp::RBP.mask()
    | Gp::RSI.mask()
    | Gp::RDI.mask()
    | Gp::R12.mask()
    | Gp::R13.mask()
    | Gp::R14.mask()
    | Gp::R15.mask();

/// Nonvolatile registers a prolog is allowed to save and an epilog to
/// restore. The stack pointer bit is admitted here; the frame builder strips
/// it and handles SP through the allocation step instead.
pub const RXX_WRITABLE_NONVOLATILES_MASK: u32 = RXX_NONVOLATILES_MASK;

/// XMM registers a callee may freely clobber.
pub const XMM_VOLATILES_MASK: u32 = Xmm::XMM0.mask()
    | Xmm::XMM1.mask()
    | Xmm::XMM2.mask()
    | Xmm::XMM3.mask()
    | Xmm::XMM4.mask()
    | Xmm::XMM5.mask();

/// XMM registers a callee must preserve: XMM6-XMM15.
pub const XMM_NONVOLATILES_MASK: u32 = 0xFFFF & !XMM_VOLATILES_MASK;

/// XMM registers a prolog is allowed to save.
pub const XMM_WRITABLE_NONVOLATILES_MASK: u32 = XMM_NONVOLATILES_MASK;

/// Integer parameter registers, in argument-position order.
pub const GP_PARAM_REGISTERS: [Gp; 4] = [Gp::RCX, Gp::RDX, Gp::R8, Gp::R9];

/// Floating-point parameter registers, in argument-position order.
pub const XMM_PARAM_REGISTERS: [Xmm; 4] = [Xmm::XMM0, Xmm::XMM1, Xmm::XMM2, Xmm::XMM3];

/// Minimum number of outgoing argument slots a non-leaf function reserves
/// (the home space for its callees' register arguments).
pub const HOME_SLOT_COUNT: u32 = 4;

/// Register carrying the given integer argument, `None` once arguments
/// spill to the stack.
pub fn gp_param_register(position: usize) -> Option<Gp> {
    GP_PARAM_REGISTERS.get(position).copied()
}

/// Register carrying the given floating-point argument.
pub fn xmm_param_register(position: usize) -> Option<Xmm> {
    XMM_PARAM_REGISTERS.get(position).copied()
}
