//! Windows x64 unwind metadata layout.
//!
//! In-memory representation of the `UNWIND_INFO` header and its tail array
//! of 2-byte `UNWIND_CODE` entries, bit-exact with the format the Windows
//! exception machinery consumes. The crate only produces and re-reads these
//! buffers; it never dereferences platform headers.

use crate::x64::calling_convention::{
    RXX_WRITABLE_NONVOLATILES_MASK, XMM_WRITABLE_NONVOLATILES_MASK,
};
use crate::x64::regs::Gp;

/// Size of one `UNWIND_CODE` entry in bytes.
pub const UNWIND_CODE_SIZE: usize = 2;

/// Size of the `UNWIND_INFO` fixed header, excluding the code array.
pub const UNWIND_INFO_HEADER_SIZE: usize = 4;

/// Size of `UNWIND_INFO` as declared, i.e. the header plus the one unwind
/// code the structure definition already includes.
pub const UNWIND_INFO_SIZE: usize = UNWIND_INFO_HEADER_SIZE + UNWIND_CODE_SIZE;

/// Largest number of unwind codes a frame built by this crate can need:
/// a two-code pair per saveable RXX register (the stack pointer is handled
/// by the allocation step), a two-code pair per saveable XMM register, and
/// two codes for the stack allocation itself.
pub const MAX_UNWIND_CODES: usize = 2
    * (((RXX_WRITABLE_NONVOLATILES_MASK & !Gp::RSP.mask()).count_ones()
        + XMM_WRITABLE_NONVOLATILES_MASK.count_ones()) as usize)
    + 2;

/// Upper bound on the size of a produced unwind-info buffer.
pub const MAX_UNWIND_INFO_BUFFER_SIZE: usize =
    UNWIND_INFO_SIZE - UNWIND_CODE_SIZE + MAX_UNWIND_CODES * UNWIND_CODE_SIZE;

/// Unwind operation codes, with the numeric values the Windows unwinder
/// assigns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnwindOp {
    PushNonvol = 0,
    AllocLarge = 1,
    AllocSmall = 2,
    SetFpreg = 3,
    SaveNonvol = 4,
    SaveNonvolFar = 5,
    SaveXmm128 = 8,
    SaveXmm128Far = 9,
    PushMachframe = 10,
}

impl UnwindOp {
    pub fn from_u8(value: u8) -> Option<UnwindOp> {
        match value {
            0 => Some(UnwindOp::PushNonvol),
            1 => Some(UnwindOp::AllocLarge),
            2 => Some(UnwindOp::AllocSmall),
            3 => Some(UnwindOp::SetFpreg),
            4 => Some(UnwindOp::SaveNonvol),
            5 => Some(UnwindOp::SaveNonvolFar),
            8 => Some(UnwindOp::SaveXmm128),
            9 => Some(UnwindOp::SaveXmm128Far),
            10 => Some(UnwindOp::PushMachframe),
            _ => None,
        }
    }
}

/// One 2-byte unwind code.
///
/// The Windows definition is a union: either an operation record (prolog
/// code offset in byte 0, operation in the low nibble of byte 1, operation
/// info in the high nibble) or a raw 16-bit frame offset acting as the
/// companion of the preceding operation record. Both forms are carried here
/// as the little-endian `u16` they serialize to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwindCode(u16);

impl UnwindCode {
    pub const ZERO: UnwindCode = UnwindCode(0);

    /// Build the operation-record form.
    pub fn with_op(code_offset: u8, op: UnwindOp, info: u8) -> UnwindCode {
        debug_assert!(info < 16, "operation info is a nibble");
        UnwindCode((code_offset as u16) | ((op as u16) << 8) | ((info as u16) << 12))
    }

    /// Build the companion frame-offset form.
    pub const fn with_frame_offset(frame_offset: u16) -> UnwindCode {
        UnwindCode(frame_offset)
    }

    /// Offset of the first prolog byte after the instruction this code
    /// describes.
    pub const fn code_offset(self) -> u8 {
        self.0 as u8
    }

    /// Same record with the code offset replaced, operation bits intact.
    pub const fn with_code_offset(self, code_offset: u8) -> UnwindCode {
        UnwindCode((self.0 & 0xFF00) | code_offset as u16)
    }

    /// Raw operation nibble.
    pub const fn op_raw(self) -> u8 {
        ((self.0 >> 8) & 0xF) as u8
    }

    pub fn unwind_op(self) -> Option<UnwindOp> {
        UnwindOp::from_u8(self.op_raw())
    }

    /// Operation info nibble (register id or encoded slot count).
    pub const fn op_info(self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// The whole record read as the companion frame offset.
    pub const fn frame_offset(self) -> u16 {
        self.0
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 2]) -> UnwindCode {
        UnwindCode(u16::from_le_bytes(bytes))
    }
}

/// The `UNWIND_INFO` fixed header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwindInfoHeader {
    pub version: u8,
    pub flags: u8,
    pub size_of_prolog: u8,
    pub count_of_codes: u8,
    pub frame_register: u8,
    pub frame_offset: u8,
}

impl UnwindInfoHeader {
    pub fn to_bytes(self) -> [u8; UNWIND_INFO_HEADER_SIZE] {
        debug_assert!(self.version < 8 && self.flags < 32);
        debug_assert!(self.frame_register < 16 && self.frame_offset < 16);
        [
            self.version | (self.flags << 3),
            self.size_of_prolog,
            self.count_of_codes,
            self.frame_register | (self.frame_offset << 4),
        ]
    }

    pub fn from_bytes(bytes: [u8; UNWIND_INFO_HEADER_SIZE]) -> UnwindInfoHeader {
        UnwindInfoHeader {
            version: bytes[0] & 0x7,
            flags: bytes[0] >> 3,
            size_of_prolog: bytes[1],
            count_of_codes: bytes[2],
            frame_register: bytes[3] & 0xF,
            frame_offset: bytes[3] >> 4,
        }
    }
}

/// Read-only view over a produced unwind-info buffer.
pub struct UnwindInfoView<'b> {
    buffer: &'b [u8],
}

impl<'b> UnwindInfoView<'b> {
    pub fn new(buffer: &'b [u8]) -> UnwindInfoView<'b> {
        assert!(
            buffer.len() >= UNWIND_INFO_HEADER_SIZE,
            "unwind info buffer too short: {} bytes",
            buffer.len()
        );
        let view = UnwindInfoView { buffer };
        let needed =
            UNWIND_INFO_HEADER_SIZE + view.count_of_codes() as usize * UNWIND_CODE_SIZE;
        assert!(
            buffer.len() >= needed,
            "unwind info buffer truncated: {} of {} bytes",
            buffer.len(),
            needed
        );
        view
    }

    pub fn header(&self) -> UnwindInfoHeader {
        UnwindInfoHeader::from_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ])
    }

    pub fn size_of_prolog(&self) -> u8 {
        self.buffer[1]
    }

    pub fn count_of_codes(&self) -> u8 {
        self.buffer[2]
    }

    pub fn code(&self, index: usize) -> UnwindCode {
        assert!(
            index < self.count_of_codes() as usize,
            "unwind code index {index} out of range"
        );
        let at = UNWIND_INFO_HEADER_SIZE + index * UNWIND_CODE_SIZE;
        UnwindCode::from_le_bytes([self.buffer[at], self.buffer[at + 1]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_record_layout() {
        let code = UnwindCode::with_op(9, UnwindOp::SaveNonvol, 5);
        assert_eq!(code.code_offset(), 9);
        assert_eq!(code.unwind_op(), Some(UnwindOp::SaveNonvol));
        assert_eq!(code.op_info(), 5);
        // Byte 0 is the code offset, byte 1 packs op into the low nibble.
        assert_eq!(code.to_le_bytes(), [0x09, 0x54]);
    }

    #[test]
    fn frame_offset_form_roundtrips() {
        let code = UnwindCode::with_frame_offset(101);
        assert_eq!(code.frame_offset(), 101);
        assert_eq!(UnwindCode::from_le_bytes(code.to_le_bytes()), code);
    }

    #[test]
    fn code_offset_patch_preserves_operation_bits() {
        let code = UnwindCode::with_op(9, UnwindOp::SaveNonvol, 5).with_code_offset(14);
        assert_eq!(code.code_offset(), 14);
        assert_eq!(code.unwind_op(), Some(UnwindOp::SaveNonvol));
        assert_eq!(code.op_info(), 5);
    }

    #[test]
    fn header_roundtrips() {
        let header = UnwindInfoHeader {
            version: 1,
            flags: 0,
            size_of_prolog: 14,
            count_of_codes: 3,
            frame_register: 0,
            frame_offset: 0,
        };
        assert_eq!(header.to_bytes(), [0x01, 14, 3, 0]);
        assert_eq!(UnwindInfoHeader::from_bytes(header.to_bytes()), header);
    }

    #[test]
    fn view_reads_codes_in_array_order() {
        let mut buffer = Vec::new();
        buffer.extend(
            UnwindInfoHeader {
                version: 1,
                flags: 0,
                size_of_prolog: 8,
                count_of_codes: 2,
                frame_register: 0,
                frame_offset: 0,
            }
            .to_bytes(),
        );
        buffer.extend(UnwindCode::with_op(8, UnwindOp::SaveNonvol, 12).to_le_bytes());
        buffer.extend(UnwindCode::with_frame_offset(0).to_le_bytes());

        let view = UnwindInfoView::new(&buffer);
        assert_eq!(view.size_of_prolog(), 8);
        assert_eq!(view.count_of_codes(), 2);
        assert_eq!(view.code(0).unwind_op(), Some(UnwindOp::SaveNonvol));
        assert_eq!(view.code(0).op_info(), 12);
        assert_eq!(view.code(1).frame_offset(), 0);
    }

    #[test]
    #[should_panic]
    fn view_rejects_truncated_buffers() {
        let buffer = [0x01u8, 0, 4, 0, 0, 0];
        let _ = UnwindInfoView::new(&buffer);
    }

    #[test]
    fn max_buffer_size_covers_the_worst_frame() {
        // 8 saveable RXX registers and 10 saveable XMM registers, two codes
        // each, plus a two-code large allocation.
        assert_eq!(MAX_UNWIND_CODES, 38);
        assert_eq!(
            MAX_UNWIND_INFO_BUFFER_SIZE,
            UNWIND_INFO_SIZE - UNWIND_CODE_SIZE + MAX_UNWIND_CODES * UNWIND_CODE_SIZE
        );
    }

    #[test]
    fn unknown_operations_are_rejected() {
        assert_eq!(UnwindOp::from_u8(6), None);
        assert_eq!(UnwindOp::from_u8(11), None);
    }
}
