// This module builds the three artifacts that describe a function's stack frame: the
// prolog byte stream, the Windows x64 unwind-code table, and the epilog byte stream.
// Prolog instructions and unwind codes are emitted in lockstep (each code records the
// prolog offset sampled right after its instruction), the code array is filled back to
// front because the unwinder replays it in epilog order, and the epilog is then derived
// from the finished table so the three outputs cannot drift apart.

//! Function prolog, epilog and unwind metadata.

use bumpalo::{collections::Vec as BumpVec, Bump};

use crate::core::error::{CompileError, CompileResult};
use crate::x64::calling_convention as abi;
use crate::x64::encoder::X64Encoder;
use crate::x64::regs::{Gp, Xmm};
use crate::x64::unwind::{
    UnwindCode, UnwindInfoHeader, UnwindInfoView, UnwindOp, MAX_UNWIND_CODES,
    UNWIND_CODE_SIZE, UNWIND_INFO_HEADER_SIZE,
};

/// Largest stack frame the prolog may allocate: one page, since a larger
/// allocation would have to touch its guard pages with a probe that this
/// prolog does not emit.
pub const MAX_STACK_SIZE: u32 = 4096;

/// Upper bound on the size of a generated prolog or epilog, used to size
/// scratch code buffers. Prolog offsets must also fit the 8-bit field of an
/// unwind code.
pub const MAX_PROLOG_OR_EPILOG_SIZE: usize = 256;

/// Whether the prolog materializes a frame pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseRegisterType {
    /// No frame pointer; everything is addressed off RSP.
    None,
    /// Point RBP at the original RSP value, just above the frame.
    SetRbpToOriginalRsp,
}

/// A function's frame description: prolog and epilog code plus the unwind
/// table the Windows exception machinery consumes. All three are built
/// together and frozen at construction.
pub struct FunctionSpecification<'a> {
    unwind_info: BumpVec<'a, u8>,
    prolog: BumpVec<'a, u8>,
    epilog: BumpVec<'a, u8>,
    offset_to_original_rsp: i32,
}

impl<'a> FunctionSpecification<'a> {
    /// Build the frame for the given shape.
    ///
    /// `max_function_call_parameters` is -1 for a leaf function, otherwise
    /// the largest argument count across all callees. The save masks must
    /// stay within the writable nonvolatile sets of the calling convention;
    /// the stack-pointer bit is stripped (SP is preserved by the allocation
    /// itself) and the frame-pointer bit is forced in when
    /// `SetRbpToOriginalRsp` is requested.
    pub fn new(
        arena: &'a Bump,
        max_function_call_parameters: i32,
        local_stack_slot_count: u32,
        saved_rxx_nonvolatiles_mask: u32,
        saved_xmm_nonvolatiles_mask: u32,
        base_register_type: BaseRegisterType,
    ) -> CompileResult<FunctionSpecification<'a>> {
        // The code in this buffer is copied out rather than executed, so a
        // plain scratch encoder is enough.
        let mut code = X64Encoder::with_capacity(MAX_PROLOG_OR_EPILOG_SIZE);
        let mut unwind_info = BumpVec::new_in(arena);

        let offset_to_original_rsp = build_unwind_info_and_prolog(
            max_function_call_parameters,
            local_stack_slot_count,
            saved_rxx_nonvolatiles_mask,
            saved_xmm_nonvolatiles_mask,
            base_register_type,
            &mut code,
            &mut unwind_info,
        )?;

        let mut prolog = BumpVec::with_capacity_in(code.current_position(), arena);
        prolog.extend(code.buffer().iter().copied());

        code.reset();
        build_epilog(&unwind_info, &mut code)?;

        let mut epilog = BumpVec::with_capacity_in(code.current_position(), arena);
        epilog.extend(code.buffer().iter().copied());

        Ok(FunctionSpecification {
            unwind_info,
            prolog,
            epilog,
            offset_to_original_rsp,
        })
    }

    /// Distance from RSP after the prolog back to the original RSP value.
    pub fn offset_to_original_rsp(&self) -> i32 {
        self.offset_to_original_rsp
    }

    /// The `UNWIND_INFO` buffer, header plus code array.
    pub fn unwind_info(&self) -> &[u8] {
        &self.unwind_info
    }

    pub fn prolog(&self) -> &[u8] {
        &self.prolog
    }

    pub fn epilog(&self) -> &[u8] {
        &self.epilog
    }
}

/// Place one unwind code and step the cursor down. Codes are placed in
/// reverse order, end of the array first, because the unwinder executes
/// them in epilog order.
fn add_code_and_back_down(
    codes: &mut [UnwindCode],
    cursor: &mut isize,
    code_offset: usize,
    op: UnwindOp,
    info: u8,
) {
    assert!(*cursor >= 0, "unwind codes overflow");
    assert!(
        code_offset <= u8::MAX as usize,
        "code offset overflow: {code_offset}"
    );
    codes[*cursor as usize] = UnwindCode::with_op(code_offset as u8, op, info);
    *cursor -= 1;
}

/// The two-code flavor: an operation record plus a 16-bit companion value.
/// Since the array fills in reverse, the companion goes in first.
fn add_code_pair_and_back_down(
    codes: &mut [UnwindCode],
    cursor: &mut isize,
    code_offset: usize,
    op: UnwindOp,
    info: u8,
    frame_offset: u16,
) {
    assert!(*cursor >= 0, "unwind codes overflow");
    codes[*cursor as usize] = UnwindCode::with_frame_offset(frame_offset);
    *cursor -= 1;

    add_code_and_back_down(codes, cursor, code_offset, op, info);
}

fn build_unwind_info_and_prolog(
    max_function_call_parameters: i32,
    local_stack_slot_count: u32,
    saved_rxx_nonvolatiles_mask: u32,
    saved_xmm_nonvolatiles_mask: u32,
    base_register_type: BaseRegisterType,
    prolog_code: &mut X64Encoder,
    unwind_info_buffer: &mut BumpVec<'_, u8>,
) -> CompileResult<i32> {
    if saved_rxx_nonvolatiles_mask & !abi::RXX_WRITABLE_NONVOLATILES_MASK != 0 {
        return Err(CompileError::IllegalSavedRegisters {
            bank: "rxx",
            mask: saved_rxx_nonvolatiles_mask & !abi::RXX_WRITABLE_NONVOLATILES_MASK,
        });
    }

    if saved_xmm_nonvolatiles_mask & !abi::XMM_WRITABLE_NONVOLATILES_MASK != 0 {
        return Err(CompileError::IllegalSavedRegisters {
            bank: "xmm",
            mask: saved_xmm_nonvolatiles_mask & !abi::XMM_WRITABLE_NONVOLATILES_MASK,
        });
    }

    // The stack pointer is always saved and restored, but by adjusting it
    // in the prolog and epilog rather than through a save slot.
    let mut saved_rxx_mask = saved_rxx_nonvolatiles_mask & !Gp::RSP.mask();

    // The frame register must be preserved before it is repointed.
    if base_register_type == BaseRegisterType::SetRbpToOriginalRsp {
        saved_rxx_mask |= Gp::RBP.mask();
    }

    let code_start_position = prolog_code.current_position();

    // A function that makes any call reserves at least four home slots for
    // its callees' register arguments.
    let function_params_slot_count = if max_function_call_parameters >= 0 {
        (max_function_call_parameters as u32).max(abi::HOME_SLOT_COUNT)
    } else {
        0
    };

    let rxx_saves_count = saved_rxx_mask.count_ones();
    let xmm_saves_count = saved_xmm_nonvolatiles_mask.count_ones();

    // All 128 bits of each XMM register are saved, so each takes two slots,
    // and the slots must be 16-byte aligned, which may cost one pad slot.
    let reg_saves_slot_count =
        rxx_saves_count + 2 * xmm_saves_count + u32::from(xmm_saves_count > 0);

    // Total slot count is forced odd: the stack pointer must end up 16-byte
    // aligned and the return address already occupies one slot.
    //
    // Stack layout after the prolog, low to high addresses:
    //   [outgoing call argument home, 0 or max(4, callee param count) slots]
    //   [registers saved by the prolog]
    //   [local slots for temporaries]
    //   [end of frame; original RSP pointed here, RBP points here if selected]
    //   [return address, incoming arguments]
    let total_stack_slot_count =
        (function_params_slot_count + reg_saves_slot_count + local_stack_slot_count) | 1;
    let total_stack_bytes = total_stack_slot_count * 8;
    let offset_to_original_rsp = total_stack_bytes as i32;

    if total_stack_bytes == 0 || total_stack_bytes > MAX_STACK_SIZE {
        return Err(CompileError::InvalidStackAllocation {
            bytes: total_stack_bytes,
        });
    }

    // UWOP_ALLOC_SMALL covers 8 to 128 bytes in one code; beyond that the
    // two-code UWOP_ALLOC_LARGE form covers up to 512 kB - 8, far past the
    // page limit enforced above.
    let is_small_stack_alloc = total_stack_bytes <= 128;

    let actual_code_count =
        ((rxx_saves_count + xmm_saves_count) * 2 + if is_small_stack_alloc { 1 } else { 2 })
            as usize;
    assert!(
        actual_code_count > 0 && actual_code_count <= MAX_UNWIND_CODES,
        "invalid number of unwind codes: {actual_code_count}"
    );

    // The code array always has an even number of entries, the final one
    // potentially unused.
    let aligned_code_count = (actual_code_count + 1) & !1;

    let mut codes = [UnwindCode::ZERO; MAX_UNWIND_CODES];
    let codes = &mut codes[..aligned_code_count];
    let mut cursor = actual_code_count as isize - 1;

    log::debug!(
        "frame: {total_stack_slot_count} slots ({total_stack_bytes} bytes), \
         {rxx_saves_count} rxx + {xmm_saves_count} xmm saves, {actual_code_count} unwind codes"
    );

    // Stack allocation first, with its matching unwind code.
    prolog_code.sub_reg_imm(Gp::RSP, offset_to_original_rsp)?;

    if is_small_stack_alloc {
        assert!(
            (1..=16).contains(&total_stack_slot_count),
            "alloc small slot count {total_stack_slot_count}"
        );

        // Slot counts 1-16 are encoded as 0-15.
        add_code_and_back_down(
            codes,
            &mut cursor,
            prolog_code.current_position() - code_start_position,
            UnwindOp::AllocSmall,
            (total_stack_slot_count - 1) as u8,
        );
    } else {
        assert!(
            (17..=u16::MAX as u32).contains(&total_stack_slot_count),
            "alloc large slot count {total_stack_slot_count}"
        );

        // Info value 0 selects the two-code UWOP_ALLOC_LARGE form whose
        // companion holds the slot count.
        add_code_pair_and_back_down(
            codes,
            &mut cursor,
            prolog_code.current_position() - code_start_position,
            UnwindOp::AllocLarge,
            0,
            total_stack_slot_count as u16,
        );
    }

    // Register saves land right above the outgoing argument home.
    let mut current_stack_slot_offset = function_params_slot_count;

    let mut registers_mask = saved_rxx_mask;
    while registers_mask != 0 {
        let reg_id = registers_mask.trailing_zeros() as u8;

        prolog_code.mov_mem_reg(
            Gp::RSP,
            (current_stack_slot_offset * 8) as i32,
            Gp::from_id(reg_id),
        )?;

        add_code_pair_and_back_down(
            codes,
            &mut cursor,
            prolog_code.current_position() - code_start_position,
            UnwindOp::SaveNonvol,
            reg_id,
            current_stack_slot_offset as u16,
        );

        registers_mask &= registers_mask - 1;
        current_stack_slot_offset += 1;
    }

    if xmm_saves_count > 0 {
        // Round the slot offset up to even (16-byte aligned); the extra
        // slot was already reserved above.
        if current_stack_slot_offset & 1 != 0 {
            current_stack_slot_offset += 1;
        }

        let mut registers_mask = saved_xmm_nonvolatiles_mask;
        while registers_mask != 0 {
            let reg_id = registers_mask.trailing_zeros() as u8;

            prolog_code.movaps_store(
                Gp::RSP,
                (current_stack_slot_offset * 8) as i32,
                Xmm::from_id(reg_id),
            )?;

            // The companion offset counts 16-byte slots; the slot offset
            // was just verified even.
            add_code_pair_and_back_down(
                codes,
                &mut cursor,
                prolog_code.current_position() - code_start_position,
                UnwindOp::SaveXmm128,
                reg_id,
                (current_stack_slot_offset / 2) as u16,
            );

            registers_mask &= registers_mask - 1;
            current_stack_slot_offset += 2;
        }
    }

    // The cursor points where the next code would go, so it must have
    // stepped exactly one position past the start of the array.
    assert!(
        cursor == -1,
        "mismatched count of unwind codes: {}",
        cursor + 1
    );

    // Point RBP at the original RSP value. UWOP_SET_FPREG is deliberately
    // not used: on x64 the frame pointer is only a convenience, the
    // SET_FPREG offset field is capped at 240, and the code would have to
    // precede every save that specifies an offset. Instead the last
    // unwind code to record a prolog offset is extended to cover the lea,
    // which therefore must directly follow the final register save.
    if base_register_type == BaseRegisterType::SetRbpToOriginalRsp {
        assert!(
            codes[0].code_offset() as usize
                == prolog_code.current_position() - code_start_position,
            "frame pointer setup does not follow the final register save"
        );

        prolog_code.lea(Gp::RBP, Gp::RSP, offset_to_original_rsp)?;

        let end_of_prolog = prolog_code.current_position() - code_start_position;
        assert!(
            end_of_prolog <= u8::MAX as usize,
            "code offset overflow: {end_of_prolog}"
        );
        codes[0] = codes[0].with_code_offset(end_of_prolog as u8);
    }

    // Code offsets point just past the instruction they describe, so the
    // first code's offset is also the prolog size.
    let header = UnwindInfoHeader {
        version: 1,
        flags: 0,
        size_of_prolog: codes[0].code_offset(),
        count_of_codes: actual_code_count as u8,
        frame_register: 0,
        frame_offset: 0,
    };

    unwind_info_buffer.extend(header.to_bytes());
    for code in codes.iter() {
        unwind_info_buffer.extend(code.to_le_bytes());
    }
    debug_assert_eq!(
        unwind_info_buffer.len(),
        UNWIND_INFO_HEADER_SIZE + aligned_code_count * UNWIND_CODE_SIZE
    );

    Ok(offset_to_original_rsp)
}

/// Number of consecutive array entries an unwind operation consumes.
fn unwind_op_code_count(code: UnwindCode) -> usize {
    match code.unwind_op() {
        Some(UnwindOp::AllocSmall)
        | Some(UnwindOp::PushMachframe)
        | Some(UnwindOp::PushNonvol)
        | Some(UnwindOp::SetFpreg) => 1,

        Some(UnwindOp::SaveNonvol) | Some(UnwindOp::SaveXmm128) => 2,

        Some(UnwindOp::SaveNonvolFar) | Some(UnwindOp::SaveXmm128Far) => 3,

        Some(UnwindOp::AllocLarge) => {
            assert!(
                code.op_info() <= 1,
                "invalid op info for alloc large: {}",
                code.op_info()
            );
            if code.op_info() == 0 {
                2
            } else {
                3
            }
        }

        None => panic!("unknown unwind operation {}", code.op_raw()),
    }
}

/// Derive the epilog from the unwind codes: the array is stored in epilog
/// order, so a forward walk undoes the prolog step by step.
fn build_epilog(unwind_info: &[u8], epilog_code: &mut X64Encoder) -> CompileResult<()> {
    let view = UnwindInfoView::new(unwind_info);
    let count = view.count_of_codes() as usize;
    let mut i = 0;

    while i < count {
        let unwind_code = view.code(i);

        let code_count = unwind_op_code_count(unwind_code);
        assert!(
            i + code_count <= count,
            "not enough unwind codes for op {}",
            unwind_code.op_raw()
        );

        // Two-code operations keep their 16-bit value in the companion.
        let code2_offset = if code_count >= 2 {
            view.code(i + 1).frame_offset() as u32
        } else {
            0
        };

        match unwind_code.unwind_op() {
            Some(UnwindOp::AllocLarge) => {
                assert!(code_count == 2, "unexpected {code_count}-code alloc large");
                // The companion holds the slot count in quadwords.
                epilog_code.add_reg_imm(Gp::RSP, (code2_offset * 8) as i32)?;
            }

            Some(UnwindOp::AllocSmall) => {
                // The info nibble holds the slot count decreased by one.
                epilog_code
                    .add_reg_imm(Gp::RSP, (unwind_code.op_info() as i32 + 1) * 8)?;
            }

            Some(UnwindOp::SaveNonvol) => {
                // The companion holds the slot offset in quadwords.
                epilog_code.mov_reg_mem(
                    Gp::from_id(unwind_code.op_info()),
                    Gp::RSP,
                    (code2_offset * 8) as i32,
                )?;
            }

            Some(UnwindOp::SaveXmm128) => {
                // The companion holds the slot offset in 16-byte units.
                epilog_code.movaps_load(
                    Xmm::from_id(unwind_code.op_info()),
                    Gp::RSP,
                    (code2_offset * 16) as i32,
                )?;
            }

            _ => panic!("unsupported unwind operation {}", unwind_code.op_raw()),
        }

        i += code_count;
    }

    epilog_code.ret()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x64::unwind::UNWIND_INFO_SIZE;

    fn view<'a>(spec: &'a FunctionSpecification<'_>) -> UnwindInfoView<'a> {
        UnwindInfoView::new(spec.unwind_info())
    }

    #[test]
    fn leaf_function_with_one_local_slot() {
        let arena = Bump::new();
        let spec =
            FunctionSpecification::new(&arena, -1, 1, 0, 0, BaseRegisterType::None).unwrap();

        assert_eq!(spec.offset_to_original_rsp(), 8);
        // sub rsp, 8
        assert_eq!(spec.prolog(), [0x48, 0x83, 0xEC, 0x08]);
        // add rsp, 8; ret
        assert_eq!(spec.epilog(), [0x48, 0x83, 0xC4, 0x08, 0xC3]);

        let info = view(&spec);
        assert_eq!(info.header().version, 1);
        assert_eq!(info.header().flags, 0);
        assert_eq!(info.count_of_codes(), 1);
        assert_eq!(info.size_of_prolog() as usize, spec.prolog().len());
        assert_eq!(info.code(0).unwind_op(), Some(UnwindOp::AllocSmall));
        assert_eq!(info.code(0).op_info(), 0);
        // One actual code padded to two; one is declared by the structure.
        assert_eq!(
            spec.unwind_info().len(),
            UNWIND_INFO_SIZE + (2 - 1) * UNWIND_CODE_SIZE
        );
    }

    #[test]
    fn single_nonvolatile_save() {
        let arena = Bump::new();
        let spec = FunctionSpecification::new(
            &arena,
            -1,
            0,
            Gp::R12.mask(),
            0,
            BaseRegisterType::None,
        )
        .unwrap();

        assert_eq!(spec.offset_to_original_rsp(), 8);
        // sub rsp, 8; mov [rsp], r12
        assert_eq!(
            spec.prolog(),
            [0x48, 0x83, 0xEC, 0x08, 0x4C, 0x89, 0x24, 0x24]
        );
        // mov r12, [rsp]; add rsp, 8; ret
        assert_eq!(
            spec.epilog(),
            [0x4C, 0x8B, 0x24, 0x24, 0x48, 0x83, 0xC4, 0x08, 0xC3]
        );

        let info = view(&spec);
        assert_eq!(info.count_of_codes(), 3);
        assert_eq!(info.size_of_prolog() as usize, spec.prolog().len());
        assert_eq!(info.code(0).unwind_op(), Some(UnwindOp::SaveNonvol));
        assert_eq!(info.code(0).op_info(), Gp::R12.id());
        assert_eq!(info.code(1).frame_offset(), 0);
        assert_eq!(info.code(2).unwind_op(), Some(UnwindOp::AllocSmall));
        assert_eq!(info.code(2).op_info(), 0);
    }

    #[test]
    fn frame_pointer_and_one_call() {
        let arena = Bump::new();
        let spec = FunctionSpecification::new(
            &arena,
            2,
            0,
            0,
            0,
            BaseRegisterType::SetRbpToOriginalRsp,
        )
        .unwrap();

        // Two callee parameters still reserve the four home slots; RBP is
        // forced into the save mask: (4 + 1 + 0) | 1 = 5 slots.
        assert_eq!(spec.offset_to_original_rsp(), 40);
        // sub rsp, 40; mov [rsp+32], rbp; lea rbp, [rsp+40]
        assert_eq!(
            spec.prolog(),
            [
                0x48, 0x83, 0xEC, 0x28, //
                0x48, 0x89, 0x6C, 0x24, 0x20, //
                0x48, 0x8D, 0x6C, 0x24, 0x28,
            ]
        );

        let info = view(&spec);
        // The frame-pointer lea extends the last-emitted code's offset to
        // the end of the prolog.
        assert_eq!(info.code(0).unwind_op(), Some(UnwindOp::SaveNonvol));
        assert_eq!(info.code(0).op_info(), Gp::RBP.id());
        assert_eq!(info.code(0).code_offset() as usize, spec.prolog().len());
        assert_eq!(info.size_of_prolog() as usize, spec.prolog().len());

        // mov rbp, [rsp+32]; add rsp, 40; ret
        assert_eq!(
            spec.epilog(),
            [0x48, 0x8B, 0x6C, 0x24, 0x20, 0x48, 0x83, 0xC4, 0x28, 0xC3]
        );
    }

    #[test]
    fn large_allocation_uses_two_codes() {
        let arena = Bump::new();
        let spec =
            FunctionSpecification::new(&arena, -1, 100, 0, 0, BaseRegisterType::None).unwrap();

        assert_eq!(spec.offset_to_original_rsp(), 808);
        // sub rsp, 808
        assert_eq!(spec.prolog(), [0x48, 0x81, 0xEC, 0x28, 0x03, 0x00, 0x00]);

        let info = view(&spec);
        assert_eq!(info.count_of_codes(), 2);
        assert_eq!(info.code(0).unwind_op(), Some(UnwindOp::AllocLarge));
        assert_eq!(info.code(0).op_info(), 0);
        assert_eq!(info.code(1).frame_offset(), 101);

        // add rsp, 808; ret
        assert_eq!(spec.epilog(), [0x48, 0x81, 0xC4, 0x28, 0x03, 0x00, 0x00, 0xC3]);
    }

    #[test]
    fn xmm_save_lands_on_an_aligned_slot() {
        let arena = Bump::new();
        let spec = FunctionSpecification::new(
            &arena,
            -1,
            0,
            Gp::RBX.mask(),
            Xmm::XMM6.mask(),
            BaseRegisterType::None,
        )
        .unwrap();

        // RBX at slot 0, pad slot 1, XMM6 at slots 2-3: (0 + 4 + 0) | 1 = 5.
        assert_eq!(spec.offset_to_original_rsp(), 40);
        // sub rsp, 40; mov [rsp], rbx; movaps [rsp+16], xmm6
        assert_eq!(
            spec.prolog(),
            [
                0x48, 0x83, 0xEC, 0x28, //
                0x48, 0x89, 0x1C, 0x24, //
                0x0F, 0x29, 0x74, 0x24, 0x10,
            ]
        );

        let info = view(&spec);
        assert_eq!(info.count_of_codes(), 5);
        assert_eq!(info.code(0).unwind_op(), Some(UnwindOp::SaveXmm128));
        assert_eq!(info.code(0).op_info(), Xmm::XMM6.id());
        // The companion counts 16-byte slots: quadword slot 2 is slot 1.
        assert_eq!(info.code(1).frame_offset(), 1);
        assert_eq!(info.code(2).unwind_op(), Some(UnwindOp::SaveNonvol));
        assert_eq!(info.code(2).op_info(), Gp::RBX.id());
        assert_eq!(info.code(3).frame_offset(), 0);
        assert_eq!(info.code(4).unwind_op(), Some(UnwindOp::AllocSmall));

        // movaps xmm6, [rsp+16]; mov rbx, [rsp]; add rsp, 40; ret
        assert_eq!(
            spec.epilog(),
            [
                0x0F, 0x28, 0x74, 0x24, 0x10, //
                0x48, 0x8B, 0x1C, 0x24, //
                0x48, 0x83, 0xC4, 0x28, //
                0xC3,
            ]
        );
    }

    #[test]
    fn oversized_frame_is_rejected_before_emission() {
        let arena = Bump::new();
        let result =
            FunctionSpecification::new(&arena, -1, 512, 0, 0, BaseRegisterType::None);
        match result {
            Err(CompileError::InvalidStackAllocation { bytes }) => assert_eq!(bytes, 4104),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("expected stack-size rejection"),
        }
    }

    #[test]
    fn volatile_registers_cannot_be_saved() {
        let arena = Bump::new();
        let result = FunctionSpecification::new(
            &arena,
            -1,
            1,
            Gp::RAX.mask(),
            0,
            BaseRegisterType::None,
        );
        assert!(matches!(
            result,
            Err(CompileError::IllegalSavedRegisters { bank: "rxx", .. })
        ));

        let result = FunctionSpecification::new(
            &arena,
            -1,
            1,
            0,
            Xmm::XMM0.mask(),
            BaseRegisterType::None,
        );
        assert!(matches!(
            result,
            Err(CompileError::IllegalSavedRegisters { bank: "xmm", .. })
        ));
    }

    #[test]
    fn stack_pointer_bit_is_stripped_from_the_save_mask() {
        let arena = Bump::new();
        let spec = FunctionSpecification::new(
            &arena,
            -1,
            0,
            Gp::RSP.mask() | Gp::R12.mask(),
            0,
            BaseRegisterType::None,
        )
        .unwrap();

        // Identical to saving R12 alone; RSP is handled by the allocation.
        let info = view(&spec);
        assert_eq!(info.count_of_codes(), 3);
        assert_eq!(info.code(0).unwind_op(), Some(UnwindOp::SaveNonvol));
        assert_eq!(info.code(0).op_info(), Gp::R12.id());
    }

    #[test]
    fn saves_are_ordered_by_ascending_register_id() {
        let arena = Bump::new();
        let spec = FunctionSpecification::new(
            &arena,
            -1,
            0,
            Gp::RBX.mask() | Gp::R12.mask() | Gp::R15.mask(),
            0,
            BaseRegisterType::None,
        )
        .unwrap();

        // Codes are in epilog order, so the array shows descending ids.
        let info = view(&spec);
        assert_eq!(info.code(0).op_info(), Gp::R15.id());
        assert_eq!(info.code(0).unwind_op(), Some(UnwindOp::SaveNonvol));
        assert_eq!(info.code(1).frame_offset(), 2);
        assert_eq!(info.code(2).op_info(), Gp::R12.id());
        assert_eq!(info.code(3).frame_offset(), 1);
        assert_eq!(info.code(4).op_info(), Gp::RBX.id());
        assert_eq!(info.code(5).frame_offset(), 0);
    }
}
