// This module is the machine-code backend of the crate, wrapping iced-x86 to turn the
// handful of operations the frame builder and expression compiler need (reg/mem moves,
// stack-pointer adjustment, 128-bit XMM save/restore, lea, ret) into x86-64 bytes.
// Instructions are encoded one at a time so the byte position is exact after every
// emit; the unwind-table builder samples that position in lockstep with the prolog.

//! x86-64 instruction encoding using iced-x86.

use iced_x86::{Code, Encoder, IcedError, Instruction, MemoryOperand, Register};
use thiserror::Error;

use crate::x64::regs::{Gp, Xmm};

const GP64_REGISTERS: [Register; 16] = [
    Register::RAX,
    Register::RCX,
    Register::RDX,
    Register::RBX,
    Register::RSP,
    Register::RBP,
    Register::RSI,
    Register::RDI,
    Register::R8,
    Register::R9,
    Register::R10,
    Register::R11,
    Register::R12,
    Register::R13,
    Register::R14,
    Register::R15,
];

const XMM_REGISTERS: [Register; 16] = [
    Register::XMM0,
    Register::XMM1,
    Register::XMM2,
    Register::XMM3,
    Register::XMM4,
    Register::XMM5,
    Register::XMM6,
    Register::XMM7,
    Register::XMM8,
    Register::XMM9,
    Register::XMM10,
    Register::XMM11,
    Register::XMM12,
    Register::XMM13,
    Register::XMM14,
    Register::XMM15,
];

fn gp64(reg: Gp) -> Register {
    GP64_REGISTERS[reg.id() as usize]
}

fn xmm(reg: Xmm) -> Register {
    XMM_REGISTERS[reg.id() as usize]
}

fn mem(base: Gp, displacement: i32) -> MemoryOperand {
    MemoryOperand::with_base_displ(gp64(base), displacement as i64)
}

/// Errors from instruction encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("assembly error: {0}")]
    Assembly(String),
}

impl From<IcedError> for EncodingError {
    fn from(error: IcedError) -> EncodingError {
        EncodingError::Assembly(error.to_string())
    }
}

/// x86-64 instruction encoder.
///
/// Owns the emitted byte buffer and exposes the operation set the compiler
/// core needs. `current_position` is exact after every emit.
pub struct X64Encoder {
    code: Vec<u8>,
    encoder: Encoder,
}

impl X64Encoder {
    pub fn new() -> X64Encoder {
        X64Encoder::with_capacity(0)
    }

    /// Create an encoder whose buffer starts with the given capacity.
    pub fn with_capacity(capacity: usize) -> X64Encoder {
        X64Encoder {
            code: Vec::with_capacity(capacity),
            encoder: Encoder::new(64),
        }
    }

    /// The bytes emitted so far.
    pub fn buffer(&self) -> &[u8] {
        &self.code
    }

    /// Offset of the next instruction byte.
    pub fn current_position(&self) -> usize {
        self.code.len()
    }

    /// Discard all emitted bytes.
    pub fn reset(&mut self) {
        self.code.clear();
    }

    /// Number of general-purpose registers the target exposes.
    pub fn rxx_count(&self) -> u32 {
        GP64_REGISTERS.len() as u32
    }

    /// Number of vector registers the target exposes.
    pub fn xmm_count(&self) -> u32 {
        XMM_REGISTERS.len() as u32
    }

    fn emit(&mut self, instruction: Instruction) -> Result<(), EncodingError> {
        self.encoder.encode(&instruction, self.code.len() as u64)?;
        let bytes = self.encoder.take_buffer();
        self.code.extend_from_slice(&bytes);
        Ok(())
    }

    /// `sub reg, imm`, selecting the 8-bit immediate form when it fits.
    pub fn sub_reg_imm(&mut self, reg: Gp, imm: i32) -> Result<(), EncodingError> {
        let code = if (-128..=127).contains(&imm) {
            Code::Sub_rm64_imm8
        } else {
            Code::Sub_rm64_imm32
        };
        self.emit(Instruction::with2(code, gp64(reg), imm)?)
    }

    /// `add reg, imm`, selecting the 8-bit immediate form when it fits.
    pub fn add_reg_imm(&mut self, reg: Gp, imm: i32) -> Result<(), EncodingError> {
        let code = if (-128..=127).contains(&imm) {
            Code::Add_rm64_imm8
        } else {
            Code::Add_rm64_imm32
        };
        self.emit(Instruction::with2(code, gp64(reg), imm)?)
    }

    /// `mov dst, src` between 64-bit registers.
    pub fn mov_reg_reg(&mut self, dst: Gp, src: Gp) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(Code::Mov_rm64_r64, gp64(dst), gp64(src))?)
    }

    /// `mov [base + displacement], src`.
    pub fn mov_mem_reg(
        &mut self,
        base: Gp,
        displacement: i32,
        src: Gp,
    ) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(
            Code::Mov_rm64_r64,
            mem(base, displacement),
            gp64(src),
        )?)
    }

    /// `mov dst, [base + displacement]`.
    pub fn mov_reg_mem(
        &mut self,
        dst: Gp,
        base: Gp,
        displacement: i32,
    ) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(
            Code::Mov_r64_rm64,
            gp64(dst),
            mem(base, displacement),
        )?)
    }

    /// `movaps [base + displacement], src`; the address must be 16-byte
    /// aligned at runtime.
    pub fn movaps_store(
        &mut self,
        base: Gp,
        displacement: i32,
        src: Xmm,
    ) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(
            Code::Movaps_xmmm128_xmm,
            mem(base, displacement),
            xmm(src),
        )?)
    }

    /// `movaps dst, [base + displacement]`.
    pub fn movaps_load(
        &mut self,
        dst: Xmm,
        base: Gp,
        displacement: i32,
    ) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(
            Code::Movaps_xmm_xmmm128,
            xmm(dst),
            mem(base, displacement),
        )?)
    }

    /// `lea dst, [base + displacement]`.
    pub fn lea(&mut self, dst: Gp, base: Gp, displacement: i32) -> Result<(), EncodingError> {
        self.emit(Instruction::with2(
            Code::Lea_r64_m,
            gp64(dst),
            mem(base, displacement),
        )?)
    }

    /// `ret`.
    pub fn ret(&mut self) -> Result<(), EncodingError> {
        self.emit(Instruction::with(Code::Retnq))
    }
}

impl Default for X64Encoder {
    fn default() -> X64Encoder {
        X64Encoder::new()
    }
}
