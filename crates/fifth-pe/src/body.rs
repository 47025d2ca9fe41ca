//! Method body encoding
//!
//! Locals and arguments are addressed by name in the instruction model; the
//! encoder maps each name to its declared slot and picks the shortest opcode
//! form for it. Branches are always emitted in their 4-byte form and patched
//! once every label offset is known, so forward and backward jumps are
//! handled alike.

use crate::error::{PeError, PeResult};
use crate::opcode::Opcode;
use crate::writer::ByteWriter;
use fifth_il::{
    verify_method, Arith, BranchKind, CallKind, FieldRef, IlType, Instruction, Load, LocalIr,
    MethodIr, MethodRef, StackOp, Store,
};
use rustc_hash::FxHashMap;

/// Metadata tokens needed by instruction operands
pub trait TokenResolver {
    /// MethodDef or MemberRef token
    fn method_token(&mut self, method: &MethodRef) -> PeResult<u32>;

    /// Field or MemberRef token
    fn field_token(&mut self, field: &FieldRef) -> PeResult<u32>;

    /// TypeDef, TypeRef or TypeSpec token
    fn type_token(&mut self, ty: &IlType) -> PeResult<u32>;

    /// `#US` token for a string literal
    fn string_token(&mut self, text: &str) -> u32;

    /// StandAloneSig token describing the locals
    fn local_sig_token(&mut self, locals: &[LocalIr]) -> PeResult<u32>;
}

const TINY_FORMAT: u8 = 0x2;
const FAT_FORMAT: u16 = 0x3;
const INIT_LOCALS: u16 = 0x10;
const FAT_HEADER_DWORDS: u16 = 3;

/// Encoded body with header
#[derive(Debug, Clone)]
pub struct EncodedBody {
    /// Header followed by code
    pub bytes: Vec<u8>,
    /// Maximum stack depth
    pub max_stack: u16,
    /// Code size without header
    pub code_size: usize,
}

struct BodyBuilder<'m> {
    method: &'m MethodIr,
    code: ByteWriter,
    label_offsets: FxHashMap<&'m str, usize>,
    pending_branches: Vec<(usize, &'m str)>,
}

impl<'m> BodyBuilder<'m> {
    fn new(method: &'m MethodIr) -> Self {
        Self {
            method,
            code: ByteWriter::new(),
            label_offsets: FxHashMap::default(),
            pending_branches: Vec::new(),
        }
    }

    fn op(&mut self, opcode: Opcode) {
        opcode.encode(&mut self.code);
    }

    fn op_token(&mut self, opcode: Opcode, token: u32) {
        self.op(opcode);
        self.code.emit_u32(token);
    }

    fn local_slot(&self, name: &str) -> PeResult<usize> {
        self.method.local_index(name).ok_or_else(|| PeError::UnknownLocal {
            method: self.method.name.clone(),
            name: name.to_string(),
        })
    }

    fn arg_slot(&self, name: &str) -> PeResult<usize> {
        self.method.arg_index(name).ok_or_else(|| PeError::UnknownArg {
            method: self.method.name.clone(),
            name: name.to_string(),
        })
    }

    fn emit_ldc_i4(&mut self, value: i32) {
        if value == -1 {
            self.op(Opcode::LdcI4M1);
        } else if let Some(short) = Opcode::ldc_i4_short(value) {
            self.op(short);
        } else if let Ok(small) = i8::try_from(value) {
            self.op(Opcode::LdcI4S);
            self.code.emit_i8(small);
        } else {
            self.op(Opcode::LdcI4);
            self.code.emit_i32(value);
        }
    }

    fn emit_slot(&mut self, short: [Opcode; 4], byte_form: Opcode, wide_form: Opcode, slot: usize) {
        if let Some(&op) = short.get(slot) {
            self.op(op);
        } else if let Ok(index) = u8::try_from(slot) {
            self.op(byte_form);
            self.code.emit_u8(index);
        } else {
            self.op(wide_form);
            self.code.emit_u16(slot as u16);
        }
    }

    fn emit_branch(&mut self, opcode: Opcode, target: &'m str) {
        self.op(opcode);
        self.pending_branches.push((self.code.offset(), target));
        self.code.emit_i32(0);
    }

    fn emit(&mut self, instruction: &'m Instruction, tokens: &mut impl TokenResolver) -> PeResult<()> {
        match instruction {
            Instruction::Load(load) => match load {
                Load::Int32(value) => self.emit_ldc_i4(*value),
                Load::Int64(value) => {
                    self.op(Opcode::LdcI8);
                    self.code.emit_i64(*value);
                }
                Load::Float32(value) => {
                    self.op(Opcode::LdcR4);
                    self.code.emit_f32(*value);
                }
                Load::Float64(value) => {
                    self.op(Opcode::LdcR8);
                    self.code.emit_f64(*value);
                }
                Load::String(text) => {
                    let token = tokens.string_token(text);
                    self.op_token(Opcode::Ldstr, token);
                }
                Load::Null => self.op(Opcode::Ldnull),
                Load::Local(name) => {
                    let slot = self.local_slot(name)?;
                    self.emit_slot(
                        [Opcode::Ldloc0, Opcode::Ldloc1, Opcode::Ldloc2, Opcode::Ldloc3],
                        Opcode::LdlocS,
                        Opcode::Ldloc,
                        slot,
                    );
                }
                Load::Arg(name) => {
                    let slot = self.arg_slot(name)?;
                    self.emit_slot(
                        [Opcode::Ldarg0, Opcode::Ldarg1, Opcode::Ldarg2, Opcode::Ldarg3],
                        Opcode::LdargS,
                        Opcode::Ldarg,
                        slot,
                    );
                }
                Load::Field(field) => {
                    let token = tokens.field_token(field)?;
                    self.op_token(Opcode::Ldfld, token);
                }
                Load::StaticField(field) => {
                    let token = tokens.field_token(field)?;
                    self.op_token(Opcode::Ldsfld, token);
                }
                Load::NewArray(element) => {
                    let token = tokens.type_token(element)?;
                    self.op_token(Opcode::Newarr, token);
                }
            },
            Instruction::Store(store) => match store {
                Store::Local(name) => {
                    let slot = self.local_slot(name)?;
                    self.emit_slot(
                        [Opcode::Stloc0, Opcode::Stloc1, Opcode::Stloc2, Opcode::Stloc3],
                        Opcode::StlocS,
                        Opcode::Stloc,
                        slot,
                    );
                }
                Store::Arg(name) => {
                    let slot = self.arg_slot(name)?;
                    if let Ok(index) = u8::try_from(slot) {
                        self.op(Opcode::StargS);
                        self.code.emit_u8(index);
                    } else {
                        self.op(Opcode::Starg);
                        self.code.emit_u16(slot as u16);
                    }
                }
                Store::Field(field) => {
                    let token = tokens.field_token(field)?;
                    self.op_token(Opcode::Stfld, token);
                }
                Store::StaticField(field) => {
                    let token = tokens.field_token(field)?;
                    self.op_token(Opcode::Stsfld, token);
                }
                Store::Element(element) => match element {
                    IlType::Bool | IlType::I1 | IlType::U1 => self.op(Opcode::StelemI1),
                    IlType::Char | IlType::I2 => self.op(Opcode::StelemI2),
                    IlType::I4 => self.op(Opcode::StelemI4),
                    IlType::I8 => self.op(Opcode::StelemI8),
                    IlType::R4 => self.op(Opcode::StelemR4),
                    IlType::R8 => self.op(Opcode::StelemR8),
                    IlType::ValueType(_) => {
                        let token = tokens.type_token(element)?;
                        self.op_token(Opcode::Stelem, token);
                    }
                    _ => self.op(Opcode::StelemRef),
                },
            },
            Instruction::Arithmetic(op) => self.op(arith_opcode(*op)),
            Instruction::Branch(branch) => {
                let opcode = match branch.kind {
                    BranchKind::Always => Opcode::Br,
                    BranchKind::IfFalse => Opcode::Brfalse,
                    BranchKind::IfTrue => Opcode::Brtrue,
                };
                self.emit_branch(opcode, branch.target.name());
            }
            Instruction::Call(call) => {
                let opcode = match call.kind {
                    CallKind::Static | CallKind::Instance => Opcode::Call,
                    CallKind::Virtual => Opcode::Callvirt,
                    CallKind::NewObj => Opcode::Newobj,
                };
                let token = tokens.method_token(&call.method)?;
                self.op_token(opcode, token);
            }
            Instruction::Stack(StackOp::Pop) => self.op(Opcode::Pop),
            Instruction::Stack(StackOp::Dup) => self.op(Opcode::Dup),
            Instruction::Box(ty) => {
                let token = tokens.type_token(ty)?;
                self.op_token(Opcode::Box, token);
            }
            Instruction::Return { .. } => self.op(Opcode::Ret),
            Instruction::Label(label) => {
                self.label_offsets.insert(label.name(), self.code.offset());
            }
        }
        Ok(())
    }

    fn patch_branches(&mut self) -> PeResult<()> {
        for &(operand_pos, target) in &self.pending_branches {
            let Some(&target_pos) = self.label_offsets.get(target) else {
                return Err(PeError::UnresolvedLabel {
                    method: self.method.name.clone(),
                    label: target.to_string(),
                });
            };
            // Relative to the instruction that follows the operand
            let offset = target_pos as i32 - (operand_pos as i32 + 4);
            self.code.patch_i32(operand_pos, offset);
        }
        Ok(())
    }
}

fn arith_opcode(op: Arith) -> Opcode {
    match op {
        Arith::Add => Opcode::Add,
        Arith::Sub => Opcode::Sub,
        Arith::Mul => Opcode::Mul,
        Arith::Div => Opcode::Div,
        Arith::Rem => Opcode::Rem,
        Arith::And => Opcode::And,
        Arith::Or => Opcode::Or,
        Arith::Xor => Opcode::Xor,
        Arith::Shl => Opcode::Shl,
        Arith::Shr => Opcode::Shr,
        Arith::Neg => Opcode::Neg,
        Arith::Not => Opcode::Not,
        Arith::Ceq => Opcode::Ceq,
        Arith::Cgt => Opcode::Cgt,
        Arith::Clt => Opcode::Clt,
        Arith::ConvR4 => Opcode::ConvR4,
        Arith::ConvR8 => Opcode::ConvR8,
        Arith::ConvI4 => Opcode::ConvI4,
        Arith::ConvI8 => Opcode::ConvI8,
        Arith::Nop => Opcode::Nop,
    }
}

/// Encode a method body with its tiny or fat header
pub fn encode_body(method: &MethodIr, tokens: &mut impl TokenResolver) -> PeResult<EncodedBody> {
    let max_stack = verify_method(method).map_err(|source| PeError::Verify {
        method: method.name.clone(),
        source,
    })?;

    let mut builder = BodyBuilder::new(method);
    for instruction in &method.body {
        builder.emit(instruction, tokens)?;
    }
    builder.patch_branches()?;
    let code = builder.code.into_bytes();

    let mut w = ByteWriter::with_capacity(code.len() + 12);
    let tiny = code.len() < 64 && max_stack <= 8 && method.locals.is_empty();
    if tiny {
        w.emit_u8(((code.len() as u8) << 2) | TINY_FORMAT);
    } else {
        let mut flags = FAT_FORMAT | (FAT_HEADER_DWORDS << 12);
        let local_sig = if method.locals.is_empty() {
            0
        } else {
            flags |= INIT_LOCALS;
            tokens.local_sig_token(&method.locals)?
        };
        w.emit_u16(flags);
        w.emit_u16(max_stack);
        w.emit_u32(code.len() as u32);
        w.emit_u32(local_sig);
    }
    w.emit_bytes(&code);

    tracing::trace!(
        method = %method.name,
        code_size = code.len(),
        max_stack,
        tiny,
        "encoded method body"
    );

    Ok(EncodedBody {
        bytes: w.into_bytes(),
        max_stack,
        code_size: code.len(),
    })
}
