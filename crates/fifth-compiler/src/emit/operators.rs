//! Binary and unary operators
//!
//! `!=`, `<=`, `>=` and logical not have no opcode of their own. Each is
//! the comparison of the opposite sense followed by a test against zero,
//! for decimal operator methods as for opcodes.

use super::Emitter;
use fifth_ast::{BinaryOp, Expr, ExprKind, ExprRef, UnaryOp};
use fifth_il::{Arith, IlType, Instruction, InstructionSequence, Load, MethodRef, TypeRef};
use fifth_types::{FifthType, Primitive};

fn system_method(owner: &str, name: &str, params: Vec<IlType>, returns: IlType) -> MethodRef {
    MethodRef::static_method(TypeRef::system(owner), name, params, returns)
}

fn decimal_type() -> IlType {
    IlType::ValueType(TypeRef::system("System.Decimal"))
}

/// `System.String::Concat` over two strings, or two objects
fn concat(params: IlType) -> MethodRef {
    system_method("System.String", "Concat", vec![params.clone(), params], IlType::String)
}

fn math_pow() -> MethodRef {
    system_method("System.Math", "Pow", vec![IlType::R8, IlType::R8], IlType::R8)
}

fn string_equality() -> MethodRef {
    system_method(
        "System.String",
        "op_Equality",
        vec![IlType::String, IlType::String],
        IlType::Bool,
    )
}

/// Operator method of `System.Decimal` implementing `op`, and whether its
/// result is negated afterwards
fn decimal_operator(op: BinaryOp) -> Option<(MethodRef, bool)> {
    let (name, returns, negate) = match op {
        BinaryOp::Add => ("op_Addition", decimal_type(), false),
        BinaryOp::Sub => ("op_Subtraction", decimal_type(), false),
        BinaryOp::Mul => ("op_Multiply", decimal_type(), false),
        BinaryOp::Div => ("op_Division", decimal_type(), false),
        BinaryOp::Rem | BinaryOp::Mod => ("op_Modulus", decimal_type(), false),
        BinaryOp::Eq => ("op_Equality", IlType::Bool, false),
        BinaryOp::Ne => ("op_Equality", IlType::Bool, true),
        BinaryOp::Lt => ("op_LessThan", IlType::Bool, false),
        BinaryOp::Gt => ("op_GreaterThan", IlType::Bool, false),
        BinaryOp::Le => ("op_GreaterThan", IlType::Bool, true),
        BinaryOp::Ge => ("op_LessThan", IlType::Bool, true),
        _ => return None,
    };
    let method = system_method(
        "System.Decimal",
        name,
        vec![decimal_type(), decimal_type()],
        returns,
    );
    Some((method, negate))
}

/// `System.Decimal::op_Implicit` from an integral operand
fn decimal_widening(from: Primitive) -> Option<MethodRef> {
    let param = match from {
        Primitive::Long => IlType::I8,
        Primitive::Int | Primitive::Short | Primitive::Byte | Primitive::Char => IlType::I4,
        _ => return None,
    };
    Some(system_method("System.Decimal", "op_Implicit", vec![param], decimal_type()))
}

/// `System.Decimal::op_Explicit` to the arithmetic type `to`
fn decimal_narrowing(to: Primitive) -> Option<MethodRef> {
    let returns = match to {
        Primitive::Int => IlType::I4,
        Primitive::Long => IlType::I8,
        Primitive::Float => IlType::R4,
        Primitive::Double => IlType::R8,
        _ => return None,
    };
    Some(system_method("System.Decimal", "op_Explicit", vec![decimal_type()], returns))
}

/// `<cmp>; ldc.i4.0; ceq`
fn negated(compare: Arith) -> Vec<Instruction> {
    vec![
        Instruction::Arithmetic(compare),
        Instruction::Load(Load::Int32(0)),
        Instruction::Arithmetic(Arith::Ceq),
    ]
}

/// Instructions applying `op` to the two values on the stack
fn opcodes(op: BinaryOp) -> Vec<Instruction> {
    let single = |arith| vec![Instruction::Arithmetic(arith)];
    match op {
        BinaryOp::Add => single(Arith::Add),
        BinaryOp::Sub => single(Arith::Sub),
        BinaryOp::Mul => single(Arith::Mul),
        BinaryOp::Div => single(Arith::Div),
        BinaryOp::Rem | BinaryOp::Mod => single(Arith::Rem),
        BinaryOp::BitAnd | BinaryOp::And => single(Arith::And),
        BinaryOp::BitOr | BinaryOp::Or => single(Arith::Or),
        BinaryOp::BitXor | BinaryOp::Xor => single(Arith::Xor),
        BinaryOp::Shl => single(Arith::Shl),
        BinaryOp::Shr => single(Arith::Shr),
        BinaryOp::Eq => single(Arith::Ceq),
        BinaryOp::Ne => negated(Arith::Ceq),
        BinaryOp::Lt => single(Arith::Clt),
        BinaryOp::Gt => single(Arith::Cgt),
        BinaryOp::Le => negated(Arith::Cgt),
        BinaryOp::Ge => negated(Arith::Clt),
        // Lowered to calls before reaching here
        BinaryOp::Pow | BinaryOp::Concat => Vec::new(),
    }
}

/// Conversion to the arithmetic type `to`
fn conversion(to: Primitive) -> Option<Arith> {
    match to {
        Primitive::Int => Some(Arith::ConvI4),
        Primitive::Long => Some(Arith::ConvI8),
        Primitive::Float => Some(Arith::ConvR4),
        Primitive::Double => Some(Arith::ConvR8),
        _ => None,
    }
}

/// The constant one in the representation of `ty`
fn one(ty: &FifthType) -> Load {
    match ty.primitive() {
        Some(Primitive::Long) => Load::Int64(1),
        Some(Primitive::Float) => Load::Float32(1.0),
        Some(Primitive::Double) => Load::Float64(1.0),
        _ => Load::Int32(1),
    }
}

impl Emitter<'_, '_> {
    pub(super) fn binary(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        lhs: &ExprRef,
        rhs: &ExprRef,
    ) -> InstructionSequence {
        let left = self.type_of(lhs);
        let right = self.type_of(rhs);
        match op {
            BinaryOp::Concat => return self.concat(lhs, rhs),
            BinaryOp::Add
                if left.is_string() || right.is_string() || self.type_of(expr).is_string() =>
            {
                return self.concat(lhs, rhs)
            }
            BinaryOp::Pow => return self.power(lhs, rhs),
            BinaryOp::Eq | BinaryOp::Ne if left.is_string() && right.is_string() => {
                let mut seq = self.expression(lhs);
                seq.append(self.expression(rhs));
                seq.push(Instruction::call(string_equality(), 2));
                if op == BinaryOp::Ne {
                    seq.push(Instruction::Load(Load::Int32(0)));
                    seq.push(Instruction::Arithmetic(Arith::Ceq));
                }
                return seq;
            }
            _ => {}
        }

        let arithmetic = op != BinaryOp::Shl && op != BinaryOp::Shr && !op.is_logical();
        let common = FifthType::promote_numeric(&left, &right)
            .and_then(|ty| ty.primitive())
            .filter(|_| arithmetic);

        if common == Some(Primitive::Decimal) {
            if let Some((method, negate)) = decimal_operator(op) {
                let mut seq = self.operand(lhs, &left, Primitive::Decimal);
                seq.append(self.operand(rhs, &right, Primitive::Decimal));
                seq.push(Instruction::call(method, 2));
                if negate {
                    seq.push(Instruction::Load(Load::Int32(0)));
                    seq.push(Instruction::Arithmetic(Arith::Ceq));
                }
                return seq;
            }
        }

        let mut seq = match common {
            Some(to) => self.operand(lhs, &left, to),
            None => self.expression(lhs),
        };
        seq.append(match common {
            Some(to) => self.operand(rhs, &right, to),
            None => self.expression(rhs),
        });
        seq.extend(opcodes(op));
        seq
    }

    /// Evaluate `expr` of type `ty` and convert it to the arithmetic type `to`
    fn operand(&mut self, expr: &ExprRef, ty: &FifthType, to: Primitive) -> InstructionSequence {
        let mut seq = self.expression(expr);
        let Some(from) = ty.primitive().filter(|p| p.is_numeric()) else {
            return seq;
        };
        if from == to {
            return seq;
        }
        if to == Primitive::Decimal {
            if let Some(widen) = decimal_widening(from) {
                seq.push(Instruction::call(widen, 1));
            }
        } else if from == Primitive::Decimal {
            if let Some(narrow) = decimal_narrowing(to) {
                seq.push(Instruction::call(narrow, 1));
            }
        } else if let Some(convert) = conversion(to) {
            seq.push(Instruction::Arithmetic(convert));
        }
        seq
    }

    /// String concatenation; value-type operands are boxed for the object overload
    fn concat(&mut self, lhs: &ExprRef, rhs: &ExprRef) -> InstructionSequence {
        let left = self.il_type_of(lhs);
        let right = self.il_type_of(rhs);
        let mut seq = self.expression(lhs);
        if left == IlType::String && right == IlType::String {
            seq.append(self.expression(rhs));
            seq.push(Instruction::call(concat(IlType::String), 2));
        } else {
            self.coerce(&left, &IlType::Object, &mut seq);
            seq.append(self.expression(rhs));
            self.coerce(&right, &IlType::Object, &mut seq);
            seq.push(Instruction::call(concat(IlType::Object), 2));
        }
        seq
    }

    /// `a ** b` is computed in floating point and always narrowed to int
    fn power(&mut self, lhs: &ExprRef, rhs: &ExprRef) -> InstructionSequence {
        let mut seq = self.expression(lhs);
        seq.push(Instruction::Arithmetic(Arith::ConvR8));
        seq.append(self.expression(rhs));
        seq.push(Instruction::Arithmetic(Arith::ConvR8));
        seq.push(Instruction::call(math_pow(), 2));
        seq.push(Instruction::Arithmetic(Arith::ConvI4));
        seq
    }

    pub(super) fn unary(&mut self, op: UnaryOp, operand: &ExprRef) -> InstructionSequence {
        match op {
            UnaryOp::Plus => self.expression(operand),
            UnaryOp::Neg => {
                let mut seq = self.expression(operand);
                if self.type_of(operand).primitive() == Some(Primitive::Decimal) {
                    seq.push(Instruction::call(
                        system_method(
                            "System.Decimal",
                            "op_UnaryNegation",
                            vec![decimal_type()],
                            decimal_type(),
                        ),
                        1,
                    ));
                } else {
                    seq.push(Instruction::Arithmetic(Arith::Neg));
                }
                seq
            }
            UnaryOp::Not => {
                let mut seq = self.expression(operand);
                seq.push(Instruction::Load(Load::Int32(0)));
                seq.push(Instruction::Arithmetic(Arith::Ceq));
                seq
            }
            UnaryOp::Increment | UnaryOp::Decrement => self.step(op, operand),
        }
    }

    /// `x++` / `x--` left as an expression: yields the old value, stores the new
    fn step(&mut self, op: UnaryOp, operand: &ExprRef) -> InstructionSequence {
        let arith = if op == UnaryOp::Increment {
            Arith::Add
        } else {
            Arith::Sub
        };
        let ty = self.type_of(operand);
        let mut updated = self.expression(operand);
        updated.push(Instruction::Load(one(&ty)));
        updated.push(Instruction::Arithmetic(arith));

        match &operand.kind {
            ExprKind::VarRef(name) => {
                let mut seq = self.expression(operand);
                let value_ty = self.types.il_type(&ty);
                seq.append(self.store_name(name, updated, &value_ty));
                seq
            }
            _ => updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_comparisons() {
        assert_eq!(
            opcodes(BinaryOp::Ne),
            negated(Arith::Ceq)
        );
        assert_eq!(
            opcodes(BinaryOp::Le),
            vec![
                Instruction::Arithmetic(Arith::Cgt),
                Instruction::Load(Load::Int32(0)),
                Instruction::Arithmetic(Arith::Ceq),
            ]
        );
        assert_eq!(
            opcodes(BinaryOp::Ge),
            vec![
                Instruction::Arithmetic(Arith::Clt),
                Instruction::Load(Load::Int32(0)),
                Instruction::Arithmetic(Arith::Ceq),
            ]
        );
        assert_eq!(opcodes(BinaryOp::Lt), vec![Instruction::Arithmetic(Arith::Clt)]);
    }

    #[test]
    fn test_decimal_operators_map_to_runtime_methods() {
        let (add, negate) = decimal_operator(BinaryOp::Add).expect("op_Addition");
        assert_eq!(add.name, "op_Addition");
        assert_eq!(add.return_type, decimal_type());
        assert!(!negate);
        let (lt, _) = decimal_operator(BinaryOp::Lt).expect("op_LessThan");
        assert_eq!(lt.return_type, IlType::Bool);
        assert!(decimal_operator(BinaryOp::Shl).is_none());
    }

    #[test]
    fn test_decimal_composite_comparisons_negate() {
        for (op, name) in [
            (BinaryOp::Ne, "op_Equality"),
            (BinaryOp::Le, "op_GreaterThan"),
            (BinaryOp::Ge, "op_LessThan"),
        ] {
            let (method, negate) = decimal_operator(op).expect("decimal comparison");
            assert_eq!(method.name, name);
            assert!(negate);
        }
    }

    #[test]
    fn test_decimal_narrowing_uses_explicit_operator() {
        let narrow = decimal_narrowing(Primitive::Long).expect("op_Explicit");
        assert_eq!(narrow.name, "op_Explicit");
        assert_eq!(narrow.params, vec![decimal_type()]);
        assert_eq!(narrow.return_type, IlType::I8);
        assert!(decimal_narrowing(Primitive::Bool).is_none());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(conversion(Primitive::Double), Some(Arith::ConvR8));
        assert_eq!(conversion(Primitive::String), None);
        assert_eq!(one(&FifthType::DOUBLE), Load::Float64(1.0));
    }
}
