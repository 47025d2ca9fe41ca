//! Literals, declared defaults and zero values

use fifth_ast::Literal;
use fifth_il::{IlType, Instruction, InstructionSequence, Load, MethodRef, TypeRef};
use fifth_types::DefaultValue;

fn decimal_type() -> IlType {
    IlType::ValueType(TypeRef::system("System.Decimal"))
}

/// `System.Decimal::Parse(string, IFormatProvider)`
fn decimal_parse() -> MethodRef {
    MethodRef::static_method(
        TypeRef::system("System.Decimal"),
        "Parse",
        vec![
            IlType::String,
            IlType::Class(TypeRef::system("System.IFormatProvider")),
        ],
        decimal_type(),
    )
}

/// `System.Globalization.CultureInfo::get_InvariantCulture()`
fn invariant_culture() -> MethodRef {
    let culture = TypeRef::system("System.Globalization.CultureInfo");
    MethodRef::static_method(
        culture.clone(),
        "get_InvariantCulture",
        Vec::new(),
        IlType::Class(culture),
    )
}

/// Decimal constants are parsed at run time from their invariant text
pub(super) fn decimal(text: &str) -> InstructionSequence {
    InstructionSequence::from(vec![
        Instruction::Load(Load::String(text.to_string())),
        Instruction::call(invariant_culture(), 0),
        Instruction::call(decimal_parse(), 2),
    ])
}

pub(super) fn literal(literal: &Literal) -> InstructionSequence {
    let load = match literal {
        Literal::Int(v) => Load::Int32(*v),
        Literal::Long(v) => Load::Int64(*v),
        Literal::Float(v) => Load::Float32(*v),
        Literal::Double(v) => Load::Float64(*v),
        Literal::Bool(v) => Load::Int32(i32::from(*v)),
        Literal::Char(c) => Load::Int32(*c as i32),
        Literal::String(s) => Load::String(s.clone()),
        Literal::Decimal(text) => return decimal(text),
    };
    InstructionSequence::from(vec![Instruction::Load(load)])
}

/// Declared default of an omitted parameter of type `ty`
pub(super) fn default_value(default: &DefaultValue, ty: &IlType) -> InstructionSequence {
    let load = match (default, ty) {
        (DefaultValue::Null, _) => return zero_value(ty),
        (DefaultValue::Bool(v), _) => Load::Int32(i32::from(*v)),
        (DefaultValue::Int(v), IlType::I8) => Load::Int64(*v),
        (DefaultValue::Int(v), IlType::R4) => Load::Float32(*v as f32),
        (DefaultValue::Int(v), IlType::R8) => Load::Float64(*v as f64),
        (DefaultValue::Int(v), _) => Load::Int32(*v as i32),
        (DefaultValue::Float(v), IlType::R4) => Load::Float32(*v as f32),
        (DefaultValue::Float(v), _) => Load::Float64(*v),
        (DefaultValue::String(s), _) => Load::String(s.clone()),
    };
    InstructionSequence::from(vec![Instruction::Load(load)])
}

/// Zero or null of `ty`; nothing for `void`
pub(super) fn zero_value(ty: &IlType) -> InstructionSequence {
    let load = match ty {
        IlType::Void => return InstructionSequence::new(),
        IlType::Bool | IlType::Char | IlType::I1 | IlType::U1 | IlType::I2 | IlType::I4 => {
            Load::Int32(0)
        }
        IlType::I8 => Load::Int64(0),
        IlType::R4 => Load::Float32(0.0),
        IlType::R8 => Load::Float64(0.0),
        IlType::ValueType(reference) if reference.full_name() == "System.Decimal" => {
            return decimal("0");
        }
        // Other value types have no constant form
        IlType::ValueType(_) => Load::Int32(0),
        IlType::String | IlType::Object | IlType::Class(_) | IlType::SzArray(_) => Load::Null,
    };
    InstructionSequence::from(vec![Instruction::Load(load)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decimal_literal_is_parsed_invariantly() {
        let seq = literal(&Literal::Decimal("12.50".into()));
        let text: Vec<String> = seq
            .iter()
            .map(|i| match i {
                Instruction::Call(call) => call.method.name.clone(),
                Instruction::Load(Load::String(s)) => s.clone(),
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(text, ["12.50", "get_InvariantCulture", "Parse"]);
        assert_eq!(seq.net_stack_effect(), 1);
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(
            literal(&Literal::Bool(true)).instructions(),
            &[Instruction::Load(Load::Int32(1))]
        );
        assert_eq!(
            literal(&Literal::Char('A')).instructions(),
            &[Instruction::Load(Load::Int32(65))]
        );
        assert_eq!(
            literal(&Literal::Long(7)).instructions(),
            &[Instruction::Load(Load::Int64(7))]
        );
    }

    #[test]
    fn test_defaults_follow_the_parameter_type() {
        assert_eq!(
            default_value(&DefaultValue::Int(2), &IlType::R8).instructions(),
            &[Instruction::Load(Load::Float64(2.0))]
        );
        assert_eq!(
            default_value(&DefaultValue::Null, &IlType::String).instructions(),
            &[Instruction::Load(Load::Null)]
        );
        assert!(zero_value(&IlType::Void).is_empty());
        assert_eq!(zero_value(&decimal_type()).net_stack_effect(), 1);
    }
}
