//! Mapping from Fifth and host types to instruction-level types

use fifth_il::{IlType, MethodRef, TypeRef};
use fifth_types::{FifthType, HostType, HostTypeProvider, MethodSignature, Primitive};

/// Assembly assumed for host types the signature table does not know
const FALLBACK_ASSEMBLY: &str = fifth_il::types::SYSTEM_RUNTIME;

/// Maps types and signatures onto [`IlType`] and member references
#[derive(Clone, Copy)]
pub struct TypeMapper<'h> {
    host: &'h dyn HostTypeProvider,
}

impl<'h> TypeMapper<'h> {
    pub fn new(host: &'h dyn HostTypeProvider) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &'h dyn HostTypeProvider {
        self.host
    }

    /// Instruction type of a Fifth type; unknown types become `object`
    pub fn il_type(&self, ty: &FifthType) -> IlType {
        match ty {
            FifthType::Unknown | FifthType::Function { .. } => IlType::Object,
            FifthType::Void => IlType::Void,
            FifthType::Primitive(p) => self.primitive(*p),
            FifthType::Named(name) => IlType::Class(TypeRef::local(name)),
            FifthType::Host(host) => self.host_type(host),
            FifthType::Array(element) | FifthType::List(element) => self.il_type(element).array_of(),
        }
    }

    /// Instruction type of a host runtime type
    pub fn host_type(&self, host: &HostType) -> IlType {
        if host.is_void() {
            return IlType::Void;
        }
        if host.is_object() {
            return IlType::Object;
        }
        if let Some(element) = host.element() {
            return self.host_type(&element).array_of();
        }
        if let Some(p) = host.primitive() {
            return self.primitive(p);
        }
        let reference = self.type_ref(host);
        if self.host.is_value_type(host) {
            IlType::ValueType(reference)
        } else {
            IlType::Class(reference)
        }
    }

    /// Reference to a host type, qualified by its defining assembly
    pub fn type_ref(&self, host: &HostType) -> TypeRef {
        let assembly = self.host.assembly_of(host).unwrap_or(FALLBACK_ASSEMBLY);
        TypeRef::external(assembly, host.name())
    }

    fn primitive(&self, p: Primitive) -> IlType {
        match p {
            Primitive::Bool => IlType::Bool,
            Primitive::Char => IlType::Char,
            Primitive::Byte => IlType::U1,
            Primitive::Short => IlType::I2,
            Primitive::Int => IlType::I4,
            Primitive::Long => IlType::I8,
            Primitive::Float => IlType::R4,
            Primitive::Double => IlType::R8,
            Primitive::Decimal => IlType::ValueType(TypeRef::system("System.Decimal")),
            Primitive::String => IlType::String,
        }
    }

    /// Reference to a host method
    pub fn method_ref(&self, method: &MethodSignature) -> MethodRef {
        let owner = self.type_ref(&method.declaring_type);
        let params = method.param_types().map(|p| self.host_type(p)).collect();
        let returns = self.host_type(&method.return_type);
        if method.is_static {
            MethodRef::static_method(owner, method.name.clone(), params, returns)
        } else {
            MethodRef::instance_method(owner, method.name.clone(), params, returns)
        }
    }

    /// Whether values of `ty` need boxing to pass as `object`
    pub fn is_value_type(&self, ty: &IlType) -> bool {
        matches!(
            ty,
            IlType::Bool
                | IlType::Char
                | IlType::I1
                | IlType::U1
                | IlType::I2
                | IlType::I4
                | IlType::I8
                | IlType::R4
                | IlType::R8
                | IlType::ValueType(_)
        )
    }
}
