//! Declared shape of the program being compiled
//!
//! Type inference and call binding need the signatures of user functions
//! and the members of user classes without walking the tree every time.

use fifth_ast::{AssemblyDef, ClassDef, FunctionDef, FunctionKind};
use fifth_types::FifthType;
use rustc_hash::FxHashMap;

/// Signature of a user function or method
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSig {
    /// Name
    pub name: String,
    /// Parameter types
    pub params: Vec<FifthType>,
    /// Return type
    pub return_type: FifthType,
}

impl FunctionSig {
    fn of(function: &FunctionDef) -> Self {
        Self {
            name: function.name.clone(),
            params: function
                .params
                .iter()
                .map(|p| FifthType::parse(&p.type_name))
                .collect(),
            return_type: function.return_fifth_type(),
        }
    }
}

/// Members of a user class
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    /// Class name
    pub name: String,
    /// Fields and properties in declaration order
    pub fields: Vec<(String, FifthType)>,
    /// Methods by name
    pub methods: FxHashMap<String, Vec<FunctionSig>>,
}

impl ClassInfo {
    fn of(class: &ClassDef) -> Self {
        let mut fields: Vec<_> = class
            .fields
            .iter()
            .map(|f| (f.name.clone(), FifthType::parse(&f.type_name)))
            .collect();
        fields.extend(
            class
                .properties
                .iter()
                .map(|p| (p.name.clone(), FifthType::parse(&p.type_name))),
        );

        let mut methods: FxHashMap<String, Vec<FunctionSig>> = FxHashMap::default();
        for method in class.methods.iter().filter(|m| m.kind == FunctionKind::Method) {
            methods
                .entry(method.name.clone())
                .or_default()
                .push(FunctionSig::of(method));
        }
        Self {
            name: class.name.clone(),
            fields,
            methods,
        }
    }

    /// Type of a field or property
    pub fn field_type(&self, name: &str) -> Option<&FifthType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, ty)| ty)
    }

    /// Method overload taking `arity` arguments, or the only one
    pub fn method(&self, name: &str, arity: usize) -> Option<&FunctionSig> {
        pick(self.methods.get(name)?, arity)
    }
}

fn pick(overloads: &[FunctionSig], arity: usize) -> Option<&FunctionSig> {
    overloads
        .iter()
        .find(|f| f.params.len() == arity)
        .or_else(|| overloads.first())
}

/// Function and class index of one assembly
#[derive(Debug, Clone, Default)]
pub struct ProgramIndex {
    functions: FxHashMap<String, Vec<FunctionSig>>,
    classes: FxHashMap<String, ClassInfo>,
}

impl ProgramIndex {
    /// Index every module of `assembly`
    pub fn build(assembly: &AssemblyDef) -> Self {
        let mut index = ProgramIndex::default();
        for function in assembly.functions() {
            index
                .functions
                .entry(function.name.clone())
                .or_default()
                .push(FunctionSig::of(function));
        }
        for class in assembly.classes() {
            index.classes.insert(class.name.clone(), ClassInfo::of(class));
        }
        index
    }

    /// Whether a module function is called `name`
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Module function overload taking `arity` arguments, or the only one
    pub fn function(&self, name: &str, arity: usize) -> Option<&FunctionSig> {
        pick(self.functions.get(name)?, arity)
    }

    /// User class called `name`
    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Whether a user class is called `name`
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Type of `class.member`
    pub fn field_type(&self, class: &str, member: &str) -> Option<&FifthType> {
        self.class(class)?.field_type(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifth_ast::AstBuilder;

    #[test]
    fn test_index_functions_and_classes() {
        let mut b = AstBuilder::new();
        let body = b.block(vec![]);
        let p = b.param("n", "int");
        let one = b.function("f", vec![p], "int", body);
        let body = b.block(vec![]);
        let p = b.param("s", "string");
        let q = b.param("t", "string");
        let two = b.function("f", vec![p, q], "string", body);
        let age = b.field("age", "int");
        let name = b.property("name", "string");
        let person = b.class("Person", vec![age], vec![name], vec![]);
        let module = b.module("main", vec![person], vec![one, two]);
        let program = b.assembly("program", vec![module]);

        let index = ProgramIndex::build(&program);
        assert_eq!(index.function("f", 2).unwrap().return_type, FifthType::STRING);
        assert_eq!(index.function("f", 1).unwrap().return_type, FifthType::INT);
        assert!(index.function("g", 0).is_none());
        assert_eq!(index.field_type("Person", "name"), Some(&FifthType::STRING));
        assert_eq!(index.field_type("Person", "age"), Some(&FifthType::INT));
        assert!(index.has_class("Person"));
    }
}
