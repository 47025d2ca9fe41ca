//! Per-function emission state

use fifth_ast::FunctionDef;
use fifth_il::Label;
use fifth_semantic::TypeEnvironment;
use fifth_types::FifthType;

/// Counters, slots and scopes of the function being emitted.
///
/// Created once per compilation and reset by [`EmitContext::begin_function`];
/// nothing carries over from one function to the next.
#[derive(Debug, Default)]
pub struct EmitContext {
    next_label: u32,
    params: Vec<(String, FifthType)>,
    locals: Vec<(String, FifthType)>,
    env: TypeEnvironment,
    class: Option<String>,
    function: String,
    return_type: FifthType,
}

impl EmitContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for `function`, declared in `class` when it is a method
    pub fn begin_function(&mut self, function: &FunctionDef, class: Option<&str>) {
        self.next_label = 0;
        self.params = function
            .params
            .iter()
            .map(|p| (p.name.clone(), FifthType::parse(&p.type_name)))
            .collect();
        self.locals.clear();
        self.env = TypeEnvironment::for_function(function, class);
        self.class = class.map(str::to_string);
        self.function = function.name.clone();
        self.return_type = function.return_fifth_type();
    }

    /// Fresh label `{prefix}_{n}`; `n` increases for the whole function
    pub fn label(&mut self, prefix: &str) -> Label {
        let label = Label::new(format!("{}_{}", prefix, self.next_label));
        self.next_label += 1;
        label
    }

    /// Number of labels handed out so far
    pub fn labels_issued(&self) -> u32 {
        self.next_label
    }

    /// Declare a local. A name declared twice keeps its first slot and type.
    pub fn declare_local(&mut self, name: &str, ty: FifthType) {
        match self.locals.iter().find(|(n, _)| n == name) {
            Some((_, slot)) => {
                let slot = slot.clone();
                self.env.declare(name, slot);
            }
            None => {
                self.env.declare(name, ty.clone());
                self.locals.push((name.to_string(), ty));
            }
        }
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.locals.iter().any(|(n, _)| n == name)
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.params.iter().any(|(n, _)| n == name)
    }

    /// Locals in slot order
    pub fn locals(&self) -> &[(String, FifthType)] {
        &self.locals
    }

    pub fn env(&self) -> &TypeEnvironment {
        &self.env
    }

    pub fn push_scope(&mut self) {
        self.env.push_scope();
    }

    pub fn pop_scope(&mut self) {
        self.env.pop_scope();
    }

    /// Enclosing class, inside a method or constructor
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn return_type(&self) -> &FifthType {
        &self.return_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifth_ast::AstBuilder;

    #[test]
    fn test_labels_are_monotonic_and_reset_per_function() {
        let mut b = AstBuilder::new();
        let body = b.block(vec![]);
        let f = b.function("f", vec![], "void", body);

        let mut cx = EmitContext::new();
        cx.begin_function(&f, None);
        assert_eq!(cx.label("IL_false").name(), "IL_false_0");
        assert_eq!(cx.label("IL_end").name(), "IL_end_1");
        assert_eq!(cx.label("IL_while_start").name(), "IL_while_start_2");
        assert_eq!(cx.labels_issued(), 3);

        cx.begin_function(&f, None);
        assert_eq!(cx.label("IL_false").name(), "IL_false_0");
    }

    #[test]
    fn test_locals_keep_their_first_slot() {
        let mut b = AstBuilder::new();
        let param = b.param("n", "int");
        let body = b.block(vec![]);
        let f = b.function("f", vec![param], "int", body);

        let mut cx = EmitContext::new();
        cx.begin_function(&f, None);
        cx.declare_local("a", FifthType::INT);
        cx.declare_local("b", FifthType::STRING);
        cx.declare_local("a", FifthType::DOUBLE);
        let names: Vec<_> = cx.locals().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(cx.locals()[0].1, FifthType::INT);
        assert!(cx.is_param("n"));
        assert!(!cx.is_local("n"));
        assert_eq!(cx.return_type(), &FifthType::INT);
    }
}
