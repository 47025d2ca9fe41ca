//! Type inference for expressions
//!
//! [`TypeInference::infer`] answers `None` whenever no local determination
//! is possible; callers fall back to a default instead of reporting an
//! error. A type already recorded on the node wins over inference.

use crate::program::ProgramIndex;
use crate::resolve::{MethodResolver, Resolution};
use fifth_ast::*;
use fifth_types::{FifthType, HostType, HostTypeProvider, Primitive};
use rustc_hash::FxHashMap;

/// Names visible at a point of a function body, innermost scope last
#[derive(Debug, Clone, Default)]
pub struct TypeEnvironment {
    scopes: Vec<FxHashMap<String, FifthType>>,
    class: Option<String>,
    return_type: FifthType,
}

impl TypeEnvironment {
    /// Empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment at the top of `function`'s body
    pub fn for_function(function: &FunctionDef, class: Option<&str>) -> Self {
        let mut env = TypeEnvironment {
            scopes: Vec::new(),
            class: class.map(str::to_string),
            return_type: function.return_fifth_type(),
        };
        env.push_scope();
        for param in &function.params {
            env.declare(&param.name, FifthType::parse(&param.type_name));
        }
        env
    }

    /// Open a nested scope
    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// Close the innermost scope
    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Declare `name` in the innermost scope
    pub fn declare(&mut self, name: &str, ty: FifthType) {
        if self.scopes.is_empty() {
            self.push_scope();
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    /// Type of a local or parameter
    pub fn lookup(&self, name: &str) -> Option<&FifthType> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Enclosing class, inside a method
    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Declared return type of the enclosing function
    pub fn return_type(&self) -> &FifthType {
        &self.return_type
    }
}

/// What the left side of a member access denotes
#[derive(Debug, Clone, PartialEq)]
pub enum Qualifier {
    /// A host type named by a capitalized identifier: `Math.Sqrt(x)`
    HostType(HostType),
    /// A user class named by a capitalized identifier
    Class(String),
    /// A value
    Value(Option<FifthType>),
}

/// Expression typing over the program's declarations and the host surface
pub struct TypeInference<'h> {
    program: ProgramIndex,
    resolver: MethodResolver<'h>,
}

impl<'h> TypeInference<'h> {
    /// Inference over `program`, calling into `host`
    pub fn new(program: ProgramIndex, host: &'h dyn HostTypeProvider) -> Self {
        Self {
            program,
            resolver: MethodResolver::new(host),
        }
    }

    /// The program index
    pub fn program(&self) -> &ProgramIndex {
        &self.program
    }

    /// The external method resolver
    pub fn resolver(&self) -> &MethodResolver<'h> {
        &self.resolver
    }

    /// The host signature provider
    pub fn host(&self) -> &'h dyn HostTypeProvider {
        self.resolver.host()
    }

    /// Infer the type of `expr`
    pub fn infer(&self, expr: &Expr, env: &TypeEnvironment) -> Option<FifthType> {
        if let Some(ty) = expr.ty().filter(|ty| !ty.is_unknown()) {
            return Some(ty.clone());
        }
        match &expr.kind {
            ExprKind::Literal(literal) => Some(literal_type(literal)),
            ExprKind::VarRef(name) => self.variable_type(name, env),
            ExprKind::Binary { op, lhs, rhs } => self.binary_type(*op, lhs, rhs, env),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => Some(FifthType::BOOL),
                UnaryOp::Neg | UnaryOp::Plus | UnaryOp::Increment | UnaryOp::Decrement => {
                    self.infer(operand, env)
                }
            },
            ExprKind::MemberAccess { lhs, rhs } => match rhs {
                Some(rhs) => self.member_type(lhs, rhs, env),
                None => self.infer(lhs, env),
            },
            ExprKind::Call { name, args, target } => self.call_type(name, args, target, env),
            ExprKind::ObjectInit { type_name, .. } => Some(FifthType::parse(type_name)),
            ExprKind::List { elements } => {
                let element = elements
                    .first()
                    .and_then(|e| self.infer(e, env))
                    .unwrap_or(FifthType::Host(HostType::object()));
                Some(FifthType::List(Box::new(element)))
            }
            ExprKind::ListComprehension { source, .. } => match self.infer(source, env) {
                Some(ty @ (FifthType::List(_) | FifthType::Array(_))) => Some(ty),
                _ => Some(FifthType::List(Box::new(FifthType::Host(HostType::object())))),
            },
            ExprKind::Triple { .. } => Some(FifthType::Host(HostType::triple())),
            ExprKind::Graph { .. } => Some(FifthType::Host(HostType::graph())),
        }
    }

    fn variable_type(&self, name: &str, env: &TypeEnvironment) -> Option<FifthType> {
        if let Some(ty) = env.lookup(name) {
            return (!ty.is_unknown()).then(|| ty.clone());
        }
        let class = env.class()?;
        self.program.field_type(class, name).cloned()
    }

    fn binary_type(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        env: &TypeEnvironment,
    ) -> Option<FifthType> {
        if op.is_comparison() || op.is_logical() {
            return Some(FifthType::BOOL);
        }
        match op {
            BinaryOp::Concat => return Some(FifthType::STRING),
            // Power is always narrowed back to an integer
            BinaryOp::Pow => return Some(FifthType::INT),
            _ => {}
        }

        let left = self.infer(lhs, env);
        let right = self.infer(rhs, env);
        if op == BinaryOp::Add {
            if left.as_ref().is_some_and(FifthType::is_string)
                || right.as_ref().is_some_and(FifthType::is_string)
            {
                return Some(FifthType::STRING);
            }
            if let (Some(l), Some(r)) = (&left, &right) {
                if is_rdf(l) && is_rdf(r) {
                    return Some(FifthType::Host(HostType::graph()));
                }
            }
        }
        match op {
            BinaryOp::Shl | BinaryOp::Shr => left,
            _ => match (left, right) {
                (Some(l), Some(r)) => FifthType::promote_numeric(&l, &r).or(Some(l)),
                (Some(known), None) | (None, Some(known)) => Some(known),
                (None, None) => None,
            },
        }
    }

    /// Classify the left side of a member access
    pub fn qualifier(&self, lhs: &Expr, env: &TypeEnvironment) -> Qualifier {
        if let Some(name) = lhs.var_name() {
            if self.is_type_name(name, env) {
                if self.program.has_class(name) {
                    return Qualifier::Class(name.to_string());
                }
                if let Some(info) = self.host().find_type(name) {
                    return Qualifier::HostType(info.name.clone());
                }
            }
        }
        Qualifier::Value(self.infer(lhs, env))
    }

    /// Whether `name` reads as a type name rather than a variable here
    pub fn is_type_name(&self, name: &str, env: &TypeEnvironment) -> bool {
        name.starts_with(|c: char| c.is_ascii_uppercase())
            && env.lookup(name).is_none()
            && env
                .class()
                .and_then(|class| self.program.field_type(class, name))
                .is_none()
    }

    fn member_type(&self, lhs: &Expr, rhs: &Expr, env: &TypeEnvironment) -> Option<FifthType> {
        match &rhs.kind {
            ExprKind::Call { name, args, .. } => {
                let resolution = self.resolve_member_call(lhs, name, args, env);
                if let Some(resolution) = resolution {
                    return Some(FifthType::from_host(&resolution.method.return_type));
                }
                match self.qualifier(lhs, env) {
                    Qualifier::Value(Some(FifthType::Named(class))) => self
                        .program
                        .class(&class)?
                        .method(name, args.len())
                        .map(|m| m.return_type.clone()),
                    _ => None,
                }
            }
            ExprKind::VarRef(member) => match self.qualifier(lhs, env) {
                Qualifier::HostType(host) => self.host_field(&host, member),
                Qualifier::Class(class) => self.program.field_type(&class, member).cloned(),
                Qualifier::Value(Some(FifthType::Named(class))) => {
                    self.program.field_type(&class, member).cloned()
                }
                Qualifier::Value(Some(receiver)) => {
                    let host = receiver.to_host()?;
                    self.host_field(&host, member)
                }
                Qualifier::Value(None) => None,
            },
            _ => self.infer(rhs, env),
        }
    }

    fn host_field(&self, host: &HostType, member: &str) -> Option<FifthType> {
        self.host()
            .field(host, member)
            .map(|field| FifthType::from_host(&field.ty))
    }

    /// Resolve `lhs.name(args)` against the host: a static call when `lhs`
    /// names a host type, else an extension call with `lhs` as receiver
    pub fn resolve_member_call(
        &self,
        lhs: &Expr,
        name: &str,
        args: &[ExprRef],
        env: &TypeEnvironment,
    ) -> Option<Resolution<'h>> {
        match self.qualifier(lhs, env) {
            Qualifier::HostType(host) => self.resolver.resolve(&host, name, args, None, self, env),
            Qualifier::Class(_) | Qualifier::Value(Some(FifthType::Named(_))) => None,
            Qualifier::Value(receiver) => {
                let receiver = receiver.unwrap_or_default();
                self.host().extension_hosts().iter().find_map(|host| {
                    self.resolver
                        .resolve(host, name, args, Some(&receiver), self, env)
                        .filter(Resolution::expects_receiver)
                })
            }
        }
    }

    /// Resolve a call already bound to a host type
    pub fn resolve_external(
        &self,
        host: &HostType,
        name: &str,
        args: &[ExprRef],
        env: &TypeEnvironment,
    ) -> Option<Resolution<'h>> {
        self.resolver.resolve(host, name, args, None, self, env)
    }

    fn call_type(
        &self,
        name: &str,
        args: &[ExprRef],
        target: &CallTarget,
        env: &TypeEnvironment,
    ) -> Option<FifthType> {
        match target {
            CallTarget::External { host } => self
                .resolve_external(host, name, args, env)
                .map(|r| FifthType::from_host(&r.method.return_type)),
            CallTarget::Method { class } => self
                .program
                .class(class)?
                .method(name, args.len())
                .map(|m| m.return_type.clone()),
            CallTarget::Function | CallTarget::Unresolved => {
                if let Some(function) = self.program.function(name, args.len()) {
                    return Some(function.return_type.clone());
                }
                if let Some(method) = env
                    .class()
                    .and_then(|class| self.program.class(class))
                    .and_then(|class| class.method(name, args.len()))
                {
                    return Some(method.return_type.clone());
                }
                if self.program.has_class(name) {
                    return Some(FifthType::Named(name.to_string()));
                }
                self.host().builtin_hosts().iter().find_map(|host| {
                    self.resolve_external(host, name, args, env)
                        .map(|r| FifthType::from_host(&r.method.return_type))
                })
            }
        }
    }
}

fn is_rdf(ty: &FifthType) -> bool {
    ty.is_graph() || ty.is_triple()
}

/// Type of a literal
pub fn literal_type(literal: &Literal) -> FifthType {
    let primitive = match literal {
        Literal::Int(_) => Primitive::Int,
        Literal::Long(_) => Primitive::Long,
        Literal::Float(_) => Primitive::Float,
        Literal::Double(_) => Primitive::Double,
        Literal::Decimal(_) => Primitive::Decimal,
        Literal::Bool(_) => Primitive::Bool,
        Literal::Char(_) => Primitive::Char,
        Literal::String(_) => Primitive::String,
    };
    FifthType::Primitive(primitive)
}
