//! AST node definitions
//!
//! Children are held through `Rc` so that rewrites share untouched subtrees.
//! Every node type offers `with_*` copy constructors that keep the node's
//! metadata (id, location, type) and replace one field.

use crate::node::{AstNode, Meta};
use crate::ops::{BinaryOp, UnaryOp};
use fifth_types::{FifthType, HostType};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Shared expression node
pub type ExprRef = Rc<Expr>;

/// Shared statement node
pub type StmtRef = Rc<Stmt>;

// ============================================================================
// Declarations
// ============================================================================

/// Root of a compilation: one output assembly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyDef {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Assembly name
    pub name: String,
    /// Version string (`1.0.0.0`)
    #[serde(default)]
    pub version: Option<String>,
    /// Modules, one per source file
    #[serde(default)]
    pub modules: Vec<Rc<ModuleDef>>,
}

/// A source module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDef {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Module name
    pub name: String,
    /// Declared namespace
    #[serde(default)]
    pub namespace: Option<String>,
    /// Class definitions
    #[serde(default)]
    pub classes: Vec<Rc<ClassDef>>,
    /// Top-level functions
    #[serde(default)]
    pub functions: Vec<Rc<FunctionDef>>,
}

/// A user-defined class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Class name
    pub name: String,
    /// Base class name
    #[serde(default)]
    pub base: Option<String>,
    /// Fields
    #[serde(default)]
    pub fields: Vec<Rc<FieldDef>>,
    /// Properties
    #[serde(default)]
    pub properties: Vec<Rc<PropertyDef>>,
    /// Methods and constructors
    #[serde(default)]
    pub methods: Vec<Rc<FunctionDef>>,
}

/// A class field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Field name
    pub name: String,
    /// Declared type
    pub type_name: String,
}

/// A class property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Property name
    pub name: String,
    /// Declared type
    pub type_name: String,
}

/// What kind of callable a [`FunctionDef`] is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionKind {
    /// Module-level function
    #[default]
    Function,
    /// Instance method of a class
    Method,
    /// Parameterless instance constructor
    Constructor,
}

/// A function, method or constructor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Name
    pub name: String,
    /// Parameters
    #[serde(default)]
    pub params: Vec<Rc<ParamDef>>,
    /// Declared return type
    pub return_type: String,
    /// Body
    pub body: Rc<Block>,
    /// Callable kind
    #[serde(default)]
    pub kind: FunctionKind,
}

/// A function parameter, optionally guarded and destructured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Parameter name
    pub name: String,
    /// Declared type
    pub type_name: String,
    /// Guard clause: `n: int | n > 0`
    #[serde(default)]
    pub guard: Option<ExprRef>,
    /// Destructuring bindings: `p: Person { name: n, age: a }`
    #[serde(default)]
    pub destructuring: Option<Vec<Rc<PropertyBinding>>>,
}

/// One `variable: property` binding inside a destructuring parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyBinding {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Local variable introduced by the binding
    pub variable: String,
    /// Property read from the parameter
    pub property: String,
    /// Constraint on the bound value, conjoined into the parameter guard
    #[serde(default)]
    pub constraint: Option<ExprRef>,
}

// ============================================================================
// Statements
// ============================================================================

/// A braced statement list; introduces a scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Statements in order
    #[serde(default)]
    pub statements: Vec<StmtRef>,
}

/// A statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Statement variant
    pub kind: StmtKind,
}

/// Statement variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `name: type = init;`
    VarDecl {
        /// Variable name
        name: String,
        /// Declared type; inferred from the initializer when absent
        #[serde(default)]
        type_name: Option<String>,
        /// Initializer
        #[serde(default)]
        init: Option<ExprRef>,
    },
    /// `target = value;`
    Assign {
        /// Variable or member access
        target: ExprRef,
        /// Assigned value
        value: ExprRef,
    },
    /// `target op= value;`
    CompoundAssign {
        /// Variable or member access
        target: ExprRef,
        /// Combining operator
        op: BinaryOp,
        /// Right operand
        value: ExprRef,
    },
    /// Expression evaluated for effect
    Expr(ExprRef),
    /// `return value;`
    Return(Option<ExprRef>),
    /// `if (cond) { ... } else { ... }`
    If {
        /// Condition
        cond: ExprRef,
        /// Taken branch
        then_block: Rc<Block>,
        /// Alternative
        #[serde(default)]
        else_block: Option<Rc<Block>>,
    },
    /// `while (cond) { ... }`
    While {
        /// Loop condition
        cond: ExprRef,
        /// Loop body
        body: Rc<Block>,
    },
    /// `for (init; cond; step) { ... }`
    For {
        /// Runs once before the loop
        #[serde(default)]
        init: Option<StmtRef>,
        /// Loop condition; absent means forever
        #[serde(default)]
        cond: Option<ExprRef>,
        /// Runs after each iteration
        #[serde(default)]
        step: Option<StmtRef>,
        /// Loop body
        body: Rc<Block>,
    },
    /// Nested block
    Block(Rc<Block>),
    /// `try { ... } catch ... finally { ... }`
    Try {
        /// Protected block
        body: Rc<Block>,
        /// Handlers in source order
        #[serde(default)]
        catches: Vec<Rc<CatchClause>>,
        /// Finally block
        #[serde(default)]
        finally: Option<Rc<Block>>,
    },
}

/// A `catch (e: Type) { ... }` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Caught exception type; absent for a catch-all
    #[serde(default)]
    pub exception_type: Option<String>,
    /// Variable bound to the exception
    #[serde(default)]
    pub variable: Option<String>,
    /// Handler body
    pub body: Rc<Block>,
}

// ============================================================================
// Expressions
// ============================================================================

/// An expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// Metadata
    #[serde(default)]
    pub meta: Meta,
    /// Expression variant
    pub kind: ExprKind,
}

/// Literal values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Single-precision float
    Float(f32),
    /// Double-precision float
    Double(f64),
    /// Decimal, kept in its invariant textual form
    Decimal(String),
    /// Boolean
    Bool(bool),
    /// Character
    Char(char),
    /// String
    String(String),
}

/// What a call expression invokes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CallTarget {
    /// Not bound yet
    #[default]
    Unresolved,
    /// Module-level function of this program
    Function,
    /// Instance method of a user class
    Method {
        /// Declaring class
        class: String,
    },
    /// Static method on a host type
    External {
        /// Host type declaring the method
        host: HostType,
    },
}

/// `name = value` inside an object initializer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInit {
    /// Property or field name
    pub name: String,
    /// Value
    pub value: ExprRef,
}

/// Expression variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Literal
    Literal(Literal),
    /// Variable, parameter or field reference
    VarRef(String),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: ExprRef,
        /// Right operand
        rhs: ExprRef,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: ExprRef,
    },
    /// `lhs.rhs`, where `rhs` is a member name or a call
    MemberAccess {
        /// Qualifier
        lhs: ExprRef,
        /// Member
        #[serde(default)]
        rhs: Option<ExprRef>,
    },
    /// Call
    Call {
        /// Callee name
        name: String,
        /// Arguments
        #[serde(default)]
        args: Vec<ExprRef>,
        /// Binding of the callee
        #[serde(default)]
        target: CallTarget,
    },
    /// `new Type { a = 1, b = 2 }`
    ObjectInit {
        /// Constructed type
        type_name: String,
        /// Property initializers
        #[serde(default)]
        properties: Vec<PropertyInit>,
    },
    /// `[a, b, c]`
    List {
        /// Elements
        #[serde(default)]
        elements: Vec<ExprRef>,
    },
    /// `[x from xs where cond]`
    ListComprehension {
        /// Bound variable
        var: String,
        /// Source collection
        source: ExprRef,
        /// Membership constraint
        #[serde(default)]
        constraint: Option<ExprRef>,
    },
    /// `<s, p, o>`
    Triple {
        /// Subject
        subject: ExprRef,
        /// Predicate
        predicate: ExprRef,
        /// Object
        object: ExprRef,
    },
    /// Graph literal containing triples
    Graph {
        /// Asserted triples
        #[serde(default)]
        triples: Vec<ExprRef>,
    },
}

// ============================================================================
// Node trait and copy constructors
// ============================================================================

macro_rules! impl_ast_node {
    ($($ty:ty),* $(,)?) => {
        $(
            impl AstNode for $ty {
                fn meta(&self) -> &Meta {
                    &self.meta
                }

                fn with_meta(&self, meta: Meta) -> Self {
                    Self { meta, ..self.clone() }
                }
            }
        )*
    };
}

impl_ast_node!(
    AssemblyDef,
    ModuleDef,
    ClassDef,
    FieldDef,
    PropertyDef,
    FunctionDef,
    ParamDef,
    PropertyBinding,
    Block,
    Stmt,
    CatchClause,
    Expr,
);

impl AssemblyDef {
    /// Same assembly with different modules
    pub fn with_modules(&self, modules: Vec<Rc<ModuleDef>>) -> Rc<AssemblyDef> {
        Rc::new(AssemblyDef {
            modules,
            ..self.clone()
        })
    }

    /// Every function in every module, classes excluded
    pub fn functions(&self) -> impl Iterator<Item = &Rc<FunctionDef>> {
        self.modules.iter().flat_map(|m| m.functions.iter())
    }

    /// Every class in every module
    pub fn classes(&self) -> impl Iterator<Item = &Rc<ClassDef>> {
        self.modules.iter().flat_map(|m| m.classes.iter())
    }
}

impl ModuleDef {
    /// Same module with different functions
    pub fn with_functions(&self, functions: Vec<Rc<FunctionDef>>) -> Rc<ModuleDef> {
        Rc::new(ModuleDef {
            functions,
            ..self.clone()
        })
    }

    /// Same module with different classes
    pub fn with_classes(&self, classes: Vec<Rc<ClassDef>>) -> Rc<ModuleDef> {
        Rc::new(ModuleDef {
            classes,
            ..self.clone()
        })
    }
}

impl ClassDef {
    /// Same class with different fields and properties
    pub fn with_members(
        &self,
        fields: Vec<Rc<FieldDef>>,
        properties: Vec<Rc<PropertyDef>>,
    ) -> Rc<ClassDef> {
        Rc::new(ClassDef {
            fields,
            properties,
            ..self.clone()
        })
    }

    /// Same class with different methods
    pub fn with_methods(&self, methods: Vec<Rc<FunctionDef>>) -> Rc<ClassDef> {
        Rc::new(ClassDef {
            methods,
            ..self.clone()
        })
    }

    /// The parameterless constructor, if declared
    pub fn default_constructor(&self) -> Option<&Rc<FunctionDef>> {
        self.methods
            .iter()
            .find(|m| m.kind == FunctionKind::Constructor && m.params.is_empty())
    }

    /// Type of a field or property
    pub fn member_type(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.type_name.as_str())
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| p.type_name.as_str())
            })
    }
}

impl FunctionDef {
    /// Same function with a different body
    pub fn with_body(&self, body: Rc<Block>) -> Rc<FunctionDef> {
        Rc::new(FunctionDef {
            body,
            ..self.clone()
        })
    }

    /// Same function with different parameters
    pub fn with_params(&self, params: Vec<Rc<ParamDef>>) -> Rc<FunctionDef> {
        Rc::new(FunctionDef {
            params,
            ..self.clone()
        })
    }

    /// Same function under a different name
    pub fn with_name(&self, name: impl Into<String>) -> Rc<FunctionDef> {
        Rc::new(FunctionDef {
            name: name.into(),
            ..self.clone()
        })
    }

    /// Whether any parameter carries a guard
    pub fn is_guarded(&self) -> bool {
        self.params.iter().any(|p| p.guard.is_some())
    }

    /// Declared return type
    pub fn return_fifth_type(&self) -> FifthType {
        FifthType::parse(&self.return_type)
    }
}

impl ParamDef {
    /// Same parameter with a different guard
    pub fn with_guard(&self, guard: Option<ExprRef>) -> Rc<ParamDef> {
        Rc::new(ParamDef {
            guard,
            ..self.clone()
        })
    }

    /// Same parameter without destructuring bindings
    pub fn without_destructuring(&self) -> Rc<ParamDef> {
        Rc::new(ParamDef {
            destructuring: None,
            ..self.clone()
        })
    }
}

impl Block {
    /// Same block with different statements
    pub fn with_statements(&self, statements: Vec<StmtRef>) -> Rc<Block> {
        Rc::new(Block {
            statements,
            ..self.clone()
        })
    }

    /// Whether control cannot fall off the end of the block
    pub fn ends_with_return(&self) -> bool {
        self.statements.last().is_some_and(|s| s.is_return())
    }
}

impl Stmt {
    /// Same statement metadata with a different variant
    pub fn with_kind(&self, kind: StmtKind) -> StmtRef {
        Rc::new(Stmt {
            meta: self.meta.clone(),
            kind,
        })
    }

    /// Whether this is a `return`
    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return(_))
    }
}

impl Expr {
    /// Same expression metadata with a different variant
    pub fn with_kind(&self, kind: ExprKind) -> ExprRef {
        Rc::new(Expr {
            meta: self.meta.clone(),
            kind,
        })
    }

    /// Same expression with its inferred type set
    pub fn with_type(&self, ty: FifthType) -> ExprRef {
        Rc::new(Expr {
            meta: Meta {
                ty: Some(ty),
                ..self.meta.clone()
            },
            kind: self.kind.clone(),
        })
    }

    /// Name referenced, if this is a plain variable reference
    pub fn var_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::VarRef(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this is a string literal
    pub fn is_string_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Literal(Literal::String(_)))
    }

    /// Whether this is a call, directly or as the member of an access
    pub fn is_call(&self) -> bool {
        match &self.kind {
            ExprKind::Call { .. } => true,
            ExprKind::MemberAccess { rhs: Some(rhs), .. } => rhs.is_call(),
            _ => false,
        }
    }
}
