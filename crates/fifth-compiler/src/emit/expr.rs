//! Expressions, names, member access and calls

use super::constant;
use super::{method_name, Emitter, PROGRAM_TYPE, THIS};
use fifth_ast::{CallTarget, Expr, ExprKind, ExprRef, PropertyInit};
use fifth_il::{
    Call, CallKind, FieldRef, IlType, Instruction, InstructionSequence, Load, MethodRef, StackOp,
    Store, TypeRef,
};
use fifth_semantic::Qualifier;
use fifth_types::{FifthType, HostType, MethodSignature};

/// Where a bare name lives
enum Place {
    Local(IlType),
    Arg(IlType),
    Field(FieldRef),
    Unbound,
}

impl Emitter<'_, '_> {
    /// Emit `expr`, leaving its value on the stack
    pub fn expression(&mut self, expr: &Expr) -> InstructionSequence {
        match &expr.kind {
            ExprKind::Literal(literal) => constant::literal(literal),
            ExprKind::VarRef(name) => self.load_name(name),
            ExprKind::Binary { op, lhs, rhs } => self.binary(expr, *op, lhs, rhs),
            ExprKind::Unary { op, operand } => self.unary(*op, operand),
            ExprKind::MemberAccess { lhs, rhs } => match rhs {
                Some(rhs) => self.member_access(lhs, rhs),
                None => self.expression(lhs),
            },
            ExprKind::Call { name, args, target } => self.call(name, args, target),
            ExprKind::ObjectInit {
                type_name,
                properties,
            } => self.object_init(type_name, properties),
            ExprKind::List { elements } => self.list(expr, elements),
            ExprKind::ListComprehension { .. } => {
                // Needs a loop lowering that does not exist yet
                tracing::debug!(function = %self.cx.function(), "list comprehension emitted as an empty array");
                let element = self.element_type(expr, &[]);
                InstructionSequence::from(vec![
                    Instruction::Load(Load::Int32(0)),
                    Instruction::Load(Load::NewArray(element)),
                ])
            }
            ExprKind::Triple { .. } | ExprKind::Graph { .. } => {
                tracing::debug!(function = %self.cx.function(), "knowledge-graph literal emitted as null");
                InstructionSequence::from(vec![Instruction::Load(Load::Null)])
            }
        }
    }

    /// A null stand-in for something that cannot be emitted
    fn placeholder(&self, what: &str) -> InstructionSequence {
        tracing::warn!(function = %self.cx.function(), what, "emitting null placeholder");
        InstructionSequence::from(vec![Instruction::Load(Load::Null)])
    }

    fn place(&self, name: &str) -> Place {
        if let Some((_, ty)) = self.cx.locals().iter().find(|(n, _)| n == name) {
            return Place::Local(self.types.il_type(ty));
        }
        if self.cx.is_param(name) {
            let ty = self.cx.env().lookup(name).cloned().unwrap_or_default();
            return Place::Arg(self.types.il_type(&ty));
        }
        let field = self.cx.class().and_then(|class| {
            let ty = self.inference.program().field_type(class, name)?;
            Some(FieldRef {
                owner: TypeRef::local(class),
                name: name.to_string(),
                ty: self.types.il_type(ty),
            })
        });
        field.map_or(Place::Unbound, Place::Field)
    }

    pub(super) fn load_name(&self, name: &str) -> InstructionSequence {
        let load = match self.place(name) {
            Place::Local(_) => vec![Instruction::Load(Load::Local(name.to_string()))],
            Place::Arg(_) => vec![Instruction::Load(Load::Arg(name.to_string()))],
            Place::Field(field) => vec![
                Instruction::Load(Load::Arg(THIS.to_string())),
                Instruction::Load(Load::Field(field)),
            ],
            Place::Unbound => return self.placeholder(name),
        };
        InstructionSequence::from(load)
    }

    /// Store the value computed by `value` into the variable or field `name`
    pub(super) fn store_name(
        &mut self,
        name: &str,
        value: InstructionSequence,
        value_ty: &IlType,
    ) -> InstructionSequence {
        let mut seq = InstructionSequence::new();
        match self.place(name) {
            Place::Local(slot) => {
                seq.append(value);
                self.coerce(value_ty, &slot, &mut seq);
                seq.push(Instruction::Store(Store::Local(name.to_string())));
            }
            Place::Arg(slot) => {
                seq.append(value);
                self.coerce(value_ty, &slot, &mut seq);
                seq.push(Instruction::Store(Store::Arg(name.to_string())));
            }
            Place::Field(field) => {
                seq.push(Instruction::Load(Load::Arg(THIS.to_string())));
                seq.append(value);
                self.coerce(value_ty, &field.ty, &mut seq);
                seq.push(Instruction::Store(Store::Field(field)));
            }
            Place::Unbound => {
                tracing::warn!(function = %self.cx.function(), name, "store to unbound name dropped");
                seq.append(value);
                seq.push(Instruction::Stack(StackOp::Pop));
            }
        }
        seq
    }

    /// Field `member` of a value of type `receiver`
    pub(super) fn field_ref(&self, receiver: &FifthType, member: &str) -> FieldRef {
        if let FifthType::Named(class) = receiver {
            let ty = self
                .inference
                .program()
                .field_type(class, member)
                .cloned()
                .unwrap_or_default();
            return FieldRef {
                owner: TypeRef::local(class),
                name: member.to_string(),
                ty: self.types.il_type(&ty),
            };
        }
        match receiver.to_host() {
            Some(host) => self.host_field(&host, member),
            None => FieldRef {
                owner: TypeRef::system("System.Object"),
                name: member.to_string(),
                ty: IlType::Object,
            },
        }
    }

    fn host_field(&self, host: &HostType, member: &str) -> FieldRef {
        let ty = self
            .types
            .host()
            .field(host, member)
            .map_or(IlType::Object, |field| self.types.host_type(&field.ty));
        FieldRef {
            owner: self.types.type_ref(host),
            name: member.to_string(),
            ty,
        }
    }

    /// Whether `lhs` is a capitalized name denoting a type rather than a value
    pub(super) fn names_type(&self, lhs: &Expr) -> bool {
        lhs.var_name()
            .is_some_and(|name| self.inference.is_type_name(name, self.cx.env()))
    }

    fn member_access(&mut self, lhs: &Expr, rhs: &Expr) -> InstructionSequence {
        match &rhs.kind {
            ExprKind::Call { name, args, target } => self.member_call(lhs, name, args, target),
            ExprKind::VarRef(member) => self.member_load(lhs, member),
            _ => {
                let mut seq = self.expression(lhs);
                seq.push(Instruction::Stack(StackOp::Pop));
                seq.append(self.expression(rhs));
                seq
            }
        }
    }

    fn member_load(&mut self, lhs: &Expr, member: &str) -> InstructionSequence {
        if self.names_type(lhs) {
            let inference = self.inference;
            match inference.qualifier(lhs, self.cx.env()) {
                Qualifier::HostType(host) => return self.static_member(&host, member),
                Qualifier::Class(class) => {
                    return self.static_field(self.field_ref(&FifthType::Named(class), member));
                }
                Qualifier::Value(_) => {}
            }
        }
        let receiver = self.type_of(lhs);
        let mut seq = self.expression(lhs);
        seq.push(Instruction::Load(Load::Field(self.field_ref(&receiver, member))));
        seq
    }

    /// Static host member: its getter when the table lists one, else the field
    fn static_member(&mut self, host: &HostType, member: &str) -> InstructionSequence {
        let getter = format!("get_{}", member);
        let method = self
            .types
            .host()
            .lookup(host, &getter)
            .into_iter()
            .find(|m| m.params.is_empty());
        match method {
            Some(method) => {
                InstructionSequence::from(vec![Instruction::call(self.types.method_ref(method), 0)])
            }
            None => self.static_field(self.host_field(host, member)),
        }
    }

    fn static_field(&self, field: FieldRef) -> InstructionSequence {
        InstructionSequence::from(vec![Instruction::Load(Load::StaticField(field))])
    }

    fn member_call(
        &mut self,
        lhs: &Expr,
        name: &str,
        args: &[ExprRef],
        target: &CallTarget,
    ) -> InstructionSequence {
        if let CallTarget::External { host } = target {
            return self.external_call(host, name, args);
        }
        let inference = self.inference;
        match inference.qualifier(lhs, self.cx.env()) {
            Qualifier::HostType(host) => self.external_call(&host, name, args),
            Qualifier::Value(Some(FifthType::Named(class))) => {
                let receiver = self.expression(lhs);
                self.method_call(receiver, &class, name, args)
            }
            Qualifier::Class(class) => self.placeholder(&format!("{}.{}", class, name)),
            Qualifier::Value(_) => {
                match inference.resolve_member_call(lhs, name, args, self.cx.env()) {
                    Some(resolution) if resolution.expects_receiver() => {
                        self.resolved_call(resolution.method, Some(lhs), args)
                    }
                    Some(resolution) => self.resolved_call(resolution.method, None, args),
                    None => self.placeholder(name),
                }
            }
        }
    }

    fn call(&mut self, name: &str, args: &[ExprRef], target: &CallTarget) -> InstructionSequence {
        match target {
            CallTarget::External { host } => self.external_call(host, name, args),
            CallTarget::Method { class } => {
                let this = InstructionSequence::from(vec![Instruction::Load(Load::Arg(THIS.to_string()))]);
                self.method_call(this, class, name, args)
            }
            CallTarget::Function => self.function_call(name, args),
            CallTarget::Unresolved => {
                let inference = self.inference;
                if inference.program().has_function(name) {
                    return self.function_call(name, args);
                }
                let own_method = self.cx.class().map(str::to_string).filter(|class| {
                    inference
                        .program()
                        .class(class)
                        .is_some_and(|info| info.methods.contains_key(name))
                });
                if let Some(class) = own_method {
                    let this = InstructionSequence::from(vec![Instruction::Load(Load::Arg(THIS.to_string()))]);
                    return self.method_call(this, &class, name, args);
                }
                let host = inference
                    .host()
                    .builtin_hosts()
                    .iter()
                    .find(|host| !inference.host().lookup(host, name).is_empty());
                match host {
                    Some(host) => self.external_call(host, name, args),
                    None => self.placeholder(name),
                }
            }
        }
    }

    /// Emit `args`, boxing where a parameter takes references
    fn arguments(&mut self, args: &[ExprRef], params: &[IlType], seq: &mut InstructionSequence) {
        for (i, arg) in args.iter().enumerate() {
            let value = self.il_type_of(arg);
            seq.append(self.expression(arg));
            if let Some(slot) = params.get(i) {
                self.coerce(&value, slot, seq);
            }
        }
    }

    fn function_call(&mut self, name: &str, args: &[ExprRef]) -> InstructionSequence {
        let inference = self.inference;
        let Some(function) = inference.program().function(name, args.len()) else {
            return self.placeholder(name);
        };
        let params: Vec<IlType> = function.params.iter().map(|p| self.types.il_type(p)).collect();
        let returns = self.types.il_type(&function.return_type);

        let mut seq = InstructionSequence::new();
        self.arguments(args, &params, &mut seq);
        let method = MethodRef::static_method(
            TypeRef::local(PROGRAM_TYPE),
            method_name(name),
            params,
            returns,
        );
        seq.push(Instruction::call(method, args.len()));
        seq
    }

    /// Instance method of a user class; `receiver` pushes the object
    fn method_call(
        &mut self,
        receiver: InstructionSequence,
        class: &str,
        name: &str,
        args: &[ExprRef],
    ) -> InstructionSequence {
        let inference = self.inference;
        let Some(method) = inference
            .program()
            .class(class)
            .and_then(|info| info.method(name, args.len()))
        else {
            return self.placeholder(&format!("{}.{}", class, name));
        };
        let params: Vec<IlType> = method.params.iter().map(|p| self.types.il_type(p)).collect();
        let returns = self.types.il_type(&method.return_type);

        let mut seq = receiver;
        self.arguments(args, &params, &mut seq);
        seq.push(Instruction::Call(Call {
            kind: CallKind::Instance,
            method: MethodRef::instance_method(TypeRef::local(class), name, params, returns),
            arg_count: args.len() + 1,
        }));
        seq
    }

    /// Static call into a host type. When no overload accepts the arguments
    /// the first declared overload of a fitting arity is called instead.
    fn external_call(&mut self, host: &HostType, name: &str, args: &[ExprRef]) -> InstructionSequence {
        let inference = self.inference;
        if let Some(resolution) = inference.resolve_external(host, name, args, self.cx.env()) {
            return self.resolved_call(resolution.method, None, args);
        }
        let declared = inference.host().lookup(host, name);
        let fallback = declared
            .iter()
            .find(|m| m.params.len() == args.len())
            .or_else(|| declared.first());
        match fallback {
            Some(method) => {
                tracing::debug!(%host, name, "no overload matched; calling the first declared one");
                self.resolved_call(method, None, args)
            }
            None => self.placeholder(&format!("{}.{}", host, name)),
        }
    }

    /// Receiver, supplied arguments, then declared defaults of omitted parameters
    fn resolved_call(
        &mut self,
        method: &MethodSignature,
        receiver: Option<&Expr>,
        args: &[ExprRef],
    ) -> InstructionSequence {
        let params: Vec<IlType> = method.param_types().map(|p| self.types.host_type(p)).collect();
        let mut seq = InstructionSequence::new();
        let mut pushed = 0;

        if let Some(receiver) = receiver {
            let value = self.il_type_of(receiver);
            seq.append(self.expression(receiver));
            if let Some(slot) = params.first() {
                self.coerce(&value, slot, &mut seq);
            }
            pushed += 1;
        }
        self.arguments(args, params.get(pushed..).unwrap_or_default(), &mut seq);
        pushed += args.len();

        for param in method.params.iter().skip(pushed) {
            let slot = self.types.host_type(&param.ty);
            match &param.default {
                Some(default) => seq.append(constant::default_value(default, &slot)),
                None => seq.append(constant::zero_value(&slot)),
            }
            pushed += 1;
        }
        seq.push(Instruction::call(self.types.method_ref(method), pushed));
        seq
    }

    /// `new T { a = 1 }`: construct, then `dup; value; stfld` per property
    fn object_init(&mut self, type_name: &str, properties: &[PropertyInit]) -> InstructionSequence {
        let ty = FifthType::parse(type_name);
        let il = self.types.il_type(&ty);
        let Some(owner) = il.type_ref().cloned() else {
            return self.placeholder(type_name);
        };

        let mut seq = InstructionSequence::new();
        seq.push(Instruction::Call(Call {
            kind: CallKind::NewObj,
            method: MethodRef::default_ctor(owner),
            arg_count: 0,
        }));
        for property in properties {
            let field = self.field_ref(&ty, &property.name);
            let value = self.il_type_of(&property.value);
            seq.push(Instruction::Stack(StackOp::Dup));
            seq.append(self.expression(&property.value));
            self.coerce(&value, &field.ty, &mut seq);
            seq.push(Instruction::Store(Store::Field(field)));
        }
        seq
    }

    fn element_type(&self, expr: &Expr, elements: &[ExprRef]) -> IlType {
        let element = self
            .type_of(expr)
            .element()
            .cloned()
            .or_else(|| elements.first().map(|e| self.type_of(e)))
            .unwrap_or(FifthType::Host(HostType::object()));
        self.types.il_type(&element)
    }

    /// `[a, b]`: allocate, then `dup; index; value; stelem` per element
    fn list(&mut self, expr: &Expr, elements: &[ExprRef]) -> InstructionSequence {
        let element = self.element_type(expr, elements);
        let mut seq = InstructionSequence::from(vec![
            Instruction::Load(Load::Int32(elements.len() as i32)),
            Instruction::Load(Load::NewArray(element.clone())),
        ]);
        for (i, item) in elements.iter().enumerate() {
            let value = self.il_type_of(item);
            seq.push(Instruction::Stack(StackOp::Dup));
            seq.push(Instruction::Load(Load::Int32(i as i32)));
            seq.append(self.expression(item));
            self.coerce(&value, &element, &mut seq);
            seq.push(Instruction::Store(Store::Element(element.clone())));
        }
        seq
    }
}
