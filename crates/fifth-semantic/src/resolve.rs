//! External method resolution
//!
//! Picks one host method for a call site from the signatures a
//! [`HostTypeProvider`] exposes.
//!
//! 1. Candidates are the public static methods of the target with the
//!    requested name whose parameter count fits the call: exactly, one more
//!    (the receiver, when one is passed, fills the first parameter), or more
//!    when every extra trailing parameter can be omitted.
//! 2. Each argument slot scores 100 for an identical type, 50 for reference
//!    or interface assignability, 10 for implicit numeric widening, else 0.
//! 3. Candidates are put in canonical order first, then stably ranked by
//!    score, fewer parameters, and non-generic before generic.
//! 4. Zero-argument calls and calls whose argument types are all unknown
//!    take the top candidate. Otherwise the top candidate must score above
//!    zero and every one of its slots must score above zero on its own.

use crate::infer::{TypeEnvironment, TypeInference};
use fifth_ast::ExprRef;
use fifth_types::{FifthType, HostType, HostTypeProvider, MethodSignature};
use std::cmp::Ordering;

/// Slot score for an identical type
pub const IDENTICAL: i32 = 100;
/// Slot score for reference or interface assignability
pub const ASSIGNABLE: i32 = 50;
/// Slot score for implicit numeric widening
pub const WIDENING: i32 = 10;

/// How a candidate's parameters line up with the call's arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallShape {
    /// One argument per parameter
    Exact,
    /// The receiver fills the first parameter
    Receiver,
    /// Trailing parameters are omitted and take their defaults
    Defaulted,
    /// One parameter more than arguments and no receiver; the arguments
    /// fill the leading parameters and the last takes its zero value
    Padded,
}

/// The method picked for a call site
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'h> {
    /// Selected method
    pub method: &'h MethodSignature,
    /// How arguments map to parameters
    pub shape: CallShape,
    /// Aggregate score
    pub score: i32,
}

impl Resolution<'_> {
    /// Whether the receiver must be pushed before the arguments
    pub fn expects_receiver(&self) -> bool {
        self.shape == CallShape::Receiver
    }
}

struct Candidate<'h> {
    method: &'h MethodSignature,
    shape: CallShape,
    rendered: String,
    score: i32,
}

/// Overload resolver over a host signature provider
#[derive(Clone, Copy)]
pub struct MethodResolver<'h> {
    host: &'h dyn HostTypeProvider,
}

impl<'h> MethodResolver<'h> {
    /// Resolver over `host`
    pub fn new(host: &'h dyn HostTypeProvider) -> Self {
        Self { host }
    }

    /// The signature provider
    pub fn host(&self) -> &'h dyn HostTypeProvider {
        self.host
    }

    /// Resolve `target.name(args)` for argument expressions
    pub fn resolve(
        &self,
        target: &HostType,
        name: &str,
        args: &[ExprRef],
        receiver: Option<&FifthType>,
        inference: &TypeInference<'_>,
        env: &TypeEnvironment,
    ) -> Option<Resolution<'h>> {
        let types: Vec<_> = args
            .iter()
            .map(|arg| inference.infer(arg, env).unwrap_or_default())
            .collect();
        self.resolve_with_types(target, name, &types, receiver)
    }

    /// Resolve `target.name(args)` for already inferred argument types;
    /// `FifthType::Unknown` marks an argument whose type is not known
    pub fn resolve_with_types(
        &self,
        target: &HostType,
        name: &str,
        args: &[FifthType],
        receiver: Option<&FifthType>,
    ) -> Option<Resolution<'h>> {
        let mut candidates: Vec<Candidate<'h>> = self
            .host
            .lookup(target, name)
            .into_iter()
            .filter_map(|method| {
                let shape = call_shape(method, args.len(), receiver.is_some())?;
                Some(Candidate {
                    method,
                    shape,
                    rendered: method.to_string(),
                    score: 0,
                })
            })
            .collect();

        // Canonical order first so provider order never breaks a tie
        candidates.sort_by(|a, b| a.rendered.cmp(&b.rendered));
        for candidate in &mut candidates {
            candidate.score = self
                .slot_scores(candidate.method, candidate.shape, args, receiver)
                .sum();
        }
        candidates.sort_by(rank);

        for candidate in &candidates {
            tracing::trace!(
                method = %candidate.rendered,
                score = candidate.score,
                shape = ?candidate.shape,
                "overload candidate"
            );
        }

        let top = candidates.first()?;
        let resolution = Resolution {
            method: top.method,
            shape: top.shape,
            score: top.score,
        };

        if args.is_empty() || args.iter().all(FifthType::is_unknown) {
            return Some(resolution);
        }
        if top.score <= 0 {
            tracing::trace!(%target, name, "no candidate scored above zero");
            return None;
        }
        if self
            .slot_scores(top.method, top.shape, args, receiver)
            .any(|score| score <= 0)
        {
            tracing::trace!(method = %top.rendered, "rejected: incompatible argument slot");
            return None;
        }
        Some(resolution)
    }

    /// Compatibility of one argument with one declared parameter
    pub fn slot_score(&self, arg: &FifthType, param: &HostType) -> i32 {
        let Some(arg_host) = arg.to_host() else {
            return 0;
        };
        if arg_host == *param {
            return IDENTICAL;
        }
        if let (Some(from), Some(to)) = (arg.primitive(), param.primitive()) {
            if from.widens_to(to) {
                return WIDENING;
            }
        }
        if self.host.is_assignable(&arg_host, param) {
            return ASSIGNABLE;
        }
        0
    }

    fn slot_scores<'a>(
        &'a self,
        method: &'a MethodSignature,
        shape: CallShape,
        args: &'a [FifthType],
        receiver: Option<&'a FifthType>,
    ) -> impl Iterator<Item = i32> + 'a {
        let (receiver_slot, params) = match shape {
            CallShape::Receiver => (
                receiver.zip(method.params.first()),
                method.params.get(1..).unwrap_or_default(),
            ),
            CallShape::Exact | CallShape::Defaulted | CallShape::Padded => {
                (None, method.params.as_slice())
            }
        };
        receiver_slot
            .into_iter()
            .chain(args.iter().zip(params))
            .map(move |(arg, param)| self.slot_score(arg, &param.ty))
    }
}

fn call_shape(method: &MethodSignature, argc: usize, has_receiver: bool) -> Option<CallShape> {
    let arity = method.arity();
    if arity == argc {
        Some(CallShape::Exact)
    } else if has_receiver && arity == argc + 1 {
        Some(CallShape::Receiver)
    } else if arity > argc && method.params[argc..].iter().all(|p| p.is_omittable()) {
        Some(CallShape::Defaulted)
    } else if arity == argc + 1 {
        Some(CallShape::Padded)
    } else {
        None
    }
}

fn rank(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.method.arity().cmp(&b.method.arity()))
        .then_with(|| a.method.generic.cmp(&b.method.generic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fifth_types::{DefaultValue, ParamSignature, Primitive, SignatureDb, TypeInfo};

    fn builtin() -> MethodResolver<'static> {
        MethodResolver::new(SignatureDb::builtin().unwrap())
    }

    fn prim(p: Primitive) -> FifthType {
        FifthType::Primitive(p)
    }

    #[test]
    fn test_identical_overload_wins() {
        let resolver = builtin();
        let math = HostType::new("System.Math");
        let resolution = resolver
            .resolve_with_types(&math, "Max", &[prim(Primitive::Long), prim(Primitive::Long)], None)
            .unwrap();
        assert_eq!(resolution.method.to_string(), "System.Math::Max(System.Int64,System.Int64) -> System.Int64");
        assert_eq!(resolution.score, 200);
    }

    #[test]
    fn test_widening_scores_ten() {
        let resolver = builtin();
        assert_eq!(resolver.slot_score(&FifthType::INT, &HostType::double()), WIDENING);
        assert_eq!(resolver.slot_score(&FifthType::STRING, &HostType::object()), ASSIGNABLE);
        assert_eq!(resolver.slot_score(&FifthType::BOOL, &HostType::double()), 0);
        assert_eq!(resolver.slot_score(&FifthType::Unknown, &HostType::double()), 0);
    }

    #[test]
    fn test_one_incompatible_slot_rejects_the_top_candidate() {
        // Max(Int32, Int32) ranks first on the first slot alone
        let resolver = builtin();
        let math = HostType::new("System.Math");
        let result = resolver.resolve_with_types(&math, "Max", &[FifthType::INT, FifthType::STRING], None);
        assert!(result.is_none());
    }

    #[test]
    fn test_all_unknown_takes_top_candidate() {
        let resolver = builtin();
        let console = HostType::new("System.Console");
        let resolution = resolver
            .resolve_with_types(&console, "WriteLine", &[FifthType::Unknown], None)
            .unwrap();
        assert_eq!(resolution.method.arity(), 1);
    }

    #[test]
    fn test_zero_arguments_take_top_candidate() {
        let resolver = builtin();
        let kg = HostType::new("Fifth.System.KG");
        let resolution = resolver.resolve_with_types(&kg, "CreateGraph", &[], None).unwrap();
        assert_eq!(resolution.method.return_type, HostType::graph());
    }

    #[test]
    fn test_receiver_fills_first_parameter() {
        let resolver = builtin();
        let kg = HostType::new("Fifth.System.KG");
        let graph = FifthType::Host(HostType::graph());
        let triple = FifthType::Host(HostType::triple());
        let resolution = resolver
            .resolve_with_types(&kg, "Assert", &[triple], Some(&graph))
            .unwrap();
        assert!(resolution.expects_receiver());
        assert_eq!(resolution.score, 200);
    }

    #[test]
    fn test_incompatible_receiver_is_rejected() {
        let resolver = builtin();
        let kg = HostType::new("Fifth.System.KG");
        let triple = FifthType::Host(HostType::triple());
        let result = resolver.resolve_with_types(&kg, "Assert", &[triple], Some(&FifthType::INT));
        assert!(result.is_none());
    }

    #[test]
    fn test_unknown_method_has_no_candidates() {
        let resolver = builtin();
        let math = HostType::new("System.Math");
        assert!(resolver.resolve_with_types(&math, "Frobnicate", &[], None).is_none());
    }

    fn table(methods: Vec<MethodSignature>) -> SignatureDb {
        let demo = TypeInfo {
            name: HostType::new("Demo"),
            assembly: "demo".into(),
            value_type: false,
            interface: false,
            base: None,
            interfaces: vec![],
            fields: vec![],
            methods,
        };
        SignatureDb::new(vec![demo], vec![], vec![]).unwrap()
    }

    #[test]
    fn test_ties_prefer_fewer_parameters_then_non_generic() {
        let generic = MethodSignature::new("Demo", "Run", vec![ParamSignature::new("a", "System.Int32")], "System.Int32")
            .as_generic();
        let plain = MethodSignature::new("Demo", "Run", vec![ParamSignature::new("a", "System.Int32")], "System.Int64");
        let defaulted = MethodSignature::new(
            "Demo",
            "Run",
            vec![
                ParamSignature::new("a", "System.Int32"),
                ParamSignature::new("b", "System.Int32").with_default(DefaultValue::Int(1)),
            ],
            "System.Double",
        );

        // Every enumeration order yields the same winner
        for order in [
            vec![generic.clone(), plain.clone(), defaulted.clone()],
            vec![defaulted.clone(), plain.clone(), generic.clone()],
            vec![plain.clone(), defaulted.clone(), generic.clone()],
        ] {
            let db = table(order);
            let resolver = MethodResolver::new(&db);
            let resolution = resolver
                .resolve_with_types(&HostType::new("Demo"), "Run", &[FifthType::INT], None)
                .unwrap();
            assert_eq!(resolution.method.return_type, HostType::new("System.Int64"));
        }
    }

    #[test]
    fn test_one_extra_parameter_fits_without_receiver() {
        let run = MethodSignature::new("Demo", "Run", vec![ParamSignature::new("a", "System.Int32")], "System.Int32");
        let db = table(vec![run]);
        let resolver = MethodResolver::new(&db);
        let resolution = resolver
            .resolve_with_types(&HostType::new("Demo"), "Run", &[], None)
            .unwrap();
        assert_eq!(resolution.shape, CallShape::Padded);
        assert!(!resolution.expects_receiver());
    }

    #[test]
    fn test_padded_shape_scores_leading_parameters() {
        let pair = MethodSignature::new(
            "Demo",
            "Pair",
            vec![
                ParamSignature::new("a", "System.Int32"),
                ParamSignature::new("b", "System.String"),
            ],
            "System.Int32",
        );
        let db = table(vec![pair]);
        let resolver = MethodResolver::new(&db);
        let demo = HostType::new("Demo");
        let resolution = resolver
            .resolve_with_types(&demo, "Pair", &[FifthType::INT], None)
            .unwrap();
        assert_eq!(resolution.shape, CallShape::Padded);
        assert_eq!(resolution.score, IDENTICAL);
        assert!(resolver.resolve_with_types(&demo, "Pair", &[FifthType::BOOL], None).is_none());
    }

    #[test]
    fn test_defaulted_parameters_are_arity_compatible() {
        let defaulted = MethodSignature::new(
            "Demo",
            "Round",
            vec![
                ParamSignature::new("a", "System.Double"),
                ParamSignature::new("digits", "System.Int32").with_default(DefaultValue::Int(2)),
            ],
            "System.Double",
        );
        let db = table(vec![defaulted]);
        let resolver = MethodResolver::new(&db);
        let resolution = resolver
            .resolve_with_types(&HostType::new("Demo"), "Round", &[FifthType::DOUBLE], None)
            .unwrap();
        assert_eq!(resolution.shape, CallShape::Defaulted);
    }
}
