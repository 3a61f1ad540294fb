//! Function implementations dispatched by `PtgFunc` / `PtgFuncVar`.
//!
//! Metadata (name, arity, operand classes) lives in [`crate::ftab`]; this module only maps an
//! `iftab` to something that can compute a result. Built-ins register themselves with
//! [`inventory::submit!`] under their worksheet name and are bound to an index through the
//! metadata table the first time [`FunctionTable::builtin`] is used.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use smallvec::SmallVec;

use crate::eval::coercion::to_number;
use crate::eval::operators::broadcast;
use crate::eval::EvalContext;
use crate::ftab::{function_by_name, FunctionMetadata};
use crate::value::{ErrorKind, ValueEval};

mod logical;
mod math;
mod matrix;
mod text;

/// What a function implementation sees besides its arguments.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub eval: &'a EvalContext,
    pub metadata: &'static FunctionMetadata,
}

/// A worksheet function.
///
/// Arguments arrive in call order. Reference- and array-class parameters receive
/// [`ValueEval::Area`] values; value-class parameters receive scalars unless the formula is an
/// array formula or the argument was itself an array.
pub trait FunctionImplementation: Send + Sync {
    fn evaluate(&self, ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval;

    /// When `false`, the evaluator returns the first scalar error argument without calling
    /// [`FunctionImplementation::evaluate`].
    fn inspects_errors(&self) -> bool {
        false
    }
}

pub type BuiltinImpl = fn(&CallContext<'_>, &[ValueEval]) -> ValueEval;

#[derive(Clone, Copy)]
pub struct BuiltinFunction {
    pub name: &'static str,
    pub inspects_errors: bool,
    pub implementation: BuiltinImpl,
}

inventory::collect!(BuiltinFunction);

impl FunctionImplementation for BuiltinFunction {
    fn evaluate(&self, ctx: &CallContext<'_>, args: &[ValueEval]) -> ValueEval {
        (self.implementation)(ctx, args)
    }

    fn inspects_errors(&self) -> bool {
        self.inspects_errors
    }
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunction")
            .field("name", &self.name)
            .field("inspects_errors", &self.inspects_errors)
            .finish()
    }
}

/// Iterate every built-in registered via [`inventory`].
pub fn iter_builtins() -> impl Iterator<Item = &'static BuiltinFunction> {
    inventory::iter::<BuiltinFunction>.into_iter()
}

/// Implementations keyed by `iftab`.
#[derive(Clone, Default)]
pub struct FunctionTable {
    entries: HashMap<u16, Arc<dyn FunctionImplementation>>,
}

impl FunctionTable {
    /// An empty table: every call fails with [`crate::EvalError::FunctionNotImplemented`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared table holding every registered built-in.
    pub fn builtin() -> &'static FunctionTable {
        static BUILTIN: OnceLock<FunctionTable> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            let mut table = FunctionTable::new();
            for builtin in iter_builtins() {
                if table.register_by_name(builtin.name, *builtin).is_none() {
                    log::debug!("built-in {} has no BIFF function id", builtin.name);
                }
            }
            table
        })
    }

    /// A private copy of [`FunctionTable::builtin`] that callers may extend.
    pub fn with_builtins() -> Self {
        Self::builtin().clone()
    }

    /// Bind `implementation` to `index`, returning the implementation it replaces.
    pub fn register(
        &mut self,
        index: u16,
        implementation: impl FunctionImplementation + 'static,
    ) -> Option<Arc<dyn FunctionImplementation>> {
        self.entries.insert(index, Arc::new(implementation))
    }

    /// Bind `implementation` to the index the metadata table gives `name`.
    pub fn register_by_name(
        &mut self,
        name: &str,
        implementation: impl FunctionImplementation + 'static,
    ) -> Option<u16> {
        let meta = function_by_name(name)?;
        self.register(meta.index, implementation);
        Some(meta.index)
    }

    pub fn get(&self, index: u16) -> Option<&dyn FunctionImplementation> {
        self.entries.get(&index).map(|imp| imp.as_ref())
    }

    pub fn contains(&self, index: u16) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<u16> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("FunctionTable").field("ids", &ids).finish()
    }
}

/// Call `f` once per element when any argument is an area.
pub(crate) fn lift(args: &[ValueEval], f: impl FnMut(&[&ValueEval]) -> ValueEval) -> ValueEval {
    let refs: SmallVec<[&ValueEval; 4]> = args.iter().collect();
    broadcast(&refs, f)
}

/// Lift a one-argument numeric function.
pub(crate) fn lift_number(
    args: &[ValueEval],
    f: impl Fn(f64) -> Result<f64, ErrorKind>,
) -> ValueEval {
    lift(args, |element| match element {
        [v] => ValueEval::from_result(to_number(v).and_then(&f)),
        _ => ValueEval::Error(ErrorKind::Value),
    })
}

/// Lift a two-argument numeric function.
pub(crate) fn lift_number2(
    args: &[ValueEval],
    f: impl Fn(f64, f64) -> Result<f64, ErrorKind>,
) -> ValueEval {
    lift(args, |element| match element {
        [a, b] => ValueEval::from_result(
            to_number(a).and_then(|a| to_number(b).and_then(|b| f(a, b))),
        ),
        _ => ValueEval::Error(ErrorKind::Value),
    })
}

/// Optional arguments may be absent or passed as an empty slot (`ROUND(1,)`).
pub(crate) fn optional(args: &[ValueEval], position: usize) -> Option<&ValueEval> {
    match args.get(position) {
        None | Some(ValueEval::Missing) => None,
        Some(v) => Some(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftab::function_by_index;

    #[test]
    fn every_builtin_resolves_to_a_biff_index() {
        for builtin in iter_builtins() {
            assert!(
                function_by_name(builtin.name).is_some(),
                "{} is missing from the function table",
                builtin.name
            );
        }
    }

    #[test]
    fn builtin_table_is_keyed_by_iftab() {
        let table = FunctionTable::builtin();
        for index in [4u16, 1, 83, 163, 164, 165] {
            assert!(table.contains(index), "missing {:?}", function_by_index(index));
        }
        assert!(!table.contains(255));
    }

    struct Constant(f64);

    impl FunctionImplementation for Constant {
        fn evaluate(&self, _ctx: &CallContext<'_>, _args: &[ValueEval]) -> ValueEval {
            ValueEval::Number(self.0)
        }
    }

    #[test]
    fn registering_replaces_without_touching_the_shared_table() {
        let mut table = FunctionTable::with_builtins();
        let before = table.len();
        assert_eq!(table.register_by_name("sum", Constant(42.0)), Some(4));
        assert_eq!(table.len(), before);
        assert_eq!(table.register_by_name("NOT.A.FUNCTION", Constant(1.0)), None);

        let ctx = EvalContext::default();
        let call = CallContext {
            eval: &ctx,
            metadata: function_by_index(4).unwrap(),
        };
        let replaced = table.get(4).unwrap().evaluate(&call, &[]);
        assert_eq!(replaced, ValueEval::Number(42.0));
        let shared = FunctionTable::builtin().get(4).unwrap().evaluate(&call, &[]);
        assert_eq!(shared, ValueEval::Number(0.0));
    }
}
