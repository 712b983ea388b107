//! Closures: function values with pre-bound default arguments.
//!
//! `f@(x: 1)` stores the function together with the evaluated bindings;
//! calling the closure later opens a scope, fills in every default whose
//! name the caller did not bind, and runs the function. On first
//! evaluation the function gets one shot at simplifying the closure —
//! rewriting bindings in place (the regex builtins precompile their
//! `match:` string here) or replacing the closure wholesale.

use crate::context::Context;
use crate::dependency::Dependency;
use crate::error::{EvalError, EvalResult};
use crate::value::{Value, ValueRef};

/// The captured state of a closure value.
#[derive(Debug)]
pub struct ClosureData {
    /// The wrapped function.
    pub fun: ValueRef,
    /// Default-argument bindings, applied at call time where unbound.
    pub bindings: Vec<(String, ValueRef)>,
    /// Whether the one-time simplification pass has run.
    pub(crate) simplified: bool,
}

impl ClosureData {
    pub fn new(fun: ValueRef, bindings: Vec<(String, ValueRef)>) -> Self {
        Self {
            fun,
            bindings,
            simplified: false,
        }
    }

    /// Look up a bound default by name.
    pub fn binding(&self, name: &str) -> Option<&ValueRef> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// Evaluate a closure value: simplify once, bind defaults, run the
/// function.
pub(crate) fn eval_closure(
    this: &ValueRef,
    ctx: &mut Context,
    open_scope: bool,
) -> EvalResult<ValueRef> {
    let Value::Closure(cell) = &**this else {
        return Err(EvalError::NotAFunction(this.type_name()));
    };

    // Lazy simplification: first evaluation only.
    let replacement = {
        let mut data = cell.borrow_mut();
        if data.simplified {
            None
        } else {
            data.simplified = true;
            let fun = data.fun.clone();
            fun.simplify_closure(&mut data)?
        }
    };
    if let Some(replacement) = replacement {
        return Value::eval(&replacement, ctx, open_scope);
    }

    let (fun, bindings) = {
        let data = cell.borrow();
        (data.fun.clone(), data.bindings.clone())
    };
    if open_scope {
        let scope = ctx.open_scope();
        bind_defaults(ctx, &bindings);
        let result = Value::eval(&fun, ctx, false);
        ctx.close_scope(scope);
        result
    } else {
        bind_defaults(ctx, &bindings);
        Value::eval(&fun, ctx, false)
    }
}

/// Dependency-walk counterpart of [`eval_closure`]: the bound defaults
/// are inputs of whatever the closure computes.
pub(crate) fn closure_dependencies(
    this: &ValueRef,
    ctx: &mut Context,
    dep: &Dependency,
) -> EvalResult<ValueRef> {
    let Value::Closure(cell) = &**this else {
        return Err(EvalError::NotAFunction(this.type_name()));
    };
    let (fun, bindings) = {
        let data = cell.borrow();
        (data.fun.clone(), data.bindings.clone())
    };
    for (_, value) in &bindings {
        value.dependency_this(dep);
    }
    bind_defaults(ctx, &bindings);
    Value::dependencies(&fun, ctx, dep)
}

/// Bind each default whose name the current scope frame does not already
/// hold (call-site arguments win over defaults).
fn bind_defaults(ctx: &mut Context, bindings: &[(String, ValueRef)]) {
    for (name, value) in bindings {
        if !ctx.has_local(name) {
            ctx.set(name.clone(), value.clone());
        }
    }
}
