//! Evaluation context: the stack of lexical scopes.
//!
//! Scopes nest strictly. `open_scope` hands out a handle; `close_scope`
//! takes that handle back and unbinds everything introduced since. Closing
//! anything but the most recently opened scope is a bug in the evaluator
//! itself — never a consequence of script input — so it fails hard instead
//! of returning an error.

use std::collections::BTreeMap;

use crate::error::{EvalError, EvalResult};
use crate::value::ValueRef;

/// Proof that a scope was opened. Must be given back to [`Context::close_scope`].
#[derive(Debug)]
#[must_use = "an unclosed scope leaks its bindings"]
pub struct ScopeHandle {
    depth: usize,
}

/// A stack of scope frames mapping variable names to shared values.
///
/// The bottom frame holds the builtin function bindings and is never
/// popped. Evaluation is confined to one logical thread of control per
/// context; nothing here is `Sync`.
pub struct Context {
    scopes: Vec<BTreeMap<String, ValueRef>>,
}

impl Context {
    /// Create a context with only the (empty) bottom frame.
    pub fn new() -> Self {
        Self {
            scopes: vec![BTreeMap::new()],
        }
    }

    /// Current nesting depth (1 = only the bottom frame).
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Push a new scope frame.
    pub fn open_scope(&mut self) -> ScopeHandle {
        self.scopes.push(BTreeMap::new());
        ScopeHandle {
            depth: self.scopes.len(),
        }
    }

    /// Pop the scope opened by `handle`, unbinding all names introduced
    /// since.
    ///
    /// # Panics
    /// If `handle` is not the most recently opened unclosed scope. That
    /// ordering violation would corrupt lexical visibility, so it is not
    /// recoverable.
    pub fn close_scope(&mut self, handle: ScopeHandle) {
        assert_eq!(
            handle.depth,
            self.scopes.len(),
            "scope closed out of order (handle depth {}, current depth {})",
            handle.depth,
            self.scopes.len(),
        );
        assert!(handle.depth > 1, "cannot close the bottom scope");
        self.scopes.pop();
    }

    /// Bind `name` in the innermost frame, shadowing any outer binding.
    pub fn set(&mut self, name: impl Into<String>, value: ValueRef) {
        self.scopes
            .last_mut()
            .expect("context always has a bottom frame")
            .insert(name.into(), value);
    }

    /// Bind `name` in the bottom frame (used to install builtins).
    pub fn set_global(&mut self, name: impl Into<String>, value: ValueRef) {
        self.scopes[0].insert(name.into(), value);
    }

    /// Look up `name`, innermost frame first.
    pub fn lookup(&self, name: &str) -> Option<ValueRef> {
        self.scopes
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).cloned())
    }

    /// Is `name` bound in the innermost frame?
    pub fn has_local(&self, name: &str) -> bool {
        self.scopes
            .last()
            .expect("context always has a bottom frame")
            .contains_key(name)
    }

    /// Fetch a function argument bound in scope, or report which argument
    /// of which function is missing.
    pub fn arg(&self, function: &str, name: &str) -> EvalResult<ValueRef> {
        self.lookup(name).ok_or_else(|| EvalError::MissingArgument {
            function: function.to_string(),
            name: name.to_string(),
        })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn lookup_walks_inner_to_outer() {
        let mut ctx = Context::new();
        ctx.set("x", Value::int(1));
        let outer = ctx.open_scope();
        ctx.set("y", Value::int(2));
        assert!(ctx.lookup("x").is_some());
        assert!(ctx.lookup("y").is_some());
        ctx.close_scope(outer);
        assert!(ctx.lookup("y").is_none());
    }

    #[test]
    fn inner_binding_shadows_not_mutates() {
        let mut ctx = Context::new();
        ctx.set("x", Value::int(1));
        let scope = ctx.open_scope();
        ctx.set("x", Value::int(2));
        assert_eq!(ctx.lookup("x").unwrap().to_int().unwrap(), 2);
        ctx.close_scope(scope);
        assert_eq!(ctx.lookup("x").unwrap().to_int().unwrap(), 1);
    }

    #[test]
    fn nested_scopes_close_in_order() {
        let mut ctx = Context::new();
        let a = ctx.open_scope();
        let b = ctx.open_scope();
        ctx.close_scope(b);
        ctx.close_scope(a);
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    #[should_panic(expected = "scope closed out of order")]
    fn closing_stale_handle_panics() {
        let mut ctx = Context::new();
        let a = ctx.open_scope();
        let _b = ctx.open_scope();
        ctx.close_scope(a);
    }
}
