//! The tree-walking evaluator.
//!
//! One walk serves two purposes, selected by [`Mode`]: real evaluation,
//! and the dependency analysis that shadows it. Keeping both in a single
//! match keeps the two semantics from drifting apart: every case either
//! behaves identically in both modes or branches on the mode exactly
//! where the semantics differ (calls, member access, control flow).
//!
//! Dependency mode is conservative: it walks *both* branches of an `if`,
//! walks loop bodies once with abstract bindings, and never performs
//! side effects. Over-reporting is fine; missing an input is not.

use std::collections::BTreeMap;

use quill_types::ast::{Arg, BinOp, Expr, ExprKind, UnaryOp};

use crate::context::Context;
use crate::dependency::Dependency;
use crate::error::{EvalError, EvalResult};
use crate::value::{equal, Value, ValueRef};

/// Which walk we are running.
#[derive(Clone, Copy)]
enum Mode<'a> {
    /// Real evaluation.
    Eval,
    /// Dependency analysis for one change descriptor.
    Deps(&'a Dependency),
}

impl Context {
    /// Evaluate an expression tree. With `open_scope`, the evaluation
    /// runs in a scope of its own; pass `false` when the caller manages
    /// the scope (e.g. an interactive session reusing one scope across
    /// commands).
    pub fn eval(&mut self, expr: &Expr, open_scope: bool) -> EvalResult<ValueRef> {
        if open_scope {
            let scope = self.open_scope();
            let result = self.walk(expr, Mode::Eval);
            self.close_scope(scope);
            result
        } else {
            self.walk(expr, Mode::Eval)
        }
    }

    /// Walk an expression tree in dependency mode: every object member
    /// the evaluation *could* read records `dep`. Returns an abstract
    /// version of the result.
    pub fn dependencies(&mut self, expr: &Expr, dep: &Dependency) -> EvalResult<ValueRef> {
        let scope = self.open_scope();
        let result = self.walk(expr, Mode::Deps(dep));
        self.close_scope(scope);
        result
    }

    // ── The walk ──────────────────────────────────────────────────────────

    fn walk(&mut self, expr: &Expr, mode: Mode) -> EvalResult<ValueRef> {
        match &expr.kind {
            ExprKind::IntLit(n) => Ok(Value::int(*n)),
            ExprKind::DoubleLit(d) => Ok(Value::double(*d)),
            ExprKind::StringLit(s) => Ok(Value::string(s.clone())),
            ExprKind::BoolLit(b) => Ok(Value::boolean(*b)),
            ExprKind::NilLit => Ok(Value::nil()),

            ExprKind::Identifier(name) => match (self.lookup(name), mode) {
                (Some(value), _) => Ok(value),
                // Unbound names defer their failure: the error only
                // surfaces if something forces the value.
                (None, Mode::Eval) => {
                    Ok(Value::error(EvalError::NoSuchVariable(name.clone())))
                }
                (None, Mode::Deps(_)) => Ok(Value::dummy()),
            },

            ExprKind::ListLit(entries) => self.walk_list(entries, mode),

            ExprKind::Member { object, member } => {
                let object = self.walk(object, mode)?;
                match mode {
                    Mode::Eval => Ok(object.get_member(&member.name)),
                    Mode::Deps(dep) => Ok(object.dependency_member(&member.name, dep)),
                }
            }

            ExprKind::Index { object, index } => {
                let object = self.walk(object, mode)?;
                let index = self.walk(index, mode)?;
                match mode {
                    Mode::Eval => Ok(walk_index(&object, &index)),
                    Mode::Deps(_) => Ok(Value::dummy()),
                }
            }

            ExprKind::Call { callee, args } => {
                let fun = self.walk(callee, mode)?;
                let args = self.walk_args(args, mode)?;
                self.apply(&fun, args, mode)
            }

            ExprKind::Bind { callee, args } => {
                let fun = self.walk(callee, mode)?;
                let args = self.walk_args(args, mode)?;
                match mode {
                    Mode::Eval => self.bind_closure(&fun, args),
                    Mode::Deps(_) => Ok(Value::dummy()),
                }
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.walk(operand, mode)?;
                match mode {
                    Mode::Eval => unary_op(*op, &operand),
                    Mode::Deps(_) => Ok(Value::dummy()),
                }
            }

            ExprKind::Binary { left, op, right } => self.walk_binary(left, *op, right, mode),

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let cond = self.walk(condition, mode)?;
                match mode {
                    Mode::Eval => {
                        if cond.to_bool()? {
                            self.walk(then_branch, mode)
                        } else if let Some(else_branch) = else_branch {
                            self.walk(else_branch, mode)
                        } else {
                            Ok(Value::nil())
                        }
                    }
                    // The change may flip the condition either way, so
                    // both branches are inputs.
                    Mode::Deps(_) => {
                        self.walk(then_branch, mode)?;
                        if let Some(else_branch) = else_branch {
                            self.walk(else_branch, mode)?;
                        }
                        Ok(Value::dummy())
                    }
                }
            }

            ExprKind::For {
                key,
                item,
                iterable,
                body,
            } => self.walk_for(key.as_ref(), item, iterable, body, mode),

            ExprKind::Assign { name, value } => {
                let value = self.walk(value, mode)?;
                self.set(name.name.clone(), value.clone());
                Ok(value)
            }

            ExprKind::Seq(exprs) => {
                let mut last = Value::nil();
                for expr in exprs {
                    last = self.walk(expr, mode)?;
                }
                Ok(last)
            }
        }
    }

    fn walk_list(
        &mut self,
        entries: &[quill_types::ast::ListEntry],
        mode: Mode,
    ) -> EvalResult<ValueRef> {
        let keyed = entries.iter().filter(|e| e.key.is_some()).count();
        if keyed == 0 {
            let mut items = Vec::with_capacity(entries.len());
            for entry in entries {
                items.push(self.walk(&entry.value, mode)?);
            }
            Ok(Value::list(items))
        } else if keyed == entries.len() {
            let mut map = BTreeMap::new();
            for entry in entries {
                let key = entry.key.as_ref().expect("all entries keyed");
                let value = self.walk(&entry.value, mode)?;
                map.insert(key.name.clone(), value);
            }
            Ok(Value::map(map))
        } else {
            Err(EvalError::MixedListEntries)
        }
    }

    fn walk_args(
        &mut self,
        args: &[Arg],
        mode: Mode,
    ) -> EvalResult<Vec<(Option<String>, ValueRef)>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.walk(&arg.value, mode)?;
            out.push((arg.name.as_ref().map(|n| n.name.clone()), value));
        }
        Ok(out)
    }

    /// Call a function value: bind arguments as variables in a fresh
    /// scope, then run the function (or its dependency hook) with that
    /// scope as its environment.
    fn apply(
        &mut self,
        fun: &ValueRef,
        args: Vec<(Option<String>, ValueRef)>,
        mode: Mode,
    ) -> EvalResult<ValueRef> {
        if fun.kind() != crate::value::Kind::Function {
            return match mode {
                Mode::Eval => match fun.error_kind() {
                    // Calling an error value forces it.
                    Some(e) => Err(e.clone()),
                    None => Err(EvalError::NotAFunction(fun.type_name())),
                },
                Mode::Deps(_) => Ok(Value::dummy()),
            };
        }
        let params = fun.param_names().unwrap_or(&[]);
        let scope = self.open_scope();
        let mut bind_error = None;
        for (i, (name, value)) in args.into_iter().enumerate() {
            match name {
                Some(name) => self.set(name, value),
                None => match params.get(i) {
                    Some(param) => self.set(*param, value),
                    None => {
                        if matches!(mode, Mode::Eval) {
                            bind_error = Some(EvalError::TooManyArguments {
                                function: fun.type_name(),
                                expected: params.len(),
                                got: i + 1,
                            });
                            break;
                        }
                    }
                },
            }
        }
        let result = match bind_error {
            Some(e) => Err(e),
            None => match mode {
                Mode::Eval => Value::eval(fun, self, false),
                Mode::Deps(dep) => Value::dependencies(fun, self, dep),
            },
        };
        self.close_scope(scope);
        result
    }

    /// `f@(…)`: build a closure without calling anything.
    fn bind_closure(
        &mut self,
        fun: &ValueRef,
        args: Vec<(Option<String>, ValueRef)>,
    ) -> EvalResult<ValueRef> {
        if fun.kind() != crate::value::Kind::Function {
            return match fun.error_kind() {
                Some(e) => Err(e.clone()),
                None => Err(EvalError::NotAFunction(fun.type_name())),
            };
        }
        let params = fun.param_names().unwrap_or(&[]);
        let mut bindings = Vec::with_capacity(args.len());
        for (i, (name, value)) in args.into_iter().enumerate() {
            match name {
                Some(name) => bindings.push((name, value)),
                None => match params.get(i) {
                    Some(param) => bindings.push((param.to_string(), value)),
                    None => {
                        return Err(EvalError::TooManyArguments {
                            function: fun.type_name(),
                            expected: params.len(),
                            got: i + 1,
                        })
                    }
                },
            }
        }
        Ok(Value::closure(fun.clone(), bindings))
    }

    fn walk_binary(
        &mut self,
        left: &Expr,
        op: BinOp,
        right: &Expr,
        mode: Mode,
    ) -> EvalResult<ValueRef> {
        if let Mode::Deps(_) = mode {
            self.walk(left, mode)?;
            self.walk(right, mode)?;
            return Ok(Value::dummy());
        }
        // Short-circuit forms first.
        match op {
            BinOp::And => {
                let lv = self.walk(left, mode)?;
                if !lv.to_bool()? {
                    return Ok(Value::boolean(false));
                }
                let rv = self.walk(right, mode)?;
                return Ok(Value::boolean(rv.to_bool()?));
            }
            BinOp::Or => {
                let lv = self.walk(left, mode)?;
                if lv.to_bool()? {
                    return Ok(Value::boolean(true));
                }
                let rv = self.walk(right, mode)?;
                return Ok(Value::boolean(rv.to_bool()?));
            }
            _ => {}
        }
        let lv = self.walk(left, mode)?;
        let rv = self.walk(right, mode)?;
        binary_op(op, &lv, &rv)
    }

    fn walk_for(
        &mut self,
        key: Option<&quill_types::ast::Ident>,
        item: &quill_types::ast::Ident,
        iterable: &Expr,
        body: &Expr,
        mode: Mode,
    ) -> EvalResult<ValueRef> {
        let iterable = self.walk(iterable, mode)?;
        match mode {
            Mode::Eval => {
                let iter = Value::make_iterator(&iterable)?;
                let scope = self.open_scope();
                let mut results = Vec::new();
                let mut status = Ok(());
                loop {
                    let next = match iter.next() {
                        Ok(next) => next,
                        Err(e) => {
                            status = Err(e);
                            break;
                        }
                    };
                    let Some(entry) = next else { break };
                    self.set(item.name.clone(), entry.value);
                    if let Some(key_var) = key {
                        let key_value = match (&entry.key, entry.index) {
                            (Some(k), _) => Value::string(k.clone()),
                            (None, Some(i)) => Value::int(i as i64),
                            (None, None) => Value::nil(),
                        };
                        self.set(key_var.name.clone(), key_value);
                    }
                    match self.walk(body, mode) {
                        Ok(value) => results.push(value),
                        Err(e) => {
                            status = Err(e);
                            break;
                        }
                    }
                }
                self.close_scope(scope);
                status.map(|()| Value::list(results))
            }
            Mode::Deps(_) => {
                // One abstract pass over the body covers every iteration.
                let scope = self.open_scope();
                self.set(item.name.clone(), Value::dummy());
                if let Some(key_var) = key {
                    self.set(key_var.name.clone(), Value::dummy());
                }
                let result = self.walk(body, mode);
                self.close_scope(scope);
                result.map(|_| Value::dummy())
            }
        }
    }
}

// ── Index application ─────────────────────────────────────────────────────

fn walk_index(object: &ValueRef, index: &ValueRef) -> ValueRef {
    match &**index {
        Value::Int(i) => object.get_index(*i),
        Value::String(s) => object.get_member(s),
        Value::Error(_) => index.clone(),
        other => Value::error(EvalError::conversion(other.type_name(), "index")),
    }
}

// ── Operators ─────────────────────────────────────────────────────────────

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Int(_) | Value::Double(_))
}

/// Apply a binary operator to two (forced) values.
fn binary_op(op: BinOp, lv: &ValueRef, rv: &ValueRef) -> EvalResult<ValueRef> {
    match op {
        BinOp::Add => add_values(lv, rv),
        BinOp::Sub => arith(op, lv, rv, i64::checked_sub, |a, b| a - b),
        BinOp::Mul => arith(op, lv, rv, i64::checked_mul, |a, b| a * b),
        BinOp::Div => divide(lv, rv),
        BinOp::Mod => modulo(lv, rv),
        BinOp::Eq => Ok(Value::boolean(equal(lv, rv)?)),
        BinOp::NotEq => Ok(Value::boolean(!equal(lv, rv)?)),
        BinOp::Less | BinOp::LessEq | BinOp::Greater | BinOp::GreaterEq => order(op, lv, rv),
        BinOp::Xor => Ok(Value::boolean(lv.to_bool()? ^ rv.to_bool()?)),
        // Short-circuit forms are handled by the walk; reaching here
        // means operands were already produced, so just combine them.
        BinOp::And => Ok(Value::boolean(lv.to_bool()? && rv.to_bool()?)),
        BinOp::Or => Ok(Value::boolean(lv.to_bool()? || rv.to_bool()?)),
    }
}

/// `+` is overloaded: numeric addition, string concatenation, collection
/// concatenation — and nil is its unit, so templates can fold optional
/// parts away.
fn add_values(lv: &ValueRef, rv: &ValueRef) -> EvalResult<ValueRef> {
    match (&**lv, &**rv) {
        (Value::Error(e), _) | (_, Value::Error(e)) => Err(e.clone()),
        (Value::Nil, _) => Ok(rv.clone()),
        (_, Value::Nil) => Ok(lv.clone()),
        (Value::Int(a), Value::Int(b)) => Ok(match a.checked_add(*b) {
            Some(sum) => Value::int(sum),
            None => Value::double(*a as f64 + *b as f64),
        }),
        (a, b) if is_numeric(a) && is_numeric(b) => {
            Ok(Value::double(a.to_double()? + b.to_double()?))
        }
        (
            Value::Collection(crate::value::Collection::List(a)),
            Value::Collection(crate::value::Collection::List(b)),
        ) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Ok(Value::list(items))
        }
        (
            Value::Collection(crate::value::Collection::Map(a)),
            Value::Collection(crate::value::Collection::Map(b)),
        ) => {
            let mut entries = a.clone();
            for (k, v) in b {
                entries.insert(k.clone(), v.clone());
            }
            Ok(Value::map(entries))
        }
        (Value::String(_), _) | (_, Value::String(_)) => {
            Ok(Value::string(format!("{}{}", lv.to_text()?, rv.to_text()?)))
        }
        (a, b) => Err(EvalError::InvalidOperands {
            op: "+",
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

fn arith(
    op: BinOp,
    lv: &ValueRef,
    rv: &ValueRef,
    int_op: fn(i64, i64) -> Option<i64>,
    double_op: fn(f64, f64) -> f64,
) -> EvalResult<ValueRef> {
    match (&**lv, &**rv) {
        (Value::Error(e), _) | (_, Value::Error(e)) => Err(e.clone()),
        (Value::Int(a), Value::Int(b)) => Ok(match int_op(*a, *b) {
            Some(n) => Value::int(n),
            None => Value::double(double_op(*a as f64, *b as f64)),
        }),
        (a, b) if is_numeric(a) && is_numeric(b) => {
            Ok(Value::double(double_op(a.to_double()?, b.to_double()?)))
        }
        (a, b) => Err(EvalError::InvalidOperands {
            op: op.symbol(),
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

fn divide(lv: &ValueRef, rv: &ValueRef) -> EvalResult<ValueRef> {
    match (&**lv, &**rv) {
        (Value::Error(e), _) | (_, Value::Error(e)) => Err(e.clone()),
        (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
        (Value::Int(a), Value::Int(b)) => {
            // Exact integer division stays an int; everything else
            // (remainders, i64::MIN / -1) falls back to doubles.
            Ok(match (a.checked_rem(*b), a.checked_div(*b)) {
                (Some(0), Some(q)) => Value::int(q),
                _ => Value::double(*a as f64 / *b as f64),
            })
        }
        (a, b) if is_numeric(a) && is_numeric(b) => {
            let divisor = b.to_double()?;
            if divisor == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::double(a.to_double()? / divisor))
        }
        (a, b) => Err(EvalError::InvalidOperands {
            op: "/",
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

fn modulo(lv: &ValueRef, rv: &ValueRef) -> EvalResult<ValueRef> {
    match (&**lv, &**rv) {
        (Value::Error(e), _) | (_, Value::Error(e)) => Err(e.clone()),
        (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
        (Value::Int(a), Value::Int(b)) => Ok(match a.checked_rem_euclid(*b) {
            Some(r) => Value::int(r),
            None => Value::double(*a as f64 % *b as f64),
        }),
        (a, b) if is_numeric(a) && is_numeric(b) => {
            let divisor = b.to_double()?;
            if divisor == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::double(a.to_double()? % divisor))
        }
        (a, b) => Err(EvalError::InvalidOperands {
            op: "mod",
            left: a.type_name(),
            right: b.type_name(),
        }),
    }
}

fn order(op: BinOp, lv: &ValueRef, rv: &ValueRef) -> EvalResult<ValueRef> {
    let ordering = match (&**lv, &**rv) {
        (Value::Error(e), _) | (_, Value::Error(e)) => return Err(e.clone()),
        (a, b) if is_numeric(a) && is_numeric(b) => a
            .to_double()?
            .partial_cmp(&b.to_double()?)
            .ok_or(EvalError::InvalidOperands {
                op: op.symbol(),
                left: a.type_name(),
                right: b.type_name(),
            })?,
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
        (a, b) => {
            return Err(EvalError::InvalidOperands {
                op: op.symbol(),
                left: a.type_name(),
                right: b.type_name(),
            })
        }
    };
    Ok(Value::boolean(match op {
        BinOp::Less => ordering.is_lt(),
        BinOp::LessEq => ordering.is_le(),
        BinOp::Greater => ordering.is_gt(),
        BinOp::GreaterEq => ordering.is_ge(),
        _ => unreachable!("order() only handles comparison operators"),
    }))
}

fn unary_op(op: UnaryOp, operand: &ValueRef) -> EvalResult<ValueRef> {
    match op {
        UnaryOp::Neg => match &**operand {
            Value::Error(e) => Err(e.clone()),
            Value::Int(n) => Ok(match n.checked_neg() {
                Some(n) => Value::int(n),
                None => Value::double(-(*n as f64)),
            }),
            Value::Double(d) => Ok(Value::double(-d)),
            other => Err(EvalError::InvalidOperand {
                op: "-",
                operand: other.type_name(),
            }),
        },
        UnaryOp::Not => Ok(Value::boolean(!operand.to_bool()?)),
    }
}
