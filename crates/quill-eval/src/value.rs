//! The polymorphic script value model.
//!
//! One closed sum type covers every kind of value the language can
//! produce. Values are immutable once built and shared by reference
//! counting ([`ValueRef`]); a "mutation" always builds a new value. The
//! few places the protocol demands state (iterator cursors, closure
//! simplification, object dependency registries) use interior mutability,
//! which is safe because evaluation is single-threaded by design.
//!
//! Conversions are total: every variant either yields a value, a defined
//! fallback (nil converts to `""`, `0`, `false`), or a defined
//! `EvalError::Conversion`. Error-kind values are lazy: building one is
//! silent, and any attempt to convert, compare or call it surfaces the
//! wrapped error.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use chrono::NaiveDateTime;
use quill_types::Color;

use crate::closure::ClosureData;
use crate::context::Context;
use crate::dependency::{Dependency, DependencyRecord};
use crate::error::{EvalError, EvalResult};

/// Shared handle to a script value. Lifetime = longest holder.
pub type ValueRef = Rc<Value>;

/// Type tag reported by every value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Nil,
    Int,
    Bool,
    Double,
    String,
    Color,
    Image,
    Function,
    Object,
    Collection,
    Regex,
    DateTime,
    Iterator,
    Dummy,
    Error,
}

/// How a value asks to be compared (see [`equal`]).
#[derive(Debug, Clone, PartialEq)]
pub enum CompareWhat {
    /// Equal to nothing, not even itself by content (the dummy value).
    Nothing,
    /// Compare by this string key.
    AsString(String),
    /// Compare by identity of the allocation.
    AsIdentity(*const Value),
}

/// The date/time text form shared by conversion and `to_code`.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A script value.
#[derive(Debug)]
pub enum Value {
    Nil,
    Int(i64),
    Bool(bool),
    Double(f64),
    String(String),
    Color(Color),
    Image(ImageRecipe),
    Function(NativeFunction),
    /// A function with pre-bound default arguments; reports
    /// [`Kind::Function`] like the function it wraps.
    Closure(RefCell<ClosureData>),
    Object(ObjectValue),
    Collection(Collection),
    Regex(ScriptRegex),
    DateTime(NaiveDateTime),
    Iterator(RefCell<Iter>),
    /// Abstract placeholder produced by dependency analysis.
    Dummy,
    /// A deferred failure; surfaces only when forced.
    Error(EvalError),
}

// ── Constructors ──────────────────────────────────────────────────────────

impl Value {
    pub fn nil() -> ValueRef {
        Rc::new(Value::Nil)
    }

    pub fn int(value: i64) -> ValueRef {
        Rc::new(Value::Int(value))
    }

    pub fn boolean(value: bool) -> ValueRef {
        Rc::new(Value::Bool(value))
    }

    pub fn double(value: f64) -> ValueRef {
        Rc::new(Value::Double(value))
    }

    pub fn string(value: impl Into<String>) -> ValueRef {
        Rc::new(Value::String(value.into()))
    }

    pub fn color(value: Color) -> ValueRef {
        Rc::new(Value::Color(value))
    }

    pub fn image(recipe: ImageRecipe) -> ValueRef {
        Rc::new(Value::Image(recipe))
    }

    pub fn datetime(value: NaiveDateTime) -> ValueRef {
        Rc::new(Value::DateTime(value))
    }

    pub fn list(items: Vec<ValueRef>) -> ValueRef {
        Rc::new(Value::Collection(Collection::List(items)))
    }

    pub fn map(entries: BTreeMap<String, ValueRef>) -> ValueRef {
        Rc::new(Value::Collection(Collection::Map(entries)))
    }

    pub fn object(object: ObjectValue) -> ValueRef {
        Rc::new(Value::Object(object))
    }

    pub fn regex(regex: ScriptRegex) -> ValueRef {
        Rc::new(Value::Regex(regex))
    }

    pub fn native(function: NativeFunction) -> ValueRef {
        Rc::new(Value::Function(function))
    }

    pub fn closure(fun: ValueRef, bindings: Vec<(String, ValueRef)>) -> ValueRef {
        Rc::new(Value::Closure(RefCell::new(ClosureData::new(fun, bindings))))
    }

    pub fn dummy() -> ValueRef {
        Rc::new(Value::Dummy)
    }

    /// Build a lazy error value. Nothing happens until it is forced.
    pub fn error(error: EvalError) -> ValueRef {
        Rc::new(Value::Error(error))
    }
}

// ── Type information ──────────────────────────────────────────────────────

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Nil => Kind::Nil,
            Value::Int(_) => Kind::Int,
            Value::Bool(_) => Kind::Bool,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Color(_) => Kind::Color,
            Value::Image(_) => Kind::Image,
            Value::Function(_) | Value::Closure(_) => Kind::Function,
            Value::Object(_) => Kind::Object,
            Value::Collection(_) => Kind::Collection,
            Value::Regex(_) => Kind::Regex,
            Value::DateTime(_) => Kind::DateTime,
            Value::Iterator(_) => Kind::Iterator,
            Value::Dummy => Kind::Dummy,
            Value::Error(_) => Kind::Error,
        }
    }

    /// Stable human-readable type label for error messages.
    pub fn type_name(&self) -> String {
        match self {
            Value::Nil => "nil".into(),
            Value::Int(_) => "integer".into(),
            Value::Bool(_) => "boolean".into(),
            Value::Double(_) => "double".into(),
            Value::String(_) => "string".into(),
            Value::Color(_) => "color".into(),
            Value::Image(_) => "image".into(),
            Value::Function(f) => format!("function '{}'", f.name),
            Value::Closure(c) => c.borrow().fun.type_name(),
            Value::Object(o) => o.type_name.clone(),
            Value::Collection(_) => "collection".into(),
            Value::Regex(_) => "regular expression".into(),
            Value::DateTime(_) => "date/time".into(),
            Value::Iterator(_) => "iterator".into(),
            Value::Dummy => "dummy".into(),
            Value::Error(_) => "error".into(),
        }
    }

    /// The wrapped error of an error-kind value.
    pub fn error_kind(&self) -> Option<&EvalError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl Value {
    /// Convert to a string.
    pub fn to_text(&self) -> EvalResult<String> {
        match self {
            Value::Nil => Ok(String::new()),
            Value::Int(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(if *b { "true" } else { "false" }.into()),
            Value::Double(d) => Ok(format_double(*d)),
            Value::String(s) => Ok(s.clone()),
            Value::Color(c) => Ok(c.to_string()),
            Value::DateTime(dt) => Ok(dt.format(DATETIME_FORMAT).to_string()),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::conversion(other.type_name(), "string")),
        }
    }

    /// Convert to a double.
    pub fn to_double(&self) -> EvalResult<f64> {
        match self {
            Value::Nil => Ok(0.0),
            Value::Int(n) => Ok(*n as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Double(d) => Ok(*d),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| EvalError::conversion(self.type_name(), "double")),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::conversion(other.type_name(), "double")),
        }
    }

    /// Convert to an integer.
    pub fn to_int(&self) -> EvalResult<i64> {
        match self {
            Value::Nil => Ok(0),
            Value::Int(n) => Ok(*n),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Double(d) => Ok(*d as i64),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| EvalError::conversion(self.type_name(), "integer")),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::conversion(other.type_name(), "integer")),
        }
    }

    /// Convert to a boolean.
    pub fn to_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Nil => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.as_str() {
                "true" => Ok(true),
                "false" | "" => Ok(false),
                _ => Err(EvalError::conversion(self.type_name(), "boolean")),
            },
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::conversion(other.type_name(), "boolean")),
        }
    }

    /// Convert to a color.
    pub fn to_color(&self) -> EvalResult<Color> {
        match self {
            Value::Color(c) => Ok(*c),
            Value::String(s) => Color::from_hex(s)
                .ok_or_else(|| EvalError::conversion(self.type_name(), "color")),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::conversion(other.type_name(), "color")),
        }
    }

    /// Convert to a date/time.
    pub fn to_datetime(&self) -> EvalResult<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => NaiveDateTime::parse_from_str(s.trim(), DATETIME_FORMAT)
                .map_err(|_| EvalError::conversion(self.type_name(), "date/time")),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::conversion(other.type_name(), "date/time")),
        }
    }

    /// Convert to an image recipe. A color becomes a solid fill, a string
    /// names an image file; the renderer does the rest.
    pub fn to_image(&self) -> EvalResult<ImageRecipe> {
        match self {
            Value::Image(recipe) => Ok(recipe.clone()),
            Value::Color(c) => Ok(ImageRecipe::Solid(*c)),
            Value::String(s) => Ok(ImageRecipe::File(s.clone())),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::conversion(other.type_name(), "image")),
        }
    }

    /// Script code that rebuilds this value. Round-trips for primitive
    /// kinds; falls back to the plain string form elsewhere.
    pub fn to_code(&self) -> EvalResult<String> {
        match self {
            Value::Nil => Ok("nil".into()),
            Value::String(s) => Ok(quote_string(s)),
            Value::DateTime(dt) => Ok(format!(
                "to_date(\"{}\")",
                dt.format(DATETIME_FORMAT)
            )),
            Value::Collection(Collection::List(items)) => {
                let mut out = String::from("[");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&item.to_code()?);
                }
                out.push(']');
                Ok(out)
            }
            Value::Collection(Collection::Map(entries)) => {
                let mut out = String::from("[");
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(": ");
                    out.push_str(&value.to_code()?);
                }
                out.push(']');
                Ok(out)
            }
            Value::Function(f) => Ok(f.name.to_string()),
            Value::Closure(cell) => {
                let data = cell.borrow();
                let mut out = data.fun.to_code()?;
                out.push_str("@(");
                for (i, (name, value)) in data.bindings.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push_str(": ");
                    out.push_str(&value.to_code()?);
                }
                out.push(')');
                Ok(out)
            }
            other => other.to_text(),
        }
    }
}

// ── Members, indexing, counting ───────────────────────────────────────────

impl Value {
    /// Fetch a named member. A miss is recoverable: the result is a lazy
    /// error value, surfacing only if the caller forces it.
    pub fn get_member(&self, name: &str) -> ValueRef {
        if let Value::Error(e) = self {
            // An error value stays that error, whatever is asked of it.
            return Value::error(e.clone());
        }
        let found = match self {
            Value::Object(o) => o.members.get(name).cloned(),
            Value::Collection(Collection::Map(entries)) => entries.get(name).cloned(),
            _ => None,
        };
        found.unwrap_or_else(|| {
            Value::error(EvalError::NoSuchMember {
                container: self.type_name(),
                member: name.to_string(),
            })
        })
    }

    /// Fetch the member at `index`. Misses are lazy error values, like
    /// [`Value::get_member`].
    pub fn get_index(&self, index: i64) -> ValueRef {
        match self {
            Value::Error(e) => Value::error(e.clone()),
            Value::Collection(Collection::List(items)) => usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_else(|| {
                    Value::error(EvalError::IndexOutOfRange {
                        index,
                        size: items.len(),
                    })
                }),
            Value::Collection(Collection::Map(entries)) => usize::try_from(index)
                .ok()
                .and_then(|i| entries.values().nth(i).cloned())
                .unwrap_or_else(|| {
                    Value::error(EvalError::IndexOutOfRange {
                        index,
                        size: entries.len(),
                    })
                }),
            other => Value::error(EvalError::conversion(other.type_name(), "collection")),
        }
    }

    /// Number of items in a collection. Independent of any iterator.
    pub fn item_count(&self) -> EvalResult<usize> {
        match self {
            Value::Collection(Collection::List(items)) => Ok(items.len()),
            Value::Collection(Collection::Map(entries)) => Ok(entries.len()),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::conversion(other.type_name(), "collection")),
        }
    }
}

// ── Iteration ─────────────────────────────────────────────────────────────

/// Cursor state of an iterator value: lazy, finite, forward-only.
#[derive(Debug)]
pub enum Iter {
    List { items: Vec<ValueRef>, pos: usize },
    Map {
        entries: Vec<(String, ValueRef)>,
        pos: usize,
    },
}

/// One item produced by an iterator. `key` is populated for keyed
/// collections, `index` for indexable ones.
#[derive(Debug, Clone)]
pub struct IterItem {
    pub value: ValueRef,
    pub key: Option<String>,
    pub index: Option<usize>,
}

impl Value {
    /// Return an iterator value over this collection. Iterators iterate
    /// as themselves; anything else is a conversion failure.
    pub fn make_iterator(this: &ValueRef) -> EvalResult<ValueRef> {
        match &**this {
            Value::Collection(Collection::List(items)) => {
                Ok(Rc::new(Value::Iterator(RefCell::new(Iter::List {
                    items: items.clone(),
                    pos: 0,
                }))))
            }
            Value::Collection(Collection::Map(entries)) => {
                Ok(Rc::new(Value::Iterator(RefCell::new(Iter::Map {
                    entries: entries
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                    pos: 0,
                }))))
            }
            Value::Iterator(_) => Ok(this.clone()),
            Value::Error(e) => Err(e.clone()),
            other => Err(EvalError::NotIterable(other.type_name())),
        }
    }

    /// Produce the next item, or `None` once exhausted. Only meaningful
    /// on iterator values.
    pub fn next(&self) -> EvalResult<Option<IterItem>> {
        let Value::Iterator(cell) = self else {
            return Err(EvalError::NotIterable(self.type_name()));
        };
        let mut iter = cell.borrow_mut();
        Ok(match &mut *iter {
            Iter::List { items, pos } => {
                let item = items.get(*pos).cloned().map(|value| IterItem {
                    value,
                    key: None,
                    index: Some(*pos),
                });
                *pos += 1;
                item
            }
            Iter::Map { entries, pos } => {
                let item = entries.get(*pos).cloned().map(|(key, value)| IterItem {
                    value,
                    key: Some(key),
                    index: None,
                });
                *pos += 1;
                item
            }
        })
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────

impl Value {
    /// Evaluate this value. Functions run their body against `ctx` (with
    /// a fresh scope when `open_scope` is set — pass `false` when the
    /// caller already bound arguments in a scope of its own); every other
    /// variant evaluates to itself; error values surface.
    pub fn eval(this: &ValueRef, ctx: &mut Context, open_scope: bool) -> EvalResult<ValueRef> {
        match &**this {
            Value::Function(f) => {
                if open_scope {
                    let scope = ctx.open_scope();
                    let result = (f.body)(ctx);
                    ctx.close_scope(scope);
                    result
                } else {
                    (f.body)(ctx)
                }
            }
            Value::Closure(_) => crate::closure::eval_closure(this, ctx, open_scope),
            Value::Error(e) => Err(e.clone()),
            _ => Ok(this.clone()),
        }
    }

    /// Declared parameter names, for mapping positional arguments.
    pub fn param_names(&self) -> Option<&'static [&'static str]> {
        match self {
            Value::Function(f) => Some(f.params),
            Value::Closure(c) => c.borrow().fun.param_names(),
            _ => None,
        }
    }

    /// Hook invoked when a closure over this function is first evaluated.
    /// May rewrite the closure's bindings in place, or return a full
    /// replacement value; `None` keeps the closure unchanged.
    pub fn simplify_closure(&self, closure: &mut ClosureData) -> EvalResult<Option<ValueRef>> {
        match self {
            Value::Function(f) => match f.simplifier {
                Some(simplify) => simplify(closure),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }
}

// ── Dependency protocol ───────────────────────────────────────────────────

impl Value {
    /// Declare that the computation described by `dep` depends on this
    /// value as a whole.
    pub fn dependency_this(&self, dep: &Dependency) {
        if let Value::Object(o) = self {
            o.record(None, dep);
        }
    }

    /// Abstract version of [`Value::get_member`]: registers the member
    /// access and returns a value the dependency walk can keep going
    /// with — the real member when it exists, the dummy otherwise.
    pub fn dependency_member(&self, name: &str, dep: &Dependency) -> ValueRef {
        if let Value::Object(o) = self {
            o.record(Some(name), dep);
        }
        let member = self.get_member(name);
        if member.kind() == Kind::Error {
            return Value::dummy();
        }
        member.dependency_name(self, dep).unwrap_or(member)
    }

    /// Inverse direction of [`Value::dependency_member`]: this value was
    /// reached as a member of `container` during a dependency walk and may
    /// react. `None` means "use this value unchanged".
    pub fn dependency_name(&self, container: &Value, dep: &Dependency) -> Option<ValueRef> {
        let _ = container;
        if let Value::Object(o) = self {
            // A change to an object reached through any container affects
            // the dependent computation.
            o.record(None, dep);
        }
        None
    }

    /// Abstract version of [`Value::eval`] for the dependency walk: marks
    /// what this function's evaluation would depend on and returns the
    /// shape of its result, with no side effects.
    pub fn dependencies(
        this: &ValueRef,
        ctx: &mut Context,
        dep: &Dependency,
    ) -> EvalResult<ValueRef> {
        match &**this {
            // A native body is host code the walk cannot see through;
            // report the opaque shape.
            Value::Function(_) => Ok(Value::dummy()),
            Value::Closure(_) => crate::closure::closure_dependencies(this, ctx, dep),
            Value::Error(e) => Err(e.clone()),
            _ => Ok(this.clone()),
        }
    }
}

// ── Comparison ────────────────────────────────────────────────────────────

impl Value {
    /// How should this value be compared? String-formable kinds compare
    /// by their string form; opaque kinds compare by identity; the dummy
    /// compares as nothing.
    pub fn compare_as(this: &ValueRef) -> EvalResult<CompareWhat> {
        match &**this {
            Value::Dummy => Ok(CompareWhat::Nothing),
            Value::Error(e) => Err(e.clone()),
            Value::Nil
            | Value::Int(_)
            | Value::Bool(_)
            | Value::Double(_)
            | Value::String(_)
            | Value::Color(_)
            | Value::DateTime(_) => Ok(CompareWhat::AsString(this.to_text()?)),
            _ => Ok(CompareWhat::AsIdentity(Rc::as_ptr(this))),
        }
    }
}

/// Compare two script values for equality.
///
/// Int and double cross-compare numerically. Otherwise each side's
/// [`Value::compare_as`] picks the strategy: identity wins if either side
/// demands it, else the string forms are compared. The string strategy is
/// deliberately cross-kind: `3 == "3"` and a color equals the string that
/// spells it. Comparing an error value surfaces its error.
pub fn equal(a: &ValueRef, b: &ValueRef) -> EvalResult<bool> {
    if Rc::ptr_eq(a, b) {
        return Ok(true);
    }
    if matches!(a.kind(), Kind::Int | Kind::Double) && matches!(b.kind(), Kind::Int | Kind::Double)
    {
        return Ok(a.to_double()? == b.to_double()?);
    }
    match (Value::compare_as(a)?, Value::compare_as(b)?) {
        (CompareWhat::AsString(x), CompareWhat::AsString(y)) => Ok(x == y),
        (CompareWhat::AsIdentity(p), CompareWhat::AsIdentity(q)) => Ok(std::ptr::eq(p, q)),
        _ => Ok(false),
    }
}

// ── Collections ───────────────────────────────────────────────────────────

/// Backing storage of a collection value.
#[derive(Debug)]
pub enum Collection {
    List(Vec<ValueRef>),
    Map(BTreeMap<String, ValueRef>),
}

// ── Objects ───────────────────────────────────────────────────────────────

/// A host-entity mirror: a typed bag of named members plus the registry
/// the dependency walk writes into. The host builds these around its own
/// data (cards, styles, …) and later asks which dependents each member
/// has, to invalidate caches precisely.
#[derive(Debug)]
pub struct ObjectValue {
    type_name: String,
    members: BTreeMap<String, ValueRef>,
    dependents: RefCell<Vec<DependencyRecord>>,
}

impl ObjectValue {
    pub fn new(type_name: impl Into<String>, members: BTreeMap<String, ValueRef>) -> Self {
        Self {
            type_name: type_name.into(),
            members,
            dependents: RefCell::new(Vec::new()),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub(crate) fn record(&self, member: Option<&str>, dep: &Dependency) {
        self.dependents.borrow_mut().push(DependencyRecord {
            member: member.map(str::to_string),
            dependency: dep.clone(),
        });
    }

    /// Every registration made so far.
    pub fn records(&self) -> Vec<DependencyRecord> {
        self.dependents.borrow().clone()
    }

    /// Dependents registered against `member`, including whole-object
    /// registrations (a whole-object dependent is affected by any member).
    pub fn dependents_of(&self, member: &str) -> Vec<Dependency> {
        self.dependents
            .borrow()
            .iter()
            .filter(|r| r.member.as_deref().map(|m| m == member).unwrap_or(true))
            .map(|r| r.dependency.clone())
            .collect()
    }
}

// ── Functions ─────────────────────────────────────────────────────────────

/// Body of a builtin function. Arguments arrive as variables bound in the
/// current scope under the declared parameter names.
pub type NativeBody = fn(&mut Context) -> EvalResult<ValueRef>;

/// Closure-simplification hook of a builtin (see
/// [`Value::simplify_closure`]).
pub type ClosureSimplifier = fn(&mut ClosureData) -> EvalResult<Option<ValueRef>>;

/// A builtin function value.
pub struct NativeFunction {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub body: NativeBody,
    pub simplifier: Option<ClosureSimplifier>,
}

impl NativeFunction {
    pub fn new(name: &'static str, params: &'static [&'static str], body: NativeBody) -> Self {
        Self {
            name,
            params,
            body,
            simplifier: None,
        }
    }

    pub fn with_simplifier(mut self, simplifier: ClosureSimplifier) -> Self {
        self.simplifier = Some(simplifier);
        self
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

// ── Regexes ───────────────────────────────────────────────────────────────

/// A compiled regular expression value.
#[derive(Debug, Clone)]
pub struct ScriptRegex {
    pattern: String,
    regex: regex::Regex,
}

impl ScriptRegex {
    pub fn compile(pattern: &str) -> EvalResult<Self> {
        let regex = regex::Regex::new(pattern)
            .map_err(|e| EvalError::MalformedRegex(e.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// Accept an existing regex value, or compile the value's string form.
    pub fn from_value(value: &Value) -> EvalResult<Self> {
        match value {
            Value::Regex(r) => Ok(r.clone()),
            other => ScriptRegex::compile(&other.to_text()?),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn regex(&self) -> &regex::Regex {
        &self.regex
    }
}

// ── Images ────────────────────────────────────────────────────────────────

/// Recipe for a generated image. The evaluator only builds and passes
/// these along; rendering belongs to the host's image pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRecipe {
    /// A solid fill of one color.
    Solid(Color),
    /// An image loaded from a named file.
    File(String),
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Format a double so it re-parses as a double (never bare digits).
pub(crate) fn format_double(d: f64) -> String {
    let mut s = format!("{d}");
    if !s.contains(['.', 'e', 'E']) && !s.contains("inf") && !s.contains("NaN") {
        s.push_str(".0");
    }
    s
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_conversion_fallbacks() {
        let nil = Value::nil();
        assert_eq!(nil.to_text().unwrap(), "");
        assert_eq!(nil.to_int().unwrap(), 0);
        assert_eq!(nil.to_double().unwrap(), 0.0);
        assert!(!nil.to_bool().unwrap());
    }

    #[test]
    fn meaningless_conversion_is_a_defined_error() {
        let img = Value::image(ImageRecipe::File("border.png".into()));
        assert_eq!(
            img.to_int(),
            Err(EvalError::conversion("image", "integer"))
        );
    }

    #[test]
    fn error_values_are_lazy_until_forced() {
        let err = Value::error(EvalError::NoSuchVariable("ghost".into()));
        assert_eq!(err.kind(), Kind::Error);
        // Holding or collecting it is fine; forcing surfaces the error.
        assert_eq!(
            err.to_text(),
            Err(EvalError::NoSuchVariable("ghost".into()))
        );
    }

    #[test]
    fn double_format_reparses_as_double() {
        assert_eq!(format_double(3.0), "3.0");
        assert_eq!(format_double(3.5), "3.5");
        // huge magnitudes print without a dot; the suffix keeps them doubles
        assert!(format_double(1e300).ends_with(".0"));
    }

    #[test]
    fn member_miss_is_recoverable() {
        let obj = Value::object(ObjectValue::new("card", BTreeMap::new()));
        let miss = obj.get_member("name");
        assert_eq!(miss.kind(), Kind::Error);
    }

    #[test]
    fn string_to_code_quotes_and_escapes() {
        let s = Value::string("a\"b\\c\n");
        assert_eq!(s.to_code().unwrap(), r#""a\"b\\c\n""#);
    }

    #[test]
    fn iterator_exhausts_to_none() {
        let list = Value::list(vec![Value::int(1), Value::int(2)]);
        let iter = Value::make_iterator(&list).unwrap();
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.index, Some(0));
        assert!(iter.next().unwrap().is_some());
        assert!(iter.next().unwrap().is_none());
        // item_count never touches the cursor
        assert_eq!(list.item_count().unwrap(), 2);
    }

    #[test]
    fn map_iteration_yields_keys() {
        let mut entries = BTreeMap::new();
        entries.insert("x".to_string(), Value::int(1));
        let map = Value::map(entries);
        let iter = Value::make_iterator(&map).unwrap();
        let item = iter.next().unwrap().unwrap();
        assert_eq!(item.key.as_deref(), Some("x"));
        assert_eq!(item.index, None);
    }

    #[test]
    fn equality_strategies() {
        // numeric cross-kind
        assert!(equal(&Value::int(3), &Value::double(3.0)).unwrap());
        // string coercion
        assert!(equal(&Value::int(3), &Value::string("3")).unwrap());
        // the documented color/string collision
        assert!(equal(
            &Value::color(Color::rgb(0, 0, 0)),
            &Value::string("rgb(0,0,0)")
        )
        .unwrap());
        // identity for objects
        let a = Value::object(ObjectValue::new("card", BTreeMap::new()));
        let b = Value::object(ObjectValue::new("card", BTreeMap::new()));
        assert!(!equal(&a, &b).unwrap());
        assert!(equal(&a, &a).unwrap());
        // dummy equals nothing
        assert!(!equal(&Value::dummy(), &Value::dummy()).unwrap());
    }
}
