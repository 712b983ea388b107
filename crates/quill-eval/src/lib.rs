//! Quill tree-walking evaluator.
//!
//! The language core: the polymorphic value model, the scope-stack
//! evaluation context, the dependency-tracking walk that shadows
//! evaluation, closures with lazy simplification, and the builtin
//! function library. Parsing lives upstream in `quill-parser`; rendering
//! of image values lives downstream in the host.

pub mod closure;
pub mod context;
pub mod dependency;
mod error;
mod evaluator;
pub mod stdlib;
pub mod value;

pub use closure::ClosureData;
pub use context::{Context, ScopeHandle};
pub use dependency::{Dependency, DependencyRecord};
pub use error::{EvalError, EvalResult};
pub use value::{
    equal, Collection, CompareWhat, ImageRecipe, Iter, IterItem, Kind, NativeFunction,
    ObjectValue, ScriptRegex, Value, ValueRef,
};
