//! Builtin script functions.
//!
//! Builtins are plain function values bound by name in a context's bottom
//! frame; calling one binds its arguments as variables in a fresh scope,
//! and the body reads them back by parameter name. The regex functions
//! also carry a closure simplifier: when used as a rule (`replace@(match:
//! "…", replace: "…")`), the `match:` string is compiled into a regex
//! value on the closure's first evaluation and reused from then on.

use std::cmp::Ordering;

use quill_types::Color;

use crate::closure::ClosureData;
use crate::context::Context;
use crate::error::{EvalError, EvalResult};
use crate::value::{equal, Collection, NativeFunction, ScriptRegex, Value, ValueRef};

/// Bind every builtin into the context's bottom frame.
pub fn install(ctx: &mut Context) {
    let natives: &[NativeFunction] = &[
        NativeFunction::new("to_string", &["input"], script_to_string),
        NativeFunction::new("to_int", &["input"], script_to_int),
        NativeFunction::new("to_number", &["input"], script_to_number),
        NativeFunction::new("to_boolean", &["input"], script_to_boolean),
        NativeFunction::new("to_color", &["input"], script_to_color),
        NativeFunction::new("to_date", &["input"], script_to_date),
        NativeFunction::new("to_image", &["input"], script_to_image),
        NativeFunction::new("type_name", &["input"], script_type_name),
        NativeFunction::new("length", &["input"], script_length),
        NativeFunction::new("abs", &["input"], script_abs),
        NativeFunction::new("min", &["a", "b"], script_min),
        NativeFunction::new("max", &["a", "b"], script_max),
        NativeFunction::new("rgb", &["r", "g", "b"], script_rgb),
        NativeFunction::new("rgba", &["r", "g", "b", "a"], script_rgba),
        NativeFunction::new("contains", &["input", "find"], script_contains),
        NativeFunction::new("sort", &["input"], script_sort),
        NativeFunction::new("reverse", &["input"], script_reverse),
        NativeFunction::new("match", &["input", "match"], script_match)
            .with_simplifier(precompile_match_arg),
        NativeFunction::new("replace", &["input", "match", "replace"], script_replace)
            .with_simplifier(precompile_match_arg),
    ];
    for native in natives {
        ctx.set_global(
            native.name,
            Value::native(NativeFunction {
                name: native.name,
                params: native.params,
                body: native.body,
                simplifier: native.simplifier,
            }),
        );
    }
}

/// A context with the builtin library installed.
pub fn standard_context() -> Context {
    let mut ctx = Context::new();
    install(&mut ctx);
    ctx
}

// ── Conversions ───────────────────────────────────────────────────────────

fn script_to_string(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("to_string", "input")?;
    Ok(Value::string(input.to_text()?))
}

fn script_to_int(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("to_int", "input")?;
    Ok(Value::int(input.to_int()?))
}

fn script_to_number(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("to_number", "input")?;
    Ok(Value::double(input.to_double()?))
}

fn script_to_boolean(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("to_boolean", "input")?;
    Ok(Value::boolean(input.to_bool()?))
}

fn script_to_color(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("to_color", "input")?;
    Ok(Value::color(input.to_color()?))
}

fn script_to_date(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("to_date", "input")?;
    Ok(Value::datetime(input.to_datetime()?))
}

fn script_to_image(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("to_image", "input")?;
    Ok(Value::image(input.to_image()?))
}

fn script_type_name(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("type_name", "input")?;
    Ok(Value::string(input.type_name()))
}

// ── Numbers ───────────────────────────────────────────────────────────────

fn script_abs(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("abs", "input")?;
    match &*input {
        Value::Int(n) => Ok(Value::int(n.saturating_abs())),
        Value::Double(d) => Ok(Value::double(d.abs())),
        other => Err(EvalError::conversion(other.type_name(), "number")),
    }
}

fn script_min(ctx: &mut Context) -> EvalResult<ValueRef> {
    pick(ctx, "min", Ordering::Less)
}

fn script_max(ctx: &mut Context) -> EvalResult<ValueRef> {
    pick(ctx, "max", Ordering::Greater)
}

fn pick(ctx: &mut Context, function: &str, keep: Ordering) -> EvalResult<ValueRef> {
    let a = ctx.arg(function, "a")?;
    let b = ctx.arg(function, "b")?;
    let ord = a
        .to_double()?
        .partial_cmp(&b.to_double()?)
        .unwrap_or(Ordering::Equal);
    Ok(if ord == keep { a } else { b })
}

// ── Colors ────────────────────────────────────────────────────────────────

fn color_channel(ctx: &Context, function: &str, name: &str) -> EvalResult<u8> {
    let value = ctx.arg(function, name)?;
    Ok(value.to_int()?.clamp(0, 255) as u8)
}

fn script_rgb(ctx: &mut Context) -> EvalResult<ValueRef> {
    Ok(Value::color(Color::rgb(
        color_channel(ctx, "rgb", "r")?,
        color_channel(ctx, "rgb", "g")?,
        color_channel(ctx, "rgb", "b")?,
    )))
}

fn script_rgba(ctx: &mut Context) -> EvalResult<ValueRef> {
    Ok(Value::color(Color::rgba(
        color_channel(ctx, "rgba", "r")?,
        color_channel(ctx, "rgba", "g")?,
        color_channel(ctx, "rgba", "b")?,
        color_channel(ctx, "rgba", "a")?,
    )))
}

// ── Collections & strings ─────────────────────────────────────────────────

fn script_length(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("length", "input")?;
    let count = match &*input {
        Value::String(s) => s.chars().count(),
        _ => input.item_count()?,
    };
    Ok(Value::int(count as i64))
}

fn script_contains(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("contains", "input")?;
    let find = ctx.arg("contains", "find")?;
    let found = match &*input {
        Value::String(s) => s.contains(&find.to_text()?),
        Value::Collection(Collection::List(items)) => {
            let mut found = false;
            for item in items {
                if equal(item, &find)? {
                    found = true;
                    break;
                }
            }
            found
        }
        Value::Collection(Collection::Map(entries)) => entries.contains_key(&find.to_text()?),
        other => return Err(EvalError::conversion(other.type_name(), "collection")),
    };
    Ok(Value::boolean(found))
}

fn script_sort(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("sort", "input")?;
    let Value::Collection(Collection::List(items)) = &*input else {
        return Err(EvalError::conversion(input.type_name(), "collection"));
    };
    // Sort by string form, consistent with the comparison model.
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        keyed.push((item.to_text()?, item.clone()));
    }
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(Value::list(keyed.into_iter().map(|(_, v)| v).collect()))
}

fn script_reverse(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("reverse", "input")?;
    match &*input {
        Value::Collection(Collection::List(items)) => {
            Ok(Value::list(items.iter().rev().cloned().collect()))
        }
        Value::String(s) => Ok(Value::string(s.chars().rev().collect::<String>())),
        other => Err(EvalError::conversion(other.type_name(), "collection")),
    }
}

// ── Regular expressions ───────────────────────────────────────────────────

fn script_match(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("match", "input")?;
    let pattern = ctx.arg("match", "match")?;
    let regex = ScriptRegex::from_value(&pattern)?;
    Ok(Value::boolean(regex.regex().is_match(&input.to_text()?)))
}

fn script_replace(ctx: &mut Context) -> EvalResult<ValueRef> {
    let input = ctx.arg("replace", "input")?;
    let pattern = ctx.arg("replace", "match")?;
    let replacement = ctx.arg("replace", "replace")?;
    let regex = ScriptRegex::from_value(&pattern)?;
    let input_text = input.to_text()?;
    let replaced = regex
        .regex()
        .replace_all(&input_text, replacement.to_text()?.as_str());
    Ok(Value::string(replaced.into_owned()))
}

/// Closure simplifier for the regex builtins: compile a string `match:`
/// binding once, so a rule built with `@(…)` does not recompile its
/// pattern on every call.
fn precompile_match_arg(closure: &mut ClosureData) -> EvalResult<Option<ValueRef>> {
    for (name, value) in &mut closure.bindings {
        if name != "match" {
            continue;
        }
        let compiled = match &**value {
            Value::String(pattern) => Some(Value::regex(ScriptRegex::compile(pattern)?)),
            _ => None,
        };
        if let Some(compiled) = compiled {
            *value = compiled;
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_binds_in_bottom_frame() {
        let ctx = standard_context();
        assert!(ctx.lookup("to_string").is_some());
        assert!(ctx.lookup("replace").is_some());
    }

    #[test]
    fn rgb_channels_clamp() {
        let mut ctx = standard_context();
        let scope = ctx.open_scope();
        ctx.set("r", Value::int(300));
        ctx.set("g", Value::int(-5));
        ctx.set("b", Value::int(7));
        let color = script_rgb(&mut ctx).unwrap();
        assert_eq!(color.to_color().unwrap(), Color::rgb(255, 0, 7));
        ctx.close_scope(scope);
    }
}
