//! Integration tests for the dependency-tracking walk.
//!
//! The walk must be conservative: every object member a real evaluation
//! *could* read has to register the dependency descriptor, including
//! members behind untaken `if` branches, call arguments, loop bodies and
//! closure defaults. Over-reporting is allowed; silence is not.

use std::collections::BTreeMap;

use quill_eval::{stdlib, Context, Dependency, Kind, ObjectValue, Value, ValueRef};
use quill_parser::parse_source;
use quill_types::ast::Expr;
use quill_types::SourceFile;

fn parse(source: &str) -> Expr {
    let sf = SourceFile::new("<test>", source);
    let result = parse_source(&sf);
    assert!(
        !result.errors.has_errors(),
        "parse errors: {:?}",
        result.errors.errors
    );
    result.expr.expect("no expression after successful parse")
}

/// A context holding one `card` object with a few members, plus the
/// object itself for inspecting registrations.
fn card_context() -> (Context, ValueRef) {
    let mut members = BTreeMap::new();
    members.insert("name".to_string(), Value::string("Goblin"));
    members.insert("cost".to_string(), Value::int(2));
    members.insert("power".to_string(), Value::int(1));
    let card = Value::object(ObjectValue::new("card", members));
    let mut ctx = stdlib::standard_context();
    ctx.set_global("card", card.clone());
    (ctx, card)
}

fn object(value: &ValueRef) -> &ObjectValue {
    match &**value {
        Value::Object(o) => o,
        other => panic!("expected an object, got {}", other.type_name()),
    }
}

fn walk(source: &str) -> (ValueRef, ValueRef) {
    let (mut ctx, card) = card_context();
    let dep = Dependency::new("style", "frame");
    let result = ctx.dependencies(&parse(source), &dep).unwrap();
    (result, card)
}

fn registered_for(card: &ValueRef, member: &str) -> bool {
    object(card)
        .dependents_of(member)
        .contains(&Dependency::new("style", "frame"))
}

// ══════════════════════════════════════════════════════════════════════════
// Member access
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn member_access_registers() {
    let (_, card) = walk("card.name");
    assert!(registered_for(&card, "name"));
    assert!(!registered_for(&card, "cost"));
}

#[test]
fn untouched_members_do_not_register() {
    let (_, card) = walk("card.name");
    let records = object(&card).records();
    assert!(records.iter().all(|r| r.member.as_deref() == Some("name")));
}

#[test]
fn walk_result_is_abstract() {
    let (result, _) = walk("card.cost + 1");
    assert_eq!(result.kind(), Kind::Dummy);
}

#[test]
fn missing_member_still_walks() {
    // The member does not exist; the walk continues on the dummy.
    let (result, card) = walk("card.rarity.deeper");
    assert_eq!(result.kind(), Kind::Dummy);
    assert!(registered_for(&card, "rarity"));
}

// ══════════════════════════════════════════════════════════════════════════
// Conservatism across control flow
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn both_if_branches_register() {
    let (_, card) = walk("if card.name == \"x\" then card.cost else card.power");
    assert!(registered_for(&card, "name"));
    assert!(registered_for(&card, "cost"));
    assert!(registered_for(&card, "power"));
}

#[test]
fn call_arguments_register() {
    let (_, card) = walk("to_string(card.cost)");
    assert!(registered_for(&card, "cost"));
}

#[test]
fn loop_bodies_register() {
    let (_, card) = walk("for x in [1, 2, 3] do card.power + x");
    assert!(registered_for(&card, "power"));
}

#[test]
fn bindings_carry_through() {
    let (_, card) = walk("c := card; c.cost");
    assert!(registered_for(&card, "cost"));
}

#[test]
fn closure_defaults_register() {
    // The bound default value flows out of a member read before the
    // closure is built, so the member registers.
    let (_, card) = walk("replace@(match: card.name, replace: \"\")");
    assert!(registered_for(&card, "name"));
}

// ══════════════════════════════════════════════════════════════════════════
// The protocol on values
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn dependency_this_registers_whole_object() {
    let (_, card) = card_context();
    let dep = Dependency::new("style", "frame");
    card.dependency_this(&dep);
    // A whole-object dependent is affected by a change to any member.
    assert!(object(&card).dependents_of("name").contains(&dep));
    assert!(object(&card).dependents_of("cost").contains(&dep));
}

#[test]
fn nested_objects_register_when_reached() {
    let mut inner_members = BTreeMap::new();
    inner_members.insert("color".to_string(), Value::string("red"));
    let inner = Value::object(ObjectValue::new("frame", inner_members));

    let mut members = BTreeMap::new();
    members.insert("frame".to_string(), inner.clone());
    let card = Value::object(ObjectValue::new("card", members));

    let mut ctx = stdlib::standard_context();
    ctx.set_global("card", card.clone());
    let dep = Dependency::new("style", "border");
    ctx.dependencies(&parse("card.frame.color"), &dep).unwrap();

    // The outer object records the member-level access; the inner object,
    // reached through its container, records the dependent as a whole;
    // and its own member access registers too.
    assert!(object(&card).dependents_of("frame").contains(&dep));
    assert!(object(&inner).dependents_of("color").contains(&dep));
}

#[test]
fn walks_do_not_evaluate() {
    // `1 / 0` would fail under real evaluation; the dependency walk
    // never performs the division.
    let (mut ctx, card) = card_context();
    let dep = Dependency::new("style", "frame");
    let result = ctx
        .dependencies(&parse("if card.cost > 1 then 1 / 0 else 2"), &dep)
        .unwrap();
    assert_eq!(result.kind(), Kind::Dummy);
    assert!(registered_for(&card, "cost"));
}

#[test]
fn descriptors_propagate_unchanged() {
    let (mut ctx, card) = card_context();
    let dep = Dependency::new("set", "symbol");
    ctx.dependencies(&parse("card.name"), &dep).unwrap();
    let records = object(&card).records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].dependency.entity(), "set");
    assert_eq!(records[0].dependency.member(), "symbol");
}
