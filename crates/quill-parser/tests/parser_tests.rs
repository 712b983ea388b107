//! Integration tests for the Quill expression parser.

use quill_parser::parse_source;
use quill_types::ast::{BinOp, Expr, ExprKind, UnaryOp};
use quill_types::{ErrorCode, ParseErrors, SourceFile};

// ══════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════

fn parse_ok(source: &str) -> Expr {
    let sf = SourceFile::new("<test>", source);
    let result = parse_source(&sf);
    assert!(
        !result.errors.has_errors(),
        "unexpected errors for `{source}`: {:?}",
        result.errors.errors
    );
    result.expr.expect("no expression after successful parse")
}

fn parse_err(source: &str) -> ParseErrors {
    let sf = SourceFile::new("<test>", source);
    let result = parse_source(&sf);
    assert!(
        result.errors.has_errors(),
        "expected errors for `{source}`"
    );
    result.errors
}

fn first_code(errors: &ParseErrors) -> ErrorCode {
    errors.errors[0].code
}

// ══════════════════════════════════════════════════════════════════════════
// Literals & primaries
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn literals() {
    assert!(matches!(parse_ok("42").kind, ExprKind::IntLit(42)));
    assert!(matches!(parse_ok("3.5").kind, ExprKind::DoubleLit(_)));
    assert!(matches!(parse_ok("true").kind, ExprKind::BoolLit(true)));
    assert!(matches!(parse_ok("nil").kind, ExprKind::NilLit));
    match parse_ok("\"a\\nb\"").kind {
        ExprKind::StringLit(s) => assert_eq!(s, "a\nb"),
        other => panic!("expected string, got {other:?}"),
    }
}

#[test]
fn list_literals() {
    match parse_ok("[1, 2, 3]").kind {
        ExprKind::ListLit(entries) => {
            assert_eq!(entries.len(), 3);
            assert!(entries.iter().all(|e| e.key.is_none()));
        }
        other => panic!("expected list, got {other:?}"),
    }
    match parse_ok("[x: 1, y: 2,]").kind {
        ExprKind::ListLit(entries) => {
            assert_eq!(entries.len(), 2);
            assert_eq!(entries[0].key.as_ref().unwrap().name, "x");
        }
        other => panic!("expected list, got {other:?}"),
    }
    assert!(matches!(parse_ok("[]").kind, ExprKind::ListLit(e) if e.is_empty()));
}

// ══════════════════════════════════════════════════════════════════════════
// Operator precedence & associativity
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn multiplication_binds_tighter_than_addition() {
    match parse_ok("1 + 2 * 3").kind {
        ExprKind::Binary { op: BinOp::Add, right, .. } => {
            assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
        }
        other => panic!("expected addition at the top, got {other:?}"),
    }
}

#[test]
fn parens_override_precedence() {
    match parse_ok("(1 + 2) * 3").kind {
        ExprKind::Binary { op: BinOp::Mul, left, .. } => {
            assert!(matches!(left.kind, ExprKind::Binary { op: BinOp::Add, .. }));
        }
        other => panic!("expected multiplication at the top, got {other:?}"),
    }
}

#[test]
fn comparison_binds_looser_than_arithmetic() {
    match parse_ok("1 + 1 == 2").kind {
        ExprKind::Binary { op: BinOp::Eq, .. } => {}
        other => panic!("expected equality at the top, got {other:?}"),
    }
}

#[test]
fn logical_operators_nest_or_over_and() {
    match parse_ok("a and b or c").kind {
        ExprKind::Binary { op: BinOp::Or, left, .. } => {
            assert!(matches!(left.kind, ExprKind::Binary { op: BinOp::And, .. }));
        }
        other => panic!("expected `or` at the top, got {other:?}"),
    }
}

#[test]
fn unary_operators() {
    assert!(matches!(
        parse_ok("-x").kind,
        ExprKind::Unary { op: UnaryOp::Neg, .. }
    ));
    assert!(matches!(
        parse_ok("not a and b").kind,
        // `not` binds to `a` only
        ExprKind::Binary { op: BinOp::And, .. }
    ));
}

#[test]
fn comparisons_do_not_chain() {
    let errors = parse_err("1 < 2 < 3");
    assert_eq!(first_code(&errors), ErrorCode::UNEXPECTED_TOKEN);
}

// ══════════════════════════════════════════════════════════════════════════
// Postfix forms
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn call_with_named_and_positional_args() {
    match parse_ok("replace(\"abc\", match: \"b\", replace: x)").kind {
        ExprKind::Call { args, .. } => {
            assert_eq!(args.len(), 3);
            assert!(args[0].name.is_none());
            assert_eq!(args[1].name.as_ref().unwrap().name, "match");
        }
        other => panic!("expected call, got {other:?}"),
    }
}

#[test]
fn closure_bind_is_distinct_from_call() {
    assert!(matches!(parse_ok("f@(x: 1)").kind, ExprKind::Bind { .. }));
    assert!(matches!(parse_ok("f(x: 1)").kind, ExprKind::Call { .. }));
}

#[test]
fn postfix_chains() {
    match parse_ok("card.colors[0].name").kind {
        ExprKind::Member { object, member } => {
            assert_eq!(member.name, "name");
            assert!(matches!(object.kind, ExprKind::Index { .. }));
        }
        other => panic!("expected member access at the top, got {other:?}"),
    }
}

#[test]
fn calls_chain_onto_results() {
    assert!(matches!(
        parse_ok("f(1)(2)").kind,
        ExprKind::Call { callee, .. } if matches!(callee.kind, ExprKind::Call { .. })
    ));
}

// ══════════════════════════════════════════════════════════════════════════
// Control flow, binding, sequencing
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn if_then_else() {
    match parse_ok("if a then 1 else 2").kind {
        ExprKind::If { else_branch, .. } => assert!(else_branch.is_some()),
        other => panic!("expected if, got {other:?}"),
    }
    match parse_ok("if a then 1").kind {
        ExprKind::If { else_branch, .. } => assert!(else_branch.is_none()),
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn else_binds_to_the_nearest_if() {
    match parse_ok("if a then if b then 1 else 2").kind {
        ExprKind::If { else_branch, then_branch, .. } => {
            assert!(else_branch.is_none());
            assert!(matches!(
                then_branch.kind,
                ExprKind::If { ref else_branch, .. } if else_branch.is_some()
            ));
        }
        other => panic!("expected if, got {other:?}"),
    }
}

#[test]
fn for_loops() {
    match parse_ok("for x in xs do x").kind {
        ExprKind::For { key, item, .. } => {
            assert!(key.is_none());
            assert_eq!(item.name, "x");
        }
        other => panic!("expected for, got {other:?}"),
    }
    match parse_ok("for k: v in m do k").kind {
        ExprKind::For { key, item, .. } => {
            assert_eq!(key.unwrap().name, "k");
            assert_eq!(item.name, "v");
        }
        other => panic!("expected for, got {other:?}"),
    }
}

#[test]
fn assignment_and_sequences() {
    assert!(matches!(parse_ok("x := 1").kind, ExprKind::Assign { .. }));
    match parse_ok("x := 1; y := 2; x + y").kind {
        ExprKind::Seq(exprs) => assert_eq!(exprs.len(), 3),
        other => panic!("expected sequence, got {other:?}"),
    }
    // Trailing semicolon is allowed.
    assert!(matches!(parse_ok("1; 2;").kind, ExprKind::Seq(_)));
}

#[test]
fn newlines_are_whitespace() {
    let expr = parse_ok("1 +\n2");
    assert!(matches!(expr.kind, ExprKind::Binary { op: BinOp::Add, .. }));
}

// ══════════════════════════════════════════════════════════════════════════
// Errors & recovery
// ══════════════════════════════════════════════════════════════════════════

#[test]
fn dangling_operator_reports() {
    let errors = parse_err("1 +");
    assert_eq!(first_code(&errors), ErrorCode::UNEXPECTED_TOKEN);
}

#[test]
fn unclosed_paren_reports_missing_token() {
    let errors = parse_err("(1 + 2");
    assert_eq!(first_code(&errors), ErrorCode::MISSING_TOKEN);
}

#[test]
fn trailing_junk_reports() {
    let errors = parse_err("1 2");
    assert_eq!(first_code(&errors), ErrorCode::UNEXPECTED_TOKEN);
}

#[test]
fn nesting_depth_is_capped() {
    let source = format!("{}1{}", "(".repeat(80), ")".repeat(80));
    let errors = parse_err(&source);
    assert!(errors
        .errors
        .iter()
        .any(|e| e.code == ErrorCode::EXPRESSION_TOO_DEEP));
}

#[test]
fn lexer_errors_surface_through_parse_source() {
    let errors = parse_err("\"unterminated");
    assert_eq!(first_code(&errors), ErrorCode::UNTERMINATED_STRING);
}

#[test]
fn errors_carry_the_source_line() {
    let errors = parse_err("x :=");
    assert_eq!(errors.errors[0].source_line, "x :=");
    assert_eq!(errors.errors[0].file, "<test>");
}
