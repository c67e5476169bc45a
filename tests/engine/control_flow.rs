//! Loops, switch, labels and try/catch/finally.

use crate::common::*;
use sandjs::ast::{
    AssignmentOp, BinaryOp, BreakStatement, ContinueStatement, DoWhileStatement, ForInStatement,
    ForInit, ForOfStatement, ForStatement, ForTarget, Identifier, LabeledStatement, Span,
    Statement, SwitchCase, SwitchStatement, UpdateOp, VariableDeclaration, VariableDeclarator,
    VariableKind,
};
use sandjs::JsValue;

fn for_loop(
    init: Option<ForInit>,
    test: Option<sandjs::ast::Expression>,
    update_expr: Option<sandjs::ast::Expression>,
    body: Statement,
) -> Statement {
    Statement::ForStatement(ForStatement {
        init,
        test,
        update: update_expr,
        body: Box::new(body),
        span: Span::default(),
    })
}

fn let_init(name: &str, init: sandjs::ast::Expression) -> ForInit {
    ForInit::Declaration(VariableDeclaration {
        kind: VariableKind::Let,
        declarations: vec![VariableDeclarator {
            id: pat(name),
            init: Some(init),
            span: Span::default(),
        }],
        span: Span::default(),
    })
}

fn break_(label: Option<&str>) -> Statement {
    Statement::BreakStatement(BreakStatement {
        label: label.map(|l| Identifier {
            name: l.to_string(),
            span: Span::default(),
        }),
        span: Span::default(),
    })
}

fn continue_(label: Option<&str>) -> Statement {
    Statement::ContinueStatement(ContinueStatement {
        label: label.map(|l| Identifier {
            name: l.to_string(),
            span: Span::default(),
        }),
        span: Span::default(),
    })
}

fn labeled(label: &str, body: Statement) -> Statement {
    Statement::LabeledStatement(LabeledStatement {
        label: Identifier {
            name: label.to_string(),
            span: Span::default(),
        },
        body: Box::new(body),
        span: Span::default(),
    })
}

#[test]
fn while_loop_accumulates() {
    assert_eq!(
        eval_ok(vec![
            let_("sum", num(0.0)),
            let_("i", num(0.0)),
            while_(
                bin(BinaryOp::Lt, ident("i"), num(5.0)),
                block(vec![
                    expr(assign_op(AssignmentOp::AddAssign, "sum", ident("i"))),
                    expr(update(UpdateOp::Increment, true, ident("i"))),
                ]),
            ),
            expr(ident("sum")),
        ]),
        JsValue::Number(10.0)
    );
}

#[test]
fn do_while_runs_at_least_once() {
    assert_eq!(
        eval_ok(vec![
            let_("n", num(0.0)),
            Statement::DoWhileStatement(DoWhileStatement {
                body: Box::new(expr(update(UpdateOp::Increment, true, ident("n")))),
                test: bool_(false),
                span: Span::default(),
            }),
            expr(ident("n")),
        ]),
        JsValue::Number(1.0)
    );
}

#[test]
fn classic_for_loop() {
    assert_eq!(
        eval_ok(vec![
            let_("sum", num(0.0)),
            for_loop(
                Some(let_init("i", num(1.0))),
                Some(bin(BinaryOp::LtEq, ident("i"), num(4.0))),
                Some(update(UpdateOp::Increment, true, ident("i"))),
                expr(assign_op(AssignmentOp::AddAssign, "sum", ident("i"))),
            ),
            expr(ident("sum")),
        ]),
        JsValue::Number(10.0)
    );
}

#[test]
fn break_and_continue() {
    assert_eq!(
        eval_ok(vec![
            let_("sum", num(0.0)),
            for_loop(
                Some(let_init("i", num(0.0))),
                Some(bin(BinaryOp::Lt, ident("i"), num(10.0))),
                Some(update(UpdateOp::Increment, true, ident("i"))),
                block(vec![
                    // Skip 3, stop at 6.
                    if_(
                        bin(BinaryOp::StrictEq, ident("i"), num(3.0)),
                        continue_(None),
                        None,
                    ),
                    if_(
                        bin(BinaryOp::StrictEq, ident("i"), num(6.0)),
                        break_(None),
                        None,
                    ),
                    expr(assign_op(AssignmentOp::AddAssign, "sum", ident("i"))),
                ]),
            ),
            expr(ident("sum")),
        ]),
        JsValue::Number(12.0) // 0+1+2+4+5
    );
}

#[test]
fn labeled_break_exits_outer_loop() {
    assert_eq!(
        eval_ok(vec![
            let_("count", num(0.0)),
            labeled(
                "outer",
                for_loop(
                    Some(let_init("i", num(0.0))),
                    Some(bin(BinaryOp::Lt, ident("i"), num(3.0))),
                    Some(update(UpdateOp::Increment, true, ident("i"))),
                    for_loop(
                        Some(let_init("j", num(0.0))),
                        Some(bin(BinaryOp::Lt, ident("j"), num(3.0))),
                        Some(update(UpdateOp::Increment, true, ident("j"))),
                        block(vec![
                            if_(
                                bin(BinaryOp::StrictEq, ident("count"), num(4.0)),
                                break_(Some("outer")),
                                None,
                            ),
                            expr(update(UpdateOp::Increment, true, ident("count"))),
                        ]),
                    ),
                ),
            ),
            expr(ident("count")),
        ]),
        JsValue::Number(4.0)
    );
}

#[test]
fn for_of_iterates_array() {
    assert_eq!(
        eval_ok(vec![
            let_("sum", num(0.0)),
            Statement::ForOfStatement(ForOfStatement {
                left: ForTarget::VariableDeclaration(VariableDeclaration {
                    kind: VariableKind::Const,
                    declarations: vec![VariableDeclarator {
                        id: pat("x"),
                        init: None,
                        span: Span::default(),
                    }],
                    span: Span::default(),
                }),
                right: array(vec![num(1.0), num(2.0), num(3.0)]),
                body: Box::new(expr(assign_op(AssignmentOp::AddAssign, "sum", ident("x")))),
                span: Span::default(),
            }),
            expr(ident("sum")),
        ]),
        JsValue::Number(6.0)
    );
}

#[test]
fn for_in_visits_enumerable_string_keys() {
    assert_eq!(
        eval_ok(vec![
            let_("keys", str_("")),
            Statement::ForInStatement(ForInStatement {
                left: ForTarget::VariableDeclaration(VariableDeclaration {
                    kind: VariableKind::Const,
                    declarations: vec![VariableDeclarator {
                        id: pat("k"),
                        init: None,
                        span: Span::default(),
                    }],
                    span: Span::default(),
                }),
                right: object(vec![prop("a", num(1.0)), prop("b", num(2.0))]),
                body: Box::new(expr(assign_op(AssignmentOp::AddAssign, "keys", ident("k")))),
                span: Span::default(),
            }),
            expr(ident("keys")),
        ]),
        JsValue::from("ab")
    );
}

#[test]
fn switch_falls_through_without_break() {
    let switch_on = |v: f64| {
        vec![
            let_("log", str_("")),
            Statement::SwitchStatement(SwitchStatement {
                discriminant: num(v),
                cases: vec![
                    SwitchCase {
                        test: Some(num(1.0)),
                        consequent: vec![expr(assign_op(
                            AssignmentOp::AddAssign,
                            "log",
                            str_("one"),
                        ))],
                    },
                    SwitchCase {
                        test: Some(num(2.0)),
                        consequent: vec![
                            expr(assign_op(AssignmentOp::AddAssign, "log", str_("two"))),
                            break_(None),
                        ],
                    },
                    SwitchCase {
                        test: None,
                        consequent: vec![expr(assign_op(
                            AssignmentOp::AddAssign,
                            "log",
                            str_("default"),
                        ))],
                    },
                ],
                span: Span::default(),
            }),
            expr(ident("log")),
        ]
    };
    // Matching 1 falls through into 2, then breaks before default.
    assert_eq!(eval_ok(switch_on(1.0)), JsValue::from("onetwo"));
    assert_eq!(eval_ok(switch_on(2.0)), JsValue::from("two"));
    assert_eq!(eval_ok(switch_on(9.0)), JsValue::from("default"));
}

#[test]
fn try_catch_binds_thrown_value() {
    assert_eq!(
        eval_ok(vec![
            let_("result", num(0.0)),
            try_(
                vec![throw_(num(42.0))],
                Some((Some(pat("e")), vec![expr(assign("result", ident("e")))])),
                None,
            ),
            expr(ident("result")),
        ]),
        JsValue::Number(42.0)
    );
}

#[test]
fn finally_runs_on_both_paths() {
    // Normal path.
    assert_eq!(
        eval_ok(vec![
            let_("log", str_("")),
            try_(
                vec![expr(assign_op(AssignmentOp::AddAssign, "log", str_("t")))],
                None,
                Some(vec![expr(assign_op(
                    AssignmentOp::AddAssign,
                    "log",
                    str_("f"),
                ))]),
            ),
            expr(ident("log")),
        ]),
        JsValue::from("tf")
    );
    // Throw path: finally runs, then the catch in the outer try sees it.
    assert_eq!(
        eval_ok(vec![
            let_("log", str_("")),
            try_(
                vec![try_(
                    vec![throw_(str_("boom"))],
                    None,
                    Some(vec![expr(assign_op(
                        AssignmentOp::AddAssign,
                        "log",
                        str_("f"),
                    ))]),
                )],
                Some((
                    None,
                    vec![expr(assign_op(AssignmentOp::AddAssign, "log", str_("c")))],
                )),
                None,
            ),
            expr(ident("log")),
        ]),
        JsValue::from("fc")
    );
}

#[test]
fn finally_abrupt_completion_overrides_try() {
    // A throw from finally replaces the original completion.
    let err = eval(vec![
        try_(
            vec![throw_(str_("original"))],
            None,
            Some(vec![throw_(str_("override"))]),
        ),
    ])
    .unwrap_err();
    let sandjs::EngineError::Thrown { value } = err else {
        panic!("expected thrown value");
    };
    assert_eq!(value, JsValue::from("override"));
}

#[test]
fn rethrow_from_catch_propagates() {
    let err = eval(vec![try_(
        vec![throw_(num(1.0))],
        Some((Some(pat("e")), vec![throw_(ident("e"))])),
        None,
    )])
    .unwrap_err();
    let sandjs::EngineError::Thrown { value } = err else {
        panic!("expected thrown value");
    };
    assert_eq!(value, JsValue::Number(1.0));
}
