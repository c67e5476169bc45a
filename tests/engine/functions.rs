//! Function semantics: declarations, closures, arrows, parameters.

use crate::common::*;
use sandjs::ast::{AssignmentOp, BinaryOp, UpdateOp};
use sandjs::JsValue;

#[test]
fn function_declaration_and_call() {
    assert_eq!(
        eval_ok(vec![
            func_decl(
                "add",
                vec![pat("a"), pat("b")],
                vec![ret(Some(bin(BinaryOp::Add, ident("a"), ident("b"))))],
            ),
            expr(call(ident("add"), vec![num(2.0), num(3.0)])),
        ]),
        JsValue::Number(5.0)
    );
}

#[test]
fn function_declarations_are_hoisted() {
    // Callable before its declaration in source order.
    assert_eq!(
        eval_ok(vec![
            var_("r", call(ident("f"), vec![])),
            func_decl("f", vec![], vec![ret(Some(num(7.0)))]),
            expr(ident("r")),
        ]),
        JsValue::Number(7.0)
    );
}

#[test]
fn missing_arguments_are_undefined() {
    assert_eq!(
        eval_ok(vec![
            func_decl("f", vec![pat("a"), pat("b")], vec![ret(Some(ident("b")))]),
            expr(call(ident("f"), vec![num(1.0)])),
        ]),
        JsValue::Undefined
    );
}

#[test]
fn default_parameters_apply_on_undefined_only() {
    let program = |arg_expr| {
        vec![
            func_decl(
                "f",
                vec![pat_default(pat("x"), num(9.0))],
                vec![ret(Some(ident("x")))],
            ),
            expr(call(ident("f"), vec![arg_expr])),
        ]
    };
    assert_eq!(eval_ok(program(num(1.0))), JsValue::Number(1.0));
    assert_eq!(eval_ok(program(ident("undefined"))), JsValue::Number(9.0));
    // null is not undefined; the default does not apply.
    assert_eq!(eval_ok(program(null())), JsValue::Null);
}

#[test]
fn rest_parameter_collects_remaining() {
    assert_eq!(
        eval_ok(vec![
            func_decl(
                "f",
                vec![pat("first"), pat_rest(pat("rest"))],
                vec![ret(Some(member(ident("rest"), "length")))],
            ),
            expr(call(ident("f"), vec![num(1.0), num(2.0), num(3.0)])),
        ]),
        JsValue::Number(2.0)
    );
}

#[test]
fn closures_capture_environment() {
    assert_eq!(
        eval_ok(vec![
            func_decl(
                "counter",
                vec![],
                vec![
                    let_("n", num(0.0)),
                    ret(Some(arrow_block(
                        vec![],
                        vec![ret(Some(update(UpdateOp::Increment, true, ident("n"))))],
                    ))),
                ],
            ),
            let_("tick", call(ident("counter"), vec![])),
            expr(call(ident("tick"), vec![])),
            expr(call(ident("tick"), vec![])),
            expr(call(ident("tick"), vec![])),
        ]),
        JsValue::Number(3.0)
    );
}

#[test]
fn recursion() {
    assert_eq!(
        eval_ok(vec![
            func_decl(
                "fact",
                vec![pat("n")],
                vec![
                    if_(
                        bin(BinaryOp::LtEq, ident("n"), num(1.0)),
                        ret(Some(num(1.0))),
                        None,
                    ),
                    ret(Some(bin(
                        BinaryOp::Mul,
                        ident("n"),
                        call(
                            ident("fact"),
                            vec![bin(BinaryOp::Sub, ident("n"), num(1.0))],
                        ),
                    ))),
                ],
            ),
            expr(call(ident("fact"), vec![num(6.0)])),
        ]),
        JsValue::Number(720.0)
    );
}

#[test]
fn method_call_binds_this() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "obj",
                object(vec![
                    prop("x", num(42.0)),
                    prop(
                        "getX",
                        func_expr(vec![], vec![ret(Some(member(this_(), "x")))]),
                    ),
                ]),
            ),
            expr(method_call(ident("obj"), "getX", vec![])),
        ]),
        JsValue::Number(42.0)
    );
}

#[test]
fn arrow_captures_lexical_this() {
    // The arrow returned from the method sees the method's `this`.
    assert_eq!(
        eval_ok(vec![
            let_(
                "obj",
                object(vec![
                    prop("x", num(7.0)),
                    prop(
                        "make",
                        func_expr(
                            vec![],
                            vec![ret(Some(arrow(vec![], member(this_(), "x"))))],
                        ),
                    ),
                ]),
            ),
            let_("f", method_call(ident("obj"), "make", vec![])),
            expr(call(ident("f"), vec![])),
        ]),
        JsValue::Number(7.0)
    );
}

#[test]
fn calling_a_non_function_throws() {
    let err = eval(vec![let_("x", num(1.0)), expr(call(ident("x"), vec![]))]).unwrap_err();
    assert_eq!(thrown_name(&err), "TypeError");
}

#[test]
fn spread_arguments_expand_in_place() {
    assert_eq!(
        eval_ok(vec![
            func_decl(
                "f",
                vec![pat("a"), pat("b"), pat("c")],
                vec![ret(Some(bin(
                    BinaryOp::Add,
                    bin(BinaryOp::Add, ident("a"), ident("b")),
                    ident("c"),
                )))],
            ),
            let_("args", array(vec![num(2.0), num(3.0)])),
            expr(call(
                ident("f"),
                vec![num(1.0), spread(ident("args"))],
            )),
        ]),
        JsValue::Number(6.0)
    );
}

#[test]
fn var_declarations_are_function_scoped() {
    assert_eq!(
        eval_ok(vec![
            func_decl(
                "f",
                vec![],
                vec![
                    block(vec![var_("x", num(1.0))]),
                    ret(Some(ident("x"))),
                ],
            ),
            expr(call(ident("f"), vec![])),
        ]),
        JsValue::Number(1.0)
    );
}

#[test]
fn let_declarations_are_block_scoped() {
    assert_eq!(
        eval_ok(vec![
            let_("x", num(1.0)),
            block(vec![
                let_("x", num(2.0)),
                expr(assign_op(AssignmentOp::AddAssign, "x", num(10.0))),
            ]),
            expr(ident("x")),
        ]),
        JsValue::Number(1.0)
    );
}
