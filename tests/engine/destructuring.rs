//! Destructuring bindings: ordering, defaults, TDZ interaction, rest.

use crate::common::*;
use sandjs::ast::VariableKind;
use sandjs::JsValue;

#[test]
fn object_pattern_binds_named_properties() {
    assert_eq!(
        eval_ok(vec![
            decl(
                VariableKind::Let,
                pat_object(vec![pat_prop("a", pat("a")), pat_prop("b", pat("b"))]),
                Some(object(vec![prop("a", num(1.0)), prop("b", num(2.0))])),
            ),
            expr(bin(sandjs::ast::BinaryOp::Add, ident("a"), ident("b"))),
        ]),
        JsValue::Number(3.0)
    );
}

#[test]
fn object_pattern_renames() {
    assert_eq!(
        eval_ok(vec![
            decl(
                VariableKind::Let,
                pat_object(vec![pat_prop("a", pat("renamed"))]),
                Some(object(vec![prop("a", num(5.0))])),
            ),
            expr(ident("renamed")),
        ]),
        JsValue::Number(5.0)
    );
}

#[test]
fn array_pattern_with_elision_and_rest() {
    assert_eq!(
        eval_ok(vec![
            decl(
                VariableKind::Let,
                pat_array(vec![
                    Some(pat("first")),
                    None,
                    Some(pat_rest(pat("rest"))),
                ]),
                Some(array(vec![num(1.0), num(2.0), num(3.0), num(4.0)])),
            ),
            expr(method_call(
                array(vec![
                    ident("first"),
                    member(ident("rest"), "length"),
                    index(ident("rest"), num(0.0)),
                ]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("1,2,3")
    );
}

#[test]
fn defaults_apply_only_on_undefined() {
    assert_eq!(
        eval_ok(vec![
            decl(
                VariableKind::Let,
                pat_object(vec![
                    pat_prop("a", pat_default(pat("a"), num(9.0))),
                    pat_prop("b", pat_default(pat("b"), num(9.0))),
                ]),
                Some(object(vec![prop("a", null())])),
            ),
            expr(method_call(
                array(vec![ident("a"), ident("b")]),
                "join",
                vec![str_(",")],
            )),
        ]),
        // join renders the null as empty.
        JsValue::from(",9")
    );
}

#[test]
fn bindings_initialize_left_to_right() {
    // `let {a = b, b = 1} = {}`: a's default reads b before b has been
    // initialized, which is a TDZ violation.
    let err = eval(vec![decl(
        VariableKind::Let,
        pat_object(vec![
            pat_prop("a", pat_default(pat("a"), ident("b"))),
            pat_prop("b", pat_default(pat("b"), num(1.0))),
        ]),
        Some(object(vec![])),
    )])
    .unwrap_err();
    assert_eq!(thrown_name(&err), "ReferenceError");
}

#[test]
fn earlier_bindings_are_visible_to_later_defaults() {
    // The mirror image: `let {a = 1, b = a} = {}` is fine.
    assert_eq!(
        eval_ok(vec![
            decl(
                VariableKind::Let,
                pat_object(vec![
                    pat_prop("a", pat_default(pat("a"), num(1.0))),
                    pat_prop("b", pat_default(pat("b"), ident("a"))),
                ]),
                Some(object(vec![])),
            ),
            expr(bin(sandjs::ast::BinaryOp::Add, ident("a"), ident("b"))),
        ]),
        JsValue::Number(2.0)
    );
}

#[test]
fn object_rest_collects_unclaimed_properties() {
    assert_eq!(
        eval_ok(vec![
            decl(
                VariableKind::Let,
                pat_object(vec![pat_prop("a", pat("a")), pat_obj_rest("rest")]),
                Some(object(vec![
                    prop("a", num(1.0)),
                    prop("b", num(2.0)),
                    prop("c", num(3.0)),
                ])),
            ),
            expr(method_call(
                call(member(ident("Object"), "keys"), vec![ident("rest")]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("b,c")
    );
}

#[test]
fn nested_patterns() {
    assert_eq!(
        eval_ok(vec![
            decl(
                VariableKind::Let,
                pat_object(vec![pat_prop(
                    "inner",
                    pat_array(vec![Some(pat("x")), Some(pat("y"))]),
                )]),
                Some(object(vec![prop(
                    "inner",
                    array(vec![num(10.0), num(20.0)]),
                )])),
            ),
            expr(bin(sandjs::ast::BinaryOp::Add, ident("x"), ident("y"))),
        ]),
        JsValue::Number(30.0)
    );
}

#[test]
fn destructuring_nullish_source_throws() {
    let err = eval(vec![decl(
        VariableKind::Let,
        pat_object(vec![pat_prop("a", pat("a"))]),
        Some(null()),
    )])
    .unwrap_err();
    assert_eq!(thrown_name(&err), "TypeError");
}

#[test]
fn string_destructures_by_code_point() {
    assert_eq!(
        eval_ok(vec![
            decl(
                VariableKind::Let,
                pat_array(vec![Some(pat("a")), Some(pat("b"))]),
                Some(str_("hi")),
            ),
            expr(bin(sandjs::ast::BinaryOp::Add, ident("a"), ident("b"))),
        ]),
        JsValue::from("hi")
    );
}
