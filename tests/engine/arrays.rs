//! Array semantics, including hole behavior.

use crate::common::*;
use sandjs::ast::{BinaryOp, UnaryOp};
use sandjs::JsValue;

#[test]
fn literal_length_and_index() {
    assert_eq!(
        eval_ok(vec![
            let_("a", array(vec![num(1.0), num(2.0), num(3.0)])),
            expr(member(ident("a"), "length")),
        ]),
        JsValue::Number(3.0)
    );
    assert_eq!(
        eval_ok(vec![
            let_("a", array(vec![num(1.0), num(2.0)])),
            expr(index(ident("a"), num(1.0))),
        ]),
        JsValue::Number(2.0)
    );
}

#[test]
fn out_of_range_write_extends_length() {
    assert_eq!(
        eval_ok(vec![
            let_("a", array(vec![num(1.0)])),
            expr(assign_member(
                index_expr(ident("a"), num(5.0)),
                num(9.0),
            )),
            expr(member(ident("a"), "length")),
        ]),
        JsValue::Number(6.0)
    );
}

#[test]
fn shrinking_length_drops_elements() {
    assert_eq!(
        eval_ok(vec![
            let_("a", array(vec![num(1.0), num(2.0), num(3.0)])),
            expr(assign_member(
                member_expr(ident("a"), "length"),
                num(1.0),
            )),
            expr(index(ident("a"), num(1.0))),
        ]),
        JsValue::Undefined
    );
}

#[test]
fn delete_leaves_a_hole_and_concat_preserves_it() {
    // delete removes the own key but leaves length alone; concat copies
    // the hole through.
    let realm_program = vec![
        const_("a", array(vec![num(1.0), num(2.0), num(3.0)])),
        expr(unary(UnaryOp::Delete, index(ident("a"), num(1.0)))),
        const_(
            "b",
            method_call(
                ident("a"),
                "concat",
                vec![array(vec![num(4.0), num(5.0)])],
            ),
        ),
        expr(method_call(
            array(vec![
                member(ident("a"), "length"),
                method_call(ident("a"), "hasOwnProperty", vec![str_("1")]),
                member(ident("b"), "length"),
                index(ident("b"), num(0.0)),
                index(ident("b"), num(1.0)),
                index(ident("b"), num(2.0)),
                index(ident("b"), num(3.0)),
                index(ident("b"), num(4.0)),
                method_call(ident("b"), "hasOwnProperty", vec![str_("1")]),
            ]),
            "join",
            vec![str_(",")],
        )),
    ];
    assert_eq!(
        eval_ok(realm_program),
        JsValue::from("3,false,5,1,,3,4,5,false")
    );
}

#[test]
fn index_of_skips_holes_but_includes_matches_undefined() {
    assert_eq!(
        eval_ok(vec![
            let_("a", array(vec![num(1.0), num(2.0), num(3.0)])),
            expr(unary(UnaryOp::Delete, index(ident("a"), num(1.0)))),
            expr(method_call(
                array(vec![
                    method_call(ident("a"), "indexOf", vec![ident("undefined")]),
                    method_call(ident("a"), "includes", vec![ident("undefined")]),
                ]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("-1,true")
    );
}

#[test]
fn push_and_pop() {
    assert_eq!(
        eval_ok(vec![
            let_("a", array(vec![num(1.0)])),
            expr(method_call(ident("a"), "push", vec![num(2.0), num(3.0)])),
            let_("last", method_call(ident("a"), "pop", vec![])),
            expr(method_call(
                array(vec![
                    ident("last"),
                    member(ident("a"), "length"),
                ]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("3,2")
    );
}

#[test]
fn slice_with_negative_indices() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "a",
                array(vec![num(1.0), num(2.0), num(3.0), num(4.0)]),
            ),
            expr(method_call(
                method_call(ident("a"), "slice", vec![num(1.0), num(-1.0)]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("2,3")
    );
}

#[test]
fn array_is_array() {
    assert_eq!(
        eval_ok(vec![expr(method_call(
            array(vec![
                call(member(ident("Array"), "isArray"), vec![array(vec![])]),
                call(
                    member(ident("Array"), "isArray"),
                    vec![object(vec![])],
                ),
            ]),
            "join",
            vec![str_(",")],
        ))]),
        JsValue::from("true,false")
    );
}

#[test]
fn nan_in_includes_uses_same_value_zero() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "a",
                array(vec![bin(BinaryOp::Div, num(0.0), num(0.0))]),
            ),
            expr(method_call(
                ident("a"),
                "includes",
                vec![bin(BinaryOp::Div, num(0.0), num(0.0))],
            )),
        ]),
        JsValue::Boolean(true)
    );
}

#[test]
fn array_literal_holes_have_no_own_key() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "a",
                array_with_holes(vec![Some(num(1.0)), None, Some(num(3.0))]),
            ),
            expr(method_call(
                array(vec![
                    member(ident("a"), "length"),
                    method_call(ident("a"), "hasOwnProperty", vec![str_("1")]),
                ]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("3,false")
    );
}
