//! Object semantics: literals, accessors, descriptors, prototypes, classes.

use crate::common::*;
use sandjs::ast::{
    BinaryOp, ClassBody, ClassDeclaration, FunctionDeclaration, Identifier, MethodDefinition,
    MethodKind, Span, Statement, UnaryOp,
};
use sandjs::JsValue;

#[test]
fn object_literal_and_member_access() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "o",
                object(vec![prop("a", num(1.0)), prop("b", str_("x"))]),
            ),
            expr(member(ident("o"), "a")),
        ]),
        JsValue::Number(1.0)
    );
    assert_eq!(
        eval_ok(vec![
            let_("o", object(vec![prop("a", num(1.0))])),
            expr(member(ident("o"), "missing")),
        ]),
        JsValue::Undefined
    );
}

#[test]
fn member_assignment_creates_properties() {
    assert_eq!(
        eval_ok(vec![
            let_("o", object(vec![])),
            expr(assign_member(member_expr(ident("o"), "x"), num(5.0))),
            expr(member(ident("o"), "x")),
        ]),
        JsValue::Number(5.0)
    );
}

#[test]
fn getters_and_setters_in_literals() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "o",
                object(vec![
                    prop("raw", num(2.0)),
                    getter_prop(
                        "double",
                        vec![ret(Some(bin(
                            BinaryOp::Mul,
                            member(this_(), "raw"),
                            num(2.0),
                        )))],
                    ),
                    setter_prop(
                        "double",
                        "v",
                        vec![expr(assign_member(
                            member_expr(this_(), "raw"),
                            bin(BinaryOp::Div, ident("v"), num(2.0)),
                        ))],
                    ),
                ]),
            ),
            expr(assign_member(member_expr(ident("o"), "double"), num(10.0))),
            expr(member(ident("o"), "double")),
        ]),
        JsValue::Number(10.0)
    );
}

#[test]
fn define_property_descriptor_protocol() {
    // Non-writable data property: assignment is silently ignored in sloppy
    // mode, the value stays.
    assert_eq!(
        eval_ok(vec![
            let_("o", object(vec![])),
            expr(call(
                member(ident("Object"), "defineProperty"),
                vec![
                    ident("o"),
                    str_("x"),
                    object(vec![prop("value", num(1.0)), prop("writable", bool_(false))]),
                ],
            )),
            expr(assign_member(member_expr(ident("o"), "x"), num(99.0))),
            expr(member(ident("o"), "x")),
        ]),
        JsValue::Number(1.0)
    );
}

#[test]
fn get_own_property_descriptor_reports_flags() {
    // Literal properties are writable/enumerable/configurable.
    assert_eq!(
        eval_ok(vec![
            let_("o", object(vec![prop("x", num(1.0))])),
            let_(
                "d",
                call(
                    member(ident("Object"), "getOwnPropertyDescriptor"),
                    vec![ident("o"), str_("x")],
                ),
            ),
            expr(logical(
                sandjs::ast::LogicalOp::And,
                member(ident("d"), "writable"),
                member(ident("d"), "enumerable"),
            )),
        ]),
        JsValue::Boolean(true)
    );
}

#[test]
fn redefining_non_configurable_property_throws() {
    let err = eval(vec![
        let_("o", object(vec![])),
        expr(call(
            member(ident("Object"), "defineProperty"),
            vec![
                ident("o"),
                str_("x"),
                object(vec![
                    prop("value", num(1.0)),
                    prop("configurable", bool_(false)),
                ]),
            ],
        )),
        expr(call(
            member(ident("Object"), "defineProperty"),
            vec![
                ident("o"),
                str_("x"),
                object(vec![prop("value", num(2.0))]),
            ],
        )),
    ])
    .unwrap_err();
    assert_eq!(thrown_name(&err), "TypeError");
}

#[test]
fn freeze_locks_every_property() {
    // After freeze: isExtensible false, isFrozen true, every descriptor
    // non-writable and non-configurable, mutation has no effect.
    assert_eq!(
        eval_ok(vec![
            let_("o", object(vec![prop("x", num(1.0))])),
            expr(call(member(ident("Object"), "freeze"), vec![ident("o")])),
            expr(assign_member(member_expr(ident("o"), "x"), num(2.0))),
            expr(assign_member(member_expr(ident("o"), "y"), num(3.0))),
            let_(
                "d",
                call(
                    member(ident("Object"), "getOwnPropertyDescriptor"),
                    vec![ident("o"), str_("x")],
                ),
            ),
            expr(method_call(
                array(vec![
                    call(member(ident("Object"), "isFrozen"), vec![ident("o")]),
                    call(member(ident("Object"), "isExtensible"), vec![ident("o")]),
                    member(ident("d"), "writable"),
                    member(ident("d"), "configurable"),
                    member(ident("o"), "x"),
                    member(ident("o"), "y"),
                ]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("true,false,false,false,1,")
    );
}

#[test]
fn freeze_keeps_accessors_but_locks_their_configurability() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "o",
                object(vec![getter_prop("g", vec![ret(Some(num(5.0)))])]),
            ),
            expr(call(member(ident("Object"), "freeze"), vec![ident("o")])),
            let_(
                "d",
                call(
                    member(ident("Object"), "getOwnPropertyDescriptor"),
                    vec![ident("o"), str_("g")],
                ),
            ),
            expr(method_call(
                array(vec![
                    member(ident("o"), "g"),
                    member(ident("d"), "configurable"),
                    unary(UnaryOp::TypeOf, member(ident("d"), "get")),
                ]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("5,false,function")
    );
}

#[test]
fn object_keys_lists_own_enumerable() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "o",
                object(vec![prop("a", num(1.0)), prop("b", num(2.0))]),
            ),
            expr(method_call(
                call(member(ident("Object"), "keys"), vec![ident("o")]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("a,b")
    );
}

#[test]
fn prototype_chain_lookup() {
    assert_eq!(
        eval_ok(vec![
            let_("base", object(vec![prop("x", num(1.0))])),
            let_(
                "derived",
                call(member(ident("Object"), "create"), vec![ident("base")]),
            ),
            expr(method_call(
                array(vec![
                    member(ident("derived"), "x"),
                    method_call(ident("derived"), "hasOwnProperty", vec![str_("x")]),
                    bin(BinaryOp::In, str_("x"), ident("derived")),
                ]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("1,false,true")
    );
}

#[test]
fn delete_removes_own_property() {
    assert_eq!(
        eval_ok(vec![
            let_("o", object(vec![prop("x", num(1.0))])),
            expr(unary(UnaryOp::Delete, member(ident("o"), "x"))),
            expr(method_call(ident("o"), "hasOwnProperty", vec![str_("x")])),
        ]),
        JsValue::Boolean(false)
    );
}

#[test]
fn delete_of_an_absent_property_reports_failure() {
    assert_eq!(
        eval_ok(vec![
            const_("o", object(vec![])),
            expr(unary(UnaryOp::Delete, member(ident("o"), "missing"))),
        ]),
        JsValue::Boolean(false)
    );
}

fn method(name: &str, params: Vec<sandjs::ast::Pattern>, body: Vec<Statement>) -> MethodDefinition {
    MethodDefinition {
        key: ident(name),
        value: FunctionDeclaration {
            id: None,
            params,
            body: sandjs::ast::BlockStatement {
                body,
                span: Span::default(),
            },
            span: Span::default(),
        },
        kind: if name == "constructor" {
            MethodKind::Constructor
        } else {
            MethodKind::Method
        },
        is_static: false,
        computed: false,
    }
}

fn class_decl(
    name: &str,
    super_class: Option<sandjs::ast::Expression>,
    methods: Vec<MethodDefinition>,
) -> Statement {
    Statement::ClassDeclaration(ClassDeclaration {
        id: Some(Identifier {
            name: name.to_string(),
            span: Span::default(),
        }),
        super_class: super_class.map(Box::new),
        body: ClassBody { body: methods },
        span: Span::default(),
    })
}

#[test]
fn class_with_constructor_and_method() {
    assert_eq!(
        eval_ok(vec![
            class_decl(
                "Point",
                None,
                vec![
                    method(
                        "constructor",
                        vec![pat("x"), pat("y")],
                        vec![
                            expr(assign_member(member_expr(this_(), "x"), ident("x"))),
                            expr(assign_member(member_expr(this_(), "y"), ident("y"))),
                        ],
                    ),
                    method(
                        "sum",
                        vec![],
                        vec![ret(Some(bin(
                            BinaryOp::Add,
                            member(this_(), "x"),
                            member(this_(), "y"),
                        )))],
                    ),
                ],
            ),
            let_("p", new_(ident("Point"), vec![num(3.0), num(4.0)])),
            expr(method_call(ident("p"), "sum", vec![])),
        ]),
        JsValue::Number(7.0)
    );
}

#[test]
fn class_inheritance_and_instanceof() {
    assert_eq!(
        eval_ok(vec![
            class_decl(
                "Animal",
                None,
                vec![method("speak", vec![], vec![ret(Some(str_("...")))])],
            ),
            class_decl(
                "Dog",
                Some(ident("Animal")),
                vec![method("speak", vec![], vec![ret(Some(str_("woof")))])],
            ),
            let_("d", new_(ident("Dog"), vec![])),
            expr(method_call(
                array(vec![
                    method_call(ident("d"), "speak", vec![]),
                    bin(BinaryOp::Instanceof, ident("d"), ident("Dog")),
                    bin(BinaryOp::Instanceof, ident("d"), ident("Animal")),
                ]),
                "join",
                vec![str_(",")],
            )),
        ]),
        JsValue::from("woof,true,true")
    );
}

#[test]
fn error_objects_carry_name_and_message() {
    assert_eq!(
        eval_ok(vec![
            let_(
                "e",
                new_(ident("TypeError"), vec![str_("bad thing")]),
            ),
            expr(method_call(ident("e"), "toString", vec![])),
        ]),
        JsValue::from("TypeError: bad thing")
    );
    assert_eq!(
        eval_ok(vec![
            let_("e", new_(ident("RangeError"), vec![])),
            expr(bin(
                BinaryOp::Instanceof,
                ident("e"),
                ident("Error"),
            )),
        ]),
        JsValue::Boolean(true)
    );
}

#[test]
fn object_spread_copies_enumerable_own_props() {
    assert_eq!(
        eval_ok(vec![
            let_("a", object(vec![prop("x", num(1.0)), prop("y", num(2.0))])),
            let_(
                "b",
                object(vec![
                    sandjs::ast::ObjectMember::SpreadElement(sandjs::ast::SpreadElement {
                        argument: Box::new(ident("a")),
                        span: Span::default(),
                    }),
                    prop("y", num(9.0)),
                ]),
            ),
            expr(bin(
                BinaryOp::Add,
                member(ident("b"), "x"),
                member(ident("b"), "y"),
            )),
        ]),
        JsValue::Number(10.0)
    );
}
