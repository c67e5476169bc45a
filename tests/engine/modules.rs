//! Module linking, evaluation and live bindings through the host API.

use std::collections::HashMap;

use crate::common::*;
use sandjs::ast::{BinaryOp, Program, UpdateOp};
use sandjs::module::ResolvedModule;
use sandjs::{EngineError, JsValue, Realm, RealmOptions};

/// A realm whose resolver serves the given module programs by specifier.
fn realm_with(modules: Vec<(&str, Program)>) -> Realm {
    let mut table: HashMap<String, Program> = HashMap::new();
    for (specifier, program) in modules {
        table.insert(specifier.to_string(), program);
    }
    Realm::with_options(RealmOptions {
        module_resolver: Some(Box::new(move |specifier| {
            table
                .get(specifier)
                .cloned()
                .map(ResolvedModule::Source)
                .ok_or_else(|| {
                    EngineError::type_error(format!("cannot resolve module '{specifier}'"))
                })
        })),
        ..RealmOptions::default()
    })
}

#[test]
fn exports_are_readable_through_the_handle() {
    let realm = realm_with(vec![(
        "main",
        module(vec![
            export_decl(let_("x", num(42.0))),
            export_decl(func_decl("f", vec![], vec![ret(Some(num(7.0)))])),
        ]),
    )]);
    let handle = realm.evaluate_module("main").unwrap();
    assert_eq!(handle.get_export("x").unwrap(), JsValue::Number(42.0));
    assert!(handle.get_export("f").unwrap().is_callable());
    let err = handle.get_export("missing").unwrap_err();
    assert!(matches!(err, EngineError::Reference { .. }), "got {err:?}");
}

#[test]
fn default_export() {
    let realm = realm_with(vec![(
        "main",
        module(vec![export_default(bin(
            BinaryOp::Mul,
            num(6.0),
            num(7.0),
        ))]),
    )]);
    let handle = realm.evaluate_module("main").unwrap();
    assert_eq!(handle.get_export("default").unwrap(), JsValue::Number(42.0));
}

#[test]
fn imports_read_the_dependency() {
    let realm = realm_with(vec![
        (
            "dep",
            module(vec![export_decl(const_("base", num(10.0)))]),
        ),
        (
            "main",
            module(vec![
                import(vec![import_named("base", "base")], "dep"),
                export_decl(let_(
                    "result",
                    bin(BinaryOp::Add, ident("base"), num(5.0)),
                )),
            ]),
        ),
    ]);
    let handle = realm.evaluate_module("main").unwrap();
    assert_eq!(handle.get_export("result").unwrap(), JsValue::Number(15.0));
}

#[test]
fn import_bindings_are_live() {
    // main bumps the exporter's counter through an imported function; the
    // exporter's binding observes both increments.
    let realm = realm_with(vec![
        (
            "counter",
            module(vec![
                export_decl(let_("count", num(0.0))),
                export_decl(func_decl(
                    "bump",
                    vec![],
                    vec![expr(update(UpdateOp::Increment, true, ident("count")))],
                )),
            ]),
        ),
        (
            "main",
            module(vec![
                import(vec![import_named("bump", "bump")], "counter"),
                expr(call(ident("bump"), vec![])),
                expr(call(ident("bump"), vec![])),
            ]),
        ),
    ]);
    realm.evaluate_module("main").unwrap();
    // Re-requesting an evaluated module yields a handle without re-running
    // its body.
    let counter = realm.evaluate_module("counter").unwrap();
    assert_eq!(counter.get_export("count").unwrap(), JsValue::Number(2.0));
}

#[test]
fn assigning_to_an_import_throws() {
    let realm = realm_with(vec![
        ("dep", module(vec![export_decl(let_("x", num(1.0)))])),
        (
            "main",
            module(vec![
                import(vec![import_named("x", "x")], "dep"),
                expr(assign("x", num(2.0))),
            ]),
        ),
    ]);
    let err = realm.evaluate_module("main").unwrap_err();
    assert_eq!(thrown_name(&err), "TypeError");
}

#[test]
fn ambiguous_star_export_fails_at_the_consuming_import() {
    // Both a and b export `shared`; the star re-exports disagree, so the
    // named import is a link-time SyntaxError.
    let realm = realm_with(vec![
        ("a", module(vec![export_decl(let_("shared", num(1.0)))])),
        ("b", module(vec![export_decl(let_("shared", num(2.0)))])),
        (
            "hub",
            module(vec![export_all("a"), export_all("b")]),
        ),
        (
            "main",
            module(vec![
                import(vec![import_named("shared", "shared")], "hub"),
                expr(ident("shared")),
            ]),
        ),
    ]);
    let err = realm.evaluate_module("main").unwrap_err();
    assert!(matches!(err, EngineError::Syntax { .. }), "got {err:?}");
}

#[test]
fn unambiguous_star_export_resolves() {
    let realm = realm_with(vec![
        ("a", module(vec![export_decl(let_("x", num(1.0)))])),
        ("b", module(vec![export_decl(let_("y", num(2.0)))])),
        ("hub", module(vec![export_all("a"), export_all("b")])),
        (
            "main",
            module(vec![
                import(
                    vec![import_named("x", "x"), import_named("y", "y")],
                    "hub",
                ),
                export_decl(let_(
                    "sum",
                    bin(BinaryOp::Add, ident("x"), ident("y")),
                )),
            ]),
        ),
    ]);
    let handle = realm.evaluate_module("main").unwrap();
    assert_eq!(handle.get_export("sum").unwrap(), JsValue::Number(3.0));
}

#[test]
fn missing_export_is_a_link_error() {
    let realm = realm_with(vec![
        ("dep", module(vec![export_decl(let_("x", num(1.0)))])),
        (
            "main",
            module(vec![import(vec![import_named("nope", "nope")], "dep")]),
        ),
    ]);
    let err = realm.evaluate_module("main").unwrap_err();
    assert!(matches!(err, EngineError::Syntax { .. }), "got {err:?}");
}

#[test]
fn namespace_import_reflects_live_bindings() {
    let realm = realm_with(vec![
        (
            "dep",
            module(vec![
                export_decl(let_("v", num(1.0))),
                export_decl(func_decl(
                    "set",
                    vec![pat("n")],
                    vec![expr(assign("v", ident("n")))],
                )),
            ]),
        ),
        (
            "main",
            module(vec![
                import(vec![import_namespace("ns")], "dep"),
                expr(method_call(ident("ns"), "set", vec![num(9.0)])),
                export_decl(let_("seen", member(ident("ns"), "v"))),
            ]),
        ),
    ]);
    let handle = realm.evaluate_module("main").unwrap();
    assert_eq!(handle.get_export("seen").unwrap(), JsValue::Number(9.0));
}

#[test]
fn module_bodies_run_in_dependency_order_once() {
    // diamond: main -> (left, right) -> base; base runs once, before both.
    let realm = realm_with(vec![
        (
            "base",
            module(vec![
                expr(method_call(ident("log"), "push", vec![str_("base")])),
                export_decl(let_("b", num(1.0))),
            ]),
        ),
        (
            "left",
            module(vec![
                import(vec![import_named("b", "b")], "base"),
                expr(method_call(ident("log"), "push", vec![str_("left")])),
                export_decl(let_("l", num(2.0))),
            ]),
        ),
        (
            "right",
            module(vec![
                import(vec![import_named("b", "b")], "base"),
                expr(method_call(ident("log"), "push", vec![str_("right")])),
                export_decl(let_("r", num(3.0))),
            ]),
        ),
        (
            "main",
            module(vec![
                import(vec![import_named("l", "l")], "left"),
                import(vec![import_named("r", "r")], "right"),
                expr(method_call(ident("log"), "push", vec![str_("main")])),
            ]),
        ),
    ]);
    // Collect evaluation order through a shared global array.
    let log = realm.evaluate(&program(vec![expr(array(vec![]))])).unwrap();
    realm.set_global("log", log);
    realm.evaluate_module("main").unwrap();
    assert_eq!(
        realm
            .evaluate(&program(vec![expr(method_call(
                ident("log"),
                "join",
                vec![str_(",")],
            ))]))
            .unwrap(),
        JsValue::from("base,left,right,main")
    );
}

#[test]
fn module_evaluation_error_is_memoized() {
    let realm = realm_with(vec![(
        "bad",
        module(vec![throw_(str_("boom"))]),
    )]);
    let err = realm.evaluate_module("bad").unwrap_err();
    let EngineError::Thrown { value } = &err else {
        panic!("expected thrown, got {err:?}");
    };
    assert_eq!(*value, JsValue::from("boom"));
    // A second evaluation reports the same failure without re-running.
    let err2 = realm.evaluate_module("bad").unwrap_err();
    assert!(matches!(err2, EngineError::Thrown { .. }));
}

#[test]
fn unresolvable_specifier_errors() {
    let realm = realm_with(vec![]);
    let err = realm.evaluate_module("ghost").unwrap_err();
    assert!(matches!(err, EngineError::Type { .. }), "got {err:?}");
}
