//! Macrotask stepping, abort, microtask ordering and rejection demotion.

use crate::common::*;
use sandjs::ast::{AssignmentOp, BinaryOp, UpdateOp};
use sandjs::{EngineError, JsValue, Realm, TaskStatus};

/// `log.push(<expr>)` against a global array.
fn log_push(value: sandjs::ast::Expression) -> sandjs::ast::Statement {
    expr(method_call(ident("log"), "push", vec![value]))
}

/// A realm with a global `log` array, plus a reader for it.
fn realm_with_log() -> Realm {
    let realm = Realm::new();
    let log = realm.evaluate(&program(vec![expr(array(vec![]))])).unwrap();
    realm.set_global("log", log);
    realm
}

fn read_log(realm: &Realm) -> String {
    as_string(
        &realm
            .evaluate(&program(vec![expr(method_call(
                ident("log"),
                "join",
                vec![str_(",")],
            ))]))
            .unwrap(),
    )
}

#[test]
fn tasks_advance_one_operation_per_step() {
    let realm = Realm::new();
    let body = program(vec![
        let_("x", num(1.0)),
        let_("y", num(2.0)),
        expr(bin(BinaryOp::Add, ident("x"), ident("y"))),
    ]);
    let mut steps = 0;
    let mut saw_operation = false;
    let result = realm.evaluate_script(&body, &mut |task| {
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.operation().is_none());
        while !task.done() {
            task.next().unwrap();
            steps += 1;
            saw_operation |= task.operation().is_some();
        }
        assert_eq!(task.status(), TaskStatus::Fulfilled);
    });
    assert_eq!(result.unwrap(), JsValue::Number(3.0));
    assert!(steps > 3, "expected multiple steps, got {steps}");
    assert!(saw_operation);
}

#[test]
fn abort_rejects_and_leaves_the_realm_usable() {
    let realm = Realm::new();
    // Never terminates on its own.
    let spin = program(vec![
        let_("i", num(0.0)),
        while_(
            bool_(true),
            expr(update(UpdateOp::Increment, true, ident("i"))),
        ),
    ]);
    let result = realm.evaluate_script(&spin, &mut |task| {
        for _ in 0..10 {
            task.next().unwrap();
        }
        task.abort();
        assert!(task.aborted());
        assert_eq!(task.status(), TaskStatus::Rejected);
        // Stepping an aborted task is an error, not a resume.
        assert!(matches!(task.next(), Err(EngineError::TaskAborted)));
    });
    assert!(matches!(result, Err(EngineError::TaskAborted)));

    // The abort cancelled that task only; the realm still works.
    assert_eq!(
        realm
            .evaluate(&program(vec![expr(bin(
                BinaryOp::Add,
                num(1.0),
                num(1.0),
            ))]))
            .unwrap(),
        JsValue::Number(2.0)
    );
}

#[test]
fn runner_returning_early_is_an_incomplete_drain() {
    let realm = Realm::new();
    let body = program(vec![expr(num(1.0))]);
    let result = realm.evaluate_script(&body, &mut |_task| {
        // Host walks away without draining.
    });
    assert!(matches!(result, Err(EngineError::IncompleteDrain)));
}

#[test]
fn injected_throw_is_catchable_by_the_script() {
    let realm = Realm::new();
    let body = program(vec![
        var_("caught", num(0.0)),
        try_(
            vec![while_(bool_(true), block(vec![]))],
            Some((Some(pat("e")), vec![expr(assign("caught", ident("e")))])),
            None,
        ),
        expr(ident("caught")),
    ]);
    let result = realm.evaluate_script(&body, &mut |task| {
        // Enough steps to be well inside the spin loop.
        for _ in 0..50 {
            task.next().unwrap();
        }
        task.throw(JsValue::from("stop")).unwrap();
        while !task.done() {
            task.next().unwrap();
        }
    });
    assert_eq!(result.unwrap(), JsValue::from("stop"));
}

#[test]
fn uncaught_injected_throw_rejects_the_task() {
    let realm = Realm::new();
    let body = program(vec![while_(bool_(true), block(vec![]))]);
    let result = realm.evaluate_script(&body, &mut |task| {
        for _ in 0..5 {
            task.next().unwrap();
        }
        task.throw(JsValue::from("die")).unwrap();
        while !task.done() {
            task.next().unwrap();
        }
    });
    let EngineError::Thrown { value } = result.unwrap_err() else {
        panic!("expected thrown");
    };
    assert_eq!(value, JsValue::from("die"));
}

#[test]
fn nested_evaluation_between_steps_is_rejected() {
    let realm = Realm::new();
    let body = program(vec![expr(num(1.0))]);
    let mut nested = None;
    let result = realm.evaluate_script(&body, &mut |task| {
        // Between steps a task is entered but not mid-step; a second
        // evaluation on the same realm must refuse.
        nested = Some(realm.evaluate(&program(vec![expr(num(2.0))])));
        while !task.done() {
            task.next().unwrap();
        }
    });
    assert_eq!(result.unwrap(), JsValue::Number(1.0));
    assert!(matches!(
        nested,
        Some(Err(EngineError::ConcurrentEvaluation))
    ));
}

#[test]
fn microtasks_run_after_the_body_in_fifo_order() {
    let realm = realm_with_log();
    realm
        .evaluate(&program(vec![
            log_push(str_("body")),
            expr(call(
                ident("queueMicrotask"),
                vec![arrow_block(vec![], vec![log_push(str_("m1"))])],
            )),
            expr(call(
                ident("queueMicrotask"),
                vec![arrow_block(vec![], vec![log_push(str_("m2"))])],
            )),
            log_push(str_("end")),
        ]))
        .unwrap();
    assert_eq!(read_log(&realm), "body,end,m1,m2");
}

#[test]
fn a_microtasks_own_enqueues_run_before_its_siblings() {
    let realm = realm_with_log();
    realm
        .evaluate(&program(vec![
            expr(call(
                ident("queueMicrotask"),
                vec![arrow_block(
                    vec![],
                    vec![
                        log_push(str_("m1")),
                        expr(call(
                            ident("queueMicrotask"),
                            vec![arrow_block(vec![], vec![log_push(str_("m1a"))])],
                        )),
                    ],
                )],
            )),
            expr(call(
                ident("queueMicrotask"),
                vec![arrow_block(vec![], vec![log_push(str_("m2"))])],
            )),
        ]))
        .unwrap();
    assert_eq!(read_log(&realm), "m1,m1a,m2");
}

#[test]
fn microtasks_still_drain_when_the_body_throws() {
    let realm = realm_with_log();
    let err = realm
        .evaluate(&program(vec![
            expr(call(
                ident("queueMicrotask"),
                vec![arrow_block(vec![], vec![log_push(str_("m"))])],
            )),
            throw_(str_("boom")),
        ]))
        .unwrap_err();
    assert!(matches!(err, EngineError::Thrown { .. }));
    assert_eq!(read_log(&realm), "m");
}

#[test]
fn failed_microtask_discards_the_rest_of_the_queue() {
    // The jobs queued behind a throwing microtask belong to the failed
    // task; they must not surface in the next evaluation on the realm.
    let realm = realm_with_log();
    let err = realm
        .evaluate(&program(vec![
            expr(call(
                ident("queueMicrotask"),
                vec![arrow_block(vec![], vec![throw_(str_("fail"))])],
            )),
            expr(call(
                ident("queueMicrotask"),
                vec![arrow_block(vec![], vec![log_push(str_("stale"))])],
            )),
        ]))
        .unwrap_err();
    assert!(matches!(err, EngineError::Thrown { .. }));
    assert_eq!(
        realm.evaluate(&program(vec![expr(num(1.0))])).unwrap(),
        JsValue::Number(1.0)
    );
    assert_eq!(read_log(&realm), "");
}

#[test]
fn promise_executor_runs_synchronously_reactions_do_not() {
    let realm = realm_with_log();
    realm
        .evaluate(&program(vec![
            let_(
                "p",
                new_(
                    ident("Promise"),
                    vec![arrow_block(
                        vec![pat("resolve")],
                        vec![
                            log_push(str_("exec")),
                            expr(call(ident("resolve"), vec![num(1.0)])),
                        ],
                    )],
                ),
            ),
            expr(method_call(
                ident("p"),
                "then",
                vec![arrow_block(
                    vec![pat("v")],
                    vec![log_push(bin(BinaryOp::Add, str_("then:"), ident("v")))],
                )],
            )),
            log_push(str_("sync")),
        ]))
        .unwrap();
    assert_eq!(read_log(&realm), "exec,sync,then:1");
}

#[test]
fn then_chains_pass_transformed_values() {
    let realm = realm_with_log();
    realm
        .evaluate(&program(vec![expr(method_call(
            method_call(
                call(member(ident("Promise"), "resolve"), vec![num(1.0)]),
                "then",
                vec![arrow(
                    vec![pat("v")],
                    bin(BinaryOp::Add, ident("v"), num(1.0)),
                )],
            ),
            "then",
            vec![arrow_block(vec![pat("v")], vec![log_push(ident("v"))])],
        ))]))
        .unwrap();
    assert_eq!(read_log(&realm), "2");
}

#[test]
fn catch_handles_executor_throw() {
    let realm = realm_with_log();
    realm
        .evaluate(&program(vec![expr(method_call(
            new_(
                ident("Promise"),
                vec![arrow_block(vec![], vec![throw_(str_("oops"))])],
            ),
            "catch",
            vec![arrow_block(
                vec![pat("e")],
                vec![log_push(bin(BinaryOp::Add, str_("caught:"), ident("e")))],
            )],
        ))]))
        .unwrap();
    assert_eq!(read_log(&realm), "caught:oops");
}

#[test]
fn unhandled_rejection_demotes_a_successful_task() {
    let realm = Realm::new();
    let err = realm
        .evaluate(&program(vec![
            expr(call(member(ident("Promise"), "reject"), vec![str_("boom")])),
            expr(num(42.0)),
        ]))
        .unwrap_err();
    let EngineError::UnhandledRejection { value } = err else {
        panic!("expected unhandled rejection, got {err:?}");
    };
    assert_eq!(value, JsValue::from("boom"));
}

#[test]
fn handled_rejection_does_not_demote() {
    let realm = realm_with_log();
    assert_eq!(
        realm
            .evaluate(&program(vec![
                expr(method_call(
                    call(member(ident("Promise"), "reject"), vec![str_("x")]),
                    "catch",
                    vec![arrow_block(vec![pat("e")], vec![log_push(ident("e"))])],
                )),
                expr(num(7.0)),
            ]))
            .unwrap(),
        JsValue::Number(7.0)
    );
    assert_eq!(read_log(&realm), "x");
}

#[test]
fn rejection_handled_during_the_drain_counts_as_handled() {
    // The catch is attached by a microtask, after the body finished but
    // before finalization checks for unhandled rejections.
    let realm = realm_with_log();
    assert_eq!(
        realm
            .evaluate(&program(vec![
                let_(
                    "p",
                    call(member(ident("Promise"), "reject"), vec![str_("late")]),
                ),
                expr(call(
                    ident("queueMicrotask"),
                    vec![arrow_block(
                        vec![],
                        vec![expr(method_call(
                            ident("p"),
                            "catch",
                            vec![arrow_block(
                                vec![pat("e")],
                                vec![log_push(ident("e"))],
                            )],
                        ))],
                    )],
                )),
                expr(num(1.0)),
            ]))
            .unwrap(),
        JsValue::Number(1.0)
    );
    assert_eq!(read_log(&realm), "late");
}

#[test]
fn rejections_propagate_through_handlerless_links() {
    // then(onFulfilled) has no rejection handler; the rejection passes
    // through to the catch at the end of the chain.
    let realm = realm_with_log();
    realm
        .evaluate(&program(vec![expr(method_call(
            method_call(
                call(member(ident("Promise"), "reject"), vec![str_("deep")]),
                "then",
                vec![arrow(vec![pat("v")], ident("v"))],
            ),
            "catch",
            vec![arrow_block(vec![pat("e")], vec![log_push(ident("e"))])],
        ))]))
        .unwrap();
    assert_eq!(read_log(&realm), "deep");
}

#[test]
fn resolving_with_a_promise_adopts_its_state() {
    let realm = realm_with_log();
    realm
        .evaluate(&program(vec![
            let_(
                "inner",
                call(member(ident("Promise"), "resolve"), vec![num(5.0)]),
            ),
            expr(method_call(
                new_(
                    ident("Promise"),
                    vec![arrow_block(
                        vec![pat("resolve")],
                        vec![expr(call(ident("resolve"), vec![ident("inner")]))],
                    )],
                ),
                "then",
                vec![arrow_block(vec![pat("v")], vec![log_push(ident("v"))])],
            )),
        ]))
        .unwrap();
    assert_eq!(read_log(&realm), "5");
}

#[test]
fn aborted_task_discards_its_microtasks() {
    let realm = realm_with_log();
    let body = program(vec![
        expr(call(
            ident("queueMicrotask"),
            vec![arrow_block(vec![], vec![log_push(str_("leak"))])],
        )),
        while_(bool_(true), block(vec![])),
    ]);
    let result = realm.evaluate_script(&body, &mut |task| {
        for _ in 0..30 {
            task.next().unwrap();
        }
        task.abort();
    });
    assert!(matches!(result, Err(EngineError::TaskAborted)));
    // The queued microtask died with the task.
    assert_eq!(read_log(&realm), "");
}

#[test]
fn queue_microtask_requires_a_callable() {
    let realm = Realm::new();
    let err = realm
        .evaluate(&program(vec![expr(call(
            ident("queueMicrotask"),
            vec![num(1.0)],
        ))]))
        .unwrap_err();
    assert_eq!(thrown_name(&err), "TypeError");
}

#[test]
fn update_counters_survive_suspension() {
    // Values on the stack persist across host-visible suspension points.
    let realm = Realm::new();
    let body = program(vec![
        let_("total", num(0.0)),
        let_("i", num(0.0)),
        while_(
            bin(BinaryOp::Lt, ident("i"), num(100.0)),
            block(vec![
                expr(assign_op(AssignmentOp::AddAssign, "total", ident("i"))),
                expr(update(UpdateOp::Increment, true, ident("i"))),
            ]),
        ),
        expr(ident("total")),
    ]);
    // One step at a time, with the runner observing progress throughout.
    let result = realm.evaluate_script(&body, &mut |task| {
        while !task.done() {
            task.next().unwrap();
        }
    });
    assert_eq!(result.unwrap(), JsValue::Number(4950.0));
}
