//! Macrotask lifecycle and the host-driven step protocol.
//!
//! A task never drives itself. Every evaluation entry point builds a
//! `TaskIterator` and hands it to the host's `TaskRunner`, which calls
//! `next()` (or `abort()`) until `done` — single-stepping, batching and
//! throttling are entirely the host's choice. When the task body drains,
//! its completion value is held pending while the microtask queue empties,
//! each microtask driven through the same runner. Unhandled rejections
//! outstanding at that point demote a successful body to a rejection.

use std::mem;

use crate::error::EngineError;
use crate::interpreter::frames::Operation;
use crate::interpreter::Interpreter;
use crate::realm::RealmRef;
use crate::value::{JsValue, PromiseReaction};

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Fulfilled,
    Rejected,
}

/// A queued microtask.
#[derive(Clone)]
pub enum Job {
    /// Plain callback (`queueMicrotask`).
    Callback {
        callback: JsValue,
        args: Vec<JsValue>,
    },
    /// Promise reaction: run the matching handler with the settlement value
    /// and settle the derived promise with its outcome. A missing handler
    /// passes the settlement through unchanged.
    Reaction {
        reaction: PromiseReaction,
        argument: JsValue,
        fulfilled: bool,
    },
}

/// How a drained task's completion value is read off the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskKind {
    /// Scripts complete with the value of their last expression statement.
    Script,
    /// Module graph evaluation completes with undefined.
    Module,
    /// A queued call completes with its return value.
    Call,
}

/// Host-facing handle over one suspendable execution.
pub struct TaskIterator {
    interpreter: Interpreter,
    kind: TaskKind,
    status: TaskStatus,
    done: bool,
    aborted: bool,
    result: Option<Result<JsValue, EngineError>>,
}

/// The callback that drives a `TaskIterator` to completion.
pub type TaskRunner<'a> = dyn FnMut(&mut TaskIterator) + 'a;

impl TaskIterator {
    fn new(interpreter: Interpreter, kind: TaskKind) -> Self {
        TaskIterator {
            interpreter,
            kind,
            status: TaskStatus::Pending,
            done: false,
            aborted: false,
            result: None,
        }
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// The AST node kind and source span last dispatched, or `None` before
    /// the first step.
    pub fn operation(&self) -> Option<Operation> {
        self.interpreter.operation()
    }

    /// Process one step. `Ok(true)` once the task has drained; stepping a
    /// finished task is a no-op. Stepping an aborted task is an error.
    pub fn next(&mut self) -> Result<bool, EngineError> {
        if self.aborted {
            return Err(EngineError::TaskAborted);
        }
        if self.done {
            return Ok(true);
        }
        self.status = TaskStatus::Running;
        let realm = self.interpreter.realm.clone();
        let prev_in_step = mem::replace(&mut realm.borrow_mut().in_step, true);
        let outcome = self.interpreter.step();
        realm.borrow_mut().in_step = prev_in_step;
        match outcome {
            Ok(false) => Ok(false),
            Ok(true) => {
                self.finish_ok();
                Ok(true)
            }
            Err(err) => {
                self.finish_err(err);
                Ok(true)
            }
        }
    }

    /// Inject an exception at the current suspension point, as if the
    /// pending operation threw it. The task's handlers get a chance to
    /// catch; an uncaught injection finishes the task rejected.
    pub fn throw(&mut self, value: JsValue) -> Result<bool, EngineError> {
        if self.aborted {
            return Err(EngineError::TaskAborted);
        }
        if self.done {
            return Ok(true);
        }
        self.status = TaskStatus::Running;
        match self.interpreter.inject_throw(value) {
            Ok(()) => Ok(self.done),
            Err(err) => {
                self.finish_err(err);
                Ok(true)
            }
        }
    }

    /// Cancel the task. Terminal: the task rejects with the abort error and
    /// further `next()` calls fail rather than silently resuming.
    pub fn abort(&mut self) {
        self.aborted = true;
        self.done = true;
        self.status = TaskStatus::Rejected;
        self.result = Some(Err(EngineError::TaskAborted));
    }

    fn finish_ok(&mut self) {
        self.done = true;
        self.status = TaskStatus::Fulfilled;
        let value = match self.kind {
            TaskKind::Script => self.interpreter.take_completion_value(),
            TaskKind::Module => JsValue::Undefined,
            TaskKind::Call => self.interpreter.take_result(),
        };
        self.result = Some(Ok(value));
    }

    fn finish_err(&mut self, err: EngineError) {
        self.done = true;
        self.status = TaskStatus::Rejected;
        self.result = Some(Err(err));
    }
}

/// Queue a microtask on the realm's current task.
pub fn enqueue_microtask(realm: &RealmRef, job: Job) -> Result<(), EngineError> {
    let mut r = realm.borrow_mut();
    if r.current_task.is_none() {
        return Err(EngineError::type_error(
            "microtasks can only be scheduled while a task is running",
        ));
    }
    r.microtasks.push_back(job);
    Ok(())
}

/// Run one macrotask to finalization: guard re-entrancy, drive the body
/// through the runner, drain microtasks, apply rejection demotion.
pub(crate) fn run_task<F>(
    realm: &RealmRef,
    runner: &mut TaskRunner<'_>,
    kind: TaskKind,
    prepare: F,
) -> Result<JsValue, EngineError>
where
    F: FnOnce(&mut Interpreter) -> Result<(), EngineError>,
{
    let prev_task = {
        let mut r = realm.borrow_mut();
        if r.current_task.is_some() && !r.in_step {
            return Err(EngineError::ConcurrentEvaluation);
        }
        let id = r.next_task_id;
        r.next_task_id += 1;
        r.current_task.replace(id)
    };

    let body = drive(realm, runner, kind, prepare);

    let finalized = match body {
        Err(EngineError::TaskAborted) => {
            // Leftover microtasks belong to the cancelled task.
            realm.borrow_mut().microtasks.clear();
            realm.borrow_mut().unhandled_rejections.clear();
            Err(EngineError::TaskAborted)
        }
        body => {
            let drained = drain_microtasks(realm, runner);
            let rejections = mem::take(&mut realm.borrow_mut().unhandled_rejections);
            match (body, drained) {
                (Err(err), _) => Err(err),
                (Ok(_), Err(err)) => Err(err),
                (Ok(value), Ok(())) => match rejections.into_iter().next() {
                    Some((_, rejection)) => {
                        Err(EngineError::UnhandledRejection { value: rejection })
                    }
                    None => Ok(value),
                },
            }
        }
    };

    realm.borrow_mut().current_task = prev_task;
    finalized
}

/// Drive one prepared execution through the runner until done.
fn drive<F>(
    realm: &RealmRef,
    runner: &mut TaskRunner<'_>,
    kind: TaskKind,
    prepare: F,
) -> Result<JsValue, EngineError>
where
    F: FnOnce(&mut Interpreter) -> Result<(), EngineError>,
{
    let mut iter = TaskIterator::new(Interpreter::new(realm.clone()), kind);
    prepare(&mut iter.interpreter)?;
    runner(&mut iter);
    if !iter.done {
        return Err(EngineError::IncompleteDrain);
    }
    iter.result.take().unwrap_or(Ok(JsValue::Undefined))
}

/// FIFO drain where a microtask's own enqueues complete before the next
/// already-queued microtask begins.
fn drain_microtasks(realm: &RealmRef, runner: &mut TaskRunner<'_>) -> Result<(), EngineError> {
    loop {
        let Some(job) = realm.borrow_mut().microtasks.pop_front() else {
            return Ok(());
        };
        let pending = mem::take(&mut realm.borrow_mut().microtasks);
        let ran = run_job(realm, runner, job);
        let nested = drain_microtasks(realm, runner);
        realm.borrow_mut().microtasks = pending;
        if ran.is_err() || nested.is_err() {
            // A failed job takes the rest of its task's queue with it;
            // nothing may leak into the next macrotask.
            realm.borrow_mut().microtasks.clear();
        }
        ran?;
        nested?;
    }
}

fn run_job(realm: &RealmRef, runner: &mut TaskRunner<'_>, job: Job) -> Result<(), EngineError> {
    match job {
        Job::Callback { callback, args } => {
            drive(realm, runner, TaskKind::Call, |interp| {
                interp.prepare_call(&callback, JsValue::Undefined, args)
            })?;
            Ok(())
        }
        Job::Reaction {
            reaction,
            argument,
            fulfilled,
        } => {
            let handler = if fulfilled {
                reaction.on_fulfilled.clone()
            } else {
                reaction.on_rejected.clone()
            };
            let handler = handler.filter(|h| {
                h.as_object().is_some_and(|o| o.borrow().is_callable())
            });
            match handler {
                Some(handler) => {
                    let outcome = drive(realm, runner, TaskKind::Call, |interp| {
                        interp.prepare_call(&handler, JsValue::Undefined, vec![argument])
                    });
                    match outcome {
                        Ok(value) => {
                            crate::intrinsics::promise::resolve_value(
                                realm,
                                &reaction.derived,
                                value,
                            )
                        }
                        Err(err) if err.is_catchable() => {
                            let value = error_to_value(realm, err);
                            crate::intrinsics::promise::settle_reject(
                                realm,
                                &reaction.derived,
                                value,
                            )
                        }
                        Err(err) => Err(err),
                    }
                }
                // Pass-through: the settlement propagates to the derived
                // promise unchanged.
                None if fulfilled => crate::intrinsics::promise::resolve_value(
                    realm,
                    &reaction.derived,
                    argument,
                ),
                None => {
                    crate::intrinsics::promise::settle_reject(realm, &reaction.derived, argument)
                }
            }
        }
    }
}

fn error_to_value(realm: &RealmRef, err: EngineError) -> JsValue {
    let interp = Interpreter::new(realm.clone());
    interp.error_value(err)
}

/// The default runner: step to completion without pausing.
pub fn drain_runner(iter: &mut TaskIterator) {
    while !iter.done() {
        if iter.next().is_err() {
            break;
        }
    }
}
