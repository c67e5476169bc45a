//! `Promise`: creation, settlement and reaction scheduling.
//!
//! Settlement never runs user code synchronously. Fulfilling or rejecting
//! queues one `Job::Reaction` per registered handler pair; handlers attached
//! after settlement are queued immediately with the recorded result.
//! Resolving with a thenable adopts its eventual state through a
//! handler-less reaction. Rejections are tracked on the realm until a
//! rejection handler is attached, so the task layer can demote an otherwise
//! successful macrotask.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::EngineError;
use crate::interpreter::Interpreter;
use crate::realm::RealmRef;
use crate::task::{enqueue_microtask, Job};
use crate::value::{
    ExoticObject, JsObject, JsObjectRef, JsValue, PromiseReaction, PromiseState, PromiseStatus,
};

use super::{arg, constructor, method, native};

pub fn install(realm: &RealmRef) {
    let intrinsics = realm.borrow().intrinsics.clone();
    let proto = &intrinsics.promise_prototype;

    method(proto, &intrinsics, "then", |interp, this, args| {
        let promise = this_promise(&this)?;
        let derived = new_promise(&interp.realm);
        let on_fulfilled = callable_or_none(arg(args, 0));
        let on_rejected = callable_or_none(arg(args, 1));
        register_reaction(
            &interp.realm,
            &promise,
            PromiseReaction {
                on_fulfilled,
                on_rejected,
                derived: derived.clone(),
            },
        )?;
        Ok(JsValue::Object(derived))
    });
    method(proto, &intrinsics, "catch", |interp, this, args| {
        let promise = this_promise(&this)?;
        let derived = new_promise(&interp.realm);
        register_reaction(
            &interp.realm,
            &promise,
            PromiseReaction {
                on_fulfilled: None,
                on_rejected: callable_or_none(arg(args, 0)),
                derived: derived.clone(),
            },
        )?;
        Ok(JsValue::Object(derived))
    });

    let promise_ctor = native(&intrinsics, "Promise", true, |interp, _, args| {
        let executor = arg(args, 0);
        if !executor.is_callable() {
            return Err(EngineError::type_error("Promise executor is not callable"));
        }
        let promise = new_promise(&interp.realm);
        let (resolve, reject) = settle_functions(&interp.realm, &promise);
        let outcome = interp.call_function(
            &executor,
            JsValue::Undefined,
            &[JsValue::Object(resolve), JsValue::Object(reject)],
        );
        if let Err(err) = outcome {
            if !err.is_catchable() {
                return Err(err);
            }
            let value = interp.error_value(err);
            settle_reject(&interp.realm, &promise, value)?;
        }
        Ok(JsValue::Object(promise))
    });
    method(&promise_ctor, &intrinsics, "resolve", |interp, _, args| {
        let value = arg(args, 0);
        // An existing promise passes through unchanged.
        if value
            .as_object()
            .is_some_and(|o| matches!(o.borrow().exotic, ExoticObject::Promise(_)))
        {
            return Ok(value);
        }
        let promise = new_promise(&interp.realm);
        resolve_value(&interp.realm, &promise, value)?;
        Ok(JsValue::Object(promise))
    });
    method(&promise_ctor, &intrinsics, "reject", |interp, _, args| {
        let promise = new_promise(&interp.realm);
        settle_reject(&interp.realm, &promise, arg(args, 0))?;
        Ok(JsValue::Object(promise))
    });

    constructor(realm, "Promise", promise_ctor, proto);
}

/// A fresh pending promise object.
pub(crate) fn new_promise(realm: &RealmRef) -> JsObjectRef {
    let proto = realm.borrow().intrinsics.promise_prototype.clone();
    let mut obj = JsObject::with_prototype(Some(proto));
    obj.exotic = ExoticObject::Promise(Rc::new(RefCell::new(PromiseState {
        status: PromiseStatus::Pending,
        result: None,
        reactions: Vec::new(),
        handled: false,
    })));
    obj.into_ref()
}

fn this_promise(this: &JsValue) -> Result<JsObjectRef, EngineError> {
    match this.as_object() {
        Some(obj) if matches!(obj.borrow().exotic, ExoticObject::Promise(_)) => Ok(obj.clone()),
        _ => Err(EngineError::type_error("receiver is not a promise")),
    }
}

fn state_of(promise: &JsObjectRef) -> Rc<RefCell<PromiseState>> {
    match &promise.borrow().exotic {
        ExoticObject::Promise(state) => state.clone(),
        _ => unreachable!("settled a non-promise"),
    }
}

fn callable_or_none(value: JsValue) -> Option<JsValue> {
    if value.is_callable() {
        Some(value)
    } else {
        None
    }
}

/// The per-promise `resolve`/`reject` closure pair handed to executors.
fn settle_functions(realm: &RealmRef, promise: &JsObjectRef) -> (JsObjectRef, JsObjectRef) {
    let intrinsics = realm.borrow().intrinsics.clone();
    let resolve = {
        let target = promise.clone();
        native(&intrinsics, "resolve", false, move |interp, _, args| {
            resolve_value(&interp.realm, &target, arg(args, 0))?;
            Ok(JsValue::Undefined)
        })
    };
    let reject = {
        let target = promise.clone();
        native(&intrinsics, "reject", false, move |interp, _, args| {
            settle_reject(&interp.realm, &target, arg(args, 0))?;
            Ok(JsValue::Undefined)
        })
    };
    (resolve, reject)
}

/// Attach a reaction: queued immediately against a settled promise, stored
/// for later otherwise. Attaching any rejection path marks the promise
/// handled and clears it from the realm's unhandled list.
fn register_reaction(
    realm: &RealmRef,
    promise: &JsObjectRef,
    reaction: PromiseReaction,
) -> Result<(), EngineError> {
    let state = state_of(promise);
    {
        let mut state_ref = state.borrow_mut();
        if !state_ref.handled {
            state_ref.handled = true;
            realm
                .borrow_mut()
                .unhandled_rejections
                .retain(|(p, _)| !Rc::ptr_eq(p, promise));
        }
    }
    let settled = {
        let state_ref = state.borrow();
        match state_ref.status {
            PromiseStatus::Pending => None,
            status => Some((status, state_ref.result.clone().unwrap_or_default())),
        }
    };
    match settled {
        None => {
            state.borrow_mut().reactions.push(reaction);
            Ok(())
        }
        Some((status, argument)) => enqueue_microtask(
            realm,
            Job::Reaction {
                reaction,
                argument,
                fulfilled: status == PromiseStatus::Fulfilled,
            },
        ),
    }
}

/// Resolve: adopt thenables (including other promises), fulfill otherwise.
pub fn resolve_value(
    realm: &RealmRef,
    promise: &JsObjectRef,
    value: JsValue,
) -> Result<(), EngineError> {
    if let JsValue::Object(obj) = &value {
        if Rc::ptr_eq(obj, promise) {
            let error = make_type_error(realm, "cannot resolve a promise with itself");
            return settle_reject(realm, promise, error);
        }
        if matches!(obj.borrow().exotic, ExoticObject::Promise(_)) {
            // Adopt: a handler-less reaction forwards the source's
            // settlement into this promise.
            return register_reaction(
                realm,
                obj,
                PromiseReaction {
                    on_fulfilled: None,
                    on_rejected: None,
                    derived: promise.clone(),
                },
            );
        }
    }
    settle(realm, promise, value, PromiseStatus::Fulfilled)
}

/// Reject with the given value, recording it as unhandled until a handler
/// attaches.
pub fn settle_reject(
    realm: &RealmRef,
    promise: &JsObjectRef,
    value: JsValue,
) -> Result<(), EngineError> {
    settle(realm, promise, value, PromiseStatus::Rejected)
}

fn settle(
    realm: &RealmRef,
    promise: &JsObjectRef,
    value: JsValue,
    status: PromiseStatus,
) -> Result<(), EngineError> {
    let state = state_of(promise);
    let reactions = {
        let mut state_ref = state.borrow_mut();
        // First settlement wins; later calls are no-ops.
        if state_ref.status != PromiseStatus::Pending {
            return Ok(());
        }
        state_ref.status = status;
        state_ref.result = Some(value.clone());
        std::mem::take(&mut state_ref.reactions)
    };
    if status == PromiseStatus::Rejected && !state.borrow().handled {
        realm
            .borrow_mut()
            .unhandled_rejections
            .push((promise.clone(), value.clone()));
    }
    let fulfilled = status == PromiseStatus::Fulfilled;
    for reaction in reactions {
        enqueue_microtask(
            realm,
            Job::Reaction {
                reaction,
                argument: value.clone(),
                fulfilled,
            },
        )?;
    }
    Ok(())
}

fn make_type_error(realm: &RealmRef, message: &str) -> JsValue {
    let interp = Interpreter::new(realm.clone());
    JsValue::Object(interp.new_error("TypeError", message))
}
