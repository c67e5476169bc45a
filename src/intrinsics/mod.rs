//! Intrinsic objects and native function plumbing.
//!
//! The illustrative tier: enough of `Object`, `Array`, `String.prototype`,
//! `Set`/`Map`, error constructors and `Promise` to exercise the property
//! protocol and the scheduler. Each submodule installs its piece onto a
//! fresh realm's prototypes and global object.

pub mod array;
pub mod collections;
pub mod global;
pub mod object;
pub mod promise;

use std::rc::Rc;

use crate::error::EngineError;
use crate::interpreter::Interpreter;
use crate::realm::RealmRef;
use crate::value::{
    ExoticObject, JsFunction, JsObject, JsObjectRef, JsString, JsValue, NativeFunction,
    PropertyDescriptor, PropertyKey,
};

/// The per-realm intrinsic prototypes. Cloning is cheap (all `Rc`).
#[derive(Clone)]
pub struct Intrinsics {
    pub object_prototype: JsObjectRef,
    pub function_prototype: JsObjectRef,
    pub array_prototype: JsObjectRef,
    pub string_prototype: JsObjectRef,
    pub number_prototype: JsObjectRef,
    pub boolean_prototype: JsObjectRef,
    pub error_prototype: JsObjectRef,
    pub type_error_prototype: JsObjectRef,
    pub range_error_prototype: JsObjectRef,
    pub reference_error_prototype: JsObjectRef,
    pub syntax_error_prototype: JsObjectRef,
    pub set_prototype: JsObjectRef,
    pub map_prototype: JsObjectRef,
    pub promise_prototype: JsObjectRef,
}

impl Intrinsics {
    /// Bare prototype objects, wired but unpopulated; `install` fills them.
    pub fn new() -> Self {
        let object_prototype = JsObject::new().into_ref();
        let child = || JsObject::with_prototype(Some(object_prototype.clone())).into_ref();
        let error_prototype = child();
        let error_child =
            || JsObject::with_prototype(Some(error_prototype.clone())).into_ref();
        Intrinsics {
            function_prototype: child(),
            array_prototype: child(),
            string_prototype: child(),
            number_prototype: child(),
            boolean_prototype: child(),
            type_error_prototype: error_child(),
            range_error_prototype: error_child(),
            reference_error_prototype: error_child(),
            syntax_error_prototype: error_child(),
            set_prototype: child(),
            map_prototype: child(),
            promise_prototype: child(),
            error_prototype,
            object_prototype,
        }
    }

    pub fn error_prototype_for(&self, class: &str) -> JsObjectRef {
        match class {
            "TypeError" => self.type_error_prototype.clone(),
            "RangeError" => self.range_error_prototype.clone(),
            "ReferenceError" => self.reference_error_prototype.clone(),
            "SyntaxError" => self.syntax_error_prototype.clone(),
            _ => self.error_prototype.clone(),
        }
    }
}

impl Default for Intrinsics {
    fn default() -> Self {
        Intrinsics::new()
    }
}

/// Populate a fresh realm's prototypes and global object.
pub fn install(realm: &RealmRef) {
    object::install(realm);
    array::install(realm);
    global::install(realm);
    collections::install(realm);
    promise::install(realm);
}

/// A native function object.
pub(crate) fn native(
    intrinsics: &Intrinsics,
    name: &str,
    constructable: bool,
    f: impl Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, EngineError> + 'static,
) -> JsObjectRef {
    let mut obj = JsObject::with_prototype(Some(intrinsics.function_prototype.clone()));
    obj.exotic = ExoticObject::Function(JsFunction::Native(NativeFunction {
        name: JsString::from(name),
        func: Rc::new(f),
        constructable,
    }));
    obj.insert(
        PropertyKey::from("name"),
        PropertyDescriptor::data_with(JsValue::from(name), false, false, true),
    );
    obj.into_ref()
}

/// Define a built-in method: writable, non-enumerable, configurable.
pub(crate) fn method(
    target: &JsObjectRef,
    intrinsics: &Intrinsics,
    name: &str,
    f: impl Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, EngineError> + 'static,
) {
    let func = native(intrinsics, name, false, f);
    define(target, name, JsValue::Object(func));
}

/// Define a built-in accessor with a getter only.
pub(crate) fn getter(
    target: &JsObjectRef,
    intrinsics: &Intrinsics,
    name: &str,
    f: impl Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, EngineError> + 'static,
) {
    let func = native(intrinsics, name, false, f);
    target.borrow_mut().insert(
        PropertyKey::from(name),
        PropertyDescriptor::Accessor {
            get: Some(func),
            set: None,
            enumerable: false,
            configurable: true,
        },
    );
}

/// Define a built-in data property: writable, non-enumerable, configurable.
pub(crate) fn define(target: &JsObjectRef, name: &str, value: JsValue) {
    target.borrow_mut().insert(
        PropertyKey::from(name),
        PropertyDescriptor::data_with(value, true, false, true),
    );
}

/// Wire a constructor to its prototype and expose it as a global.
pub(crate) fn constructor(
    realm: &RealmRef,
    name: &str,
    ctor: JsObjectRef,
    prototype: &JsObjectRef,
) {
    ctor.borrow_mut().insert(
        PropertyKey::from("prototype"),
        PropertyDescriptor::data_with(JsValue::Object(prototype.clone()), false, false, false),
    );
    define(prototype, "constructor", JsValue::Object(ctor.clone()));
    let global = realm.borrow().global_object.clone();
    define(&global, name, JsValue::Object(ctor));
}

pub(crate) fn arg(args: &[JsValue], index: usize) -> JsValue {
    args.get(index).cloned().unwrap_or_default()
}
