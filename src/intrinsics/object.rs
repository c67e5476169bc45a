//! `Object` and `Object.prototype`.

use crate::error::EngineError;
use crate::interpreter::Interpreter;
use crate::realm::RealmRef;
use crate::value::{
    define_property, set_prototype, DescriptorSpec, ExoticObject, JsObject, JsObjectRef, JsValue,
    PropertyDescriptor, PropertyKey,
};

use super::{arg, constructor, method, native};

pub fn install(realm: &RealmRef) {
    let intrinsics = realm.borrow().intrinsics.clone();

    let proto = &intrinsics.object_prototype;
    method(proto, &intrinsics, "hasOwnProperty", |interp, this, args| {
        let key = PropertyKey::from_value(&arg(args, 0));
        let obj = require_object(interp, &this)?;
        Ok(JsValue::Boolean(obj.borrow().has_own(&key)))
    });
    method(proto, &intrinsics, "toString", |_, this, _| {
        Ok(JsValue::String(this.to_js_string()))
    });
    method(proto, &intrinsics, "valueOf", |_, this, _| Ok(this));

    let object_ctor = native(&intrinsics, "Object", true, |interp, _, args| {
        let value = arg(args, 0);
        match value {
            JsValue::Undefined | JsValue::Null => {
                Ok(JsValue::Object(interp.new_object()))
            }
            JsValue::Object(_) => Ok(value),
            primitive => {
                let obj = interp.new_object();
                obj.borrow_mut().exotic = ExoticObject::Boxed(primitive);
                Ok(JsValue::Object(obj))
            }
        }
    });

    method(&object_ctor, &intrinsics, "defineProperty", |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let key = PropertyKey::from_value(&arg(args, 1));
        let spec = to_descriptor_spec(interp, &arg(args, 2))?;
        define_property(&target, key, spec)?;
        Ok(JsValue::Object(target))
    });
    method(
        &object_ctor,
        &intrinsics,
        "getOwnPropertyDescriptor",
        |interp, _, args| {
            let target = require_object(interp, &arg(args, 0))?;
            let key = PropertyKey::from_value(&arg(args, 1));
            let desc = target.borrow().get_own(&key);
            match desc {
                Some(desc) => Ok(JsValue::Object(descriptor_to_object(interp, &desc))),
                None => Ok(JsValue::Undefined),
            }
        },
    );
    method(&object_ctor, &intrinsics, "keys", |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let keys: Vec<JsValue> = target
            .borrow()
            .own_enumerable_keys()
            .into_iter()
            .filter(|k| !matches!(k, PropertyKey::Symbol(_)))
            .map(|k| JsValue::from(k.to_string()))
            .collect();
        Ok(JsValue::Object(interp.new_array(keys)))
    });
    method(&object_ctor, &intrinsics, "create", |interp, _, args| {
        let proto = match arg(args, 0) {
            JsValue::Null => None,
            JsValue::Object(p) => Some(p),
            _ => {
                return Err(EngineError::type_error(
                    "Object.create prototype must be an object or null",
                ));
            }
        };
        let obj = JsObject::with_prototype(proto).into_ref();
        if let Some(props) = arg(args, 1).as_object() {
            for key in props.borrow().own_enumerable_keys() {
                let spec_value = interp.member_get(
                    &JsValue::Object(props.clone()),
                    &key,
                    Default::default(),
                )?;
                let spec = to_descriptor_spec(interp, &spec_value)?;
                define_property(&obj, key, spec)?;
            }
        }
        Ok(JsValue::Object(obj))
    });
    method(&object_ctor, &intrinsics, "freeze", |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        freeze(&target);
        Ok(JsValue::Object(target))
    });
    method(&object_ctor, &intrinsics, "isFrozen", |_, _, args| {
        Ok(JsValue::Boolean(match arg(args, 0).as_object() {
            Some(obj) => is_frozen(obj),
            None => true,
        }))
    });
    method(
        &object_ctor,
        &intrinsics,
        "preventExtensions",
        |interp, _, args| {
            let target = require_object(interp, &arg(args, 0))?;
            target.borrow_mut().extensible = false;
            Ok(JsValue::Object(target))
        },
    );
    method(&object_ctor, &intrinsics, "isExtensible", |_, _, args| {
        Ok(JsValue::Boolean(match arg(args, 0).as_object() {
            Some(obj) => obj.borrow().extensible,
            None => false,
        }))
    });
    method(&object_ctor, &intrinsics, "getPrototypeOf", |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let proto = target.borrow().prototype.clone();
        Ok(proto.map(JsValue::Object).unwrap_or(JsValue::Null))
    });
    method(&object_ctor, &intrinsics, "setPrototypeOf", |interp, _, args| {
        let target = require_object(interp, &arg(args, 0))?;
        let proto = match arg(args, 1) {
            JsValue::Null => None,
            JsValue::Object(p) => Some(p),
            _ => {
                return Err(EngineError::type_error(
                    "prototype must be an object or null",
                ));
            }
        };
        set_prototype(&target, proto)?;
        Ok(JsValue::Object(target))
    });

    constructor(realm, "Object", object_ctor, &intrinsics.object_prototype);
}

fn require_object(_interp: &Interpreter, value: &JsValue) -> Result<JsObjectRef, EngineError> {
    value
        .as_object()
        .cloned()
        .ok_or_else(|| EngineError::type_error(format!("{} is not an object", value.to_js_string())))
}

/// Read a duck-typed descriptor object into a partial spec.
pub(crate) fn to_descriptor_spec(
    interp: &mut Interpreter,
    value: &JsValue,
) -> Result<DescriptorSpec, EngineError> {
    let obj = value
        .as_object()
        .ok_or_else(|| EngineError::type_error("property descriptor must be an object"))?
        .clone();
    let mut spec = DescriptorSpec::default();
    let has = |name: &str| crate::value::has_property(&obj, &PropertyKey::from(name));
    let source = JsValue::Object(obj.clone());
    if has("value")? {
        spec.value = Some(interp.member_get(&source, &PropertyKey::from("value"), Default::default())?);
    }
    if has("writable")? {
        spec.writable = Some(
            interp
                .member_get(&source, &PropertyKey::from("writable"), Default::default())?
                .to_boolean(),
        );
    }
    if has("enumerable")? {
        spec.enumerable = Some(
            interp
                .member_get(&source, &PropertyKey::from("enumerable"), Default::default())?
                .to_boolean(),
        );
    }
    if has("configurable")? {
        spec.configurable = Some(
            interp
                .member_get(&source, &PropertyKey::from("configurable"), Default::default())?
                .to_boolean(),
        );
    }
    if has("get")? {
        spec.get = Some(accessor_slot(
            interp.member_get(&source, &PropertyKey::from("get"), Default::default())?,
            "getter",
        )?);
    }
    if has("set")? {
        spec.set = Some(accessor_slot(
            interp.member_get(&source, &PropertyKey::from("set"), Default::default())?,
            "setter",
        )?);
    }
    Ok(spec)
}

fn accessor_slot(value: JsValue, which: &str) -> Result<Option<JsObjectRef>, EngineError> {
    match value {
        JsValue::Undefined => Ok(None),
        JsValue::Object(obj) if obj.borrow().is_callable() => Ok(Some(obj)),
        _ => Err(EngineError::type_error(format!(
            "{which} must be a function or undefined"
        ))),
    }
}

pub(crate) fn descriptor_to_object(
    interp: &Interpreter,
    desc: &PropertyDescriptor,
) -> JsObjectRef {
    let obj = interp.new_object();
    let mut obj_ref = obj.borrow_mut();
    match desc {
        PropertyDescriptor::Data {
            value,
            writable,
            enumerable,
            configurable,
        } => {
            obj_ref.insert(PropertyKey::from("value"), PropertyDescriptor::data(value.clone()));
            obj_ref.insert(
                PropertyKey::from("writable"),
                PropertyDescriptor::data(JsValue::Boolean(*writable)),
            );
            obj_ref.insert(
                PropertyKey::from("enumerable"),
                PropertyDescriptor::data(JsValue::Boolean(*enumerable)),
            );
            obj_ref.insert(
                PropertyKey::from("configurable"),
                PropertyDescriptor::data(JsValue::Boolean(*configurable)),
            );
        }
        PropertyDescriptor::Accessor {
            get,
            set,
            enumerable,
            configurable,
        } => {
            obj_ref.insert(
                PropertyKey::from("get"),
                PropertyDescriptor::data(
                    get.clone().map(JsValue::Object).unwrap_or(JsValue::Undefined),
                ),
            );
            obj_ref.insert(
                PropertyKey::from("set"),
                PropertyDescriptor::data(
                    set.clone().map(JsValue::Object).unwrap_or(JsValue::Undefined),
                ),
            );
            obj_ref.insert(
                PropertyKey::from("enumerable"),
                PropertyDescriptor::data(JsValue::Boolean(*enumerable)),
            );
            obj_ref.insert(
                PropertyKey::from("configurable"),
                PropertyDescriptor::data(JsValue::Boolean(*configurable)),
            );
        }
    }
    drop(obj_ref);
    obj
}

/// Freeze: prevent extensions, lock every own property down.
pub(crate) fn freeze(obj: &JsObjectRef) {
    let mut obj_ref = obj.borrow_mut();
    obj_ref.extensible = false;
    if let ExoticObject::Array {
        length_writable, ..
    } = &mut obj_ref.exotic
    {
        *length_writable = false;
    }
    for (_, desc) in obj_ref.properties.iter_mut() {
        match desc {
            PropertyDescriptor::Data {
                writable,
                configurable,
                ..
            } => {
                *writable = false;
                *configurable = false;
            }
            PropertyDescriptor::Accessor { configurable, .. } => {
                *configurable = false;
            }
        }
    }
}

pub(crate) fn is_frozen(obj: &JsObjectRef) -> bool {
    let obj_ref = obj.borrow();
    if obj_ref.extensible {
        return false;
    }
    if let ExoticObject::Array {
        length_writable, ..
    } = &obj_ref.exotic
    {
        if *length_writable {
            return false;
        }
    }
    obj_ref.properties.values().all(|desc| match desc {
        PropertyDescriptor::Data {
            writable,
            configurable,
            ..
        } => !writable && !configurable,
        PropertyDescriptor::Accessor { configurable, .. } => !configurable,
    })
}
