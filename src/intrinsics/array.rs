//! `Array` and `Array.prototype`.
//!
//! Hole-aware where it matters: `indexOf` skips holes, `includes` and
//! `join` treat them as undefined, `concat` copies them through as holes.

use crate::error::EngineError;
use crate::interpreter::Interpreter;
use crate::realm::RealmRef;
use crate::value::{
    delete_property, ExoticObject, JsObjectRef, JsValue, PropertyDescriptor, PropertyKey,
};

use super::{arg, constructor, method, native};

pub fn install(realm: &RealmRef) {
    let intrinsics = realm.borrow().intrinsics.clone();

    let array_ctor = native(&intrinsics, "Array", true, |interp, _, args| {
        match args {
            [JsValue::Number(n)] => {
                let len = *n as u32;
                if len as f64 != *n {
                    return Err(EngineError::range_error("invalid array length"));
                }
                let arr = interp.new_array(Vec::new());
                set_length(&arr, len);
                Ok(JsValue::Object(arr))
            }
            _ => Ok(JsValue::Object(interp.new_array(args.to_vec()))),
        }
    });
    method(&array_ctor, &intrinsics, "isArray", |_, _, args| {
        Ok(JsValue::Boolean(
            arg(args, 0).as_object().is_some_and(|o| o.borrow().is_array()),
        ))
    });

    let proto = &intrinsics.array_prototype;
    method(proto, &intrinsics, "push", |interp, this, args| {
        let arr = this_array(interp, &this)?;
        let mut len = length_of(&arr);
        for value in args {
            arr.borrow_mut()
                .insert(PropertyKey::Index(len), PropertyDescriptor::data(value.clone()));
            len += 1;
        }
        Ok(JsValue::Number(len as f64))
    });
    method(proto, &intrinsics, "pop", |interp, this, _| {
        let arr = this_array(interp, &this)?;
        let len = length_of(&arr);
        if len == 0 {
            return Ok(JsValue::Undefined);
        }
        let last = PropertyKey::Index(len - 1);
        let value = interp.member_get(&this, &last, Default::default())?;
        delete_property(&arr, &last);
        set_length(&arr, len - 1);
        Ok(value)
    });
    method(proto, &intrinsics, "slice", |interp, this, args| {
        let arr = this_array(interp, &this)?;
        let len = length_of(&arr);
        let start = relative_index(&arg(args, 0), len, 0);
        let end = relative_index(&arg(args, 1), len, len);
        let out = interp.new_array(Vec::new());
        let mut n = 0;
        for i in start..end {
            if arr.borrow().has_own(&PropertyKey::Index(i)) {
                let value = interp.member_get(&this, &PropertyKey::Index(i), Default::default())?;
                out.borrow_mut()
                    .insert(PropertyKey::Index(n), PropertyDescriptor::data(value));
            }
            n += 1;
        }
        set_length(&out, n);
        Ok(JsValue::Object(out))
    });
    method(proto, &intrinsics, "concat", |interp, this, args| {
        let arr = this_array(interp, &this)?;
        let out = interp.new_array(Vec::new());
        let mut n = 0;
        concat_append(interp, &arr, &out, &mut n)?;
        for item in args {
            match item.as_object() {
                Some(obj) if obj.borrow().is_array() => {
                    let obj = obj.clone();
                    concat_append(interp, &obj, &out, &mut n)?;
                }
                _ => {
                    out.borrow_mut()
                        .insert(PropertyKey::Index(n), PropertyDescriptor::data(item.clone()));
                    n += 1;
                }
            }
        }
        set_length(&out, n);
        Ok(JsValue::Object(out))
    });
    method(proto, &intrinsics, "indexOf", |interp, this, args| {
        let arr = this_array(interp, &this)?;
        let needle = arg(args, 0);
        let len = length_of(&arr);
        for i in 0..len {
            // Holes never match, even against undefined.
            if !arr.borrow().has_own(&PropertyKey::Index(i)) {
                continue;
            }
            let value = interp.member_get(&this, &PropertyKey::Index(i), Default::default())?;
            if value.strict_equals(&needle) {
                return Ok(JsValue::Number(i as f64));
            }
        }
        Ok(JsValue::Number(-1.0))
    });
    method(proto, &intrinsics, "includes", |interp, this, args| {
        let arr = this_array(interp, &this)?;
        let needle = arg(args, 0);
        let len = length_of(&arr);
        for i in 0..len {
            let value = interp.member_get(&this, &PropertyKey::Index(i), Default::default())?;
            if value.same_value_zero(&needle) {
                return Ok(JsValue::Boolean(true));
            }
        }
        Ok(JsValue::Boolean(false))
    });
    method(proto, &intrinsics, "join", |interp, this, args| {
        let arr = this_array(interp, &this)?;
        let separator = match arg(args, 0) {
            JsValue::Undefined => ",".to_string(),
            other => other.to_js_string().as_str().to_string(),
        };
        let len = length_of(&arr);
        let mut out = String::new();
        for i in 0..len {
            if i > 0 {
                out.push_str(&separator);
            }
            let value = interp.member_get(&this, &PropertyKey::Index(i), Default::default())?;
            if !matches!(value, JsValue::Undefined | JsValue::Null) {
                out.push_str(value.to_js_string().as_str());
            }
        }
        Ok(JsValue::from(out))
    });

    constructor(realm, "Array", array_ctor, &intrinsics.array_prototype);
}

fn this_array(_interp: &Interpreter, this: &JsValue) -> Result<JsObjectRef, EngineError> {
    match this.as_object() {
        Some(obj) if obj.borrow().is_array() => Ok(obj.clone()),
        _ => Err(EngineError::type_error("receiver is not an array")),
    }
}

/// Spread one array's elements onto the end of `out`, holes preserved.
fn concat_append(
    interp: &mut Interpreter,
    source: &JsObjectRef,
    out: &JsObjectRef,
    n: &mut u32,
) -> Result<(), EngineError> {
    let len = length_of(source);
    for i in 0..len {
        if source.borrow().has_own(&PropertyKey::Index(i)) {
            let value = interp.member_get(
                &JsValue::Object(source.clone()),
                &PropertyKey::Index(i),
                Default::default(),
            )?;
            out.borrow_mut()
                .insert(PropertyKey::Index(*n), PropertyDescriptor::data(value));
        }
        *n += 1;
    }
    Ok(())
}

fn length_of(arr: &JsObjectRef) -> u32 {
    arr.borrow().array_length().unwrap_or(0)
}

/// Overwrite the exotic length slot. Callers maintain the indexed
/// properties themselves.
fn set_length(arr: &JsObjectRef, len: u32) {
    if let ExoticObject::Array { length, .. } = &mut arr.borrow_mut().exotic {
        *length = len;
    }
}

/// `start`/`end` arguments: negative counts from the end, absent uses
/// the default.
fn relative_index(value: &JsValue, len: u32, default: u32) -> u32 {
    match value {
        JsValue::Undefined => default,
        other => {
            let n = other.to_number();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                (len as f64 + n).max(0.0) as u32
            } else {
                (n as u32).min(len)
            }
        }
    }
}
