//! Global bindings: error constructors, primitive wrappers, `globalThis`
//! and `queueMicrotask`.

use crate::error::EngineError;
use crate::realm::RealmRef;
use crate::task::{enqueue_microtask, Job};
use crate::value::{
    ExoticObject, JsObjectRef, JsValue, PropertyDescriptor, PropertyKey,
};

use super::{arg, constructor, define, method, native, Intrinsics};

pub fn install(realm: &RealmRef) {
    let intrinsics = realm.borrow().intrinsics.clone();
    let global = realm.borrow().global_object.clone();

    define(&global, "globalThis", JsValue::Object(global.clone()));
    define(&global, "undefined", JsValue::Undefined);
    define(&global, "NaN", JsValue::Number(f64::NAN));
    define(&global, "Infinity", JsValue::Number(f64::INFINITY));

    method(&global, &intrinsics, "queueMicrotask", |interp, _, args| {
        let callback = arg(args, 0);
        if !callback.is_callable() {
            return Err(EngineError::type_error(
                "queueMicrotask argument is not callable",
            ));
        }
        enqueue_microtask(
            &interp.realm,
            Job::Callback {
                callback,
                args: Vec::new(),
            },
        )?;
        Ok(JsValue::Undefined)
    });

    install_error_class(realm, &intrinsics, "Error", intrinsics.error_prototype.clone());
    install_error_class(
        realm,
        &intrinsics,
        "TypeError",
        intrinsics.type_error_prototype.clone(),
    );
    install_error_class(
        realm,
        &intrinsics,
        "RangeError",
        intrinsics.range_error_prototype.clone(),
    );
    install_error_class(
        realm,
        &intrinsics,
        "ReferenceError",
        intrinsics.reference_error_prototype.clone(),
    );
    install_error_class(
        realm,
        &intrinsics,
        "SyntaxError",
        intrinsics.syntax_error_prototype.clone(),
    );

    install_string(realm, &intrinsics);
    install_number(realm, &intrinsics);
    install_boolean(realm, &intrinsics);
}

fn install_error_class(
    realm: &RealmRef,
    intrinsics: &Intrinsics,
    name: &'static str,
    prototype: JsObjectRef,
) {
    define(&prototype, "name", JsValue::from(name));
    define(&prototype, "message", JsValue::from(""));
    // Error.prototype inherits toString down to its subclasses.
    if name == "Error" {
        method(&prototype, intrinsics, "toString", |interp, this, _| {
            let name = interp
                .member_get(&this, &PropertyKey::from("name"), Default::default())?
                .to_js_string();
            let message = interp
                .member_get(&this, &PropertyKey::from("message"), Default::default())?
                .to_js_string();
            Ok(if message.as_str().is_empty() {
                JsValue::from(name)
            } else {
                JsValue::from(format!("{name}: {message}"))
            })
        });
    }
    let proto_for_ctor = prototype.clone();
    let ctor = native(intrinsics, name, true, move |_, _, args| {
        let mut obj = crate::value::JsObject::with_prototype(Some(proto_for_ctor.clone()));
        obj.exotic = ExoticObject::Error;
        if let Some(message) = args.first() {
            if !matches!(message, JsValue::Undefined) {
                obj.insert(
                    PropertyKey::from("message"),
                    PropertyDescriptor::data_with(
                        JsValue::from(message.to_js_string()),
                        true,
                        false,
                        true,
                    ),
                );
            }
        }
        Ok(JsValue::Object(obj.into_ref()))
    });
    constructor(realm, name, ctor, &prototype);
}

fn install_string(realm: &RealmRef, intrinsics: &Intrinsics) {
    let proto = &intrinsics.string_prototype;

    method(proto, intrinsics, "indexOf", |_, this, args| {
        let haystack = string_receiver(&this);
        let needle = arg(args, 0).to_js_string();
        Ok(JsValue::Number(
            haystack
                .find(needle.as_str())
                .map(|byte| haystack[..byte].chars().count() as f64)
                .unwrap_or(-1.0),
        ))
    });
    method(proto, intrinsics, "includes", |_, this, args| {
        let haystack = string_receiver(&this);
        let needle = arg(args, 0).to_js_string();
        Ok(JsValue::Boolean(haystack.contains(needle.as_str())))
    });
    method(proto, intrinsics, "slice", |_, this, args| {
        let chars: Vec<char> = string_receiver(&this).chars().collect();
        let len = chars.len();
        let start = string_index(&arg(args, 0), len, 0);
        let end = string_index(&arg(args, 1), len, len);
        let out: String = if start < end {
            chars[start..end].iter().collect()
        } else {
            String::new()
        };
        Ok(JsValue::from(out))
    });
    method(proto, intrinsics, "charAt", |_, this, args| {
        let s = string_receiver(&this);
        let i = arg(args, 0).to_number();
        let out = if i >= 0.0 {
            s.chars().nth(i as usize).map(String::from).unwrap_or_default()
        } else {
            String::new()
        };
        Ok(JsValue::from(out))
    });
    method(proto, intrinsics, "toUpperCase", |_, this, _| {
        Ok(JsValue::from(string_receiver(&this).to_uppercase()))
    });
    method(proto, intrinsics, "toLowerCase", |_, this, _| {
        Ok(JsValue::from(string_receiver(&this).to_lowercase()))
    });
    method(proto, intrinsics, "split", |interp, this, args| {
        let s = string_receiver(&this);
        let parts: Vec<JsValue> = match arg(args, 0) {
            JsValue::Undefined => vec![JsValue::from(s)],
            sep => {
                let sep = sep.to_js_string();
                if sep.as_str().is_empty() {
                    s.chars().map(|c| JsValue::from(c.to_string())).collect()
                } else {
                    s.split(sep.as_str()).map(JsValue::from).collect()
                }
            }
        };
        Ok(JsValue::Object(interp.new_array(parts)))
    });
    method(proto, intrinsics, "trim", |_, this, _| {
        Ok(JsValue::from(string_receiver(&this).trim().to_string()))
    });
    method(proto, intrinsics, "toString", |_, this, _| {
        Ok(JsValue::from(string_receiver(&this)))
    });

    let ctor = native(intrinsics, "String", true, |_, _, args| {
        Ok(match args.first() {
            Some(v) => JsValue::from(v.to_js_string()),
            None => JsValue::from(""),
        })
    });
    constructor(realm, "String", ctor, proto);
}

fn install_number(realm: &RealmRef, intrinsics: &Intrinsics) {
    let proto = &intrinsics.number_prototype;
    method(proto, intrinsics, "toString", |_, this, _| {
        Ok(JsValue::from(number_receiver(&this).to_js_string()))
    });
    method(proto, intrinsics, "toFixed", |_, this, args| {
        let n = number_receiver(&this).to_number();
        let digits = arg(args, 0).to_number();
        if !(0.0..=100.0).contains(&digits) {
            return Err(EngineError::range_error(
                "toFixed digits must be between 0 and 100",
            ));
        }
        Ok(JsValue::from(format!("{:.*}", digits as usize, n)))
    });

    let ctor = native(intrinsics, "Number", true, |_, _, args| {
        Ok(JsValue::Number(match args.first() {
            Some(v) => v.to_number(),
            None => 0.0,
        }))
    });
    define(&ctor, "isInteger", {
        let f = native(intrinsics, "isInteger", false, |_, _, args| {
            Ok(JsValue::Boolean(match arg(args, 0) {
                JsValue::Number(n) => n.is_finite() && n.trunc() == n,
                _ => false,
            }))
        });
        JsValue::Object(f)
    });
    define(&ctor, "isNaN", {
        let f = native(intrinsics, "isNaN", false, |_, _, args| {
            Ok(JsValue::Boolean(
                matches!(arg(args, 0), JsValue::Number(n) if n.is_nan()),
            ))
        });
        JsValue::Object(f)
    });
    constructor(realm, "Number", ctor, proto);
}

fn install_boolean(realm: &RealmRef, intrinsics: &Intrinsics) {
    let proto = &intrinsics.boolean_prototype;
    method(proto, intrinsics, "toString", |_, this, _| {
        Ok(JsValue::from(unbox(&this).to_js_string()))
    });

    let ctor = native(intrinsics, "Boolean", true, |_, _, args| {
        Ok(JsValue::Boolean(arg(args, 0).to_boolean()))
    });
    constructor(realm, "Boolean", ctor, proto);
}

/// Method receivers arrive either as the primitive itself or boxed.
fn unbox(this: &JsValue) -> JsValue {
    match this {
        JsValue::Object(obj) => match &obj.borrow().exotic {
            ExoticObject::Boxed(inner) => inner.clone(),
            _ => this.clone(),
        },
        _ => this.clone(),
    }
}

fn string_receiver(this: &JsValue) -> String {
    unbox(this).to_js_string().as_str().to_string()
}

fn number_receiver(this: &JsValue) -> JsValue {
    unbox(this)
}

fn string_index(value: &JsValue, len: usize, default: usize) -> usize {
    match value {
        JsValue::Undefined => default,
        other => {
            let n = other.to_number();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            }
        }
    }
}
