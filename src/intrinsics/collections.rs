//! `Set` and `Map`, insertion-ordered with SameValueZero key equality.

use crate::error::EngineError;
use crate::realm::RealmRef;
use crate::value::{ExoticObject, JsObject, JsObjectRef, JsValue};

use super::{arg, constructor, getter, method, native, Intrinsics};

pub fn install(realm: &RealmRef) {
    let intrinsics = realm.borrow().intrinsics.clone();
    install_set(realm, &intrinsics);
    install_map(realm, &intrinsics);
}

fn install_set(realm: &RealmRef, intrinsics: &Intrinsics) {
    let proto = &intrinsics.set_prototype;

    method(proto, intrinsics, "add", |_, this, args| {
        let set = this_set(&this)?;
        let value = arg(args, 0);
        let mut set_ref = set.borrow_mut();
        let ExoticObject::Set { entries } = &mut set_ref.exotic else {
            unreachable!()
        };
        if !entries.iter().any(|e| e.same_value_zero(&value)) {
            entries.push(value);
        }
        drop(set_ref);
        Ok(this)
    });
    method(proto, intrinsics, "has", |_, this, args| {
        let set = this_set(&this)?;
        let value = arg(args, 0);
        let set_ref = set.borrow();
        let ExoticObject::Set { entries } = &set_ref.exotic else {
            unreachable!()
        };
        Ok(JsValue::Boolean(
            entries.iter().any(|e| e.same_value_zero(&value)),
        ))
    });
    method(proto, intrinsics, "delete", |_, this, args| {
        let set = this_set(&this)?;
        let value = arg(args, 0);
        let mut set_ref = set.borrow_mut();
        let ExoticObject::Set { entries } = &mut set_ref.exotic else {
            unreachable!()
        };
        match entries.iter().position(|e| e.same_value_zero(&value)) {
            Some(i) => {
                entries.remove(i);
                Ok(JsValue::Boolean(true))
            }
            None => Ok(JsValue::Boolean(false)),
        }
    });
    method(proto, intrinsics, "clear", |_, this, _| {
        let set = this_set(&this)?;
        let mut set_ref = set.borrow_mut();
        let ExoticObject::Set { entries } = &mut set_ref.exotic else {
            unreachable!()
        };
        entries.clear();
        Ok(JsValue::Undefined)
    });
    getter(proto, intrinsics, "size", |_, this, _| {
        let set = this_set(&this)?;
        let set_ref = set.borrow();
        let ExoticObject::Set { entries } = &set_ref.exotic else {
            unreachable!()
        };
        Ok(JsValue::Number(entries.len() as f64))
    });

    let proto_for_ctor = proto.clone();
    let ctor = native(intrinsics, "Set", true, move |interp, _, args| {
        let mut entries = Vec::new();
        if !matches!(arg(args, 0), JsValue::Undefined | JsValue::Null) {
            for item in interp.iterable_items(&arg(args, 0))? {
                if !entries.iter().any(|e: &JsValue| e.same_value_zero(&item)) {
                    entries.push(item);
                }
            }
        }
        let mut obj = JsObject::with_prototype(Some(proto_for_ctor.clone()));
        obj.exotic = ExoticObject::Set { entries };
        Ok(JsValue::Object(obj.into_ref()))
    });
    constructor(realm, "Set", ctor, proto);
}

fn install_map(realm: &RealmRef, intrinsics: &Intrinsics) {
    let proto = &intrinsics.map_prototype;

    method(proto, intrinsics, "set", |_, this, args| {
        let map = this_map(&this)?;
        let key = arg(args, 0);
        let value = arg(args, 1);
        let mut map_ref = map.borrow_mut();
        let ExoticObject::Map { entries } = &mut map_ref.exotic else {
            unreachable!()
        };
        match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
        drop(map_ref);
        Ok(this)
    });
    method(proto, intrinsics, "get", |_, this, args| {
        let map = this_map(&this)?;
        let key = arg(args, 0);
        let map_ref = map.borrow();
        let ExoticObject::Map { entries } = &map_ref.exotic else {
            unreachable!()
        };
        Ok(entries
            .iter()
            .find(|(k, _)| k.same_value_zero(&key))
            .map(|(_, v)| v.clone())
            .unwrap_or(JsValue::Undefined))
    });
    method(proto, intrinsics, "has", |_, this, args| {
        let map = this_map(&this)?;
        let key = arg(args, 0);
        let map_ref = map.borrow();
        let ExoticObject::Map { entries } = &map_ref.exotic else {
            unreachable!()
        };
        Ok(JsValue::Boolean(
            entries.iter().any(|(k, _)| k.same_value_zero(&key)),
        ))
    });
    method(proto, intrinsics, "delete", |_, this, args| {
        let map = this_map(&this)?;
        let key = arg(args, 0);
        let mut map_ref = map.borrow_mut();
        let ExoticObject::Map { entries } = &mut map_ref.exotic else {
            unreachable!()
        };
        match entries.iter().position(|(k, _)| k.same_value_zero(&key)) {
            Some(i) => {
                entries.remove(i);
                Ok(JsValue::Boolean(true))
            }
            None => Ok(JsValue::Boolean(false)),
        }
    });
    method(proto, intrinsics, "clear", |_, this, _| {
        let map = this_map(&this)?;
        let mut map_ref = map.borrow_mut();
        let ExoticObject::Map { entries } = &mut map_ref.exotic else {
            unreachable!()
        };
        entries.clear();
        Ok(JsValue::Undefined)
    });
    getter(proto, intrinsics, "size", |_, this, _| {
        let map = this_map(&this)?;
        let map_ref = map.borrow();
        let ExoticObject::Map { entries } = &map_ref.exotic else {
            unreachable!()
        };
        Ok(JsValue::Number(entries.len() as f64))
    });

    let proto_for_ctor = proto.clone();
    let ctor = native(intrinsics, "Map", true, move |interp, _, args| {
        let mut entries: Vec<(JsValue, JsValue)> = Vec::new();
        if !matches!(arg(args, 0), JsValue::Undefined | JsValue::Null) {
            for item in interp.iterable_items(&arg(args, 0))? {
                let pair = item
                    .as_object()
                    .filter(|o| o.borrow().is_array())
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::type_error("Map entries must be [key, value] pairs")
                    })?;
                let key = interp.member_get(
                    &JsValue::Object(pair.clone()),
                    &crate::value::PropertyKey::Index(0),
                    Default::default(),
                )?;
                let value = interp.member_get(
                    &JsValue::Object(pair),
                    &crate::value::PropertyKey::Index(1),
                    Default::default(),
                )?;
                match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
                    Some(slot) => slot.1 = value,
                    None => entries.push((key, value)),
                }
            }
        }
        let mut obj = JsObject::with_prototype(Some(proto_for_ctor.clone()));
        obj.exotic = ExoticObject::Map { entries };
        Ok(JsValue::Object(obj.into_ref()))
    });
    constructor(realm, "Map", ctor, proto);
}

fn this_set(this: &JsValue) -> Result<JsObjectRef, EngineError> {
    match this.as_object() {
        Some(obj) if matches!(obj.borrow().exotic, ExoticObject::Set { .. }) => Ok(obj.clone()),
        _ => Err(EngineError::type_error("receiver is not a Set")),
    }
}

fn this_map(this: &JsValue) -> Result<JsObjectRef, EngineError> {
    match this.as_object() {
        Some(obj) if matches!(obj.borrow().exotic, ExoticObject::Map { .. }) => Ok(obj.clone()),
        _ => Err(EngineError::type_error("receiver is not a Map")),
    }
}
