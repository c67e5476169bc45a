//! Runtime value representation.
//!
//! The core `JsValue` type, property descriptors and the object property
//! protocol (prototype-chain get/set/define/delete) that the evaluator
//! operates on.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::ast::{BlockStatement, Expression, Pattern, Span};
use crate::environment::ScopeRef;
use crate::error::EngineError;
use crate::module::ModuleRef;

/// Insertion-ordered property table. Enumeration order is part of the
/// language contract, so a plain hash map will not do.
pub type PropertyTable = IndexMap<PropertyKey, PropertyDescriptor, FxBuildHasher>;

/// Trait for types whose clones are O(1) reference-count bumps.
pub trait CheapClone: Clone {
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

impl<T: ?Sized> CheapClone for Rc<T> {}

/// A runtime value.
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
}

/// Reference to a heap-allocated object. Objects live for as long as any
/// scope, value or module references them; the host's memory management
/// reclaims them with the realm.
pub type JsObjectRef = Rc<RefCell<JsObject>>;

impl JsValue {
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Structural runtime-type tag (the `typeof` operator).
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object", // historical quirk
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// ToBoolean.
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) => true,
            JsValue::Object(_) => true,
        }
    }

    /// ToNumber. Arrays coerce through their element count: empty → 0, a
    /// single element → that element's numeric coercion, otherwise NaN.
    /// Any other object-like value is NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(true) => 1.0,
            JsValue::Boolean(false) => 0.0,
            JsValue::Number(n) => *n,
            JsValue::String(s) => {
                let trimmed = s.as_str().trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            JsValue::Symbol(_) => f64::NAN,
            JsValue::Object(obj) => {
                let single = {
                    let obj_ref = obj.borrow();
                    match &obj_ref.exotic {
                        ExoticObject::Array { length, .. } if *length == 0 => return 0.0,
                        ExoticObject::Array { length, .. } if *length == 1 => {
                            match obj_ref.get_own(&PropertyKey::Index(0)) {
                                Some(PropertyDescriptor::Data { value, .. }) => {
                                    Some(value.clone())
                                }
                                _ => return f64::NAN,
                            }
                        }
                        ExoticObject::Boxed(inner) => Some(inner.clone()),
                        _ => None,
                    }
                };
                match single {
                    // One level of recursion; a nested single-element array
                    // of objects bottoms out at NaN.
                    Some(JsValue::Object(_)) => f64::NAN,
                    Some(inner) => inner.to_number(),
                    None => f64::NAN,
                }
            }
        }
    }

    /// ToString.
    pub fn to_js_string(&self) -> JsString {
        match self {
            JsValue::Undefined => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(true) => JsString::from("true"),
            JsValue::Boolean(false) => JsString::from("false"),
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            JsValue::String(s) => s.clone(),
            JsValue::Symbol(s) => match &s.description {
                Some(desc) => JsString::from(format!("Symbol({desc})")),
                None => JsString::from("Symbol()"),
            },
            JsValue::Object(obj) => object_to_string(obj),
        }
    }

    /// Strict equality (`===`): identical runtime-type tags, scalars by
    /// coerced value, objects by reference.
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => !a.is_nan() && !b.is_nan() && a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Abstract equality (`==`): null and undefined match each other; if
    /// both sides are non-nullish and at least one is numeric, compare
    /// through numeric coercion; two primitive scalars compare by coerced
    /// value; everything else compares by reference.
    pub fn loose_equals(&self, other: &JsValue) -> bool {
        if self.is_null_or_undefined() || other.is_null_or_undefined() {
            return self.is_null_or_undefined() && other.is_null_or_undefined();
        }
        let numeric = |v: &JsValue| matches!(v, JsValue::Number(_) | JsValue::Boolean(_));
        if numeric(self) || numeric(other) {
            let (a, b) = (self.to_number(), other.to_number());
            return !a.is_nan() && !b.is_nan() && a == b;
        }
        match (self, other) {
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            _ => self.strict_equals(other),
        }
    }

    /// SameValueZero, used by Set/Map membership (NaN matches NaN).
    pub fn same_value_zero(&self, other: &JsValue) -> bool {
        if let (JsValue::Number(a), JsValue::Number(b)) = (self, other) {
            if a.is_nan() && b.is_nan() {
                return true;
            }
        }
        self.strict_equals(other)
    }

    /// SameValue, used by descriptor compatibility checks (NaN matches NaN,
    /// +0 and -0 differ).
    pub fn same_value(&self, other: &JsValue) -> bool {
        if let (JsValue::Number(a), JsValue::Number(b)) = (self, other) {
            if a.is_nan() && b.is_nan() {
                return true;
            }
            if *a == 0.0 && *b == 0.0 {
                return a.is_sign_negative() == b.is_sign_negative();
            }
        }
        self.strict_equals(other)
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        // Integral magnitudes past i64 still print full digits.
        format!("{n}")
    }
}

fn object_to_string(obj: &JsObjectRef) -> JsString {
    enum Kind {
        Array(Vec<JsValue>),
        Function(Option<JsString>),
        Error(JsValue, JsValue),
        Boxed(JsValue),
        Other,
    }
    let kind = {
        let obj_ref = obj.borrow();
        match &obj_ref.exotic {
            ExoticObject::Array { length, .. } => {
                let mut elems = Vec::with_capacity(*length as usize);
                for i in 0..*length {
                    match obj_ref.get_own(&PropertyKey::Index(i)) {
                        Some(PropertyDescriptor::Data { value, .. }) => elems.push(value.clone()),
                        _ => elems.push(JsValue::Undefined),
                    }
                }
                Kind::Array(elems)
            }
            ExoticObject::Function(f) => Kind::Function(f.name()),
            ExoticObject::Error => {
                let name = obj_ref
                    .get_own(&PropertyKey::from("name"))
                    .and_then(PropertyDescriptor::data_value)
                    .unwrap_or(JsValue::String(JsString::from("Error")));
                let message = obj_ref
                    .get_own(&PropertyKey::from("message"))
                    .and_then(PropertyDescriptor::data_value)
                    .unwrap_or(JsValue::String(JsString::from("")));
                Kind::Error(name, message)
            }
            ExoticObject::Boxed(inner) => Kind::Boxed(inner.clone()),
            _ => Kind::Other,
        }
    };
    match kind {
        Kind::Array(elems) => {
            let parts: Vec<String> = elems
                .iter()
                .map(|v| {
                    if v.is_null_or_undefined() {
                        String::new()
                    } else {
                        v.to_js_string().as_str().to_string()
                    }
                })
                .collect();
            JsString::from(parts.join(","))
        }
        Kind::Function(name) => match name {
            Some(n) => JsString::from(format!("function {n}() {{ [native or interpreted] }}")),
            None => JsString::from("function () { [native or interpreted] }"),
        },
        Kind::Error(name, message) => {
            let msg = message.to_js_string();
            if msg.is_empty() {
                name.to_js_string()
            } else {
                JsString::from(format!("{}: {}", name.to_js_string(), msg))
            }
        }
        Kind::Boxed(inner) => inner.to_js_string(),
        Kind::Other => JsString::from("[object Object]"),
    }
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{b}"),
            JsValue::Number(n) => write!(f, "{n}"),
            JsValue::String(s) => write!(f, "{s:?}"),
            JsValue::Symbol(s) => match &s.description {
                Some(desc) => write!(f, "Symbol({desc})"),
                None => write!(f, "Symbol()"),
            },
            JsValue::Object(obj) => {
                let obj_ref = obj.borrow();
                match &obj_ref.exotic {
                    ExoticObject::Ordinary => write!(f, "{{...}}"),
                    ExoticObject::Array { length, .. } => write!(f, "[array {length}]"),
                    ExoticObject::Function(func) => match func.name() {
                        Some(name) => write!(f, "[Function: {name}]"),
                        None => write!(f, "[Function (anonymous)]"),
                    },
                    ExoticObject::Set { entries } => write!(f, "Set({})", entries.len()),
                    ExoticObject::Map { entries } => write!(f, "Map({})", entries.len()),
                    ExoticObject::Error => write!(f, "[Error]"),
                    ExoticObject::Boxed(inner) => write!(f, "[boxed {inner:?}]"),
                    ExoticObject::Namespace(_) => write!(f, "[Module]"),
                    ExoticObject::Promise(state) => {
                        write!(f, "Promise {{{:?}}}", state.borrow().status)
                    }
                }
            }
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

/// Reference-counted immutable string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct JsString(Rc<str>);

impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique symbol, optionally carrying a description.
#[derive(Clone, Debug)]
pub struct JsSymbol {
    id: u64,
    pub description: Option<String>,
}

impl JsSymbol {
    pub fn new(id: u64, description: Option<String>) -> Self {
        Self { id, description }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Property key: string, canonical array index, or symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
    Symbol(JsSymbol),
}

impl PropertyKey {
    /// Key for a computed property access. Canonical non-negative integers
    /// become index keys; everything else is stringified.
    pub fn from_value(value: &JsValue) -> Self {
        match value {
            JsValue::Number(n) => {
                let idx = *n as u32;
                if idx as f64 == *n && n.is_sign_positive() {
                    PropertyKey::Index(idx)
                } else {
                    PropertyKey::String(value.to_js_string())
                }
            }
            JsValue::String(s) => PropertyKey::from(s.as_str()),
            JsValue::Symbol(s) => PropertyKey::Symbol(s.clone()),
            _ => PropertyKey::String(value.to_js_string()),
        }
    }

    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        if let Some(first) = s.bytes().next() {
            if first.is_ascii_digit() {
                if let Ok(idx) = s.parse::<u32>() {
                    // Canonical form only (no leading zeros except "0")
                    if idx.to_string() == s {
                        return PropertyKey::Index(idx);
                    }
                }
            }
        }
        PropertyKey::String(JsString::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::from(s.as_str())
    }
}

impl From<u32> for PropertyKey {
    fn from(idx: u32) -> Self {
        PropertyKey::Index(idx)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{s}"),
            PropertyKey::Index(i) => write!(f, "{i}"),
            PropertyKey::Symbol(s) => match &s.description {
                Some(desc) => write!(f, "Symbol({desc})"),
                None => write!(f, "Symbol()"),
            },
        }
    }
}

/// A property descriptor: either data or accessor, never both. The invalid
/// simultaneous shape is unrepresentable; `DescriptorSpec` validates the
/// duck-typed form coming from script code.
#[derive(Debug, Clone)]
pub enum PropertyDescriptor {
    Data {
        value: JsValue,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        get: Option<JsObjectRef>,
        set: Option<JsObjectRef>,
        enumerable: bool,
        configurable: bool,
    },
}

impl PropertyDescriptor {
    /// Assignment-path data property: writable, enumerable, configurable.
    pub fn data(value: JsValue) -> Self {
        PropertyDescriptor::Data {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn data_with(value: JsValue, writable: bool, enumerable: bool, configurable: bool) -> Self {
        PropertyDescriptor::Data {
            value,
            writable,
            enumerable,
            configurable,
        }
    }

    pub fn accessor(get: Option<JsObjectRef>, set: Option<JsObjectRef>) -> Self {
        PropertyDescriptor::Accessor {
            get,
            set,
            enumerable: true,
            configurable: true,
        }
    }

    pub fn enumerable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { enumerable, .. }
            | PropertyDescriptor::Accessor { enumerable, .. } => *enumerable,
        }
    }

    pub fn configurable(&self) -> bool {
        match self {
            PropertyDescriptor::Data { configurable, .. }
            | PropertyDescriptor::Accessor { configurable, .. } => *configurable,
        }
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, PropertyDescriptor::Accessor { .. })
    }

    /// The value of a data descriptor, if this is one.
    pub fn data_value(self) -> Option<JsValue> {
        match self {
            PropertyDescriptor::Data { value, .. } => Some(value),
            PropertyDescriptor::Accessor { .. } => None,
        }
    }
}

/// The duck-typed descriptor shape accepted by the define path, with every
/// field optional. Construction validates that data and accessor fields are
/// not mixed.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSpec {
    pub value: Option<JsValue>,
    pub writable: Option<bool>,
    pub get: Option<Option<JsObjectRef>>,
    pub set: Option<Option<JsObjectRef>>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
}

impl DescriptorSpec {
    pub fn validate(&self) -> Result<(), EngineError> {
        let has_data = self.value.is_some() || self.writable.is_some();
        let has_accessor = self.get.is_some() || self.set.is_some();
        if has_data && has_accessor {
            return Err(EngineError::type_error(
                "property descriptor cannot be both a data and an accessor descriptor",
            ));
        }
        Ok(())
    }

    pub fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub fn from_descriptor(desc: &PropertyDescriptor) -> Self {
        match desc {
            PropertyDescriptor::Data {
                value,
                writable,
                enumerable,
                configurable,
            } => DescriptorSpec {
                value: Some(value.clone()),
                writable: Some(*writable),
                get: None,
                set: None,
                enumerable: Some(*enumerable),
                configurable: Some(*configurable),
            },
            PropertyDescriptor::Accessor {
                get,
                set,
                enumerable,
                configurable,
            } => DescriptorSpec {
                value: None,
                writable: None,
                get: Some(get.clone()),
                set: Some(set.clone()),
                enumerable: Some(*enumerable),
                configurable: Some(*configurable),
            },
        }
    }

    /// Complete this spec against generic-define defaults (everything
    /// false/undefined when unspecified).
    fn complete(&self) -> PropertyDescriptor {
        if self.is_accessor() {
            PropertyDescriptor::Accessor {
                get: self.get.clone().unwrap_or(None),
                set: self.set.clone().unwrap_or(None),
                enumerable: self.enumerable.unwrap_or(false),
                configurable: self.configurable.unwrap_or(false),
            }
        } else {
            PropertyDescriptor::Data {
                value: self.value.clone().unwrap_or(JsValue::Undefined),
                writable: self.writable.unwrap_or(false),
                enumerable: self.enumerable.unwrap_or(false),
                configurable: self.configurable.unwrap_or(false),
            }
        }
    }

    /// Merge this partial spec over an existing descriptor.
    fn merge_over(&self, existing: &PropertyDescriptor) -> PropertyDescriptor {
        if self.is_accessor() || (existing.is_accessor() && !self.has_data_fields()) {
            let (old_get, old_set) = match existing {
                PropertyDescriptor::Accessor { get, set, .. } => (get.clone(), set.clone()),
                PropertyDescriptor::Data { .. } => (None, None),
            };
            PropertyDescriptor::Accessor {
                get: self.get.clone().unwrap_or(old_get),
                set: self.set.clone().unwrap_or(old_set),
                enumerable: self.enumerable.unwrap_or(existing.enumerable()),
                configurable: self.configurable.unwrap_or(existing.configurable()),
            }
        } else {
            let (old_value, old_writable) = match existing {
                PropertyDescriptor::Data {
                    value, writable, ..
                } => (value.clone(), *writable),
                PropertyDescriptor::Accessor { .. } => (JsValue::Undefined, false),
            };
            PropertyDescriptor::Data {
                value: self.value.clone().unwrap_or(old_value),
                writable: self.writable.unwrap_or(old_writable),
                enumerable: self.enumerable.unwrap_or(existing.enumerable()),
                configurable: self.configurable.unwrap_or(existing.configurable()),
            }
        }
    }

    fn has_data_fields(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }
}

/// Exotic object behavior.
#[derive(Debug)]
pub enum ExoticObject {
    Ordinary,
    Array { length: u32, length_writable: bool },
    Function(JsFunction),
    Set { entries: Vec<JsValue> },
    Map { entries: Vec<(JsValue, JsValue)> },
    Error,
    /// Wrapper object around a primitive (`new Boolean(x)` and friends,
    /// and the transient box used for property access on primitives).
    Boxed(JsValue),
    /// Live read-only view over a module's exported bindings.
    Namespace(ModuleRef),
    Promise(Rc<RefCell<PromiseState>>),
}

/// Promise internal state.
#[derive(Debug)]
pub struct PromiseState {
    pub status: PromiseStatus,
    pub result: Option<JsValue>,
    pub reactions: Vec<PromiseReaction>,
    /// A rejection handler was attached at some point.
    pub handled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseStatus {
    Pending,
    Fulfilled,
    Rejected,
}

/// Handler pair registered via `then`/`catch`, with the derived promise the
/// registration produced.
#[derive(Debug, Clone)]
pub struct PromiseReaction {
    pub on_fulfilled: Option<JsValue>,
    pub on_rejected: Option<JsValue>,
    pub derived: JsObjectRef,
}

/// Function representation.
#[derive(Clone)]
pub enum JsFunction {
    Interpreted(InterpretedFunction),
    Native(NativeFunction),
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsFunction::Interpreted(func) => f
                .debug_struct("Interpreted")
                .field("name", &func.name)
                .finish_non_exhaustive(),
            JsFunction::Native(func) => f
                .debug_struct("Native")
                .field("name", &func.name)
                .finish_non_exhaustive(),
        }
    }
}

impl JsFunction {
    pub fn name(&self) -> Option<JsString> {
        match self {
            JsFunction::Interpreted(f) => f.name.clone(),
            JsFunction::Native(f) => Some(f.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Arrow,
    Method,
    Constructor,
    Getter,
    Setter,
}

/// A function defined by evaluated code. Closures keep a durable reference
/// to the captured lexical environment.
#[derive(Clone)]
pub struct InterpretedFunction {
    pub name: Option<JsString>,
    pub params: Rc<[Pattern]>,
    pub body: Rc<FunctionBody>,
    pub closure: ScopeRef,
    pub kind: FunctionKind,
    /// Arrows capture `this` at creation instead of binding their own.
    pub captured_this: Option<Box<JsValue>>,
    /// Parent constructor for derived-class constructors (`super(...)`).
    pub super_constructor: Option<JsObjectRef>,
    pub strict: bool,
    pub span: Span,
}

#[derive(Debug)]
pub enum FunctionBody {
    Block(BlockStatement),
    Expression(Expression),
}

/// Native function signature. `Rc<dyn Fn>` so natives that close over
/// engine state (promise resolvers, bound helpers) share one representation
/// with plain functions.
pub type NativeFn = Rc<
    dyn Fn(
        &mut crate::interpreter::Interpreter,
        JsValue,
        &[JsValue],
    ) -> Result<JsValue, EngineError>,
>;

#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub func: NativeFn,
    /// Whether `new` may be applied to this function.
    pub constructable: bool,
}

/// A runtime object: prototype link, extensibility flag, insertion-ordered
/// own-property table and exotic behavior.
#[derive(Debug)]
pub struct JsObject {
    pub prototype: Option<JsObjectRef>,
    pub extensible: bool,
    pub properties: PropertyTable,
    pub exotic: ExoticObject,
}

impl JsObject {
    pub fn new() -> Self {
        Self {
            prototype: None,
            extensible: true,
            properties: PropertyTable::default(),
            exotic: ExoticObject::Ordinary,
        }
    }

    pub fn with_prototype(prototype: Option<JsObjectRef>) -> Self {
        Self {
            prototype,
            extensible: true,
            properties: PropertyTable::default(),
            exotic: ExoticObject::Ordinary,
        }
    }

    pub fn into_ref(self) -> JsObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.exotic, ExoticObject::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.exotic, ExoticObject::Array { .. })
    }

    pub fn array_length(&self) -> Option<u32> {
        match &self.exotic {
            ExoticObject::Array { length, .. } => Some(*length),
            _ => None,
        }
    }

    /// Own-property lookup; never walks the prototype. The array `length`
    /// property is synthesized from the exotic slot.
    pub fn get_own(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        if let ExoticObject::Array {
            length,
            length_writable,
        } = &self.exotic
        {
            if matches!(key, PropertyKey::String(s) if s == "length") {
                return Some(PropertyDescriptor::Data {
                    value: JsValue::Number(*length as f64),
                    writable: *length_writable,
                    enumerable: false,
                    configurable: false,
                });
            }
        }
        self.properties.get(key).cloned()
    }

    pub fn has_own(&self, key: &PropertyKey) -> bool {
        if self.is_array() {
            if matches!(key, PropertyKey::String(s) if s == "length") {
                return true;
            }
        }
        self.properties.contains_key(key)
    }

    /// Raw insert used during object construction and intrinsic setup;
    /// bypasses descriptor validation.
    pub fn insert(&mut self, key: PropertyKey, descriptor: PropertyDescriptor) {
        if let ExoticObject::Array { length, .. } = &mut self.exotic {
            if let PropertyKey::Index(i) = key {
                if i >= *length {
                    *length = i + 1;
                }
            }
        }
        self.properties.insert(key, descriptor);
    }

    /// Own property keys in insertion order; arrays report `length` last.
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        let mut keys: Vec<PropertyKey> = self.properties.keys().cloned().collect();
        if self.is_array() {
            keys.push(PropertyKey::String(JsString::from("length")));
        }
        keys
    }

    /// Own enumerable string-ish keys, for `Object.keys` and enumeration.
    pub fn own_enumerable_keys(&self) -> Vec<PropertyKey> {
        self.properties
            .iter()
            .filter(|(k, d)| !matches!(k, PropertyKey::Symbol(_)) && d.enumerable())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Property protocol: prototype-chain operations
// ═══════════════════════════════════════════════════════════════════════════

/// Prototype chains are required to be acyclic; walks are depth-guarded so a
/// violated invariant fails instead of spinning.
const MAX_PROTOTYPE_DEPTH: usize = 10_000;

/// Result of a property read before any accessor is invoked. The caller is
/// responsible for calling the getter with `this` bound to the original
/// receiver.
pub enum GetOutcome {
    Value(JsValue),
    Getter(JsObjectRef),
    Absent,
}

/// Result of a property write before any accessor is invoked.
pub enum SetOutcome {
    Done,
    Setter(JsObjectRef),
    /// Write refused (non-writable data property, or setter-less accessor).
    /// Silent no-op in sloppy mode, TypeError in strict mode; the caller
    /// decides.
    Refused,
}

/// Walk the prototype chain for a descriptor. Returns the descriptor and the
/// object that owns it.
pub fn get_property_descriptor(
    obj: &JsObjectRef,
    key: &PropertyKey,
) -> Result<Option<(PropertyDescriptor, JsObjectRef)>, EngineError> {
    let mut current = obj.clone();
    for _ in 0..MAX_PROTOTYPE_DEPTH {
        let next = {
            let current_ref = current.borrow();
            if let Some(desc) = current_ref.get_own(key) {
                drop(current_ref);
                return Ok(Some((desc, current.clone())));
            }
            current_ref.prototype.clone()
        };
        match next {
            Some(proto) => current = proto,
            None => return Ok(None),
        }
    }
    Err(EngineError::internal(
        "prototype chain exceeded maximum depth (cycle?)",
    ))
}

/// `get(key)` up to accessor invocation. Module namespaces resolve live
/// binding values here.
pub fn get_property(obj: &JsObjectRef, key: &PropertyKey) -> Result<GetOutcome, EngineError> {
    let namespace_module = match &obj.borrow().exotic {
        ExoticObject::Namespace(module) => Some(module.clone()),
        _ => None,
    };
    if let Some(module) = namespace_module {
        if let PropertyKey::String(name) = key {
            return match crate::module::namespace_get(&module, name.as_str())? {
                Some(value) => Ok(GetOutcome::Value(value)),
                None => Ok(GetOutcome::Absent),
            };
        }
        return Ok(GetOutcome::Absent);
    }
    match get_property_descriptor(obj, key)? {
        Some((PropertyDescriptor::Data { value, .. }, _)) => Ok(GetOutcome::Value(value)),
        Some((PropertyDescriptor::Accessor { get, .. }, _)) => match get {
            Some(getter) => Ok(GetOutcome::Getter(getter)),
            None => Ok(GetOutcome::Value(JsValue::Undefined)),
        },
        None => Ok(GetOutcome::Absent),
    }
}

/// `set(key, value)` up to accessor invocation. An own accessor with a
/// setter wins; an own writable data property updates in place; an inherited
/// setter is surfaced for invocation; an inherited writable data property
/// shadows by creating a new own property; otherwise the write is refused.
pub fn set_property(
    obj: &JsObjectRef,
    key: &PropertyKey,
    value: JsValue,
) -> Result<SetOutcome, EngineError> {
    // Own property first
    let own = obj.borrow().get_own(key);
    if let Some(desc) = own {
        return match desc {
            PropertyDescriptor::Accessor { set: Some(s), .. } => Ok(SetOutcome::Setter(s)),
            PropertyDescriptor::Accessor { set: None, .. } => Ok(SetOutcome::Refused),
            PropertyDescriptor::Data { writable: true, .. } => {
                write_own_data(obj, key, value)?;
                Ok(SetOutcome::Done)
            }
            PropertyDescriptor::Data {
                writable: false, ..
            } => Ok(SetOutcome::Refused),
        };
    }

    // Inherited
    let inherited = {
        let proto = obj.borrow().prototype.clone();
        match proto {
            Some(proto) => get_property_descriptor(&proto, key)?,
            None => None,
        }
    };
    match inherited {
        Some((PropertyDescriptor::Accessor { set: Some(s), .. }, _)) => Ok(SetOutcome::Setter(s)),
        Some((PropertyDescriptor::Accessor { set: None, .. }, _)) => Ok(SetOutcome::Refused),
        Some((
            PropertyDescriptor::Data {
                writable: false, ..
            },
            _,
        )) => Ok(SetOutcome::Refused),
        // Inherited writable data, or absent entirely: create a new own
        // data property (shadowing, never mutating the prototype's slot).
        _ => {
            if !obj.borrow().extensible {
                return Ok(SetOutcome::Refused);
            }
            write_own_data(obj, key, value)?;
            Ok(SetOutcome::Done)
        }
    }
}

/// Create or update an own data property through the assignment path,
/// applying the array length invariants.
fn write_own_data(obj: &JsObjectRef, key: &PropertyKey, value: JsValue) -> Result<(), EngineError> {
    let mut obj_ref = obj.borrow_mut();
    if obj_ref.is_array() {
        if matches!(key, PropertyKey::String(s) if s == "length") {
            let new_len = array_length_from_value(&value)?;
            drop(obj_ref);
            return set_array_length(obj, new_len);
        }
        if let PropertyKey::Index(i) = key {
            if let ExoticObject::Array { length, .. } = &mut obj_ref.exotic {
                if *i >= *length {
                    *length = *i + 1;
                }
            }
        }
    }
    match obj_ref.properties.get_mut(key) {
        Some(PropertyDescriptor::Data {
            value: slot,
            writable: true,
            ..
        }) => {
            *slot = value;
        }
        _ => {
            obj_ref
                .properties
                .insert(key.clone(), PropertyDescriptor::data(value));
        }
    }
    Ok(())
}

fn array_length_from_value(value: &JsValue) -> Result<u32, EngineError> {
    let n = value.to_number();
    let len = n as u32;
    if len as f64 != n {
        return Err(EngineError::range_error("invalid array length"));
    }
    Ok(len)
}

/// Shrinking the length cascade-deletes every indexed property at or beyond
/// the new length, from the old length downward.
fn set_array_length(obj: &JsObjectRef, new_len: u32) -> Result<(), EngineError> {
    let (old_len, writable) = {
        let obj_ref = obj.borrow();
        match &obj_ref.exotic {
            ExoticObject::Array {
                length,
                length_writable,
            } => (*length, *length_writable),
            _ => return Err(EngineError::internal("set_array_length on non-array")),
        }
    };
    if !writable {
        return Ok(()); // refused silently; define path reports the error
    }
    if new_len < old_len {
        let mut obj_ref = obj.borrow_mut();
        for i in (new_len..old_len).rev() {
            obj_ref.properties.shift_remove(&PropertyKey::Index(i));
        }
    }
    if let ExoticObject::Array { length, .. } = &mut obj.borrow_mut().exotic {
        *length = new_len;
    }
    Ok(())
}

/// The generic define path (`Object.defineProperty`). Validates the spec,
/// gates creation on extensibility and redefinition on the
/// non-configurable compatibility rules.
pub fn define_property(
    obj: &JsObjectRef,
    key: PropertyKey,
    spec: DescriptorSpec,
) -> Result<(), EngineError> {
    spec.validate()?;

    // Array length redefinition
    if obj.borrow().is_array() {
        if matches!(&key, PropertyKey::String(s) if s == "length") {
            return define_array_length(obj, &spec);
        }
    }

    let existing = obj.borrow().get_own(&key);
    let new_desc = match existing {
        None => {
            if !obj.borrow().extensible {
                return Err(EngineError::type_error(format!(
                    "cannot define property {key}: object is not extensible"
                )));
            }
            spec.complete()
        }
        Some(existing) => {
            check_redefinition(&existing, &spec, &key)?;
            spec.merge_over(&existing)
        }
    };

    let mut obj_ref = obj.borrow_mut();
    if let ExoticObject::Array { length, .. } = &mut obj_ref.exotic {
        if let PropertyKey::Index(i) = key {
            if i >= *length {
                *length = i + 1;
            }
        }
    }
    obj_ref.properties.insert(key, new_desc);
    Ok(())
}

fn define_array_length(obj: &JsObjectRef, spec: &DescriptorSpec) -> Result<(), EngineError> {
    if spec.is_accessor() {
        return Err(EngineError::type_error(
            "cannot redefine array length as an accessor",
        ));
    }
    if spec.configurable == Some(true) {
        return Err(EngineError::type_error(
            "cannot make array length configurable",
        ));
    }
    if spec.enumerable == Some(true) {
        return Err(EngineError::type_error("cannot make array length enumerable"));
    }
    let (writable_now, old_len) = {
        let obj_ref = obj.borrow();
        match &obj_ref.exotic {
            ExoticObject::Array {
                length,
                length_writable,
            } => (*length_writable, *length),
            _ => return Err(EngineError::internal("array length on non-array")),
        }
    };
    let new_len = match &spec.value {
        Some(v) => array_length_from_value(v)?,
        None => old_len,
    };
    if !writable_now && (new_len != old_len || spec.writable == Some(true)) {
        return Err(EngineError::type_error(
            "cannot redefine non-writable array length",
        ));
    }
    if new_len < old_len {
        let mut obj_ref = obj.borrow_mut();
        for i in (new_len..old_len).rev() {
            obj_ref.properties.shift_remove(&PropertyKey::Index(i));
        }
    }
    let mut obj_ref = obj.borrow_mut();
    if let ExoticObject::Array {
        length,
        length_writable,
    } = &mut obj_ref.exotic
    {
        *length = new_len;
        if spec.writable == Some(false) {
            *length_writable = false;
        }
    }
    Ok(())
}

/// Non-configurable compatibility rules: a redefinition of a
/// non-configurable property must be fully compatible or it fails.
fn check_redefinition(
    existing: &PropertyDescriptor,
    spec: &DescriptorSpec,
    key: &PropertyKey,
) -> Result<(), EngineError> {
    if existing.configurable() {
        return Ok(());
    }
    let reject =
        |why: &str| Err(EngineError::type_error(format!("cannot redefine property {key}: {why}")));

    if spec.configurable == Some(true) {
        return reject("property is non-configurable");
    }
    if let Some(e) = spec.enumerable {
        if e != existing.enumerable() {
            return reject("cannot change enumerability of a non-configurable property");
        }
    }
    match existing {
        PropertyDescriptor::Data {
            value, writable, ..
        } => {
            if spec.is_accessor() {
                return reject("cannot convert a non-configurable data property to an accessor");
            }
            if !*writable {
                if spec.writable == Some(true) {
                    return reject("cannot make a non-writable property writable");
                }
                if let Some(new_value) = &spec.value {
                    if !new_value.same_value(value) {
                        return reject("cannot change the value of a non-writable property");
                    }
                }
            }
        }
        PropertyDescriptor::Accessor { get, set, .. } => {
            if spec.has_data_fields() {
                return reject("cannot convert a non-configurable accessor property to data");
            }
            let same = |old: &Option<JsObjectRef>, new: &Option<Option<JsObjectRef>>| match new {
                None => true,
                Some(new) => match (old, new) {
                    (None, None) => true,
                    (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                    _ => false,
                },
            };
            if !same(get, &spec.get) || !same(set, &spec.set) {
                return reject("cannot change accessors of a non-configurable property");
            }
        }
    }
    Ok(())
}

/// `delete obj[key]`. Returns false without effect for absent or
/// non-configurable properties. Extension-prevention does not by itself
/// make existing configurable properties non-deletable.
pub fn delete_property(obj: &JsObjectRef, key: &PropertyKey) -> bool {
    let mut obj_ref = obj.borrow_mut();
    if obj_ref.is_array() && matches!(key, PropertyKey::String(s) if s == "length") {
        return false;
    }
    match obj_ref.properties.get(key) {
        None => false,
        Some(desc) if desc.configurable() => {
            obj_ref.properties.shift_remove(key);
            true
        }
        Some(_) => false,
    }
}

/// `key in obj` and `Object.prototype.hasOwnProperty`-style checks that
/// need the whole chain.
pub fn has_property(obj: &JsObjectRef, key: &PropertyKey) -> Result<bool, EngineError> {
    if let ExoticObject::Namespace(module) = &obj.borrow().exotic {
        if let PropertyKey::String(name) = key {
            return Ok(crate::module::namespace_has(module, name.as_str()));
        }
        return Ok(false);
    }
    Ok(get_property_descriptor(obj, key)?.is_some())
}

/// Enumerable string keys across the prototype chain, shadow-once, in
/// chain order — the `for (k in obj)` key set.
pub fn enumerate_keys(obj: &JsObjectRef) -> Result<Vec<JsString>, EngineError> {
    let mut seen: Vec<JsString> = Vec::new();
    let mut out: Vec<JsString> = Vec::new();
    let mut current = Some(obj.clone());
    let mut depth = 0usize;
    while let Some(cur) = current {
        depth += 1;
        if depth > MAX_PROTOTYPE_DEPTH {
            return Err(EngineError::internal(
                "prototype chain exceeded maximum depth (cycle?)",
            ));
        }
        let cur_ref = cur.borrow();
        for (key, desc) in cur_ref.properties.iter() {
            let name = match key {
                PropertyKey::String(s) => s.clone(),
                PropertyKey::Index(i) => JsString::from(i.to_string()),
                PropertyKey::Symbol(_) => continue,
            };
            if seen.iter().any(|s| *s == name) {
                continue;
            }
            seen.push(name.clone());
            if desc.enumerable() {
                out.push(name);
            }
        }
        current = cur_ref.prototype.clone();
    }
    Ok(out)
}

/// Replace an object's prototype. Only legal while extensible; walks the
/// would-be chain to refuse cycles.
pub fn set_prototype(obj: &JsObjectRef, proto: Option<JsObjectRef>) -> Result<(), EngineError> {
    if !obj.borrow().extensible {
        return Err(EngineError::type_error(
            "cannot change the prototype of a non-extensible object",
        ));
    }
    let mut cursor = proto.clone();
    let mut depth = 0usize;
    while let Some(p) = cursor {
        if Rc::ptr_eq(&p, obj) {
            return Err(EngineError::type_error("cyclic prototype chain"));
        }
        depth += 1;
        if depth > MAX_PROTOTYPE_DEPTH {
            return Err(EngineError::internal(
                "prototype chain exceeded maximum depth (cycle?)",
            ));
        }
        cursor = p.borrow().prototype.clone();
    }
    obj.borrow_mut().prototype = proto;
    Ok(())
}
