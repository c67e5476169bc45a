//! Environment records and the scope chain.
//!
//! Four record kinds: declarative (blocks, function bodies), function
//! (boundary for `var` hoisting, owns `this`), global (declarative bindings
//! layered over the global object) and module (declarative bindings plus
//! import indirections). Closures keep scopes alive through `Rc`.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::EngineError;
use crate::module::ModuleRef;
use crate::value::{
    GetOutcome, JsObjectRef, JsString, JsValue, PropertyDescriptor, PropertyKey, get_property,
    set_property, SetOutcome,
};

pub type ScopeRef = Rc<RefCell<Scope>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Declarative,
    /// Function body scope: `var` declarations land here, `this` and
    /// `arguments`-like state hang off the frame above.
    Function,
    Global,
    Module,
}

/// One binding slot. Lexical bindings start uninitialized (temporal dead
/// zone); imports are indirections resolved through the source module on
/// every read.
#[derive(Debug, Clone)]
pub enum Binding {
    Value {
        value: JsValue,
        mutable: bool,
        initialized: bool,
    },
    Indirect {
        module: ModuleRef,
        export_name: JsString,
    },
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeRef>,
    bindings: FxHashMap<JsString, Binding>,
    /// Global records only: the object whose properties back `var` and
    /// function declarations at the top level.
    pub backing_object: Option<JsObjectRef>,
}

/// A resolved read. Accessor-backed global properties surface the getter so
/// the evaluator can invoke it with the right receiver.
#[derive(Debug)]
pub enum Resolved {
    Value(JsValue),
    Accessor {
        getter: JsObjectRef,
        receiver: JsValue,
    },
}

/// A resolved write that requires invoking a setter.
#[derive(Debug)]
pub enum WriteOutcome {
    Done,
    Setter {
        setter: JsObjectRef,
        receiver: JsValue,
    },
}

impl Scope {
    pub fn new_declarative(parent: ScopeRef) -> ScopeRef {
        Scope::make(ScopeKind::Declarative, Some(parent), None)
    }

    pub fn new_function(parent: ScopeRef) -> ScopeRef {
        Scope::make(ScopeKind::Function, Some(parent), None)
    }

    pub fn new_global(object: JsObjectRef) -> ScopeRef {
        Scope::make(ScopeKind::Global, None, Some(object))
    }

    pub fn new_module(parent: ScopeRef) -> ScopeRef {
        Scope::make(ScopeKind::Module, Some(parent), None)
    }

    fn make(kind: ScopeKind, parent: Option<ScopeRef>, backing_object: Option<JsObjectRef>) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            kind,
            parent,
            bindings: FxHashMap::default(),
            backing_object,
        }))
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Declare an initialized mutable binding (`var`, parameters, function
    /// declarations). Redeclaration over an existing `var` is a no-op that
    /// keeps the current value.
    pub fn declare_var(&mut self, name: &str, value: JsValue) {
        match self.bindings.get_mut(name) {
            Some(Binding::Value { initialized, .. }) if *initialized => {}
            _ => {
                self.bindings.insert(
                    JsString::from(name),
                    Binding::Value {
                        value,
                        mutable: true,
                        initialized: true,
                    },
                );
            }
        }
    }

    /// Declare an uninitialized lexical binding (`let`/`const`). The slot
    /// exists from here on but reads fail until `initialize` runs.
    pub fn declare_lexical(&mut self, name: &str, mutable: bool) -> Result<(), EngineError> {
        if self.bindings.contains_key(name) {
            return Err(EngineError::syntax(format!(
                "identifier '{name}' has already been declared"
            )));
        }
        self.bindings.insert(
            JsString::from(name),
            Binding::Value {
                value: JsValue::Undefined,
                mutable,
                initialized: false,
            },
        );
        Ok(())
    }

    /// Install an import indirection (module records only).
    pub fn declare_import(&mut self, local: &str, module: ModuleRef, export_name: &str) {
        self.bindings.insert(
            JsString::from(local),
            Binding::Indirect {
                module,
                export_name: JsString::from(export_name),
            },
        );
    }

    pub fn initialize(&mut self, name: &str, value: JsValue) -> Result<(), EngineError> {
        match self.bindings.get_mut(name) {
            Some(Binding::Value {
                value: slot,
                initialized,
                ..
            }) => {
                *slot = value;
                *initialized = true;
                Ok(())
            }
            _ => Err(EngineError::internal(format!(
                "initialize of undeclared binding '{name}'"
            ))),
        }
    }

    /// Read a local slot, observing the temporal dead zone.
    pub(crate) fn read_local(&self, name: &str) -> Result<Option<JsValue>, EngineError> {
        match self.bindings.get(name) {
            Some(Binding::Value {
                value, initialized, ..
            }) => {
                if *initialized {
                    Ok(Some(value.clone()))
                } else {
                    Err(EngineError::tdz(name))
                }
            }
            Some(Binding::Indirect {
                module,
                export_name,
            }) => Ok(Some(crate::module::binding_get(
                module,
                export_name.as_str(),
            )?)),
            None => Ok(None),
        }
    }
}

/// Nearest scope where `var` declarations land.
pub fn var_scope(scope: &ScopeRef) -> ScopeRef {
    let mut current = scope.clone();
    loop {
        let parent = {
            let s = current.borrow();
            match s.kind {
                ScopeKind::Function | ScopeKind::Global | ScopeKind::Module => return current.clone(),
                ScopeKind::Declarative => s.parent.clone(),
            }
        };
        match parent {
            Some(p) => current = p,
            None => return current,
        }
    }
}

/// Resolve a name through the scope chain. Global scopes fall back to the
/// backing object's property table.
pub fn lookup(scope: &ScopeRef, name: &str) -> Result<Resolved, EngineError> {
    match lookup_optional(scope, name)? {
        Some(resolved) => Ok(resolved),
        None => Err(EngineError::reference_error(name)),
    }
}

/// Like `lookup` but absent names resolve to `None` instead of a
/// ReferenceError (the `typeof` carve-out). TDZ violations still fail.
pub fn lookup_optional(scope: &ScopeRef, name: &str) -> Result<Option<Resolved>, EngineError> {
    let mut current = Some(scope.clone());
    while let Some(cur) = current {
        let cur_ref = cur.borrow();
        if let Some(value) = cur_ref.read_local(name)? {
            return Ok(Some(Resolved::Value(value)));
        }
        if let Some(global) = &cur_ref.backing_object {
            match get_property(global, &PropertyKey::from(name))? {
                GetOutcome::Value(value) => return Ok(Some(Resolved::Value(value))),
                GetOutcome::Getter(getter) => {
                    return Ok(Some(Resolved::Accessor {
                        getter,
                        receiver: JsValue::Object(global.clone()),
                    }));
                }
                GetOutcome::Absent => {}
            }
        }
        current = cur_ref.parent.clone();
    }
    Ok(None)
}

/// Assign to an existing binding. Unresolved names are a ReferenceError
/// (there is no sloppy-mode implicit-global path in the sandbox) and
/// immutable bindings refuse with a TypeError.
pub fn assign(scope: &ScopeRef, name: &str, value: JsValue) -> Result<WriteOutcome, EngineError> {
    let mut current = Some(scope.clone());
    while let Some(cur) = current {
        let next = {
            let mut cur_ref = cur.borrow_mut();
            if let Some(binding) = cur_ref.bindings.get_mut(name) {
                match binding {
                    Binding::Value {
                        value: slot,
                        mutable,
                        initialized,
                    } => {
                        if !*initialized {
                            return Err(EngineError::tdz(name));
                        }
                        if !*mutable {
                            return Err(EngineError::type_error(format!(
                                "assignment to constant variable '{name}'"
                            )));
                        }
                        *slot = value;
                        return Ok(WriteOutcome::Done);
                    }
                    Binding::Indirect { .. } => {
                        return Err(EngineError::type_error(format!(
                            "assignment to imported binding '{name}'"
                        )));
                    }
                }
            }
            if let Some(global) = cur_ref.backing_object.clone() {
                drop(cur_ref);
                let key = PropertyKey::from(name);
                if crate::value::get_property_descriptor(&global, &key)?.is_some() {
                    return match set_property(&global, &key, value)? {
                        SetOutcome::Done => Ok(WriteOutcome::Done),
                        SetOutcome::Setter(setter) => Ok(WriteOutcome::Setter {
                            setter,
                            receiver: JsValue::Object(global),
                        }),
                        SetOutcome::Refused => Err(EngineError::type_error(format!(
                            "cannot assign to read-only global '{name}'"
                        ))),
                    };
                }
                return Err(EngineError::reference_error(name));
            }
            cur_ref.parent.clone()
        };
        current = next;
    }
    Err(EngineError::reference_error(name))
}

/// Declare a `var` (or hoisted function) starting from `scope`. In global
/// scope the binding materializes as a non-configurable property of the
/// global object.
pub fn declare_var(scope: &ScopeRef, name: &str, value: JsValue) -> Result<(), EngineError> {
    let target = var_scope(scope);
    let global = {
        let target_ref = target.borrow();
        if target_ref.kind == ScopeKind::Global {
            target_ref.backing_object.clone()
        } else {
            None
        }
    };
    match global {
        Some(global) => {
            let key = PropertyKey::from(name);
            let already = global.borrow().has_own(&key);
            if already {
                if !matches!(value, JsValue::Undefined) {
                    match set_property(&global, &key, value)? {
                        SetOutcome::Done | SetOutcome::Refused => {}
                        SetOutcome::Setter(_) => {}
                    }
                }
            } else {
                global.borrow_mut().insert(
                    key,
                    PropertyDescriptor::data_with(value, true, true, false),
                );
            }
            Ok(())
        }
        None => {
            target.borrow_mut().declare_var(name, value);
            Ok(())
        }
    }
}
