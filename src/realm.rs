//! Realms: the isolated global state one sandboxed program sees.
//!
//! A realm owns its global object, scope chain, intrinsics, module registry
//! and scheduler queues. Nothing is shared between realms; evaluations on
//! the same realm share the global environment and run one entered task at
//! a time. All evaluation entry points route through the task layer so the
//! host's runner controls pacing.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::ast::Program;
use crate::environment::{Scope, ScopeRef};
use crate::error::EngineError;
use crate::intrinsics::{self, Intrinsics};
use crate::module::{self, ExportResolution, ModuleRef, ModuleRegistry, ModuleResolver};
use crate::task::{self, Job, TaskId, TaskKind, TaskRunner};
use crate::value::{
    get_property, ExoticObject, GetOutcome, JsObject, JsObjectRef, JsValue, PropertyDescriptor,
    PropertyKey,
};

pub type RealmRef = Rc<RefCell<RealmData>>;

/// Mutable realm state shared by the evaluator, scheduler and intrinsics.
pub struct RealmData {
    pub global_object: JsObjectRef,
    pub global_scope: ScopeRef,
    pub intrinsics: Intrinsics,
    pub registry: ModuleRegistry,
    pub microtasks: VecDeque<Job>,
    /// Rejected promises nothing has handled yet, with their values.
    pub unhandled_rejections: Vec<(JsObjectRef, JsValue)>,
    /// The one entered task, while an evaluation is in flight.
    pub current_task: Option<TaskId>,
    /// Inside `TaskIterator::next` of the current task; nested synchronous
    /// evaluation is legal only then.
    pub in_step: bool,
    pub next_symbol_id: u64,
    pub next_task_id: TaskId,
}

impl RealmData {
    pub fn fresh_symbol_id(&mut self) -> u64 {
        let id = self.next_symbol_id;
        self.next_symbol_id += 1;
        id
    }
}

/// Host configuration for a new realm.
#[derive(Default)]
pub struct RealmOptions {
    /// Resolves module specifiers to source or synthetic modules.
    pub module_resolver: Option<ModuleResolver>,
    /// Initial global bindings, built from host JSON before any script runs.
    pub globals: Vec<(String, serde_json::Value)>,
}

/// An isolated execution environment.
pub struct Realm {
    data: RealmRef,
}

impl Default for Realm {
    fn default() -> Self {
        Realm::new()
    }
}

impl Realm {
    pub fn new() -> Self {
        Realm::with_options(RealmOptions::default())
    }

    pub fn with_options(options: RealmOptions) -> Self {
        let intrinsics = Intrinsics::new();
        let global_object =
            JsObject::with_prototype(Some(intrinsics.object_prototype.clone())).into_ref();
        let global_scope = Scope::new_global(global_object.clone());
        let data = Rc::new(RefCell::new(RealmData {
            global_object,
            global_scope,
            intrinsics,
            registry: ModuleRegistry::new(options.module_resolver),
            microtasks: VecDeque::new(),
            unhandled_rejections: Vec::new(),
            current_task: None,
            in_step: false,
            next_symbol_id: 1,
            next_task_id: 1,
        }));
        intrinsics::install(&data);
        let realm = Realm { data };
        for (name, json) in &options.globals {
            let value = realm.json_to_value(json);
            realm.set_global(name, value);
        }
        realm
    }

    pub(crate) fn data(&self) -> &RealmRef {
        &self.data
    }

    /// Evaluate a script program, driving it to completion internally.
    pub fn evaluate(&self, program: &Program) -> Result<JsValue, EngineError> {
        self.evaluate_script(program, &mut task::drain_runner)
    }

    /// Evaluate a script program under a host-supplied runner. The runner
    /// must drain the iterator before returning.
    pub fn evaluate_script(
        &self,
        program: &Program,
        runner: &mut TaskRunner<'_>,
    ) -> Result<JsValue, EngineError> {
        task::run_task(&self.data, runner, TaskKind::Script, |interp| {
            interp.prepare_script(program)
        })
    }

    /// Link, instantiate and evaluate a module graph to completion.
    pub fn evaluate_module(&self, specifier: &str) -> Result<ModuleHandle, EngineError> {
        self.evaluate_module_with(specifier, &mut task::drain_runner)
    }

    /// Like `evaluate_module`, under a host-supplied runner.
    pub fn evaluate_module_with(
        &self,
        specifier: &str,
        runner: &mut TaskRunner<'_>,
    ) -> Result<ModuleHandle, EngineError> {
        let root = self.data.borrow_mut().registry.link(specifier)?;
        let global_scope = self.data.borrow().global_scope.clone();
        module::instantiate(&root, &global_scope)?;
        task::run_task(&self.data, runner, TaskKind::Module, |interp| {
            interp.prepare_module_graph(&root);
            Ok(())
        })?;
        if let Some(err) = root.borrow().eval_error.clone() {
            return Err(err);
        }
        Ok(ModuleHandle { module: root })
    }

    /// Define (or overwrite) a global binding visible to scripts.
    pub fn set_global(&self, name: &str, value: JsValue) {
        let global = self.data.borrow().global_object.clone();
        global
            .borrow_mut()
            .insert(PropertyKey::from(name), PropertyDescriptor::data(value));
    }

    pub fn get_global(&self, name: &str) -> Result<JsValue, EngineError> {
        let global = self.data.borrow().global_object.clone();
        match get_property(&global, &PropertyKey::from(name))? {
            GetOutcome::Value(value) => Ok(value),
            // Accessor globals need an interpreter to run; read as data only.
            GetOutcome::Getter(_) | GetOutcome::Absent => Ok(JsValue::Undefined),
        }
    }

    /// Build a realm value tree from host JSON.
    pub fn json_to_value(&self, json: &serde_json::Value) -> JsValue {
        let intrinsics = self.data.borrow().intrinsics.clone();
        json_to_value(&intrinsics, json)
    }

    /// Project a realm value to JSON: plain data only, accessors and
    /// functions drop out, non-finite numbers become null.
    pub fn value_to_json(&self, value: &JsValue) -> serde_json::Value {
        value_to_json(value)
    }
}

/// Host handle over an evaluated module.
pub struct ModuleHandle {
    module: ModuleRef,
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("specifier", &self.module.borrow().specifier)
            .finish_non_exhaustive()
    }
}

impl ModuleHandle {
    /// Read one export through the module's live bindings.
    pub fn get_export(&self, name: &str) -> Result<JsValue, EngineError> {
        match module::resolve_export(&self.module, name, &mut Vec::new())? {
            ExportResolution::Binding { module, binding } => {
                module::binding_get(&module, &binding)
            }
            ExportResolution::Ambiguous => Err(EngineError::syntax(format!(
                "ambiguous export '{name}'"
            ))),
            ExportResolution::NotFound => Err(EngineError::reference_error(format!(
                "export '{name}'"
            ))),
        }
    }

    /// The module's namespace object (live, read-only).
    pub fn namespace(&self) -> JsObjectRef {
        module::get_namespace(&self.module)
    }
}

fn json_to_value(intrinsics: &Intrinsics, json: &serde_json::Value) -> JsValue {
    match json {
        serde_json::Value::Null => JsValue::Null,
        serde_json::Value::Bool(b) => JsValue::Boolean(*b),
        serde_json::Value::Number(n) => JsValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => JsValue::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let mut obj = JsObject::with_prototype(Some(intrinsics.array_prototype.clone()));
            obj.exotic = ExoticObject::Array {
                length: 0,
                length_writable: true,
            };
            for (i, item) in items.iter().enumerate() {
                obj.insert(
                    PropertyKey::Index(i as u32),
                    PropertyDescriptor::data(json_to_value(intrinsics, item)),
                );
            }
            JsValue::Object(obj.into_ref())
        }
        serde_json::Value::Object(map) => {
            let mut obj = JsObject::with_prototype(Some(intrinsics.object_prototype.clone()));
            for (key, item) in map {
                obj.insert(
                    PropertyKey::from(key.as_str()),
                    PropertyDescriptor::data(json_to_value(intrinsics, item)),
                );
            }
            JsValue::Object(obj.into_ref())
        }
    }
}

fn value_to_json(value: &JsValue) -> serde_json::Value {
    match value {
        JsValue::Undefined | JsValue::Null | JsValue::Symbol(_) => serde_json::Value::Null,
        JsValue::Boolean(b) => serde_json::Value::Bool(*b),
        JsValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        JsValue::String(s) => serde_json::Value::String(s.as_str().to_string()),
        JsValue::Object(obj) => {
            let obj_ref = obj.borrow();
            if obj_ref.is_callable() {
                return serde_json::Value::Null;
            }
            if let Some(length) = obj_ref.array_length() {
                let items = (0..length)
                    .map(|i| {
                        obj_ref
                            .get_own(&PropertyKey::Index(i))
                            .and_then(PropertyDescriptor::data_value)
                            .map(|v| value_to_json(&v))
                            .unwrap_or(serde_json::Value::Null)
                    })
                    .collect();
                return serde_json::Value::Array(items);
            }
            let mut map = serde_json::Map::new();
            for key in obj_ref.own_enumerable_keys() {
                if let Some(v) = obj_ref.get_own(&key).and_then(PropertyDescriptor::data_value) {
                    map.insert(key.to_string(), value_to_json(&v));
                }
            }
            serde_json::Value::Object(map)
        }
    }
}
