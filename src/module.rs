//! Module records and the multi-phase linker.
//!
//! Each module moves through `uninstantiated → instantiating → instantiated
//! → evaluating → evaluated`, monotonically and exactly once. Linking pulls
//! the dependency graph in through the host resolver; instantiation creates
//! environments and wires live import indirections; evaluation order is
//! depth-first post-order with memoization. Import bindings are indirections
//! by (module, binding name), so circular graphs wire up before either body
//! has run.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{
    ImportSpecifier, Program, Span, Statement,
};
use crate::environment::{Scope, ScopeRef};
use crate::error::EngineError;
use crate::interpreter::hoist;
use crate::value::{ExoticObject, JsObject, JsObjectRef, JsValue, PropertyKey};

pub type ModuleRef = Rc<RefCell<ModuleRecord>>;

/// Internal binding name backing `export default <expression>`.
pub const DEFAULT_EXPORT_BINDING: &str = "*default*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModuleStatus {
    Uninstantiated,
    Instantiating,
    Instantiated,
    Evaluating,
    Evaluated,
}

pub enum ModuleKind {
    /// A parsed module program supplied by the resolver.
    Source { program: Rc<Program> },
    /// A host-provided exports object; no environment, no body.
    Synthetic { exports: JsObjectRef },
}

/// `import { x as local } from "spec"` and friends.
#[derive(Debug, Clone)]
pub struct ImportEntry {
    pub local: String,
    pub target: ImportTarget,
    pub specifier: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ImportTarget {
    Named(String),
    Namespace,
}

/// `export { local as exported }` or an exported declaration.
#[derive(Debug, Clone)]
pub struct LocalExportEntry {
    pub export_name: String,
    pub local_name: String,
}

/// `export { imported as exported } from "spec"`.
#[derive(Debug, Clone)]
pub struct IndirectExportEntry {
    pub export_name: String,
    pub import_name: String,
    pub specifier: String,
}

pub struct ModuleRecord {
    pub specifier: String,
    pub status: ModuleStatus,
    pub kind: ModuleKind,
    /// Link phase completed (or started, for cycle tolerance).
    pub linked: bool,
    pub env: Option<ScopeRef>,
    namespace: Option<JsObjectRef>,
    /// Requested specifiers in source order, deduplicated.
    pub request_specifiers: Vec<String>,
    /// Resolved dependencies, filled by the link phase.
    pub requests: FxHashMap<String, ModuleRef>,
    pub imports: Vec<ImportEntry>,
    pub local_exports: Vec<LocalExportEntry>,
    pub indirect_exports: Vec<IndirectExportEntry>,
    pub star_exports: Vec<String>,
    /// Memoized evaluation failure; re-imports observe the same error.
    pub eval_error: Option<EngineError>,
}

impl ModuleRecord {
    pub fn from_program(specifier: &str, program: Program) -> ModuleRef {
        let mut record = ModuleRecord {
            specifier: specifier.to_string(),
            status: ModuleStatus::Uninstantiated,
            kind: ModuleKind::Source {
                program: Rc::new(program),
            },
            linked: false,
            env: None,
            namespace: None,
            request_specifiers: Vec::new(),
            requests: FxHashMap::default(),
            imports: Vec::new(),
            local_exports: Vec::new(),
            indirect_exports: Vec::new(),
            star_exports: Vec::new(),
            eval_error: None,
        };
        record.collect_entries();
        Rc::new(RefCell::new(record))
    }

    pub fn synthetic(specifier: &str, exports: JsObjectRef) -> ModuleRef {
        Rc::new(RefCell::new(ModuleRecord {
            specifier: specifier.to_string(),
            status: ModuleStatus::Evaluated,
            kind: ModuleKind::Synthetic { exports },
            linked: true,
            env: None,
            namespace: None,
            request_specifiers: Vec::new(),
            requests: FxHashMap::default(),
            imports: Vec::new(),
            local_exports: Vec::new(),
            indirect_exports: Vec::new(),
            star_exports: Vec::new(),
            eval_error: None,
        }))
    }

    pub fn program(&self) -> Option<Rc<Program>> {
        match &self.kind {
            ModuleKind::Source { program } => Some(program.clone()),
            ModuleKind::Synthetic { .. } => None,
        }
    }

    pub fn set_status(&mut self, status: ModuleStatus) {
        debug_assert!(status >= self.status, "module status must be monotonic");
        self.status = status;
    }

    fn add_request(&mut self, specifier: &str) {
        if !self.request_specifiers.iter().any(|s| s == specifier) {
            self.request_specifiers.push(specifier.to_string());
        }
    }

    /// Pre-scan the body for import/export entries.
    fn collect_entries(&mut self) {
        let program = match &self.kind {
            ModuleKind::Source { program } => program.clone(),
            ModuleKind::Synthetic { .. } => return,
        };
        for stmt in &program.body {
            match stmt {
                Statement::ImportDeclaration(import) => {
                    let Some(source) = import.source.as_str() else {
                        continue;
                    };
                    self.add_request(source);
                    for spec in &import.specifiers {
                        let entry = match spec {
                            ImportSpecifier::ImportSpecifier { imported, local } => ImportEntry {
                                local: local.name.clone(),
                                target: ImportTarget::Named(imported.name.clone()),
                                specifier: source.to_string(),
                                span: import.span,
                            },
                            ImportSpecifier::ImportDefaultSpecifier { local } => ImportEntry {
                                local: local.name.clone(),
                                target: ImportTarget::Named("default".to_string()),
                                specifier: source.to_string(),
                                span: import.span,
                            },
                            ImportSpecifier::ImportNamespaceSpecifier { local } => ImportEntry {
                                local: local.name.clone(),
                                target: ImportTarget::Namespace,
                                specifier: source.to_string(),
                                span: import.span,
                            },
                        };
                        self.imports.push(entry);
                    }
                }
                Statement::ExportNamedDeclaration(export) => {
                    if let Some(decl) = &export.declaration {
                        let mut names = Vec::new();
                        match decl.as_ref() {
                            Statement::VariableDeclaration(var) => {
                                for d in &var.declarations {
                                    hoist::pattern_names(&d.id, &mut names);
                                }
                            }
                            Statement::FunctionDeclaration(func) => {
                                if let Some(id) = &func.id {
                                    names.push(id.name.clone());
                                }
                            }
                            Statement::ClassDeclaration(class) => {
                                if let Some(id) = &class.id {
                                    names.push(id.name.clone());
                                }
                            }
                            _ => {}
                        }
                        for name in names {
                            self.local_exports.push(LocalExportEntry {
                                export_name: name.clone(),
                                local_name: name,
                            });
                        }
                    } else if let Some(source) = &export.source {
                        let Some(source) = source.as_str() else { continue };
                        self.add_request(source);
                        for spec in &export.specifiers {
                            self.indirect_exports.push(IndirectExportEntry {
                                export_name: spec.exported.name.clone(),
                                import_name: spec.local.name.clone(),
                                specifier: source.to_string(),
                            });
                        }
                    } else {
                        for spec in &export.specifiers {
                            self.local_exports.push(LocalExportEntry {
                                export_name: spec.exported.name.clone(),
                                local_name: spec.local.name.clone(),
                            });
                        }
                    }
                }
                Statement::ExportDefaultDeclaration(_) => {
                    self.local_exports.push(LocalExportEntry {
                        export_name: "default".to_string(),
                        local_name: DEFAULT_EXPORT_BINDING.to_string(),
                    });
                }
                Statement::ExportAllDeclaration(export) => {
                    if let Some(source) = export.source.as_str() {
                        self.add_request(source);
                        self.star_exports.push(source.to_string());
                    }
                }
                _ => {}
            }
        }
    }
}

impl std::fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("specifier", &self.specifier)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// What a host resolver returns for a specifier.
pub enum ResolvedModule {
    Source(Program),
    Synthetic(JsObjectRef),
}

pub type ModuleResolver = Box<dyn FnMut(&str) -> Result<ResolvedModule, EngineError>>;

/// Per-realm module table plus the host resolver hook.
pub struct ModuleRegistry {
    modules: FxHashMap<String, ModuleRef>,
    resolver: Option<ModuleResolver>,
}

impl ModuleRegistry {
    pub fn new(resolver: Option<ModuleResolver>) -> Self {
        Self {
            modules: FxHashMap::default(),
            resolver,
        }
    }

    pub fn get(&self, specifier: &str) -> Option<ModuleRef> {
        self.modules.get(specifier).cloned()
    }

    /// Resolve one specifier to a record, memoized.
    fn load(&mut self, specifier: &str) -> Result<ModuleRef, EngineError> {
        if let Some(module) = self.modules.get(specifier) {
            return Ok(module.clone());
        }
        let resolver = self.resolver.as_mut().ok_or_else(|| {
            EngineError::type_error("module resolution is not configured for this realm")
        })?;
        let record = match resolver(specifier)? {
            ResolvedModule::Source(program) => ModuleRecord::from_program(specifier, program),
            ResolvedModule::Synthetic(exports) => ModuleRecord::synthetic(specifier, exports),
        };
        self.modules.insert(specifier.to_string(), record.clone());
        Ok(record)
    }

    /// Link phase: pull in the whole dependency graph. Marks each record
    /// linked before recursing so circular graphs terminate.
    pub fn link(&mut self, specifier: &str) -> Result<ModuleRef, EngineError> {
        let module = self.load(specifier)?;
        if module.borrow().linked {
            return Ok(module);
        }
        module.borrow_mut().linked = true;
        let requests = module.borrow().request_specifiers.clone();
        for request in requests {
            let dep = self.link(&request)?;
            module.borrow_mut().requests.insert(request, dep);
        }
        Ok(module)
    }
}

/// Result of `resolve_export`.
#[derive(Debug, Clone)]
pub enum ExportResolution {
    Binding { module: ModuleRef, binding: String },
    /// Two star-exports disagree on the name.
    Ambiguous,
    NotFound,
}

/// Recursive export resolution with cycle protection keyed by
/// (module identity, name). Checks local exports, then named re-exports,
/// then star-exports, which must all agree.
pub fn resolve_export(
    module: &ModuleRef,
    name: &str,
    visited: &mut Vec<(usize, String)>,
) -> Result<ExportResolution, EngineError> {
    let key = (Rc::as_ptr(module) as usize, name.to_string());
    if visited.contains(&key) {
        return Ok(ExportResolution::NotFound);
    }
    visited.push(key);

    let module_ref = module.borrow();
    if let ModuleKind::Synthetic { exports } = &module_ref.kind {
        return if exports.borrow().has_own(&PropertyKey::from(name)) {
            Ok(ExportResolution::Binding {
                module: module.clone(),
                binding: name.to_string(),
            })
        } else {
            Ok(ExportResolution::NotFound)
        };
    }

    for entry in &module_ref.local_exports {
        if entry.export_name == name {
            return Ok(ExportResolution::Binding {
                module: module.clone(),
                binding: entry.local_name.clone(),
            });
        }
    }

    let indirect = module_ref
        .indirect_exports
        .iter()
        .find(|e| e.export_name == name)
        .cloned();
    if let Some(entry) = indirect {
        let dep = module_ref
            .requests
            .get(&entry.specifier)
            .cloned()
            .ok_or_else(|| {
                EngineError::internal(format!("unlinked module request '{}'", entry.specifier))
            })?;
        drop(module_ref);
        return resolve_export(&dep, &entry.import_name, visited);
    }

    // The default export is never drawn through a star.
    if name == "default" {
        return Ok(ExportResolution::NotFound);
    }

    let star_deps: Vec<ModuleRef> = module_ref
        .star_exports
        .iter()
        .filter_map(|s| module_ref.requests.get(s).cloned())
        .collect();
    drop(module_ref);

    let mut found: Option<(ModuleRef, String)> = None;
    for dep in star_deps {
        match resolve_export(&dep, name, visited)? {
            ExportResolution::Ambiguous => return Ok(ExportResolution::Ambiguous),
            ExportResolution::Binding { module, binding } => match &found {
                None => found = Some((module, binding)),
                Some((prev_module, prev_binding)) => {
                    if !Rc::ptr_eq(prev_module, &module) || *prev_binding != binding {
                        return Ok(ExportResolution::Ambiguous);
                    }
                }
            },
            ExportResolution::NotFound => {}
        }
    }
    Ok(match found {
        Some((module, binding)) => ExportResolution::Binding { module, binding },
        None => ExportResolution::NotFound,
    })
}

/// Instantiate phase: create the environment, pre-create hoisted bindings
/// (uninitialized for lexicals), wire import indirections and validate
/// exports. Dependencies instantiate first; re-entry during a cycle is a
/// no-op by status.
pub fn instantiate(module: &ModuleRef, global: &ScopeRef) -> Result<(), EngineError> {
    if module.borrow().status != ModuleStatus::Uninstantiated {
        return Ok(());
    }
    module.borrow_mut().set_status(ModuleStatus::Instantiating);

    let deps: Vec<ModuleRef> = module.borrow().requests.values().cloned().collect();
    for dep in deps {
        instantiate(&dep, global)?;
    }

    let program = match module.borrow().program() {
        Some(p) => p,
        None => {
            module.borrow_mut().set_status(ModuleStatus::Instantiated);
            return Ok(());
        }
    };

    let env = Scope::new_module(global.clone());
    let decls = hoist::scan_statements(&program.body);
    {
        let mut env_ref = env.borrow_mut();
        for name in &decls.vars {
            env_ref.declare_var(name, JsValue::Undefined);
        }
        for (name, mutable) in &decls.lexical {
            env_ref.declare_lexical(name, *mutable)?;
        }
        if module
            .borrow()
            .local_exports
            .iter()
            .any(|e| e.local_name == DEFAULT_EXPORT_BINDING)
        {
            env_ref.declare_lexical(DEFAULT_EXPORT_BINDING, false)?;
        }
    }

    let imports = module.borrow().imports.clone();
    for entry in imports {
        let dep = module
            .borrow()
            .requests
            .get(&entry.specifier)
            .cloned()
            .ok_or_else(|| {
                EngineError::internal(format!("unlinked module request '{}'", entry.specifier))
            })?;
        match &entry.target {
            ImportTarget::Namespace => {
                let ns = JsValue::Object(get_namespace(&dep));
                let mut env_ref = env.borrow_mut();
                env_ref.declare_lexical(&entry.local, false)?;
                env_ref.initialize(&entry.local, ns)?;
            }
            ImportTarget::Named(name) => {
                match resolve_export(&dep, name, &mut Vec::new())? {
                    ExportResolution::Binding { module, binding } => {
                        env.borrow_mut().declare_import(&entry.local, module, &binding);
                    }
                    ExportResolution::Ambiguous => {
                        return Err(EngineError::syntax(format!(
                            "ambiguous export '{name}' requested from module '{}'",
                            entry.specifier
                        ))
                        .at(entry.span));
                    }
                    ExportResolution::NotFound => {
                        return Err(EngineError::syntax(format!(
                            "module '{}' does not provide an export named '{name}'",
                            entry.specifier
                        ))
                        .at(entry.span));
                    }
                }
            }
        }
    }

    // Every declared local export must actually have a binding.
    {
        let module_ref = module.borrow();
        let env_ref = env.borrow();
        for entry in &module_ref.local_exports {
            if !env_ref.has_local(&entry.local_name) {
                return Err(EngineError::syntax(format!(
                    "exported binding '{}' is not declared in module '{}'",
                    entry.local_name, module_ref.specifier
                )));
            }
        }
    }

    let mut module_ref = module.borrow_mut();
    module_ref.env = Some(env);
    module_ref.set_status(ModuleStatus::Instantiated);
    Ok(())
}

/// Depth-first post-order of source modules still awaiting evaluation,
/// marking each `Evaluating` as it is scheduled so each body runs at most
/// once even across cycles.
pub fn evaluation_order(module: &ModuleRef) -> Vec<ModuleRef> {
    let mut order = Vec::new();
    schedule(module, &mut order);
    order
}

fn schedule(module: &ModuleRef, order: &mut Vec<ModuleRef>) {
    if module.borrow().status != ModuleStatus::Instantiated {
        return;
    }
    module.borrow_mut().set_status(ModuleStatus::Evaluating);
    let deps: Vec<ModuleRef> = {
        let module_ref = module.borrow();
        module_ref
            .request_specifiers
            .iter()
            .filter_map(|s| module_ref.requests.get(s).cloned())
            .collect()
    };
    for dep in deps {
        schedule(&dep, order);
    }
    order.push(module.clone());
}

/// Read the current value of a module's own binding. For source modules
/// this observes the live environment slot (TDZ included); for synthetic
/// modules it reads the exports object.
pub fn binding_get(module: &ModuleRef, binding: &str) -> Result<JsValue, EngineError> {
    let module_ref = module.borrow();
    match &module_ref.kind {
        ModuleKind::Synthetic { exports } => Ok(exports
            .borrow()
            .get_own(&PropertyKey::from(binding))
            .and_then(|d| d.data_value())
            .unwrap_or(JsValue::Undefined)),
        ModuleKind::Source { .. } => {
            let env = module_ref.env.as_ref().ok_or_else(|| {
                EngineError::internal(format!(
                    "module '{}' read before instantiation",
                    module_ref.specifier
                ))
            })?;
            let env = env.clone();
            drop(module_ref);
            match env.borrow().read_local(binding)? {
                Some(value) => Ok(value),
                None => Err(EngineError::internal(format!(
                    "missing module binding '{binding}'"
                ))),
            }
        }
    }
}

/// The lazily-created namespace object: a frozen exotic view whose reads
/// resolve through the module's live bindings.
pub fn get_namespace(module: &ModuleRef) -> JsObjectRef {
    if let Some(ns) = &module.borrow().namespace {
        return ns.clone();
    }
    let mut obj = JsObject::new();
    obj.extensible = false;
    obj.exotic = ExoticObject::Namespace(module.clone());
    let ns = obj.into_ref();
    module.borrow_mut().namespace = Some(ns.clone());
    ns
}

/// Namespace property read: resolve the export, then read the live binding.
/// Ambiguous and absent names read as absent.
pub fn namespace_get(module: &ModuleRef, name: &str) -> Result<Option<JsValue>, EngineError> {
    match resolve_export(module, name, &mut Vec::new())? {
        ExportResolution::Binding { module, binding } => {
            Ok(Some(binding_get(&module, &binding)?))
        }
        ExportResolution::Ambiguous | ExportResolution::NotFound => Ok(None),
    }
}

pub fn namespace_has(module: &ModuleRef, name: &str) -> bool {
    matches!(
        resolve_export(module, name, &mut Vec::new()),
        Ok(ExportResolution::Binding { .. })
    )
}

/// Unambiguously exported names, sorted, for namespace enumeration.
pub fn export_names(module: &ModuleRef) -> Vec<String> {
    let mut names = Vec::new();
    collect_names(module, &mut Vec::new(), &mut names);
    names.sort();
    names.dedup();
    names.retain(|name| namespace_has(module, name));
    names
}

fn collect_names(module: &ModuleRef, visited: &mut Vec<usize>, out: &mut Vec<String>) {
    let ptr = Rc::as_ptr(module) as usize;
    if visited.contains(&ptr) {
        return;
    }
    visited.push(ptr);
    let module_ref = module.borrow();
    if let ModuleKind::Synthetic { exports } = &module_ref.kind {
        for key in exports.borrow().own_enumerable_keys() {
            out.push(key.to_string());
        }
        return;
    }
    for entry in &module_ref.local_exports {
        out.push(entry.export_name.clone());
    }
    for entry in &module_ref.indirect_exports {
        out.push(entry.export_name.clone());
    }
    let star_deps: Vec<ModuleRef> = module_ref
        .star_exports
        .iter()
        .filter_map(|s| module_ref.requests.get(s).cloned())
        .collect();
    drop(module_ref);
    for dep in star_deps {
        let mut dep_names = Vec::new();
        collect_names(&dep, visited, &mut dep_names);
        dep_names.retain(|n| n != "default");
        out.extend(dep_names);
    }
}
