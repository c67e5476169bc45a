//! The frame-stack evaluator.
//!
//! Execution state lives entirely in `Interpreter`: a frame stack of
//! pending work, a value stack of intermediates, the current scope and
//! `this`. `step()` processes exactly one frame, which is the suspension
//! granularity the task layer exposes to hosts. Abrupt completions
//! (throw/return/break/continue) unwind the frame stack through handler
//! frames, restoring scopes as they pop.
//!
//! Interpreted calls push frames and are therefore fully steppable.
//! Native-initiated callbacks (accessors reached from native paths,
//! promise reactions) run through a nested save/restore drive instead;
//! they complete within the enclosing step.

pub mod frames;
pub mod hoist;

use std::mem;
use std::rc::Rc;

use crate::ast::{
    ArrowBody, AssignmentTarget, BinaryOp, Expression, ForInit, ForTarget,
    FunctionDeclaration, LiteralValue, LogicalOp, MethodKind, ObjectMember, ObjectPatternItem,
    Pattern, Program, PropertyKind, SourceType, Span, Statement, UnaryOp, UpdateOp, VariableKind,
};
use crate::environment::{self, Resolved, Scope, ScopeRef, WriteOutcome};
use crate::error::EngineError;
use crate::module::{self, ModuleRef, ModuleStatus, DEFAULT_EXPORT_BINDING};
use crate::realm::RealmRef;
use crate::value::{
    delete_property, enumerate_keys, get_property, set_property, ExoticObject, FunctionBody,
    FunctionKind, GetOutcome, InterpretedFunction, JsFunction, JsObject, JsObjectRef, JsString,
    JsValue, PropertyDescriptor, PropertyKey, SetOutcome,
};

use frames::{ArgsRef, BindMode, Completion, Frame, InvokeKind, Operation, SeenKeys};

/// Result of processing one frame.
enum StepEvent {
    Continue,
    Abrupt(Completion),
}

/// Execution state saved around a nested synchronous drive.
struct SavedExecutionState {
    frames: Vec<Frame>,
    values: Vec<JsValue>,
    scope: ScopeRef,
    this_value: JsValue,
    strict: bool,
    super_ctor: Option<JsObjectRef>,
}

pub struct Interpreter {
    pub realm: RealmRef,
    frames: Vec<Frame>,
    values: Vec<JsValue>,
    scope: ScopeRef,
    this_value: JsValue,
    strict: bool,
    super_ctor: Option<JsObjectRef>,
    last_value: JsValue,
    current_op: Option<Operation>,
}

impl Interpreter {
    pub fn new(realm: RealmRef) -> Self {
        let scope = realm.borrow().global_scope.clone();
        let global = realm.borrow().global_object.clone();
        Interpreter {
            realm,
            frames: Vec::new(),
            values: Vec::new(),
            scope,
            this_value: JsValue::Object(global),
            strict: false,
            super_ctor: None,
            last_value: JsValue::Undefined,
            current_op: None,
        }
    }

    /// The AST node kind and span last dispatched, for the step protocol.
    pub fn operation(&self) -> Option<Operation> {
        self.current_op
    }

    pub fn done(&self) -> bool {
        self.frames.is_empty()
    }

    /// The program's completion value (last tracked expression statement).
    pub fn take_completion_value(&mut self) -> JsValue {
        mem::take(&mut self.last_value)
    }

    // ── entry points ─────────────────────────────────────────────────

    /// Queue a script program for execution. Hoists into the global scope.
    pub fn prepare_script(&mut self, program: &Program) -> Result<(), EngineError> {
        let strict = hoist::has_use_strict(&program.body) || program.source_type == SourceType::Module;
        self.strict = strict;
        self.this_value = JsValue::Object(self.realm.borrow().global_object.clone());
        self.hoist_into_current_scope(&program.body)?;
        self.frames.push(Frame::StmtSeq {
            stmts: program.body.clone().into(),
            index: 0,
            track: true,
        });
        Ok(())
    }

    /// Queue a fully instantiated module graph: dependency bodies first,
    /// depth-first post-order, each at most once.
    pub fn prepare_module_graph(&mut self, root: &ModuleRef) {
        let order = module::evaluation_order(root);
        for m in order.into_iter().rev() {
            self.frames.push(Frame::ModuleFinish { module: m.clone() });
            self.frames.push(Frame::ModuleBody { module: m });
        }
    }

    /// Queue a call to `func` so it runs under the step protocol. Native
    /// callees execute immediately; the frame stack is then already drained.
    pub fn prepare_call(
        &mut self,
        func: &JsValue,
        this: JsValue,
        args: Vec<JsValue>,
    ) -> Result<(), EngineError> {
        let func_obj = func
            .as_object()
            .filter(|o| o.borrow().is_callable())
            .cloned()
            .ok_or_else(|| EngineError::type_error("value is not a function"))?;
        let function = match &func_obj.borrow().exotic {
            ExoticObject::Function(f) => f.clone(),
            _ => unreachable!(),
        };
        match function {
            JsFunction::Native(native) => {
                let result = (native.func)(self, this, &args)?;
                self.values.push(result);
            }
            JsFunction::Interpreted(f) => self.push_interpreted_call(&f, this, args),
        }
        Ok(())
    }

    /// Take the result a drained call left on the value stack.
    pub fn take_result(&mut self) -> JsValue {
        self.values.pop().unwrap_or(JsValue::Undefined)
    }

    /// Inject a throw completion at the current suspension point
    /// (`TaskIterator::throw`).
    pub fn inject_throw(&mut self, value: JsValue) -> Result<(), EngineError> {
        self.unwind(Completion::Throw(value))
    }

    // ── stepping ─────────────────────────────────────────────────────

    /// Process one frame. `Ok(true)` when the frame stack has drained.
    /// Catchable engine errors become script throw completions here;
    /// uncaught throws and lifecycle errors surface as `Err`.
    pub fn step(&mut self) -> Result<bool, EngineError> {
        let Some(frame) = self.frames.pop() else {
            return Ok(true);
        };
        match self.process(frame) {
            Ok(StepEvent::Continue) => {}
            Ok(StepEvent::Abrupt(completion)) => self.unwind(completion)?,
            Err(err) if err.is_catchable() => {
                let value = self.error_value(err);
                self.unwind(Completion::Throw(value))?;
            }
            Err(err) => return Err(err),
        }
        Ok(self.frames.is_empty())
    }

    /// Synchronously invoke a callable from native code (accessors reached
    /// off native paths, promise reactions, host callbacks). Interpreted
    /// callees run on fresh stacks inside the current step.
    pub fn call_function(
        &mut self,
        func: &JsValue,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, EngineError> {
        let func_obj = func
            .as_object()
            .filter(|o| o.borrow().is_callable())
            .cloned()
            .ok_or_else(|| EngineError::type_error("value is not a function"))?;
        let function = match &func_obj.borrow().exotic {
            ExoticObject::Function(f) => f.clone(),
            _ => unreachable!(),
        };
        match function {
            JsFunction::Native(native) => (native.func)(self, this, args),
            JsFunction::Interpreted(f) => {
                let saved = SavedExecutionState {
                    frames: mem::take(&mut self.frames),
                    values: mem::take(&mut self.values),
                    scope: self.scope.clone(),
                    this_value: self.this_value.clone(),
                    strict: self.strict,
                    super_ctor: self.super_ctor.clone(),
                };
                self.push_interpreted_call(&f, this, args.to_vec());
                let result = loop {
                    match self.step() {
                        Err(err) => break Err(err),
                        Ok(true) => break Ok(self.values.pop().unwrap_or(JsValue::Undefined)),
                        Ok(false) => {}
                    }
                };
                self.frames = saved.frames;
                self.values = saved.values;
                self.scope = saved.scope;
                self.this_value = saved.this_value;
                self.strict = saved.strict;
                self.super_ctor = saved.super_ctor;
                result
            }
        }
    }

    // ── object construction helpers ──────────────────────────────────

    pub fn new_object(&self) -> JsObjectRef {
        let proto = self.realm.borrow().intrinsics.object_prototype.clone();
        JsObject::with_prototype(Some(proto)).into_ref()
    }

    pub fn new_array(&self, elements: Vec<JsValue>) -> JsObjectRef {
        let proto = self.realm.borrow().intrinsics.array_prototype.clone();
        let mut obj = JsObject::with_prototype(Some(proto));
        obj.exotic = ExoticObject::Array {
            length: 0,
            length_writable: true,
        };
        for (i, value) in elements.into_iter().enumerate() {
            obj.insert(PropertyKey::Index(i as u32), PropertyDescriptor::data(value));
        }
        obj.into_ref()
    }

    /// An error object of the given class, script-catchable.
    pub fn new_error(&self, class: &str, message: &str) -> JsObjectRef {
        let proto = self.realm.borrow().intrinsics.error_prototype_for(class);
        let mut obj = JsObject::with_prototype(Some(proto));
        obj.exotic = ExoticObject::Error;
        obj.insert(
            PropertyKey::from("message"),
            PropertyDescriptor::data_with(JsValue::from(message), true, false, true),
        );
        obj.into_ref()
    }

    /// The script-visible value for a catchable engine error.
    pub fn error_value(&self, err: EngineError) -> JsValue {
        match err {
            EngineError::Thrown { value } => value,
            other => {
                let class = other.class_name().unwrap_or("Error");
                let message = other.class_message().unwrap_or_default();
                JsValue::Object(self.new_error(class, &message))
            }
        }
    }

    fn make_function_value(
        &mut self,
        name: Option<JsString>,
        params: Rc<[Pattern]>,
        body: FunctionBody,
        kind: FunctionKind,
        span: Span,
    ) -> JsObjectRef {
        let strict = self.strict
            || match &body {
                FunctionBody::Block(block) => hoist::has_use_strict(&block.body),
                FunctionBody::Expression(_) => false,
            };
        let captured_this = match kind {
            FunctionKind::Arrow => Some(Box::new(self.this_value.clone())),
            _ => None,
        };
        let function = InterpretedFunction {
            name: name.clone(),
            params,
            body: Rc::new(body),
            closure: self.scope.clone(),
            kind,
            captured_this,
            super_constructor: None,
            strict,
            span,
        };
        self.function_object(JsFunction::Interpreted(function), name, kind)
    }

    fn function_object(
        &mut self,
        function: JsFunction,
        name: Option<JsString>,
        kind: FunctionKind,
    ) -> JsObjectRef {
        let intrinsics = self.realm.borrow().intrinsics.clone();
        let mut obj = JsObject::with_prototype(Some(intrinsics.function_prototype.clone()));
        obj.exotic = ExoticObject::Function(function);
        obj.insert(
            PropertyKey::from("name"),
            PropertyDescriptor::data_with(
                JsValue::String(name.unwrap_or_else(|| JsString::from(""))),
                false,
                false,
                true,
            ),
        );
        let obj = obj.into_ref();
        // Ordinary functions get a `prototype` object for `new`.
        if matches!(kind, FunctionKind::Normal | FunctionKind::Constructor) {
            let proto = JsObject::with_prototype(Some(intrinsics.object_prototype)).into_ref();
            proto.borrow_mut().insert(
                PropertyKey::from("constructor"),
                PropertyDescriptor::data_with(JsValue::Object(obj.clone()), true, false, true),
            );
            obj.borrow_mut().insert(
                PropertyKey::from("prototype"),
                PropertyDescriptor::data_with(JsValue::Object(proto), true, false, false),
            );
        }
        obj
    }

    // ── hoisting ─────────────────────────────────────────────────────

    /// Create the bindings of a statement list in the current scope:
    /// `var`s initialized to undefined, function declarations created
    /// eagerly, lexicals left in their dead zone.
    fn hoist_into_current_scope(&mut self, body: &[Statement]) -> Result<(), EngineError> {
        let decls = hoist::scan_statements(body);
        for name in &decls.vars {
            let already = {
                let scope = environment::var_scope(&self.scope);
                let has = scope.borrow().has_local(name);
                has
            };
            if !already {
                environment::declare_var(&self.scope, name, JsValue::Undefined)?;
            }
        }
        for (name, mutable) in &decls.lexical {
            let exists = self.scope.borrow().has_local(name);
            if !exists {
                self.scope.borrow_mut().declare_lexical(name, *mutable)?;
            } else {
                return Err(EngineError::syntax(format!(
                    "identifier '{name}' has already been declared"
                )));
            }
        }
        for func in &decls.functions {
            let value = self.declare_hoisted_function(func);
            if let Some(id) = &func.id {
                environment::declare_var(&self.scope, &id.name, value)?;
            }
        }
        Ok(())
    }

    /// Block-level hoist: functions bind in the block scope itself.
    fn hoist_into_block_scope(&mut self, body: &[Statement]) -> Result<(), EngineError> {
        let decls = hoist::scan_statements(body);
        for (name, mutable) in &decls.lexical {
            self.scope.borrow_mut().declare_lexical(name, *mutable)?;
        }
        for func in &decls.functions {
            let value = self.declare_hoisted_function(func);
            if let Some(id) = &func.id {
                self.scope.borrow_mut().declare_var(&id.name, value);
            }
        }
        Ok(())
    }

    fn declare_hoisted_function(&mut self, func: &FunctionDeclaration) -> JsValue {
        let name = func.id.as_ref().map(|id| JsString::from(id.name.as_str()));
        let obj = self.make_function_value(
            name,
            func.params.clone().into(),
            FunctionBody::Block(func.body.clone()),
            FunctionKind::Normal,
            func.span,
        );
        JsValue::Object(obj)
    }

    // ── frame processing ─────────────────────────────────────────────

    fn process(&mut self, frame: Frame) -> Result<StepEvent, EngineError> {
        match frame {
            Frame::Stmt { stmt, track } => {
                self.current_op = Some(Operation {
                    kind: stmt.kind(),
                    span: stmt.span(),
                });
                return self.dispatch_statement(&stmt, track, None);
            }
            Frame::Expr(expr) => {
                self.current_op = Some(Operation {
                    kind: expr.kind(),
                    span: expr.span(),
                });
                return self.dispatch_expression(&expr);
            }

            Frame::StmtSeq {
                stmts,
                index,
                track,
            } => {
                if index < stmts.len() {
                    self.frames.push(Frame::StmtSeq {
                        stmts: stmts.clone(),
                        index: index + 1,
                        track,
                    });
                    self.frames.push(Frame::Stmt {
                        stmt: Rc::new(stmts[index].clone()),
                        track,
                    });
                }
            }
            Frame::PushValue(value) => self.values.push(value),
            Frame::PopValue => {
                self.values.pop();
            }
            Frame::DupTop => {
                let top = self.top();
                self.values.push(top);
            }
            Frame::StoreCompletion => {
                self.last_value = self.pop();
            }
            Frame::RestoreScope(scope) => self.scope = scope,

            Frame::BinaryApply { op, span } => {
                let right = self.pop();
                let left = self.pop();
                let result = self.binary_op(op, &left, &right).map_err(|e| e.at(span))?;
                self.values.push(result);
            }
            Frame::LogicalRight { op, right } => {
                let left = self.pop();
                let take_right = match op {
                    LogicalOp::And => left.to_boolean(),
                    LogicalOp::Or => !left.to_boolean(),
                    LogicalOp::NullishCoalescing => left.is_null_or_undefined(),
                };
                if take_right {
                    self.frames.push(Frame::Expr(right));
                } else {
                    self.values.push(left);
                }
            }
            Frame::UnaryApply { op, span } => {
                let value = self.pop();
                let result = self.unary_op(op, &value).map_err(|e| e.at(span))?;
                self.values.push(result);
            }
            Frame::CondBranch {
                consequent,
                alternate,
            } => {
                let test = self.pop();
                self.frames.push(Frame::Expr(if test.to_boolean() {
                    consequent
                } else {
                    alternate
                }));
            }
            Frame::TemplateConcat { quasis, count } => {
                let mut parts = Vec::with_capacity(count);
                for _ in 0..count {
                    parts.push(self.pop());
                }
                parts.reverse();
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(
                        quasi
                            .value
                            .cooked
                            .as_deref()
                            .unwrap_or(quasi.value.raw.as_str()),
                    );
                    if let Some(value) = parts.get(i) {
                        out.push_str(value.to_js_string().as_str());
                    }
                }
                self.values.push(JsValue::from(out));
            }
            Frame::UpdateMember {
                computed,
                static_key,
                op,
                prefix,
                span,
            } => {
                let key = self.pop_key(computed, static_key)?;
                let object = self.pop();
                let old = JsValue::Number(self.member_get(&object, &key, span)?.to_number());
                let delta = if op == UpdateOp::Increment { 1.0 } else { -1.0 };
                let new = JsValue::Number(old.to_number() + delta);
                self.member_set(&object, &key, new.clone(), span)?;
                self.values.push(if prefix { new } else { old });
            }
            Frame::AssignIdent { name, span } => {
                let value = self.top();
                self.assign_name(name.as_str(), value).map_err(|e| e.at(span))?;
            }

            Frame::ArrayAppend {
                array,
                spread,
                span,
            } => {
                let value = self.pop();
                if spread {
                    let items = self.iterable_items(&value).map_err(|e| e.at(span))?;
                    let mut array_ref = array.borrow_mut();
                    for item in items {
                        let len = array_ref.array_length().unwrap_or(0);
                        array_ref.insert(PropertyKey::Index(len), PropertyDescriptor::data(item));
                    }
                } else {
                    let mut array_ref = array.borrow_mut();
                    let len = array_ref.array_length().unwrap_or(0);
                    array_ref.insert(PropertyKey::Index(len), PropertyDescriptor::data(value));
                }
            }
            Frame::ArrayHole { array } => {
                // An elision occupies an index without creating a property.
                if let ExoticObject::Array { length, .. } = &mut array.borrow_mut().exotic {
                    *length += 1;
                }
            }
            Frame::ObjectDefineMember {
                object,
                kind,
                static_key,
            } => {
                let value = self.pop();
                let key = match static_key {
                    Some(key) => key,
                    None => {
                        let key_value = self.pop();
                        PropertyKey::from_value(&key_value)
                    }
                };
                match kind {
                    PropertyKind::Init => {
                        object
                            .borrow_mut()
                            .insert(key, PropertyDescriptor::data(value));
                    }
                    PropertyKind::Get | PropertyKind::Set => {
                        let func = value.as_object().cloned();
                        let existing = object.borrow().get_own(&key);
                        let (mut get, mut set) = match existing {
                            Some(PropertyDescriptor::Accessor { get, set, .. }) => (get, set),
                            _ => (None, None),
                        };
                        if kind == PropertyKind::Get {
                            get = func;
                        } else {
                            set = func;
                        }
                        object
                            .borrow_mut()
                            .insert(key, PropertyDescriptor::accessor(get, set));
                    }
                }
            }
            Frame::ObjectSpread { object } => {
                let source = self.pop();
                if let Some(src) = source.as_object() {
                    let keys = src.borrow().own_enumerable_keys();
                    for key in keys {
                        let value = self.own_get(src, &key)?;
                        object
                            .borrow_mut()
                            .insert(key, PropertyDescriptor::data(value));
                    }
                }
            }

            Frame::GetMember {
                computed,
                optional,
                static_key,
                span,
            } => {
                let key = self.pop_key(computed, static_key)?;
                let object = self.pop();
                if optional && object.is_null_or_undefined() {
                    self.values.push(JsValue::Undefined);
                } else {
                    let value = self.member_get(&object, &key, span)?;
                    self.values.push(value);
                }
            }
            Frame::GetMemberKeep {
                computed,
                static_key,
                span,
            } => {
                let key = self.pop_key(computed, static_key.clone())?;
                let object = self.pop();
                let value = self.member_get(&object, &key, span)?;
                self.values.push(object);
                if computed {
                    self.values.push(key_to_value(&key));
                }
                self.values.push(value);
            }
            Frame::SetMember {
                computed,
                static_key,
                span,
            } => {
                let value = self.pop();
                let key = self.pop_key(computed, static_key)?;
                let object = self.pop();
                self.member_set(&object, &key, value.clone(), span)?;
                self.values.push(value);
            }
            Frame::DeleteMember {
                computed,
                static_key,
                span,
            } => {
                let key = self.pop_key(computed, static_key)?;
                let object = self.pop();
                let result = match object.as_object() {
                    Some(obj) => {
                        let existed = obj.borrow().get_own(&key).is_some();
                        let deleted = delete_property(obj, &key);
                        // Strict mode rejects deleting a property that
                        // refused to go; an absent key is not an error.
                        if !deleted && existed && self.strict {
                            return Err(EngineError::type_error(format!(
                                "cannot delete property {key}"
                            ))
                            .at(span));
                        }
                        deleted
                    }
                    None => true,
                };
                self.values.push(JsValue::Boolean(result));
            }
            Frame::GetMethod {
                computed,
                optional,
                static_key,
                span,
            } => {
                let key = self.pop_key(computed, static_key)?;
                let object = self.pop();
                if optional && object.is_null_or_undefined() {
                    self.values.push(JsValue::Undefined);
                    self.values.push(JsValue::Undefined);
                } else {
                    let func = self.member_get(&object, &key, span)?;
                    self.values.push(object);
                    self.values.push(func);
                }
            }

            Frame::PushArg { args, spread, span } => {
                let value = self.pop();
                if spread {
                    let items = self.iterable_items(&value).map_err(|e| e.at(span))?;
                    args.borrow_mut().extend(items);
                } else {
                    args.borrow_mut().push(value);
                }
            }
            Frame::Invoke {
                args,
                kind,
                optional,
                span,
            } => return self.invoke(args, kind, optional, span),
            Frame::FinishNew { this_obj } => {
                let result = self.pop();
                match result {
                    JsValue::Object(obj) => self.values.push(JsValue::Object(obj)),
                    _ => self.values.push(JsValue::Object(this_obj)),
                }
            }
            Frame::FunctionTeardown {
                scope,
                vs_mark,
                strict,
                this_value,
                super_ctor,
            } => {
                // Reached normally: the body fell off the end.
                self.values.truncate(vs_mark);
                self.scope = scope;
                self.strict = strict;
                self.this_value = this_value;
                self.super_ctor = super_ctor;
                self.values.push(JsValue::Undefined);
            }
            Frame::ReturnValue => {
                let value = self.pop();
                return Ok(StepEvent::Abrupt(Completion::Return(value)));
            }
            Frame::ThrowValue => {
                let value = self.pop();
                return Ok(StepEvent::Abrupt(Completion::Throw(value)));
            }

            Frame::IfBranch {
                consequent,
                alternate,
            } => {
                let test = self.pop();
                if test.to_boolean() {
                    self.frames.push(Frame::Stmt {
                        stmt: consequent,
                        track: false,
                    });
                } else if let Some(alternate) = alternate {
                    self.frames.push(Frame::Stmt {
                        stmt: alternate,
                        track: false,
                    });
                }
            }

            Frame::WhileTest {
                stmt,
                label,
                scope,
                vs_mark,
            } => {
                self.frames.push(Frame::WhileCond {
                    stmt: stmt.clone(),
                    label,
                    scope,
                    vs_mark,
                });
                self.frames.push(Frame::Expr(Rc::new(stmt.test.clone())));
            }
            Frame::WhileCond {
                stmt,
                label,
                scope,
                vs_mark,
            } => {
                let test = self.pop();
                if test.to_boolean() {
                    self.frames.push(Frame::WhileTest {
                        stmt: stmt.clone(),
                        label,
                        scope,
                        vs_mark,
                    });
                    self.frames.push(Frame::Stmt {
                        stmt: Rc::new((*stmt.body).clone()),
                        track: false,
                    });
                }
            }
            Frame::DoWhileTest {
                stmt,
                label,
                scope,
                vs_mark,
            } => {
                self.frames.push(Frame::DoWhileCond {
                    stmt: stmt.clone(),
                    label,
                    scope,
                    vs_mark,
                });
                self.frames.push(Frame::Expr(Rc::new(stmt.test.clone())));
            }
            Frame::DoWhileCond {
                stmt,
                label,
                scope,
                vs_mark,
            } => {
                let test = self.pop();
                if test.to_boolean() {
                    let body = Rc::new((*stmt.body).clone());
                    self.frames.push(Frame::DoWhileTest {
                        stmt,
                        label,
                        scope,
                        vs_mark,
                    });
                    self.frames.push(Frame::Stmt {
                        stmt: body,
                        track: false,
                    });
                }
            }
            Frame::ForUpdate {
                stmt,
                label,
                scope,
                vs_mark,
            } => {
                self.frames.push(Frame::ForTest {
                    stmt: stmt.clone(),
                    label,
                    scope,
                    vs_mark,
                });
                if let Some(update) = &stmt.update {
                    self.frames.push(Frame::PopValue);
                    self.frames.push(Frame::Expr(Rc::new(update.clone())));
                }
            }
            Frame::ForTest {
                stmt,
                label,
                scope,
                vs_mark,
            } => match &stmt.test {
                Some(test) => {
                    let test = Rc::new(test.clone());
                    self.frames.push(Frame::ForCond {
                        stmt,
                        label,
                        scope,
                        vs_mark,
                    });
                    self.frames.push(Frame::Expr(test));
                }
                None => {
                    let body = Rc::new((*stmt.body).clone());
                    self.frames.push(Frame::ForUpdate {
                        stmt,
                        label,
                        scope,
                        vs_mark,
                    });
                    self.frames.push(Frame::Stmt {
                        stmt: body,
                        track: false,
                    });
                }
            },
            Frame::ForCond {
                stmt,
                label,
                scope,
                vs_mark,
            } => {
                let test = self.pop();
                if test.to_boolean() {
                    let body = Rc::new((*stmt.body).clone());
                    self.frames.push(Frame::ForUpdate {
                        stmt,
                        label,
                        scope,
                        vs_mark,
                    });
                    self.frames.push(Frame::Stmt {
                        stmt: body,
                        track: false,
                    });
                }
            }

            Frame::ForInSetup { stmt, label } => {
                let object = self.pop();
                let (keys, obj): (Vec<JsString>, Option<JsObjectRef>) = match &object {
                    JsValue::Object(obj) => (enumerate_keys(obj)?, Some(obj.clone())),
                    JsValue::String(s) => (
                        (0..s.as_str().chars().count())
                            .map(|i| JsString::from(i.to_string()))
                            .collect(),
                        None,
                    ),
                    _ => (Vec::new(), None),
                };
                self.frames.push(Frame::ForInNext {
                    keys: keys.into(),
                    index: 0,
                    object: obj,
                    stmt,
                    label,
                    scope: self.scope.clone(),
                    vs_mark: self.values.len(),
                });
            }
            Frame::ForInNext {
                keys,
                index,
                object,
                stmt,
                label,
                scope,
                vs_mark,
            } => {
                if index >= keys.len() {
                    return Ok(StepEvent::Continue);
                }
                let key = keys[index].clone();
                // Keys deleted mid-iteration are skipped.
                if let Some(obj) = &object {
                    if !crate::value::has_property(obj, &PropertyKey::from(key.as_str()))? {
                        self.frames.push(Frame::ForInNext {
                            keys,
                            index: index + 1,
                            object,
                            stmt,
                            label,
                            scope,
                            vs_mark,
                        });
                        return Ok(StepEvent::Continue);
                    }
                }
                let body = Rc::new((*stmt.body).clone());
                let target = stmt.left.clone();
                self.frames.push(Frame::ForInNext {
                    keys,
                    index: index + 1,
                    object,
                    stmt,
                    label,
                    scope,
                    vs_mark,
                });
                self.enter_loop_iteration(&target, JsValue::String(key), body)?;
            }
            Frame::ForOfSetup { stmt, label } => {
                let iterable = self.pop();
                let items = self
                    .iterable_items(&iterable)
                    .map_err(|e| e.at(stmt.span))?;
                self.frames.push(Frame::ForOfNext {
                    items: items.into(),
                    index: 0,
                    stmt,
                    label,
                    scope: self.scope.clone(),
                    vs_mark: self.values.len(),
                });
            }
            Frame::ForOfNext {
                items,
                index,
                stmt,
                label,
                scope,
                vs_mark,
            } => {
                if index >= items.len() {
                    return Ok(StepEvent::Continue);
                }
                let item = items[index].clone();
                let body = Rc::new((*stmt.body).clone());
                let target = stmt.left.clone();
                self.frames.push(Frame::ForOfNext {
                    items,
                    index: index + 1,
                    stmt,
                    label,
                    scope,
                    vs_mark,
                });
                self.enter_loop_iteration(&target, item, body)?;
            }

            Frame::SwitchEval { stmt, label } => {
                let discriminant = self.pop();
                let prev = self.scope.clone();
                self.scope = Scope::new_declarative(prev.clone());
                let all: Vec<Statement> = stmt
                    .cases
                    .iter()
                    .flat_map(|c| c.consequent.iter().cloned())
                    .collect();
                self.hoist_into_block_scope(&all)?;
                self.frames.push(Frame::RestoreScope(prev));
                self.frames.push(Frame::SwitchMatch {
                    stmt,
                    index: 0,
                    discriminant,
                    label,
                    scope: self.scope.clone(),
                    vs_mark: self.values.len(),
                });
            }
            Frame::SwitchMatch {
                stmt,
                index,
                discriminant,
                label,
                scope,
                vs_mark,
            } => {
                if index >= stmt.cases.len() {
                    // No test matched: run from `default` if present.
                    if let Some(default_index) =
                        stmt.cases.iter().position(|c| c.test.is_none())
                    {
                        self.push_switch_body(&stmt, default_index, label, scope, vs_mark);
                    }
                    return Ok(StepEvent::Continue);
                }
                match &stmt.cases[index].test {
                    None => {
                        self.frames.push(Frame::SwitchMatch {
                            stmt,
                            index: index + 1,
                            discriminant,
                            label,
                            scope,
                            vs_mark,
                        });
                    }
                    Some(test) => {
                        let test = Rc::new(test.clone());
                        self.frames.push(Frame::SwitchTestCmp {
                            stmt,
                            index,
                            discriminant,
                            label,
                            scope,
                            vs_mark,
                        });
                        self.frames.push(Frame::Expr(test));
                    }
                }
            }
            Frame::SwitchTestCmp {
                stmt,
                index,
                discriminant,
                label,
                scope,
                vs_mark,
            } => {
                let test = self.pop();
                if test.strict_equals(&discriminant) {
                    self.push_switch_body(&stmt, index, label, scope, vs_mark);
                } else {
                    self.frames.push(Frame::SwitchMatch {
                        stmt,
                        index: index + 1,
                        discriminant,
                        label,
                        scope,
                        vs_mark,
                    });
                }
            }
            Frame::SwitchBody { .. } => {}
            Frame::LabelBarrier { .. } => {}

            Frame::TryCatch { finalizer, .. } => {
                // Normal completion of the protected block.
                if let Some(finalizer) = finalizer {
                    self.frames.push(Frame::Stmt {
                        stmt: Rc::new(Statement::BlockStatement((*finalizer).clone())),
                        track: false,
                    });
                }
            }
            Frame::ResumeUnwind(completion) => {
                return Ok(StepEvent::Abrupt(completion));
            }

            Frame::BindPattern { pattern, mode } => {
                let value = self.pop();
                self.bind_pattern(&pattern, value, mode)?;
            }
            Frame::BindProperty {
                object,
                computed,
                static_key,
                seen,
                span,
            } => {
                let key = self.pop_key(computed, static_key)?;
                seen.borrow_mut().push(key.clone());
                let value = self.member_get(&object, &key, span)?;
                self.values.push(value);
            }
            Frame::BindObjectRest {
                pattern,
                object,
                seen,
                mode,
            } => {
                let rest = self.new_object();
                if let Some(src) = object.as_object() {
                    let keys = src.borrow().own_enumerable_keys();
                    let seen = seen.borrow();
                    for key in keys {
                        if seen.contains(&key) {
                            continue;
                        }
                        let value = self.own_get(src, &key)?;
                        rest.borrow_mut().insert(key, PropertyDescriptor::data(value));
                    }
                }
                self.frames.push(Frame::BindPattern { pattern, mode });
                self.values.push(JsValue::Object(rest));
            }
            Frame::InitializeBinding { name } => {
                let value = self.pop();
                self.scope.borrow_mut().initialize(name.as_str(), value)?;
            }

            Frame::ClassBuild {
                decl,
                has_super,
                computed_keys,
            } => {
                let mut keys = Vec::with_capacity(computed_keys);
                for _ in 0..computed_keys {
                    keys.push(self.pop());
                }
                keys.reverse();
                let super_value = if has_super { Some(self.pop()) } else { None };
                let class = self.build_class(&decl, super_value, keys)?;
                self.values.push(JsValue::Object(class));
            }

            Frame::ModuleBody { module } => {
                let program = module.borrow().program().ok_or_else(|| {
                    EngineError::internal("module body scheduled for synthetic module")
                })?;
                let env = module
                    .borrow()
                    .env
                    .clone()
                    .ok_or_else(|| EngineError::internal("module body before instantiation"))?;
                let prev_scope = self.scope.clone();
                self.scope = env;
                self.strict = true;
                // Module top-level `this` is undefined.
                self.this_value = JsValue::Undefined;
                // Function declarations materialize now, in the module env;
                // instantiation already created the slots.
                let decls = hoist::scan_statements(&program.body);
                for func in &decls.functions {
                    let value = self.declare_hoisted_function(func);
                    if let Some(id) = &func.id {
                        self.scope.borrow_mut().initialize(&id.name, value)?;
                    }
                }
                self.frames.push(Frame::RestoreScope(prev_scope));
                self.frames.push(Frame::StmtSeq {
                    stmts: program.body.clone().into(),
                    index: 0,
                    track: false,
                });
            }
            Frame::ModuleFinish { module } => {
                {
                    let mut m = module.borrow_mut();
                    if m.status == ModuleStatus::Evaluating {
                        m.set_status(ModuleStatus::Evaluated);
                    }
                }
                // Back to script context between module bodies.
                self.strict = false;
                let global = self.realm.borrow().global_object.clone();
                self.this_value = JsValue::Object(global);
            }
        }
        Ok(StepEvent::Continue)
    }

    fn push_switch_body(
        &mut self,
        stmt: &crate::ast::SwitchStatement,
        from: usize,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    ) {
        let body: Vec<Statement> = stmt
            .cases
            .iter()
            .skip(from)
            .flat_map(|c| c.consequent.iter().cloned())
            .collect();
        self.frames.push(Frame::SwitchBody {
            label,
            scope,
            vs_mark,
        });
        self.frames.push(Frame::StmtSeq {
            stmts: body.into(),
            index: 0,
            track: false,
        });
    }

    // ── statement dispatch ───────────────────────────────────────────

    fn dispatch_statement(
        &mut self,
        stmt: &Statement,
        track: bool,
        label: Option<JsString>,
    ) -> Result<StepEvent, EngineError> {
        match stmt {
            Statement::ExpressionStatement(s) => {
                if s.directive.is_some() {
                    return Ok(StepEvent::Continue);
                }
                self.frames.push(if track {
                    Frame::StoreCompletion
                } else {
                    Frame::PopValue
                });
                self.frames.push(Frame::Expr(Rc::new(s.expression.clone())));
            }
            Statement::VariableDeclaration(decl) => {
                let mode = match decl.kind {
                    VariableKind::Var => BindMode::Var,
                    VariableKind::Let | VariableKind::Const => BindMode::Lexical,
                };
                for declarator in decl.declarations.iter().rev() {
                    match &declarator.init {
                        Some(init) => {
                            self.frames.push(Frame::BindPattern {
                                pattern: Rc::new(declarator.id.clone()),
                                mode,
                            });
                            self.frames.push(Frame::Expr(Rc::new(init.clone())));
                        }
                        None => {
                            if mode == BindMode::Lexical {
                                self.frames.push(Frame::BindPattern {
                                    pattern: Rc::new(declarator.id.clone()),
                                    mode,
                                });
                                self.frames.push(Frame::PushValue(JsValue::Undefined));
                            }
                            // `var x;` is fully handled by hoisting.
                        }
                    }
                }
            }
            Statement::FunctionDeclaration(_) => {} // hoisted
            Statement::ClassDeclaration(decl) => {
                if let Some(id) = &decl.id {
                    self.frames.push(Frame::InitializeBinding {
                        name: JsString::from(id.name.as_str()),
                    });
                }
                self.push_class_frames(decl);
            }
            Statement::BlockStatement(block) => {
                let prev = self.scope.clone();
                self.scope = Scope::new_declarative(prev.clone());
                self.hoist_into_block_scope(&block.body)?;
                self.frames.push(Frame::RestoreScope(prev));
                self.frames.push(Frame::StmtSeq {
                    stmts: block.body.clone().into(),
                    index: 0,
                    track,
                });
            }
            Statement::IfStatement(s) => {
                self.frames.push(Frame::IfBranch {
                    consequent: Rc::new((*s.consequent).clone()),
                    alternate: s.alternate.as_ref().map(|a| Rc::new((**a).clone())),
                });
                self.frames.push(Frame::Expr(Rc::new(s.test.clone())));
            }
            Statement::WhileStatement(s) => {
                self.frames.push(Frame::WhileTest {
                    stmt: Rc::new(s.clone()),
                    label,
                    scope: self.scope.clone(),
                    vs_mark: self.values.len(),
                });
            }
            Statement::DoWhileStatement(s) => {
                let stmt = Rc::new(s.clone());
                let body = Rc::new((*s.body).clone());
                self.frames.push(Frame::DoWhileTest {
                    stmt,
                    label,
                    scope: self.scope.clone(),
                    vs_mark: self.values.len(),
                });
                self.frames.push(Frame::Stmt {
                    stmt: body,
                    track: false,
                });
            }
            Statement::ForStatement(s) => {
                let prev = self.scope.clone();
                self.scope = Scope::new_declarative(prev.clone());
                // Lexical loop heads live in the loop's own scope.
                if let Some(ForInit::Declaration(decl)) = &s.init {
                    if decl.kind != VariableKind::Var {
                        let mut names = Vec::new();
                        for d in &decl.declarations {
                            hoist::pattern_names(&d.id, &mut names);
                        }
                        let mutable = decl.kind == VariableKind::Let;
                        for name in names {
                            self.scope.borrow_mut().declare_lexical(&name, mutable)?;
                        }
                    }
                }
                let stmt = Rc::new(s.clone());
                self.frames.push(Frame::RestoreScope(prev));
                self.frames.push(Frame::ForTest {
                    stmt,
                    label,
                    scope: self.scope.clone(),
                    vs_mark: self.values.len(),
                });
                match &s.init {
                    Some(ForInit::Declaration(decl)) => {
                        self.frames.push(Frame::Stmt {
                            stmt: Rc::new(Statement::VariableDeclaration(decl.clone())),
                            track: false,
                        });
                    }
                    Some(ForInit::Expression(expr)) => {
                        self.frames.push(Frame::PopValue);
                        self.frames.push(Frame::Expr(Rc::new((**expr).clone())));
                    }
                    None => {}
                }
            }
            Statement::ForInStatement(s) => {
                self.frames.push(Frame::ForInSetup {
                    stmt: Rc::new(s.clone()),
                    label,
                });
                self.frames.push(Frame::Expr(Rc::new(s.right.clone())));
            }
            Statement::ForOfStatement(s) => {
                self.frames.push(Frame::ForOfSetup {
                    stmt: Rc::new(s.clone()),
                    label,
                });
                self.frames.push(Frame::Expr(Rc::new(s.right.clone())));
            }
            Statement::SwitchStatement(s) => {
                self.frames.push(Frame::SwitchEval {
                    stmt: Rc::new(s.clone()),
                    label,
                });
                self.frames.push(Frame::Expr(Rc::new(s.discriminant.clone())));
            }
            Statement::TryStatement(s) => {
                self.frames.push(Frame::TryCatch {
                    handler: s.handler.clone().map(Rc::new),
                    finalizer: s.finalizer.clone().map(Rc::new),
                    scope: self.scope.clone(),
                    vs_mark: self.values.len(),
                });
                self.frames.push(Frame::Stmt {
                    stmt: Rc::new(Statement::BlockStatement(s.block.clone())),
                    track: false,
                });
            }
            Statement::ReturnStatement(s) => match &s.argument {
                Some(argument) => {
                    self.frames.push(Frame::ReturnValue);
                    self.frames.push(Frame::Expr(Rc::new(argument.clone())));
                }
                None => {
                    return Ok(StepEvent::Abrupt(Completion::Return(JsValue::Undefined)));
                }
            },
            Statement::ThrowStatement(s) => {
                self.frames.push(Frame::ThrowValue);
                self.frames.push(Frame::Expr(Rc::new(s.argument.clone())));
            }
            Statement::BreakStatement(s) => {
                let label = s.label.as_ref().map(|l| JsString::from(l.name.as_str()));
                return Ok(StepEvent::Abrupt(Completion::Break(label)));
            }
            Statement::ContinueStatement(s) => {
                let label = s.label.as_ref().map(|l| JsString::from(l.name.as_str()));
                return Ok(StepEvent::Abrupt(Completion::Continue(label)));
            }
            Statement::LabeledStatement(s) => {
                let name = JsString::from(s.label.name.as_str());
                match s.body.as_ref() {
                    body @ (Statement::WhileStatement(_)
                    | Statement::DoWhileStatement(_)
                    | Statement::ForStatement(_)
                    | Statement::ForInStatement(_)
                    | Statement::ForOfStatement(_)
                    | Statement::SwitchStatement(_)) => {
                        return self.dispatch_statement(body, false, Some(name));
                    }
                    body => {
                        self.frames.push(Frame::LabelBarrier {
                            label: name,
                            scope: self.scope.clone(),
                            vs_mark: self.values.len(),
                        });
                        self.frames.push(Frame::Stmt {
                            stmt: Rc::new(body.clone()),
                            track: false,
                        });
                    }
                }
            }
            Statement::EmptyStatement(_) | Statement::DebuggerStatement(_) => {}

            Statement::ImportDeclaration(_) | Statement::ExportAllDeclaration(_) => {}
            Statement::ExportNamedDeclaration(export) => {
                if let Some(decl) = &export.declaration {
                    return self.dispatch_statement(decl, false, None);
                }
            }
            Statement::ExportDefaultDeclaration(export) => {
                self.frames.push(Frame::InitializeBinding {
                    name: JsString::from(DEFAULT_EXPORT_BINDING),
                });
                self.frames
                    .push(Frame::Expr(Rc::new((*export.declaration).clone())));
            }
        }
        Ok(StepEvent::Continue)
    }

    /// Bind a for-in/for-of head target and push the iteration body.
    fn enter_loop_iteration(
        &mut self,
        target: &ForTarget,
        value: JsValue,
        body: Rc<Statement>,
    ) -> Result<(), EngineError> {
        let prev = self.scope.clone();
        self.scope = Scope::new_declarative(prev.clone());
        self.frames.push(Frame::RestoreScope(prev));
        self.frames.push(Frame::Stmt {
            stmt: body,
            track: false,
        });
        let (pattern, mode) = match target {
            ForTarget::VariableDeclaration(decl) => {
                let declarator = decl.declarations.first().ok_or_else(|| {
                    EngineError::internal("for loop head declaration without declarator")
                })?;
                let mode = match decl.kind {
                    VariableKind::Var => BindMode::Var,
                    VariableKind::Let | VariableKind::Const => {
                        let mut names = Vec::new();
                        hoist::pattern_names(&declarator.id, &mut names);
                        let mutable = decl.kind == VariableKind::Let;
                        for name in names {
                            self.scope.borrow_mut().declare_lexical(&name, mutable)?;
                        }
                        BindMode::Lexical
                    }
                };
                (declarator.id.clone(), mode)
            }
            ForTarget::Identifier(id) => (Pattern::Identifier(id.clone()), BindMode::Assign),
            ForTarget::ObjectPattern(p) => (Pattern::ObjectPattern(p.clone()), BindMode::Assign),
            ForTarget::ArrayPattern(p) => (Pattern::ArrayPattern(p.clone()), BindMode::Assign),
        };
        self.frames.push(Frame::BindPattern {
            pattern: Rc::new(pattern),
            mode,
        });
        self.frames.push(Frame::PushValue(value));
        Ok(())
    }

    // ── expression dispatch ──────────────────────────────────────────

    fn dispatch_expression(&mut self, expr: &Expression) -> Result<StepEvent, EngineError> {
        match expr {
            Expression::Identifier(id) => {
                let value = self.read_name(&id.name).map_err(|e| e.at(id.span))?;
                self.values.push(value);
            }
            Expression::Literal(lit) => {
                self.values.push(literal_value(&lit.value));
            }
            Expression::TemplateLiteral(t) => {
                self.frames.push(Frame::TemplateConcat {
                    quasis: t.quasis.clone().into(),
                    count: t.expressions.len(),
                });
                for e in t.expressions.iter().rev() {
                    self.frames.push(Frame::Expr(Rc::new(e.clone())));
                }
            }
            Expression::ThisExpression(_) => {
                self.values.push(self.this_value.clone());
            }
            Expression::ArrayExpression(a) => {
                let array = self.new_array(Vec::new());
                self.frames
                    .push(Frame::PushValue(JsValue::Object(array.clone())));
                for element in a.elements.iter().rev() {
                    match element {
                        None => self.frames.push(Frame::ArrayHole {
                            array: array.clone(),
                        }),
                        Some(Expression::SpreadElement(spread)) => {
                            self.frames.push(Frame::ArrayAppend {
                                array: array.clone(),
                                spread: true,
                                span: spread.span,
                            });
                            self.frames
                                .push(Frame::Expr(Rc::new((*spread.argument).clone())));
                        }
                        Some(e) => {
                            self.frames.push(Frame::ArrayAppend {
                                array: array.clone(),
                                spread: false,
                                span: e.span(),
                            });
                            self.frames.push(Frame::Expr(Rc::new(e.clone())));
                        }
                    }
                }
            }
            Expression::ObjectExpression(o) => {
                let object = self.new_object();
                self.frames
                    .push(Frame::PushValue(JsValue::Object(object.clone())));
                for member in o.properties.iter().rev() {
                    match member {
                        ObjectMember::SpreadElement(spread) => {
                            self.frames.push(Frame::ObjectSpread {
                                object: object.clone(),
                            });
                            self.frames
                                .push(Frame::Expr(Rc::new((*spread.argument).clone())));
                        }
                        ObjectMember::Property(prop) => {
                            let static_key = if prop.computed {
                                None
                            } else {
                                Some(property_name_key(&prop.key)?)
                            };
                            self.frames.push(Frame::ObjectDefineMember {
                                object: object.clone(),
                                kind: prop.kind,
                                static_key,
                            });
                            self.frames.push(Frame::Expr(Rc::new(prop.value.clone())));
                            if prop.computed {
                                self.frames.push(Frame::Expr(Rc::new(prop.key.clone())));
                            }
                        }
                    }
                }
            }
            Expression::FunctionExpression(f) => {
                let name = f.id.as_ref().map(|id| JsString::from(id.name.as_str()));
                let obj = self.make_function_value(
                    name,
                    f.params.clone().into(),
                    FunctionBody::Block(f.body.clone()),
                    FunctionKind::Normal,
                    f.span,
                );
                self.values.push(JsValue::Object(obj));
            }
            Expression::ArrowFunctionExpression(f) => {
                let body = match &f.body {
                    ArrowBody::Block(block) => FunctionBody::Block(block.clone()),
                    ArrowBody::Expression(e) => FunctionBody::Expression((**e).clone()),
                };
                let obj = self.make_function_value(
                    None,
                    f.params.clone().into(),
                    body,
                    FunctionKind::Arrow,
                    f.span,
                );
                self.values.push(JsValue::Object(obj));
            }
            Expression::ClassExpression(decl) => {
                self.push_class_frames(decl);
            }
            Expression::UnaryExpression(u) => match u.operator {
                UnaryOp::TypeOf => {
                    if let Expression::Identifier(id) = u.argument.as_ref() {
                        // `typeof unresolved` is "undefined", not a throw.
                        let tag = match environment::lookup_optional(&self.scope, &id.name)? {
                            None => "undefined",
                            Some(Resolved::Value(v)) => v.type_of(),
                            Some(Resolved::Accessor { getter, receiver }) => {
                                let v = self.call_function(
                                    &JsValue::Object(getter),
                                    receiver,
                                    &[],
                                )?;
                                v.type_of()
                            }
                        };
                        self.values.push(JsValue::from(tag));
                    } else {
                        self.frames.push(Frame::UnaryApply {
                            op: u.operator,
                            span: u.span,
                        });
                        self.frames.push(Frame::Expr(Rc::new((*u.argument).clone())));
                    }
                }
                UnaryOp::Delete => match u.argument.as_ref() {
                    Expression::MemberExpression(m) => {
                        self.frames.push(Frame::DeleteMember {
                            computed: m.computed,
                            static_key: if m.computed {
                                None
                            } else {
                                Some(property_name_key(&m.property)?)
                            },
                            span: m.span,
                        });
                        if m.computed {
                            self.frames.push(Frame::Expr(Rc::new((*m.property).clone())));
                        }
                        self.frames.push(Frame::Expr(Rc::new((*m.object).clone())));
                    }
                    _ => {
                        // `delete` on a non-reference evaluates to true.
                        self.values.push(JsValue::Boolean(true));
                    }
                },
                _ => {
                    self.frames.push(Frame::UnaryApply {
                        op: u.operator,
                        span: u.span,
                    });
                    self.frames.push(Frame::Expr(Rc::new((*u.argument).clone())));
                }
            },
            Expression::UpdateExpression(u) => match u.argument.as_ref() {
                Expression::Identifier(id) => {
                    let old = JsValue::Number(
                        self.read_name(&id.name).map_err(|e| e.at(u.span))?.to_number(),
                    );
                    let delta = if u.operator == UpdateOp::Increment {
                        1.0
                    } else {
                        -1.0
                    };
                    let new = JsValue::Number(old.to_number() + delta);
                    self.assign_name(&id.name, new.clone())
                        .map_err(|e| e.at(u.span))?;
                    self.values.push(if u.prefix { new } else { old });
                }
                Expression::MemberExpression(m) => {
                    self.frames.push(Frame::UpdateMember {
                        computed: m.computed,
                        static_key: if m.computed {
                            None
                        } else {
                            Some(property_name_key(&m.property)?)
                        },
                        op: u.operator,
                        prefix: u.prefix,
                        span: u.span,
                    });
                    if m.computed {
                        self.frames.push(Frame::Expr(Rc::new((*m.property).clone())));
                    }
                    self.frames.push(Frame::Expr(Rc::new((*m.object).clone())));
                }
                _ => {
                    return Err(EngineError::syntax("invalid update expression target")
                        .at(u.span));
                }
            },
            Expression::BinaryExpression(b) => {
                self.frames.push(Frame::BinaryApply {
                    op: b.operator,
                    span: b.span,
                });
                self.frames.push(Frame::Expr(Rc::new((*b.right).clone())));
                self.frames.push(Frame::Expr(Rc::new((*b.left).clone())));
            }
            Expression::LogicalExpression(l) => {
                self.frames.push(Frame::LogicalRight {
                    op: l.operator,
                    right: Rc::new((*l.right).clone()),
                });
                self.frames.push(Frame::Expr(Rc::new((*l.left).clone())));
            }
            Expression::AssignmentExpression(a) => self.dispatch_assignment(a)?,
            Expression::ConditionalExpression(c) => {
                self.frames.push(Frame::CondBranch {
                    consequent: Rc::new((*c.consequent).clone()),
                    alternate: Rc::new((*c.alternate).clone()),
                });
                self.frames.push(Frame::Expr(Rc::new((*c.test).clone())));
            }
            Expression::CallExpression(c) => self.dispatch_call(c)?,
            Expression::NewExpression(n) => {
                let args = new_args();
                self.frames.push(Frame::Invoke {
                    args: args.clone(),
                    kind: InvokeKind::New,
                    optional: false,
                    span: n.span,
                });
                self.push_argument_frames(&args, &n.arguments);
                self.frames.push(Frame::Expr(Rc::new((*n.callee).clone())));
            }
            Expression::MemberExpression(m) => {
                self.frames.push(Frame::GetMember {
                    computed: m.computed,
                    optional: m.optional,
                    static_key: if m.computed {
                        None
                    } else {
                        Some(property_name_key(&m.property)?)
                    },
                    span: m.span,
                });
                if m.computed {
                    self.frames.push(Frame::Expr(Rc::new((*m.property).clone())));
                }
                self.frames.push(Frame::Expr(Rc::new((*m.object).clone())));
            }
            Expression::SequenceExpression(s) => {
                for (i, e) in s.expressions.iter().enumerate().rev() {
                    if i + 1 != s.expressions.len() {
                        self.frames.push(Frame::PopValue);
                    }
                    self.frames.push(Frame::Expr(Rc::new(e.clone())));
                }
            }
            Expression::SpreadElement(s) => {
                return Err(
                    EngineError::syntax("spread is only valid in calls and literals").at(s.span)
                );
            }
            Expression::Super(s) => {
                return Err(EngineError::syntax("'super' is only valid in constructors")
                    .at(s.span));
            }
        }
        Ok(StepEvent::Continue)
    }

    fn dispatch_assignment(
        &mut self,
        a: &crate::ast::AssignmentExpression,
    ) -> Result<(), EngineError> {
        let binary = a.operator.binary_op();
        match &a.left {
            AssignmentTarget::Identifier(id) => {
                self.frames.push(Frame::AssignIdent {
                    name: JsString::from(id.name.as_str()),
                    span: a.span,
                });
                match binary {
                    None => {
                        self.frames.push(Frame::Expr(Rc::new((*a.right).clone())));
                    }
                    Some(op) => {
                        self.frames.push(Frame::BinaryApply { op, span: a.span });
                        self.frames.push(Frame::Expr(Rc::new((*a.right).clone())));
                        self.frames
                            .push(Frame::Expr(Rc::new(Expression::Identifier(id.clone()))));
                    }
                }
            }
            AssignmentTarget::MemberExpression(m) => {
                let static_key = if m.computed {
                    None
                } else {
                    Some(property_name_key(&m.property)?)
                };
                self.frames.push(Frame::SetMember {
                    computed: m.computed,
                    static_key: static_key.clone(),
                    span: a.span,
                });
                match binary {
                    None => {
                        self.frames.push(Frame::Expr(Rc::new((*a.right).clone())));
                    }
                    Some(op) => {
                        self.frames.push(Frame::BinaryApply { op, span: a.span });
                        self.frames.push(Frame::Expr(Rc::new((*a.right).clone())));
                        self.frames.push(Frame::GetMemberKeep {
                            computed: m.computed,
                            static_key,
                            span: m.span,
                        });
                    }
                }
                if m.computed && binary.is_none() {
                    self.frames.push(Frame::Expr(Rc::new((*m.property).clone())));
                }
                if binary.is_none() {
                    self.frames.push(Frame::Expr(Rc::new((*m.object).clone())));
                } else {
                    // GetMemberKeep re-pushes object [and key] beneath the
                    // current value, so evaluate them once, first.
                    if m.computed {
                        self.frames.push(Frame::Expr(Rc::new((*m.property).clone())));
                    }
                    self.frames.push(Frame::Expr(Rc::new((*m.object).clone())));
                }
            }
            AssignmentTarget::ObjectPattern(p) => {
                self.frames.push(Frame::BindPattern {
                    pattern: Rc::new(Pattern::ObjectPattern(p.clone())),
                    mode: BindMode::Assign,
                });
                self.frames.push(Frame::DupTop);
                self.frames.push(Frame::Expr(Rc::new((*a.right).clone())));
            }
            AssignmentTarget::ArrayPattern(p) => {
                self.frames.push(Frame::BindPattern {
                    pattern: Rc::new(Pattern::ArrayPattern(p.clone())),
                    mode: BindMode::Assign,
                });
                self.frames.push(Frame::DupTop);
                self.frames.push(Frame::Expr(Rc::new((*a.right).clone())));
            }
        }
        Ok(())
    }

    fn dispatch_call(&mut self, c: &crate::ast::CallExpression) -> Result<(), EngineError> {
        let args = new_args();
        self.frames.push(Frame::Invoke {
            args: args.clone(),
            kind: InvokeKind::Call,
            optional: c.optional,
            span: c.span,
        });
        self.push_argument_frames(&args, &c.arguments);
        match c.callee.as_ref() {
            Expression::MemberExpression(m) => {
                self.frames.push(Frame::GetMethod {
                    computed: m.computed,
                    optional: m.optional,
                    static_key: if m.computed {
                        None
                    } else {
                        Some(property_name_key(&m.property)?)
                    },
                    span: m.span,
                });
                if m.computed {
                    self.frames.push(Frame::Expr(Rc::new((*m.property).clone())));
                }
                self.frames.push(Frame::Expr(Rc::new((*m.object).clone())));
            }
            Expression::Super(s) => {
                let super_ctor = self.super_ctor.clone().ok_or_else(|| {
                    EngineError::syntax("'super' is only valid in derived constructors").at(s.span)
                })?;
                self.frames
                    .push(Frame::PushValue(JsValue::Object(super_ctor)));
                self.frames.push(Frame::PushValue(self.this_value.clone()));
            }
            callee => {
                self.frames.push(Frame::Expr(Rc::new(callee.clone())));
                self.frames.push(Frame::PushValue(JsValue::Undefined));
            }
        }
        Ok(())
    }

    fn push_argument_frames(&mut self, args: &ArgsRef, arguments: &[Expression]) {
        for arg in arguments.iter().rev() {
            match arg {
                Expression::SpreadElement(spread) => {
                    self.frames.push(Frame::PushArg {
                        args: args.clone(),
                        spread: true,
                        span: spread.span,
                    });
                    self.frames
                        .push(Frame::Expr(Rc::new((*spread.argument).clone())));
                }
                _ => {
                    self.frames.push(Frame::PushArg {
                        args: args.clone(),
                        spread: false,
                        span: arg.span(),
                    });
                    self.frames.push(Frame::Expr(Rc::new(arg.clone())));
                }
            }
        }
    }

    fn push_class_frames(&mut self, decl: &crate::ast::ClassDeclaration) {
        let computed: Vec<Expression> = decl
            .body
            .body
            .iter()
            .filter(|m| m.computed)
            .map(|m| m.key.clone())
            .collect();
        self.frames.push(Frame::ClassBuild {
            decl: Rc::new(decl.clone()),
            has_super: decl.super_class.is_some(),
            computed_keys: computed.len(),
        });
        for key in computed.into_iter().rev() {
            self.frames.push(Frame::Expr(Rc::new(key)));
        }
        if let Some(super_class) = &decl.super_class {
            self.frames.push(Frame::Expr(Rc::new((**super_class).clone())));
        }
    }

    // ── invocation ───────────────────────────────────────────────────

    fn invoke(
        &mut self,
        args: ArgsRef,
        kind: InvokeKind,
        optional: bool,
        span: Span,
    ) -> Result<StepEvent, EngineError> {
        let func = self.pop();
        let this = if kind == InvokeKind::Call {
            self.pop()
        } else {
            JsValue::Undefined
        };
        if optional && func.is_null_or_undefined() {
            self.values.push(JsValue::Undefined);
            return Ok(StepEvent::Continue);
        }
        let func_obj = func
            .as_object()
            .filter(|o| o.borrow().is_callable())
            .cloned()
            .ok_or_else(|| {
                EngineError::type_error(format!("{} is not a function", func.to_js_string()))
                    .at(span)
            })?;
        let function = match &func_obj.borrow().exotic {
            ExoticObject::Function(f) => f.clone(),
            _ => unreachable!(),
        };
        let args = args.borrow().clone();
        match function {
            JsFunction::Native(native) => {
                if kind == InvokeKind::New && !native.constructable {
                    return Err(EngineError::type_error(format!(
                        "{} is not a constructor",
                        native.name
                    ))
                    .at(span));
                }
                let result = (native.func)(self, this, &args)?;
                self.values.push(result);
            }
            JsFunction::Interpreted(f) => match kind {
                InvokeKind::Call => {
                    self.push_interpreted_call(&f, this, args);
                }
                InvokeKind::New => {
                    if !matches!(f.kind, FunctionKind::Normal | FunctionKind::Constructor) {
                        return Err(
                            EngineError::type_error("value is not a constructor").at(span)
                        );
                    }
                    let proto = func_obj
                        .borrow()
                        .get_own(&PropertyKey::from("prototype"))
                        .and_then(PropertyDescriptor::data_value)
                        .and_then(|v| v.as_object().cloned())
                        .unwrap_or_else(|| self.realm.borrow().intrinsics.object_prototype.clone());
                    let this_obj = JsObject::with_prototype(Some(proto)).into_ref();
                    self.frames.push(Frame::FinishNew {
                        this_obj: this_obj.clone(),
                    });
                    self.push_interpreted_call(&f, JsValue::Object(this_obj), args);
                }
            },
        }
        Ok(StepEvent::Continue)
    }

    fn push_interpreted_call(&mut self, f: &InterpretedFunction, this: JsValue, args: Vec<JsValue>) {
        self.frames.push(Frame::FunctionTeardown {
            scope: self.scope.clone(),
            vs_mark: self.values.len(),
            strict: self.strict,
            this_value: self.this_value.clone(),
            super_ctor: self.super_ctor.clone(),
        });

        self.scope = Scope::new_function(f.closure.clone());
        self.strict = f.strict;
        self.super_ctor = f.super_constructor.clone();
        self.this_value = match (&f.kind, &f.captured_this) {
            (FunctionKind::Arrow, Some(captured)) => (**captured).clone(),
            _ => {
                if !f.strict && this.is_null_or_undefined() {
                    JsValue::Object(self.realm.borrow().global_object.clone())
                } else {
                    this
                }
            }
        };

        // Body frames first so parameter binding runs before them.
        match f.body.as_ref() {
            FunctionBody::Block(block) => {
                // Hoisting of the body happens now, in the fresh scope.
                // Errors here surface when the first body frame runs.
                let stmts: Rc<[Statement]> = block.body.clone().into();
                if let Err(err) = self.hoist_into_current_scope(&block.body) {
                    self.frames.push(Frame::ThrowValue);
                    self.frames.push(Frame::PushValue(self.error_value(err)));
                } else {
                    self.frames.push(Frame::StmtSeq {
                        stmts,
                        index: 0,
                        track: false,
                    });
                }
            }
            FunctionBody::Expression(expr) => {
                self.frames.push(Frame::ReturnValue);
                self.frames.push(Frame::Expr(Rc::new(expr.clone())));
            }
        }

        for (i, param) in f.params.iter().enumerate().rev() {
            match param {
                Pattern::RestElement(rest) => {
                    let remaining: Vec<JsValue> =
                        args.iter().skip(i).cloned().collect();
                    let array = self.new_array(remaining);
                    self.frames.push(Frame::BindPattern {
                        pattern: Rc::new((*rest.argument).clone()),
                        mode: BindMode::Var,
                    });
                    self.frames.push(Frame::PushValue(JsValue::Object(array)));
                }
                _ => {
                    let value = args.get(i).cloned().unwrap_or(JsValue::Undefined);
                    self.frames.push(Frame::BindPattern {
                        pattern: Rc::new(param.clone()),
                        mode: BindMode::Var,
                    });
                    self.frames.push(Frame::PushValue(value));
                }
            }
        }
    }

    // ── classes ──────────────────────────────────────────────────────

    fn build_class(
        &mut self,
        decl: &crate::ast::ClassDeclaration,
        super_value: Option<JsValue>,
        computed_keys: Vec<JsValue>,
    ) -> Result<JsObjectRef, EngineError> {
        let intrinsics = self.realm.borrow().intrinsics.clone();
        let (parent_proto, parent_ctor) = match &super_value {
            Some(JsValue::Null) => (None, None),
            Some(value) => {
                let ctor = value
                    .as_object()
                    .filter(|o| o.borrow().is_callable())
                    .cloned()
                    .ok_or_else(|| {
                        EngineError::type_error("class extends value is not a constructor")
                    })?;
                let proto = ctor
                    .borrow()
                    .get_own(&PropertyKey::from("prototype"))
                    .and_then(PropertyDescriptor::data_value)
                    .and_then(|v| v.as_object().cloned());
                (proto, Some(ctor))
            }
            None => (Some(intrinsics.object_prototype.clone()), None),
        };

        let prototype = JsObject::with_prototype(parent_proto).into_ref();
        let name = decl.id.as_ref().map(|id| JsString::from(id.name.as_str()));

        // The constructor body, or an empty default.
        let ctor_method = decl
            .body
            .body
            .iter()
            .find(|m| m.kind == MethodKind::Constructor);
        let (params, body, span): (Rc<[Pattern]>, FunctionBody, Span) = match ctor_method {
            Some(m) => (
                m.value.params.clone().into(),
                FunctionBody::Block(m.value.body.clone()),
                m.value.span,
            ),
            None => (
                Vec::new().into(),
                FunctionBody::Block(crate::ast::BlockStatement {
                    body: Vec::new(),
                    span: decl.span,
                }),
                decl.span,
            ),
        };
        let ctor_fn = InterpretedFunction {
            name: name.clone(),
            params,
            body: Rc::new(body),
            closure: self.scope.clone(),
            kind: FunctionKind::Constructor,
            captured_this: None,
            super_constructor: parent_ctor.clone(),
            strict: true,
            span,
        };
        let ctor_obj = {
            let mut obj = JsObject::with_prototype(Some(
                parent_ctor.unwrap_or_else(|| intrinsics.function_prototype.clone()),
            ));
            obj.exotic = ExoticObject::Function(JsFunction::Interpreted(ctor_fn));
            obj.insert(
                PropertyKey::from("name"),
                PropertyDescriptor::data_with(
                    JsValue::String(name.unwrap_or_else(|| JsString::from(""))),
                    false,
                    false,
                    true,
                ),
            );
            obj.into_ref()
        };
        ctor_obj.borrow_mut().insert(
            PropertyKey::from("prototype"),
            PropertyDescriptor::data_with(JsValue::Object(prototype.clone()), false, false, false),
        );
        prototype.borrow_mut().insert(
            PropertyKey::from("constructor"),
            PropertyDescriptor::data_with(JsValue::Object(ctor_obj.clone()), true, false, true),
        );

        // Methods, in source order; computed keys were evaluated already.
        let mut computed_iter = computed_keys.into_iter();
        for method in &decl.body.body {
            if method.kind == MethodKind::Constructor {
                continue;
            }
            let key = if method.computed {
                let value = computed_iter.next().ok_or_else(|| {
                    EngineError::internal("missing computed class member key")
                })?;
                PropertyKey::from_value(&value)
            } else {
                property_name_key(&method.key)?
            };
            let fn_kind = match method.kind {
                MethodKind::Get => FunctionKind::Getter,
                MethodKind::Set => FunctionKind::Setter,
                _ => FunctionKind::Method,
            };
            let method_name = match &key {
                PropertyKey::Symbol(_) => None,
                other => Some(JsString::from(other.to_string())),
            };
            let func = InterpretedFunction {
                name: method_name.clone(),
                params: method.value.params.clone().into(),
                body: Rc::new(FunctionBody::Block(method.value.body.clone())),
                closure: self.scope.clone(),
                kind: fn_kind,
                captured_this: None,
                super_constructor: None,
                strict: true,
                span: method.value.span,
            };
            let func_obj =
                self.function_object(JsFunction::Interpreted(func), method_name, fn_kind);
            let target = if method.is_static {
                &ctor_obj
            } else {
                &prototype
            };
            match fn_kind {
                FunctionKind::Getter | FunctionKind::Setter => {
                    let existing = target.borrow().get_own(&key);
                    let (mut get, mut set) = match existing {
                        Some(PropertyDescriptor::Accessor { get, set, .. }) => (get, set),
                        _ => (None, None),
                    };
                    if fn_kind == FunctionKind::Getter {
                        get = Some(func_obj);
                    } else {
                        set = Some(func_obj);
                    }
                    target.borrow_mut().insert(
                        key,
                        PropertyDescriptor::Accessor {
                            get,
                            set,
                            enumerable: false,
                            configurable: true,
                        },
                    );
                }
                _ => {
                    target.borrow_mut().insert(
                        key,
                        PropertyDescriptor::data_with(
                            JsValue::Object(func_obj),
                            true,
                            false,
                            true,
                        ),
                    );
                }
            }
        }
        Ok(ctor_obj)
    }

    // ── patterns ─────────────────────────────────────────────────────

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: JsValue,
        mode: BindMode,
    ) -> Result<(), EngineError> {
        match pattern {
            Pattern::Identifier(id) => self.bind_name(&id.name, value, mode),
            Pattern::AssignmentPattern(assign) => {
                // Defaults apply only to `undefined`, not other falsy values.
                if matches!(value, JsValue::Undefined) {
                    self.frames.push(Frame::BindPattern {
                        pattern: Rc::new((*assign.left).clone()),
                        mode,
                    });
                    self.frames.push(Frame::Expr(Rc::new((*assign.right).clone())));
                } else {
                    self.frames.push(Frame::BindPattern {
                        pattern: Rc::new((*assign.left).clone()),
                        mode,
                    });
                    self.frames.push(Frame::PushValue(value));
                }
                Ok(())
            }
            Pattern::ObjectPattern(obj_pattern) => {
                if value.is_null_or_undefined() {
                    return Err(EngineError::type_error(format!(
                        "cannot destructure {}",
                        value.to_js_string()
                    ))
                    .at(obj_pattern.span));
                }
                let seen: SeenKeys = Rc::new(std::cell::RefCell::new(Vec::new()));
                for item in obj_pattern.properties.iter().rev() {
                    match item {
                        ObjectPatternItem::RestElement(rest) => {
                            self.frames.push(Frame::BindObjectRest {
                                pattern: Rc::new((*rest.argument).clone()),
                                object: value.clone(),
                                seen: seen.clone(),
                                mode,
                            });
                        }
                        ObjectPatternItem::Property(prop) => {
                            self.frames.push(Frame::BindPattern {
                                pattern: Rc::new((*prop.value).clone()),
                                mode,
                            });
                            self.frames.push(Frame::BindProperty {
                                object: value.clone(),
                                computed: prop.computed,
                                static_key: if prop.computed {
                                    None
                                } else {
                                    Some(property_name_key(&prop.key)?)
                                },
                                seen: seen.clone(),
                                span: obj_pattern.span,
                            });
                            if prop.computed {
                                self.frames.push(Frame::Expr(Rc::new(prop.key.clone())));
                            }
                        }
                    }
                }
                Ok(())
            }
            Pattern::ArrayPattern(arr_pattern) => {
                let items = self.iterable_items(&value).map_err(|e| e.at(arr_pattern.span))?;
                let mut rest_bound = false;
                for (i, element) in arr_pattern.elements.iter().enumerate().rev() {
                    let Some(element) = element else { continue };
                    if let Pattern::RestElement(rest) = element {
                        let remaining: Vec<JsValue> = items.iter().skip(i).cloned().collect();
                        let array = self.new_array(remaining);
                        self.frames.push(Frame::BindPattern {
                            pattern: Rc::new((*rest.argument).clone()),
                            mode,
                        });
                        self.frames.push(Frame::PushValue(JsValue::Object(array)));
                        rest_bound = true;
                        continue;
                    }
                    let item = items.get(i).cloned().unwrap_or(JsValue::Undefined);
                    self.frames.push(Frame::BindPattern {
                        pattern: Rc::new(element.clone()),
                        mode,
                    });
                    self.frames.push(Frame::PushValue(item));
                }
                let _ = rest_bound;
                Ok(())
            }
            Pattern::RestElement(rest) => {
                self.frames.push(Frame::BindPattern {
                    pattern: Rc::new((*rest.argument).clone()),
                    mode,
                });
                self.values.push(value);
                Ok(())
            }
        }
    }

    fn bind_name(&mut self, name: &str, value: JsValue, mode: BindMode) -> Result<(), EngineError> {
        match mode {
            BindMode::Var => {
                // Hoisting pre-declared the slot; write through it. The
                // global record delegates to its backing object instead.
                let target = environment::var_scope(&self.scope);
                let global_backed = target.borrow().backing_object.is_some();
                if global_backed {
                    environment::declare_var(&self.scope, name, value)
                } else {
                    let mut target_ref = target.borrow_mut();
                    if target_ref.has_local(name) {
                        target_ref.initialize(name, value)
                    } else {
                        target_ref.declare_var(name, value);
                        Ok(())
                    }
                }
            }
            BindMode::Lexical => {
                // The binding was pre-created by hoisting; find the scope
                // that owns it.
                let mut current = Some(self.scope.clone());
                while let Some(cur) = current {
                    if cur.borrow().has_local(name) {
                        return cur.borrow_mut().initialize(name, value);
                    }
                    let parent = cur.borrow().parent.clone();
                    current = parent;
                }
                Err(EngineError::internal(format!(
                    "lexical binding '{name}' was not hoisted"
                )))
            }
            BindMode::Assign => self.assign_name(name, value),
        }
    }

    // ── name resolution ──────────────────────────────────────────────

    fn read_name(&mut self, name: &str) -> Result<JsValue, EngineError> {
        match environment::lookup(&self.scope, name)? {
            Resolved::Value(value) => Ok(value),
            Resolved::Accessor { getter, receiver } => {
                self.call_function(&JsValue::Object(getter), receiver, &[])
            }
        }
    }

    fn assign_name(&mut self, name: &str, value: JsValue) -> Result<(), EngineError> {
        match environment::assign(&self.scope, name, value.clone())? {
            WriteOutcome::Done => Ok(()),
            WriteOutcome::Setter { setter, receiver } => {
                self.call_function(&JsValue::Object(setter), receiver, &[value])?;
                Ok(())
            }
        }
    }

    // ── property access ──────────────────────────────────────────────

    fn pop_key(
        &mut self,
        computed: bool,
        static_key: Option<PropertyKey>,
    ) -> Result<PropertyKey, EngineError> {
        if computed {
            let value = self.pop();
            Ok(PropertyKey::from_value(&value))
        } else {
            static_key.ok_or_else(|| EngineError::internal("missing static property key"))
        }
    }

    /// Full `get` including prototype walk and accessor invocation, with
    /// primitive receivers resolved against their boxed prototypes.
    pub fn member_get(
        &mut self,
        object: &JsValue,
        key: &PropertyKey,
        span: Span,
    ) -> Result<JsValue, EngineError> {
        match object {
            JsValue::Object(obj) => match get_property(obj, key)? {
                GetOutcome::Value(value) => Ok(value),
                GetOutcome::Getter(getter) => {
                    self.call_function(&JsValue::Object(getter), object.clone(), &[])
                }
                GetOutcome::Absent => Ok(JsValue::Undefined),
            },
            JsValue::String(s) => {
                if matches!(key, PropertyKey::String(k) if k == "length") {
                    return Ok(JsValue::Number(s.as_str().chars().count() as f64));
                }
                if let PropertyKey::Index(i) = key {
                    return Ok(s
                        .as_str()
                        .chars()
                        .nth(*i as usize)
                        .map(|c| JsValue::from(c.to_string()))
                        .unwrap_or(JsValue::Undefined));
                }
                let proto = self.realm.borrow().intrinsics.string_prototype.clone();
                self.proto_get(&proto, key, object)
            }
            JsValue::Number(_) => {
                let proto = self.realm.borrow().intrinsics.number_prototype.clone();
                self.proto_get(&proto, key, object)
            }
            JsValue::Boolean(_) => {
                let proto = self.realm.borrow().intrinsics.boolean_prototype.clone();
                self.proto_get(&proto, key, object)
            }
            JsValue::Undefined | JsValue::Null => Err(EngineError::type_error(format!(
                "cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            ))
            .at(span)),
            JsValue::Symbol(_) => Ok(JsValue::Undefined),
        }
    }

    fn proto_get(
        &mut self,
        proto: &JsObjectRef,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, EngineError> {
        match get_property(proto, key)? {
            GetOutcome::Value(value) => Ok(value),
            GetOutcome::Getter(getter) => {
                self.call_function(&JsValue::Object(getter), receiver.clone(), &[])
            }
            GetOutcome::Absent => Ok(JsValue::Undefined),
        }
    }

    /// Full `set` including setter invocation and strict-mode refusal.
    pub fn member_set(
        &mut self,
        object: &JsValue,
        key: &PropertyKey,
        value: JsValue,
        span: Span,
    ) -> Result<(), EngineError> {
        match object {
            JsValue::Object(obj) => match set_property(obj, key, value.clone())? {
                SetOutcome::Done => Ok(()),
                SetOutcome::Setter(setter) => {
                    self.call_function(&JsValue::Object(setter), object.clone(), &[value])?;
                    Ok(())
                }
                SetOutcome::Refused => {
                    if self.strict {
                        Err(EngineError::type_error(format!(
                            "cannot assign to read-only property {key}"
                        ))
                        .at(span))
                    } else {
                        Ok(())
                    }
                }
            },
            JsValue::Undefined | JsValue::Null => Err(EngineError::type_error(format!(
                "cannot set properties of {} (setting '{key}')",
                object.to_js_string()
            ))
            .at(span)),
            _ => {
                if self.strict {
                    Err(EngineError::type_error(format!(
                        "cannot create property {key} on primitive"
                    ))
                    .at(span))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Own-property read that still honors accessors.
    fn own_get(&mut self, obj: &JsObjectRef, key: &PropertyKey) -> Result<JsValue, EngineError> {
        let desc = obj.borrow().get_own(key);
        match desc {
            Some(PropertyDescriptor::Data { value, .. }) => Ok(value),
            Some(PropertyDescriptor::Accessor { get: Some(g), .. }) => {
                self.call_function(&JsValue::Object(g), JsValue::Object(obj.clone()), &[])
            }
            _ => Ok(JsValue::Undefined),
        }
    }

    // ── operators ────────────────────────────────────────────────────

    fn binary_op(
        &mut self,
        op: BinaryOp,
        left: &JsValue,
        right: &JsValue,
    ) -> Result<JsValue, EngineError> {
        Ok(match op {
            BinaryOp::Add => {
                let object_like =
                    matches!(left, JsValue::Object(_)) || matches!(right, JsValue::Object(_));
                let string_like =
                    matches!(left, JsValue::String(_)) || matches!(right, JsValue::String(_));
                if object_like || string_like {
                    let mut s = left.to_js_string().as_str().to_string();
                    s.push_str(right.to_js_string().as_str());
                    JsValue::from(s)
                } else {
                    JsValue::Number(left.to_number() + right.to_number())
                }
            }
            BinaryOp::Sub => JsValue::Number(left.to_number() - right.to_number()),
            BinaryOp::Mul => JsValue::Number(left.to_number() * right.to_number()),
            BinaryOp::Div => JsValue::Number(left.to_number() / right.to_number()),
            BinaryOp::Mod => JsValue::Number(left.to_number() % right.to_number()),
            BinaryOp::Exp => JsValue::Number(left.to_number().powf(right.to_number())),
            BinaryOp::Eq => JsValue::Boolean(left.loose_equals(right)),
            BinaryOp::NotEq => JsValue::Boolean(!left.loose_equals(right)),
            BinaryOp::StrictEq => JsValue::Boolean(left.strict_equals(right)),
            BinaryOp::StrictNotEq => JsValue::Boolean(!left.strict_equals(right)),
            BinaryOp::Lt => compare(left, right, |o| o == std::cmp::Ordering::Less),
            BinaryOp::LtEq => compare(left, right, |o| o != std::cmp::Ordering::Greater),
            BinaryOp::Gt => compare(left, right, |o| o == std::cmp::Ordering::Greater),
            BinaryOp::GtEq => compare(left, right, |o| o != std::cmp::Ordering::Less),
            BinaryOp::BitAnd => JsValue::Number((to_int32(left) & to_int32(right)) as f64),
            BinaryOp::BitOr => JsValue::Number((to_int32(left) | to_int32(right)) as f64),
            BinaryOp::BitXor => JsValue::Number((to_int32(left) ^ to_int32(right)) as f64),
            BinaryOp::LShift => {
                JsValue::Number((to_int32(left) << (to_uint32(right) & 31)) as f64)
            }
            BinaryOp::RShift => {
                JsValue::Number((to_int32(left) >> (to_uint32(right) & 31)) as f64)
            }
            BinaryOp::URShift => {
                JsValue::Number((to_uint32(left) >> (to_uint32(right) & 31)) as f64)
            }
            BinaryOp::In => {
                let obj = right.as_object().ok_or_else(|| {
                    EngineError::type_error(
                        "cannot use 'in' operator to search in a non-object",
                    )
                })?;
                let key = PropertyKey::from_value(left);
                JsValue::Boolean(crate::value::has_property(obj, &key)?)
            }
            BinaryOp::Instanceof => {
                let ctor = right
                    .as_object()
                    .filter(|o| o.borrow().is_callable())
                    .ok_or_else(|| {
                        EngineError::type_error("right-hand side of 'instanceof' is not callable")
                    })?;
                let target = ctor
                    .borrow()
                    .get_own(&PropertyKey::from("prototype"))
                    .and_then(PropertyDescriptor::data_value)
                    .and_then(|v| v.as_object().cloned());
                let Some(target) = target else {
                    return Ok(JsValue::Boolean(false));
                };
                let mut found = false;
                if let Some(obj) = left.as_object() {
                    let mut cursor = obj.borrow().prototype.clone();
                    let mut depth = 0;
                    while let Some(p) = cursor {
                        if Rc::ptr_eq(&p, &target) {
                            found = true;
                            break;
                        }
                        depth += 1;
                        if depth > 10_000 {
                            return Err(EngineError::internal(
                                "prototype chain exceeded maximum depth (cycle?)",
                            ));
                        }
                        cursor = p.borrow().prototype.clone();
                    }
                }
                JsValue::Boolean(found)
            }
        })
    }

    fn unary_op(&mut self, op: UnaryOp, value: &JsValue) -> Result<JsValue, EngineError> {
        Ok(match op {
            UnaryOp::Neg => JsValue::Number(-value.to_number()),
            UnaryOp::Pos => JsValue::Number(value.to_number()),
            UnaryOp::Not => JsValue::Boolean(!value.to_boolean()),
            UnaryOp::BitNot => JsValue::Number(!to_int32(value) as f64),
            UnaryOp::TypeOf => JsValue::from(value.type_of()),
            UnaryOp::Void => JsValue::Undefined,
            UnaryOp::Delete => JsValue::Boolean(true),
        })
    }

    /// The values a spread / for-of / array destructuring walks over.
    pub fn iterable_items(&mut self, value: &JsValue) -> Result<Vec<JsValue>, EngineError> {
        match value {
            JsValue::String(s) => Ok(s
                .as_str()
                .chars()
                .map(|c| JsValue::from(c.to_string()))
                .collect()),
            JsValue::Object(obj) => {
                enum Plan {
                    Array(u32),
                    Items(Vec<JsValue>),
                    Pairs(Vec<(JsValue, JsValue)>),
                }
                let plan = {
                    let obj_ref = obj.borrow();
                    match &obj_ref.exotic {
                        ExoticObject::Array { length, .. } => Plan::Array(*length),
                        ExoticObject::Set { entries } => Plan::Items(entries.clone()),
                        ExoticObject::Map { entries } => Plan::Pairs(entries.clone()),
                        _ => {
                            return Err(EngineError::type_error(format!(
                                "{} is not iterable",
                                value.to_js_string()
                            )));
                        }
                    }
                };
                match plan {
                    Plan::Array(length) => {
                        let mut items = Vec::with_capacity(length as usize);
                        for i in 0..length {
                            items.push(self.own_get(obj, &PropertyKey::Index(i))?);
                        }
                        Ok(items)
                    }
                    Plan::Items(items) => Ok(items),
                    Plan::Pairs(pairs) => Ok(pairs
                        .into_iter()
                        .map(|(k, v)| JsValue::Object(self.new_array(vec![k, v])))
                        .collect()),
                }
            }
            _ => Err(EngineError::type_error(format!(
                "{} is not iterable",
                value.to_js_string()
            ))),
        }
    }

    // ── unwinding ────────────────────────────────────────────────────

    /// Walk the frame stack downward until a frame handles the completion.
    /// Scopes restore and partial values truncate as handler marks pass.
    fn unwind(&mut self, completion: Completion) -> Result<(), EngineError> {
        loop {
            let Some(frame) = self.frames.pop() else {
                return match completion {
                    Completion::Throw(value) => Err(EngineError::thrown(value)),
                    Completion::Return(_) => {
                        Err(EngineError::internal("return outside of a function"))
                    }
                    Completion::Break(_) | Completion::Continue(_) => Err(
                        EngineError::internal("break or continue outside of a loop"),
                    ),
                };
            };
            match frame {
                Frame::RestoreScope(scope) => {
                    self.scope = scope;
                }
                Frame::TryCatch {
                    handler,
                    finalizer,
                    scope,
                    vs_mark,
                } => {
                    self.scope = scope.clone();
                    self.values.truncate(vs_mark);
                    if let (Completion::Throw(value), Some(handler)) = (&completion, &handler) {
                        // A throw inside the catch body still runs finally.
                        if let Some(finalizer) = &finalizer {
                            self.frames.push(Frame::TryCatch {
                                handler: None,
                                finalizer: Some(finalizer.clone()),
                                scope: scope.clone(),
                                vs_mark,
                            });
                        }
                        let prev = self.scope.clone();
                        self.scope = Scope::new_declarative(prev.clone());
                        self.frames.push(Frame::RestoreScope(prev));
                        self.frames.push(Frame::Stmt {
                            stmt: Rc::new(Statement::BlockStatement(handler.body.clone())),
                            track: false,
                        });
                        if let Some(param) = &handler.param {
                            let mut names = Vec::new();
                            hoist::pattern_names(param, &mut names);
                            for name in &names {
                                self.scope.borrow_mut().declare_lexical(name, true)?;
                            }
                            self.frames.push(Frame::BindPattern {
                                pattern: Rc::new(param.clone()),
                                mode: BindMode::Lexical,
                            });
                            self.frames.push(Frame::PushValue(value.clone()));
                        }
                        return Ok(());
                    }
                    if let Some(finalizer) = finalizer {
                        // Run the finalizer, then resume this completion.
                        self.frames.push(Frame::ResumeUnwind(completion));
                        self.frames.push(Frame::Stmt {
                            stmt: Rc::new(Statement::BlockStatement((*finalizer).clone())),
                            track: false,
                        });
                        return Ok(());
                    }
                }
                Frame::FunctionTeardown {
                    scope,
                    vs_mark,
                    strict,
                    this_value,
                    super_ctor,
                } => {
                    self.values.truncate(vs_mark);
                    self.scope = scope;
                    self.strict = strict;
                    self.this_value = this_value;
                    self.super_ctor = super_ctor;
                    match completion {
                        Completion::Return(value) => {
                            self.values.push(value);
                            return Ok(());
                        }
                        Completion::Throw(_) => continue,
                        Completion::Break(_) | Completion::Continue(_) => {
                            return Err(EngineError::internal(
                                "break or continue crossed a function boundary",
                            ));
                        }
                    }
                }
                Frame::WhileTest {
                    ref label,
                    ref scope,
                    vs_mark,
                    ..
                }
                | Frame::DoWhileTest {
                    ref label,
                    ref scope,
                    vs_mark,
                    ..
                }
                | Frame::ForUpdate {
                    ref label,
                    ref scope,
                    vs_mark,
                    ..
                }
                | Frame::ForInNext {
                    ref label,
                    ref scope,
                    vs_mark,
                    ..
                }
                | Frame::ForOfNext {
                    ref label,
                    ref scope,
                    vs_mark,
                    ..
                } => match &completion {
                    Completion::Break(target) if label_matches(label, target) => {
                        self.values.truncate(vs_mark);
                        self.scope = scope.clone();
                        return Ok(());
                    }
                    Completion::Continue(target) if label_matches(label, target) => {
                        self.values.truncate(vs_mark);
                        self.scope = scope.clone();
                        // The frame is the next-iteration scheduler.
                        self.frames.push(frame);
                        return Ok(());
                    }
                    _ => continue,
                },
                Frame::SwitchBody {
                    ref label,
                    ref scope,
                    vs_mark,
                } => match &completion {
                    Completion::Break(target) if label_matches(label, target) => {
                        self.values.truncate(vs_mark);
                        self.scope = scope.clone();
                        return Ok(());
                    }
                    _ => continue,
                },
                Frame::LabelBarrier {
                    ref label,
                    ref scope,
                    vs_mark,
                } => match &completion {
                    Completion::Break(Some(target)) if target == label => {
                        self.values.truncate(vs_mark);
                        self.scope = scope.clone();
                        return Ok(());
                    }
                    _ => continue,
                },
                Frame::ModuleFinish { module } => {
                    if let Completion::Throw(value) = &completion {
                        let mut m = module.borrow_mut();
                        m.eval_error = Some(EngineError::thrown(value.clone()));
                        m.set_status(ModuleStatus::Evaluated);
                    }
                }
                // A new abrupt completion overrides a pending one.
                Frame::ResumeUnwind(_) => {}
                _ => {}
            }
        }
    }

    // ── small helpers ────────────────────────────────────────────────

    fn pop(&mut self) -> JsValue {
        self.values.pop().unwrap_or(JsValue::Undefined)
    }

    fn top(&self) -> JsValue {
        self.values.last().cloned().unwrap_or(JsValue::Undefined)
    }
}

fn label_matches(frame_label: &Option<JsString>, target: &Option<JsString>) -> bool {
    match target {
        None => true,
        Some(target) => frame_label.as_ref() == Some(target),
    }
}

fn literal_value(value: &LiteralValue) -> JsValue {
    match value {
        LiteralValue::Boolean(b) => JsValue::Boolean(*b),
        LiteralValue::Number(n) => JsValue::Number(*n),
        LiteralValue::String(s) => JsValue::from(s.as_str()),
        LiteralValue::Null => JsValue::Null,
    }
}

/// The key of a non-computed property position (identifier or literal).
fn property_name_key(expr: &Expression) -> Result<PropertyKey, EngineError> {
    match expr {
        Expression::Identifier(id) => Ok(PropertyKey::String(JsString::from(id.name.as_str()))),
        Expression::Literal(lit) => Ok(match &lit.value {
            LiteralValue::String(s) => PropertyKey::from(s.as_str()),
            LiteralValue::Number(n) => PropertyKey::from_value(&JsValue::Number(*n)),
            LiteralValue::Boolean(b) => PropertyKey::from(if *b { "true" } else { "false" }),
            LiteralValue::Null => PropertyKey::from("null"),
        }),
        _ => Err(EngineError::internal(
            "non-computed property key must be an identifier or literal",
        )),
    }
}

fn key_to_value(key: &PropertyKey) -> JsValue {
    match key {
        PropertyKey::String(s) => JsValue::String(s.clone()),
        PropertyKey::Index(i) => JsValue::Number(*i as f64),
        PropertyKey::Symbol(s) => JsValue::Symbol(s.clone()),
    }
}

fn compare(left: &JsValue, right: &JsValue, test: fn(std::cmp::Ordering) -> bool) -> JsValue {
    if let (JsValue::String(a), JsValue::String(b)) = (left, right) {
        return JsValue::Boolean(test(a.as_str().cmp(b.as_str())));
    }
    let (a, b) = (left.to_number(), right.to_number());
    match a.partial_cmp(&b) {
        Some(ordering) => JsValue::Boolean(test(ordering)),
        None => JsValue::Boolean(false), // NaN never compares
    }
}

fn to_int32(value: &JsValue) -> i32 {
    let n = value.to_number();
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc() % 4_294_967_296.0;
    m as i64 as u32 as i32
}

fn to_uint32(value: &JsValue) -> u32 {
    to_int32(value) as u32
}

fn new_args() -> ArgsRef {
    Rc::new(std::cell::RefCell::new(Vec::new()))
}
