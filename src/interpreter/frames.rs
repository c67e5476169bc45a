//! Frame and completion types for the suspendable evaluator.
//!
//! The machine is a pair of explicit stacks: a frame stack of pending work
//! and a value stack of intermediate results. One `step()` pops and
//! processes exactly one frame; a frame may push further frames (sub-work
//! on top) and values. Because no work lives on the host call stack, the
//! machine can stop between any two frames and resume later.

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{
    BinaryOp, BlockStatement, CatchClause, ClassDeclaration, DoWhileStatement, Expression,
    ForInStatement, ForOfStatement, ForStatement, LogicalOp, Pattern, PropertyKind, Span,
    Statement, SwitchStatement, TemplateElement, UnaryOp, UpdateOp, WhileStatement,
};
use crate::environment::ScopeRef;
use crate::module::ModuleRef;
use crate::value::{JsObjectRef, JsString, JsValue, PropertyKey};

/// Argument accumulator shared between the frames of one call expression.
pub type ArgsRef = Rc<RefCell<Vec<JsValue>>>;

/// Keys consumed so far by one object-destructuring pattern, shared between
/// its per-property frames so a trailing rest element can exclude them.
pub type SeenKeys = Rc<RefCell<Vec<PropertyKey>>>;

/// What the step protocol reports as the current operation: the AST node
/// kind being evaluated and where it sits in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub kind: &'static str,
    pub span: Span,
}

/// An abrupt completion travelling up the frame stack. Normal completion is
/// not represented; it is simply the frame stack draining.
#[derive(Debug, Clone)]
pub enum Completion {
    Return(JsValue),
    Throw(JsValue),
    Break(Option<JsString>),
    Continue(Option<JsString>),
}

/// How a pattern element binds its matched value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    /// `var` declarations and function parameters: declare-or-overwrite in
    /// the nearest var scope.
    Var,
    /// `let`/`const`/catch params/class names: initialize the pre-created
    /// lexical binding.
    Lexical,
    /// Assignment expressions: write through the existing binding.
    Assign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Call,
    New,
}

/// One unit of pending work.
pub enum Frame {
    // ── dispatch ──────────────────────────────────────────────────────
    /// Dispatch a statement. `track` statements feed the program's
    /// completion value (top-level code, not function bodies).
    Stmt { stmt: Rc<Statement>, track: bool },
    /// Dispatch an expression; leaves exactly one value on the value stack.
    Expr(Rc<Expression>),

    // ── sequencing & stack hygiene ────────────────────────────────────
    StmtSeq {
        stmts: Rc<[Statement]>,
        index: usize,
        track: bool,
    },
    PushValue(JsValue),
    PopValue,
    /// Duplicate the top of the value stack.
    DupTop,
    /// Pop the top value into the interpreter's completion-value register.
    StoreCompletion,
    /// Restore the given scope as current (block/function exit).
    RestoreScope(ScopeRef),

    // ── expression continuations ──────────────────────────────────────
    BinaryApply {
        op: BinaryOp,
        span: Span,
    },
    LogicalRight {
        op: LogicalOp,
        right: Rc<Expression>,
    },
    UnaryApply {
        op: UnaryOp,
        span: Span,
    },
    CondBranch {
        consequent: Rc<Expression>,
        alternate: Rc<Expression>,
    },
    TemplateConcat {
        quasis: Rc<[TemplateElement]>,
        count: usize,
    },
    /// `++`/`--` on a member target: pops [key], object; reads, steps,
    /// writes back, pushes old or new value per `prefix`.
    UpdateMember {
        computed: bool,
        static_key: Option<PropertyKey>,
        op: UpdateOp,
        prefix: bool,
        span: Span,
    },
    /// Simple or compound assignment to an identifier: pops the value,
    /// writes the binding, pushes the value back.
    AssignIdent {
        name: JsString,
        span: Span,
    },

    // ── literals under construction ───────────────────────────────────
    ArrayAppend {
        array: JsObjectRef,
        spread: bool,
        span: Span,
    },
    ArrayHole {
        array: JsObjectRef,
    },
    ObjectDefineMember {
        object: JsObjectRef,
        kind: PropertyKind,
        static_key: Option<PropertyKey>,
    },
    ObjectSpread {
        object: JsObjectRef,
    },

    // ── member access ─────────────────────────────────────────────────
    /// Pops [key if computed] then the object; pushes the property value,
    /// or frames that invoke the getter.
    GetMember {
        computed: bool,
        optional: bool,
        static_key: Option<PropertyKey>,
        span: Span,
    },
    /// Like `GetMember`, but leaves the object [and key] on the stack
    /// beneath the result (compound member assignment).
    GetMemberKeep {
        computed: bool,
        static_key: Option<PropertyKey>,
        span: Span,
    },
    /// Pops the value, then [key], then the object; performs the write and
    /// pushes the value back (assignment result).
    SetMember {
        computed: bool,
        static_key: Option<PropertyKey>,
        span: Span,
    },
    DeleteMember {
        computed: bool,
        static_key: Option<PropertyKey>,
        span: Span,
    },
    /// Method-call callee: pops [key], object; pushes `this` then the
    /// function value.
    GetMethod {
        computed: bool,
        optional: bool,
        static_key: Option<PropertyKey>,
        span: Span,
    },

    // ── calls ─────────────────────────────────────────────────────────
    PushArg {
        args: ArgsRef,
        spread: bool,
        span: Span,
    },
    /// Pops the function then `this` (Call) or just the function (New) and
    /// transfers control.
    Invoke {
        args: ArgsRef,
        kind: InvokeKind,
        optional: bool,
        span: Span,
    },
    /// After a constructor body: pops the body result, pushes the result
    /// object (an explicit object return wins over `this`).
    FinishNew {
        this_obj: JsObjectRef,
    },
    /// Call boundary. Handles `Return` unwinding, restores the caller's
    /// execution context, and supplies the implicit `undefined` result on
    /// fall-through.
    FunctionTeardown {
        scope: ScopeRef,
        vs_mark: usize,
        strict: bool,
        this_value: JsValue,
        super_ctor: Option<JsObjectRef>,
    },
    /// Pops a value and completes the current function with it.
    ReturnValue,
    /// Pops a value and throws it.
    ThrowValue,

    // ── statements ────────────────────────────────────────────────────
    IfBranch {
        consequent: Rc<Statement>,
        alternate: Option<Rc<Statement>>,
    },
    /// Loop handler for `while`: schedules the test. Break/continue unwind
    /// to this frame.
    WhileTest {
        stmt: Rc<WhileStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    WhileCond {
        stmt: Rc<WhileStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    DoWhileTest {
        stmt: Rc<DoWhileStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    DoWhileCond {
        stmt: Rc<DoWhileStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    /// Loop handler for `for`: `continue` lands here so the update clause
    /// still runs.
    ForUpdate {
        stmt: Rc<ForStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    ForTest {
        stmt: Rc<ForStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    ForCond {
        stmt: Rc<ForStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    /// Pops the enumerated object and schedules the first iteration.
    ForInSetup {
        stmt: Rc<ForInStatement>,
        label: Option<JsString>,
    },
    ForInNext {
        keys: Rc<[JsString]>,
        index: usize,
        object: Option<JsObjectRef>,
        stmt: Rc<ForInStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    /// Pops the iterable and schedules the first iteration.
    ForOfSetup {
        stmt: Rc<ForOfStatement>,
        label: Option<JsString>,
    },
    ForOfNext {
        items: Rc<[JsValue]>,
        index: usize,
        stmt: Rc<ForOfStatement>,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    /// Pops the discriminant, opens the switch scope and starts matching.
    SwitchEval {
        stmt: Rc<SwitchStatement>,
        label: Option<JsString>,
    },
    /// Evaluates case tests in order against the discriminant.
    SwitchMatch {
        stmt: Rc<SwitchStatement>,
        index: usize,
        discriminant: JsValue,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    SwitchTestCmp {
        stmt: Rc<SwitchStatement>,
        index: usize,
        discriminant: JsValue,
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    /// Break target while the matched cases run. No-op when reached
    /// normally.
    SwitchBody {
        label: Option<JsString>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    /// Break target for a labeled non-loop statement.
    LabelBarrier {
        label: JsString,
        scope: ScopeRef,
        vs_mark: usize,
    },

    // ── try/catch/finally ─────────────────────────────────────────────
    /// Handler frame for a `try`. Catches `Throw` when a handler is
    /// present; any abrupt completion routes through the finalizer first.
    TryCatch {
        handler: Option<Rc<CatchClause>>,
        finalizer: Option<Rc<BlockStatement>>,
        scope: ScopeRef,
        vs_mark: usize,
    },
    /// Re-raise a completion after a finalizer ran to normal completion.
    /// Dropped (completion override) if the finalizer itself completed
    /// abruptly.
    ResumeUnwind(Completion),

    // ── patterns & bindings ───────────────────────────────────────────
    /// Pops the value to match and binds it through the pattern, pushing
    /// sub-frames for nested patterns and default expressions.
    BindPattern {
        pattern: Rc<Pattern>,
        mode: BindMode,
    },
    /// Object-pattern property: pops [computed key], reads it off `object`,
    /// records it in `seen`, pushes the property value for the sub-pattern.
    BindProperty {
        object: JsValue,
        computed: bool,
        static_key: Option<PropertyKey>,
        seen: SeenKeys,
        span: Span,
    },
    /// Object-pattern rest: collects remaining own enumerable keys.
    BindObjectRest {
        pattern: Rc<Pattern>,
        object: JsValue,
        seen: SeenKeys,
        mode: BindMode,
    },
    /// Pops a value and initializes a pre-created lexical binding in the
    /// current scope (class names, `export default`).
    InitializeBinding {
        name: JsString,
    },

    // ── classes ───────────────────────────────────────────────────────
    /// Pops [computed method keys] and [superclass if any]; builds the
    /// constructor/prototype pair and pushes the class value.
    ClassBuild {
        decl: Rc<ClassDeclaration>,
        has_super: bool,
        computed_keys: usize,
    },

    // ── modules ───────────────────────────────────────────────────────
    /// Enters a module body: switches to the module environment, hoists,
    /// and pushes the body statements.
    ModuleBody {
        module: ModuleRef,
    },
    /// Marks a module evaluated once its body frames have drained.
    ModuleFinish {
        module: ModuleRef,
    },
}
