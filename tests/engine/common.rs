//! AST constructors and evaluation helpers shared by the test suites.
//!
//! Each constructor mirrors the ESTree node an external parser would emit,
//! with default spans; tests compose them instead of parsing source text.

#![allow(dead_code)]

use sandjs::ast::*;
use sandjs::{EngineError, JsValue, Realm};

pub fn program(body: Vec<Statement>) -> Program {
    Program {
        body,
        source_type: SourceType::Script,
        span: Span::default(),
    }
}

pub fn module(body: Vec<Statement>) -> Program {
    Program {
        body,
        source_type: SourceType::Module,
        span: Span::default(),
    }
}

/// Evaluate a script in a fresh realm; the completion value is the value of
/// the last expression statement.
pub fn eval(body: Vec<Statement>) -> Result<JsValue, EngineError> {
    Realm::new().evaluate(&program(body))
}

pub fn eval_ok(body: Vec<Statement>) -> JsValue {
    eval(body).expect("evaluation failed")
}

// ---- expressions ----

pub fn num(n: f64) -> Expression {
    Expression::Literal(Literal {
        value: LiteralValue::Number(n),
        span: Span::default(),
    })
}

pub fn str_(s: &str) -> Expression {
    Expression::Literal(Literal {
        value: LiteralValue::String(s.to_string()),
        span: Span::default(),
    })
}

pub fn bool_(b: bool) -> Expression {
    Expression::Literal(Literal {
        value: LiteralValue::Boolean(b),
        span: Span::default(),
    })
}

pub fn null() -> Expression {
    Expression::Literal(Literal {
        value: LiteralValue::Null,
        span: Span::default(),
    })
}

pub fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier {
        name: name.to_string(),
        span: Span::default(),
    })
}

pub fn this_() -> Expression {
    Expression::ThisExpression(EmptyStatement {
        span: Span::default(),
    })
}

pub fn bin(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::BinaryExpression(BinaryExpression {
        operator: op,
        left: Box::new(left),
        right: Box::new(right),
        span: Span::default(),
    })
}

pub fn logical(op: LogicalOp, left: Expression, right: Expression) -> Expression {
    Expression::LogicalExpression(LogicalExpression {
        operator: op,
        left: Box::new(left),
        right: Box::new(right),
        span: Span::default(),
    })
}

pub fn unary(op: UnaryOp, argument: Expression) -> Expression {
    Expression::UnaryExpression(UnaryExpression {
        operator: op,
        argument: Box::new(argument),
        span: Span::default(),
    })
}

pub fn update(op: UpdateOp, prefix: bool, argument: Expression) -> Expression {
    Expression::UpdateExpression(UpdateExpression {
        operator: op,
        argument: Box::new(argument),
        prefix,
        span: Span::default(),
    })
}

pub fn cond(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
    Expression::ConditionalExpression(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
        span: Span::default(),
    })
}

pub fn assign(name: &str, value: Expression) -> Expression {
    Expression::AssignmentExpression(AssignmentExpression {
        operator: AssignmentOp::Assign,
        left: AssignmentTarget::Identifier(Identifier {
            name: name.to_string(),
            span: Span::default(),
        }),
        right: Box::new(value),
        span: Span::default(),
    })
}

pub fn assign_op(op: AssignmentOp, name: &str, value: Expression) -> Expression {
    Expression::AssignmentExpression(AssignmentExpression {
        operator: op,
        left: AssignmentTarget::Identifier(Identifier {
            name: name.to_string(),
            span: Span::default(),
        }),
        right: Box::new(value),
        span: Span::default(),
    })
}

pub fn assign_member(target: MemberExpression, value: Expression) -> Expression {
    Expression::AssignmentExpression(AssignmentExpression {
        operator: AssignmentOp::Assign,
        left: AssignmentTarget::MemberExpression(target),
        right: Box::new(value),
        span: Span::default(),
    })
}

pub fn member_expr(object: Expression, name: &str) -> MemberExpression {
    MemberExpression {
        object: Box::new(object),
        property: Box::new(ident(name)),
        computed: false,
        optional: false,
        span: Span::default(),
    }
}

pub fn member(object: Expression, name: &str) -> Expression {
    Expression::MemberExpression(member_expr(object, name))
}

pub fn index_expr(object: Expression, index: Expression) -> MemberExpression {
    MemberExpression {
        object: Box::new(object),
        property: Box::new(index),
        computed: true,
        optional: false,
        span: Span::default(),
    }
}

pub fn index(object: Expression, idx: Expression) -> Expression {
    Expression::MemberExpression(index_expr(object, idx))
}

pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::CallExpression(CallExpression {
        callee: Box::new(callee),
        arguments,
        optional: false,
        span: Span::default(),
    })
}

/// `object.name(args)`
pub fn method_call(object: Expression, name: &str, arguments: Vec<Expression>) -> Expression {
    call(member(object, name), arguments)
}

pub fn new_(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::NewExpression(NewExpression {
        callee: Box::new(callee),
        arguments,
        span: Span::default(),
    })
}

pub fn array(elements: Vec<Expression>) -> Expression {
    Expression::ArrayExpression(ArrayExpression {
        elements: elements.into_iter().map(Some).collect(),
        span: Span::default(),
    })
}

pub fn array_with_holes(elements: Vec<Option<Expression>>) -> Expression {
    Expression::ArrayExpression(ArrayExpression {
        elements,
        span: Span::default(),
    })
}

pub fn object(properties: Vec<ObjectMember>) -> Expression {
    Expression::ObjectExpression(ObjectExpression {
        properties,
        span: Span::default(),
    })
}

pub fn prop(key: &str, value: Expression) -> ObjectMember {
    ObjectMember::Property(ObjectProperty {
        key: ident(key),
        value,
        kind: PropertyKind::Init,
        computed: false,
        shorthand: false,
    })
}

pub fn getter_prop(key: &str, body: Vec<Statement>) -> ObjectMember {
    ObjectMember::Property(ObjectProperty {
        key: ident(key),
        value: func_expr(vec![], body),
        kind: PropertyKind::Get,
        computed: false,
        shorthand: false,
    })
}

pub fn setter_prop(key: &str, param: &str, body: Vec<Statement>) -> ObjectMember {
    ObjectMember::Property(ObjectProperty {
        key: ident(key),
        value: func_expr(vec![pat(param)], body),
        kind: PropertyKind::Set,
        computed: false,
        shorthand: false,
    })
}

pub fn func_expr(params: Vec<Pattern>, body: Vec<Statement>) -> Expression {
    Expression::FunctionExpression(FunctionDeclaration {
        id: None,
        params,
        body: BlockStatement {
            body,
            span: Span::default(),
        },
        span: Span::default(),
    })
}

pub fn arrow(params: Vec<Pattern>, body: Expression) -> Expression {
    Expression::ArrowFunctionExpression(ArrowFunctionExpression {
        params,
        body: ArrowBody::Expression(Box::new(body)),
        span: Span::default(),
    })
}

pub fn arrow_block(params: Vec<Pattern>, body: Vec<Statement>) -> Expression {
    Expression::ArrowFunctionExpression(ArrowFunctionExpression {
        params,
        body: ArrowBody::Block(BlockStatement {
            body,
            span: Span::default(),
        }),
        span: Span::default(),
    })
}

pub fn template(quasis: Vec<&str>, expressions: Vec<Expression>) -> Expression {
    Expression::TemplateLiteral(TemplateLiteral {
        quasis: quasis
            .iter()
            .enumerate()
            .map(|(i, s)| TemplateElement {
                value: TemplateElementValue {
                    cooked: Some(s.to_string()),
                    raw: s.to_string(),
                },
                tail: i == quasis.len() - 1,
            })
            .collect(),
        expressions,
        span: Span::default(),
    })
}

pub fn spread(argument: Expression) -> Expression {
    Expression::SpreadElement(SpreadElement {
        argument: Box::new(argument),
        span: Span::default(),
    })
}

// ---- patterns ----

pub fn pat(name: &str) -> Pattern {
    Pattern::Identifier(Identifier {
        name: name.to_string(),
        span: Span::default(),
    })
}

pub fn pat_default(inner: Pattern, default: Expression) -> Pattern {
    Pattern::AssignmentPattern(AssignmentPattern {
        left: Box::new(inner),
        right: Box::new(default),
    })
}

pub fn pat_rest(inner: Pattern) -> Pattern {
    Pattern::RestElement(RestElement {
        argument: Box::new(inner),
        span: Span::default(),
    })
}

pub fn pat_array(elements: Vec<Option<Pattern>>) -> Pattern {
    Pattern::ArrayPattern(ArrayPattern {
        elements,
        span: Span::default(),
    })
}

pub fn pat_object(properties: Vec<ObjectPatternItem>) -> Pattern {
    Pattern::ObjectPattern(ObjectPattern {
        properties,
        span: Span::default(),
    })
}

pub fn pat_prop(key: &str, value: Pattern) -> ObjectPatternItem {
    ObjectPatternItem::Property(PatternProperty {
        key: ident(key),
        value: Box::new(value),
        computed: false,
        shorthand: false,
    })
}

pub fn pat_obj_rest(name: &str) -> ObjectPatternItem {
    ObjectPatternItem::RestElement(RestElement {
        argument: Box::new(pat(name)),
        span: Span::default(),
    })
}

// ---- statements ----

pub fn expr(expression: Expression) -> Statement {
    Statement::ExpressionStatement(ExpressionStatement {
        expression,
        directive: None,
        span: Span::default(),
    })
}

pub fn decl(kind: VariableKind, id: Pattern, init: Option<Expression>) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        kind,
        declarations: vec![VariableDeclarator {
            id,
            init,
            span: Span::default(),
        }],
        span: Span::default(),
    })
}

pub fn let_(name: &str, init: Expression) -> Statement {
    decl(VariableKind::Let, pat(name), Some(init))
}

pub fn const_(name: &str, init: Expression) -> Statement {
    decl(VariableKind::Const, pat(name), Some(init))
}

pub fn var_(name: &str, init: Expression) -> Statement {
    decl(VariableKind::Var, pat(name), Some(init))
}

pub fn block(body: Vec<Statement>) -> Statement {
    Statement::BlockStatement(BlockStatement {
        body,
        span: Span::default(),
    })
}

pub fn if_(test: Expression, consequent: Statement, alternate: Option<Statement>) -> Statement {
    Statement::IfStatement(IfStatement {
        test,
        consequent: Box::new(consequent),
        alternate: alternate.map(Box::new),
        span: Span::default(),
    })
}

pub fn while_(test: Expression, body: Statement) -> Statement {
    Statement::WhileStatement(WhileStatement {
        test,
        body: Box::new(body),
        span: Span::default(),
    })
}

pub fn ret(argument: Option<Expression>) -> Statement {
    Statement::ReturnStatement(ReturnStatement {
        argument,
        span: Span::default(),
    })
}

pub fn throw_(argument: Expression) -> Statement {
    Statement::ThrowStatement(ThrowStatement {
        argument,
        span: Span::default(),
    })
}

pub fn try_(
    body: Vec<Statement>,
    handler: Option<(Option<Pattern>, Vec<Statement>)>,
    finalizer: Option<Vec<Statement>>,
) -> Statement {
    Statement::TryStatement(TryStatement {
        block: BlockStatement {
            body,
            span: Span::default(),
        },
        handler: handler.map(|(param, body)| CatchClause {
            param,
            body: BlockStatement {
                body,
                span: Span::default(),
            },
        }),
        finalizer: finalizer.map(|body| BlockStatement {
            body,
            span: Span::default(),
        }),
        span: Span::default(),
    })
}

pub fn func_decl(name: &str, params: Vec<Pattern>, body: Vec<Statement>) -> Statement {
    Statement::FunctionDeclaration(FunctionDeclaration {
        id: Some(Identifier {
            name: name.to_string(),
            span: Span::default(),
        }),
        params,
        body: BlockStatement {
            body,
            span: Span::default(),
        },
        span: Span::default(),
    })
}

// ---- module statements ----

pub fn import(specifiers: Vec<ImportSpecifier>, source: &str) -> Statement {
    Statement::ImportDeclaration(ImportDeclaration {
        specifiers,
        source: str_literal(source),
        span: Span::default(),
    })
}

pub fn import_named(imported: &str, local: &str) -> ImportSpecifier {
    ImportSpecifier::ImportSpecifier {
        imported: Identifier {
            name: imported.to_string(),
            span: Span::default(),
        },
        local: Identifier {
            name: local.to_string(),
            span: Span::default(),
        },
    }
}

pub fn import_namespace(local: &str) -> ImportSpecifier {
    ImportSpecifier::ImportNamespaceSpecifier {
        local: Identifier {
            name: local.to_string(),
            span: Span::default(),
        },
    }
}

pub fn export_decl(declaration: Statement) -> Statement {
    Statement::ExportNamedDeclaration(ExportNamedDeclaration {
        declaration: Some(Box::new(declaration)),
        specifiers: vec![],
        source: None,
        span: Span::default(),
    })
}

pub fn export_default(declaration: Expression) -> Statement {
    Statement::ExportDefaultDeclaration(ExportDefaultDeclaration {
        declaration: Box::new(declaration),
        span: Span::default(),
    })
}

pub fn export_all(source: &str) -> Statement {
    Statement::ExportAllDeclaration(ExportAllDeclaration {
        source: str_literal(source),
        span: Span::default(),
    })
}

fn str_literal(s: &str) -> Literal {
    Literal {
        value: LiteralValue::String(s.to_string()),
        span: Span::default(),
    }
}

// ---- value assertions ----

/// Uncaught script errors surface as `EngineError::Thrown` wrapping the
/// error object; this digs out its class name ("TypeError", ...).
pub fn thrown_name(err: &EngineError) -> String {
    let EngineError::Thrown { value } = err else {
        panic!("expected a thrown value, got {err:?}");
    };
    let JsValue::Object(obj) = value else {
        return value.to_js_string().as_str().to_string();
    };
    let mut current = Some(obj.clone());
    while let Some(obj) = current {
        let obj_ref = obj.borrow();
        if let Some(name) = obj_ref
            .get_own(&sandjs::PropertyKey::from("name"))
            .and_then(|d| d.data_value())
        {
            return name.to_js_string().as_str().to_string();
        }
        current = obj_ref.prototype.clone();
    }
    String::new()
}

/// The thrown error object's own `message`.
pub fn thrown_message(err: &EngineError) -> String {
    let EngineError::Thrown { value } = err else {
        panic!("expected a thrown value, got {err:?}");
    };
    let JsValue::Object(obj) = value else {
        return value.to_js_string().as_str().to_string();
    };
    obj.borrow()
        .get_own(&sandjs::PropertyKey::from("message"))
        .and_then(|d| d.data_value())
        .map(|v| v.to_js_string().as_str().to_string())
        .unwrap_or_default()
}

pub fn as_number(value: &JsValue) -> f64 {
    match value {
        JsValue::Number(n) => *n,
        other => panic!("expected number, got {other:?}"),
    }
}

pub fn as_string(value: &JsValue) -> String {
    match value {
        JsValue::String(s) => s.as_str().to_string(),
        other => panic!("expected string, got {other:?}"),
    }
}
