//! Abstract syntax tree consumed by the evaluator.
//!
//! The engine never parses program text. An external parser hands it a typed
//! tree in ESTree shape; every node type here derives `Deserialize` with a
//! `"type"` tag so a JSON tree produced by such a parser loads directly via
//! `serde_json`.

use serde::Deserialize;

/// A position within the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub offset: u32,
}

/// A source span covering one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start.line, self.start.column)
    }
}

/// A complete program (script or module).
#[derive(Debug, Clone, Deserialize)]
pub struct Program {
    pub body: Vec<Statement>,
    #[serde(rename = "sourceType", default)]
    pub source_type: SourceType,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Script,
    Module,
}

// ============ STATEMENTS ============

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Statement {
    // Declarations
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(FunctionDeclaration),
    ClassDeclaration(ClassDeclaration),

    // Control flow
    BlockStatement(BlockStatement),
    IfStatement(IfStatement),
    SwitchStatement(SwitchStatement),
    ForStatement(ForStatement),
    ForInStatement(ForInStatement),
    ForOfStatement(ForOfStatement),
    WhileStatement(WhileStatement),
    DoWhileStatement(DoWhileStatement),
    TryStatement(TryStatement),

    // Jump
    ReturnStatement(ReturnStatement),
    BreakStatement(BreakStatement),
    ContinueStatement(ContinueStatement),
    ThrowStatement(ThrowStatement),

    // Modules
    ImportDeclaration(ImportDeclaration),
    ExportNamedDeclaration(ExportNamedDeclaration),
    ExportDefaultDeclaration(ExportDefaultDeclaration),
    ExportAllDeclaration(ExportAllDeclaration),

    // Other
    ExpressionStatement(ExpressionStatement),
    LabeledStatement(LabeledStatement),
    EmptyStatement(EmptyStatement),
    DebuggerStatement(EmptyStatement),
}

impl Statement {
    /// Node type tag, as reported through `TaskIterator::operation`.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::VariableDeclaration(_) => "VariableDeclaration",
            Statement::FunctionDeclaration(_) => "FunctionDeclaration",
            Statement::ClassDeclaration(_) => "ClassDeclaration",
            Statement::BlockStatement(_) => "BlockStatement",
            Statement::IfStatement(_) => "IfStatement",
            Statement::SwitchStatement(_) => "SwitchStatement",
            Statement::ForStatement(_) => "ForStatement",
            Statement::ForInStatement(_) => "ForInStatement",
            Statement::ForOfStatement(_) => "ForOfStatement",
            Statement::WhileStatement(_) => "WhileStatement",
            Statement::DoWhileStatement(_) => "DoWhileStatement",
            Statement::TryStatement(_) => "TryStatement",
            Statement::ReturnStatement(_) => "ReturnStatement",
            Statement::BreakStatement(_) => "BreakStatement",
            Statement::ContinueStatement(_) => "ContinueStatement",
            Statement::ThrowStatement(_) => "ThrowStatement",
            Statement::ImportDeclaration(_) => "ImportDeclaration",
            Statement::ExportNamedDeclaration(_) => "ExportNamedDeclaration",
            Statement::ExportDefaultDeclaration(_) => "ExportDefaultDeclaration",
            Statement::ExportAllDeclaration(_) => "ExportAllDeclaration",
            Statement::ExpressionStatement(_) => "ExpressionStatement",
            Statement::LabeledStatement(_) => "LabeledStatement",
            Statement::EmptyStatement(_) => "EmptyStatement",
            Statement::DebuggerStatement(_) => "DebuggerStatement",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Statement::VariableDeclaration(s) => s.span,
            Statement::FunctionDeclaration(s) => s.span,
            Statement::ClassDeclaration(s) => s.span,
            Statement::BlockStatement(s) => s.span,
            Statement::IfStatement(s) => s.span,
            Statement::SwitchStatement(s) => s.span,
            Statement::ForStatement(s) => s.span,
            Statement::ForInStatement(s) => s.span,
            Statement::ForOfStatement(s) => s.span,
            Statement::WhileStatement(s) => s.span,
            Statement::DoWhileStatement(s) => s.span,
            Statement::TryStatement(s) => s.span,
            Statement::ReturnStatement(s) => s.span,
            Statement::BreakStatement(s) => s.span,
            Statement::ContinueStatement(s) => s.span,
            Statement::ThrowStatement(s) => s.span,
            Statement::ImportDeclaration(s) => s.span,
            Statement::ExportNamedDeclaration(s) => s.span,
            Statement::ExportDefaultDeclaration(s) => s.span,
            Statement::ExportAllDeclaration(s) => s.span,
            Statement::ExpressionStatement(s) => s.span,
            Statement::LabeledStatement(s) => s.span,
            Statement::EmptyStatement(s) => s.span,
            Statement::DebuggerStatement(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpressionStatement {
    pub expression: Expression,
    /// Set by the parser for directive-prologue strings ("use strict").
    #[serde(default)]
    pub directive: Option<String>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockStatement {
    pub body: Vec<Statement>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmptyStatement {
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableDeclarator {
    pub id: Pattern,
    #[serde(default)]
    pub init: Option<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDeclaration {
    pub id: Option<Identifier>,
    pub params: Vec<Pattern>,
    pub body: BlockStatement,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassDeclaration {
    pub id: Option<Identifier>,
    #[serde(rename = "superClass", default)]
    pub super_class: Option<Box<Expression>>,
    pub body: ClassBody,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassBody {
    pub body: Vec<MethodDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MethodDefinition {
    pub key: Expression,
    pub value: FunctionDeclaration,
    #[serde(default)]
    pub kind: MethodKind,
    #[serde(rename = "static", default)]
    pub is_static: bool,
    #[serde(default)]
    pub computed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodKind {
    Constructor,
    #[default]
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IfStatement {
    pub test: Expression,
    pub consequent: Box<Statement>,
    #[serde(default)]
    pub alternate: Option<Box<Statement>>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchCase {
    #[serde(default)]
    pub test: Option<Expression>,
    pub consequent: Vec<Statement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForStatement {
    #[serde(default)]
    pub init: Option<ForInit>,
    #[serde(default)]
    pub test: Option<Expression>,
    #[serde(default)]
    pub update: Option<Expression>,
    pub body: Box<Statement>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

/// `for (<init>; ...)` — either a declaration or a plain expression.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ForInit {
    Declaration(VariableDeclaration),
    Expression(Box<Expression>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForInStatement {
    pub left: ForTarget,
    pub right: Expression,
    pub body: Box<Statement>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForOfStatement {
    pub left: ForTarget,
    pub right: Expression,
    pub body: Box<Statement>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

/// Binding target of a for-in/for-of loop head.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ForTarget {
    VariableDeclaration(VariableDeclaration),
    Identifier(Identifier),
    ObjectPattern(ObjectPattern),
    ArrayPattern(ArrayPattern),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhileStatement {
    pub test: Expression,
    pub body: Box<Statement>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub test: Expression,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TryStatement {
    pub block: BlockStatement,
    #[serde(default)]
    pub handler: Option<CatchClause>,
    #[serde(default)]
    pub finalizer: Option<BlockStatement>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatchClause {
    #[serde(default)]
    pub param: Option<Pattern>,
    pub body: BlockStatement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReturnStatement {
    #[serde(default)]
    pub argument: Option<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakStatement {
    #[serde(default)]
    pub label: Option<Identifier>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContinueStatement {
    #[serde(default)]
    pub label: Option<Identifier>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThrowStatement {
    pub argument: Expression,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabeledStatement {
    pub label: Identifier,
    pub body: Box<Statement>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

// ============ MODULES ============

#[derive(Debug, Clone, Deserialize)]
pub struct ImportDeclaration {
    #[serde(default)]
    pub specifiers: Vec<ImportSpecifier>,
    pub source: Literal,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ImportSpecifier {
    /// `import { imported as local }`
    ImportSpecifier {
        imported: Identifier,
        local: Identifier,
    },
    /// `import local`
    ImportDefaultSpecifier { local: Identifier },
    /// `import * as local`
    ImportNamespaceSpecifier { local: Identifier },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportNamedDeclaration {
    #[serde(default)]
    pub declaration: Option<Box<Statement>>,
    #[serde(default)]
    pub specifiers: Vec<ExportSpecifier>,
    #[serde(default)]
    pub source: Option<Literal>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportSpecifier {
    pub local: Identifier,
    pub exported: Identifier,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportDefaultDeclaration {
    pub declaration: Box<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportAllDeclaration {
    pub source: Literal,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

// ============ EXPRESSIONS ============

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    Identifier(Identifier),
    Literal(Literal),
    TemplateLiteral(TemplateLiteral),
    ThisExpression(EmptyStatement),
    ArrayExpression(ArrayExpression),
    ObjectExpression(ObjectExpression),
    FunctionExpression(FunctionDeclaration),
    ArrowFunctionExpression(ArrowFunctionExpression),
    ClassExpression(ClassDeclaration),
    UnaryExpression(UnaryExpression),
    UpdateExpression(UpdateExpression),
    BinaryExpression(BinaryExpression),
    LogicalExpression(LogicalExpression),
    AssignmentExpression(AssignmentExpression),
    ConditionalExpression(ConditionalExpression),
    CallExpression(CallExpression),
    NewExpression(NewExpression),
    MemberExpression(MemberExpression),
    SequenceExpression(SequenceExpression),
    /// Only valid inside call arguments, array literals and object literals.
    SpreadElement(SpreadElement),
    Super(EmptyStatement),
}

impl Expression {
    pub fn kind(&self) -> &'static str {
        match self {
            Expression::Identifier(_) => "Identifier",
            Expression::Literal(_) => "Literal",
            Expression::TemplateLiteral(_) => "TemplateLiteral",
            Expression::ThisExpression(_) => "ThisExpression",
            Expression::ArrayExpression(_) => "ArrayExpression",
            Expression::ObjectExpression(_) => "ObjectExpression",
            Expression::FunctionExpression(_) => "FunctionExpression",
            Expression::ArrowFunctionExpression(_) => "ArrowFunctionExpression",
            Expression::ClassExpression(_) => "ClassExpression",
            Expression::UnaryExpression(_) => "UnaryExpression",
            Expression::UpdateExpression(_) => "UpdateExpression",
            Expression::BinaryExpression(_) => "BinaryExpression",
            Expression::LogicalExpression(_) => "LogicalExpression",
            Expression::AssignmentExpression(_) => "AssignmentExpression",
            Expression::ConditionalExpression(_) => "ConditionalExpression",
            Expression::CallExpression(_) => "CallExpression",
            Expression::NewExpression(_) => "NewExpression",
            Expression::MemberExpression(_) => "MemberExpression",
            Expression::SequenceExpression(_) => "SequenceExpression",
            Expression::SpreadElement(_) => "SpreadElement",
            Expression::Super(_) => "Super",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Expression::Identifier(e) => e.span,
            Expression::Literal(e) => e.span,
            Expression::TemplateLiteral(e) => e.span,
            Expression::ThisExpression(e) => e.span,
            Expression::ArrayExpression(e) => e.span,
            Expression::ObjectExpression(e) => e.span,
            Expression::FunctionExpression(e) => e.span,
            Expression::ArrowFunctionExpression(e) => e.span,
            Expression::ClassExpression(e) => e.span,
            Expression::UnaryExpression(e) => e.span,
            Expression::UpdateExpression(e) => e.span,
            Expression::BinaryExpression(e) => e.span,
            Expression::LogicalExpression(e) => e.span,
            Expression::AssignmentExpression(e) => e.span,
            Expression::ConditionalExpression(e) => e.span,
            Expression::CallExpression(e) => e.span,
            Expression::NewExpression(e) => e.span,
            Expression::MemberExpression(e) => e.span,
            Expression::SequenceExpression(e) => e.span,
            Expression::SpreadElement(e) => e.span,
            Expression::Super(e) => e.span,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Identifier {
    pub name: String,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Literal {
    #[serde(default)]
    pub value: LiteralValue,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Boolean(bool),
    Number(f64),
    String(String),
    #[default]
    Null,
}

impl Literal {
    /// The string payload, for nodes that require one (module specifiers).
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            LiteralValue::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateLiteral {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateElement {
    pub value: TemplateElementValue,
    #[serde(default)]
    pub tail: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateElementValue {
    #[serde(default)]
    pub cooked: Option<String>,
    #[serde(default)]
    pub raw: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArrayExpression {
    /// `None` entries are elisions (holes).
    pub elements: Vec<Option<Expression>>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectExpression {
    pub properties: Vec<ObjectMember>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectMember {
    Property(ObjectProperty),
    SpreadElement(SpreadElement),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectProperty {
    pub key: Expression,
    pub value: Expression,
    #[serde(default)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub shorthand: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    #[default]
    Init,
    Get,
    Set,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArrowFunctionExpression {
    pub params: Vec<Pattern>,
    pub body: ArrowBody,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

/// An arrow body is either a block or a bare expression.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArrowBody {
    Block(BlockStatement),
    Expression(Box<Expression>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnaryExpression {
    pub operator: UnaryOp,
    pub argument: Box<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "-")]
    Neg,
    #[serde(rename = "+")]
    Pos,
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "~")]
    BitNot,
    #[serde(rename = "typeof")]
    TypeOf,
    #[serde(rename = "void")]
    Void,
    #[serde(rename = "delete")]
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateExpression {
    pub operator: UpdateOp,
    pub argument: Box<Expression>,
    #[serde(default)]
    pub prefix: bool,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UpdateOp {
    #[serde(rename = "++")]
    Increment,
    #[serde(rename = "--")]
    Decrement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinaryExpression {
    pub operator: BinaryOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "**")]
    Exp,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "===")]
    StrictEq,
    #[serde(rename = "!==")]
    StrictNotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "&")]
    BitAnd,
    #[serde(rename = "|")]
    BitOr,
    #[serde(rename = "^")]
    BitXor,
    #[serde(rename = "<<")]
    LShift,
    #[serde(rename = ">>")]
    RShift,
    #[serde(rename = ">>>")]
    URShift,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "instanceof")]
    Instanceof,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogicalExpression {
    pub operator: LogicalOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum LogicalOp {
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
    #[serde(rename = "??")]
    NullishCoalescing,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentExpression {
    pub operator: AssignmentOp,
    pub left: AssignmentTarget,
    pub right: Box<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

/// Left-hand side of an assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AssignmentTarget {
    Identifier(Identifier),
    MemberExpression(MemberExpression),
    ObjectPattern(ObjectPattern),
    ArrayPattern(ArrayPattern),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AssignmentOp {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    AddAssign,
    #[serde(rename = "-=")]
    SubAssign,
    #[serde(rename = "*=")]
    MulAssign,
    #[serde(rename = "/=")]
    DivAssign,
    #[serde(rename = "%=")]
    ModAssign,
    #[serde(rename = "**=")]
    ExpAssign,
    #[serde(rename = "&=")]
    BitAndAssign,
    #[serde(rename = "|=")]
    BitOrAssign,
    #[serde(rename = "^=")]
    BitXorAssign,
    #[serde(rename = "<<=")]
    LShiftAssign,
    #[serde(rename = ">>=")]
    RShiftAssign,
    #[serde(rename = ">>>=")]
    URShiftAssign,
}

impl AssignmentOp {
    /// The underlying binary operator of a compound assignment.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignmentOp::Assign => None,
            AssignmentOp::AddAssign => Some(BinaryOp::Add),
            AssignmentOp::SubAssign => Some(BinaryOp::Sub),
            AssignmentOp::MulAssign => Some(BinaryOp::Mul),
            AssignmentOp::DivAssign => Some(BinaryOp::Div),
            AssignmentOp::ModAssign => Some(BinaryOp::Mod),
            AssignmentOp::ExpAssign => Some(BinaryOp::Exp),
            AssignmentOp::BitAndAssign => Some(BinaryOp::BitAnd),
            AssignmentOp::BitOrAssign => Some(BinaryOp::BitOr),
            AssignmentOp::BitXorAssign => Some(BinaryOp::BitXor),
            AssignmentOp::LShiftAssign => Some(BinaryOp::LShift),
            AssignmentOp::RShiftAssign => Some(BinaryOp::RShift),
            AssignmentOp::URShiftAssign => Some(BinaryOp::URShift),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionalExpression {
    pub test: Box<Expression>,
    pub consequent: Box<Expression>,
    pub alternate: Box<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallExpression {
    pub callee: Box<Expression>,
    #[serde(default)]
    pub arguments: Vec<Expression>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewExpression {
    pub callee: Box<Expression>,
    #[serde(default)]
    pub arguments: Vec<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberExpression {
    pub object: Box<Expression>,
    pub property: Box<Expression>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceExpression {
    pub expressions: Vec<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpreadElement {
    pub argument: Box<Expression>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

// ============ PATTERNS ============

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    Identifier(Identifier),
    ObjectPattern(ObjectPattern),
    ArrayPattern(ArrayPattern),
    AssignmentPattern(AssignmentPattern),
    RestElement(RestElement),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectPattern {
    pub properties: Vec<ObjectPatternItem>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectPatternItem {
    Property(PatternProperty),
    RestElement(RestElement),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternProperty {
    pub key: Expression,
    pub value: Box<Pattern>,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub shorthand: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArrayPattern {
    /// `None` entries are elisions.
    pub elements: Vec<Option<Pattern>>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentPattern {
    pub left: Box<Pattern>,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestElement {
    pub argument: Box<Pattern>,
    #[serde(default, rename = "loc")]
    pub span: Span,
}
