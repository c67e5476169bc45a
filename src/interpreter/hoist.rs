//! Declaration pre-scan.
//!
//! Before a program, function body or block runs, its declarations are
//! collected so bindings can be created up front: `var` and function names
//! hoist to the nearest var scope, `let`/`const`/`class` create
//! uninitialized lexical bindings in the immediate scope (the temporal dead
//! zone starts at scope entry).

use crate::ast::{
    ForInit, ForTarget, FunctionDeclaration, ObjectPatternItem, Pattern, Statement,
    VariableKind,
};

#[derive(Debug, Default)]
pub struct Declarations {
    /// `var`-declared names, including those in nested blocks.
    pub vars: Vec<String>,
    /// Function declarations of the immediate statement list, in order.
    pub functions: Vec<FunctionDeclaration>,
    /// Lexical (`let`/`const`/`class`) names of the immediate statement
    /// list, with mutability.
    pub lexical: Vec<(String, bool)>,
}

pub fn scan_statements(body: &[Statement]) -> Declarations {
    let mut decls = Declarations::default();
    for stmt in body {
        scan_statement(stmt, &mut decls, true);
    }
    decls
}

fn scan_statement(stmt: &Statement, decls: &mut Declarations, immediate: bool) {
    match stmt {
        Statement::VariableDeclaration(decl) => match decl.kind {
            VariableKind::Var => {
                for d in &decl.declarations {
                    pattern_names(&d.id, &mut decls.vars);
                }
            }
            VariableKind::Let | VariableKind::Const if immediate => {
                let mutable = decl.kind == VariableKind::Let;
                for d in &decl.declarations {
                    let mut names = Vec::new();
                    pattern_names(&d.id, &mut names);
                    for name in names {
                        decls.lexical.push((name, mutable));
                    }
                }
            }
            _ => {}
        },
        Statement::FunctionDeclaration(func) if immediate => {
            if let Some(id) = &func.id {
                decls.vars.push(id.name.clone());
            }
            decls.functions.push(func.clone());
        }
        Statement::FunctionDeclaration(_) => {}
        Statement::ClassDeclaration(class) if immediate => {
            if let Some(id) = &class.id {
                decls.lexical.push((id.name.clone(), true));
            }
        }
        Statement::ClassDeclaration(_) => {}

        // `var` declarations hoist out of nested statements; lexical and
        // function declarations stay block-scoped.
        Statement::BlockStatement(block) => {
            for s in &block.body {
                scan_statement(s, decls, false);
            }
        }
        Statement::IfStatement(s) => {
            scan_statement(&s.consequent, decls, false);
            if let Some(alt) = &s.alternate {
                scan_statement(alt, decls, false);
            }
        }
        Statement::ForStatement(s) => {
            if let Some(ForInit::Declaration(decl)) = &s.init {
                if decl.kind == VariableKind::Var {
                    for d in &decl.declarations {
                        pattern_names(&d.id, &mut decls.vars);
                    }
                }
            }
            scan_statement(&s.body, decls, false);
        }
        Statement::ForInStatement(s) => {
            scan_for_target(&s.left, decls);
            scan_statement(&s.body, decls, false);
        }
        Statement::ForOfStatement(s) => {
            scan_for_target(&s.left, decls);
            scan_statement(&s.body, decls, false);
        }
        Statement::WhileStatement(s) => scan_statement(&s.body, decls, false),
        Statement::DoWhileStatement(s) => scan_statement(&s.body, decls, false),
        Statement::TryStatement(s) => {
            for st in &s.block.body {
                scan_statement(st, decls, false);
            }
            if let Some(handler) = &s.handler {
                for st in &handler.body.body {
                    scan_statement(st, decls, false);
                }
            }
            if let Some(fin) = &s.finalizer {
                for st in &fin.body {
                    scan_statement(st, decls, false);
                }
            }
        }
        Statement::SwitchStatement(s) => {
            for case in &s.cases {
                for st in &case.consequent {
                    scan_statement(st, decls, false);
                }
            }
        }
        Statement::LabeledStatement(s) => scan_statement(&s.body, decls, immediate),
        Statement::ExportNamedDeclaration(export) => {
            if let Some(decl) = &export.declaration {
                scan_statement(decl, decls, immediate);
            }
        }
        _ => {}
    }
}

fn scan_for_target(target: &ForTarget, decls: &mut Declarations) {
    if let ForTarget::VariableDeclaration(decl) = target {
        if decl.kind == VariableKind::Var {
            for d in &decl.declarations {
                pattern_names(&d.id, &mut decls.vars);
            }
        }
    }
}

/// All identifier names bound by a pattern, in source order.
pub fn pattern_names(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Identifier(id) => out.push(id.name.clone()),
        Pattern::ObjectPattern(obj) => {
            for item in &obj.properties {
                match item {
                    ObjectPatternItem::Property(prop) => pattern_names(&prop.value, out),
                    ObjectPatternItem::RestElement(rest) => pattern_names(&rest.argument, out),
                }
            }
        }
        Pattern::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                pattern_names(element, out);
            }
        }
        Pattern::AssignmentPattern(assign) => pattern_names(&assign.left, out),
        Pattern::RestElement(rest) => pattern_names(&rest.argument, out),
    }
}

/// `"use strict"` in the directive prologue.
pub fn has_use_strict(body: &[Statement]) -> bool {
    for stmt in body {
        match stmt {
            Statement::ExpressionStatement(expr) => match &expr.directive {
                Some(d) if d == "use strict" => return true,
                Some(_) => continue,
                None => return false,
            },
            _ => return false,
        }
    }
    false
}
