//! Import/export rewriter.
//!
//! Turns one module's ES module syntax into plain identifier references,
//! recording dependency and export metadata as a side effect:
//!
//! ```text
//! import hello from './hello.js';
//!
//! hello();
//!
//! function myHello() { console.log('my hello'); }
//!
//! export default myHello;
//! ==============================
//! _HELLO_<hash>.___default();
//!
//! function myHello() { console.log('my hello'); }
//! ```
//!
//! Import and export statements are stripped while rebuilding the program
//! body; uses of imported bindings are renamed to member accesses on the
//! dependency parameter, with a scope stack keeping shadowed names intact.
//! The mutated tree is regenerated to source text.

use std::collections::{HashMap, HashSet};

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, Declaration, Expression, ExportDefaultDeclarationKind,
    ImportDeclarationSpecifier, ModuleExportName, ObjectProperty, SimpleAssignmentTarget,
    Statement,
};
use oxc_ast::AstBuilder;
use oxc_ast_visit::walk_mut::{
    walk_expression, walk_object_property, walk_simple_assignment_target, walk_statement,
};
use oxc_ast_visit::VisitMut;
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::{SourceType, SPAN};

use crate::error::{Error, Result};
use crate::meta::{canonicalize, FileMetaData, DEFAULT_EXPORT};

/// Where a renamed local now lives: a dependency's exports object, and
/// (unless the whole namespace was imported) a property on it.
struct ImportBinding {
    object: String,
    property: Option<String>,
}

/// Rewrite `source`, populating `meta.deps` and `meta.exports` in place, and
/// return the regenerated text.
pub fn rewrite_module(source: &str, meta: &mut FileMetaData) -> Result<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::Parse {
            path: meta.path.clone(),
            message,
        });
    }

    let mut program = ret.program;
    let ast = AstBuilder::new(&allocator);
    let mut renames: HashMap<String, ImportBinding> = HashMap::new();

    // First pass: strip module syntax in source order, accumulating deps,
    // exports, and the rename map.
    let mut body = ast.vec();
    for stmt in program.body.into_iter() {
        match stmt {
            Statement::ImportDeclaration(import) => {
                let import = import.unbox();
                let dep = canonicalize(&import.source.value);
                let canonical = dep.canonical_name.clone();
                // One entry per statement, duplicates preserved.
                meta.deps.push(dep);

                if let Some(specifiers) = &import.specifiers {
                    for specifier in specifiers {
                        match specifier {
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                                renames.insert(
                                    s.local.name.to_string(),
                                    ImportBinding {
                                        object: canonical.clone(),
                                        property: Some(DEFAULT_EXPORT.to_string()),
                                    },
                                );
                            }
                            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                                renames.insert(
                                    s.local.name.to_string(),
                                    ImportBinding {
                                        object: canonical.clone(),
                                        property: Some(export_name(&s.imported)),
                                    },
                                );
                            }
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                                renames.insert(
                                    s.local.name.to_string(),
                                    ImportBinding {
                                        object: canonical.clone(),
                                        property: None,
                                    },
                                );
                            }
                        }
                    }
                }
            }
            Statement::ExportDefaultDeclaration(export) => {
                let export = export.unbox();
                match export.declaration {
                    // `export default function name() {}` keeps the
                    // function declaration, only the wrapper goes.
                    ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                        let name = func
                            .id
                            .as_ref()
                            .map(|id| id.name.to_string())
                            .unwrap_or_default();
                        meta.exports.set(DEFAULT_EXPORT, &name);
                        body.push(Statement::FunctionDeclaration(func));
                    }
                    ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                        let name = class
                            .id
                            .as_ref()
                            .map(|id| id.name.to_string())
                            .unwrap_or_default();
                        meta.exports.set(DEFAULT_EXPORT, &name);
                        body.push(Statement::ClassDeclaration(class));
                    }
                    kind => {
                        // `export default hello;` refers to a declaration
                        // elsewhere in the file. An anonymous default
                        // records a blank binding, which the export-object
                        // builder drops.
                        let name = match kind.as_expression() {
                            Some(Expression::Identifier(ident)) => ident.name.to_string(),
                            _ => String::new(),
                        };
                        meta.exports.set(DEFAULT_EXPORT, &name);
                    }
                }
            }
            Statement::ExportNamedDeclaration(export) => {
                let export = export.unbox();
                if export.source.is_some() {
                    return Err(Error::Unsupported {
                        path: meta.path.clone(),
                        construct: "re-export from another module".to_string(),
                    });
                }
                if let Some(declaration) = export.declaration {
                    // `export const x = 1` and `export function f() {}`:
                    // record each bound name and keep the declaration.
                    for name in declaration_names(&declaration) {
                        meta.exports.set(&name, &name);
                    }
                    match declaration {
                        Declaration::VariableDeclaration(var) => {
                            body.push(Statement::VariableDeclaration(var));
                        }
                        Declaration::FunctionDeclaration(func) => {
                            body.push(Statement::FunctionDeclaration(func));
                        }
                        Declaration::ClassDeclaration(class) => {
                            body.push(Statement::ClassDeclaration(class));
                        }
                        _ => {}
                    }
                } else {
                    for specifier in &export.specifiers {
                        meta.exports
                            .set(&export_name(&specifier.exported), &export_name(&specifier.local));
                    }
                }
            }
            other => body.push(other),
        }
    }
    program.body = body;

    // Second pass: rename surviving uses of the imported bindings.
    let mut renamer = ImportRenamer::new(&allocator, renames);
    renamer.visit_program(&mut program);

    tracing::trace!(
        path = %meta.path,
        deps = meta.deps.len(),
        exports = meta.exports.len(),
        "rewrote module syntax"
    );

    Ok(Codegen::new().build(&program).code)
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

/// Names bound by an exported declaration.
fn declaration_names(declaration: &Declaration) -> Vec<String> {
    let mut names = Vec::new();
    match declaration {
        Declaration::VariableDeclaration(var) => {
            for declarator in &var.declarations {
                collect_binding_names(&declarator.id, &mut names);
            }
        }
        Declaration::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                names.push(id.name.to_string());
            }
        }
        _ => {}
    }
    names
}

fn collect_binding_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_binding_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for elem in arr.elements.iter().flatten() {
                collect_binding_names(elem, names);
            }
            if let Some(rest) = &arr.rest {
                collect_binding_names(&rest.argument, names);
            }
        }
        _ => {}
    }
}

/// Renames references to imported locals into member accesses on the
/// dependency parameter, tracking lexical scopes so shadowing bindings
/// (params, locals, loop and catch variables) win over imports.
struct ImportRenamer<'a> {
    allocator: &'a Allocator,
    ast: AstBuilder<'a>,
    renames: HashMap<String, ImportBinding>,
    scope_stack: Vec<HashSet<String>>,
}

impl<'a> ImportRenamer<'a> {
    fn new(allocator: &'a Allocator, renames: HashMap<String, ImportBinding>) -> Self {
        Self {
            allocator,
            ast: AstBuilder::new(allocator),
            renames,
            scope_stack: vec![HashSet::new()],
        }
    }

    fn push_scope(&mut self) {
        self.scope_stack.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    fn add_local(&mut self, name: String) {
        if let Some(scope) = self.scope_stack.last_mut() {
            scope.insert(name);
        }
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.scope_stack.iter().rev().any(|s| s.contains(name))
    }

    fn should_rename(&self, name: &str) -> bool {
        self.renames.contains_key(name) && !self.is_shadowed(name)
    }

    fn replacement_expression(&self, name: &str) -> Option<Expression<'a>> {
        if !self.should_rename(name) {
            return None;
        }
        let binding = self.renames.get(name)?;
        let object_name: &'a str = self.allocator.alloc_str(&binding.object);
        let object = self.ast.expression_identifier(SPAN, object_name);
        Some(match &binding.property {
            Some(property) => {
                let property: &'a str = self.allocator.alloc_str(property);
                Expression::from(self.ast.member_expression_static(
                    SPAN,
                    object,
                    self.ast.identifier_name(SPAN, property),
                    false,
                ))
            }
            None => object,
        })
    }

    fn collect_pattern_locals(&mut self, pattern: &BindingPattern<'a>) {
        let mut names = Vec::new();
        collect_binding_names(pattern, &mut names);
        for name in names {
            self.add_local(name);
        }
    }
}

impl<'a> VisitMut<'a> for ImportRenamer<'a> {
    fn visit_statement(&mut self, stmt: &mut Statement<'a>) {
        match stmt {
            Statement::VariableDeclaration(var_decl) => {
                for declarator in &mut var_decl.declarations {
                    let mut names = Vec::new();
                    collect_binding_names(&declarator.id, &mut names);
                    for name in names {
                        self.add_local(name);
                    }
                    if let Some(init) = &mut declarator.init {
                        self.visit_expression(init);
                    }
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    self.add_local(id.name.to_string());
                }
                self.push_scope();
                for param in &func.params.items {
                    self.collect_pattern_locals(&param.pattern);
                }
                if let Some(body) = &mut func.body {
                    for s in &mut body.statements {
                        self.visit_statement(s);
                    }
                }
                self.pop_scope();
            }
            Statement::BlockStatement(block) => {
                self.push_scope();
                for s in &mut block.body {
                    self.visit_statement(s);
                }
                self.pop_scope();
            }
            _ => walk_statement(self, stmt),
        }
    }

    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if let Expression::Identifier(ident) = expr {
            let name = ident.name.to_string();
            if let Some(replacement) = self.replacement_expression(&name) {
                *expr = replacement;
                return;
            }
        }

        if let Expression::ArrowFunctionExpression(arrow) = expr {
            self.push_scope();
            for param in &arrow.params.items {
                self.collect_pattern_locals(&param.pattern);
            }
            for stmt in &mut arrow.body.statements {
                self.visit_statement(stmt);
            }
            self.pop_scope();
            return;
        }

        if let Expression::FunctionExpression(func) = expr {
            self.push_scope();
            for param in &func.params.items {
                self.collect_pattern_locals(&param.pattern);
            }
            if let Some(body) = &mut func.body {
                for s in &mut body.statements {
                    self.visit_statement(s);
                }
            }
            self.pop_scope();
            return;
        }

        walk_expression(self, expr);
    }

    fn visit_object_property(&mut self, prop: &mut ObjectProperty<'a>) {
        // `{ welcome }` must regenerate as `welcome: _WELCOME_x.welcome`,
        // not as shorthand.
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                if self.should_rename(&ident.name.to_string()) {
                    prop.shorthand = false;
                }
            }
        }
        walk_object_property(self, prop);
    }

    fn visit_simple_assignment_target(&mut self, target: &mut SimpleAssignmentTarget<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) = target {
            let name = ident.name.to_string();
            if self.should_rename(&name) {
                if let Some(binding) = self.renames.get(&name) {
                    if let Some(property) = &binding.property {
                        let object_name: &'a str = self.allocator.alloc_str(&binding.object);
                        let property: &'a str = self.allocator.alloc_str(property);
                        let member = self.ast.member_expression_static(
                            SPAN,
                            self.ast.expression_identifier(SPAN, object_name),
                            self.ast.identifier_name(SPAN, property),
                            false,
                        );
                        *target = SimpleAssignmentTarget::from(member);
                        return;
                    }
                }
            }
        }
        walk_simple_assignment_target(self, target);
    }

    fn visit_for_statement(&mut self, stmt: &mut oxc_ast::ast::ForStatement<'a>) {
        self.push_scope();
        if let Some(oxc_ast::ast::ForStatementInit::VariableDeclaration(var_decl)) = &mut stmt.init
        {
            for declarator in &mut var_decl.declarations {
                let mut names = Vec::new();
                collect_binding_names(&declarator.id, &mut names);
                for name in names {
                    self.add_local(name);
                }
                if let Some(init) = &mut declarator.init {
                    self.visit_expression(init);
                }
            }
        }
        if let Some(test) = &mut stmt.test {
            self.visit_expression(test);
        }
        if let Some(update) = &mut stmt.update {
            self.visit_expression(update);
        }
        self.visit_statement(&mut stmt.body);
        self.pop_scope();
    }

    fn visit_catch_clause(&mut self, clause: &mut oxc_ast::ast::CatchClause<'a>) {
        self.push_scope();
        if let Some(param) = &clause.param {
            let mut names = Vec::new();
            collect_binding_names(&param.pattern, &mut names);
            for name in names {
                self.add_local(name);
            }
        }
        for stmt in &mut clause.body.body {
            self.visit_statement(stmt);
        }
        self.pop_scope();
    }
}
