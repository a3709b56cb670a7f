//! Lowering from the oxc AST to the owned instruction set.
//!
//! Runs once per synthesized callable. Anything outside the executable
//! subset fails here, at compile time, with the offending construct named,
//! so execution never encounters unknown syntax.

use oxc_ast::ast::{
    ArrayExpressionElement, ArrowFunctionExpression, AssignmentTarget, BindingPattern, Expression,
    FormalParameters, Function, FunctionBody, ObjectPropertyKind, PropertyKey, PropertyKind,
    SimpleAssignmentTarget, Statement,
};
use oxc_syntax::operator::{BinaryOperator, UnaryOperator};
use std::rc::Rc;

use crate::ir::{Expr, FuncIr, Stmt};

/// A construct the executable subset does not cover.
#[derive(Debug, Clone)]
pub struct LowerError {
    pub construct: String,
}

fn unsupported<T>(construct: &str) -> Result<T, LowerError> {
    Err(LowerError {
        construct: construct.to_string(),
    })
}

pub fn lower_function_body(body: &FunctionBody) -> Result<Vec<Stmt>, LowerError> {
    lower_statement_list(&body.statements)
}

fn lower_statement_list(stmts: &[Statement]) -> Result<Vec<Stmt>, LowerError> {
    let mut lowered = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        if let Some(s) = lower_statement(stmt)? {
            lowered.push(s);
        }
    }
    Ok(lowered)
}

/// Lower one statement; empty statements lower to nothing.
fn lower_statement(stmt: &Statement) -> Result<Option<Stmt>, LowerError> {
    let lowered = match stmt {
        Statement::EmptyStatement(_) => return Ok(None),
        Statement::ExpressionStatement(s) => Stmt::Expr(lower_expression(&s.expression)?),
        Statement::VariableDeclaration(decl) => {
            let mut declarations = Vec::with_capacity(decl.declarations.len());
            for declarator in &decl.declarations {
                let name = match &declarator.id {
                    BindingPattern::BindingIdentifier(id) => id.name.to_string(),
                    _ => return unsupported("destructuring declaration"),
                };
                let init = declarator
                    .init
                    .as_ref()
                    .map(lower_expression)
                    .transpose()?;
                declarations.push((name, init));
            }
            Stmt::VarDecl { declarations }
        }
        Statement::FunctionDeclaration(func) => {
            let name = match &func.id {
                Some(id) => id.name.to_string(),
                None => return unsupported("anonymous function declaration"),
            };
            Stmt::FuncDecl {
                name,
                func: Rc::new(lower_function(func)?),
            }
        }
        Statement::ReturnStatement(ret) => {
            Stmt::Return(ret.argument.as_ref().map(lower_expression).transpose()?)
        }
        Statement::IfStatement(if_stmt) => Stmt::If {
            test: lower_expression(&if_stmt.test)?,
            consequent: lower_branch(&if_stmt.consequent)?,
            alternate: if_stmt
                .alternate
                .as_ref()
                .map(|alt| lower_branch(alt))
                .transpose()?,
        },
        Statement::WhileStatement(while_stmt) => Stmt::While {
            test: lower_expression(&while_stmt.test)?,
            body: lower_branch(&while_stmt.body)?,
        },
        Statement::ForStatement(for_stmt) => {
            let init = match &for_stmt.init {
                None => None,
                Some(init) => match init.as_expression() {
                    Some(expr) => Some(Box::new(Stmt::Expr(lower_expression(expr)?))),
                    None => {
                        // ForStatementInit is either an expression or a
                        // variable declaration.
                        let as_stmt = match init {
                            oxc_ast::ast::ForStatementInit::VariableDeclaration(decl) => {
                                let mut declarations = Vec::new();
                                for declarator in &decl.declarations {
                                    let name = match &declarator.id {
                                        BindingPattern::BindingIdentifier(id) => {
                                            id.name.to_string()
                                        }
                                        _ => return unsupported("destructuring declaration"),
                                    };
                                    let value = declarator
                                        .init
                                        .as_ref()
                                        .map(lower_expression)
                                        .transpose()?;
                                    declarations.push((name, value));
                                }
                                Stmt::VarDecl { declarations }
                            }
                            _ => return unsupported("for-loop initializer"),
                        };
                        Some(Box::new(as_stmt))
                    }
                },
            };
            Stmt::For {
                init,
                test: for_stmt.test.as_ref().map(lower_expression).transpose()?,
                update: for_stmt.update.as_ref().map(lower_expression).transpose()?,
                body: lower_branch(&for_stmt.body)?,
            }
        }
        Statement::BlockStatement(block) => Stmt::Block(lower_statement_list(&block.body)?),
        Statement::BreakStatement(brk) => {
            if brk.label.is_some() {
                return unsupported("labeled break");
            }
            Stmt::Break
        }
        Statement::ContinueStatement(cont) => {
            if cont.label.is_some() {
                return unsupported("labeled continue");
            }
            Stmt::Continue
        }
        Statement::ForOfStatement(_) => return unsupported("for-of loop"),
        Statement::ForInStatement(_) => return unsupported("for-in loop"),
        Statement::DoWhileStatement(_) => return unsupported("do-while loop"),
        Statement::SwitchStatement(_) => return unsupported("switch statement"),
        Statement::ThrowStatement(_) => return unsupported("throw statement"),
        Statement::TryStatement(_) => return unsupported("try/catch"),
        Statement::ClassDeclaration(_) => return unsupported("class declaration"),
        Statement::LabeledStatement(_) => return unsupported("labeled statement"),
        Statement::ImportDeclaration(_)
        | Statement::ExportDefaultDeclaration(_)
        | Statement::ExportNamedDeclaration(_)
        | Statement::ExportAllDeclaration(_) => return unsupported("module declaration"),
        _ => return unsupported("statement"),
    };
    Ok(Some(lowered))
}

/// Lower the body of an `if`/`while`/`for` branch: a block's statements
/// directly, or the single statement wrapped in a list.
fn lower_branch(stmt: &Statement) -> Result<Vec<Stmt>, LowerError> {
    match stmt {
        Statement::BlockStatement(block) => lower_statement_list(&block.body),
        other => Ok(lower_statement(other)?.into_iter().collect()),
    }
}

fn lower_function(func: &Function) -> Result<FuncIr, LowerError> {
    if func.r#async {
        return unsupported("async function");
    }
    if func.generator {
        return unsupported("generator function");
    }
    let body = match &func.body {
        Some(body) => lower_function_body(body)?,
        None => return unsupported("function without a body"),
    };
    Ok(FuncIr {
        name: func.id.as_ref().map(|id| id.name.to_string()),
        params: lower_params(&func.params)?,
        body,
    })
}

fn lower_arrow(arrow: &ArrowFunctionExpression) -> Result<FuncIr, LowerError> {
    if arrow.r#async {
        return unsupported("async arrow function");
    }
    let params = lower_params(&arrow.params)?;

    // Expression-bodied arrows carry their expression as a lone
    // expression statement; it becomes the return value.
    let body = if arrow.expression {
        match arrow.body.statements.first() {
            Some(Statement::ExpressionStatement(s)) => {
                vec![Stmt::Return(Some(lower_expression(&s.expression)?))]
            }
            _ => return unsupported("arrow function body"),
        }
    } else {
        lower_statement_list(&arrow.body.statements)?
    };

    Ok(FuncIr {
        name: None,
        params,
        body,
    })
}

fn lower_params(params: &FormalParameters) -> Result<Vec<String>, LowerError> {
    if params.rest.is_some() {
        return unsupported("rest parameter");
    }
    let mut names = Vec::with_capacity(params.items.len());
    for param in &params.items {
        match &param.pattern {
            BindingPattern::BindingIdentifier(id) => names.push(id.name.to_string()),
            _ => return unsupported("destructuring parameter"),
        }
    }
    Ok(names)
}

fn lower_expression(expr: &Expression) -> Result<Expr, LowerError> {
    let lowered = match expr {
        Expression::NullLiteral(_) => Expr::Null,
        Expression::BooleanLiteral(lit) => Expr::Bool(lit.value),
        Expression::NumericLiteral(lit) => Expr::Number(lit.value),
        Expression::StringLiteral(lit) => Expr::Str(lit.value.to_string()),
        Expression::TemplateLiteral(tpl) => {
            let quasis = tpl
                .quasis
                .iter()
                .map(|quasi| {
                    quasi
                        .value
                        .cooked
                        .as_ref()
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| quasi.value.raw.to_string())
                })
                .collect();
            let exprs = tpl
                .expressions
                .iter()
                .map(lower_expression)
                .collect::<Result<Vec<_>, _>>()?;
            Expr::Template { quasis, exprs }
        }
        Expression::Identifier(ident) => Expr::Ident(ident.name.to_string()),
        Expression::ParenthesizedExpression(paren) => lower_expression(&paren.expression)?,
        Expression::StaticMemberExpression(member) => {
            if member.optional {
                return unsupported("optional chaining");
            }
            Expr::Member {
                object: Box::new(lower_expression(&member.object)?),
                property: member.property.name.to_string(),
            }
        }
        Expression::ComputedMemberExpression(member) => {
            if member.optional {
                return unsupported("optional chaining");
            }
            Expr::Index {
                object: Box::new(lower_expression(&member.object)?),
                index: Box::new(lower_expression(&member.expression)?),
            }
        }
        Expression::CallExpression(call) => {
            if call.optional {
                return unsupported("optional call");
            }
            let mut args = Vec::with_capacity(call.arguments.len());
            for arg in &call.arguments {
                match arg.as_expression() {
                    Some(expr) => args.push(lower_expression(expr)?),
                    None => return unsupported("spread argument"),
                }
            }
            Expr::Call {
                callee: Box::new(lower_expression(&call.callee)?),
                args,
            }
        }
        Expression::ObjectExpression(obj) => {
            let mut props = Vec::with_capacity(obj.properties.len());
            for prop in &obj.properties {
                match prop {
                    ObjectPropertyKind::ObjectProperty(p) => {
                        if p.kind != PropertyKind::Init {
                            return unsupported("getter/setter property");
                        }
                        if p.computed {
                            return unsupported("computed property key");
                        }
                        props.push((property_key_name(&p.key)?, lower_expression(&p.value)?));
                    }
                    ObjectPropertyKind::SpreadProperty(_) => {
                        return unsupported("spread property")
                    }
                }
            }
            Expr::Object(props)
        }
        Expression::ArrayExpression(arr) => {
            let mut items = Vec::with_capacity(arr.elements.len());
            for elem in &arr.elements {
                match elem {
                    ArrayExpressionElement::Elision(_) => items.push(Expr::Undefined),
                    other => match other.as_expression() {
                        Some(expr) => items.push(lower_expression(expr)?),
                        None => return unsupported("spread element"),
                    },
                }
            }
            Expr::Array(items)
        }
        Expression::FunctionExpression(func) => Expr::Function(Rc::new(lower_function(func)?)),
        Expression::ArrowFunctionExpression(arrow) => {
            Expr::Function(Rc::new(lower_arrow(arrow)?))
        }
        Expression::UnaryExpression(unary) => {
            match unary.operator {
                UnaryOperator::UnaryNegation
                | UnaryOperator::UnaryPlus
                | UnaryOperator::LogicalNot
                | UnaryOperator::Typeof
                | UnaryOperator::Void => {}
                UnaryOperator::BitwiseNot => return unsupported("bitwise not"),
                UnaryOperator::Delete => return unsupported("delete operator"),
            }
            Expr::Unary {
                op: unary.operator,
                argument: Box::new(lower_expression(&unary.argument)?),
            }
        }
        Expression::BinaryExpression(binary) => {
            match binary.operator {
                BinaryOperator::Addition
                | BinaryOperator::Subtraction
                | BinaryOperator::Multiplication
                | BinaryOperator::Division
                | BinaryOperator::Remainder
                | BinaryOperator::Exponential
                | BinaryOperator::Equality
                | BinaryOperator::Inequality
                | BinaryOperator::StrictEquality
                | BinaryOperator::StrictInequality
                | BinaryOperator::LessThan
                | BinaryOperator::LessEqualThan
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterEqualThan => {}
                _ => return unsupported("binary operator"),
            }
            Expr::Binary {
                op: binary.operator,
                left: Box::new(lower_expression(&binary.left)?),
                right: Box::new(lower_expression(&binary.right)?),
            }
        }
        Expression::LogicalExpression(logical) => Expr::Logical {
            op: logical.operator,
            left: Box::new(lower_expression(&logical.left)?),
            right: Box::new(lower_expression(&logical.right)?),
        },
        Expression::AssignmentExpression(assign) => {
            if !matches!(
                assign.operator,
                oxc_syntax::operator::AssignmentOperator::Assign
                    | oxc_syntax::operator::AssignmentOperator::Addition
                    | oxc_syntax::operator::AssignmentOperator::Subtraction
                    | oxc_syntax::operator::AssignmentOperator::Multiplication
                    | oxc_syntax::operator::AssignmentOperator::Division
                    | oxc_syntax::operator::AssignmentOperator::Remainder
            ) {
                return unsupported("assignment operator");
            }
            Expr::Assign {
                op: assign.operator,
                target: Box::new(lower_assignment_target(&assign.left)?),
                value: Box::new(lower_expression(&assign.right)?),
            }
        }
        Expression::UpdateExpression(update) => Expr::Update {
            op: update.operator,
            prefix: update.prefix,
            target: Box::new(lower_simple_target(&update.argument)?),
        },
        Expression::ConditionalExpression(cond) => Expr::Conditional {
            test: Box::new(lower_expression(&cond.test)?),
            consequent: Box::new(lower_expression(&cond.consequent)?),
            alternate: Box::new(lower_expression(&cond.alternate)?),
        },
        Expression::SequenceExpression(seq) => Expr::Sequence(
            seq.expressions
                .iter()
                .map(lower_expression)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Expression::NewExpression(_) => return unsupported("new expression"),
        Expression::ThisExpression(_) => return unsupported("this expression"),
        Expression::AwaitExpression(_) => return unsupported("await expression"),
        Expression::YieldExpression(_) => return unsupported("yield expression"),
        Expression::ClassExpression(_) => return unsupported("class expression"),
        Expression::RegExpLiteral(_) => return unsupported("regex literal"),
        Expression::BigIntLiteral(_) => return unsupported("bigint literal"),
        Expression::TaggedTemplateExpression(_) => return unsupported("tagged template"),
        Expression::ChainExpression(_) => return unsupported("optional chaining"),
        Expression::PrivateFieldExpression(_) => return unsupported("private field"),
        _ => return unsupported("expression"),
    };
    Ok(lowered)
}

fn property_key_name(key: &PropertyKey) -> Result<String, LowerError> {
    match key {
        PropertyKey::StaticIdentifier(id) => Ok(id.name.to_string()),
        PropertyKey::StringLiteral(lit) => Ok(lit.value.to_string()),
        PropertyKey::NumericLiteral(lit) => Ok(crate::value::Value::Number(lit.value).display_string()),
        _ => unsupported("property key"),
    }
}

fn lower_assignment_target(target: &AssignmentTarget) -> Result<Expr, LowerError> {
    match target {
        AssignmentTarget::AssignmentTargetIdentifier(id) => Ok(Expr::Ident(id.name.to_string())),
        AssignmentTarget::StaticMemberExpression(member) => Ok(Expr::Member {
            object: Box::new(lower_expression(&member.object)?),
            property: member.property.name.to_string(),
        }),
        AssignmentTarget::ComputedMemberExpression(member) => Ok(Expr::Index {
            object: Box::new(lower_expression(&member.object)?),
            index: Box::new(lower_expression(&member.expression)?),
        }),
        _ => unsupported("destructuring assignment"),
    }
}

fn lower_simple_target(target: &SimpleAssignmentTarget) -> Result<Expr, LowerError> {
    match target {
        SimpleAssignmentTarget::AssignmentTargetIdentifier(id) => {
            Ok(Expr::Ident(id.name.to_string()))
        }
        SimpleAssignmentTarget::StaticMemberExpression(member) => Ok(Expr::Member {
            object: Box::new(lower_expression(&member.object)?),
            property: member.property.name.to_string(),
        }),
        SimpleAssignmentTarget::ComputedMemberExpression(member) => Ok(Expr::Index {
            object: Box::new(lower_expression(&member.object)?),
            index: Box::new(lower_expression(&member.expression)?),
        }),
        _ => unsupported("update target"),
    }
}
