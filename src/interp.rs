//! Tree-walking evaluator for synthesized callables.
//!
//! Executes the owned instruction set against a chain of lexical
//! environments. The evaluator is fully synchronous and has no I/O surface
//! of its own; the only observable effects are whatever the executed code
//! performs through the `console` global.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use oxc_syntax::operator::{
    AssignmentOperator, BinaryOperator, LogicalOperator, UnaryOperator, UpdateOperator,
};

use crate::console::{console_object, ConsoleSink, StdoutSink};
use crate::ir::{Expr, Stmt};
use crate::value::{Closure, Value};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("{name} is not defined")]
    UndefinedVariable { name: String },

    #[error("{what} is not a function")]
    NotAFunction { what: String },

    #[error("cannot read properties of {what} (reading '{property}')")]
    BadMemberAccess { what: String, property: String },

    #[error("invalid assignment target")]
    BadAssignment,

    #[error("'{keyword}' outside of a loop")]
    IllegalControlFlow { keyword: &'static str },
}

/// Lexical environment: one frame of bindings plus a parent link.
#[derive(Clone)]
pub struct Env(Rc<EnvInner>);

struct EnvInner {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Env {
    pub fn new() -> Self {
        Env(Rc::new(EnvInner {
            vars: RefCell::new(HashMap::new()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Self {
        Env(Rc::new(EnvInner {
            vars: RefCell::new(HashMap::new()),
            parent: Some(self.clone()),
        }))
    }

    pub fn define(&self, name: &str, value: Value) {
        self.0.vars.borrow_mut().insert(name.to_string(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.0.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.0.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Assign to the nearest frame that already binds `name`.
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if self.0.vars.borrow().contains_key(name) {
            self.0.vars.borrow_mut().insert(name.to_string(), value);
            return true;
        }
        match &self.0.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

/// Statement completion: how control left a statement.
enum Completion {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Owns the global environment a run executes under.
pub struct Interpreter {
    globals: Env,
}

impl Interpreter {
    pub fn new(sink: Rc<dyn ConsoleSink>) -> Self {
        let globals = Env::new();
        globals.define("console", console_object(sink));
        globals.define("undefined", Value::Undefined);
        globals.define("NaN", Value::Number(f64::NAN));
        globals.define("Infinity", Value::Number(f64::INFINITY));
        Interpreter { globals }
    }

    /// Console wired to stdout/stderr; what the CLI uses.
    pub fn with_stdout() -> Self {
        Self::new(Rc::new(StdoutSink))
    }

    /// Invoke a synthesized unit: bind `params` to `args` in a fresh frame
    /// under the globals and run `body` to its return value.
    pub fn call_synthesized(
        &self,
        params: &[String],
        body: &[Stmt],
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let env = self.globals.child();
        bind_params(&env, params, args);
        match run_body(body, &env)? {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(Value::Undefined),
            Completion::Break => Err(RuntimeError::IllegalControlFlow { keyword: "break" }),
            Completion::Continue => Err(RuntimeError::IllegalControlFlow {
                keyword: "continue",
            }),
        }
    }
}

fn bind_params(env: &Env, params: &[String], args: Vec<Value>) {
    let mut args = args.into_iter();
    for param in params {
        env.define(param, args.next().unwrap_or(Value::Undefined));
    }
}

/// Run a function body: hoist function declarations, then execute.
fn run_body(body: &[Stmt], env: &Env) -> Result<Completion, RuntimeError> {
    hoist_functions(body, env);
    exec_stmts(body, env)
}

/// Function declarations are visible before their statement executes.
fn hoist_functions(body: &[Stmt], env: &Env) {
    for stmt in body {
        if let Stmt::FuncDecl { name, func } = stmt {
            env.define(
                name,
                Value::Closure(Rc::new(Closure {
                    func: Rc::clone(func),
                    env: env.clone(),
                })),
            );
        }
    }
}

fn exec_stmts(stmts: &[Stmt], env: &Env) -> Result<Completion, RuntimeError> {
    for stmt in stmts {
        match exec_stmt(stmt, env)? {
            Completion::Normal => {}
            other => return Ok(other),
        }
    }
    Ok(Completion::Normal)
}

fn exec_stmt(stmt: &Stmt, env: &Env) -> Result<Completion, RuntimeError> {
    match stmt {
        Stmt::Expr(expr) => {
            eval(expr, env)?;
        }
        Stmt::VarDecl { declarations } => {
            for (name, init) in declarations {
                let value = match init {
                    Some(expr) => eval(expr, env)?,
                    None => Value::Undefined,
                };
                env.define(name, value);
            }
        }
        // Already bound by hoisting.
        Stmt::FuncDecl { .. } => {}
        Stmt::Return(argument) => {
            let value = match argument {
                Some(expr) => eval(expr, env)?,
                None => Value::Undefined,
            };
            return Ok(Completion::Return(value));
        }
        Stmt::If {
            test,
            consequent,
            alternate,
        } => {
            if eval(test, env)?.truthy() {
                return exec_block(consequent, env);
            } else if let Some(alternate) = alternate {
                return exec_block(alternate, env);
            }
        }
        Stmt::While { test, body } => {
            while eval(test, env)?.truthy() {
                match exec_block(body, env)? {
                    Completion::Break => break,
                    Completion::Continue | Completion::Normal => {}
                    ret @ Completion::Return(_) => return Ok(ret),
                }
            }
        }
        Stmt::For {
            init,
            test,
            update,
            body,
        } => {
            let scope = env.child();
            if let Some(init) = init {
                exec_stmt(init, &scope)?;
            }
            loop {
                if let Some(test) = test {
                    if !eval(test, &scope)?.truthy() {
                        break;
                    }
                }
                match exec_block(body, &scope)? {
                    Completion::Break => break,
                    Completion::Continue | Completion::Normal => {}
                    ret @ Completion::Return(_) => return Ok(ret),
                }
                if let Some(update) = update {
                    eval(update, &scope)?;
                }
            }
        }
        Stmt::Block(body) => return exec_block(body, env),
        Stmt::Break => return Ok(Completion::Break),
        Stmt::Continue => return Ok(Completion::Continue),
    }
    Ok(Completion::Normal)
}

/// Execute a statement list in a fresh child scope.
fn exec_block(body: &[Stmt], env: &Env) -> Result<Completion, RuntimeError> {
    let scope = env.child();
    hoist_functions(body, &scope);
    exec_stmts(body, &scope)
}

pub fn eval(expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
    match expr {
        Expr::Undefined => Ok(Value::Undefined),
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::string(s.as_str())),
        Expr::Template { quasis, exprs } => {
            let mut out = String::new();
            for (i, quasi) in quasis.iter().enumerate() {
                out.push_str(quasi);
                if let Some(expr) = exprs.get(i) {
                    out.push_str(&eval(expr, env)?.display_string());
                }
            }
            Ok(Value::string(out))
        }
        Expr::Ident(name) => env
            .lookup(name)
            .ok_or_else(|| RuntimeError::UndefinedVariable { name: name.clone() }),
        Expr::Member { object, property } => {
            let object = eval(object, env)?;
            get_member(&object, property)
        }
        Expr::Index { object, index } => {
            let object = eval(object, env)?;
            let index = eval(index, env)?;
            get_index(&object, &index)
        }
        Expr::Call { callee, args } => {
            let (func, description) = match callee.as_ref() {
                Expr::Member { object, property } => {
                    let object = eval(object, env)?;
                    (get_member(&object, property)?, property.clone())
                }
                Expr::Index { object, index } => {
                    let object = eval(object, env)?;
                    let index = eval(index, env)?;
                    let description = index.display_string();
                    (get_index(&object, &index)?, description)
                }
                Expr::Ident(name) => (
                    env.lookup(name)
                        .ok_or_else(|| RuntimeError::UndefinedVariable { name: name.clone() })?,
                    name.clone(),
                ),
                other => (eval(other, env)?, "expression".to_string()),
            };

            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval(arg, env)?);
            }
            apply(&func, evaluated, &description)
        }
        Expr::Object(props) => {
            let object = Value::object();
            for (key, value) in props {
                let value = eval(value, env)?;
                object.set_prop(key, value);
            }
            Ok(object)
        }
        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, env)?);
            }
            Ok(Value::array(values))
        }
        Expr::Function(func) => Ok(Value::Closure(Rc::new(Closure {
            func: Rc::clone(func),
            env: env.clone(),
        }))),
        Expr::Unary { op, argument } => eval_unary(*op, argument, env),
        Expr::Binary { op, left, right } => {
            let left = eval(left, env)?;
            let right = eval(right, env)?;
            Ok(eval_binary(*op, &left, &right))
        }
        Expr::Logical { op, left, right } => {
            let left = eval(left, env)?;
            match op {
                LogicalOperator::And => {
                    if left.truthy() {
                        eval(right, env)
                    } else {
                        Ok(left)
                    }
                }
                LogicalOperator::Or => {
                    if left.truthy() {
                        Ok(left)
                    } else {
                        eval(right, env)
                    }
                }
                LogicalOperator::Coalesce => {
                    if left.is_nullish() {
                        eval(right, env)
                    } else {
                        Ok(left)
                    }
                }
            }
        }
        Expr::Assign { op, target, value } => {
            let value = eval(value, env)?;
            let value = match assign_binary_op(*op) {
                None => value,
                Some(binary) => {
                    let current = eval(target, env)?;
                    eval_binary(binary, &current, &value)
                }
            };
            store(target, value.clone(), env)?;
            Ok(value)
        }
        Expr::Update { op, prefix, target } => {
            let old = eval(target, env)?.to_number();
            let new = match op {
                UpdateOperator::Increment => old + 1.0,
                UpdateOperator::Decrement => old - 1.0,
            };
            store(target, Value::Number(new), env)?;
            Ok(Value::Number(if *prefix { new } else { old }))
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if eval(test, env)?.truthy() {
                eval(consequent, env)
            } else {
                eval(alternate, env)
            }
        }
        Expr::Sequence(exprs) => {
            let mut last = Value::Undefined;
            for expr in exprs {
                last = eval(expr, env)?;
            }
            Ok(last)
        }
    }
}

/// Call a function value with already-evaluated arguments.
pub fn apply(func: &Value, args: Vec<Value>, description: &str) -> Result<Value, RuntimeError> {
    match func {
        Value::Closure(closure) => {
            let env = closure.env.child();
            bind_params(&env, &closure.func.params, args);
            match run_body(&closure.func.body, &env)? {
                Completion::Return(value) => Ok(value),
                Completion::Normal => Ok(Value::Undefined),
                Completion::Break => Err(RuntimeError::IllegalControlFlow { keyword: "break" }),
                Completion::Continue => Err(RuntimeError::IllegalControlFlow {
                    keyword: "continue",
                }),
            }
        }
        Value::Native(native) => (native.call)(&args),
        other => Err(RuntimeError::NotAFunction {
            what: format!("{} ({})", description, other.type_of()),
        }),
    }
}

fn get_member(object: &Value, property: &str) -> Result<Value, RuntimeError> {
    match object {
        Value::Undefined | Value::Null => Err(RuntimeError::BadMemberAccess {
            what: object.display_string(),
            property: property.to_string(),
        }),
        Value::Object(_) => Ok(object.get_prop(property).unwrap_or(Value::Undefined)),
        Value::Str(s) if property == "length" => Ok(Value::Number(s.chars().count() as f64)),
        Value::Array(items) if property == "length" => {
            Ok(Value::Number(items.borrow().len() as f64))
        }
        _ => Ok(Value::Undefined),
    }
}

fn get_index(object: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match object {
        Value::Array(items) => {
            let idx = index.to_number();
            if idx >= 0.0 && idx.fract() == 0.0 {
                Ok(items
                    .borrow()
                    .get(idx as usize)
                    .cloned()
                    .unwrap_or(Value::Undefined))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Str(s) => {
            let idx = index.to_number();
            if idx >= 0.0 && idx.fract() == 0.0 {
                Ok(s.chars()
                    .nth(idx as usize)
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or(Value::Undefined))
            } else {
                Ok(Value::Undefined)
            }
        }
        other => get_member(other, &index.display_string()),
    }
}

/// Write through an assignment target.
fn store(target: &Expr, value: Value, env: &Env) -> Result<(), RuntimeError> {
    match target {
        Expr::Ident(name) => {
            // Assignment to an undeclared name defines it in the current
            // frame, matching sloppy-mode JavaScript closely enough for
            // module bodies.
            if !env.assign(name, value.clone()) {
                env.define(name, value);
            }
            Ok(())
        }
        Expr::Member { object, property } => {
            let object = eval(object, env)?;
            if object.set_prop(property, value) {
                Ok(())
            } else {
                Err(RuntimeError::BadAssignment)
            }
        }
        Expr::Index { object, index } => {
            let object = eval(object, env)?;
            let index = eval(index, env)?;
            match &object {
                Value::Array(items) => {
                    let idx = index.to_number();
                    if idx >= 0.0 && idx.fract() == 0.0 {
                        let idx = idx as usize;
                        let mut items = items.borrow_mut();
                        if idx >= items.len() {
                            items.resize(idx + 1, Value::Undefined);
                        }
                        items[idx] = value;
                        return Ok(());
                    }
                    Err(RuntimeError::BadAssignment)
                }
                Value::Object(_) => {
                    object.set_prop(&index.display_string(), value);
                    Ok(())
                }
                _ => Err(RuntimeError::BadAssignment),
            }
        }
        _ => Err(RuntimeError::BadAssignment),
    }
}

fn eval_unary(op: UnaryOperator, argument: &Expr, env: &Env) -> Result<Value, RuntimeError> {
    // `typeof missing` must not throw on an unresolved name.
    if op == UnaryOperator::Typeof {
        if let Expr::Ident(name) = argument {
            return Ok(match env.lookup(name) {
                Some(value) => Value::string(value.type_of()),
                None => Value::string("undefined"),
            });
        }
    }

    let value = eval(argument, env)?;
    Ok(match op {
        UnaryOperator::UnaryNegation => Value::Number(-value.to_number()),
        UnaryOperator::UnaryPlus => Value::Number(value.to_number()),
        UnaryOperator::LogicalNot => Value::Bool(!value.truthy()),
        UnaryOperator::Typeof => Value::string(value.type_of()),
        UnaryOperator::Void => Value::Undefined,
        // Filtered out during lowering.
        UnaryOperator::BitwiseNot | UnaryOperator::Delete => Value::Undefined,
    })
}

fn eval_binary(op: BinaryOperator, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOperator::Addition => {
            if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                Value::string(format!(
                    "{}{}",
                    left.display_string(),
                    right.display_string()
                ))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOperator::Subtraction => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiplication => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Division => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Exponential => {
            Value::Number(left.to_number().powf(right.to_number()))
        }
        BinaryOperator::Equality => Value::Bool(left.loose_eq(right)),
        BinaryOperator::Inequality => Value::Bool(!left.loose_eq(right)),
        BinaryOperator::StrictEquality => Value::Bool(left.strict_eq(right)),
        BinaryOperator::StrictInequality => Value::Bool(!left.strict_eq(right)),
        BinaryOperator::LessThan => compare(left, right, |o| o == std::cmp::Ordering::Less),
        BinaryOperator::LessEqualThan => {
            compare(left, right, |o| o != std::cmp::Ordering::Greater)
        }
        BinaryOperator::GreaterThan => {
            compare(left, right, |o| o == std::cmp::Ordering::Greater)
        }
        BinaryOperator::GreaterEqualThan => {
            compare(left, right, |o| o != std::cmp::Ordering::Less)
        }
        // Filtered out during lowering.
        _ => Value::Undefined,
    }
}

fn compare(left: &Value, right: &Value, accept: fn(std::cmp::Ordering) -> bool) -> Value {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Value::Bool(accept(a.cmp(b)));
    }
    let (a, b) = (left.to_number(), right.to_number());
    match a.partial_cmp(&b) {
        Some(ordering) => Value::Bool(accept(ordering)),
        // NaN on either side.
        None => Value::Bool(false),
    }
}

fn assign_binary_op(op: AssignmentOperator) -> Option<BinaryOperator> {
    match op {
        AssignmentOperator::Assign => None,
        AssignmentOperator::Addition => Some(BinaryOperator::Addition),
        AssignmentOperator::Subtraction => Some(BinaryOperator::Subtraction),
        AssignmentOperator::Multiplication => Some(BinaryOperator::Multiplication),
        AssignmentOperator::Division => Some(BinaryOperator::Division),
        AssignmentOperator::Remainder => Some(BinaryOperator::Remainder),
        // Filtered out during lowering.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::ModuleFn;
    use crate::console::RecordingSink;

    /// Synthesize a parameterless unit, execute it, return the console
    /// output.
    fn run_unit(body: &str) -> Vec<String> {
        let sink = RecordingSink::new();
        let interp = Interpreter::new(sink.clone());
        let module = ModuleFn::synthesize(&[], body, "./test.js").unwrap();
        module.invoke(Vec::new(), &interp).unwrap();
        sink.messages()
    }

    fn run_unit_err(body: &str) -> RuntimeError {
        let sink = RecordingSink::new();
        let interp = Interpreter::new(sink.clone());
        let module = ModuleFn::synthesize(&[], body, "./test.js").unwrap();
        module.invoke(Vec::new(), &interp).unwrap_err()
    }

    #[test]
    fn arithmetic_and_string_concat() {
        let out = run_unit("const x = 2 + 3 * 4; console.log('x = ' + x); return {};");
        assert_eq!(out, vec!["x = 14"]);
    }

    #[test]
    fn template_literals_interpolate() {
        let out = run_unit("const name = 'world'; console.log(`hello ${name}`); return {};");
        assert_eq!(out, vec!["hello world"]);
    }

    #[test]
    fn closures_capture_module_scope() {
        let out = run_unit(
            "let count = 0;
            function bump() { count = count + 1; return count; }
            bump();
            bump();
            console.log(count);
            return {};",
        );
        assert_eq!(out, vec!["2"]);
    }

    #[test]
    fn function_declarations_hoist() {
        let out = run_unit("greet(); function greet() { console.log('hoisted'); } return {};");
        assert_eq!(out, vec!["hoisted"]);
    }

    #[test]
    fn for_loops_with_break_and_continue() {
        let out = run_unit(
            "let total = 0;
            for (let i = 0; i < 10; i++) {
                if (i === 3) { continue; }
                if (i > 5) { break; }
                total += i;
            }
            console.log(total);
            return {};",
        );
        assert_eq!(out, vec!["12"]);
    }

    #[test]
    fn while_loops_terminate() {
        let out = run_unit(
            "let n = 3;
            while (n > 0) { n--; }
            console.log(n);
            return {};",
        );
        assert_eq!(out, vec!["0"]);
    }

    #[test]
    fn arrays_and_objects() {
        let out = run_unit(
            "const arr = [1, 2, 3];
            const o = { a: arr.length };
            console.log(o.a, arr[0]);
            return {};",
        );
        assert_eq!(out, vec!["3 1"]);
    }

    #[test]
    fn arrow_functions_are_values() {
        let out = run_unit("const dbl = (n) => n * 2; console.log(dbl(4)); return {};");
        assert_eq!(out, vec!["8"]);
    }

    #[test]
    fn conditional_and_logical_operators() {
        let out = run_unit(
            "console.log(true ? 'y' : 'n', null ?? 'fallback', 0 || 'or', 1 && 2);
            return {};",
        );
        assert_eq!(out, vec!["y fallback or 2"]);
    }

    #[test]
    fn typeof_an_unresolved_name_is_undefined() {
        let out = run_unit("console.log(typeof missing); return {};");
        assert_eq!(out, vec!["undefined"]);
    }

    #[test]
    fn parameters_bind_positionally() {
        let sink = RecordingSink::new();
        let interp = Interpreter::new(sink.clone());
        let module = ModuleFn::synthesize(
            &["dep".to_string()],
            "console.log(dep.x); return {};",
            "./test.js",
        )
        .unwrap();

        let dep = Value::object();
        dep.set_prop("x", Value::Number(5.0));
        module.invoke(vec![dep], &interp).unwrap();

        assert_eq!(sink.messages(), vec!["5"]);
    }

    #[test]
    fn missing_arguments_are_undefined() {
        let sink = RecordingSink::new();
        let interp = Interpreter::new(sink.clone());
        let module = ModuleFn::synthesize(
            &["dep".to_string()],
            "console.log(typeof dep); return {};",
            "./test.js",
        )
        .unwrap();
        module.invoke(Vec::new(), &interp).unwrap();

        assert_eq!(sink.messages(), vec!["undefined"]);
    }

    #[test]
    fn undefined_variables_raise() {
        let err = run_unit_err("missingThing();");
        assert_eq!(
            err,
            RuntimeError::UndefinedVariable {
                name: "missingThing".to_string()
            }
        );
    }

    #[test]
    fn calling_a_non_function_raises() {
        let err = run_unit_err("const x = 1; x();");
        assert!(matches!(err, RuntimeError::NotAFunction { .. }));
    }

    #[test]
    fn member_access_on_undefined_raises() {
        let err = run_unit_err("const o = {}; o.a.b;");
        assert_eq!(
            err,
            RuntimeError::BadMemberAccess {
                what: "undefined".to_string(),
                property: "b".to_string()
            }
        );
    }

    #[test]
    fn block_scopes_shadow() {
        let out = run_unit(
            "const x = 'outer';
            { const x = 'inner'; console.log(x); }
            console.log(x);
            return {};",
        );
        assert_eq!(out, vec!["inner", "outer"]);
    }
}
