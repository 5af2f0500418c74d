//! # Unit Script Evaluator
//!
//! Tree-walking evaluation of spanned AST nodes against lexical scopes.
//!
//! ## Design Principles
//!
//! - **Exceptions are values**: every runtime failure is a `Raised` carrying
//!   an exception instance, propagated with `?`
//! - **Unit-bound evaluation**: an `Interpreter` always evaluates on behalf of
//!   one unit, so output and depth accounting land in that unit
//! - **Closed set of special forms**: anything else in head position is a call

use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::script::ast::{AstNode, Expr, Span};
use crate::script::exceptions::Raised;
use crate::script::scope::Scope;
use crate::script::unit::UnitRuntime;
use crate::script::value::{
    BoundMethod, Class, EvalResult, Function, Instance, Param, Value,
};

// ============================================================================
// CALL CONTEXT
// ============================================================================

/// What a native function sees of the interpreter that called it.
pub struct CallContext<'a> {
    interp: &'a Interpreter,
    pub span: Span,
}

impl CallContext<'_> {
    pub fn unit(&self) -> &Rc<UnitRuntime> {
        &self.interp.unit
    }

    pub fn interpreter(&self) -> &Interpreter {
        self.interp
    }

    pub fn raise(&self, class_name: &str, message: impl Into<String>) -> Raised {
        self.interp.unit.raise(class_name, message, self.span)
    }

    /// Calls back into script code with positional arguments.
    pub fn call(&self, callee: &Value, args: Vec<Value>) -> EvalResult {
        self.interp
            .call_value(callee, args, IndexMap::new(), self.span)
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

pub struct Interpreter {
    unit: Rc<UnitRuntime>,
}

impl Interpreter {
    pub fn new(unit: Rc<UnitRuntime>) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> &Rc<UnitRuntime> {
        &self.unit
    }

    /// Evaluates each node in order; the value of the last one is the result.
    pub fn eval_block(&self, nodes: &[AstNode], scope: &Rc<Scope>) -> EvalResult {
        let mut last = Value::Nil;
        for node in nodes {
            last = self.eval(node, scope)?;
        }
        Ok(last)
    }

    pub fn eval(&self, node: &AstNode, scope: &Rc<Scope>) -> EvalResult {
        let span = node.span;
        match &*node.value {
            Expr::Nil => Ok(Value::Nil),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::String(s) => Ok(Value::Str(s.clone())),
            Expr::Symbol(name) => self.resolve(name, scope, span),
            Expr::Attr(base, path) => {
                let mut value = self.resolve(base, scope, span)?;
                for member in path {
                    value = self.get_member(&value, member, span)?;
                }
                Ok(value)
            }
            Expr::List(items) => self.eval_list(items, scope, span),
        }
    }

    fn resolve(&self, name: &str, scope: &Rc<Scope>, span: Span) -> EvalResult {
        scope
            .lookup(name)
            .or_else(|| self.unit.builtin(name))
            .ok_or_else(|| {
                self.unit
                    .raise("NameError", format!("name '{}' is not defined", name), span)
            })
    }

    fn eval_list(&self, items: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let Some((head, rest)) = items.split_first() else {
            return Ok(Value::Nil);
        };

        if let Some(name) = head.value.as_symbol() {
            match name {
                "define" => return self.eval_define(rest, scope, span),
                "set!" => return self.eval_set(rest, scope, span),
                "lambda" => return self.eval_lambda(rest, scope, span),
                "if" => return self.eval_if(rest, scope, span),
                "cond" => return self.eval_cond(rest, scope, span),
                "when" => return self.eval_when(rest, scope, span),
                "do" => return self.eval_block(rest, scope),
                "let" => return self.eval_let(rest, scope, span),
                "while" => return self.eval_while(rest, scope, span),
                "for" => return self.eval_for(rest, scope, span),
                "and" => return self.eval_and(rest, scope),
                "or" => return self.eval_or(rest, scope),
                "class" => return self.eval_class(rest, scope, span),
                "raise" => return self.eval_raise(rest, scope, span),
                "try" => return self.eval_try(rest, scope, span),
                _ => {}
            }
        }

        let callee = self.eval(head, scope)?;
        let args = rest
            .iter()
            .map(|arg| self.eval(arg, scope))
            .collect::<Result<Vec<_>, _>>()?;
        self.call_value(&callee, args, IndexMap::new(), span)
    }

    fn syntax_error(&self, message: impl Into<String>, span: Span) -> Raised {
        self.unit.raise("SyntaxError", message, span)
    }

    fn type_error(&self, message: impl Into<String>, span: Span) -> Raised {
        self.unit.raise("TypeError", message, span)
    }

    // ------------------------------------------------------------------------
    // Special forms
    // ------------------------------------------------------------------------

    fn eval_define(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        match rest.first().map(|n| &*n.value) {
            Some(Expr::Symbol(name)) => {
                if rest.len() > 2 {
                    return Err(self.syntax_error("define expects a name and one value", span));
                }
                let value = match rest.get(1) {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Nil,
                };
                scope.define(name.clone(), value);
                Ok(Value::Nil)
            }
            Some(Expr::List(signature)) => {
                let Some((name_node, params)) = signature.split_first() else {
                    return Err(self.syntax_error("define expects a function name", span));
                };
                let Some(name) = name_node.value.as_symbol() else {
                    return Err(self.syntax_error("function name must be a symbol", name_node.span));
                };
                let function = self.make_function(name, params, &rest[1..], scope, span)?;
                scope.define(name, function);
                Ok(Value::Nil)
            }
            _ => Err(self.syntax_error("define expects a name or (name params...)", span)),
        }
    }

    fn eval_lambda(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let Some(params) = rest.first().and_then(|n| n.value.as_list()) else {
            return Err(self.syntax_error("lambda expects a parameter list", span));
        };
        self.make_function("<lambda>", params, &rest[1..], scope, span)
    }

    fn make_function(
        &self,
        name: &str,
        params: &[AstNode],
        body: &[AstNode],
        scope: &Rc<Scope>,
        span: Span,
    ) -> EvalResult {
        let mut parsed: Vec<Param> = Vec::with_capacity(params.len());
        for param in params {
            let (param_name, default) = match &*param.value {
                Expr::Symbol(s) => (s.clone(), None),
                Expr::List(pair) => match pair.as_slice() {
                    [name, default] => match name.value.as_symbol() {
                        Some(s) => (s.to_string(), Some(default.clone())),
                        None => {
                            return Err(self.syntax_error("parameter name must be a symbol", name.span))
                        }
                    },
                    _ => {
                        return Err(
                            self.syntax_error("default parameter must be (name value)", param.span)
                        )
                    }
                },
                _ => return Err(self.syntax_error("invalid parameter", param.span)),
            };
            if parsed.iter().any(|p| p.name == param_name) {
                return Err(self.syntax_error(
                    format!("duplicate parameter '{}'", param_name),
                    param.span,
                ));
            }
            parsed.push(Param {
                name: param_name,
                default,
            });
        }

        Ok(Value::Function(Rc::new(Function {
            name: name.to_string(),
            params: parsed,
            body: body.to_vec(),
            env: scope.clone(),
            unit: self.unit.clone(),
            span,
        })))
    }

    fn eval_set(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let [target, expr] = rest else {
            return Err(self.syntax_error("set! expects a target and a value", span));
        };
        let value = self.eval(expr, scope)?;
        match &*target.value {
            Expr::Symbol(name) => {
                if scope.assign(name, value) {
                    Ok(Value::Nil)
                } else {
                    Err(self.unit.raise(
                        "NameError",
                        format!("name '{}' is not defined", name),
                        target.span,
                    ))
                }
            }
            Expr::Attr(base, path) => {
                let mut object = self.resolve(base, scope, target.span)?;
                let Some((last, parents)) = path.split_last() else {
                    return Err(self.syntax_error("empty attribute path", target.span));
                };
                for member in parents {
                    object = self.get_member(&object, member, target.span)?;
                }
                self.set_member(&object, last, value, target.span)?;
                Ok(Value::Nil)
            }
            _ => Err(self.syntax_error("set! target must be a name or attribute path", target.span)),
        }
    }

    fn eval_if(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        match rest {
            [test, then] => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(then, scope)
                } else {
                    Ok(Value::Nil)
                }
            }
            [test, then, otherwise] => {
                if self.eval(test, scope)?.is_truthy() {
                    self.eval(then, scope)
                } else {
                    self.eval(otherwise, scope)
                }
            }
            _ => Err(self.syntax_error("if expects a test, a branch and an optional else", span)),
        }
    }

    fn eval_cond(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        for clause in rest {
            let Some([test, body @ ..]) = clause.value.as_list() else {
                return Err(self.syntax_error("cond clause must be (test body...)", span));
            };
            if test.value.as_symbol() == Some("else") || self.eval(test, scope)?.is_truthy() {
                return self.eval_block(body, scope);
            }
        }
        Ok(Value::Nil)
    }

    fn eval_when(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let Some((test, body)) = rest.split_first() else {
            return Err(self.syntax_error("when expects a test", span));
        };
        if self.eval(test, scope)?.is_truthy() {
            self.eval_block(body, scope)
        } else {
            Ok(Value::Nil)
        }
    }

    fn eval_let(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let Some(bindings) = rest.first().and_then(|n| n.value.as_list()) else {
            return Err(self.syntax_error("let expects a binding list", span));
        };
        let inner = Scope::child(scope);
        for binding in bindings {
            let Some([name, expr]) = binding.value.as_list() else {
                return Err(self.syntax_error("let binding must be (name value)", binding.span));
            };
            let Some(name) = name.value.as_symbol() else {
                return Err(self.syntax_error("let binding name must be a symbol", name.span));
            };
            let value = self.eval(expr, &inner)?;
            inner.define(name, value);
        }
        self.eval_block(&rest[1..], &inner)
    }

    fn eval_while(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let Some((test, body)) = rest.split_first() else {
            return Err(self.syntax_error("while expects a test", span));
        };
        while self.eval(test, scope)?.is_truthy() {
            self.eval_block(body, scope)?;
        }
        Ok(Value::Nil)
    }

    fn eval_for(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let Some((binding, body)) = rest.split_first() else {
            return Err(self.syntax_error("for expects ((name items) body...)", span));
        };
        let Some([var, iterable]) = binding.value.as_list() else {
            return Err(self.syntax_error("for expects ((name items) body...)", binding.span));
        };
        let Some(var) = var.value.as_symbol() else {
            return Err(self.syntax_error("for variable must be a symbol", var.span));
        };

        let items: Vec<Value> = match self.eval(iterable, scope)? {
            Value::List(items) => items.borrow().clone(),
            Value::Dict(map) => map.borrow().keys().cloned().map(Value::Str).collect(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            other => {
                return Err(self.type_error(
                    format!("'{}' object is not iterable", other.type_name()),
                    iterable.span,
                ))
            }
        };

        let inner = Scope::child(scope);
        for item in items {
            inner.define(var, item);
            self.eval_block(body, &inner)?;
        }
        Ok(Value::Nil)
    }

    fn eval_and(&self, rest: &[AstNode], scope: &Rc<Scope>) -> EvalResult {
        let mut last = Value::Bool(true);
        for node in rest {
            last = self.eval(node, scope)?;
            if !last.is_truthy() {
                return Ok(last);
            }
        }
        Ok(last)
    }

    fn eval_or(&self, rest: &[AstNode], scope: &Rc<Scope>) -> EvalResult {
        let mut last = Value::Bool(false);
        for node in rest {
            last = self.eval(node, scope)?;
            if last.is_truthy() {
                return Ok(last);
            }
        }
        Ok(last)
    }

    fn eval_class(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let Some(name) = rest.first().and_then(|n| n.value.as_symbol()) else {
            return Err(self.syntax_error("class expects a name", span));
        };
        let Some(bases) = rest.get(1).and_then(|n| n.value.as_list()) else {
            return Err(self.syntax_error("class expects a base list, e.g. (class Name () ...)", span));
        };
        let base = match bases {
            [] => None,
            [base] => match self.eval(base, scope)? {
                Value::Class(class) => Some(class),
                other => {
                    return Err(self.type_error(
                        format!("class base must be a class, not {}", other.type_name()),
                        base.span,
                    ))
                }
            },
            _ => return Err(self.syntax_error("classes have at most one base", span)),
        };

        let body_scope = Scope::child(scope);
        for member in &rest[2..] {
            self.eval(member, &body_scope)?;
        }

        let mut attrs = IndexMap::new();
        for member_name in body_scope.names() {
            if let Some(value) = body_scope.remove(&member_name) {
                attrs.insert(member_name, value);
            }
        }
        let class = Class {
            name: name.to_string(),
            base,
            attrs: RefCell::new(attrs),
            unit: Some(self.unit.clone()),
        };
        scope.define(name, Value::Class(Rc::new(class)));
        Ok(Value::Nil)
    }

    fn eval_raise(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let raised = match rest {
            [] => return Err(self.syntax_error("raise expects an exception", span)),
            [expr] => self.eval(expr, scope)?,
            [class, args @ ..] => {
                let callee = self.eval(class, scope)?;
                if !matches!(callee, Value::Class(_)) {
                    return Err(self.type_error("raise with arguments expects a class", class.span));
                }
                let args = args
                    .iter()
                    .map(|a| self.eval(a, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call_value(&callee, args, IndexMap::new(), span)?
            }
        };

        let exception = match raised {
            Value::Class(class) if class.is_exception() => {
                self.instantiate(&class, vec![], IndexMap::new(), span)?
            }
            value if value.as_exception().is_some() => value,
            _ => {
                return Err(self.type_error("exceptions must derive from BaseException", span))
            }
        };
        Err(Raised::new(exception, Some(span)))
    }

    fn eval_try(&self, rest: &[AstNode], scope: &Rc<Scope>, span: Span) -> EvalResult {
        let mut body: Vec<AstNode> = Vec::new();
        let mut handlers: Vec<&[AstNode]> = Vec::new();
        let mut cleanup: Option<&[AstNode]> = None;

        for node in rest {
            match node.value.as_list() {
                Some([head, tail @ ..]) if head.value.as_symbol() == Some("catch") => {
                    handlers.push(tail)
                }
                Some([head, tail @ ..]) if head.value.as_symbol() == Some("finally") => {
                    cleanup = Some(tail)
                }
                _ => body.push(node.clone()),
            }
        }

        let result = match self.eval_block(&body, scope) {
            Err(raised) => self.handle(raised, &handlers, scope, span),
            ok => ok,
        };

        if let Some(cleanup) = cleanup {
            self.eval_block(cleanup, scope)?;
        }
        result
    }

    fn handle(
        &self,
        raised: Raised,
        handlers: &[&[AstNode]],
        scope: &Rc<Scope>,
        span: Span,
    ) -> EvalResult {
        for handler in handlers {
            let [class_node, var_node, handler_body @ ..] = *handler else {
                return Err(self.syntax_error("catch expects (catch Class name body...)", span));
            };
            let class = match self.eval(class_node, scope)? {
                Value::Class(class) => class,
                other => {
                    return Err(self.type_error(
                        format!("catch expects a class, not {}", other.type_name()),
                        class_node.span,
                    ))
                }
            };
            if !instance_of(&raised.exception, &class) {
                continue;
            }
            let Some(var) = var_node.value.as_symbol() else {
                return Err(self.syntax_error("catch variable must be a symbol", var_node.span));
            };
            let handler_scope = Scope::child(scope);
            handler_scope.define(var, raised.exception.clone());
            return self.eval_block(handler_body, &handler_scope);
        }
        Err(raised)
    }

    // ------------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------------

    pub fn call_value(
        &self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
        span: Span,
    ) -> EvalResult {
        match callee {
            Value::Function(function) => self.call_function(function, None, args, kwargs, span),
            Value::Method(method) => self.call_function(
                &method.function,
                Some(method.receiver.clone()),
                args,
                kwargs,
                span,
            ),
            Value::Native(native) => {
                if !kwargs.is_empty() {
                    return Err(self.type_error(
                        format!("{}() takes no keyword arguments", native.name),
                        span,
                    ));
                }
                let mut context = CallContext { interp: self, span };
                (native.func)(&mut context, args)
            }
            Value::Class(class) => self.instantiate(class, args, kwargs, span),
            other => Err(self.type_error(
                format!("'{}' object is not callable", other.type_name()),
                span,
            )),
        }
    }

    fn call_function(
        &self,
        function: &Rc<Function>,
        receiver: Option<Value>,
        args: Vec<Value>,
        mut kwargs: IndexMap<String, Value>,
        span: Span,
    ) -> EvalResult {
        let unit = &function.unit;
        let Some(_depth) = unit.enter_call() else {
            return Err(unit.raise("RecursionError", "maximum recursion depth exceeded", span));
        };
        let interp = Interpreter::new(unit.clone());
        let frame = Scope::child(&function.env);
        let name = &function.name;

        let positional: Vec<Value> = receiver.into_iter().chain(args).collect();
        if positional.len() > function.params.len() {
            return Err(unit.raise(
                "TypeError",
                format!(
                    "{}() takes {} positional arguments but {} were given",
                    name,
                    function.params.len(),
                    positional.len()
                ),
                span,
            ));
        }

        let mut positional = positional.into_iter();
        for param in &function.params {
            let value = if let Some(value) = positional.next() {
                if kwargs.contains_key(&param.name) {
                    return Err(unit.raise(
                        "TypeError",
                        format!("{}() got multiple values for argument '{}'", name, param.name),
                        span,
                    ));
                }
                value
            } else if let Some(value) = kwargs.shift_remove(&param.name) {
                value
            } else if let Some(default) = &param.default {
                interp.eval(default, &frame)?
            } else {
                return Err(unit.raise(
                    "TypeError",
                    format!("{}() missing required argument: '{}'", name, param.name),
                    span,
                ));
            };
            frame.define(param.name.clone(), value);
        }

        if let Some(unexpected) = kwargs.keys().next() {
            return Err(unit.raise(
                "TypeError",
                format!("{}() got an unexpected keyword argument '{}'", name, unexpected),
                span,
            ));
        }

        interp.eval_block(&function.body, &frame)
    }

    /// Creates an instance of `class`, running `init` when the class has one.
    pub fn instantiate(
        &self,
        class: &Rc<Class>,
        args: Vec<Value>,
        kwargs: IndexMap<String, Value>,
        span: Span,
    ) -> EvalResult {
        let instance = Rc::new(Instance::new(class.clone()));
        if class.is_exception() {
            let message = args.first().map(|v| v.to_string()).unwrap_or_default();
            let mut fields = instance.fields.borrow_mut();
            fields.insert("message".into(), Value::Str(message));
            fields.insert("args".into(), Value::list(args.clone()));
        }
        let value = Value::Instance(instance);

        match class.lookup("init") {
            Some(Value::Function(init)) => {
                self.call_function(&init, Some(value.clone()), args, kwargs, span)?;
            }
            _ if class.is_exception() && kwargs.is_empty() => {}
            _ if args.is_empty() && kwargs.is_empty() => {}
            _ => {
                return Err(self.type_error(format!("{}() takes no arguments", class.name), span))
            }
        }
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------------

    pub fn get_member(&self, target: &Value, name: &str, span: Span) -> EvalResult {
        lookup_member(target, name).ok_or_else(|| {
            let message = match target {
                Value::Module(module) => {
                    format!("module '{}' has no attribute '{}'", module.identity, name)
                }
                Value::Class(class) => {
                    format!("type object '{}' has no attribute '{}'", class.name, name)
                }
                other => format!("'{}' object has no attribute '{}'", other.type_name(), name),
            };
            self.unit.raise("AttributeError", message, span)
        })
    }

    pub fn set_member(
        &self,
        target: &Value,
        name: &str,
        value: Value,
        span: Span,
    ) -> Result<(), Raised> {
        match target {
            Value::Instance(instance) => {
                instance.fields.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class) if class.unit.is_some() => {
                class.attrs.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            Value::Class(class) => Err(self.type_error(
                format!("cannot set '{}' attribute of built-in type '{}'", name, class.name),
                span,
            )),
            Value::Module(module) => {
                module.globals.define(name, value);
                Ok(())
            }
            other => Err(self.unit.raise(
                "AttributeError",
                format!("'{}' object has no attribute '{}'", other.type_name(), name),
                span,
            )),
        }
    }
}

/// Attribute lookup without raising: instance fields, then the class chain
/// (functions found there come back bound), then module globals.
pub fn lookup_member(target: &Value, name: &str) -> Option<Value> {
    match target {
        Value::Instance(instance) => {
            if let Some(value) = instance.fields.borrow().get(name) {
                return Some(value.clone());
            }
            match instance.class.lookup(name)? {
                Value::Function(function) => Some(Value::Method(Rc::new(BoundMethod {
                    receiver: target.clone(),
                    function,
                }))),
                other => Some(other),
            }
        }
        Value::Class(class) if name == "__name__" => Some(Value::Str(class.name.clone())),
        Value::Class(class) => class.lookup(name),
        Value::Module(module) => module.globals.get_local(name),
        _ => None,
    }
}

/// True if `value` is an instance of `class` or one of its subclasses.
pub fn instance_of(value: &Value, class: &Rc<Class>) -> bool {
    let Some(instance) = value.as_instance() else {
        return false;
    };
    let mut current = Some(instance.class.clone());
    while let Some(candidate) = current {
        if Rc::ptr_eq(&candidate, class) {
            return true;
        }
        current = candidate.base.clone();
    }
    false
}
