use std::collections::HashSet;
use std::rc::Rc;

use crate::Error;
use crate::MAX_EVAL_DEPTH;
use crate::ast::Node;
use crate::builtinops::{Arity, find_special_form, get_builtin_ops};
use crate::print::PrintSink;
use crate::stack::ensure_sufficient_stack;
use crate::value::{Closure, Value};

mod environment;

pub use environment::Environment;

/// Evaluate a syntax tree in `env` (public API)
pub fn eval(node: &Node, env: &Environment) -> Result<Value, Error> {
    eval_with_depth_tracking(node, env, 0)
}

/// Evaluate a node with depth tracking to prevent stack overflow
pub(crate) fn eval_with_depth_tracking(
    node: &Node,
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::ResourceExhausted {
            limit: MAX_EVAL_DEPTH,
        });
    }
    ensure_sufficient_stack(|| match node {
        Node::Value(literal) => Ok(Value::from(literal)),

        // Every evaluation of a literal allocates new storage
        Node::Array(elements) => Ok(Value::array(eval_args(elements, env, depth)?)),

        Node::Word(name) => env
            .get(name)
            .ok_or_else(|| Error::UnboundVariable(name.clone())),

        Node::Apply { operator, args } => eval_apply(operator, args, env, depth),
    })
}

/// Helper function to evaluate a list of argument expressions with depth tracking
fn eval_args(args: &[Node], env: &Environment, depth: usize) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth + 1))
        .collect()
}

/// Evaluate an application.
///
/// A word naming a special form is dispatched to the form's handler with the unevaluated
/// argument nodes, whatever that word may be bound to. Anything else is evaluated to a
/// callable and applied to the evaluated arguments.
fn eval_apply(
    operator: &Node,
    args: &[Node],
    env: &Environment,
    depth: usize,
) -> Result<Value, Error> {
    if let Node::Word(name) = operator
        && let Some(form) = find_special_form(name)
    {
        form.arity.validate(form.id, args.len())?;
        tracing::trace!(form = form.id, args = args.len(), "special form");
        return (form.handler)(args, env, depth);
    }

    let callee = eval_with_depth_tracking(operator, env, depth + 1)?;
    if !callee.is_callable() {
        return Err(Error::NotCallable(callee.to_string()));
    }
    let args = eval_args(args, env, depth)?;
    call_with_depth(&callee, args, depth + 1)
}

/// Call a function value with already-evaluated arguments.
///
/// Hosts can use this to invoke a closure obtained from a previous run.
pub fn call(callee: &Value, args: Vec<Value>) -> Result<Value, Error> {
    call_with_depth(callee, args, 0)
}

fn call_with_depth(callee: &Value, args: Vec<Value>, depth: usize) -> Result<Value, Error> {
    match callee {
        Value::BuiltinFunction(builtin) => {
            builtin.arity.validate(&builtin.id, args.len())?;
            (builtin.func)(args)
        }
        Value::Function(closure) => call_closure(callee, closure, args, depth),
        other => Err(Error::NotCallable(other.to_string())),
    }
}

fn call_closure(
    callee: &Value,
    closure: &Closure,
    args: Vec<Value>,
    depth: usize,
) -> Result<Value, Error> {
    if closure.params.len() != args.len() {
        return Err(Error::arity_error(
            callee.to_string(),
            Arity::Exact(closure.params.len()),
            args.len(),
        ));
    }
    tracing::trace!(params = ?closure.params, "calling closure");

    // Fresh scope per call, parented to the defining environment
    let scope = Environment::with_parent(&closure.env);
    for (param, arg) in closure.params.iter().zip(args) {
        scope.define(param.as_str(), arg);
    }
    eval_with_depth_tracking(&closure.body, &scope, depth + 1)
}

/// Evaluate if special form
pub(crate) fn eval_if(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [condition, then_expr, else_expr] => {
            if eval_with_depth_tracking(condition, env, depth + 1)?.is_false() {
                eval_with_depth_tracking(else_expr, env, depth + 1)
            } else {
                eval_with_depth_tracking(then_expr, env, depth + 1)
            }
        }
        _ => Err(Error::arity_error("if", Arity::Exact(3), args.len())),
    }
}

/// Evaluate while special form. The loop itself always produces `false`.
pub(crate) fn eval_while(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [condition, body] => {
            while !eval_with_depth_tracking(condition, env, depth + 1)?.is_false() {
                eval_with_depth_tracking(body, env, depth + 1)?;
            }
            Ok(Value::Bool(false))
        }
        _ => Err(Error::arity_error("while", Arity::Exact(2), args.len())),
    }
}

/// Evaluate do special form
pub(crate) fn eval_do(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut result = Value::Bool(false);
    for arg in args {
        result = eval_with_depth_tracking(arg, env, depth + 1)?;
    }
    Ok(result)
}

/// Evaluate def special form: binds in the current scope only, returns the bound value
pub(crate) fn eval_def(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Node::Word(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, depth + 1)?;
            tracing::trace!(name = %name, value = %value, "define");
            env.define(name.as_str(), value.clone());
            Ok(value)
        }
        [target, _] => Err(Error::malformed(
            "def",
            format!("first argument must be a word, got {target}"),
        )),
        _ => Err(Error::arity_error("def", Arity::Exact(2), args.len())),
    }
}

/// Evaluate fun special form
pub(crate) fn eval_fun(args: &[Node], env: &Environment, _depth: usize) -> Result<Value, Error> {
    let Some((body, param_nodes)) = args.split_last() else {
        return Err(Error::arity_error("fun", Arity::AtLeast(1), 0));
    };

    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(param_nodes.len());
    for param in param_nodes {
        let Some(name) = param.as_word() else {
            return Err(Error::malformed(
                "fun",
                format!("parameter names must be words, got {param}"),
            ));
        };
        if !seen.insert(name) {
            return Err(Error::malformed(
                "fun",
                format!("duplicate parameter name: {name}"),
            ));
        }
        params.push(name.to_owned());
    }

    Ok(Value::Function(Rc::new(Closure {
        params,
        body: body.clone(),
        env: env.clone(),
    })))
}

/// Create the root environment: `true`, `false`, the operators and `print`
pub fn create_global_env(sink: Rc<dyn PrintSink>) -> Environment {
    let env = Environment::new();

    env.define("true", Value::Bool(true));
    env.define("false", Value::Bool(false));

    for builtin_op in get_builtin_ops() {
        let func = builtin_op.func;
        env.register_builtin_function(builtin_op.id, builtin_op.arity, move |args| func(&args));
    }

    env.register_builtin_function("print", Arity::Exact(1), move |args| {
        let [value] = <[Value; 1]>::try_from(args)
            .map_err(|args| Error::arity_error("print", Arity::Exact(1), args.len()))?;
        sink.print(&value)
            .map_err(|err| Error::EvalError(format!("print failed: {err}")))?;
        Ok(value)
    });

    env
}
