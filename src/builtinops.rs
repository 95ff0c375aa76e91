//! Built-in operations: the special-form registry, the binary operators installed in the
//! root environment, and the array special forms.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions** (`+ - * / == < >`, and `print`) are ordinary values bound in the root
//!   environment. Their arguments are evaluated before the call.
//! - **Special forms** are keyed by word and receive their argument nodes unevaluated,
//!   together with the current environment:
//!
//! ```text
//! if(cond, then, else)        while(cond, body)         do(expr, ...)
//! def(name, expr)             fun(param, ..., body)
//! length(a)  pop(a)  shift(a) push(a, x, ...)  unshift(a, x, ...)
//! slice(a, start, end)        splice(a, start, count, x, ...)
//! ```
//!
//! The registry is fixed. A special-form name in operator position always dispatches to
//! the form; the arity listed here is checked before the handler runs.
//!
//! ## Adding New Operations
//!
//! 1. Implement the handler, `fn(&[Value]) -> Result<Value, Error>` for a function or
//!    [`SpecialFormFn`] for a special form
//! 2. Add it to [`BUILTIN_OPS`] or [`SPECIAL_FORMS`] with its identifier and arity
//! 3. Add tests covering edge cases and error conditions

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::Node;
use crate::evaluator::{
    Environment, eval_def, eval_do, eval_fun, eval_if, eval_while, eval_with_depth_tracking,
};
use crate::value::{ArrayRef, Value};

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }

    /// Check `count` arguments against this arity; `name` labels the error
    pub fn validate(self, name: &str, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(Error::arity_error(name, self, count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Special-form handler: unevaluated argument nodes, the current environment, and the
/// current evaluation depth
pub type SpecialFormFn = fn(&[Node], &Environment, usize) -> Result<Value, Error>;

/// Definition of a special form
#[derive(Debug)]
pub struct SpecialForm {
    pub id: &'static str,
    pub arity: Arity,
    pub handler: SpecialFormFn,
}

/// Definition of a builtin function bound in the root environment
#[derive(Debug)]
pub struct BuiltinOp {
    pub id: &'static str,
    pub arity: Arity,
    pub func: fn(&[Value]) -> Result<Value, Error>,
}

//
// Builtin Function Implementations
//

fn binary_operands<'a>(id: &str, args: &'a [Value]) -> Result<(&'a Value, &'a Value), Error> {
    match args {
        [left, right] => Ok((left, right)),
        _ => Err(Error::arity_error(id, Arity::Exact(2), args.len())),
    }
}

// Macro to generate numeric arithmetic functions
macro_rules! numeric_arithmetic {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let (left, right) = binary_operands($op_str, args)?;
            Ok(Value::Number(left.as_number($op_str)? $op right.as_number($op_str)?))
        }
    };
}

numeric_arithmetic!(builtin_sub, -, "-");
numeric_arithmetic!(builtin_mul, *, "*");
numeric_arithmetic!(builtin_div, /, "/");

// Macro to generate comparison functions over two numbers or two strings
macro_rules! ordering_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            match binary_operands($op_str, args)? {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a $op b)),
                (Value::String(a), Value::String(b)) => Ok(Value::Bool(a $op b)),
                (a, b) => Err(Error::TypeError(format!(
                    concat!($op_str, " requires two numbers or two strings, got {} and {}"),
                    a.type_name(),
                    b.type_name()
                ))),
            }
        }
    };
}

ordering_comparison!(builtin_lt, <, "<");
ordering_comparison!(builtin_gt, >, ">");

/// Numbers add; if either side is a string the two are concatenated
fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    match binary_operands("+", args)? {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (a @ (Value::String(_) | Value::Number(_)), b @ (Value::String(_) | Value::Number(_))) => {
            Ok(Value::String(a.to_output_string() + &b.to_output_string()))
        }
        (a, b) => Err(Error::TypeError(format!(
            "+ requires numbers or strings, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    let (left, right) = binary_operands("==", args)?;
    Ok(Value::Bool(left.same_value(right)))
}

/// Global registry of builtin functions
pub static BUILTIN_OPS: [BuiltinOp; 7] = [
    BuiltinOp {
        id: "+",
        arity: Arity::Exact(2),
        func: builtin_add,
    },
    BuiltinOp {
        id: "-",
        arity: Arity::Exact(2),
        func: builtin_sub,
    },
    BuiltinOp {
        id: "*",
        arity: Arity::Exact(2),
        func: builtin_mul,
    },
    BuiltinOp {
        id: "/",
        arity: Arity::Exact(2),
        func: builtin_div,
    },
    BuiltinOp {
        id: "==",
        arity: Arity::Exact(2),
        func: builtin_equal,
    },
    BuiltinOp {
        id: "<",
        arity: Arity::Exact(2),
        func: builtin_lt,
    },
    BuiltinOp {
        id: ">",
        arity: Arity::Exact(2),
        func: builtin_gt,
    },
];

pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    &BUILTIN_OPS
}

//
// Array Special Forms
//

fn eval_array(
    node: &Node,
    context: &str,
    env: &Environment,
    depth: usize,
) -> Result<ArrayRef, Error> {
    eval_with_depth_tracking(node, env, depth + 1)?.as_array(context)
}

fn eval_number(
    node: &Node,
    context: &str,
    env: &Environment,
    depth: usize,
) -> Result<f64, Error> {
    eval_with_depth_tracking(node, env, depth + 1)?.as_number(context)
}

/// Resolve a possibly negative index against `len`: fractions truncate, negatives count
/// from the end, and the result is clamped to `0..=len`
fn resolve_index(index: f64, len: usize) -> usize {
    let index = index.trunc();
    let len_f = len as f64;
    let resolved = if index.is_nan() {
        0.0
    } else if index < 0.0 {
        (len_f + index).max(0.0)
    } else {
        index.min(len_f)
    };
    resolved as usize
}

fn eval_length(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [array] => {
            let array = eval_array(array, "length", env, depth)?;
            let len = array.borrow().len();
            Ok(Value::Number(len as f64))
        }
        _ => Err(Error::arity_error("length", Arity::Exact(1), args.len())),
    }
}

fn eval_pop(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [array] => {
            let array = eval_array(array, "pop", env, depth)?;
            let popped = array.borrow_mut().pop();
            popped.ok_or_else(|| Error::EvalError("pop of empty array".into()))
        }
        _ => Err(Error::arity_error("pop", Arity::Exact(1), args.len())),
    }
}

fn eval_shift(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [array] => {
            let array = eval_array(array, "shift", env, depth)?;
            let mut elements = array.borrow_mut();
            if elements.is_empty() {
                return Err(Error::EvalError("shift of empty array".into()));
            }
            Ok(elements.remove(0))
        }
        _ => Err(Error::arity_error("shift", Arity::Exact(1), args.len())),
    }
}

fn eval_push(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [array, items @ ..] if !items.is_empty() => {
            let array = eval_array(array, "push", env, depth)?;
            let items = items
                .iter()
                .map(|item| eval_with_depth_tracking(item, env, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            array.borrow_mut().extend(items);
            Ok(Value::Array(array))
        }
        _ => Err(Error::arity_error("push", Arity::AtLeast(2), args.len())),
    }
}

fn eval_unshift(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [array, items @ ..] if !items.is_empty() => {
            let array = eval_array(array, "unshift", env, depth)?;
            let items = items
                .iter()
                .map(|item| eval_with_depth_tracking(item, env, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            // The first given item ends up first
            array.borrow_mut().splice(0..0, items);
            Ok(Value::Array(array))
        }
        _ => Err(Error::arity_error("unshift", Arity::AtLeast(2), args.len())),
    }
}

fn eval_slice(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [array, start, end] => {
            let array = eval_array(array, "slice", env, depth)?;
            let start = eval_number(start, "slice", env, depth)?;
            let end = eval_number(end, "slice", env, depth)?;

            let elements = array.borrow();
            let start = resolve_index(start, elements.len());
            let end = resolve_index(end, elements.len());
            let copied = elements.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();
            Ok(Value::array(copied))
        }
        _ => Err(Error::arity_error("slice", Arity::Exact(3), args.len())),
    }
}

/// Each trailing argument is spliced in on its own, against the array as the previous
/// splice left it, so several items interleave deletion and insertion.
fn eval_splice(args: &[Node], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [array, start, delete_count, items @ ..] if !items.is_empty() => {
            let array = eval_array(array, "splice", env, depth)?;
            let start = eval_number(start, "splice", env, depth)?;
            let delete_count = eval_number(delete_count, "splice", env, depth)?;

            for item in items {
                let item = eval_with_depth_tracking(item, env, depth + 1)?;
                let mut elements = array.borrow_mut();
                let from = resolve_index(start, elements.len());
                let count = if delete_count.is_nan() {
                    0
                } else {
                    delete_count.trunc().clamp(0.0, (elements.len() - from) as f64) as usize
                };
                elements.splice(from..from + count, [item]);
            }
            Ok(Value::Array(array))
        }
        _ => Err(Error::arity_error("splice", Arity::AtLeast(4), args.len())),
    }
}

/// Global registry of special forms
pub static SPECIAL_FORMS: [SpecialForm; 12] = [
    SpecialForm {
        id: "if",
        arity: Arity::Exact(3),
        handler: eval_if,
    },
    SpecialForm {
        id: "while",
        arity: Arity::Exact(2),
        handler: eval_while,
    },
    SpecialForm {
        id: "do",
        arity: Arity::AtLeast(0),
        handler: eval_do,
    },
    SpecialForm {
        id: "def",
        arity: Arity::Exact(2),
        handler: eval_def,
    },
    SpecialForm {
        id: "fun",
        arity: Arity::AtLeast(1),
        handler: eval_fun,
    },
    SpecialForm {
        id: "length",
        arity: Arity::Exact(1),
        handler: eval_length,
    },
    SpecialForm {
        id: "pop",
        arity: Arity::Exact(1),
        handler: eval_pop,
    },
    SpecialForm {
        id: "shift",
        arity: Arity::Exact(1),
        handler: eval_shift,
    },
    SpecialForm {
        id: "push",
        arity: Arity::AtLeast(2),
        handler: eval_push,
    },
    SpecialForm {
        id: "unshift",
        arity: Arity::AtLeast(2),
        handler: eval_unshift,
    },
    SpecialForm {
        id: "slice",
        arity: Arity::Exact(3),
        handler: eval_slice,
    },
    SpecialForm {
        id: "splice",
        arity: Arity::AtLeast(4),
        handler: eval_splice,
    },
];

static SPECIAL_FORM_INDEX: LazyLock<HashMap<&'static str, &'static SpecialForm>> =
    LazyLock::new(|| SPECIAL_FORMS.iter().map(|form| (form.id, form)).collect());

/// Look up a special form by its keyword
pub fn find_special_form(name: &str) -> Option<&'static SpecialForm> {
    SPECIAL_FORM_INDEX.get(name).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(0).accepts(0));
        assert!(!Arity::AtLeast(2).accepts(1));
        assert_eq!(
            Arity::AtLeast(2).validate("push", 1).unwrap_err().to_string(),
            "ArityError: push expected at least 2 arguments, got 1"
        );
    }

    #[test]
    fn test_special_form_registry() {
        for id in [
            "if", "while", "do", "def", "fun", "length", "pop", "shift", "push", "unshift",
            "slice", "splice",
        ] {
            let form = find_special_form(id).unwrap();
            assert_eq!(form.id, id);
        }
        // Operators and print are values, not special forms
        for id in ["+", "print", "true", "array"] {
            assert!(find_special_form(id).is_none(), "{id} is not a special form");
        }
    }

    #[test]
    fn test_builtin_ops_directly() {
        let n = |x: f64| Value::Number(x);
        assert_eq!(builtin_add(&[n(1.0), n(2.0)]).unwrap(), n(3.0));
        assert_eq!(
            builtin_add(&[Value::from("a"), n(1.0)]).unwrap(),
            Value::from("a1")
        );
        assert_eq!(builtin_div(&[n(7.0), n(2.0)]).unwrap(), n(3.5));
        assert_eq!(builtin_div(&[n(1.0), n(0.0)]).unwrap(), n(f64::INFINITY));
        assert_eq!(builtin_lt(&[n(1.0), n(2.0)]).unwrap(), Value::Bool(true));
        assert_eq!(
            builtin_gt(&[Value::from("b"), Value::from("a")]).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            builtin_sub(&[Value::from("a"), n(1.0)]),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(
            builtin_lt(&[n(1.0), Value::from("a")]),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(
            builtin_add(&[Value::Bool(true), n(1.0)]),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(
            builtin_equal(&[n(1.0)]),
            Err(Error::ArityError { .. })
        ));
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(1.0, 4), 1);
        assert_eq!(resolve_index(10.0, 4), 4);
        assert_eq!(resolve_index(-1.0, 4), 3);
        assert_eq!(resolve_index(-10.0, 4), 0);
        assert_eq!(resolve_index(1.9, 4), 1);
        assert_eq!(resolve_index(f64::NAN, 4), 0);
        assert_eq!(resolve_index(f64::INFINITY, 4), 4);
    }
}
