//! Runtime values produced by evaluation.
//!
//! Arrays are shared mutable buffers ([`ArrayRef`]): cloning a [`Value::Array`] clones
//! the handle, not the storage, so every binding and argument holding the same array
//! observes in-place mutation through any of them. Callables are either closures built
//! by `fun` or builtin functions installed by the host.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Literal, Node};
use crate::builtinops::Arity;
use crate::evaluator::Environment;
use crate::stack::ensure_sufficient_stack;

/// Shared, mutable array storage
pub type ArrayRef = Rc<ArrayStorage>;

/// Elements of one array.
///
/// Derefs to the `RefCell` holding them. Dropping the storage releases nested arrays it
/// owns exclusively one level at a time, so arbitrarily long chains built by `def(a, [a])`
/// in a loop are freed without recursing on the host stack.
#[derive(Debug)]
pub struct ArrayStorage(RefCell<Vec<Value>>);

impl ArrayStorage {
    pub fn new(elements: Vec<Value>) -> Self {
        ArrayStorage(RefCell::new(elements))
    }
}

impl Deref for ArrayStorage {
    type Target = RefCell<Vec<Value>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Drop for ArrayStorage {
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.0.get_mut());
        while let Some(value) = pending.pop() {
            // Shared children are only decremented; other holders keep them alive
            if let Value::Array(array) = value
                && let Ok(mut storage) = Rc::try_unwrap(array)
            {
                pending.append(storage.0.get_mut());
            }
        }
    }
}

type ArrayPtr = *const ArrayStorage;

/// Canonical erased builtin function type used by the evaluator.
///
/// Builtins receive ownership of their already-evaluated arguments. Arity has been
/// checked against [`BuiltinFunction::arity`] before the call.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error>;

/// A function value built by `fun`: parameters, body and the defining environment
pub struct Closure {
    pub params: Vec<String>,
    pub body: Node,
    pub env: Environment,
}

/// A primitive implemented in Rust
pub struct BuiltinFunction {
    pub id: String,
    pub arity: Arity,
    pub func: Box<OperationFn>,
}

/// Core runtime value type
#[derive(Clone)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    Array(ArrayRef),
    Function(Rc<Closure>),
    BuiltinFunction(Rc<BuiltinFunction>),
}

impl Value {
    /// Wrap elements in freshly allocated array storage
    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(ArrayStorage::new(elements)))
    }

    /// Build a builtin function value
    pub fn builtin<F>(id: &str, arity: Arity, func: F) -> Value
    where
        F: Fn(Vec<Value>) -> Result<Value, Error> + 'static,
    {
        Value::BuiltinFunction(Rc::new(BuiltinFunction {
            id: id.to_owned(),
            arity,
            func: Box::new(func),
        }))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Array(_) => "array",
            Value::Function(_) | Value::BuiltinFunction(_) => "function",
        }
    }

    /// Only the boolean `false` is falsy
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::BuiltinFunction(_))
    }

    /// The shared array handle, or a TypeError naming `context`
    pub fn as_array(&self, context: &str) -> Result<ArrayRef, Error> {
        match self {
            Value::Array(array) => Ok(Rc::clone(array)),
            other => Err(Error::TypeError(format!(
                "{context} requires an array, got {}",
                other.type_name()
            ))),
        }
    }

    /// The numeric payload, or a TypeError naming `context`
    pub fn as_number(&self, context: &str) -> Result<f64, Error> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(Error::TypeError(format!(
                "{context} requires numbers, got {}",
                other.type_name()
            ))),
        }
    }

    /// Generic equality used by `==`: primitives compare by value, arrays and
    /// functions by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::BuiltinFunction(a), Value::BuiltinFunction(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Render for output: strings appear without quotes, everything else as `Display`
    pub fn to_output_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn fmt_guarded(
        &self,
        f: &mut fmt::Formatter<'_>,
        open: &mut HashSet<ArrayPtr>,
    ) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Number(n) => fmt_number(*n, f),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(array) => {
                // An array may contain itself through push; print the back-reference
                let ptr = Rc::as_ptr(array);
                if !open.insert(ptr) {
                    return write!(f, "[...]");
                }
                write!(f, "[")?;
                for (i, element) in array.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    ensure_sufficient_stack(|| element.fmt_guarded(f, open))?;
                }
                open.remove(&ptr);
                write!(f, "]")
            }
            Value::Function(closure) => write!(f, "fun({})", closure.params.join(", ")),
            Value::BuiltinFunction(builtin) => write!(f, "builtin({})", builtin.id),
        }
    }

    /// Element-wise comparison. A pair of arrays already under comparison is assumed
    /// equal, so two distinct self-containing arrays of the same shape compare equal.
    fn structural_eq(
        &self,
        other: &Value,
        visited: &mut HashSet<(ArrayPtr, ArrayPtr)>,
    ) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                if Rc::ptr_eq(a, b) || !visited.insert((Rc::as_ptr(a), Rc::as_ptr(b))) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| {
                        ensure_sufficient_stack(|| x.structural_eq(y, visited))
                    })
            }
            _ => self.same_value(other),
        }
    }
}

/// Numbers print the way the language's host numerics do: `Infinity`, `-Infinity` and
/// `NaN` by name, exponent notation outside `[1e-6, 1e21)`, and no negative zero.
fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        return write!(f, "NaN");
    }
    if n.is_infinite() {
        return write!(f, "{}", if n > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if n == 0.0 {
        return write!(f, "0");
    }
    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let text = format!("{n:e}");
        return match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                write!(f, "{mantissa}e+{exponent}")
            }
            _ => write!(f, "{text}"),
        };
    }
    write!(f, "{n}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_guarded(f, &mut HashSet::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Array(_) => write!(f, "Array({self})"),
            Value::Function(closure) => {
                write!(f, "Function(params={:?}, body={})", closure.params, closure.body)
            }
            Value::BuiltinFunction(builtin) => write!(f, "BuiltinFunction({})", builtin.id),
        }
    }
}

/// Structural equality, for tests and host code. Arrays compare element-wise;
/// callables compare by identity. The language's `==` uses [`Value::same_value`].
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other, &mut HashSet::new())
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Number(n) => Value::Number(*n),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(f64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::array(arr.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::from(12).to_string(), "12");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::from("ab").to_string(), "\"ab\"");
        assert_eq!(Value::from("ab").to_output_string(), "ab");
        assert_eq!(Value::from(false).to_string(), "false");
        assert_eq!(
            Value::from(vec![Value::from(1), Value::from("x"), Value::from([2, 3])]).to_string(),
            "[1, \"x\", [2, 3]]"
        );
        let plus = Value::builtin("+", Arity::Exact(2), |_| Ok(Value::Bool(true)));
        assert_eq!(plus.to_string(), "builtin(+)");
    }

    #[test]
    fn test_number_display() {
        let test_cases = vec![
            (f64::INFINITY, "Infinity"),
            (f64::NEG_INFINITY, "-Infinity"),
            (f64::NAN, "NaN"),
            (-0.0, "0"),
            (0.1 + 0.2, "0.30000000000000004"),
            (1e20, "100000000000000000000"),
            (1e21, "1e+21"),
            (-2.5e30, "-2.5e+30"),
            (1e-7, "1e-7"),
            (0.000_001, "0.000001"),
        ];
        for (i, (n, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(Value::Number(n).to_string(), expected, "test #{}", i + 1);
            assert_eq!(Value::Number(n).to_output_string(), expected, "test #{}", i + 1);
        }
    }

    fn nested(depth: usize) -> Value {
        let mut value = Value::array(vec![]);
        for _ in 0..depth {
            value = Value::array(vec![value]);
        }
        value
    }

    #[test]
    fn test_deeply_nested_array_display_and_drop() {
        let depth = 200_000;
        let value = nested(depth);
        let text = value.to_string();
        assert_eq!(text.len(), 2 * (depth + 1));
        assert!(text.starts_with("[[[") && text.ends_with("]]]"));
        assert_eq!(value, nested(depth));
        drop(value);

        // Storage still shared elsewhere survives the drop of its parent
        let inner = nested(3);
        let outer = Value::array(vec![inner.clone()]);
        drop(outer);
        assert_eq!(inner.to_string(), "[[[[]]]]");
    }

    #[test]
    fn test_self_containing_array_displays() {
        let value = Value::from([1]);
        let array = value.as_array("test").unwrap();
        array.borrow_mut().push(value.clone());
        assert_eq!(value.to_string(), "[1, [...]]");
    }

    #[test]
    fn test_clone_shares_array_storage() {
        let a = Value::from([1, 2]);
        let b = a.clone();
        a.as_array("test").unwrap().borrow_mut().push(Value::from(3));
        assert_eq!(b, Value::from([1, 2, 3]));
        assert!(a.same_value(&b));
    }

    #[test]
    fn test_equality_semantics() {
        // Structural for PartialEq, identity for the language's ==
        let a = Value::from([1]);
        let b = Value::from([1]);
        assert_eq!(a, b);
        assert!(!a.same_value(&b));

        assert!(Value::from(1).same_value(&Value::from(1)));
        assert!(!Value::from(1).same_value(&Value::from("1")));
        assert!(Value::from("s").same_value(&Value::from("s")));
    }

    #[test]
    fn test_self_containing_arrays_compare() {
        let self_containing = |first: i32| {
            let value = Value::from([first]);
            value.as_array("test").unwrap().borrow_mut().push(value.clone());
            value
        };
        let (a, b, c) = (self_containing(1), self_containing(1), self_containing(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.same_value(&b));
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::from(false).is_false());
        for value in [Value::from(true), Value::from(0), Value::from(""), Value::from([0])] {
            assert!(!value.is_false(), "{value} should be truthy");
        }
    }

    #[test]
    fn test_accessor_type_errors() {
        let err = Value::from(5).as_array("length").unwrap_err();
        assert_eq!(
            err,
            Error::TypeError("length requires an array, got number".into())
        );
        let err = Value::from("x").as_number("-").unwrap_err();
        assert_eq!(err, Error::TypeError("- requires numbers, got string".into()));
    }
}
