use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::builtinops::Arity;
use crate::value::Value;

/// Environment for variable bindings: a map of own bindings plus an optional parent.
///
/// Lookup walks the parent chain; [`Environment::define`] always writes an own binding.
/// Re-defining a name that an ancestor binds therefore shadows it locally and leaves the
/// outer binding untouched. There is deliberately no operation that assigns through the
/// chain.
///
/// Cloning an `Environment` clones a handle: closures and callers share one scope.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

#[derive(Default)]
struct Scope {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    /// A fresh, empty scope whose lookups fall back to `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    pub fn parent(&self) -> Option<Environment> {
        self.0.borrow().parent.clone()
    }

    /// Create or overwrite an own binding of this scope
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().bindings.insert(name.into(), value);
    }

    /// Value bound to `name` in the nearest scope of the chain that has an own binding
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = Rc::clone(&self.0);
        loop {
            let parent = {
                let current = scope.borrow();
                if let Some(value) = current.bindings.get(name) {
                    return Some(value.clone());
                }
                current.parent.as_ref().map(|parent| Rc::clone(&parent.0))
            };
            scope = parent?;
        }
    }

    /// Whether this scope itself (not an ancestor) binds `name`
    pub fn has_own(&self, name: &str) -> bool {
        self.0.borrow().bindings.contains_key(name)
    }

    /// Whether two handles refer to the same scope
    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Register a custom builtin function in this scope.
    ///
    /// # Example
    /// ```
    /// use egglang::builtinops::Arity;
    /// use egglang::evaluator::{Environment, eval};
    /// use egglang::value::Value;
    ///
    /// let env = Environment::new();
    /// env.register_builtin_function("negate", Arity::Exact(1), |args| {
    ///     Ok(Value::Number(-args[0].as_number("negate")?))
    /// });
    /// let ast = egglang::parse("negate(4)").unwrap();
    /// assert_eq!(eval(&ast, &env).unwrap(), Value::Number(-4.0));
    /// ```
    pub fn register_builtin_function<F>(&self, name: &str, arity: Arity, func: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, Error> + 'static,
    {
        self.define(name, Value::builtin(name, arity, func));
    }

    /// Get all bindings visible from this environment.
    /// Returns a Vec of (name, value) pairs sorted by name; inner bindings win.
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        if let Some(parent) = self.parent() {
            bindings.extend(parent.get_all_bindings());
        }
        for (name, value) in &self.0.borrow().bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

// Closures hold their environment and environments hold closures, so Debug shows names
// only and never recurses into values.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scope = self.0.borrow();
        let mut names: Vec<&String> = scope.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &scope.parent.is_some())
            .finish()
    }
}
