//! Program entry points.
//!
//! An [`Interpreter`] owns a root environment, built once, holding `true`, `false`, the
//! operators, `print` and any host-registered primitives. Every [`Interpreter::run`] parses
//! the program and evaluates it in a fresh child of that root, so top-level `def`s of one
//! run shadow root bindings without changing them and are gone for the next run.

use std::rc::Rc;

use crate::Error;
use crate::ast::Node;
use crate::builtinops::Arity;
use crate::evaluator::{Environment, create_global_env, eval};
use crate::parser::{ParseConfig, parse_with_config};
use crate::print::{PrintSink, StdoutSink};
use crate::value::Value;

/// Parses and runs programs against a shared root environment.
///
/// A closure keeps the scope it was defined in alive, and a top-level `def` of a function
/// stores that closure in the same scope. The resulting reference cycle is never freed, so
/// each run that defines a named function keeps its whole program scope (arrays included)
/// in memory for as long as the process lives. Hosts that run many programs on one
/// interpreter should expect memory to grow with the number of such runs.
pub struct Interpreter {
    root: Environment,
    parse_config: ParseConfig,
}

impl Interpreter {
    /// Interpreter whose `print` writes to standard output
    pub fn new() -> Self {
        Self::with_sink(Rc::new(StdoutSink))
    }

    /// Interpreter whose `print` forwards to `sink`
    pub fn with_sink(sink: Rc<dyn PrintSink>) -> Self {
        Interpreter {
            root: create_global_env(sink),
            parse_config: ParseConfig::default(),
        }
    }

    pub fn with_parse_config(mut self, config: ParseConfig) -> Self {
        self.parse_config = config;
        self
    }

    /// Install a host primitive in the root environment, visible to every later run.
    ///
    /// # Example
    /// ```
    /// use egglang::Interpreter;
    /// use egglang::builtinops::Arity;
    /// use egglang::value::Value;
    ///
    /// let mut interpreter = Interpreter::new();
    /// interpreter.register_builtin_function("max", Arity::Exact(2), |args| {
    ///     let a = args[0].as_number("max")?;
    ///     let b = args[1].as_number("max")?;
    ///     Ok(Value::Number(a.max(b)))
    /// });
    /// assert_eq!(interpreter.run("max(3, 8)").unwrap(), Value::Number(8.0));
    /// ```
    pub fn register_builtin_function<F>(&mut self, name: &str, arity: Arity, func: F)
    where
        F: Fn(Vec<Value>) -> Result<Value, Error> + 'static,
    {
        self.root.register_builtin_function(name, arity, func);
    }

    pub fn root(&self) -> &Environment {
        &self.root
    }

    pub fn parse(&self, program: &str) -> Result<Node, Error> {
        parse_with_config(program, self.parse_config)
    }

    /// Parse and evaluate `program` in a fresh child of the root environment
    pub fn run(&self, program: &str) -> Result<Value, Error> {
        let node = self.parse(program)?;
        self.evaluate(&node)
    }

    /// Evaluate an already parsed program in a fresh child of the root environment
    pub fn evaluate(&self, node: &Node) -> Result<Value, Error> {
        tracing::debug!(program = %node, "run started");
        let scope = Environment::with_parent(&self.root);
        let result = eval(node, &scope);
        match &result {
            Ok(value) => tracing::debug!(result = %value, "run finished"),
            Err(err) => tracing::debug!(error = %err, "run failed"),
        }
        result
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a program with a default interpreter (output to stdout)
pub fn run(program: &str) -> Result<Value, Error> {
    Interpreter::new().run(program)
}
