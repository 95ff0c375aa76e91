//! The output collaborator behind the `print` primitive.
//!
//! `print` hands its single evaluated argument to a [`PrintSink`] and then returns that
//! same value. Sinks decide where output goes; the interpreter never writes anywhere else.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::value::Value;

/// Receives every value passed to `print`
pub trait PrintSink {
    fn print(&self, value: &Value) -> io::Result<()>;
}

/// Writes each value on its own line to standard output. Strings appear without quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl PrintSink for StdoutSink {
    fn print(&self, value: &Value) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", value.to_output_string())
    }
}

/// Emits each value as an `info` event on target `egglang::print`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl PrintSink for TracingSink {
    fn print(&self, value: &Value) -> io::Result<()> {
        tracing::info!(target: "egglang::print", value = %value.to_output_string(), "print");
        Ok(())
    }
}

/// Keeps printed lines in memory. Clones share the same buffer, so a host can hand one
/// clone to the interpreter and read the output through another.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink(Rc<RefCell<Vec<String>>>);

impl CollectingSink {
    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl PrintSink for CollectingSink {
    fn print(&self, value: &Value) -> io::Result<()> {
        self.0.borrow_mut().push(value.to_output_string());
        Ok(())
    }
}

impl<F> PrintSink for F
where
    F: Fn(&Value) -> io::Result<()>,
{
    fn print(&self, value: &Value) -> io::Result<()> {
        self(value)
    }
}
