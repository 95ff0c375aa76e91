//! Conversion between runtime values and JSON (feature `json`).
//!
//! Strings, numbers, booleans and arrays map onto their JSON counterparts. Functions,
//! non-finite numbers and JSON `null`/objects have no counterpart and are rejected with a
//! type error. Integral numbers within the exactly representable range serialize as JSON
//! integers, so `12` round-trips as `12` rather than `12.0`.

use std::cell::RefCell;
use std::io::{self, Write};

use crate::value::Value;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Largest integer an f64 holds exactly (2^53)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Convert a runtime value to `serde_json::Value`
pub fn value_to_json(value: &Value) -> Result<serde_json::Value, Error> {
    value_to_json_with_depth(value, 0)
}

fn value_to_json_with_depth(value: &Value, depth: usize) -> Result<serde_json::Value, Error> {
    // Also catches arrays that contain themselves
    if depth >= MAX_PARSE_DEPTH {
        return Err(Error::TypeError(format!(
            "array nesting too deep for JSON (max depth: {MAX_PARSE_DEPTH})"
        )));
    }
    match value {
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => number_to_json(*n),
        Value::Array(array) => {
            let converted: Result<Vec<serde_json::Value>, Error> = array
                .borrow()
                .iter()
                .map(|element| value_to_json_with_depth(element, depth + 1))
                .collect();
            Ok(serde_json::Value::Array(converted?))
        }
        Value::Function(_) | Value::BuiltinFunction(_) => Err(Error::TypeError(format!(
            "cannot convert {value} to JSON"
        ))),
    }
}

fn number_to_json(n: f64) -> Result<serde_json::Value, Error> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Ok(serde_json::Value::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .ok_or_else(|| Error::TypeError(format!("cannot convert {n} to JSON")))
}

/// Convert a `serde_json::Value` to a runtime value. Arrays get fresh storage.
pub fn json_to_value(json: &serde_json::Value) -> Result<Value, Error> {
    match json {
        serde_json::Value::Null => Err(Error::TypeError("JSON null has no equivalent".into())),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| Error::TypeError(format!("unsupported JSON number: {n}"))),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Array(elements) => {
            let converted: Result<Vec<Value>, Error> =
                elements.iter().map(json_to_value).collect();
            Ok(Value::array(converted?))
        }
        serde_json::Value::Object(_) => {
            Err(Error::TypeError("JSON objects have no equivalent".into()))
        }
    }
}

/// Parse JSON text into a runtime value
pub fn parse_json(input: &str) -> Result<Value, Error> {
    let json: serde_json::Value = serde_json::from_str(input).map_err(|e| {
        ParseError::new(
            ParseErrorKind::InvalidSyntax,
            format!("Invalid JSON: {e}"),
            None,
            None,
        )
    })?;
    json_to_value(&json)
}

/// Serialize a runtime value as compact JSON text
pub fn to_json_string(value: &Value) -> Result<String, Error> {
    let json = value_to_json(value)?;
    serde_json::to_string(&json)
        .map_err(|e| Error::EvalError(format!("Failed to serialize JSON: {e}")))
}

/// Print collaborator writing each value as one line of JSON
pub struct JsonSink<W: Write> {
    writer: RefCell<W>,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        JsonSink {
            writer: RefCell::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> crate::print::PrintSink for JsonSink<W> {
    fn print(&self, value: &Value) -> io::Result<()> {
        let line = to_json_string(value).map_err(io::Error::other)?;
        writeln!(self.writer.borrow_mut(), "{line}")
    }
}
