//! Typed field reads over a JSON object.
//!
//! Every accessor records a [`DecodeFieldError`] and returns a default when the
//! field is missing or mistyped, so one bad field never hides the rest. The
//! caller decides what the collected errors mean via [`finish_errors`].

use crate::config::types::{DecodeFieldError, DecodePolicy, FieldProblem, LaunchError, Result};
use serde_json::{Map, Value};

pub(crate) struct ObjectReader<'a> {
    scope: &'static str,
    object: Option<&'a Map<String, Value>>,
    errors: Vec<LaunchError>,
}

impl<'a> ObjectReader<'a> {
    /// Reader over `value`; a non-object value makes every field missing.
    pub(crate) fn new(scope: &'static str, value: Option<&'a Value>) -> Self {
        Self {
            scope,
            object: value.and_then(Value::as_object),
            errors: Vec::new(),
        }
    }

    fn lookup(&mut self, field: &'static str) -> Option<&'a Value> {
        let found = self.object.and_then(|object| object.get(field));
        if found.is_none() {
            self.fail(field, FieldProblem::Missing);
        }
        found
    }

    pub(crate) fn fail(&mut self, field: &'static str, problem: FieldProblem) {
        self.errors.push(
            DecodeFieldError {
                scope: self.scope,
                field,
                problem,
            }
            .into(),
        );
    }

    /// Record an error raised by a sub-decoder.
    pub(crate) fn push(&mut self, error: LaunchError) {
        self.errors.push(error);
    }

    pub(crate) fn string(&mut self, field: &'static str) -> String {
        match self.lookup(field) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.fail(field, FieldProblem::Mistyped { expected: "string" });
                String::new()
            }
            None => String::new(),
        }
    }

    pub(crate) fn int(&mut self, field: &'static str) -> i64 {
        match self.lookup(field) {
            Some(value) => match value.as_i64().or_else(|| integral_f64(value)) {
                Some(n) => n,
                None => {
                    self.fail(field, FieldProblem::Mistyped { expected: "integer" });
                    0
                }
            },
            None => 0,
        }
    }

    /// Non-negative integer read; accepts integral floating-point numbers
    /// since the sender may hand over any generic number.
    pub(crate) fn uint(&mut self, field: &'static str) -> u64 {
        match self.lookup(field) {
            Some(value) => match value.as_u64().or_else(|| integral_f64(value).and_then(|n| u64::try_from(n).ok())) {
                Some(n) => n,
                None => {
                    self.fail(field, FieldProblem::Mistyped { expected: "unsigned integer" });
                    0
                }
            },
            None => 0,
        }
    }

    pub(crate) fn object(&mut self, field: &'static str) -> Option<&'a Value> {
        match self.lookup(field) {
            Some(value) if value.is_object() => Some(value),
            Some(_) => {
                self.fail(field, FieldProblem::Mistyped { expected: "object" });
                None
            }
            None => None,
        }
    }

    pub(crate) fn array(&mut self, field: &'static str) -> &'a [Value] {
        match self.lookup(field) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                self.fail(field, FieldProblem::Mistyped { expected: "array" });
                &[]
            }
            None => &[],
        }
    }

    /// Array of strings; a non-string element marks the whole field mistyped.
    pub(crate) fn string_array(&mut self, field: &'static str) -> Vec<String> {
        let items = self.array(field);
        let strings: Option<Vec<String>> = items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect();
        strings.unwrap_or_else(|| {
            self.fail(field, FieldProblem::Mistyped { expected: "array of strings" });
            Vec::new()
        })
    }

    /// Object whose values are all strings.
    pub(crate) fn string_map(&mut self, field: &'static str) -> Vec<(String, String)> {
        let Some(object) = self.object(field).and_then(Value::as_object) else {
            return Vec::new();
        };
        let pairs: Option<Vec<(String, String)>> = object
            .iter()
            .map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect();
        pairs.unwrap_or_else(|| {
            self.fail(field, FieldProblem::Mistyped { expected: "object of strings" });
            Vec::new()
        })
    }

    pub(crate) fn into_errors(self) -> Vec<LaunchError> {
        self.errors
    }
}

/// Apply the decode policy to collected field errors.
///
/// Best-effort logs every error and succeeds; strict returns the first.
pub(crate) fn finish_errors(errors: Vec<LaunchError>, policy: DecodePolicy) -> Result<()> {
    match policy {
        DecodePolicy::Strict => match errors.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        },
        DecodePolicy::BestEffort => {
            for error in &errors {
                log::error!("{}", error);
            }
            Ok(())
        }
    }
}

fn integral_f64(value: &Value) -> Option<i64> {
    let n = value.as_f64()?;
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Some(n as i64)
    } else {
        None
    }
}
