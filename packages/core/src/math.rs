//! The computation record behind the `DoMathTask` job type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Variables;

/// Reason a job variable could not be read as an integer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VariableError {
    #[error("variable '{0}' is missing")]
    Missing(String),

    #[error("variable '{name}' is not an integer: {value}")]
    NotInteger { name: String, value: Value },
}

/// Arithmetic errors while computing a job result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("count {count} + add {add} overflows")]
    Overflow { count: i64, add: i64 },
}

/// Read an integer variable.
///
/// JSON integers are accepted, and so are floats without a fractional part
/// (FEEL numbers often arrive as `5.0`). Anything else is an error.
pub fn read_integer(variables: &Variables, name: &str) -> Result<i64, VariableError> {
    let value = variables
        .get(name)
        .ok_or_else(|| VariableError::Missing(name.to_string()))?;

    let not_integer = || VariableError::NotInteger {
        name: name.to_string(),
        value: value.clone(),
    };

    if let Some(n) = value.as_i64() {
        return Ok(n);
    }

    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
        _ => Err(not_integer()),
    }
}

/// Running total carried through a process instance.
///
/// `count` holds the total, `add` the increment applied per job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleMath {
    pub count: i64,
    pub add: i64,
}

impl SimpleMath {
    pub fn new(count: i64, add: i64) -> Self {
        Self { count, add }
    }

    /// `count + add`, or an error if it does not fit.
    pub fn result(&self) -> Result<i64, MathError> {
        self.count.checked_add(self.add).ok_or(MathError::Overflow {
            count: self.count,
            add: self.add,
        })
    }

    /// Overwrite `count` with the result. `add` is kept.
    pub fn apply(&mut self) -> Result<(), MathError> {
        self.count = self.result()?;
        Ok(())
    }

    /// Output variables: `count` and `add`.
    pub fn to_variables(&self) -> Variables {
        let mut variables = Variables::new();
        variables.insert("count".to_string(), Value::from(self.count));
        variables.insert("add".to_string(), Value::from(self.add));
        variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Variables {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn reads_integers_and_integral_floats() {
        let variables = vars(json!({"a": 7, "b": -3, "c": 5.0}));
        assert_eq!(read_integer(&variables, "a"), Ok(7));
        assert_eq!(read_integer(&variables, "b"), Ok(-3));
        assert_eq!(read_integer(&variables, "c"), Ok(5));
    }

    #[test]
    fn rejects_values_that_are_not_integers() {
        let variables = vars(json!({"s": "5", "f": 1.5, "n": null, "b": true}));
        for name in ["s", "f", "n", "b"] {
            assert!(matches!(
                read_integer(&variables, name),
                Err(VariableError::NotInteger { .. })
            ));
        }
        assert_eq!(
            read_integer(&variables, "missing"),
            Err(VariableError::Missing("missing".to_string()))
        );
    }

    #[test]
    fn apply_overwrites_count_and_keeps_add() {
        let mut math = SimpleMath::new(5, 3);
        math.apply().unwrap();
        assert_eq!(math, SimpleMath::new(8, 3));
        assert_eq!(math.to_variables(), vars(json!({"count": 8, "add": 3})));
    }

    #[test]
    fn overflow_is_reported() {
        let mut math = SimpleMath::new(i64::MAX, 1);
        assert_eq!(
            math.apply(),
            Err(MathError::Overflow { count: i64::MAX, add: 1 })
        );
        assert_eq!(math.count, i64::MAX);
    }
}
