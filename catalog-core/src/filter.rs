//! Filter (§4.8): applies a user-supplied projection expression to a
//! decoded JSON document, producing a reshaped document. The expression
//! language itself is explicitly non-normative in the spec ("treat it as a
//! pure function `(value, expression) -> value`"); this is a small, self
//! contained dotted-path projector covering the cases the spec's own test
//! scenarios exercise (S2: `results[].{id,url}`).
//!
//! Grammar:
//!   expr       := segment ("." segment)*
//!   segment    := field | field "[]" | "{" field ("," field)* "}"
//!
//! `field` navigates into an object key. `[]` maps the remaining expression
//! over every element of the current array. `{a,b,c}` projects the current
//! object down to the named fields, dropping everything else.

use serde_json::{Map, Value};

use crate::error::FilterError;

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Field(String),
    Array,
    Project(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Filter {
    expression: String,
    ops: Vec<Op>,
}

impl Filter {
    pub fn compile(expression: &str) -> Result<Self, FilterError> {
        let ops = parse(expression)?;
        Ok(Filter {
            expression: expression.to_string(),
            ops,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn apply(&self, value: &Value) -> Result<Value, FilterError> {
        apply_ops(value, &self.ops)
    }
}

/// Apply an expression string directly, without retaining the compiled form.
pub fn apply_filter(expression: &str, value: &Value) -> Result<Value, FilterError> {
    Filter::compile(expression)?.apply(value)
}

fn parse(expr: &str) -> Result<Vec<Op>, FilterError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut ops = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => i += 1,
            '[' => {
                if chars.get(i + 1) == Some(&']') {
                    ops.push(Op::Array);
                    i += 2;
                } else {
                    return Err(FilterError::InvalidExpression(expr.to_string()));
                }
            }
            '{' => {
                let close = chars[i..]
                    .iter()
                    .position(|c| *c == '}')
                    .map(|p| p + i)
                    .ok_or_else(|| FilterError::InvalidExpression(expr.to_string()))?;
                let inner: String = chars[i + 1..close].iter().collect();
                let fields: Vec<String> = inner
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                ops.push(Op::Project(fields));
                i = close + 1;
            }
            _ => {
                let start = i;
                while i < chars.len() && !['.', '[', '{'].contains(&chars[i]) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                if ident.is_empty() {
                    return Err(FilterError::InvalidExpression(expr.to_string()));
                }
                ops.push(Op::Field(ident));
            }
        }
    }
    Ok(ops)
}

fn apply_ops(value: &Value, ops: &[Op]) -> Result<Value, FilterError> {
    let Some((head, rest)) = ops.split_first() else {
        return Ok(value.clone());
    };

    match head {
        Op::Field(name) => {
            let next = value
                .get(name)
                .ok_or_else(|| FilterError::ShapeMismatch(format!("missing field {name}")))?;
            apply_ops(next, rest)
        }
        Op::Array => {
            let arr = value
                .as_array()
                .ok_or_else(|| FilterError::ShapeMismatch("expected array".to_string()))?;
            let mapped = arr
                .iter()
                .map(|v| apply_ops(v, rest))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(mapped))
        }
        Op::Project(fields) => {
            let obj = value
                .as_object()
                .ok_or_else(|| FilterError::ShapeMismatch("expected object".to_string()))?;
            let mut out = Map::new();
            for field in fields {
                if let Some(v) = obj.get(field) {
                    out.insert(field.clone(), v.clone());
                }
            }
            apply_ops(&Value::Object(out), rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn projects_array_of_objects() {
        let doc = json!({
            "count": 2,
            "next": null,
            "results": [
                {"id": 1, "url": "/a", "extra": "drop me"},
                {"id": 2, "url": "/b", "extra": "drop me too"},
            ],
        });

        let result = apply_filter("results[].{id,url}", &doc).unwrap();
        assert_eq!(
            result,
            json!([
                {"id": 1, "url": "/a"},
                {"id": 2, "url": "/b"},
            ])
        );
    }

    #[test]
    fn missing_field_is_shape_mismatch() {
        let doc = json!({"other": 1});
        let err = apply_filter("results[].{id}", &doc).unwrap_err();
        assert!(matches!(err, FilterError::ShapeMismatch(_)));
    }

    #[test]
    fn identity_expression_passes_through() {
        let doc = json!({"a": 1});
        assert_eq!(apply_filter("", &doc).unwrap(), doc);
    }

    #[test]
    fn malformed_array_marker_is_invalid_expression() {
        let err = parse("results[x]").unwrap_err();
        assert!(matches!(err, FilterError::InvalidExpression(_)));
    }
}
