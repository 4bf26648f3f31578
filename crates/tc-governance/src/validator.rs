//! C2 — Output Validator.
//!
//! Validates an agent's structured output against a per-`agent_id` schema
//! registry, applying a narrow set of safe auto-corrections before giving up.

use std::collections::HashMap;

use serde_json::Value;

use crate::model::AgentId;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("no schema registered for agent {0}")]
    UnknownAgent(AgentId),
    #[error("required field '{0}' is missing")]
    MissingField(String),
    #[error("field '{field}' has type {actual}, expected {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("field '{field}' value '{value}' is not one of the allowed enum values {allowed:?}")]
    NotInEnum {
        field: String,
        value: String,
        allowed: Vec<String>,
    },
    #[error("field '{field}' has {actual} item(s), needs at least {min}")]
    TooFewItems {
        field: String,
        min: usize,
        actual: usize,
    },
    #[error("field '{field}' is {actual} chars, needs at least {min}")]
    TooShort {
        field: String,
        min: usize,
        actual: usize,
    },
    #[error("field '{field}' entry '{key}' is missing a 'detail' string of at least {min} chars")]
    NestedDetailTooShort {
        field: String,
        key: String,
        min: usize,
    },
}

/// The type a field must have, plus an optional closed set of string values.
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    /// A string with a minimum character length.
    StringMinLen(usize),
    Number,
    Bool,
    Object,
    Array,
    /// An array with a minimum item count.
    ArrayMinItems(usize),
    /// An object whose every value is itself an object carrying a `detail`
    /// string field of at least this many characters (e.g. one conclusion
    /// per pillar, each with a substantive write-up).
    NestedDetailMinLen(usize),
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub field_type: FieldType,
}

/// One agent's structured-output schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn field(mut self, name: &'static str, required: bool, field_type: FieldType) -> Self {
        self.fields.push(FieldSpec {
            name,
            required,
            field_type,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Valid,
    Corrected,
    Invalid,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub status: OutcomeStatus,
    pub corrections_applied: Vec<String>,
    pub errors: Vec<ValidationError>,
    pub completeness: f64,
}

/// Per-`agent_id` schema registry plus the narrow auto-correction rules.
pub struct OutputValidator {
    schemas: HashMap<AgentId, Schema>,
}

impl OutputValidator {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    pub fn register(&mut self, agent_id: AgentId, schema: Schema) {
        self.schemas.insert(agent_id, schema);
    }

    /// Pure structural check: does `output` satisfy the schema as-is.
    pub fn validate(
        &self,
        agent_id: AgentId,
        output: &Value,
    ) -> Result<(), Vec<ValidationError>> {
        let schema = self
            .schemas
            .get(&agent_id)
            .ok_or(())
            .map_err(|_| vec![ValidationError::UnknownAgent(agent_id)])?;

        let errors = check_fields(schema, output);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, and when validation fails for a correctable reason, attempt
    /// the fix in place. Coercion is restricted to three cases:
    /// - a numeric field given as a numeric string is parsed;
    /// - `"true"`/`"false"` given as a string is parsed into a bool;
    /// - a scalar is wrapped into a single-element list, only when the
    ///   schema demands a list.
    ///
    /// A string enum value is additionally matched case-insensitively
    /// against the allowed set and normalized to the canonical casing.
    /// Anything else is reported invalid rather than guessed at.
    pub fn validate_and_correct(
        &self,
        agent_id: AgentId,
        output: &mut Value,
    ) -> Result<ValidationOutcome, ValidationError> {
        let schema = self
            .schemas
            .get(&agent_id)
            .ok_or(ValidationError::UnknownAgent(agent_id))?;

        let initial_errors = check_fields(schema, output);
        if initial_errors.is_empty() {
            return Ok(ValidationOutcome {
                status: OutcomeStatus::Valid,
                corrections_applied: Vec::new(),
                errors: Vec::new(),
                completeness: completeness_of(schema, output),
            });
        }

        let obj = output
            .as_object_mut()
            .ok_or_else(|| ValidationError::WrongType {
                field: "$root".into(),
                expected: "object",
                actual: type_name(output),
            })?;

        let mut corrections = Vec::new();
        for spec in &schema.fields {
            match obj.get(spec.name).cloned() {
                Some(Value::String(s)) => match &spec.field_type {
                    FieldType::Number => {
                        if let Ok(n) = s.parse::<f64>() {
                            if let Some(num) = serde_json::Number::from_f64(n) {
                                obj.insert(spec.name.to_string(), Value::Number(num));
                                corrections.push(format!(
                                    "coerced numeric-looking string '{}' to number",
                                    spec.name
                                ));
                            }
                        }
                    }
                    FieldType::Bool => {
                        if let Some(b) = parse_bool_str(&s) {
                            obj.insert(spec.name.to_string(), Value::Bool(b));
                            corrections.push(format!(
                                "coerced string '{}' to bool for field '{}'",
                                s, spec.name
                            ));
                        }
                    }
                    FieldType::Array | FieldType::ArrayMinItems(_) => {
                        obj.insert(spec.name.to_string(), Value::Array(vec![Value::String(s)]));
                        corrections.push(format!(
                            "wrapped scalar value into single-element list for field '{}'",
                            spec.name
                        ));
                    }
                    FieldType::Enum(allowed) => {
                        if let Some(canonical) =
                            allowed.iter().find(|a| a.eq_ignore_ascii_case(&s))
                        {
                            if **canonical != s {
                                obj.insert(
                                    spec.name.to_string(),
                                    Value::String(canonical.to_string()),
                                );
                                corrections.push(format!(
                                    "normalized case of enum field '{}'",
                                    spec.name
                                ));
                            }
                        }
                    }
                    _ => {}
                },
                Some(Value::Number(_)) | Some(Value::Bool(_)) => {
                    if matches!(spec.field_type, FieldType::Array | FieldType::ArrayMinItems(_)) {
                        let scalar = obj.remove(spec.name).expect("checked present above");
                        obj.insert(spec.name.to_string(), Value::Array(vec![scalar]));
                        corrections.push(format!(
                            "wrapped scalar value into single-element list for field '{}'",
                            spec.name
                        ));
                    }
                }
                _ => {}
            }
        }

        let remaining_errors = check_fields(schema, output);
        let completeness = completeness_of(schema, output);

        if remaining_errors.is_empty() {
            Ok(ValidationOutcome {
                status: OutcomeStatus::Corrected,
                corrections_applied: corrections,
                errors: Vec::new(),
                completeness,
            })
        } else {
            Ok(ValidationOutcome {
                status: OutcomeStatus::Invalid,
                corrections_applied: corrections,
                errors: remaining_errors,
                completeness,
            })
        }
    }
}

impl Default for OutputValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_bool_str(s: &str) -> Option<bool> {
    match s {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn check_fields(schema: &Schema, output: &Value) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let obj = match output.as_object() {
        Some(o) => o,
        None => {
            errors.push(ValidationError::WrongType {
                field: "$root".into(),
                expected: "object",
                actual: type_name(output),
            });
            return errors;
        }
    };

    for spec in &schema.fields {
        match obj.get(spec.name) {
            None => {
                if spec.required {
                    errors.push(ValidationError::MissingField(spec.name.to_string()));
                }
            }
            Some(value) => {
                if let Err(e) = check_type(spec, value) {
                    errors.push(e);
                }
            }
        }
    }
    errors
}

fn check_type(spec: &FieldSpec, value: &Value) -> Result<(), ValidationError> {
    match &spec.field_type {
        FieldType::String => wrong_type_unless(value.is_string(), spec, value),
        FieldType::Number => wrong_type_unless(value.is_number(), spec, value),
        FieldType::Bool => wrong_type_unless(value.is_boolean(), spec, value),
        FieldType::Object => wrong_type_unless(value.is_object(), spec, value),
        FieldType::Array => wrong_type_unless(value.is_array(), spec, value),

        FieldType::StringMinLen(min) => match value.as_str() {
            Some(s) if s.chars().count() >= *min => Ok(()),
            Some(s) => Err(ValidationError::TooShort {
                field: spec.name.to_string(),
                min: *min,
                actual: s.chars().count(),
            }),
            None => wrong_type_unless(false, spec, value),
        },

        FieldType::ArrayMinItems(min) => match value.as_array() {
            Some(items) if items.len() >= *min => Ok(()),
            Some(items) => Err(ValidationError::TooFewItems {
                field: spec.name.to_string(),
                min: *min,
                actual: items.len(),
            }),
            None => wrong_type_unless(false, spec, value),
        },

        FieldType::NestedDetailMinLen(min) => match value.as_object() {
            Some(entries) => {
                for (key, entry) in entries {
                    let detail_len = entry
                        .as_object()
                        .and_then(|o| o.get("detail"))
                        .and_then(|d| d.as_str())
                        .map(|s| s.chars().count());
                    if detail_len.unwrap_or(0) < *min {
                        return Err(ValidationError::NestedDetailTooShort {
                            field: spec.name.to_string(),
                            key: key.clone(),
                            min: *min,
                        });
                    }
                }
                Ok(())
            }
            None => wrong_type_unless(false, spec, value),
        },

        FieldType::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Ok(()),
            Some(s) => Err(ValidationError::NotInEnum {
                field: spec.name.to_string(),
                value: s.to_string(),
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
            }),
            None => wrong_type_unless(false, spec, value),
        },
    }
}

fn wrong_type_unless(ok: bool, spec: &FieldSpec, value: &Value) -> Result<(), ValidationError> {
    if ok {
        Ok(())
    } else {
        Err(ValidationError::WrongType {
            field: spec.name.to_string(),
            expected: expected_name(&spec.field_type),
            actual: type_name(value),
        })
    }
}

fn expected_name(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::String | FieldType::StringMinLen(_) => "string",
        FieldType::Number => "number",
        FieldType::Bool => "bool",
        FieldType::Object | FieldType::NestedDetailMinLen(_) => "object",
        FieldType::Array | FieldType::ArrayMinItems(_) => "array",
        FieldType::Enum(_) => "string",
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fraction of mandatory + optional fields present, used for `_meta.completeness`.
fn completeness_of(schema: &Schema, output: &Value) -> f64 {
    if schema.fields.is_empty() {
        return 1.0;
    }
    let obj = match output.as_object() {
        Some(o) => o,
        None => return 0.0,
    };
    let present = schema
        .fields
        .iter()
        .filter(|f| obj.contains_key(f.name))
        .count();
    present as f64 / schema.fields.len() as f64
}
