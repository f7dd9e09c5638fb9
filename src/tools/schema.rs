//! Parameter schemas and typed tool arguments.
//!
//! Tool parameters are declared as an ordered list of [`ParamSpec`]s. Model
//! output arrives as an untyped JSON object; [`ParameterSchema::validate`]
//! checks it against the declaration and produces [`ToolArguments`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

/// Placeholder written in place of secret values.
pub const REDACTED: &str = "[REDACTED]";

/// Primitive type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamType {
    /// JSON-schema type name (`string`, `number`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
    /// Credential-like parameter that the agent loop may fill in from caller
    /// context instead of asking the model to reproduce it.
    pub secret: bool,
}

impl ParamSpec {
    /// Required parameter.
    pub fn required(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            secret: false,
        }
    }

    /// Optional parameter.
    pub fn optional(name: &str, kind: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }

    /// Mark this parameter as a secret.
    #[must_use]
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }
}

/// Ordered parameter declaration for one tool.
#[derive(Debug, Clone, Default)]
pub struct ParameterSchema {
    params: Vec<ParamSpec>,
}

impl ParameterSchema {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
    }

    pub fn secret_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.secret)
    }

    /// Copy of `raw` with every secret parameter value masked.
    #[must_use]
    pub fn redact(&self, raw: &Map<String, Value>) -> Map<String, Value> {
        raw.iter()
            .map(|(k, v)| {
                let masked = self.get(k).is_some_and(|p| p.secret);
                let v = if masked {
                    Value::String(REDACTED.to_string())
                } else {
                    v.clone()
                };
                (k.clone(), v)
            })
            .collect()
    }

    /// Render as a JSON-schema object.
    ///
    /// `upper_case_types` produces the `STRING` / `OBJECT` spelling expected by
    /// Gemini function declarations.
    #[must_use]
    pub fn to_json_schema(&self, upper_case_types: bool) -> Value {
        let type_name = |t: &str| {
            if upper_case_types {
                t.to_uppercase()
            } else {
                t.to_string()
            }
        };

        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({
                        "type": type_name(p.kind.as_str()),
                        "description": p.description,
                    }),
                )
            })
            .collect();

        json!({
            "type": type_name("object"),
            "properties": properties,
            "required": self.required_names().collect::<Vec<_>>(),
        })
    }

    /// Check model-supplied arguments against this schema.
    ///
    /// Unknown keys, missing required keys, and values that cannot be coerced
    /// to the declared type are rejected. Numbers are accepted for string
    /// parameters and numeric strings for number parameters, since models emit
    /// both spellings for amounts.
    pub fn validate(&self, raw: &Map<String, Value>) -> Result<ToolArguments, ArgumentError> {
        let mut values = BTreeMap::new();

        for (key, value) in raw {
            let spec = self
                .get(key)
                .ok_or_else(|| ArgumentError::UnknownParameter(key.clone()))?;
            // Models sometimes send explicit nulls for optional fields.
            if value.is_null() && !spec.required {
                continue;
            }
            let typed = ArgValue::coerce(value, spec.kind).ok_or_else(|| {
                ArgumentError::TypeMismatch {
                    name: key.clone(),
                    expected: spec.kind,
                }
            })?;
            values.insert(key.clone(), typed);
        }

        if let Some(missing) = self.required_names().find(|n| !values.contains_key(*n)) {
            return Err(ArgumentError::MissingRequired(missing.to_string()));
        }

        Ok(ToolArguments { values })
    }
}

impl Serialize for ParameterSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json_schema(false).serialize(serializer)
    }
}

/// Argument validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArgumentError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("missing required parameter '{0}'")]
    MissingRequired(String),

    #[error("parameter '{name}' must be a {}", expected.as_str())]
    TypeMismatch { name: String, expected: ParamType },
}

/// A typed argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    String(String),
    Number(serde_json::Number),
    Boolean(bool),
}

impl ArgValue {
    fn coerce(value: &Value, kind: ParamType) -> Option<Self> {
        match (kind, value) {
            (ParamType::String, Value::String(s)) => Some(Self::String(s.clone())),
            (ParamType::String, Value::Number(n)) => Some(Self::String(decimal_text(n))),
            (ParamType::Number, Value::Number(n)) => Some(Self::Number(n.clone())),
            // parsed as a JSON number so "18" stays an integer
            (ParamType::Number, Value::String(s)) => {
                s.trim().parse::<serde_json::Number>().ok().map(Self::Number)
            }
            (ParamType::Integer, Value::Number(n)) => integral(n).map(Self::Number),
            (ParamType::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().ok().map(|i| Self::Number(i.into()))
            }
            (ParamType::Boolean, Value::Bool(b)) => Some(Self::Boolean(*b)),
            _ => None,
        }
    }
}

/// Gemini reports every number as a float, so `3.0` must count as an integer.
#[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
fn integral(n: &serde_json::Number) -> Option<serde_json::Number> {
    if n.is_i64() || n.is_u64() {
        return Some(n.clone());
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0).then(|| (f as i64).into())
}

/// Plain decimal rendering. Integral floats such as `1e21` are written out
/// in full instead of in exponent form.
#[allow(clippy::float_cmp)]
fn decimal_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if !(n.is_i64() || n.is_u64()) && f.is_finite() && f.fract() == 0.0 => {
            format!("{f:.0}")
        }
        _ => n.to_string(),
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Validated arguments for one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ToolArguments {
    values: BTreeMap<String, ArgValue>,
}

impl ToolArguments {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Remove an argument, returning it.
    pub fn take(&mut self, name: &str) -> Option<ArgValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
