use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

pub type BindResult<T> = Result<T, BindError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BindError {
    /// The signature or its metadata cannot be bound as declared.
    #[error("parameter `{param}`: {detail}")]
    Configuration { param: String, detail: String },
    #[error("no value found for required parameter `{param}`")]
    MissingRequiredValue { param: String },
    #[error("parameter `{param}`: {capability} is not supported")]
    UnsupportedCapability { param: String, capability: String },
    #[error("field `{field}`: cannot convert {raw:?} to {target}")]
    InvalidValue {
        field: String,
        target: String,
        raw: String,
    },
}

impl BindError {
    pub fn configuration(param: impl Into<String>, detail: impl Into<String>) -> Self {
        BindError::Configuration {
            param: param.into(),
            detail: detail.into(),
        }
    }

    pub fn missing(param: impl Into<String>) -> Self {
        BindError::MissingRequiredValue {
            param: param.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BindError::Configuration { .. } => "configuration_error",
            BindError::MissingRequiredValue { .. } => "missing_required_value",
            BindError::UnsupportedCapability { .. } => "unsupported_capability",
            BindError::InvalidValue { .. } => "invalid_value",
        }
    }

    pub fn param(&self) -> &str {
        match self {
            BindError::Configuration { param, .. }
            | BindError::MissingRequiredValue { param }
            | BindError::UnsupportedCapability { param, .. } => param,
            BindError::InvalidValue { field, .. } => field,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        error_json(self.code(), &self.to_string(), Some(self.param()))
    }
}

pub fn error_json(code: &str, message: &str, param: Option<&str>) -> JsonValue {
    let mut err = Map::new();
    err.insert("code".to_string(), JsonValue::String(code.to_string()));
    err.insert(
        "message".to_string(),
        JsonValue::String(message.to_string()),
    );
    if let Some(param) = param {
        err.insert("param".to_string(), JsonValue::String(param.to_string()));
    }
    let mut root = Map::new();
    root.insert("error".to_string(), JsonValue::Object(err));
    JsonValue::Object(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_carries_code_message_and_param() {
        let err = BindError::configuration("tenant", "expression `Request.Nope` is invalid");
        let json = err.to_json();
        assert_eq!(json["error"]["code"], "configuration_error");
        assert_eq!(json["error"]["param"], "tenant");
        assert_eq!(
            json["error"]["message"],
            "parameter `tenant`: expression `Request.Nope` is invalid"
        );
    }

    #[test]
    fn invalid_value_reports_field() {
        let err = BindError::InvalidValue {
            field: "id".to_string(),
            target: "Int".to_string(),
            raw: "abc".to_string(),
        };
        assert_eq!(err.param(), "id");
        assert_eq!(err.to_string(), "field `id`: cannot convert \"abc\" to Int");
    }
}
