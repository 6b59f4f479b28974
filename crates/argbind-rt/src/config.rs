use serde::Deserialize;

pub const ENV_PREFIX: &str = "argbind";

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Form,
    Query,
    Headers,
    ServerVariables,
}

impl FieldSource {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "form" => Some(FieldSource::Form),
            "query" | "querystring" => Some(FieldSource::Query),
            "headers" => Some(FieldSource::Headers),
            "server_variables" | "servervariables" => Some(FieldSource::ServerVariables),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BindOptions {
    /// Sources searched in order; the first source holding the field wins.
    pub lookup_order: Vec<FieldSource>,
    pub trim_values: bool,
    /// Also split a single occurrence of an array field on commas.
    pub split_array_values: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            lookup_order: vec![FieldSource::Form, FieldSource::Query],
            trim_values: true,
            split_array_values: false,
        }
    }
}

impl BindOptions {
    pub fn from_env() -> Result<Self, String> {
        let mut options = Self::default();
        options.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(options)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = env_key(ENV_PREFIX, "lookup_order");
        if let Some(raw) = lookup(&key) {
            let mut order = Vec::new();
            for item in raw.split(',').filter(|item| !item.trim().is_empty()) {
                let source = FieldSource::parse(item)
                    .ok_or_else(|| format!("{key}: unknown field source `{}`", item.trim()))?;
                if !order.contains(&source) {
                    order.push(source);
                }
            }
            if order.is_empty() {
                return Err(format!("{key}: at least one field source is required"));
            }
            self.lookup_order = order;
        }
        let key = env_key(ENV_PREFIX, "trim_values");
        if let Some(raw) = lookup(&key) {
            self.trim_values = parse_flag(&key, &raw)?;
        }
        let key = env_key(ENV_PREFIX, "split_array_values");
        if let Some(raw) = lookup(&key) {
            self.split_array_values = parse_flag(&key, &raw)?;
        }
        Ok(())
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(format!("{key}: invalid flag `{raw}`")),
    }
}

pub fn env_key(config: &str, field: &str) -> String {
    format!("{}_{}", to_env_key(config), to_env_key(field))
}

/// CGI-style server variable name for a request header (`User-Agent` -> `HTTP_USER_AGENT`).
pub fn server_variable_name(header: &str) -> String {
    format!("HTTP_{}", to_env_key(header))
}

fn to_env_key(name: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '-' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
            continue;
        }
        let is_upper = ch.is_ascii_uppercase();
        if is_upper && prev_lower {
            out.push('_');
        }
        out.push(ch.to_ascii_uppercase());
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn header_names_map_to_server_variables() {
        assert_eq!(server_variable_name("User-Agent"), "HTTP_USER_AGENT");
        assert_eq!(server_variable_name("x-request-id"), "HTTP_X_REQUEST_ID");
        assert_eq!(env_key("argbind", "lookupOrder"), "ARGBIND_LOOKUP_ORDER");
    }

    #[test]
    fn overrides_replace_defaults() {
        let vars: HashMap<&str, &str> = [
            ("ARGBIND_LOOKUP_ORDER", "query, headers,query"),
            ("ARGBIND_SPLIT_ARRAY_VALUES", "on"),
        ]
        .into_iter()
        .collect();
        let mut options = BindOptions::default();
        options
            .apply_overrides(|key| vars.get(key).map(|value| value.to_string()))
            .expect("overrides");
        assert_eq!(
            options.lookup_order,
            vec![FieldSource::Query, FieldSource::Headers]
        );
        assert!(options.trim_values);
        assert!(options.split_array_values);
    }

    #[test]
    fn rejects_unknown_sources() {
        let mut options = BindOptions::default();
        let err = options
            .apply_overrides(|key| (key == "ARGBIND_LOOKUP_ORDER").then(|| "cookies".to_string()))
            .unwrap_err();
        assert!(err.contains("cookies"), "{err}");
    }
}
