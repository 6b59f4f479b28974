use std::collections::HashMap;
use std::sync::Arc;

use argbind_rt::config::server_variable_name;
use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use crate::environment::RuntimeEnvironment;
use crate::value::Value;

/// Ordered multimap of request fields. Lookups ignore ASCII case; duplicate
/// names keep every value in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameValueCollection {
    entries: Vec<(String, String)>,
}

impl NameValueCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map<I, K, V>(map: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut out = Self::new();
        for (name, value) in map {
            out.add(name, value);
        }
        out
    }

    /// Builds a collection from the public fields of a serializable object.
    /// Underscores in field names become dashes, so `user_agent` maps to the
    /// `user-agent` header; null values become empty strings.
    pub fn from_object<T: Serialize>(obj: &T) -> Result<Self, String> {
        let json = serde_json::to_value(obj).map_err(|err| err.to_string())?;
        let serde_json::Value::Object(fields) = json else {
            return Err("expected an object with named fields".to_string());
        };
        let mut out = Self::new();
        for (name, value) in fields {
            let text = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            out.add(name.replace('_', "-"), text);
        }
        Ok(out)
    }

    pub fn parse_urlencoded(raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        Self::from_map(url::form_urlencoded::parse(raw.as_bytes()).into_owned())
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries
            .retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_values(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
            .collect()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (key, _) in &self.entries {
            if !keys.iter().any(|seen| seen.eq_ignore_ascii_case(key)) {
                keys.push(key);
            }
        }
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl HttpFile {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub url: Url,
    pub form: Arc<NameValueCollection>,
    pub query_string: Arc<NameValueCollection>,
    pub headers: Arc<NameValueCollection>,
    pub server_variables: Arc<NameValueCollection>,
    pub files: Vec<Arc<HttpFile>>,
    pub user_host_address: Option<String>,
}

impl HttpRequest {
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn raw_url(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.headers.get("User-Agent")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }

    pub fn is_secure_connection(&self) -> bool {
        self.url.scheme() == "https"
    }

    pub fn files_named<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Arc<HttpFile>> {
        self.files
            .iter()
            .filter(move |file| file.field_name.eq_ignore_ascii_case(field))
    }
}

/// Per-request handle the binder reads from. Shared through `Arc` so bound
/// values can hand out the very same request and collections.
#[derive(Debug)]
pub struct RequestContext {
    pub request: HttpRequest,
    pub items: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    pub environment: Arc<RuntimeEnvironment>,
}

impl RequestContext {
    pub fn builder(method: &str, url: &str) -> Result<RequestContextBuilder, String> {
        RequestContextBuilder::new(method, url)
    }
}

pub struct RequestContextBuilder {
    method: String,
    url: Url,
    form: NameValueCollection,
    query_string: NameValueCollection,
    headers: NameValueCollection,
    server_variables: NameValueCollection,
    files: Vec<Arc<HttpFile>>,
    user_host_address: Option<String>,
    items: HashMap<String, Value>,
    timestamp: Option<DateTime<Utc>>,
    environment: Option<Arc<RuntimeEnvironment>>,
}

impl RequestContextBuilder {
    pub fn new(method: &str, url: &str) -> Result<Self, String> {
        let url = Url::parse(url).map_err(|err| format!("invalid request url `{url}`: {err}"))?;
        let query_string = NameValueCollection::from_map(url.query_pairs().into_owned());
        Ok(Self {
            method: method.to_ascii_uppercase(),
            url,
            form: NameValueCollection::new(),
            query_string,
            headers: NameValueCollection::new(),
            server_variables: NameValueCollection::new(),
            files: Vec::new(),
            user_host_address: None,
            items: HashMap::new(),
            timestamp: None,
            environment: None,
        })
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.add(name, value);
        self
    }

    pub fn form_collection(mut self, form: NameValueCollection) -> Self {
        self.form = form;
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        // The URL stays the source for `QUERY_STRING` and `RawUrl`.
        self.url.query_pairs_mut().append_pair(&name, &value);
        self.query_string.add(name, value);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn server_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_variables.set(name, value);
        self
    }

    pub fn file(mut self, file: HttpFile) -> Self {
        self.files.push(Arc::new(file));
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.user_host_address = Some(addr.into());
        self
    }

    pub fn item(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.items.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn environment(mut self, environment: Arc<RuntimeEnvironment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn build(self) -> Arc<RequestContext> {
        let mut server_variables = derived_server_variables(
            &self.method,
            &self.url,
            &self.headers,
            self.user_host_address.as_deref(),
        );
        for (name, value) in self.server_variables.iter() {
            server_variables.set(name, value);
        }
        Arc::new(RequestContext {
            request: HttpRequest {
                method: self.method,
                url: self.url,
                form: Arc::new(self.form),
                query_string: Arc::new(self.query_string),
                headers: Arc::new(self.headers),
                server_variables: Arc::new(server_variables),
                files: self.files,
                user_host_address: self.user_host_address,
            },
            items: self.items,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            environment: self.environment.unwrap_or_else(RuntimeEnvironment::shared),
        })
    }
}

fn derived_server_variables(
    method: &str,
    url: &Url,
    headers: &NameValueCollection,
    remote_addr: Option<&str>,
) -> NameValueCollection {
    let mut vars = NameValueCollection::new();
    vars.add("REQUEST_METHOD", method);
    vars.add("PATH_INFO", url.path());
    vars.add("QUERY_STRING", url.query().unwrap_or(""));
    vars.add("SERVER_NAME", url.host_str().unwrap_or(""));
    if let Some(port) = url.port_or_known_default() {
        vars.add("SERVER_PORT", port.to_string());
    }
    vars.add("HTTPS", if url.scheme() == "https" { "on" } else { "off" });
    if let Some(addr) = remote_addr {
        vars.add("REMOTE_ADDR", addr);
    }
    for name in headers.keys() {
        let joined = headers.get_values(name).join(", ");
        vars.add(server_variable_name(name), joined);
    }
    vars
}
