//! TOML fixtures describing one request and the signature to bind against it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use argbind_core::model::convert_raw;
use argbind_core::{
    HttpFile, ParameterDescriptor, RequestContext, RequestContextBuilder, RuntimeEnvironment,
    Value, expr, register_converter,
};
use argbind_rt::types::parse_type_ref;
use argbind_rt::{BindOptions, EnumType, StructType, TypeDesc};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid fixture {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("file `{field}`: content is not valid base64: {source}")]
    Base64 {
        field: String,
        source: base64::DecodeError,
    },
    #[error("{0}")]
    Fixture(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    #[serde(default)]
    pub options: BindOptions,
    pub request: RequestFixture,
    #[serde(default)]
    pub environment: Option<EnvironmentFixture>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDecl>,
    /// Declared type name to the expression its converter evaluates.
    #[serde(default)]
    pub converters: BTreeMap<String, String>,
    #[serde(default, rename = "param")]
    pub params: Vec<ParamFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestFixture {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub form: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub query: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub server_variables: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub items: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub files: Vec<FileFixture>,
    pub remote_addr: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileFixture {
    pub field: String,
    pub name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentFixture {
    pub app_name: Option<String>,
    pub app_path: Option<PathBuf>,
    pub machine_name: Option<String>,
    pub version: Option<String>,
    pub debug: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TypeDecl {
    Struct { fields: IndexMap<String, FieldDecl> },
    Enum { variants: Vec<String> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FieldDecl {
    Type(String),
    Detailed {
        #[serde(rename = "type")]
        ty: String,
        default: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamFixture {
    pub name: String,
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
    pub expression: Option<String>,
    #[serde(default)]
    pub output: bool,
    #[serde(default, rename = "void")]
    pub void_marker: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let raw = fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| CliError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn options<F>(&self, lookup: F) -> Result<BindOptions, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = self.options.clone();
        options.apply_overrides(lookup).map_err(CliError::Fixture)?;
        Ok(options)
    }

    pub fn request_context(&self) -> Result<Arc<RequestContext>, CliError> {
        let req = &self.request;
        let mut builder =
            RequestContext::builder(&req.method, &req.url).map_err(CliError::Fixture)?;
        builder = add_fields(builder, "form", &req.form, |b, name, value| b.form(name, value))?;
        builder = add_fields(builder, "query", &req.query, |b, name, value| b.query(name, value))?;
        builder = add_fields(builder, "headers", &req.headers, |b, name, value| {
            b.header(name, value)
        })?;
        builder = add_fields(
            builder,
            "server_variables",
            &req.server_variables,
            |b, name, value| b.server_variable(name, value),
        )?;
        for (key, raw) in &req.items {
            builder = builder.item(key.clone(), item_value(key, raw)?);
        }
        for file in &req.files {
            let content = STANDARD
                .decode(file.content.trim())
                .map_err(|source| CliError::Base64 {
                    field: file.field.clone(),
                    source,
                })?;
            builder = builder.file(HttpFile {
                field_name: file.field.clone(),
                file_name: file.name.clone(),
                content_type: file.content_type.clone(),
                content,
            });
        }
        if let Some(addr) = &req.remote_addr {
            builder = builder.remote_addr(addr.clone());
        }
        if let Some(raw) = &req.timestamp {
            let timestamp = DateTime::parse_from_rfc3339(raw)
                .map_err(|err| CliError::Fixture(format!("request.timestamp `{raw}`: {err}")))?;
            builder = builder.timestamp(timestamp.with_timezone(&Utc));
        }
        if let Some(env) = &self.environment {
            builder = builder.environment(Arc::new(env.apply(RuntimeEnvironment::from_env())));
        }
        Ok(builder.build())
    }

    pub fn parameters(&self) -> Result<Vec<ParameterDescriptor>, CliError> {
        let mut table = TypeTable::new(&self.types);
        let mut params = Vec::with_capacity(self.params.len());
        for param in &self.params {
            if param.void_marker {
                params.push(ParameterDescriptor::void_marker(param.name.clone()));
                continue;
            }
            let raw = param.ty.as_deref().ok_or_else(|| {
                CliError::Fixture(format!("param `{}`: missing `type`", param.name))
            })?;
            let ty = table
                .resolve(raw)
                .map_err(|err| CliError::Fixture(format!("param `{}`: {err}", param.name)))?;
            let mut desc = ParameterDescriptor::new(param.name.clone(), ty);
            if let Some(expression) = &param.expression {
                desc = desc.bound_to(expression.clone());
            }
            if param.output {
                desc = desc.output();
            }
            params.push(desc);
        }
        Ok(params)
    }

    /// Registers one converter per `[converters]` entry in the process-wide
    /// registry. Each converter evaluates its expression for the parameter
    /// being bound.
    pub fn register_converters(&self) -> Result<(), CliError> {
        let mut table = TypeTable::new(&self.types);
        for (name, expression) in &self.converters {
            let ty = table
                .resolve(name)
                .map_err(|err| CliError::Fixture(format!("converter `{name}`: {err}")))?;
            let expression = expression.clone();
            register_converter(&ty, move |ctx, param| {
                let probe = ParameterDescriptor::new(param.name(), TypeDesc::Any);
                Ok(expr::evaluate(ctx, &probe, &expression)?.unwrap_or(Value::Null))
            });
            tracing::debug!(target_type = %ty, "fixture converter registered");
        }
        Ok(())
    }
}

impl EnvironmentFixture {
    fn apply(&self, mut env: RuntimeEnvironment) -> RuntimeEnvironment {
        if let Some(name) = &self.app_name {
            env.app_name = name.clone();
        }
        if let Some(path) = &self.app_path {
            env.app_path = path.clone();
        }
        if let Some(machine) = &self.machine_name {
            env.machine_name = machine.clone();
        }
        if let Some(version) = &self.version {
            env.version = version.clone();
        }
        if let Some(debug) = self.debug {
            env.debug_enabled = debug;
        }
        env
    }
}

fn add_fields<F>(
    mut builder: RequestContextBuilder,
    section: &str,
    fields: &BTreeMap<String, toml::Value>,
    add: F,
) -> Result<RequestContextBuilder, CliError>
where
    F: Fn(RequestContextBuilder, String, String) -> RequestContextBuilder,
{
    for (name, raw) in fields {
        for value in field_values(section, name, raw)? {
            builder = add(builder, name.clone(), value);
        }
    }
    Ok(builder)
}

fn field_values(section: &str, name: &str, raw: &toml::Value) -> Result<Vec<String>, CliError> {
    match raw {
        toml::Value::Array(items) => items
            .iter()
            .map(|item| scalar_text(item).ok_or_else(|| nested_error(section, name)))
            .collect(),
        other => scalar_text(other)
            .map(|text| vec![text])
            .ok_or_else(|| nested_error(section, name)),
    }
}

fn scalar_text(raw: &toml::Value) -> Option<String> {
    match raw {
        toml::Value::String(text) => Some(text.clone()),
        toml::Value::Integer(num) => Some(num.to_string()),
        toml::Value::Float(num) => Some(num.to_string()),
        toml::Value::Boolean(flag) => Some(flag.to_string()),
        toml::Value::Datetime(dt) => Some(dt.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

fn nested_error(section: &str, name: &str) -> CliError {
    CliError::Fixture(format!(
        "request.{section}.{name}: values must be scalars or a list of scalars"
    ))
}

fn item_value(key: &str, raw: &toml::Value) -> Result<Value, CliError> {
    Ok(match raw {
        toml::Value::String(text) => Value::String(text.clone()),
        toml::Value::Integer(num) => Value::Int(*num),
        toml::Value::Float(num) => Value::Float(*num),
        toml::Value::Boolean(flag) => Value::Bool(*flag),
        toml::Value::Datetime(dt) => {
            let text = dt.to_string();
            convert_raw(key, &TypeDesc::DateTime, &text).unwrap_or_else(|_| Value::String(text))
        }
        toml::Value::Array(items) => Value::List(
            items
                .iter()
                .map(|item| item_value(key, item))
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(_) => {
            return Err(CliError::Fixture(format!(
                "request.items.{key}: tables are not supported"
            )));
        }
    })
}

struct TypeTable<'a> {
    decls: &'a BTreeMap<String, TypeDecl>,
    resolving: Vec<String>,
}

impl<'a> TypeTable<'a> {
    fn new(decls: &'a BTreeMap<String, TypeDecl>) -> Self {
        Self {
            decls,
            resolving: Vec::new(),
        }
    }

    fn resolve(&mut self, raw: &str) -> Result<TypeDesc, String> {
        parse_type_ref(raw, &mut |name: &str| self.named(name))
    }

    fn named(&mut self, name: &str) -> Result<Option<TypeDesc>, String> {
        let decls = self.decls;
        let Some(decl) = decls.get(name) else {
            return Ok(None);
        };
        if self.resolving.iter().any(|open| open == name) {
            return Err(format!("type `{name}` refers to itself"));
        }
        self.resolving.push(name.to_string());
        let ty = match decl {
            TypeDecl::Struct { fields } => {
                let mut ty = StructType::new(name);
                for (field, decl) in fields {
                    ty = match decl {
                        FieldDecl::Type(raw) => ty.field(field.clone(), self.resolve(raw)?),
                        FieldDecl::Detailed { ty: raw, default } => {
                            let field_ty = self.resolve(raw)?;
                            match default {
                                Some(default) => {
                                    ty.field_with_default(field.clone(), field_ty, default.clone())
                                }
                                None => ty.field(field.clone(), field_ty),
                            }
                        }
                    };
                }
                TypeDesc::Struct(ty)
            }
            TypeDecl::Enum { variants } => {
                if variants.is_empty() {
                    return Err(format!("enum `{name}` declares no variants"));
                }
                TypeDesc::Enum(EnumType::with_variants(name, variants.iter().cloned()))
            }
        };
        self.resolving.pop();
        Ok(Some(ty))
    }
}
