use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use argbind_rt::{BindResult, TypeDesc, TypeKey};

use crate::descriptor::ParameterDescriptor;
use crate::request::RequestContext;
use crate::value::Value;

pub type Converter =
    Arc<dyn Fn(&Arc<RequestContext>, &ParameterDescriptor) -> BindResult<Value> + Send + Sync>;

/// Maps a target type to the function that fully owns producing its values.
///
/// Entries are keyed by the type with nullable wrappers stripped. One lock
/// guards the whole table; writes are rare and usually happen at startup.
pub struct ConverterRegistry {
    table: RwLock<HashMap<TypeKey, Converter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_builtin_converters() -> Self {
        let registry = Self::new();
        registry.register(&TypeDesc::File, file_from_request);
        registry.register(&TypeDesc::array(TypeDesc::File), files_from_request);
        registry
    }

    pub fn global() -> &'static Self {
        static REGISTRY: OnceLock<ConverterRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::with_builtin_converters)
    }

    pub fn register<T, F>(&self, target: &TypeDesc, convert: F)
    where
        T: Into<Value>,
        F: Fn(&Arc<RequestContext>, &ParameterDescriptor) -> BindResult<T> + Send + Sync + 'static,
    {
        let key = target.real_type().key();
        let convert: Converter =
            Arc::new(move |ctx: &Arc<RequestContext>, param: &ParameterDescriptor| {
                convert(ctx, param).map(Into::into)
            });
        let mut table = self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if table.insert(key.clone(), convert).is_some() {
            tracing::warn!(target_type = %key, "converter registration replaced an earlier one");
        }
    }

    pub fn lookup(&self, target: &TypeDesc) -> Option<Converter> {
        let key = target.real_type().key();
        let table = self
            .table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let found = table.get(&key).cloned();
        tracing::trace!(target_type = %key, found = found.is_some(), "converter lookup");
        found
    }
}

fn file_from_request(ctx: &Arc<RequestContext>, param: &ParameterDescriptor) -> BindResult<Value> {
    Ok(ctx
        .request
        .files_named(param.name())
        .next()
        .map(|file| Value::File(Arc::clone(file)))
        .unwrap_or(Value::Null))
}

/// Files posted under the parameter's name; every uploaded file when none are.
fn files_from_request(
    ctx: &Arc<RequestContext>,
    param: &ParameterDescriptor,
) -> BindResult<Value> {
    let mut files: Vec<Value> = ctx
        .request
        .files_named(param.name())
        .map(|file| Value::File(Arc::clone(file)))
        .collect();
    if files.is_empty() {
        files = ctx
            .request
            .files
            .iter()
            .map(|file| Value::File(Arc::clone(file)))
            .collect();
    }
    Ok(Value::List(files))
}
