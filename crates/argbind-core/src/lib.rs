pub mod descriptor;
pub mod environment;
pub mod expr;
pub mod model;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod special;
pub mod value;

use std::sync::Arc;

pub use argbind_rt::{BindError, BindOptions, BindResult, TypeDesc};
pub use descriptor::ParameterDescriptor;
pub use environment::RuntimeEnvironment;
pub use model::{ModelBuilder, ValueBuilder};
pub use registry::ConverterRegistry;
pub use request::{HttpFile, HttpRequest, NameValueCollection, RequestContext, RequestContextBuilder};
pub use resolver::ParameterResolver;
pub use value::Value;

/// Registers `convert` for `target` in the process-wide registry. The last
/// registration for a type wins.
pub fn register_converter<T, F>(target: &TypeDesc, convert: F)
where
    T: Into<Value>,
    F: Fn(&Arc<RequestContext>, &ParameterDescriptor) -> BindResult<T> + Send + Sync + 'static,
{
    ConverterRegistry::global().register(target, convert);
}
