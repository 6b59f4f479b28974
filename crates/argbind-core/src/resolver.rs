use std::sync::Arc;

use argbind_rt::{BindError, BindOptions, BindResult};

use crate::descriptor::ParameterDescriptor;
use crate::model::{ModelBuilder, ValueBuilder};
use crate::registry::ConverterRegistry;
use crate::request::RequestContext;
use crate::special;
use crate::value::Value;

/// Produces the arguments for a target function from a request.
///
/// Each parameter goes through, in order: the framework-special checks,
/// direct field lookup for scalar types, a registered converter, and finally
/// compound construction.
pub struct ParameterResolver<'r, B = ModelBuilder> {
    registry: &'r ConverterRegistry,
    builder: B,
}

impl Default for ParameterResolver<'static, ModelBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterResolver<'static, ModelBuilder> {
    pub fn new() -> Self {
        Self::with_options(BindOptions::default())
    }

    pub fn with_options(options: BindOptions) -> Self {
        Self {
            registry: ConverterRegistry::global(),
            builder: ModelBuilder::new(options),
        }
    }
}

impl<'r, B: ValueBuilder> ParameterResolver<'r, B> {
    pub fn with_parts(registry: &'r ConverterRegistry, builder: B) -> Self {
        Self { registry, builder }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    pub fn resolve(
        &self,
        ctx: &Arc<RequestContext>,
        param: &ParameterDescriptor,
    ) -> BindResult<Value> {
        if param.name().is_empty() {
            return Err(BindError::configuration(
                "",
                "parameter descriptors need a non-empty name",
            ));
        }
        if let Some(value) = special::try_resolve(ctx, param)? {
            tracing::debug!(param = param.name(), "bound as special parameter");
            return Ok(value);
        }

        let declared = param.declared_type();
        let real = declared.real_type();
        if real.is_supportable() {
            return match self.builder.get_scalar(ctx, param.name(), real)? {
                Some(value) => {
                    tracing::debug!(param = param.name(), ty = %real, "bound from request field");
                    Ok(value)
                }
                None if declared.is_value_type() => Err(BindError::missing(param.name())),
                None => {
                    tracing::debug!(param = param.name(), ty = %declared, "field absent, bound null");
                    Ok(Value::Null)
                }
            };
        }

        if let Some(convert) = self.registry.lookup(real) {
            tracing::debug!(param = param.name(), ty = %real, "bound by registered converter");
            return convert(ctx, param);
        }

        self.builder.construct_compound(ctx, param, real)
    }

    /// Resolves a whole signature. The result lines up with `params`; the
    /// first failure aborts the call.
    pub fn resolve_all(
        &self,
        ctx: &Arc<RequestContext>,
        params: &[ParameterDescriptor],
    ) -> BindResult<Vec<Value>> {
        params
            .iter()
            .map(|param| self.resolve(ctx, param))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use argbind_rt::TypeDesc;

    use super::*;

    struct EchoBuilder;

    impl ValueBuilder for EchoBuilder {
        fn get_scalar(
            &self,
            _ctx: &Arc<RequestContext>,
            field: &str,
            _target: &TypeDesc,
        ) -> BindResult<Option<Value>> {
            Ok(Some(Value::String(field.to_string())))
        }

        fn construct_compound(
            &self,
            _ctx: &Arc<RequestContext>,
            param: &ParameterDescriptor,
            _target: &TypeDesc,
        ) -> BindResult<Value> {
            Ok(Value::opaque("Echo", param.name().to_string()))
        }
    }

    fn context() -> Arc<RequestContext> {
        RequestContext::builder("GET", "http://localhost/")
            .expect("url")
            .build()
    }

    #[test]
    fn empty_names_are_rejected() {
        let err = ParameterResolver::new()
            .resolve(&context(), &ParameterDescriptor::new("", TypeDesc::String))
            .unwrap_err();
        assert_eq!(err.code(), "configuration_error");
    }

    #[test]
    fn builders_are_pluggable() {
        let registry = ConverterRegistry::new();
        let resolver = ParameterResolver::with_parts(&registry, EchoBuilder);
        let ctx = context();
        assert_eq!(
            resolver
                .resolve(&ctx, &ParameterDescriptor::new("city", TypeDesc::String))
                .unwrap(),
            Value::String("city".to_string())
        );
        let value = resolver
            .resolve(&ctx, &ParameterDescriptor::new("shape", TypeDesc::Custom("Shape".to_string())))
            .unwrap();
        assert!(matches!(value, Value::Opaque(ref inner) if inner.type_name() == "Echo"));
    }

    #[test]
    fn special_parameters_bypass_the_builder() {
        let registry = ConverterRegistry::new();
        let resolver = ParameterResolver::with_parts(&registry, EchoBuilder);
        let value = resolver
            .resolve(&context(), &ParameterDescriptor::new("headers", TypeDesc::NameValues))
            .unwrap();
        assert!(matches!(value, Value::Collection(_)));
    }
}
