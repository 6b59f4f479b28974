use std::sync::Arc;

use argbind_rt::{BindError, BindResult, TypeDesc};

use crate::descriptor::ParameterDescriptor;
use crate::expr;
use crate::request::{HttpRequest, NameValueCollection, RequestContext};
use crate::value::Value;

/// Resolves parameters the framework supplies itself: void markers, the
/// request context, the named request collections and bound expressions.
///
/// `Ok(None)` hands the parameter back to ordinary data binding. The checks
/// run in a fixed order and the first match wins.
pub fn try_resolve(
    ctx: &Arc<RequestContext>,
    param: &ParameterDescriptor,
) -> BindResult<Option<Value>> {
    if param.is_output() {
        return Err(BindError::UnsupportedCapability {
            param: param.name().to_string(),
            capability: "output parameter binding".to_string(),
        });
    }
    if param.is_void_marker() {
        return Ok(Some(Value::Skip));
    }
    match param.declared_type() {
        TypeDesc::Context => return Ok(Some(Value::Context(Arc::clone(ctx)))),
        TypeDesc::NameValues => {
            if let Some(coll) = named_collection(&ctx.request, param.name()) {
                return Ok(Some(Value::Collection(Arc::clone(coll))));
            }
        }
        _ => {}
    }
    match param.bound_expression() {
        Some(expression) => {
            let value = expr::evaluate(ctx, param, expression)?;
            Ok(Some(value.unwrap_or(Value::Null)))
        }
        None => Ok(None),
    }
}

fn named_collection<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a Arc<NameValueCollection>> {
    let collections = [
        ("Form", &request.form),
        ("QueryString", &request.query_string),
        ("Headers", &request.headers),
        ("ServerVariables", &request.server_variables),
    ];
    collections
        .into_iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, coll)| coll)
}
