//! Bound-expression evaluation.
//!
//! An expression is `<root>.<path>`. `Request.` paths read the request,
//! `RuntimeEnvironment.<name>` reads one static process property, and any
//! other root is read against the context itself (`Items.<key>`,
//! `Timestamp`, `Environment.<name>`). Every surface only exposes the
//! members listed here.

use std::sync::{Arc, OnceLock};

use argbind_rt::{BindError, BindResult};
use regex::Regex;
use url::Url;

use crate::descriptor::ParameterDescriptor;
use crate::environment::RuntimeEnvironment;
use crate::request::{HttpRequest, NameValueCollection, RequestContext};
use crate::value::Value;

const REQUEST_ROOT: &str = "Request";
const RUNTIME_ROOT: &str = "RuntimeEnvironment";
const SEGMENT_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_\-]*$";

type Eval = Result<Option<Value>, String>;

/// Evaluates `expression` for `param`. `Ok(None)` means the expression
/// produced no value.
pub fn evaluate(
    ctx: &Arc<RequestContext>,
    param: &ParameterDescriptor,
    expression: &str,
) -> BindResult<Option<Value>> {
    let invalid = |reason: String| {
        BindError::configuration(
            param.name(),
            format!("expression `{expression}` is invalid: {reason}"),
        )
    };
    let segments = split_path(expression).map_err(invalid)?;
    let produced = match segments.as_slice() {
        [REQUEST_ROOT, rest @ ..] => request_member(&ctx.request, rest),
        [RUNTIME_ROOT, rest @ ..] => runtime_member(&ctx.environment, rest),
        path => ambient_member(ctx, path),
    }
    .map_err(invalid)?;

    let Some(value) = produced else {
        tracing::trace!(param = param.name(), expression, "expression produced no value");
        return Ok(None);
    };
    if !value.is_assignable_to(param.declared_type()) {
        return Err(BindError::configuration(
            param.name(),
            format!(
                "declared type {} does not accept the {} produced by expression `{expression}`",
                param.declared_type(),
                value.type_name()
            ),
        ));
    }
    Ok(Some(value))
}

fn split_path(expression: &str) -> Result<Vec<&str>, String> {
    static SEGMENT: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    let pattern = SEGMENT
        .get_or_init(|| Regex::new(SEGMENT_PATTERN))
        .as_ref()
        .map_err(|err| err.to_string())?;
    let segments: Vec<&str> = expression.trim().split('.').collect();
    if let Some(bad) = segments.iter().find(|segment| !pattern.is_match(segment)) {
        return Err(format!("bad path segment `{bad}`"));
    }
    Ok(segments)
}

fn request_member(request: &HttpRequest, path: &[&str]) -> Eval {
    let Some((head, rest)) = path.split_first() else {
        return Err("`Request` is not a bindable value; name one of its members".to_string());
    };
    match *head {
        "Url" => url_member(&request.url, rest),
        "HttpMethod" => leaf(head, rest, Some(request.method.clone().into())),
        "Path" => leaf(head, rest, Some(request.path().into())),
        "RawUrl" => leaf(head, rest, Some(request.raw_url().into())),
        "UserAgent" => leaf(head, rest, request.user_agent().map(Value::from)),
        "UserHostAddress" => leaf(
            head,
            rest,
            request.user_host_address.as_deref().map(Value::from),
        ),
        "ContentType" => leaf(head, rest, request.content_type().map(Value::from)),
        "IsSecureConnection" => leaf(head, rest, Some(request.is_secure_connection().into())),
        "Form" => collection_member(head, &request.form, rest),
        "QueryString" => collection_member(head, &request.query_string, rest),
        "Headers" => collection_member(head, &request.headers, rest),
        "ServerVariables" => collection_member(head, &request.server_variables, rest),
        "Files" => match rest {
            [] => Ok(Some(Value::Int(request.files.len() as i64))),
            [field] => Ok(request
                .files_named(field)
                .next()
                .map(|file| Value::File(Arc::clone(file)))),
            _ => Err(format!("`Files.{}` has no member `{}`", rest[0], rest[1])),
        },
        other => Err(format!("unknown request member `{other}`")),
    }
}

fn url_member(url: &Url, path: &[&str]) -> Eval {
    let Some((head, rest)) = path.split_first() else {
        return Ok(Some(Value::String(url.as_str().to_string())));
    };
    let value = match *head {
        "Scheme" => Some(url.scheme().into()),
        "Host" => url.host_str().map(Value::from),
        "Port" => url.port_or_known_default().map(|port| Value::Int(i64::from(port))),
        "Path" => Some(url.path().into()),
        "Query" => url.query().map(Value::from),
        "Fragment" => url.fragment().map(Value::from),
        "AbsoluteUri" => Some(url.as_str().into()),
        other => return Err(format!("unknown url member `{other}`")),
    };
    leaf(head, rest, value)
}

fn collection_member(name: &str, coll: &Arc<NameValueCollection>, path: &[&str]) -> Eval {
    match path {
        [] => Ok(Some(Value::Collection(Arc::clone(coll)))),
        [key] => Ok(coll.get(key).map(Value::from)),
        _ => Err(format!("`{name}.{}` has no member `{}`", path[0], path[1])),
    }
}

fn runtime_member(env: &RuntimeEnvironment, path: &[&str]) -> Eval {
    let name = path.join(".");
    match path {
        [single] => env
            .property(single)
            .map(Some)
            .ok_or_else(|| format!("unknown runtime property `{name}`")),
        _ => Err(format!("unknown runtime property `{name}`")),
    }
}

fn ambient_member(ctx: &RequestContext, path: &[&str]) -> Eval {
    let Some((head, rest)) = path.split_first() else {
        return Err("empty expression".to_string());
    };
    match *head {
        "Environment" => runtime_member(&ctx.environment, rest),
        "Timestamp" => leaf(head, rest, Some(Value::DateTime(ctx.timestamp.naive_utc()))),
        "Items" => match rest {
            [key] => Ok(ctx.items.get(*key).cloned()),
            [] => Err("`Items` needs a key".to_string()),
            _ => Err(format!("`Items.{}` has no member `{}`", rest[0], rest[1])),
        },
        other => Err(format!("unknown context member `{other}`")),
    }
}

fn leaf(name: &str, rest: &[&str], value: Option<Value>) -> Eval {
    match rest.first() {
        None => Ok(value),
        Some(member) => Err(format!("`{name}` has no member `{member}`")),
    }
}
