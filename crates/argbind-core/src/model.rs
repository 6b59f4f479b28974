use std::collections::BTreeMap;
use std::sync::Arc;

use argbind_rt::{BindError, BindOptions, BindResult, FieldSource, StructType, TypeDesc};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::descriptor::ParameterDescriptor;
use crate::request::{NameValueCollection, RequestContext};
use crate::value::Value;

/// Builds data values out of named request fields.
pub trait ValueBuilder: Send + Sync {
    /// Reads the field `field` as `target`. `Ok(None)` means the request does
    /// not carry the field.
    fn get_scalar(
        &self,
        ctx: &Arc<RequestContext>,
        field: &str,
        target: &TypeDesc,
    ) -> BindResult<Option<Value>>;

    fn construct_compound(
        &self,
        ctx: &Arc<RequestContext>,
        param: &ParameterDescriptor,
        target: &TypeDesc,
    ) -> BindResult<Value>;
}

#[derive(Clone, Debug, Default)]
pub struct ModelBuilder {
    options: BindOptions,
}

impl ModelBuilder {
    pub fn new(options: BindOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BindOptions {
        &self.options
    }

    fn raw_values<'a>(&self, ctx: &'a RequestContext, field: &str) -> Vec<&'a str> {
        for source in &self.options.lookup_order {
            let coll: &NameValueCollection = match source {
                FieldSource::Form => ctx.request.form.as_ref(),
                FieldSource::Query => ctx.request.query_string.as_ref(),
                FieldSource::Headers => ctx.request.headers.as_ref(),
                FieldSource::ServerVariables => ctx.request.server_variables.as_ref(),
            };
            let values = coll.get_values(field);
            if !values.is_empty() {
                tracing::trace!(field, source = ?source, count = values.len(), "field read");
                return values;
            }
        }
        Vec::new()
    }

    fn prepare<'a>(&self, raw: &'a str) -> &'a str {
        if self.options.trim_values { raw.trim() } else { raw }
    }

    fn convert_array(
        &self,
        field: &str,
        elem: &TypeDesc,
        raws: &[&str],
    ) -> BindResult<Option<Value>> {
        let mut pieces: Vec<&str> = Vec::new();
        for raw in raws {
            if self.options.split_array_values {
                pieces.extend(raw.split(','));
            } else {
                pieces.push(raw);
            }
        }
        let elem = elem.real_type();
        let mut items = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let piece = self.prepare(piece);
            if piece.is_empty() && !matches!(elem, TypeDesc::String) {
                continue;
            }
            items.push(convert_raw(field, elem, piece)?);
        }
        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some(Value::List(items)))
    }

    fn convert_default(&self, field: &str, ty: &TypeDesc, raw: &str) -> BindResult<Value> {
        match ty.real_type() {
            TypeDesc::Array(elem) => {
                let pieces: Vec<&str> = raw.split(',').collect();
                Ok(self
                    .convert_array(field, elem, &pieces)?
                    .unwrap_or_else(|| Value::List(Vec::new())))
            }
            real => convert_raw(field, real, self.prepare(raw)),
        }
    }

    fn build_struct(
        &self,
        ctx: &Arc<RequestContext>,
        param: &ParameterDescriptor,
        ty: &StructType,
    ) -> BindResult<Value> {
        // Check every member before reading any, so a bad member never
        // leaves a half-built instance behind.
        for field in &ty.fields {
            if field.ty.is_compound() {
                return Err(BindError::configuration(
                    param.name(),
                    format!(
                        "member `{}` of {} has compound type {}; nested compound types are not supported",
                        field.name, ty.name, field.ty
                    ),
                ));
            }
            if !field.ty.is_supportable() {
                return Err(BindError::configuration(
                    param.name(),
                    format!(
                        "member `{}` of {} has type {}, which cannot be read from request fields",
                        field.name, ty.name, field.ty
                    ),
                ));
            }
        }

        let mut fields = BTreeMap::new();
        for field in &ty.fields {
            let value = match self.get_scalar(ctx, &field.name, field.ty.real_type())? {
                Some(value) => value,
                None => match &field.default {
                    Some(raw) => self.convert_default(&field.name, &field.ty, raw)?,
                    None => Value::zero_for(&field.ty),
                },
            };
            fields.insert(field.name.clone(), value);
        }
        tracing::debug!(param = param.name(), ty = %ty.name, members = fields.len(), "compound built");
        Ok(Value::Struct {
            name: ty.name.clone(),
            fields,
        })
    }
}

impl ValueBuilder for ModelBuilder {
    fn get_scalar(
        &self,
        ctx: &Arc<RequestContext>,
        field: &str,
        target: &TypeDesc,
    ) -> BindResult<Option<Value>> {
        let raws = self.raw_values(ctx, field);
        match target.real_type() {
            TypeDesc::Array(elem) => self.convert_array(field, elem, &raws),
            real => {
                let Some(raw) = raws.first() else {
                    return Ok(None);
                };
                let raw = self.prepare(raw);
                if raw.is_empty() && !matches!(real, TypeDesc::String) {
                    return Ok(None);
                }
                convert_raw(field, real, raw).map(Some)
            }
        }
    }

    fn construct_compound(
        &self,
        ctx: &Arc<RequestContext>,
        param: &ParameterDescriptor,
        target: &TypeDesc,
    ) -> BindResult<Value> {
        match target.real_type() {
            TypeDesc::Struct(ty) => self.build_struct(ctx, param, ty),
            other => Err(BindError::configuration(
                param.name(),
                format!("type {other} has no registered converter and cannot be built from request fields"),
            )),
        }
    }
}

pub fn convert_raw(field: &str, target: &TypeDesc, raw: &str) -> BindResult<Value> {
    let invalid = || BindError::InvalidValue {
        field: field.to_string(),
        target: target.to_string(),
        raw: raw.to_string(),
    };
    match target {
        TypeDesc::String => Ok(Value::String(raw.to_string())),
        TypeDesc::Bool => parse_bool(raw).map(Value::Bool).ok_or_else(invalid),
        TypeDesc::Int => raw.parse::<i64>().map(Value::Int).map_err(|_| invalid()),
        TypeDesc::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Value::Float)
            .ok_or_else(invalid),
        TypeDesc::Decimal => parse_decimal(raw).map(Value::Decimal).ok_or_else(invalid),
        TypeDesc::Char => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Ok(Value::Char(ch)),
                _ => Err(invalid()),
            }
        }
        TypeDesc::DateTime => parse_datetime(raw).map(Value::DateTime).ok_or_else(invalid),
        TypeDesc::Guid => Uuid::parse_str(raw).map(Value::Guid).map_err(|_| invalid()),
        TypeDesc::Enum(ty) => {
            let variant = match ty.variant_named(raw) {
                Some(variant) => Some(variant),
                None => raw
                    .parse::<i64>()
                    .ok()
                    .and_then(|ordinal| ty.variant_with_ordinal(ordinal)),
            };
            variant
                .map(|variant| Value::Enum {
                    name: ty.name.clone(),
                    variant: variant.name.clone(),
                    ordinal: variant.ordinal,
                })
                .ok_or_else(invalid)
        }
        TypeDesc::Option(inner) => convert_raw(field, inner, raw),
        _ => Err(invalid()),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Normalizes `[+-]digits[.digits]`: drops a leading `+`, redundant leading
/// zeros and trailing fractional zeros. Exponents are not accepted.
fn parse_decimal(raw: &str) -> Option<String> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let (int, frac) = match digits.split_once('.') {
        Some((_, "")) => return None,
        Some(parts) => parts,
        None => (digits, ""),
    };
    if int.is_empty() {
        return None;
    }
    if !int.chars().chain(frac.chars()).all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let int = int.trim_start_matches('0');
    let frac = frac.trim_end_matches('0');
    let mut out = String::new();
    if negative && !(int.is_empty() && frac.is_empty()) {
        out.push('-');
    }
    out.push_str(if int.is_empty() { "0" } else { int });
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    Some(out)
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Some(value.naive_utc());
    }
    if let Ok(value) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(value);
    }
    if let Ok(value) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(value);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use argbind_rt::EnumType;

    use super::*;

    fn week() -> TypeDesc {
        TypeDesc::Enum(EnumType::with_variants(
            "Week",
            ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday"],
        ))
    }

    #[test]
    fn enums_accept_names_and_ordinals() {
        let by_name = convert_raw("week", &week(), "thursday").expect("name");
        assert!(matches!(by_name, Value::Enum { ref variant, .. } if variant == "Thursday"));
        let by_number = convert_raw("week", &week(), "2").expect("ordinal");
        assert!(matches!(by_number, Value::Enum { ref variant, .. } if variant == "Tuesday"));
        let err = convert_raw("week", &week(), "Caturday").unwrap_err();
        assert_eq!(err.code(), "invalid_value");
    }

    #[test]
    fn scalars_parse_common_spellings() {
        assert_eq!(convert_raw("f", &TypeDesc::Bool, "on").unwrap(), Value::Bool(true));
        assert_eq!(convert_raw("f", &TypeDesc::Char, "x").unwrap(), Value::Char('x'));
        assert!(convert_raw("f", &TypeDesc::Char, "xy").is_err());
        assert!(matches!(
            convert_raw("f", &TypeDesc::DateTime, "2024-02-29").unwrap(),
            Value::DateTime(_)
        ));
        assert!(matches!(
            convert_raw("f", &TypeDesc::Guid, "{67e55044-10b1-426f-9247-bb680e5fe0c8}").unwrap(),
            Value::Guid(_)
        ));
        assert!(convert_raw("f", &TypeDesc::Int, "4.5").is_err());
    }

    #[test]
    fn decimals_keep_exact_text() {
        let parse = |raw| convert_raw("price", &TypeDesc::Decimal, raw);
        assert_eq!(parse("0019.9900").unwrap(), Value::Decimal("19.99".to_string()));
        assert_eq!(parse("+0.5").unwrap(), Value::Decimal("0.5".to_string()));
        assert_eq!(parse("-0.00").unwrap(), Value::Decimal("0".to_string()));
        for bad in ["1e3", ".", ".5", "+.5", "5.", "-", "1.2.3"] {
            assert!(parse(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn floats_must_be_finite() {
        let parse = |raw| convert_raw("ratio", &TypeDesc::Float, raw);
        assert_eq!(parse("2.5").unwrap(), Value::Float(2.5));
        for bad in ["NaN", "inf", "-infinity", "1e999"] {
            assert!(
                matches!(parse(bad), Err(BindError::InvalidValue { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn arrays_collect_every_occurrence() {
        let ctx = RequestContext::builder("GET", "http://localhost/?id=1&id=2&id=")
            .expect("url")
            .build();
        let builder = ModelBuilder::default();
        let value = builder
            .get_scalar(&ctx, "id", &TypeDesc::array(TypeDesc::Int))
            .unwrap();
        assert_eq!(value, Some(Value::List(vec![Value::Int(1), Value::Int(2)])));
    }

    #[test]
    fn comma_splitting_is_opt_in() {
        let ctx = RequestContext::builder("GET", "http://localhost/?tags=a,b")
            .expect("url")
            .build();
        let strings = TypeDesc::array(TypeDesc::String);
        let plain = ModelBuilder::default().get_scalar(&ctx, "tags", &strings).unwrap();
        assert_eq!(plain, Some(Value::List(vec![Value::String("a,b".to_string())])));

        let split = ModelBuilder::new(BindOptions {
            split_array_values: true,
            ..BindOptions::default()
        })
        .get_scalar(&ctx, "tags", &strings)
        .unwrap();
        assert_eq!(
            split,
            Some(Value::List(vec![
                Value::String("a".to_string()),
                Value::String("b".to_string())
            ]))
        );
    }

    #[test]
    fn form_wins_over_query_by_default() {
        let ctx = RequestContext::builder("POST", "http://localhost/?name=query")
            .expect("url")
            .form("name", " form ")
            .build();
        let value = ModelBuilder::default()
            .get_scalar(&ctx, "NAME", &TypeDesc::String)
            .unwrap();
        assert_eq!(value, Some(Value::String("form".to_string())));
    }

    #[test]
    fn struct_members_fall_back_to_defaults_then_zero() {
        let ctx = RequestContext::builder("GET", "http://localhost/?street=Main")
            .expect("url")
            .build();
        let address = StructType::new("Address")
            .field("street", TypeDesc::String)
            .field("zip", TypeDesc::option(TypeDesc::Int))
            .field("floor", TypeDesc::Int)
            .field_with_default("country", TypeDesc::String, "NL");
        let param = ParameterDescriptor::new("address", TypeDesc::Struct(address.clone()));
        let value = ModelBuilder::default()
            .construct_compound(&ctx, &param, &TypeDesc::Struct(address))
            .unwrap();
        let Value::Struct { fields, .. } = value else {
            panic!("expected struct");
        };
        assert_eq!(fields["street"], Value::String("Main".to_string()));
        assert_eq!(fields["zip"], Value::Null);
        assert_eq!(fields["floor"], Value::Int(0));
        assert_eq!(fields["country"], Value::String("NL".to_string()));
    }
}
