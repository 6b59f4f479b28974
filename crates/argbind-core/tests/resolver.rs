use std::sync::Arc;
use std::thread;

use argbind_core::{
    ConverterRegistry, HttpFile, ModelBuilder, ParameterDescriptor, ParameterResolver,
    RequestContext, RuntimeEnvironment, TypeDesc, Value, register_converter,
};
use argbind_rt::{EnumType, StructType};

fn context() -> Arc<RequestContext> {
    RequestContext::builder("POST", "https://shop.example/orders?queryString=raw&page=3")
        .expect("url")
        .form("name", "Ada")
        .form("week", "Thursday")
        .header("User-Agent", "probe/1.0")
        .file(HttpFile {
            field_name: "invoice".to_string(),
            file_name: "invoice.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            content: b"%PDF".to_vec(),
        })
        .build()
}

#[test]
fn void_markers_skip_regardless_of_request() {
    let resolver = ParameterResolver::new();
    let marker = ParameterDescriptor::void_marker("overload");
    assert_eq!(resolver.resolve(&context(), &marker).unwrap(), Value::Skip);

    let empty = RequestContext::builder("GET", "http://localhost/")
        .expect("url")
        .build();
    assert_eq!(resolver.resolve(&empty, &marker).unwrap(), Value::Skip);
}

#[test]
fn context_parameters_receive_the_same_context() {
    let ctx = context();
    let value = ParameterResolver::new()
        .resolve(&ctx, &ParameterDescriptor::new("ctx", TypeDesc::Context))
        .unwrap();
    let Value::Context(bound) = value else {
        panic!("expected context, got {value:?}");
    };
    assert!(Arc::ptr_eq(&bound, &ctx));
}

#[test]
fn query_string_collection_only_binds_when_typed_as_collection() {
    let ctx = context();
    let resolver = ParameterResolver::new();

    let value = resolver
        .resolve(&ctx, &ParameterDescriptor::new("QUERYSTRING", TypeDesc::NameValues))
        .unwrap();
    let Value::Collection(coll) = value else {
        panic!("expected collection, got {value:?}");
    };
    assert!(Arc::ptr_eq(&coll, &ctx.request.query_string));

    let value = resolver
        .resolve(&ctx, &ParameterDescriptor::new("queryString", TypeDesc::String))
        .unwrap();
    assert_eq!(value, Value::String("raw".to_string()));
}

#[test]
fn missing_value_types_fail_and_nullable_ones_bind_null() {
    let resolver = ParameterResolver::new();
    let ctx = context();

    let err = resolver
        .resolve(&ctx, &ParameterDescriptor::new("id", TypeDesc::Int))
        .unwrap_err();
    assert_eq!(err.code(), "missing_required_value");
    assert_eq!(err.param(), "id");

    let value = resolver
        .resolve(&ctx, &ParameterDescriptor::new("id", TypeDesc::option(TypeDesc::Int)))
        .unwrap();
    assert_eq!(value, Value::Null);

    let value = resolver
        .resolve(&ctx, &ParameterDescriptor::new("nickname", TypeDesc::String))
        .unwrap();
    assert_eq!(value, Value::Null);
}

#[test]
fn scalars_and_enums_bind_from_fields() {
    let week = TypeDesc::Enum(EnumType::with_variants(
        "Week",
        ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday"],
    ));
    let params = [
        ParameterDescriptor::new("name", TypeDesc::String),
        ParameterDescriptor::new("page", TypeDesc::Int),
        ParameterDescriptor::new("week", week),
    ];
    let values = ParameterResolver::new()
        .resolve_all(&context(), &params)
        .unwrap();
    assert_eq!(values[0], Value::String("Ada".to_string()));
    assert_eq!(values[1], Value::Int(3));
    assert!(matches!(&values[2], Value::Enum { variant, ordinal: 4, .. } if variant == "Thursday"));
}

#[test]
fn registered_converter_output_is_returned_unmodified() {
    #[derive(Debug, PartialEq)]
    struct Tenant {
        slug: String,
    }

    let ty = TypeDesc::Custom("resolver_tests::Tenant".to_string());
    register_converter(&ty, |ctx, _| {
        let slug = ctx.request.url.host_str().unwrap_or_default().to_string();
        Ok(Value::opaque("resolver_tests::Tenant", Tenant { slug }))
    });

    let value = ParameterResolver::new()
        .resolve(&context(), &ParameterDescriptor::new("tenant", TypeDesc::option(ty)))
        .unwrap();
    let Value::Opaque(opaque) = value else {
        panic!("expected opaque value, got {value:?}");
    };
    assert_eq!(
        opaque.downcast_ref::<Tenant>(),
        Some(&Tenant {
            slug: "shop.example".to_string()
        })
    );
}

#[test]
fn converters_see_the_descriptor_and_may_fail() {
    let registry = ConverterRegistry::new();
    let ty = TypeDesc::Custom("Signature".to_string());
    registry.register(&ty, |_, param| {
        Err::<Value, _>(argbind_core::BindError::configuration(
            param.name(),
            "signature header missing",
        ))
    });
    let resolver = ParameterResolver::with_parts(&registry, ModelBuilder::default());
    let err = resolver
        .resolve(&context(), &ParameterDescriptor::new("sig", ty))
        .unwrap_err();
    assert_eq!(err.to_string(), "parameter `sig`: signature header missing");
}

#[test]
fn uploaded_files_bind_through_seeded_converters() {
    let resolver = ParameterResolver::new();
    let value = resolver
        .resolve(&context(), &ParameterDescriptor::new("invoice", TypeDesc::File))
        .unwrap();
    assert!(matches!(value, Value::File(ref file) if file.file_name == "invoice.pdf"));

    let value = resolver
        .resolve(&context(), &ParameterDescriptor::new("receipt", TypeDesc::File))
        .unwrap();
    assert_eq!(value, Value::Null);
}

#[test]
fn expressions_bind_request_and_runtime_values() {
    let resolver = ParameterResolver::new();
    let ctx = context();

    let scheme = ParameterDescriptor::new("scheme", TypeDesc::String).bound_to("Request.Url.Scheme");
    assert_eq!(
        resolver.resolve(&ctx, &scheme).unwrap(),
        Value::String("https".to_string())
    );

    let bogus = ParameterDescriptor::new("bogus", TypeDesc::String)
        .bound_to("RuntimeEnvironment.NoSuchProperty");
    let err = resolver.resolve(&ctx, &bogus).unwrap_err();
    assert_eq!(err.code(), "configuration_error");
    let message = err.to_string();
    assert!(message.contains("`bogus`"), "{message}");
    assert!(message.contains("RuntimeEnvironment.NoSuchProperty"), "{message}");
}

#[test]
fn expressions_use_the_context_environment() {
    let env = RuntimeEnvironment {
        app_name: "billing".to_string(),
        ..RuntimeEnvironment::from_lookup(|_| None)
    };
    let ctx = RequestContext::builder("GET", "http://localhost/")
        .expect("url")
        .environment(Arc::new(env))
        .build();
    let param = ParameterDescriptor::new("app", TypeDesc::String).bound_to("RuntimeEnvironment.AppName");
    assert_eq!(
        ParameterResolver::new().resolve(&ctx, &param).unwrap(),
        Value::String("billing".to_string())
    );
}

#[test]
fn nested_compound_members_fail_before_binding() {
    let address = StructType::new("Address").field("street", TypeDesc::String);
    let customer = StructType::new("Customer")
        .field("name", TypeDesc::String)
        .field("address", TypeDesc::Struct(address));
    let err = ParameterResolver::new()
        .resolve(
            &context(),
            &ParameterDescriptor::new("customer", TypeDesc::Struct(customer)),
        )
        .unwrap_err();
    assert_eq!(err.code(), "configuration_error");
    assert!(err.to_string().contains("nested compound"), "{err}");
}

#[test]
fn struct_array_members_are_nested_compounds() {
    let line = StructType::new("Line").field("sku", TypeDesc::String);
    let address = StructType::new("Address").field("street", TypeDesc::String);
    let order = StructType::new("Order")
        .field("name", TypeDesc::String)
        .field("lines", TypeDesc::array(TypeDesc::Struct(line)))
        .field("address", TypeDesc::Struct(address));
    let err = ParameterResolver::new()
        .resolve(&context(), &ParameterDescriptor::new("order", TypeDesc::Struct(order)))
        .unwrap_err();
    assert_eq!(err.code(), "configuration_error");
    assert_eq!(err.param(), "order");
    let message = err.to_string();
    assert!(message.contains("member `lines` of Order"), "{message}");
    assert!(message.contains("nested compound"), "{message}");
}

#[test]
fn flat_compounds_bind_member_by_member() {
    let order = StructType::new("OrderFilter")
        .field("name", TypeDesc::String)
        .field("page", TypeDesc::Int)
        .field("limit", TypeDesc::option(TypeDesc::Int));
    let value = ParameterResolver::new()
        .resolve(&context(), &ParameterDescriptor::new("filter", TypeDesc::Struct(order)))
        .unwrap();
    let Value::Struct { name, fields } = value else {
        panic!("expected struct, got {value:?}");
    };
    assert_eq!(name, "OrderFilter");
    assert_eq!(fields["name"], Value::String("Ada".to_string()));
    assert_eq!(fields["page"], Value::Int(3));
    assert_eq!(fields["limit"], Value::Null);
}

#[test]
fn unknown_custom_types_are_configuration_errors() {
    let registry = ConverterRegistry::new();
    let resolver = ParameterResolver::with_parts(&registry, ModelBuilder::default());
    let err = resolver
        .resolve(
            &context(),
            &ParameterDescriptor::new("point", TypeDesc::Custom("GeoPoint".to_string())),
        )
        .unwrap_err();
    assert_eq!(err.code(), "configuration_error");
}

#[test]
fn output_parameters_abort_the_signature() {
    let params = [
        ParameterDescriptor::new("name", TypeDesc::String),
        ParameterDescriptor::new("count", TypeDesc::Int).output(),
    ];
    let err = ParameterResolver::new()
        .resolve_all(&context(), &params)
        .unwrap_err();
    assert_eq!(err.code(), "unsupported_capability");
    assert_eq!(err.param(), "count");
}

#[test]
fn concurrent_resolution_sees_registrations() {
    let ty = TypeDesc::Custom("resolver_tests::Shard".to_string());
    register_converter(&ty, |_, _| Ok(7i64));
    let ctx = context();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let ty = ty.clone();
            thread::spawn(move || {
                let resolver = ParameterResolver::new();
                resolver.resolve(&ctx, &ParameterDescriptor::new("shard", ty))
            })
        })
        .collect();
    for handle in handles {
        let value = handle.join().expect("thread").expect("resolve");
        assert_eq!(value, Value::Int(7));
    }
}
