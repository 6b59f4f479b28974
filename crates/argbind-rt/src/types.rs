use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDesc {
    Bool,
    Int,
    Float,
    /// Exact decimal number, carried as normalized text.
    Decimal,
    Char,
    String,
    DateTime,
    Guid,
    Enum(EnumType),
    File,
    Array(Box<TypeDesc>),
    Option(Box<TypeDesc>),
    Struct(StructType),
    Custom(String),
    Context,
    NameValues,
    Any,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructField {
    pub name: String,
    pub ty: TypeDesc,
    pub default: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<StructField>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumVariant {
    pub name: String,
    pub ordinal: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub variants: Vec<EnumVariant>,
}

impl EnumType {
    pub fn with_variants<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let variants = variants
            .into_iter()
            .enumerate()
            .map(|(idx, name)| EnumVariant {
                name: name.into(),
                ordinal: idx as i64,
            })
            .collect();
        Self {
            name: name.into(),
            variants,
        }
    }

    pub fn variant_named(&self, name: &str) -> Option<&EnumVariant> {
        self.variants
            .iter()
            .find(|variant| variant.name.eq_ignore_ascii_case(name))
    }

    pub fn variant_with_ordinal(&self, ordinal: i64) -> Option<&EnumVariant> {
        self.variants
            .iter()
            .find(|variant| variant.ordinal == ordinal)
    }
}

impl StructType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeDesc) -> Self {
        self.fields.push(StructField {
            name: name.into(),
            ty,
            default: None,
        });
        self
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        ty: TypeDesc,
        default: impl Into<String>,
    ) -> Self {
        self.fields.push(StructField {
            name: name.into(),
            ty,
            default: Some(default.into()),
        });
        self
    }
}

/// Registry key of a type. Nullable wrappers are part of the key, so callers
/// normalize with [`TypeDesc::real_type`] before keying.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(String);

impl TypeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key().as_str())
    }
}

impl TypeDesc {
    pub fn option(inner: TypeDesc) -> Self {
        TypeDesc::Option(Box::new(inner))
    }

    pub fn array(elem: TypeDesc) -> Self {
        TypeDesc::Array(Box::new(elem))
    }

    pub fn key(&self) -> TypeKey {
        TypeKey(self.key_string())
    }

    fn key_string(&self) -> String {
        match self {
            TypeDesc::Bool => "Bool".to_string(),
            TypeDesc::Int => "Int".to_string(),
            TypeDesc::Float => "Float".to_string(),
            TypeDesc::Decimal => "Decimal".to_string(),
            TypeDesc::Char => "Char".to_string(),
            TypeDesc::String => "String".to_string(),
            TypeDesc::DateTime => "DateTime".to_string(),
            TypeDesc::Guid => "Guid".to_string(),
            TypeDesc::Enum(ty) => ty.name.clone(),
            TypeDesc::File => "File".to_string(),
            TypeDesc::Array(elem) => format!("{}[]", elem.key_string()),
            TypeDesc::Option(inner) => format!("{}?", inner.key_string()),
            TypeDesc::Struct(ty) => ty.name.clone(),
            TypeDesc::Custom(name) => name.clone(),
            TypeDesc::Context => "Context".to_string(),
            TypeDesc::NameValues => "NameValues".to_string(),
            TypeDesc::Any => "Any".to_string(),
        }
    }

    pub fn real_type(&self) -> &TypeDesc {
        match self {
            TypeDesc::Option(inner) => inner.real_type(),
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, TypeDesc::Option(_))
    }

    /// Value types cannot hold null unless wrapped in `Option`.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            TypeDesc::Bool
                | TypeDesc::Int
                | TypeDesc::Float
                | TypeDesc::Decimal
                | TypeDesc::Char
                | TypeDesc::DateTime
                | TypeDesc::Guid
                | TypeDesc::Enum(_)
        )
    }

    pub fn is_scalar(&self) -> bool {
        self.is_value_type() || matches!(self, TypeDesc::String)
    }

    /// Types the model builder reads directly from one named request field.
    pub fn is_supportable(&self) -> bool {
        match self.real_type() {
            TypeDesc::Array(elem) => elem.real_type().is_scalar(),
            other => other.is_scalar(),
        }
    }

    /// User-defined multi-member types, also when used as an array element.
    pub fn is_compound(&self) -> bool {
        match self.real_type() {
            TypeDesc::Struct(_) | TypeDesc::Custom(_) => true,
            TypeDesc::Array(elem) => elem.is_compound(),
            _ => false,
        }
    }
}

/// Parses a type reference such as `int`, `string[]`, `Week?` or `int[]?`.
///
/// Built-in names are case-insensitive. Any other name goes through `named`;
/// names it does not know become [`TypeDesc::Custom`].
pub fn parse_type_ref<F>(raw: &str, named: &mut F) -> Result<TypeDesc, String>
where
    F: FnMut(&str) -> Result<Option<TypeDesc>, String>,
{
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty type reference".to_string());
    }
    if let Some(inner) = raw.strip_suffix('?') {
        let inner = parse_type_ref(inner, named)?;
        if inner.is_nullable() {
            return Err(format!("type `{raw}` is nullable twice"));
        }
        return Ok(TypeDesc::option(inner));
    }
    if let Some(elem) = raw.strip_suffix("[]") {
        return Ok(TypeDesc::array(parse_type_ref(elem, named)?));
    }
    if !raw
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
    {
        return Err(format!("invalid type reference `{raw}`"));
    }
    let builtin = match raw.to_ascii_lowercase().as_str() {
        "bool" => Some(TypeDesc::Bool),
        "int" => Some(TypeDesc::Int),
        "float" => Some(TypeDesc::Float),
        "decimal" => Some(TypeDesc::Decimal),
        "char" => Some(TypeDesc::Char),
        "string" => Some(TypeDesc::String),
        "datetime" => Some(TypeDesc::DateTime),
        "guid" => Some(TypeDesc::Guid),
        "file" => Some(TypeDesc::File),
        "context" => Some(TypeDesc::Context),
        "namevalues" => Some(TypeDesc::NameValues),
        "any" => Some(TypeDesc::Any),
        _ => None,
    };
    if let Some(ty) = builtin {
        return Ok(ty);
    }
    Ok(named(raw)?.unwrap_or_else(|| TypeDesc::Custom(raw.to_string())))
}
