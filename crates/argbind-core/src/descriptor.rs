use argbind_rt::TypeDesc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterDescriptor {
    name: String,
    declared_type: TypeDesc,
    is_output: bool,
    bound_expression: Option<String>,
    is_void_marker: bool,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, declared_type: TypeDesc) -> Self {
        Self {
            name: name.into(),
            declared_type,
            is_output: false,
            bound_expression: None,
            is_void_marker: false,
        }
    }

    /// Placeholder parameter used only to tell overloads apart.
    pub fn void_marker(name: impl Into<String>) -> Self {
        Self {
            is_void_marker: true,
            ..Self::new(name, TypeDesc::Any)
        }
    }

    pub fn output(mut self) -> Self {
        self.is_output = true;
        self
    }

    pub fn bound_to(mut self, expression: impl Into<String>) -> Self {
        self.bound_expression = Some(expression.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &TypeDesc {
        &self.declared_type
    }

    pub fn is_output(&self) -> bool {
        self.is_output
    }

    pub fn bound_expression(&self) -> Option<&str> {
        self.bound_expression.as_deref()
    }

    pub fn is_void_marker(&self) -> bool {
        self.is_void_marker
    }
}
