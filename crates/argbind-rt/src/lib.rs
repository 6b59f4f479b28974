pub mod config;
pub mod error;
pub mod log;
pub mod types;

pub use config::{BindOptions, FieldSource};
pub use error::{BindError, BindResult};
pub use types::{EnumType, EnumVariant, StructField, StructType, TypeDesc, TypeKey};
