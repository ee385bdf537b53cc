//! Core types for framedb
//!
//! This crate defines the value model shared by the store driver layer and
//! the document-mapping layer:
//! - Value / Document: what a schemaless store holds
//! - ObjectId: the store-native identifier
//! - FieldError / ValidationErrors: accumulated validation failures

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod oid;
pub mod value;

pub use error::{BatchItemErrors, FieldError, ValidationErrors};
pub use oid::{ObjectId, ObjectIdParseError};
pub use value::{date_to_midnight, document_from_json, float_to_i64, get_path, Document, Value};

/// Build a [`Document`] from `key => value` pairs
///
/// ```
/// use framedb_core::{doc, Value};
///
/// let d = doc! { "name" => "Ada", "age" => 36 };
/// assert_eq!(d["age"], Value::Int(36));
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut document = $crate::Document::new();
        $(
            document.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        document
    }};
}
