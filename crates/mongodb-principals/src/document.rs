//! The self-describing structured documents exchanged with the database.
//!
//! Commands and their responses are plain key/value documents. They are
//! modelled as JSON objects, which preserve field order and carry enough type
//! information to tell strings, booleans, numbers and nested documents apart.

use serde_json::{Map, Value};

/// A structured document, as sent to or received from the database.
pub type Document = Map<String, Value>;

/// Returns a short human readable name for the type of `value`.
///
/// Used in error messages which report that a field had an unexpected type.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "document",
    }
}
