//! Data-to-graph field binding.

use serde_json::Value;

use mediaforge_protocols::{FieldBinding, GenerationData};

/// Apply every binding to the template, in declaration order.
///
/// Bindings are a merge: an unmet condition or an absent source value leaves
/// the template's existing value untouched.
pub fn apply_bindings(template: &mut Value, bindings: &[FieldBinding], data: &GenerationData) {
    for binding in bindings {
        if let Some(condition) = &binding.condition {
            if !condition.evaluate(data) {
                continue;
            }
        }
        let resolved = match (&binding.literal, &binding.source) {
            (Some(literal), _) => Some(literal.clone()),
            (None, Some(source)) => data.get(source).cloned(),
            (None, None) => None,
        };
        let Some(mut value) = resolved else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if binding.prefix.is_some() || binding.postfix.is_some() {
            let text = value_text(&value);
            value = Value::String(format!(
                "{}{}{}",
                binding.prefix.as_deref().unwrap_or(""),
                text,
                binding.postfix.as_deref().unwrap_or("")
            ));
        }
        write_path(template, &binding.target_path, value);
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write a value at a nested key path, creating intermediate objects.
fn write_path(root: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = root;
    for key in parents {
        if !cursor.is_object() {
            *cursor = Value::Object(serde_json::Map::new());
        }
        let Some(object) = cursor.as_object_mut() else {
            return;
        };
        cursor = object
            .entry(key.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !cursor.is_object() {
        *cursor = Value::Object(serde_json::Map::new());
    }
    if let Some(object) = cursor.as_object_mut() {
        object.insert(last.clone(), value);
    }
}
