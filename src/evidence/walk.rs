use serde_json::Value;

/// Nesting beyond this is not searched.
pub const MAX_WALK_DEPTH: usize = 32;

/// Depth-first search for the first object key equal to `field`.
///
/// At each object the object's own keys are checked before any child is
/// entered; children are visited in document (insertion) order. Arrays are
/// walked element by element.
pub fn find_field<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    find_at(doc, field, 0)
}

fn find_at<'a>(node: &'a Value, field: &str, depth: usize) -> Option<&'a Value> {
    if depth > MAX_WALK_DEPTH {
        return None;
    }
    match node {
        Value::Object(map) => map.get(field).or_else(|| {
            map.values()
                .find_map(|child| find_at(child, field, depth + 1))
        }),
        Value::Array(items) => items
            .iter()
            .find_map(|child| find_at(child, field, depth + 1)),
        _ => None,
    }
}

/// Renders a scalar JSON value as the text a build would have exported:
/// strings verbatim, numbers in their decimal form.
pub fn scalar_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
