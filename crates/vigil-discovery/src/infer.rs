//! Numeric field inference over a message payload.

use vigil_core::Payload;

/// Collect the dot-paths of every numeric leaf in `payload`.
///
/// A bare numeric body yields the empty path, the same address the
/// extractor resolves back to the root. Array elements are addressed by
/// positional index. Opaque byte leaves, strings, booleans and nulls are
/// non-numeric and contribute nothing.
pub fn infer_numeric_paths(payload: &Payload) -> Vec<String> {
    let mut paths = Vec::new();
    collect(payload, "", &mut paths);
    paths
}

fn collect(value: &Payload, path: &str, paths: &mut Vec<String>) {
    match value {
        Payload::Number(_) => paths.push(path.to_string()),
        Payload::Object(map) => {
            for (key, child) in map {
                collect(child, &join(path, key), paths);
            }
        }
        Payload::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect(child, &join(path, &index.to_string()), paths);
            }
        }
        Payload::Null | Payload::Bool(_) | Payload::String(_) | Payload::Bytes(_) => {}
    }
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}
