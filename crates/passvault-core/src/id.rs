//! Identifier normalization.
//!
//! Every id is reduced to a lower-cased, `/`-separated relative path with `.` and `..`
//! segments resolved against a virtual root. The result can never climb out of the store
//! namespace, and two ids address the same entry iff their normalized forms are equal.

/// Replace all backward slashes with forward slashes.
pub fn normalize_separator(input: &str) -> String {
    input.replace('\\', "/")
}

/// Canonical form of a caller-supplied id. An id without any path segment left after
/// resolution normalizes to `"."`.
pub fn normalize_id(id: &str) -> String {
    let lowered = normalize_separator(&id.to_lowercase());

    let mut segments: Vec<&str> = Vec::new();
    for segment in lowered.split('/') {
        match segment {
            "" | "." => {}
            // `..` at the virtual root stays at the root.
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        ".".to_string()
    } else {
        segments.join("/")
    }
}
