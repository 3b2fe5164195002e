//! Small shared helpers.

/// Generate a unique identifier with the given prefix, e.g. `project-3f2a...`.
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let a = generate_id("note");
        let b = generate_id("note");
        assert!(a.starts_with("note-"));
        assert_ne!(a, b);
    }
}
