//! UUID utilities

use uuid::Uuid;

/// Generate a new UUIDv4 for a ballot edit
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(generate(), generate());
        assert_eq!(generate().get_version_num(), 4);
    }
}
