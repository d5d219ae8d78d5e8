//! Domain validation errors

use crate::id::UserId;

/// Validation failures on entity construction or relationship writes
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// A user may not follow themselves; rejected at write time
    #[error("user {0} cannot follow themselves")]
    SelfFollow(UserId),

    /// Article title produced an empty slug
    #[error("title {0:?} produces an empty slug")]
    EmptySlug(String),

    /// Required field was empty
    #[error("field {0} must not be empty")]
    EmptyField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_display() {
        let err = DomainError::EmptyField("username");
        assert!(err.to_string().contains("username"));
    }
}
