use thiserror::Error;

/// Top-level error type shared by the callplan crates.
///
/// Subsystem crates define their own error types and wrap this one, so
/// that storage and configuration failures propagate with `?`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CallplanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl CallplanError {
    pub fn plan_not_found(plan_id: impl Into<String>) -> Self {
        CallplanError::NotFound {
            entity: "Plan",
            id: plan_id.into(),
        }
    }
}

impl From<toml::de::Error> for CallplanError {
    fn from(err: toml::de::Error) -> Self {
        CallplanError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CallplanError {
    fn from(err: toml::ser::Error) -> Self {
        CallplanError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CallplanError {
    fn from(err: serde_json::Error) -> Self {
        CallplanError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for callplan operations.
pub type Result<T> = std::result::Result<T, CallplanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CallplanError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = CallplanError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");

        let err = CallplanError::Validation("duplicate action id a-1".to_string());
        assert_eq!(
            err.to_string(),
            "Validation failed: duplicate action id a-1"
        );
    }

    #[test]
    fn test_plan_not_found_display() {
        let err = CallplanError::plan_not_found("P-404");
        assert_eq!(err.to_string(), "Plan not found: P-404");
        assert!(matches!(err, CallplanError::NotFound { entity: "Plan", .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CallplanError = io_err.into();
        assert!(matches!(err, CallplanError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CallplanError = json_err.into();
        assert!(matches!(err, CallplanError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: CallplanError = toml_err.into();
        assert!(matches!(err, CallplanError::Config(_)));
    }
}
