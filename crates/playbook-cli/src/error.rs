use playbook::PlaybookError;
use thiserror::Error;

/// Failures surfaced by `playbook-cli` commands
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    #[error("Key point not found: {0}")]
    UnknownKeyPoint(String),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to render TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_point_names_the_id() {
        let err = CliError::UnknownKeyPoint("kpt_042".to_string());
        assert_eq!(err.to_string(), "Key point not found: kpt_042");
    }

    #[test]
    fn test_playbook_errors_pass_through_unchanged() {
        let inner = PlaybookError::Config("bad limits".to_string());
        let expected = inner.to_string();
        let err: CliError = inner.into();
        assert!(matches!(err, CliError::Playbook(_)));
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_json_errors_are_labelled() {
        let inner = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CliError::from(inner);
        assert!(err.to_string().starts_with("Failed to render JSON: "));
    }
}
