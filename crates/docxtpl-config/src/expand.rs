//! Environment variable expansion for configuration strings.

use std::borrow::Cow;

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// `field` names the configuration key in error messages.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    shellexpand::env(value)
        .map(Cow::into_owned)
        .map_err(|err| ConfigError::EnvVar {
            field: field.to_owned(),
            message: format!("${{{}}} not set", err.var_name),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_unchanged() {
        assert_eq!(expand_env("images", "images.dir").unwrap(), "images");
    }

    #[test]
    fn test_default_used_when_unset() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("DOCXTPL_EXPAND_UNSET");
        }
        assert_eq!(
            expand_env("${DOCXTPL_EXPAND_UNSET:-assets}/img", "images.dir").unwrap(),
            "assets/img"
        );
    }

    #[test]
    fn test_missing_var_names_field() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("DOCXTPL_EXPAND_MISSING");
        }
        let err = expand_env("${DOCXTPL_EXPAND_MISSING}", "images.dir").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable error in images.dir: ${DOCXTPL_EXPAND_MISSING} not set"
        );
    }
}
