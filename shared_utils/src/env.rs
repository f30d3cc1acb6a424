use std::str::FromStr;

use thiserror::Error;

/// An environment variable required by the application is missing or unusable.
#[derive(Debug, Error)]
pub enum EnvVarError {
    /// The variable is not set.
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but could not be parsed into the requested type.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Raw value as read from the environment.
        value: String,
    },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values are treated as missing.
pub fn get_env_var(name: &str) -> Result<String, EnvVarError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(EnvVarError::Missing(name.to_string())),
    }
}

/// Reads an optional environment variable. Unset and empty both yield `None`.
pub fn get_env_var_opt(name: &str) -> Option<String> {
    get_env_var(name).ok()
}

/// Reads and parses an optional environment variable.
///
/// Returns `Ok(None)` when the variable is unset, and an [`EnvVarError::Invalid`]
/// when it is set to something `T` cannot parse.
pub fn parse_env_var<T: FromStr>(name: &str) -> Result<Option<T>, EnvVarError> {
    match get_env_var_opt(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| EnvVarError::Invalid {
                name: name.to_string(),
                value: raw,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_is_reported_by_name() {
        let err = get_env_var("SHARED_UTILS_SURELY_UNSET_VAR").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHARED_UTILS_SURELY_UNSET_VAR"
        );
    }

    #[test]
    fn unset_variable_parses_to_none() {
        let got: Option<u32> = parse_env_var("SHARED_UTILS_SURELY_UNSET_VAR").unwrap();
        assert!(got.is_none());
    }
}
