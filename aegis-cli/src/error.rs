use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("malformed input: {0}")]
    Input(String),
    #[error("input rejected with {errors} syntax error(s)")]
    Syntax { errors: usize },
    #[error("check failed with {errors} error(s)")]
    CheckFailed { errors: usize },
    #[error("run failed with {errors} error(s)")]
    RuntimeFailed { errors: usize },
    #[error("cannot encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::CheckFailed { .. } => 2,
            CliError::RuntimeFailed { .. } => 3,
            CliError::Read { .. }
            | CliError::Write { .. }
            | CliError::Config(_)
            | CliError::Input(_)
            | CliError::Syntax { .. }
            | CliError::Json(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::CheckFailed { errors: 1 }.exit_code(), 2);
        assert_eq!(CliError::RuntimeFailed { errors: 1 }.exit_code(), 3);
        assert_eq!(CliError::Input("x".into()).exit_code(), 1);
        assert_eq!(
            CliError::Config(ConfigError::Invalid("x".into())).exit_code(),
            1
        );
    }
}
