use serde::Deserialize;
use std::fmt::{self, Display};
use thiserror::Error;

pub type TransportError = anyhow::Error;

/// Failure talking to the remote platform.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The server answered with a non-success status.
    ///
    /// `body` is always the raw response text, `code` is only present when
    /// the body was a structured error document.
    #[error("request failed with status {status}: {body}")]
    Response {
        status: u16,
        code: Option<ErrorCode>,
        body: String,
    },
    #[error("an error ocurred while talking to the server: {0:?}")]
    Transport(#[from] TransportError),
}

impl RemoteError {
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            RemoteError::Response { code, .. } => code.as_ref(),
            RemoteError::Transport(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ErrorCode {
    ResourceAlreadyExists,
    ResourceDoesNotExist,
    InvalidParameterValue,
    Unknown(String),
}

impl From<&str> for ErrorCode {
    fn from(value: &str) -> Self {
        match value {
            "RESOURCE_ALREADY_EXISTS" => ErrorCode::ResourceAlreadyExists,
            "RESOURCE_DOES_NOT_EXIST" => ErrorCode::ResourceDoesNotExist,
            "INVALID_PARAMETER_VALUE" => ErrorCode::InvalidParameterValue,
            _ => ErrorCode::Unknown(value.to_owned()),
        }
    }
}

impl From<String> for ErrorCode {
    fn from(value: String) -> Self {
        ErrorCode::from(value.as_str())
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::ResourceAlreadyExists => f.write_str("RESOURCE_ALREADY_EXISTS"),
            ErrorCode::ResourceDoesNotExist => f.write_str("RESOURCE_DOES_NOT_EXIST"),
            ErrorCode::InvalidParameterValue => f.write_str("INVALID_PARAMETER_VALUE"),
            ErrorCode::Unknown(code) => f.write_str(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;

    #[test]
    fn parse_error_codes() {
        let known = serde_json::from_str::<ErrorCode>(r#""RESOURCE_DOES_NOT_EXIST""#).unwrap();
        assert_eq!(known, ErrorCode::ResourceDoesNotExist);
        let unknown = serde_json::from_str::<ErrorCode>(r#""invalid error code""#).unwrap();
        assert_eq!(unknown, ErrorCode::Unknown("invalid error code".to_string()));
        assert_eq!(unknown.to_string(), "invalid error code");
    }
}
