//! Error types and handling for `rainwatch`

use thiserror::Error;

/// Main error type for the `rainwatch` application
#[derive(Error, Debug)]
pub enum RainwatchError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid places file or other invalid input
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// The observation credential is not set
    #[error("Missing credential: {variable} is not set")]
    MissingCredential { variable: String },

    /// Transport level failures (connect, timeout, body read)
    #[error("Network error: {message}")]
    Network { message: String },

    /// Upstream answered with an error status
    #[error("API error{}: {message}", status_suffix(.status))]
    Api { status: Option<u16>, message: String },

    /// Upstream rejected the credential
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// Upstream throttled the request
    #[error("Rate limit error: {message}")]
    RateLimit { message: String },

    /// Upstream payload did not match the expected schema
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// HTML generation failed
    #[error("Render error: {message}")]
    Render { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl RainwatchError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn missing_credential<S: Into<String>>(variable: S) -> Self {
        Self::MissingCredential {
            variable: variable.into(),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new API error with the upstream status code
    pub fn api<S: Into<String>>(status: Option<u16>, message: S) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn rate_limit<S: Into<String>>(message: S) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn render<S: Into<String>>(message: S) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RainwatchError::Config { .. } => {
                "Configuration error. Please check your config file.".to_string()
            }
            RainwatchError::Validation { message } => format!("Invalid input: {message}"),
            RainwatchError::MissingCredential { variable } => {
                format!("Observation data is disabled because {variable} is not set.")
            }
            RainwatchError::Network { .. } => {
                "Unable to connect to the weather services.".to_string()
            }
            RainwatchError::Api { .. } | RainwatchError::Parse { .. } => {
                "The weather service returned unexpected data.".to_string()
            }
            RainwatchError::Authentication { .. } => {
                "The weather service rejected the configured credential.".to_string()
            }
            RainwatchError::RateLimit { .. } => {
                "The weather service is throttling requests. Try again later.".to_string()
            }
            RainwatchError::Render { .. } => "The page could not be rendered.".to_string(),
            RainwatchError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

impl From<reqwest::Error> for RainwatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RainwatchError::parse(err.to_string())
        } else if let Some(status) = err.status() {
            RainwatchError::api(Some(status.as_u16()), err.to_string())
        } else {
            RainwatchError::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RainwatchError {
    fn from(err: serde_json::Error) -> Self {
        RainwatchError::parse(err.to_string())
    }
}
