use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsmsError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid reading: current reading {current} is below previous reading {previous}")]
    InvalidReading { previous: u64, current: u64 },

    #[error("Tariff configuration error: {0}")]
    Configuration(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Insufficient permissions: role '{role}' may not {action}")]
    Forbidden { role: &'static str, action: &'static str },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WsmsError {
    /// Stable machine-readable name, used by the operator protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_)            => "database",
            Self::Serialization(_)       => "serialization",
            Self::InvalidReading { .. }  => "invalid_reading",
            Self::Configuration(_)       => "configuration",
            Self::Conflict(_)            => "conflict",
            Self::NotFound { .. }        => "not_found",
            Self::Forbidden { .. }       => "forbidden",
            Self::Validation(_)          => "validation",
            Self::Other(_)               => "internal",
        }
    }

    /// True when the caller can fix the request and try again.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidReading { .. }
                | Self::Conflict(_)
                | Self::NotFound { .. }
                | Self::Forbidden { .. }
                | Self::Validation(_)
        )
    }
}

pub type WsmsResult<T> = Result<T, WsmsError>;
