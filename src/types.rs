// Shared error types

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service gateway error: {0}")]
    Gateway(String),

    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::InvalidAmount("abc".to_string());
        assert_eq!(err.to_string(), "Invalid amount: abc");

        let err = AppError::Unsupported("network switch".to_string());
        assert_eq!(err.to_string(), "Unsupported operation: network switch");
    }
}
