//! Application error type.
//!
//! Every fallible operation in the crate returns `Result<_, AppError>`. The exit
//! code doubles as a coarse error category so the binary can surface it directly:
//!
//! - `2`: invalid configuration, bad input, or I/O failure
//! - `3`: insufficient data (no samples, empty training subset)
//! - `4`: computation or structural failure (feature/grid mismatch)

/// Invalid configuration, input, or I/O.
pub const EXIT_INVALID_INPUT: u8 = 2;
/// Not enough data to fit a model.
pub const EXIT_INSUFFICIENT_DATA: u8 = 3;
/// Structural mismatch or numerical failure.
pub const EXIT_COMPUTATION: u8 = 4;

#[derive(Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INVALID_INPUT, message)
    }

    pub fn insufficient_data(message: impl Into<String>) -> Self {
        Self::new(EXIT_INSUFFICIENT_DATA, message)
    }

    pub fn computation(message: impl Into<String>) -> Self {
        Self::new(EXIT_COMPUTATION, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
