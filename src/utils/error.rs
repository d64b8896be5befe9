use thiserror::Error;

/// How far an error is allowed to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Aborts the current pipeline run; the scheduler keeps going.
    FatalTask,
    /// Drops a single scraped record; the scraper keeps going.
    Record,
    /// Bad settings or queries; the scheduler refuses to enable or fire.
    Configuration,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error while fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Mail delivery failed: {0}")]
    Mail(String),

    #[error("Queries unavailable: {0}")]
    QueriesUnavailable(String),

    #[error("Plugin load error: {module}: {message}")]
    PluginLoad { module: String, message: String },

    #[error("Skipping record: {0}")]
    SkipRecord(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown record attribute: {key}")]
    UnknownAttribute { key: String },

    #[error("Scheduler cannot be enabled: {0}")]
    ConfigInvalid(String),
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Io(_)
            | AppError::Network { .. }
            | AppError::Mail(_)
            | AppError::QueriesUnavailable(_)
            | AppError::PluginLoad { .. } => ErrorClass::FatalTask,
            AppError::SkipRecord(_) => ErrorClass::Record,
            AppError::InvalidConfig(_)
            | AppError::UnknownAttribute { .. }
            | AppError::ConfigInvalid(_) => ErrorClass::Configuration,
        }
    }

    /// Pipeline stage the error usually comes from, for log context.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::QueriesUnavailable(_) => "queries",
            AppError::PluginLoad { .. } => "discovery",
            AppError::Network { .. } | AppError::UnknownAttribute { .. } | AppError::SkipRecord(_) => "collect",
            AppError::Mail(_) => "mail",
            AppError::Io(_) | AppError::InvalidConfig(_) | AppError::ConfigInvalid(_) => "setup",
        }
    }

    pub fn network(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AppError::Network {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub fn plugin_load(module: impl Into<String>, err: impl std::fmt::Display) -> Self {
        AppError::PluginLoad {
            module: module.into(),
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidConfig(format!("{}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::InvalidConfig(err.to_string())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::Mail(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::Mail(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::Mail(format!("invalid address: {}", err))
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
