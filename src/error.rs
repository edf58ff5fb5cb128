use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "settings.memory_cache_size", "options")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "key_generator", "tiered_cache", "circuit_breaker")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the cache and resilience layers.
///
/// Variants are grouped by how they should be handled:
/// - `Validation` / `Configuration` are caller mistakes, surfaced synchronously and never retried.
/// - `CircuitOpen` means the call was rejected without touching the dependency.
/// - `Timeout` / `Network` / `RateLimited` / `Unavailable` are transient remote-store conditions.
/// - `Infrastructure` / `Serialization` / `Io` / `Unknown` are genuine failures, always propagated.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    /// Call rejected because the circuit is open; the underlying operation was never attempted.
    #[error("circuit breaker '{breaker}' is open{}", retry_hint(.retry_after_ms))]
    CircuitOpen {
        breaker: String,
        retry_after_ms: Option<u64>,
    },

    #[error("Infrastructure error: {message}{}", format_context(.context))]
    Infrastructure {
        message: String,
        context: ErrorContext,
    },

    #[error("Operation timed out: {message}")]
    Timeout { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown error: {message}{}", format_context(.context))]
    Unknown {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn retry_hint(retry_after_ms: &Option<u64>) -> String {
    match retry_after_ms {
        Some(ms) => format!(" (retry in {}ms)", ms),
        None => String::new(),
    }
}

impl Error {
    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error without context
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error without context
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new infrastructure error with structured context
    pub fn infrastructure_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Infrastructure {
            message: msg.into(),
            context,
        }
    }

    /// Create a new infrastructure error without context
    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Error::Infrastructure {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new unknown error with structured context
    pub fn unknown_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Unknown {
            message: msg.into(),
            context,
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout {
            message: msg.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network {
            message: msg.into(),
        }
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Error::RateLimited {
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::Unavailable {
            message: msg.into(),
        }
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Error::Authentication {
            message: msg.into(),
        }
    }

    /// True when this error is a circuit-breaker rejection rather than a genuine failure.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. }
            | Error::Configuration { context, .. }
            | Error::Infrastructure { context, .. }
            | Error::Unknown { context, .. } => Some(context),
            _ => None,
        }
    }
}
