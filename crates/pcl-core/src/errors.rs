//! Structured error and warning types shared across the estimator crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`PclError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (lmax values, shapes, hashes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the pseudo-Cl estimator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum PclError {
    /// Inconsistent or invalid configuration (lmax, convention, binning).
    #[error("configuration error: {0}")]
    Config(ErrorInfo),
    /// Numerical instability such as a near-singular coupling matrix.
    #[error("numerical error: {0}")]
    Numerical(ErrorInfo),
    /// Degenerate inputs (all-zero windows, empty binning schemes).
    #[error("degenerate input: {0}")]
    Degenerate(ErrorInfo),
    /// Pixelization mismatches or operations unsupported by a pixelization.
    #[error("geometry error: {0}")]
    Geometry(ErrorInfo),
    /// Serialization, parsing and file system errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl PclError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            PclError::Config(info)
            | PclError::Numerical(info)
            | PclError::Degenerate(info)
            | PclError::Geometry(info)
            | PclError::Serde(info) => info,
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(code: &str, message: impl Into<String>) -> Self {
        PclError::Config(ErrorInfo::new(code, message))
    }

    /// Shorthand for a numerical-instability error.
    pub fn numerical(code: &str, message: impl Into<String>) -> Self {
        PclError::Numerical(ErrorInfo::new(code, message))
    }

    /// Shorthand for a degenerate-input error.
    pub fn degenerate(code: &str, message: impl Into<String>) -> Self {
        PclError::Degenerate(ErrorInfo::new(code, message))
    }

    /// Shorthand for a geometry error.
    pub fn geometry(code: &str, message: impl Into<String>) -> Self {
        PclError::Geometry(ErrorInfo::new(code, message))
    }

    /// Shorthand for a serialization or I/O error.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        PclError::Serde(ErrorInfo::new(code, err.to_string()))
    }
}

/// Non-fatal condition observed while producing a result.
///
/// Warnings travel next to the value they qualify and are mirrored to the
/// `log` facade when created through [`Warning::emit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Stable machine readable warning code.
    pub code: String,
    /// Human readable description.
    pub message: String,
}

impl Warning {
    /// Creates the warning and forwards it to `log::warn!`.
    pub fn emit(code: impl Into<String>, message: impl Into<String>) -> Self {
        let warning = Self {
            code: code.into(),
            message: message.into(),
        };
        log::warn!("{} ({})", warning.message, warning.code);
        warning
    }
}
