//! # Error Types
//!
//! This module defines the error taxonomy for score loading and analysis.
//!
//! Errors fall into two classes:
//! - **Fatal** errors abort the load and are returned as `Err(ScoreError)`.
//! - **Recoverable** problems ([`ScoreError::FieldCoercion`]) never abort. They are
//!   collected in a [`Diagnostics`] accumulator while parsing continues with a
//!   fallback value, and end up in `Score::errors`.
//!
//! ## Error Types
//! - `MalformedDocument` - Markup could not be parsed, or the root is not `score-partwise`
//! - `MissingStructure` - The document has no `part-list`
//! - `FieldCoercion` - A numeric or enumerated field was unusable (recoverable)
//! - `Archive` - Bad zip container, missing manifest or missing root entry
//! - `NotFound` - Input path does not exist
//! - `Io` - Any other read failure
//! - `Config` - Invalid YAML configuration
//!
//! ## Usage
//! ```rust
//! use reprise_core::{parse_str, ScoreError};
//!
//! match parse_str("<not-a-score/>") {
//!     Ok(score) => println!("{} parts", score.parts.len()),
//!     Err(e) if e.is_fatal() => eprintln!("cannot load: {}", e),
//!     Err(e) => eprintln!("warning: {}", e),
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    /// The markup is not well-formed, or the root element is not a partwise score.
    ///
    /// # Example
    /// ```
    /// # use reprise_core::ScoreError;
    /// let err = ScoreError::MalformedDocument("unexpected end of stream".to_string());
    /// assert_eq!(err.to_string(), "Malformed document: unexpected end of stream");
    /// ```
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A required structural element is absent (no part roster).
    #[error("Missing structure: {0}")]
    MissingStructure(String),

    /// A field could not be coerced to the expected type.
    ///
    /// Recorded in the diagnostics list; the parser substitutes `fallback`.
    ///
    /// # Example
    /// ```
    /// # use reprise_core::ScoreError;
    /// let err = ScoreError::FieldCoercion {
    ///     field: "divisions".to_string(),
    ///     value: "abc".to_string(),
    ///     fallback: "4".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Invalid divisions 'abc', using 4");
    /// ```
    #[error("Invalid {field} '{value}', using {fallback}")]
    FieldCoercion {
        field: String,
        value: String,
        fallback: String,
    },

    /// The zip container could not be read or does not contain a score.
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ScoreError {
    /// Whether this error aborts loading.
    ///
    /// Only field coercions are recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScoreError::FieldCoercion { .. })
    }
}

impl From<zip::result::ZipError> for ScoreError {
    fn from(err: zip::result::ZipError) -> Self {
        ScoreError::Archive(err.to_string())
    }
}

/// Problems recorded while loading one document.
///
/// One accumulator lives for exactly one parse call. Every entry is also
/// forwarded to the `log` facade at warning level.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a free-form recoverable problem.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.entries.push(message);
    }

    /// Record a field that failed to parse and the value used in its place.
    pub fn coercion(&mut self, field: &str, value: &str, fallback: impl ToString) {
        let err = ScoreError::FieldCoercion {
            field: field.to_string(),
            value: value.to_string(),
            fallback: fallback.to_string(),
        };
        self.warn(err.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_messages(self) -> Vec<String> {
        self.entries
    }
}
