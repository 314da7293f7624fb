use std::path::PathBuf;

use thiserror::Error;

/// The failure categories raised while importing, loading or saving a mesh.
///
/// These are carried inside an `anyhow::Error` so callers that care can
/// `downcast_ref::<ExchangeError>()` and everyone else can just use `?`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    /// A required file of a file-set does not exist.
    #[error("required file `{}` does not exist", .0.display())]
    MissingFile(PathBuf),

    /// A header field, literal marker or record did not match the format.
    #[error("{}{}: {message}", .path.display(), line_suffix(.line))]
    Format {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    /// A tag had no entry in a supplied lookup table, or a patch referenced
    /// a compartment that does not exist.
    #[error("annotation error: {0}")]
    Annotation(String),

    /// The mesh handed to the serializer cannot be written as-is.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),
}

impl ExchangeError {
    /// Construct a format violation for `path`, optionally at a 1-based line.
    pub fn format(path: impl Into<PathBuf>, line: Option<usize>, message: impl Into<String>) -> Self {
        ExchangeError::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

// formats as `:12` when a line number is known and as nothing otherwise
fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(":{l}")).unwrap_or_default()
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_error_messages() {
        let e = ExchangeError::format("mesh/cube.ele", Some(3), "expected 5 fields");
        assert_eq!(e.to_string(), "mesh/cube.ele:3: expected 5 fields");

        let e = ExchangeError::format("mesh/cube.node", None, "empty file");
        assert_eq!(e.to_string(), "mesh/cube.node: empty file");

        let e = ExchangeError::MissingFile(PathBuf::from("mesh/cube.node"));
        assert!(e.to_string().contains("mesh/cube.node"));

        // errors survive a round trip through anyhow
        let wrapped: anyhow::Error = ExchangeError::Annotation("tag 3".into()).into();
        assert_eq!(
            wrapped.downcast_ref::<ExchangeError>(),
            Some(&ExchangeError::Annotation("tag 3".into()))
        );
    }
}
