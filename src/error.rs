use std::io;
use std::panic::Location;

use thiserror::Error;

/// The two recoverable error kinds of the startup phase. Everything that can
/// go wrong inside the step loop is an invariant violation and panics instead.
///
/// Both kinds carry the source site at which they were raised, so that a
/// failure report names the exact place in the code, in addition to whatever
/// input file caused it.
#[derive(Debug, Error)]
pub enum MdError {
    #[error("IoError : {source}: {path}, at \"{file}\", line {line}")]
    Io {
        source: io::Error,
        path: String,
        file: &'static str,
        line: u32,
    },
    #[error("DataError : {message}, at \"{file}\", line {line}")]
    Data {
        message: String,
        file: &'static str,
        line: u32,
    },
}

impl MdError {
    #[track_caller]
    pub fn io(source: io::Error, path: impl Into<String>) -> Self {
        let loc = Location::caller();
        Self::Io {
            source,
            path: path.into(),
            file: loc.file(),
            line: loc.line(),
        }
    }

    #[track_caller]
    pub fn data(message: impl Into<String>) -> Self {
        let loc = Location::caller();
        Self::Data {
            message: message.into(),
            file: loc.file(),
            line: loc.line(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MdError>;

#[cfg(test)]
mod tests {
    use super::MdError;

    #[test]
    fn data_error_names_kind_message_and_site() {
        let err = MdError::data("num_procs = 8, does not match npx*npy*npz = 3*3*3");
        let rendered = err.to_string();
        assert!(rendered.starts_with("DataError : num_procs = 8"));
        assert!(rendered.contains("error.rs"));
        assert!(rendered.contains(", line "));
    }

    #[test]
    fn io_error_names_path() {
        let err = MdError::io(
            std::io::Error::from(std::io::ErrorKind::NotFound),
            "case.txt",
        );
        let rendered = err.to_string();
        assert!(rendered.starts_with("IoError : "));
        assert!(rendered.contains("case.txt"));
    }
}
