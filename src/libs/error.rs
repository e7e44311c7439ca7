use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    /// A malformed line in an aliasing or membership index
    Index {
        /// The index file
        path: PathBuf,
        /// The line number (1-based)
        line: usize,
        /// A human-readable message explaining the error
        message: String,
    },
    /// The alignment block of a required chain does not exist
    MissingAlignment {
        /// The composite identifier after alias resolution
        pid: String,
        /// The path that was looked up
        path: PathBuf,
    },
    /// An alignment block without a query row
    EmptyAlignment(PathBuf),
    /// Any other I/O failure
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Index {
                path,
                line,
                message,
            } => write!(
                f,
                "Malformed index line {} in {}: {}",
                line,
                path.display(),
                message
            ),
            Error::MissingAlignment { pid, path } => {
                write!(f, "Alignment of {} not found: {}", pid, path.display())
            }
            Error::EmptyAlignment(path) => write!(f, "Empty alignment: {}", path.display()),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
