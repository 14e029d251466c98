use std::error;
use std::fmt;




/**
 * Error to represent a rejected configuration, a corrupted solution, or a
 * failure to write output.
 */
#[derive(Debug)]
pub enum Error {
    Config(String),
    NonFinite { level: usize, component: usize },
    Io(std::io::Error),
    Snapshot(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> std::result::Result<(), fmt::Error> {
        use Error::*;

        match self {
            Config(message) => write!(fmt, "invalid configuration: {}", message),
            NonFinite { level, component } => write!(fmt, "non-finite value on level {} in component {}", level, component),
            Io(e) => write!(fmt, "i/o error: {}", e),
            Snapshot(message) => write!(fmt, "could not write snapshot: {}", message),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
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
