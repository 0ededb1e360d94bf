use std::io;

#[derive(Debug)]
pub enum LoadError {
    IO(io::Error),
    ParseError(String),
}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        LoadError::IO(err)
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LoadError::IO(err) => write!(f, "IO error: {err}"),
            LoadError::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::IO(err) => Some(err),
            LoadError::ParseError(_) => None,
        }
    }
}
