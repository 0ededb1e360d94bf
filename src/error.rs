use crate::io::LoadError;
use crate::voxel::VoxelKey;

/// Main error type for the library.
#[derive(Debug)]
pub enum Sem3dError {
    /// Used when the user pass a logical invalid parameter to a function.
    InvalidParameter(String),
    /// A scan could not be turned into addressable point positions.
    MalformedScanInput { scan: String, reason: String },
    /// The two semantic distributions of a voxel share no support, their product is zero.
    IncompatibleEvidence { key: VoxelKey },
    Io(std::io::Error),
    Parser(String),
}

impl std::fmt::Display for Sem3dError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Sem3dError::Io(err) => write!(f, "IO error: {err}"),
            Sem3dError::Parser(err) => write!(f, "Parser error: {err}"),
            Sem3dError::InvalidParameter(err) => write!(f, "Parameter error: {err}"),
            Sem3dError::MalformedScanInput { scan, reason } => {
                write!(f, "Malformed scan `{scan}`: {reason}")
            }
            Sem3dError::IncompatibleEvidence { key } => write!(
                f,
                "Incompatible semantic evidence at voxel {key}: distributions have disjoint support"
            ),
        }
    }
}

impl Sem3dError {
    /// Create a error with the kind `InvalidParameter`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        Sem3dError::InvalidParameter(msg.to_string())
    }

    /// Create a error with the kind `MalformedScanInput`.
    /// # Arguments
    /// * `scan` - Name of the offending scan, usually its path.
    /// * `reason` - What went wrong.
    pub fn malformed_scan<S: ToString, R: ToString>(scan: S, reason: R) -> Self {
        Sem3dError::MalformedScanInput {
            scan: scan.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Attach the scan name to a geometry error raised while inserting it.
    pub fn in_scan<S: ToString>(self, scan: S) -> Self {
        match self {
            Sem3dError::MalformedScanInput { reason, .. } => Sem3dError::MalformedScanInput {
                scan: scan.to_string(),
                reason,
            },
            other => other,
        }
    }
}

impl std::error::Error for Sem3dError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Sem3dError::Io(err) => Some(err),
            Sem3dError::Parser(_) => None,
            Sem3dError::InvalidParameter(_) => None,
            Sem3dError::MalformedScanInput { .. } => None,
            Sem3dError::IncompatibleEvidence { .. } => None,
        }
    }
}

impl From<std::io::Error> for Sem3dError {
    fn from(err: std::io::Error) -> Self {
        Sem3dError::Io(err)
    }
}

impl From<serde_json::Error> for Sem3dError {
    fn from(err: serde_json::Error) -> Self {
        Sem3dError::Parser(err.to_string())
    }
}

impl From<LoadError> for Sem3dError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::IO(err) => Sem3dError::Io(err),
            LoadError::ParseError(msg) => Sem3dError::Parser(msg),
        }
    }
}
