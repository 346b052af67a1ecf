//! Error types for jot.
//!
//! Invalid input to a mesh operation (stale ids, degenerate faces, levels that
//! do not exist, malformed files) is reported through [`MeshError`]. Pure
//! geometric queries never fail this way; they return `Option` or `bool`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices (degenerate triangle).
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A face with the same three vertices already exists.
    #[error("a face on vertices ({v0}, {v1}, {v2}) already exists")]
    DuplicateFace {
        /// First vertex.
        v0: usize,
        /// Second vertex.
        v1: usize,
        /// Third vertex.
        v2: usize,
    },

    /// A vertex id does not name a live vertex.
    #[error("vertex {0} does not exist")]
    StaleVertex(usize),

    /// An edge id does not name a live edge.
    #[error("edge {0} does not exist")]
    StaleEdge(usize),

    /// A face id does not name a live face.
    #[error("face {0} does not exist")]
    StaleFace(usize),

    /// A patch id does not name a patch of the mesh.
    #[error("patch {0} does not exist")]
    UnknownPatch(usize),

    /// A subdivision level was requested that the hierarchy does not have.
    #[error("subdivision level {level} is out of range (depth {depth})")]
    LevelOutOfRange {
        /// The requested level.
        level: usize,
        /// The current depth of the hierarchy.
        depth: usize,
    },

    /// The next subdivision level could not be allocated.
    #[error("failed to allocate subdivision level {level}: {reason}")]
    SubdivAllocation {
        /// The level that was being allocated.
        level: usize,
        /// Why the allocation failed.
        reason: String,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Malformed line in a text mesh file.
    #[error("line {line}: {message}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid mesh state for the requested operation.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = MeshError::LevelOutOfRange { level: 3, depth: 1 };
        assert_eq!(err.to_string(), "subdivision level 3 is out of range (depth 1)");

        let err = MeshError::invalid_param("max_level", 0, "must be positive");
        assert!(err.to_string().contains("max_level = 0"));

        let err = MeshError::Parse {
            line: 4,
            message: "vertex index 0".to_string(),
        };
        assert_eq!(err.to_string(), "line 4: vertex index 0");
    }
}
