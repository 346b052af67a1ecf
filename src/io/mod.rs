//! Reading and writing control meshes.
//!
//! | Format | Extension | Load | Save |
//! |--------|-----------|------|------|
//! | Wavefront OBJ | `.obj` | ✓ | ✓ |
//! | STL | `.stl` | ✓ | ✓ |
//! | PLY | `.ply` | ✓ | ✓ |
//!
//! Quads in OBJ and PLY files are split along a weak diagonal, so they come
//! back out as quads. STL only knows triangles.
//!
//! ```no_run
//! use jot::io::{load, save};
//! use jot::mesh::Bmesh;
//!
//! let mesh: Bmesh = load("cube.obj").unwrap();
//! save(&mesh, "cube.ply").unwrap();
//! ```

pub mod obj;
pub mod ply;
pub mod stl;

use std::path::Path;

use crate::error::{MeshError, Result};
use crate::mesh::{Bmesh, MeshIndex};

/// Mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Wavefront OBJ.
    Obj,
    /// Binary or ASCII STL.
    Stl,
    /// Stanford PLY.
    Ply,
}

impl Format {
    /// Format for a file extension, ignoring case.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_ascii_lowercase().as_str() {
            "obj" => Some(Format::Obj),
            "stl" => Some(Format::Stl),
            "ply" => Some(Format::Ply),
            _ => None,
        }
    }

    /// Format for the extension of `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

fn detect(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

/// Load a mesh, picking the format from the file extension.
pub fn load<P: AsRef<Path>, I: MeshIndex>(path: P) -> Result<Bmesh<I>> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Obj => obj::load(path),
        Format::Stl => stl::load(path),
        Format::Ply => ply::load(path),
    }
}

/// Save a mesh, picking the format from the file extension.
pub fn save<P: AsRef<Path>, I: MeshIndex>(mesh: &Bmesh<I>, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Obj => obj::save(mesh, path),
        Format::Stl => stl::save(mesh, path),
        Format::Ply => ply::save(mesh, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path("a/b/mesh.OBJ"), Some(Format::Obj));
        assert_eq!(Format::from_path("mesh.ply"), Some(Format::Ply));
        assert_eq!(Format::from_path("mesh.stl"), Some(Format::Stl));
        assert_eq!(Format::from_path("mesh.glb"), None);
        assert_eq!(Format::from_path("mesh"), None);
    }

    #[test]
    fn test_unknown_extension() {
        let err = load::<_, u32>("mesh.fbx").unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedFormat { ref extension } if extension == "fbx"));
    }
}
