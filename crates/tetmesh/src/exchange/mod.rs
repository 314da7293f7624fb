pub mod annotate;
pub mod cubit;
pub mod index;
pub mod tetgen;
pub mod tokens;
pub mod xml;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::mesh::TetMesh;

pub use crate::exchange::annotate::{PatchAnnotation, TetgenAnnotation};
pub use crate::exchange::cubit::read_cubit;
pub use crate::exchange::tetgen::{TetgenImport, read_tetgen};
pub use crate::exchange::xml::{load_xml, save_xml};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
// An enum to represent the different mesh file formats.
pub enum MeshFormat {
    // a `.node` / `.ele` / `.face` file-set sharing a path root
    TetGen,
    // a single ABAQUS file as exported by CUBIT
    Cubit,
    // the canonical `.xml` file with its `.txt` derived-geometry sidecar
    Xml,
}

impl MeshFormat {
    /// Convert a string to a MeshFormat enum.
    pub fn from_string(s: &str) -> Result<Self> {
        // clean up to match 'inp', '.inp', ' .INP ', etc
        let binding = s.to_ascii_lowercase();
        let clean = binding.trim().trim_start_matches('.').trim();
        match clean {
            "tetgen" | "node" | "ele" => Ok(MeshFormat::TetGen),
            "cubit" | "inp" | "abaqus" => Ok(MeshFormat::Cubit),
            "xml" | "steps" => Ok(MeshFormat::Xml),
            _ => Err(anyhow::anyhow!("Unsupported file type: `{}`", clean)),
        }
    }
}

/// Load a mesh with the default options of each format: TetGen files are
/// not annotated and CUBIT files are not scaled.
///
/// `path` is a path root for the multi-file formats and the file itself
/// for CUBIT.
pub fn load_mesh(path: impl AsRef<Path>, format: MeshFormat) -> Result<TetMesh> {
    match format {
        MeshFormat::TetGen => Ok(read_tetgen(path, None)?.mesh),
        MeshFormat::Cubit => read_cubit(path, 1.0),
        MeshFormat::Xml => load_xml(path),
    }
}

/// Append a suffix to a path root, `mesh/torus` and `.node` being
/// `mesh/torus.node` even when the root already contains a dot.
pub(crate) fn with_suffix(root: &Path, suffix: &str) -> PathBuf {
    let mut joined = OsString::from(root.as_os_str());
    joined.push(suffix);
    PathBuf::from(joined)
}

#[cfg(test)]
mod tests {

    use std::fs;

    use super::*;

    #[test]
    fn test_mesh_format_keys() {
        // check our string cleanup logic
        assert_eq!(MeshFormat::from_string("tetgen").unwrap(), MeshFormat::TetGen);
        assert_eq!(MeshFormat::from_string("TetGen").unwrap(), MeshFormat::TetGen);
        assert_eq!(MeshFormat::from_string(".node").unwrap(), MeshFormat::TetGen);
        assert_eq!(MeshFormat::from_string(" .ELE ").unwrap(), MeshFormat::TetGen);
        assert_eq!(MeshFormat::from_string("cubit").unwrap(), MeshFormat::Cubit);
        assert_eq!(MeshFormat::from_string(".inp").unwrap(), MeshFormat::Cubit);
        assert_eq!(MeshFormat::from_string("  ABAQUS").unwrap(), MeshFormat::Cubit);
        assert_eq!(MeshFormat::from_string("xml").unwrap(), MeshFormat::Xml);
        assert_eq!(MeshFormat::from_string(".XML").unwrap(), MeshFormat::Xml);
        assert_eq!(MeshFormat::from_string("steps").unwrap(), MeshFormat::Xml);

        assert!(MeshFormat::from_string("stl").is_err());
        assert!(MeshFormat::from_string("").is_err());
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(
            with_suffix(Path::new("mesh/torus"), ".node"),
            PathBuf::from("mesh/torus.node")
        );
        // an existing dot is part of the root, not a suffix to replace
        assert_eq!(
            with_suffix(Path::new("mesh/torus.1"), ".ele"),
            PathBuf::from("mesh/torus.1.ele")
        );
    }

    #[test]
    fn test_load_mesh() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("bipyramid");
        for suffix in [".node", ".ele", ".face"] {
            let text = match suffix {
                ".node" => include_str!("../../../../test/data/bipyramid.node"),
                ".ele" => include_str!("../../../../test/data/bipyramid.ele"),
                _ => include_str!("../../../../test/data/bipyramid.face"),
            };
            fs::write(with_suffix(&root, suffix), text).unwrap();
        }
        let inp = dir.path().join("bipyramid.inp");
        fs::write(&inp, include_str!("../../../../test/data/bipyramid.inp")).unwrap();

        let tetgen = load_mesh(&root, MeshFormat::TetGen).unwrap();
        assert_eq!(tetgen.count_tris(), 7);
        // the default import does not annotate
        assert!(tetgen.compartments().is_empty());

        let cubit = load_mesh(&inp, MeshFormat::Cubit).unwrap();
        assert_eq!(cubit.vertices, tetgen.vertices);
        assert_eq!(cubit.tets, tetgen.tets);

        // the canonical format needs an XML file
        assert!(load_mesh(&root, MeshFormat::Xml).is_err());
    }
}
