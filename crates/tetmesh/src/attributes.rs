use std::path::PathBuf;

use crate::exchange::MeshFormat;

/// A named group of tetrahedra making up a 3D sub-volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compartment {
    // unique within the owning mesh
    pub id: String,

    // indices into `TetMesh::tets`
    pub tets: Vec<usize>,

    // opaque volume system labels, in the order they were added
    pub volsys: Vec<String>,
}

impl Compartment {
    pub fn add_volsys(&mut self, label: &str) {
        self.volsys.push(label.to_string());
    }
}

/// A named group of triangles making up a 2D interface between compartments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    // unique within the owning mesh
    pub id: String,

    // indices into `TetMesh::tris`
    pub tris: Vec<usize>,

    // opaque surface system labels, in the order they were added
    pub surfsys: Vec<String>,

    // index of the inner compartment in `TetMesh::compartments`
    pub inner: usize,

    // index of the outer compartment, if there is one
    pub outer: Option<usize>,
}

impl Patch {
    pub fn add_surfsys(&mut self, label: &str) {
        self.surfsys.push(label.to_string());
    }
}

/// Where a mesh came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSource {
    // what format was this mesh loaded from?
    pub format: Option<MeshFormat>,

    // the file, or for multi-file formats the path root, it was read from
    pub path: Option<PathBuf>,
}
