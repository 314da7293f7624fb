//! Exchange of tetrahedral meshes annotated with compartments and patches.
//!
//! Meshes come in from TetGen file-sets or CUBIT ABAQUS exports and are
//! saved to and loaded from a canonical XML file with a plain-text sidecar
//! carrying the derived geometry.

pub mod attributes;
pub mod error;
pub mod exchange;
pub mod geometry;
pub mod mesh;

pub use attributes::{Compartment, LoadSource, Patch};
pub use error::ExchangeError;
pub use exchange::{MeshFormat, TetgenAnnotation, load_mesh, load_xml, read_cubit, read_tetgen, save_xml};
pub use geometry::DerivedGeometry;
pub use mesh::TetMesh;
