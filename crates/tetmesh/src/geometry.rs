use nalgebra::{Point3, Vector3};

/// Precomputed per-element quantities which are read and written by this
/// crate but never computed by it.
///
/// Every vector is indexed by element: the `tri_*` vectors have one entry per
/// triangle of the owning mesh and the `tet_*` vectors one per tetrahedron.
/// Neighbors that do not exist (the outside of a boundary triangle or
/// tetrahedron) are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedGeometry {
    pub tri_areas: Vec<f64>,
    pub tri_normals: Vec<Vector3<f64>>,
    pub tri_tet_neighbors: Vec<[Option<usize>; 2]>,

    pub tet_volumes: Vec<f64>,
    pub tet_barycenters: Vec<Point3<f64>>,
    pub tet_tri_neighbors: Vec<[usize; 4]>,
    pub tet_tet_neighbors: Vec<[Option<usize>; 4]>,
}

impl DerivedGeometry {
    /// Check that every per-element vector has the length of its element set
    /// and that every neighbor reference points inside it.
    ///
    /// Returns a description of the first problem found.
    pub fn check(&self, tri_count: usize, tet_count: usize) -> Result<(), String> {
        let tri_lengths = [
            ("triangle areas", self.tri_areas.len()),
            ("triangle normals", self.tri_normals.len()),
            ("triangle tetrahedron neighbors", self.tri_tet_neighbors.len()),
        ];
        for (name, len) in tri_lengths {
            if len != tri_count {
                return Err(format!("{name}: {len} entries for {tri_count} triangles"));
            }
        }

        let tet_lengths = [
            ("tetrahedron volumes", self.tet_volumes.len()),
            ("tetrahedron barycenters", self.tet_barycenters.len()),
            ("tetrahedron triangle neighbors", self.tet_tri_neighbors.len()),
            ("tetrahedron neighbors", self.tet_tet_neighbors.len()),
        ];
        for (name, len) in tet_lengths {
            if len != tet_count {
                return Err(format!("{name}: {len} entries for {tet_count} tetrahedra"));
            }
        }

        if let Some((tri, _)) = self
            .tri_tet_neighbors
            .iter()
            .enumerate()
            .find(|(_, n)| n.iter().flatten().any(|&t| t >= tet_count))
        {
            return Err(format!("triangle {tri} references a tetrahedron out of bounds"));
        }
        if let Some((tet, _)) = self
            .tet_tri_neighbors
            .iter()
            .enumerate()
            .find(|(_, n)| n.iter().any(|&t| t >= tri_count))
        {
            return Err(format!("tetrahedron {tet} references a triangle out of bounds"));
        }
        if let Some((tet, _)) = self
            .tet_tet_neighbors
            .iter()
            .enumerate()
            .find(|(_, n)| n.iter().flatten().any(|&t| t >= tet_count))
        {
            return Err(format!("tetrahedron {tet} references a tetrahedron out of bounds"));
        }

        Ok(())
    }
}
