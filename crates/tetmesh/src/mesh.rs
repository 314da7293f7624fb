use std::sync::{Arc, RwLock};

use ahash::AHashSet;
use anyhow::Result;
use nalgebra::{Point3, Vector3};
use tetmesh_macro::cache_access;

use crate::attributes::{Compartment, LoadSource, Patch};
use crate::error::ExchangeError;
use crate::geometry::DerivedGeometry;

/// The placeholder written for a patch without an outer compartment, so no
/// compartment may use it as an id.
pub const NULL_COMPARTMENT: &str = "null";

// The inner cache for the TetMesh struct. Any method that uses
// the `#[cache_access]` macro will be stored here.
#[derive(Default, Debug, Clone)]
pub struct InnerCache {
    // for every tetrahedron, the index of the compartment that owns it
    pub tet_compartments: Option<Arc<Vec<Option<usize>>>>,
    // for every triangle, the index of the patch that owns it
    pub tri_patches: Option<Arc<Vec<Option<usize>>>>,
}

/// A tetrahedral mesh with its compartment and patch annotations.
///
/// Derived geometry (areas, normals, volumes, barycenters and adjacency) is
/// carried when it was supplied at construction and is otherwise `None`:
/// nothing in this crate computes it.
#[derive(Default, Debug)]
pub struct TetMesh {
    pub vertices: Vec<Point3<f64>>,
    pub tris: Vec<[usize; 3]>,
    pub tets: Vec<[usize; 4]>,

    // precomputed per-element quantities, if we were given them
    pub geometry: Option<DerivedGeometry>,

    // information about where the mesh came from
    pub source: LoadSource,

    // groups are only reachable through methods that keep the cache current
    compartments: Vec<Compartment>,
    patches: Vec<Patch>,

    // the cached values computed for the mesh
    pub _cache: RwLock<InnerCache>,
}

impl Clone for TetMesh {
    fn clone(&self) -> Self {
        let cache = self
            ._cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            vertices: self.vertices.clone(),
            tris: self.tris.clone(),
            tets: self.tets.clone(),
            geometry: self.geometry.clone(),
            source: self.source.clone(),
            compartments: self.compartments.clone(),
            patches: self.patches.clone(),
            _cache: RwLock::new(cache.clone()),
        }
    }
}

impl TetMesh {
    /// Create a mesh from structural data only, checking that every
    /// element references an existing vertex.
    pub fn new(
        vertices: Vec<Point3<f64>>,
        tris: Vec<[usize; 3]>,
        tets: Vec<[usize; 4]>,
    ) -> Result<Self> {
        check_elements("triangle", &tris, vertices.len())?;
        check_elements("tetrahedron", &tets, vertices.len())?;

        Ok(Self {
            vertices,
            tris,
            tets,
            ..Default::default()
        })
    }

    /// Create a mesh from flat slices of vertex coordinates, tetrahedron
    /// vertex indices and (possibly empty) triangle vertex indices.
    pub fn from_slice(vertices: &[f64], tets: &[usize], tris: &[usize]) -> Result<Self> {
        for (name, len, width) in [
            ("vertex coordinates", vertices.len(), 3),
            ("tetrahedron indices", tets.len(), 4),
            ("triangle indices", tris.len(), 3),
        ] {
            if len % width != 0 {
                return Err(ExchangeError::InvalidState(format!(
                    "{len} {name} is not a multiple of {width}"
                ))
                .into());
            }
        }

        let vertices: Vec<Point3<f64>> = vertices
            .chunks_exact(3)
            .map(|chunk| Point3::new(chunk[0], chunk[1], chunk[2]))
            .collect();

        let tets: Vec<[usize; 4]> = tets
            .chunks_exact(4)
            .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
            .collect();

        let tris: Vec<[usize; 3]> = tris
            .chunks_exact(3)
            .map(|chunk| [chunk[0], chunk[1], chunk[2]])
            .collect();

        Self::new(vertices, tris, tets)
    }

    /// Create a mesh which also carries its precomputed derived geometry.
    pub fn with_geometry(
        vertices: Vec<Point3<f64>>,
        tris: Vec<[usize; 3]>,
        tets: Vec<[usize; 4]>,
        geometry: DerivedGeometry,
    ) -> Result<Self> {
        geometry
            .check(tris.len(), tets.len())
            .map_err(ExchangeError::InvalidState)?;

        let mut mesh = Self::new(vertices, tris, tets)?;
        mesh.geometry = Some(geometry);
        Ok(mesh)
    }

    pub fn count_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn count_tris(&self) -> usize {
        self.tris.len()
    }

    pub fn count_tets(&self) -> usize {
        self.tets.len()
    }

    pub fn vertex(&self, index: usize) -> Option<&Point3<f64>> {
        self.vertices.get(index)
    }

    pub fn tri(&self, index: usize) -> Option<&[usize; 3]> {
        self.tris.get(index)
    }

    pub fn tet(&self, index: usize) -> Option<&[usize; 4]> {
        self.tets.get(index)
    }

    pub fn geometry(&self) -> Option<&DerivedGeometry> {
        self.geometry.as_ref()
    }

    pub fn tri_area(&self, tri: usize) -> Option<f64> {
        self.geometry()?.tri_areas.get(tri).copied()
    }

    pub fn tri_normal(&self, tri: usize) -> Option<Vector3<f64>> {
        self.geometry()?.tri_normals.get(tri).copied()
    }

    pub fn tri_tet_neighbors(&self, tri: usize) -> Option<[Option<usize>; 2]> {
        self.geometry()?.tri_tet_neighbors.get(tri).copied()
    }

    pub fn tet_volume(&self, tet: usize) -> Option<f64> {
        self.geometry()?.tet_volumes.get(tet).copied()
    }

    pub fn tet_barycenter(&self, tet: usize) -> Option<Point3<f64>> {
        self.geometry()?.tet_barycenters.get(tet).copied()
    }

    pub fn tet_tri_neighbors(&self, tet: usize) -> Option<[usize; 4]> {
        self.geometry()?.tet_tri_neighbors.get(tet).copied()
    }

    pub fn tet_tet_neighbors(&self, tet: usize) -> Option<[Option<usize>; 4]> {
        self.geometry()?.tet_tet_neighbors.get(tet).copied()
    }

    /// Every compartment in the order it was added.
    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    /// Every patch in the order it was added.
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn compartment_index(&self, id: &str) -> Option<usize> {
        self.compartments.iter().position(|c| c.id == id)
    }

    pub fn patch_index(&self, id: &str) -> Option<usize> {
        self.patches.iter().position(|p| p.id == id)
    }

    pub fn compartment(&self, id: &str) -> Option<&Compartment> {
        self.compartments.iter().find(|c| c.id == id)
    }

    pub fn patch(&self, id: &str) -> Option<&Patch> {
        self.patches.iter().find(|p| p.id == id)
    }

    /// Mutable access to a compartment, e.g. to attach volume systems.
    ///
    /// Membership edited through here is re-checked by `validate`.
    pub fn compartment_mut(&mut self, id: &str) -> Option<&mut Compartment> {
        // the caller may edit membership so forget the back-references
        self.clear_cache();
        self.compartments.iter_mut().find(|c| c.id == id)
    }

    /// Mutable access to a patch, e.g. to attach surface systems.
    ///
    /// Membership edited through here is re-checked by `validate`.
    pub fn patch_mut(&mut self, id: &str) -> Option<&mut Patch> {
        self.clear_cache();
        self.patches.iter_mut().find(|p| p.id == id)
    }

    /// Create a compartment from a list of tetrahedron indices.
    ///
    /// Parameters
    /// ------------
    /// id
    ///   A name not used by any other compartment.
    /// tets
    ///   Indices of tetrahedra not already owned by another compartment.
    ///
    /// Returns
    /// ------------
    /// The index of the new compartment in `compartments()`.
    pub fn add_compartment(&mut self, id: &str, tets: &[usize]) -> Result<usize> {
        if self.compartment_index(id).is_some() {
            return Err(
                ExchangeError::Annotation(format!("compartment `{id}` already exists")).into(),
            );
        }
        let owners = self.tet_compartments();
        claim_members(id, "tetrahedron", tets, &owners).map_err(ExchangeError::Annotation)?;

        self.compartments.push(Compartment {
            id: id.to_string(),
            tets: tets.to_vec(),
            volsys: Vec::new(),
        });
        self.clear_cache();
        Ok(self.compartments.len() - 1)
    }

    /// Create a patch from a list of triangle indices, wiring it to its
    /// inner and optional outer compartment by id. Both compartments must
    /// already exist.
    pub fn add_patch(
        &mut self,
        id: &str,
        tris: &[usize],
        inner: &str,
        outer: Option<&str>,
    ) -> Result<usize> {
        if self.patch_index(id).is_some() {
            return Err(ExchangeError::Annotation(format!("patch `{id}` already exists")).into());
        }
        let resolve = |name: &str| {
            self.compartment_index(name).ok_or_else(|| {
                ExchangeError::Annotation(format!(
                    "patch `{id}` references unknown compartment `{name}`"
                ))
            })
        };
        let inner = resolve(inner)?;
        let outer = outer.map(resolve).transpose()?;

        let owners = self.tri_patches();
        claim_members(id, "triangle", tris, &owners).map_err(ExchangeError::Annotation)?;

        self.patches.push(Patch {
            id: id.to_string(),
            tris: tris.to_vec(),
            surfsys: Vec::new(),
            inner,
            outer,
        });
        self.clear_cache();
        Ok(self.patches.len() - 1)
    }

    /// For every tetrahedron, the index of the compartment owning it.
    #[cache_access]
    pub fn tet_compartments(&self) -> Arc<Vec<Option<usize>>> {
        let mut owners = vec![None; self.tets.len()];
        for (index, comp) in self.compartments.iter().enumerate() {
            for &tet in comp.tets.iter() {
                if let Some(owner) = owners.get_mut(tet) {
                    *owner = Some(index);
                }
            }
        }
        Arc::new(owners)
    }

    /// For every triangle, the index of the patch owning it.
    #[cache_access]
    pub fn tri_patches(&self) -> Arc<Vec<Option<usize>>> {
        let mut owners = vec![None; self.tris.len()];
        for (index, patch) in self.patches.iter().enumerate() {
            for &tri in patch.tris.iter() {
                if let Some(owner) = owners.get_mut(tri) {
                    *owner = Some(index);
                }
            }
        }
        Arc::new(owners)
    }

    /// The compartment owning a tetrahedron, if any.
    pub fn tet_compartment(&self, tet: usize) -> Option<&Compartment> {
        let owner = (*self.tet_compartments().get(tet)?)?;
        self.compartments.get(owner)
    }

    /// The patch owning a triangle, if any.
    pub fn tri_patch(&self, tri: usize) -> Option<&Patch> {
        let owner = (*self.tri_patches().get(tri)?)?;
        self.patches.get(owner)
    }

    /// Check that this mesh can be written to the canonical format without
    /// losing or corrupting anything.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| -> anyhow::Error { ExchangeError::InvalidState(message).into() };

        check_elements("triangle", &self.tris, self.vertices.len())?;
        check_elements("tetrahedron", &self.tets, self.vertices.len())?;

        let geometry = self
            .geometry
            .as_ref()
            .ok_or_else(|| invalid("mesh carries no derived geometry".to_string()))?;
        geometry
            .check(self.tris.len(), self.tets.len())
            .map_err(invalid)?;

        for comp in self.compartments.iter() {
            check_token("compartment id", &comp.id)?;
            if comp.id == NULL_COMPARTMENT {
                return Err(invalid(format!(
                    "`{NULL_COMPARTMENT}` is reserved and cannot be a compartment id"
                )));
            }
            for label in comp.volsys.iter() {
                check_token("volume system", label)?;
            }
        }

        for patch in self.patches.iter() {
            check_token("patch id", &patch.id)?;
            for label in patch.surfsys.iter() {
                check_token("surface system", label)?;
            }
            let count = self.compartments.len();
            if patch.inner >= count || patch.outer.is_some_and(|o| o >= count) {
                return Err(invalid(format!(
                    "patch `{}` references a compartment that does not exist",
                    patch.id
                )));
            }
        }

        // membership may have been edited through `compartment_mut` or
        // `patch_mut` since it was claimed
        check_ownership(
            "tetrahedron",
            self.tets.len(),
            self.compartments
                .iter()
                .map(|c| (c.id.as_str(), c.tets.as_slice())),
        )
        .map_err(invalid)?;
        check_ownership(
            "triangle",
            self.tris.len(),
            self.patches
                .iter()
                .map(|p| (p.id.as_str(), p.tris.as_slice())),
        )
        .map_err(invalid)?;

        Ok(())
    }

    fn clear_cache(&mut self) {
        *self
            ._cache
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = InnerCache::default();
    }
}

/// Check every vertex reference of a set of elements is in bounds.
fn check_elements<const N: usize>(name: &str, elements: &[[usize; N]], vertex_count: usize) -> Result<()> {
    if let Some((index, element)) = elements
        .iter()
        .enumerate()
        .find(|(_, e)| e.iter().any(|&v| v >= vertex_count))
    {
        return Err(ExchangeError::InvalidState(format!(
            "{name} {index} {element:?} references a vertex outside of 0..{vertex_count}"
        ))
        .into());
    }
    Ok(())
}

/// Check that a set of element indices exists and is not yet owned,
/// describing the first offending member.
fn claim_members(group: &str, name: &str, members: &[usize], owners: &[Option<usize>]) -> Result<(), String> {
    let mut seen = AHashSet::with_capacity(members.len());
    for &member in members {
        match owners.get(member) {
            None => return Err(format!("`{group}` lists {name} {member} which does not exist")),
            Some(Some(_)) => {
                return Err(format!(
                    "`{group}` lists {name} {member} which already belongs to another group"
                ));
            }
            Some(None) => {}
        }
        if !seen.insert(member) {
            return Err(format!("`{group}` lists {name} {member} twice"));
        }
    }
    Ok(())
}

/// Rebuild an element -> owner table from scratch, failing on the first
/// member that is out of range, repeated or shared between groups.
fn check_ownership<'g>(
    name: &str,
    element_count: usize,
    groups: impl Iterator<Item = (&'g str, &'g [usize])>,
) -> Result<(), String> {
    let mut owners = vec![None; element_count];
    for (index, (group, members)) in groups.enumerate() {
        claim_members(group, name, members, &owners)?;
        for &member in members {
            owners[member] = Some(index);
        }
    }
    Ok(())
}

/// Group ids and labels are written unescaped between tags and inside
/// comma-joined lists.
fn check_token(name: &str, value: &str) -> Result<()> {
    if value.is_empty()
        || value
            .chars()
            .any(|c| matches!(c, ',' | '<' | '>') || (c != ' ' && c.is_whitespace()))
        || value.trim() != value
    {
        return Err(
            ExchangeError::InvalidState(format!("{name} `{value}` cannot be serialized")).into(),
        );
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {

    use super::*;

    /// Two tetrahedra sharing the triangle (0, 1, 2), with made-up derived
    /// geometry whose floats are deliberately awkward to print.
    pub fn two_tets() -> TetMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.1 + 0.2, 1.0 / 3.0, -1e-7),
        ];
        let tris = vec![
            [0, 1, 2],
            [0, 1, 3],
            [0, 2, 3],
            [1, 2, 3],
            [0, 1, 4],
            [0, 2, 4],
            [1, 2, 4],
        ];
        let tets = vec![[0, 1, 2, 3], [0, 2, 1, 4]];

        let mut tri_tet_neighbors = vec![[Some(0), None]; 7];
        tri_tet_neighbors[0] = [Some(0), Some(1)];
        for n in tri_tet_neighbors.iter_mut().skip(4) {
            *n = [Some(1), None];
        }

        let geometry = DerivedGeometry {
            tri_areas: vec![0.5, 0.5, 0.5, 3f64.sqrt() / 2.0, 0.1 + 0.2, 1.0 / 3.0, 2.0 / 3.0],
            tri_normals: vec![
                Vector3::new(0.0, 0.0, -1.0),
                Vector3::new(0.0, -1.0, 0.0),
                Vector3::new(-1.0, 0.0, 0.0),
                Vector3::new(1.0, 1.0, 1.0) / 3f64.sqrt(),
                Vector3::new(0.0, 0.1, -0.7),
                Vector3::new(-0.2, 0.0, -0.9),
                Vector3::new(0.4, 0.4, -0.4),
            ],
            tri_tet_neighbors,
            tet_volumes: vec![1.0 / 6.0, 1e-8 / 6.0],
            tet_barycenters: vec![
                Point3::new(0.25, 0.25, 0.25),
                Point3::new(0.325, 1.0 / 3.0, -2.5e-8),
            ],
            tet_tri_neighbors: vec![[0, 1, 2, 3], [0, 4, 5, 6]],
            tet_tet_neighbors: vec![[Some(1), None, None, None], [Some(0), None, None, None]],
        };

        TetMesh::with_geometry(vertices, tris, tets, geometry).unwrap()
    }

    /// `two_tets` annotated with two compartments and two patches.
    pub fn two_tets_annotated() -> TetMesh {
        let mut mesh = two_tets();
        mesh.add_compartment("cyto", &[0]).unwrap();
        mesh.add_compartment("er", &[1]).unwrap();
        let er = mesh.compartment_mut("er").unwrap();
        er.add_volsys("vsys1");
        er.add_volsys("vsys2");

        mesh.add_patch("memb", &[0], "er", Some("cyto")).unwrap();
        mesh.add_patch("surf", &[1, 2, 3], "cyto", None).unwrap();
        mesh.patch_mut("memb").unwrap().add_surfsys("ssys");
        mesh
    }
}

#[cfg(test)]
mod tests {

    use super::fixtures::{two_tets, two_tets_annotated};
    use super::*;

    fn kind(e: &anyhow::Error) -> &ExchangeError {
        e.downcast_ref::<ExchangeError>().unwrap()
    }

    #[test]
    fn test_mesh_from_slice() {
        let vertices = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let mesh = TetMesh::from_slice(&vertices, &[0, 1, 2, 3], &[]).unwrap();
        assert_eq!(mesh.count_vertices(), 4);
        assert_eq!(mesh.count_tets(), 1);
        assert_eq!(mesh.count_tris(), 0);
        assert_eq!(mesh.vertex(3), Some(&Point3::new(0.0, 0.0, 1.0)));
        assert_eq!(mesh.tet(0), Some(&[0, 1, 2, 3]));

        // no geometry was supplied so none is reported
        assert!(mesh.geometry().is_none());
        assert_eq!(mesh.tet_volume(0), None);

        // a reference past the last vertex
        let e = TetMesh::from_slice(&vertices, &[0, 1, 2, 4], &[]).unwrap_err();
        assert!(matches!(kind(&e), ExchangeError::InvalidState(_)));

        // a ragged coordinate array
        assert!(TetMesh::from_slice(&vertices[..11], &[0, 1, 2, 3], &[]).is_err());
    }

    #[test]
    fn test_mesh_geometry_accessors() {
        let mesh = two_tets();
        assert_eq!(mesh.tri_tet_neighbors(0), Some([Some(0), Some(1)]));
        assert_eq!(mesh.tri_tet_neighbors(6), Some([Some(1), None]));
        assert_eq!(mesh.tet_tri_neighbors(1), Some([0, 4, 5, 6]));
        assert_eq!(mesh.tet_tet_neighbors(0), Some([Some(1), None, None, None]));
        assert_eq!(mesh.tri_area(1), Some(0.5));
        assert_eq!(mesh.tet_volume(7), None);
    }

    #[test]
    fn test_mesh_groups() {
        let mesh = two_tets_annotated();
        assert_eq!(mesh.compartments().len(), 2);
        assert_eq!(mesh.patches().len(), 2);

        assert_eq!(mesh.tet_compartment(0).unwrap().id, "cyto");
        assert_eq!(mesh.tet_compartment(1).unwrap().id, "er");
        assert_eq!(mesh.tri_patch(0).unwrap().id, "memb");
        assert_eq!(mesh.tri_patch(2).unwrap().id, "surf");
        assert!(mesh.tri_patch(4).is_none());

        let memb = mesh.patch("memb").unwrap();
        assert_eq!(memb.inner, mesh.compartment_index("er").unwrap());
        assert_eq!(memb.outer, mesh.compartment_index("cyto"));
        assert_eq!(memb.surfsys, vec!["ssys".to_string()]);
        assert_eq!(mesh.patch("surf").unwrap().outer, None);
        assert_eq!(mesh.compartment("er").unwrap().volsys.len(), 2);
    }

    #[test]
    fn test_mesh_group_errors() {
        let mut mesh = two_tets();
        mesh.add_compartment("cyto", &[0]).unwrap();

        // the cache has seen `cyto` and must be refreshed after each add
        assert_eq!(mesh.tet_compartments().as_slice(), &[Some(0), None]);

        let cases: [(&str, &[usize]); 4] = [("cyto", &[1]), ("er", &[0]), ("er", &[2]), ("er", &[1, 1])];
        for (id, tets) in cases {
            let e = mesh.add_compartment(id, tets).unwrap_err();
            assert!(matches!(kind(&e), ExchangeError::Annotation(_)), "{e}");
        }
        // nothing was added by the failed calls
        assert_eq!(mesh.compartments().len(), 1);

        mesh.add_compartment("er", &[1]).unwrap();
        assert_eq!(mesh.tet_compartments().as_slice(), &[Some(0), Some(1)]);

        let e = mesh.add_patch("memb", &[0], "golgi", None).unwrap_err();
        assert!(matches!(kind(&e), ExchangeError::Annotation(_)));
        let e = mesh.add_patch("memb", &[0], "er", Some("golgi")).unwrap_err();
        assert!(matches!(kind(&e), ExchangeError::Annotation(_)));
        assert!(mesh.patches().is_empty());
    }

    #[test]
    fn test_mesh_validate() {
        let mesh = two_tets_annotated();
        assert!(mesh.validate().is_ok());

        // structural data alone cannot be written
        let bare = TetMesh::new(mesh.vertices.clone(), mesh.tris.clone(), mesh.tets.clone()).unwrap();
        let e = bare.validate().unwrap_err();
        assert!(matches!(kind(&e), ExchangeError::InvalidState(_)));

        let mut bad = two_tets();
        bad.add_compartment("a,b", &[0]).unwrap();
        assert!(bad.validate().is_err());

        let mut bad = two_tets();
        bad.add_compartment(NULL_COMPARTMENT, &[0]).unwrap();
        assert!(bad.validate().is_err());

        let mut bad = two_tets_annotated();
        bad.compartment_mut("cyto").unwrap().add_volsys("<vsys>");
        assert!(bad.validate().is_err());

        let mut bad = two_tets();
        bad.tets[1][3] = 5;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_mesh_validate_edited_membership() {
        // each edit would be dropped or reassigned by the back-references
        let edits: [(&str, usize); 3] = [("cyto", 99), ("cyto", 1), ("cyto", 0)];
        for (id, tet) in edits {
            let mut mesh = two_tets_annotated();
            mesh.compartment_mut(id).unwrap().tets.push(tet);
            let e = mesh.validate().unwrap_err();
            assert!(matches!(kind(&e), ExchangeError::InvalidState(_)), "{e}");
        }

        let mut mesh = two_tets_annotated();
        mesh.patch_mut("surf").unwrap().tris.push(0);
        let e = mesh.validate().unwrap_err();
        assert!(e.to_string().contains("another group"), "{e}");

        // moving a member between groups is fine once it is only in one
        let mut mesh = two_tets_annotated();
        mesh.patch_mut("memb").unwrap().tris.clear();
        mesh.patch_mut("surf").unwrap().tris.push(0);
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.tri_patch(0).unwrap().id, "surf");
    }

    #[test]
    fn test_mesh_clone() {
        let mesh = two_tets_annotated();
        let _ = mesh.tri_patches();
        let copy = mesh.clone();
        assert_eq!(copy.compartments(), mesh.compartments());
        assert_eq!(copy.patches(), mesh.patches());
        assert_eq!(copy.geometry, mesh.geometry);
        assert_eq!(copy.tri_patch(0).unwrap().id, "memb");
    }
}
