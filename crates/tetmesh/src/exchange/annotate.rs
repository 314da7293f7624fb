use std::collections::BTreeMap;

use ahash::AHashMap;
use anyhow::Result;
use itertools::Itertools;
use log::debug;

use crate::error::ExchangeError;
use crate::mesh::TetMesh;

/// Lookup tables turning TetGen region attributes and boundary markers into
/// named compartments and patches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TetgenAnnotation {
    // region attribute -> compartment id
    pub compartments: AHashMap<i64, String>,

    // patches are only created when compartments are
    pub patches: Option<PatchAnnotation>,
}

/// The patch half of a `TetgenAnnotation`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchAnnotation {
    // boundary marker -> patch id
    pub ids: AHashMap<i64, String>,

    // patch id -> (inner compartment id, optional outer compartment id)
    pub io: AHashMap<String, (String, Option<String>)>,
}

impl TetgenAnnotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a region attribute to a compartment id.
    pub fn compartment(mut self, tag: i64, id: &str) -> Self {
        self.compartments.insert(tag, id.to_string());
        self
    }

    /// Map a boundary marker to a patch id and the compartments on either
    /// side of it.
    pub fn patch(mut self, tag: i64, id: &str, inner: &str, outer: Option<&str>) -> Self {
        let patches = self.patches.get_or_insert_with(PatchAnnotation::default);
        patches.ids.insert(tag, id.to_string());
        patches.io.insert(
            id.to_string(),
            (inner.to_string(), outer.map(str::to_string)),
        );
        self
    }

    /// Create one compartment per distinct region tag and, if boundary tags
    /// and patch tables are both present, one patch per distinct boundary
    /// tag.
    ///
    /// Every tag is checked against the tables before anything is created.
    pub fn apply(&self, mesh: &mut TetMesh, regions: &[i64], boundaries: Option<&[i64]>) -> Result<()> {
        let region_groups = group_by_tag(regions);
        if let Some(tag) = region_groups
            .keys()
            .find(|tag| !self.compartments.contains_key(tag))
        {
            return Err(ExchangeError::Annotation(format!(
                "region attribute {tag} has no compartment id"
            ))
            .into());
        }

        let patch_groups = match (boundaries, self.patches.as_ref()) {
            (Some(boundaries), Some(patches)) => {
                let groups = group_by_tag(boundaries);
                for tag in groups.keys() {
                    let id = patches.ids.get(tag).ok_or_else(|| {
                        ExchangeError::Annotation(format!("boundary marker {tag} has no patch id"))
                    })?;
                    let (inner, outer) = patches.io.get(id).ok_or_else(|| {
                        ExchangeError::Annotation(format!(
                            "patch `{id}` has no inner/outer compartment entry"
                        ))
                    })?;
                    // the compartments a patch sits between must be ones we create
                    for name in std::iter::once(inner).chain(outer.iter()) {
                        if !region_groups
                            .keys()
                            .any(|t| self.compartments.get(t) == Some(name))
                        {
                            return Err(ExchangeError::Annotation(format!(
                                "patch `{id}` references compartment `{name}` which was not created"
                            ))
                            .into());
                        }
                    }
                }
                Some((groups, patches))
            }
            _ => None,
        };

        for (tag, tets) in region_groups.iter() {
            let id = &self.compartments[tag];
            debug!("region {tag}: compartment `{id}` with {} tetrahedra", tets.len());
            mesh.add_compartment(id, tets)?;
        }

        if let Some((groups, patches)) = patch_groups {
            for (tag, tris) in groups.iter() {
                let id = &patches.ids[tag];
                let (inner, outer) = &patches.io[id];
                debug!("boundary {tag}: patch `{id}` with {} triangles", tris.len());
                mesh.add_patch(id, tris, inner, outer.as_deref())?;
            }
        }

        Ok(())
    }
}

/// The element indices carrying each distinct tag, ordered by tag.
fn group_by_tag(tags: &[i64]) -> BTreeMap<i64, Vec<usize>> {
    tags.iter()
        .enumerate()
        .map(|(index, &tag)| (tag, index))
        .into_group_map()
        .into_iter()
        .collect()
}
