use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::attributes::LoadSource;
use crate::error::ExchangeError;
use crate::exchange::tokens::{Delimiters, Record, records};
use crate::exchange::{MeshFormat, with_suffix};
use crate::geometry::DerivedGeometry;
use crate::mesh::{NULL_COMPARTMENT, TetMesh};

const DECLARATION: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>"#;

// written for a neighbor that does not exist
const NO_NEIGHBOR: i64 = -1;

/// Save a mesh with its compartments and patches to `<root>.xml` and its
/// derived geometry to `<root>.txt`.
///
/// The mesh is validated first and nothing is written if it fails, which
/// includes a mesh without derived geometry. Member lists are written in
/// ascending element order.
pub fn save_xml(path_root: impl AsRef<Path>, mesh: &TetMesh) -> Result<()> {
    let path_root = path_root.as_ref();
    mesh.validate()?;
    let geometry = mesh
        .geometry()
        .ok_or_else(|| ExchangeError::InvalidState("mesh carries no derived geometry".into()))?;

    let xml = xml_text(mesh)?;
    let txt = sidecar_text(mesh, geometry);

    let xml_path = with_suffix(path_root, ".xml");
    let txt_path = with_suffix(path_root, ".txt");
    fs::write(&xml_path, xml).with_context(|| format!("writing `{}`", xml_path.display()))?;
    fs::write(&txt_path, txt).with_context(|| format!("writing `{}`", txt_path.display()))?;

    info!(
        "saved mesh to `{}` and `{}`",
        xml_path.display(),
        txt_path.display()
    );
    Ok(())
}

/// Load a mesh saved by `save_xml`.
///
/// `<root>.xml` is required. If `<root>.txt` is missing the mesh is built
/// from the structure alone and carries no derived geometry.
///
/// Returns
/// ------------
/// The mesh owning its compartments and patches, recreated in file order
/// and reachable through `TetMesh::compartments` and `TetMesh::patches`.
pub fn load_xml(path_root: impl AsRef<Path>) -> Result<TetMesh> {
    let path_root = path_root.as_ref();
    let xml_path = with_suffix(path_root, ".xml");
    let txt_path = with_suffix(path_root, ".txt");

    if !xml_path.is_file() {
        return Err(ExchangeError::MissingFile(xml_path).into());
    }
    let xml = fs::read_to_string(&xml_path)
        .with_context(|| format!("reading `{}`", xml_path.display()))?;
    let doc = XmlMesh::parse(&xml_path, &xml)?;

    let geometry = if txt_path.is_file() {
        let txt = fs::read_to_string(&txt_path)
            .with_context(|| format!("reading `{}`", txt_path.display()))?;
        Some(parse_sidecar(
            &txt_path,
            &txt,
            doc.vertices.len(),
            doc.tris.len(),
            doc.tets.len(),
        )?)
    } else {
        warn!(
            "no `{}`, the mesh will carry no derived geometry",
            txt_path.display()
        );
        None
    };

    let mut mesh = doc.to_mesh(geometry)?;
    mesh.source = LoadSource {
        format: Some(MeshFormat::Xml),
        path: Some(path_root.to_path_buf()),
    };

    info!(
        "loaded mesh `{}`: {} vertices, {} triangles, {} tetrahedra, {} compartments, {} patches",
        path_root.display(),
        mesh.count_vertices(),
        mesh.count_tris(),
        mesh.count_tets(),
        mesh.compartments().len(),
        mesh.patches().len()
    );
    Ok(mesh)
}

/// Render the XML half of the canonical format.
fn xml_text(mesh: &TetMesh) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{DECLARATION}")?;
    writeln!(out, "<tetmesh>")?;

    writeln!(out, "\t<nodes size = \"{}\">", mesh.count_vertices())?;
    for (index, vertex) in mesh.vertices.iter().enumerate() {
        writeln!(out, "\t\t<node idx = \"{index}\">")?;
        writeln!(
            out,
            "\t\t\t<coords>{:?}, {:?}, {:?}</coords>",
            vertex.x, vertex.y, vertex.z
        )?;
        writeln!(out, "\t\t</node>")?;
    }
    writeln!(out, "\t</nodes>")?;

    writeln!(out, "\t<triangles size = \"{}\">", mesh.count_tris())?;
    for (index, tri) in mesh.tris.iter().enumerate() {
        writeln!(out, "\t\t<tri idx = \"{index}\">")?;
        writeln!(out, "\t\t\t<nodes>{}</nodes>", tri.iter().join(", "))?;
        writeln!(out, "\t\t</tri>")?;
    }
    writeln!(out, "\t</triangles>")?;

    writeln!(out, "\t<tetrahedrons size = \"{}\">", mesh.count_tets())?;
    for (index, tet) in mesh.tets.iter().enumerate() {
        writeln!(out, "\t\t<tet idx = \"{index}\">")?;
        writeln!(out, "\t\t\t<nodes>{}</nodes>", tet.iter().join(", "))?;
        writeln!(out, "\t\t</tet>")?;
    }
    writeln!(out, "\t</tetrahedrons>")?;

    // membership comes from a single pass over the element owners
    let comp_members = members_by_owner(&mesh.tet_compartments(), mesh.compartments().len());
    writeln!(out, "\t<compartments size = \"{}\">", mesh.compartments().len())?;
    for (index, (comp, tets)) in mesh.compartments().iter().zip(comp_members).enumerate() {
        writeln!(out, "\t\t<comp idx = \"{index}\">")?;
        writeln!(out, "\t\t\t<id>{}</id>", comp.id)?;
        writeln!(out, "\t\t\t<volsys>{}</volsys>", comp.volsys.iter().join(","))?;
        writeln!(out, "\t\t\t<tets>{}</tets>", tets.iter().join(","))?;
        writeln!(out, "\t\t</comp>")?;
    }
    writeln!(out, "\t</compartments>")?;

    let patch_members = members_by_owner(&mesh.tri_patches(), mesh.patches().len());
    let compartments = mesh.compartments();
    writeln!(out, "\t<patches size = \"{}\">", mesh.patches().len())?;
    for (index, (patch, tris)) in mesh.patches().iter().zip(patch_members).enumerate() {
        let outer = patch
            .outer
            .map(|o| compartments[o].id.as_str())
            .unwrap_or(NULL_COMPARTMENT);
        writeln!(out, "\t\t<patch idx = \"{index}\">")?;
        writeln!(out, "\t\t\t<id>{}</id>", patch.id)?;
        writeln!(out, "\t\t\t<surfsys>{}</surfsys>", patch.surfsys.iter().join(","))?;
        writeln!(out, "\t\t\t<icomp>{}</icomp>", compartments[patch.inner].id)?;
        writeln!(out, "\t\t\t<ocomp>{outer}</ocomp>")?;
        writeln!(out, "\t\t\t<tris>{}</tris>", tris.iter().join(","))?;
        writeln!(out, "\t\t</patch>")?;
    }
    writeln!(out, "\t</patches>")?;

    writeln!(out, "</tetmesh>")?;
    Ok(out)
}

/// Invert an element -> owner table into ascending member lists per owner.
fn members_by_owner(owners: &[Option<usize>], count: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); count];
    for (element, &owner) in owners.iter().enumerate() {
        if let Some(group) = owner.and_then(|o| members.get_mut(o)) {
            group.push(element);
        }
    }
    members
}

fn neighbor_text(neighbor: Option<usize>) -> String {
    neighbor.map_or_else(|| NO_NEIGHBOR.to_string(), |n| n.to_string())
}

/// Render the derived-geometry sidecar, which relies on element order alone.
fn sidecar_text(mesh: &TetMesh, geometry: &DerivedGeometry) -> String {
    let tri_lines: Vec<String> = (0..mesh.count_tris())
        .into_par_iter()
        .map(|tri| {
            let n = geometry.tri_normals[tri];
            let [a, b] = geometry.tri_tet_neighbors[tri];
            format!(
                "{:?} {:?} {:?} {:?} {} {}",
                geometry.tri_areas[tri],
                n.x,
                n.y,
                n.z,
                neighbor_text(a),
                neighbor_text(b)
            )
        })
        .collect();

    let tet_lines: Vec<String> = (0..mesh.count_tets())
        .into_par_iter()
        .map(|tet| {
            let b = geometry.tet_barycenters[tet];
            format!(
                "{:?} {:?} {:?} {:?} {} {}",
                geometry.tet_volumes[tet],
                b.x,
                b.y,
                b.z,
                geometry.tet_tri_neighbors[tet].iter().join(" "),
                geometry.tet_tet_neighbors[tet]
                    .iter()
                    .map(|&n| neighbor_text(n))
                    .join(" ")
            )
        })
        .collect();

    let mut out = format!("{}\n\n{}\n", mesh.count_vertices(), mesh.count_tris());
    for line in tri_lines {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&format!("\n{}\n", mesh.count_tets()));
    for line in tet_lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// A compartment entry as read from the XML file.
#[derive(Debug, Clone, PartialEq)]
struct XmlCompartment {
    id: String,
    volsys: Vec<String>,
    tets: Vec<usize>,
}

/// A patch entry as read from the XML file.
#[derive(Debug, Clone, PartialEq)]
struct XmlPatch {
    id: String,
    surfsys: Vec<String>,
    inner: String,
    outer: Option<String>,
    tris: Vec<usize>,
}

/// Everything the XML file holds, before it is assembled into a mesh.
#[derive(Debug, Clone, PartialEq)]
struct XmlMesh {
    vertices: Vec<Point3<f64>>,
    tris: Vec<[usize; 3]>,
    tets: Vec<[usize; 4]>,
    compartments: Vec<XmlCompartment>,
    patches: Vec<XmlPatch>,
}

impl XmlMesh {
    /// Parse the XML file, which must match the layout `save_xml` writes
    /// line for line apart from indentation.
    ///
    /// Sizes come from the file, so nothing is reserved from them: a size
    /// larger than the file simply runs out of lines.
    fn parse(path: &Path, text: &str) -> Result<Self> {
        let mut cursor = Cursor::new(path, text);

        let declaration = cursor.next("the XML declaration")?;
        if !declaration.starts_with("<?xml") {
            return Err(cursor.error("not an XML file").into());
        }
        cursor.literal("<tetmesh>")?;

        let count = cursor.sized("nodes", "size")?;
        let mut vertices = Vec::new();
        for index in 0..count {
            cursor.element("node", index)?;
            let [x, y, z] = cursor.tuple::<f64, 3>("coords")?;
            vertices.push(Point3::new(x, y, z));
            cursor.literal("</node>")?;
        }
        cursor.literal("</nodes>")?;

        let count = cursor.sized("triangles", "size")?;
        let mut tris = Vec::new();
        for index in 0..count {
            cursor.element("tri", index)?;
            tris.push(cursor.vertex_refs::<3>(vertices.len())?);
            cursor.literal("</tri>")?;
        }
        cursor.literal("</triangles>")?;

        let count = cursor.sized("tetrahedrons", "size")?;
        let mut tets = Vec::new();
        for index in 0..count {
            cursor.element("tet", index)?;
            tets.push(cursor.vertex_refs::<4>(vertices.len())?);
            cursor.literal("</tet>")?;
        }
        cursor.literal("</tetrahedrons>")?;

        let count = cursor.sized("compartments", "size")?;
        let mut compartments = Vec::new();
        for index in 0..count {
            cursor.element("comp", index)?;
            let id = cursor.content("id")?.to_string();
            let volsys = split_list(cursor.content("volsys")?);
            let tets = cursor.members("tets")?;
            cursor.literal("</comp>")?;
            compartments.push(XmlCompartment { id, volsys, tets });
        }
        cursor.literal("</compartments>")?;

        let count = cursor.sized("patches", "size")?;
        let mut patches = Vec::new();
        for index in 0..count {
            cursor.element("patch", index)?;
            let id = cursor.content("id")?.to_string();
            let surfsys = split_list(cursor.content("surfsys")?);
            let inner = cursor.content("icomp")?.to_string();
            let outer = match cursor.content("ocomp")? {
                NULL_COMPARTMENT => None,
                name => Some(name.to_string()),
            };
            let tris = cursor.members("tris")?;
            cursor.literal("</patch>")?;
            patches.push(XmlPatch {
                id,
                surfsys,
                inner,
                outer,
                tris,
            });
        }
        cursor.literal("</patches>")?;

        cursor.literal("</tetmesh>")?;
        cursor.finish()?;

        debug!(
            "`{}`: {} nodes, {} triangles, {} tetrahedra",
            path.display(),
            vertices.len(),
            tris.len(),
            tets.len()
        );
        Ok(Self {
            vertices,
            tris,
            tets,
            compartments,
            patches,
        })
    }

    /// Assemble the mesh, recreating compartments before the patches that
    /// reference them.
    fn to_mesh(self, geometry: Option<DerivedGeometry>) -> Result<TetMesh> {
        let mut mesh = match geometry {
            Some(geometry) => TetMesh::with_geometry(self.vertices, self.tris, self.tets, geometry)?,
            None => TetMesh::new(self.vertices, self.tris, self.tets)?,
        };

        for comp in self.compartments.iter() {
            mesh.add_compartment(&comp.id, &comp.tets)?;
            if let Some(created) = mesh.compartment_mut(&comp.id) {
                for label in comp.volsys.iter() {
                    created.add_volsys(label);
                }
            }
        }

        for patch in self.patches.iter() {
            mesh.add_patch(&patch.id, &patch.tris, &patch.inner, patch.outer.as_deref())?;
            if let Some(created) = mesh.patch_mut(&patch.id) {
                for label in patch.surfsys.iter() {
                    created.add_surfsys(label);
                }
            }
        }

        Ok(mesh)
    }
}

/// Split a comma-joined list where an empty string is an empty list.
fn split_list(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',').map(str::to_string).collect()
}

/// Walks the XML file one trimmed line at a time.
struct Cursor<'a> {
    path: &'a Path,
    lines: std::str::Lines<'a>,
    // 1-based number of the line most recently returned
    line: usize,
}

impl<'a> Cursor<'a> {
    fn new(path: &'a Path, text: &'a str) -> Self {
        Self {
            path,
            lines: text.lines(),
            line: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> ExchangeError {
        ExchangeError::format(self.path, Some(self.line), message)
    }

    fn next(&mut self, expected: &str) -> Result<&'a str, ExchangeError> {
        let line = self
            .lines
            .next()
            .ok_or_else(|| ExchangeError::format(self.path, None, format!("file ends before {expected}")))?;
        self.line += 1;
        Ok(line.trim())
    }

    /// The next line must be exactly `expected`.
    fn literal(&mut self, expected: &str) -> Result<(), ExchangeError> {
        let line = self.next(&format!("`{expected}`"))?;
        if line != expected {
            return Err(self.error(format!("expected `{expected}`, found `{line}`")));
        }
        Ok(())
    }

    /// Read `<tag name = "value">`, also accepting `<tag name="value">`.
    fn sized(&mut self, tag: &str, name: &str) -> Result<usize, ExchangeError> {
        let line = self.next(&format!("`<{tag}>`"))?;
        let value = line
            .strip_prefix('<')
            .and_then(|rest| rest.strip_prefix(tag))
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .and_then(|rest| rest.trim_start().strip_prefix(name))
            .and_then(|rest| rest.trim_start().strip_prefix('='))
            .and_then(|rest| rest.trim_start().strip_prefix('"'))
            .and_then(|rest| rest.strip_suffix("\">"))
            .ok_or_else(|| self.error(format!("expected `<{tag} {name} = \"...\">`, found `{line}`")))?;
        value
            .parse()
            .map_err(|_| self.error(format!("invalid {name} `{value}` on `<{tag}>`")))
    }

    /// Open an element whose `idx` must equal its position.
    fn element(&mut self, tag: &str, index: usize) -> Result<(), ExchangeError> {
        let idx = self.sized(tag, "idx")?;
        if idx != index {
            return Err(self.error(format!("`<{tag}>` number {index} has idx {idx}")));
        }
        Ok(())
    }

    /// Read `<tag>content</tag>` on a single line.
    fn content(&mut self, tag: &str) -> Result<&'a str, ExchangeError> {
        let line = self.next(&format!("`<{tag}>`"))?;
        line.strip_prefix(&format!("<{tag}>"))
            .and_then(|rest| rest.strip_suffix(&format!("</{tag}>")))
            .ok_or_else(|| self.error(format!("expected `<{tag}>...</{tag}>`, found `{line}`")))
    }

    /// Read a fixed-length tuple joined by `, `.
    fn tuple<T: FromStr, const N: usize>(&mut self, tag: &str) -> Result<[T; N], ExchangeError> {
        let content = self.content(tag)?;
        let record = Record {
            line: self.line,
            tokens: content.split(',').map(str::trim).collect(),
        };
        record.expect_len(self.path, N, tag)?;
        let parsed = (0..N)
            .map(|column| record.field::<T>(self.path, column, tag))
            .collect::<Result<Vec<T>, _>>()?;
        parsed
            .try_into()
            .map_err(|_| self.error(format!("`<{tag}>` needs {N} values")))
    }

    /// Read an element's `<nodes>` tuple, each of which must name a vertex.
    fn vertex_refs<const N: usize>(&mut self, vertex_count: usize) -> Result<[usize; N], ExchangeError> {
        let refs = self.tuple::<usize, N>("nodes")?;
        if let Some(bad) = refs.iter().find(|&&v| v >= vertex_count) {
            return Err(self.error(format!("node {bad} does not exist")));
        }
        Ok(refs)
    }

    /// Read a comma-joined, possibly empty, list of element indices.
    fn members(&mut self, tag: &str) -> Result<Vec<usize>, ExchangeError> {
        let content = self.content(tag)?;
        if content.is_empty() {
            return Ok(Vec::new());
        }
        content
            .split(',')
            .map(|m| {
                m.trim()
                    .parse()
                    .map_err(|_| self.error(format!("invalid index `{m}` in `<{tag}>`")))
            })
            .collect()
    }

    /// Only blank lines may follow the closing tag.
    fn finish(&mut self) -> Result<(), ExchangeError> {
        for line in self.lines.by_ref() {
            self.line += 1;
            if !line.trim().is_empty() {
                return Err(self.error("content after `</tetmesh>`"));
            }
        }
        Ok(())
    }
}

/// Parse the derived-geometry sidecar, checking its counts against the
/// element counts of the XML file.
fn parse_sidecar(
    path: &Path,
    text: &str,
    vertex_count: usize,
    tri_count: usize,
    tet_count: usize,
) -> Result<DerivedGeometry> {
    let all = records(text, Delimiters::Whitespace, 1);
    let mut body = all.iter();

    expect_count(&mut body, path, "vertices", vertex_count)?;
    expect_count(&mut body, path, "triangles", tri_count)?;

    let tri_records = take(&mut body, tri_count, path, "triangle")?;
    let mut geometry = DerivedGeometry::default();
    for record in tri_records {
        record.expect_len(path, 6, "triangle record")?;
        geometry.tri_areas.push(record.field::<f64>(path, 0, "area")?);
        geometry.tri_normals.push(Vector3::new(
            record.field::<f64>(path, 1, "normal")?,
            record.field::<f64>(path, 2, "normal")?,
            record.field::<f64>(path, 3, "normal")?,
        ));
        geometry
            .tri_tet_neighbors
            .push([neighbor(record, path, 4)?, neighbor(record, path, 5)?]);
    }

    expect_count(&mut body, path, "tetrahedra", tet_count)?;

    let tet_records = take(&mut body, tet_count, path, "tetrahedron")?;
    for record in tet_records {
        record.expect_len(path, 12, "tetrahedron record")?;
        geometry.tet_volumes.push(record.field::<f64>(path, 0, "volume")?);
        geometry.tet_barycenters.push(Point3::new(
            record.field::<f64>(path, 1, "barycenter")?,
            record.field::<f64>(path, 2, "barycenter")?,
            record.field::<f64>(path, 3, "barycenter")?,
        ));
        let mut tris = [0usize; 4];
        for (slot, column) in tris.iter_mut().zip(4..8) {
            *slot = record.field(path, column, "triangle neighbor")?;
        }
        geometry.tet_tri_neighbors.push(tris);
        let mut tets = [None; 4];
        for (slot, column) in tets.iter_mut().zip(8..12) {
            *slot = neighbor(record, path, column)?;
        }
        geometry.tet_tet_neighbors.push(tets);
    }

    if let Some(extra) = body.next() {
        return Err(extra.error(path, "unexpected record after the last tetrahedron").into());
    }

    geometry
        .check(tri_count, tet_count)
        .map_err(|message| ExchangeError::format(path, None, message))?;
    Ok(geometry)
}

/// The next record must be a single count equal to the one in the XML file.
fn expect_count(
    body: &mut std::slice::Iter<'_, Record<'_>>,
    path: &Path,
    what: &str,
    expected: usize,
) -> Result<(), ExchangeError> {
    let name = format!("{what} count");
    let record = body
        .next()
        .ok_or_else(|| ExchangeError::format(path, None, format!("file ends before the {name}")))?;
    record.expect_len(path, 1, &name)?;
    let found: usize = record.field(path, 0, &name)?;
    if found != expected {
        return Err(record.error(
            path,
            format!("{found} {what} but the XML file has {expected}"),
        ));
    }
    Ok(())
}

/// Take the next `count` records, failing if the file ends first.
fn take<'r, 'a>(
    body: &mut std::slice::Iter<'r, Record<'a>>,
    count: usize,
    path: &Path,
    what: &str,
) -> Result<Vec<&'r Record<'a>>, ExchangeError> {
    let taken: Vec<_> = body.by_ref().take(count).collect();
    if taken.len() != count {
        return Err(ExchangeError::format(
            path,
            None,
            format!("{} {what} records for a count of {count}", taken.len()),
        ));
    }
    Ok(taken)
}

/// A neighbor index where `-1` means there is none.
fn neighbor(record: &Record, path: &Path, column: usize) -> Result<Option<usize>, ExchangeError> {
    let raw: i64 = record.field(path, column, "neighbor")?;
    if raw == NO_NEIGHBOR {
        return Ok(None);
    }
    usize::try_from(raw)
        .map(Some)
        .map_err(|_| record.error(path, format!("invalid neighbor {raw}")))
}
