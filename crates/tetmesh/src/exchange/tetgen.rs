use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use nalgebra::Point3;

use crate::attributes::LoadSource;
use crate::error::ExchangeError;
use crate::exchange::annotate::TetgenAnnotation;
use crate::exchange::index::IndexShift;
use crate::exchange::tokens::{Delimiters, Record, records};
use crate::exchange::{MeshFormat, with_suffix};
use crate::mesh::TetMesh;

/// The columns of a `.node` file as declared by its header:
/// `<count> <dimensions> <attribute count> <boundary marker flag>`.
///
/// Attributes and markers are checked but never read: only coordinates
/// matter for the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeSchema {
    count: usize,
    attributes: usize,
    boundary_marker: bool,
}

impl NodeSchema {
    /// Fields per record: id, three coordinates, attributes and the marker.
    /// `None` when the declared attribute count overflows it.
    fn width(&self) -> Option<usize> {
        4usize
            .checked_add(self.attributes)?
            .checked_add(usize::from(self.boundary_marker))
    }
}

/// The columns of a `.ele` file as declared by its header:
/// `<count> <nodes per tetrahedron> <region attribute flag>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EleSchema {
    count: usize,
    // 4 for linear or 10 for quadratic tetrahedra, of which we read the corners
    nodes_per_tet: usize,
    region_attribute: bool,
}

impl EleSchema {
    /// The region attribute immediately follows the declared node references.
    fn attribute_column(&self) -> Option<usize> {
        self.region_attribute.then_some(1 + self.nodes_per_tet)
    }
}

/// The columns of a `.face` file as declared by its header:
/// `<count> <boundary marker flag>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FaceSchema {
    count: usize,
    boundary_marker: bool,
}

impl FaceSchema {
    /// The boundary marker follows the id and three node references.
    fn marker_column(&self) -> Option<usize> {
        self.boundary_marker.then_some(4)
    }
}

/// The raw arrays of a TetGen file-set, normalized to 0-based indices.
#[derive(Debug, Clone, PartialEq)]
pub struct TetgenMesh {
    pub vertices: Vec<Point3<f64>>,
    pub tets: Vec<[usize; 4]>,
    // empty when there was no `.face` file
    pub tris: Vec<[usize; 3]>,

    // region attribute per tetrahedron, `None` when the column is absent
    pub regions: Option<Vec<i64>>,
    // boundary marker per triangle, `None` when the column or file is absent
    pub boundaries: Option<Vec<i64>>,

    // the shift that was subtracted from every index
    pub shift: IndexShift,
}

/// The result of importing a TetGen file-set.
#[derive(Debug, Clone)]
pub struct TetgenImport {
    pub mesh: TetMesh,
    pub regions: Option<Vec<i64>>,
    pub boundaries: Option<Vec<i64>>,
}

/// Read a mesh from TetGen's `<root>.node`, `<root>.ele` and optional
/// `<root>.face` files.
///
/// Parameters
/// ------------
/// path_root
///   The path without a suffix, i.e. `mesh/torus` reads `mesh/torus.node`.
/// annotation
///   Tables turning region attributes and boundary markers into
///   compartments and patches. Nothing is annotated when `None`.
///
/// Returns
/// ------------
/// The mesh along with the raw region attributes and boundary markers, each
/// `None` if the files did not declare them.
pub fn read_tetgen(path_root: impl AsRef<Path>, annotation: Option<&TetgenAnnotation>) -> Result<TetgenImport> {
    let path_root = path_root.as_ref();
    let raw = TetgenMesh::from_files(path_root)?;

    let regions = raw.regions.clone();
    let boundaries = raw.boundaries.clone();

    let mut mesh = raw.to_mesh()?;
    mesh.source = LoadSource {
        format: Some(MeshFormat::TetGen),
        path: Some(path_root.to_path_buf()),
    };

    if let (Some(regions), Some(annotation)) = (regions.as_deref(), annotation) {
        annotation.apply(&mut mesh, regions, boundaries.as_deref())?;
    }

    info!(
        "read TetGen mesh `{}`: {} vertices, {} triangles, {} tetrahedra",
        path_root.display(),
        mesh.count_vertices(),
        mesh.count_tris(),
        mesh.count_tets()
    );

    Ok(TetgenImport {
        mesh,
        regions,
        boundaries,
    })
}

impl TetgenMesh {
    /// Read the file-set rooted at `path_root`, requiring the `.node` and
    /// `.ele` files and tolerating a missing `.face` file.
    pub fn from_files(path_root: &Path) -> Result<Self> {
        let node_path = with_suffix(path_root, ".node");
        let ele_path = with_suffix(path_root, ".ele");
        let face_path = with_suffix(path_root, ".face");

        for required in [&node_path, &ele_path] {
            if !required.is_file() {
                return Err(ExchangeError::MissingFile(required.clone()).into());
            }
        }

        let node = read_text(&node_path)?;
        let ele = read_text(&ele_path)?;
        let face = if face_path.is_file() {
            Some(read_text(&face_path)?)
        } else {
            warn!("no `{}`, the mesh will have no triangles", face_path.display());
            None
        };

        Self::from_strings(
            (&node_path, &node),
            (&ele_path, &ele),
            face.as_deref().map(|text| (face_path.as_path(), text)),
        )
    }

    /// Parse the contents of the companion files, each paired with the path
    /// used in error messages.
    pub fn from_strings(
        node: (&Path, &str),
        ele: (&Path, &str),
        face: Option<(&Path, &str)>,
    ) -> Result<Self> {
        let (shift, vertices) = parse_nodes(node.0, node.1)?;
        let (tets, regions) = parse_elements(ele.0, ele.1, shift, vertices.len())?;
        let (tris, boundaries) = match face {
            Some((path, text)) => parse_faces(path, text, shift, vertices.len())?,
            None => (Vec::new(), None),
        };

        Ok(Self {
            vertices,
            tets,
            tris,
            regions,
            boundaries,
            shift,
        })
    }

    /// Construct the mesh from the structural arrays.
    pub fn to_mesh(self) -> Result<TetMesh> {
        TetMesh::new(self.vertices, self.tris, self.tets)
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading `{}`", path.display()))
}

/// Split a file into its header record and its data records.
fn header_and_body<'a>(path: &Path, text: &'a str) -> Result<(Record<'a>, Vec<Record<'a>>), ExchangeError> {
    let mut all = records(text, Delimiters::Whitespace, 1).into_iter();
    let header = all
        .next()
        .ok_or_else(|| ExchangeError::format(path, None, "file has no header"))?;
    Ok((header, all.collect()))
}

/// Read a header flag which must be `0` or `1`.
fn flag(record: &Record, path: &Path, column: usize, name: &str) -> Result<bool, ExchangeError> {
    match record.field::<u8>(path, column, name)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(record.error(path, format!("{name} must be 0 or 1, found {other}"))),
    }
}

/// Read a positive element count.
fn count(record: &Record, path: &Path) -> Result<usize, ExchangeError> {
    match record.field::<usize>(path, 0, "count")? {
        0 => Err(record.error(path, "count must be positive")),
        n => Ok(n),
    }
}

/// Store each record at the slot named by its own id, requiring every slot
/// from 0 to `count` to be filled exactly once.
fn place<T>(
    path: &Path,
    body: &[Record],
    count: usize,
    shift: IndexShift,
    parse: impl Fn(&Record) -> Result<T, ExchangeError>,
) -> Result<Vec<T>, ExchangeError> {
    if body.len() != count {
        let at = body.get(count).or(body.last());
        let message = format!("header declares {count} records, found {}", body.len());
        return Err(match at {
            Some(record) => record.error(path, message),
            None => ExchangeError::format(path, None, message),
        });
    }

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(count).collect();
    for record in body {
        let raw: i64 = record.field(path, 0, "id")?;
        let index = shift
            .apply(raw, count)
            .ok_or_else(|| record.error(path, format!("id {raw} is out of range")))?;
        if slots[index].is_some() {
            return Err(record.error(path, format!("id {raw} appears twice")));
        }
        slots[index] = Some(parse(record)?);
    }

    // `count` records landed in `count` distinct slots so all are filled
    Ok(slots.into_iter().flatten().collect())
}

/// Read `N` node references starting at column 1.
fn node_refs<const N: usize>(
    record: &Record,
    path: &Path,
    shift: IndexShift,
    node_count: usize,
) -> Result<[usize; N], ExchangeError> {
    let mut refs = [0usize; N];
    for (i, slot) in refs.iter_mut().enumerate() {
        let raw: i64 = record.field(path, 1 + i, "node reference")?;
        *slot = shift.apply(raw, node_count).ok_or_else(|| {
            record.error(path, format!("node reference {raw} does not name a node"))
        })?;
    }
    Ok(refs)
}

/// Parse a `.node` file, detecting the index shift from its first record.
fn parse_nodes(path: &Path, text: &str) -> Result<(IndexShift, Vec<Point3<f64>>), ExchangeError> {
    let (header, body) = header_and_body(path, text)?;
    header.expect_len(path, 4, ".node header")?;
    let schema = NodeSchema {
        count: count(&header, path)?,
        attributes: header.field(path, 2, "attribute count")?,
        boundary_marker: flag(&header, path, 3, "boundary marker flag")?,
    };
    let dimensions: usize = header.field(path, 1, "dimension")?;
    if dimensions != 3 {
        return Err(header.error(path, format!("dimension must be 3, found {dimensions}")));
    }
    let width = schema.width().ok_or_else(|| {
        header.error(path, format!("attribute count {} is too large", schema.attributes))
    })?;
    debug!("`{}`: {schema:?}", path.display());

    let first = body
        .first()
        .ok_or_else(|| ExchangeError::format(path, None, "no node records"))?;
    let first_id: i64 = first.field(path, 0, "id")?;
    let shift = IndexShift::detect(first_id)
        .ok_or_else(|| first.error(path, format!("node numbering must start at 0 or 1, not {first_id}")))?;
    debug!("`{}`: indices shifted by {}", path.display(), shift.amount());

    let vertices = place(path, &body, schema.count, shift, |record| {
        if record.len() < width {
            return Err(record.error(
                path,
                format!("node record needs {width} fields, found {}", record.len()),
            ));
        }
        Ok(Point3::new(
            record.field::<f64>(path, 1, "x coordinate")?,
            record.field::<f64>(path, 2, "y coordinate")?,
            record.field::<f64>(path, 3, "z coordinate")?,
        ))
    })?;

    Ok((shift, vertices))
}

type Tagged<T> = (Vec<T>, Option<Vec<i64>>);

/// Parse a `.ele` file, keeping the four corner nodes of each tetrahedron.
fn parse_elements(
    path: &Path,
    text: &str,
    shift: IndexShift,
    node_count: usize,
) -> Result<Tagged<[usize; 4]>, ExchangeError> {
    let (header, body) = header_and_body(path, text)?;
    header.expect_len(path, 3, ".ele header")?;
    let schema = EleSchema {
        count: count(&header, path)?,
        nodes_per_tet: header.field(path, 1, "nodes per tetrahedron")?,
        region_attribute: flag(&header, path, 2, "region attribute flag")?,
    };
    if !matches!(schema.nodes_per_tet, 4 | 10) {
        return Err(header.error(
            path,
            format!("nodes per tetrahedron must be 4 or 10, found {}", schema.nodes_per_tet),
        ));
    }
    debug!("`{}`: {schema:?}", path.display());

    let parsed = place(path, &body, schema.count, shift, |record| {
        let tet = node_refs::<4>(record, path, shift, node_count)?;
        let region = schema
            .attribute_column()
            .map(|column| record.field::<i64>(path, column, "region attribute"))
            .transpose()?;
        Ok((tet, region))
    })?;

    Ok(split_tags(parsed, schema.region_attribute))
}

/// Parse a `.face` file of triangles.
fn parse_faces(
    path: &Path,
    text: &str,
    shift: IndexShift,
    node_count: usize,
) -> Result<Tagged<[usize; 3]>, ExchangeError> {
    let (header, body) = header_and_body(path, text)?;
    header.expect_len(path, 2, ".face header")?;
    let schema = FaceSchema {
        count: count(&header, path)?,
        boundary_marker: flag(&header, path, 1, "boundary marker flag")?,
    };
    debug!("`{}`: {schema:?}", path.display());

    let parsed = place(path, &body, schema.count, shift, |record| {
        let tri = node_refs::<3>(record, path, shift, node_count)?;
        let marker = schema
            .marker_column()
            .map(|column| record.field::<i64>(path, column, "boundary marker"))
            .transpose()?;
        Ok((tri, marker))
    })?;

    Ok(split_tags(parsed, schema.boundary_marker))
}

/// Separate elements from their tags, keeping "no column" distinct from an
/// empty column.
fn split_tags<T>(parsed: Vec<(T, Option<i64>)>, declared: bool) -> Tagged<T> {
    let (elements, tags): (Vec<T>, Vec<Option<i64>>) = parsed.into_iter().unzip();
    // with the column declared every record either carried a tag or failed
    let tags = declared.then(|| tags.into_iter().flatten().collect());
    (elements, tags)
}
