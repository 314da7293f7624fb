use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::attributes::LoadSource;
use crate::error::ExchangeError;
use crate::exchange::MeshFormat;
use crate::exchange::index::IndexShift;
use crate::exchange::tokens::{Delimiters, records};
use crate::mesh::TetMesh;

// The fixed header CUBIT writes before the node records, the line between
// them is a free-form comment.
const HEADING: &str = "*HEADING";
const NODE: &str = "*NODE";
const ELEMENT: &str = "*ELEMENT";

/// Read a tetrahedral mesh exported by CUBIT in ABAQUS format.
///
/// Parameters
/// ------------
/// path
///   The exported file including any suffix.
/// scale
///   The length scale from the CUBIT model to the real geometry, e.g. a
///   radius of 10 in CUBIT meaning 1 micron would be `1e-7`.
///
/// Returns
/// ------------
/// The mesh without triangles, as CUBIT does not export them. Vertex and
/// tetrahedron indices are the CUBIT ids minus one.
pub fn read_cubit(path: impl AsRef<Path>, scale: f64) -> Result<TetMesh> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ExchangeError::MissingFile(path.to_path_buf()).into());
    }
    let text = fs::read_to_string(path).with_context(|| format!("reading `{}`", path.display()))?;

    let mut mesh = parse_cubit(path, &text, scale)?;
    mesh.source = LoadSource {
        format: Some(MeshFormat::Cubit),
        path: Some(path.to_path_buf()),
    };

    info!(
        "read CUBIT mesh `{}`: {} vertices, {} tetrahedra",
        path.display(),
        mesh.count_vertices(),
        mesh.count_tets()
    );
    Ok(mesh)
}

/// Parse the contents of a CUBIT ABAQUS file, `path` only names it in errors.
pub fn parse_cubit(path: &Path, text: &str, scale: f64) -> Result<TetMesh> {
    // the header is checked line by line rather than record by record
    let mut lines = text.splitn(4, '\n');
    for (number, expected) in [(1, Some(HEADING)), (2, None), (3, Some(NODE))] {
        let line = lines.next().ok_or_else(|| {
            ExchangeError::format(path, Some(number), "file ends inside the header")
        })?;
        if let Some(expected) = expected {
            if line.trim_end() != expected {
                return Err(ExchangeError::format(
                    path,
                    Some(number),
                    format!("expected `{expected}`, found `{}`", line.trim_end()),
                )
                .into());
            }
        }
    }
    let body = records(lines.next().unwrap_or_default(), Delimiters::WhitespaceOrComma, 4);

    // nodes run until the element section marker
    let marker = body
        .iter()
        .position(|record| record.tokens[0] == ELEMENT)
        .ok_or_else(|| ExchangeError::format(path, None, format!("no `{ELEMENT}` section")))?;

    let mut coordinates: Vec<f64> = Vec::with_capacity(marker * 3);
    for record in &body[..marker] {
        record.expect_len(path, 4, "node record")?;
        for column in 1..4 {
            coordinates.push(record.field::<f64>(path, column, "coordinate")? * scale);
        }
    }
    let vertex_count = coordinates.len() / 3;

    let mut references: Vec<usize> = Vec::with_capacity((body.len() - marker) * 4);
    for record in &body[marker + 1..] {
        record.expect_len(path, 5, "element record")?;
        for column in 1..5 {
            let raw: i64 = record.field(path, column, "node reference")?;
            // CUBIT always numbers from one
            let index = IndexShift::ONE.apply(raw, vertex_count).ok_or_else(|| {
                record.error(path, format!("node reference {raw} does not name a node"))
            })?;
            references.push(index);
        }
    }
    debug!(
        "`{}`: {} coordinates, {} node references",
        path.display(),
        coordinates.len(),
        references.len()
    );

    if coordinates.len() % 3 != 0 || references.len() % 4 != 0 {
        return Err(ExchangeError::format(path, None, "incomplete node or element data").into());
    }

    let mesh = TetMesh::from_slice(&coordinates, &references, &[])
        .with_context(|| format!("constructing mesh from `{}`", path.display()))?;
    if mesh.count_vertices() != vertex_count || mesh.count_tets() != references.len() / 4 {
        return Err(ExchangeError::format(
            path,
            None,
            format!(
                "parsed {vertex_count} nodes and {} elements but the mesh has {} and {}",
                references.len() / 4,
                mesh.count_vertices(),
                mesh.count_tets()
            ),
        )
        .into());
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {

    use approx::relative_eq;
    use nalgebra::Point3;

    use super::*;

    const BIPYRAMID: &str = include_str!("../../../../test/data/bipyramid.inp");

    fn kind(e: &anyhow::Error) -> &ExchangeError {
        e.downcast_ref::<ExchangeError>().unwrap()
    }

    #[test]
    fn test_cubit_parse() {
        let mesh = parse_cubit(Path::new("bipyramid.inp"), BIPYRAMID, 1.0).unwrap();
        assert_eq!(mesh.count_vertices(), 5);
        assert_eq!(mesh.count_tets(), 2);
        assert_eq!(mesh.count_tris(), 0);
        assert_eq!(mesh.tets, vec![[0, 1, 2, 3], [0, 2, 1, 4]]);
        assert_eq!(mesh.vertices[4], Point3::new(0.3, 0.3, -1.0));

        // the same mesh as the TetGen fixture
        let tetgen = crate::exchange::tetgen::TetgenMesh::from_strings(
            (
                Path::new("bipyramid.node"),
                include_str!("../../../../test/data/bipyramid.node"),
            ),
            (
                Path::new("bipyramid.ele"),
                include_str!("../../../../test/data/bipyramid.ele"),
            ),
            None,
        )
        .unwrap();
        assert_eq!(mesh.vertices, tetgen.vertices);
        assert_eq!(mesh.tets, tetgen.tets);
    }

    #[test]
    fn test_cubit_scale() {
        let text = "*HEADING\r\n\
                    cubit(scaled.inp): 01/01/2026: 00:00:00\r\n\
                    *NODE\r\n\
                    1, 1.0, 2.0, 3.0\r\n\
                    2, 0.0, 0.0, 0.0\r\n\
                    3, 1.0, 0.0, 0.0\r\n\
                    4, 0.0, 1.0, 0.0\r\n\
                    5, 0.0, 0.0, 1.0\r\n\
                    *ELEMENT, TYPE=C3D4, ELSET=EB1\r\n\
                    1, 5, 2, 3, 4\r\n";
        let mesh = parse_cubit(Path::new("scaled.inp"), text, 1e-6).unwrap();
        let v = mesh.vertices[0];
        assert!(relative_eq!(v, Point3::new(1e-6, 2e-6, 3e-6), epsilon = 1e-18));
        // element reference 5 is vertex 4
        assert_eq!(mesh.tets[0], [4, 1, 2, 3]);
    }

    #[test]
    fn test_cubit_space_separated() {
        let text = "*HEADING\nanything\n*NODE\n1 0 0 0\n2 1 0 0\n3 0 1 0\n4 0 0 1\n*ELEMENT\n1 1 2 3 4\n";
        let mesh = parse_cubit(Path::new("spaces.inp"), text, 2.0).unwrap();
        assert_eq!(mesh.vertices[1], Point3::new(2.0, 0.0, 0.0));
        assert_eq!(mesh.tets, vec![[0, 1, 2, 3]]);
    }

    #[test]
    fn test_cubit_format_violations() {
        let nodes = "1, 0, 0, 0\n2, 1, 0, 0\n3, 0, 1, 0\n4, 0, 0, 1\n";
        let cases = [
            // wrong first marker
            format!("*HEADER\nc\n*NODE\n{nodes}*ELEMENT\n1, 1, 2, 3, 4\n"),
            // wrong third marker
            format!("*HEADING\nc\n*NODES\n{nodes}*ELEMENT\n1, 1, 2, 3, 4\n"),
            // truncated header
            "*HEADING\nc\n".to_string(),
            // no element section
            format!("*HEADING\nc\n*NODE\n{nodes}"),
            // a node record with a missing coordinate
            format!("*HEADING\nc\n*NODE\n1, 0, 0\n{nodes}*ELEMENT\n1, 1, 2, 3, 4\n"),
            // an element with five nodes
            format!("*HEADING\nc\n*NODE\n{nodes}*ELEMENT\n1, 1, 2, 3, 4, 4\n"),
            // a zero reference
            format!("*HEADING\nc\n*NODE\n{nodes}*ELEMENT\n1, 0, 1, 2, 3\n"),
            // a reference past the last node
            format!("*HEADING\nc\n*NODE\n{nodes}*ELEMENT\n1, 1, 2, 3, 5\n"),
        ];

        for text in cases.iter() {
            let e = parse_cubit(Path::new("bad.inp"), text, 1.0).unwrap_err();
            assert!(
                matches!(kind(&e), ExchangeError::Format { .. }),
                "expected a format error for {text:?}, got {e}"
            );
        }
    }

    #[test]
    fn test_read_cubit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bipyramid.inp");

        let e = read_cubit(&path, 1.0).unwrap_err();
        assert_eq!(kind(&e), &ExchangeError::MissingFile(path.clone()));

        fs::write(&path, BIPYRAMID).unwrap();
        let mesh = read_cubit(&path, 1.0).unwrap();
        assert_eq!(mesh.count_tets(), 2);
        assert_eq!(mesh.source.format, Some(MeshFormat::Cubit));
        assert_eq!(mesh.source.path.as_deref(), Some(path.as_path()));
    }
}
