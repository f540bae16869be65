//! Minimal mesh format and text mesh parser.
//!
//! Only vertex positions (`v x y z`) and triangular faces (`f i j k`) are
//! read; every other record is skipped.

use std::path::Path;

use bytemuck::{Pod, Zeroable};

use crate::error::{Error, Result};

/// Position-only vertex (binding 0, location 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: [f32; 3],
}

/// Interleaved position/color vertex (binding 0, locations 0 and 1).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// CPU-side mesh: packed positions, optional per-vertex colors and
/// 0-based triangle indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub colors: Option<Vec<[f32; 3]>>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_colors(&self) -> bool {
        self.colors.is_some()
    }

    /// Check that every index refers to an existing vertex.
    ///
    /// The parser is permissive and accepts forward or dangling references,
    /// so this must pass before the index data is handed to the GPU.
    pub fn validate(&self) -> Result<()> {
        if let Some(colors) = &self.colors {
            if colors.len() != self.positions.len() {
                return Err(Error::InvalidMesh(format!(
                    "{} colors for {} positions",
                    colors.len(),
                    self.positions.len()
                )));
            }
        }

        let count = self.positions.len();
        match self.indices.iter().position(|&i| i as usize >= count) {
            Some(at) => Err(Error::InvalidMesh(format!(
                "index {} at position {at} out of range for {count} vertices",
                self.indices[at]
            ))),
            None => Ok(()),
        }
    }

    /// Position-only vertex stream.
    pub fn position_vertices(&self) -> Vec<PositionVertex> {
        self.positions
            .iter()
            .map(|&position| PositionVertex { position })
            .collect()
    }

    /// Interleaved position/color vertex stream. Vertices without a color
    /// are white.
    pub fn color_vertices(&self) -> Vec<ColorVertex> {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, &position)| ColorVertex {
                position,
                color: self
                    .colors
                    .as_ref()
                    .and_then(|c| c.get(i).copied())
                    .unwrap_or([1.0, 1.0, 1.0]),
            })
            .collect()
    }

    /// Unit cube with one color per corner. Faces are wound clockwise when
    /// seen from outside in a left-handed frame, the renderer's front face.
    pub fn demo_cube() -> Self {
        let positions = vec![
            [-0.5, -0.5, -0.5],
            [0.5, -0.5, -0.5],
            [0.5, 0.5, -0.5],
            [-0.5, 0.5, -0.5],
            [-0.5, -0.5, 0.5],
            [0.5, -0.5, 0.5],
            [0.5, 0.5, 0.5],
            [-0.5, 0.5, 0.5],
        ];
        let colors = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ];
        #[rustfmt::skip]
        let indices = vec![
            4, 5, 6, 4, 6, 7, // +z
            1, 0, 3, 1, 3, 2, // -z
            5, 1, 2, 5, 2, 6, // +x
            0, 4, 7, 0, 7, 3, // -x
            7, 6, 2, 7, 2, 3, // +y
            0, 1, 5, 0, 5, 4, // -y
        ];

        Self {
            positions,
            colors: Some(colors),
            indices,
        }
    }
}

/// Read and parse a mesh file.
pub fn load_obj(path: impl AsRef<Path>) -> Result<Mesh> {
    let text = std::fs::read_to_string(path)?;
    parse_obj(&text)
}

/// Parse a line-oriented mesh description.
///
/// Accepts LF and CRLF line endings. Face indices are 1-based in the text and
/// 0-based in the result; `i/t/n` references keep only the position index and
/// polygons with more than three corners are split into a triangle fan.
pub fn parse_obj(text: &str) -> Result<Mesh> {
    let mut mesh = Mesh::default();

    for (number, raw) in text.split('\n').enumerate() {
        let line_number = number + 1;
        let line = raw.trim_end_matches('\r').trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("v") => {
                let mut position = [0.0f32; 3];
                for component in &mut position {
                    let token = tokens.next().ok_or_else(|| {
                        Error::parse(line_number, "vertex needs three coordinates")
                    })?;
                    *component = token.parse().map_err(|_| {
                        Error::parse(line_number, format!("invalid coordinate `{token}`"))
                    })?;
                }
                mesh.positions.push(position);
            }
            Some("f") => {
                let corners = tokens
                    .map(|token| parse_face_index(token, line_number))
                    .collect::<Result<Vec<u32>>>()?;
                if corners.len() < 3 {
                    return Err(Error::parse(line_number, "face needs at least three vertices"));
                }
                for i in 1..corners.len() - 1 {
                    mesh.indices
                        .extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
                }
            }
            _ => {}
        }
    }

    Ok(mesh)
}

fn parse_face_index(token: &str, line: usize) -> Result<u32> {
    let position = token.split('/').next().unwrap_or(token);
    let index: u32 = position
        .parse()
        .map_err(|_| Error::parse(line, format!("invalid face index `{token}`")))?;
    index
        .checked_sub(1)
        .ok_or_else(|| Error::parse(line, "face indices are 1-based"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn single_degenerate_triangle() {
        let mesh = parse_obj("v 1.000000e+00 2.000000e+00 -3.000000e+00\nf 1 2 3\n").unwrap();

        assert_eq!(mesh.positions.len(), 1);
        assert_relative_eq!(mesh.positions[0][0], 1.0);
        assert_relative_eq!(mesh.positions[0][1], 2.0);
        assert_relative_eq!(mesh.positions[0][2], -3.0);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn crlf_and_lf_give_the_same_mesh() {
        let lf = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let crlf = "v 0 0 0\r\nv 1 0 0\r\nv 0 1 0\r\nf 1 2 3\r\n";
        assert_eq!(parse_obj(lf).unwrap(), parse_obj(crlf).unwrap());
    }

    #[test]
    fn ignores_unsupported_records() {
        let text = "# comment\nmtllib a.mtl\no thing\n\
                    v 0 0 0\nvn 0 0 1\nvt 0 0\nv 1 0 0\nv 0 1 0\n\
                    s off\nf 1/1/1 2/2/1 3/3/1\n";
        let mesh = parse_obj(text).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert!(!mesh.has_colors());
    }

    #[test]
    fn quads_become_triangle_fans() {
        let mesh = parse_obj("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn rejects_zero_index_and_bad_numbers() {
        assert!(matches!(
            parse_obj("v 0 0 0\nf 0 1 2\n"),
            Err(Error::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_obj("v 0 zero 0\n"),
            Err(Error::Parse { line: 1, .. })
        ));
        assert!(parse_obj("v 0 0\n").is_err());
        assert!(parse_obj("f 1 2\n").is_err());
    }

    #[test]
    fn validate_catches_dangling_indices() {
        let mesh = parse_obj("v 1 2 3\nf 1 2 3\n").unwrap();
        assert!(matches!(mesh.validate(), Err(Error::InvalidMesh(_))));
        assert!(Mesh::demo_cube().validate().is_ok());
    }

    #[test]
    fn validate_catches_color_count_mismatch() {
        let mut mesh = Mesh::demo_cube();
        if let Some(colors) = mesh.colors.as_mut() {
            colors.pop();
        }
        let err = mesh.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));
        assert!(err.to_string().contains("7 colors for 8 positions"));
    }

    #[test]
    fn demo_cube_layout() {
        let cube = Mesh::demo_cube();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.triangle_count(), 12);
        assert_eq!(cube.color_vertices()[1].color, [1.0, 0.0, 0.0]);
        assert_eq!(cube.position_vertices()[6].position, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn vertex_sizes_match_pipeline_strides() {
        assert_eq!(std::mem::size_of::<PositionVertex>(), 12);
        assert_eq!(std::mem::size_of::<ColorVertex>(), 24);
    }
}
