//! OBJ loader for mesh assets
//!
//! Reads positions (`v`, with the common `v x y z r g b` color extension),
//! texture coordinates (`vt`) and faces (`f`). Faces with more than three
//! corners are fan-triangulated. Normals and material statements are skipped;
//! the sprite/model shaders do not light per vertex.

use std::io::{BufRead, BufReader};

use super::{AssetError, MeshData};
use crate::resources::Vertex;

/// Wavefront OBJ parser
pub struct ObjLoader;

impl ObjLoader {
    /// Parse an OBJ document into mesh data
    pub fn parse(bytes: &[u8]) -> Result<MeshData, AssetError> {
        let reader = BufReader::new(bytes);

        let mut positions: Vec<([f32; 3], [f32; 4])> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut data = MeshData::default();

        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };
            let args: Vec<&str> = parts.collect();

            match keyword {
                "v" => {
                    let values = parse_floats(&args, line_number)?;
                    match values.len() {
                        3 | 4 => positions.push(([values[0], values[1], values[2]], Vertex::WHITE)),
                        6 | 7 => positions.push((
                            [values[0], values[1], values[2]],
                            [values[3], values[4], values[5], 1.0],
                        )),
                        _ => return Err(invalid(line_number, "vertex needs 3 coordinates")),
                    }
                }
                "vt" => {
                    let values = parse_floats(&args, line_number)?;
                    if values.len() < 2 {
                        return Err(invalid(line_number, "texture coordinate needs 2 components"));
                    }
                    tex_coords.push([values[0], values[1]]);
                }
                "f" => {
                    if args.len() < 3 {
                        return Err(invalid(line_number, "face needs at least 3 corners"));
                    }

                    let mut corners = Vec::with_capacity(args.len());
                    for corner in &args {
                        let mut refs = corner.split('/');
                        let position_ref = refs.next().unwrap_or_default();
                        let tex_ref = refs.next().filter(|r| !r.is_empty());

                        let position_index = resolve_index(position_ref, positions.len(), line_number)?;
                        let (position, color) = positions[position_index];

                        let tex_coord = match tex_ref {
                            Some(r) => tex_coords[resolve_index(r, tex_coords.len(), line_number)?],
                            None => [0.0, 0.0],
                        };

                        data.vertices.push(Vertex::new(position, tex_coord, color));
                        corners.push((data.vertices.len() - 1) as u32);
                    }

                    // Fan triangulation
                    for i in 1..corners.len() - 1 {
                        data.indices.extend([corners[0], corners[i], corners[i + 1]]);
                    }
                }
                _ => {
                    // Normals, groups, materials and smoothing are not used
                }
            }
        }

        if data.vertices.is_empty() {
            return Err(AssetError::InvalidData("No faces found in OBJ data".to_string()));
        }

        Ok(data)
    }
}

fn invalid(line_number: usize, message: &str) -> AssetError {
    AssetError::InvalidData(format!("OBJ line {}: {message}", line_number + 1))
}

fn parse_floats(args: &[&str], line_number: usize) -> Result<Vec<f32>, AssetError> {
    args.iter()
        .map(|arg| {
            arg.parse::<f32>()
                .map_err(|_| invalid(line_number, &format!("invalid number '{arg}'")))
        })
        .collect()
}

/// Resolve a 1-based (or negative, relative) OBJ index into a 0-based one
fn resolve_index(reference: &str, len: usize, line_number: usize) -> Result<usize, AssetError> {
    let value: i64 = reference
        .parse()
        .map_err(|_| invalid(line_number, &format!("invalid index '{reference}'")))?;

    let resolved = match value {
        v if v > 0 => v - 1,
        v if v < 0 => len as i64 + v,
        _ => return Err(invalid(line_number, "index 0 is not valid")),
    };

    if resolved < 0 || resolved as usize >= len {
        return Err(invalid(line_number, &format!("index {value} out of range")));
    }
    Ok(resolved as usize)
}
