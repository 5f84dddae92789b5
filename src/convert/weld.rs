use std::collections::HashMap;

use crate::error::ConvertError;
use crate::model::Mesh;

/// Mantissa bits available in an `f32`; dropping more would merge unrelated values.
const MAX_DROPPED_BITS: u32 = 23;

/// Deduplicates vertices appended to one mesh buffer.
///
/// Two vertices are equal when every float matches after masking off the
/// lowest `dropped_bits` bits, so values that only differ by transform
/// round-off collapse into one.
#[derive(Debug, Clone)]
pub(super) struct VertexWelder {
    mask: u32,
    buckets: HashMap<u64, Vec<u32>>,
}

impl VertexWelder {
    pub(super) fn new(dropped_bits: u32) -> Self {
        Self {
            mask: u32::MAX << dropped_bits.min(MAX_DROPPED_BITS),
            buckets: HashMap::new(),
        }
    }

    /// Returns the index of an existing matching vertex, or appends `vertex`.
    pub(super) fn weld(&mut self, vertices: &mut Vec<f32>, vertex: &[f32]) -> usize {
        let size = vertex.len();
        let hash = self.loose_hash(vertex);

        if let Some(candidates) = self.buckets.get(&hash) {
            for &candidate in candidates {
                let start = candidate as usize * size;
                if self.loose_eq(&vertices[start..start + size], vertex) {
                    return candidate as usize;
                }
            }
        }

        let index = vertices.len() / size.max(1);
        vertices.extend_from_slice(vertex);
        self.buckets.entry(hash).or_default().push(index as u32);
        index
    }

    /// Welds every corner of `triangles` into `mesh`, producing its index list.
    ///
    /// # Arguments
    ///
    /// * `mesh` - Target buffer; its layout defines the vertex size.
    /// * `part_id` - Used for error reporting.
    /// * `triangles` - Source triangle numbers; corner `c` of triangle `t` is
    ///   source vertex `3t + c`.
    /// * `fetch` - Writes the interleaved vertex for a source vertex index.
    ///
    /// # Returns
    ///
    /// Three indices per triangle, or an error when an index leaves the
    /// 16-bit range.
    pub(super) fn weld_triangles(
        &mut self,
        mesh: &mut Mesh,
        part_id: &str,
        triangles: &[usize],
        mut fetch: impl FnMut(usize, &mut [f32]),
    ) -> Result<Vec<u16>, ConvertError> {
        let mut scratch = vec![0.0f32; mesh.vertex_size];
        let mut indices = Vec::with_capacity(triangles.len() * 3);

        for &triangle in triangles {
            for vertex in triangle * 3..triangle * 3 + 3 {
                scratch.iter_mut().for_each(|value| *value = 0.0);
                fetch(vertex, &mut scratch);
                let index = self.weld(&mut mesh.vertices, &scratch);
                let index = u16::try_from(index).map_err(|_| ConvertError::IndexOverflow {
                    part: part_id.to_string(),
                    index,
                })?;
                indices.push(index);
            }
        }

        Ok(indices)
    }

    fn loose_hash(&self, vertex: &[f32]) -> u64 {
        // FNV-1a over the masked bit patterns.
        vertex.iter().fold(0xcbf2_9ce4_8422_2325u64, |hash, value| {
            (hash ^ u64::from(value.to_bits() & self.mask)).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }

    fn loose_eq(&self, a: &[f32], b: &[f32]) -> bool {
        a.iter()
            .zip(b)
            .all(|(x, y)| x.to_bits() & self.mask == y.to_bits() & self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attributes;

    #[test]
    fn given_repeated_vertex_when_welding_then_index_is_reused() {
        let mut welder = VertexWelder::new(4);
        let mut vertices = Vec::new();

        let a = welder.weld(&mut vertices, &[1.0, 2.0, 3.0]);
        let b = welder.weld(&mut vertices, &[4.0, 5.0, 6.0]);
        let c = welder.weld(&mut vertices, &[1.0, 2.0, 3.0]);

        assert_eq!((a, b, c), (0, 1, 0));
        assert_eq!(vertices.len(), 6);
    }

    #[test]
    fn given_round_off_difference_when_welding_then_vertices_merge() {
        let mut welder = VertexWelder::new(4);
        let mut vertices = Vec::new();
        let nudged = f32::from_bits(1.0f32.to_bits() + 1);

        let a = welder.weld(&mut vertices, &[1.0, 0.0, 0.0]);
        let b = welder.weld(&mut vertices, &[nudged, 0.0, 0.0]);

        assert_eq!(a, b);
    }

    #[test]
    fn given_zero_dropped_bits_when_welding_then_comparison_is_exact() {
        let mut welder = VertexWelder::new(0);
        let mut vertices = Vec::new();
        let nudged = f32::from_bits(1.0f32.to_bits() + 1);

        let a = welder.weld(&mut vertices, &[1.0]);
        let b = welder.weld(&mut vertices, &[nudged]);

        assert_ne!(a, b);
    }

    #[test]
    fn given_single_triangle_when_welding_then_indices_are_sequential() {
        let mut mesh = Mesh::new(Attributes::POSITION);
        let positions = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

        let indices = VertexWelder::new(4)
            .weld_triangles(&mut mesh, "part", &[0], |vertex, out| {
                out.copy_from_slice(&positions[vertex])
            })
            .expect("indices fit");

        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    fn given_same_stream_twice_when_welding_then_output_is_identical() {
        let stream: Vec<[f32; 3]> = (0..12)
            .map(|i| [(i % 4) as f32, (i % 3) as f32 * 0.5, 1.0])
            .collect();
        let run = || {
            let mut mesh = Mesh::new(Attributes::POSITION);
            let indices = VertexWelder::new(4)
                .weld_triangles(&mut mesh, "part", &[0, 1, 2, 3], |vertex, out| {
                    out.copy_from_slice(&stream[vertex])
                })
                .expect("indices fit");
            (mesh.vertices, indices)
        };

        assert_eq!(run(), run());
    }
}
