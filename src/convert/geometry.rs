use crate::error::ConvertError;
use crate::math::{Matrix, normal_matrix, transform_direction, transform_point};
use crate::model::{Attributes, Mesh, MeshPart, NodePart, Primitive};
use crate::scene::{Geometry, MeshObject, to_matrix};

use super::Converter;
use super::attributes::{SourceChannels, resolve_attributes};
use super::partition::{Partition, partition_by_material, partition_by_skin};
use super::skinning::{BlendWeights, reduce_skin_weights};
use super::weld::VertexWelder;

// ─── Mesh bucketing ───────────────────────────────────────────────────────────

/// Picks the mesh buffer that receives `incoming` more vertices of layout
/// `attributes`, creating one when no existing buffer has room under `cap`.
///
/// `welders` runs parallel to `meshes`.
pub(super) fn find_or_create_mesh(
    meshes: &mut Vec<Mesh>,
    welders: &mut Vec<VertexWelder>,
    attributes: Attributes,
    incoming: usize,
    cap: usize,
    dropped_bits: u32,
) -> usize {
    if let Some(index) = meshes
        .iter()
        .position(|mesh| mesh.attributes == attributes && mesh.vertex_count() + incoming < cap)
    {
        return index;
    }

    meshes.push(Mesh::new(attributes));
    welders.push(VertexWelder::new(dropped_bits));
    meshes.len() - 1
}

// ─── Vertex fetch ─────────────────────────────────────────────────────────────

/// Produces interleaved vertices for one source mesh in a fixed layout.
struct VertexSource<'a> {
    geometry: &'a Geometry,
    attributes: Attributes,
    transform: Matrix,
    normal_transform: Matrix,
    flip_v: bool,
    weights: Option<&'a BlendWeights>,
}

impl VertexSource<'_> {
    /// Writes source vertex `vertex` into `out`. Blend-weight bone ids are
    /// rewritten to their index in `bones`, the partition's bone list.
    fn fetch(&self, vertex: usize, bones: &[usize], out: &mut [f32]) {
        let geometry = self.geometry;
        let mut cursor = 0usize;
        let mut put = |values: &[f32]| {
            out[cursor..cursor + values.len()].copy_from_slice(values);
            cursor += values.len();
        };

        let position = geometry.positions.get(vertex).copied().unwrap_or_default();
        put(&narrow(transform_point(&self.transform, position)));

        if self.attributes.contains(Attributes::NORMAL) {
            let normal = channel_value(&geometry.normals, vertex);
            put(&narrow(transform_direction(&self.normal_transform, normal)));
        }
        if self.attributes.contains(Attributes::COLOR) {
            let color: [f64; 4] = channel_value(&geometry.colors, vertex);
            put(&color.map(|c| c as f32));
        } else if self.attributes.contains(Attributes::COLOR_PACKED) {
            put(&[pack_color(channel_value(&geometry.colors, vertex))]);
        }
        if self.attributes.contains(Attributes::TANGENT) {
            let tangent = channel_value(&geometry.tangents, vertex);
            put(&narrow(transform_direction(&self.normal_transform, tangent)));
        }
        if self.attributes.contains(Attributes::TEXCOORD0) {
            let [u, v]: [f64; 2] = channel_value(&geometry.uvs, vertex);
            let v = if self.flip_v { 1.0 - v } else { v };
            put(&[u as f32, v as f32]);
        }
        if let Some(weights) = self.weights {
            for slot in weights.vertex(vertex) {
                let local = bones
                    .iter()
                    .position(|bone| slot.is_used() && *bone == slot.bone as usize);
                match local {
                    Some(local) => put(&[local as f32, slot.weight]),
                    None => put(&[0.0, 0.0]),
                }
            }
        }
    }
}

fn channel_value<T: Copy + Default>(channel: &Option<Vec<T>>, vertex: usize) -> T {
    channel
        .as_ref()
        .and_then(|values| values.get(vertex).copied())
        .unwrap_or_default()
}

fn narrow(values: [f64; 3]) -> [f32; 3] {
    values.map(|value| value as f32)
}

/// Packs an RGBA color into the bit pattern of one float, as ABGR bytes with
/// the alpha low bit cleared so the result is never a NaN.
pub(super) fn pack_color(rgba: [f64; 4]) -> f32 {
    let [r, g, b, a] = rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u32);
    let bits = (a << 24) | (b << 16) | (g << 8) | r;
    f32::from_bits(bits & 0xfeff_ffff)
}

// ─── Mesh conversion ──────────────────────────────────────────────────────────

impl Converter<'_> {
    /// Converts one source mesh into mesh parts appended to the model's mesh
    /// buffers, returning the node parts that draw them.
    pub(super) fn convert_mesh(
        &mut self,
        node_id: &str,
        mesh: &MeshObject,
    ) -> Result<Vec<NodePart>, ConvertError> {
        let geometry = &mesh.geometry;
        let triangle_count = geometry.triangle_count();
        if triangle_count == 0 {
            log::debug!("mesh '{node_id}' has no triangles");
            return Ok(Vec::new());
        }
        let vertex_count = triangle_count * 3;

        let mut weights = match &geometry.skin {
            Some(skin) if self.options.blend_weight_limit() > 0 => {
                reduce_skin_weights(skin, vertex_count, self.options.blend_weight_limit())
            }
            _ => None,
        };
        let attributes = resolve_attributes(
            SourceChannels::of(geometry),
            self.options,
            weights.as_ref().map_or(0, BlendWeights::slots_per_vertex),
        );

        let material_ids = self.mesh_material_ids(node_id, mesh);
        let source_materials = geometry.materials.as_deref();
        let partitioning = match weights.as_mut() {
            Some(weights) => partition_by_skin(
                source_materials,
                triangle_count,
                weights,
                self.options.max_draw_bones,
            ),
            None => partition_by_material(source_materials, triangle_count),
        };
        if partitioning.culled_triangles > 0 {
            self.diagnostics.warn(
                "DRAW_BONES_CULLED",
                format!(
                    "mesh '{node_id}': {} triangle(s) referenced more than {} bones; lightest bones were dropped",
                    partitioning.culled_triangles, self.options.max_draw_bones
                ),
            );
        }

        let transform = to_matrix(&mesh.geometric_transform);
        let normal_transform = normal_matrix(&transform).unwrap_or_else(|| {
            self.diagnostics.warn(
                "SINGULAR_MATRIX",
                format!("mesh '{node_id}': geometric transform is singular; normals are left untransformed"),
            );
            Matrix::identity()
        });
        let source = VertexSource {
            geometry,
            attributes,
            transform,
            normal_transform,
            flip_v: self.options.flip_v,
            weights: weights.as_ref(),
        };

        log::debug!(
            "mesh '{node_id}': {triangle_count} triangles, {} partition(s), layout {:?}",
            partitioning.partitions.len(),
            attributes.names()
        );

        let mut node_parts = Vec::new();
        for partition in &partitioning.partitions {
            let material_id = material_ids
                .get(partition.material)
                .or_else(|| material_ids.first())
                .cloned()
                .unwrap_or_default();
            let bones = match (&geometry.skin, source.weights) {
                (Some(skin), Some(_)) => self.bone_bindings(node_id, skin, &partition.bones),
                _ => Vec::new(),
            };

            for mesh_part_id in self.emit_partition(node_id, &source, partition)? {
                node_parts.push(NodePart {
                    mesh_part_id,
                    material_id: material_id.clone(),
                    bones: bones.clone(),
                });
            }
        }

        Ok(node_parts)
    }

    /// Welds a partition into mesh buffers, splitting it when it alone would
    /// overflow the vertex cap. Returns the ids of the mesh parts written.
    fn emit_partition(
        &mut self,
        node_id: &str,
        source: &VertexSource<'_>,
        partition: &Partition,
    ) -> Result<Vec<String>, ConvertError> {
        let cap = self.options.vertex_cap();
        let chunk_size = (cap / 3).max(1);
        if partition.triangles.len() > chunk_size {
            self.diagnostics.warn(
                "PART_SPLIT",
                format!(
                    "mesh '{node_id}': a draw partition of {} triangles exceeds the {cap} vertex cap and was split",
                    partition.triangles.len()
                ),
            );
        }

        let mut ids = Vec::new();
        for chunk in partition.triangles.chunks(chunk_size) {
            let mesh_index = find_or_create_mesh(
                &mut self.model.meshes,
                &mut self.welders,
                source.attributes,
                chunk.len() * 3,
                cap,
                self.options.weld_dropped_bits,
            );
            let part_id = format!("{node_id}_part{}", self.next_part_id);
            self.next_part_id += 1;

            let mesh = &mut self.model.meshes[mesh_index];
            let indices = self.welders[mesh_index].weld_triangles(
                mesh,
                &part_id,
                chunk,
                |vertex, out| source.fetch(vertex, &partition.bones, out),
            )?;
            mesh.parts.push(MeshPart {
                id: part_id.clone(),
                primitive: Primitive::Triangles,
                indices,
            });
            ids.push(part_id);
        }

        Ok(ids)
    }
}
