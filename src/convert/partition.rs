use super::skinning::{BlendWeight, BlendWeights, normalize_vertex};

/// Triangles sharing one material and a bounded bone set; becomes one draw call.
#[derive(Debug, Clone, PartialEq, Default)]
pub(super) struct Partition {
    /// Material slot of the source mesh.
    pub(super) material: usize,
    /// Cluster indices in first-use order. A vertex's part-local bone index is
    /// its position in this list.
    pub(super) bones: Vec<usize>,
    pub(super) triangles: Vec<usize>,
}

/// Outcome of partitioning one source mesh.
#[derive(Debug, Clone, PartialEq, Default)]
pub(super) struct Partitioning {
    pub(super) partitions: Vec<Partition>,
    /// Triangles whose bone set had to be trimmed to the draw bone budget.
    pub(super) culled_triangles: usize,
}

/// Material of a triangle: the first non-negative id among its corners, else 0.
pub(super) fn triangle_material(material_ids: Option<&[i32]>, triangle: usize) -> usize {
    material_ids
        .and_then(|ids| {
            (triangle * 3..triangle * 3 + 3)
                .filter_map(|vertex| ids.get(vertex).copied())
                .find(|id| *id >= 0)
        })
        .map(|id| id as usize)
        .unwrap_or(0)
}

// ─── Unskinned ────────────────────────────────────────────────────────────────

/// Groups triangles by material only.
pub(super) fn partition_by_material(
    material_ids: Option<&[i32]>,
    triangle_count: usize,
) -> Partitioning {
    let mut partitions = Vec::<Partition>::new();

    for triangle in 0..triangle_count {
        let material = triangle_material(material_ids, triangle);
        match partitions.iter_mut().find(|part| part.material == material) {
            Some(part) => part.triangles.push(triangle),
            None => partitions.push(Partition {
                material,
                bones: Vec::new(),
                triangles: vec![triangle],
            }),
        }
    }

    Partitioning {
        partitions,
        culled_triangles: 0,
    }
}

// ─── Skinned ──────────────────────────────────────────────────────────────────

/// Groups triangles by material and bone set so no partition references more
/// than `max_draw_bones` distinct bones.
///
/// This is a first-fit greedy packing, not an optimal one. Triangles needing
/// more bones than the budget lose their lightest bones first; the weights of
/// the affected vertices are renormalized in `weights`.
pub(super) fn partition_by_skin(
    material_ids: Option<&[i32]>,
    triangle_count: usize,
    weights: &mut BlendWeights,
    max_draw_bones: usize,
) -> Partitioning {
    let max_draw_bones = max_draw_bones.max(1);
    let mut partitions = Vec::<Partition>::new();
    let mut culled_triangles = 0usize;

    for triangle in 0..triangle_count {
        let material = triangle_material(material_ids, triangle);
        let mut bones = triangle_bones(weights, triangle);

        if bones.len() > max_draw_bones {
            culled_triangles += 1;
            bones = cull_triangle_bones(weights, triangle, bones, max_draw_bones);
        }
        let bones: Vec<usize> = bones.into_iter().map(|(bone, _)| bone).collect();

        let fitting = partitions.iter_mut().find(|part| {
            part.material == material
                && part.bones.len() + bones.iter().filter(|b| !part.bones.contains(b)).count()
                    <= max_draw_bones
        });

        match fitting {
            Some(part) => {
                for bone in bones {
                    if !part.bones.contains(&bone) {
                        part.bones.push(bone);
                    }
                }
                part.triangles.push(triangle);
            }
            None => partitions.push(Partition {
                material,
                bones,
                triangles: vec![triangle],
            }),
        }
    }

    Partitioning {
        partitions,
        culled_triangles,
    }
}

/// Union of the bones used by a triangle's corners with summed weights, in
/// first-use order.
fn triangle_bones(weights: &BlendWeights, triangle: usize) -> Vec<(usize, f32)> {
    let mut bones = Vec::<(usize, f32)>::new();
    for vertex in triangle * 3..triangle * 3 + 3 {
        for slot in weights.vertex(vertex).iter().filter(|slot| slot.is_used()) {
            let bone = slot.bone as usize;
            match bones.iter_mut().find(|(id, _)| *id == bone) {
                Some((_, sum)) => *sum += slot.weight,
                None => bones.push((bone, slot.weight)),
            }
        }
    }
    bones
}

/// Keeps the `max_draw_bones` heaviest bones of a triangle, clearing and
/// renormalizing every corner slot that referenced a dropped bone.
fn cull_triangle_bones(
    weights: &mut BlendWeights,
    triangle: usize,
    bones: Vec<(usize, f32)>,
    max_draw_bones: usize,
) -> Vec<(usize, f32)> {
    let mut ranked = bones.clone();
    ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    ranked.truncate(max_draw_bones);

    let kept: Vec<(usize, f32)> = bones
        .into_iter()
        .filter(|(bone, _)| ranked.iter().any(|(kept, _)| kept == bone))
        .collect();

    for vertex in triangle * 3..triangle * 3 + 3 {
        let slots = weights.vertex_mut(vertex);
        for slot in slots.iter_mut() {
            if slot.bone >= 0 && !kept.iter().any(|(bone, _)| *bone == slot.bone as usize) {
                *slot = BlendWeight::EMPTY;
            }
        }
        normalize_vertex(slots);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Cluster, Skin};

    use super::super::skinning::reduce_skin_weights;

    fn skin_from(influences: &[(usize, usize, f64)], bones: usize) -> Skin {
        let mut clusters: Vec<Cluster> = (0..bones)
            .map(|_| Cluster {
                link: 0,
                indices: Vec::new(),
                weights: Vec::new(),
                transform: [0.0; 16],
                transform_link: [0.0; 16],
            })
            .collect();
        for &(bone, vertex, weight) in influences {
            clusters[bone].indices.push(vertex as i32);
            clusters[bone].weights.push(weight);
        }
        Skin { clusters }
    }

    #[test]
    fn given_mixed_materials_when_partitioning_unskinned_then_one_part_per_material() {
        let ids = [-1, 1, 1, 0, 0, 0, -1, -1, -1, 1, -1, -1];

        let result = partition_by_material(Some(&ids[..]), 4);

        assert_eq!(result.partitions.len(), 2);
        assert_eq!(result.partitions[0].material, 1);
        assert_eq!(result.partitions[0].triangles, vec![0, 3]);
        assert_eq!(result.partitions[1].material, 0);
        assert_eq!(result.partitions[1].triangles, vec![1, 2]);
    }

    #[test]
    fn given_no_material_ids_when_partitioning_then_default_material_is_used() {
        let result = partition_by_material(None, 2);

        assert_eq!(result.partitions.len(), 1);
        assert_eq!(result.partitions[0].material, 0);
    }

    #[test]
    fn given_forty_bone_triangle_when_budget_is_32_then_heaviest_bones_survive() {
        // Corners carry 14, 13 and 13 influences; bone weight grows with its id.
        let mut influences = Vec::new();
        for bone in 0..40usize {
            let vertex = bone % 3;
            influences.push((bone, vertex, 1.0 + bone as f64));
        }
        let skin = skin_from(&influences, 40);
        let mut weights = reduce_skin_weights(&skin, 3, 14).expect("skinned");

        let result = partition_by_skin(None, 1, &mut weights, 32);

        assert_eq!(result.culled_triangles, 1);
        assert_eq!(result.partitions.len(), 1);
        let part = &result.partitions[0];
        assert_eq!(part.bones.len(), 32);
        for dropped in 0..8usize {
            assert!(!part.bones.contains(&dropped), "bone {dropped} should be culled");
        }
        for vertex in 0..3 {
            let sum: f32 = weights.vertex(vertex).iter().map(|slot| slot.weight).sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!(
                weights
                    .vertex(vertex)
                    .iter()
                    .filter(|slot| slot.is_used())
                    .all(|slot| slot.bone >= 8)
            );
        }
    }

    #[test]
    fn given_bone_budget_when_partitioning_then_no_part_exceeds_it() {
        // Each triangle uses two of six bones in a rotating pattern.
        let triangle_count = 6;
        let mut influences = Vec::new();
        for triangle in 0..triangle_count {
            for corner in 0..3 {
                let vertex = triangle * 3 + corner;
                influences.push(((triangle + corner % 2) % 6, vertex, 1.0));
            }
        }
        let skin = skin_from(&influences, 6);
        let mut weights = reduce_skin_weights(&skin, triangle_count * 3, 4).expect("skinned");

        let result = partition_by_skin(None, triangle_count, &mut weights, 3);

        assert!(result.partitions.len() > 1);
        assert_eq!(result.culled_triangles, 0);
        let assigned: usize = result.partitions.iter().map(|p| p.triangles.len()).sum();
        assert_eq!(assigned, triangle_count);
        assert!(result.partitions.iter().all(|part| part.bones.len() <= 3));
    }

    #[test]
    fn given_compatible_triangles_when_partitioning_then_parts_are_merged() {
        let influences = [
            (0, 0, 1.0),
            (0, 1, 1.0),
            (1, 2, 1.0),
            (1, 3, 1.0),
            (2, 4, 1.0),
            (2, 5, 1.0),
        ];
        let skin = skin_from(&influences, 3);
        let mut weights = reduce_skin_weights(&skin, 6, 4).expect("skinned");

        let result = partition_by_skin(None, 2, &mut weights, 4);

        assert_eq!(result.partitions.len(), 1);
        assert_eq!(result.partitions[0].bones, vec![0, 1, 2]);
    }
}
