use crate::scene::Skin;

use super::types::NEGLIGIBLE_WEIGHT;

// ─── Blend weight table ───────────────────────────────────────────────────────

/// One blend-weight slot. `bone` is a cluster index, `-1` when the slot is empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct BlendWeight {
    pub(super) bone: i32,
    pub(super) weight: f32,
}

impl BlendWeight {
    pub(super) const EMPTY: Self = Self {
        bone: -1,
        weight: 0.0,
    };

    pub(super) fn is_used(&self) -> bool {
        self.bone >= 0 && self.weight != 0.0
    }
}

/// Fixed-width weight slots for every vertex of one source mesh.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct BlendWeights {
    slots_per_vertex: usize,
    slots: Vec<BlendWeight>,
}

impl BlendWeights {
    fn new(vertex_count: usize, slots_per_vertex: usize) -> Self {
        Self {
            slots_per_vertex,
            slots: vec![BlendWeight::EMPTY; vertex_count * slots_per_vertex],
        }
    }

    pub(super) fn slots_per_vertex(&self) -> usize {
        self.slots_per_vertex
    }

    pub(super) fn vertex(&self, vertex: usize) -> &[BlendWeight] {
        let start = vertex * self.slots_per_vertex;
        &self.slots[start..start + self.slots_per_vertex]
    }

    pub(super) fn vertex_mut(&mut self, vertex: usize) -> &mut [BlendWeight] {
        let start = vertex * self.slots_per_vertex;
        &mut self.slots[start..start + self.slots_per_vertex]
    }
}

/// Rescales a vertex's weights to sum to one. A zero sum leaves them untouched.
pub(super) fn normalize_vertex(slots: &mut [BlendWeight]) {
    let sum: f32 = slots.iter().map(|slot| slot.weight).sum();
    if sum != 0.0 {
        for slot in slots.iter_mut() {
            slot.weight /= sum;
        }
    }
}

// ─── Reduction ────────────────────────────────────────────────────────────────

/// Reduces per-cluster influence lists to at most `max_blend_weights` slots
/// per vertex, keeping each vertex's largest-magnitude influences and
/// normalizing them.
///
/// # Arguments
///
/// * `skin` - Clusters with parallel index/weight arrays; the shorter length wins.
/// * `vertex_count` - Polygon-vertex count of the geometry.
/// * `max_blend_weights` - Configured slot limit.
///
/// # Returns
///
/// `None` when no vertex has an effective influence or the limit is zero.
pub(super) fn reduce_skin_weights(
    skin: &Skin,
    vertex_count: usize,
    max_blend_weights: usize,
) -> Option<BlendWeights> {
    let slots_per_vertex = count_influences(skin, vertex_count).min(max_blend_weights);
    if slots_per_vertex == 0 {
        return None;
    }

    let mut weights = BlendWeights::new(vertex_count, slots_per_vertex);

    for (bone, cluster) in skin.clusters.iter().enumerate() {
        for (&index, &weight) in cluster.indices.iter().zip(&cluster.weights) {
            let Some(vertex) = vertex_index(index, vertex_count) else {
                continue;
            };
            if weight.abs() <= NEGLIGIBLE_WEIGHT {
                continue;
            }

            let weight = weight as f32;
            let slots = weights.vertex_mut(vertex);
            let mut smallest = 0;
            for (slot, entry) in slots.iter().enumerate().skip(1) {
                if entry.weight.abs() < slots[smallest].weight.abs() {
                    smallest = slot;
                }
            }

            if weight.abs() > slots[smallest].weight.abs() {
                slots[smallest] = BlendWeight {
                    bone: bone as i32,
                    weight,
                };
            }
        }
    }

    for vertex in 0..vertex_count {
        normalize_vertex(weights.vertex_mut(vertex));
    }

    Some(weights)
}

/// Largest number of distinct clusters referencing any single vertex with a
/// non-zero weight.
fn count_influences(skin: &Skin, vertex_count: usize) -> usize {
    let mut counts = vec![0usize; vertex_count];
    let mut last_cluster = vec![usize::MAX; vertex_count];

    for (bone, cluster) in skin.clusters.iter().enumerate() {
        for (&index, &weight) in cluster.indices.iter().zip(&cluster.weights) {
            let Some(vertex) = vertex_index(index, vertex_count) else {
                continue;
            };
            if weight == 0.0 || last_cluster[vertex] == bone {
                continue;
            }
            last_cluster[vertex] = bone;
            counts[vertex] += 1;
        }
    }

    counts.into_iter().max().unwrap_or(0)
}

fn vertex_index(index: i32, vertex_count: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|vertex| *vertex < vertex_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Cluster;

    fn cluster(indices: Vec<i32>, weights: Vec<f64>) -> Cluster {
        Cluster {
            link: 0,
            indices,
            weights,
            transform: [0.0; 16],
            transform_link: [0.0; 16],
        }
    }

    fn weight_sum(slots: &[BlendWeight]) -> f32 {
        slots.iter().map(|slot| slot.weight).sum()
    }

    #[test]
    fn given_five_influences_when_reducing_to_four_then_largest_are_kept_and_normalized() {
        let skin = Skin {
            clusters: [0.4, 0.3, 0.1, 0.1, 0.1]
                .into_iter()
                .map(|weight| cluster(vec![0], vec![weight]))
                .collect(),
        };

        let weights = reduce_skin_weights(&skin, 1, 4).expect("vertex is skinned");
        let slots = weights.vertex(0);

        assert_eq!(weights.slots_per_vertex(), 4);
        let mut kept: Vec<f32> = slots.iter().map(|slot| slot.weight).collect();
        kept.sort_by(|a, b| b.total_cmp(a));
        let expected = [0.4 / 0.9, 0.3 / 0.9, 0.1 / 0.9, 0.1 / 0.9];
        for (actual, expected) in kept.iter().zip(expected) {
            assert!((actual - expected).abs() < 1e-5, "{kept:?}");
        }
        assert!(slots.iter().any(|slot| slot.bone == 0));
        assert!(slots.iter().any(|slot| slot.bone == 1));
        assert!((weight_sum(slots) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn given_sparse_influences_when_reducing_then_slot_count_follows_observed_maximum() {
        let skin = Skin {
            clusters: vec![
                cluster(vec![0, 1], vec![0.5, 1.0]),
                cluster(vec![0], vec![0.5]),
            ],
        };

        let weights = reduce_skin_weights(&skin, 3, 8).expect("vertices are skinned");

        assert_eq!(weights.slots_per_vertex(), 2);
        assert!((weight_sum(weights.vertex(0)) - 1.0).abs() < 1e-6);
        assert!((weight_sum(weights.vertex(1)) - 1.0).abs() < 1e-6);
        assert!(weights.vertex(2).iter().all(|slot| *slot == BlendWeight::EMPTY));
    }

    #[test]
    fn given_mismatched_arrays_when_reducing_then_shorter_length_is_used() {
        let skin = Skin {
            clusters: vec![cluster(vec![0, 1, 2], vec![1.0])],
        };

        let weights = reduce_skin_weights(&skin, 3, 4).expect("vertex 0 is skinned");

        assert_eq!(weights.vertex(0)[0].bone, 0);
        assert!(weights.vertex(1).iter().all(|slot| !slot.is_used()));
    }

    #[test]
    fn given_out_of_range_and_zero_weights_when_reducing_then_skin_is_absent() {
        let skin = Skin {
            clusters: vec![cluster(vec![-1, 7, 0], vec![1.0, 1.0, 0.0])],
        };

        assert!(reduce_skin_weights(&skin, 3, 4).is_none());
    }

    #[test]
    fn given_zero_blend_weight_limit_when_reducing_then_skinning_is_disabled() {
        let skin = Skin {
            clusters: vec![cluster(vec![0], vec![1.0])],
        };

        assert!(reduce_skin_weights(&skin, 1, 0).is_none());
    }
}
