use crate::model::{Attributes, MAX_BLEND_WEIGHTS};
use crate::scene::Geometry;

use super::types::ConvertOptions;

/// Which per-vertex source channels a geometry actually provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct SourceChannels {
    pub(super) normal: bool,
    pub(super) color: bool,
    pub(super) tangent: bool,
    pub(super) texcoord: bool,
}

impl SourceChannels {
    /// A channel counts as present only when it covers every polygon-vertex.
    pub(super) fn of(geometry: &Geometry) -> Self {
        let count = geometry.vertex_count();
        let covers = |len: Option<usize>| len.is_some_and(|len| len >= count);

        Self {
            normal: covers(geometry.normals.as_ref().map(Vec::len)),
            color: covers(geometry.colors.as_ref().map(Vec::len)),
            tangent: covers(geometry.tangents.as_ref().map(Vec::len)),
            texcoord: covers(geometry.uvs.as_ref().map(Vec::len)),
        }
    }
}

/// Derives the vertex layout for one source mesh.
///
/// `blend_weights` is the reduced per-vertex weight count from the skin, not
/// the configured maximum; it is clamped to the slot limit.
pub(super) fn resolve_attributes(
    channels: SourceChannels,
    options: &ConvertOptions,
    blend_weights: usize,
) -> Attributes {
    let mut attributes = Attributes::POSITION;

    if channels.normal {
        attributes |= Attributes::NORMAL;
    }
    if channels.color {
        attributes |= if options.pack_vertex_colors {
            Attributes::COLOR_PACKED
        } else {
            Attributes::COLOR
        };
    }
    if channels.tangent {
        attributes |= Attributes::TANGENT;
    }
    if channels.texcoord {
        attributes |= Attributes::TEXCOORD0;
    }
    for slot in 0..blend_weights.min(MAX_BLEND_WEIGHTS) {
        attributes |= Attributes::blend_weight(slot);
    }

    attributes
}
