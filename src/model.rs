//! Renderer-ready model produced by the converter and consumed by the writer.

use bitflags::bitflags;

/// Hard upper bound on blend-weight slots a vertex layout can carry.
pub const MAX_BLEND_WEIGHTS: usize = 8;

/// Vertices addressable by a 16-bit index.
pub const INDEX_SPACE: usize = u16::MAX as usize + 1;

bitflags! {
    /// Per-vertex channels carried by a mesh. Interleaving follows bit order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u32 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const COLOR = 1 << 2;
        const COLOR_PACKED = 1 << 3;
        const TANGENT = 1 << 4;
        const TEXCOORD0 = 1 << 5;
        const TEXCOORD1 = 1 << 6;
        const TEXCOORD2 = 1 << 7;
        const TEXCOORD3 = 1 << 8;
        const TEXCOORD4 = 1 << 9;
        const TEXCOORD5 = 1 << 10;
        const TEXCOORD6 = 1 << 11;
        const TEXCOORD7 = 1 << 12;
        const BLEND_WEIGHT0 = 1 << 13;
        const BLEND_WEIGHT1 = 1 << 14;
        const BLEND_WEIGHT2 = 1 << 15;
        const BLEND_WEIGHT3 = 1 << 16;
        const BLEND_WEIGHT4 = 1 << 17;
        const BLEND_WEIGHT5 = 1 << 18;
        const BLEND_WEIGHT6 = 1 << 19;
        const BLEND_WEIGHT7 = 1 << 20;
    }
}

/// Schema names in bit order.
const ATTRIBUTE_NAMES: [(Attributes, &str, usize); 21] = [
    (Attributes::POSITION, "POSITION", 3),
    (Attributes::NORMAL, "NORMAL", 3),
    (Attributes::COLOR, "COLOR", 4),
    (Attributes::COLOR_PACKED, "COLORPACKED", 1),
    (Attributes::TANGENT, "TANGENT", 3),
    (Attributes::TEXCOORD0, "TEXCOORD0", 2),
    (Attributes::TEXCOORD1, "TEXCOORD1", 2),
    (Attributes::TEXCOORD2, "TEXCOORD2", 2),
    (Attributes::TEXCOORD3, "TEXCOORD3", 2),
    (Attributes::TEXCOORD4, "TEXCOORD4", 2),
    (Attributes::TEXCOORD5, "TEXCOORD5", 2),
    (Attributes::TEXCOORD6, "TEXCOORD6", 2),
    (Attributes::TEXCOORD7, "TEXCOORD7", 2),
    (Attributes::BLEND_WEIGHT0, "BLENDWEIGHT0", 2),
    (Attributes::BLEND_WEIGHT1, "BLENDWEIGHT1", 2),
    (Attributes::BLEND_WEIGHT2, "BLENDWEIGHT2", 2),
    (Attributes::BLEND_WEIGHT3, "BLENDWEIGHT3", 2),
    (Attributes::BLEND_WEIGHT4, "BLENDWEIGHT4", 2),
    (Attributes::BLEND_WEIGHT5, "BLENDWEIGHT5", 2),
    (Attributes::BLEND_WEIGHT6, "BLENDWEIGHT6", 2),
    (Attributes::BLEND_WEIGHT7, "BLENDWEIGHT7", 2),
];

impl Attributes {
    /// Flag for blend-weight slot `slot` (`0..MAX_BLEND_WEIGHTS`).
    pub fn blend_weight(slot: usize) -> Self {
        Self::from_bits_truncate(Self::BLEND_WEIGHT0.bits() << slot.min(MAX_BLEND_WEIGHTS - 1))
    }

    pub fn blend_weight_count(self) -> usize {
        (0..MAX_BLEND_WEIGHTS)
            .filter(|slot| self.contains(Self::blend_weight(*slot)))
            .count()
    }

    /// Floats per interleaved vertex.
    pub fn vertex_size(self) -> usize {
        ATTRIBUTE_NAMES
            .iter()
            .filter(|(flag, _, _)| self.contains(*flag))
            .map(|(_, _, size)| size)
            .sum()
    }

    /// Schema names of the set channels, in interleaving order.
    pub fn names(self) -> Vec<&'static str> {
        ATTRIBUTE_NAMES
            .iter()
            .filter(|(flag, _, _)| self.contains(*flag))
            .map(|(_, name, _)| *name)
            .collect()
    }
}

// ─── Model tree ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub id: String,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub nodes: Vec<Node>,
    pub animations: Vec<Animation>,
}

impl Model {
    /// Visits every node depth-first, parents before children.
    pub fn visit_nodes<'a>(&'a self, mut visit: impl FnMut(&'a Node)) {
        fn walk<'a>(node: &'a Node, visit: &mut impl FnMut(&'a Node)) {
            visit(node);
            for child in &node.children {
                walk(child, visit);
            }
        }
        for node in &self.nodes {
            walk(node, &mut visit);
        }
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.visit_nodes(|_| count += 1);
        count
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub attributes: Attributes,
    pub vertex_size: usize,
    pub vertices: Vec<f32>,
    pub parts: Vec<MeshPart>,
}

impl Mesh {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            vertex_size: attributes.vertex_size(),
            vertices: Vec::new(),
            parts: Vec::new(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        if self.vertex_size == 0 {
            0
        } else {
            self.vertices.len() / self.vertex_size
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Primitive {
    #[default]
    Triangles,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Triangles => "TRIANGLES",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    pub id: String,
    pub primitive: Primitive,
    pub indices: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUsage {
    Diffuse,
    Normal,
}

impl TextureUsage {
    pub fn name(self) -> &'static str {
        match self {
            TextureUsage::Diffuse => "DIFFUSE",
            TextureUsage::Normal => "NORMAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub id: String,
    pub file_name: String,
    pub usage: TextureUsage,
    pub uv_translation: [f32; 2],
    pub uv_scale: [f32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub id: String,
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub emissive: [f32; 3],
    pub shininess: f32,
    pub opacity: f32,
    /// Suppresses specular and shininess on output.
    pub lambert_only: bool,
    pub textures: Vec<Texture>,
}

impl Material {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ambient: [1.0; 3],
            diffuse: [1.0; 3],
            specular: [0.0; 3],
            emissive: [0.0; 3],
            shininess: 0.0,
            opacity: 1.0,
            lambert_only: false,
            textures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub translation: [f32; 3],
    /// Quaternion as `[x, y, z, w]`.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub parts: Vec<NodePart>,
    pub children: Vec<Node>,
    /// Id of the scene object this node was built from.
    pub source: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePart {
    pub mesh_part_id: String,
    pub material_id: String,
    pub bones: Vec<BoneBinding>,
}

/// Bone referenced by a skinned node part, with its inverse bind pose.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneBinding {
    pub node_id: String,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

/// Sampled, channel-stripped animation stored as one interleaved buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub id: String,
    pub frames: u32,
    /// Seconds between frames.
    pub sampling_rate: f32,
    /// Floats per frame.
    pub stride: u32,
    pub node_ids: Vec<String>,
    /// Translation, rotation, scale offsets per node; `-1` when absent.
    pub node_formats: Vec<i32>,
    pub data: Vec<f32>,
}

impl Animation {
    /// Slice of `frame` holding `channel` of the `node`-th animated node.
    pub fn channel(&self, frame: usize, node: usize, channel: usize) -> Option<&[f32]> {
        let offset = usize::try_from(*self.node_formats.get(node * 3 + channel)?).ok()?;
        let width = [3, 4, 3][channel];
        let start = frame * self.stride as usize + offset;
        self.data.get(start..start + width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_attribute_set_when_computing_size_then_channels_are_summed() {
        let attributes = Attributes::POSITION
            | Attributes::NORMAL
            | Attributes::COLOR
            | Attributes::TEXCOORD0
            | Attributes::blend_weight(0)
            | Attributes::blend_weight(1);

        assert_eq!(attributes.vertex_size(), 3 + 3 + 4 + 2 + 2 + 2);
        assert_eq!(attributes.blend_weight_count(), 2);
        assert_eq!(
            attributes.names(),
            vec!["POSITION", "NORMAL", "COLOR", "TEXCOORD0", "BLENDWEIGHT0", "BLENDWEIGHT1"]
        );
    }

    #[test]
    fn given_packed_color_when_computing_size_then_one_float_is_used() {
        let attributes = Attributes::POSITION | Attributes::COLOR_PACKED;

        assert_eq!(attributes.vertex_size(), 4);
    }

    #[test]
    fn given_slot_indices_when_building_flags_then_bits_are_sequential() {
        assert_eq!(Attributes::blend_weight(7), Attributes::BLEND_WEIGHT7);
    }

    #[test]
    fn given_animation_buffer_when_reading_channel_then_offsets_are_honoured() {
        let animation = Animation {
            id: "take".into(),
            frames: 2,
            sampling_rate: 0.5,
            stride: 4,
            node_ids: vec!["a".into()],
            node_formats: vec![-1, 0, -1],
            data: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0],
        };

        assert_eq!(animation.channel(1, 0, 1), Some(&[0.0, 0.0, 1.0, 0.0][..]));
        assert_eq!(animation.channel(0, 0, 0), None);
    }
}
