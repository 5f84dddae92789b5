//! Serializes a [`Model`] into the p3d document schema, as text JSON
//! (`.p3dj`) or UBJSON (`.p3db`).

mod ubjson;

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::convert::OutputFormat;
use crate::model::{Animation, Material, Mesh, Model, Node, NodePart, Texture};

/// Schema version written into every document.
pub const SCHEMA_VERSION: [u16; 2] = [0, 1];

// ─── Document schema ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Document<'a> {
    version: [u16; 2],
    id: &'a str,
    meshes: Vec<MeshDoc<'a>>,
    materials: Vec<MaterialDoc<'a>>,
    nodes: Vec<NodeDoc<'a>>,
    animations: Vec<AnimationDoc<'a>>,
}

#[derive(Debug, Serialize)]
struct MeshDoc<'a> {
    attributes: Vec<&'static str>,
    vertices: &'a [f32],
    parts: Vec<MeshPartDoc<'a>>,
}

#[derive(Debug, Serialize)]
struct MeshPartDoc<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    primitive: &'static str,
    indices: &'a [u16],
}

#[derive(Debug, Serialize)]
struct MaterialDoc<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ambient: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diffuse: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emissive: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    opacity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    specular: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shininess: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    textures: Vec<TextureDoc<'a>>,
}

#[derive(Debug, Serialize)]
struct TextureDoc<'a> {
    id: &'a str,
    filename: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    uvtranslation: Option<[f32; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uvscaling: Option<[f32; 2]>,
    #[serde(rename = "type")]
    usage: &'static str,
}

#[derive(Debug, Serialize)]
struct NodeDoc<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parts: Vec<NodePartDoc<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeDoc<'a>>,
}

#[derive(Debug, Serialize)]
struct NodePartDoc<'a> {
    meshpartid: &'a str,
    materialid: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bones: Vec<BoneDoc<'a>>,
}

#[derive(Debug, Serialize)]
struct BoneDoc<'a> {
    node: &'a str,
    translation: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnimationDoc<'a> {
    Packed {
        id: &'a str,
        duration: f32,
        frames: u32,
        bones: &'a [String],
        formats: &'a [i32],
        stride: u32,
        data: &'a [f32],
    },
    Keyframed {
        id: &'a str,
        bones: Vec<BoneTrackDoc<'a>>,
    },
}

#[derive(Debug, Serialize)]
struct BoneTrackDoc<'a> {
    #[serde(rename = "boneId")]
    bone_id: &'a str,
    keyframes: Vec<KeyframeDoc<'a>>,
}

#[derive(Debug, Serialize)]
struct KeyframeDoc<'a> {
    keytime: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<&'a [f32]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    translation: Option<&'a [f32]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<&'a [f32]>,
}

// ─── Model → document ─────────────────────────────────────────────────────────

/// `Some(value)` unless it equals the schema default.
fn unless<T: PartialEq>(value: T, default: T) -> Option<T> {
    (value != default).then_some(value)
}

fn document(model: &Model, packed_animations: bool) -> Document<'_> {
    Document {
        version: SCHEMA_VERSION,
        id: &model.id,
        meshes: model.meshes.iter().map(mesh_doc).collect(),
        materials: model.materials.iter().map(material_doc).collect(),
        nodes: model.nodes.iter().map(node_doc).collect(),
        animations: model
            .animations
            .iter()
            .map(|animation| {
                if packed_animations {
                    packed_animation_doc(animation)
                } else {
                    keyframed_animation_doc(animation)
                }
            })
            .collect(),
    }
}

fn mesh_doc(mesh: &Mesh) -> MeshDoc<'_> {
    MeshDoc {
        attributes: mesh.attributes.names(),
        vertices: &mesh.vertices,
        parts: mesh
            .parts
            .iter()
            .map(|part| MeshPartDoc {
                id: &part.id,
                primitive: part.primitive.name(),
                indices: &part.indices,
            })
            .collect(),
    }
}

fn material_doc(material: &Material) -> MaterialDoc<'_> {
    let lit = !material.lambert_only;
    MaterialDoc {
        id: &material.id,
        ambient: unless(material.ambient, [1.0; 3]),
        diffuse: unless(material.diffuse, [1.0; 3]),
        emissive: unless(material.emissive, [0.0; 3]),
        opacity: unless(material.opacity, 1.0),
        specular: unless(material.specular, [0.0; 3]).filter(|_| lit),
        shininess: unless(material.shininess, 0.0).filter(|_| lit),
        textures: material.textures.iter().map(texture_doc).collect(),
    }
}

fn texture_doc(texture: &Texture) -> TextureDoc<'_> {
    TextureDoc {
        id: &texture.id,
        filename: &texture.file_name,
        uvtranslation: unless(texture.uv_translation, [0.0; 2]),
        uvscaling: unless(texture.uv_scale, [1.0; 2]),
        usage: texture.usage.name(),
    }
}

fn node_doc(node: &Node) -> NodeDoc<'_> {
    NodeDoc {
        id: &node.id,
        rotation: unless(node.rotation, [0.0, 0.0, 0.0, 1.0]),
        scale: unless(node.scale, [1.0; 3]),
        translation: unless(node.translation, [0.0; 3]),
        parts: node.parts.iter().map(node_part_doc).collect(),
        children: node.children.iter().map(node_doc).collect(),
    }
}

fn node_part_doc(part: &NodePart) -> NodePartDoc<'_> {
    NodePartDoc {
        meshpartid: &part.mesh_part_id,
        materialid: &part.material_id,
        bones: part
            .bones
            .iter()
            .map(|bone| BoneDoc {
                node: &bone.node_id,
                translation: bone.translation,
                rotation: bone.rotation,
                scale: bone.scale,
            })
            .collect(),
    }
}

fn packed_animation_doc(animation: &Animation) -> AnimationDoc<'_> {
    AnimationDoc::Packed {
        id: &animation.id,
        duration: animation.sampling_rate * animation.frames.saturating_sub(1) as f32,
        frames: animation.frames,
        bones: &animation.node_ids,
        formats: &animation.node_formats,
        stride: animation.stride,
        data: &animation.data,
    }
}

fn keyframed_animation_doc(animation: &Animation) -> AnimationDoc<'_> {
    let bones = animation
        .node_ids
        .iter()
        .enumerate()
        .map(|(node, bone_id)| BoneTrackDoc {
            bone_id,
            keyframes: (0..animation.frames as usize)
                .map(|frame| KeyframeDoc {
                    keytime: frame as f32 * animation.sampling_rate * 1000.0,
                    rotation: animation.channel(frame, node, 1),
                    translation: animation.channel(frame, node, 0),
                    scale: animation.channel(frame, node, 2),
                })
                .collect(),
        })
        .collect();

    AnimationDoc::Keyframed {
        id: &animation.id,
        bones,
    }
}

// ─── Encoding ─────────────────────────────────────────────────────────────────

/// Encodes `model` in the given format.
pub fn encode(model: &Model, format: OutputFormat, packed_animations: bool) -> Result<Vec<u8>> {
    let document = document(model, packed_animations);
    match format {
        OutputFormat::Json => {
            serde_json::to_vec_pretty(&document).context("failed to serialize model as JSON")
        }
        OutputFormat::Binary => {
            let value =
                serde_json::to_value(&document).context("failed to serialize model document")?;
            Ok(ubjson::to_vec(&value))
        }
    }
}

/// Encodes `model` and writes it to `path`.
pub fn write_model(
    model: &Model,
    path: &Path,
    format: OutputFormat,
    packed_animations: bool,
) -> Result<()> {
    let bytes = encode(model, format, packed_animations)?;
    fs::write(path, bytes)
        .with_context(|| format!("failed to write model: {}", path.display()))?;
    Ok(())
}
