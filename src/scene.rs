//! Scene graph consumed by the converter.
//!
//! The FBX parser itself lives outside this crate. Whatever parses the file
//! fills in a [`Scene`]; the command-line tool reads one from a JSON dump.

use std::{collections::HashMap, fs, path::Path};

use anyhow::{Context, Result};
use nalgebra::{Matrix4, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::math::Matrix;

/// Column-major 4x4 matrix as stored in the scene dump.
pub type RawMatrix = [f64; 16];

fn identity_matrix() -> RawMatrix {
    [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

fn unit_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

pub fn to_matrix(raw: &RawMatrix) -> Matrix {
    Matrix::from_column_slice(raw)
}

// ─── Scene ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Id of the object whose children form the top level of the model.
    pub root: u64,
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub materials: Vec<SourceMaterial>,
    #[serde(default)]
    pub animation_stacks: Vec<AnimationStack>,
}

impl Scene {
    /// Builds an id → position lookup over [`Scene::objects`].
    pub fn object_index(&self) -> HashMap<u64, usize> {
        self.objects
            .iter()
            .enumerate()
            .map(|(position, object)| (object.id, position))
            .collect()
    }

    pub fn mesh_count(&self) -> usize {
        self.objects
            .iter()
            .filter(|object| matches!(object.kind, ObjectKind::Mesh(_)))
            .count()
    }
}

/// Reads a scene graph previously dumped to JSON.
pub fn load_scene(path: &Path) -> Result<Scene> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read scene: {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse scene graph: {}", path.display()))
}

// ─── Objects ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub children: Vec<u64>,
    #[serde(default)]
    pub translation: [f64; 3],
    /// Euler angles in degrees, applied X then Y then Z.
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default = "unit_scale")]
    pub scaling: [f64; 3],
    #[serde(default)]
    pub kind: ObjectKind,
}

impl SceneObject {
    pub fn local_transform(&self) -> Matrix {
        local_transform(self.translation, self.rotation, self.scaling)
    }

    pub fn mesh(&self) -> Option<&MeshObject> {
        match &self.kind {
            ObjectKind::Mesh(mesh) => Some(mesh),
            ObjectKind::Other => None,
        }
    }
}

/// Evaluates `T * Rz * Ry * Rx * S` for FBX-style local transform channels.
pub fn local_transform(translation: [f64; 3], rotation_deg: [f64; 3], scaling: [f64; 3]) -> Matrix {
    let [rx, ry, rz] = rotation_deg.map(f64::to_radians);
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), rz)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), ry)
        * Rotation3::from_axis_angle(&Vector3::x_axis(), rx);

    Matrix4::new_translation(&Vector3::from(translation))
        * rotation.to_homogeneous()
        * Matrix4::new_nonuniform_scaling(&Vector3::from(scaling))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectKind {
    Mesh(Box<MeshObject>),
    /// Nulls, limb nodes, cameras, lights: kept as plain transform nodes.
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshObject {
    pub geometry: Geometry,
    /// Indices into [`Scene::materials`], addressed by the geometry's
    /// per-vertex material ids.
    #[serde(default)]
    pub materials: Vec<usize>,
    /// Pivot/offset transform baked into vertex data.
    #[serde(default = "identity_matrix")]
    pub geometric_transform: RawMatrix,
}

/// Triangulated geometry. Every array is indexed per polygon-vertex; three
/// consecutive vertices form a triangle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub positions: Vec<[f64; 3]>,
    #[serde(default)]
    pub normals: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    pub uvs: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub colors: Option<Vec<[f64; 4]>>,
    #[serde(default)]
    pub tangents: Option<Vec<[f64; 3]>>,
    /// Material slot per polygon-vertex; negative means unassigned.
    #[serde(default)]
    pub materials: Option<Vec<i32>>,
    #[serde(default)]
    pub skin: Option<Skin>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skin {
    pub clusters: Vec<Cluster>,
}

/// One bone's influence over the geometry plus its bind pose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Object id of the bone this cluster deforms with.
    pub link: u64,
    pub indices: Vec<i32>,
    pub weights: Vec<f64>,
    /// Mesh transform at bind time.
    #[serde(default = "identity_matrix")]
    pub transform: RawMatrix,
    /// Bone global transform at bind time.
    #[serde(default = "identity_matrix")]
    pub transform_link: RawMatrix,
}

// ─── Materials ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMaterial {
    pub name: String,
    #[serde(default)]
    pub shading_model: String,
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub diffuse_texture: Option<SourceTexture>,
    #[serde(default)]
    pub normal_texture: Option<SourceTexture>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub value: PropertyValue,
    #[serde(default)]
    pub children: Vec<Property>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    #[default]
    None,
    Number(f64),
    Vector(Vec<f64>),
    Text(String),
}

impl PropertyValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(value) => Some(*value),
            PropertyValue::Vector(values) => values.first().copied(),
            _ => None,
        }
    }

    /// Reads an RGB triple; a scalar is broadcast to all three channels.
    pub fn as_color(&self) -> Option<[f64; 3]> {
        match self {
            PropertyValue::Vector(values) if values.len() >= 3 => {
                Some([values[0], values[1], values[2]])
            }
            PropertyValue::Number(value) => Some([*value; 3]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTexture {
    pub file_name: String,
    #[serde(default)]
    pub uv_translation: Option<[f64; 2]>,
    #[serde(default)]
    pub uv_scaling: Option<[f64; 2]>,
}

// ─── Animation ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimationStack {
    pub name: String,
    /// Local time range in seconds.
    pub time_from: f64,
    pub time_to: f64,
    #[serde(default)]
    pub layers: Vec<AnimationLayer>,
}

impl AnimationStack {
    /// Finds the first curve node animating `property` of `object` across
    /// all layers.
    pub fn curve_node(&self, object: u64, property: TransformProperty) -> Option<&CurveNode> {
        self.layers
            .iter()
            .flat_map(|layer| layer.curve_nodes.iter())
            .find(|node| node.object == object && node.property == property)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnimationLayer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub curve_nodes: Vec<CurveNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformProperty {
    #[serde(rename = "Lcl Translation")]
    Translation,
    #[serde(rename = "Lcl Rotation")]
    Rotation,
    #[serde(rename = "Lcl Scaling")]
    Scaling,
}

/// Per-axis curves animating one local-transform property of an object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveNode {
    pub object: u64,
    pub property: TransformProperty,
    #[serde(default)]
    pub x: Option<Curve>,
    #[serde(default)]
    pub y: Option<Curve>,
    #[serde(default)]
    pub z: Option<Curve>,
}

impl CurveNode {
    /// Evaluates the property at `time`; axes without a curve keep
    /// `fallback`.
    pub fn evaluate(&self, time: f64, fallback: [f64; 3]) -> [f64; 3] {
        let axis = |curve: &Option<Curve>, value: f64| {
            curve
                .as_ref()
                .and_then(|curve| curve.evaluate(time))
                .unwrap_or(value)
        };
        [
            axis(&self.x, fallback[0]),
            axis(&self.y, fallback[1]),
            axis(&self.z, fallback[2]),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Curve {
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Curve {
    /// Linear interpolation between keys, clamped to the first and last key.
    pub fn evaluate(&self, time: f64) -> Option<f64> {
        let count = self.times.len().min(self.values.len());
        if count == 0 {
            return None;
        }
        if time <= self.times[0] {
            return Some(self.values[0]);
        }
        if time >= self.times[count - 1] {
            return Some(self.values[count - 1]);
        }

        let next = self.times[..count].partition_point(|key| *key <= time);
        let (t0, t1) = (self.times[next - 1], self.times[next]);
        let (v0, v1) = (self.values[next - 1], self.values[next]);
        if t1 <= t0 {
            return Some(v1);
        }
        let alpha = (time - t0) / (t1 - t0);
        Some(v0 + (v1 - v0) * alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_keys_when_evaluating_curve_then_values_are_interpolated_and_clamped() {
        let curve = Curve {
            times: vec![0.0, 1.0, 3.0],
            values: vec![0.0, 10.0, 30.0],
        };

        assert_eq!(curve.evaluate(-1.0), Some(0.0));
        assert_eq!(curve.evaluate(0.5), Some(5.0));
        assert_eq!(curve.evaluate(2.0), Some(20.0));
        assert_eq!(curve.evaluate(5.0), Some(30.0));
        assert_eq!(Curve::default().evaluate(1.0), None);
    }

    #[test]
    fn given_partial_curve_node_when_evaluating_then_missing_axes_use_fallback() {
        let node = CurveNode {
            object: 1,
            property: TransformProperty::Translation,
            x: Some(Curve {
                times: vec![0.0, 1.0],
                values: vec![0.0, 2.0],
            }),
            y: None,
            z: None,
        };

        assert_eq!(node.evaluate(0.5, [7.0, 8.0, 9.0]), [1.0, 8.0, 9.0]);
    }

    #[test]
    fn given_euler_rotation_when_building_local_transform_then_z_is_applied_last() {
        let mat = local_transform([0.0; 3], [90.0, 0.0, 90.0], [1.0; 3]);

        // X then Z: +Y goes to +Z under X, then stays on Z.
        let y = mat * nalgebra::Vector4::new(0.0, 1.0, 0.0, 0.0);
        assert!((y.z - 1.0).abs() < 1e-12);
        // +X is untouched by X, then goes to +Y under Z.
        let x = mat * nalgebra::Vector4::new(1.0, 0.0, 0.0, 0.0);
        assert!((x.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn given_json_dump_when_deserializing_then_defaults_and_kinds_are_applied() {
        let json = r#"{
            "root": 0,
            "objects": [
                { "id": 0, "name": "RootNode", "children": [1, 2] },
                { "id": 1, "name": "Bone", "kind": { "type": "LimbNode" } },
                { "id": 2, "name": "Cube", "kind": {
                    "type": "Mesh",
                    "geometry": { "positions": [[0,0,0],[1,0,0],[0,1,0]] }
                } }
            ]
        }"#;

        let scene: Scene = serde_json::from_str(json).expect("scene should parse");

        assert_eq!(scene.objects[0].scaling, [1.0, 1.0, 1.0]);
        assert!(matches!(scene.objects[1].kind, ObjectKind::Other));
        let mesh = scene.objects[2].mesh().expect("mesh kind");
        assert_eq!(mesh.geometry.triangle_count(), 1);
        assert_eq!(mesh.geometric_transform, identity_matrix());
        assert_eq!(scene.mesh_count(), 1);
    }

    #[test]
    fn given_property_values_when_reading_then_numbers_and_colors_are_extracted() {
        assert_eq!(PropertyValue::Number(2.0).as_number(), Some(2.0));
        assert_eq!(
            PropertyValue::Vector(vec![0.1, 0.2, 0.3]).as_color(),
            Some([0.1, 0.2, 0.3])
        );
        assert_eq!(PropertyValue::Number(0.5).as_color(), Some([0.5; 3]));
        assert_eq!(PropertyValue::Text("x".into()).as_color(), None);
    }
}
