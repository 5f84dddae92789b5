use serde::{Deserialize, Serialize};

use crate::model::{INDEX_SPACE, MAX_BLEND_WEIGHTS};

// ─── Defaults ─────────────────────────────────────────────────────────────────

/// Low mantissa bits ignored when welding vertices.
pub const DEFAULT_WELD_DROPPED_BITS: u32 = 4;

/// Weights at or below this magnitude do not count as an influence.
pub(super) const NEGLIGIBLE_WEIGHT: f64 = 1e-6;

// ─── Public types ─────────────────────────────────────────────────────────────

/// Encoding used for the written model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// UBJSON, `.p3db`.
    #[default]
    Binary,
    /// Text JSON, `.p3dj`.
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Binary => "p3db",
            OutputFormat::Json => "p3dj",
        }
    }
}

/// Conversion options shared by the CLI and settings files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Vertex cap per mesh buffer; never above the 16-bit index space.
    pub max_vertices: usize,
    /// Distinct bones one draw call may reference.
    pub max_draw_bones: usize,
    /// Blend-weight slots per vertex; `0` disables skinning.
    pub max_blend_weights: usize,
    /// Inverts the V texture coordinate.
    pub flip_v: bool,
    /// Stores vertex colors as one packed float instead of four.
    pub pack_vertex_colors: bool,
    /// Seconds between animation samples.
    pub anim_sampling_rate: f32,
    /// Largest deviation from the rest pose still treated as unchanged.
    pub anim_error: f32,
    /// Low float bits ignored by the vertex welder.
    pub weld_dropped_bits: u32,
    /// Writes animations in the packed form instead of per-keyframe objects.
    pub packed_animations: bool,
    pub output_format: OutputFormat,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_vertices: INDEX_SPACE,
            max_draw_bones: 12,
            max_blend_weights: MAX_BLEND_WEIGHTS,
            flip_v: false,
            pack_vertex_colors: false,
            anim_sampling_rate: 1.0 / 30.0,
            anim_error: 1e-4,
            weld_dropped_bits: DEFAULT_WELD_DROPPED_BITS,
            packed_animations: true,
            output_format: OutputFormat::Binary,
        }
    }
}

impl ConvertOptions {
    /// Vertex cap actually enforced, bounded by what a `u16` index can address.
    pub fn vertex_cap(&self) -> usize {
        self.max_vertices.clamp(3, INDEX_SPACE)
    }

    pub fn blend_weight_limit(&self) -> usize {
        self.max_blend_weights.min(MAX_BLEND_WEIGHTS)
    }
}

/// Severity level used by conversion issues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Info,
}

/// A recoverable problem found while converting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

/// Summary returned after a conversion run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ConversionReport {
    pub model_id: String,
    pub mesh_count: usize,
    pub mesh_part_count: usize,
    pub material_count: usize,
    pub node_count: usize,
    pub animation_count: usize,
    pub total_vertices: usize,
    pub total_triangles: usize,
    pub issues: Vec<ConversionIssue>,
}
