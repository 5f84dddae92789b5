mod animation;
mod attributes;
mod diagnostic;
mod geometry;
mod material;
mod nodes;
mod partition;
mod skinning;
mod types;
mod weld;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::error::ConvertError;
use crate::model::{MAX_BLEND_WEIGHTS, Model};
use crate::scene::{Scene, load_scene};
use crate::writer::write_model;

// Re-export public types for callers of this module.
pub use types::{
    ConversionIssue, ConversionReport, ConvertOptions, DEFAULT_WELD_DROPPED_BITS, OutputFormat,
    Severity,
};

use animation::sample_animation;
use diagnostic::Diagnostics;
use weld::VertexWelder;

// ─── Public API ───────────────────────────────────────────────────────────────

/// A converted model together with the issues recovered from on the way.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub model: Model,
    pub issues: Vec<ConversionIssue>,
}

impl Conversion {
    /// Summarizes the model for display.
    pub fn report(&self) -> ConversionReport {
        let model = &self.model;
        ConversionReport {
            model_id: model.id.clone(),
            mesh_count: model.meshes.len(),
            mesh_part_count: model.meshes.iter().map(|mesh| mesh.parts.len()).sum(),
            material_count: model.materials.len(),
            node_count: model.node_count(),
            animation_count: model.animations.len(),
            total_vertices: model.meshes.iter().map(|mesh| mesh.vertex_count()).sum(),
            total_triangles: model
                .meshes
                .iter()
                .flat_map(|mesh| &mesh.parts)
                .map(|part| part.indices.len() / 3)
                .sum(),
            issues: self.issues.clone(),
        }
    }
}

/// Converts a scene graph into a renderer-ready model.
///
/// The root object itself is not emitted; its children become the model's
/// top-level nodes. Animations are sampled after the node tree is complete.
///
/// # Errors
///
/// Returns [`ConvertError`] for invalid options, a missing root object, or a
/// mesh part whose indices leave the 16-bit range.
pub fn convert_scene(
    scene: &Scene,
    model_id: &str,
    options: &ConvertOptions,
) -> Result<Conversion, ConvertError> {
    validate_options(options)?;

    log::debug!(
        "converting '{model_id}': {} object(s), {} mesh object(s), {} animation stack(s)",
        scene.objects.len(),
        scene.mesh_count(),
        scene.animation_stacks.len()
    );
    let mut converter = Converter::new(scene, options);
    converter.model.id = model_id.to_string();

    if options.max_blend_weights > MAX_BLEND_WEIGHTS {
        converter.diagnostics.warn(
            "BLEND_WEIGHTS_CLAMPED",
            format!(
                "max_blend_weights {} exceeds the limit of {MAX_BLEND_WEIGHTS}; clamped",
                options.max_blend_weights
            ),
        );
    }

    let root = *converter
        .objects
        .get(&scene.root)
        .ok_or(ConvertError::MissingRoot(scene.root))?;
    let mut ancestors = vec![scene.root];
    converter.model.nodes =
        converter.convert_children(&scene.objects[root].children, &mut ancestors)?;
    converter.convert_animations();

    log::info!(
        "converted '{model_id}': {} mesh buffer(s), {} material(s), {} node(s), {} animation(s)",
        converter.model.meshes.len(),
        converter.model.materials.len(),
        converter.model.node_count(),
        converter.model.animations.len()
    );

    Ok(Conversion {
        model: converter.model,
        issues: converter.diagnostics.into_issues(),
    })
}

/// Reads a scene dump, converts it and writes the model file.
///
/// # Arguments
///
/// * `input_path` - Scene graph JSON produced by the FBX parser.
/// * `output_path` - Target file; defaults to the input path with the
///   extension of `options.output_format`.
/// * `options` - Conversion options.
///
/// # Returns
///
/// The report of the written model.
pub fn convert_file(
    input_path: &Path,
    output_path: Option<&Path>,
    options: &ConvertOptions,
) -> Result<ConversionReport> {
    let scene = load_scene(input_path)?;
    let model_id = input_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let conversion = convert_scene(&scene, &model_id, options)
        .with_context(|| format!("failed to convert scene: {}", input_path.display()))?;

    let output_path = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(input_path, options.output_format));
    write_model(
        &conversion.model,
        &output_path,
        options.output_format,
        options.packed_animations,
    )?;
    log::info!("wrote {}", output_path.display());

    Ok(conversion.report())
}

/// Input path with its extension replaced by the one of `format`.
pub fn default_output_path(input_path: &Path, format: OutputFormat) -> PathBuf {
    input_path.with_extension(format.extension())
}

fn validate_options(options: &ConvertOptions) -> Result<(), ConvertError> {
    if !(options.anim_sampling_rate.is_finite() && options.anim_sampling_rate > 0.0) {
        return Err(ConvertError::InvalidOption {
            name: "anim_sampling_rate",
            reason: format!("must be a positive number, got {}", options.anim_sampling_rate),
        });
    }
    if !(options.anim_error.is_finite() && options.anim_error >= 0.0) {
        return Err(ConvertError::InvalidOption {
            name: "anim_error",
            reason: format!("must be zero or positive, got {}", options.anim_error),
        });
    }
    if options.max_draw_bones == 0 {
        return Err(ConvertError::InvalidOption {
            name: "max_draw_bones",
            reason: "at least one bone per draw call is required".to_string(),
        });
    }
    Ok(())
}

// ─── Conversion state ─────────────────────────────────────────────────────────

/// State of one conversion run. The model collections only ever grow.
struct Converter<'a> {
    scene: &'a Scene,
    options: &'a ConvertOptions,
    /// Scene object id → position in `scene.objects`.
    objects: HashMap<u64, usize>,
    model: Model,
    /// Welder per entry of `model.meshes`.
    welders: Vec<VertexWelder>,
    /// Source material index → output material id.
    material_slots: HashMap<usize, String>,
    default_material: Option<String>,
    diagnostics: Diagnostics,
    next_part_id: usize,
}

impl<'a> Converter<'a> {
    fn new(scene: &'a Scene, options: &'a ConvertOptions) -> Self {
        Self {
            scene,
            options,
            objects: scene.object_index(),
            model: Model::default(),
            welders: Vec::new(),
            material_slots: HashMap::new(),
            default_material: None,
            diagnostics: Diagnostics::default(),
            next_part_id: 0,
        }
    }

    fn convert_animations(&mut self) {
        let scene = self.scene;
        for stack in &scene.animation_stacks {
            if let Some(animation) = sample_animation(
                stack,
                &self.model,
                scene,
                &self.objects,
                self.options,
                &mut self.diagnostics,
            ) {
                self.model.animations.push(animation);
            }
        }
    }
}
