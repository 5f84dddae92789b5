use std::{path::PathBuf, process};

use clap::Parser;

use pb_fbx_conv::{
    ConversionReport, ConvertOptions, OutputFormat, Severity, convert_file,
    logging::{ResultExt, init_logging},
    settings::load_options,
};

/// Convert a parsed FBX scene graph into a p3d model.
#[derive(Debug, Parser)]
#[command(name = "pb-fbx-conv", version)]
struct Cli {
    /// Scene graph JSON dump of the FBX file.
    input: PathBuf,

    /// Output file (default: input with a .p3db or .p3dj extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Conversion settings file; flags below override its values.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Max blend weights per vertex (0 disables skinning).
    #[arg(short = 'B', long)]
    max_blend_weights: Option<usize>,

    /// Max distinct bones per draw call.
    #[arg(short = 'b', long)]
    max_draw_bones: Option<usize>,

    /// Max vertices per mesh buffer.
    #[arg(long)]
    max_vertices: Option<usize>,

    /// Invert the V texture coordinate.
    #[arg(long)]
    flip_v: bool,

    /// Store vertex colors as one packed float.
    #[arg(long)]
    pack_colors: bool,

    /// Seconds between animation samples.
    #[arg(long)]
    sampling_rate: Option<f32>,

    /// Tolerance under which an animation channel counts as unchanged.
    #[arg(long)]
    anim_error: Option<f32>,

    /// Write text JSON (.p3dj) instead of UBJSON (.p3db).
    #[arg(long)]
    json: bool,

    /// Write animations as per-bone keyframes instead of the packed form.
    #[arg(long)]
    verbose_animations: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> anyhow::Result<ConvertOptions> {
        let mut options = match &self.settings {
            Some(path) => load_options(path)?,
            None => ConvertOptions::default(),
        };

        if let Some(value) = self.max_blend_weights {
            options.max_blend_weights = value;
            if value == 0 {
                log::info!("vertex skinning disabled by --max-blend-weights 0");
            }
        }
        if let Some(value) = self.max_draw_bones {
            options.max_draw_bones = value;
        }
        if let Some(value) = self.max_vertices {
            options.max_vertices = value;
        }
        if let Some(value) = self.sampling_rate {
            options.anim_sampling_rate = value;
        }
        if let Some(value) = self.anim_error {
            options.anim_error = value;
        }
        options.flip_v |= self.flip_v;
        options.pack_vertex_colors |= self.pack_colors;
        if self.json {
            options.output_format = OutputFormat::Json;
        }
        if self.verbose_animations {
            options.packed_animations = false;
        }

        Ok(options)
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if run(&cli).log_error(Some("conversion failed")).is_err() {
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let options = cli.options()?;
    let report = convert_file(&cli.input, cli.output.as_deref(), &options)?;

    println!("Model: {}", report.model_id);
    println!(
        "Meshes: {} ({} parts), Materials: {}, Nodes: {}",
        report.mesh_count, report.mesh_part_count, report.material_count, report.node_count
    );
    println!(
        "Vertices: {}, Triangles: {}",
        report.total_vertices, report.total_triangles
    );
    println!("Animations: {}", report.animation_count);

    let warnings = warning_lines(&report);
    if !warnings.is_empty() {
        println!("Warnings: {}", warnings.len());
        for line in warnings {
            println!("{line}");
        }
    }

    Ok(())
}

/// Summary lines for the warning-level issues. Info issues only go to the log.
fn warning_lines(report: &ConversionReport) -> Vec<String> {
    report
        .issues
        .iter()
        .filter(|issue| issue.severity == Severity::Warning)
        .map(|issue| format!("  [{}] {}", issue.code, issue.message))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb_fbx_conv::ConversionIssue;

    fn issue(severity: Severity, code: &str) -> ConversionIssue {
        ConversionIssue {
            severity,
            code: code.to_string(),
            message: format!("{code} happened"),
        }
    }

    #[test]
    fn given_mixed_issues_when_listing_warnings_then_info_is_left_out() {
        let report = ConversionReport {
            issues: vec![
                issue(Severity::Warning, "DEFAULT_MATERIAL"),
                issue(Severity::Info, "STATIC_ANIMATION"),
                issue(Severity::Warning, "PART_SPLIT"),
            ],
            ..Default::default()
        };

        let lines = warning_lines(&report);

        assert_eq!(
            lines,
            vec![
                "  [DEFAULT_MATERIAL] DEFAULT_MATERIAL happened".to_string(),
                "  [PART_SPLIT] PART_SPLIT happened".to_string(),
            ]
        );
    }

    #[test]
    fn given_only_info_issues_when_listing_warnings_then_nothing_is_printed() {
        let report = ConversionReport {
            issues: vec![issue(Severity::Info, "STATIC_ANIMATION")],
            ..Default::default()
        };

        assert!(warning_lines(&report).is_empty());
    }
}
