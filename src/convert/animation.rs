use std::collections::HashMap;

use crate::math::{Decomposed, decompose};
use crate::model::{Animation, Model, Node};
use crate::scene::{AnimationStack, CurveNode, Scene, SceneObject, TransformProperty, local_transform};

use super::diagnostic::Diagnostics;
use super::types::ConvertOptions;

/// Float width of the translation, rotation and scale channels.
const CHANNEL_WIDTHS: [usize; 3] = [3, 4, 3];

/// Sampled local transforms of one animated node.
struct Track<'a> {
    node: &'a Node,
    frames: Vec<Decomposed>,
    needed: [bool; 3],
}

impl Track<'_> {
    fn is_animated(&self) -> bool {
        self.needed.iter().any(|needed| *needed)
    }
}

/// Samples one animation stack over every node of `model` and packs the
/// channels that move into a single frame-major buffer.
///
/// # Arguments
///
/// * `stack` - Source stack with its local time range.
/// * `model` - Finished node tree; nodes map back to scene objects by id.
/// * `scene` - Provides static transform values for unanimated axes.
/// * `objects` - Scene object id → position lookup.
/// * `options` - Sampling rate and channel-stripping tolerance.
/// * `diagnostics` - Receives `EMPTY_ANIMATION` for unusable time ranges.
///
/// # Returns
///
/// `None` when the stack is skipped.
pub(super) fn sample_animation(
    stack: &AnimationStack,
    model: &Model,
    scene: &Scene,
    objects: &HashMap<u64, usize>,
    options: &ConvertOptions,
    diagnostics: &mut Diagnostics,
) -> Option<Animation> {
    let rate = f64::from(options.anim_sampling_rate);
    let range = stack.time_to - stack.time_from;
    let frame_count = if range > 0.0 { (range / rate).ceil() as u32 } else { 0 };
    if frame_count == 0 {
        diagnostics.warn(
            "EMPTY_ANIMATION",
            format!(
                "animation '{}' has an empty time range [{}, {}]; skipped",
                stack.name, stack.time_from, stack.time_to
            ),
        );
        return None;
    }

    let mut tracks = Vec::new();
    model.visit_nodes(|node| {
        let Some(object) = objects.get(&node.source).map(|&position| &scene.objects[position])
        else {
            return;
        };
        let curves = [
            TransformProperty::Translation,
            TransformProperty::Rotation,
            TransformProperty::Scaling,
        ]
        .map(|property| stack.curve_node(object.id, property));
        if curves.iter().all(Option::is_none) {
            return;
        }

        let frames = (0..frame_count)
            .map(|frame| sample_node(object, &curves, frame_time(stack, frame, frame_count)))
            .collect();
        let mut track = Track {
            node,
            frames,
            needed: [false; 3],
        };
        track.needed = needed_channels(&track, options.anim_error);
        if track.is_animated() {
            tracks.push(track);
        }
    });

    let id = animation_id(stack, model);
    if tracks.is_empty() {
        diagnostics.info(
            "STATIC_ANIMATION",
            format!("animation '{id}' moves no node beyond the tolerance; written without channels"),
        );
    }
    Some(pack_tracks(id, frame_count, options.anim_sampling_rate, &tracks))
}

/// Time of `frame`, spreading the frames evenly over the closed range.
fn frame_time(stack: &AnimationStack, frame: u32, frame_count: u32) -> f64 {
    if frame_count <= 1 {
        return stack.time_from;
    }
    let range = stack.time_to - stack.time_from;
    stack.time_from + f64::from(frame) * range / f64::from(frame_count - 1)
}

fn sample_node(object: &SceneObject, curves: &[Option<&CurveNode>; 3], time: f64) -> Decomposed {
    let evaluate = |curve: Option<&CurveNode>, fallback: [f64; 3]| {
        curve.map_or(fallback, |curve| curve.evaluate(time, fallback))
    };
    let translation = evaluate(curves[0], object.translation);
    let rotation = evaluate(curves[1], object.rotation);
    let scaling = evaluate(curves[2], object.scaling);

    decompose(&local_transform(translation, rotation, scaling))
}

/// A channel is needed when some frame leaves the node's rest value by at
/// least `tolerance` in any component.
fn needed_channels(track: &Track<'_>, tolerance: f32) -> [bool; 3] {
    let node = track.node;
    let rest: [&[f32]; 3] = [&node.translation, &node.rotation, &node.scale];

    let mut needed = [false; 3];
    for frame in &track.frames {
        let sampled: [&[f32]; 3] = [&frame.translation, &frame.rotation, &frame.scale];
        for channel in 0..3 {
            if !needed[channel]
                && sampled[channel]
                    .iter()
                    .zip(rest[channel])
                    .any(|(value, rest)| (value - rest).abs() >= tolerance)
            {
                needed[channel] = true;
            }
        }
    }
    needed
}

fn pack_tracks(id: String, frames: u32, sampling_rate: f32, tracks: &[Track<'_>]) -> Animation {
    let mut node_formats = Vec::with_capacity(tracks.len() * 3);
    let mut stride = 0usize;
    for track in tracks {
        for (channel, width) in CHANNEL_WIDTHS.into_iter().enumerate() {
            if track.needed[channel] {
                node_formats.push(stride as i32);
                stride += width;
            } else {
                node_formats.push(-1);
            }
        }
    }

    let mut data = Vec::with_capacity(stride * frames as usize);
    for frame in 0..frames as usize {
        for track in tracks {
            let sample = &track.frames[frame];
            let channels: [&[f32]; 3] = [&sample.translation, &sample.rotation, &sample.scale];
            for (channel, values) in channels.into_iter().enumerate() {
                if track.needed[channel] {
                    data.extend_from_slice(values);
                }
            }
        }
    }

    log::debug!(
        "animation '{id}': {frames} frames, {} node(s), stride {stride}",
        tracks.len()
    );

    Animation {
        id,
        frames,
        sampling_rate,
        stride: stride as u32,
        node_ids: tracks.iter().map(|track| track.node.id.clone()).collect(),
        node_formats,
        data,
    }
}

fn animation_id(stack: &AnimationStack, model: &Model) -> String {
    if stack.name.is_empty() {
        format!("animation{}", model.animations.len())
    } else {
        stack.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{AnimationLayer, Curve, ObjectKind};

    fn object(id: u64, name: &str) -> SceneObject {
        SceneObject {
            id,
            name: name.to_string(),
            children: Vec::new(),
            translation: [0.0; 3],
            rotation: [0.0; 3],
            scaling: [1.0; 3],
            kind: ObjectKind::Other,
        }
    }

    fn node(id: &str, source: u64) -> Node {
        Node {
            id: id.to_string(),
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            parts: Vec::new(),
            children: Vec::new(),
            source,
        }
    }

    fn curve(times: &[f64], values: &[f64]) -> Option<Curve> {
        Some(Curve {
            times: times.to_vec(),
            values: values.to_vec(),
        })
    }

    fn stack(time_to: f64, curve_nodes: Vec<CurveNode>) -> AnimationStack {
        AnimationStack {
            name: "take".into(),
            time_from: 0.0,
            time_to,
            layers: vec![AnimationLayer {
                name: "base".into(),
                curve_nodes,
            }],
        }
    }

    fn fixture() -> (Scene, Model) {
        let scene = Scene {
            root: 0,
            objects: vec![object(1, "hips"), object(2, "still"), object(3, "idle")],
            ..Default::default()
        };
        let model = Model {
            id: "m".into(),
            nodes: vec![node("hips", 1), node("still", 2), node("idle", 3)],
            ..Default::default()
        };
        (scene, model)
    }

    #[test]
    fn given_moving_translation_when_sampling_then_only_that_channel_is_packed() {
        let (scene, model) = fixture();
        let stack = stack(
            1.0,
            vec![
                CurveNode {
                    object: 1,
                    property: TransformProperty::Translation,
                    x: curve(&[0.0, 1.0], &[0.0, 2.0]),
                    y: None,
                    z: None,
                },
                // Animated, but constant at the rest value.
                CurveNode {
                    object: 3,
                    property: TransformProperty::Scaling,
                    x: curve(&[0.0, 1.0], &[1.0, 1.0]),
                    y: None,
                    z: None,
                },
            ],
        );
        let options = ConvertOptions {
            anim_sampling_rate: 0.5,
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::default();

        let animation = sample_animation(
            &stack,
            &model,
            &scene,
            &scene.object_index(),
            &options,
            &mut diagnostics,
        )
        .expect("stack is sampled");

        assert_eq!(animation.frames, 2);
        assert_eq!(animation.node_ids, vec!["hips"]);
        assert_eq!(animation.node_formats, vec![0, -1, -1]);
        assert_eq!(animation.stride, 3);
        assert_eq!(animation.data, vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn given_rotation_curve_when_sampling_then_quaternions_are_stored() {
        let (scene, model) = fixture();
        let stack = stack(
            1.0,
            vec![CurveNode {
                object: 2,
                property: TransformProperty::Rotation,
                x: None,
                y: None,
                z: curve(&[0.0, 1.0], &[0.0, 180.0]),
            }],
        );
        let options = ConvertOptions {
            anim_sampling_rate: 0.5,
            ..Default::default()
        };
        let mut diagnostics = Diagnostics::default();

        let animation = sample_animation(
            &stack,
            &model,
            &scene,
            &scene.object_index(),
            &options,
            &mut diagnostics,
        )
        .expect("stack is sampled");

        assert_eq!(animation.node_formats, vec![-1, 0, -1]);
        assert_eq!(animation.stride, 4);
        let last = animation.channel(1, 0, 1).expect("rotation present");
        assert!(last[2].abs() > 0.999, "{last:?}");
        assert!(last[3].abs() < 1e-3, "{last:?}");
    }

    #[test]
    fn given_empty_time_range_when_sampling_then_stack_is_skipped_with_warning() {
        let (scene, model) = fixture();
        let stack = stack(0.0, Vec::new());
        let mut diagnostics = Diagnostics::default();

        let animation = sample_animation(
            &stack,
            &model,
            &scene,
            &scene.object_index(),
            &ConvertOptions::default(),
            &mut diagnostics,
        );

        assert!(animation.is_none());
        assert!(diagnostics.has("EMPTY_ANIMATION"));
    }

    #[test]
    fn given_range_shorter_than_rate_when_sampling_then_single_frame_is_taken() {
        let mut stack = stack(0.01, Vec::new());
        stack.time_from = 0.5;
        stack.time_to = 0.51;

        assert_eq!(frame_time(&stack, 0, 1), 0.5);
        assert!((frame_time(&stack, 2, 3) - 0.51).abs() < 1e-12);
    }
}
