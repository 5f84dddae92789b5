use crate::model::{Material, Texture, TextureUsage};
use crate::scene::{Property, SourceMaterial, SourceTexture};

// ─── Channel table ────────────────────────────────────────────────────────────

/// One color channel and the three property names that can encode it.
struct ChannelSpec {
    /// Combined form, already `color * factor`.
    combined: &'static str,
    color: &'static str,
    factor: &'static str,
    field: fn(&mut Material) -> &mut [f32; 3],
}

fn ambient_field(material: &mut Material) -> &mut [f32; 3] {
    &mut material.ambient
}

fn diffuse_field(material: &mut Material) -> &mut [f32; 3] {
    &mut material.diffuse
}

fn specular_field(material: &mut Material) -> &mut [f32; 3] {
    &mut material.specular
}

fn emissive_field(material: &mut Material) -> &mut [f32; 3] {
    &mut material.emissive
}

const CHANNELS: [ChannelSpec; 4] = [
    ChannelSpec {
        combined: "Ambient",
        color: "AmbientColor",
        factor: "AmbientFactor",
        field: ambient_field,
    },
    ChannelSpec {
        combined: "Diffuse",
        color: "DiffuseColor",
        factor: "DiffuseFactor",
        field: diffuse_field,
    },
    ChannelSpec {
        combined: "Specular",
        color: "SpecularColor",
        factor: "SpecularFactor",
        field: specular_field,
    },
    ChannelSpec {
        combined: "Emissive",
        color: "EmissiveColor",
        factor: "EmissiveFactor",
        field: emissive_field,
    },
];

/// Accumulated state of one channel while walking the property tree.
#[derive(Debug, Clone, Copy)]
struct ChannelState {
    color: [f64; 3],
    factor: f64,
}

// ─── Resolution ───────────────────────────────────────────────────────────────

/// Resolves a source material into output parameters and texture bindings.
///
/// The first combined `<Channel>` property locks that channel; every later
/// `<Channel>`, `<Channel>Color` or `<Channel>Factor` is ignored. Unlocked
/// channels resolve to `color * factor` from the last values seen.
pub(super) fn resolve_material(id: &str, source: &SourceMaterial) -> Material {
    let mut material = Material::new(id);

    let mut states = CHANNELS.map(|spec| {
        let default = *(spec.field)(&mut material);
        ChannelState {
            color: default.map(f64::from),
            factor: 1.0,
        }
    });
    let mut locked = 0u8;

    walk_properties(&source.properties, &mut |property| {
        for (bit, spec) in CHANNELS.iter().enumerate() {
            let flag = 1u8 << bit;
            let state = &mut states[bit];
            let name = property.name.as_str();

            if name == spec.combined {
                if locked & flag == 0
                    && let Some(color) = property.value.as_color()
                {
                    locked |= flag;
                    state.color = color;
                    state.factor = 1.0;
                }
                return;
            }
            if name == spec.color {
                if locked & flag == 0
                    && let Some(color) = property.value.as_color()
                {
                    state.color = color;
                }
                return;
            }
            if name == spec.factor {
                if locked & flag == 0
                    && let Some(factor) = property.value.as_number()
                {
                    state.factor = factor;
                }
                return;
            }
        }

        match property.name.as_str() {
            "Shininess" | "ShininessExponent" => {
                if let Some(value) = property.value.as_number() {
                    material.shininess = value as f32;
                }
            }
            "Opacity" => {
                if let Some(value) = property.value.as_number() {
                    material.opacity = value as f32;
                }
            }
            "TransparencyFactor" => {
                if let Some(value) = property.value.as_number() {
                    material.opacity = (1.0 - value) as f32;
                }
            }
            _ => {}
        }
    });

    for (spec, state) in CHANNELS.iter().zip(states) {
        *(spec.field)(&mut material) = state.color.map(|c| (c * state.factor) as f32);
    }

    material.lambert_only = source.shading_model.eq_ignore_ascii_case("lambert");

    let slots = [
        (source.diffuse_texture.as_ref(), TextureUsage::Diffuse),
        (source.normal_texture.as_ref(), TextureUsage::Normal),
    ];
    material.textures = slots
        .into_iter()
        .filter_map(|(texture, usage)| texture.and_then(|texture| resolve_texture(texture, usage)))
        .collect();

    material
}

fn walk_properties(properties: &[Property], visit: &mut impl FnMut(&Property)) {
    for property in properties {
        visit(property);
        walk_properties(&property.children, visit);
    }
}

fn resolve_texture(texture: &SourceTexture, usage: TextureUsage) -> Option<Texture> {
    let file_name = base_name(&texture.file_name);
    if file_name.is_empty() {
        return None;
    }
    let id = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(file_name);

    Some(Texture {
        id: id.to_string(),
        file_name: file_name.to_string(),
        usage,
        uv_translation: texture.uv_translation.unwrap_or([0.0, 0.0]).map(|v| v as f32),
        uv_scale: texture.uv_scaling.unwrap_or([1.0, 1.0]).map(|v| v as f32),
    })
}

/// Last path component, accepting both separator styles.
fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PropertyValue;

    fn color(name: &str, rgb: f64) -> Property {
        Property {
            name: name.to_string(),
            value: PropertyValue::Vector(vec![rgb; 3]),
            children: Vec::new(),
        }
    }

    fn number(name: &str, value: f64) -> Property {
        Property {
            name: name.to_string(),
            value: PropertyValue::Number(value),
            children: Vec::new(),
        }
    }

    fn assert_rgb(actual: [f32; 3], expected: f32) {
        for channel in actual {
            assert!((channel - expected).abs() < 1e-6, "{actual:?} != {expected}");
        }
    }

    #[test]
    fn given_combined_ambient_when_factor_follows_then_factor_is_ignored() {
        let source = SourceMaterial {
            name: "mat".into(),
            properties: vec![
                color("AmbientColor", 0.2),
                color("Ambient", 0.5),
                number("AmbientFactor", 2.0),
            ],
            ..Default::default()
        };

        let material = resolve_material("mat", &source);

        assert_rgb(material.ambient, 0.5);
    }

    #[test]
    fn given_color_and_factor_only_when_resolving_then_channel_is_their_product() {
        let source = SourceMaterial {
            properties: vec![
                number("DiffuseFactor", 0.5),
                color("DiffuseColor", 0.8),
                color("DiffuseColor", 0.6),
            ],
            ..Default::default()
        };

        let material = resolve_material("mat", &source);

        assert_rgb(material.diffuse, 0.3);
        assert_rgb(material.ambient, 1.0);
    }

    #[test]
    fn given_second_combined_value_when_resolving_then_first_one_wins() {
        let source = SourceMaterial {
            properties: vec![color("Emissive", 0.25), color("Emissive", 0.75)],
            ..Default::default()
        };

        let material = resolve_material("mat", &source);

        assert_rgb(material.emissive, 0.25);
    }

    #[test]
    fn given_nested_properties_when_resolving_then_children_are_visited_in_order() {
        let source = SourceMaterial {
            properties: vec![Property {
                name: "Properties70".into(),
                value: PropertyValue::None,
                children: vec![
                    color("SpecularColor", 0.5),
                    number("ShininessExponent", 20.0),
                    number("TransparencyFactor", 0.25),
                ],
            }],
            ..Default::default()
        };

        let material = resolve_material("mat", &source);

        assert_rgb(material.specular, 0.5);
        assert_eq!(material.shininess, 20.0);
        assert_eq!(material.opacity, 0.75);
    }

    #[test]
    fn given_lambert_shading_when_resolving_then_material_is_lambert_only() {
        let source = SourceMaterial {
            shading_model: "Lambert".into(),
            ..Default::default()
        };

        assert!(resolve_material("mat", &source).lambert_only);
        assert!(!resolve_material("mat", &SourceMaterial::default()).lambert_only);
    }

    #[test]
    fn given_texture_paths_when_resolving_then_base_names_are_used() {
        let source = SourceMaterial {
            diffuse_texture: Some(SourceTexture {
                file_name: r"C:\art\skin\body_d.png".into(),
                uv_translation: None,
                uv_scaling: Some([2.0, 2.0]),
            }),
            normal_texture: Some(SourceTexture {
                file_name: "textures/body_n.tga".into(),
                uv_translation: None,
                uv_scaling: None,
            }),
            ..Default::default()
        };

        let material = resolve_material("mat", &source);

        assert_eq!(material.textures.len(), 2);
        assert_eq!(material.textures[0].id, "body_d");
        assert_eq!(material.textures[0].file_name, "body_d.png");
        assert_eq!(material.textures[0].usage, TextureUsage::Diffuse);
        assert_eq!(material.textures[0].uv_scale, [2.0, 2.0]);
        assert_eq!(material.textures[1].file_name, "body_n.tga");
        assert_eq!(material.textures[1].usage, TextureUsage::Normal);
    }
}
