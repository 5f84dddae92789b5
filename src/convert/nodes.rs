use crate::error::ConvertError;
use crate::math::{Decomposed, decompose, invert, multiply};
use crate::model::{BoneBinding, Material, Node};
use crate::scene::{MeshObject, Skin, to_matrix};

use super::Converter;
use super::material::resolve_material;

/// Material id used when a mesh carries no material of its own.
pub(super) const DEFAULT_MATERIAL_ID: &str = "default";

impl Converter<'_> {
    // ─── Node tree ────────────────────────────────────────────────────────────

    /// Converts the objects listed in `children` into output nodes.
    ///
    /// `ancestors` holds the ids on the current path from the root and is
    /// used to break reference cycles in malformed scenes.
    pub(super) fn convert_children(
        &mut self,
        children: &[u64],
        ancestors: &mut Vec<u64>,
    ) -> Result<Vec<Node>, ConvertError> {
        let mut nodes = Vec::with_capacity(children.len());
        for &child in children {
            if ancestors.contains(&child) {
                self.diagnostics.warn(
                    "CYCLIC_HIERARCHY",
                    format!("object {child} is its own ancestor; the back edge was skipped"),
                );
                continue;
            }
            let Some(&position) = self.objects.get(&child) else {
                self.diagnostics.warn(
                    "MISSING_OBJECT",
                    format!("child object {child} does not exist in the scene"),
                );
                continue;
            };
            nodes.push(self.convert_node(position, ancestors)?);
        }
        Ok(nodes)
    }

    fn convert_node(
        &mut self,
        position: usize,
        ancestors: &mut Vec<u64>,
    ) -> Result<Node, ConvertError> {
        let scene = self.scene;
        let object = &scene.objects[position];
        let local = decompose(&object.local_transform());
        let id = node_id(&object.name, object.id);

        let parts = match object.mesh() {
            Some(mesh) => self.convert_mesh(&id, mesh)?,
            None => Vec::new(),
        };

        ancestors.push(object.id);
        let children = self.convert_children(&object.children, ancestors)?;
        ancestors.pop();

        Ok(Node {
            id,
            translation: local.translation,
            rotation: local.rotation,
            scale: local.scale,
            parts,
            children,
            source: object.id,
        })
    }

    // ─── Skin bindings ────────────────────────────────────────────────────────

    /// Builds the bone bindings of one partition, in part-local bone order.
    ///
    /// The inverse bind pose is `inverse(transform_link) * transform`,
    /// decomposed. A singular link matrix falls back to identity.
    pub(super) fn bone_bindings(
        &mut self,
        mesh_node_id: &str,
        skin: &Skin,
        bones: &[usize],
    ) -> Vec<BoneBinding> {
        let mut bindings = Vec::with_capacity(bones.len());

        for &bone in bones {
            let Some(cluster) = skin.clusters.get(bone) else {
                continue;
            };

            let bone_id = match self.objects.get(&cluster.link) {
                Some(&position) => {
                    let object = &self.scene.objects[position];
                    node_id(&object.name, object.id)
                }
                None => {
                    self.diagnostics.warn(
                        "UNKNOWN_BONE",
                        format!(
                            "mesh '{mesh_node_id}': cluster {bone} links to missing object {}",
                            cluster.link
                        ),
                    );
                    node_id_fallback(cluster.link)
                }
            };

            let inverse_bind = match invert(&to_matrix(&cluster.transform_link)) {
                Some(inverse) => decompose(&multiply(&inverse, &to_matrix(&cluster.transform))),
                None => {
                    self.diagnostics.warn(
                        "SINGULAR_MATRIX",
                        format!("mesh '{mesh_node_id}': bind pose of bone '{bone_id}' is singular; using identity"),
                    );
                    Decomposed::IDENTITY
                }
            };

            bindings.push(BoneBinding {
                node_id: bone_id,
                translation: inverse_bind.translation,
                rotation: inverse_bind.rotation,
                scale: inverse_bind.scale,
            });
        }

        bindings
    }

    // ─── Materials ────────────────────────────────────────────────────────────

    /// Resolves the material ids addressed by a mesh's material slots,
    /// converting each source material once per run.
    pub(super) fn mesh_material_ids(&mut self, node_id: &str, mesh: &MeshObject) -> Vec<String> {
        if mesh.materials.is_empty() {
            self.diagnostics.warn(
                "DEFAULT_MATERIAL",
                format!("mesh '{node_id}' has no material; a default one was assigned"),
            );
            return vec![self.default_material_id()];
        }

        mesh.materials
            .iter()
            .map(|&index| self.material_id(node_id, index))
            .collect()
    }

    fn material_id(&mut self, node_id: &str, index: usize) -> String {
        if let Some(id) = self.material_slots.get(&index) {
            return id.clone();
        }

        let scene = self.scene;
        let Some(source) = scene.materials.get(index) else {
            self.diagnostics.warn(
                "MISSING_OBJECT",
                format!("mesh '{node_id}' references missing material {index}; using the default"),
            );
            return self.default_material_id();
        };

        let base = if source.name.is_empty() {
            format!("material{index}")
        } else {
            source.name.clone()
        };
        let id = self.unique_material_id(base, Some(index));

        log::debug!("material '{id}' resolved from source material {index}");
        self.model.materials.push(resolve_material(&id, source));
        self.material_slots.insert(index, id.clone());
        id
    }

    fn default_material_id(&mut self) -> String {
        if let Some(id) = &self.default_material {
            return id.clone();
        }

        let id = self.unique_material_id(DEFAULT_MATERIAL_ID.to_string(), None);
        self.model.materials.push(Material::new(&id));
        self.default_material = Some(id.clone());
        id
    }

    /// First id not yet taken: `base`, then `base_<index>`, then numbered
    /// variants of that until one is free.
    fn unique_material_id(&self, base: String, index: Option<usize>) -> String {
        let taken = |id: &str| self.model.materials.iter().any(|material| material.id == id);
        if !taken(&base) {
            return base;
        }

        let stem = match index {
            Some(index) => format!("{base}_{index}"),
            None => base,
        };
        if !taken(&stem) {
            return stem;
        }

        let mut counter = 2usize;
        loop {
            let id = format!("{stem}_{counter}");
            if !taken(&id) {
                return id;
            }
            counter += 1;
        }
    }
}

/// Output id of a scene object: its name, or a synthetic one when unnamed.
fn node_id(name: &str, object: u64) -> String {
    if name.is_empty() {
        node_id_fallback(object)
    } else {
        name.to_string()
    }
}

fn node_id_fallback(object: u64) -> String {
    format!("node{object}")
}
