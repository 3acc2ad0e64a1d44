//! Material handles and the per-scene material registry
//!
//! Materials are produced by an external loader (MTL parsing, texture
//! upload, and descriptor-set writes happen outside the core); the registry
//! stores the resulting handles and resolves submesh material names when
//! batches are built. Unresolved names fall back to a default appearance.

use ash::vk;
use bitflags::bitflags;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;

new_key_type! {
    /// Stable key for a registered material
    pub struct MaterialKey;
}

bitflags! {
    /// Shader feature flags pushed alongside the material constants
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MaterialFlags: u32 {
        /// Material samples a diffuse texture
        const HAS_TEXTURE = 1 << 0;
        /// Material samples a normal map
        const HAS_NORMAL_MAP = 1 << 1;
    }
}

/// One loaded material
///
/// Carries the shading inputs the frame recorder pushes per batch and the
/// descriptor set the external material loader allocated for its textures.
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name as referenced by submeshes
    pub name: String,

    /// Diffuse color (RGBA)
    pub diffuse_color: [f32; 4],

    /// Shader feature flags
    pub flags: MaterialFlags,

    /// Dissolve/opacity: 0.0 = fully transparent, 1.0 = opaque
    pub dissolve: f32,

    /// Whether draws using this material render in the forward
    /// transparency pass instead of the G-buffer pass
    pub transparent: bool,

    /// Descriptor set with the material's shader resources, allocated by
    /// the external material loader; NULL when the material has none
    pub descriptor_set: vk::DescriptorSet,
}

impl Material {
    /// Create an opaque material with default appearance
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse_color: [1.0, 1.0, 1.0, 1.0],
            flags: MaterialFlags::empty(),
            dissolve: 1.0,
            transparent: false,
            descriptor_set: vk::DescriptorSet::null(),
        }
    }

    /// Set the diffuse color
    pub fn with_diffuse_color(mut self, color: [f32; 4]) -> Self {
        self.diffuse_color = color;
        self
    }

    /// Set the dissolve factor; below 1.0 the material is transparent
    pub fn with_dissolve(mut self, dissolve: f32) -> Self {
        self.dissolve = dissolve.clamp(0.0, 1.0);
        self.transparent = self.dissolve < 1.0;
        self
    }

    /// Set the shader feature flags
    pub fn with_flags(mut self, flags: MaterialFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the descriptor set holding the material's shader resources
    pub fn with_descriptor_set(mut self, set: vk::DescriptorSet) -> Self {
        self.descriptor_set = set;
        self
    }

    /// Push-constant block for this material
    pub fn push_constants(&self) -> MaterialPushConstants {
        MaterialPushConstants {
            diffuse_color: self.diffuse_color,
            flags: self.flags.bits(),
            dissolve: self.dissolve,
            _padding: [0.0; 2],
        }
    }
}

/// Per-material push constants consumed by the geometry and forward passes
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MaterialPushConstants {
    /// Diffuse color (RGBA)
    pub diffuse_color: [f32; 4],
    /// `MaterialFlags` bits
    pub flags: u32,
    /// Dissolve factor
    pub dissolve: f32,
    /// Pad to a 16-byte multiple for the push-constant range
    pub _padding: [f32; 2],
}

unsafe impl bytemuck::Pod for MaterialPushConstants {}
unsafe impl bytemuck::Zeroable for MaterialPushConstants {}

/// Default push constants used for draws with no resolved material
pub fn default_push_constants() -> MaterialPushConstants {
    Material::new("default").push_constants()
}

/// Registry of loaded materials, keyed for batch grouping
///
/// Owned by the embedding application alongside its texture and descriptor
/// machinery; the scene only resolves names and reads handles.
#[derive(Default)]
pub struct MaterialRegistry {
    materials: SlotMap<MaterialKey, Material>,
    by_name: HashMap<String, MaterialKey>,
}

impl MaterialRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material, replacing any previous entry with the same name
    pub fn insert(&mut self, material: Material) -> MaterialKey {
        if let Some(&existing) = self.by_name.get(&material.name) {
            self.materials[existing] = material;
            return existing;
        }
        let name = material.name.clone();
        let key = self.materials.insert(material);
        self.by_name.insert(name, key);
        key
    }

    /// Resolve a material name to its key
    pub fn resolve(&self, name: &str) -> Option<MaterialKey> {
        self.by_name.get(name).copied()
    }

    /// Material by key
    pub fn get(&self, key: MaterialKey) -> Option<&Material> {
        self.materials.get(key)
    }

    /// Whether the material behind a key renders transparently
    ///
    /// Unregistered keys (and the default appearance) are opaque.
    pub fn is_transparent(&self, key: Option<MaterialKey>) -> bool {
        key.and_then(|k| self.materials.get(k))
            .is_some_and(|m| m.transparent)
    }

    /// Number of registered materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constants_layout() {
        // vec4 + uint + float + 2 floats of padding = 32 bytes
        assert_eq!(std::mem::size_of::<MaterialPushConstants>(), 32);
    }

    #[test]
    fn test_dissolve_marks_transparent() {
        let opaque = Material::new("wall").with_dissolve(1.0);
        let glass = Material::new("glass").with_dissolve(0.4);

        assert!(!opaque.transparent);
        assert!(glass.transparent);
        assert_eq!(glass.dissolve, 0.4);
    }

    #[test]
    fn test_registry_resolve() {
        let mut registry = MaterialRegistry::new();
        let key = registry.insert(Material::new("stone"));

        assert_eq!(registry.resolve("stone"), Some(key));
        assert_eq!(registry.resolve("missing"), None);
        assert!(!registry.is_transparent(Some(key)));
        assert!(!registry.is_transparent(None));
    }

    #[test]
    fn test_registry_replaces_by_name() {
        let mut registry = MaterialRegistry::new();
        let first = registry.insert(Material::new("glass").with_dissolve(0.5));
        let second = registry.insert(Material::new("glass").with_dissolve(0.3));

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(first).unwrap().dissolve, 0.3);
    }

    #[test]
    fn test_flags_round_trip_through_push_constants() {
        let material = Material::new("brick")
            .with_flags(MaterialFlags::HAS_TEXTURE | MaterialFlags::HAS_NORMAL_MAP);

        let pc = material.push_constants();
        let restored = MaterialFlags::from_bits_truncate(pc.flags);
        assert!(restored.contains(MaterialFlags::HAS_TEXTURE));
        assert!(restored.contains(MaterialFlags::HAS_NORMAL_MAP));
    }
}
