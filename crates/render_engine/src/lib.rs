//! # Render Engine
//!
//! A deferred rendering core built on Vulkan: scenes of independently
//! loaded models are merged into unified geometry buffers, partitioned into
//! per-material indirect draw batches, frustum-culled on the CPU every
//! frame, and recorded as a four-pass frame (G-buffer fill, deferred
//! lighting resolve, forward transparency, overlay).
//!
//! The embedding application owns everything around the core: instance and
//! device creation, the window and swapchain, shader compilation,
//! pipelines, and asset file parsing. It hands the core a
//! [`RenderDevice`](render::RenderDevice) bundle, pre-parsed
//! [`MeshData`](render::MeshData), a populated
//! [`MaterialRegistry`](render::MaterialRegistry), and per-frame pass
//! resources, and drives [`FrameRecorder::draw_frame`](render::frame::FrameRecorder::draw_frame).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_engine::prelude::*;
//!
//! # fn demo(device: RenderDevice) -> Result<(), Box<dyn std::error::Error>> {
//! let config = RendererConfig::default();
//! let mut recorder = FrameRecorder::new(&device, &config)?;
//! let mut scene = Scene::new(config.frames_in_flight);
//! let mut materials = MaterialRegistry::new();
//!
//! materials.insert(Material::new("glass").with_dissolve(0.4));
//!
//! let model = Model::new("cube", "assets/cube.obj", MeshData::cube("glass"))?;
//! scene.add_model(&device, recorder.transfer_pool(), &materials, model)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::config::{Config, RendererConfig};
    pub use crate::foundation::math::{Mat4, Vec3, Vec4};
    pub use crate::render::{
        CameraMatrices, FrameOutcome, FramePasses, FrameRecorder, Material, MaterialRegistry,
        MeshData, NullOverlay, OverlayRenderer, PresentTarget, RenderDevice, SubMesh, Vertex,
        MAX_FRAMES_IN_FLIGHT,
    };
    pub use crate::scene::{Model, Scene, SceneError};
}
