//! Rendering backend implementations

pub mod vulkan;
