//! Vertex input layout of a Vulkan mesh.
//!
//! Each non-empty mesh buffer becomes one [`BindingInfo`]: a vertex binding
//! plus one [`BindingDecl`] per attribute, with shader locations already
//! resolved. The context turns these into pipeline vertex input state.

use ash::vk;

use crate::program::{resolve_attribute, GpuProgram};
use crate::types::{VertexBuffer, FLOAT_SIZE};

/// Scalar type of a vertex attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    #[default]
    Float,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(self) -> u32 {
        match self {
            Self::Float => FLOAT_SIZE,
        }
    }

    /// Vertex format for `component_count` components of this type.
    ///
    /// # Panics
    ///
    /// Panics if `component_count` is not in `1..=4`.
    pub fn vk_format(self, component_count: u32) -> vk::Format {
        match (self, component_count) {
            (Self::Float, 1) => vk::Format::R32_SFLOAT,
            (Self::Float, 2) => vk::Format::R32G32_SFLOAT,
            (Self::Float, 3) => vk::Format::R32G32B32_SFLOAT,
            (Self::Float, 4) => vk::Format::R32G32B32A32_SFLOAT,
            (_, n) => panic!("unsupported vertex component count {n}"),
        }
    }
}

/// One attribute read from a vertex binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDecl {
    pub attribute_name: String,
    pub location: u32,
    pub component_count: u32,
    pub component_type: ComponentType,
    pub offset: u32,
    pub stride: u32,
}

/// Layout of one vertex buffer binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    /// Vertex input binding number, equal to the mesh buffer index.
    pub binding: u32,
    pub stride: u32,
    pub decls: Vec<BindingDecl>,
}

impl BindingInfo {
    /// Describe `buffer`, resolving attribute locations against `program`.
    ///
    /// # Panics
    ///
    /// Panics if the program does not declare one of the attributes.
    pub fn from_vertex_buffer(
        buffer_index: usize,
        buffer: &VertexBuffer,
        program: &dyn GpuProgram,
    ) -> Self {
        let decls = buffer
            .attributes()
            .iter()
            .map(|attribute| BindingDecl {
                attribute_name: attribute.name.clone(),
                location: resolve_attribute(program, &attribute.name),
                component_count: attribute.component_count,
                component_type: ComponentType::Float,
                offset: attribute.offset,
                stride: buffer.stride(),
            })
            .collect();

        Self {
            binding: buffer_index as u32,
            stride: buffer.stride(),
            decls,
        }
    }

    /// Per-vertex binding for pipeline creation.
    pub fn vertex_input_binding(&self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: self.binding,
            stride: self.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// One attribute description per resolved declaration, all on this binding.
    pub fn vertex_input_attributes(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.decls
            .iter()
            .map(|decl| vk::VertexInputAttributeDescription {
                location: decl.location,
                binding: self.binding,
                format: decl.component_type.vk_format(decl.component_count),
                offset: decl.offset,
            })
            .collect()
    }
}
