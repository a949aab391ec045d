//! Core data types shared by the mesh facade and every backend.

/// Size in bytes of one vertex component. Vertex data is always 32-bit float.
pub const FLOAT_SIZE: u32 = std::mem::size_of::<f32>() as u32;

/// Byte length of `float_count` floats, `None` if it does not fit in a `u32`.
pub fn float_byte_len(float_count: usize) -> Option<u32> {
    u32::try_from(float_count)
        .ok()
        .and_then(|count| count.checked_mul(FLOAT_SIZE))
}

/// Graphics API reported by a [`GraphicsContext`](crate::GraphicsContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    /// OpenGL ES 2.0 (vertex array objects only through an extension).
    OpenGLES2,
    /// OpenGL ES 3.0.
    OpenGLES3,
    /// Apple Metal.
    Metal,
    /// Vulkan.
    Vulkan,
}

impl ApiVersion {
    /// Whether this is one of the OpenGL family versions.
    pub fn is_opengl(&self) -> bool {
        matches!(self, Self::OpenGLES2 | Self::OpenGLES3)
    }
}

/// Primitive topology used for a non-indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawPrimitive {
    /// Every three vertices form a triangle.
    #[default]
    Triangles,
    /// Each vertex after the first two forms a triangle with its predecessors.
    TriangleStrip,
    /// Connected line segments.
    LineStrip,
}

/// Maps a shader attribute name onto a slice of one vertex record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeMapping {
    /// Name of the attribute in the shader program.
    pub name: String,
    /// Byte offset within one vertex record.
    pub offset: u32,
    /// Number of float components (1-4).
    pub component_count: u32,
}

impl AttributeMapping {
    /// Create a new attribute mapping.
    pub fn new(name: impl Into<String>, offset: u32, component_count: u32) -> Self {
        Self {
            name: name.into(),
            offset,
            component_count,
        }
    }

    /// Size in bytes of this attribute within a vertex record.
    pub fn size(&self) -> u32 {
        self.component_count * FLOAT_SIZE
    }
}

/// CPU-side vertex data of one buffer slot plus its attribute layout.
///
/// An empty buffer is a legal placeholder: backends skip it when uploading
/// and binding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VertexBuffer {
    data: Vec<f32>,
    stride: u32,
    attributes: Vec<AttributeMapping>,
}

impl VertexBuffer {
    /// Create a vertex buffer with no attributes.
    ///
    /// # Panics
    ///
    /// Panics if the data is 4 GiB or larger.
    pub fn new(data: Vec<f32>, stride: u32) -> Self {
        assert!(
            float_byte_len(data.len()).is_some(),
            "vertex data of {} floats exceeds the 32-bit byte size limit",
            data.len()
        );
        Self {
            data,
            stride,
            attributes: Vec::new(),
        }
    }

    /// Vertex data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Vertex data as raw bytes, ready for upload.
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Byte length of the vertex data.
    pub fn size_in_bytes(&self) -> u32 {
        float_byte_len(self.data.len())
            .unwrap_or_else(|| unreachable!("vertex data length is checked on construction"))
    }

    /// Bytes per vertex record.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Attributes read from this buffer, in declaration order.
    pub fn attributes(&self) -> &[AttributeMapping] {
        &self.attributes
    }

    /// Whether this buffer holds no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of whole vertex records in this buffer.
    pub fn vertex_count(&self) -> u32 {
        if self.stride == 0 {
            return 0;
        }
        self.size_in_bytes() / self.stride
    }

    /// Swap in new data of the same length, returning the previous data.
    pub(crate) fn replace_data(&mut self, data: Vec<f32>) -> Vec<f32> {
        debug_assert_eq!(data.len(), self.data.len());
        std::mem::replace(&mut self.data, data)
    }

    pub(crate) fn push_attribute(&mut self, attribute: AttributeMapping) {
        self.attributes.push(attribute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_family() {
        assert!(ApiVersion::OpenGLES2.is_opengl());
        assert!(ApiVersion::OpenGLES3.is_opengl());
        assert!(!ApiVersion::Vulkan.is_opengl());
        assert!(!ApiVersion::Metal.is_opengl());
    }

    #[test]
    fn test_vertex_buffer_sizes() {
        let buffer = VertexBuffer::new(vec![0.0; 9], 12);
        assert_eq!(buffer.size_in_bytes(), 36);
        assert_eq!(buffer.bytes().len(), 36);
        assert_eq!(buffer.vertex_count(), 3);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_empty_vertex_buffer() {
        let buffer = VertexBuffer::new(Vec::new(), 12);
        assert!(buffer.is_empty());
        assert_eq!(buffer.vertex_count(), 0);
        assert_eq!(VertexBuffer::default().vertex_count(), 0);
    }

    #[test]
    fn test_float_byte_len_limits() {
        assert_eq!(float_byte_len(0), Some(0));
        assert_eq!(float_byte_len(9), Some(36));
        assert_eq!(float_byte_len((u32::MAX / FLOAT_SIZE) as usize), Some(u32::MAX - 3));
        assert_eq!(float_byte_len(1 << 30), None);
        assert_eq!(float_byte_len(usize::MAX), None);
    }

    #[test]
    fn test_attribute_size() {
        assert_eq!(AttributeMapping::new("a_pos", 0, 3).size(), 12);
        assert_eq!(AttributeMapping::new("a_uv", 12, 2).size(), 8);
    }
}
