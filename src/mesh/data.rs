//! CPU-side mesh description.

use crate::types::{float_byte_len, AttributeMapping, DrawPrimitive, VertexBuffer};

/// Buffers, texture paths and topology of a mesh.
///
/// Backends receive `&MeshData` on every call and never keep it: the mesh
/// object owns the data, the backend only owns GPU handles.
///
/// Buffers and textures are indexed densely. A setter accepts an existing
/// index (replace) or the next free one (append), never a gap.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    buffers: Vec<VertexBuffer>,
    textures: Vec<String>,
    draw_primitive: DrawPrimitive,
}

impl MeshData {
    /// Empty mesh data drawn as `draw_primitive`.
    pub fn new(draw_primitive: DrawPrimitive) -> Self {
        Self {
            buffers: Vec::new(),
            textures: Vec::new(),
            draw_primitive,
        }
    }

    /// Vertex buffers in index order.
    pub fn buffers(&self) -> &[VertexBuffer] {
        &self.buffers
    }

    /// Texture paths in index order. An empty path is an unused slot.
    pub fn textures(&self) -> &[String] {
        &self.textures
    }

    /// Primitive topology of the mesh.
    pub fn draw_primitive(&self) -> DrawPrimitive {
        self.draw_primitive
    }

    /// Index the next appended buffer gets.
    pub fn next_buffer_index(&self) -> usize {
        self.buffers.len()
    }

    /// Index the next appended texture gets.
    pub fn next_texture_index(&self) -> usize {
        self.textures.len()
    }

    /// Number of vertices a draw covers, taken from the first buffer.
    pub fn vertex_count(&self) -> u32 {
        self.buffers.first().map_or(0, VertexBuffer::vertex_count)
    }

    /// Store or replace a buffer. Replacing drops the old attributes.
    ///
    /// # Panics
    ///
    /// Panics if `index` leaves a gap, if `stride` is zero, or if non-empty
    /// data is not a whole number of `stride`-byte records.
    pub(crate) fn set_buffer(&mut self, index: usize, data: Vec<f32>, stride: u32) {
        assert!(
            index <= self.next_buffer_index(),
            "buffer index {index} out of range (next free index is {})",
            self.next_buffer_index()
        );
        assert!(stride > 0, "buffer {index} has a zero stride");
        let Some(size) = float_byte_len(data.len()) else {
            panic!(
                "buffer {index} holds {} floats, which exceeds the 32-bit byte size limit",
                data.len()
            );
        };
        assert!(
            size % stride == 0,
            "buffer {index} holds {size} bytes, which is not a multiple of its {stride}-byte stride"
        );

        let buffer = VertexBuffer::new(data, stride);
        if index == self.buffers.len() {
            self.buffers.push(buffer);
        } else {
            self.buffers[index] = buffer;
        }
    }

    /// Append an attribute to an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not exist, if `component_count` is not in
    /// `1..=4`, or if the attribute does not fit in one vertex record.
    pub(crate) fn set_attribute(
        &mut self,
        name: &str,
        buffer_index: usize,
        offset: u32,
        component_count: u32,
    ) {
        assert!(
            buffer_index < self.buffers.len(),
            "attribute `{name}` refers to buffer {buffer_index}, but only {} buffers exist",
            self.buffers.len()
        );
        assert!(
            (1..=4).contains(&component_count),
            "attribute `{name}` has {component_count} components, expected 1 to 4"
        );

        let buffer = &mut self.buffers[buffer_index];
        let attribute = AttributeMapping::new(name, offset, component_count);
        assert!(
            offset + attribute.size() <= buffer.stride(),
            "attribute `{name}` ends at byte {} past the {}-byte stride",
            offset + attribute.size(),
            buffer.stride()
        );
        buffer.push_attribute(attribute);
    }

    /// Store or replace a texture path.
    ///
    /// # Panics
    ///
    /// Panics if `index` leaves a gap.
    pub(crate) fn set_texture(&mut self, index: usize, path: String) {
        assert!(
            index <= self.next_texture_index(),
            "texture index {index} out of range (next free index is {})",
            self.next_texture_index()
        );
        if index == self.textures.len() {
            self.textures.push(path);
        } else {
            self.textures[index] = path;
        }
    }

    /// Swap the data of a buffer, keeping stride and attributes. Returns the
    /// previous data.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not exist or the length changes.
    pub(crate) fn replace_buffer_data(&mut self, index: usize, data: Vec<f32>) -> Vec<f32> {
        assert!(
            index < self.buffers.len(),
            "buffer index {index} out of range ({} buffers)",
            self.buffers.len()
        );
        let buffer = &mut self.buffers[index];
        assert_eq!(
            data.len(),
            buffer.data().len(),
            "buffer {index} update must keep its length"
        );
        buffer.replace_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_replace() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        assert_eq!(mesh.next_buffer_index(), 0);

        mesh.set_buffer(0, vec![0.0; 6], 8);
        mesh.set_buffer(1, vec![0.0; 3], 4);
        assert_eq!(mesh.next_buffer_index(), 2);

        mesh.set_attribute("a_pos", 0, 0, 2);
        mesh.set_buffer(0, vec![1.0; 4], 8);
        assert_eq!(mesh.next_buffer_index(), 2);
        assert_eq!(mesh.buffers()[0].data(), &[1.0; 4]);
        assert!(mesh.buffers()[0].attributes().is_empty());
    }

    #[test]
    #[should_panic(expected = "buffer index 2 out of range")]
    fn test_buffer_gap_is_rejected() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, vec![0.0; 3], 12);
        mesh.set_buffer(2, vec![0.0; 3], 12);
    }

    #[test]
    #[should_panic(expected = "not a multiple of its 12-byte stride")]
    fn test_partial_record_is_rejected() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, vec![0.0; 4], 12);
    }

    #[test]
    #[should_panic(expected = "zero stride")]
    fn test_zero_stride_is_rejected() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, Vec::new(), 0);
    }

    #[test]
    fn test_vertex_count_from_first_buffer() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        assert_eq!(mesh.vertex_count(), 0);

        mesh.set_buffer(0, vec![0.0; 18], 24);
        mesh.set_buffer(1, vec![0.0; 6], 8);
        assert_eq!(mesh.vertex_count(), 3);
    }

    #[test]
    #[should_panic(expected = "only 1 buffers exist")]
    fn test_attribute_on_missing_buffer() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, vec![0.0; 3], 12);
        mesh.set_attribute("a_uv", 1, 0, 2);
    }

    #[test]
    #[should_panic(expected = "past the 12-byte stride")]
    fn test_attribute_must_fit_stride() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, vec![0.0; 3], 12);
        mesh.set_attribute("a_pos", 0, 4, 3);
    }

    #[test]
    #[should_panic(expected = "expected 1 to 4")]
    fn test_attribute_component_count() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, vec![0.0; 5], 20);
        mesh.set_attribute("a_wide", 0, 0, 5);
    }

    #[test]
    fn test_textures() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_texture(0, "a.png".into());
        mesh.set_texture(1, "b.png".into());
        mesh.set_texture(0, "c.png".into());
        assert_eq!(mesh.textures(), &["c.png".to_string(), "b.png".to_string()]);
        assert_eq!(mesh.next_texture_index(), 2);
    }

    #[test]
    fn test_replace_returns_previous_data() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, vec![1.0; 3], 12);
        mesh.set_attribute("a_pos", 0, 0, 3);

        let previous = mesh.replace_buffer_data(0, vec![2.0; 3]);
        assert_eq!(previous, vec![1.0; 3]);
        assert_eq!(mesh.buffers()[0].data(), &[2.0; 3]);
        assert_eq!(mesh.buffers()[0].attributes().len(), 1);
    }

    #[test]
    #[should_panic(expected = "must keep its length")]
    fn test_replace_requires_same_length() {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, vec![0.0; 3], 12);
        mesh.replace_buffer_data(0, vec![0.0; 6]);
    }
}
