//! Flat normals for triangle lists.

use glam::Vec3;

/// Compute one flat normal per triangle, repeated for its three vertices.
///
/// `vertices` holds consecutive triangles of `components_per_vertex` floats per
/// vertex, the first three of which are the position. Trailing floats that do
/// not form a whole triangle are ignored. The normal follows the right-hand
/// rule over `(v1 - v0) x (v2 - v0)`. Degenerate triangles get a zero normal.
///
/// Returns `9 * triangle_count` floats.
///
/// # Panics
///
/// Panics if `components_per_vertex < 3`.
pub fn generate_normals_for_triangles(vertices: &[f32], components_per_vertex: usize) -> Vec<f32> {
    assert!(
        components_per_vertex >= 3,
        "vertices need at least 3 components, got {components_per_vertex}"
    );

    let triangle_stride = 3 * components_per_vertex;
    let triangle_count = vertices.len() / triangle_stride;
    let mut normals = Vec::with_capacity(triangle_count * 9);

    for triangle in vertices.chunks_exact(triangle_stride) {
        let position = |vertex: usize| {
            let start = vertex * components_per_vertex;
            Vec3::from_slice(&triangle[start..start + 3])
        };
        let (v0, v1, v2) = (position(0), position(1), position(2));
        let normal = (v1 - v0).cross(v2 - v0).normalize_or_zero();

        for _ in 0..3 {
            normals.extend_from_slice(&normal.to_array());
        }
    }

    normals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_triangle() {
        let normals =
            generate_normals_for_triangles(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 3);
        assert_eq!(normals, [0.0f32, 0.0, 1.0].repeat(3));
    }

    #[test]
    fn test_winding_flips_normal() {
        let normals =
            generate_normals_for_triangles(&[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0], 3);
        assert_eq!(normals, [0.0f32, 0.0, -1.0].repeat(3));
    }

    #[test]
    fn test_extra_components_are_skipped() {
        // x, y, z, u, v per vertex
        let vertices = [
            0.0, 0.0, 0.0, 0.5, 0.5, //
            0.0, 0.0, 2.0, 0.5, 0.5, //
            0.0, 3.0, 0.0, 0.5, 0.5,
        ];
        let normals = generate_normals_for_triangles(&vertices, 5);
        assert_eq!(normals, [-1.0f32, 0.0, 0.0].repeat(3));
    }

    #[test]
    fn test_output_length() {
        for triangles in 0..5 {
            let vertices: Vec<f32> = (0..triangles * 9).map(|i| (i * i) as f32).collect();
            assert_eq!(
                generate_normals_for_triangles(&vertices, 3).len(),
                triangles * 9
            );
        }
    }

    #[test]
    fn test_degenerate_triangle_gets_zero_normal() {
        let normals =
            generate_normals_for_triangles(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0], 3);
        assert_eq!(normals, vec![0.0f32; 9]);
    }

    #[test]
    #[should_panic(expected = "at least 3 components")]
    fn test_two_components_rejected() {
        generate_normals_for_triangles(&[0.0; 6], 2);
    }
}
