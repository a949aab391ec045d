//! Shader program and render-state collaborators.
//!
//! Shader compilation, program lookup and render-state application live outside
//! this crate. The mesh object only needs the narrow surface below.

use crate::context::GraphicsContext;

/// A compiled GPU program.
pub trait GpuProgram {
    /// Location of a vertex attribute, or `None` if the program does not declare it.
    fn attribute_location(&self, name: &str) -> Option<u32>;

    /// Make this program current.
    fn bind(&self);

    /// Release this program.
    fn unbind(&self);
}

/// Fixed-function state (depth test, blending, bound textures) applied before a draw.
pub trait RenderState {
    fn apply(&self, context: &mut dyn GraphicsContext, program: &dyn GpuProgram);
}

/// Uploads per-draw shader parameters of type `P` to the bound program.
pub trait ParamsSetter<P: ?Sized> {
    fn apply(&self, context: &mut dyn GraphicsContext, program: &dyn GpuProgram, params: &P);
}

/// Resolve an attribute location.
///
/// # Panics
///
/// Panics if the program does not declare the attribute. A mesh referring to an
/// attribute its program lacks is a configuration error.
pub(crate) fn resolve_attribute(program: &dyn GpuProgram, name: &str) -> u32 {
    match program.attribute_location(name) {
        Some(location) => location,
        None => panic!("attribute `{name}` is not declared by the bound program"),
    }
}
