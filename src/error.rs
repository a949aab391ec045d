//! Error types for mesh building and rendering.
//!
//! Contract violations (out-of-range indices, unresolved attributes, updating
//! an unbuilt mesh) are programming errors and panic. Everything that can go
//! wrong because of an asset or a GPU resource is reported through these types.

use ash::vk;
use thiserror::Error;

use crate::types::ApiVersion;

/// Failure to create, decode or bind a GPU resource.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to decode texture {path}: {source}")]
    DecodeFailed {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("no texture descriptor slot in the current frame's parameters")]
    DescriptorNotFound,
    #[error("staging buffer cannot hold {requested} bytes ({available} available)")]
    OutOfStagingSpace { requested: u32, available: u32 },
    #[error("failed to allocate GPU memory: {0}")]
    AllocationFailed(String),
    #[error("unknown GPU object {0}")]
    UnknownObject(u64),
    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
}

/// Error returned by mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("{backend} mesh backend needs a {backend} context, but the context reports {reported:?}")]
    ContextMismatch {
        backend: &'static str,
        reported: ApiVersion,
    },
    #[error("no {0} command buffer is being recorded")]
    MissingCommandBuffer(&'static str),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Result of a mesh operation.
pub type MeshResult<T> = Result<T, MeshError>;
