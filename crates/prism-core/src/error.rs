// SPDX-License-Identifier: CEPL-1.0
//! Fatal renderer failures.
//!
//! Swapchain staleness (out-of-date / suboptimal) is not an error; it is
//! reported as a status and handled by the frame loop. Caller misuse of the
//! frame lifecycle panics instead of producing one of these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Device memory or buffer allocation/mapping failed, or the geometry was invalid.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// A shader binary was missing, unreadable or not valid SPIR-V.
    #[error("failed to load shader: {0}")]
    ShaderLoad(String),

    #[error("failed to create graphics pipeline: {0}")]
    PipelineCreation(String),

    #[error("failed to create swapchain: {0}")]
    SwapchainCreation(String),

    /// Image acquisition failed for a reason other than staleness.
    #[error("surface lost: {0}")]
    SurfaceLost(String),

    /// Submission or presentation failed for a reason other than staleness.
    #[error("failed to present swapchain image: {0}")]
    Presentation(String),

    /// Any other device call (instance/device setup, command recording, idle waits).
    #[error("device error: {0}")]
    Device(String),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;
