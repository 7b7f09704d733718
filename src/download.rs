//! Client-side download trigger.
//!
//! Saving an artifact means attaching a transient anchor node to the host
//! document, activating it once, and detaching it again. The host document is
//! abstracted as `DocumentSurface` so the sequence can run against a real
//! browser bridge or an in-process test double; environments without a
//! document surface report `SurfaceError::Unavailable` instead of failing
//! silently. The anchor is held by a guard that detaches on every exit path,
//! including an activation failure.

use thiserror::Error;

use crate::artifact::EncodedArtifact;

/// Opaque handle for an attached anchor node.
pub type NodeId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("no document surface is available")]
    Unavailable,
    #[error("anchor activation failed: {0}")]
    Activation(String),
}

/// Minimal document abstraction: attach an anchor, activate it, detach it.
pub trait DocumentSurface: Send + Sync {
    /// Attach an anchor node whose target is `href` and whose suggested save
    /// name is `download_name`.
    fn attach_anchor(&self, href: &str, download_name: &str) -> Result<NodeId, SurfaceError>;

    /// Synchronously activate the anchor; the host performs the actual file
    /// write asynchronously on its own schedule.
    fn activate(&self, node: NodeId) -> Result<(), SurfaceError>;

    /// Detach and release the anchor node. Must tolerate repeated calls.
    fn detach(&self, node: NodeId);
}

/// Transient save request, consumed exactly once per trigger. Two triggers
/// with the same artifact produce two independent downloads.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub artifact: EncodedArtifact,
    pub filename: String,
}

struct AnchorGuard<'a> {
    surface: &'a dyn DocumentSurface,
    node: NodeId,
}

impl Drop for AnchorGuard<'_> {
    fn drop(&mut self) {
        self.surface.detach(self.node);
    }
}

/// Trigger one save-as-file download of `request.artifact` under
/// `request.filename`. The anchor never outlives this call.
pub fn trigger_download(surface: &dyn DocumentSurface, request: DownloadRequest) -> Result<(), SurfaceError> {
    let node = surface.attach_anchor(&request.artifact.data_uri, &request.filename)?;
    let guard = AnchorGuard { surface, node };
    surface.activate(guard.node)?;
    Ok(())
}
