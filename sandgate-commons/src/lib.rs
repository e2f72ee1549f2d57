//! Shared types for the sandgate crates: sandbox path resolution, the file
//! tree model, and the JSON bodies used by both the gateway and its client.

pub mod paths;
pub mod tree;
pub mod wire;

pub use paths::{ResolvedPath, SandboxRoot, SandboxViolation, normalize_path};
pub use tree::{FileTreeNode, NodeKind};
pub use wire::{
    ContentResponse, ErrorBody, ExecOutcome, HealthStatus, SuccessResponse, TokenResponse,
    TreeResponse,
};
