//! Shell execution for the sandgate gateway.
//!
//! Commands pass through a [`CommandPolicy`] before a [`CommandExecutor`]
//! spawns them. The stock executor runs the platform shell in its own process
//! group, caps captured output per stream, and kills the whole group when the
//! timeout elapses.

pub mod executor;
pub mod policy;
pub mod process_group;
pub mod stream;

pub use executor::{
    CommandExecutor, CommandInvocation, CommandOutput, CommandStatus, DEFAULT_MAX_OUTPUT_BYTES,
    ExecError, ProcessCommandExecutor, SIGNALED_EXIT_CODE, ShellKind, TIMEOUT_EXIT_CODE,
};
pub use policy::{
    CommandPolicy, DenyCategory, DenyRule, DenylistPolicy, PolicyChain, PolicyViolation,
    SandboxGuardPolicy,
};
