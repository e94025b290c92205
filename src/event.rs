//! Definition events published by a [`TypeSpace`](crate::types::TypeSpace).
//!
//! Whichever component registers members publishes; subscribers react
//! synchronously. The deferred-placement hook is the in-crate subscriber,
//! but the channel is open to hosts that want their own observers.

use std::sync::Arc;

/// A member-table change a subscriber may react to.
///
/// Events are published after the space's internal locks are released, so
/// subscribers are free to query or mutate the space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionEvent {
    /// Instance member `method` was defined or redefined on `type_path`.
    InstanceMethodAdded { type_path: String, method: String },
    /// Static member `method` was defined or redefined on `type_path`.
    StaticMethodAdded { type_path: String, method: String },
    /// `host` incorporated `module`'s instance members.
    ModuleIncluded { host: String, module: String },
}

/// Synchronous observer of definition events.
pub type Subscriber = Arc<dyn Fn(&DefinitionEvent) + Send + Sync>;
