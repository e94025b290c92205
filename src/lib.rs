//! Call-counting instrumentation for host-registered method tables.
//!
//! A [`TypeSpace`] is an explicit, host-populated universe of types with
//! per-type member tables: only what the host registers there is invokable,
//! and therefore instrumentable. A [`Probe`] counts every call routed
//! through one member slot: it captures the current implementation, swaps
//! in a wrapper that increments and forwards, and restores the original on
//! removal. Probes may be requested before their target exists; the
//! deferred placement hook installs them the moment the member is defined.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use calltally::{Call, ProbeRegistry, TypeSpace, Visibility, unit};
//!
//! let space = Arc::new(TypeSpace::new());
//! let potato = space.define_type("Potato", None).unwrap();
//! space.define_instance_method(potato, "bake", Visibility::Public,
//!     Arc::new(|_: Call<'_>| Ok(unit())));
//!
//! let registry = ProbeRegistry::new(Arc::clone(&space));
//! let probe = registry.instrument("Potato#bake").unwrap();
//!
//! let spud = space.new_instance("Potato").unwrap();
//! space.call_instance(&spud, "bake", Vec::new(), None).unwrap();
//! assert_eq!(probe.calls(), 1);
//! ```
//!
//! # Features
//!
//! - `env-trigger` (default) - `COUNT_CALLS_TO` entry point and exit report

// =============================================================================
// Invocation Surface
// =============================================================================

pub mod call;

pub mod types;

// =============================================================================
// Definition Events
// =============================================================================

pub mod event;

// =============================================================================
// Probes
// =============================================================================

pub mod probe;

pub mod registry;

mod deferred;

// =============================================================================
// Environment Trigger
// =============================================================================

#[cfg(feature = "env-trigger")]
pub mod trigger;

// Re-export key types for convenience
pub use call::{Block, Call, CallError, CallResult, MethodFn, Value, unit};

pub use event::{DefinitionEvent, Subscriber};

pub use probe::{Error as ProbeError, Probe, ProbeTarget};

pub use registry::ProbeRegistry;

pub use types::{Error as TypeError, Instance, MemberKind, TypeId, TypeSpace, Visibility};

#[cfg(feature = "env-trigger")]
pub use trigger::{ENV_VAR, ExitReport, install_from_env};
