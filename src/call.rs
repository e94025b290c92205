//! Dynamic invocation surface shared by member tables and probes.
//!
//! Every member registered in a [`TypeSpace`](crate::types::TypeSpace) is an
//! ordinary closure behind the [`MethodFn`] alias, invoked with one [`Call`]
//! record. A probe's counting wrapper has the same shape and forwards the
//! record by move, so wrapping is invisible to both caller and callee.

use std::any::Any;
use std::sync::Arc;

use crate::types::{Instance, TypeSpace};

/// A positional argument or return value, opaque to the dispatch layer.
pub type Value = Box<dyn Any + Send>;

/// Caller-supplied callback forwarded to the member unchanged.
pub type Block = Box<dyn FnMut(Vec<Value>) -> CallResult + Send>;

/// Result of invoking a member.
pub type CallResult = Result<Value, CallError>;

/// A member implementation stored in a method table.
pub type MethodFn = Arc<dyn for<'a> Fn(Call<'a>) -> CallResult + Send + Sync>;

/// One invocation, handed to the member by move.
pub struct Call<'a> {
    /// Dispatch surface, for members that re-enter the public tables.
    pub space: &'a TypeSpace,
    /// Receiver handle for instance members, `None` for static members.
    pub receiver: Option<Instance>,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Optional callback attached by the caller.
    pub block: Option<Block>,
}

/// Return value for members with nothing to report.
pub fn unit() -> Value {
    Box::new(())
}

/// Error types for member dispatch.
#[derive(Debug)]
pub enum CallError {
    /// Owner type not registered.
    TypeNotFound(String),
    /// Member not defined anywhere on the owner's lookup chain.
    MethodMissing { owner: String, method: String },
    /// Member exists but is not public; use the `send_*` entry points.
    PrivateMethod { owner: String, method: String },
    /// Error raised by the member body, passed through unchanged.
    Host(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeNotFound(path) => write!(f, "Type not found: {}", path),
            Self::MethodMissing { owner, method } => {
                write!(f, "Method {} not defined on {}", method, owner)
            }
            Self::PrivateMethod { owner, method } => {
                write!(f, "Method {} on {} is not public", method, owner)
            }
            Self::Host(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CallError {}
