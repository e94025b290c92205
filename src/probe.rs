//! Probe lifecycle: qualified-name parsing, installation, removal, counting.
//!
//! A probe owns one counter and one interception for one `(type, member)`
//! target. Installing captures the slot the member currently resolves to
//! (walking inheritance and includes) and writes a counting wrapper into the
//! owner's *own* table, shadowing an inherited definition rather than
//! touching the ancestor. Removal writes the captured slot back and is
//! terminal: a fresh `instrument` call builds a new probe.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::call::{Call, MethodFn};
use crate::types::{MemberKind, MethodSlot, TypeSpace};

/// Error types for probe naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The string contains no `.` or `#` member separator.
    InvalidName(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName(name) => write!(f, "Failed to parse probe name '{}'", name),
        }
    }
}

impl std::error::Error for Error {}

/// Parsed probe target: owner path, member kind, member name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    owner: String,
    kind: MemberKind,
    member: String,
}

impl ProbeTarget {
    /// Parse `Owner#member` / `Owner.member`.
    ///
    /// The owner path is everything up to the last separator character, so
    /// namespace segments (`A::B#member`) parse as expected.
    pub fn parse(name: &str) -> Result<Self, Error> {
        let idx = name
            .rfind(['.', '#'])
            .ok_or_else(|| Error::InvalidName(name.to_string()))?;
        let kind = if name.as_bytes()[idx] == b'#' {
            MemberKind::Instance
        } else {
            MemberKind::Static
        };
        Ok(Self {
            owner: name[..idx].to_string(),
            kind,
            member: name[idx + 1..].to_string(),
        })
    }

    /// Owner type path.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Instance or static member.
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Member name.
    pub fn member(&self) -> &str {
        &self.member
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, self.kind.separator(), self.member)
    }
}

enum ProbeState {
    /// Waiting for the target to become resolvable.
    Pending,
    /// Wrapper in place; holds the captured pre-interception slot.
    Installed { original: MethodSlot },
    /// Uninstalled; the captured slot has been written back.
    Removed,
}

/// Counts calls routed through one member slot.
pub struct Probe {
    name: String,
    target: ProbeTarget,
    space: Arc<TypeSpace>,
    calls: Arc<AtomicU64>,
    state: Mutex<ProbeState>,
}

impl Probe {
    /// Parse `name` and attempt immediate installation.
    pub(crate) fn new(name: &str, space: Arc<TypeSpace>) -> Result<Arc<Self>, Error> {
        let target = ProbeTarget::parse(name)?;
        let probe = Arc::new(Self {
            name: name.to_string(),
            target,
            space,
            calls: Arc::new(AtomicU64::new(0)),
            state: Mutex::new(ProbeState::Pending),
        });
        probe.try_install();
        Ok(probe)
    }

    /// Qualified name this probe was requested under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parsed target.
    pub fn target(&self) -> &ProbeTarget {
        &self.target
    }

    /// Calls counted so far. Stops advancing once the probe is removed.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Whether the wrapper is currently in place.
    pub fn is_installed(&self) -> bool {
        matches!(*self.state.lock(), ProbeState::Installed { .. })
    }

    /// Install the counting wrapper if the target is resolvable.
    ///
    /// No-op unless pending. Installing the wrapper republishes the member's
    /// definition event; the busy state lock absorbs that re-entry, same as
    /// a concurrent install or an in-progress removal.
    pub fn try_install(&self) {
        let Some(mut state) = self.state.try_lock() else {
            return;
        };
        if !matches!(*state, ProbeState::Pending) {
            return;
        }
        let Some(owner) = self.space.resolve(self.target.owner()) else {
            return;
        };
        let Some(original) =
            self.space
                .resolve_member(owner, self.target.kind(), self.target.member())
        else {
            return;
        };

        let counter = Arc::clone(&self.calls);
        let forwarded = original.f.clone();
        let wrapper: MethodFn = Arc::new(move |call: Call<'_>| {
            counter.fetch_add(1, Ordering::Relaxed);
            forwarded(call)
        });
        self.space.define_slot(
            owner,
            self.target.kind(),
            self.target.member(),
            MethodSlot {
                f: wrapper,
                visibility: original.visibility,
            },
        );

        *state = ProbeState::Installed { original };
        log::debug!("probe {}: installed", self.name);
    }

    /// Restore the captured slot and retire the probe.
    ///
    /// No-op unless installed; calling twice is the same as calling once.
    pub fn remove(&self) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, ProbeState::Removed) {
            ProbeState::Installed { original } => {
                if let Some(owner) = self.space.resolve(self.target.owner()) {
                    self.space
                        .define_slot(owner, self.target.kind(), self.target.member(), original);
                }
                log::debug!("probe {}: removed", self.name);
            }
            other => {
                *state = other;
            }
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
