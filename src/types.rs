//! Host-populated type universe.
//!
//! An explicit namespace tree of types with per-type member tables, in place
//! of reflective traversal of a language runtime: only what the host
//! registers here is invokable, and therefore only that is instrumentable.
//! Types are addressed by `::`-separated paths and may be re-opened at any
//! time; every member (re)definition and module inclusion publishes a
//! [`DefinitionEvent`] so observers can react the instant a target appears.
//!
//! Dispatch clones the resolved slot out of the lock before invoking it, so
//! member bodies may re-enter the tables freely (self-recursion) and may be
//! called from multiple threads at once.

use hashbrown::HashMap;
use spin::{Mutex, RwLock};

use crate::call::{Block, Call, CallError, CallResult, MethodFn, Value};
use crate::event::{DefinitionEvent, Subscriber};

/// Identifier of a type registered in a [`TypeSpace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// Which of a type's two member tables an operation targets.
///
/// Static members live in their own table, the explicit stand-in for the
/// owner's metaclass/singleton namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Instance,
    Static,
}

impl MemberKind {
    /// Qualified-name separator for this kind.
    pub fn separator(&self) -> char {
        match self {
            MemberKind::Instance => '#',
            MemberKind::Static => '.',
        }
    }
}

/// Member visibility, preserved across instrumentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// One entry in a member table: implementation plus visibility.
#[derive(Clone)]
pub(crate) struct MethodSlot {
    pub(crate) f: MethodFn,
    pub(crate) visibility: Visibility,
}

/// Handle to one live object. Dispatch is by type, so instances created
/// before a probe was installed are counted like any other.
#[derive(Debug, Clone, Copy)]
pub struct Instance {
    ty: TypeId,
}

impl Instance {
    /// The type this instance dispatches through.
    pub fn type_id(&self) -> TypeId {
        self.ty
    }
}

/// Error types for type-space definition operations.
///
/// Lookup misses are not errors: [`TypeSpace::resolve`] returns `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Path is empty or contains an empty segment.
    InvalidPath(String),
    /// A parent namespace segment does not exist yet.
    ParentNotFound(String),
    /// Named superclass does not resolve.
    SuperclassNotFound(String),
    /// Re-opened type declared with a different superclass.
    SuperclassMismatch(String),
    /// Type not registered.
    TypeNotFound(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(f, "Invalid type path: {}", path),
            Self::ParentNotFound(path) => write!(f, "Parent namespace not defined: {}", path),
            Self::SuperclassNotFound(name) => write!(f, "Superclass not found: {}", name),
            Self::SuperclassMismatch(path) => {
                write!(f, "Type re-opened with a different superclass: {}", path)
            }
            Self::TypeNotFound(path) => write!(f, "Type not found: {}", path),
        }
    }
}

impl std::error::Error for Error {}

struct TypeEntry {
    /// Canonical `::`-joined path.
    path: String,
    superclass: Option<TypeId>,
    /// Included modules, in inclusion order. Later includes win on lookup.
    includes: Vec<TypeId>,
    /// Nested namespace children.
    nested: HashMap<String, TypeId>,
    instance_methods: HashMap<String, MethodSlot>,
    static_methods: HashMap<String, MethodSlot>,
}

struct SpaceInner {
    types: Vec<TypeEntry>,
    top_level: HashMap<String, TypeId>,
}

/// The type universe one registry instruments.
///
/// All operations are synchronous and bounded. Internal locks are never held
/// while a subscriber or a member body runs.
pub struct TypeSpace {
    inner: RwLock<SpaceInner>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl TypeSpace {
    /// Create an empty type space.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(SpaceInner {
                types: Vec::new(),
                top_level: HashMap::new(),
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Define a type or module at `path`, optionally under a superclass.
    ///
    /// Intermediate namespace segments must already exist. Defining an
    /// existing path re-opens it and returns the existing id; declaring a
    /// different superclass on re-open is an error.
    pub fn define_type(&self, path: &str, superclass: Option<&str>) -> Result<TypeId, Error> {
        let segments = split_path(path)?;
        let mut inner = self.inner.write();

        let sup = match superclass {
            Some(name) => Some(
                resolve_locked(&inner, name)
                    .ok_or_else(|| Error::SuperclassNotFound(name.to_string()))?,
            ),
            None => None,
        };

        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;

        let mut parent: Option<TypeId> = None;
        for segment in parents {
            let child = match parent {
                None => inner.top_level.get(*segment).copied(),
                Some(p) => inner.types[p.0 as usize].nested.get(*segment).copied(),
            };
            parent = Some(child.ok_or_else(|| Error::ParentNotFound(path.to_string()))?);
        }

        let existing = match parent {
            None => inner.top_level.get(*last).copied(),
            Some(p) => inner.types[p.0 as usize].nested.get(*last).copied(),
        };
        if let Some(id) = existing {
            if sup.is_some() && inner.types[id.0 as usize].superclass != sup {
                return Err(Error::SuperclassMismatch(path.to_string()));
            }
            return Ok(id);
        }

        let id = TypeId(inner.types.len() as u32);
        let canonical = segments.join("::");
        inner.types.push(TypeEntry {
            path: canonical.clone(),
            superclass: sup,
            includes: Vec::new(),
            nested: HashMap::new(),
            instance_methods: HashMap::new(),
            static_methods: HashMap::new(),
        });
        match parent {
            None => {
                inner.top_level.insert((*last).to_string(), id);
            }
            Some(p) => {
                inner.types[p.0 as usize].nested.insert((*last).to_string(), id);
            }
        }

        log::debug!("type space: defined {}", canonical);
        Ok(id)
    }

    /// Walk a `::`-separated path from the top level.
    ///
    /// A leading empty segment (rooted path) is discarded. Absence is a
    /// normal outcome, never an error.
    pub fn resolve(&self, path: &str) -> Option<TypeId> {
        resolve_locked(&self.inner.read(), path)
    }

    /// Canonical path of a registered type.
    pub fn type_path(&self, ty: TypeId) -> String {
        self.inner.read().types[ty.0 as usize].path.clone()
    }

    /// Define or redefine an instance member.
    pub fn define_instance_method(
        &self,
        ty: TypeId,
        name: &str,
        visibility: Visibility,
        f: MethodFn,
    ) {
        self.define_slot(ty, MemberKind::Instance, name, MethodSlot { f, visibility });
    }

    /// Define or redefine a static member.
    pub fn define_static_method(
        &self,
        ty: TypeId,
        name: &str,
        visibility: Visibility,
        f: MethodFn,
    ) {
        self.define_slot(ty, MemberKind::Static, name, MethodSlot { f, visibility });
    }

    /// Write a slot into the owner's own table and publish the definition
    /// event. Probe wrappers and restores go through here as well, so they
    /// fire the same events host definitions do.
    pub(crate) fn define_slot(&self, ty: TypeId, kind: MemberKind, name: &str, slot: MethodSlot) {
        let type_path = {
            let mut inner = self.inner.write();
            let entry = &mut inner.types[ty.0 as usize];
            match kind {
                MemberKind::Instance => {
                    entry.instance_methods.insert(name.to_string(), slot);
                }
                MemberKind::Static => {
                    entry.static_methods.insert(name.to_string(), slot);
                }
            }
            entry.path.clone()
        };

        log::debug!(
            "type space: defined {}{}{}",
            type_path,
            kind.separator(),
            name
        );
        let method = name.to_string();
        self.publish(match kind {
            MemberKind::Instance => DefinitionEvent::InstanceMethodAdded { type_path, method },
            MemberKind::Static => DefinitionEvent::StaticMethodAdded { type_path, method },
        });
    }

    /// Link `module`'s instance members into `host`'s lookup chain.
    ///
    /// Re-including an already-linked module leaves the chain unchanged but
    /// still publishes the event.
    pub fn include_module(&self, host: TypeId, module: TypeId) {
        if host == module {
            return;
        }
        let (host_path, module_path) = {
            let mut inner = self.inner.write();
            let module_path = inner.types[module.0 as usize].path.clone();
            let entry = &mut inner.types[host.0 as usize];
            if !entry.includes.contains(&module) {
                entry.includes.push(module);
            }
            (entry.path.clone(), module_path)
        };

        log::debug!("type space: {} includes {}", host_path, module_path);
        self.publish(DefinitionEvent::ModuleIncluded {
            host: host_path,
            module: module_path,
        });
    }

    /// Create an instance handle of the type at `path`.
    pub fn new_instance(&self, path: &str) -> Result<Instance, Error> {
        self.resolve(path)
            .map(|ty| Instance { ty })
            .ok_or_else(|| Error::TypeNotFound(path.to_string()))
    }

    /// Resolve a member on the owner's lookup chain, visibility ignored.
    ///
    /// Instance members: own table, then included modules (most recent
    /// first), then the superclass chain. Static members: own table, then
    /// the superclass chain.
    pub(crate) fn resolve_member(
        &self,
        ty: TypeId,
        kind: MemberKind,
        name: &str,
    ) -> Option<MethodSlot> {
        lookup_locked(&self.inner.read(), ty, kind, name)
    }

    /// Invoke a public instance member.
    pub fn call_instance(
        &self,
        receiver: &Instance,
        method: &str,
        args: Vec<Value>,
        block: Option<Block>,
    ) -> CallResult {
        self.dispatch(receiver.ty, MemberKind::Instance, Some(*receiver), method, args, block, true)
    }

    /// Invoke an instance member regardless of visibility.
    pub fn send_instance(
        &self,
        receiver: &Instance,
        method: &str,
        args: Vec<Value>,
        block: Option<Block>,
    ) -> CallResult {
        self.dispatch(receiver.ty, MemberKind::Instance, Some(*receiver), method, args, block, false)
    }

    /// Invoke a public static member of the type at `path`.
    pub fn call_static(
        &self,
        path: &str,
        method: &str,
        args: Vec<Value>,
        block: Option<Block>,
    ) -> CallResult {
        let ty = self
            .resolve(path)
            .ok_or_else(|| CallError::TypeNotFound(path.to_string()))?;
        self.dispatch(ty, MemberKind::Static, None, method, args, block, true)
    }

    /// Invoke a static member regardless of visibility.
    pub fn send_static(
        &self,
        path: &str,
        method: &str,
        args: Vec<Value>,
        block: Option<Block>,
    ) -> CallResult {
        let ty = self
            .resolve(path)
            .ok_or_else(|| CallError::TypeNotFound(path.to_string()))?;
        self.dispatch(ty, MemberKind::Static, None, method, args, block, false)
    }

    /// Register a definition-event observer.
    pub fn subscribe(&self, subscriber: Subscriber) {
        self.subscribers.lock().push(subscriber);
    }

    fn dispatch(
        &self,
        ty: TypeId,
        kind: MemberKind,
        receiver: Option<Instance>,
        method: &str,
        args: Vec<Value>,
        block: Option<Block>,
        public_only: bool,
    ) -> CallResult {
        let (slot, owner) = {
            let inner = self.inner.read();
            (
                lookup_locked(&inner, ty, kind, method),
                inner.types[ty.0 as usize].path.clone(),
            )
        };
        let Some(slot) = slot else {
            return Err(CallError::MethodMissing {
                owner,
                method: method.to_string(),
            });
        };
        if public_only && slot.visibility != Visibility::Public {
            return Err(CallError::PrivateMethod {
                owner,
                method: method.to_string(),
            });
        }
        (slot.f)(Call {
            space: self,
            receiver,
            args,
            block,
        })
    }

    fn publish(&self, event: DefinitionEvent) {
        let subscribers: Vec<Subscriber> = self.subscribers.lock().clone();
        for subscriber in &subscribers {
            subscriber(&event);
        }
    }
}

impl Default for TypeSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// Split and validate a definition path. A leading empty segment (rooted
/// path) is discarded; any other empty segment is malformed.
fn split_path(path: &str) -> Result<Vec<&str>, Error> {
    let mut segments: Vec<&str> = path.split("::").collect();
    if segments.first() == Some(&"") {
        segments.remove(0);
    }
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

fn resolve_locked(inner: &SpaceInner, path: &str) -> Option<TypeId> {
    let mut segments = path.split("::").peekable();
    if segments.peek() == Some(&"") {
        segments.next();
    }
    let mut current: Option<TypeId> = None;
    for segment in segments {
        if segment.is_empty() {
            return None;
        }
        let child = match current {
            None => inner.top_level.get(segment).copied(),
            Some(ty) => inner.types[ty.0 as usize].nested.get(segment).copied(),
        };
        current = Some(child?);
    }
    current
}

fn lookup_locked(
    inner: &SpaceInner,
    ty: TypeId,
    kind: MemberKind,
    name: &str,
) -> Option<MethodSlot> {
    match kind {
        MemberKind::Instance => {
            let mut visited = Vec::new();
            instance_lookup(inner, ty, name, &mut visited)
        }
        MemberKind::Static => {
            let mut current = Some(ty);
            while let Some(ty) = current {
                let entry = &inner.types[ty.0 as usize];
                if let Some(slot) = entry.static_methods.get(name) {
                    return Some(slot.clone());
                }
                current = entry.superclass;
            }
            None
        }
    }
}

fn instance_lookup(
    inner: &SpaceInner,
    ty: TypeId,
    name: &str,
    visited: &mut Vec<TypeId>,
) -> Option<MethodSlot> {
    if visited.contains(&ty) {
        return None;
    }
    visited.push(ty);

    let entry = &inner.types[ty.0 as usize];
    if let Some(slot) = entry.instance_methods.get(name) {
        return Some(slot.clone());
    }
    for module in entry.includes.iter().rev() {
        if let Some(slot) = instance_lookup(inner, *module, name, visited) {
            return Some(slot);
        }
    }
    entry
        .superclass
        .and_then(|sup| instance_lookup(inner, sup, name, visited))
}
