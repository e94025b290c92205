//! Probe registry and instrumentation facade.
//!
//! One `ProbeRegistry` is the single point of truth for what is being
//! watched in one type space. It is an ordinary owned value: construct it
//! where the application wires things together and keep it alive as long as
//! counting should work.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::HashMap;
use spin::Mutex;

use crate::deferred;
use crate::probe::{Error, Probe};
use crate::types::TypeSpace;

pub(crate) struct RegistryInner {
    pub(crate) space: Arc<TypeSpace>,
    /// Qualified name -> probe. Only the facade mutates this.
    pub(crate) probes: Mutex<HashMap<String, Arc<Probe>>>,
    hook_active: AtomicBool,
}

/// Process registry of probes plus the `instrument` entry points.
pub struct ProbeRegistry {
    inner: Arc<RegistryInner>,
}

impl ProbeRegistry {
    /// Create a registry over `space`.
    pub fn new(space: Arc<TypeSpace>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                space,
                probes: Mutex::new(HashMap::new()),
                hook_active: AtomicBool::new(false),
            }),
        }
    }

    /// The type space this registry instruments.
    pub fn space(&self) -> &Arc<TypeSpace> {
        &self.inner.space
    }

    /// Instrument `name`, returning the probe.
    ///
    /// The probe installs immediately when its target already resolves;
    /// otherwise it stays pending and the deferred placement hook is
    /// activated so it installs the instant the target is defined. Any
    /// prior probe registered under the same name is overwritten.
    pub fn instrument(&self, name: &str) -> Result<Arc<Probe>, Error> {
        let probe = Probe::new(name, Arc::clone(&self.inner.space))?;
        self.inner
            .probes
            .lock()
            .insert(name.to_string(), Arc::clone(&probe));
        if !probe.is_installed() {
            self.activate_hook();
        }
        Ok(probe)
    }

    /// Instrument `name` for the duration of `work` only.
    ///
    /// Runs `work` synchronously, then removes and unregisters the probe.
    /// The returned probe reports the calls made during `work`.
    pub fn instrument_during(
        &self,
        name: &str,
        work: impl FnOnce(),
    ) -> Result<Arc<Probe>, Error> {
        let probe = self.instrument(name)?;
        work();
        probe.remove();
        self.inner.probes.lock().remove(name);
        Ok(probe)
    }

    /// Look up the probe registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Probe>> {
        self.inner.probes.lock().get(name).cloned()
    }

    /// Remove and unregister the probe under `name`, returning it.
    pub fn remove(&self, name: &str) -> Option<Arc<Probe>> {
        let probe = self.inner.probes.lock().remove(name)?;
        probe.remove();
        Some(probe)
    }

    /// Number of registered probes.
    pub fn len(&self) -> usize {
        self.inner.probes.lock().len()
    }

    /// Whether no probes are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.probes.lock().is_empty()
    }

    /// Subscribe the deferred placement hook, once per registry.
    fn activate_hook(&self) {
        if self.inner.hook_active.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::downgrade(&self.inner);
        self.inner
            .space
            .subscribe(Arc::new(move |event| deferred::on_definition(&inner, event)));
        log::info!("deferred placement hook activated");
    }
}
