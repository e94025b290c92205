//! Environment-driven entry point.
//!
//! When `COUNT_CALLS_TO` holds a qualified member name, the hosting process
//! can instrument it at startup and print a one-line summary at exit:
//!
//! ```ignore
//! let report = calltally::install_from_env(&registry)?;
//! // ... run the application; keep `report` alive until shutdown ...
//! drop(report); // prints "Potato#bake called 11 times"
//! ```

use std::env;
use std::sync::Arc;

use crate::probe::{Error, Probe};
use crate::registry::ProbeRegistry;

/// Environment variable naming the member to count.
pub const ENV_VAR: &str = "COUNT_CALLS_TO";

/// Exit summary for an environment-requested probe.
///
/// Prints `"<name> called <count> times"` to stdout when dropped; keep it
/// alive for the lifetime of the process.
pub struct ExitReport {
    probe: Arc<Probe>,
}

impl ExitReport {
    /// The probe being reported on.
    pub fn probe(&self) -> &Arc<Probe> {
        &self.probe
    }
}

impl Drop for ExitReport {
    fn drop(&mut self) {
        println!("{} called {} times", self.probe, self.probe.calls());
    }
}

/// Instrument the member named by `COUNT_CALLS_TO`, if set.
///
/// Returns `Ok(None)` when the variable is unset or empty; propagates
/// `Error::InvalidName` when it is set but unparsable.
pub fn install_from_env(registry: &ProbeRegistry) -> Result<Option<ExitReport>, Error> {
    let Ok(name) = env::var(ENV_VAR) else {
        return Ok(None);
    };
    if name.is_empty() {
        return Ok(None);
    }
    let probe = registry.instrument(&name)?;
    log::debug!("env trigger: counting {}", name);
    Ok(Some(ExitReport { probe }))
}
