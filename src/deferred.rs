//! Deferred probe placement.
//!
//! A probe requested before its target exists must not be lost: types are
//! defined incrementally, members arrive late, and module inclusion can make
//! many members resolvable at once. This observer watches the type space's
//! definition events and installs pending probes the instant their target
//! materializes, without the caller polling or re-requesting.

use std::sync::Weak;

use crate::event::DefinitionEvent;
use crate::registry::RegistryInner;
use crate::types::MemberKind;

/// Definition-event handler subscribed by the facade on first unplaced probe.
///
/// Holds only a weak back-reference: events arriving after the registry is
/// gone are ignored.
pub(crate) fn on_definition(registry: &Weak<RegistryInner>, event: &DefinitionEvent) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    match event {
        DefinitionEvent::InstanceMethodAdded { type_path, method } => {
            place_by_name(&registry, type_path, MemberKind::Instance, method);
        }
        DefinitionEvent::StaticMethodAdded { type_path, method } => {
            place_by_name(&registry, type_path, MemberKind::Static, method);
        }
        DefinitionEvent::ModuleIncluded { host, .. } => {
            // Inclusion can satisfy probes on any type, not just the host;
            // rescan everything still pending.
            log::debug!("deferred: rescanning after inclusion into {}", host);
            let probes: Vec<_> = registry.probes.lock().values().cloned().collect();
            for probe in probes {
                probe.try_install();
            }
        }
    }
}

fn place_by_name(registry: &RegistryInner, type_path: &str, kind: MemberKind, method: &str) {
    let name = format!("{}{}{}", type_path, kind.separator(), method);
    let probe = registry.probes.lock().get(&name).cloned();
    if let Some(probe) = probe {
        probe.try_install();
    }
}
