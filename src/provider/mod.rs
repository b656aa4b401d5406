//! Southbound provider capability interface and registry.
//!
//! Wire-level protocol handling lives outside this crate. A provider
//! registers one [`DeviceProvider`] per adapter kind; the coordinator looks
//! it up by the provider identity tagged on each southbound report and uses
//! it for the two instructions that flow back down: role assertion and
//! probe requests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::inventory::{DeviceId, ProviderId};
use crate::mastership::MastershipRole;

/// Capability surface the coordinator drives on a southbound provider.
///
/// Calls must not block: providers queue the instruction onto their own
/// I/O machinery. Failure to assert a role is reported back through the
/// coordinator's `roleAssertFailed` path, not as a return value here.
pub trait DeviceProvider: Send + Sync {
    /// Instruct the provider which role this node now holds for a device.
    fn role_changed(&self, device: &DeviceId, role: MastershipRole);

    /// Ask the provider to re-read live device and port state, used to
    /// recover updates missed across a mastership handoff.
    fn trigger_probe(&self, device: &DeviceId);
}

/// Registry of live providers, keyed by provider identity.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderId, Arc<dyn DeviceProvider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider. Re-registering an identity replaces the
    /// previous instance.
    pub fn register(&self, id: ProviderId, provider: Arc<dyn DeviceProvider>) {
        if let Ok(mut providers) = self.providers.write() {
            providers.insert(id, provider);
        }
    }

    /// Remove a provider.
    pub fn unregister(&self, id: &ProviderId) {
        if let Ok(mut providers) = self.providers.write() {
            providers.remove(id);
        }
    }

    /// Look up a provider by identity.
    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn DeviceProvider>> {
        self.providers.read().ok().and_then(|p| p.get(id).cloned())
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.read().map(|p| p.len()).unwrap_or(0)
    }

    /// Whether no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
