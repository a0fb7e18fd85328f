// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin registry

use crate::transport_backend::{TelegramTransportBackend, TransportBackend};
use indexmap::IndexMap;
use parking_lot::Mutex;
use relay_bridge::CommandBackend;
use relay_core::{validate_plugin_id, PluginKind};
use relay_engines::{builtin_engine_backends, EngineBackend};
use std::sync::Arc;

/// Registered backends by kind, in registration order.
///
/// Registration failures are collected, not raised: one bad plugin never
/// takes the others down. Each error names the plugin and the reason.
#[derive(Default)]
pub struct PluginRegistry {
    engines: IndexMap<String, Arc<EngineBackend>>,
    transports: IndexMap<String, Arc<dyn TransportBackend>>,
    commands: IndexMap<String, Arc<dyn CommandBackend>>,
    errors: Vec<String>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The backends shipped with this build.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for backend in builtin_engine_backends() {
            let id = backend.id.to_string();
            registry.register_engine(&id, backend);
        }
        registry.register_transport("telegram", Arc::new(TelegramTransportBackend));
        registry
    }

    fn validate(&mut self, name: &str, kind: PluginKind, backend_id: &str, taken: bool) -> bool {
        if let Err(err) = validate_plugin_id(name, kind) {
            self.errors.push(format!("{kind}/{name}: {err}"));
            return false;
        }
        if backend_id != name {
            self.errors.push(format!(
                "{kind}/{name}: ID mismatch: entry {name:?} != backend id {backend_id:?}"
            ));
            return false;
        }
        if taken {
            self.errors.push(format!("{kind}/{name}: duplicate ID"));
            return false;
        }
        true
    }

    pub fn register_engine(&mut self, name: &str, backend: EngineBackend) {
        let backend_id = backend.id.to_string();
        if self.validate(
            name,
            PluginKind::Engine,
            &backend_id,
            self.engines.contains_key(name),
        ) {
            self.engines.insert(name.to_string(), Arc::new(backend));
        }
    }

    pub fn register_transport(&mut self, name: &str, backend: Arc<dyn TransportBackend>) {
        let backend_id = backend.id().to_string();
        if self.validate(
            name,
            PluginKind::Transport,
            &backend_id,
            self.transports.contains_key(name),
        ) {
            self.transports.insert(name.to_string(), backend);
        }
    }

    pub fn register_command(&mut self, name: &str, backend: Arc<dyn CommandBackend>) {
        let backend_id = backend.id().to_string();
        if self.validate(
            name,
            PluginKind::Command,
            &backend_id,
            self.commands.contains_key(name),
        ) {
            self.commands.insert(name.to_string(), backend);
        }
    }

    pub fn engine(&self, id: &str) -> Option<Arc<EngineBackend>> {
        self.engines.get(id).cloned()
    }

    pub fn engines(&self) -> impl Iterator<Item = &Arc<EngineBackend>> {
        self.engines.values()
    }

    pub fn engine_ids(&self) -> Vec<String> {
        self.engines.keys().cloned().collect()
    }

    pub fn transport(&self, id: &str) -> Option<Arc<dyn TransportBackend>> {
        self.transports.get(id).cloned()
    }

    pub fn transport_ids(&self) -> Vec<String> {
        self.transports.keys().cloned().collect()
    }

    pub fn command_backends(&self) -> IndexMap<String, Arc<dyn CommandBackend>> {
        self.commands.clone()
    }

    /// Registration failures, one line per rejected plugin.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

static REGISTRY: Mutex<Option<Arc<PluginRegistry>>> = Mutex::new(None);

/// The process-wide registry, seeded with builtins on first use.
pub fn plugin_registry() -> Arc<PluginRegistry> {
    let mut registry = REGISTRY.lock();
    Arc::clone(registry.get_or_insert_with(|| {
        let built = PluginRegistry::builtin();
        for error in built.errors() {
            tracing::warn!(error = %error, "plugin registration failed");
        }
        Arc::new(built)
    }))
}

/// Install a custom registry (external plugin registration path).
pub fn set_plugin_registry(registry: PluginRegistry) {
    for error in registry.errors() {
        tracing::warn!(error = %error, "plugin registration failed");
    }
    *REGISTRY.lock() = Some(Arc::new(registry));
}

/// Reset the global registry (tests).
pub fn clear_plugin_cache() {
    *REGISTRY.lock() = None;
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
