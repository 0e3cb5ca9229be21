// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Portmap/rpcbind collaborator interface.
//!
//! The engine publishes and withdraws its own listening programs through
//! this trait; it never routes calls with it. The real rpcbind client is
//! a plain RPC service built on top of the engine and lives outside this
//! crate. [`LocalRegistry`] is the in-memory implementation tests and
//! single-process deployments use.

use crate::server::RpcDispatcher;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Key: (program, version, netid). One universal address per binding.
type BindingKey = (u32, u32, String);

/// A portmap-style service registry.
pub trait ServiceRegistry: Send + Sync {
    /// Publish a binding. Returns false if the binding already exists
    /// with a different owner.
    fn register(&self, program: u32, version: u32, netid: &str, uaddr: &str, owner: &str) -> bool;

    fn unregister(&self, program: u32, version: u32, netid: &str, owner: &str) -> bool;

    fn lookup(&self, program: u32, version: u32, netid: &str) -> Option<String>;

    /// Liveness probe.
    fn ping(&self) -> bool;
}

struct Binding {
    uaddr: String,
    owner: String,
}

/// In-memory registry for tests and single-process setups.
pub struct LocalRegistry {
    bindings: RwLock<HashMap<BindingKey, Binding>>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry for LocalRegistry {
    fn register(&self, program: u32, version: u32, netid: &str, uaddr: &str, owner: &str) -> bool {
        let key = (program, version, netid.to_string());
        let mut bindings = self.bindings.write();
        if let Some(existing) = bindings.get(&key) {
            if existing.owner != owner {
                return false;
            }
        }
        log::debug!("registry: {} {} {} -> {}", program, version, netid, uaddr);
        bindings.insert(
            key,
            Binding {
                uaddr: uaddr.to_string(),
                owner: owner.to_string(),
            },
        );
        true
    }

    fn unregister(&self, program: u32, version: u32, netid: &str, owner: &str) -> bool {
        let key = (program, version, netid.to_string());
        let mut bindings = self.bindings.write();
        match bindings.get(&key) {
            Some(existing) if existing.owner == owner => {
                bindings.remove(&key);
                log::debug!("registry: {} {} {} withdrawn", program, version, netid);
                true
            }
            _ => false,
        }
    }

    fn lookup(&self, program: u32, version: u32, netid: &str) -> Option<String> {
        let key = (program, version, netid.to_string());
        self.bindings.read().get(&key).map(|b| b.uaddr.clone())
    }

    fn ping(&self) -> bool {
        true
    }
}

/// Publish every program a dispatcher serves.
pub fn publish_programs(
    registry: &dyn ServiceRegistry,
    dispatcher: &RpcDispatcher,
    netid: &str,
    uaddr: &str,
    owner: &str,
) -> usize {
    let mut published = 0;
    for id in dispatcher.registered_programs() {
        if registry.register(id.program, id.version, netid, uaddr, owner) {
            published += 1;
        } else {
            log::warn!(
                "registry refused {} version {} on {}",
                id.program,
                id.version,
                netid
            );
        }
    }
    published
}

/// Withdraw every program a dispatcher serves.
pub fn withdraw_programs(
    registry: &dyn ServiceRegistry,
    dispatcher: &RpcDispatcher,
    netid: &str,
    owner: &str,
) -> usize {
    let mut withdrawn = 0;
    for id in dispatcher.registered_programs() {
        if registry.unregister(id.program, id.version, netid, owner) {
            withdrawn += 1;
        }
    }
    withdrawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, ExecutionMode};
    use crate::server::CallContext;
    use std::sync::Arc;

    #[test]
    fn test_register_lookup_unregister() {
        let registry = LocalRegistry::new();
        assert!(registry.ping());
        assert!(registry.register(100003, 3, "tcp", "10.0.0.1.8.1", "nfsd"));
        assert_eq!(
            registry.lookup(100003, 3, "tcp").as_deref(),
            Some("10.0.0.1.8.1")
        );
        assert!(registry.unregister(100003, 3, "tcp", "nfsd"));
        assert!(registry.lookup(100003, 3, "tcp").is_none());
    }

    #[test]
    fn test_foreign_owner_cannot_steal_binding() {
        let registry = LocalRegistry::new();
        assert!(registry.register(100005, 1, "tcp", "addr-a", "mountd"));
        assert!(!registry.register(100005, 1, "tcp", "addr-b", "impostor"));
        assert!(!registry.unregister(100005, 1, "tcp", "impostor"));
        assert_eq!(registry.lookup(100005, 1, "tcp").as_deref(), Some("addr-a"));
    }

    #[test]
    fn test_owner_can_rebind() {
        let registry = LocalRegistry::new();
        assert!(registry.register(100005, 1, "tcp", "addr-a", "mountd"));
        assert!(registry.register(100005, 1, "tcp", "addr-c", "mountd"));
        assert_eq!(registry.lookup(100005, 1, "tcp").as_deref(), Some("addr-c"));
    }

    #[test]
    fn test_publish_and_withdraw_dispatcher_programs() {
        let registry = LocalRegistry::new();
        let dispatcher = crate::server::RpcDispatcher::new(&EngineConfig {
            execution: ExecutionMode::Inline,
            ..Default::default()
        });
        dispatcher.register(
            200_001,
            1,
            Arc::new(|_: &mut CallContext| -> crate::error::RpcResult<()> { Ok(()) }),
        );
        dispatcher.register(
            200_001,
            2,
            Arc::new(|_: &mut CallContext| -> crate::error::RpcResult<()> { Ok(()) }),
        );

        assert_eq!(
            publish_programs(&registry, &dispatcher, "tcp", "10.0.0.2.8.1", "svc"),
            2
        );
        assert_eq!(registry.lookup(200_001, 2, "tcp").as_deref(), Some("10.0.0.2.8.1"));
        assert_eq!(withdraw_programs(&registry, &dispatcher, "tcp", "svc"), 2);
        assert!(registry.lookup(200_001, 1, "tcp").is_none());
    }
}
