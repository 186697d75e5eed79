//! Platform permission gate consulted by transports before scan and connect

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

/// Boolean-returning access capability
///
/// A `false` answer must surface as `PermissionDenied` from the transport.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request_access(&self) -> bool;
}

/// Gate for platforms without a runtime Bluetooth permission prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysGranted;

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn request_access(&self) -> bool {
        true
    }
}

/// Gate with a fixed answer that can be flipped at runtime
#[derive(Debug, Default)]
pub struct StaticPermission {
    granted: AtomicBool,
}

impl StaticPermission {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionGate for StaticPermission {
    async fn request_access(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}
