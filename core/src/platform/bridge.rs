// Platform bridge traits
//
// The permission authority and the radio are owned by the host platform.
// Platform code implements these traits; the scan core only talks to them
// through `Arc<dyn ...>` handles.

use crate::capability::{Capability, GrantSnapshot};
use crate::error::ScanError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// One raw device sighting as delivered by the radio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sighting {
    /// Stable address-like token
    pub address: String,
    /// Advertised name, if the radio could read one
    pub name: Option<String>,
}

impl Sighting {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn named(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: Some(name.into()),
        }
    }
}

/// Lazy, unbounded, non-restartable sequence of sightings
pub type SightingStream = BoxStream<'static, Sighting>;

/// How the radio should be switched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnableMode {
    /// Enable directly, no user confirmation
    Direct,
    /// Route through the system confirmation dialog
    SystemPrompt,
}

/// Platform permission API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionAuthority: Send + Sync {
    /// Current grant state for each listed capability
    fn current_grants(&self, capabilities: &[Capability]) -> GrantSnapshot;

    /// Ask the user for the listed capabilities.
    ///
    /// Resolves exactly once with the full result of the request.
    async fn request_grants(&self, capabilities: &[Capability]) -> Result<GrantSnapshot, ScanError>;

    /// Navigate to the app's system settings page
    fn open_app_settings(&self);
}

/// Platform radio API
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    /// Whether the host has radio hardware at all
    fn is_present(&self) -> bool;

    fn is_enabled(&self) -> bool;

    /// Request the radio be switched on.
    ///
    /// `Direct` returns once the request is dispatched. `SystemPrompt`
    /// resolves when the confirmation dialog reports back; an `Err` means the
    /// user declined or the platform refused.
    async fn request_enable(&self, mode: EnableMode) -> Result<(), ScanError>;

    /// Start platform discovery and register for sightings
    fn start_discovery(&self) -> Result<SightingStream, ScanError>;

    /// Stop platform discovery. Must tolerate being called when idle.
    fn cancel_discovery(&self);
}
