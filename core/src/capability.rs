// Capabilities, grant snapshots and platform profiles
//
// The set of permissions needed for nearby discovery depends on the platform
// version. It is resolved once from a `PlatformProfile` and stays fixed for the
// life of the process; everything downstream only sees capability groups.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// First API level with runtime scan/connect permissions
pub const RUNTIME_BLUETOOTH_PERMISSIONS_API: u32 = 31;

/// First API level where the radio can no longer be enabled without a system dialog
pub const SYSTEM_ENABLE_PROMPT_API: u32 = 33;

/// A discrete platform permission required for discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Modern scan permission
    BluetoothScan,
    /// Modern connect permission (also gates device name lookup)
    BluetoothConnect,
    /// Legacy bluetooth permission
    Bluetooth,
    /// Legacy bluetooth admin permission
    BluetoothAdmin,
    /// Precise location
    FineLocation,
}

impl Capability {
    /// Logical group this capability gates with
    pub fn group(self) -> PermissionGroup {
        match self {
            Capability::BluetoothScan
            | Capability::BluetoothConnect
            | Capability::Bluetooth
            | Capability::BluetoothAdmin => PermissionGroup::Radio,
            Capability::FineLocation => PermissionGroup::Location,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::BluetoothScan => write!(f, "BLUETOOTH_SCAN"),
            Capability::BluetoothConnect => write!(f, "BLUETOOTH_CONNECT"),
            Capability::Bluetooth => write!(f, "BLUETOOTH"),
            Capability::BluetoothAdmin => write!(f, "BLUETOOTH_ADMIN"),
            Capability::FineLocation => write!(f, "ACCESS_FINE_LOCATION"),
        }
    }
}

/// Logical bundle of capabilities that gates as a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionGroup {
    Radio,
    Location,
}

impl fmt::Display for PermissionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionGroup::Radio => write!(f, "radio"),
            PermissionGroup::Location => write!(f, "location"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantState {
    Granted,
    Denied,
}

impl GrantState {
    pub fn is_granted(self) -> bool {
        self == GrantState::Granted
    }
}

impl From<bool> for GrantState {
    fn from(granted: bool) -> Self {
        if granted {
            GrantState::Granted
        } else {
            GrantState::Denied
        }
    }
}

/// Grant state per capability as last reported by the permission authority.
///
/// A capability missing from the snapshot reads as [`GrantState::Denied`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSnapshot {
    grants: HashMap<Capability, GrantState>,
}

impl GrantSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot with every listed capability in the same state
    pub fn uniform(capabilities: &[Capability], state: GrantState) -> Self {
        capabilities.iter().map(|c| (*c, state)).collect()
    }

    /// Builder-style insert
    pub fn with(mut self, capability: Capability, state: GrantState) -> Self {
        self.grants.insert(capability, state);
        self
    }

    pub fn set(&mut self, capability: Capability, state: GrantState) {
        self.grants.insert(capability, state);
    }

    pub fn get(&self, capability: Capability) -> GrantState {
        self.grants
            .get(&capability)
            .copied()
            .unwrap_or(GrantState::Denied)
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        self.get(capability).is_granted()
    }

    /// Whether every listed capability is granted (true for an empty list)
    pub fn all_granted(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().all(|c| self.is_granted(*c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capability, GrantState)> + '_ {
        self.grants.iter().map(|(c, s)| (*c, *s))
    }

    /// Listed capabilities that are not granted
    pub fn missing(&self, capabilities: &[Capability]) -> Vec<Capability> {
        capabilities
            .iter()
            .copied()
            .filter(|c| !self.is_granted(*c))
            .collect()
    }
}

impl FromIterator<(Capability, GrantState)> for GrantSnapshot {
    fn from_iter<I: IntoIterator<Item = (Capability, GrantState)>>(iter: I) -> Self {
        Self {
            grants: iter.into_iter().collect(),
        }
    }
}

/// Host platform version and discovery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    /// Platform API level
    pub api_level: u32,
    /// Whether modern profiles still require precise location for discovery
    pub location_for_discovery: bool,
}

impl PlatformProfile {
    pub fn new(api_level: u32) -> Self {
        Self {
            api_level,
            location_for_discovery: true,
        }
    }

    pub fn with_location_for_discovery(mut self, required: bool) -> Self {
        self.location_for_discovery = required;
        self
    }

    /// Runtime scan/connect permissions replace the legacy pair
    pub fn uses_runtime_bluetooth_permissions(&self) -> bool {
        self.api_level >= RUNTIME_BLUETOOTH_PERMISSIONS_API
    }

    /// The radio may be switched on without a system confirmation dialog
    pub fn allows_direct_radio_enable(&self) -> bool {
        self.api_level < SYSTEM_ENABLE_PROMPT_API
    }

    /// Capability whose grant is needed to read a device's name
    pub fn name_capability(&self) -> Capability {
        if self.uses_runtime_bluetooth_permissions() {
            Capability::BluetoothConnect
        } else {
            Capability::Bluetooth
        }
    }
}

/// Capabilities required for discovery on the given profile
pub fn required_capabilities(profile: &PlatformProfile) -> Vec<Capability> {
    if profile.uses_runtime_bluetooth_permissions() {
        let mut caps = vec![Capability::BluetoothScan, Capability::BluetoothConnect];
        if profile.location_for_discovery {
            caps.push(Capability::FineLocation);
        }
        caps
    } else {
        vec![
            Capability::Bluetooth,
            Capability::BluetoothAdmin,
            Capability::FineLocation,
        ]
    }
}

/// Required capabilities belonging to `group`
pub fn capabilities_in_group(required: &[Capability], group: PermissionGroup) -> Vec<Capability> {
    required
        .iter()
        .copied()
        .filter(|c| c.group() == group)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_profile_capabilities() {
        let profile = PlatformProfile::new(33);
        assert_eq!(
            required_capabilities(&profile),
            vec![
                Capability::BluetoothScan,
                Capability::BluetoothConnect,
                Capability::FineLocation
            ]
        );
        assert!(!profile.allows_direct_radio_enable());
        assert_eq!(profile.name_capability(), Capability::BluetoothConnect);
    }

    #[test]
    fn test_modern_profile_without_location() {
        let profile = PlatformProfile::new(31).with_location_for_discovery(false);
        let caps = required_capabilities(&profile);
        assert!(capabilities_in_group(&caps, PermissionGroup::Location).is_empty());
        assert!(profile.allows_direct_radio_enable());
    }

    #[test]
    fn test_legacy_profile_ignores_location_flag() {
        let profile = PlatformProfile::new(29).with_location_for_discovery(false);
        let caps = required_capabilities(&profile);
        assert_eq!(
            capabilities_in_group(&caps, PermissionGroup::Location),
            vec![Capability::FineLocation]
        );
        assert_eq!(profile.name_capability(), Capability::Bluetooth);
    }

    #[test]
    fn test_snapshot_missing_capability_reads_denied() {
        let snapshot = GrantSnapshot::new().with(Capability::BluetoothScan, GrantState::Granted);
        assert!(snapshot.is_granted(Capability::BluetoothScan));
        assert_eq!(snapshot.get(Capability::BluetoothConnect), GrantState::Denied);
        assert_eq!(
            snapshot.missing(&[Capability::BluetoothScan, Capability::BluetoothConnect]),
            vec![Capability::BluetoothConnect]
        );
        assert!(snapshot.all_granted(&[]));
    }

    #[test]
    fn test_capability_display_uses_platform_names() {
        assert_eq!(Capability::FineLocation.to_string(), "ACCESS_FINE_LOCATION");
        assert_eq!(PermissionGroup::Radio.to_string(), "radio");
    }
}
