// nearscan core: permission-gated nearby device discovery
//
// Decides what the app should do next while the user grants, denies or
// permanently denies the permissions discovery needs, gets the radio switched
// on, and folds asynchronous sightings into one deduplicated device list.

pub mod capability;
pub mod controller;
pub mod error;
pub mod gate;
pub mod platform;
pub mod session;

pub use capability::{
    required_capabilities, Capability, GrantSnapshot, GrantState, PermissionGroup,
    PlatformProfile,
};
pub use controller::{ScanController, ScanPhase, ScanSignal};
pub use error::ScanError;
pub use gate::{DenialTally, GateState, PermissionGate};
pub use platform::{
    EnableMode, PermissionAuthority, RadioAdapter, ScanSettings, Sighting, SightingStream,
};
pub use session::{DeviceId, DeviceName, DeviceSet, DiscoveredDevice, DiscoverySession, NameResolver};
