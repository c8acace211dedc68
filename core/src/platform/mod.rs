//! Platform integration layer
//!
//! This module provides:
//! - Bridge traits the host implements for permissions and the radio
//! - Scan settings persistence and validation
//! - Scripted simulator adapters for tests and the CLI

pub mod bridge;
pub mod settings;
pub mod sim;

pub use bridge::{EnableMode, PermissionAuthority, RadioAdapter, Sighting, SightingStream};
pub use settings::{ScanSettings, SettingsError};
pub use sim::{EnableBehavior, SimulatedPermissions, SimulatedRadio};
