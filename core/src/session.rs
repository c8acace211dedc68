//! Discovery session
//!
//! One run of nearby discovery. Sightings from the radio arrive on their own
//! schedule and are folded into a [`DeviceSet`] that keeps each device once,
//! in first-seen order. Every change is published on a `watch` channel.
//!
//! A session owns its radio registration: stopping (or dropping) the session
//! cancels platform discovery and any sighting that still arrives afterwards
//! is ignored.

use crate::capability::Capability;
use crate::error::ScanError;
use crate::platform::bridge::{PermissionAuthority, RadioAdapter, Sighting, SightingStream};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

// ============================================================================
// DEVICES
// ============================================================================

/// Stable address-like device identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable name of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DeviceName {
    Named(String),
    /// The device advertises no name
    Unnamed,
    /// Reading the name needs a capability that is not granted
    Unavailable,
}

impl DeviceName {
    pub fn as_deref(&self) -> Option<&str> {
        match self {
            DeviceName::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceName::Named(name) => f.write_str(name),
            DeviceName::Unnamed => f.write_str("Unknown Device"),
            DeviceName::Unavailable => f.write_str("Name unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub id: DeviceId,
    pub name: DeviceName,
}

/// Devices seen in one session, unique by id, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceSet {
    devices: Vec<DiscoveredDevice>,
    #[serde(skip)]
    seen: HashSet<DeviceId>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `device` unless its id is already present.
    ///
    /// Returns false for a re-sighting; the set is left untouched.
    pub fn insert(&mut self, device: DiscoveredDevice) -> bool {
        if !self.seen.insert(device.id.clone()) {
            return false;
        }
        self.devices.push(device);
        true
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveredDevice> {
        self.devices.iter()
    }

    pub fn as_slice(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    /// Ids in first-seen order
    pub fn ids(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.id.as_str()).collect()
    }
}

// ============================================================================
// NAME RESOLUTION
// ============================================================================

/// Turns raw sightings into devices, hiding names the app may not read
#[derive(Clone)]
pub struct NameResolver {
    authority: Option<Arc<dyn PermissionAuthority>>,
    capability: Capability,
}

impl fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameResolver")
            .field("capability", &self.capability)
            .field("checked", &self.authority.is_some())
            .finish()
    }
}

impl NameResolver {
    /// Check `capability` with `authority` before exposing any name
    pub fn new(authority: Arc<dyn PermissionAuthority>, capability: Capability) -> Self {
        Self {
            authority: Some(authority),
            capability,
        }
    }

    /// Names are always readable
    pub fn unrestricted() -> Self {
        Self {
            authority: None,
            capability: Capability::BluetoothConnect,
        }
    }

    /// Name reported for `sighting`, or `SightingDeliveryUnauthorized`
    pub fn resolve(&self, sighting: &Sighting) -> Result<Option<String>, ScanError> {
        if let Some(authority) = &self.authority {
            let grants = authority.current_grants(&[self.capability]);
            if !grants.is_granted(self.capability) {
                return Err(ScanError::SightingDeliveryUnauthorized(
                    sighting.address.clone(),
                ));
            }
        }
        Ok(sighting.name.clone())
    }

    pub fn device_for(&self, sighting: &Sighting) -> DiscoveredDevice {
        let name = match self.resolve(sighting) {
            Ok(Some(name)) => DeviceName::Named(name),
            Ok(None) => DeviceName::Unnamed,
            Err(e) => {
                trace!("{}", e);
                DeviceName::Unavailable
            }
        };

        DiscoveredDevice {
            id: DeviceId::new(sighting.address.clone()),
            name,
        }
    }
}

// ============================================================================
// SESSION
// ============================================================================

struct SessionState {
    devices: DeviceSet,
    stopped: bool,
}

/// Shared between the session handle and its consumer task
struct Recorder {
    state: Mutex<SessionState>,
    publisher: watch::Sender<DeviceSet>,
    names: NameResolver,
}

impl Recorder {
    fn record(&self, sighting: Sighting) -> bool {
        let device = self.names.device_for(&sighting);

        let mut state = self.state.lock();
        if state.stopped {
            debug!("Ignoring sighting of {} after session stop", device.id);
            return false;
        }
        if !state.devices.insert(device) {
            trace!("Duplicate sighting of {}", sighting.address);
            return false;
        }

        debug!(
            "Discovered device {} ({} total)",
            sighting.address,
            state.devices.len()
        );
        // Published under the lock so subscribers never see sets out of order
        self.publisher.send_replace(state.devices.clone());
        true
    }
}

/// One active discovery run
pub struct DiscoverySession {
    recorder: Arc<Recorder>,
    radio: Arc<dyn RadioAdapter>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for DiscoverySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (devices, stopped) = {
            let state = self.recorder.state.lock();
            (state.devices.len(), state.stopped)
        };
        f.debug_struct("DiscoverySession")
            .field("devices", &devices)
            .field("active", &!stopped)
            .finish()
    }
}

impl DiscoverySession {
    /// Start discovery on `radio` and begin consuming its sightings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(radio: Arc<dyn RadioAdapter>, names: NameResolver) -> Result<Self, ScanError> {
        if !radio.is_present() {
            return Err(ScanError::RadioUnavailable);
        }
        if !radio.is_enabled() {
            return Err(ScanError::RadioDisabled);
        }

        let sightings = radio.start_discovery()?;
        let (publisher, _) = watch::channel(DeviceSet::new());

        let recorder = Arc::new(Recorder {
            state: Mutex::new(SessionState {
                devices: DeviceSet::new(),
                stopped: false,
            }),
            publisher,
            names,
        });

        let consumer = tokio::spawn(consume(recorder.clone(), sightings));
        info!("Discovery session started");

        Ok(Self {
            recorder,
            radio,
            consumer: Mutex::new(Some(consumer)),
        })
    }

    /// Observe the device set; the receiver starts at the current value
    pub fn subscribe(&self) -> watch::Receiver<DeviceSet> {
        self.recorder.publisher.subscribe()
    }

    /// Snapshot of the devices seen so far
    pub fn devices(&self) -> DeviceSet {
        self.recorder.state.lock().devices.clone()
    }

    /// Feed one sighting directly, bypassing the radio stream.
    ///
    /// Returns true if it added a new device.
    pub fn record_sighting(&self, sighting: Sighting) -> bool {
        self.recorder.record(sighting)
    }

    pub fn is_active(&self) -> bool {
        !self.recorder.state.lock().stopped
    }

    /// Stop discovery. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = self.recorder.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }

        if let Some(consumer) = self.consumer.lock().take() {
            consumer.abort();
        }
        self.radio.cancel_discovery();

        info!(
            "Discovery session stopped with {} device(s)",
            self.recorder.state.lock().devices.len()
        );
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn consume(recorder: Arc<Recorder>, mut sightings: SightingStream) {
    while let Some(sighting) = sightings.next().await {
        recorder.record(sighting);
    }
    debug!("Sighting stream ended");
}
