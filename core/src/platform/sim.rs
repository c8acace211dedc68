// Scripted in-memory platform adapters
//
// Stand-ins for the host permission API and radio, used by the CLI simulator
// and by tests. Permission responses and radio behaviour are queued up front;
// sightings can be scripted or pushed while a discovery run is active.

use crate::capability::{Capability, GrantSnapshot, GrantState};
use crate::error::ScanError;
use crate::platform::bridge::{
    EnableMode, PermissionAuthority, RadioAdapter, Sighting, SightingStream,
};
use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

/// Permission authority answering requests from a queue of scripted results
#[derive(Debug, Default)]
pub struct SimulatedPermissions {
    current: Mutex<GrantSnapshot>,
    responses: Mutex<VecDeque<GrantSnapshot>>,
    granted_in_settings: Mutex<Option<GrantSnapshot>>,
    requests: AtomicUsize,
    settings_opened: AtomicUsize,
}

impl SimulatedPermissions {
    /// Start from the given grant state
    pub fn new(current: GrantSnapshot) -> Self {
        Self {
            current: Mutex::new(current),
            ..Default::default()
        }
    }

    /// Every capability already granted
    pub fn all_granted(capabilities: &[Capability]) -> Self {
        Self::new(GrantSnapshot::uniform(capabilities, GrantState::Granted))
    }

    /// Queue the result of the next grant request
    pub fn push_response(&self, grants: GrantSnapshot) {
        self.responses.lock().push_back(grants);
    }

    /// Grants the user will give once the settings page is opened
    pub fn grant_in_settings(&self, grants: GrantSnapshot) {
        *self.granted_in_settings.lock() = Some(grants);
    }

    /// Change one grant outside any request, as the user would from settings
    pub fn set_grant(&self, capability: Capability, state: GrantState) {
        self.current.lock().set(capability, state);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn settings_opened(&self) -> usize {
        self.settings_opened.load(Ordering::SeqCst)
    }

    fn merge(&self, grants: &GrantSnapshot) {
        let mut current = self.current.lock();
        for (cap, state) in grants.iter() {
            current.set(cap, state);
        }
    }
}

#[async_trait]
impl PermissionAuthority for SimulatedPermissions {
    fn current_grants(&self, capabilities: &[Capability]) -> GrantSnapshot {
        let current = self.current.lock();
        capabilities.iter().map(|c| (*c, current.get(*c))).collect()
    }

    async fn request_grants(&self, capabilities: &[Capability]) -> Result<GrantSnapshot, ScanError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let response = self.responses.lock().pop_front();
        match response {
            Some(grants) => {
                self.merge(&grants);
                Ok(self.current_grants(capabilities))
            }
            // No scripted answer: the user dismissed the dialog
            None => Ok(self.current_grants(capabilities)),
        }
    }

    fn open_app_settings(&self) {
        self.settings_opened.fetch_add(1, Ordering::SeqCst);
        if let Some(grants) = self.granted_in_settings.lock().take() {
            self.merge(&grants);
        }
    }
}

/// How the simulated radio answers an enable request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableBehavior {
    /// Radio turns on
    Accept,
    /// User declines the system dialog
    Decline,
    /// Request is acknowledged but the radio never turns on
    StayOff,
    /// The confirmation result never arrives
    NoResponse,
}

/// Radio with scripted presence, enablement and sightings
#[derive(Debug)]
pub struct SimulatedRadio {
    present: AtomicBool,
    enabled: AtomicBool,
    enable_behavior: Mutex<EnableBehavior>,
    scripted: Mutex<Vec<Sighting>>,
    sink: Mutex<Option<mpsc::UnboundedSender<Sighting>>>,
    enable_requests: Mutex<Vec<EnableMode>>,
    discovery_runs: AtomicUsize,
}

impl SimulatedRadio {
    pub fn new(present: bool, enabled: bool) -> Self {
        Self {
            present: AtomicBool::new(present),
            enabled: AtomicBool::new(enabled),
            enable_behavior: Mutex::new(EnableBehavior::Accept),
            scripted: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
            enable_requests: Mutex::new(Vec::new()),
            discovery_runs: AtomicUsize::new(0),
        }
    }

    /// Present and switched on
    pub fn enabled() -> Self {
        Self::new(true, true)
    }

    pub fn with_enable_behavior(self, behavior: EnableBehavior) -> Self {
        *self.enable_behavior.lock() = behavior;
        self
    }

    /// Sightings delivered as soon as discovery starts
    pub fn with_sightings(self, sightings: Vec<Sighting>) -> Self {
        *self.scripted.lock() = sightings;
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Push a sighting into the active discovery run.
    ///
    /// Returns false when no run is active.
    pub fn emit(&self, sighting: Sighting) -> bool {
        match self.sink.lock().as_ref() {
            Some(tx) => tx.unbounded_send(sighting).is_ok(),
            None => false,
        }
    }

    pub fn is_discovering(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn discovery_runs(&self) -> usize {
        self.discovery_runs.load(Ordering::SeqCst)
    }

    pub fn enable_requests(&self) -> Vec<EnableMode> {
        self.enable_requests.lock().clone()
    }
}

#[async_trait]
impl RadioAdapter for SimulatedRadio {
    fn is_present(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    fn is_enabled(&self) -> bool {
        self.is_present() && self.enabled.load(Ordering::SeqCst)
    }

    async fn request_enable(&self, mode: EnableMode) -> Result<(), ScanError> {
        self.enable_requests.lock().push(mode);
        let behavior = *self.enable_behavior.lock();
        debug!("Simulated radio enable request ({:?}) -> {:?}", mode, behavior);

        match behavior {
            EnableBehavior::Accept => {
                self.enabled.store(true, Ordering::SeqCst);
                Ok(())
            }
            EnableBehavior::Decline => Err(ScanError::Platform(
                "user declined radio enable".to_string(),
            )),
            EnableBehavior::StayOff => Ok(()),
            EnableBehavior::NoResponse => futures::future::pending().await,
        }
    }

    fn start_discovery(&self) -> Result<SightingStream, ScanError> {
        if !self.is_enabled() {
            return Err(ScanError::RadioDisabled);
        }

        let (tx, rx) = mpsc::unbounded();
        for sighting in self.scripted.lock().iter().cloned() {
            let _ = tx.unbounded_send(sighting);
        }
        *self.sink.lock() = Some(tx);
        self.discovery_runs.fetch_add(1, Ordering::SeqCst);

        Ok(rx.boxed())
    }

    fn cancel_discovery(&self) {
        self.sink.lock().take();
    }
}
