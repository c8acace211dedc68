//! Scan controller
//!
//! The single entry point a presentation layer drives to show nearby devices.
//! It walks the permission gate, checks the radio, and owns the active
//! [`DiscoverySession`]. Anything the user has to act on is reported on the
//! [`ScanSignal`] channel returned from [`ScanController::new`].

use crate::capability::{Capability, PlatformProfile};
use crate::error::ScanError;
use crate::gate::{DenialTally, GateState, PermissionGate};
use crate::platform::bridge::{EnableMode, PermissionAuthority, RadioAdapter};
use crate::platform::settings::ScanSettings;
use crate::session::{DeviceSet, DiscoverySession, NameResolver};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Where the controller is in the scan flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPhase {
    NotStarted,
    /// A grant request is outstanding or a rationale is showing
    RequestingPermission,
    /// The user was sent (or must go) to the app settings page
    AwaitingSettingsReturn,
    RadioCheck,
    /// The radio is off and must be enabled before scanning
    RadioEnablePending,
    Scanning,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::RequestingPermission => write!(f, "RequestingPermission"),
            Self::AwaitingSettingsReturn => write!(f, "AwaitingSettingsReturn"),
            Self::RadioCheck => write!(f, "RadioCheck"),
            Self::RadioEnablePending => write!(f, "RadioEnablePending"),
            Self::Scanning => write!(f, "Scanning"),
        }
    }
}

/// Caller-visible notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSignal {
    /// The permission gate changed mode
    Gate(GateState),
    /// The radio is off; the presentation layer decides how to prompt
    RadioEnableRequired(EnableMode),
    RadioEnableFailed,
    /// Scanning cannot proceed on this host
    Failed(ScanError),
    ScanningStarted,
    ScanningStopped,
}

struct ControllerState {
    phase: ScanPhase,
    gate: PermissionGate,
    session: Option<DiscoverySession>,
    request_in_flight: bool,
    enable_in_flight: bool,
}

/// Permission-gated discovery controller
pub struct ScanController {
    settings: ScanSettings,
    profile: PlatformProfile,
    required: Vec<Capability>,
    permissions: Arc<dyn PermissionAuthority>,
    radio: Arc<dyn RadioAdapter>,
    state: Mutex<ControllerState>,
    signals: mpsc::UnboundedSender<ScanSignal>,
    stop_epoch: watch::Sender<u64>,
}

impl ScanController {
    /// Create a controller and the receiver for its signals
    pub fn new(
        settings: ScanSettings,
        permissions: Arc<dyn PermissionAuthority>,
        radio: Arc<dyn RadioAdapter>,
    ) -> (Self, mpsc::UnboundedReceiver<ScanSignal>) {
        if let Err(e) = settings.validate() {
            warn!("Scan settings failed validation: {}", e);
        }
        let profile = settings.profile();
        let required = settings.required_capabilities();
        let gate = PermissionGate::new(&required).with_redirect_after(settings.settings_redirect_after);
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let (stop_epoch, _) = watch::channel(0);

        info!(
            "Scan controller created for API {} requiring {:?}",
            profile.api_level, required
        );

        let controller = Self {
            settings,
            profile,
            required,
            permissions,
            radio,
            state: Mutex::new(ControllerState {
                phase: ScanPhase::NotStarted,
                gate,
                session: None,
                request_in_flight: false,
                enable_in_flight: false,
            }),
            signals,
            stop_epoch,
        };

        (controller, signal_rx)
    }

    pub fn phase(&self) -> ScanPhase {
        self.state.lock().phase
    }

    pub fn gate_state(&self) -> GateState {
        self.state.lock().gate.state()
    }

    pub fn denial_tally(&self) -> DenialTally {
        self.state.lock().gate.tally()
    }

    pub fn required_capabilities(&self) -> &[Capability] {
        &self.required
    }

    /// How the radio will be enabled on this platform
    pub fn enable_mode(&self) -> EnableMode {
        if self.profile.allows_direct_radio_enable() {
            EnableMode::Direct
        } else {
            EnableMode::SystemPrompt
        }
    }

    /// Device set of the running session, if scanning
    pub fn devices(&self) -> Option<watch::Receiver<DeviceSet>> {
        self.state.lock().session.as_ref().map(|s| s.subscribe())
    }

    fn emit(&self, signal: ScanSignal) {
        // The presentation layer may have gone away
        let _ = self.signals.send(signal);
    }

    fn set_phase(state: &mut ControllerState, phase: ScanPhase) {
        if state.phase != phase {
            debug!("Scan phase {} -> {}", state.phase, phase);
            state.phase = phase;
        }
    }

    fn current_epoch(&self) -> u64 {
        *self.stop_epoch.borrow()
    }

    /// Begin "show me nearby devices". Idempotent.
    ///
    /// Returns the phase reached. A denial is reported as `Err` after the
    /// matching gate prompt has been signalled.
    ///
    /// While a grant request is still outstanding (including one left over
    /// from before a `stop()`), `AwaitingDecision` is signalled again and
    /// nothing else happens; call `begin()` once that request has completed.
    pub async fn begin(&self) -> Result<ScanPhase, ScanError> {
        {
            let state = self.state.lock();
            if state.request_in_flight {
                debug!("begin() while a permission request is outstanding");
                let phase = state.phase;
                drop(state);
                self.emit(ScanSignal::Gate(GateState::AwaitingDecision));
                return Ok(phase);
            }
            if state.enable_in_flight || state.phase == ScanPhase::Scanning {
                debug!("begin() ignored in phase {}", state.phase);
                return Ok(state.phase);
            }
        }

        let grants = self.permissions.current_grants(&self.required);
        let (showing, fresh) = {
            let mut state = self.state.lock();
            let showing = state.gate.state();
            (showing, state.gate.observe(grants))
        };

        match fresh {
            GateState::Satisfied => self.check_radio(),
            // The prompt on screen still matches the grants; the user has to answer it
            prompt if prompt.is_prompt() && prompt == showing => {
                self.emit(ScanSignal::Gate(prompt));
                match prompt.as_error() {
                    Some(err) => Err(err),
                    None => Ok(self.phase()),
                }
            }
            // Grants changed outside the app, or nothing was asked yet
            _ => self.request_permission().await,
        }
    }

    /// The user accepted a rationale prompt: ask again.
    ///
    /// Denial tallies are only changed by the result, never by the retry.
    pub async fn retry_permission(&self) -> Result<ScanPhase, ScanError> {
        {
            let state = self.state.lock();
            if state.phase == ScanPhase::Scanning || state.enable_in_flight {
                return Ok(state.phase);
            }
            if state.gate.state() == GateState::Satisfied {
                drop(state);
                return self.check_radio();
            }
        }
        self.request_permission().await
    }

    /// The user chose to grant permissions from the app settings page
    pub fn open_settings(&self) -> ScanPhase {
        self.permissions.open_app_settings();
        let mut state = self.state.lock();
        if state.phase != ScanPhase::Scanning {
            Self::set_phase(&mut state, ScanPhase::AwaitingSettingsReturn);
        }
        info!("Opened app settings for manual permission grant");
        state.phase
    }

    async fn request_permission(&self) -> Result<ScanPhase, ScanError> {
        let epoch = self.current_epoch();
        {
            let mut state = self.state.lock();
            if state.request_in_flight {
                return Ok(state.phase);
            }
            state.request_in_flight = true;
            let gate_state = state.gate.mark_requesting();
            Self::set_phase(&mut state, ScanPhase::RequestingPermission);
            drop(state);
            self.emit(ScanSignal::Gate(gate_state));
        }

        let result = self.permissions.request_grants(&self.required).await;

        let mut state = self.state.lock();
        state.request_in_flight = false;
        let grants = match result {
            Ok(grants) => grants,
            Err(e) => {
                warn!("Permission request failed: {}", e);
                Self::set_phase(&mut state, ScanPhase::NotStarted);
                return Err(e);
            }
        };

        let next = state.gate.on_permission_result(grants);
        if self.current_epoch() != epoch {
            debug!("Permission result arrived after stop");
            return Err(ScanError::Cancelled);
        }

        match next {
            GateState::Satisfied => {
                drop(state);
                self.emit(ScanSignal::Gate(next));
                self.check_radio()
            }
            GateState::ShowSettingsRedirect(group) => {
                Self::set_phase(&mut state, ScanPhase::AwaitingSettingsReturn);
                drop(state);
                self.emit(ScanSignal::Gate(next));
                Err(ScanError::PermissionPermanentlyDenied { group })
            }
            prompt => {
                Self::set_phase(&mut state, ScanPhase::RequestingPermission);
                drop(state);
                self.emit(ScanSignal::Gate(prompt));
                match prompt.as_error() {
                    Some(err) => Err(err),
                    None => Ok(ScanPhase::RequestingPermission),
                }
            }
        }
    }

    fn check_radio(&self) -> Result<ScanPhase, ScanError> {
        Self::set_phase(&mut self.state.lock(), ScanPhase::RadioCheck);

        if !self.radio.is_present() {
            warn!("No radio adapter found");
            Self::set_phase(&mut self.state.lock(), ScanPhase::NotStarted);
            self.emit(ScanSignal::Failed(ScanError::RadioUnavailable));
            return Err(ScanError::RadioUnavailable);
        }

        if !self.radio.is_enabled() {
            info!("Radio is off, enable required");
            Self::set_phase(&mut self.state.lock(), ScanPhase::RadioEnablePending);
            self.emit(ScanSignal::RadioEnableRequired(self.enable_mode()));
            return Ok(ScanPhase::RadioEnablePending);
        }

        self.start_session()
    }

    fn start_session(&self) -> Result<ScanPhase, ScanError> {
        let names = NameResolver::new(self.permissions.clone(), self.profile.name_capability());

        let mut state = self.state.lock();
        match DiscoverySession::start(self.radio.clone(), names) {
            Ok(session) => {
                // A new session replaces the previous set entirely
                state.session = Some(session);
                Self::set_phase(&mut state, ScanPhase::Scanning);
                drop(state);
                self.emit(ScanSignal::ScanningStarted);
                Ok(ScanPhase::Scanning)
            }
            Err(ScanError::RadioDisabled) => {
                Self::set_phase(&mut state, ScanPhase::RadioEnablePending);
                drop(state);
                self.emit(ScanSignal::RadioEnableRequired(self.enable_mode()));
                Ok(ScanPhase::RadioEnablePending)
            }
            Err(e) => {
                Self::set_phase(&mut state, ScanPhase::NotStarted);
                drop(state);
                self.emit(ScanSignal::Failed(e.clone()));
                Err(e)
            }
        }
    }

    /// Switch the radio on and start scanning once it reports enabled.
    ///
    /// Waits at most the configured grace period. If the radio is still off
    /// by then (or the user declined), `RadioEnableFailed` is signalled once
    /// and returned; the caller may retry. A `stop()` during the wait cancels
    /// it without side effects.
    pub async fn request_radio_enable(&self) -> Result<(), ScanError> {
        // Subscribed under the state lock so a concurrent stop() is always seen
        let mut stop_rx = {
            let mut state = self.state.lock();
            match state.phase {
                ScanPhase::Scanning => return Ok(()),
                ScanPhase::RadioEnablePending => {}
                other => {
                    return Err(ScanError::InvalidState(format!(
                        "radio enable requested in phase {}",
                        other
                    )))
                }
            }
            if state.enable_in_flight {
                return Err(ScanError::InvalidState(
                    "radio enable already pending".to_string(),
                ));
            }
            state.enable_in_flight = true;
            self.stop_epoch.subscribe()
        };
        let epoch = *stop_rx.borrow();

        let mode = self.enable_mode();
        let grace = self.settings.radio_enable_grace();
        info!("Requesting radio enable ({:?}, grace {:?})", mode, grace);

        let outcome = tokio::select! {
            biased;
            _ = stop_rx.changed() => None,
            res = tokio::time::timeout(grace, self.enable_and_confirm(mode)) => Some(res),
        };

        self.state.lock().enable_in_flight = false;
        let outcome = if self.current_epoch() != epoch { None } else { outcome };

        match outcome {
            None => {
                debug!("Radio enable wait cancelled by stop");
                Err(ScanError::Cancelled)
            }
            Some(Ok(Ok(()))) => {
                if self.phase() != ScanPhase::RadioEnablePending {
                    return Err(ScanError::Cancelled);
                }
                info!("Radio enabled");
                self.start_session().map(|_| ())
            }
            Some(Ok(Err(e))) => {
                warn!("Radio enable refused: {}", e);
                self.emit(ScanSignal::RadioEnableFailed);
                Err(ScanError::RadioEnableFailed)
            }
            Some(Err(_)) => {
                warn!("Radio still disabled after {:?}", grace);
                self.emit(ScanSignal::RadioEnableFailed);
                Err(ScanError::RadioEnableFailed)
            }
        }
    }

    async fn enable_and_confirm(&self, mode: EnableMode) -> Result<(), ScanError> {
        self.radio.request_enable(mode).await?;

        let mut ticker = tokio::time::interval(self.settings.radio_poll_interval());
        loop {
            ticker.tick().await;
            if self.radio.is_enabled() {
                return Ok(());
            }
        }
    }

    /// Stop scanning and cancel any pending radio-enable wait. Idempotent.
    pub fn stop(&self) {
        let session = {
            let mut state = self.state.lock();
            Self::set_phase(&mut state, ScanPhase::NotStarted);
            state.session.take()
        };
        self.stop_epoch.send_modify(|epoch| *epoch += 1);

        if let Some(session) = session {
            session.stop();
            self.emit(ScanSignal::ScanningStopped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{GrantSnapshot, GrantState, PermissionGroup};
    use crate::platform::bridge::MockPermissionAuthority;
    use crate::platform::sim::{EnableBehavior, SimulatedPermissions, SimulatedRadio};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Holds every grant request until released
    struct HeldPermissions {
        inner: SimulatedPermissions,
        release: Notify,
    }

    #[async_trait]
    impl PermissionAuthority for HeldPermissions {
        fn current_grants(&self, capabilities: &[Capability]) -> GrantSnapshot {
            self.inner.current_grants(capabilities)
        }

        async fn request_grants(
            &self,
            capabilities: &[Capability],
        ) -> Result<GrantSnapshot, ScanError> {
            self.release.notified().await;
            self.inner.request_grants(capabilities).await
        }

        fn open_app_settings(&self) {
            self.inner.open_app_settings()
        }
    }

    fn fast_settings(api_level: u32) -> ScanSettings {
        ScanSettings {
            api_level,
            radio_enable_grace_ms: 150,
            radio_poll_interval_ms: 10,
            ..Default::default()
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ScanSignal>) -> Vec<ScanSignal> {
        let mut out = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            out.push(signal);
        }
        out
    }

    #[tokio::test]
    async fn test_granted_and_enabled_goes_straight_to_scanning() {
        let settings = fast_settings(34);
        let mut authority = MockPermissionAuthority::new();
        authority
            .expect_current_grants()
            .returning(|caps| GrantSnapshot::uniform(caps, GrantState::Granted));
        authority.expect_request_grants().never();
        authority.expect_open_app_settings().never();

        let radio = Arc::new(SimulatedRadio::enabled());
        let (controller, mut rx) = ScanController::new(settings, Arc::new(authority), radio.clone());

        assert_eq!(controller.begin().await, Ok(ScanPhase::Scanning));
        assert_eq!(controller.begin().await, Ok(ScanPhase::Scanning));
        assert_eq!(radio.discovery_runs(), 1);
        assert_eq!(drain(&mut rx), vec![ScanSignal::ScanningStarted]);
    }

    #[tokio::test]
    async fn test_denied_then_redirect_then_settings() {
        let settings = fast_settings(34);
        let required = settings.required_capabilities();
        let perms = Arc::new(SimulatedPermissions::new(GrantSnapshot::new()));
        let radio_denied = GrantSnapshot::uniform(&required, GrantState::Granted)
            .with(Capability::BluetoothScan, GrantState::Denied);
        perms.push_response(radio_denied.clone());
        perms.push_response(radio_denied);

        let radio = Arc::new(SimulatedRadio::enabled());
        let (controller, mut rx) = ScanController::new(settings, perms.clone(), radio);

        let first = controller.begin().await;
        assert_eq!(
            first,
            Err(ScanError::PermissionDenied {
                groups: vec![PermissionGroup::Radio]
            })
        );
        assert_eq!(controller.phase(), ScanPhase::RequestingPermission);

        // begin() while the rationale is showing does not re-request
        assert!(controller.begin().await.is_err());
        assert_eq!(perms.request_count(), 1);

        let second = controller.retry_permission().await;
        assert_eq!(
            second,
            Err(ScanError::PermissionPermanentlyDenied {
                group: PermissionGroup::Radio
            })
        );
        assert_eq!(controller.phase(), ScanPhase::AwaitingSettingsReturn);

        perms.grant_in_settings(GrantSnapshot::uniform(&required, GrantState::Granted));
        controller.open_settings();
        assert_eq!(perms.settings_opened(), 1);

        assert_eq!(controller.begin().await, Ok(ScanPhase::Scanning));
        assert_eq!(controller.denial_tally(), DenialTally::default());
        assert_eq!(controller.gate_state(), GateState::Satisfied);

        let signals = drain(&mut rx);
        assert!(signals.contains(&ScanSignal::Gate(GateState::ShowRationale(PermissionGroup::Radio))));
        assert!(signals.contains(&ScanSignal::Gate(GateState::ShowSettingsRedirect(
            PermissionGroup::Radio
        ))));
        assert_eq!(signals.last(), Some(&ScanSignal::ScanningStarted));
    }

    #[tokio::test]
    async fn test_radio_off_requires_enable_with_system_prompt() {
        let settings = fast_settings(34);
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let radio = Arc::new(SimulatedRadio::new(true, false));
        let (controller, mut rx) = ScanController::new(settings, perms, radio.clone());

        assert_eq!(controller.begin().await, Ok(ScanPhase::RadioEnablePending));
        assert_eq!(
            drain(&mut rx),
            vec![ScanSignal::RadioEnableRequired(EnableMode::SystemPrompt)]
        );

        controller.request_radio_enable().await.expect("enable");
        assert_eq!(controller.phase(), ScanPhase::Scanning);
        assert_eq!(radio.enable_requests(), vec![EnableMode::SystemPrompt]);
    }

    #[tokio::test]
    async fn test_legacy_platform_enables_directly() {
        let settings = fast_settings(30);
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let radio = Arc::new(SimulatedRadio::new(true, false));
        let (controller, _rx) = ScanController::new(settings, perms, radio.clone());

        controller.begin().await.expect("begin");
        controller.request_radio_enable().await.expect("enable");
        assert_eq!(radio.enable_requests(), vec![EnableMode::Direct]);
    }

    #[tokio::test]
    async fn test_enable_timeout_reports_once() {
        let settings = fast_settings(34);
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let radio = Arc::new(
            SimulatedRadio::new(true, false).with_enable_behavior(EnableBehavior::StayOff),
        );
        let (controller, mut rx) = ScanController::new(settings, perms, radio.clone());

        controller.begin().await.expect("begin");
        drain(&mut rx);

        assert_eq!(
            controller.request_radio_enable().await,
            Err(ScanError::RadioEnableFailed)
        );
        assert_eq!(drain(&mut rx), vec![ScanSignal::RadioEnableFailed]);
        assert_eq!(controller.phase(), ScanPhase::RadioEnablePending);
        assert_eq!(radio.discovery_runs(), 0);
        assert!(controller.devices().is_none());
    }

    #[tokio::test]
    async fn test_enable_outside_pending_phase_is_rejected() {
        let settings = fast_settings(34);
        let perms = Arc::new(SimulatedPermissions::new(GrantSnapshot::new()));
        let (controller, _rx) =
            ScanController::new(settings, perms, Arc::new(SimulatedRadio::enabled()));

        assert!(matches!(
            controller.request_radio_enable().await,
            Err(ScanError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_radio_is_reported() {
        let settings = fast_settings(34);
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let (controller, mut rx) =
            ScanController::new(settings, perms, Arc::new(SimulatedRadio::new(false, false)));

        assert_eq!(controller.begin().await, Err(ScanError::RadioUnavailable));
        assert_eq!(controller.phase(), ScanPhase::NotStarted);
        assert_eq!(
            drain(&mut rx),
            vec![ScanSignal::Failed(ScanError::RadioUnavailable)]
        );
    }

    #[tokio::test]
    async fn test_stop_then_restart_gives_fresh_set() {
        let settings = fast_settings(34);
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let radio = Arc::new(SimulatedRadio::enabled());
        let (controller, _rx) = ScanController::new(settings, perms, radio.clone());

        controller.begin().await.expect("begin");
        let devices = controller.devices().expect("session");
        assert!(radio.emit(crate::platform::bridge::Sighting::new("A")));
        tokio::task::yield_now().await;

        controller.stop();
        controller.stop();
        assert_eq!(controller.phase(), ScanPhase::NotStarted);
        assert!(!radio.is_discovering());
        let before = devices.borrow().clone();

        controller.begin().await.expect("restart");
        let fresh = controller.devices().expect("session");
        assert!(fresh.borrow().is_empty());
        assert_eq!(*devices.borrow(), before);
    }

    #[tokio::test]
    async fn test_zero_poll_interval_does_not_panic() {
        let settings = ScanSettings {
            radio_poll_interval_ms: 0,
            ..fast_settings(34)
        };
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let radio = Arc::new(SimulatedRadio::new(true, false));
        let (controller, _rx) = ScanController::new(settings, perms, radio);

        assert_eq!(controller.begin().await, Ok(ScanPhase::RadioEnablePending));
        controller.request_radio_enable().await.expect("enable");
        assert_eq!(controller.phase(), ScanPhase::Scanning);
    }

    #[tokio::test]
    async fn test_stop_before_enable_sends_nothing() {
        let settings = fast_settings(34);
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let radio = Arc::new(
            SimulatedRadio::new(true, false).with_enable_behavior(EnableBehavior::StayOff),
        );
        let (controller, mut rx) = ScanController::new(settings, perms, radio.clone());

        controller.begin().await.expect("begin");
        controller.stop();
        drain(&mut rx);

        assert!(matches!(
            controller.request_radio_enable().await,
            Err(ScanError::InvalidState(_))
        ));
        assert!(radio.enable_requests().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_stop_racing_enable_emits_no_failure() {
        let settings = fast_settings(34);
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let radio = Arc::new(
            SimulatedRadio::new(true, false).with_enable_behavior(EnableBehavior::StayOff),
        );
        let (controller, mut rx) = ScanController::new(settings, perms, radio);

        controller.begin().await.expect("begin");
        drain(&mut rx);

        let (enable, ()) = tokio::join!(controller.request_radio_enable(), async {
            controller.stop()
        });
        assert_eq!(enable, Err(ScanError::Cancelled));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(controller.phase(), ScanPhase::NotStarted);
    }

    #[tokio::test]
    async fn test_retry_when_satisfied_skips_request() {
        let settings = fast_settings(34);
        let perms = Arc::new(SimulatedPermissions::all_granted(&settings.required_capabilities()));
        let radio = Arc::new(SimulatedRadio::new(true, false));
        let (controller, _rx) = ScanController::new(settings, perms.clone(), radio);

        assert_eq!(controller.begin().await, Ok(ScanPhase::RadioEnablePending));
        assert_eq!(
            controller.retry_permission().await,
            Ok(ScanPhase::RadioEnablePending)
        );
        assert_eq!(perms.request_count(), 0);
        assert_eq!(controller.gate_state(), GateState::Satisfied);
    }

    #[tokio::test]
    async fn test_begin_during_outstanding_request_signals_awaiting() {
        let settings = fast_settings(34);
        let required = settings.required_capabilities();
        let perms = Arc::new(HeldPermissions {
            inner: SimulatedPermissions::new(GrantSnapshot::new()),
            release: Notify::new(),
        });
        perms
            .inner
            .push_response(GrantSnapshot::uniform(&required, GrantState::Granted));
        let (controller, mut rx) =
            ScanController::new(settings, perms.clone(), Arc::new(SimulatedRadio::enabled()));

        let first = controller.begin();
        tokio::pin!(first);
        assert!(futures::poll!(&mut first).is_pending());

        controller.stop();
        drain(&mut rx);

        assert_eq!(controller.begin().await, Ok(ScanPhase::NotStarted));
        assert_eq!(
            drain(&mut rx),
            vec![ScanSignal::Gate(GateState::AwaitingDecision)]
        );

        perms.release.notify_one();
        assert_eq!(first.await, Err(ScanError::Cancelled));

        assert_eq!(controller.begin().await, Ok(ScanPhase::Scanning));
    }
}
