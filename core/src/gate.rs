//! Permission gate state machine
//!
//! Decides, from each permission result, whether discovery may proceed or
//! which single prompt the presentation layer should show next. Denials are
//! counted per group so that a first denial gets a rationale and repeated
//! denials are redirected to the app settings page.

use crate::capability::{capabilities_in_group, Capability, GrantSnapshot, PermissionGroup};
use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Consecutive denials after which the settings redirect replaces the rationale
pub const DEFAULT_SETTINGS_REDIRECT_AFTER: u32 = 2;

/// The single active mode of the permission flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    /// Nothing evaluated yet
    Idle,
    /// A grant request is outstanding or must be issued
    AwaitingDecision,
    /// Every required capability is granted
    Satisfied,
    /// Explain why the group is needed, then ask again
    ShowRationale(PermissionGroup),
    /// Ask the user to grant the group from the settings page
    ShowSettingsRedirect(PermissionGroup),
    /// Combined prompt when both groups were denied
    ShowAllDeniedRationale,
}

impl GateState {
    /// Whether this state asks the presentation layer to show something
    pub fn is_prompt(&self) -> bool {
        matches!(
            self,
            GateState::ShowRationale(_)
                | GateState::ShowSettingsRedirect(_)
                | GateState::ShowAllDeniedRationale
        )
    }

    /// Error equivalent of a prompt state
    pub fn as_error(&self) -> Option<ScanError> {
        match self {
            GateState::ShowRationale(group) => Some(ScanError::PermissionDenied {
                groups: vec![*group],
            }),
            GateState::ShowAllDeniedRationale => Some(ScanError::PermissionDenied {
                groups: vec![PermissionGroup::Radio, PermissionGroup::Location],
            }),
            GateState::ShowSettingsRedirect(group) => {
                Some(ScanError::PermissionPermanentlyDenied { group: *group })
            }
            _ => None,
        }
    }
}

/// Consecutive denials per group since that group last succeeded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenialTally {
    pub radio: u32,
    pub location: u32,
}

impl DenialTally {
    pub fn get(&self, group: PermissionGroup) -> u32 {
        match group {
            PermissionGroup::Radio => self.radio,
            PermissionGroup::Location => self.location,
        }
    }

    fn increment(&mut self, group: PermissionGroup) -> u32 {
        let count = match group {
            PermissionGroup::Radio => &mut self.radio,
            PermissionGroup::Location => &mut self.location,
        };
        *count = count.saturating_add(1);
        *count
    }

    fn reset(&mut self, group: PermissionGroup) {
        match group {
            PermissionGroup::Radio => self.radio = 0,
            PermissionGroup::Location => self.location = 0,
        }
    }
}

/// Permission gate over a fixed set of required capabilities
#[derive(Debug, Clone)]
pub struct PermissionGate {
    radio_caps: Vec<Capability>,
    location_caps: Vec<Capability>,
    tally: DenialTally,
    state: GateState,
    last_snapshot: Option<GrantSnapshot>,
    redirect_after: u32,
}

impl PermissionGate {
    /// Create a gate for the given required capabilities
    pub fn new(required: &[Capability]) -> Self {
        Self {
            radio_caps: capabilities_in_group(required, PermissionGroup::Radio),
            location_caps: capabilities_in_group(required, PermissionGroup::Location),
            tally: DenialTally::default(),
            state: GateState::Idle,
            last_snapshot: None,
            redirect_after: DEFAULT_SETTINGS_REDIRECT_AFTER,
        }
    }

    /// Override the settings redirect threshold (clamped to at least 2)
    pub fn with_redirect_after(mut self, denials: u32) -> Self {
        self.redirect_after = denials.max(DEFAULT_SETTINGS_REDIRECT_AFTER);
        self
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn tally(&self) -> DenialTally {
        self.tally
    }

    pub fn last_snapshot(&self) -> Option<&GrantSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Every capability the gate requires, radio group first
    pub fn required(&self) -> Vec<Capability> {
        self.radio_caps
            .iter()
            .chain(self.location_caps.iter())
            .copied()
            .collect()
    }

    fn group_satisfied(&self, grants: &GrantSnapshot) -> (bool, bool) {
        (
            grants.all_granted(&self.radio_caps),
            grants.all_granted(&self.location_caps),
        )
    }

    fn prompt_for(&self, group: PermissionGroup) -> GateState {
        if self.tally.get(group) >= self.redirect_after {
            GateState::ShowSettingsRedirect(group)
        } else {
            GateState::ShowRationale(group)
        }
    }

    /// What the gate would show for `grants` given the current tallies.
    ///
    /// Pure: neither the tallies nor the active state change.
    pub fn evaluate(&self, grants: &GrantSnapshot) -> GateState {
        match self.group_satisfied(grants) {
            (true, true) => GateState::Satisfied,
            (false, false) => {
                if self.tally.radio == 0 && self.tally.location == 0 {
                    GateState::AwaitingDecision
                } else {
                    GateState::ShowAllDeniedRationale
                }
            }
            (false, true) => self.partial(PermissionGroup::Radio),
            (true, false) => self.partial(PermissionGroup::Location),
        }
    }

    fn partial(&self, group: PermissionGroup) -> GateState {
        if self.tally.get(group) == 0 {
            GateState::AwaitingDecision
        } else {
            self.prompt_for(group)
        }
    }

    /// Apply the result of one completed grant request
    pub fn on_permission_result(&mut self, grants: GrantSnapshot) -> GateState {
        let (radio_granted, location_granted) = self.group_satisfied(&grants);

        let next = match (radio_granted, location_granted) {
            (true, true) => {
                self.tally = DenialTally::default();
                GateState::Satisfied
            }
            (false, false) => {
                self.tally.increment(PermissionGroup::Radio);
                self.tally.increment(PermissionGroup::Location);
                GateState::ShowAllDeniedRationale
            }
            (false, true) => {
                self.tally.reset(PermissionGroup::Location);
                self.tally.increment(PermissionGroup::Radio);
                self.prompt_for(PermissionGroup::Radio)
            }
            (true, false) => {
                self.tally.reset(PermissionGroup::Radio);
                self.tally.increment(PermissionGroup::Location);
                self.prompt_for(PermissionGroup::Location)
            }
        };

        info!(
            "Permission result: radio={} location={} -> {:?} (tally radio={} location={})",
            radio_granted, location_granted, next, self.tally.radio, self.tally.location
        );

        self.last_snapshot = Some(grants);
        self.state = next;
        next
    }

    /// Re-enter the request flow. Tallies are left untouched.
    pub fn mark_requesting(&mut self) -> GateState {
        debug!("Permission request issued from {:?}", self.state);
        self.state = GateState::AwaitingDecision;
        self.state
    }

    /// Record a snapshot observed outside a request round trip.
    ///
    /// Only a fully granted snapshot changes anything: it moves the gate to
    /// `Satisfied` and clears the tallies. Denials here are not counted.
    pub fn observe(&mut self, grants: GrantSnapshot) -> GateState {
        let evaluated = self.evaluate(&grants);
        if evaluated == GateState::Satisfied {
            self.tally = DenialTally::default();
            self.state = GateState::Satisfied;
        }
        self.last_snapshot = Some(grants);
        evaluated
    }
}
