// Scripted end-to-end run of the scan flow
//
// Plays the presentation layer against simulated platform adapters: answers
// rationale prompts by retrying, settings redirects by granting from the
// settings page, and radio prompts by requesting enablement.

use anyhow::{Context, Result};
use colored::*;
use nearscan_core::platform::{EnableBehavior, SimulatedPermissions, SimulatedRadio};
use nearscan_core::{
    Capability, DeviceSet, GateState, GrantSnapshot, GrantState, PermissionGroup,
    ScanController, ScanError, ScanPhase, ScanSettings, ScanSignal, Sighting,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Radio state at the start of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RadioStart {
    On,
    Off,
    Absent,
}

/// How the simulated radio reacts to an enable request
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EnableAnswer {
    Accept,
    Decline,
    StayOff,
    NoResponse,
}

impl From<EnableAnswer> for EnableBehavior {
    fn from(answer: EnableAnswer) -> Self {
        match answer {
            EnableAnswer::Accept => EnableBehavior::Accept,
            EnableAnswer::Decline => EnableBehavior::Decline,
            EnableAnswer::StayOff => EnableBehavior::StayOff,
            EnableAnswer::NoResponse => EnableBehavior::NoResponse,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    /// Denied permission requests before the user grants
    pub denials: u32,
    /// Denials include the location group
    pub deny_location: bool,
    pub radio: RadioStart,
    pub enable: EnableAnswer,
    /// Sightings as `ADDRESS` or `ADDRESS=Name`
    pub sightings: Vec<String>,
    pub scan_duration: Duration,
    pub max_rounds: u32,
}

/// Parse `ADDRESS` or `ADDRESS=Name`
pub fn parse_sighting(input: &str) -> Result<Sighting> {
    let (address, name) = match input.split_once('=') {
        Some((address, name)) => (address.trim(), Some(name.trim())),
        None => (input.trim(), None),
    };
    if address.is_empty() {
        anyhow::bail!("Empty device address in '{}'", input);
    }
    Ok(match name {
        Some(name) if !name.is_empty() => Sighting::named(address, name),
        _ => Sighting::new(address),
    })
}

fn denial_snapshot(required: &[Capability], deny_location: bool) -> GrantSnapshot {
    required
        .iter()
        .map(|cap| {
            let denied = match cap.group() {
                PermissionGroup::Radio => true,
                PermissionGroup::Location => deny_location,
            };
            (*cap, GrantState::from(!denied))
        })
        .collect()
}

fn print_signals(rx: &mut UnboundedReceiver<ScanSignal>) {
    while let Ok(signal) = rx.try_recv() {
        let line = match signal {
            ScanSignal::Gate(GateState::AwaitingDecision) => {
                "Requesting permissions...".normal().to_string()
            }
            ScanSignal::Gate(GateState::Satisfied) => {
                format!("{} Permissions granted", "✓".green())
            }
            ScanSignal::Gate(GateState::ShowRationale(group)) => format!(
                "{} Nearby discovery needs the {} permission",
                "!".yellow(),
                group
            ),
            ScanSignal::Gate(GateState::ShowAllDeniedRationale) => format!(
                "{} Nearby discovery needs radio and location permissions",
                "!".yellow()
            ),
            ScanSignal::Gate(GateState::ShowSettingsRedirect(group)) => format!(
                "{} {} permission denied repeatedly; open settings to grant it",
                "!".red(),
                group
            ),
            ScanSignal::Gate(GateState::Idle) => continue,
            ScanSignal::RadioEnableRequired(mode) => {
                format!("{} Radio is off ({:?} enable)", "!".yellow(), mode)
            }
            ScanSignal::RadioEnableFailed => format!("{} Failed to turn on the radio", "✗".red()),
            ScanSignal::Failed(e) => format!("{} {}", "✗".red(), e),
            ScanSignal::ScanningStarted => format!("{} Scanning for nearby devices", "✓".green()),
            ScanSignal::ScanningStopped => "Scanning stopped".dimmed().to_string(),
        };
        println!("  {}", line);
    }
}

fn print_devices(devices: &DeviceSet) {
    println!();
    println!("{}", format!("Nearby devices ({})", devices.len()).bold());
    if devices.is_empty() {
        println!("  {}", "(none found)".dimmed());
        return;
    }
    for (i, device) in devices.iter().enumerate() {
        println!("  {}. {:<20} {}", i + 1, device.id.to_string().bright_cyan(), device.name);
    }
}

/// Run the scenario to completion and return the final device set
pub async fn run(settings: ScanSettings, scenario: Scenario) -> Result<DeviceSet> {
    tracing::debug!("Running scenario {:?}", scenario);
    let required = settings.required_capabilities();

    let permissions = Arc::new(SimulatedPermissions::new(GrantSnapshot::new()));
    for _ in 0..scenario.denials {
        permissions.push_response(denial_snapshot(&required, scenario.deny_location));
    }
    permissions.push_response(GrantSnapshot::uniform(&required, GrantState::Granted));

    let sightings = scenario
        .sightings
        .iter()
        .map(|s| parse_sighting(s))
        .collect::<Result<Vec<_>>>()
        .context("Invalid --devices list")?;

    let radio = match scenario.radio {
        RadioStart::On => SimulatedRadio::new(true, true),
        RadioStart::Off => SimulatedRadio::new(true, false),
        RadioStart::Absent => SimulatedRadio::new(false, false),
    }
    .with_enable_behavior(scenario.enable.into())
    .with_sightings(sightings);
    let radio = Arc::new(radio);

    println!(
        "{} API {} requires {}",
        "Platform:".bold(),
        settings.api_level,
        required
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let (controller, mut signals) =
        ScanController::new(settings, permissions.clone(), radio.clone());

    let mut step = controller.begin().await;
    let mut rounds = 0;

    loop {
        print_signals(&mut signals);
        rounds += 1;
        if rounds > scenario.max_rounds {
            anyhow::bail!("Gave up after {} rounds", scenario.max_rounds);
        }

        step = match step {
            Ok(ScanPhase::Scanning) => break,
            Ok(ScanPhase::RadioEnablePending) => controller
                .request_radio_enable()
                .await
                .map(|_| controller.phase()),
            Ok(phase) => anyhow::bail!("Unexpected phase {}", phase),
            Err(ScanError::PermissionDenied { .. }) => controller.retry_permission().await,
            Err(ScanError::PermissionPermanentlyDenied { .. }) => {
                println!("  Opening app settings...");
                permissions
                    .grant_in_settings(GrantSnapshot::uniform(&required, GrantState::Granted));
                controller.open_settings();
                controller.begin().await
            }
            Err(e) => {
                print_signals(&mut signals);
                return Err(e).context("Scan did not start");
            }
        };
    }

    let mut devices = controller
        .devices()
        .context("Scanning without a session")?;

    let _ = tokio::time::timeout(scenario.scan_duration, async {
        while devices.changed().await.is_ok() {}
    })
    .await;

    controller.stop();
    print_signals(&mut signals);

    let found = devices.borrow().clone();
    print_devices(&found);
    Ok(found)
}
