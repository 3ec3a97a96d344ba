//! Scenario scripts
//!
//! A script drives one call session against the simulated collaborators, one
//! command per line. Blank lines and `#` comments are skipped.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

use callroute_core::domain::{
    route_callback, AudioDevice, BluetoothState, CallRouteConfig, Capabilities, DeviceKind,
    LifecycleState, ProximityState, RouteChange, RouteEngine, RouteError, SessionController,
    Signal,
};
use callroute_infra::platform::{QueueError, SignalQueue, SimulatedHeadset, SimulatedPlatform};

#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Errors reported for a single step; the script keeps running
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("{0}")]
    Collaborator(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Activate,
    Deactivate,
    Plug { microphone: bool },
    Unplug,
    BluetoothPair(String),
    BluetoothUnpair,
    BluetoothConnected,
    BluetoothFail,
    BluetoothRefuse,
    Proximity(ProximityState),
    Select(Option<DeviceKind>),
    Handset(DeviceKind),
    Status,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            ["start"] => Command::Start,
            ["stop"] => Command::Stop,
            ["activate"] => Command::Activate,
            ["deactivate"] => Command::Deactivate,
            ["plug"] => Command::Plug { microphone: false },
            ["plug", "mic"] => Command::Plug { microphone: true },
            ["unplug"] => Command::Unplug,
            ["bt", "pair", name @ ..] if !name.is_empty() => {
                Command::BluetoothPair(name.join(" "))
            }
            ["bt", "unpair"] => Command::BluetoothUnpair,
            ["bt", "connected"] => Command::BluetoothConnected,
            ["bt", "fail"] => Command::BluetoothFail,
            ["bt", "refuse"] => Command::BluetoothRefuse,
            ["near"] => Command::Proximity(ProximityState::Near),
            ["far"] => Command::Proximity(ProximityState::Far),
            ["select", "none"] => Command::Select(None),
            ["select", kind] => Command::Select(Some(kind.parse()?)),
            ["handset", kind] => Command::Handset(kind.parse()?),
            ["status"] => Command::Status,
            _ => return Err(format!("unrecognized command: {}", line.trim())),
        };
        Ok(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Start => write!(f, "start"),
            Command::Stop => write!(f, "stop"),
            Command::Activate => write!(f, "activate"),
            Command::Deactivate => write!(f, "deactivate"),
            Command::Plug { microphone: true } => write!(f, "plug mic"),
            Command::Plug { microphone: false } => write!(f, "plug"),
            Command::Unplug => write!(f, "unplug"),
            Command::BluetoothPair(name) => write!(f, "bt pair {}", name),
            Command::BluetoothUnpair => write!(f, "bt unpair"),
            Command::BluetoothConnected => write!(f, "bt connected"),
            Command::BluetoothFail => write!(f, "bt fail"),
            Command::BluetoothRefuse => write!(f, "bt refuse"),
            Command::Proximity(ProximityState::Near) => write!(f, "near"),
            Command::Proximity(ProximityState::Far) => write!(f, "far"),
            Command::Select(None) => write!(f, "select none"),
            Command::Select(Some(kind)) => write!(f, "select {}", kind),
            Command::Handset(kind) => write!(f, "handset {}", kind),
            Command::Status => write!(f, "status"),
        }
    }
}

/// Parse a whole script, returning `(line number, command)` pairs
pub fn parse(source: &str) -> Result<Vec<(usize, Command)>, ParseError> {
    source
        .lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, text)| {
            text.parse()
                .map(|command| (line, command))
                .map_err(|message| ParseError { line, message })
        })
        .collect()
}

/// Session state after a step
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: LifecycleState,
    pub selected: Option<AudioDevice>,
    pub available: Vec<AudioDevice>,
    pub bluetooth: BluetoothState,
}

/// Outcome of one script line
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub line: usize,
    pub command: String,
    pub error: Option<String>,
    pub changes: Vec<RouteChange>,
    pub snapshot: Snapshot,
}

/// A call session wired to simulated collaborators
pub struct Runner {
    session: SessionController,
    queue: SignalQueue,
    platform: SimulatedPlatform,
    headset: SimulatedHeadset,
    changes: Arc<Mutex<Vec<RouteChange>>>,
}

impl Runner {
    pub fn new(config: &CallRouteConfig, capabilities: Capabilities) -> Self {
        let queue = SignalQueue::with_capacity(config.engine.signal_queue_capacity);
        let platform = SimulatedPlatform::new().with_signals(queue.sender());
        let headset = SimulatedHeadset::new(&config.bluetooth).with_signals(queue.sender());

        let engine = RouteEngine::new(
            config,
            capabilities,
            Box::new(platform.clone()),
            Box::new(headset.clone()),
        );
        let mut session = SessionController::new(engine);

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        session.set_route_callback(route_callback(move |change| {
            if let Ok(mut changes) = sink.lock() {
                changes.push(change.clone());
            }
        }));

        Self {
            session,
            queue,
            platform,
            headset,
            changes,
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn platform(&self) -> &SimulatedPlatform {
        &self.platform
    }

    /// Execute every command, collecting one step per line
    pub fn run(&mut self, commands: &[(usize, Command)]) -> Vec<Step> {
        commands
            .iter()
            .map(|(line, command)| {
                let error = self.execute(command).err().map(|e| {
                    warn!(line, command = %command, error = %e, "Step failed");
                    e.to_string()
                });
                Step {
                    line: *line,
                    command: command.to_string(),
                    error,
                    changes: self.take_changes(),
                    snapshot: self.snapshot(),
                }
            })
            .collect()
    }

    /// Execute one command, then deliver the signals it produced
    pub fn execute(&mut self, command: &Command) -> Result<(), StepError> {
        debug!(command = %command, "Executing");
        let result = self.dispatch(command);
        self.queue.pump(&mut self.session);
        result
    }

    fn dispatch(&mut self, command: &Command) -> Result<(), StepError> {
        match command {
            Command::Start => self.session.start()?,
            Command::Stop => self.session.stop()?,
            Command::Activate => self.session.activate()?,
            Command::Deactivate => self.session.deactivate()?,
            Command::Plug { microphone } => self.platform.plug_headset(*microphone),
            Command::Unplug => self.platform.unplug_headset(),
            Command::BluetoothPair(name) => self.headset.pair(name),
            Command::BluetoothUnpair => self.headset.unpair(),
            Command::BluetoothConnected => {
                if !self.headset.sco_connected() {
                    return Err(StepError::Collaborator("no SCO connection pending".into()));
                }
            }
            Command::BluetoothFail => {
                if !self.headset.sco_timeout() {
                    return Err(StepError::Collaborator("no SCO connection pending".into()));
                }
            }
            Command::BluetoothRefuse => self.headset.refuse_sco(true),
            Command::Proximity(reading) => {
                self.queue.sender().try_send(Signal::Proximity(*reading))?
            }
            Command::Select(kind) => {
                let device = kind.map(|kind| self.device_of_kind(kind));
                self.session.select_device(device)?
            }
            Command::Handset(kind) => self.session.set_default_handset(*kind)?,
            Command::Status => {}
        }
        Ok(())
    }

    /// The listed device of this kind, or a placeholder the session will reject
    fn device_of_kind(&self, kind: DeviceKind) -> AudioDevice {
        self.session
            .available_devices()
            .iter()
            .find(|d| d.kind == kind)
            .cloned()
            .unwrap_or_else(|| AudioDevice::new(kind, kind.default_label()))
    }

    fn take_changes(&self) -> Vec<RouteChange> {
        self.changes
            .lock()
            .map(|mut changes| std::mem::take(&mut *changes))
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.session.state(),
            selected: self.session.selected_device().cloned(),
            available: self.session.available_devices().to_vec(),
            bluetooth: self.session.engine().bluetooth_state(),
        }
    }
}
