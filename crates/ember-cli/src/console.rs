//! Stdin command language of the host loop.
//!
//! Lines are either administrative commands (`js_load`, `js_list`, ...) or
//! host-simulation commands that drive the session model and event feed.

use rhai::{Dynamic, Map};
use thiserror::Error;

use ember_plugins::{AdminCommand, AdminParseError, DispatchReport, PluginManager};

const HELP: &str = "\
Commands:
  js_load <dir> | js_unload <dir> | js_reload <dir> | js_list
  session start | session end
  connect <name>
  join <slot>
  disconnect <slot>
  event <name> [key=value ...]
  quit";

/// A parsed stdin line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCommand {
    Admin(AdminCommand),
    SessionStart,
    SessionEnd,
    Connect(String),
    Join(usize),
    Disconnect(usize),
    Event {
        name: String,
        fields: Vec<(String, String)>,
    },
    Help,
    Quit,
}

/// Rejected stdin line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum CommandError {
    #[error(transparent)]
    Admin(#[from] AdminParseError),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),
}

impl HostCommand {
    /// Parse a line. Blank lines yield `Ok(None)`.
    pub(crate) fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if AdminCommand::is_admin_line(line) {
            return Ok(Some(Self::Admin(AdminCommand::parse(line)?)));
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            ["session", "start"] => Self::SessionStart,
            ["session", "end"] => Self::SessionEnd,
            ["session", ..] => return Err(CommandError::Usage("session start|end")),
            ["connect", name] => Self::Connect((*name).to_string()),
            ["connect", ..] => return Err(CommandError::Usage("connect <name>")),
            ["join", slot] => Self::Join(parse_slot(slot, "join <slot>")?),
            ["join", ..] => return Err(CommandError::Usage("join <slot>")),
            ["disconnect", slot] => Self::Disconnect(parse_slot(slot, "disconnect <slot>")?),
            ["disconnect", ..] => return Err(CommandError::Usage("disconnect <slot>")),
            ["event", name, rest @ ..] => Self::Event {
                name: (*name).to_string(),
                fields: rest
                    .iter()
                    .map(|pair| {
                        pair.split_once('=')
                            .map(|(k, v)| (k.to_string(), v.to_string()))
                            .ok_or(CommandError::Usage("event <name> [key=value ...]"))
                    })
                    .collect::<Result<_, _>>()?,
            },
            ["event"] => return Err(CommandError::Usage("event <name> [key=value ...]")),
            ["help" | "?"] => Self::Help,
            ["quit" | "exit"] => Self::Quit,
            [other, ..] => return Err(CommandError::Unknown((*other).to_string())),
            [] => return Ok(None),
        };
        Ok(Some(command))
    }

    /// Apply the command and describe the outcome.
    pub(crate) fn apply(&self, manager: &mut PluginManager) -> String {
        match self {
            Self::Admin(command) => command.execute(manager),
            Self::SessionStart => {
                let report = manager.start_session();
                format!("Session started{}", summary(report))
            },
            Self::SessionEnd => {
                let report = manager.end_session();
                format!("Session ended{}", summary(report))
            },
            Self::Connect(name) => match manager.connect_participant(name) {
                Some(slot) => format!("{name} connected in slot {slot}"),
                None => format!("{name} rejected: no free slot"),
            },
            Self::Join(slot) => {
                if manager.participant_in_session(*slot) {
                    format!("Slot {slot} joined the session")
                } else {
                    format!("No participant in slot {slot}")
                }
            },
            Self::Disconnect(slot) => {
                if manager.disconnect_participant(*slot) {
                    format!("Slot {slot} disconnected")
                } else {
                    format!("No participant in slot {slot}")
                }
            },
            Self::Event { name, fields } => {
                let args = event_args(fields);
                let mut report = manager.dispatch_event(name, &args);
                report.absorb(manager.dispatch_event_post(name, &args));
                format!("Event {name} dispatched{}", summary(report))
            },
            Self::Help => HELP.to_string(),
            Self::Quit => "Bye".to_string(),
        }
    }
}

fn parse_slot(text: &str, usage: &'static str) -> Result<usize, CommandError> {
    text.parse().map_err(|_| CommandError::Usage(usage))
}

/// No fields means no arguments; otherwise a single map argument.
fn event_args(fields: &[(String, String)]) -> Vec<Dynamic> {
    if fields.is_empty() {
        return Vec::new();
    }
    let map: Map = fields
        .iter()
        .map(|(k, v)| (k.as_str().into(), Dynamic::from(v.clone())))
        .collect();
    vec![Dynamic::from_map(map)]
}

fn summary(report: DispatchReport) -> String {
    if report.invoked == 0 {
        String::new()
    } else {
        format!(" ({} callbacks, {} failed)", report.invoked, report.failed)
    }
}
