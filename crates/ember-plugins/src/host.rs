//! Host session model: whether a session is running and who is connected.
//!
//! The manager consults it to replay already-happened events to a plugin
//! loaded mid-session, and the `clients` module exposes it to scripts.

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Dynamic, INT, Map};

/// Host session shared between the manager and modules.
pub type SharedHost = Rc<RefCell<HostSession>>;

/// A connected participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    /// Slot index, 0-based.
    pub slot: usize,
    /// Display name.
    pub name: String,
    /// Whether the participant has fully joined the session.
    pub in_session: bool,
}

impl Participant {
    /// Script view: `#{ slot, name, in_session }`.
    #[must_use]
    pub fn to_dynamic(&self) -> Dynamic {
        let mut map = Map::new();
        map.insert(
            "slot".into(),
            Dynamic::from(INT::try_from(self.slot).unwrap_or(INT::MAX)),
        );
        map.insert("name".into(), Dynamic::from(self.name.clone()));
        map.insert("in_session".into(), Dynamic::from(self.in_session));
        Dynamic::from_map(map)
    }
}

/// Session flag plus a fixed table of participant slots.
#[derive(Debug, Clone)]
pub struct HostSession {
    active: bool,
    slots: Vec<Option<Participant>>,
}

impl HostSession {
    /// Create an idle session with `max_participants` empty slots.
    #[must_use]
    pub fn new(max_participants: usize) -> Self {
        Self {
            active: false,
            slots: vec![None; max_participants],
        }
    }

    /// Wrap in a shareable handle.
    #[must_use]
    pub fn shared(max_participants: usize) -> SharedHost {
        Rc::new(RefCell::new(Self::new(max_participants)))
    }

    /// Whether the host is past static startup and running a session.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Mark the session running.
    pub fn start_session(&mut self) {
        self.active = true;
    }

    /// Mark the session over. Participants keep their slots but must
    /// join the next session again.
    pub fn end_session(&mut self) {
        self.active = false;
        for participant in self.slots.iter_mut().flatten() {
            participant.in_session = false;
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn max_participants(&self) -> usize {
        self.slots.len()
    }

    /// Occupy the lowest free slot. Returns `None` when full.
    pub fn connect(&mut self, name: impl Into<String>) -> Option<Participant> {
        let slot = self.slots.iter().position(Option::is_none)?;
        let participant = Participant {
            slot,
            name: name.into(),
            in_session: false,
        };
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = Some(participant.clone());
        }
        Some(participant)
    }

    /// Flag the participant in `slot` as fully joined.
    pub fn mark_in_session(&mut self, slot: usize) -> Option<Participant> {
        let participant = self.slots.get_mut(slot)?.as_mut()?;
        participant.in_session = true;
        Some(participant.clone())
    }

    /// Free `slot`, returning who was there.
    pub fn disconnect(&mut self, slot: usize) -> Option<Participant> {
        self.slots.get_mut(slot)?.take()
    }

    /// Participant in `slot`.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&Participant> {
        self.slots.get(slot)?.as_ref()
    }

    /// Connected participants in slot order.
    #[must_use]
    pub fn participants(&self) -> Vec<Participant> {
        self.slots.iter().flatten().cloned().collect()
    }

    /// Number of connected participants.
    #[must_use]
    pub fn count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}
