// World-sync snapshot kept per connected participant.

use super::UserId;

/// Fields carried by an `init` or `update` message.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldUpdate {
    pub model: String,
    pub colour: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
    pub pitch: f64,
    // None keeps the previous action.
    pub action: Option<String>,
}

/// Latest known state for one participant; `model == None` means not yet initialized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub model: Option<String>,
    pub colour: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
    pub pitch: f64,
    pub action: String,
}

/// Populated snapshot tagged with its owner, as broadcast on each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: UserId,
    pub model: String,
    pub colour: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
    pub pitch: f64,
    pub action: String,
}

pub const DEFAULT_ACTION: &str = "Idle";

impl WorldSnapshot {
    pub fn is_populated(&self) -> bool {
        self.model.is_some()
    }

    pub fn apply(&mut self, update: WorldUpdate) {
        self.model = Some(update.model);
        self.colour = update.colour;
        self.x = update.x;
        self.y = update.y;
        self.z = update.z;
        self.heading = update.heading;
        self.pitch = update.pitch;
        if let Some(action) = update.action {
            self.action = action;
        }
    }

    pub fn participant(&self, id: UserId) -> Option<Participant> {
        let model = self.model.clone()?;
        Some(Participant {
            id,
            model,
            colour: self.colour.clone(),
            x: self.x,
            y: self.y,
            z: self.z,
            heading: self.heading,
            pitch: self.pitch,
            action: self.action.clone(),
        })
    }
}
