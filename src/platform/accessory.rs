//! Consumer-side accessory identities and position notifications

use crate::api::types::EntityId;
use serde::Serialize;

/// Motion state reported with every update. The remote API has no motion
/// telemetry, so shades are always reported as stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Stopped,
}

/// Position pushed to a registered accessory on each poll tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionUpdate {
    pub key: String,
    pub name: String,
    pub current_position: u8,
    pub target_position: u8,
    pub state: PositionState,
}

impl PositionUpdate {
    /// Settled update: target equals current
    pub fn settled(key: String, name: String, position: u8) -> Self {
        Self {
            key,
            name,
            current_position: position,
            target_position: position,
            state: PositionState::Stopped,
        }
    }
}

/// Receiver of position updates for one accessory
pub trait PositionListener: Send + Sync {
    fn position_changed(&self, update: &PositionUpdate);
}

impl<F> PositionListener for F
where
    F: Fn(&PositionUpdate) + Send + Sync,
{
    fn position_changed(&self, update: &PositionUpdate) {
        self(update)
    }
}

pub fn shade_key(id: &EntityId) -> String {
    format!("powershades:shade:{id}")
}

pub fn group_key(id: &EntityId) -> String {
    format!("powershades:group:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_kind() {
        let id = EntityId::from(7);
        assert_eq!(shade_key(&id), "powershades:shade:7");
        assert_eq!(group_key(&id), "powershades:group:7");
        assert_ne!(shade_key(&id), group_key(&id));
    }

    #[test]
    fn settled_update_is_stopped() {
        let update = PositionUpdate::settled("k".into(), "Office".into(), 40);
        assert_eq!(update.target_position, 40);
        assert_eq!(update.state, PositionState::Stopped);
    }
}
