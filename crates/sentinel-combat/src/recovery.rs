//! Rest out of combat to regain HP and SP.

use sentinel_core::{Subsystem, SubsystemError};
use sentinel_types::{Action, GameStateSnapshot, priority};

use crate::config::RecoveryConfig;

/// Sits down when wounded or drained and nothing hostile is near.
#[derive(Debug, Clone)]
pub struct RecoverySubsystem {
    config: RecoveryConfig,
}

impl RecoverySubsystem {
    /// Create the subsystem.
    pub const fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }
}

impl Subsystem for RecoverySubsystem {
    fn tick(&mut self, state: &GameStateSnapshot) -> Result<Vec<Action>, SubsystemError> {
        let character = &state.character;
        if character.hp_max == 0 {
            return Ok(Vec::new());
        }
        if state.hostiles_within(self.config.safe_radius).next().is_some() {
            return Ok(Vec::new());
        }

        let low_hp = character.hp_ratio() < self.config.rest_hp_ratio;
        let low_sp = character.sp_ratio() < self.config.rest_sp_ratio;
        if !(low_hp || low_sp) {
            return Ok(Vec::new());
        }

        let reason = if low_hp { "rest: low hp" } else { "rest: low sp" };
        Ok(vec![Action::sit(priority::RECOVERY).with_reason(reason)])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sentinel_types::{ActionKind, Actor, ActorId, ActorKind};

    use super::*;

    fn recovery() -> RecoverySubsystem {
        RecoverySubsystem::new(RecoveryConfig::default())
    }

    #[test]
    fn rests_when_wounded_and_safe() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp = 40;

        let actions = recovery().tick(&state).unwrap();

        assert_eq!(actions.len(), 1);
        assert_eq!(actions.first().map(|a| a.kind), Some(ActionKind::Sit));
        assert_eq!(actions.first().map(|a| a.priority), Some(priority::RECOVERY));
    }

    #[test]
    fn rests_when_drained() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.sp = 5;

        let actions = recovery().tick(&state).unwrap();
        assert_eq!(actions.first().map(|a| a.reason.as_str()), Some("rest: low sp"));
    }

    #[test]
    fn never_rests_near_hostiles() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp = 40;
        state.actors = vec![Actor {
            id: ActorId::new(1),
            kind: ActorKind::Monster,
            x: 104,
            y: 100,
            hp: None,
            hp_max: None,
            name: String::from("Lunatic"),
            is_enemy: false,
        }];

        assert!(recovery().tick(&state).unwrap().is_empty());
    }

    #[test]
    fn healthy_character_keeps_going() {
        let state = GameStateSnapshot::fixture(1);
        assert!(recovery().tick(&state).unwrap().is_empty());
    }
}
