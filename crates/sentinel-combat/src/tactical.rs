//! The tactical combat controller.
//!
//! A level-triggered state machine: every tick the state is derived from
//! scratch out of the snapshot, in this order:
//!
//! | State | Condition | Action |
//! |-------|-----------|--------|
//! | `Emergency` | HP ratio ≤ `emergency_hp_ratio` | healing item, else flee (10) |
//! | `Retreating` | low HP, high threat while wounded, or a boss while solo | move away (20) |
//! | `Idle` | no hostile within `max_engage_distance` | none |
//! | `Engaging` / `InCombat` | a target beyond / within optimal range | one skill or attack |
//!
//! The only memory kept between ticks is the last target id, which
//! feeds a small continuity bonus into target scoring.

use std::fmt;

use sentinel_core::{Subsystem, SubsystemError};
use sentinel_types::{Action, ActorId, CharacterState, GameStateSnapshot, SkillState, priority};
use tracing::debug;

use crate::config::{CombatConfig, RoleProfile};
use crate::geometry::{centroid, step_away};
use crate::targeting::{TargetChoice, select_target};
use crate::threat::threat_score;

/// Controller state for the current tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TacticalState {
    /// Nothing to fight.
    #[default]
    Idle,
    /// Closing in on a target beyond optimal range.
    Engaging,
    /// Target within optimal range.
    InCombat,
    /// Backing away from danger.
    Retreating,
    /// About to die.
    Emergency,
}

impl TacticalState {
    /// Lowercase label used in logs and action reasons.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Engaging => "engaging",
            Self::InCombat => "in_combat",
            Self::Retreating => "retreating",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for TacticalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combat subsystem: picks targets and one combat action per tick.
#[derive(Debug, Clone)]
pub struct TacticalController {
    config: CombatConfig,
    state: TacticalState,
    last_target: Option<ActorId>,
}

impl TacticalController {
    /// A controller in the `Idle` state.
    pub const fn new(config: CombatConfig) -> Self {
        Self {
            config,
            state: TacticalState::Idle,
            last_target: None,
        }
    }

    /// State chosen on the most recent tick.
    pub const fn state(&self) -> TacticalState {
        self.state
    }

    /// Target chosen on the most recent tick.
    pub const fn last_target(&self) -> Option<ActorId> {
        self.last_target
    }

    /// Derive this tick's state and the actions it calls for.
    ///
    /// # Errors
    ///
    /// [`SubsystemError::MissingData`] when the character reports no
    /// maximum HP, since every threshold is a ratio of it.
    pub fn evaluate(
        &mut self,
        snapshot: &GameStateSnapshot,
    ) -> Result<Vec<Action>, SubsystemError> {
        let character = &snapshot.character;
        if character.hp_max == 0 {
            return Err(SubsystemError::MissingData(String::from("character hp_max is 0")));
        }

        let hp_ratio = character.hp_ratio();
        if hp_ratio <= self.config.emergency_hp_ratio {
            self.transition(snapshot.tick, TacticalState::Emergency, None);
            return Ok(vec![emergency_action(&self.config, character)]);
        }

        let threat = threat_score(snapshot, &self.config.threat, self.config.threat_radius);
        if self.should_retreat(snapshot, hp_ratio, threat) {
            self.transition(snapshot.tick, TacticalState::Retreating, None);
            return Ok(retreat_action(&self.config, snapshot).into_iter().collect());
        }

        let profile = self.config.roles.for_role(character.role);
        let Some(choice) = select_target(
            snapshot,
            profile,
            &self.config.targeting,
            self.config.max_engage_distance,
            self.last_target,
        ) else {
            self.transition(snapshot.tick, TacticalState::Idle, None);
            return Ok(Vec::new());
        };

        let next = if choice.distance > profile.optimal_range {
            TacticalState::Engaging
        } else {
            TacticalState::InCombat
        };
        let action = combat_action(&self.config, profile, snapshot, &choice);
        self.transition(snapshot.tick, next, Some(choice.actor.id));
        Ok(vec![action])
    }

    fn should_retreat(&self, snapshot: &GameStateSnapshot, hp_ratio: f64, threat: f64) -> bool {
        if hp_ratio <= self.config.retreat_hp_ratio {
            return true;
        }
        if threat >= self.config.engage_threat && hp_ratio < self.config.retreat_threat_hp_ratio {
            return true;
        }
        self.config.avoid_boss_when_solo
            && snapshot.character.is_solo()
            && snapshot
                .hostiles_within(self.config.threat_radius)
                .any(|actor| actor.is_boss_class())
    }

    fn transition(&mut self, tick: u64, next: TacticalState, target: Option<ActorId>) {
        if next != self.state {
            debug!(tick, from = %self.state, to = %next, "tactical state changed");
        }
        self.state = next;
        self.last_target = target;
    }
}

impl Subsystem for TacticalController {
    fn tick(&mut self, state: &GameStateSnapshot) -> Result<Vec<Action>, SubsystemError> {
        self.evaluate(state)
    }
}

/// The first configured healing item in the inventory, else flee.
fn emergency_action(config: &CombatConfig, character: &CharacterState) -> Action {
    config
        .healing_items
        .iter()
        .find(|&&id| character.item(id).is_some())
        .map_or_else(
            || Action::flee(priority::EMERGENCY).with_reason("emergency: no healing item"),
            |&id| Action::use_item(id, priority::EMERGENCY).with_reason("emergency heal"),
        )
}

/// One step directly away from the centroid of nearby hostiles.
fn retreat_action(config: &CombatConfig, snapshot: &GameStateSnapshot) -> Option<Action> {
    let threat = centroid(
        snapshot
            .hostiles_within(config.threat_radius)
            .map(|actor| actor.position()),
    )?;
    let to = step_away(snapshot.character.position(), threat, config.retreat_step);
    Some(Action::move_to(to.x, to.y, priority::DEFENSIVE).with_reason("retreat"))
}

/// A known skill that is off cooldown and affordable.
fn usable<'a>(character: &'a CharacterState, name: &str) -> Option<&'a SkillState> {
    character
        .skill(name)
        .filter(|skill| skill.is_ready() && character.sp >= skill.sp_cost)
}

/// First usable skill from `names`.
fn first_usable<'a>(character: &'a CharacterState, names: &[String]) -> Option<&'a SkillState> {
    names.iter().find_map(|name| usable(character, name))
}

/// Buff, defensive, area, single-target, basic attack; first that applies.
fn combat_action(
    config: &CombatConfig,
    profile: &RoleProfile,
    snapshot: &GameStateSnapshot,
    choice: &TargetChoice<'_>,
) -> Action {
    let character = &snapshot.character;
    let target = choice.actor;

    let missing_buff = profile
        .buffs
        .iter()
        .filter(|name| !character.has_buff(name))
        .find_map(|name| usable(character, name));
    if let Some(skill) = missing_buff {
        return Action::use_skill(skill.id, skill.level, character.id, priority::BUFF)
            .with_reason(format!("buff: {}", skill.name));
    }

    let threatened = snapshot
        .hostiles_within(profile.unsafe_distance)
        .next()
        .is_some();
    let defensive = if threatened {
        first_usable(character, &profile.defensive)
    } else {
        None
    };
    if let Some(skill) = defensive {
        return Action::use_skill(skill.id, skill.level, character.id, priority::DEFENSIVE)
            .with_reason(format!("defensive: {}", skill.name));
    }

    let center = target.position();
    let clustered = snapshot
        .hostiles()
        .filter(|actor| center.distance(actor.position()) <= config.aoe_radius)
        .count();
    let area = if config.prefer_aoe && clustered >= config.aoe_min_targets {
        first_usable(character, &profile.aoe)
    } else {
        None
    };
    if let Some(skill) = area {
        return Action::use_skill_at(skill.id, skill.level, target.x, target.y, priority::COMBAT)
            .with_reason(format!("aoe: {} on {clustered} targets", skill.name));
    }

    if let Some(skill) = first_usable(character, &profile.damage) {
        return Action::use_skill(skill.id, skill.level, Some(target.id), priority::COMBAT)
            .with_reason(format!("attack skill: {}", skill.name));
    }

    Action::attack(target.id, priority::COMBAT).with_reason("basic attack")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sentinel_types::{ActionKind, Actor, ActorKind, InventoryItem, ItemId, Role, SkillId};

    use super::*;

    fn hostile(id: u64, kind: ActorKind, x: i32, y: i32) -> Actor {
        Actor {
            id: ActorId::new(id),
            kind,
            x,
            y,
            hp: Some(500),
            hp_max: Some(500),
            name: String::new(),
            is_enemy: false,
        }
    }

    fn skill(id: u64, name: &str, sp_cost: u32) -> SkillState {
        SkillState {
            id: SkillId::new(id),
            name: name.to_owned(),
            level: 5,
            cooldown_ms: 0,
            sp_cost,
        }
    }

    fn melee_kit() -> Vec<SkillState> {
        vec![
            skill(60, "Two-Hand Quicken", 10),
            skill(61, "Endure", 10),
            skill(7, "Magnum Break", 15),
            skill(5, "Bash", 8),
        ]
    }

    fn controller() -> TacticalController {
        TacticalController::new(CombatConfig::default())
    }

    fn only(actions: &[Action]) -> &Action {
        assert_eq!(actions.len(), 1, "{actions:?}");
        actions.first().unwrap()
    }

    #[test]
    fn critical_hp_uses_healing_item_at_top_priority() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp = 15;
        state.character.inventory = vec![InventoryItem {
            id: ItemId::new(501),
            name: String::from("Red Potion"),
            amount: 3,
        }];
        state.actors = vec![hostile(1, ActorKind::Monster, 101, 100)];
        let mut controller = controller();

        let actions = controller.evaluate(&state).unwrap();

        let action = only(&actions);
        assert_eq!(action.kind, ActionKind::UseItem);
        assert_eq!(action.item_id, Some(ItemId::new(501)));
        assert_eq!(action.priority, priority::EMERGENCY);
        assert_eq!(controller.state(), TacticalState::Emergency);
    }

    #[test]
    fn critical_hp_without_potions_flees() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp = 15;

        let actions = controller().evaluate(&state).unwrap();

        let action = only(&actions);
        assert_eq!(action.kind, ActionKind::Flee);
        assert_eq!(action.priority, priority::EMERGENCY);
    }

    #[test]
    fn empty_potion_stack_is_skipped() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp = 10;
        state.character.inventory = vec![
            InventoryItem {
                id: ItemId::new(504),
                name: String::from("White Potion"),
                amount: 0,
            },
            InventoryItem {
                id: ItemId::new(502),
                name: String::from("Orange Potion"),
                amount: 1,
            },
        ];

        let actions = controller().evaluate(&state).unwrap();
        assert_eq!(only(&actions).item_id, Some(ItemId::new(502)));
    }

    #[test]
    fn low_hp_retreats_away_from_hostiles() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp = 30;
        state.actors = vec![hostile(1, ActorKind::Monster, 100, 105)];
        let mut controller = controller();

        let actions = controller.evaluate(&state).unwrap();

        let action = only(&actions);
        assert_eq!(action.kind, ActionKind::Move);
        assert_eq!((action.x, action.y), (Some(100), Some(95)));
        assert_eq!(action.priority, priority::DEFENSIVE);
        assert_eq!(controller.state(), TacticalState::Retreating);
    }

    #[test]
    fn retreat_with_nothing_nearby_emits_nothing() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp = 30;
        let mut controller = controller();

        assert!(controller.evaluate(&state).unwrap().is_empty());
        assert_eq!(controller.state(), TacticalState::Retreating);
    }

    #[test]
    fn solo_character_backs_off_from_boss() {
        let mut state = GameStateSnapshot::fixture(1);
        state.actors = vec![hostile(1, ActorKind::Mvp, 103, 100)];

        let actions = controller().evaluate(&state).unwrap();

        let action = only(&actions);
        assert_eq!(action.kind, ActionKind::Move);
        assert_eq!((action.x, action.y), (Some(95), Some(100)));
    }

    #[test]
    fn party_engages_boss() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.party_size = 4;
        state.actors = vec![hostile(1, ActorKind::Boss, 103, 100)];
        let mut controller = controller();

        let actions = controller.evaluate(&state).unwrap();

        let action = only(&actions);
        assert_eq!(action.kind, ActionKind::Attack);
        assert_eq!(action.target_id, Some(ActorId::new(1)));
        assert_eq!(controller.state(), TacticalState::Engaging);
        assert_eq!(controller.last_target(), Some(ActorId::new(1)));
    }

    #[test]
    fn high_threat_while_wounded_retreats() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp = 45;
        state.character.party_size = 3;
        state.actors = (1..=8)
            .map(|id| hostile(id, ActorKind::Monster, 102, 100))
            .chain([hostile(20, ActorKind::Boss, 98, 100)])
            .collect();
        // 0.4·0.55 + min(8·0.05 + 0.2, 0.4) = 0.62, under the default 0.7.
        let mut controller = TacticalController::new(CombatConfig {
            engage_threat: 0.6,
            ..CombatConfig::default()
        });

        controller.evaluate(&state).unwrap();
        assert_eq!(controller.state(), TacticalState::Retreating);
    }

    #[test]
    fn combat_action_priority_chain() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.skills = melee_kit();
        state.actors = vec![hostile(1, ActorKind::Monster, 101, 100)];
        let mut controller = controller();

        // Missing buff first.
        let actions = controller.evaluate(&state).unwrap();
        assert_eq!(only(&actions).skill_id, Some(SkillId::new(60)));
        assert_eq!(only(&actions).priority, priority::BUFF);
        assert_eq!(controller.state(), TacticalState::InCombat);

        // Adjacent hostile: defensive skill.
        state.character.buffs = vec![String::from("Two-Hand Quicken")];
        let actions = controller.evaluate(&state).unwrap();
        assert_eq!(only(&actions).skill_id, Some(SkillId::new(61)));
        assert_eq!(only(&actions).priority, priority::DEFENSIVE);

        // Defensive on cooldown, single target: damage skill.
        if let Some(endure) = state.character.skills.get_mut(1) {
            endure.cooldown_ms = 3_000;
        }
        let actions = controller.evaluate(&state).unwrap();
        assert_eq!(only(&actions).skill_id, Some(SkillId::new(5)));
        assert_eq!(only(&actions).target_id, Some(ActorId::new(1)));

        // A cluster around the target: area skill at the target's cell.
        state.actors.push(hostile(2, ActorKind::Monster, 102, 100));
        state.actors.push(hostile(3, ActorKind::Monster, 101, 101));
        let actions = controller.evaluate(&state).unwrap();
        let action = only(&actions);
        assert_eq!(action.skill_id, Some(SkillId::new(7)));
        assert_eq!((action.x, action.y), (Some(101), Some(100)));
        assert_eq!(action.priority, priority::COMBAT);

        // Out of SP: basic attack.
        state.character.sp = 0;
        let actions = controller.evaluate(&state).unwrap();
        assert_eq!(only(&actions).kind, ActionKind::Attack);
    }

    #[test]
    fn unknown_skill_degrades_to_next_option() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.role = Role::Caster;
        state.character.buffs = vec![String::from("Energy Coat")];
        state.character.skills = vec![skill(19, "Fire Bolt", 12)];
        state.actors = vec![hostile(1, ActorKind::Monster, 106, 100)];
        let mut controller = controller();

        let actions = controller.evaluate(&state).unwrap();

        let action = only(&actions);
        assert_eq!(action.kind, ActionKind::UseSkill);
        assert_eq!(action.skill_id, Some(SkillId::new(19)));
        // Caster optimal range is 9; the target is 6 cells away.
        assert_eq!(controller.state(), TacticalState::InCombat);
    }

    #[test]
    fn no_target_is_idle() {
        let mut state = GameStateSnapshot::fixture(1);
        state.actors = vec![hostile(1, ActorKind::Monster, 100, 130)];
        let mut controller = controller();

        assert!(controller.evaluate(&state).unwrap().is_empty());
        assert_eq!(controller.state(), TacticalState::Idle);
        assert_eq!(controller.last_target(), None);
    }

    #[test]
    fn missing_max_hp_is_an_error() {
        let mut state = GameStateSnapshot::fixture(1);
        state.character.hp_max = 0;

        let result = controller().evaluate(&state);
        assert!(matches!(result, Err(SubsystemError::MissingData(_))));
    }

    #[test]
    fn state_labels() {
        assert_eq!(TacticalState::InCombat.to_string(), "in_combat");
        assert_eq!(TacticalState::default(), TacticalState::Idle);
    }
}
