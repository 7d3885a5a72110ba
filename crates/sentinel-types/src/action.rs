//! The action model: one commanded game operation per [`Action`].
//!
//! Actions are carried in a single flat structure with optional payload
//! fields instead of one struct per kind. The client reads only the
//! fields its `type` needs and ignores the rest, so an action never fails
//! validation because of an unused field.
//!
//! Ordering: lower [`Action::priority`] executes first. Ties keep the
//! order in which subsystems emitted them (see [`rank_actions`]).

use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, ItemId, SkillId};

/// Named priority bands used by the built-in subsystems.
///
/// Lower values execute first. [`EMERGENCY`] is the most urgent value any
/// subsystem emits; values below it are reserved.
pub mod priority {
    /// Life-saving actions (flee, healing item).
    pub const EMERGENCY: i32 = 10;
    /// Disengaging movement and protective skills.
    pub const DEFENSIVE: i32 = 20;
    /// Self-buffs cast before fighting.
    pub const BUFF: i32 = 30;
    /// Offensive skills and basic attacks.
    pub const COMBAT: i32 = 40;
    /// Repositioning that is not a retreat.
    pub const MOVEMENT: i32 = 50;
    /// Resting to regain HP/SP.
    pub const RECOVERY: i32 = 60;
    /// Background chores (economy, social, bookkeeping).
    pub const ROUTINE: i32 = 100;
}

/// The kind of game command an [`Action`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Walk to `x`/`y`.
    Move,
    /// Basic attack on `target_id`.
    Attack,
    /// Cast `skill_id` at `skill_level`, on `target_id` and/or `x`/`y`.
    UseSkill,
    /// Consume `item_id` from the inventory.
    UseItem,
    /// Leave the map immediately (teleport / fly wing).
    Flee,
    /// Sit down to regenerate.
    Sit,
    /// Explicitly do nothing.
    NoOp,
}

/// One commanded game operation.
///
/// Constructed by a subsystem during a tick and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Which command this is; decides which optional fields matter.
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Execution order; lower runs first.
    pub priority: i32,
    /// Target actor for attacks and targeted skills.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<ActorId>,
    /// Destination or ground-target X cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    /// Destination or ground-target Y cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    /// Skill to cast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<SkillId>,
    /// Level at which to cast the skill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_level: Option<u32>,
    /// Item to use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    /// Diagnostic text; not interpreted by the client.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

impl Action {
    /// An action of `kind` with no payload.
    pub const fn bare(kind: ActionKind, priority: i32) -> Self {
        Self {
            kind,
            priority,
            target_id: None,
            x: None,
            y: None,
            skill_id: None,
            skill_level: None,
            item_id: None,
            reason: String::new(),
        }
    }

    /// Walk to a cell.
    pub const fn move_to(x: i32, y: i32, priority: i32) -> Self {
        let mut action = Self::bare(ActionKind::Move, priority);
        action.x = Some(x);
        action.y = Some(y);
        action
    }

    /// Basic attack on a target.
    pub const fn attack(target: ActorId, priority: i32) -> Self {
        let mut action = Self::bare(ActionKind::Attack, priority);
        action.target_id = Some(target);
        action
    }

    /// Cast a skill, optionally on a target actor.
    pub const fn use_skill(
        skill: SkillId,
        level: u32,
        target: Option<ActorId>,
        priority: i32,
    ) -> Self {
        let mut action = Self::bare(ActionKind::UseSkill, priority);
        action.skill_id = Some(skill);
        action.skill_level = Some(level);
        action.target_id = target;
        action
    }

    /// Cast a ground-targeted skill centred on a cell.
    pub const fn use_skill_at(skill: SkillId, level: u32, x: i32, y: i32, priority: i32) -> Self {
        let mut action = Self::use_skill(skill, level, None, priority);
        action.x = Some(x);
        action.y = Some(y);
        action
    }

    /// Use an inventory item.
    pub const fn use_item(item: ItemId, priority: i32) -> Self {
        let mut action = Self::bare(ActionKind::UseItem, priority);
        action.item_id = Some(item);
        action
    }

    /// Leave the map.
    pub const fn flee(priority: i32) -> Self {
        Self::bare(ActionKind::Flee, priority)
    }

    /// Sit down and regenerate.
    pub const fn sit(priority: i32) -> Self {
        Self::bare(ActionKind::Sit, priority)
    }

    /// Attach a diagnostic reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Order merged actions for execution and cap their number.
///
/// Sorting is stable, so actions with equal priority keep the order the
/// subsystems emitted them in. Anything past `cap` after sorting is
/// dropped.
pub fn rank_actions(actions: &mut Vec<Action>, cap: usize) {
    actions.sort_by_key(|action| action.priority);
    actions.truncate(cap);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_is_stable_for_equal_priorities() {
        let mut actions = vec![
            Action::attack(ActorId::new(1), priority::COMBAT).with_reason("first"),
            Action::flee(priority::EMERGENCY),
            Action::attack(ActorId::new(2), priority::COMBAT).with_reason("second"),
            Action::sit(priority::RECOVERY),
        ];
        rank_actions(&mut actions, 10);

        let kinds: Vec<ActionKind> = actions.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Flee, ActionKind::Attack, ActionKind::Attack, ActionKind::Sit]
        );
        assert_eq!(actions.get(1).map(|a| a.reason.as_str()), Some("first"));
        assert_eq!(actions.get(2).map(|a| a.reason.as_str()), Some("second"));
    }

    #[test]
    fn rank_truncates_after_sorting() {
        let mut actions = vec![
            Action::sit(priority::RECOVERY),
            Action::sit(priority::ROUTINE),
            Action::flee(priority::EMERGENCY),
        ];
        rank_actions(&mut actions, 2);

        assert_eq!(actions.len(), 2);
        assert_eq!(actions.first().map(|a| a.kind), Some(ActionKind::Flee));
        assert_eq!(actions.get(1).map(|a| a.priority), Some(priority::RECOVERY));
    }

    #[test]
    fn unused_fields_are_omitted_on_the_wire() {
        let action = Action::attack(ActorId::new(77), priority::COMBAT);
        let json = serde_json::to_value(&action).unwrap_or_default();

        assert_eq!(json["type"], "attack");
        assert_eq!(json["priority"], 40);
        assert_eq!(json["target_id"], 77);
        assert!(json.get("skill_id").is_none());
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn unknown_payload_fields_are_ignored_when_decoding() {
        let json = serde_json::json!({
            "type": "flee",
            "priority": 10,
            "skill_id": 28,
            "extra": "ignored"
        });
        let action: Result<Action, _> = serde_json::from_value(json);
        assert!(action.is_ok());
        let action = action.unwrap_or_else(|_| Action::bare(ActionKind::NoOp, 0));
        assert_eq!(action.kind, ActionKind::Flee);
        assert_eq!(action.skill_id, Some(SkillId::new(28)));
    }

    #[test]
    fn ground_skill_carries_coordinates() {
        let action = Action::use_skill_at(SkillId::new(89), 10, 120, 85, priority::COMBAT);
        assert_eq!(action.kind, ActionKind::UseSkill);
        assert_eq!((action.x, action.y), (Some(120), Some(85)));
        assert_eq!(action.skill_level, Some(10));
        assert!(action.target_id.is_none());
    }
}
