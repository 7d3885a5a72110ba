//! The per-tick world-state snapshot pushed by the game client.
//!
//! A [`GameStateSnapshot`] is parsed once per inbound `state_update`,
//! appended to the tick history, and handed read-only to every subsystem.
//! Parsing is strict: the fields the pipeline cannot reason without
//! (`tick`, character `hp`/`hp_max` and position) are required, so a
//! malformed payload fails loudly instead of turning into a zeroed
//! character standing at the origin.
//!
//! The core does not validate game invariants such as `hp <= hp_max`.
//! Consumers clamp where it matters (see [`CharacterState::hp_ratio`]).

use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, ItemId, SkillId};

/// Version of the snapshot schema understood by this crate.
///
/// Bumped whenever a required field is added or a field changes meaning.
/// [`GameStateSnapshot::fixture`] builds values for this version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A map cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Create a position.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in cells.
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(other.x) - f64::from(self.x);
        let dy = f64::from(other.y) - f64::from(self.y);
        dx.hypot(dy)
    }
}

/// Combat role of the controlled character, used to pick a skill profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Close-range physical fighter.
    #[default]
    Melee,
    /// Bow or gun user fighting from a distance.
    Ranged,
    /// Spell caster.
    Caster,
    /// Healer / buffer.
    Support,
}

/// A skill the character knows, with its current availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillState {
    /// Client skill id.
    pub id: SkillId,
    /// Display name, used by skill profiles to refer to the skill.
    pub name: String,
    /// Learned level.
    #[serde(default = "default_one")]
    pub level: u32,
    /// Remaining cooldown in milliseconds; `0` means ready.
    #[serde(default)]
    pub cooldown_ms: u64,
    /// SP consumed per cast.
    #[serde(default)]
    pub sp_cost: u32,
}

impl SkillState {
    /// Whether the skill is off cooldown.
    pub const fn is_ready(&self) -> bool {
        self.cooldown_ms == 0
    }
}

/// One inventory stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Client item id.
    pub id: ItemId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Stack size.
    #[serde(default = "default_one")]
    pub amount: u32,
}

/// Vitals, position, and loadout of the controlled character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    /// The character's own actor id, used for self-targeted skills.
    #[serde(default)]
    pub id: Option<ActorId>,
    /// Character name.
    #[serde(default)]
    pub name: String,
    /// Current hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub hp_max: u32,
    /// Current skill points.
    #[serde(default)]
    pub sp: u32,
    /// Maximum skill points.
    #[serde(default)]
    pub sp_max: u32,
    /// Column on the current map.
    pub x: i32,
    /// Row on the current map.
    pub y: i32,
    /// Current map name.
    #[serde(default)]
    pub map: String,
    /// Base level.
    #[serde(default)]
    pub level: u32,
    /// Combat role.
    #[serde(default)]
    pub role: Role,
    /// Number of party members including the character (1 when solo).
    #[serde(default = "default_one")]
    pub party_size: u32,
    /// Names of currently active status effects.
    #[serde(default)]
    pub buffs: Vec<String>,
    /// Known skills.
    #[serde(default)]
    pub skills: Vec<SkillState>,
    /// Carried items.
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
}

impl CharacterState {
    /// Current position.
    pub const fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// HP as a fraction of max HP, clamped to `[0, 1]`.
    ///
    /// A zero `hp_max` reads as `0.0`.
    pub fn hp_ratio(&self) -> f64 {
        ratio(self.hp, self.hp_max)
    }

    /// SP as a fraction of max SP, clamped to `[0, 1]`.
    ///
    /// A zero `sp_max` reads as `1.0`: a character without an SP pool
    /// never needs to recover it.
    pub fn sp_ratio(&self) -> f64 {
        if self.sp_max == 0 {
            return 1.0;
        }
        ratio(self.sp, self.sp_max)
    }

    /// Whether the character is fighting without a party.
    pub const fn is_solo(&self) -> bool {
        self.party_size <= 1
    }

    /// Whether a status effect with this name is active.
    pub fn has_buff(&self, name: &str) -> bool {
        self.buffs.iter().any(|buff| buff.eq_ignore_ascii_case(name))
    }

    /// Look up a known skill by name.
    pub fn skill(&self, name: &str) -> Option<&SkillState> {
        self.skills
            .iter()
            .find(|skill| skill.name.eq_ignore_ascii_case(name))
    }

    /// Look up a carried item with a non-zero stack by id.
    pub fn item(&self, id: ItemId) -> Option<&InventoryItem> {
        self.inventory
            .iter()
            .find(|item| item.id == id && item.amount > 0)
    }
}

/// What kind of entity an [`Actor`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    /// Regular monster.
    Monster,
    /// Mini-boss.
    Boss,
    /// Map boss (MVP).
    Mvp,
    /// Another player.
    Player,
    /// Non-player character.
    Npc,
    /// Anything the client reports that the service does not model.
    #[serde(other)]
    Other,
}

/// A nearby entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor id.
    pub id: ActorId,
    /// Entity kind.
    pub kind: ActorKind,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Current HP, when the client can see it.
    #[serde(default)]
    pub hp: Option<u32>,
    /// Maximum HP, when the client can see it.
    #[serde(default)]
    pub hp_max: Option<u32>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// For players: flagged as an enemy (PvP/WoE).
    #[serde(default)]
    pub is_enemy: bool,
}

impl Actor {
    /// Current position.
    pub const fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Whether the actor is a valid combat target.
    pub const fn is_hostile(&self) -> bool {
        match self.kind {
            ActorKind::Monster | ActorKind::Boss | ActorKind::Mvp => true,
            ActorKind::Player => self.is_enemy,
            ActorKind::Npc | ActorKind::Other => false,
        }
    }

    /// Whether the actor is a boss or MVP.
    pub const fn is_boss_class(&self) -> bool {
        matches!(self.kind, ActorKind::Boss | ActorKind::Mvp)
    }

    /// Whether the actor is an enemy player.
    pub const fn is_enemy_player(&self) -> bool {
        matches!(self.kind, ActorKind::Player) && self.is_enemy
    }

    /// Visible HP fraction, clamped to `[0, 1]`, or `None` when unknown.
    pub fn hp_fraction(&self) -> Option<f64> {
        match (self.hp, self.hp_max) {
            (Some(hp), Some(max)) if max > 0 => Some(ratio(hp, max)),
            _ => None,
        }
    }
}

/// One tick's observed world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    /// Client tick id; non-decreasing across a session.
    pub tick: u64,
    /// Client wall-clock capture time in milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// The controlled character.
    pub character: CharacterState,
    /// Nearby entities, in client order.
    #[serde(default)]
    pub actors: Vec<Actor>,
}

impl GameStateSnapshot {
    /// Actors that can be fought.
    pub fn hostiles(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter().filter(|actor| actor.is_hostile())
    }

    /// Hostile actors within `radius` cells of the character.
    pub fn hostiles_within(&self, radius: f64) -> impl Iterator<Item = &Actor> {
        let origin = self.character.position();
        self.hostiles()
            .filter(move |actor| origin.distance(actor.position()) <= radius)
    }

    /// A full-health melee character alone on an empty map.
    ///
    /// Schema version [`SNAPSHOT_SCHEMA_VERSION`]. Only for tests; parsing
    /// never falls back to this value.
    #[cfg(any(test, feature = "fixtures"))]
    pub fn fixture(tick: u64) -> Self {
        Self {
            tick,
            timestamp: None,
            character: CharacterState {
                id: Some(ActorId::new(2_000_001)),
                name: String::from("Fixture"),
                hp: 100,
                hp_max: 100,
                sp: 50,
                sp_max: 50,
                x: 100,
                y: 100,
                map: String::from("prt_fild08"),
                level: 50,
                role: Role::Melee,
                party_size: 1,
                buffs: Vec::new(),
                skills: Vec::new(),
                inventory: Vec::new(),
            },
            actors: Vec::new(),
        }
    }
}

/// `value / max` as a float clamped to `[0, 1]`; `0.0` when `max` is zero.
fn ratio(value: u32, max: u32) -> f64 {
    if max == 0 {
        return 0.0;
    }
    (f64::from(value) / f64::from(max)).clamp(0.0, 1.0)
}

const fn default_one() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> serde_json::Value {
        serde_json::json!({
            "tick": 12,
            "character": { "hp": 40, "hp_max": 80, "x": 10, "y": 20 }
        })
    }

    #[test]
    fn minimal_snapshot_parses_with_defaults() {
        let snapshot: Result<GameStateSnapshot, _> = serde_json::from_value(minimal_json());
        assert!(snapshot.is_ok());
        let snapshot = snapshot.unwrap_or_else(|_| GameStateSnapshot::fixture(0));

        assert_eq!(snapshot.tick, 12);
        assert!(snapshot.actors.is_empty());
        assert_eq!(snapshot.character.party_size, 1);
        assert_eq!(snapshot.character.role, Role::Melee);
        assert!((snapshot.character.hp_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn missing_required_character_field_is_rejected() {
        let json = serde_json::json!({
            "tick": 1,
            "character": { "hp": 40, "x": 10, "y": 20 }
        });
        let snapshot: Result<GameStateSnapshot, _> = serde_json::from_value(json);
        assert!(snapshot.is_err());
    }

    #[test]
    fn hp_ratio_is_clamped() {
        let mut character = GameStateSnapshot::fixture(1).character;
        character.hp = 250;
        character.hp_max = 100;
        assert!((character.hp_ratio() - 1.0).abs() < 1e-9);

        character.hp_max = 0;
        assert!(character.hp_ratio().abs() < 1e-9);
    }

    #[test]
    fn hostility_depends_on_kind_and_enemy_flag() {
        let json = serde_json::json!([
            { "id": 1, "kind": "monster", "x": 0, "y": 0 },
            { "id": 2, "kind": "player", "x": 0, "y": 0 },
            { "id": 3, "kind": "player", "x": 0, "y": 0, "is_enemy": true },
            { "id": 4, "kind": "npc", "x": 0, "y": 0 },
            { "id": 5, "kind": "homunculus", "x": 0, "y": 0 }
        ]);
        let actors: Vec<Actor> = serde_json::from_value(json).unwrap_or_default();
        let hostile: Vec<bool> = actors.iter().map(Actor::is_hostile).collect();

        assert_eq!(hostile, vec![true, false, true, false, false]);
        assert_eq!(actors.last().map(|a| a.kind), Some(ActorKind::Other));
    }

    #[test]
    fn hostiles_within_uses_character_position() {
        let mut snapshot = GameStateSnapshot::fixture(1);
        snapshot.actors = vec![
            Actor {
                id: ActorId::new(1),
                kind: ActorKind::Monster,
                x: 103,
                y: 104,
                hp: None,
                hp_max: None,
                name: String::new(),
                is_enemy: false,
            },
            Actor {
                id: ActorId::new(2),
                kind: ActorKind::Monster,
                x: 130,
                y: 100,
                hp: None,
                hp_max: None,
                name: String::new(),
                is_enemy: false,
            },
        ];

        let near: Vec<ActorId> = snapshot.hostiles_within(5.0).map(|a| a.id).collect();
        assert_eq!(near, vec![ActorId::new(1)]);
    }

    #[test]
    fn skill_and_buff_lookup_ignore_case() {
        let mut character = GameStateSnapshot::fixture(1).character;
        character.buffs.push(String::from("Blessing"));
        character.skills.push(SkillState {
            id: SkillId::new(5),
            name: String::from("Bash"),
            level: 10,
            cooldown_ms: 0,
            sp_cost: 15,
        });

        assert!(character.has_buff("blessing"));
        assert!(character.skill("BASH").is_some_and(SkillState::is_ready));
        assert!(character.skill("Magnum Break").is_none());
    }
}
