//! Tuning for the tactical controller and the recovery subsystem.
//!
//! Mirrors the `combat` and `recovery` sections of
//! `sentinel-config.yaml`. Every field has a default, so the sections may
//! be omitted entirely.

use sentinel_types::{ItemId, Role};
use serde::Deserialize;

/// Tactical controller settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CombatConfig {
    /// HP ratio at or below which the controller enters emergency mode.
    #[serde(default = "default_emergency_hp_ratio")]
    pub emergency_hp_ratio: f64,

    /// HP ratio at or below which the controller retreats.
    #[serde(default = "default_retreat_hp_ratio")]
    pub retreat_hp_ratio: f64,

    /// Threat score at or above which a wounded character retreats.
    #[serde(default = "default_engage_threat")]
    pub engage_threat: f64,

    /// HP ratio below which high threat forces a retreat.
    #[serde(default = "default_retreat_threat_hp_ratio")]
    pub retreat_threat_hp_ratio: f64,

    /// Retreat from bosses and MVPs when not in a party.
    #[serde(default = "default_true")]
    pub avoid_boss_when_solo: bool,

    /// Prefer area skills when enough hostiles are clustered.
    #[serde(default = "default_true")]
    pub prefer_aoe: bool,

    /// Hostiles around the target needed before an area skill is used.
    #[serde(default = "default_aoe_min_targets")]
    pub aoe_min_targets: usize,

    /// Radius around the target counted for area skills, in cells.
    #[serde(default = "default_aoe_radius")]
    pub aoe_radius: f64,

    /// Cells moved per retreat step.
    #[serde(default = "default_retreat_step")]
    pub retreat_step: f64,

    /// Hostiles within this many cells count towards threat.
    #[serde(default = "default_threat_radius")]
    pub threat_radius: f64,

    /// Hostiles beyond this many cells are never targeted.
    #[serde(default = "default_max_engage_distance")]
    pub max_engage_distance: f64,

    /// Healing items to try in an emergency, best first.
    #[serde(default = "default_healing_items")]
    pub healing_items: Vec<ItemId>,

    /// Threat score weights.
    #[serde(default)]
    pub threat: ThreatWeights,

    /// Target score weights.
    #[serde(default)]
    pub targeting: TargetWeights,

    /// Per-role ranges and skill lists.
    #[serde(default)]
    pub roles: RoleProfiles,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            emergency_hp_ratio: default_emergency_hp_ratio(),
            retreat_hp_ratio: default_retreat_hp_ratio(),
            engage_threat: default_engage_threat(),
            retreat_threat_hp_ratio: default_retreat_threat_hp_ratio(),
            avoid_boss_when_solo: true,
            prefer_aoe: true,
            aoe_min_targets: default_aoe_min_targets(),
            aoe_radius: default_aoe_radius(),
            retreat_step: default_retreat_step(),
            threat_radius: default_threat_radius(),
            max_engage_distance: default_max_engage_distance(),
            healing_items: default_healing_items(),
            threat: ThreatWeights::default(),
            targeting: TargetWeights::default(),
            roles: RoleProfiles::default(),
        }
    }
}

/// Weights of the threat score.
///
/// `threat = hp·(1 − hp_ratio) + min(Σ kind weights, hostile_cap)
///          + min(pvp·enemy_players, pvp_cap)`, clamped to `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThreatWeights {
    /// Weight of missing HP.
    pub hp: f64,
    /// Per ordinary monster.
    pub monster: f64,
    /// Per mini-boss.
    pub boss: f64,
    /// Per MVP.
    pub mvp: f64,
    /// Cap on the summed hostile weights.
    pub hostile_cap: f64,
    /// Per enemy player.
    pub pvp: f64,
    /// Cap on the enemy-player term.
    pub pvp_cap: f64,
}

impl Default for ThreatWeights {
    fn default() -> Self {
        Self {
            hp: 0.4,
            monster: 0.05,
            boss: 0.2,
            mvp: 0.35,
            hostile_cap: 0.4,
            pvp: 0.1,
            pvp_cap: 0.3,
        }
    }
}

/// Weights of the target score.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TargetWeights {
    /// Scale of `1 / (1 + |distance − optimal_range|)`.
    pub range: f64,
    /// Scale of the target's missing HP fraction.
    pub hp_deficit: f64,
    /// Flat bonus for bosses and MVPs.
    pub boss_bonus: f64,
    /// Penalty per cell beyond `overextension_distance`.
    pub overextension: f64,
    /// Cells past the optimal range before the penalty applies.
    pub overextension_distance: f64,
    /// Bonus for staying on last tick's target.
    pub continuity: f64,
}

impl Default for TargetWeights {
    fn default() -> Self {
        Self {
            range: 1.0,
            hp_deficit: 0.5,
            boss_bonus: 0.5,
            overextension: 1.0,
            overextension_distance: 7.0,
            continuity: 0.25,
        }
    }
}

/// Ranges and skill lists for one role. Skills are referenced by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleProfile {
    /// Preferred distance to the target, in cells.
    pub optimal_range: f64,
    /// A hostile this close triggers the defensive skill.
    pub unsafe_distance: f64,
    /// Self-buffs to keep up.
    #[serde(default)]
    pub buffs: Vec<String>,
    /// Protective skills.
    #[serde(default)]
    pub defensive: Vec<String>,
    /// Area skills, cast at the target's cell.
    #[serde(default)]
    pub aoe: Vec<String>,
    /// Single-target skills, best first.
    #[serde(default)]
    pub damage: Vec<String>,
}

impl RoleProfile {
    fn new(
        optimal_range: f64,
        unsafe_distance: f64,
        buffs: &[&str],
        defensive: &[&str],
        aoe: &[&str],
        damage: &[&str],
    ) -> Self {
        let owned = |names: &[&str]| names.iter().map(|&name| name.to_owned()).collect();
        Self {
            optimal_range,
            unsafe_distance,
            buffs: owned(buffs),
            defensive: owned(defensive),
            aoe: owned(aoe),
            damage: owned(damage),
        }
    }
}

/// One [`RoleProfile`] per [`Role`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoleProfiles {
    /// Close-range fighters.
    pub melee: RoleProfile,
    /// Archers and gunners.
    pub ranged: RoleProfile,
    /// Spell casters.
    pub caster: RoleProfile,
    /// Healers and buffers.
    pub support: RoleProfile,
}

impl RoleProfiles {
    /// The profile for `role`.
    pub const fn for_role(&self, role: Role) -> &RoleProfile {
        match role {
            Role::Melee => &self.melee,
            Role::Ranged => &self.ranged,
            Role::Caster => &self.caster,
            Role::Support => &self.support,
        }
    }
}

impl Default for RoleProfiles {
    fn default() -> Self {
        Self {
            melee: RoleProfile::new(
                1.0,
                1.0,
                &["Two-Hand Quicken"],
                &["Endure"],
                &["Magnum Break"],
                &["Bash"],
            ),
            ranged: RoleProfile::new(
                9.0,
                3.0,
                &["Improve Concentration"],
                &["Ankle Snare"],
                &["Arrow Shower"],
                &["Double Strafe"],
            ),
            caster: RoleProfile::new(
                9.0,
                3.0,
                &["Energy Coat"],
                &["Safety Wall"],
                &["Storm Gust"],
                &["Cold Bolt", "Fire Bolt"],
            ),
            support: RoleProfile::new(
                1.0,
                2.0,
                &["Blessing", "Increase AGI"],
                &["Kyrie Eleison"],
                &["Magnus Exorcismus"],
                &["Holy Light"],
            ),
        }
    }
}

/// Recovery subsystem settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Rest when the HP ratio drops below this.
    pub rest_hp_ratio: f64,
    /// Rest when the SP ratio drops below this.
    pub rest_sp_ratio: f64,
    /// Never rest with a hostile this close, in cells.
    pub safe_radius: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            rest_hp_ratio: 0.6,
            rest_sp_ratio: 0.3,
            safe_radius: default_threat_radius(),
        }
    }
}

const fn default_emergency_hp_ratio() -> f64 {
    0.20
}

const fn default_retreat_hp_ratio() -> f64 {
    0.35
}

const fn default_engage_threat() -> f64 {
    0.7
}

const fn default_retreat_threat_hp_ratio() -> f64 {
    0.5
}

const fn default_true() -> bool {
    true
}

const fn default_aoe_min_targets() -> usize {
    3
}

const fn default_aoe_radius() -> f64 {
    2.0
}

const fn default_retreat_step() -> f64 {
    5.0
}

const fn default_threat_radius() -> f64 {
    10.0
}

const fn default_max_engage_distance() -> f64 {
    14.0
}

fn default_healing_items() -> Vec<ItemId> {
    // White, Yellow, Orange, Red Potion.
    [504, 503, 502, 501].into_iter().map(ItemId::new).collect()
}
