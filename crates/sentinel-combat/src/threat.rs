//! Scalar danger estimate for the current tick.

use sentinel_types::{ActorKind, GameStateSnapshot};

use crate::config::ThreatWeights;

/// Threat score in `[0, 1]` for hostiles within `radius` cells.
///
/// Missing HP, the summed per-kind hostile weights (capped), and the
/// enemy-player term (capped) add up; the total is clamped.
pub fn threat_score(state: &GameStateSnapshot, weights: &ThreatWeights, radius: f64) -> f64 {
    let hp_term = weights.hp * (1.0 - state.character.hp_ratio());

    let mut hostile_sum = 0.0;
    let mut enemy_players = 0_u32;
    for actor in state.hostiles_within(radius) {
        hostile_sum += match actor.kind {
            ActorKind::Monster => weights.monster,
            ActorKind::Boss => weights.boss,
            ActorKind::Mvp => weights.mvp,
            ActorKind::Player | ActorKind::Npc | ActorKind::Other => 0.0,
        };
        if actor.is_enemy_player() {
            enemy_players = enemy_players.saturating_add(1);
        }
    }

    let hostile_term = f64::min(hostile_sum, weights.hostile_cap);
    let pvp_term = f64::min(weights.pvp * f64::from(enemy_players), weights.pvp_cap);

    (hp_term + hostile_term + pvp_term).clamp(0.0, 1.0)
}
