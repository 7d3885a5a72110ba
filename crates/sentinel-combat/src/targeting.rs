//! Target selection.
//!
//! Every hostile within `max_engage_distance` is scored; the highest score
//! wins and exact ties go to the lowest actor id, so the same snapshot
//! always yields the same target.

use std::cmp::Ordering;

use sentinel_types::{Actor, ActorId, GameStateSnapshot};

use crate::config::{RoleProfile, TargetWeights};

/// The chosen target and why.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetChoice<'a> {
    /// The selected hostile.
    pub actor: &'a Actor,
    /// Distance from the character, in cells.
    pub distance: f64,
    /// Winning score.
    pub score: f64,
}

/// Score one hostile at `distance` cells.
///
/// `range/(1 + |d − optimal|) + hp_deficit·(1 − hp_fraction) + boss bonus
/// − overextension penalty + continuity bonus`. Unknown HP counts as full.
pub fn target_score(
    actor: &Actor,
    distance: f64,
    profile: &RoleProfile,
    weights: &TargetWeights,
    previous: Option<ActorId>,
) -> f64 {
    let range_term = weights.range / (1.0 + (distance - profile.optimal_range).abs());
    let deficit_term = weights.hp_deficit * (1.0 - actor.hp_fraction().unwrap_or(1.0));
    let boss_term = if actor.is_boss_class() {
        weights.boss_bonus
    } else {
        0.0
    };
    let overreach = distance - profile.optimal_range - weights.overextension_distance;
    let overextension_term = weights.overextension * overreach.max(0.0);
    let continuity_term = if previous == Some(actor.id) {
        weights.continuity
    } else {
        0.0
    };

    range_term + deficit_term + boss_term - overextension_term + continuity_term
}

/// Pick the best hostile within `max_distance`, or `None`.
pub fn select_target<'a>(
    state: &'a GameStateSnapshot,
    profile: &RoleProfile,
    weights: &TargetWeights,
    max_distance: f64,
    previous: Option<ActorId>,
) -> Option<TargetChoice<'a>> {
    let origin = state.character.position();
    let mut best: Option<TargetChoice<'a>> = None;

    for actor in state.hostiles() {
        let distance = origin.distance(actor.position());
        if distance > max_distance {
            continue;
        }
        let score = target_score(actor, distance, profile, weights, previous);
        let wins = best.is_none_or(|current| match score.total_cmp(&current.score) {
            Ordering::Greater => true,
            Ordering::Equal => actor.id < current.actor.id,
            Ordering::Less => false,
        });
        if wins {
            best = Some(TargetChoice {
                actor,
                distance,
                score,
            });
        }
    }

    best
}
