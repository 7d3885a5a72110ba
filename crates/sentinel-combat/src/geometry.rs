//! Grid geometry for retreat movement.

use sentinel_types::Position;

/// Direction used when the character stands exactly on the hostile centroid.
const FALLBACK_DIRECTION: (f64, f64) = (1.0, 0.0);

/// Arithmetic mean of `positions`, or `None` when empty.
pub fn centroid(positions: impl IntoIterator<Item = Position>) -> Option<(f64, f64)> {
    let mut count = 0_u32;
    let (mut sum_x, mut sum_y) = (0.0, 0.0);
    for position in positions {
        sum_x += f64::from(position.x);
        sum_y += f64::from(position.y);
        count = count.saturating_add(1);
    }
    if count == 0 {
        return None;
    }
    let n = f64::from(count);
    Some((sum_x / n, sum_y / n))
}

/// The cell `step` cells from `origin`, directly away from `threat`.
pub fn step_away(origin: Position, threat: (f64, f64), step: f64) -> Position {
    let dx = f64::from(origin.x) - threat.0;
    let dy = f64::from(origin.y) - threat.1;
    let length = dx.hypot(dy);
    let (ux, uy) = if length > f64::EPSILON {
        (dx / length, dy / length)
    } else {
        FALLBACK_DIRECTION
    };
    Position::new(
        offset(origin.x, ux * step),
        offset(origin.y, uy * step),
    )
}

/// `base + delta`, rounded to the nearest cell and saturated to `i32`.
#[allow(clippy::cast_possible_truncation)]
fn offset(base: i32, delta: f64) -> i32 {
    // `as` saturates for out-of-range floats.
    (f64::from(base) + delta).round() as i32
}
