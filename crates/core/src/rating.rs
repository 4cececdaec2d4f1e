//! World rating arithmetic.
//!
//! Worlds carry a public running average on a 1–5 scale. Profiles that have
//! never been rated bootstrap from their authored star count with a synthetic
//! review count, so a single session cannot swing the average wildly.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::profile::World;

pub const BOOTSTRAP_COUNT: u32 = 10;
pub const DEFAULT_RATING: f64 = 3.0;
pub const DEFAULT_STARS: u8 = 3;

// "4/5", "4／5", "4★", "4 stars"
static RATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([1-5])\s*(?:[/／★]|[Ss]tars?)").unwrap());
static LONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b([1-5])\b").unwrap());

/// Before/after snapshot of one rating update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingChange {
    pub old: f64,
    pub new: f64,
    pub count: u32,
}

/// Extracts a 1–5 star count from free-form evaluator text.
///
/// Tries, in order: a digit qualified by a separator or the word "stars",
/// a lone digit, and finally a literal run of `★`. Anything else is the
/// neutral default of 3.
pub fn parse_stars(text: &str) -> u8 {
    if let Some(caps) = RATED_RE.captures(text) {
        if let Some(digit) = caps.get(1).and_then(|m| m.as_str().parse::<u8>().ok()) {
            return digit;
        }
    }
    if let Some(caps) = LONE_RE.captures(text) {
        if let Some(digit) = caps.get(1).and_then(|m| m.as_str().parse::<u8>().ok()) {
            return digit;
        }
    }
    let filled = text.chars().filter(|c| *c == '★').count();
    if filled > 0 {
        return (filled.min(5)) as u8;
    }
    DEFAULT_STARS
}

pub fn clamp_satisfaction(score: u8) -> u8 {
    score.clamp(1, 5)
}

/// Current average and review count, bootstrapping unrated worlds from their
/// authored stars.
fn derive_initial(world: &World) -> (f64, u32) {
    let rating = world
        .current_rating
        .or_else(|| world.stars.map(|s| s.clamp(1.0, 5.0)))
        .unwrap_or(DEFAULT_RATING);
    let count = world.rating_count.unwrap_or(BOOTSTRAP_COUNT);
    (rating, count)
}

/// Folds one satisfaction score into the world's running average, rounding
/// the stored value to two decimal places.
pub fn apply(world: &mut World, satisfaction: u8) -> RatingChange {
    let score = clamp_satisfaction(satisfaction) as f64;
    let (old, count) = derive_initial(world);
    let new = ((old * count as f64 + score) / (count + 1) as f64 * 100.0).round() / 100.0;
    world.current_rating = Some(new);
    world.rating_count = Some(count + 1);
    RatingChange {
        old,
        new,
        count: count + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn unrated() -> World {
        World::default()
    }

    #[test]
    fn test_bootstrap_five_star_review() {
        let mut world = unrated();
        let change = apply(&mut world, 5);
        assert_abs_diff_eq!(change.old, 3.0);
        assert_abs_diff_eq!(change.new, 3.18);
        assert_eq!(change.count, 11);
    }

    #[test]
    fn test_satisfaction_clamped_into_band() {
        let mut low = unrated();
        let mut high = unrated();
        // 0 behaves as 1, 6 behaves as 5.
        let as_zero = apply(&mut low, 0);
        let as_six = apply(&mut high, 6);

        let mut one = unrated();
        let mut five = unrated();
        assert_abs_diff_eq!(as_zero.new, apply(&mut one, 1).new);
        assert_abs_diff_eq!(as_six.new, apply(&mut five, 5).new);
    }

    #[test]
    fn test_authored_stars_seed_the_average() {
        let mut world = World {
            stars: Some(4.5),
            ..World::default()
        };
        let change = apply(&mut world, 5);
        assert_abs_diff_eq!(change.old, 4.5);
        // (4.5 * 10 + 5) / 11 = 4.5454... -> 4.55
        assert_abs_diff_eq!(change.new, 4.55);
    }

    #[test]
    fn test_out_of_band_authored_stars_clamped() {
        let mut inflated = World {
            stars: Some(8.0),
            ..World::default()
        };
        assert_abs_diff_eq!(apply(&mut inflated, 3).old, 5.0);

        let mut deflated = World {
            stars: Some(0.2),
            ..World::default()
        };
        assert_abs_diff_eq!(apply(&mut deflated, 3).old, 1.0);
    }

    #[test]
    fn test_repeated_perfect_scores_converge_upward() {
        let mut world = unrated();
        for _ in 0..200 {
            let change = apply(&mut world, 5);
            assert!(change.new >= 1.0 && change.new <= 5.0);
        }
        assert!(world.current_rating.expect("rated") > 4.9);
        assert_eq!(world.rating_count, Some(210));
    }

    #[test]
    fn test_parse_stars_variants() {
        assert_eq!(parse_stars("5/5"), 5);
        assert_eq!(parse_stars("3 / 5"), 3);
        assert_eq!(parse_stars("1／5"), 1);
        assert_eq!(parse_stars("2 stars"), 2);
        assert_eq!(parse_stars("4★の評価です"), 4);
        assert_eq!(parse_stars("★★★★☆"), 4);
        assert_eq!(parse_stars("★★★★★★★"), 5);
        assert_eq!(parse_stars("satisfaction: 4"), 4);
        assert_eq!(parse_stars("いまいちでした"), 3);
        assert_eq!(parse_stars(""), 3);
    }
}
