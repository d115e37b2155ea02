//! Human-mimicry timing and mouse movement.
//!
//! Bot detection keys on mechanical behavior: instant clicks, perfectly
//! straight mouse paths, zero dwell time. Everything here injects the
//! irregularity a real user produces, with Gaussian dwell times and
//! quadratic Bezier mouse paths.

use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::browser::PageDriver;

/// Mouse-path tuning, lifted from the service config at container build.
#[derive(Debug, Clone, Copy)]
pub struct MouseSettings {
    pub bezier_points: usize,
    /// Seconds between intermediate positions.
    pub min_step_delay: f64,
    pub max_step_delay: f64,
    /// Pre-click reaction pause bounds in seconds.
    pub reaction_delay_min: f64,
    pub reaction_delay_max: f64,
}

impl Default for MouseSettings {
    fn default() -> Self {
        Self {
            bezier_points: 20,
            min_step_delay: 0.01,
            max_step_delay: 0.03,
            reaction_delay_min: 0.1,
            reaction_delay_max: 0.3,
        }
    }
}

/// Quadratic Bezier path between two points with a jittered control point.
pub fn bezier_path(start: (f64, f64), end: (f64, f64), num_points: usize) -> Vec<(f64, f64)> {
    let num_points = num_points.max(2);
    let mut rng = rand::rng();
    let control_x = (start.0 + end.0) / 2.0 + rng.random_range(-50.0..=50.0);
    let control_y = (start.1 + end.1) / 2.0 + rng.random_range(-30.0..=30.0);

    (0..num_points)
        .map(|i| {
            let t = i as f64 / (num_points - 1) as f64;
            let inv = 1.0 - t;
            let x = inv * inv * start.0 + 2.0 * inv * t * control_x + t * t * end.0;
            let y = inv * inv * start.1 + 2.0 * inv * t * control_y + t * t * end.1;
            (x, y)
        })
        .collect()
}

/// Gaussian-distributed duration, floored so pathological draws never go
/// negative or absurdly short.
pub fn gaussian_duration(mean_secs: f64, std_secs: f64, floor_secs: f64) -> Duration {
    let mut rng = rand::rng();
    let drawn = Normal::new(mean_secs, std_secs)
        .map(|dist| dist.sample(&mut rng))
        .unwrap_or(mean_secs);
    Duration::from_secs_f64(drawn.max(floor_secs))
}

pub async fn gaussian_delay(mean_secs: f64, std_secs: f64) {
    tokio::time::sleep(gaussian_duration(mean_secs, std_secs, 0.1)).await;
}

/// Per-keystroke dwell: 50-150 ms.
pub fn keystroke_delay() -> Duration {
    let mut rng = rand::rng();
    Duration::from_millis(rng.random_range(50..=150))
}

/// Dwell profile (mean, sigma) in seconds before acting on an element kind.
/// Form fields take the longest; links are snappy.
pub fn element_delay_profile(kind: &str) -> (f64, f64) {
    match kind {
        "link" => (0.2, 0.1),
        "button" => (0.5, 0.2),
        "input" => (0.8, 0.3),
        "select" => (0.6, 0.2),
        "menu" => (0.4, 0.15),
        "media" => (0.3, 0.1),
        _ => (0.5, 0.2),
    }
}

/// Classify the target element and sleep its dwell profile. Falls back to
/// the default profile when the probe fails.
pub async fn element_timing(page: &dyn PageDriver, selector: &str) {
    let kind = page
        .element_kind(selector)
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    let (mean, std) = element_delay_profile(&kind);
    debug!(selector, kind, "element-specific dwell");
    gaussian_delay(mean, std).await;
}

/// Move the mouse to the element's center along a Bezier path, skipping
/// every other point, then pause for reaction time.
pub async fn human_move(
    page: &dyn PageDriver,
    selector: &str,
    settings: &MouseSettings,
) -> Result<()> {
    let Some(bounds) = page.element_box(selector).await? else {
        debug!(selector, "no bounding box for mouse target");
        return Ok(());
    };
    let target = bounds.center();

    let start = {
        let mut rng = rand::rng();
        (
            rng.random_range(100.0..=500.0),
            rng.random_range(100.0..=400.0),
        )
    };

    let path = bezier_path(start, target, settings.bezier_points);
    for point in path.iter().step_by(2) {
        page.mouse_move(point.0, point.1).await?;
        let step = {
            let mut rng = rand::rng();
            rng.random_range(settings.min_step_delay..=settings.max_step_delay)
        };
        tokio::time::sleep(Duration::from_secs_f64(step)).await;
    }

    let reaction = {
        let mut rng = rand::rng();
        rng.random_range(settings.reaction_delay_min..=settings.reaction_delay_max)
    };
    tokio::time::sleep(Duration::from_secs_f64(reaction)).await;
    Ok(())
}

/// Small random movements near the current position.
pub async fn mouse_wiggle(page: &dyn PageDriver, intensity: usize) -> Result<()> {
    let viewport = page.viewport();
    let max_x = (viewport.width as f64 - 100.0).max(101.0);
    let max_y = (viewport.height as f64 - 100.0).max(101.0);
    let (mut x, mut y) = {
        let mut rng = rand::rng();
        (
            rng.random_range(100.0..max_x),
            rng.random_range(100.0..max_y),
        )
    };

    for _ in 0..intensity {
        let (dx, dy, pause) = {
            let mut rng = rand::rng();
            (
                rng.random_range(-20.0..=20.0),
                rng.random_range(-20.0..=20.0),
                rng.random_range(0.05..=0.15),
            )
        };
        x = (x + dx).clamp(0.0, viewport.width as f64);
        y = (y + dy).clamp(0.0, viewport.height as f64);
        page.mouse_move(x, y).await?;
        tokio::time::sleep(Duration::from_secs_f64(pause)).await;
    }
    Ok(())
}

/// Reading pause scaled to content length: ~50 words per 2 seconds with 20%
/// variance. The floor applies to the sampled duration, not the mean, so
/// short snippets keep their short pauses; the cap is the caller's budget.
pub async fn reading_delay(word_count: usize, cap: Duration) {
    let mean = (word_count as f64 / 50.0) * 2.0;
    let duration = gaussian_duration(mean, mean * 0.2, 0.5).min(cap);
    debug!(word_count, ?duration, "reading pause");
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bezier_path_hits_endpoints() {
        let path = bezier_path((0.0, 0.0), (100.0, 50.0), 20);
        assert_eq!(path.len(), 20);
        let first = path.first().copied().unwrap();
        let last = path.last().copied().unwrap();
        assert!((first.0 - 0.0).abs() < 1e-9 && (first.1 - 0.0).abs() < 1e-9);
        assert!((last.0 - 100.0).abs() < 1e-9 && (last.1 - 50.0).abs() < 1e-9);
    }

    #[test]
    fn bezier_path_minimum_two_points() {
        let path = bezier_path((0.0, 0.0), (10.0, 10.0), 0);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn gaussian_duration_respects_floor() {
        for _ in 0..100 {
            let d = gaussian_duration(0.2, 5.0, 0.5);
            assert!(d >= Duration::from_millis(500));
        }
    }

    #[test]
    fn keystroke_delay_bounds() {
        for _ in 0..100 {
            let d = keystroke_delay();
            assert!(d >= Duration::from_millis(50) && d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn element_profiles_cover_known_kinds() {
        assert_eq!(element_delay_profile("link").0, 0.2);
        assert_eq!(element_delay_profile("input").0, 0.8);
        assert_eq!(element_delay_profile("mystery").0, 0.5);
    }
}
