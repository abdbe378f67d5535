use serde::{Deserialize, Serialize};

use crate::{AnimationSettings, FlattenedRoute, RouteId};

/// Gap between two consecutive route starts.
///
/// Spreads the routes across whatever is left of the window once the last
/// route's own draw time is subtracted, but never closer than `min_spacing_ms`.
/// The gap is never negative, so offsets never run backwards.
pub fn stagger_interval(count: usize, window_ms: f64, duration_ms: f64, min_spacing_ms: f64) -> f64 {
    let interval = if count == 0 || duration_ms >= window_ms {
        min_spacing_ms
    } else {
        min_spacing_ms.max((window_ms - duration_ms) / count as f64)
    };
    interval.max(0.0)
}

/// Start offsets for `count` routes, in input order.
pub fn stagger_offsets(
    count: usize,
    window_ms: f64,
    duration_ms: f64,
    min_spacing_ms: f64,
) -> Vec<f64> {
    let interval = stagger_interval(count, window_ms, duration_ms, min_spacing_ms);
    (0..count).map(|index| index as f64 * interval).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub route: RouteId,
    pub start_offset_ms: f64,
    pub duration_ms: f64,
}

/// When each route of a campaign starts drawing and for how long.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationPlan {
    entries: Vec<PlanEntry>,
}

impl AnimationPlan {
    pub fn for_routes(routes: &[FlattenedRoute], settings: &AnimationSettings) -> Self {
        let offsets = stagger_offsets(
            routes.len(),
            settings.window_ms,
            settings.duration_ms,
            settings.min_spacing_ms,
        );
        let entries = routes
            .iter()
            .zip(offsets)
            .map(|(route, start_offset_ms)| PlanEntry {
                route: route.id,
                start_offset_ms,
                duration_ms: settings.duration_ms,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn entry(&self, route: RouteId) -> Option<&PlanEntry> {
        self.entries.iter().find(|entry| entry.route == route)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time from campaign start until the last route finishes drawing.
    pub fn total_ms(&self) -> f64 {
        self.entries
            .iter()
            .map(|entry| entry.start_offset_ms + entry.duration_ms)
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use geo::Coord;

    use super::*;
    use crate::RouteFeature;

    fn routes(ids: &[usize]) -> Vec<FlattenedRoute> {
        ids.iter()
            .map(|&id| {
                RouteFeature::single(id, vec![Coord { x: 0.0, y: 0.0 }])
                    .flatten()
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn spreads_routes_across_remaining_window() {
        assert_eq!(stagger_offsets(3, 3000.0, 1500.0, 200.0), vec![0.0, 500.0, 1000.0]);
    }

    #[test]
    fn spacing_floor_applies_when_window_is_crowded() {
        let offsets = stagger_offsets(10, 3000.0, 1500.0, 200.0);
        assert_eq!(offsets[1], 200.0);
        assert_eq!(offsets[9], 1800.0);
    }

    #[test]
    fn duration_longer_than_window_collapses_to_floor() {
        assert_eq!(stagger_offsets(3, 1000.0, 1500.0, 250.0), vec![0.0, 250.0, 500.0]);
        assert_eq!(stagger_offsets(2, 1000.0, 1000.0, 100.0), vec![0.0, 100.0]);
    }

    #[test]
    fn negative_spacing_never_yields_negative_offsets() {
        assert_eq!(stagger_offsets(3, 1000.0, 1500.0, -50.0), vec![0.0, 0.0, 0.0]);
        assert_eq!(stagger_offsets(2, 1000.0, 200.0, -50.0), vec![0.0, 400.0]);
        assert_eq!(stagger_interval(4, 1000.0, 1000.0, f64::NAN), 0.0);
    }

    #[test]
    fn no_routes_means_no_offsets() {
        assert!(stagger_offsets(0, 3000.0, 1500.0, 200.0).is_empty());
    }

    #[test]
    fn offsets_are_non_decreasing_and_start_at_zero() {
        for count in 1..40 {
            let offsets = stagger_offsets(count, 20_000.0, 3_000.0, 150.0);
            assert_eq!(offsets[0], 0.0);
            let interval = stagger_interval(count, 20_000.0, 3_000.0, 150.0);
            for (index, pair) in offsets.windows(2).enumerate() {
                assert!(pair[0] <= pair[1]);
                assert_eq!(pair[1], (index + 1) as f64 * interval);
            }
        }
    }

    #[test]
    fn plan_follows_route_order() {
        let settings = AnimationSettings {
            window_ms: 3000.0,
            duration_ms: 1500.0,
            min_spacing_ms: 200.0,
        };
        let plan = AnimationPlan::for_routes(&routes(&[4, 0, 9]), &settings);

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.entry(RouteId(9)).unwrap().start_offset_ms, 1000.0);
        assert_eq!(plan.entry(RouteId(4)).unwrap().start_offset_ms, 0.0);
        assert!(plan.entry(RouteId(1)).is_none());
        assert_eq!(plan.total_ms(), 2500.0);
    }
}
