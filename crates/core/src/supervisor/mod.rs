use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use geojson::{GeoJson, Geometry, Value};

use crate::{
    animator::{animated_layer_id, animated_source_id, AnimatorPhase, CancelToken, RouteAnimator},
    geometry::{flatten_all, FlattenReport},
    render::{RenderError, RenderService},
    style::{animated_layer_style, category_color, category_palette},
    timeline::FrameClock,
    AnimationPlan, AnimationSettings, FlattenedRoute, RevealError, Result, RouteFeature, RouteId,
};

/// Id of the layer drawing every route without animation.
pub const STATIC_ROUTE_LAYER: &str = "routes";

/// Counts of animators by phase after a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl TickSummary {
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}

/// Owns every route animator of a campaign and the registry of their
/// cancellation tokens.
///
/// Time only moves when the host calls [`AnimationSupervisor::tick`], once per
/// rendered frame.
#[derive(Debug)]
pub struct AnimationSupervisor<R, C> {
    renderer: R,
    clock: C,
    settings: AnimationSettings,
    static_layer: String,
    registry: HashMap<RouteId, CancelToken>,
    animators: Vec<RouteAnimator>,
    routes: Vec<Arc<FlattenedRoute>>,
    campaign_active: bool,
}

impl<R: RenderService, C: FrameClock> AnimationSupervisor<R, C> {
    pub fn new(renderer: R, clock: C, settings: AnimationSettings) -> Self {
        Self {
            renderer,
            clock,
            settings,
            static_layer: STATIC_ROUTE_LAYER.to_string(),
            registry: HashMap::new(),
            animators: Vec::new(),
            routes: Vec::new(),
            campaign_active: false,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    pub fn duration_ms(&self) -> f64 {
        self.settings.duration_ms
    }

    /// Number of routes that are pending or running.
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_registered(&self, route: RouteId) -> bool {
        self.registry.contains_key(&route)
    }

    pub fn is_campaign_active(&self) -> bool {
        self.campaign_active
    }

    pub fn phase_of(&self, route: RouteId) -> Option<AnimatorPhase> {
        self.animators
            .iter()
            .rev()
            .find(|animator| animator.route_id() == route)
            .map(|animator| animator.phase())
    }

    pub fn revealed(&self, route: RouteId) -> Option<usize> {
        self.animators
            .iter()
            .rev()
            .find(|animator| animator.route_id() == route)
            .map(|animator| animator.revealed())
    }

    /// Schedules a reveal for every route that has an entry in `plan`.
    ///
    /// Tokens are registered right away, so a [`stop_all`](Self::stop_all)
    /// during the stagger delay keeps a route from ever activating. Routes
    /// that are already registered are left untouched.
    pub fn start(&mut self, routes: Vec<FlattenedRoute>, plan: &AnimationPlan) {
        let now = self.clock.now_ms();
        let mut scheduled = 0;
        // Nothing left registered means earlier routes finished or were
        // stopped; only the routes of this call belong to the campaign.
        if self.registry.is_empty() {
            self.routes.clear();
        }

        for route in routes {
            let Some(entry) = plan.entry(route.id) else {
                tracing::debug!(route = route.id.0, "route has no plan entry");
                continue;
            };
            if self.registry.contains_key(&route.id) {
                tracing::debug!(route = route.id.0, "route already animating");
                continue;
            }

            let route = Arc::new(route);
            let token = CancelToken::new();
            self.registry.insert(route.id, token.clone());
            self.animators.push(RouteAnimator::new(
                route.clone(),
                now + entry.start_offset_ms,
                entry.duration_ms,
                token,
            ));
            self.routes.retain(|known| known.id != route.id);
            self.routes.push(route);
            scheduled += 1;
        }

        if scheduled == 0 {
            return;
        }

        if !self.campaign_active {
            self.set_static_visibility(false);
            self.campaign_active = true;
        }
        tracing::info!(routes = scheduled, duration_ms = self.settings.duration_ms, "route campaign started");
    }

    /// Flattens `features`, plans them with the current settings and starts
    /// the campaign. Routes that cannot be drawn are logged and skipped.
    pub fn start_collection(&mut self, features: &[RouteFeature]) -> FlattenReport {
        let report = flatten_all(features);
        let plan = AnimationPlan::for_routes(&report.routes, &self.settings);
        self.start(report.routes.clone(), &plan);
        report
    }

    /// Cancels every pending and running route and shows the static layer
    /// again. Calling it without an active campaign does nothing.
    pub fn stop_all(&mut self) {
        if !self.campaign_active {
            return;
        }

        let cancelled = self.registry.len();
        for (_, token) in self.registry.drain() {
            token.cancel();
        }

        self.set_static_visibility(true);
        self.campaign_active = false;
        tracing::info!(cancelled, "route campaign stopped");
    }

    /// Changes the per-route draw duration. A campaign with routes still
    /// pending or running restarts from the beginning with the new duration
    /// instead of being retimed in flight.
    pub fn set_speed(&mut self, duration_seconds: f64) -> Result<()> {
        let duration_ms = duration_seconds * 1000.0;
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(RevealError::config(format!(
                "draw duration must be a non-negative number of seconds, got {duration_seconds}"
            )));
        }

        self.settings.duration_ms = duration_ms;
        tracing::info!(duration_ms, "route draw duration changed");

        if self.registry.is_empty() {
            return Ok(());
        }

        let routes: Vec<FlattenedRoute> = self
            .routes
            .iter()
            .map(|route| (**route).clone())
            .collect();
        self.stop_all();
        let plan = AnimationPlan::for_routes(&routes, &self.settings);
        self.start(routes, &plan);
        Ok(())
    }

    /// Advances every animator to the current clock time.
    pub fn tick(&mut self) -> TickSummary {
        let now = self.clock.now_ms();
        let mut summary = TickSummary::default();

        for index in 0..self.animators.len() {
            let animator = &self.animators[index];
            let route = animator.route_id();
            let activating = animator.phase() == AnimatorPhase::Pending
                && animator.is_due(now)
                && animator.token().is_live();

            if activating {
                match self.provision(route) {
                    Ok(()) => tracing::debug!(route = route.0, "route reveal activated"),
                    Err(err) => {
                        tracing::warn!(route = route.0, %err, "could not create animated layer");
                        self.animators[index].fail();
                    }
                }
            }

            let phase = self.animators[index].tick(now, &mut self.renderer);
            match phase {
                AnimatorPhase::Pending => summary.pending += 1,
                AnimatorPhase::Running => summary.running += 1,
                AnimatorPhase::Completed => {
                    tracing::debug!(route = route.0, "route reveal completed");
                    summary.completed += 1;
                }
                AnimatorPhase::Cancelled => summary.cancelled += 1,
                AnimatorPhase::Failed => summary.failed += 1,
            }

            if phase.is_finished() {
                self.deregister(index);
            }
        }

        self.animators.retain(|animator| !animator.phase().is_finished());
        summary
    }

    /// Wraps the supervisor into a cloneable handle for developer tooling.
    pub fn handle(self) -> SupervisorHandle<R, C> {
        SupervisorHandle {
            shared: Arc::new(Mutex::new(self)),
        }
    }

    /// Drops the registry entry owned by the animator at `index`. A restart
    /// may already have registered a newer token for the same route.
    fn deregister(&mut self, index: usize) {
        let animator = &self.animators[index];
        let route = animator.route_id();
        if self
            .registry
            .get(&route)
            .is_some_and(|token| token.same_as(animator.token()))
        {
            self.registry.remove(&route);
        }
    }

    fn provision(&mut self, route: RouteId) -> std::result::Result<(), RenderError> {
        let source = animated_source_id(route);
        if self.renderer.has_source(&source) {
            return Ok(());
        }

        let palette = category_palette(self.routes.iter().filter_map(|r| r.properties.kind.as_deref()));
        let color = self
            .routes
            .iter()
            .find(|r| r.id == route)
            .and_then(|r| r.properties.kind.as_deref())
            .map(|kind| category_color(&palette, Some(kind)));

        let empty = GeoJson::Geometry(Geometry::new(Value::LineString(Vec::new())));
        self.renderer.create_source(&source, empty)?;
        self.renderer
            .create_layer(&animated_layer_id(route), &source, animated_layer_style(color))
    }

    fn set_static_visibility(&mut self, visible: bool) {
        if let Err(err) = self.renderer.set_layer_visibility(&self.static_layer, visible) {
            tracing::debug!(layer = %self.static_layer, %err, "static route layer unavailable");
        }
    }
}

/// Shared, thread-safe view over an [`AnimationSupervisor`], handed to
/// developer tooling for manual control.
pub struct SupervisorHandle<R, C> {
    shared: Arc<Mutex<AnimationSupervisor<R, C>>>,
}

impl<R, C> Clone for SupervisorHandle<R, C> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<R: RenderService, C: FrameClock> SupervisorHandle<R, C> {
    pub fn start_collection(&self, features: &[RouteFeature]) -> Result<FlattenReport> {
        Ok(self.lock()?.start_collection(features))
    }

    pub fn stop_all(&self) -> Result<()> {
        self.lock()?.stop_all();
        Ok(())
    }

    pub fn set_speed(&self, duration_seconds: f64) -> Result<()> {
        self.lock()?.set_speed(duration_seconds)
    }

    pub fn tick(&self) -> Result<TickSummary> {
        Ok(self.lock()?.tick())
    }

    pub fn is_animating(&self) -> Result<bool> {
        Ok(self.lock()?.active_count() > 0)
    }

    /// Runs `f` with exclusive access to the supervisor.
    pub fn with<T>(&self, f: impl FnOnce(&mut AnimationSupervisor<R, C>) -> T) -> Result<T> {
        Ok(f(&mut *self.lock()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, AnimationSupervisor<R, C>>> {
        self.shared
            .lock()
            .map_err(|_| RevealError::msg("animation supervisor has been poisoned"))
    }
}

impl<R, C> std::fmt::Debug for SupervisorHandle<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle").finish()
    }
}

#[cfg(test)]
mod tests {
    use geo::Coord;

    use super::*;
    use crate::{
        geometry::{GeometryKind, RouteProperties},
        render::RecordingRenderer,
        style::route_layer_style,
        timeline::SimulatedClock,
    };

    fn settings() -> AnimationSettings {
        AnimationSettings {
            window_ms: 3000.0,
            duration_ms: 1500.0,
            min_spacing_ms: 200.0,
        }
    }

    fn feature(id: usize, len: usize) -> RouteFeature {
        RouteFeature::single(
            id,
            (0..len)
                .map(|i| Coord {
                    x: id as f64 + i as f64 * 0.01,
                    y: 40.0,
                })
                .collect(),
        )
    }

    fn renderer_with_static_layer() -> RecordingRenderer {
        let mut renderer = RecordingRenderer::new();
        renderer
            .create_source(STATIC_ROUTE_LAYER, GeoJson::Geometry(Geometry::new(Value::LineString(Vec::new()))))
            .unwrap();
        renderer
            .create_layer(STATIC_ROUTE_LAYER, STATIC_ROUTE_LAYER, route_layer_style())
            .unwrap();
        renderer
    }

    fn supervisor() -> (AnimationSupervisor<RecordingRenderer, SimulatedClock>, SimulatedClock) {
        let clock = SimulatedClock::new();
        let supervisor = AnimationSupervisor::new(renderer_with_static_layer(), clock.clone(), settings());
        (supervisor, clock)
    }

    fn publishes(
        supervisor: &AnimationSupervisor<RecordingRenderer, SimulatedClock>,
        route: usize,
    ) -> Vec<usize> {
        supervisor
            .renderer()
            .updates_for(&animated_source_id(RouteId(route)))
            .filter_map(|update| update.line_len())
            .collect()
    }

    fn static_visible(supervisor: &AnimationSupervisor<RecordingRenderer, SimulatedClock>) -> bool {
        supervisor.renderer().layer(STATIC_ROUTE_LAYER).unwrap().visible
    }

    #[test]
    fn staggered_campaign_reveals_routes_over_time() {
        let (mut supervisor, clock) = supervisor();
        let report = supervisor.start_collection(&[feature(0, 10), feature(1, 10), feature(2, 10)]);
        assert_eq!(report.routes.len(), 3);
        assert!(!static_visible(&supervisor));

        supervisor.tick();
        assert_eq!(supervisor.revealed(RouteId(0)), Some(1));
        assert_eq!(supervisor.phase_of(RouteId(1)), Some(AnimatorPhase::Pending));

        clock.set(500.0);
        supervisor.tick();
        assert_eq!(supervisor.revealed(RouteId(0)), Some(3));
        assert_eq!(supervisor.revealed(RouteId(1)), Some(1));
        assert_eq!(supervisor.phase_of(RouteId(2)), Some(AnimatorPhase::Pending));

        clock.set(1000.0);
        supervisor.tick();
        assert_eq!(supervisor.revealed(RouteId(0)), Some(6));
        assert_eq!(supervisor.revealed(RouteId(1)), Some(3));
        assert_eq!(supervisor.revealed(RouteId(2)), Some(1));

        clock.set(1500.0);
        let summary = supervisor.tick();
        assert_eq!(summary.completed, 1);
        assert!(!supervisor.is_registered(RouteId(0)));
        assert_eq!(publishes(&supervisor, 0).last(), Some(&10));
        assert_eq!(supervisor.revealed(RouteId(1)), Some(6));
        assert_eq!(supervisor.revealed(RouteId(2)), Some(3));

        clock.set(2500.0);
        let summary = supervisor.tick();
        assert_eq!(summary.completed, 2);
        assert!(summary.is_idle());
        assert_eq!(supervisor.active_count(), 0);
        // The static layer stays hidden until the campaign is stopped.
        assert!(!static_visible(&supervisor));
    }

    #[test]
    fn publishes_grow_monotonically() {
        let (mut supervisor, clock) = supervisor();
        supervisor.start_collection(&[feature(0, 25)]);
        for _ in 0..120 {
            supervisor.tick();
            clock.advance(16.0);
        }

        let lens = publishes(&supervisor, 0);
        assert!(lens.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(lens.first(), Some(&1));
        assert_eq!(lens.last(), Some(&25));
        assert_eq!(lens.iter().filter(|&&len| len == 25).count(), 1);
    }

    #[test]
    fn stopping_during_stagger_prevents_activation() {
        let (mut supervisor, clock) = supervisor();
        supervisor.start_collection(&[feature(0, 10), feature(1, 10), feature(2, 10)]);
        supervisor.tick();

        clock.set(200.0);
        supervisor.stop_all();
        assert_eq!(supervisor.active_count(), 0);
        assert!(static_visible(&supervisor));

        clock.set(2000.0);
        let summary = supervisor.tick();
        assert_eq!(summary.cancelled, 3);
        assert!(publishes(&supervisor, 1).is_empty());
        assert!(publishes(&supervisor, 2).is_empty());
        assert!(!supervisor.renderer().has_source(&animated_source_id(RouteId(2))));
        // Route 0 stays frozen at what it last showed.
        assert_eq!(publishes(&supervisor, 0), vec![1]);
    }

    #[test]
    fn stop_all_is_idempotent() {
        let (mut supervisor, _clock) = supervisor();
        supervisor.stop_all();
        assert!(static_visible(&supervisor));

        supervisor.start_collection(&[feature(0, 10)]);
        supervisor.stop_all();
        supervisor.stop_all();
        assert!(!supervisor.is_campaign_active());
        assert!(static_visible(&supervisor));
        assert!(supervisor.tick().is_idle());
    }

    #[test]
    fn set_speed_restarts_active_campaign() {
        let (mut supervisor, clock) = supervisor();
        supervisor.start_collection(&[feature(0, 10), feature(1, 10)]);
        supervisor.tick();
        clock.set(1000.0);
        supervisor.tick();
        assert_eq!(supervisor.revealed(RouteId(0)), Some(6));

        supervisor.set_speed(0.5).unwrap();
        assert_eq!(supervisor.duration_ms(), 500.0);
        assert_eq!(supervisor.active_count(), 2);
        assert!(!static_visible(&supervisor));

        let summary = supervisor.tick();
        assert_eq!(summary.cancelled, 2);
        assert_eq!(supervisor.revealed(RouteId(0)), Some(1));

        // (3000 - 500) / 2 = 1250 between starts.
        clock.set(1500.0);
        supervisor.tick();
        assert!(!supervisor.is_registered(RouteId(0)));
        assert_eq!(supervisor.phase_of(RouteId(1)), Some(AnimatorPhase::Pending));
    }

    #[test]
    fn set_speed_restarts_only_the_latest_routes() {
        let (mut supervisor, clock) = supervisor();
        supervisor.start_collection(&[feature(0, 10), feature(1, 10), feature(2, 10)]);
        for at in [0.0, 500.0, 1000.0, 1500.0, 2500.0] {
            clock.set(at);
            supervisor.tick();
        }
        assert_eq!(supervisor.active_count(), 0);
        assert_eq!(publishes(&supervisor, 2).last(), Some(&10));

        supervisor.start_collection(&[feature(0, 10)]);
        supervisor.set_speed(1.0).unwrap();

        assert_eq!(supervisor.active_count(), 1);
        assert!(supervisor.is_registered(RouteId(0)));
        assert!(!supervisor.is_registered(RouteId(1)));
        assert!(!supervisor.is_registered(RouteId(2)));
    }

    #[test]
    fn set_speed_without_campaign_only_updates_duration() {
        let (mut supervisor, _clock) = supervisor();
        supervisor.set_speed(2.0).unwrap();
        assert_eq!(supervisor.duration_ms(), 2000.0);
        assert!(!supervisor.is_campaign_active());
        assert!(supervisor.set_speed(-1.0).is_err());
        assert_eq!(supervisor.duration_ms(), 2000.0);
    }

    #[test]
    fn torn_down_route_does_not_affect_others() {
        let (mut supervisor, clock) = supervisor();
        supervisor.start(
            vec![feature(0, 10).flatten().unwrap(), feature(1, 10).flatten().unwrap()],
            &AnimationPlan::for_routes(
                &[feature(0, 10).flatten().unwrap(), feature(1, 10).flatten().unwrap()],
                &AnimationSettings {
                    window_ms: 0.0,
                    duration_ms: 1000.0,
                    min_spacing_ms: 0.0,
                },
            ),
        );
        supervisor.tick();
        supervisor
            .renderer_mut()
            .remove_source(&animated_source_id(RouteId(0)));

        clock.set(500.0);
        let summary = supervisor.tick();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.running, 1);
        assert!(!supervisor.is_registered(RouteId(0)));
        assert_eq!(supervisor.revealed(RouteId(1)), Some(5));
    }

    #[test]
    fn invalid_routes_are_never_animated() {
        let (mut supervisor, _clock) = supervisor();
        let polygon = RouteFeature {
            id: RouteId(1),
            kind: GeometryKind::Other("Polygon".to_string()),
            segments: vec![vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }]],
            properties: RouteProperties::default(),
        };
        let report = supervisor.start_collection(&[feature(0, 4), polygon, feature(2, 4)]);

        assert_eq!(report.skipped, vec![RouteId(1)]);
        assert_eq!(supervisor.active_count(), 2);
        assert!(!supervisor.is_registered(RouteId(1)));
        assert_eq!(supervisor.phase_of(RouteId(1)), None);
    }

    #[test]
    fn starting_registered_routes_again_is_ignored() {
        let (mut supervisor, _clock) = supervisor();
        supervisor.start_collection(&[feature(0, 10)]);
        supervisor.start_collection(&[feature(0, 10)]);
        supervisor.tick();

        assert_eq!(supervisor.active_count(), 1);
        assert_eq!(publishes(&supervisor, 0), vec![1]);
    }

    #[test]
    fn empty_collection_does_not_start_a_campaign() {
        let (mut supervisor, _clock) = supervisor();
        supervisor.start_collection(&[]);
        assert!(!supervisor.is_campaign_active());
        assert!(static_visible(&supervisor));
    }

    #[test]
    fn handle_is_usable_from_another_thread() {
        let (supervisor, clock) = supervisor();
        let handle = supervisor.handle();
        handle.start_collection(&[feature(0, 10), feature(1, 10)]).unwrap();

        let remote = handle.clone();
        let worker = std::thread::spawn(move || {
            let summary = remote.tick()?;
            remote.stop_all()?;
            Ok::<_, RevealError>(summary)
        });
        let summary = worker.join().unwrap().unwrap();
        assert_eq!(summary.running, 1);
        assert_eq!(summary.pending, 1);

        clock.advance(100.0);
        assert_eq!(handle.tick().unwrap().cancelled, 2);
        assert!(!handle.is_animating().unwrap());
        assert!(handle.with(|s| static_visible(s)).unwrap());
    }

    #[test]
    fn poisoned_handle_reports_errors() {
        let (supervisor, _clock) = supervisor();
        let handle = supervisor.handle();

        let crashing = handle.clone();
        let outcome = std::thread::spawn(move || {
            let _: Result<()> = crashing.with(|_| panic!("frame callback crashed"));
        })
        .join();
        assert!(outcome.is_err());

        assert!(matches!(handle.tick(), Err(RevealError::Message(_))));
        assert!(matches!(handle.stop_all(), Err(RevealError::Message(_))));
        assert!(matches!(handle.set_speed(1.0), Err(RevealError::Message(_))));
    }

    #[test]
    fn handle_controls_the_shared_supervisor() {
        let (supervisor, clock) = supervisor();
        let handle = supervisor.handle();
        let tooling = handle.clone();

        handle.start_collection(&[feature(0, 10), feature(1, 10)]).unwrap();
        handle.tick().unwrap();
        assert!(tooling.is_animating().unwrap());

        tooling.set_speed(1.0).unwrap();
        assert_eq!(handle.with(|s| s.duration_ms()).unwrap(), 1000.0);

        tooling.stop_all().unwrap();
        clock.advance(100.0);
        handle.tick().unwrap();
        assert!(!handle.is_animating().unwrap());
    }
}
