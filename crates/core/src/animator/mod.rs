use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use geojson::{GeoJson, Geometry, Value};

use crate::{
    render::{RenderError, RenderService},
    FlattenedRoute, RouteId,
};

/// Number of coordinates visible after `elapsed_ms` of a `duration_ms` reveal.
/// Always at least one, so a route shows its first point immediately.
pub fn reveal_count(elapsed_ms: f64, duration_ms: f64, total: usize) -> usize {
    let progress = progress_fraction(elapsed_ms, duration_ms);
    ((progress * total as f64).floor() as usize).clamp(1, total.max(1))
}

fn progress_fraction(elapsed_ms: f64, duration_ms: f64) -> f64 {
    if duration_ms <= 0.0 {
        return 1.0;
    }
    (elapsed_ms / duration_ms).clamp(0.0, 1.0)
}

/// Liveness flag shared between an animator and the supervisor registry.
#[derive(Debug, Clone)]
pub struct CancelToken {
    live: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn cancel(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Whether both tokens control the same animation.
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.live, &other.live)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatorPhase {
    Pending,
    Running,
    Completed,
    Cancelled,
    /// A publish was rejected by the rendering service.
    Failed,
}

impl AnimatorPhase {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Source and layer ids dedicated to one animated route.
pub fn animated_source_id(route: RouteId) -> String {
    format!("route-anim-src-{}", route.0)
}

pub fn animated_layer_id(route: RouteId) -> String {
    format!("route-anim-{}", route.0)
}

/// Progressive reveal of a single route.
#[derive(Debug)]
pub struct RouteAnimator {
    route: Arc<FlattenedRoute>,
    source_id: String,
    duration_ms: f64,
    activate_at_ms: f64,
    anchor_ms: Option<f64>,
    revealed: usize,
    phase: AnimatorPhase,
    token: CancelToken,
}

impl RouteAnimator {
    pub fn new(
        route: Arc<FlattenedRoute>,
        activate_at_ms: f64,
        duration_ms: f64,
        token: CancelToken,
    ) -> Self {
        Self {
            source_id: animated_source_id(route.id),
            route,
            duration_ms,
            activate_at_ms,
            anchor_ms: None,
            revealed: 0,
            phase: AnimatorPhase::Pending,
            token,
        }
    }

    pub fn route_id(&self) -> RouteId {
        self.route.id
    }

    pub fn phase(&self) -> AnimatorPhase {
        self.phase
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Marks the animator inactive without publishing anything.
    pub fn fail(&mut self) {
        if !self.phase.is_finished() {
            self.phase = AnimatorPhase::Failed;
        }
    }

    /// Whether the stagger delay has elapsed at `now_ms`.
    pub fn is_due(&self, now_ms: f64) -> bool {
        now_ms >= self.activate_at_ms
    }

    /// Advances the animation to `now_ms` and returns the resulting phase.
    ///
    /// A pending animator stays pending until it is due. Once running, each
    /// call publishes at most one geometry. Publish failures are logged and
    /// turn the animator inactive; they are never returned to the caller.
    pub fn tick<R: RenderService + ?Sized>(&mut self, now_ms: f64, renderer: &mut R) -> AnimatorPhase {
        if self.phase.is_finished() {
            return self.phase;
        }
        if !self.token.is_live() {
            self.phase = AnimatorPhase::Cancelled;
            return self.phase;
        }
        if self.phase == AnimatorPhase::Pending {
            if !self.is_due(now_ms) {
                return self.phase;
            }
            self.phase = AnimatorPhase::Running;
        }

        let anchor = *self.anchor_ms.get_or_insert(now_ms);
        let total = self.route.len();
        let elapsed = now_ms - anchor;
        let count = reveal_count(elapsed, self.duration_ms, total).max(self.revealed);
        let complete = progress_fraction(elapsed, self.duration_ms) >= 1.0 || count >= total;

        let visible = if complete { total } else { count };
        if let Err(err) = self.publish(visible, renderer) {
            tracing::warn!(route = self.route.id.0, %err, "publishing route frame failed");
            self.phase = AnimatorPhase::Failed;
            return self.phase;
        }

        self.revealed = visible;
        if complete {
            self.phase = AnimatorPhase::Completed;
        }
        self.phase
    }

    fn publish<R: RenderService + ?Sized>(
        &self,
        count: usize,
        renderer: &mut R,
    ) -> Result<(), RenderError> {
        let positions = self
            .route
            .prefix(count)
            .iter()
            .map(|coord| vec![coord.x, coord.y])
            .collect();
        let data = GeoJson::Geometry(Geometry::new(Value::LineString(positions)));
        renderer.update_source_data(&self.source_id, data)
    }
}
