//! Core library for staggered route reveal animations.
//!
//! Routes loaded from GeoJSON are flattened into single paths, given start
//! offsets spread across a campaign window, and then drawn progressively, one
//! growing line per route, into an abstract rendering service. Each module
//! owns one step of that pipeline; the supervisor ties them together and is
//! driven by the host once per rendered frame.

pub mod animator;
pub mod config;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod render;
pub mod scene;
pub mod schedule;
pub mod style;
pub mod supervisor;
pub mod timeline;

pub use animator::{reveal_count, AnimatorPhase, CancelToken, RouteAnimator};
pub use config::{AnimationSettings, DataConfig, MapConfig, RevealConfig};
pub use error::{Result, RevealError};
pub use geometry::{
    flatten_all, FlattenReport, FlattenedRoute, GeometryKind, RouteFeature, RouteId, RouteProperties,
};
pub use loader::{load_feature_collection, point_features, route_features, PointFeature};
pub use render::{RecordingRenderer, RenderError, RenderService};
pub use scene::{install_scene, SceneSummary};
pub use schedule::{stagger_offsets, AnimationPlan, PlanEntry};
pub use style::{category_palette, LayerStyle};
pub use supervisor::{AnimationSupervisor, SupervisorHandle, TickSummary};
pub use timeline::{FrameClock, SimulatedClock, WallClock};
