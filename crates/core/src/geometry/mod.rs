use std::fmt;

use geo::{BoundingRect, Coord, LineString, Rect};
use serde::{Deserialize, Serialize};

use crate::{RevealError, Result};

/// Index of a route within the collection it was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteId(pub usize);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shape of the geometry attached to a route feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryKind {
    SinglePath,
    MultiPath,
    /// Any geometry that cannot be drawn as a path, e.g. `Polygon`.
    Other(String),
    Missing,
}

/// Optional descriptive attributes carried by a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteProperties {
    pub name: Option<String>,
    pub description: Option<String>,
    pub distance: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// A route as loaded from the data source. Each segment is an ordered list of
/// `(longitude, latitude)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFeature {
    pub id: RouteId,
    pub kind: GeometryKind,
    pub segments: Vec<Vec<Coord<f64>>>,
    pub properties: RouteProperties,
}

impl RouteFeature {
    pub fn single(id: usize, path: Vec<Coord<f64>>) -> Self {
        Self {
            id: RouteId(id),
            kind: GeometryKind::SinglePath,
            segments: vec![path],
            properties: RouteProperties::default(),
        }
    }

    pub fn multi(id: usize, segments: Vec<Vec<Coord<f64>>>) -> Self {
        Self {
            id: RouteId(id),
            kind: GeometryKind::MultiPath,
            segments,
            properties: RouteProperties::default(),
        }
    }

    pub fn with_properties(mut self, properties: RouteProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Normalizes the route into a single drawable path.
    ///
    /// Multi-path routes are concatenated in segment order, so disjoint
    /// segments are revealed as one continuous line.
    pub fn flatten(&self) -> Result<FlattenedRoute> {
        let coords: Vec<Coord<f64>> = match &self.kind {
            GeometryKind::SinglePath => self.segments.first().cloned().unwrap_or_default(),
            GeometryKind::MultiPath => self.segments.iter().flatten().copied().collect(),
            GeometryKind::Other(name) => {
                return Err(self.invalid(format!("unsupported geometry kind `{name}`")));
            }
            GeometryKind::Missing => return Err(self.invalid("feature has no geometry")),
        };

        if coords.is_empty() {
            return Err(self.invalid("geometry has no coordinates"));
        }

        Ok(FlattenedRoute {
            id: self.id,
            properties: self.properties.clone(),
            line: LineString::new(coords),
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> RevealError {
        RevealError::InvalidGeometry {
            route: self.id,
            reason: reason.into(),
        }
    }
}

/// One ordered coordinate sequence ready for progressive reveal. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedRoute {
    pub id: RouteId,
    pub properties: RouteProperties,
    line: LineString<f64>,
}

impl FlattenedRoute {
    pub fn len(&self) -> usize {
        self.line.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.0.is_empty()
    }

    pub fn coords(&self) -> &[Coord<f64>] {
        &self.line.0
    }

    /// The first `count` coordinates, clamped to the route length.
    pub fn prefix(&self, count: usize) -> &[Coord<f64>] {
        &self.line.0[..count.min(self.len())]
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.line.bounding_rect()
    }
}

/// Outcome of flattening a whole collection.
#[derive(Debug, Default)]
pub struct FlattenReport {
    pub routes: Vec<FlattenedRoute>,
    pub skipped: Vec<RouteId>,
}

/// Flattens every feature, logging and skipping the ones that cannot be drawn.
pub fn flatten_all(features: &[RouteFeature]) -> FlattenReport {
    let mut report = FlattenReport::default();
    for feature in features {
        match feature.flatten() {
            Ok(route) => report.routes.push(route),
            Err(err) => {
                tracing::warn!(route = feature.id.0, %err, "skipping route");
                report.skipped.push(feature.id);
            }
        }
    }
    report
}

/// Smallest rectangle enclosing all given rectangles.
pub fn union_bounds<I>(rects: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = Rect<f64>>,
{
    rects.into_iter().reduce(|acc, rect| {
        Rect::new(
            Coord {
                x: acc.min().x.min(rect.min().x),
                y: acc.min().y.min(rect.min().y),
            },
            Coord {
                x: acc.max().x.max(rect.max().x),
                y: acc.max().y.max(rect.max().y),
            },
        )
    })
}
