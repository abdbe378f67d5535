use geo::{Coord, Rect};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};

use crate::{
    geometry::union_bounds,
    loader::PointFeature,
    render::RenderService,
    style::{category_color, category_palette, point_layer_style, route_layer_style},
    supervisor::STATIC_ROUTE_LAYER,
    GeometryKind, MapConfig, Result, RouteFeature, RouteProperties,
};

pub const POINTS_LAYER: &str = "points";

/// What [`install_scene`] put on the map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSummary {
    pub routes: usize,
    pub points: usize,
    pub categories: Vec<String>,
}

/// Creates the static route layer and the point markers layer, then frames
/// everything that was loaded.
///
/// The static route layer is always created, even without routes, so the
/// animation supervisor can toggle it.
pub fn install_scene<R: RenderService + ?Sized>(
    renderer: &mut R,
    routes: &[RouteFeature],
    points: &[PointFeature],
    map: &MapConfig,
) -> Result<SceneSummary> {
    let palette = category_palette(routes.iter().filter_map(|r| r.properties.kind.as_deref()));

    let route_features: Vec<Feature> = routes
        .iter()
        .filter_map(|route| {
            let geometry = path_geometry(route)?;
            let color = category_color(&palette, route.properties.kind.as_deref());
            Some(feature(geometry, &route.properties, color))
        })
        .collect();
    let route_count = route_features.len();

    renderer.create_source(STATIC_ROUTE_LAYER, collection(route_features))?;
    renderer.create_layer(STATIC_ROUTE_LAYER, STATIC_ROUTE_LAYER, route_layer_style())?;

    if !points.is_empty() {
        let style = point_layer_style();
        let point_features = points
            .iter()
            .map(|point| {
                let geometry = Geometry::new(Value::Point(vec![point.coord.x, point.coord.y]));
                feature(geometry, &point.properties, &style.color)
            })
            .collect();
        renderer.create_source(POINTS_LAYER, collection(point_features))?;
        renderer.create_layer(POINTS_LAYER, POINTS_LAYER, style)?;
    }

    let coords = routes
        .iter()
        .flat_map(|route| route.segments.iter().flatten())
        .chain(points.iter().map(|point| &point.coord));
    if let Some(bounds) = union_bounds(coords.map(|c| Rect::new(*c, *c))) {
        renderer.fit_view_to_bounds(bounds, map.fit_padding_px, map.fit_duration_ms);
    }

    tracing::info!(routes = route_count, points = points.len(), "scene installed");
    Ok(SceneSummary {
        routes: route_count,
        points: points.len(),
        categories: palette.into_iter().map(|(name, _)| name).collect(),
    })
}

fn path_geometry(route: &RouteFeature) -> Option<Geometry> {
    let positions = |segment: &Vec<Coord<f64>>| -> Vec<Vec<f64>> {
        segment.iter().map(|c| vec![c.x, c.y]).collect()
    };
    let value = match route.kind {
        GeometryKind::SinglePath => Value::LineString(positions(route.segments.first()?)),
        GeometryKind::MultiPath => Value::MultiLineString(route.segments.iter().map(positions).collect()),
        GeometryKind::Other(_) | GeometryKind::Missing => return None,
    };
    if route.segments.iter().all(|segment| segment.is_empty()) {
        return None;
    }
    Some(Geometry::new(value))
}

fn feature(geometry: Geometry, properties: &RouteProperties, color: &str) -> Feature {
    let mut object = match serde_json::to_value(properties) {
        Ok(serde_json::Value::Object(object)) => object,
        _ => JsonObject::new(),
    };
    object.retain(|_, value| !value.is_null());
    object.insert("color".to_string(), color.into());
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(object),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> GeoJson {
    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}
