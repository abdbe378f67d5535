use geo::Coord;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, Value};

use crate::{GeometryKind, Result, RouteFeature, RouteId, RouteProperties};

/// A point-of-interest marker.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub id: usize,
    pub coord: Coord<f64>,
    pub properties: RouteProperties,
}

/// Reads a document from a local path or, for `http://` and `https://`
/// sources, over the network.
pub fn load_document(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        tracing::debug!(source, "fetching document");
        let mut response = ureq::get(source).call()?;
        Ok(response.body_mut().read_to_string()?)
    } else {
        tracing::debug!(source, "reading document");
        Ok(std::fs::read_to_string(source)?)
    }
}

/// Parses GeoJSON text. A lone feature or geometry is wrapped into a
/// collection of one.
pub fn parse_feature_collection(text: &str) -> Result<FeatureCollection> {
    let collection = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => collection_of(vec![feature]),
        GeoJson::Geometry(geometry) => collection_of(vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }]),
    };
    Ok(collection)
}

pub fn load_feature_collection(source: &str) -> Result<FeatureCollection> {
    let text = load_document(source)?;
    let collection = parse_feature_collection(&text)?;
    tracing::info!(source, features = collection.features.len(), "loaded feature collection");
    Ok(collection)
}

fn collection_of(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Converts every feature into a [`RouteFeature`], keeping its index as the
/// route id. Features that are not paths are kept with an `Other` kind so the
/// flattener can report them.
pub fn route_features(collection: &FeatureCollection) -> Vec<RouteFeature> {
    collection
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let (kind, segments) = match feature.geometry.as_ref().map(|g| &g.value) {
                Some(Value::LineString(line)) => (GeometryKind::SinglePath, vec![to_coords(line)]),
                Some(Value::MultiLineString(lines)) => (
                    GeometryKind::MultiPath,
                    lines.iter().map(|line| to_coords(line)).collect(),
                ),
                Some(other) => (GeometryKind::Other(geometry_name(other).to_string()), Vec::new()),
                None => (GeometryKind::Missing, Vec::new()),
            };
            RouteFeature {
                id: RouteId(index),
                kind,
                segments,
                properties: properties(feature.properties.as_ref()),
            }
        })
        .collect()
}

/// Extracts point markers. Multi-point features yield one marker per point;
/// every other geometry is ignored.
pub fn point_features(collection: &FeatureCollection) -> Vec<PointFeature> {
    let mut points = Vec::new();
    for feature in &collection.features {
        let positions: Vec<&Vec<f64>> = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Point(position)) => vec![position],
            Some(Value::MultiPoint(positions)) => positions.iter().collect(),
            _ => continue,
        };
        let props = properties(feature.properties.as_ref());
        for coord in positions.into_iter().filter_map(|p| to_coord(p)) {
            points.push(PointFeature {
                id: points.len(),
                coord,
                properties: props.clone(),
            });
        }
    }
    points
}

fn to_coord(position: &[f64]) -> Option<Coord<f64>> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Some(Coord { x: *x, y: *y }),
        _ => None,
    }
}

fn to_coords(line: &[Vec<f64>]) -> Vec<Coord<f64>> {
    line.iter().filter_map(|position| to_coord(position)).collect()
}

fn geometry_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn properties(object: Option<&JsonObject>) -> RouteProperties {
    let field = |key: &str| {
        object
            .and_then(|object| object.get(key))
            .and_then(|value| match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(text) => Some(text.clone()),
                other => Some(other.to_string()),
            })
    };
    RouteProperties {
        name: field("name"),
        description: field("description"),
        distance: field("distance"),
        kind: field("type"),
    }
}
