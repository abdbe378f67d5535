use serde::{Deserialize, Serialize};

/// Colors handed out to route categories in order of first appearance.
pub const PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#9a6324",
];

pub const DEFAULT_ROUTE_COLOR: &str = "#888888";
pub const ANIMATED_ROUTE_COLOR: &str = "#ff5722";
pub const POINT_COLOR: &str = "#1e88e5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerKind {
    Line,
    Circle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStyle {
    pub kind: LayerKind,
    pub color: String,
    /// Line width or circle radius, in pixels.
    pub size: f32,
    pub opacity: f32,
}

/// Assigns each distinct category a palette index, numbered by first
/// occurrence. The result is ordered the same way.
pub fn category_palette<I, S>(categories: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<(String, usize)> = Vec::new();
    for category in categories {
        let category = category.as_ref();
        if !seen.iter().any(|(known, _)| known == category) {
            let index = seen.len() % PALETTE.len();
            seen.push((category.to_string(), index));
        }
    }
    seen
}

/// Looks up the color of `category` in a palette built by [`category_palette`].
pub fn category_color(palette: &[(String, usize)], category: Option<&str>) -> &'static str {
    category
        .and_then(|category| palette.iter().find(|(known, _)| known == category))
        .map(|(_, index)| PALETTE[*index])
        .unwrap_or(DEFAULT_ROUTE_COLOR)
}

pub fn route_layer_style() -> LayerStyle {
    LayerStyle {
        kind: LayerKind::Line,
        color: DEFAULT_ROUTE_COLOR.to_string(),
        size: 3.0,
        opacity: 0.8,
    }
}

pub fn animated_layer_style(color: Option<&str>) -> LayerStyle {
    LayerStyle {
        kind: LayerKind::Line,
        color: color.unwrap_or(ANIMATED_ROUTE_COLOR).to_string(),
        size: 4.0,
        opacity: 1.0,
    }
}

pub fn point_layer_style() -> LayerStyle {
    LayerStyle {
        kind: LayerKind::Circle,
        color: POINT_COLOR.to_string(),
        size: 6.0,
        opacity: 0.9,
    }
}
