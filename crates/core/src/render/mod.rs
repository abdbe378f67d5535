use std::collections::HashMap;

use geo::Rect;
use geojson::GeoJson;

use crate::style::LayerStyle;

/// Failures reported by a rendering service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("source `{0}` does not exist")]
    UnknownSource(String),
    #[error("source `{0}` already exists")]
    DuplicateSource(String),
    #[error("layer `{0}` does not exist")]
    UnknownLayer(String),
    #[error("layer `{0}` already exists")]
    DuplicateLayer(String),
}

/// Capabilities consumed from the map rendering engine.
pub trait RenderService {
    fn create_source(&mut self, id: &str, data: GeoJson) -> Result<(), RenderError>;

    fn update_source_data(&mut self, id: &str, data: GeoJson) -> Result<(), RenderError>;

    fn create_layer(&mut self, id: &str, source_id: &str, style: LayerStyle) -> Result<(), RenderError>;

    fn set_layer_visibility(&mut self, id: &str, visible: bool) -> Result<(), RenderError>;

    fn fit_view_to_bounds(&mut self, bounds: Rect<f64>, padding_px: u32, duration_ms: f64);

    fn has_source(&self, id: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct LayerState {
    pub source: String,
    pub style: LayerStyle,
    pub visible: bool,
}

/// One accepted `update_source_data` call.
#[derive(Debug, Clone)]
pub struct SourceUpdate {
    pub source: String,
    pub data: GeoJson,
}

impl SourceUpdate {
    /// Number of positions when the update carries a single line string.
    pub fn line_len(&self) -> Option<usize> {
        match &self.data {
            GeoJson::Geometry(geometry) => match &geometry.value {
                geojson::Value::LineString(line) => Some(line.len()),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewFit {
    pub bounds: Rect<f64>,
    pub padding_px: u32,
    pub duration_ms: f64,
}

/// In-memory rendering service. It keeps the latest data of every source and
/// a log of all updates, which makes it usable both for headless simulation
/// and for inspecting what an animation published.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    sources: HashMap<String, GeoJson>,
    layers: HashMap<String, LayerState>,
    updates: Vec<SourceUpdate>,
    last_fit: Option<ViewFit>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&self, id: &str) -> Option<&GeoJson> {
        self.sources.get(id)
    }

    pub fn layer(&self, id: &str) -> Option<&LayerState> {
        self.layers.get(id)
    }

    pub fn updates(&self) -> &[SourceUpdate] {
        &self.updates
    }

    pub fn updates_for<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a SourceUpdate> + 'a {
        self.updates.iter().filter(move |update| update.source == source)
    }

    pub fn last_fit(&self) -> Option<&ViewFit> {
        self.last_fit.as_ref()
    }

    /// Drops a source together with the layers drawing it, as happens when
    /// the host map is torn down.
    pub fn remove_source(&mut self, id: &str) {
        self.sources.remove(id);
        self.layers.retain(|_, layer| layer.source != id);
    }
}

impl RenderService for RecordingRenderer {
    fn create_source(&mut self, id: &str, data: GeoJson) -> Result<(), RenderError> {
        if self.sources.contains_key(id) {
            return Err(RenderError::DuplicateSource(id.to_string()));
        }
        self.sources.insert(id.to_string(), data);
        Ok(())
    }

    fn update_source_data(&mut self, id: &str, data: GeoJson) -> Result<(), RenderError> {
        let slot = self
            .sources
            .get_mut(id)
            .ok_or_else(|| RenderError::UnknownSource(id.to_string()))?;
        *slot = data.clone();
        self.updates.push(SourceUpdate {
            source: id.to_string(),
            data,
        });
        Ok(())
    }

    fn create_layer(&mut self, id: &str, source_id: &str, style: LayerStyle) -> Result<(), RenderError> {
        if self.layers.contains_key(id) {
            return Err(RenderError::DuplicateLayer(id.to_string()));
        }
        if !self.sources.contains_key(source_id) {
            return Err(RenderError::UnknownSource(source_id.to_string()));
        }
        self.layers.insert(
            id.to_string(),
            LayerState {
                source: source_id.to_string(),
                style,
                visible: true,
            },
        );
        Ok(())
    }

    fn set_layer_visibility(&mut self, id: &str, visible: bool) -> Result<(), RenderError> {
        let layer = self
            .layers
            .get_mut(id)
            .ok_or_else(|| RenderError::UnknownLayer(id.to_string()))?;
        layer.visible = visible;
        Ok(())
    }

    fn fit_view_to_bounds(&mut self, bounds: Rect<f64>, padding_px: u32, duration_ms: f64) {
        self.last_fit = Some(ViewFit {
            bounds,
            padding_px,
            duration_ms,
        });
    }

    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }
}
