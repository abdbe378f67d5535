use std::{path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{RevealError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub map: MapConfig,
    pub data: DataConfig,
    pub animation: AnimationSettings,
}

impl RevealConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unset keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(style) = lookup("MAP_STYLE_URL") {
            config.map.style_url = style;
        }
        if let Some(lon) = parse_var(&lookup, "MAP_CENTER_LON")? {
            config.map.center[0] = lon;
        }
        if let Some(lat) = parse_var(&lookup, "MAP_CENTER_LAT")? {
            config.map.center[1] = lat;
        }
        if let Some(zoom) = parse_var(&lookup, "MAP_ZOOM")? {
            config.map.zoom = zoom;
        }

        config.data.points_url = lookup("POINTS_DATA_URL").filter(|url| !url.trim().is_empty());
        config.data.routes_url = lookup("ROUTES_DATA_URL").filter(|url| !url.trim().is_empty());

        if let Some(window) = parse_var(&lookup, "ANIMATION_WINDOW_MS")? {
            config.animation.window_ms = window;
        }
        if let Some(duration) = parse_var(&lookup, "ROUTE_DRAW_DURATION_MS")? {
            config.animation.duration_ms = duration;
        }
        if let Some(spacing) = parse_var(&lookup, "ROUTE_MIN_SPACING_MS")? {
            config.animation.min_spacing_ms = spacing;
        }

        config.animation.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file. Missing sections fall back to defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.animation.validate()?;
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RevealError::config(format!("`{key}` has an unparseable value `{raw}`"))),
        None => Ok(None),
    }
}

/// Basemap and camera options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub style_url: String,
    /// Initial center as `[longitude, latitude]`.
    pub center: [f64; 2],
    pub zoom: f64,
    pub fit_padding_px: u32,
    pub fit_duration_ms: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            style_url: "https://demotiles.maplibre.org/style.json".to_string(),
            center: [0.0, 0.0],
            zoom: 2.0,
            fit_padding_px: 40,
            fit_duration_ms: 1000.0,
        }
    }
}

/// Locations of the geographic data documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub points_url: Option<String>,
    pub routes_url: Option<String>,
}

impl DataConfig {
    pub fn routes_source(&self) -> Result<&str> {
        self.routes_url
            .as_deref()
            .ok_or_else(|| RevealError::config("no routes data source configured (ROUTES_DATA_URL)"))
    }

    pub fn points_source(&self) -> Result<&str> {
        self.points_url
            .as_deref()
            .ok_or_else(|| RevealError::config("no points data source configured (POINTS_DATA_URL)"))
    }
}

/// Timing of a reveal campaign, all values in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Total window the staggered starts are spread across.
    pub window_ms: f64,
    /// Draw duration of a single route.
    pub duration_ms: f64,
    /// Lower bound on the gap between two consecutive route starts.
    pub min_spacing_ms: f64,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            window_ms: 60_000.0,
            duration_ms: 4_000.0,
            min_spacing_ms: 200.0,
        }
    }
}

impl AnimationSettings {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("window_ms", self.window_ms),
            ("duration_ms", self.duration_ms),
            ("min_spacing_ms", self.min_spacing_ms),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(RevealError::config(format!(
                    "animation `{name}` must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
