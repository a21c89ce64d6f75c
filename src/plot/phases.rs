//! Colours for seismic phase arrival markers.

use image::Rgba;
use std::collections::BTreeMap;

use super::figure::Color;
use crate::error::{Result, SeisplotError};

/// Default phase → `#RRGGBB` table
pub fn default_phase_colors() -> BTreeMap<String, String> {
    [
        ("P", "#FF0000"),
        ("PP", "#FF9900"),
        ("PKP", "#FFCC00"),
        ("S", "#0000FF"),
        ("SS", "#00AAFF"),
        ("SKS", "#00CC66"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Parse `#RRGGBB` (the `#` is optional) into an opaque colour
pub fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Rgba([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]))
}

/// Phase label to marker colour lookup
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseColors {
    colors: BTreeMap<String, Color>,
}

impl PhaseColors {
    /// Build from a `phase → #RRGGBB` table; phase labels are upper-cased
    pub fn from_hex_table(table: &BTreeMap<String, String>) -> Result<Self> {
        let mut colors = BTreeMap::new();
        for (phase, hex) in table {
            let color = parse_hex_color(hex).ok_or_else(|| SeisplotError::Config {
                message: format!("Invalid colour '{}' for phase {}", hex, phase),
            })?;
            colors.insert(phase.to_uppercase(), color);
        }
        Ok(Self { colors })
    }

    /// Colour for `phase`, matched case-insensitively
    pub fn color_for(&self, phase: &str) -> Result<Color> {
        self.colors
            .get(&phase.to_uppercase())
            .copied()
            .ok_or_else(|| SeisplotError::InvalidParameter {
                param: "phase".to_string(),
                message: format!(
                    "Unknown phase '{}'. Known phases: {}",
                    phase,
                    self.phases().join(", ")
                ),
            })
    }

    pub fn phases(&self) -> Vec<&str> {
        self.colors.keys().map(String::as_str).collect()
    }
}

impl Default for PhaseColors {
    fn default() -> Self {
        let colors = default_phase_colors()
            .into_iter()
            .filter_map(|(phase, hex)| parse_hex_color(&hex).map(|c| (phase, c)))
            .collect();
        Self { colors }
    }
}
