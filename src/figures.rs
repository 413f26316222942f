//! Figure Model - Wire Contracts for the Rendering Surface
//!
//! Templates are what gets cached. Figures are what gets drawn.

use serde::{Deserialize, Serialize};

/// A 2D coordinate pair, serialized as `[x, y]`.
pub type Point = [f64; 2];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FigureKind {
    Line,
    Rectangle,
    Oval,
    Text,
    Arrow,
}

impl FigureKind {
    pub const ALL: [FigureKind; 5] = [
        FigureKind::Line,
        FigureKind::Rectangle,
        FigureKind::Oval,
        FigureKind::Text,
        FigureKind::Arrow,
    ];

    /// Number of points the renderer expects for this kind.
    pub fn point_count(&self) -> usize {
        match self {
            FigureKind::Text => 1,
            _ => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FigureKind::Line => "line",
            FigureKind::Rectangle => "rectangle",
            FigureKind::Oval => "oval",
            FigureKind::Text => "text",
            FigureKind::Arrow => "arrow",
        }
    }
}

/// Registered palette, in index order.
pub const PALETTE: [&str; 7] = ["rainbow", "blue", "red", "green", "orange", "white", "black"];

pub const DEFAULT_COLOR_INDEX: u8 = 1;

/// Looks up the registered index of a color name.
pub fn color_index(name: &str) -> Option<u8> {
    PALETTE.iter().position(|c| *c == name).map(|i| i as u8)
}

pub fn is_registered_color(index: u8) -> bool {
    (index as usize) < PALETTE.len()
}

/// Caller-supplied drawing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        [self.width / 2.0, self.height / 2.0]
    }

    pub fn contains(&self, point: &Point) -> bool {
        point[0] >= 0.0 && point[0] <= self.width && point[1] >= 0.0 && point[1] <= self.height
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(1920.0, 1080.0)
    }
}

/// Everything about a figure except its per-batch identity and display jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigureTemplate {
    #[serde(rename = "type")]
    pub kind: FigureKind,
    pub points: Vec<Point>,
    pub color_index: u8,
    pub width_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl FigureTemplate {
    pub fn shape(kind: FigureKind, points: Vec<Point>, color_index: u8, width_index: u32) -> Self {
        Self {
            kind,
            points,
            color_index,
            width_index,
            text: None,
            width: None,
            height: None,
            scale: None,
        }
    }
}

/// A drawable figure as handed to the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Figure {
    pub id: u64,
    #[serde(flatten)]
    pub template: FigureTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rainbow_color_deg: Option<f64>,
}

impl Figure {
    pub fn kind(&self) -> FigureKind {
        self.template.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_palette_lookup() {
        assert_eq!(color_index("rainbow"), Some(0));
        assert_eq!(color_index("red"), Some(2));
        assert_eq!(color_index("black"), Some(6));
        assert_eq!(color_index("purple"), None);
        assert!(is_registered_color(6));
        assert!(!is_registered_color(7));
    }

    #[test]
    fn test_figure_wire_shape() {
        let figure = Figure {
            id: 7,
            template: FigureTemplate::shape(FigureKind::Oval, vec![[0.0, 0.0], [10.0, 10.0]], 2, 2),
            rainbow_color_deg: Some(12.5),
        };
        let value = serde_json::to_value(&figure).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 7,
                "type": "oval",
                "points": [[0.0, 0.0], [10.0, 10.0]],
                "colorIndex": 2,
                "widthIndex": 2,
                "rainbowColorDeg": 12.5
            })
        );
    }

    #[test]
    fn test_template_ignores_volatile_fields() {
        let raw = json!({
            "id": 1234567890,
            "type": "text",
            "points": [[5, 5]],
            "colorIndex": 1,
            "widthIndex": 2,
            "text": "hi",
            "scale": 1,
            "rainbowColorDeg": 90
        });
        let template: FigureTemplate = serde_json::from_value(raw).unwrap();
        assert_eq!(template.kind, FigureKind::Text);
        assert_eq!(template.text.as_deref(), Some("hi"));

        let persisted = serde_json::to_value(&template).unwrap();
        assert!(persisted.get("id").is_none());
        assert!(persisted.get("rainbowColorDeg").is_none());
    }

    #[test]
    fn test_point_contract() {
        assert_eq!(FigureKind::Text.point_count(), 1);
        for kind in [FigureKind::Line, FigureKind::Rectangle, FigureKind::Oval, FigureKind::Arrow] {
            assert_eq!(kind.point_count(), 2);
        }
    }
}
