//! Local Interpreter - Network-Free Figure Rules
//!
//! Rules run in fixed priority, first match wins. A rule that cannot honour
//! its own bounds does not match; it never fails.

use std::sync::OnceLock;

use regex::Regex;

use crate::figures::{color_index, Canvas, FigureKind, FigureTemplate, DEFAULT_COLOR_INDEX};
use crate::keys::normalize;

pub const MAX_GRID_DIMENSION: u32 = 20;

/// Share of each canvas axis covered by a generated grid.
const GRID_COVERAGE: f64 = 0.6;
const SHAPE_SPAN: f64 = 200.0;
const TEXT_BOX: [f64; 2] = [200.0, 50.0];

/// Shape tokens in match priority, with the figure kind each resolves to.
const SHAPE_TOKENS: [(&str, FigureKind); 8] = [
    ("circle", FigureKind::Oval),
    ("oval", FigureKind::Oval),
    ("box", FigureKind::Rectangle),
    ("square", FigureKind::Rectangle),
    ("rectangle", FigureKind::Rectangle),
    ("rect", FigureKind::Rectangle),
    ("line", FigureKind::Line),
    ("arrow", FigureKind::Arrow),
];

fn grid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?:empty\s+)?(?:array|matrix|grid)\s+(\d+)\s*x\s*(\d+)|(\d+)\s*x\s*(\d+)\s+(?:array|matrix|grid)",
        )
        .expect("grid pattern is valid")
    })
}

/// Interpreter rule trait - produces templates or declines
pub trait InterpretRule {
    fn name(&self) -> &'static str;
    /// `normalized` is the trimmed, case-folded prompt; `raw` is the original.
    fn apply(&self, normalized: &str, raw: &str, canvas: &Canvas) -> Option<Vec<FigureTemplate>>;
}

pub struct GridRule;

impl InterpretRule for GridRule {
    fn name(&self) -> &'static str { "grid" }

    fn apply(&self, normalized: &str, _raw: &str, canvas: &Canvas) -> Option<Vec<FigureTemplate>> {
        let caps = grid_pattern().captures(normalized)?;
        let rows = caps.get(1).or_else(|| caps.get(3))?.as_str().parse::<u32>().ok()?;
        let cols = caps.get(2).or_else(|| caps.get(4))?.as_str().parse::<u32>().ok()?;

        let in_range = |n: u32| (1..=MAX_GRID_DIMENSION).contains(&n);
        if !in_range(rows) || !in_range(cols) {
            return None;
        }

        Some(grid(rows, cols, canvas))
    }
}

fn grid(rows: u32, cols: u32, canvas: &Canvas) -> Vec<FigureTemplate> {
    let avail_w = canvas.width * GRID_COVERAGE;
    let avail_h = canvas.height * GRID_COVERAGE;
    let cell_w = avail_w / cols as f64;
    let cell_h = avail_h / rows as f64;
    let start_x = (canvas.width - avail_w) / 2.0;
    let start_y = (canvas.height - avail_h) / 2.0;

    let mut cells = Vec::with_capacity((rows * cols) as usize);
    for r in 0..rows {
        for c in 0..cols {
            let x = start_x + c as f64 * cell_w;
            let y = start_y + r as f64 * cell_h;
            cells.push(FigureTemplate::shape(
                FigureKind::Rectangle,
                vec![[x, y], [x + cell_w, y + cell_h]],
                DEFAULT_COLOR_INDEX,
                1,
            ));
        }
    }
    cells
}

pub struct TextRule;

impl InterpretRule for TextRule {
    fn name(&self) -> &'static str { "text" }

    fn apply(&self, normalized: &str, raw: &str, canvas: &Canvas) -> Option<Vec<FigureTemplate>> {
        if !(normalized.starts_with("text ") || normalized.starts_with("write ")) {
            return None;
        }

        let (_, content) = raw.trim().split_once(char::is_whitespace)?;
        if content.trim().is_empty() {
            return None;
        }

        let [cx, cy] = canvas.center();
        Some(vec![FigureTemplate {
            kind: FigureKind::Text,
            points: vec![[cx - TEXT_BOX[0] / 2.0, cy]],
            color_index: DEFAULT_COLOR_INDEX,
            width_index: 2,
            text: Some(content.to_string()),
            width: Some(TEXT_BOX[0]),
            height: Some(TEXT_BOX[1]),
            scale: Some(1.0),
        }])
    }
}

pub struct ColoredShapeRule;

impl InterpretRule for ColoredShapeRule {
    fn name(&self) -> &'static str { "colored_shape" }

    fn apply(&self, normalized: &str, _raw: &str, canvas: &Canvas) -> Option<Vec<FigureTemplate>> {
        // Plain substring search: "colored" contains "red" and that is accepted.
        let color = crate::figures::PALETTE
            .iter()
            .find(|c| normalized.contains(*c))
            .and_then(|c| color_index(c))?;
        let (_, kind) = SHAPE_TOKENS.iter().find(|(token, _)| normalized.contains(token))?;

        Some(vec![shape(*kind, color, canvas)])
    }
}

fn shape(kind: FigureKind, color: u8, canvas: &Canvas) -> FigureTemplate {
    let [cx, cy] = canvas.center();
    let half = SHAPE_SPAN / 2.0;

    let points = match kind {
        FigureKind::Line | FigureKind::Arrow => vec![[cx - half, cy], [cx + half, cy]],
        _ => vec![[cx - half, cy - half], [cx + half, cy + half]],
    };

    FigureTemplate::shape(kind, points, color, 2)
}

/// Runs the rules in priority order.
pub struct LocalInterpreter {
    rules: Vec<Box<dyn InterpretRule + Send + Sync>>,
}

impl LocalInterpreter {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(GridRule),
                Box::new(TextRule),
                Box::new(ColoredShapeRule),
            ],
        }
    }

    /// Returns `None` when no rule recognises the prompt.
    pub fn interpret(&self, prompt: &str, canvas: &Canvas) -> Option<Vec<FigureTemplate>> {
        let normalized = normalize(prompt);
        if normalized.is_empty() {
            return None;
        }

        self.rules.iter().find_map(|rule| {
            let templates = rule.apply(&normalized, prompt, canvas)?;
            log::debug!("[interpret] rule '{}' matched {} figure(s)", rule.name(), templates.len());
            Some(templates)
        })
    }
}

impl Default for LocalInterpreter {
    fn default() -> Self {
        Self::new()
    }
}
