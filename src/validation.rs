//! Response Validation - Untrusted Payload to Figure Templates
//!
//! Shape checks are fatal. Figure rules produce structured violations.
//! Policy decides whether a bad figure is dropped or sinks the payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::figures::{is_registered_color, Canvas, FigureKind, FigureTemplate};
use crate::pipeline::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    /// Position of the offending element in the payload array.
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Discard figures with errors, keep the rest.
    #[default]
    Drop,
    /// Any error rejects the whole payload.
    Reject,
}

/// Figures that survived validation, plus everything that was flagged.
#[derive(Debug, Clone)]
pub struct ValidatedPayload {
    pub templates: Vec<FigureTemplate>,
    pub violations: Vec<ValidationViolation>,
}

impl ValidatedPayload {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    /// Error-severity violations as one line, e.g. `#0 point_count: ...; #2 schema: ...`.
    pub fn error_summary(&self) -> String {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
            .map(|v| format!("#{} {}: {}", v.index, v.rule, v.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Figure rule trait - produces violations
pub trait FigureRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, figure: &FigureTemplate, canvas: &Canvas) -> Option<(ViolationSeverity, String)>;
}

pub struct PointCountRule;

impl FigureRule for PointCountRule {
    fn name(&self) -> &'static str { "point_count" }

    fn check(&self, figure: &FigureTemplate, _canvas: &Canvas) -> Option<(ViolationSeverity, String)> {
        let expected = figure.kind.point_count();
        (figure.points.len() != expected).then(|| {
            (
                ViolationSeverity::Error,
                format!("{} needs {} point(s), got {}", figure.kind.as_str(), expected, figure.points.len()),
            )
        })
    }
}

pub struct ColorIndexRule;

impl FigureRule for ColorIndexRule {
    fn name(&self) -> &'static str { "color_index" }

    fn check(&self, figure: &FigureTemplate, _canvas: &Canvas) -> Option<(ViolationSeverity, String)> {
        (!is_registered_color(figure.color_index)).then(|| {
            (ViolationSeverity::Error, format!("Unregistered color index {}", figure.color_index))
        })
    }
}

pub struct WidthIndexRule;

impl FigureRule for WidthIndexRule {
    fn name(&self) -> &'static str { "width_index" }

    fn check(&self, figure: &FigureTemplate, _canvas: &Canvas) -> Option<(ViolationSeverity, String)> {
        (figure.width_index == 0)
            .then(|| (ViolationSeverity::Error, "Width index must be positive".to_string()))
    }
}

pub struct TextContentRule;

impl FigureRule for TextContentRule {
    fn name(&self) -> &'static str { "text_content" }

    fn check(&self, figure: &FigureTemplate, _canvas: &Canvas) -> Option<(ViolationSeverity, String)> {
        if figure.kind != FigureKind::Text {
            return None;
        }
        match figure.text.as_deref() {
            Some(t) if !t.trim().is_empty() => None,
            _ => Some((ViolationSeverity::Error, "Text figure without text".to_string())),
        }
    }
}

/// Off-canvas points are drawable, just not visible.
pub struct CanvasBoundsRule;

impl FigureRule for CanvasBoundsRule {
    fn name(&self) -> &'static str { "canvas_bounds" }

    fn check(&self, figure: &FigureTemplate, canvas: &Canvas) -> Option<(ViolationSeverity, String)> {
        let outside = figure.points.iter().filter(|p| !canvas.contains(p)).count();
        (outside > 0).then(|| {
            (
                ViolationSeverity::Warning,
                format!("{} point(s) outside {}x{} canvas", outside, canvas.width, canvas.height),
            )
        })
    }
}

/// Strips a leading ```lang fence and a trailing ``` fence, then trims.
pub fn strip_fences(text: &str) -> &str {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        body = &rest[tag_len..];
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }

    body.trim()
}

/// Fence-strip and parse; anything but a JSON array is malformed.
pub fn parse_array(text: &str) -> Result<Vec<Value>, PipelineError> {
    let body = strip_fences(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::MalformedPayload(format!("Not valid JSON: {}", e)))?;

    match value {
        Value::Array(items) => Ok(items),
        other => Err(PipelineError::MalformedPayload(format!(
            "Expected a JSON array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validator orchestrates rules and applies policy
pub struct ResponseValidator {
    rules: Vec<Box<dyn FigureRule>>,
    failure_mode: FailureMode,
}

impl ResponseValidator {
    pub fn new(failure_mode: FailureMode) -> Self {
        Self {
            rules: vec![
                Box::new(PointCountRule),
                Box::new(ColorIndexRule),
                Box::new(WidthIndexRule),
                Box::new(TextContentRule),
                Box::new(CanvasBoundsRule),
            ],
            failure_mode,
        }
    }

    pub fn validate(&self, text: &str, canvas: &Canvas) -> Result<ValidatedPayload, PipelineError> {
        let items = parse_array(text)?;
        let mut templates = Vec::with_capacity(items.len());
        let mut violations = vec![];

        for (index, item) in items.into_iter().enumerate() {
            let template: FigureTemplate = match serde_json::from_value(item) {
                Ok(t) => t,
                Err(e) => {
                    violations.push(ValidationViolation {
                        rule: "schema".to_string(),
                        severity: ViolationSeverity::Error,
                        index,
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let mut rejected = false;
            for rule in &self.rules {
                if let Some((severity, message)) = rule.check(&template, canvas) {
                    rejected |= severity == ViolationSeverity::Error;
                    violations.push(ValidationViolation {
                        rule: rule.name().to_string(),
                        severity,
                        index,
                        message,
                    });
                }
            }

            if !rejected {
                templates.push(template);
            }
        }

        let payload = ValidatedPayload { templates, violations };

        for v in &payload.violations {
            log::warn!("[validate] figure {} failed {}: {}", v.index, v.rule, v.message);
        }

        if self.failure_mode == FailureMode::Reject && payload.has_errors() {
            return Err(PipelineError::RejectedPayload(payload.error_summary()));
        }

        Ok(payload)
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new(FailureMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Canvas {
        Canvas::new(800.0, 600.0)
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_fences("```[1]```"), "[1]");
        assert_eq!(strip_fences("  [1]  "), "[1]");
        assert_eq!(strip_fences("```\n[]\n```\n"), "[]");
    }

    #[test]
    fn test_non_json_is_malformed() {
        let err = parse_array("Sure! Here is your drawing.").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPayload(_)));
    }

    #[test]
    fn test_non_array_is_malformed() {
        let err = parse_array(r#"{"type": "line"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPayload(ref m) if m.contains("an object")));
    }

    #[test]
    fn test_valid_payload_passes() {
        let text = r#"```json
        [
          {"id": 1, "type": "line", "points": [[10,10],[100,100]], "colorIndex": 2, "widthIndex": 2},
          {"id": 2, "type": "text", "points": [[50,50]], "text": "8 + 2 = 10", "colorIndex": 1, "widthIndex": 2, "width": 200, "height": 50, "scale": 1}
        ]
        ```"#;
        let payload = ResponseValidator::default().validate(text, &canvas()).unwrap();
        assert_eq!(payload.templates.len(), 2);
        assert!(payload.violations.is_empty());
        assert_eq!(payload.templates[1].text.as_deref(), Some("8 + 2 = 10"));
    }

    #[test]
    fn test_drop_mode_discards_bad_figures() {
        let text = r#"[
          {"type": "line", "points": [[0,0]], "colorIndex": 2, "widthIndex": 2},
          {"type": "oval", "points": [[0,0],[5,5]], "colorIndex": 9, "widthIndex": 2},
          {"type": "hexagon", "points": [[0,0],[5,5]], "colorIndex": 1, "widthIndex": 2},
          {"type": "rectangle", "points": [[0,0],[5,5]], "colorIndex": 1, "widthIndex": 1}
        ]"#;
        let payload = ResponseValidator::new(FailureMode::Drop).validate(text, &canvas()).unwrap();
        assert_eq!(payload.templates.len(), 1);
        assert_eq!(payload.templates[0].kind, FigureKind::Rectangle);

        let rules: Vec<_> = payload.violations.iter().map(|v| v.rule.as_str()).collect();
        assert_eq!(rules, vec!["point_count", "color_index", "schema"]);
    }

    #[test]
    fn test_reject_mode_fails_payload() {
        let text = r#"[{"type": "text", "points": [[0,0]], "colorIndex": 1, "widthIndex": 2}]"#;
        let err = ResponseValidator::new(FailureMode::Reject).validate(text, &canvas()).unwrap_err();
        assert!(matches!(err, PipelineError::RejectedPayload(ref m) if m.contains("text_content")));
    }

    #[test]
    fn test_out_of_bounds_is_only_a_warning() {
        let text = r#"[{"type": "arrow", "points": [[-5,0],[900,10]], "colorIndex": 0, "widthIndex": 1}]"#;
        let payload = ResponseValidator::new(FailureMode::Reject).validate(text, &canvas()).unwrap();
        assert_eq!(payload.templates.len(), 1);
        assert_eq!(payload.violations[0].severity, ViolationSeverity::Warning);
        assert!(!payload.has_errors());
    }

    #[test]
    fn test_empty_array_is_valid() {
        let payload = ResponseValidator::default().validate("[]", &canvas()).unwrap();
        assert!(payload.templates.is_empty());
    }
}
