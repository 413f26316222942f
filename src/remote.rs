//! Remote Generation - One Call per Cache Miss
//!
//! The transport returns a raw JSON envelope. Its shape is not guaranteed,
//! so text is pulled out by trying extractors in order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::Config;
use crate::figures::{Canvas, PALETTE};
use crate::pipeline::PipelineError;

/// Everything the transport needs for one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub api_key: String,
    pub model: String,
    pub system_instruction: String,
    pub prompt: String,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, PipelineError>;
}

/// Gemini `generateContent` over HTTPS.
pub struct GeminiBackend {
    client: Client,
    endpoint: String,
}

impl GeminiBackend {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        Self::new(&config.endpoint, Duration::from_secs(config.request_timeout_secs))
    }

    fn url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, PipelineError> {
        let body = json!({
            "systemInstruction": {
                "parts": [{ "text": request.system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(self.url(&request.model))
            .header("x-goog-api-key", request.api_key.as_str())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Network("Request timeout - the API took too long to respond".to_string())
                } else if e.is_connect() {
                    PipelineError::Network("Connection error - unable to reach the API".to_string())
                } else {
                    PipelineError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            let message = match status.as_u16() {
                401 | 403 => "Authentication failed - check your API key".to_string(),
                429 => "Rate limit exceeded - too many requests".to_string(),
                _ => error_text,
            };
            return Err(PipelineError::Api { status: status.as_u16(), message });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PipelineError::Network(format!("Failed to read response body: {}", e)))
    }
}

/// Text extractor trait - one known envelope shape each
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract<'a>(&self, envelope: &'a Value) -> Option<&'a str>;
}

/// `{"text": "..."}`
pub struct DirectText;

impl TextExtractor for DirectText {
    fn name(&self) -> &'static str { "direct" }

    fn extract<'a>(&self, envelope: &'a Value) -> Option<&'a str> {
        envelope.get("text")?.as_str()
    }
}

/// `{"response": {"text": "..."}}`
pub struct NestedResponseText;

impl TextExtractor for NestedResponseText {
    fn name(&self) -> &'static str { "nested_response" }

    fn extract<'a>(&self, envelope: &'a Value) -> Option<&'a str> {
        envelope.get("response")?.get("text")?.as_str()
    }
}

/// `{"candidates": [{"content": {"parts": [{"text": "..."}]}}]}`
pub struct CandidatePartsText;

impl TextExtractor for CandidatePartsText {
    fn name(&self) -> &'static str { "candidate_parts" }

    fn extract<'a>(&self, envelope: &'a Value) -> Option<&'a str> {
        envelope
            .pointer("/candidates/0/content/parts/0/text")?
            .as_str()
    }
}

/// Builds the request, calls the backend once, extracts the text.
pub struct RemoteGenerationClient {
    backend: Box<dyn GenerationBackend>,
    extractors: Vec<Box<dyn TextExtractor>>,
    model: String,
}

impl RemoteGenerationClient {
    pub fn new(backend: Box<dyn GenerationBackend>, model: &str) -> Self {
        Self {
            backend,
            extractors: vec![
                Box::new(DirectText),
                Box::new(NestedResponseText),
                Box::new(CandidatePartsText),
            ],
            model: model.to_string(),
        }
    }

    /// Exactly one backend call; no retry.
    pub async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
        canvas: &Canvas,
    ) -> Result<String, PipelineError> {
        let request = GenerationRequest {
            api_key: api_key.to_string(),
            model: self.model.clone(),
            system_instruction: system_instruction(canvas),
            prompt: prompt.to_string(),
        };

        let envelope = self.backend.generate(&request).await?;
        self.extract_text(&envelope).map(str::to_string)
    }

    pub fn extract_text<'a>(&self, envelope: &'a Value) -> Result<&'a str, PipelineError> {
        for extractor in &self.extractors {
            if let Some(text) = extractor.extract(envelope) {
                log::debug!("[remote] extracted {} bytes via '{}'", text.len(), extractor.name());
                return Ok(text);
            }
        }

        let keys = match envelope.as_object() {
            Some(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
            None => "<not an object>".to_string(),
        };
        Err(PipelineError::ResponseShape(format!("envelope keys [{}]", keys)))
    }
}

/// Instruction block sent alongside every prompt.
pub fn system_instruction(canvas: &Canvas) -> String {
    let (w, h) = (canvas.width, canvas.height);
    let palette: Vec<String> = PALETTE
        .iter()
        .enumerate()
        .map(|(i, name)| format!("       {}: {}", i, name))
        .collect();

    format!(
        r#"You draw on a whiteboard by emitting figures as JSON.
The canvas is {w}x{h}. Every coordinate must satisfy 0 <= x <= {w} and 0 <= y <= {h}.

Figure schemas:

1. line
   - "type": "line"
   - "points": [[x1, y1], [x2, y2]]
   - "colorIndex": integer from the palette
   - "widthIndex": 1 (medium) or 2 (thick)

2. rectangle
   - "type": "rectangle"
   - "points": [[x1, y1], [x2, y2]] (top-left, bottom-right)
   - "colorIndex", "widthIndex" as above

3. oval
   - "type": "oval"
   - "points": [[x1, y1], [x2, y2]] (bounding box)
   - "colorIndex", "widthIndex" as above

4. text
   - "type": "text"
   - "points": [[x, y]] (top-left)
   - "text": the text content
   - "colorIndex": as above, 1 by default
   - "widthIndex": controls font size
   - "width": approximate width in px (e.g. 200)
   - "height": approximate height in px (e.g. 50)
   - "scale": 1

5. arrow
   - "type": "arrow"
   - "points": [[x1, y1], [x2, y2]] (tail, head)
   - "colorIndex", "widthIndex" as above

Palette ("colorIndex"):
{palette}

Rules:
- Respond only with a JSON array of figure objects. No prose, no markdown.
- Give every figure an "id" that is a unique integer.
- Keep all coordinates inside the canvas bounds.
- For arithmetic such as "8 + 2 = ?", write the solved expression with a text figure.
"#,
        w = w,
        h = h,
        palette = palette.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Canned {
        envelope: Value,
        seen: Arc<Mutex<Vec<GenerationRequest>>>,
    }

    #[async_trait]
    impl GenerationBackend for Canned {
        async fn generate(&self, request: &GenerationRequest) -> Result<Value, PipelineError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.envelope.clone())
        }
    }

    fn client(envelope: Value) -> (RemoteGenerationClient, Arc<Mutex<Vec<GenerationRequest>>>) {
        let seen = Arc::new(Mutex::new(vec![]));
        let backend = Canned { envelope, seen: seen.clone() };
        (RemoteGenerationClient::new(Box::new(backend), "test-model"), seen)
    }

    #[test]
    fn test_extractors_in_order() {
        let (client, _) = client(Value::Null);

        let direct = json!({"text": "a", "response": {"text": "b"}});
        assert_eq!(client.extract_text(&direct).unwrap(), "a");

        let nested = json!({"response": {"text": "b"}});
        assert_eq!(client.extract_text(&nested).unwrap(), "b");

        let candidates = json!({"candidates": [{"content": {"parts": [{"text": "c"}]}}]});
        assert_eq!(client.extract_text(&candidates).unwrap(), "c");
    }

    #[test]
    fn test_unknown_envelope_is_shape_error() {
        let (client, _) = client(Value::Null);
        let err = client.extract_text(&json!({"choices": [], "usage": {}})).unwrap_err();
        match err {
            PipelineError::ResponseShape(msg) => assert!(msg.contains("choices") && msg.contains("usage")),
            other => panic!("unexpected error: {other}"),
        }

        let err = client.extract_text(&json!({"candidates": []})).unwrap_err();
        assert!(matches!(err, PipelineError::ResponseShape(_)));
    }

    #[tokio::test]
    async fn test_generate_sends_prompt_and_canvas() {
        let (client, seen) = client(json!({"text": "[]"}));
        let canvas = Canvas::new(640.0, 480.0);

        let text = client.generate("secret", "Draw A House", &canvas).await.unwrap();
        assert_eq!(text, "[]");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, "Draw A House");
        assert_eq!(seen[0].model, "test-model");
        assert_eq!(seen[0].api_key, "secret");
        assert!(seen[0].system_instruction.contains("640x480"));
    }

    #[test]
    fn test_instruction_lists_every_kind_and_color() {
        let text = system_instruction(&Canvas::default());
        for kind in crate::figures::FigureKind::ALL {
            assert!(text.contains(&format!("\"type\": \"{}\"", kind.as_str())));
        }
        for (i, name) in PALETTE.iter().enumerate() {
            assert!(text.contains(&format!("{}: {}", i, name)));
        }
        assert!(text.contains("JSON array"));
        assert!(text.contains("1920x1080"));
    }

    #[test]
    fn test_gemini_url() {
        let backend = GeminiBackend::new("https://example.test/v1beta/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            backend.url("gemini-x"),
            "https://example.test/v1beta/models/gemini-x:generateContent"
        );
    }
}
