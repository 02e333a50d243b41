use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:1234/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "qwen/qwen3-vl-30b";

const ANALYSIS_PROMPT: &str = r#"Analyze this image in depth and answer in Traditional Chinese. Return JSON only, with no surrounding text:

{
  "image_title": "title text visible in the image ('N/A' if none)",
  "main_theme": "primary topic category (e.g. finance, engineering, design, report)",
  "sub_theme": "secondary category (e.g. investment analysis, AI systems, creative design)",
  "core_content": "the image's concrete core content, a keyword or short phrase",
  "recommended_name": "recommended file name in the form theme_subtheme_title, at most 25 characters, no dates"
}"#;

/// Any of these reads as one failed attempt; the orchestrator decides
/// whether to retry.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("analysis endpoint returned status {status}")]
    Status { status: u16 },

    #[error("malformed analysis response: {message}")]
    Malformed { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured metadata for one image, as returned by the model.
/// Missing fields fall back to placeholders rather than failing the
/// whole analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(default = "placeholder")]
    pub image_title: String,
    #[serde(default = "placeholder")]
    pub main_theme: String,
    #[serde(default = "placeholder")]
    pub sub_theme: String,
    #[serde(default = "placeholder")]
    pub core_content: String,
    #[serde(default = "unknown_name")]
    pub recommended_name: String,
}

fn placeholder() -> String {
    "N/A".to_string()
}

fn unknown_name() -> String {
    "UNKNOWN".to_string()
}

/// The external vision-analysis collaborator.
pub trait ImageAnalyzer {
    fn analyze(&self, image: &Path) -> Result<ImageAnalysis, VisionError>;
}

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub endpoint: String,
    pub model: String,
    /// Wall-clock cap per attempt.
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Images larger than this on either edge are re-encoded smaller
    /// before upload.
    pub max_image_dim: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            temperature: 0.3,
            max_tokens: 500,
            max_image_dim: 1024,
        }
    }
}

/// Blocking client for a locally hosted OpenAI-style chat-completions
/// endpoint serving a vision-language model.
pub struct VisionClient {
    config: VisionConfig,
    http: reqwest::blocking::Client,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }
}

impl ImageAnalyzer for VisionClient {
    fn analyze(&self, image: &Path) -> Result<ImageAnalysis, VisionError> {
        let data_url = encode_image(image, self.config.max_image_dim)?;
        let payload = json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "image_url", "image_url": {"url": data_url}},
                    {"type": "text", "text": ANALYSIS_PROMPT},
                ],
            }],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let response = self.http.post(&self.config.endpoint).json(&payload).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(VisionError::Status {
                status: status.as_u16(),
            });
        }

        let body: Value = response.json()?;
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| VisionError::Malformed {
                message: "response carries no message content".to_string(),
            })?;

        parse_analysis(content)
    }
}

/// Two-stage parse: the whole reply as JSON first, then a JSON block
/// embedded in surrounding prose. Anything else is a malformed (and
/// therefore retryable) response.
pub fn parse_analysis(text: &str) -> Result<ImageAnalysis, VisionError> {
    let trimmed = text.trim();
    if let Ok(analysis) = serde_json::from_str::<ImageAnalysis>(trimmed) {
        return Ok(analysis);
    }

    let block = Regex::new(r"(?s)\{.*\}")
        .ok()
        .and_then(|re| re.find(trimmed))
        .map(|m| m.as_str());
    if let Some(block) = block {
        if let Ok(analysis) = serde_json::from_str::<ImageAnalysis>(block) {
            return Ok(analysis);
        }
    }

    let mut preview: String = trimmed.chars().take(120).collect();
    if preview.len() < trimmed.len() {
        preview.push('…');
    }
    Err(VisionError::Malformed { message: preview })
}

/// MIME type from the file extension; PNG when in doubt.
pub fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => "image/png",
    }
}

/// Encode the image as a data URL. Oversized images that decode are
/// resized and re-encoded as JPEG to keep the request small; anything
/// else is sent as raw bytes.
fn encode_image(path: &Path, max_dim: u32) -> Result<String, VisionError> {
    if let Ok(decoded) = image::open(path) {
        if decoded.width().max(decoded.height()) > max_dim {
            let resized = decoded
                .resize(max_dim, max_dim, FilterType::Triangle)
                .to_rgb8();
            let mut bytes = Vec::new();
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, 90);
            if encoder.encode_image(&resized).is_ok() {
                return Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes)));
            }
        }
    }

    let bytes = fs::read(path)?;
    Ok(format!(
        "data:{};base64,{}",
        image_mime(path),
        BASE64.encode(&bytes)
    ))
}
