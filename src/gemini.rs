use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, error, warn};

use crate::{config::Config, encoder::EncodedImage, models::{SpaceAnalysis, StyleSuggestion, SUGGESTION_COUNT}};

#[derive(Debug, Error, Clone)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("Parse error: {0}")] Parse(String),
    #[error("Other: {0}")] Other(String),
}

#[derive(Debug, Error)]
pub enum AnalysisFailure {
    #[error("analysis request failed: {0}")] Request(#[from] GeminiError),
    #[error("analysis response carried no text")] MissingText,
    #[error("analysis response is not valid JSON: {0}")] Malformed(#[from] serde_json::Error),
    #[error("expected {expected} suggestions, got {got}")] SuggestionCount { expected: usize, got: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    #[error("generation request failed: {0}")] Request(String),
    #[error("no image returned for this style")] NoImage,
    #[error("could not render image: {0}")] Render(String),
}

impl From<GeminiError> for GenerationFailure {
    fn from(e: GeminiError) -> Self { GenerationFailure::Request(e.to_string()) }
}

/// Style parameters fed into one redesign generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedesignBrief {
    pub style_name: String,
    pub style_description: String,
    pub lighting_tips: String,
    pub furniture_advice: String,
}

impl From<&StyleSuggestion> for RedesignBrief {
    fn from(s: &StyleSuggestion) -> Self {
        Self {
            style_name: s.name.clone(),
            style_description: s.description.clone(),
            lighting_tips: s.lighting_tips.clone(),
            furniture_advice: s.furniture_advice.clone(),
        }
    }
}

/// The remote multimodal model as the rest of the service sees it.
#[async_trait]
pub trait RedesignModel: Send + Sync {
    fn name(&self) -> &str;

    /// One all-or-nothing analysis of the room photo.
    async fn analyze_space(&self, image: &EncodedImage) -> Result<SpaceAnalysis, AnalysisFailure>;

    /// One attempt at re-rendering the room; returns a `data:` URI.
    async fn generate_redesign(&self, image: &EncodedImage, brief: &RedesignBrief) -> Result<String, GenerationFailure>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        if s.len() > 100 {
                            let head: String = s.chars().take(50).collect();
                            *val = Value::String(format!("{}...[truncated {} chars]", head, s.len() - head.len()));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &Value) -> String {
    let mut copy = value.clone();
    truncate_base64_in_json(&mut copy);
    serde_json::to_string(&copy).unwrap_or_default()
}

fn preview(data: &str) -> String {
    if data.len() > 50 {
        format!("{}...[{} chars total]", data.chars().take(50).collect::<String>(), data.len())
    } else {
        data.to_string()
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    analysis_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            analysis_model: config.analysis_model.clone(),
            image_model: config.image_model.clone(),
        }
    }

    async fn perform_api_call(&self, model: &str, request_body: &Value) -> Result<GeminiResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        info!("🔗 Making request to: {}", url);
        info!("📤 Request body: {}", loggable(request_body));

        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await
            .map_err(|e| GeminiError::Other(e.to_string()))?;

        let parsed_value: Value = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(e.to_string()))?;
        info!("📥 Raw Gemini API response: {}", loggable(&parsed_value));

        serde_json::from_value(parsed_value).map_err(|e| GeminiError::Parse(e.to_string()))
    }

    pub fn build_analysis_prompt() -> &'static str {
        "Analiza esta imagen de un espacio interior.\n\
        1. Identifica el estilo de decoración actual.\n\
        2. Lista los muebles principales detectados en la imagen (ej: sofá en L, mesa de centro de vidrio, lámpara de pie).\n\
        3. Lista 3 ventajas (pros) del espacio.\n\
        4. Lista 3 desventajas (cons) o áreas de mejora.\n\
        5. Sugiere exactamente 7 estilos de decoración diferentes que quedarían bien.\n\n\
        Para cada estilo sugerido:\n\
        - Nombre del estilo.\n\
        - Breve descripción de por qué funciona.\n\
        - Paleta de 3 colores.\n\
        - Sugerencia de ILUMINACIÓN específica: cambios en intensidad/color o nuevas luminarias (lámparas, apliques) para realzar este estilo.\n\
        - Sugerencia de MOBILIARIO: qué muebles existentes mantener, cuáles reemplazar y cómo integrarlos."
    }

    pub fn build_redesign_prompt(brief: &RedesignBrief) -> String {
        format!(
            "Una fotografía fotorrealista de alta calidad de este mismo espacio interior renovado al estilo {name}.\n\
            Concepto del estilo: {description}\n\
            Mantén estrictamente la estructura arquitectónica original (paredes, ventanas, suelo, techo).\n\n\
            Instrucciones de Mobiliario: {furniture}\n\
            Instrucciones de Iluminación: {lighting}\n\n\
            La imagen debe ser un \"Después\" impresionante de una renovación de diseño de interiores.",
            name = brief.style_name,
            description = brief.style_description,
            furniture = brief.furniture_advice,
            lighting = brief.lighting_tips,
        )
    }

    pub fn analysis_schema() -> Value {
        let string = json!({ "type": "STRING" });
        let string_array = json!({ "type": "ARRAY", "items": { "type": "STRING" } });
        json!({
            "type": "OBJECT",
            "properties": {
                "currentStyle": string,
                "detectedFurniture": string_array,
                "pros": string_array,
                "cons": string_array,
                "suggestions": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "name": string,
                            "description": string,
                            "colorPalette": string_array,
                            "lightingTips": string,
                            "furnitureAdvice": string
                        },
                        "required": ["name", "description", "colorPalette", "lightingTips", "furnitureAdvice"]
                    }
                }
            },
            "required": ["currentStyle", "detectedFurniture", "pros", "cons", "suggestions"]
        })
    }

    fn image_part(image: &EncodedImage) -> Value {
        json!({ "inlineData": { "mimeType": image.mime_type, "data": image.data } })
    }
}

#[async_trait]
impl RedesignModel for GeminiClient {
    fn name(&self) -> &str { "gemini" }

    async fn analyze_space(&self, image: &EncodedImage) -> Result<SpaceAnalysis, AnalysisFailure> {
        info!("🔍 Analyzing space with {}", self.analysis_model);
        let request_body = json!({
            "contents": [{
                "parts": [Self::image_part(image), { "text": Self::build_analysis_prompt() }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": Self::analysis_schema()
            }
        });

        let parsed = self.perform_api_call(&self.analysis_model, &request_body).await?;
        let text = extract_text(&parsed).ok_or(AnalysisFailure::MissingText)?;
        let analysis = parse_analysis(&text)?;
        info!("✅ Analysis ready: style '{}', {} suggestions", analysis.current_style, analysis.suggestions.len());
        Ok(analysis)
    }

    async fn generate_redesign(&self, image: &EncodedImage, brief: &RedesignBrief) -> Result<String, GenerationFailure> {
        let prompt = Self::build_redesign_prompt(brief);
        info!("🎯 Generating redesign '{}' with prompt: {}", brief.style_name, &prompt[..prompt.char_indices().nth(100).map_or(prompt.len(), |(i, _)| i)]);

        let request_body = json!({
            "contents": [{
                "parts": [Self::image_part(image), { "text": prompt }]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "candidateCount": 1
            }
        });

        let parsed = self.perform_api_call(&self.image_model, &request_body).await?;
        match extract_first_image(&parsed) {
            Some(inline) => {
                info!("🖼️ Redesign '{}' ready ({}): {}", brief.style_name, inline.mime_type, preview(&inline.data));
                Ok(EncodedImage { mime_type: inline.mime_type.clone(), data: inline.data.clone() }.to_data_uri())
            }
            None => {
                warn!("⚠️ No image data found for '{}'", brief.style_name);
                Err(GenerationFailure::NoImage)
            }
        }
    }
}

/// Parses the model's JSON text and enforces the fixed suggestion count.
pub fn parse_analysis(text: &str) -> Result<SpaceAnalysis, AnalysisFailure> {
    let mut analysis: SpaceAnalysis = serde_json::from_str(text.trim())?;
    if analysis.suggestions.len() != SUGGESTION_COUNT {
        return Err(AnalysisFailure::SuggestionCount { expected: SUGGESTION_COUNT, got: analysis.suggestions.len() });
    }
    for suggestion in &mut analysis.suggestions {
        suggestion.generated_image_url = None;
    }
    Ok(analysis)
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let candidate = resp.candidates.first()?;
    let text: String = candidate.content.parts.iter()
        .filter_map(|p| match p { Part::Text { text } => Some(text.as_str()), _ => None })
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

fn extract_first_image(resp: &GeminiResponse) -> Option<&InlineData> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                if !inline_data.data.is_empty() {
                    return Some(inline_data);
                }
            }
        }
    }
    None
}
