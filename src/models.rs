use serde::{Serialize, Deserialize};
use serde_with::skip_serializing_none;

/// Number of redesign proposals every analysis must carry.
pub const SUGGESTION_COUNT: usize = 7;

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StyleSuggestion {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub color_palette: Vec<String>, // color names, no hex mapping
    pub lighting_tips: String,
    pub furniture_advice: String,
    /// Data URI of the generated render. Absent while pending or after a failed generation.
    #[serde(default)]
    pub generated_image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SpaceAnalysis {
    pub current_style: String,
    #[serde(default)]
    pub detected_furniture: Vec<String>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    pub suggestions: Vec<StyleSuggestion>,
}

impl SpaceAnalysis {
    pub fn ready_count(&self) -> usize {
        self.suggestions.iter().filter(|s| s.generated_image_url.is_some()).count()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Pending,
    Ready,
    Failed,
}

/// One entry of the proposals grid as the client renders it.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionCard {
    pub index: usize,
    pub status: CardStatus,
    pub selectable: bool,
    #[serde(flatten)]
    pub suggestion: StyleSuggestion,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOverview {
    pub current_style: String,
    pub detected_furniture: Vec<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub ready_count: usize,
}

impl From<&SpaceAnalysis> for AnalysisOverview {
    fn from(analysis: &SpaceAnalysis) -> Self {
        Self {
            current_style: analysis.current_style.clone(),
            detected_furniture: analysis.detected_furniture.clone(),
            pros: analysis.pros.clone(),
            cons: analysis.cons.clone(),
            ready_count: analysis.ready_count(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadRequest {
    /// Raw base64 payload or a full `data:` URI.
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn suggestion_uses_camel_case_and_skips_missing_image() {
        let suggestion = StyleSuggestion {
            name: "Japandi".into(),
            description: "Calma y madera".into(),
            color_palette: vec!["beige".into(), "roble".into(), "negro".into()],
            lighting_tips: "Luz cálida indirecta".into(),
            furniture_advice: "Mantén el sofá".into(),
            generated_image_url: None,
        };
        let value = serde_json::to_value(&suggestion).unwrap();
        assert_eq!(value["colorPalette"][1], "roble");
        assert_eq!(value["lightingTips"], "Luz cálida indirecta");
        assert!(value.get("generatedImageUrl").is_none());
    }

    #[test]
    fn analysis_parses_model_json() {
        let raw = r#"{
            "currentStyle": "Minimalista",
            "detectedFurniture": ["sofá gris"],
            "pros": ["buena luz"],
            "cons": ["poco color"],
            "suggestions": [{
                "name": "Boho",
                "description": "Texturas naturales",
                "colorPalette": ["terracota", "crema", "verde"],
                "lightingTips": "Guirnaldas",
                "furnitureAdvice": "Añade ratán"
            }]
        }"#;
        let analysis: SpaceAnalysis = serde_json::from_str(raw).unwrap();
        assert_eq!(analysis.current_style, "Minimalista");
        assert_eq!(analysis.suggestions[0].color_palette.len(), 3);
        assert_eq!(analysis.ready_count(), 0);
    }
}
