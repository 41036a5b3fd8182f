use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;

use crate::{
    encoder::EncodedImage,
    gemini::{tests::sample_analysis, AnalysisFailure, GeminiError, GenerationFailure, RedesignBrief, RedesignModel},
    models::SpaceAnalysis,
};

/// Model double whose per-style behaviour is scripted by suggestion name.
#[derive(Default)]
pub struct ScriptedModel {
    analysis_fails: bool,
    analysis_delay: Option<Duration>,
    hang_all: bool,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    generate_calls: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analysis_failure(mut self) -> Self {
        self.analysis_fails = true;
        self
    }

    pub fn with_analysis_delay(mut self, delay: Duration) -> Self {
        self.analysis_delay = Some(delay);
        self
    }

    pub fn failing(mut self, style: &str) -> Self {
        self.failing.insert(style.to_string());
        self
    }

    pub fn hanging(mut self, style: &str) -> Self {
        self.hanging.insert(style.to_string());
        self
    }

    pub fn hanging_all(mut self) -> Self {
        self.hang_all = true;
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn url_for(style: &str) -> String {
        format!("data:image/png;base64,{}", base64::engine::general_purpose::STANDARD.encode(style))
    }
}

#[async_trait]
impl RedesignModel for ScriptedModel {
    fn name(&self) -> &str { "scripted" }

    async fn analyze_space(&self, _image: &EncodedImage) -> Result<SpaceAnalysis, AnalysisFailure> {
        if let Some(delay) = self.analysis_delay {
            tokio::time::sleep(delay).await;
        }
        if self.analysis_fails {
            return Err(AnalysisFailure::Request(GeminiError::Http("status=503".into())));
        }
        Ok(sample_analysis())
    }

    async fn generate_redesign(&self, _image: &EncodedImage, brief: &RedesignBrief) -> Result<String, GenerationFailure> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_all || self.hanging.contains(&brief.style_name) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(&brief.style_name) {
            return Err(GenerationFailure::NoImage);
        }
        Ok(Self::url_for(&brief.style_name))
    }
}
