use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, error, warn};
use uuid::Uuid;

use crate::{
    encoder::EncodedImage,
    gemini::{GenerationFailure, RedesignBrief, RedesignModel},
    models::SpaceAnalysis,
    view::Action,
};

/// Outcome of one background generation, addressed by suggestion index.
#[derive(Debug, Clone)]
pub struct GenerationEvent {
    pub run_id: Uuid,
    pub index: usize,
    pub outcome: Result<String, GenerationFailure>,
}

impl From<GenerationEvent> for Action {
    fn from(e: GenerationEvent) -> Self {
        Action::GenerationSettled { run_id: e.run_id, index: e.index, outcome: e.outcome }
    }
}

/// Spawns one generation per suggestion, all at once, and returns without waiting.
///
/// Every task reports exactly one [`GenerationEvent`] into `events`; failures are
/// logged here and otherwise only travel as that event. Returns the number of
/// tasks launched.
pub fn generate_all<T>(
    model: Arc<dyn RedesignModel>,
    image: Arc<EncodedImage>,
    run_id: Uuid,
    analysis: &SpaceAnalysis,
    events: UnboundedSender<T>,
) -> usize
where
    T: From<GenerationEvent> + Send + 'static,
{
    info!("🚀 Launching {} redesign generations for run {}", analysis.suggestions.len(), run_id);

    for (index, suggestion) in analysis.suggestions.iter().enumerate() {
        let brief = RedesignBrief::from(suggestion);
        let model = Arc::clone(&model);
        let image = Arc::clone(&image);
        let events = events.clone();

        tokio::spawn(async move {
            let outcome = model.generate_redesign(&image, &brief).await;
            match &outcome {
                Ok(_) => info!("✅ Redesign {} '{}' ready", index, brief.style_name),
                Err(e) => error!("❌ Failed to generate image for '{}': {}", brief.style_name, e),
            }
            if events.send(GenerationEvent { run_id, index, outcome }.into()).is_err() {
                warn!("Session for run {} is gone; dropping redesign {}", run_id, index);
            }
        });
    }

    analysis.suggestions.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use crate::gemini::tests::sample_analysis;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn image() -> Arc<EncodedImage> {
        Arc::new(EncodedImage { mime_type: "image/jpeg".into(), data: "/9j/AAAA".into() })
    }

    #[tokio::test]
    async fn every_suggestion_reports_exactly_once() {
        let model = ScriptedModel::new()
            .failing("Estilo 2")
            .failing("Estilo 5");
        let (tx, mut rx) = mpsc::unbounded_channel::<GenerationEvent>();
        let run_id = Uuid::new_v4();

        let launched = generate_all(Arc::new(model), image(), run_id, &sample_analysis(), tx);
        assert_eq!(launched, 7);

        let mut seen = BTreeMap::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.run_id, run_id);
            assert!(seen.insert(event.index, event.outcome.is_ok()).is_none());
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(seen.values().filter(|ok| !**ok).count(), 2);
        assert!(!seen[&2] && !seen[&5]);
    }

    #[tokio::test]
    async fn launching_does_not_wait_for_generations() {
        let model = ScriptedModel::new().hanging_all();
        let (tx, mut rx) = mpsc::unbounded_channel::<GenerationEvent>();

        let launched = generate_all(Arc::new(model), image(), Uuid::new_v4(), &sample_analysis(), tx);
        assert_eq!(launched, 7);
        let nothing = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn events_convert_into_reducer_actions() {
        let model = ScriptedModel::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();
        let run_id = Uuid::new_v4();
        generate_all(Arc::new(model), image(), run_id, &sample_analysis(), tx);

        let action = rx.recv().await.unwrap();
        assert!(matches!(action, Action::GenerationSettled { run_id: r, outcome: Ok(_), .. } if r == run_id));
    }
}
