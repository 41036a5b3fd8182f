//! Top-level screen state as one immutable record and the pure transition
//! function over it. Every change, including background generation results,
//! goes through [`reduce`].

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    encoder::EncodedImage,
    gemini::GenerationFailure,
    models::{CardStatus, SpaceAnalysis, StyleSuggestion, SuggestionCard},
};

pub const ANALYSIS_ERROR_MESSAGE: &str =
    "Hubo un problema analizando tu imagen. Por favor intenta con otra foto más clara.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    #[default]
    Upload,
    Analyzing,
    Selection,
    Result,
    Error,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppView {
    pub screen: Screen,
    /// Identifies the analysis run whose results this view is allowed to absorb.
    pub run_id: Option<Uuid>,
    pub original_image: Option<EncodedImage>,
    pub analysis: Option<SpaceAnalysis>,
    pub failed: BTreeSet<usize>,
    pub selected: Option<usize>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Action {
    BeginAnalysis { run_id: Uuid, image: EncodedImage },
    AnalysisSucceeded { run_id: Uuid, analysis: SpaceAnalysis },
    AnalysisFailed { run_id: Uuid },
    GenerationSettled { run_id: Uuid, index: usize, outcome: Result<String, GenerationFailure> },
    Select(usize),
    BackToSelection,
    Reset,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::BeginAnalysis { .. } => "upload an image",
            Action::AnalysisSucceeded { .. } => "accept an analysis",
            Action::AnalysisFailed { .. } => "record an analysis failure",
            Action::GenerationSettled { .. } => "apply a generation",
            Action::Select(_) => "select a suggestion",
            Action::BackToSelection => "go back to the selection",
            Action::Reset => "reset",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} while on the {screen:?} screen")]
    NotAllowed { screen: Screen, action: &'static str },
    #[error("suggestion {0} does not exist")]
    UnknownSuggestion(usize),
    #[error("suggestion {0} has no generated image yet")]
    NotReady(usize),
}

impl AppView {
    pub fn card_status(&self, index: usize) -> Option<CardStatus> {
        let suggestion = self.analysis.as_ref()?.suggestions.get(index)?;
        Some(if suggestion.generated_image_url.is_some() {
            CardStatus::Ready
        } else if self.failed.contains(&index) {
            CardStatus::Failed
        } else {
            CardStatus::Pending
        })
    }

    pub fn cards(&self) -> Vec<SuggestionCard> {
        let Some(analysis) = &self.analysis else { return Vec::new() };
        analysis.suggestions.iter().enumerate().map(|(index, suggestion)| {
            let status = self.card_status(index).unwrap_or(CardStatus::Pending);
            SuggestionCard {
                index,
                status,
                selectable: self.screen == Screen::Selection && status == CardStatus::Ready,
                suggestion: suggestion.clone(),
            }
        }).collect()
    }

    pub fn selected_suggestion(&self) -> Option<&StyleSuggestion> {
        self.analysis.as_ref()?.suggestions.get(self.selected?)
    }

    fn is_current(&self, run_id: Uuid) -> bool {
        self.run_id == Some(run_id)
    }

    fn not_allowed(&self, action: &'static str) -> TransitionError {
        TransitionError::NotAllowed { screen: self.screen, action }
    }
}

/// Computes the next view. Results from a run that is no longer current leave the view unchanged.
pub fn reduce(view: &AppView, action: Action) -> Result<AppView, TransitionError> {
    let label = action.label();
    match action {
        Action::BeginAnalysis { run_id, image } => {
            if view.screen != Screen::Upload {
                return Err(view.not_allowed(label));
            }
            Ok(AppView {
                screen: Screen::Analyzing,
                run_id: Some(run_id),
                original_image: Some(image),
                ..AppView::default()
            })
        }
        Action::AnalysisSucceeded { run_id, analysis } => {
            if !view.is_current(run_id) || view.screen != Screen::Analyzing {
                return Ok(view.clone());
            }
            Ok(AppView {
                screen: Screen::Selection,
                analysis: Some(analysis),
                failed: BTreeSet::new(),
                selected: None,
                error_message: None,
                ..view.clone()
            })
        }
        Action::AnalysisFailed { run_id } => {
            if !view.is_current(run_id) || view.screen != Screen::Analyzing {
                return Ok(view.clone());
            }
            Ok(AppView {
                screen: Screen::Error,
                analysis: None,
                selected: None,
                error_message: Some(ANALYSIS_ERROR_MESSAGE.to_string()),
                ..view.clone()
            })
        }
        Action::GenerationSettled { run_id, index, outcome } => {
            if !view.is_current(run_id) {
                return Ok(view.clone());
            }
            let Some(analysis) = &view.analysis else { return Ok(view.clone()) };
            let Some(current) = analysis.suggestions.get(index) else { return Ok(view.clone()) };
            // settled once: a ready image or a recorded failure is final
            if current.generated_image_url.is_some() || view.failed.contains(&index) {
                return Ok(view.clone());
            }
            let mut next = view.clone();
            match outcome {
                Ok(url) => {
                    if let Some(suggestion) = next.analysis.as_mut().and_then(|a| a.suggestions.get_mut(index)) {
                        suggestion.generated_image_url = Some(url);
                    }
                }
                Err(_) => {
                    next.failed.insert(index);
                }
            }
            Ok(next)
        }
        Action::Select(index) => {
            if view.screen != Screen::Selection {
                return Err(view.not_allowed(label));
            }
            match view.card_status(index) {
                None => Err(TransitionError::UnknownSuggestion(index)),
                Some(CardStatus::Ready) => Ok(AppView { screen: Screen::Result, selected: Some(index), ..view.clone() }),
                Some(_) => Err(TransitionError::NotReady(index)),
            }
        }
        Action::BackToSelection => {
            if view.screen != Screen::Result {
                return Err(view.not_allowed(label));
            }
            Ok(AppView { screen: Screen::Selection, selected: None, ..view.clone() })
        }
        Action::Reset => Ok(AppView::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::tests::sample_analysis;
    use pretty_assertions::assert_eq;

    fn image() -> EncodedImage {
        EncodedImage { mime_type: "image/jpeg".into(), data: "/9j/AAAA".into() }
    }

    fn selection(run_id: Uuid) -> AppView {
        let view = reduce(&AppView::default(), Action::BeginAnalysis { run_id, image: image() }).unwrap();
        reduce(&view, Action::AnalysisSucceeded { run_id, analysis: sample_analysis() }).unwrap()
    }

    fn settled(run_id: Uuid, index: usize, url: &str) -> Action {
        Action::GenerationSettled { run_id, index, outcome: Ok(url.to_string()) }
    }

    fn failed(run_id: Uuid, index: usize) -> Action {
        Action::GenerationSettled { run_id, index, outcome: Err(GenerationFailure::NoImage) }
    }

    #[test]
    fn successful_analysis_moves_to_selection_with_pending_cards() {
        let view = selection(Uuid::new_v4());
        assert_eq!(view.screen, Screen::Selection);
        let cards = view.cards();
        assert_eq!(cards.len(), 7);
        assert!(cards.iter().all(|c| c.status == CardStatus::Pending && !c.selectable));
    }

    #[test]
    fn failed_analysis_moves_to_error_and_reset_clears_everything() {
        let run_id = Uuid::new_v4();
        let view = reduce(&AppView::default(), Action::BeginAnalysis { run_id, image: image() }).unwrap();
        let view = reduce(&view, Action::AnalysisFailed { run_id }).unwrap();
        assert_eq!(view.screen, Screen::Error);
        assert_eq!(view.error_message.as_deref(), Some(ANALYSIS_ERROR_MESSAGE));
        assert!(view.analysis.is_none());

        assert!(matches!(reduce(&view, Action::Select(0)), Err(TransitionError::NotAllowed { screen: Screen::Error, .. })));
        assert!(reduce(&view, Action::BeginAnalysis { run_id: Uuid::new_v4(), image: image() }).is_err());

        let view = reduce(&view, Action::Reset).unwrap();
        assert_eq!(view, AppView::default());
    }

    #[test]
    fn reset_from_every_screen_returns_to_empty_upload() {
        let run_id = Uuid::new_v4();
        let analyzing = reduce(&AppView::default(), Action::BeginAnalysis { run_id, image: image() }).unwrap();
        let selection = selection(run_id);
        let ready = reduce(&selection, settled(run_id, 0, "data:image/png;base64,AA")).unwrap();
        let result = reduce(&ready, Action::Select(0)).unwrap();
        for view in [analyzing, selection, result] {
            assert_eq!(reduce(&view, Action::Reset).unwrap(), AppView::default());
        }
    }

    #[test]
    fn applying_the_same_result_twice_is_idempotent() {
        let run_id = Uuid::new_v4();
        let view = selection(run_id);
        let once = reduce(&view, settled(run_id, 2, "data:image/png;base64,AA")).unwrap();
        let twice = reduce(&once, settled(run_id, 2, "data:image/png;base64,AA")).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn results_for_different_indices_commute() {
        let run_id = Uuid::new_v4();
        let view = selection(run_id);
        let i = settled(run_id, 1, "data:image/png;base64,ONE");
        let j = settled(run_id, 5, "data:image/png;base64,FIVE");
        let ij = reduce(&reduce(&view, i.clone()).unwrap(), j.clone()).unwrap();
        let ji = reduce(&reduce(&view, j).unwrap(), i).unwrap();
        assert_eq!(ij, ji);
        assert_eq!(ij.analysis.as_ref().unwrap().ready_count(), 2);
    }

    #[test]
    fn failure_is_isolated_to_its_index() {
        let run_id = Uuid::new_v4();
        let view = reduce(&selection(run_id), settled(run_id, 0, "data:image/png;base64,AA")).unwrap();
        let after = reduce(&view, failed(run_id, 3)).unwrap();

        assert_eq!(after.card_status(3), Some(CardStatus::Failed));
        assert_eq!(after.screen, view.screen);
        let before = view.analysis.unwrap();
        let now = after.analysis.unwrap();
        assert_eq!(before, now);
        assert_eq!(now.suggestions[0].generated_image_url.as_deref(), Some("data:image/png;base64,AA"));
    }

    #[test]
    fn failed_generation_stays_failed() {
        let run_id = Uuid::new_v4();
        let view = reduce(&selection(run_id), failed(run_id, 4)).unwrap();
        let view = reduce(&view, settled(run_id, 4, "data:image/png;base64,LATE")).unwrap();
        assert_eq!(view.card_status(4), Some(CardStatus::Failed));
        assert!(view.analysis.unwrap().suggestions[4].generated_image_url.is_none());
    }

    #[test]
    fn stale_run_results_are_ignored() {
        let old_run = Uuid::new_v4();
        let view = selection(old_run);
        let reset = reduce(&view, Action::Reset).unwrap();
        assert_eq!(reduce(&reset, settled(old_run, 0, "data:image/png;base64,AA")).unwrap(), reset);

        let new_run = Uuid::new_v4();
        let fresh = selection(new_run);
        assert_eq!(reduce(&fresh, settled(old_run, 0, "data:image/png;base64,AA")).unwrap(), fresh);
        assert_eq!(
            reduce(&fresh, Action::AnalysisSucceeded { run_id: old_run, analysis: sample_analysis() }).unwrap(),
            fresh
        );
    }

    #[test]
    fn selection_requires_a_ready_suggestion() {
        let run_id = Uuid::new_v4();
        let view = reduce(&selection(run_id), settled(run_id, 6, "data:image/png;base64,AA")).unwrap();
        assert_eq!(reduce(&view, Action::Select(0)), Err(TransitionError::NotReady(0)));
        assert_eq!(reduce(&view, Action::Select(9)), Err(TransitionError::UnknownSuggestion(9)));

        let result = reduce(&view, Action::Select(6)).unwrap();
        assert_eq!(result.screen, Screen::Result);
        assert_eq!(result.selected_suggestion().unwrap().name, "Estilo 6");
        assert!(result.cards().iter().all(|c| !c.selectable));

        let back = reduce(&result, Action::BackToSelection).unwrap();
        assert_eq!(back.screen, Screen::Selection);
        assert_eq!(back.selected, None);
        assert_eq!(back.analysis, result.analysis);
    }

    #[test]
    fn generations_keep_landing_while_viewing_a_result() {
        let run_id = Uuid::new_v4();
        let view = reduce(&selection(run_id), settled(run_id, 0, "data:image/png;base64,AA")).unwrap();
        let result = reduce(&view, Action::Select(0)).unwrap();
        let result = reduce(&result, settled(run_id, 1, "data:image/png;base64,BB")).unwrap();
        assert_eq!(result.screen, Screen::Result);
        assert_eq!(result.selected, Some(0));
        assert_eq!(result.card_status(1), Some(CardStatus::Ready));
    }

    #[test]
    fn back_is_only_valid_from_result() {
        let view = selection(Uuid::new_v4());
        assert!(matches!(
            reduce(&view, Action::BackToSelection),
            Err(TransitionError::NotAllowed { screen: Screen::Selection, .. })
        ));
    }
}
