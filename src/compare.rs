//! Before/after comparison widget.
//!
//! The slider keeps a reveal position in `[0, 100]`: the percentage of the
//! surface width showing the generated image over the original. Dragging is a
//! scoped subscription: pointer-down registers a move listener on the
//! document-level [`PointerScope`] and keeps the returned [`CaptureGuard`].
//! Moves only reach the slider through that listener, and dropping the guard
//! (pointer-up, cancel, mode switch, widget teardown) is the only way the
//! subscription ends.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::encoder::{decode_data_uri, EncodeError};

pub const INITIAL_POSITION: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompareMode {
    #[default]
    Slider,
    SideBySide,
    Single,
}

/// Horizontal geometry of the comparison surface in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub left: f64,
    pub width: f64,
}

/// Pointer input, mouse and touch alike. `Down` comes from the surface itself;
/// the rest are delivered at document scope so a drag survives leaving the widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PointerEvent {
    Down,
    Move { x: f64, surface: Surface },
    Up,
    Cancel,
}

/// `clamp(((x - left) / width) * 100, 0, 100)`; `None` for a degenerate surface.
pub fn reveal_position(x: f64, surface: Surface) -> Option<f64> {
    if !x.is_finite() || !surface.left.is_finite() || !surface.width.is_finite() || surface.width <= 0.0 {
        return None;
    }
    Some((((x - surface.left) / surface.width) * 100.0).clamp(0.0, 100.0))
}

type Listener = Box<dyn FnMut(&PointerEvent) + Send>;

/// Document-level pointer listeners. Events that are not aimed at the
/// comparison surface itself are delivered here.
#[derive(Clone, Default)]
pub struct PointerScope {
    listeners: Arc<Mutex<BTreeMap<u64, Listener>>>,
    next_id: Arc<AtomicU64>,
}

impl PointerScope {
    pub fn capture(&self, listener: impl FnMut(&PointerEvent) + Send + 'static) -> CaptureGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, Box::new(listener));
        CaptureGuard { id, listeners: Arc::clone(&self.listeners) }
    }

    /// Delivers `event` to every live listener; `false` when nobody is listening.
    pub fn dispatch(&self, event: &PointerEvent) -> bool {
        let mut listeners = self.listeners.lock();
        for listener in listeners.values_mut() {
            listener(event);
        }
        !listeners.is_empty()
    }
}

/// Live document-level subscription; unsubscribes on drop.
pub struct CaptureGuard {
    id: u64,
    listeners: Arc<Mutex<BTreeMap<u64, Listener>>>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.listeners.lock().remove(&self.id);
    }
}

pub struct ComparisonWidget {
    mode: CompareMode,
    position: Arc<Mutex<f64>>,
    scope: PointerScope,
    capture: Option<CaptureGuard>,
}

impl ComparisonWidget {
    pub fn new(scope: PointerScope) -> Self {
        Self { mode: CompareMode::Slider, position: Arc::new(Mutex::new(INITIAL_POSITION)), scope, capture: None }
    }

    pub fn is_dragging(&self) -> bool { self.capture.is_some() }

    pub fn set_mode(&mut self, mode: CompareMode) {
        if mode != CompareMode::Slider {
            self.capture = None;
        }
        self.mode = mode;
    }

    /// `Down` arrives from the surface and starts the drag; everything else
    /// goes through the document scope.
    pub fn handle(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down => {
                if self.mode == CompareMode::Slider && self.capture.is_none() {
                    let position = Arc::clone(&self.position);
                    self.capture = Some(self.scope.capture(move |event| {
                        if let PointerEvent::Move { x, surface } = *event {
                            if let Some(next) = reveal_position(x, surface) {
                                *position.lock() = next;
                            }
                        }
                    }));
                }
            }
            PointerEvent::Move { .. } => {
                if !self.scope.dispatch(&event) {
                    debug!("Ignoring pointer move with no drag in progress");
                }
            }
            PointerEvent::Up | PointerEvent::Cancel => {
                self.scope.dispatch(&event);
                self.capture = None;
            }
        }
    }

    /// Drops any capture and returns to the initial slider state.
    pub fn reset(&mut self) {
        self.capture = None;
        self.mode = CompareMode::Slider;
        *self.position.lock() = INITIAL_POSITION;
    }

    pub fn layout(&self, style_name: &str) -> ComparisonLayout {
        let position = *self.position.lock();
        let (reveal, before_label, after_label) = match self.mode {
            CompareMode::Slider => (position, Some("Original".to_string()), Some(format!("Estilo {}", style_name))),
            CompareMode::SideBySide => (50.0, Some("Original".to_string()), Some("Resultado".to_string())),
            CompareMode::Single => (100.0, None, None),
        };
        ComparisonLayout {
            mode: self.mode,
            position: reveal,
            after_clip_right: 100.0 - reveal,
            handle_left: (self.mode == CompareMode::Slider).then_some(reveal),
            dragging: self.is_dragging(),
            before_label,
            after_label,
            style_name: style_name.to_string(),
            download_name: download_file_name(style_name),
        }
    }
}

/// What the client needs to draw the widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonLayout {
    pub mode: CompareMode,
    pub position: f64,
    /// Right inset (percent) of the clip applied to the generated image.
    pub after_clip_right: f64,
    pub handle_left: Option<f64>,
    pub dragging: bool,
    pub before_label: Option<String>,
    pub after_label: Option<String>,
    pub style_name: String,
    pub download_name: String,
}

#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

pub fn download_file_name(style_name: &str) -> String {
    format!("redesign-{}.png", style_name)
}

pub fn download(style_name: &str, generated_image_url: &str) -> Result<Download, EncodeError> {
    let (mime_type, bytes) = decode_data_uri(generated_image_url)?;
    Ok(Download { file_name: download_file_name(style_name), mime_type, bytes: Bytes::from(bytes) })
}
