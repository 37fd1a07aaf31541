//! Shared session artifacts: background, slide deck, drawing logs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Participant, ParticipantId, Role};

/// Shared background image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    pub image_data: String,
    pub filename: String,
    /// Display name of whoever set it
    pub set_by: String,
}

/// What a persisted drawing-log record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Committed freehand stroke
    Stroke,
    /// Completed text entry
    Text,
}

/// A persisted unit of input on the shared surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeRecord {
    pub author_id: ParticipantId,
    pub author_name: String,
    pub author_role: Role,
    pub kind: RecordKind,
    /// Tool-specific, opaque to the server
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_index: Option<usize>,
}

impl StrokeRecord {
    pub fn new(
        author: &Participant,
        kind: RecordKind,
        payload: serde_json::Value,
        slide_index: Option<usize>,
    ) -> Self {
        Self {
            author_id: author.id,
            author_name: author.display_name.clone(),
            author_role: author.role,
            kind,
            payload,
            timestamp: Utc::now(),
            slide_index,
        }
    }
}

/// Ephemeral chat message. Broadcast once, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub author_name: String,
    pub author_role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(author: &Participant, text: impl Into<String>) -> Self {
        Self {
            author_name: author.display_name.clone(),
            author_role: author.role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Serializable view of the store, sent to late joiners
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSnapshot {
    pub background: Option<Background>,
    pub slides: Vec<String>,
    pub current_slide: usize,
    pub slide_drawings: BTreeMap<usize, Vec<StrokeRecord>>,
    pub drawings: Vec<StrokeRecord>,
}

/// Per-room mutable state of the shared visual surface.
///
/// Invariant: `current_slide` is a valid index into `slides`, or 0 when
/// the deck is empty. Every content swap resets the deck position and
/// drops all per-slide logs.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    background: Option<Background>,
    slides: Vec<String>,
    current_slide: usize,
    slide_drawings: BTreeMap<usize, Vec<StrokeRecord>>,
    drawings: Vec<StrokeRecord>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    pub fn slides(&self) -> &[String] {
        &self.slides
    }

    pub fn current_slide(&self) -> usize {
        self.current_slide
    }

    pub fn drawings(&self) -> &[StrokeRecord] {
        &self.drawings
    }

    pub fn slide_log(&self, index: usize) -> &[StrokeRecord] {
        self.slide_drawings.get(&index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the background. Old annotations do not survive.
    pub fn set_background(&mut self, background: Background) {
        self.background = Some(background);
        self.reset_deck(Vec::new());
    }

    pub fn clear_background(&mut self) {
        self.background = None;
        self.reset_deck(Vec::new());
    }

    /// Replace the slide deck. Position always restarts at 0.
    pub fn replace_deck(&mut self, slides: Vec<String>) {
        self.reset_deck(slides);
    }

    fn reset_deck(&mut self, slides: Vec<String>) {
        self.slides = slides;
        self.current_slide = 0;
        self.slide_drawings.clear();
    }

    /// Whether `index` addresses the deck (0 is always valid on an empty deck)
    pub fn is_valid_slide(&self, index: usize) -> bool {
        index < self.slides.len() || (self.slides.is_empty() && index == 0)
    }

    /// Navigate. Returns false without mutation for an out-of-range index.
    pub fn change_slide(&mut self, index: usize) -> bool {
        if !self.is_valid_slide(index) {
            return false;
        }
        self.current_slide = index;
        true
    }

    /// Empty one slide's log. Returns false for an out-of-range index.
    pub fn clear_slide(&mut self, index: usize) -> bool {
        if !self.is_valid_slide(index) {
            return false;
        }
        self.slide_drawings.remove(&index);
        true
    }

    /// Append a committed record to the slide log it names, or the flat log.
    ///
    /// A record naming a slide outside the deck is rejected. Slide 0 of an
    /// empty deck is the plain canvas.
    pub fn record(&mut self, record: StrokeRecord) -> bool {
        match record.slide_index {
            Some(index) if !self.is_valid_slide(index) => return false,
            Some(index) if !self.slides.is_empty() => {
                self.slide_drawings.entry(index).or_default().push(record);
            }
            Some(_) | None => self.drawings.push(record),
        }
        true
    }

    /// Clear the flat log and the log of the slide on display
    pub fn clear_canvas(&mut self) {
        self.drawings.clear();
        self.slide_drawings.remove(&self.current_slide);
    }

    pub fn snapshot(&self) -> ArtifactSnapshot {
        ArtifactSnapshot {
            background: self.background.clone(),
            slides: self.slides.clone(),
            current_slide: self.current_slide,
            slide_drawings: self.slide_drawings.clone(),
            drawings: self.drawings.clone(),
        }
    }
}
