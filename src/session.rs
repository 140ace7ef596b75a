//! Conversation session state
//!
//! The single mutable container for what a viewer currently sees. Every
//! operation that replaces the visible conversation advances the turn
//! [`Generation`] and cancels the running reveal, so late deliveries from a
//! superseded turn fall on the floor.

use crate::db::ConversationTurn;
use crate::format::{format, render_html};
use crate::llm::ImageAttachment;
use crate::reveal::{Generation, RevealHandle};
use serde::Serialize;

/// What the viewer sees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_prompt_text: String,
    pub visible_response_text: String,
    pub is_awaiting_response: bool,
    pub attached_image: Option<ImageAttachment>,
    pub is_result_view_active: bool,
    /// Inline error shown in place of the response after a failed turn
    pub error: Option<String>,
}

/// Wire form of [`SessionState`]; image bytes stay server-side
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub current_prompt_text: String,
    pub visible_response_text: String,
    pub is_awaiting_response: bool,
    pub has_attached_image: bool,
    pub is_result_view_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub generation: Generation,
}

/// Session state plus the turn epoch and the active reveal
#[derive(Default)]
pub struct ConversationSession {
    state: SessionState,
    generation: Generation,
    reveal: Option<RevealHandle>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)] // Used in tests
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[allow(dead_code)] // Used in tests
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_prompt_text: self.state.current_prompt_text.clone(),
            visible_response_text: self.state.visible_response_text.clone(),
            is_awaiting_response: self.state.is_awaiting_response,
            has_attached_image: self.state.attached_image.is_some(),
            is_result_view_active: self.state.is_result_view_active,
            error: self.state.error.clone(),
            generation: self.generation,
        }
    }

    /// Clear everything the viewer sees. Safe to call repeatedly.
    pub fn start_new_conversation(&mut self) {
        self.supersede();
        self.state = SessionState::default();
    }

    /// Start a turn for `prompt` and return its generation
    pub fn begin_turn(
        &mut self,
        prompt: impl Into<String>,
        image: Option<ImageAttachment>,
    ) -> Generation {
        let generation = self.supersede();
        self.state = SessionState {
            current_prompt_text: prompt.into(),
            visible_response_text: String::new(),
            is_awaiting_response: true,
            attached_image: image,
            is_result_view_active: true,
            error: None,
        };
        generation
    }

    /// Set the visible text if `generation` is the active turn
    pub fn apply_update(&mut self, generation: Generation, text: String) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state.visible_response_text = text;
        true
    }

    /// Mark the turn's model call as finished
    pub fn complete_turn(&mut self, generation: Generation) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state.is_awaiting_response = false;
        self.state.attached_image = None;
        true
    }

    /// Mark the turn as failed and show `message` in place of the response
    pub fn fail_turn(&mut self, generation: Generation, message: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state.is_awaiting_response = false;
        self.state.attached_image = None;
        self.state.visible_response_text.clear();
        self.state.error = Some(message.into());
        true
    }

    /// Show a stored turn in full, without animation
    pub fn load_turn(&mut self, turn: &ConversationTurn) {
        self.supersede();
        self.state = SessionState {
            current_prompt_text: turn.prompt.clone(),
            visible_response_text: render_html(&format(&turn.response)),
            is_awaiting_response: false,
            attached_image: None,
            is_result_view_active: true,
            error: None,
        };
    }

    /// Keep `handle` as the active reveal if its turn is still current
    pub fn attach_reveal(&mut self, generation: Generation, handle: RevealHandle) {
        if generation != self.generation {
            handle.cancel();
            return;
        }
        if let Some(previous) = self.reveal.replace(handle) {
            previous.cancel();
        }
    }

    /// Stop any reveal and drop all visible state
    pub fn teardown(&mut self) {
        self.start_new_conversation();
    }

    fn supersede(&mut self) -> Generation {
        if let Some(handle) = self.reveal.take() {
            handle.cancel();
        }
        self.generation = self.generation.next();
        self.generation
    }
}
