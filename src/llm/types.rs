//! Common types for model invocation

use serde::{Deserialize, Serialize};

/// Instruction prepended to every prompt so answers come back as
/// sectioned markdown the formatter can structure
pub const HEADING_INSTRUCTION: &str = "IMPORTANT: Format your answer using markdown. \
Use '##' for each main section heading, and use bullet points for lists. \
Always start your answer with a heading. Example:\n\n\
## Main Topic\n- Point 1\n- Point 2\n\n\
## Another Section\n- Detail 1\n- Detail 2\n\n\
Now answer the following:\n";

/// Image attached to a prompt, base64 encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub data: String,
    pub media_type: String,
}

/// A single-turn generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub prompt: String,
    pub image: Option<ImageAttachment>,
}

impl ModelRequest {
    /// Build a request for a user prompt, adding the formatting instruction
    pub fn for_prompt(user_prompt: &str, image: Option<ImageAttachment>) -> Self {
        Self {
            prompt: format!("{HEADING_INSTRUCTION}{user_prompt}"),
            image,
        }
    }
}
