pub mod dispatcher;
pub mod handler;
pub mod registry;

use crate::conversation::Conversation;
use crate::engine::Orchestrator;
use std::path::PathBuf;

pub use dispatcher::create_command_registry;

/// Everything a chat session owns: its conversation and the engine driving it.
pub struct ChatState {
    pub conversation: Conversation,
    pub orchestrator: Orchestrator,
    /// Where `/save`, `/load`, `/list` and `/delete` operate
    pub history_dir: PathBuf,
    pub should_continue: bool,
}

impl ChatState {
    pub fn new(conversation: Conversation, orchestrator: Orchestrator, history_dir: PathBuf) -> Self {
        Self {
            conversation,
            orchestrator,
            history_dir,
            should_continue: true,
        }
    }
}
