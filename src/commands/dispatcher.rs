use super::{
    ChatState,
    handler::{
        ClearCommand, DeleteHistoryCommand, DisplayCommand, HelpCommand, HistoryCommand,
        ListHistoryCommand, LoadHistoryCommand, ModelCommand, QuitCommand, SaveHistoryCommand,
        ToolsCommand,
    },
    registry::CommandRegistry,
};
use crate::core::error::ChatError;
use std::sync::Arc;

#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Arc<CommandRegistry>,
}

impl CommandDispatcher {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    pub fn execute(
        &self,
        command: &str,
        args: &[&str],
        state: &mut ChatState,
    ) -> Result<Option<String>, ChatError> {
        self.registry.execute(command, args, state)
    }

    /// Runs a `/command arg...` line; `None` if `line` is not a command.
    pub fn execute_line(
        &self,
        line: &str,
        state: &mut ChatState,
    ) -> Option<Result<Option<String>, ChatError>> {
        let rest = line.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let Some(command) = parts.next() else {
            return Some(Ok(None));
        };
        let args: Vec<&str> = parts.collect();
        Some(self.execute(command, &args, state))
    }

    pub fn get_command_names(&self) -> Vec<String> {
        self.registry.get_command_names()
    }
}

pub fn create_command_registry() -> Result<CommandDispatcher, ChatError> {
    let mut registry = CommandRegistry::new();

    registry.register("quit", QuitCommand);
    registry.register("clear", ClearCommand);
    registry.register("model", ModelCommand);
    registry.register("tools", ToolsCommand);
    registry.register("history", HistoryCommand);
    registry.register("save", SaveHistoryCommand);
    registry.register("load", LoadHistoryCommand);
    registry.register("list", ListHistoryCommand);
    registry.register("delete", DeleteHistoryCommand);
    registry.register("display", DisplayCommand);
    registry.alias("exit", "quit")?;

    let mut lines = registry.help_lines();
    lines.push(HelpCommand::USAGE);
    lines.sort_unstable();
    registry.register("help", HelpCommand::new(lines));
    registry.alias("?", "help")?;

    Ok(CommandDispatcher::new(Arc::new(registry)))
}
