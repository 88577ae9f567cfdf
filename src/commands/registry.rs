use super::ChatState;
use super::handler::CommandHandler;
use crate::core::error::ChatError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Slash commands by name. Aliases point at a primary name and share its handler.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
    aliases: BTreeMap<String, String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: CommandHandler + 'static>(&mut self, name: &str, command: C) {
        self.aliases.remove(name);
        self.handlers.insert(name.to_string(), Arc::new(command));
    }

    /// Makes `/alias` run the command registered as `target`.
    pub fn alias(&mut self, alias: &str, target: &str) -> Result<(), ChatError> {
        if !self.handlers.contains_key(target) {
            return Err(ChatError::Config(format!(
                "Cannot alias /{} to unknown command /{}",
                alias, target
            )));
        }
        if self.handlers.contains_key(alias) {
            return Err(ChatError::Config(format!(
                "/{} is already a command",
                alias
            )));
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<&Arc<dyn CommandHandler>> {
        let primary = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.handlers.get(primary)
    }

    pub fn execute(
        &self,
        name: &str,
        args: &[&str],
        state: &mut ChatState,
    ) -> Result<Option<String>, ChatError> {
        match self.resolve(name) {
            Some(handler) => handler.execute(state, args),
            None => Err(ChatError::Input(match self.suggest(name) {
                Some(close) => format!("Unknown command: /{} (did you mean /{}?)", name, close),
                None => format!("Unknown command: /{} (try /help)", name),
            })),
        }
    }

    /// The only command starting with `prefix`, if exactly one does.
    fn suggest(&self, prefix: &str) -> Option<&str> {
        if prefix.is_empty() {
            return None;
        }
        let mut matches = self
            .get_names()
            .filter(|name| name.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    fn get_names(&self) -> impl Iterator<Item = &str> {
        self.handlers
            .keys()
            .chain(self.aliases.keys())
            .map(String::as_str)
    }

    /// Commands and aliases in alphabetical order, for completion.
    pub fn get_command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.get_names().map(str::to_string).collect();
        names.sort_unstable();
        names
    }

    /// One line per primary command; aliases are described by their target.
    pub fn help_lines(&self) -> Vec<&'static str> {
        self.handlers.values().map(|handler| handler.help()).collect()
    }
}
