use super::ChatState;
use crate::conversation::{Conversation, Role};
use crate::core::error::ChatError;
use crate::display::{self, DisplayMode};

use console::style;
use std::fs;
use std::path::{Path, PathBuf};

pub trait CommandHandler: Send + Sync {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, ChatError>;
    fn help(&self) -> &'static str;
}

pub struct QuitCommand;
pub struct HelpCommand {
    lines: Vec<&'static str>,
}
pub struct ClearCommand;
pub struct ModelCommand;
pub struct ToolsCommand;
pub struct HistoryCommand;
pub struct SaveHistoryCommand;
pub struct LoadHistoryCommand;
pub struct ListHistoryCommand;
pub struct DeleteHistoryCommand;
pub struct DisplayCommand;

/// Resolves a session file name inside `dir`, adding `.json` when there is no
/// extension. Names that could escape the directory are refused.
fn history_file(dir: &Path, name: &str) -> Result<PathBuf, ChatError> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(ChatError::Input(format!("Invalid history file name: {}", name)));
    }
    let file = if Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{}.json", name)
    };
    Ok(dir.join(file))
}

impl CommandHandler for QuitCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, ChatError> {
        state.should_continue = false;
        Ok(None)
    }

    fn help(&self) -> &'static str {
        "/quit (/exit) - Exit the chat session"
    }
}

impl HelpCommand {
    pub const USAGE: &'static str = "/help (/?) - Show available commands";

    pub fn new(lines: Vec<&'static str>) -> Self {
        Self { lines }
    }
}

impl CommandHandler for HelpCommand {
    fn execute(
        &self,
        _state: &mut ChatState,
        _args: &[&str],
    ) -> Result<Option<String>, ChatError> {
        let mut help_text = vec![style("Available Commands").bold().underlined().to_string()];
        help_text.extend(self.lines.iter().map(|line| style(line).to_string()));
        Ok(Some(help_text.join("\n")))
    }

    fn help(&self) -> &'static str {
        Self::USAGE
    }
}

impl CommandHandler for ClearCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, ChatError> {
        state.conversation.clear();
        Ok(Some("Chat history cleared.".to_string()))
    }

    fn help(&self) -> &'static str {
        "/clear - Clear conversation history"
    }
}

impl CommandHandler for ModelCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, ChatError> {
        match args.first() {
            None => Ok(Some(format!(
                "Current model: {}",
                state.orchestrator.provider().model()
            ))),
            Some(name) => {
                state.orchestrator.provider_mut().set_model(name);
                Ok(Some(format!(
                    "Model changed to: {}",
                    state.orchestrator.provider().model()
                )))
            }
        }
    }

    fn help(&self) -> &'static str {
        "/model [name] - Show or change the current model"
    }
}

impl CommandHandler for ToolsCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, ChatError> {
        Ok(Some(display::display_tools(state.orchestrator.registry())))
    }

    fn help(&self) -> &'static str {
        "/tools - List the tools the assistant can call"
    }
}

impl CommandHandler for HistoryCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, ChatError> {
        let lines: Vec<String> = state
            .conversation
            .visible_messages()
            .map(|msg| {
                let role = match msg.role {
                    Role::User => style("User").bold().green(),
                    _ => style("Assistant").bold().cyan(),
                };
                format!("{}: {}", role, msg.content)
            })
            .collect();

        if lines.is_empty() {
            Ok(Some("No messages yet.".to_string()))
        } else {
            Ok(Some(lines.join("\n")))
        }
    }

    fn help(&self) -> &'static str {
        "/history - Show the visible conversation so far"
    }
}

impl CommandHandler for SaveHistoryCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, ChatError> {
        let filename = match args.first() {
            Some(name) => name.to_string(),
            None => chrono::Local::now().format("%Y%m%d_%H%M%S.json").to_string(),
        };

        fs::create_dir_all(&state.history_dir)?;
        let path = history_file(&state.history_dir, &filename)?;

        let file = fs::File::create(&path)?;
        serde_json::to_writer_pretty(file, &state.conversation)?;

        Ok(Some(format!("History saved to: {}", path.display())))
    }

    fn help(&self) -> &'static str {
        "/save [filename] - Save the conversation to a file"
    }
}

impl CommandHandler for LoadHistoryCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, ChatError> {
        let Some(name) = args.first() else {
            return Ok(Some("Please specify a filename".to_string()));
        };

        let path = history_file(&state.history_dir, name)?;
        if !path.exists() {
            return Ok(Some(format!("File not found: {}", path.display())));
        }

        let file = fs::File::open(&path)?;
        let conversation: Conversation = serde_json::from_reader(file)?;
        conversation.validate()?;

        let count = conversation.visible_messages().count();
        state.conversation = conversation;
        Ok(Some(format!(
            "Loaded {} messages from: {}",
            count,
            path.display()
        )))
    }

    fn help(&self) -> &'static str {
        "/load <filename> - Load a saved conversation"
    }
}

impl CommandHandler for ListHistoryCommand {
    fn execute(&self, state: &mut ChatState, _args: &[&str]) -> Result<Option<String>, ChatError> {
        fs::create_dir_all(&state.history_dir)?;

        let mut files = Vec::new();
        for entry in fs::read_dir(&state.history_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();

        if files.is_empty() {
            Ok(Some("No history files found.".to_string()))
        } else {
            Ok(Some(files.join("\n")))
        }
    }

    fn help(&self) -> &'static str {
        "/list - List saved conversations"
    }
}

impl CommandHandler for DeleteHistoryCommand {
    fn execute(&self, state: &mut ChatState, args: &[&str]) -> Result<Option<String>, ChatError> {
        let Some(name) = args.first() else {
            return Ok(Some("Please specify a filename to delete".to_string()));
        };

        let path = history_file(&state.history_dir, name)?;
        if !path.exists() {
            return Ok(Some(format!("File not found: {}", path.display())));
        }

        fs::remove_file(&path)?;
        Ok(Some(format!("Deleted history file: {}", path.display())))
    }

    fn help(&self) -> &'static str {
        "/delete <filename> - Delete a saved conversation"
    }
}

impl CommandHandler for DisplayCommand {
    fn execute(&self, _state: &mut ChatState, args: &[&str]) -> Result<Option<String>, ChatError> {
        let Some(mode) = args.first() else {
            return Ok(Some(
                "Usage: /display <mode> where mode is: verbose, minimal, hidden, or help"
                    .to_string(),
            ));
        };

        let (mode, message) = match *mode {
            "verbose" => (
                DisplayMode::Verbose,
                "Display mode set to verbose - showing tool calls with arguments",
            ),
            "minimal" => (
                DisplayMode::Minimal,
                "Display mode set to minimal - one line per tool call",
            ),
            "hidden" => (
                DisplayMode::Hidden,
                "Display mode set to hidden - hiding all tool activity",
            ),
            "help" => return Ok(Some(display::display_mode_help())),
            _ => {
                return Ok(Some(
                    "Unknown display mode. Use: verbose, minimal, hidden, or help".to_string(),
                ));
            }
        };
        display::set_display_mode(mode);
        Ok(Some(message.to_string()))
    }

    fn help(&self) -> &'static str {
        "/display <mode> - Control tool activity visibility (verbose/minimal/hidden/help)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::create_command_registry;
    use crate::conversation::Message;
    use crate::engine::{EngineSettings, Orchestrator};
    use crate::providers::scripted::ScriptedProvider;
    use crate::tools::builtin::default_registry;
    use std::sync::Arc;

    fn state(dir: &Path) -> ChatState {
        let orchestrator = Orchestrator::new(
            Box::new(ScriptedProvider::new(Vec::new())),
            Arc::new(default_registry().unwrap()),
            EngineSettings::default(),
        );
        ChatState::new(Conversation::new("sys"), orchestrator, dir.to_path_buf())
    }

    fn run(state: &mut ChatState, line: &str) -> Result<Option<String>, ChatError> {
        create_command_registry()
            .unwrap()
            .execute_line(line, state)
            .expect("line is a command")
    }

    #[test]
    fn save_then_load_restores_the_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        state.conversation.begin_turn("weather in Paris?");
        state
            .conversation
            .push(Message::tool_result("Weather.get_weather", "sunny"))
            .unwrap();
        state
            .conversation
            .push(Message::assistant("It is sunny."))
            .unwrap();
        let saved = state.conversation.clone();

        let out = run(&mut state, "/save paris").unwrap().unwrap();
        assert!(out.contains("paris.json"));

        run(&mut state, "/clear").unwrap();
        assert_eq!(state.conversation.len(), 1);

        let out = run(&mut state, "/load paris").unwrap().unwrap();
        assert!(out.starts_with("Loaded 2 messages"));
        assert_eq!(state.conversation, saved);
    }

    #[test]
    fn load_rejects_files_breaking_the_system_message_rule() {
        let dir = tempfile::tempdir().unwrap();
        let bad = serde_json::json!({
            "messages": [{"role": "user", "content": "hi", "visibility": "visible"}],
            "turn": 1
        });
        fs::write(dir.path().join("bad.json"), bad.to_string()).unwrap();

        let mut state = state(dir.path());
        assert!(matches!(
            run(&mut state, "/load bad"),
            Err(ChatError::Input(_))
        ));
        assert_eq!(state.conversation.system_prompt(), "sys");
    }

    #[test]
    fn list_and_delete_stay_inside_the_history_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        assert_eq!(
            run(&mut state, "/list").unwrap().unwrap(),
            "No history files found."
        );

        run(&mut state, "/save one").unwrap();
        assert_eq!(run(&mut state, "/list").unwrap().unwrap(), "one.json");

        assert!(run(&mut state, "/delete ../one.json").is_err());
        assert!(
            run(&mut state, "/delete one")
                .unwrap()
                .unwrap()
                .starts_with("Deleted")
        );
        assert!(!dir.path().join("one.json").exists());
    }

    #[test]
    fn history_shows_only_visible_messages() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        state.conversation.begin_turn("2 + 3?");
        state
            .conversation
            .push(Message::tool_request("CALL_TOOL {\"name\": \"Math.sum_numbers\"}"))
            .unwrap();
        state
            .conversation
            .push(Message::tool_result("Math.sum_numbers", "5"))
            .unwrap();
        state.conversation.push(Message::assistant("5")).unwrap();

        let out = run(&mut state, "/history").unwrap().unwrap();
        assert!(out.contains("2 + 3?"));
        assert!(!out.contains("CALL_TOOL"));
        assert!(!out.contains("tool result"));
    }

    #[test]
    fn tools_and_help_list_their_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        let tools = run(&mut state, "/tools").unwrap().unwrap();
        assert!(tools.contains("Math.sum_numbers"));

        let help = run(&mut state, "/help").unwrap().unwrap();
        assert!(help.contains("/tools"));
        assert!(help.contains("/help"));
        assert_eq!(help.matches("/quit").count(), 1);
    }

    #[test]
    fn quit_stops_the_session_and_unknown_commands_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        assert!(matches!(
            run(&mut state, "/nope"),
            Err(ChatError::Input(_))
        ));
        assert!(state.should_continue);
        run(&mut state, "/exit").unwrap();
        assert!(!state.should_continue);
    }

    #[test]
    fn plain_text_is_not_a_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path());
        assert!(
            create_command_registry()
                .unwrap()
                .execute_line("hello", &mut state)
                .is_none()
        );
    }
}
