use crate::commands::dispatcher::CommandDispatcher;
use crate::core::error::ChatError;

use console::style;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::FileHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, EditMode, Editor, Helper};
use std::path::PathBuf;

/// Completes `/command` names and hints from history.
pub struct ChatHelper {
    commands: Vec<String>,
    history_hinter: HistoryHinter,
}

impl ChatHelper {
    pub fn new(dispatcher: &CommandDispatcher) -> Self {
        Self {
            commands: dispatcher.get_command_names(),
            history_hinter: HistoryHinter {},
        }
    }
}

/// Candidates for a partially typed slash command, replacing from column 1.
fn complete_command(commands: &[String], line: &str, pos: usize) -> Option<(usize, Vec<Pair>)> {
    let typed = line.get(..pos)?.strip_prefix('/')?;
    if typed.contains(char::is_whitespace) {
        return None;
    }
    let matches: Vec<Pair> = commands
        .iter()
        .filter(|cmd| cmd.starts_with(typed))
        .map(|cmd| Pair {
            display: format!("/{}", cmd),
            replacement: cmd.to_string(),
        })
        .collect();
    (!matches.is_empty()).then_some((1, matches))
}

impl Completer for ChatHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(complete_command(&self.commands, line, pos).unwrap_or((pos, Vec::new())))
    }
}

impl Hinter for ChatHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.history_hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for ChatHelper {}

impl Validator for ChatHelper {}

impl Helper for ChatHelper {}

fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".toolchat")
        .join("input_history.txt")
}

pub fn create_editor(
    dispatcher: &CommandDispatcher,
) -> Result<Editor<ChatHelper, FileHistory>, ChatError> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .build();

    let mut editor = Editor::with_config(config)
        .map_err(|e| ChatError::Input(format!("Failed to create line editor: {}", e)))?;
    editor.set_helper(Some(ChatHelper::new(dispatcher)));

    // A missing history file is normal on first run.
    let _ = editor.load_history(&history_path());

    Ok(editor)
}

/// Reads one line; `None` means the user asked to leave (Ctrl-D).
pub fn read_input(
    editor: &mut Editor<ChatHelper, FileHistory>,
) -> Result<Option<String>, ChatError> {
    let prompt = style("> ").bold().cyan().to_string();
    match editor.readline(&prompt) {
        Ok(line) => {
            if !line.trim().is_empty() {
                editor
                    .add_history_entry(line.as_str())
                    .map_err(|e| ChatError::Input(format!("Failed to add history entry: {}", e)))?;
            }
            Ok(Some(line))
        }
        Err(ReadlineError::Interrupted) => {
            println!("{}", style("(Use /quit or Ctrl-D to exit)").dim());
            Ok(Some(String::new()))
        }
        Err(ReadlineError::Eof) => {
            println!("Exiting...");
            Ok(None)
        }
        Err(err) => Err(ChatError::Input(format!("Input error: {}", err))),
    }
}

pub fn save_history(editor: &mut Editor<ChatHelper, FileHistory>) -> Result<(), ChatError> {
    let path = history_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    editor
        .save_history(&path)
        .map_err(|e| ChatError::Input(format!("Failed to save history: {}", e)))
}
