use crate::cli::Args;
use crate::commands::{ChatState, dispatcher::CommandDispatcher};
use crate::config::Config;
use crate::conversation::Conversation;
use crate::core::error::ChatError;
use crate::display;
use crate::engine::prompts::tools_system_prompt;
use crate::engine::{EngineEvent, EngineSettings, Orchestrator};
use crate::input;
use crate::providers::LLMProvider;
use crate::tools::ToolRegistry;
use is_terminal::IsTerminal;
use std::io::{self, Read};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct Application {
    pub args: Args,
    pub config: Config,
    pub provider: Box<dyn LLMProvider>,
    pub registry: Arc<ToolRegistry>,
    pub command_dispatcher: CommandDispatcher,
}

impl Application {
    pub fn new(
        args: Args,
        config: Config,
        provider: Box<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        command_dispatcher: CommandDispatcher,
    ) -> Self {
        Self {
            args,
            config,
            provider,
            registry,
            command_dispatcher,
        }
    }

    pub async fn run(&self) -> Result<(), ChatError> {
        let context = if !io::stdin().is_terminal() {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| ChatError::Input(format!("Failed to read from stdin: {}", e)))?;
            Some(buffer)
        } else {
            None
        };

        if self.args.chat {
            self.handle_continuous_chat_mode().await
        } else {
            self.handle_chat_mode(context).await
        }
    }

    fn new_session(&self) -> (Conversation, Orchestrator) {
        let orchestrator = Orchestrator::new(
            self.provider.clone_provider(),
            self.registry.clone(),
            EngineSettings::from(&self.config.orchestration),
        );
        info!(
            session = %orchestrator.session_id(),
            model = self.provider.model(),
            tools = self.registry.len(),
            "session started"
        );
        (
            Conversation::new(tools_system_prompt(&self.registry)),
            orchestrator,
        )
    }

    async fn handle_chat_mode(&self, context: Option<String>) -> Result<(), ChatError> {
        let final_query = match (self.args.query.as_deref(), context) {
            (Some(arg_q), Some(stdin_ctx)) => format!("<pipe>{}</pipe>\n\n{}", stdin_ctx, arg_q),
            (None, Some(stdin_ctx)) => format!("<pipe>{}</pipe>", stdin_ctx),
            (Some(arg_q), None) => arg_q.to_string(),
            (None, None) => {
                return Err(ChatError::Input(
                    "No query provided (use --chat for an interactive session)".to_string(),
                ));
            }
        };

        let (mut conversation, orchestrator) = self.new_session();
        run_turn(
            &orchestrator,
            &mut conversation,
            &final_query,
            self.config.stream_tokens,
        )
        .await
    }

    async fn handle_continuous_chat_mode(&self) -> Result<(), ChatError> {
        let (conversation, orchestrator) = self.new_session();
        let mut state = ChatState::new(conversation, orchestrator, Config::history_dir());

        println!(
            "Entering chat mode with {} tools. Type '/help' for available commands. Press Ctrl+D or type /quit to exit.",
            self.registry.len()
        );

        let mut editor = input::create_editor(&self.command_dispatcher)?;

        loop {
            let input = match input::read_input(&mut editor)? {
                Some(input) => input.trim().to_string(),
                None => break,
            };

            if input.is_empty() {
                continue;
            }

            if let Some(result) = self.command_dispatcher.execute_line(&input, &mut state) {
                match result {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) => display::display_error(&e.to_string()),
                }
                if !state.should_continue {
                    break;
                }
                continue;
            }

            if let Err(e) = run_turn(
                &state.orchestrator,
                &mut state.conversation,
                &input,
                self.config.stream_tokens,
            )
            .await
            {
                display::display_error(&e.to_string());
            }
        }

        input::save_history(&mut editor)?;

        Ok(())
    }
}

/// Runs one turn with a live event printer. Ctrl-C cancels the turn only.
async fn run_turn(
    orchestrator: &Orchestrator,
    conversation: &mut Conversation,
    input: &str,
    stream_tokens: bool,
) -> Result<(), ChatError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let printer = tokio::spawn(render_events(rx, stream_tokens));
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = orchestrator
        .run_turn(conversation, input, &tx, &cancel)
        .await;

    watcher.abort();
    drop(tx);
    if let Err(e) = printer.await {
        debug!("event printer stopped: {}", e);
    }

    match result {
        Ok(outcome) => {
            debug!(
                termination = ?outcome.termination,
                dispatches = outcome.dispatches,
                "turn finished"
            );
            Ok(())
        }
        Err(ChatError::Cancelled) => {
            display::display_cancelled();
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn render_events(mut rx: mpsc::UnboundedReceiver<EngineEvent>, stream_tokens: bool) {
    // Text already printed for the current model response
    let mut shown = String::new();

    let end_line = |shown: &mut String| {
        if !shown.is_empty() && !shown.ends_with('\n') {
            println!();
        }
        shown.clear();
    };

    while let Some(event) = rx.recv().await {
        match event {
            EngineEvent::Token(token) => {
                if stream_tokens {
                    display::print_token(&token);
                    shown.push_str(&token);
                }
            }
            EngineEvent::ToolInvoked { name, arguments } => {
                end_line(&mut shown);
                display::display_tool_invocation(&name, &arguments);
            }
            EngineEvent::ToolCompleted { name, status } => {
                display::display_tool_result(&name, status);
            }
            EngineEvent::Retrying { reason } => {
                end_line(&mut shown);
                display::display_retry(&reason);
            }
            EngineEvent::Final(text) => {
                let already_shown = shown.trim() == text.trim();
                end_line(&mut shown);
                if !already_shown {
                    display::display_answer(&text);
                }
            }
            EngineEvent::Error(text) => {
                end_line(&mut shown);
                display::display_error(&text);
            }
        }
    }
}
