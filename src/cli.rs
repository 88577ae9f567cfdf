use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(author, version, about = "Chat with a model that can call local tools", long_about = None)]
pub struct Args {
    /// Question to ask; piped stdin is attached as context
    pub query: Option<String>,

    /// Start an interactive chat session
    #[arg(short, long)]
    pub chat: bool,

    /// Model provider [possible values: openai, openrouter, vllm, anthropic]
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use (provider-specific)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Ask a router turn whether a tool is needed before answering
    #[arg(long)]
    pub router: bool,

    /// Maximum tool calls per question
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub max_iterations: Option<usize>,

    /// Log more (-v info, -vv debug); TOOLCHAT_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
