use crate::tools::{ToolRegistry, ToolStatus};
use crate::utils::text::{display_width, truncate, wrap_text};
use console::style;
use serde_json::{Map, Value};
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

/// How much of the tool activity behind an answer is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Tool name, arguments and outcome
    Verbose,
    /// One line per tool call
    Minimal,
    Hidden,
}

static DISPLAY_MODE: AtomicU8 = AtomicU8::new(1);

pub fn set_display_mode(mode: DisplayMode) {
    let value = match mode {
        DisplayMode::Verbose => 0,
        DisplayMode::Minimal => 1,
        DisplayMode::Hidden => 2,
    };
    DISPLAY_MODE.store(value, Ordering::Relaxed);
}

pub fn display_mode() -> DisplayMode {
    match DISPLAY_MODE.load(Ordering::Relaxed) {
        0 => DisplayMode::Verbose,
        2 => DisplayMode::Hidden,
        _ => DisplayMode::Minimal,
    }
}

fn box_width(max: usize) -> usize {
    let terminal_width = console::Term::stdout().size().1 as usize;
    std::cmp::min(terminal_width.saturating_sub(4), max).max(40)
}

/// Writes a streamed fragment as-is.
pub fn print_token(token: &str) {
    print!("{}", token);
    let _ = io::stdout().flush();
}

pub fn display_tool_invocation(name: &str, arguments: &Map<String, Value>) {
    match display_mode() {
        DisplayMode::Hidden => {}
        DisplayMode::Minimal => {
            println!("{} {}", style("⚙").dim(), style(name).dim().cyan());
        }
        DisplayMode::Verbose => {
            let args = serde_json::to_string(arguments).unwrap_or_default();
            println!(
                "{} {} {}",
                style("⚙ calling").bold().cyan(),
                style(name).bold().white(),
                style(truncate(&args, box_width(100))).dim()
            );
        }
    }
}

pub fn display_tool_result(name: &str, status: ToolStatus) {
    if display_mode() != DisplayMode::Verbose {
        return;
    }
    let label = match status {
        ToolStatus::Ok => style("✓ done").green(),
        ToolStatus::NotFound => style("✗ not found").red(),
        ToolStatus::ExecutionError => style("✗ failed").red(),
    };
    println!("  {} {}", label, style(name).dim());
}

pub fn display_retry(reason: &str) {
    println!(
        "{} {}",
        style("↻").yellow(),
        style(format!("Model request failed ({}), retrying...", reason)).yellow()
    );
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", style("Error:").bold().red(), style(message).red());
}

pub fn display_cancelled() {
    println!("{}", style("Cancelled.").bold().red());
}

pub fn display_markdown(text: &str) {
    let skin = termimad::MadSkin::default();
    skin.print_text(text);
}

fn looks_like_markdown(text: &str) -> bool {
    text.contains("```") || text.contains('*') || text.contains('`') || text.contains('#')
}

/// Shows a complete answer, as markdown when it looks like markdown.
pub fn display_answer(text: &str) {
    if looks_like_markdown(text) {
        display_markdown(text);
    } else {
        display_response(text);
    }
}

/// Prints `response` inside a box sized to the terminal.
pub fn display_response(response: &str) {
    let max_width = box_width(120);
    let inner = max_width.saturating_sub(4);

    let lines: Vec<String> = response
        .lines()
        .flat_map(|line| {
            if line.is_empty() {
                vec![String::new()]
            } else {
                wrap_text(line, inner)
            }
        })
        .collect();

    let content_width = lines.iter().map(|l| display_width(l)).max().unwrap_or(0);
    let width = std::cmp::min(max_width, content_width + 4);
    let rule = "─".repeat(width.saturating_sub(2));

    println!("{}", style(format!("┌{}┐", rule)).dim().blue());
    for line in lines {
        let padding = width.saturating_sub(display_width(&line) + 3);
        println!("│ {}{}│", style(&line).white(), " ".repeat(padding));
    }
    println!("{}", style(format!("└{}┘", rule)).dim().blue());
}

pub fn display_tools(registry: &ToolRegistry) -> String {
    if registry.is_empty() {
        return "No tools registered.".to_string();
    }
    let mut lines = vec![style("Available Tools").bold().underlined().to_string()];
    lines.extend(
        registry
            .tools()
            .map(|tool| format!("  {}", style(tool.signature()).cyan())),
    );
    lines.join("\n")
}

pub fn display_mode_help() -> String {
    [
        style("Display Modes").bold().underlined().to_string(),
        "  verbose - show each tool call with its arguments and outcome".to_string(),
        "  minimal - show one line per tool call (default)".to_string(),
        "  hidden  - show only the answers".to_string(),
    ]
    .join("\n")
}
