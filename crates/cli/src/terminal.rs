use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use riverbed_tool_runtime::{StreamEvent, ToolResult, Usage};
use tracing::debug;

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const ASSISTANT_TEXT: Color = Color::Cyan;
    const THINKING: Color = Color::DarkGrey;
    const TOOL_CALL: Color = Color::Yellow;
    const TOOL_RESULT: Color = Color::DarkGreen;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Longest tool output shown before truncating.
const MAX_RESULT_CHARS: usize = 500;

/// Writes a run's events to stdout.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    pub fn print_banner(&self, model: &str, dialect: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("riverbed"),
            ResetColor,
            SetForegroundColor(Colors::DIM),
            Print(format!(" | Model: {} | Dialect: {}\n", model, dialect)),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Display a stream event with appropriate formatting.
    pub fn display_event(&self, event: &StreamEvent) -> Result<()> {
        let mut stdout = io::stdout();
        match event {
            StreamEvent::StreamStart { message_id, model } => {
                debug!(message_id = %message_id, model = %model, "Round-trip started");
            }
            StreamEvent::TextDelta { delta, .. } => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::ASSISTANT_TEXT),
                    Print(delta),
                    ResetColor,
                )?;
            }
            StreamEvent::ThinkingStart { .. } => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::THINKING),
                    Print("[thinking] "),
                    ResetColor,
                )?;
            }
            StreamEvent::ThinkingDelta { delta, .. } => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::THINKING),
                    Print(delta),
                    ResetColor,
                )?;
            }
            StreamEvent::ThinkingComplete { .. } | StreamEvent::TextComplete { .. } => {
                execute!(stdout, Print("\n"))?;
            }
            StreamEvent::TextStart { .. } => {}
            StreamEvent::Citation { citation, .. } => {
                let source = citation
                    .source_title
                    .as_deref()
                    .unwrap_or(citation.source_type.as_str());
                execute!(
                    stdout,
                    SetForegroundColor(Colors::DIM),
                    Print(format!(" [{}]", source)),
                    ResetColor,
                )?;
            }
            StreamEvent::ToolCall { tool_call, .. } => {
                execute!(
                    stdout,
                    SetForegroundColor(Colors::TOOL_CALL),
                    Print(format!("[tool: {}] {}\n", tool_call.name, tool_call.arguments)),
                    ResetColor,
                )?;
            }
            StreamEvent::ToolResult { result, .. } => self.display_tool_result(result)?,
            StreamEvent::StreamEnd { finish_reason, .. } => {
                debug!(?finish_reason, "Round-trip ended");
            }
            StreamEvent::Error { kind, message } => {
                execute!(
                    stdout,
                    Print("\n"),
                    SetForegroundColor(Colors::ERROR),
                    Print(format!("[{} error: {}]\n", kind, message)),
                    ResetColor,
                )?;
            }
        }
        stdout.flush()?;
        Ok(())
    }

    /// Print the final text of a non-streamed response.
    pub fn print_text(&self, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ASSISTANT_TEXT),
            Print(format!("{}\n", text)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn display_tool_result(&self, result: &ToolResult) -> Result<()> {
        let mut stdout = io::stdout();
        let (color, label) = if result.success {
            (Colors::TOOL_RESULT, "result")
        } else {
            (Colors::ERROR, "error")
        };

        execute!(
            stdout,
            SetForegroundColor(color),
            Print(format!(
                "  [{} {}]: {}\n",
                result.tool_name,
                label,
                truncate(&result.content_text())
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_usage(&self, usage: &Usage) -> Result<()> {
        let mut line = format!(
            "tokens: {} in, {} out",
            usage.prompt_tokens, usage.completion_tokens
        );
        if let Some(read) = usage.cache_read_tokens {
            line.push_str(&format!(", {} cache read", read));
        }
        if let Some(write) = usage.cache_write_tokens {
            line.push_str(&format!(", {} cache write", write));
        }
        self.print_info(&line)
    }

    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::ERROR),
            Print(format!("Error: {}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, msg: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", msg)),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }
}

fn truncate(content: &str) -> String {
    let total = content.chars().count();
    if total <= MAX_RESULT_CHARS {
        return content.to_string();
    }
    let head: String = content.chars().take(MAX_RESULT_CHARS).collect();
    format!("{}... ({} chars total)", head, total)
}
