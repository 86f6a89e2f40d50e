use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use content_core::{
    export_file_name, ExportError, ExportFormat, GenerationRequest, GenerationResult,
    LanguageModel, Session, SessionError,
};
use thiserror::Error;

const PREVIEW_CHARS: usize = 60;

pub const HELP: &str = "\
Type a topic and press enter to generate content with the current settings.
Commands:
  /history               list generated entries
  /show N                print entry N
  /search TERM           list entries whose type, text or time matches TERM
  /export N FMT [PATH]   write entry N as txt, md, html or json
  /reuse N               generate again with the settings of entry N
  /clear                 forget all entries
  /help                  show this help
  /quit                  leave the session";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Empty,
    Generate(String),
    History,
    Show(usize),
    Search(String),
    Export {
        index: usize,
        format: ExportFormat,
        path: Option<PathBuf>,
    },
    Reuse(usize),
    Clear,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum ReplParseError {
    #[error("unknown command `{0}`; type /help for the list of commands")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not a valid entry number")]
    InvalidIndex(String),
    #[error("{0}")]
    Format(String),
}

impl From<ExportError> for ReplParseError {
    fn from(err: ExportError) -> Self {
        ReplParseError::Format(err.to_string())
    }
}

/// Parses one input line. Entry numbers are 1-based on input and 0-based in
/// the returned command.
pub fn parse_command(line: &str) -> Result<ReplCommand, ReplParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplCommand::Empty);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ReplCommand::Generate(line.to_string()));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let mut words = rest.split_whitespace();

    match name.to_ascii_lowercase().as_str() {
        "history" | "list" => Ok(ReplCommand::History),
        "show" => Ok(ReplCommand::Show(parse_index(words.next(), "/show N")?)),
        "search" => {
            if rest.is_empty() {
                Err(ReplParseError::Usage("/search TERM"))
            } else {
                Ok(ReplCommand::Search(rest.to_string()))
            }
        }
        "export" => {
            const USAGE: &str = "/export N FMT [PATH]";
            let index = parse_index(words.next(), USAGE)?;
            let format = words
                .next()
                .ok_or(ReplParseError::Usage(USAGE))?
                .parse::<ExportFormat>()?;
            let path = words.next().map(PathBuf::from);
            if words.next().is_some() {
                return Err(ReplParseError::Usage(USAGE));
            }
            Ok(ReplCommand::Export {
                index,
                format,
                path,
            })
        }
        "reuse" => Ok(ReplCommand::Reuse(parse_index(words.next(), "/reuse N")?)),
        "clear" => Ok(ReplCommand::Clear),
        "help" | "?" => Ok(ReplCommand::Help),
        "quit" | "exit" | "q" => Ok(ReplCommand::Quit),
        other => Err(ReplParseError::UnknownCommand(format!("/{other}"))),
    }
}

fn parse_index(word: Option<&str>, usage: &'static str) -> Result<usize, ReplParseError> {
    let word = word.ok_or(ReplParseError::Usage(usage))?;
    match word.trim_start_matches('#').parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(ReplParseError::InvalidIndex(word.to_string())),
    }
}

/// Reads commands from `input` until `/quit` or end of input.
///
/// Failures of individual commands are printed and the loop continues; only
/// I/O errors on the terminal itself end it early.
pub fn run<M, R, W>(
    session: &mut Session<'_, M>,
    template: &GenerationRequest,
    input: R,
    mut output: W,
) -> io::Result<()>
where
    M: LanguageModel,
    R: BufRead,
    W: Write,
{
    writeln!(
        output,
        "Generating {} with {} ({} tone, ~{} units, creativity {:.1}).",
        template.content_type.label(),
        template.model_id,
        template.tone,
        template.target_length,
        template.creativity
    )?;
    writeln!(output, "Type a topic, or /help for commands.")?;

    let mut lines = input.lines();
    loop {
        write!(output, "> ")?;
        output.flush()?;
        let Some(line) = lines.next().transpose()? else {
            writeln!(output)?;
            break;
        };

        if session.expire_if_idle() {
            writeln!(
                output,
                "Session was idle too long; history has been cleared."
            )?;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(err) => {
                writeln!(output, "{err}")?;
                continue;
            }
        };

        match command {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Help => writeln!(output, "{HELP}")?,
            ReplCommand::Generate(topic) => {
                let mut request = template.clone();
                request.topic = topic;
                match session.generate(request) {
                    Ok(result) => writeln!(output, "\n{}\n", result.text)?,
                    Err(err) => report_failure(&mut output, &err)?,
                }
            }
            ReplCommand::Reuse(index) => match session.regenerate(index) {
                Ok(result) => writeln!(output, "\n{}\n", result.text)?,
                Err(err) => report_failure(&mut output, &err)?,
            },
            ReplCommand::History => {
                let entries = session.history().list();
                if entries.is_empty() {
                    writeln!(output, "No content generated yet.")?;
                }
                for (index, result) in entries.iter().enumerate() {
                    writeln!(output, "{}", summary_line(index, result))?;
                }
            }
            ReplCommand::Search(term) => {
                let matches = session.history().search(&term);
                if matches.is_empty() {
                    writeln!(output, "No entries match `{term}`.")?;
                }
                for (index, result) in matches {
                    writeln!(output, "{}", summary_line(index, result))?;
                }
            }
            ReplCommand::Show(index) => match session.history().get(index) {
                Some(result) => {
                    writeln!(output, "{}", summary_line(index, result))?;
                    writeln!(output, "Topic: {}", result.request.topic)?;
                    writeln!(output, "\n{}\n", result.text)?;
                }
                None => writeln!(output, "History entry #{} does not exist.", index + 1)?,
            },
            ReplCommand::Export {
                index,
                format,
                path,
            } => match export_entry(session, index, format, path) {
                Ok(path) => writeln!(
                    output,
                    "Saved {} ({})",
                    path.display(),
                    format.mime_type()
                )?,
                Err(message) => writeln!(output, "Error: {message}")?,
            },
            ReplCommand::Clear => {
                session.clear_history();
                writeln!(output, "History cleared.")?;
            }
        }
    }

    Ok(())
}

fn report_failure<W: Write>(output: &mut W, err: &SessionError) -> io::Result<()> {
    writeln!(output, "Error: {err}")?;
    if err.is_transient() {
        writeln!(output, "This looks temporary; try again in a moment.")?;
    }
    Ok(())
}

fn export_entry<M: LanguageModel>(
    session: &Session<'_, M>,
    index: usize,
    format: ExportFormat,
    path: Option<PathBuf>,
) -> Result<PathBuf, String> {
    let bytes = session.export(index, format).map_err(|err| err.to_string())?;
    let path = match (path, session.history().get(index)) {
        (Some(path), _) => path,
        (None, Some(result)) => PathBuf::from(export_file_name(result, format)),
        (None, None) => return Err(format!("history entry #{} does not exist", index + 1)),
    };
    fs::write(&path, bytes).map_err(|err| format!("failed to write {}: {err}", path.display()))?;
    Ok(path)
}

fn summary_line(index: usize, result: &GenerationResult) -> String {
    let flattened = result.text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut preview: String = flattened.chars().take(PREVIEW_CHARS).collect();
    if flattened.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    format!(
        "#{:<3} {}  {:<20} {:<20} {}",
        index + 1,
        result.display_time(),
        result.request.content_type.label(),
        result.request.model_id,
        preview
    )
}
