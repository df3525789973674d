//! # Inkling - Write With a Second Pen
//!
//! A line-driven writing session: type text, ask for a continuation,
//! then keep it or throw it away.
//!
//! ## Quick Start
//!
//! ```bash
//! # Start with an empty page, using the offline stand-in
//! cargo run -- --substitute
//!
//! # Start from a file's content
//! cargo run -- notes.txt
//!
//! # Start from inline text
//! cargo run -- --text "It was a dark and stormy night."
//! ```
//!
//! Lines starting with `:` are commands (`:help` lists them); any other
//! line is typed at the cursor.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkling_ai::client_from_config;
use inkling_core::{
    Command, Config, CoordinatorEvent, EventHandler, GenerationEvent, GenerationState, KeyPress,
    Session,
};

/// Inkling - AI continuations you can accept or discard
#[derive(Parser, Debug)]
#[command(name = "inkling")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File whose content starts the session (never written back)
    #[arg(value_name = "FILE", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Text the session starts with
    #[arg(short, long)]
    text: Option<String>,

    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use the offline substitute instead of the AI service
    #[arg(short, long)]
    substitute: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    /// Plain text to type at the cursor
    Type(String),
    /// A generation command, with an optional anchor for continue
    Run(Command, Option<usize>),
    /// A key chord fed through the keymap
    Key(KeyPress),
    Newline,
    Backspace(usize),
    Cursor(usize),
    Undo,
    Redo,
    Show,
    Help,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Result<Self, String> {
        let Some(rest) = line.strip_prefix(':') else {
            return Ok(Input::Type(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let number = |arg: Option<&str>| -> Result<Option<usize>, String> {
            arg.map(|s| s.parse().map_err(|_| format!("not a position: {s}")))
                .transpose()
        };

        Ok(match name {
            "continue" | "c" => Input::Run(Command::Continue, number(parts.next())?),
            "accept" | "a" => Input::Run(Command::Accept, None),
            "discard" | "d" => Input::Run(Command::Discard, None),
            "retry" | "r" => Input::Run(Command::Retry, None),
            "dismiss" => Input::Run(Command::Dismiss, None),
            "key" | "k" => match parts.next().and_then(KeyPress::parse) {
                Some(key) => Input::Key(key),
                None => return Err("usage: :key <chord>, e.g. :key ctrl+enter".to_string()),
            },
            "newline" | "nl" => Input::Newline,
            "back" | "b" => Input::Backspace(number(parts.next())?.unwrap_or(1)),
            "cursor" => match number(parts.next())? {
                Some(pos) => Input::Cursor(pos),
                None => return Err("usage: :cursor <position>".to_string()),
            },
            "undo" | "u" => Input::Undo,
            "redo" => Input::Redo,
            "show" | "s" => Input::Show,
            "help" | "h" => Input::Help,
            "quit" | "q" => Input::Quit,
            other => return Err(format!("unknown command: :{other}")),
        })
    }
}

const HELP: &str = "\
Commands:
  :continue [pos]  ask for a continuation at the cursor (or at pos)
  :accept          keep the suggestion
  :discard         remove the suggestion
  :retry           try a failed generation again
  :dismiss         close the error
  :key <chord>     press a key chord, e.g. :key ctrl+enter
  :newline         type a line break
  :back [n]        delete n characters before the cursor
  :cursor <pos>    move the cursor
  :undo / :redo    undo or redo the last edit
  :show            print the document
  :quit            leave
Any other line is typed at the cursor.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting Inkling v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load(),
    };
    if args.substitute {
        config.ai.use_substitute = true;
    }

    let client = client_from_config(&config.ai);
    let session = match (&args.file, &args.text) {
        (Some(path), _) => Session::open(config, client, path)
            .with_context(|| format!("Failed to open {}", path.display()))?,
        (None, Some(text)) => Session::with_text(config, client, text),
        (None, None) => Session::new(config, client),
    };

    run(session).await
}

enum Wake {
    Line(Option<String>),
    Completion(GenerationEvent),
}

/// Reads input lines until `:quit` or end of input, applying generation
/// results as soon as they arrive.
async fn run(mut session: Session) -> anyhow::Result<()> {
    let mut events = EventHandler::new(session.subscribe());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!(
        "inkling ({}), :help for commands",
        session.coordinator().client_name()
    );
    render(&session);

    loop {
        let wake = if session.is_generating() {
            tokio::select! {
                line = lines.next_line() => Wake::Line(line?),
                Some(event) = session.next_completion() => Wake::Completion(event),
            }
        } else {
            Wake::Line(lines.next_line().await?)
        };

        match wake {
            Wake::Completion(event) => {
                session.handle(event)?;
                report(&mut events);
                render(&session);
            }
            Wake::Line(None) => break,
            Wake::Line(Some(line)) => match Input::parse(&line) {
                Ok(Input::Quit) => break,
                Ok(input) => {
                    if let Err(e) = execute(&mut session, input) {
                        eprintln!("error: {e}");
                    }
                    report(&mut events);
                }
                Err(message) => eprintln!("{message}"),
            },
        }
    }

    Ok(())
}

fn execute(session: &mut Session, input: Input) -> inkling_core::CoreResult<()> {
    match input {
        Input::Type(text) => session.insert_text(&text)?,
        Input::Newline => session.insert_text("\n")?,
        Input::Backspace(n) => {
            for _ in 0..n {
                session.delete_backward()?;
            }
        }
        Input::Cursor(pos) => session.set_cursor(pos)?,
        Input::Undo => session.undo()?,
        Input::Redo => session.redo()?,
        Input::Run(command, at) => {
            let outcome = match at {
                Some(pos) => session.run_command_at(command, pos)?,
                None => session.run_command(command)?,
            };
            if outcome.is_ignored() {
                println!("({} is not available while {})", command.id(), session.state());
            }
            if session.state() == GenerationState::Generating {
                println!("generating...");
                return Ok(());
            }
        }
        Input::Key(key) => {
            if session.press(key)?.is_ignored() {
                println!("(no binding for that key while {})", session.state());
            }
            if session.state() == GenerationState::Generating {
                println!("generating...");
                return Ok(());
            }
        }
        Input::Show => {}
        Input::Help => {
            println!("{HELP}");
            println!("Keys:");
            for command in Command::ALL {
                println!("  {:<20} {}", command.id(), session.key_hints(command).join(", "));
            }
            return Ok(());
        }
        Input::Quit => return Ok(()),
    }
    render(session);
    Ok(())
}

/// Prints notices for coordinator events worth telling the user about.
fn report(events: &mut EventHandler) {
    for event in events.drain() {
        match event {
            CoordinatorEvent::FallbackUsed => {
                println!("(offline suggestion: the AI service is out of quota)")
            }
            CoordinatorEvent::SuggestionDiscarded { implicit: true } => {
                println!("(suggestion deleted, treated as discarded)")
            }
            CoordinatorEvent::GenerationFailed { message, .. }
            | CoordinatorEvent::DocumentFailed { message }
            | CoordinatorEvent::IntegrityFault { message } => eprintln!("error: {message}"),
            _ => {}
        }
    }
}

/// Prints the document with the suggestion in brackets, then the state
/// and the commands it allows.
fn render(session: &Session) {
    println!("{}", decorate(&session.text(), session.provisional_spans().first()));

    let state = session.state();
    let available: Vec<&str> = Command::ALL
        .iter()
        .filter(|cmd| cmd.is_available(state))
        .map(|cmd| cmd.id())
        .collect();
    println!("-- {} [{}] --", state, available.join(", "));
}

fn decorate(text: &str, span: Option<&std::ops::Range<usize>>) -> String {
    let Some(span) = span else {
        return text.to_string();
    };
    let mut out = String::with_capacity(text.len() + 4);
    for (i, ch) in text.chars().enumerate() {
        if i == span.start {
            out.push('\u{27e6}');
        }
        if i == span.end {
            out.push('\u{27e7}');
        }
        out.push(ch);
    }
    if span.end == text.chars().count() {
        out.push('\u{27e7}');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["inkling"]);
        assert!(args.file.is_none());
        assert!(args.text.is_none());
        assert!(!args.substitute);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_args_with_file() {
        let args = Args::parse_from(["inkling", "-vv", "--substitute", "draft.txt"]);
        assert_eq!(args.file, Some(PathBuf::from("draft.txt")));
        assert!(args.substitute);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_file_and_text_conflict() {
        assert!(Args::try_parse_from(["inkling", "a.txt", "--text", "hi"]).is_err());
    }

    #[test]
    fn test_input_parsing() {
        assert_eq!(Input::parse("hello"), Ok(Input::Type("hello".into())));
        assert_eq!(
            Input::parse(":continue 4"),
            Ok(Input::Run(Command::Continue, Some(4)))
        );
        assert_eq!(Input::parse(":c"), Ok(Input::Run(Command::Continue, None)));
        assert_eq!(Input::parse(":back"), Ok(Input::Backspace(1)));
        assert_eq!(Input::parse(":q"), Ok(Input::Quit));
        assert!(matches!(Input::parse(":key ctrl+enter"), Ok(Input::Key(_))));
        assert!(Input::parse(":key").is_err());
        assert!(Input::parse(":cursor").is_err());
        assert!(Input::parse(":continue x").is_err());
        assert!(Input::parse(":bogus").is_err());
    }

    #[test]
    fn test_decorate_brackets_the_suggestion() {
        assert_eq!(decorate("ab cd", Some(&(2..5))), "ab\u{27e6} cd\u{27e7}");
        assert_eq!(decorate("ab cd", Some(&(0..2))), "\u{27e6}ab\u{27e7} cd");
        assert_eq!(decorate("ab", None), "ab");
    }
}
