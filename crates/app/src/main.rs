use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lyrix_core::lrc::{self, format_timestamp};
use lyrix_core::{
    Command, Driver, DriverHandle, EngineConfig, Key, KeyInput, LyricsEngine, LyricsHost, Requests,
    Timeline,
};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

fn main() -> lyrix_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            file,
            config,
            start,
            single_item,
            no_interactive,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(start) = start {
                config.start_index = start;
            }
            config.single_item_mode |= single_item;
            config.disable_interactivity |= no_interactive;
            run_play(&file, config)
        }
        Commands::Parse {
            file,
            output,
            words,
        } => run_parse(&file, output.as_deref(), words),
    }
}

fn load_config(path: Option<&Path>) -> lyrix_core::Result<EngineConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading engine configuration");
            EngineConfig::from_path(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn run_play(file: &Path, config: EngineConfig) -> lyrix_core::Result<()> {
    let text = std::fs::read_to_string(file)?;
    let engine = LyricsEngine::new(&text, config)?;
    tracing::info!(
        ?file,
        items = engine.timeline().len(),
        timed = engine.timeline().is_timed(),
        "starting playback"
    );

    let mut host = TerminalHost::new(engine.timeline());
    let (driver, handle) = Driver::new(engine);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async move {
        handle.play().await?;
        tokio::spawn(read_commands(handle));
        let engine = driver.run(&mut host).await;
        tracing::info!(line = engine.current_index(), "playback finished");
        Ok::<(), lyrix_core::LyrixError>(())
    });

    // The stdin reader sits in a blocking read that would hold up a normal drop.
    runtime.shutdown_background();
    result
}

/// Forwards stdin commands to the driver until stdin closes or `quit`.
async fn read_commands(handle: DriverHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "failed to read stdin");
                break;
            }
        };

        let command = match parse_command(&line) {
            Some(command) => command,
            None => {
                eprintln!("commands: <enter> | space | play | pause | goto <N> | quit");
                continue;
            }
        };

        let quit = command == Command::Shutdown;
        if handle.send(command).await.is_err() || quit {
            return;
        }
    }

    let _ = handle.shutdown().await;
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None | Some("space") => Some(Command::Key(KeyInput::pressed(Key::Space))),
        Some("play") => Some(Command::Play),
        Some("pause") => Some(Command::Pause),
        Some("goto") => parts.next()?.parse().ok().map(Command::SelectLine),
        Some("quit") | Some("q") => Some(Command::Shutdown),
        Some(_) => None,
    }
}

/// Prints the active item as it changes.
struct TerminalHost {
    items: Vec<(Option<i64>, String)>,
}

impl TerminalHost {
    fn new(timeline: &Timeline) -> Self {
        Self {
            items: timeline
                .items()
                .iter()
                .map(|item| (item.timestamp_ms, item.text.clone()))
                .collect(),
        }
    }
}

impl LyricsHost for TerminalHost {
    fn on_play(&mut self, time: Option<f64>, _requests: &mut Requests) {
        tracing::info!(?time, "playing");
    }

    fn on_pause(&mut self, _requests: &mut Requests) {
        tracing::info!("paused");
    }

    fn on_user_line_change(&mut self, index: usize, time: Option<f64>, _requests: &mut Requests) {
        tracing::info!(index, ?time, "jumped");
    }

    fn on_line_change(&mut self, index: usize, _time: Option<f64>, _requests: &mut Requests) {
        match self.items.get(index) {
            Some((Some(ms), text)) => println!("{} {text}", format_timestamp(*ms)),
            Some((None, text)) => println!("{index:>4} {text}"),
            None => {}
        }
    }
}

fn run_parse(file: &Path, output: Option<&Path>, words: bool) -> lyrix_core::Result<()> {
    tracing::info!(?file, ?output, words, "parsing lyrics");
    let text = std::fs::read_to_string(file)?;
    let config = EngineConfig::default();
    let lines = lrc::parse_lines(&text);
    let timeline = Timeline::from_lines(&lines, config.end_buffer_ms);

    let items: Vec<_> = timeline
        .items()
        .iter()
        .zip(timeline.delays())
        .zip(&lines)
        .enumerate()
        .map(|(index, ((item, delay), line))| {
            let mut entry = json!({
                "index": index,
                "text": item.text,
                "timestamp_ms": item.timestamp_ms,
                "delay_ms": delay,
            });
            if words {
                let words = lrc::parse_words(&line.source);
                let word_timeline = Timeline::from_words(&words, config.word_end_buffer_ms);
                entry["words"] = json!(words
                    .iter()
                    .zip(word_timeline.delays())
                    .map(|(word, delay)| json!({
                        "text": word.text,
                        "timestamp_ms": word.timestamp_ms,
                        "delay_ms": delay,
                    }))
                    .collect::<Vec<_>>());
            }
            entry
        })
        .collect();

    let document = json!({
        "timed": timeline.is_timed(),
        "end_buffer_ms": timeline.end_buffer_ms(),
        "items": items,
    });
    let rendered = serde_json::to_string_pretty(&document)?;

    match output {
        Some(path) => std::fs::write(path, rendered)?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Synchronized LRC lyrics player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a lyrics file in the terminal, reading controls from stdin.
    Play {
        /// LRC or plain text lyrics file.
        file: PathBuf,
        /// JSON engine configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Line to start from.
        #[arg(short, long)]
        start: Option<usize>,
        /// Show one line at a time and progress word by word.
        #[arg(long)]
        single_item: bool,
        /// Ignore line selection and key commands.
        #[arg(long)]
        no_interactive: bool,
    },
    /// Dump the parsed timeline as JSON.
    Parse {
        /// LRC or plain text lyrics file.
        file: PathBuf,
        /// Output path for the JSON document; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Include word-level timings for each line.
        #[arg(long)]
        words: bool,
    },
}
