use std::path::PathBuf;

use awr_daemon::{BroadcastMessage, Controller};
use awr_proto::config::Config;
use awr_proto::protocol::{Command, StreamRequest};
use awr_proto::radios::RadioCatalog;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const HELP: &str = "commands: list | play <name|url> | playlist <url> | stop | pause | status | quit";

#[derive(Parser, Debug)]
#[command(name = "awr", about = "Web radio player driving mplayer in slave mode")]
struct Cli {
    /// Config file (default: ~/.config/awr/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Radio catalog JSON, overrides `radios.radios_file`
    #[arg(long)]
    radios: Option<PathBuf>,
    /// Player binary, overrides `player.binary`
    #[arg(long)]
    player: Option<String>,
}

/// A custom tracing layer that forwards log messages to the broadcast channel
struct BroadcastLayer {
    sender: broadcast::Sender<BroadcastMessage>,
}

impl BroadcastLayer {
    fn new(sender: broadcast::Sender<BroadcastMessage>) -> Self {
        Self { sender }
    }
}

impl<S> tracing_subscriber::Layer<S> for BroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        // Only forward WARN and ERROR to the UI
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = format!("{} [{}] ", chrono::Local::now().format("%H:%M:%S"), level);
        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        // no receivers is OK
        let _ = self.sender.send(BroadcastMessage::Log(message));
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

/// One line typed by the user.
#[derive(Debug, PartialEq)]
enum UserInput {
    Send(Command),
    List,
    Status,
    Help,
    Quit,
    Invalid(String),
}

fn parse_line(line: &str, catalog: &RadioCatalog) -> Option<UserInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, arg) = match line.split_once(char::is_whitespace) {
        Some((w, a)) => (w, a.trim()),
        None => (line, ""),
    };
    let input = match (word, arg) {
        ("list", _) => UserInput::List,
        ("status", _) => UserInput::Status,
        ("help", _) => UserInput::Help,
        ("quit" | "exit", _) => UserInput::Quit,
        ("stop", _) => UserInput::Send(Command::Stop),
        ("pause", _) => UserInput::Send(Command::TogglePause),
        ("play" | "playlist", "") => UserInput::Invalid(format!("usage: {} <name|url>", word)),
        ("play", arg) => match catalog.find(arg) {
            Some(radio) => UserInput::Send(Command::Play {
                request: radio.to_request(),
            }),
            None if arg.contains("://") => UserInput::Send(Command::Play {
                request: StreamRequest::direct(arg, arg),
            }),
            None => UserInput::Invalid(format!("unknown radio: {}", arg)),
        },
        ("playlist", url) => UserInput::Send(Command::Play {
            request: StreamRequest::playlist(url, url),
        }),
        _ => UserInput::Invalid(format!("unknown command: {}", word)),
    };
    Some(input)
}

/// Next line typed by the user, decoded lossily.  `None` at EOF.
async fn read_input_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

async fn print_notifications(mut rx: broadcast::Receiver<BroadcastMessage>) {
    loop {
        match rx.recv().await {
            Ok(BroadcastMessage::StatusChanged { status, title }) => {
                println!("[{}] {}", status.label(), title.as_deref().unwrap_or("--"));
            }
            Ok(BroadcastMessage::StreamError) => {
                println!(
                    "Streaming error: the stream stopped unexpectedly. Check your internet connection."
                );
            }
            Ok(BroadcastMessage::Log(line)) => eprintln!("{}", line),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                eprintln!("(missed {} notifications)", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_catalog(catalog: &RadioCatalog) {
    if catalog.is_empty() {
        println!("no radios configured");
        return;
    }
    for genre in &catalog.genres {
        println!("{}", genre.name);
        for radio in &genre.radios {
            if radio.description.is_empty() {
                println!("  {}", radio.name);
            } else {
                println!("  {} - {}", radio.name, radio.description);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup broadcast channel first so we can use it for logging
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(100);

    let data_dir = awr_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("awr.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(BroadcastLayer::new(broadcast_tx.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,awr_daemon=debug")),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!(
        "Config loaded from: {:?}",
        cli.config.clone().unwrap_or_else(Config::config_path)
    );
    if let Some(player) = cli.player {
        config.player.binary = player;
    }

    let radios_path = cli
        .radios
        .unwrap_or_else(|| config.radios.radios_file.clone());
    let catalog = match RadioCatalog::load(&radios_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("No radio catalog at {}: {}", radios_path.display(), e);
            RadioCatalog::default()
        }
    };

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(64);
    let controller = Controller::new(&config.player, broadcast_tx.clone());
    let state_rx = controller.subscribe();
    let core = tokio::spawn(controller.run(cmd_rx));
    tokio::spawn(print_notifications(broadcast_rx));

    println!("{}", HELP);
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();
    loop {
        let line = match read_input_line(&mut stdin, &mut buf).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("awr: stdin read failed: {}", e);
                break;
            }
        };
        match parse_line(&line, &catalog) {
            None => {}
            Some(UserInput::Send(cmd)) => {
                if cmd_tx.send(cmd).await.is_err() {
                    warn!("awr: controller stopped, exiting");
                    break;
                }
            }
            Some(UserInput::List) => print_catalog(&catalog),
            Some(UserInput::Status) => match serde_json::to_string_pretty(&*state_rx.borrow()) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("awr: cannot render state: {}", e),
            },
            Some(UserInput::Help) => println!("{}", HELP),
            Some(UserInput::Quit) => break,
            Some(UserInput::Invalid(msg)) => eprintln!("{}", msg),
        }
    }

    info!("awr: exiting");
    let _ = cmd_tx.send(Command::Shutdown).await;
    core.await??;
    Ok(())
}
