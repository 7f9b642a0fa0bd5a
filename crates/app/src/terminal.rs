//! Line-oriented terminal chat over one conversation controller.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chat_host::{ConversationController, IgnoreReason, SubmitOutcome};
use shared::settings::ChatSettings;
use shared::{ConversationSnapshot, Sender, Turn, TurnId, UserInput};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use url::Url;

const HELP: &str = "Komutlar: /image <dosya-veya-url> [açıklama], /clear, /help, /quit";

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Image { source: String, caption: String },
    Clear,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Say(line.to_string());
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    match name {
        "quit" | "exit" => Command::Quit,
        "clear" => Command::Clear,
        "help" => Command::Help,
        "image" if !args.is_empty() => {
            let (source, caption) = match args.split_once(char::is_whitespace) {
                Some((source, caption)) => (source, caption.trim()),
                None => (args, ""),
            };
            Command::Image {
                source: source.to_string(),
                caption: caption.to_string(),
            }
        }
        other => Command::Unknown(other.to_string()),
    }
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Turn an `/image` argument into something the backend accepts: remote
/// URLs and data URIs pass through, local files become data URIs.
pub fn resolve_image(source: &str) -> Result<String> {
    if source.starts_with("data:") {
        return Ok(source.to_string());
    }
    if let Ok(url) = Url::parse(source) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(source.to_string());
        }
    }

    let path = Path::new(source);
    let bytes =
        std::fs::read(path).with_context(|| format!("could not read image {}", path.display()))?;
    if bytes.is_empty() {
        return Err(anyhow!("image {} is empty", path.display()));
    }
    Ok(format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)))
}

/// Prints turns as they appear in snapshots.
#[derive(Default)]
pub struct Renderer {
    last_seen: Option<TurnId>,
    was_pending: bool,
}

impl Renderer {
    /// Lines to print for this snapshot, given what was already shown.
    pub fn render(&mut self, snapshot: &ConversationSnapshot) -> Vec<String> {
        let mut lines: Vec<String> =
            snapshot.turns_after(self.last_seen).map(format_turn).collect();
        if let Some(last) = snapshot.last_turn() {
            self.last_seen = self.last_seen.max(Some(last.id()));
        }
        if snapshot.pending && !self.was_pending {
            lines.push("Asistan yazıyor...".to_string());
        }
        self.was_pending = snapshot.pending;
        lines
    }
}

fn format_turn(turn: &Turn) -> String {
    let mut line = format!("[{}] {}: ", turn.display_time(), turn.sender().label());
    if let Some(text) = turn.text() {
        line.push_str(text);
    }
    if turn.image().is_some() {
        if turn.text().is_some() {
            line.push(' ');
        }
        line.push_str("[görsel]");
    }
    if turn.sender() == Sender::Assistant {
        line.push('\n');
    }
    line
}

async fn render_loop(mut rx: watch::Receiver<ConversationSnapshot>) {
    let mut renderer = Renderer::default();
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        for line in renderer.render(&snapshot) {
            println!("{}", line);
        }
    }
}

fn submit(controller: &Arc<ConversationController>, input: UserInput) {
    let round = controller.spawn_submit(input);
    tokio::spawn(async move {
        if let Ok(SubmitOutcome::Ignored(IgnoreReason::Pending)) = round.await {
            eprintln!("Önceki mesajın yanıtı bekleniyor, lütfen bekleyin.");
        }
    });
}

pub async fn run(settings: ChatSettings) -> Result<()> {
    let controller = Arc::new(chat_host::openai_controller(&settings));
    let renderer = tokio::spawn(render_loop(controller.subscribe()));

    println!("LC Waikiki OneSearch ({} profili)", settings.profile);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        match parse_command(&line) {
            Command::Quit => break,
            Command::Clear => {
                controller.clear();
                println!("Sohbet temizlendi.");
            }
            Command::Help => println!("{}", HELP),
            Command::Unknown(name) => eprintln!("Bilinmeyen komut: /{}. {}", name, HELP),
            Command::Image { source, caption } => match resolve_image(&source) {
                Ok(image) => submit(&controller, UserInput::text(caption).with_image(image)),
                Err(e) => eprintln!("Görsel eklenemedi: {:#}", e),
            },
            Command::Say(text) => submit(&controller, UserInput::text(text)),
        }
    }

    // Let an in-flight round land before leaving. Once the last controller
    // handle is gone the render loop drains and exits.
    let mut rx = controller.subscribe();
    let _ = rx.wait_for(|s| !s.pending).await;
    drop(rx);
    drop(controller);
    let _ = renderer.await;
    Ok(())
}
