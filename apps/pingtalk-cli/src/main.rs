use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pingtalk_chat::{
    invite_text, Author, BubbleBody, ChatConfig, ChatError, OutboundComposer, PresentationAdapter,
    RenderRow, RoomLobby, RoomView, StreamReconciler,
};
use pingtalk_store::{EnteredRooms, FsBlobStore, MemoryDocumentStore, RoomFilter};
use tracing::{debug, info, instrument, warn};

/// PingTalk - room chat in the terminal
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Nickname shown on your messages
    #[arg(short, long, default_value = "anonymous")]
    nickname: String,

    /// Directory for uploaded images
    #[arg(long, default_value = "blobs")]
    blob_dir: PathBuf,

    /// File recording the rooms you have already entered
    #[arg(long, default_value = "entered_rooms.json")]
    state_file: PathBuf,

    /// Room to enter on startup; created if it does not exist
    #[arg(short, long)]
    room: Option<String>,

    /// Password of the startup room
    #[arg(short, long)]
    password: Option<String>,
}

fn show_help() {
    println!("\n📖 Available Commands:");
    println!("  ┌──────────────────────────────────────────────────┐");
    println!("  │  help, ?, h               Show this help          │");
    println!("  │  rooms [fav|entered]      List rooms              │");
    println!("  │  create <title> <pw>      Create a room           │");
    println!("  │  enter <room> [pw]        Enter a room            │");
    println!("  │  leave                    Leave the current room  │");
    println!("  │  fav <room>               Toggle a favorite       │");
    println!("  │  image <path>             Send an image           │");
    println!("  │  invite                   Print the invite text   │");
    println!("  │  quit, exit, q            Exit                    │");
    println!("  └──────────────────────────────────────────────────┘");
    println!("\n💡 Any other input is sent as a message to the current room.");
}

struct Session {
    author: Author,
    lobby: RoomLobby,
    composer: OutboundComposer,
    view: RoomView,
    presenter: PresentationAdapter,
    shown: Vec<RenderRow>,
}

impl Session {
    fn current_room(&self) -> Option<String> {
        self.view.active_room().map(str::to_string)
    }

    #[instrument(skip(self, password))]
    async fn enter(&mut self, room_id: &str, password: Option<&str>) -> Result<(), ChatError> {
        let room = self.lobby.enter(room_id, password).await?;
        self.view.open_room(&room.id).await?;
        self.shown.clear();
        if let Err(e) = self.composer.announce_entry(&room.id, &self.author.nickname).await {
            // The room is usable without the notice
            warn!("Failed to announce entry: {}", e);
        }
        println!("🚪 Entered '{}' (created by {})", room.title, room.created_by);
        Ok(())
    }

    fn print_update(&mut self) {
        let rendered = self.presenter.render(self.view.rows());
        let start = if rendered.starts_with(&self.shown) {
            self.shown.len()
        } else {
            println!("── refreshed ──");
            0
        };
        for row in &rendered[start..] {
            print_row(row);
        }
        self.shown = rendered;
    }
}

fn print_row(row: &RenderRow) {
    match row {
        RenderRow::DateHeader { label } => println!("\n        ── {} ──", label),
        RenderRow::Bubble(bubble) => {
            let body = match &bubble.body {
                BubbleBody::Text(text) => text.clone(),
                BubbleBody::Image(url) => format!("🖼  {}", url),
            };
            match &bubble.sender_label {
                Some(sender) => println!("  {} [{}] {}", sender, bubble.time_label, body),
                None => println!("{:>40} [{}]", body, bubble.time_label),
            }
        }
    }
}

/// Returns `Ok(false)` when the session should end.
async fn run_command(input: &str, session: &mut Session) -> anyhow::Result<bool> {
    let mut parts = input.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();
    let arg1 = parts.next();
    let arg2 = parts.next();

    match (command, arg1, arg2) {
        ("help" | "?" | "h", _, _) => show_help(),
        ("quit" | "exit" | "q", _, _) => return Ok(false),
        ("rooms", filter, _) => {
            let filter = RoomFilter {
                favorites_only: filter == Some("fav"),
                entered_only: filter == Some("entered"),
            };
            let rooms = session.lobby.visible_rooms(filter).await?;
            if rooms.is_empty() {
                println!("No rooms");
            }
            for room in rooms {
                let mark = if session.lobby.entered().contains(&room.id) {
                    "✔"
                } else {
                    " "
                };
                println!("  {} {} (by {})", mark, room.title, room.created_by);
            }
        }
        ("create", Some(title), Some(password)) => {
            let room = session.lobby.create_room(title, password).await?;
            println!("🏠 Created room '{}'", room.id);
        }
        ("enter", Some(room), password) => session.enter(room, password).await?,
        ("leave", _, _) => {
            session.view.close_room();
            session.shown.clear();
            println!("👋 Left the room");
        }
        ("fav", Some(room), _) => {
            let now = session.lobby.toggle_favorite(room).await?;
            println!("{} {}", if now { "⭐" } else { "☆" }, room);
        }
        ("invite", _, _) => println!("{}", invite_text(&session.author.nickname)),
        ("image", Some(path), _) => {
            let room = session.current_room().context("Enter a room first")?;
            let raw = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path))?;
            session.composer.send_image(raw, &room, &session.author).await?;
        }
        _ => {
            let room = session.current_room().context("Enter a room first")?;
            session.composer.send_text(input, &room, &session.author).await?;
        }
    }
    Ok(true)
}

async fn process_command(input: &str, session: &mut Session) -> bool {
    match run_command(input, session).await {
        Ok(keep_running) => keep_running,
        Err(e) => {
            println!("❌ {}", e);
            true
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pingtalk=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = ChatConfig::default();

    let documents = Arc::new(MemoryDocumentStore::new());
    let blobs = Arc::new(
        FsBlobStore::new(args.blob_dir.clone())
            .await
            .context("Failed to open blob directory")?,
    );
    let entered = EnteredRooms::load(&args.state_file).context("Failed to load entered rooms")?;
    info!("Loaded {} entered rooms from {}", entered.len(), args.state_file.display());

    let mut session = Session {
        author: Author::new(args.nickname.clone()),
        lobby: RoomLobby::new(documents.clone(), entered, args.nickname.clone()),
        composer: OutboundComposer::new(documents.clone(), blobs, config.clone()),
        view: RoomView::new(documents, StreamReconciler::from_config(&config)),
        presenter: PresentationAdapter::from_config(args.nickname.clone(), &config),
        shown: Vec::new(),
    };

    println!("Welcome to PingTalk, {}! Type 'help' for commands.", args.nickname);

    if let Some(room) = &args.room {
        let password = args.password.as_deref().unwrap_or_default();
        if let Err(e) = session.lobby.create_room(room, password).await {
            debug!("Startup room not created: {}", e);
        }
        if let Err(e) = session.enter(room, Some(password)).await {
            println!("❌ {}", e);
        }
    }

    // Stdin is read on its own task so the loop below can also wait on snapshots
    let (stdin_sender, mut stdin_receiver) = tokio::sync::mpsc::unbounded_channel::<String>();
    let stdin_handle = tokio::spawn(async move {
        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim().to_string();
            if !line.is_empty() && stdin_sender.send(line).is_err() {
                break;
            }
        }
    });

    let mut running = true;
    while running {
        print!("> ");
        io::stdout().flush()?;

        tokio::select! {
            Some(applied) = session.view.next_update() => {
                if applied {
                    session.print_update();
                }
            }

            input = stdin_receiver.recv() => match input {
                Some(input) => {
                    debug!("Processing user input: {}", input);
                    running = process_command(&input, &mut session).await;
                }
                None => running = false,
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                running = false;
            }
        }
    }

    println!("\n👋 Goodbye!");
    stdin_handle.abort();
    Ok(())
}
