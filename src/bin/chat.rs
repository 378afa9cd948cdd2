//! Terminal front end for the teammate session engine
//!
//! Lines typed on stdin are sent to the backend; replies are revealed as
//! they arrive in the store. Slash commands manage pinned context, notes and
//! tasks (see `/help`).

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use teammate::commands::{self, Command, HELP, QUICK_PROMPTS};
use teammate::config::ClientConfig;
use teammate::conversation::Conversation;
use teammate::db::Database;
use teammate::delivery::DeliverySimulator;
use teammate::persistence::{MemoryStore, SnapshotStore};
use teammate::session::{Change, Message, SessionStore, StoreResult, TaskStatus};
use teammate::transport::HttpTransport;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Chat = Conversation<HttpTransport>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they stay out of the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teammate=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env();
    let persistence = open_persistence(config.db_path.as_deref());
    let store = Arc::new(SessionStore::restore(persistence));
    let transport = HttpTransport::new(&config.endpoint, config.http_timeout)?;
    let simulator = DeliverySimulator::new(config.tick, config.granularity);
    let chat = Arc::new(Conversation::new(Arc::clone(&store), transport, simulator));

    tokio::spawn(render(store.subscribe()));

    println!(
        "teammate chat, backend {} ({} messages restored). /help for commands.",
        config.endpoint,
        store.messages().len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => run(&chat, command).await,
            Err(e) => eprintln!("{e}"),
        }
    }

    chat.stop().await;
    Ok(())
}

fn open_persistence(path: Option<&Path>) -> Arc<dyn SnapshotStore> {
    let Some(path) = path else {
        return Arc::new(MemoryStore::new());
    };
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(error = %e, "Failed to create database directory");
        }
    }
    match Database::open(path) {
        Ok(db) => {
            tracing::info!(path = %path.display(), "Opened session database");
            Arc::new(db)
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "Database unavailable, session will not be saved");
            Arc::new(MemoryStore::new())
        }
    }
}

// ============================================================
// Rendering
// ============================================================

/// Print the newly revealed part of the active assistant message
async fn render(mut updates: broadcast::Receiver<teammate::session::StoreUpdate>) {
    let mut current: Option<String> = None;
    let mut printed = 0;
    let mut out = std::io::stdout();

    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            // The next update carries the full snapshot, so nothing is lost
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };

        if let Some(active) = update.snapshot.active_assistant_message() {
            if current.as_deref() != Some(active.id.as_str()) {
                current = Some(active.id.clone());
                printed = 0;
                let _ = write!(out, "\nassistant> ");
            }
            if let Some(fresh) = active.content.get(printed..) {
                let _ = write!(out, "{fresh}");
                printed = active.content.len();
            }
            let _ = out.flush();
        }

        if update.change == Change::AssistantMessageFinished && current.take().is_some() {
            let _ = writeln!(out, "\n");
            let _ = out.flush();
        }
    }
}

// ============================================================
// Commands
// ============================================================

fn send(chat: &Arc<Chat>, text: String) {
    let chat = Arc::clone(chat);
    tokio::spawn(async move {
        if let Err(e) = chat.send(&text).await {
            eprintln!("{e}");
        }
    });
}

/// Message `number` (1-based), or the last assistant reply
fn pick_message(store: &SessionStore, number: Option<usize>) -> Option<Message> {
    match number {
        Some(n) => store.messages().into_iter().nth(n - 1),
        None => store.last_assistant_message(),
    }
}

fn report<T>(result: StoreResult<T>, describe: impl FnOnce(T) -> String) {
    match result {
        Ok(value) => println!("{}", describe(value)),
        Err(e) => eprintln!("{e}"),
    }
}

async fn run(chat: &Arc<Chat>, command: Command) {
    let store = chat.store();
    match command {
        Command::Send(text) => send(chat, text),
        Command::Stop => chat.stop().await,
        Command::Regenerate => {
            let chat = Arc::clone(chat);
            tokio::spawn(async move {
                match chat.regenerate().await {
                    Ok(Some(_)) => {}
                    Ok(None) => eprintln!("Nothing to regenerate"),
                    Err(e) => eprintln!("{e}"),
                }
            });
        }
        Command::Clear => {
            chat.clear_session().await;
            println!("Started a new session");
        }
        Command::Pin(items) => {
            let pinned = store.set_pinned_context(items);
            println!("Pinned {} item(s)", pinned.len());
        }
        Command::Pins => {
            let pinned = store.pinned_context();
            if pinned.is_empty() {
                println!("No pinned context");
            }
            for item in pinned {
                println!("- {item}");
            }
        }
        Command::Note(number) => match pick_message(store, number) {
            Some(message) => report(chat.add_note_from_message(&message.id), |note| {
                format!("Saved note: {}", note.title)
            }),
            None => eprintln!("No such message"),
        },
        Command::NewNote(fields) => {
            let note = store.create_note(fields);
            println!("Saved note: {}", note.title);
        }
        Command::Notes => {
            let notes = store.notes();
            if notes.is_empty() {
                println!("No notes");
            }
            for (i, note) in notes.iter().enumerate() {
                let tags = if note.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", note.tags.join(", "))
                };
                println!("{}. {}{}", i + 1, note.title, tags);
            }
        }
        Command::DeleteNote(n) => match store.notes().into_iter().nth(n - 1) {
            Some(note) => report(store.delete_note(&note.id), |note| {
                format!("Deleted note: {}", note.title)
            }),
            None => eprintln!("No note {n}"),
        },
        Command::Task(number) => match pick_message(store, number) {
            Some(message) => report(chat.create_task_from_message(&message.id), |task| {
                format!("Created task: {}", task.title)
            }),
            None => eprintln!("No such message"),
        },
        Command::NewTask(fields) => {
            let task = store.create_task(fields);
            println!("Created task: {}", task.title);
        }
        Command::Tasks => {
            let tasks = store.tasks();
            if tasks.is_empty() {
                println!("No tasks");
            }
            for (i, task) in tasks.iter().enumerate() {
                let mark = if task.status == TaskStatus::Done { "x" } else { " " };
                let due = task
                    .due_date
                    .map(|d| format!(" (due {d})"))
                    .unwrap_or_default();
                let tag = task.tag.as_ref().map(|t| format!(" #{t}")).unwrap_or_default();
                println!("{}. [{mark}] {}{due}{tag}", i + 1, task.title);
            }
        }
        Command::Toggle(n) => match store.tasks().into_iter().nth(n - 1) {
            Some(task) => report(store.toggle_task(&task.id), |task| {
                format!("{}: {}", task.title, task.status)
            }),
            None => eprintln!("No task {n}"),
        },
        Command::DeleteTask(n) => match store.tasks().into_iter().nth(n - 1) {
            Some(task) => report(store.delete_task(&task.id), |task| {
                format!("Deleted task: {}", task.title)
            }),
            None => eprintln!("No task {n}"),
        },
        Command::Copy(number) => match pick_message(store, number) {
            Some(message) => report(chat.copy_text(&message.id), |text| text),
            None => eprintln!("No such message"),
        },
        Command::Prompts => {
            let mut number = 1;
            for category in QUICK_PROMPTS {
                println!("{}", category.title);
                for item in category.items {
                    println!("  {number}. {item}");
                    number += 1;
                }
            }
        }
        Command::Prompt(n) => match commands::quick_prompt(n) {
            Some(prompt) => send(chat, prompt.to_string()),
            None => eprintln!("No prompt {n}"),
        },
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}
