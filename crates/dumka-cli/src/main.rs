//! Dumka CLI - personal notes and journal client.

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};

use dumka_core::{
    classify_task, day_key, day_label, folder_label, highlight_segments, time_label, DumkaService,
    FeedRow, LocalFlags, NoteType, NotesBackend, Record, ReviewBanner, Segment, Swipe, ThreadItem,
};
use dumka_rest::RestBackend;
use dumka_sqlite::SqliteBackend;

const DUMKA_DIR: &str = ".dumka";
const DB_FILE: &str = "db.sqlite";
const STATE_FILE: &str = "state.json";

#[derive(Parser)]
#[command(name = "dumka", about = "Personal notes and journal client", version)]
struct Cli {
    /// User the working set is scoped to
    #[arg(long, env = "DUMKA_USER", default_value = "local", global = true)]
    user: String,

    /// REST root of the hosted notes service; the local database is used
    /// when unset
    #[arg(long, env = "DUMKA_URL", global = true)]
    url: Option<String>,

    /// API key for the hosted service
    #[arg(long, env = "DUMKA_API_KEY", global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new dumka workspace in the current directory
    Init {
        /// Delete existing data and reinitialize
        #[arg(long)]
        reinitialize: bool,
    },
    /// Add a note (reads from stdin if no text is given)
    Add {
        text: Option<String>,
    },
    /// Show the feed
    Ls {
        /// Show folder cards grouped by note type
        #[arg(long)]
        organized: bool,
        /// Show one folder: task, question, thread or note
        #[arg(long)]
        folder: Option<String>,
    },
    /// Edit a note's text (reads from stdin if no text is given)
    Edit {
        id: String,
        text: Option<String>,
    },
    /// Delete one or more notes
    Rm {
        /// Comma-separated note ids (prefixes allowed)
        ids: String,
    },
    /// Mark a task completed
    Done {
        id: String,
    },
    /// Mark a task not completed
    Undone {
        id: String,
    },
    /// Answer a question note; empty text clears the answer
    Answer {
        id: String,
        text: Option<String>,
    },
    /// Move a note to a new slot within its day (0-based)
    Move {
        id: String,
        slot: usize,
    },
    /// Reset a note's manual position back to chronological order
    Unmove {
        id: String,
    },
    /// Work with threads
    Thread {
        #[command(subcommand)]
        command: ThreadCommands,
    },
    /// Daily review of stale tasks
    Review {
        #[command(subcommand)]
        command: Option<ReviewCommands>,
    },
    /// Show the current usage streak
    Streak,
    /// Manage invite codes
    Invite {
        #[command(subcommand)]
        command: InviteCommands,
    },
    /// Poll the store and reprint the feed when it changes
    Watch {
        /// Poll interval in seconds
        #[arg(short = 'n', long, default_value = "30")]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum ThreadCommands {
    /// Fold two or more notes into a new thread
    New {
        /// Comma-separated source note ids
        ids: String,
    },
    /// Show a thread's items
    Show {
        id: String,
    },
    /// Append a note to a thread
    Add {
        id: String,
        text: Option<String>,
    },
    /// Edit one item's text
    Edit {
        id: String,
        index: usize,
        text: Option<String>,
    },
    /// Delete one item
    Rm {
        id: String,
        index: usize,
    },
    /// Mark one item completed (or not, with --undo)
    Check {
        id: String,
        index: usize,
        #[arg(long)]
        undo: bool,
    },
    /// Answer a question item; empty text clears the answer
    Answer {
        id: String,
        index: usize,
        text: Option<String>,
    },
    /// Set the thread title; empty clears it
    Title {
        id: String,
        title: Option<String>,
    },
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Show pending tasks and yesterday's numbers
    Status,
    /// Walk the pending tasks one by one (d = done, s = skip, q = quit)
    Start,
}

#[derive(Subcommand)]
enum InviteCommands {
    /// Create an invite code
    New,
    /// List invite codes
    Ls,
}

/// Find the .dumka directory by searching up from the current directory.
fn find_dumka_dir() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;
    loop {
        let dumka_path = current.join(DUMKA_DIR);
        if dumka_path.is_dir() {
            return Some(dumka_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

fn get_dumka_dir() -> Result<PathBuf> {
    match find_dumka_dir() {
        Some(dir) => Ok(dir),
        None => bail!("No .dumka directory found. Run 'dumka init' to initialize a workspace."),
    }
}

fn load_flags(path: &Path) -> LocalFlags {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return LocalFlags::default();
    };
    serde_json::from_str(&raw).unwrap_or_default()
}

fn save_flags(path: &Path, flags: &LocalFlags) -> Result<()> {
    let raw = serde_json::to_string_pretty(flags).context("Failed to serialize local state")?;
    std::fs::write(path, raw).context("Failed to write local state")
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read from stdin")?;
    Ok(buf)
}

fn is_stdin_tty() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn text_or_stdin(text: Option<String>) -> Result<String> {
    match text {
        Some(t) => Ok(t),
        None => read_stdin(),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Resolve a full id or unique prefix against the working set.
fn resolve_id(records: &[Record], input: &str) -> Result<String> {
    if let Some(exact) = records.iter().find(|r| r.id() == input) {
        return Ok(exact.id().to_string());
    }
    let matches: Vec<&str> = records
        .iter()
        .map(Record::id)
        .filter(|id| id.starts_with(input))
        .collect();
    match matches.as_slice() {
        [] => bail!("No note matching '{}'", input),
        [only] => Ok(only.to_string()),
        _ => bail!("Note id '{}' is ambiguous", input),
    }
}

fn resolve_ids(records: &[Record], input: &str) -> Result<Vec<String>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| resolve_id(records, s))
        .collect()
}

fn parse_folder(raw: &str) -> Result<NoteType> {
    match raw.to_lowercase().as_str() {
        "task" | "tasks" => Ok(NoteType::Task),
        "question" | "questions" => Ok(NoteType::Question),
        "thread" | "threads" => Ok(NoteType::Thread),
        "note" | "notes" => Ok(NoteType::Note),
        other => bail!("Unknown folder '{}' (task, question, thread or note)", other),
    }
}

fn render_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| {
            if s.highlighted {
                format!("*{}*", s.text)
            } else {
                s.text.clone()
            }
        })
        .collect()
}

fn render_feed(rows: &[FeedRow]) -> String {
    let mut out = String::new();
    for row in rows {
        match row {
            FeedRow::DaySeparator { label, .. } => {
                let _ = writeln!(out, "--- {} ---", label);
            }
            FeedRow::ReviewBanner(ReviewBanner::Pending { count }) => {
                let noun = if *count == 1 { "task" } else { "tasks" };
                let _ = writeln!(
                    out,
                    "[review] {} {} waiting - run 'dumka review start'",
                    count, noun
                );
            }
            FeedRow::ReviewBanner(ReviewBanner::Done { countdown }) => {
                let _ = writeln!(out, "[review] done for today - next in {}", countdown);
            }
            FeedRow::Note(view) => {
                let check = if view.is_task {
                    if view.completed {
                        "[x] "
                    } else {
                        "[ ] "
                    }
                } else {
                    ""
                };
                let moved = if view.moved { "  (moved)" } else { "" };
                let _ = writeln!(
                    out,
                    "{}  {}  {}{}{}",
                    view.time,
                    short_id(&view.id),
                    check,
                    render_segments(&view.segments),
                    moved
                );
                if view.is_question {
                    let _ = writeln!(
                        out,
                        "                 answer: {}",
                        view.answer.as_deref().unwrap_or("-")
                    );
                }
                if let Some(related) = &view.related {
                    let _ = writeln!(
                        out,
                        "                 related: {}{}",
                        short_id(&related.note_id),
                        related
                            .label
                            .as_deref()
                            .map(|l| format!(" ({})", l))
                            .unwrap_or_default()
                    );
                }
            }
            FeedRow::Thread(view) => {
                let noun = if view.count == 1 { "message" } else { "messages" };
                let _ = writeln!(
                    out,
                    "{}  {}  [thread, {} {}] {}",
                    view.time,
                    short_id(&view.id),
                    view.count,
                    noun,
                    view.preview
                );
            }
        }
    }
    out
}

fn render_thread_items(title: Option<&str>, items: &[ThreadItem]) -> String {
    let mut out = String::new();
    let noun = if items.len() == 1 { "message" } else { "messages" };
    let _ = writeln!(out, "# {} ({} {})", title.unwrap_or("Thread"), items.len(), noun);

    if items.is_empty() {
        let _ = writeln!(out, "Thread is empty.");
        return out;
    }

    let mut prev_day: Option<String> = None;
    for (idx, item) in items.iter().enumerate() {
        let cur_day = day_key(&item.date);
        if prev_day.as_deref() != Some(cur_day.as_str()) {
            let _ = writeln!(out, "--- {} ---", day_label(&item.date));
            prev_day = Some(cur_day);
        }

        let info = classify_task(&item.text);
        let is_task = item.is_task || info.is_task;
        let check = if is_task {
            if item.completed {
                "[x] "
            } else {
                "[ ] "
            }
        } else {
            ""
        };
        let text = if is_task && info.is_task {
            render_segments(&highlight_segments(&info.display_text, info.highlight))
        } else {
            item.text.clone()
        };
        let _ = writeln!(out, "{:>3}  {}  {}{}", idx, time_label(&item.date), check, text);
        if item.is_question {
            let _ = writeln!(
                out,
                "            answer: {}",
                item.answer.as_deref().unwrap_or("-")
            );
        }
    }
    out
}

fn print_intro(session: &dumka_core::ReviewSession) {
    let stats = session.yesterday();
    println!(
        "Yesterday: {} tasks created, {} completed.",
        stats.created, stats.completed
    );
    let noun = if session.pending() == 1 { "task" } else { "tasks" };
    println!("{} {} still need review.", session.pending(), noun);
}

async fn run<B: NotesBackend>(
    service: &mut DumkaService<B>,
    command: Commands,
    state_path: &Path,
) -> Result<()> {
    service.refresh().await?;
    let now = Local::now();

    match command {
        Commands::Init { .. } => unreachable!(),

        Commands::Add { text } => {
            let text = text_or_stdin(text)?;
            let id = service.create_note(&text).await?;
            println!("Added note {}", short_id(&id));
            if let Some(milestone) = service.milestone_to_celebrate(now) {
                println!("{} days in a row - keep it going!", milestone);
            }
        }

        Commands::Ls { organized, folder } => {
            if let Some(folder) = folder {
                let folder = parse_folder(&folder)?;
                println!("{}", folder_label(folder));
                print!("{}", render_feed(&service.folder_feed(folder, now)));
            } else if organized {
                let folders = service.folders();
                if folders.is_empty() {
                    println!("No folders yet.");
                }
                for (folder, count) in folders {
                    println!("{} ({})", folder_label(folder), count);
                }
            } else {
                let rows = service.feed(now);
                if rows.is_empty() {
                    println!("No notes yet. Write your first note with 'dumka add'.");
                } else {
                    print!("{}", render_feed(&rows));
                }
            }
        }

        Commands::Edit { id, text } => {
            let id = resolve_id(service.visible(), &id)?;
            let text = if text.is_none() && !is_stdin_tty() {
                read_stdin()?
            } else {
                text.context("Nothing to update")?
            };
            service.update_note_text(&id, &text).await?;
            println!("Edited note {}", short_id(&id));
        }

        Commands::Rm { ids } => {
            let ids = resolve_ids(service.visible(), &ids)?;
            if ids.is_empty() {
                bail!("No note ids provided");
            }
            service.delete_notes(&ids).await?;
            for id in &ids {
                println!("Deleted note {}", short_id(id));
            }
        }

        Commands::Done { id } => {
            let id = resolve_id(service.visible(), &id)?;
            service.set_completed(&id, true).await?;
            println!("Completed {}", short_id(&id));
        }

        Commands::Undone { id } => {
            let id = resolve_id(service.visible(), &id)?;
            service.set_completed(&id, false).await?;
            println!("Reopened {}", short_id(&id));
        }

        Commands::Answer { id, text } => {
            let id = resolve_id(service.visible(), &id)?;
            let text = text.unwrap_or_default();
            service.save_answer(&id, &text).await?;
            if text.trim().is_empty() {
                println!("Answer cleared");
            } else {
                println!("Answer saved");
            }
        }

        Commands::Move { id, slot } => {
            let id = resolve_id(service.visible(), &id)?;
            let day = service
                .visible()
                .iter()
                .find(|r| r.id() == id)
                .map(|r| day_key(r.date()))
                .context("Note not found")?;

            let mut ordered = service.day_note_ids(&day);
            ordered.retain(|nid| nid != &id);
            let slot = slot.min(ordered.len());
            ordered.insert(slot, id.clone());

            service.reorder_day(&ordered, &id).await?;
            save_flags(state_path, service.flags())?;
            println!("Moved {} to slot {}", short_id(&id), slot);
        }

        Commands::Unmove { id } => {
            let id = resolve_id(service.visible(), &id)?;
            service.clear_position(&id).await?;
            save_flags(state_path, service.flags())?;
            println!("Restored chronological order for {}", short_id(&id));
        }

        Commands::Thread { command } => match command {
            ThreadCommands::New { ids } => {
                let ids = resolve_ids(service.visible(), &ids)?;
                let created = service.create_thread(&ids).await?;
                println!("Created thread {}", short_id(&created.id));
                if !created.unremoved_sources.is_empty() {
                    eprintln!(
                        "Thread was created, but failed to remove {} source note(s); \
                         they will be cleaned up on the next load.",
                        created.unremoved_sources.len()
                    );
                }
            }
            ThreadCommands::Show { id } => {
                let id = resolve_id(service.visible(), &id)?;
                let thread = service
                    .visible()
                    .iter()
                    .filter_map(Record::as_thread)
                    .find(|t| t.id == id)
                    .context("Not a thread")?;
                match &thread.payload {
                    Some(payload) => {
                        print!("{}", render_thread_items(payload.title.as_deref(), &payload.items))
                    }
                    None => println!("Thread payload is unreadable."),
                }
            }
            ThreadCommands::Add { id, text } => {
                let id = resolve_id(service.visible(), &id)?;
                let text = text_or_stdin(text)?;
                service.thread_append(&id, &text).await?;
                println!("Added to thread {}", short_id(&id));
            }
            ThreadCommands::Edit { id, index, text } => {
                let id = resolve_id(service.visible(), &id)?;
                let text = text_or_stdin(text)?;
                service.thread_edit_item(&id, index, &text).await?;
                println!("Edited item {} of thread {}", index, short_id(&id));
            }
            ThreadCommands::Rm { id, index } => {
                let id = resolve_id(service.visible(), &id)?;
                service.thread_delete_item(&id, index).await?;
                println!("Deleted item {} from thread {}", index, short_id(&id));
            }
            ThreadCommands::Check { id, index, undo } => {
                let id = resolve_id(service.visible(), &id)?;
                service.thread_set_item_completed(&id, index, !undo).await?;
                println!(
                    "Item {} marked {}",
                    index,
                    if undo { "not completed" } else { "completed" }
                );
            }
            ThreadCommands::Answer { id, index, text } => {
                let id = resolve_id(service.visible(), &id)?;
                service
                    .thread_set_item_answer(&id, index, &text.unwrap_or_default())
                    .await?;
                println!("Answer saved for item {}", index);
            }
            ThreadCommands::Title { id, title } => {
                let id = resolve_id(service.visible(), &id)?;
                service
                    .thread_set_title(&id, &title.unwrap_or_default())
                    .await?;
                println!("Thread title updated");
            }
        },

        Commands::Review { command } => match command.unwrap_or(ReviewCommands::Status) {
            ReviewCommands::Status => {
                match service.start_review(now) {
                    Some(session) => print_intro(&session),
                    None => println!("Nothing to review."),
                }
                if let Some(ReviewBanner::Done { countdown }) = service.review_banner(now) {
                    println!("Review done for today. Next one in {}.", countdown);
                }
            }
            ReviewCommands::Start => {
                let Some(mut session) = service.start_review(now) else {
                    println!("Nothing to review.");
                    save_flags(state_path, service.flags())?;
                    return Ok(());
                };
                print_intro(&session);
                session.begin();

                let stdin = io::stdin();
                let mut lines = stdin.lock().lines();
                while let Some(task) = session.current().cloned() {
                    let (at, total) = session.progress();
                    let info = classify_task(&task.text);
                    println!(
                        "({}/{}) {}  [{}]",
                        at,
                        total,
                        info.display_text,
                        day_label(&task.date)
                    );
                    print!("[d]one / [s]kip / [q]uit: ");
                    io::stdout().flush().ok();

                    let answer = match lines.next() {
                        Some(line) => line.context("Failed to read from stdin")?,
                        None => break,
                    };
                    match answer.trim() {
                        "d" | "done" => {
                            if let Some(task_id) = session.swipe(Swipe::Done) {
                                service.set_completed(&task_id, true).await?;
                            }
                        }
                        "s" | "skip" => {
                            session.swipe(Swipe::Skip);
                        }
                        "q" | "quit" => break,
                        _ => println!("Please answer d, s or q."),
                    }
                }

                if session.counts_as_reviewed() {
                    service.mark_review_done(now).await?;
                    save_flags(state_path, service.flags())?;
                    println!(
                        "Review complete: {} done, {} skipped.",
                        session.done_count(),
                        session.skipped_count()
                    );
                } else {
                    println!("Review closed early - remaining tasks stay pending.");
                }
            }
        },

        Commands::Streak => {
            let streak = service.streak(now);
            let noun = if streak == 1 { "day" } else { "days" };
            println!("Current streak: {} {}", streak, noun);
            if let Some(milestone) = service.milestone_to_celebrate(now) {
                save_flags(state_path, service.flags())?;
                println!("{} days in a row - keep it going!", milestone);
            }
        }

        Commands::Invite { command } => match command {
            InviteCommands::New => {
                let invite = service.create_invite().await?;
                println!("Created invite {}", invite.code);
            }
            InviteCommands::Ls => {
                let invites = service.list_invites().await?;
                let stats = dumka_core::invite_stats(&invites);
                println!(
                    "Total: {} - Unused: {} - Used: {}",
                    stats.total, stats.unused, stats.used
                );
                for invite in invites {
                    let status = if invite.is_used() { "used" } else { "unused" };
                    println!("{}  {}  {}", invite.code, invite.created_at, status);
                }
            }
        },

        Commands::Watch { interval } => {
            let interval = interval.max(1);
            let mut last = String::new();
            loop {
                service.refresh().await?;
                let rendered = render_feed(&service.feed(Local::now()));
                if rendered != last {
                    println!("{}", rendered);
                    last = rendered;
                }
                tokio::time::sleep(std::time::Duration::from_secs(interval)).await;
            }
        }
    }

    // moved-note flags may have been pruned during refresh
    save_flags(state_path, service.flags())?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init { reinitialize } = cli.command {
        let dumka_dir = PathBuf::from(DUMKA_DIR);
        let db_path = dumka_dir.join(DB_FILE);

        if dumka_dir.exists() {
            if db_path.exists() {
                if reinitialize {
                    std::fs::remove_file(&db_path).context("Failed to remove existing database")?;
                } else {
                    bail!("Dumka is already initialized in this directory. Use --reinitialize to delete and recreate.");
                }
            }
        } else {
            std::fs::create_dir_all(&dumka_dir).context("Failed to create .dumka directory")?;
        }

        if cli.url.is_none() {
            SqliteBackend::open(&db_path)
                .with_context(|| format!("Failed to create database at {}", db_path.display()))?;
        }
        save_flags(&dumka_dir.join(STATE_FILE), &LocalFlags::default())?;
        println!("Initialized dumka workspace in {}", dumka_dir.display());
        return Ok(());
    }

    let dumka_dir = get_dumka_dir()?;
    let state_path = dumka_dir.join(STATE_FILE);
    let flags = load_flags(&state_path);

    match (&cli.url, &cli.api_key) {
        (Some(url), Some(api_key)) => {
            let backend = RestBackend::new(url.clone(), api_key.clone());
            let mut service = DumkaService::new(backend, &cli.user, flags);
            run(&mut service, cli.command, &state_path).await
        }
        (Some(_), None) => bail!("--api-key is required when --url is set"),
        _ => {
            let db_path = dumka_dir.join(DB_FILE);
            if !db_path.exists() {
                bail!(
                    "Database file not found at {}. Run 'dumka init' to create one.",
                    db_path.display()
                );
            }
            let backend = SqliteBackend::open(&db_path)
                .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
            let mut service = DumkaService::new(backend, &cli.user, flags);
            run(&mut service, cli.command, &state_path).await
        }
    }
}
