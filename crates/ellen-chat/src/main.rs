//! A terminal client for the Ellen chat service.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::pin::pin;
use std::time::Duration;

use ellen_chat::SessionBuilder;
use ellen_chat::core::{ErrorKind, StreamEnd, TranscriptEvent};
use ellen_chat_http::{BackendConfigBuilder, SupabaseConfigBuilder};
use ellen_chat_model::Speaker;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::sleep;

enum SessionEvent {
    ReplyStarted,
    Text(String),
}

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(project_url) = env::var("SUPABASE_URL") else {
        eprintln!("SUPABASE_URL environment variable is not set");
        return;
    };
    let Ok(anon_key) = env::var("SUPABASE_ANON_KEY") else {
        eprintln!("SUPABASE_ANON_KEY environment variable is not set");
        return;
    };

    let mut backend_config = BackendConfigBuilder::new();
    if let Ok(base_url) = env::var("ELLEN_API_URL") {
        backend_config = backend_config.with_base_url(base_url);
    }
    let mut identity_config =
        SupabaseConfigBuilder::with_project(project_url, anon_key);
    if let Ok(token) = env::var("ELLEN_ACCESS_TOKEN") {
        identity_config = identity_config.with_access_token(token);
    }

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut session = SessionBuilder::with_configs(
        backend_config.build(),
        identity_config.build(),
    )
    .on_event(move |_, event| match event {
        TranscriptEvent::TurnAppended {
            speaker: Speaker::Assistant,
            ..
        } => {
            event_tx.send(SessionEvent::ReplyStarted).ok();
        }
        TranscriptEvent::TextAppended { delta, .. } => {
            event_tx.send(SessionEvent::Text(delta.clone())).ok();
        }
        _ => {}
    })
    .build();

    match session.current_principal().await {
        Ok(principal) => {
            let name = principal.email.as_deref().unwrap_or(&principal.id);
            println!("Signed in as {}", name.bright_white().bold());
        }
        Err(_) => {
            println!(
                "{}",
                "Not signed in, set ELLEN_ACCESS_TOKEN to sign in.".yellow()
            );
        }
    }
    print_transcript(&session);

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let teardown = session.teardown_handle();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/quit", _) => break,
            ("/new", _) => {
                if let Err(err) = session.new_conversation() {
                    report_error(&err);
                    break;
                }
                print_transcript(&session);
                continue;
            }
            ("/history", _) => {
                let list = session.list_conversations().await;
                if let Some(err) = &list.error {
                    report_error(err);
                }
                for summary in &list.conversations {
                    println!(
                        "{}  {}",
                        summary.id.bright_black(),
                        summary.title()
                    );
                }
                continue;
            }
            ("/open", id) if !id.trim().is_empty() => {
                if let Err(err) = session.open_conversation(id.trim()).await {
                    report_error(&err);
                }
                print_transcript(&session);
                continue;
            }
            ("/logout", _) => {
                if let Err(err) = session.sign_out().await {
                    println!(
                        "{}{} {}",
                        BAR_CHAR.bright_red(),
                        "Signed out locally, but the token was not revoked."
                            .red(),
                        err.bright_black()
                    );
                } else {
                    println!("{}", "Signed out.".yellow());
                }
                print_transcript(&session);
                continue;
            }
            ("/whoami", _) => {
                match session.current_principal().await {
                    Ok(principal) => println!(
                        "{} {}",
                        principal.id,
                        principal.email.as_deref().unwrap_or_default()
                    ),
                    Err(err) => report_error(&err),
                }
                continue;
            }
            _ => {}
        }

        let mut printer = ReplyPrinter::new(&progress_style);
        let mut interrupted = false;
        let result = {
            let mut send = pin!(session.send_message(line));
            let mut ctrl_c = pin!(signal::ctrl_c());

            loop {
                printer.tick();

                let sleep = sleep(Duration::from_millis(100));
                select! {
                    biased;
                    event = event_rx.recv() => {
                        if let Some(event) = event {
                            printer.handle(event);
                        }
                    },
                    result = &mut send => break result,
                    _ = &mut ctrl_c, if !interrupted => {
                        interrupted = true;
                        teardown.teardown();
                    },
                    _ = sleep => {}
                }
            }
        };
        // Text that arrived together with the end of the reply.
        while let Ok(event) = event_rx.try_recv() {
            printer.handle(event);
        }
        printer.finish();

        match result {
            Ok(Some(outcome)) => {
                if outcome.end == StreamEnd::Cancelled {
                    println!("{}", "Interrupted.".yellow());
                    break;
                }
                if outcome.is_empty() {
                    println!("{}", "The assistant sent an empty reply.".yellow());
                }
                if outcome.malformed > 0 {
                    debug!("{} malformed records skipped", outcome.malformed);
                }
            }
            Ok(None) => {}
            Err(err) => {
                report_error(&err);
                if err.kind() == ErrorKind::ViewClosed {
                    break;
                }
            }
        }
    }
}

/// Shows a spinner until the reply starts, then prints it as it streams.
struct ReplyPrinter {
    progress_bar: Option<ProgressBar>,
    printed: bool,
}

impl ReplyPrinter {
    fn new(style: &ProgressStyle) -> Self {
        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(style.clone());
        progress_bar.set_message("🤔 Thinking...");
        Self {
            progress_bar: Some(progress_bar),
            printed: false,
        }
    }

    fn tick(&self) {
        if let Some(progress_bar) = &self.progress_bar {
            progress_bar.inc(1);
        }
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ReplyStarted => {
                if let Some(progress_bar) = &self.progress_bar {
                    progress_bar.set_message("✍️  Replying...");
                }
            }
            SessionEvent::Text(text) => {
                // Finish the progress bar before printing anything else.
                if let Some(progress_bar) = self.progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                if !self.printed {
                    print!("{}🤖 ", BAR_CHAR.bright_cyan());
                    self.printed = true;
                }
                print!("{}", text.bright_white());
                std::io::stdout().flush().ok();
            }
        }
    }

    fn finish(&mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
        if self.printed {
            println!();
        }
    }
}

fn print_transcript(session: &ellen_chat::Session) {
    if let Some(id) = session.transcript().conversation_id() {
        println!("{}", format!("Conversation {id}").bright_black());
    }
    for turn in session.transcript().turns() {
        match turn.speaker {
            Speaker::User => {
                println!("{}🧑 {}", BAR_CHAR.bright_green(), turn.text);
            }
            Speaker::Assistant => {
                println!(
                    "{}🤖 {}",
                    BAR_CHAR.bright_cyan(),
                    turn.text.bright_white()
                );
            }
        }
    }
}

fn report_error(err: &ellen_chat::core::Error) {
    let hint = match err.kind() {
        ErrorKind::AuthenticationMissing => {
            "You are not signed in, set ELLEN_ACCESS_TOKEN and restart."
        }
        ErrorKind::Transport => "The connection was lost, you may resend.",
        ErrorKind::HistoryFetch => "Could not load your chat history.",
        ErrorKind::Backend => "The chat service refused the message.",
        ErrorKind::StreamInFlight => "A reply is still streaming.",
        ErrorKind::ViewClosed => "The session has ended.",
    };
    println!("{}{} {}", BAR_CHAR.bright_red(), hint.red(), err.bright_black());
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
