use anyhow::Result;
use chatstream::api::{ChatClient, HttpThreadBackend, ThreadDirectory};
use chatstream::auth::{StaticToken, TokenProvider};
use chatstream::config::Config;
use chatstream::session::{SessionCoordinator, SessionState, SessionView};
use chatstream::types::ToolPhase;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CHATSTREAM_LOG";
const DEFAULT_LOG_FILTER: &str = "chatstream=info";

/// Prints each accumulator change as an incremental transcript.
#[derive(Default)]
struct TranscriptPrinter {
    printed_bytes: usize,
    thoughts_seen: usize,
    tools_seen: usize,
    last_error: Option<String>,
}

impl TranscriptPrinter {
    fn on_change(&mut self, view: SessionView<'_>) {
        let acc = view.accumulator;
        if matches!(view.state, SessionState::Idle | SessionState::Sending) {
            *self = Self::default();
            return;
        }

        let mut out = std::io::stdout().lock();
        for thought in &acc.thoughts[self.thoughts_seen.min(acc.thoughts.len())..] {
            let _ = writeln!(out, "\n  [thought] {thought}");
        }
        self.thoughts_seen = acc.thoughts.len();

        for event in &acc.tool_events[self.tools_seen.min(acc.tool_events.len())..] {
            let phase = match event.phase {
                ToolPhase::Start => "start",
                ToolPhase::End => "end",
            };
            let _ = writeln!(out, "\n  [tool:{phase}] {}", event.tool);
        }
        self.tools_seen = acc.tool_events.len();

        if let Some(delta) = acc.draft_text.get(self.printed_bytes..) {
            let _ = write!(out, "{delta}");
            self.printed_bytes = acc.draft_text.len();
        }

        if acc.error != self.last_error {
            if let Some(error) = &acc.error {
                let _ = writeln!(out, "\n[error] {error}");
            }
            self.last_error = acc.error.clone();
        }

        if view.state == SessionState::Completed {
            if let Some(final_answer) = &acc.final_answer {
                if final_answer.answer.trim() != acc.draft_text.trim() {
                    let _ = write!(out, "\n\n{}", final_answer.answer);
                }
                if let Some(preview) = &final_answer.data_preview {
                    let _ = write!(
                        out,
                        "\n[data] {} columns, {} rows",
                        preview.columns.len(),
                        preview.rows.len()
                    );
                }
            }
            let _ = writeln!(out);
        }
        let _ = out.flush();
    }
}

enum Input {
    Line(String),
    Eof,
    Progress,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_prompt(coordinator: &SessionCoordinator) {
    let thread = coordinator.active_thread().unwrap_or("-");
    match coordinator.state() {
        SessionState::Idle => print!("[{thread}] > "),
        state => print!("[{thread} {}] > ", state.label()),
    }
    let _ = std::io::stdout().flush();
}

async fn handle_command(coordinator: &mut SessionCoordinator, command: &str) -> Result<bool> {
    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "/quit" | "/exit" | "/q" => return Ok(false),
        "/threads" => {
            for thread in coordinator.threads().list_threads().await? {
                let marker = if coordinator.active_thread() == Some(thread.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}  {}", thread.id, thread.title.unwrap_or_default());
            }
        }
        "/new" => {
            let thread = coordinator.start_new_thread().await?;
            println!("created thread {}", thread.id);
        }
        "/use" if !arg.is_empty() => coordinator.select_thread(Some(arg.to_string())),
        "/delete" if !arg.is_empty() => coordinator.delete_thread(arg).await?,
        _ => println!("commands: /threads, /new, /use <id>, /delete <id>, /quit"),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::load()?;
    config.validate()?;

    let auth: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(config.access_token.clone()));
    let client = ChatClient::new(&config)?;
    if client.is_local_endpoint() {
        tracing::info!(api_url = %config.api_url, "using local chat endpoint");
    }
    let threads = Arc::new(ThreadDirectory::new(Arc::new(HttpThreadBackend::new(
        &config,
        Arc::clone(&auth),
    ))));
    let mut coordinator =
        SessionCoordinator::new(Arc::new(client), auth, threads).with_idle_timeout(config.idle_timeout);

    let mut printer = TranscriptPrinter::default();
    coordinator.on_accumulator_change(move |view| printer.on_change(view));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_prompt(&coordinator);

    loop {
        let input = if coordinator.state().is_in_flight() {
            tokio::select! {
                line = lines.next_line() => line?.map_or(Input::Eof, Input::Line),
                _ = coordinator.next_update() => Input::Progress,
            }
        } else {
            lines.next_line().await?.map_or(Input::Eof, Input::Line)
        };

        let line = match input {
            Input::Eof => break,
            Input::Progress => {
                if !coordinator.state().is_in_flight() {
                    print_prompt(&coordinator);
                }
                continue;
            }
            Input::Line(line) => line,
        };

        let command = line.trim();
        if command.starts_with('/') {
            match handle_command(&mut coordinator, command).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => eprintln!("[error] {error:#}"),
            }
            print_prompt(&coordinator);
            continue;
        }

        if let Err(error) = coordinator.send(command) {
            eprintln!("[error] {error}");
            print_prompt(&coordinator);
        }
    }

    Ok(())
}
