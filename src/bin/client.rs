//! Terminal front-end: connects to the collaboration server, renders the
//! shared document with per-cursor colorization, and turns key presses into
//! 2-byte intent frames. Not part of the core library (see SPEC_FULL.md
//! §4.6) but implemented here so the system is runnable end to end.

use std::io::{stdout, Write};

use clap::Parser;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use scribble_collab::snapshot::Snapshot;
use scribble_collab::{DEFAULT_PORT, SNAPSHOT_BUFFER_SIZE};

/// Connects to a collaborative editing server and renders its document.
/// Takes exactly one positional argument: the server host.
#[derive(Parser, Debug)]
#[command(name = "client", about = "Collaborative text editor terminal client")]
struct Args {
    host: String,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(_) => {
            eprintln!("Usage: client <host>");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging();

    let runtime = tokio::runtime::Runtime::new().expect("build tokio runtime");
    if let Err(err) = runtime.block_on(run(&args.host)) {
        eprintln!("client error: {err}");
        std::process::exit(1);
    }
}

fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", "collab-client.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init();
    guard
}

async fn run(host: &str) -> std::io::Result<()> {
    let addr = format!("{host}:{DEFAULT_PORT}");
    let mut stream = TcpStream::connect(&addr).await?;
    tracing::info!(addr, "connected");

    let mut handshake_buf = [0u8; 32];
    let n = stream.read(&mut handshake_buf).await?;
    let my_id = parse_handshake(&handshake_buf[..n]);
    tracing::info!(my_id, "received handshake");

    stream.write_all(b"DD").await?;

    let (reader_half, mut writer_half) = stream.into_split();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if writer_half.write_all(&frame).await.is_err() {
                break;
            }
        }
    });

    let _term = TerminalGuard::new()?;

    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();
    tokio::task::spawn_blocking(move || loop {
        match event::read() {
            Ok(Event::Key(key)) => {
                if ui_tx.send(UiEvent::Key(key)).is_err() {
                    break;
                }
            }
            Ok(Event::Resize(_, _)) => {
                if ui_tx.send(UiEvent::Resize).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(_) => break,
        }
    });

    let mut reader = reader_half;
    let mut read_buf = vec![0u8; SNAPSHOT_BUFFER_SIZE];
    let mut snapshot = Snapshot {
        cursors: Vec::new(),
        lines: vec![Vec::new()],
    };

    render(&snapshot, my_id)?;

    loop {
        tokio::select! {
            read_result = reader.read(&mut read_buf) => {
                match read_result {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        match Snapshot::parse(&read_buf[..n]) {
                            Ok(parsed) => {
                                snapshot = parsed;
                                render(&snapshot, my_id)?;
                            }
                            Err(err) => {
                                tracing::warn!(%err, "dropping malformed snapshot");
                            }
                        }
                    }
                }
            }
            ui_event = ui_rx.recv() => {
                let Some(ui_event) = ui_event else { break; };
                match ui_event {
                    UiEvent::Key(key) => {
                        if key.kind == KeyEventKind::Release {
                            continue;
                        }
                        if key.code == KeyCode::Esc
                            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('q'))
                        {
                            break;
                        }
                        if let Some(frame) = frame_for_key(key) {
                            let _ = outbox_tx.send(frame.to_vec());
                        }
                    }
                    UiEvent::Resize => {
                        render(&snapshot, my_id)?;
                    }
                }
            }
        }
    }

    writer_task.abort();
    Ok(())
}

enum UiEvent {
    Key(KeyEvent),
    Resize,
}

struct TerminalGuard;

impl TerminalGuard {
    fn new() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Parses the decimal-ASCII handshake: any digit prefix of the buffer, up to
/// the first non-digit byte or the end of the buffer.
fn parse_handshake(buf: &[u8]) -> usize {
    let digits = buf
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    std::str::from_utf8(&buf[..digits])
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Maps a key press to a 2-byte intent frame, per the protocol's opcode
/// table. Returns `None` for keys that have no corresponding intent.
fn frame_for_key(key: KeyEvent) -> Option<[u8; 2]> {
    match key.code {
        KeyCode::Up => Some(*b"SU"),
        KeyCode::Down => Some(*b"SD"),
        KeyCode::Right => Some(*b"SR"),
        KeyCode::Left => Some(*b"SL"),
        KeyCode::Home => Some(*b"SH"),
        KeyCode::End => Some(*b"SE"),
        KeyCode::Enter => Some(*b"SB"),
        KeyCode::Delete => Some(*b"SX"),
        KeyCode::Backspace => Some(*b"SA"),
        KeyCode::Tab => Some(*b"ST"),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) && ch.is_ascii() => {
            Some([b'W', ch as u8])
        }
        _ => None,
    }
}

/// The five-color palette used for remote cursors, indexed by `id % 5` —
/// the same five colors and ordering as the original `ncurses` client.
const CURSOR_PALETTE: [Color; 5] = [
    Color::Green,
    Color::Magenta,
    Color::Yellow,
    Color::Red,
    Color::Cyan,
];

fn color_for_id(id: usize) -> Color {
    CURSOR_PALETTE[id % CURSOR_PALETTE.len()]
}

fn render(snapshot: &Snapshot, my_id: usize) -> std::io::Result<()> {
    let mut out = stdout();
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;

    for (line_index, line) in snapshot.lines.iter().enumerate() {
        queue!(out, MoveTo(0, line_index as u16))?;
        // Iterate one past the line's length so a cursor resting at the
        // insertion point past the last character still gets a cell.
        for col in 0..=line.len() {
            let cursor_ids_here: Vec<usize> = snapshot
                .cursors
                .iter()
                .filter(|c| c.line == line_index && c.column == col)
                .map(|c| c.id)
                .collect();

            let cell = line.get(col).copied().unwrap_or(b' ');

            if cursor_ids_here.is_empty() {
                out.write_all(&[cell])?;
                continue;
            }

            if cursor_ids_here.contains(&my_id) {
                queue!(out, SetAttribute(Attribute::Reverse))?;
            } else {
                let last_id = *cursor_ids_here.last().unwrap();
                queue!(out, SetForegroundColor(color_for_id(last_id)))?;
            }
            out.write_all(&[cell])?;
            queue!(out, SetAttribute(Attribute::Reset))?;
        }
    }

    out.flush()
}
