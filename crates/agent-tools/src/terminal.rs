//! Long-lived interactive shell sessions keyed by an opaque id.
//!
//! Output and exit notifications are delivered as [`ShellEvent`]s on the
//! channel returned by [`ShellSessions::new`]. Writing to or killing an id
//! without a live process does nothing.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::TerminalError;

const READ_CHUNK: usize = 4096;
/// How long output may keep draining after the shell process has exited.
/// Background jobs can hold the pipes open far longer.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    Data { id: String, data: String },
    Exit { id: String, code: Option<i32> },
}

/// Sink for text typed into a session.
#[async_trait]
pub trait SessionInput: Send + Sync {
    /// Returns `false` when `session_id` has no live process.
    async fn send_input(&self, session_id: &str, data: &str) -> bool;
}

struct ShellSession {
    stdin: Arc<Mutex<ChildStdin>>,
    kill_tx: Option<oneshot::Sender<()>>,
    generation: u64,
}

pub fn default_shell() -> &'static str {
    if cfg!(windows) {
        "powershell.exe"
    } else {
        "bash"
    }
}

pub struct ShellSessions {
    sessions: Arc<DashMap<String, ShellSession>>,
    events: mpsc::UnboundedSender<ShellEvent>,
    next_generation: AtomicU64,
    shell: String,
}

impl ShellSessions {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ShellEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let sessions = Self {
            sessions: Arc::new(DashMap::new()),
            events,
            next_generation: AtomicU64::new(0),
            shell: default_shell().to_string(),
        };
        (sessions, rx)
    }

    /// Use another shell program instead of the platform default.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn is_live(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Spawn a shell in `cwd` under `id`.
    ///
    /// Returns `Ok(false)` without spawning if `id` is already live.
    pub fn start(&self, id: &str, cwd: &Path) -> Result<bool, TerminalError> {
        let entry = match self.sessions.entry(id.to_string()) {
            Entry::Occupied(_) => {
                log::debug!("Shell session '{}' already running", id);
                return Ok(false);
            }
            Entry::Vacant(entry) => entry,
        };

        let mut child = Command::new(&self.shell)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TerminalError::Spawn {
                shell: self.shell.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(TerminalError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TerminalError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TerminalError::MissingPipe("stderr"))?;

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let (kill_tx, kill_rx) = oneshot::channel();
        entry.insert(ShellSession {
            stdin: Arc::new(Mutex::new(stdin)),
            kill_tx: Some(kill_tx),
            generation,
        });

        let readers = [
            spawn_reader(id.to_string(), stdout, self.events.clone()),
            spawn_reader(id.to_string(), stderr, self.events.clone()),
        ];

        let sessions = self.sessions.clone();
        let events = self.events.clone();
        let session_id = id.to_string();
        tokio::spawn(async move {
            let code = tokio::select! {
                status = child.wait() => {
                    sessions.remove_if(&session_id, |_, s| s.generation == generation);
                    for mut reader in readers {
                        if tokio::time::timeout(DRAIN_GRACE, &mut reader).await.is_err() {
                            log::debug!("Abandoning output of '{}' held open by a child", session_id);
                            reader.abort();
                        }
                    }
                    status.ok().and_then(|s| s.code())
                }
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        log::warn!("Failed to kill shell session '{}': {}", session_id, e);
                    }
                    for reader in readers {
                        reader.abort();
                    }
                    None
                }
            };

            sessions.remove_if(&session_id, |_, s| s.generation == generation);
            log::info!("Shell session '{}' exited with {:?}", session_id, code);
            let _ = events.send(ShellEvent::Exit {
                id: session_id,
                code,
            });
        });

        log::info!("Started shell session '{}' in {}", id, cwd.display());
        Ok(true)
    }

    /// Write raw text to the session's stdin.
    pub async fn write(&self, id: &str, data: &str) -> bool {
        let stdin = match self.sessions.get(id) {
            Some(session) => session.stdin.clone(),
            None => return false,
        };

        let mut stdin = stdin.lock().await;
        let result = async {
            stdin.write_all(data.as_bytes()).await?;
            stdin.flush().await
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to write to shell session '{}': {}", id, e);
                false
            }
        }
    }

    /// Terminate the session; its `Exit` event follows asynchronously.
    pub fn kill(&self, id: &str) -> bool {
        match self.sessions.get_mut(id) {
            Some(mut session) => {
                if let Some(tx) = session.kill_tx.take() {
                    let _ = tx.send(());
                }
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SessionInput for ShellSessions {
    async fn send_input(&self, session_id: &str, data: &str) -> bool {
        self.write(session_id, data).await
    }
}

fn spawn_reader<R>(id: String, mut pipe: R, events: mpsc::UnboundedSender<ShellEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; READ_CHUNK];
        let mut pending = Vec::new();
        loop {
            match pipe.read(&mut buf).await {
                Ok(0) => {
                    if !pending.is_empty() {
                        let data = String::from_utf8_lossy(&pending).into_owned();
                        let _ = events.send(ShellEvent::Data { id: id.clone(), data });
                    }
                    break;
                }
                Ok(n) => {
                    pending.extend_from_slice(&buf[..n]);
                    let data = take_decoded(&mut pending);
                    if data.is_empty() {
                        continue;
                    }
                    if events.send(ShellEvent::Data { id: id.clone(), data }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("Shell session '{}' pipe closed: {}", id, e);
                    break;
                }
            }
        }
    })
}

/// Length of a UTF-8 sequence cut off at the end of `bytes`, if any.
fn incomplete_suffix_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Decode everything but a trailing partial character, which stays in
/// `pending` until the next read completes it.
fn take_decoded(pending: &mut Vec<u8>) -> String {
    let tail = pending.split_off(pending.len() - incomplete_suffix_len(pending));
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = tail;
    text
}
