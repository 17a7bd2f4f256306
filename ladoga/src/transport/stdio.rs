//! stdio transport implementation
//!
//! Client side spawns a server child process and frames one JSON envelope
//! per line over its stdin/stdout; server side serves the dispatch core
//! over the current process's stdin/stdout with the same framing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt,
    BufReader, BufWriter,
};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use crate::error::{Error, ErrorCode};
use crate::server::ServerCore;
use crate::server::context::Context;
use crate::server::notifications::NotificationSender;
use crate::server::session::Session;
use crate::types::{Message, RequestId, Response};

/// How long a closing child gets between SIGINT and the hard kill
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Child process configuration for the stdio client transport
#[derive(Debug, Clone)]
pub struct StdIoOptions {
    /// The command to spawn
    pub command: String,

    /// Its arguments
    pub args: Vec<String>,

    /// Extra environment variables
    pub env: HashMap<String, String>,

    /// Working directory for the child
    pub working_dir: Option<PathBuf>,
}

impl StdIoOptions {
    /// Creates options for spawning `command` with `args`
    pub fn new<I, S>(command: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
            working_dir: None,
        }
    }

    /// Adds an environment variable
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Represents the stdio client transport bound to a spawned child
pub(crate) struct StdIoClient {
    writer_tx: mpsc::Sender<Message>,
    token: CancellationToken,
    exited: watch::Receiver<bool>,
}

impl StdIoClient {
    /// Spawns the child and wires the reader, writer, stderr and watcher
    /// tasks. Returns the transport and the inbound message feed.
    pub(crate) fn start(
        options: StdIoOptions,
    ) -> Result<(Self, mpsc::Receiver<Result<Message, Error>>), Error> {
        let mut command = Command::new(&options.command);
        command
            .args(&options.args)
            .envs(&options.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &options.working_dir {
            command.current_dir(dir);
        }
        let mut child = command.spawn()?;

        let stdin = child.stdin
            .take()
            .ok_or_else(|| Error::new(ErrorCode::Transport, "Inaccessible child stdin"))?;
        let stdout = child.stdout
            .take()
            .ok_or_else(|| Error::new(ErrorCode::Transport, "Inaccessible child stdout"))?;
        let stderr = child.stderr
            .take()
            .ok_or_else(|| Error::new(ErrorCode::Transport, "Inaccessible child stderr"))?;

        let token = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::channel(100);
        let (writer_tx, writer_rx) = mpsc::channel(100);
        let (exited_tx, exited_rx) = watch::channel(false);

        spawn_writer(BufWriter::new(stdin), writer_rx, token.clone());
        spawn_reader(BufReader::new(stdout), inbound_tx, token.clone());
        spawn_stderr_reader(BufReader::new(stderr), token.clone());
        tokio::spawn(watch_child(child, token.clone(), exited_tx));

        tracing::info!(logger = "ladoga", command = %options.command, "Connected: stdio");
        Ok((
            Self { writer_tx, token, exited: exited_rx },
            inbound_rx,
        ))
    }

    /// Writes one message to the child's stdin
    pub(crate) async fn send(&self, msg: Message) -> Result<(), Error> {
        self.writer_tx
            .send(msg)
            .await
            .map_err(|_| Error::new(ErrorCode::State, "Transport is closed"))
    }

    /// Whether the child has exited
    pub(crate) fn is_closed(&self) -> bool {
        *self.exited.borrow()
    }

    /// Interrupts the child, waits for the grace period, then force-kills
    pub(crate) async fn close(&self) {
        self.token.cancel();
        let mut exited = self.exited.clone();
        let _ = tokio::time::timeout(
            SHUTDOWN_GRACE + Duration::from_secs(1),
            exited.wait_for(|done| *done),
        ).await;
    }
}

/// Serves the dispatch core over the current process's stdin/stdout.
/// One implicit session spans the whole connection.
pub(crate) async fn serve(core: Arc<ServerCore>, token: CancellationToken) {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = BufWriter::new(tokio::io::stdout());

    let (tx, rx) = mpsc::channel::<Message>(100);
    spawn_writer(stdout, rx, token.clone());

    let session = core.sessions.create();
    tracing::info!(logger = "ladoga", "Listening: stdio");

    let mut lines = stdin.lines();
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    handle_line(&core, &session, &tx, &line).await;
                }
                Ok(None) => break,
                Err(_err) => {
                    tracing::error!(logger = "ladoga", "stdin read error: {_err}");
                    break;
                }
            }
        }
    }
    token.cancel();
}

async fn handle_line(
    core: &Arc<ServerCore>,
    session: &Arc<Session>,
    tx: &mpsc::Sender<Message>,
    line: &str,
) {
    session.touch();
    match Message::from_json(line) {
        Ok(Message::Request(req)) => {
            let ctx = Context::new(session.clone())
                .with_sender(NotificationSender::bound(tx.clone(), req.progress_token()))
                .with_token(CancellationToken::new());
            let core = core.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let resp = core.dispatch_request(ctx, req).await;
                if tx.send(resp.into()).await.is_err() {
                    tracing::error!(logger = "ladoga", "Failed to write response to stdout");
                }
            });
        }
        Ok(Message::Notification(notification)) => {
            let ctx = Context::new(session.clone());
            core.dispatch_notification(ctx, notification).await;
        }
        Ok(Message::Response(_)) => {
            tracing::trace!(logger = "ladoga", "Ignoring response on server stdin");
        }
        Err(err) => {
            let resp = Response::error(RequestId::Null, err);
            let _ = tx.send(resp.into()).await;
        }
    }
}

/// Writes one JSON envelope per line
fn spawn_writer<T: AsyncWrite + Unpin + Send + 'static>(
    mut writer: BufWriter<T>,
    mut rx: mpsc::Receiver<Message>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                msg = rx.recv() => {
                    let Some(msg) = msg else { break };
                    match msg.to_vec() {
                        Ok(mut json_bytes) => {
                            json_bytes.push(b'\n');
                            if let Err(_err) = writer.write_all(&json_bytes).await {
                                tracing::error!(logger = "ladoga", "stdout write error: {_err}");
                                break;
                            }
                            let _ = writer.flush().await;
                        }
                        Err(_err) => {
                            tracing::error!(logger = "ladoga", "Serialization error: {_err}");
                        }
                    }
                }
            }
        }
    });
}

/// Reads one JSON envelope per line and feeds the inbound channel
fn spawn_reader<T: AsyncRead + Unpin + Send + 'static>(
    reader: BufReader<T>,
    tx: mpsc::Sender<Result<Message, Error>>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if tx.send(Message::from_json(&line)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(Err(err.into())).await;
                        break;
                    }
                }
            }
        }
    });
}

/// Surfaces child stderr lines through the logger
fn spawn_stderr_reader<T: AsyncRead + Unpin + Send + 'static>(
    reader: BufReader<T>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(_line)) => {
                        tracing::debug!(logger = "ladoga", child_stderr = %_line);
                    }
                    _ => break,
                }
            }
        }
    });
}

/// Waits on the child: a natural exit tears the transport down; a
/// cancellation interrupts, waits for the grace period, then force-kills.
async fn watch_child(
    mut child: Child,
    token: CancellationToken,
    exited_tx: watch::Sender<bool>,
) {
    tokio::select! {
        biased;
        status = child.wait() => {
            tracing::debug!(logger = "ladoga", "Child exited with status: {:?}", status);
            token.cancel();
        }
        _ = token.cancelled() => {
            interrupt(&child);
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(_status) => {
                    tracing::debug!(logger = "ladoga", "Child exited with status: {:?}", _status);
                }
                Err(_) => {
                    tracing::warn!(logger = "ladoga", "Child ignored the interrupt, killing");
                    let _ = child.kill().await;
                }
            }
        }
    }
    let _ = exited_tx.send(true);
}

#[cfg(unix)]
fn interrupt(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(_err) = kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
            tracing::warn!(logger = "ladoga", pid, "Failed to interrupt child: {_err}");
        }
    }
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) {}
