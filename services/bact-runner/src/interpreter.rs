//! The step output interpreter.
//!
//! The spawned shell writes its combined stdout/stderr into this writer. A
//! reader task extracts complete lines from the shared byte buffer and a
//! processor task classifies each one: workflow commands are dispatched to
//! the backend, everything else is printed.
//!
//! Ordering between lines is preserved; the bounded channel between the two
//! tasks provides backpressure against a chatty shell.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::commands::{parse_workflow_command, ParsedCommand};

const LINES_CHANNEL_CAPACITY: usize = 4096;
const INITIAL_BACKOFF: Duration = Duration::from_millis(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Receiver of a step's interpreted output.
#[async_trait]
pub trait OutputBackend: Send + Sync {
    /// Apply the side effects of a parsed workflow command.
    async fn execute_command(&self, command: ParsedCommand) -> Result<()>;

    /// Emit one line of plain step output to the user console.
    async fn print(&self, text: &str) -> Result<()>;
}

struct Shared {
    buffer: Mutex<LineBuffer>,
    stopped: AtomicBool,
    error: Mutex<Option<anyhow::Error>>,
}

struct LineBuffer {
    data: Vec<u8>,
    pos: usize,
    total: u64,
}

impl Shared {
    fn latch_error(&self, err: anyhow::Error) {
        let mut slot = self.error.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_none() {
            *slot = Some(err);
        }
    }
}

impl LineBuffer {
    /// Extract the next complete line, without its terminator.
    fn next_line(&mut self) -> Option<String> {
        let nl = self.data[self.pos..].iter().position(|&b| b == b'\n')?;
        let end = self.pos + nl;
        let start = self.pos;
        self.pos = end + 1;
        let mut line = &self.data[start..end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        let out = String::from_utf8_lossy(line).into_owned();
        // reclaim consumed bytes once they dominate the buffer
        if self.pos > 64 * 1024 && self.pos * 2 > self.data.len() {
            self.data.drain(..self.pos);
            self.pos = 0;
        }
        Some(out)
    }

    /// The trailing partial line, if any, consumed on shutdown.
    fn take_remainder(&mut self) -> Option<String> {
        if self.pos >= self.data.len() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.data[self.pos..]).into_owned();
        self.pos = self.data.len();
        Some(rest)
    }
}

/// Handle for feeding raw step output into the interpreter.
#[derive(Clone)]
pub struct InterpreterWriter {
    shared: Arc<Shared>,
}

impl InterpreterWriter {
    /// Append bytes to the interpreter's buffer. Fails once the interpreter
    /// was closed or latched an error.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(anyhow!("step output interpreter is closed"));
        }
        let mut buffer = self.shared.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.data.extend_from_slice(bytes);
        buffer.total += bytes.len() as u64;
        Ok(())
    }
}

/// Streaming interpreter over one step's combined output.
pub struct StepOutputInterpreter {
    shared: Arc<Shared>,
    reader: Option<JoinHandle<()>>,
    processor: Option<JoinHandle<()>>,
}

impl StepOutputInterpreter {
    /// Spawn the reader and processor tasks over a fresh buffer.
    pub fn start(backend: Arc<dyn OutputBackend>) -> Self {
        let shared = Arc::new(Shared {
            buffer: Mutex::new(LineBuffer {
                data: Vec::new(),
                pos: 0,
                total: 0,
            }),
            stopped: AtomicBool::new(false),
            error: Mutex::new(None),
        });

        let (tx, rx) = mpsc::channel::<String>(LINES_CHANNEL_CAPACITY);

        let reader = tokio::spawn(read_lines(Arc::clone(&shared), tx));
        let processor = tokio::spawn(process_lines(Arc::clone(&shared), backend, rx));

        StepOutputInterpreter {
            shared,
            reader: Some(reader),
            processor: Some(processor),
        }
    }

    /// A cloneable writer endpoint for the shell's stdout/stderr pipes.
    pub fn writer(&self) -> InterpreterWriter {
        InterpreterWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cooperative shutdown: flush the trailing partial line, drain the
    /// channel, and wait for both tasks to exit.
    pub async fn close(&mut self) {
        tracing::debug!("stopping step output interpreter");
        self.shared.stopped.store(true, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            let _ = reader.await;
        }
        if let Some(processor) = self.processor.take() {
            let _ = processor.await;
        }
    }

    /// The first error latched by either task, if any.
    pub fn take_error(&self) -> Option<anyhow::Error> {
        self.shared
            .error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

async fn read_lines(shared: Arc<Shared>, tx: mpsc::Sender<String>) {
    let mut backoff = INITIAL_BACKOFF;
    let mut seen_total = 0u64;

    loop {
        let (line, total) = {
            let mut buffer = shared.buffer.lock().unwrap_or_else(|e| e.into_inner());
            (buffer.next_line(), buffer.total)
        };
        if total > seen_total {
            seen_total = total;
            backoff = INITIAL_BACKOFF;
        }

        match line {
            Some(line) => {
                if tx.send(line).await.is_err() {
                    return;
                }
            }
            None => {
                if shared.stopped.load(Ordering::SeqCst) {
                    let remainder = {
                        let mut buffer =
                            shared.buffer.lock().unwrap_or_else(|e| e.into_inner());
                        buffer.take_remainder()
                    };
                    if let Some(rest) = remainder {
                        let _ = tx.send(rest).await;
                    }
                    return;
                }
                tracing::trace!(backoff_ms = backoff.as_millis() as u64, "waiting for more step output");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

async fn process_lines(
    shared: Arc<Shared>,
    backend: Arc<dyn OutputBackend>,
    mut rx: mpsc::Receiver<String>,
) {
    while let Some(line) = rx.recv().await {
        let result = match parse_workflow_command(&line) {
            Some(command) => backend.execute_command(command).await,
            None => backend.print(&line).await,
        };
        if let Err(err) = result {
            shared.latch_error(err);
            shared.stopped.store(true, Ordering::SeqCst);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingBackend {
        commands: StdMutex<Vec<ParsedCommand>>,
        printed: StdMutex<Vec<String>>,
        fail_on_command: bool,
    }

    #[async_trait]
    impl OutputBackend for RecordingBackend {
        async fn execute_command(&self, command: ParsedCommand) -> Result<()> {
            if self.fail_on_command {
                return Err(anyhow!("backend rejected {}", command.command));
            }
            self.commands
                .lock()
                .unwrap()
                .push(command);
            Ok(())
        }

        async fn print(&self, text: &str) -> Result<()> {
            self.printed.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lines_are_classified_in_order() {
        let backend = Arc::new(RecordingBackend::default());
        let mut interp = StepOutputInterpreter::start(backend.clone());
        let w = interp.writer();

        w.write(b"plain one\n::set-output name=foo::bar\nplain two\n")
            .unwrap();
        interp.close().await;

        assert!(interp.take_error().is_none());
        assert_eq!(
            *backend.printed.lock().unwrap(),
            vec!["plain one".to_string(), "plain two".to_string()]
        );
        let commands = backend.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].data, "bar");
    }

    #[tokio::test]
    async fn test_split_writes_reassemble_lines() {
        let backend = Arc::new(RecordingBackend::default());
        let mut interp = StepOutputInterpreter::start(backend.clone());
        let w = interp.writer();

        w.write(b"hel").unwrap();
        w.write(b"lo wor").unwrap();
        w.write(b"ld\n").unwrap();
        interp.close().await;

        assert_eq!(*backend.printed.lock().unwrap(), vec!["hello world".to_string()]);
    }

    #[tokio::test]
    async fn test_trailing_partial_line_flushes_on_close() {
        let backend = Arc::new(RecordingBackend::default());
        let mut interp = StepOutputInterpreter::start(backend.clone());
        let w = interp.writer();

        w.write(b"no newline at end").unwrap();
        interp.close().await;

        assert_eq!(
            *backend.printed.lock().unwrap(),
            vec!["no newline at end".to_string()]
        );
    }

    #[tokio::test]
    async fn test_backend_error_is_latched_and_stops_writes() {
        let backend = Arc::new(RecordingBackend {
            fail_on_command: true,
            ..Default::default()
        });
        let mut interp = StepOutputInterpreter::start(backend.clone());
        let w = interp.writer();

        w.write(b"::set-env name=X::y\n").unwrap();
        interp.close().await;

        let err = interp.take_error().expect("error must be latched");
        assert!(err.to_string().contains("backend rejected set-env"));
        assert!(w.write(b"more\n").is_err());
    }

    #[tokio::test]
    async fn test_crlf_is_stripped() {
        let backend = Arc::new(RecordingBackend::default());
        let mut interp = StepOutputInterpreter::start(backend.clone());
        let w = interp.writer();

        w.write(b"windows line\r\n").unwrap();
        interp.close().await;

        assert_eq!(*backend.printed.lock().unwrap(), vec!["windows line".to_string()]);
    }
}
