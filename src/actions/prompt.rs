//! Yes/no confirmation before remediation.
//!
//! The interactive prompt reads stdin through [`CancellableStdin`], so a
//! Ctrl+C while the question is open ends the wait instead of leaving it
//! blocked until the next line.

use std::io::{self, BufRead, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often a pending answer checks for cancellation.
const ANSWER_POLL: Duration = Duration::from_millis(50);

/// Asks the user to confirm an action.
pub trait Confirm {
    /// Ask `question` and return the answer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if input cannot be read or ends before a
    /// recognizable answer is given.
    fn confirm(&mut self, question: &str) -> io::Result<bool>;
}

/// Answers every question the same way (`--yes`, `--no-remediate`).
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        log::info!("{} {}", question, if self.0 { "yes" } else { "no" });
        Ok(self.0)
    }
}

/// Interactive prompt over a reader/writer pair.
///
/// Unrecognized input is re-prompted; there is no default answer.
#[derive(Debug)]
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl PromptConfirm<CancellableStdin, io::Stdout> {
    /// Prompt on the process's stdin/stdout, giving up once `cancel` is set.
    #[must_use]
    pub fn stdio(cancel: Arc<AtomicBool>) -> Self {
        Self::new(CancellableStdin::new(cancel), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    /// Prompt on arbitrary streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

/// Interpret an answer; `None` for anything unrecognized.
///
/// # Example
///
/// ```
/// use filevet::actions::prompt::parse_answer;
///
/// assert_eq!(parse_answer(" Yes\n"), Some(true));
/// assert_eq!(parse_answer("n"), Some(false));
/// assert_eq!(parse_answer(""), None);
/// ```
#[must_use]
pub fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Stdin as a [`BufRead`] that fails once `cancel` is set.
///
/// Lines are read on a helper thread, started on first use, so a wait for
/// input can still observe the flag.
#[derive(Debug)]
pub struct CancellableStdin {
    cancel: Arc<AtomicBool>,
    lines: Option<Receiver<io::Result<String>>>,
    buf: Vec<u8>,
    pos: usize,
}

impl CancellableStdin {
    #[must_use]
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self::with_lines(cancel, None)
    }

    fn with_lines(cancel: Arc<AtomicBool>, lines: Option<Receiver<io::Result<String>>>) -> Self {
        Self {
            cancel,
            lines,
            buf: Vec::new(),
            pos: 0,
        }
    }

    /// Next line of input; `None` at end of input.
    fn next_line(&mut self) -> io::Result<Option<String>> {
        let lines = self.lines.get_or_insert_with(spawn_stdin_reader);
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(io::Error::other("cancelled while awaiting an answer"));
            }
            match lines.recv_timeout(ANSWER_POLL) {
                Ok(line) => return line.map(Some),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}

impl Read for CancellableStdin {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for CancellableStdin {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.buf.len() {
            self.buf = self.next_line()?.map(String::into_bytes).unwrap_or_default();
            self.pos = 0;
        }
        Ok(&self.buf[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.buf.len());
    }
}

fn spawn_stdin_reader() -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = io::stdin();
        loop {
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e));
                    break;
                }
            }
        }
    });
    rx
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let mut line = String::new();
        loop {
            write!(self.output, "{question} (y/n): ")?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input closed before confirmation",
                ));
            }

            match parse_answer(&line) {
                Some(answer) => return Ok(answer),
                None => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }
}
