//! Process-backed verifier driven by a command template.
//!
//! The template is split into a program and its arguments; every
//! occurrence of [`PLACEHOLDER`] is replaced with the file being checked.
//! Segments wrapped in double quotes are kept together, so templates like
//! `"C:\Program Files\ffmpeg\ffmpeg.exe" -i {filePath} -f null -` work.
//!
//! The child's stdout and stderr are drained on helper threads while the
//! caller polls for exit, which lets a cancellation request kill the process
//! instead of waiting for it. A grandchild that inherits the pipes can keep
//! them open after the child is gone, so output is only awaited for a
//! bounded grace period after exit, and not at all after a kill.

use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use super::{InvocationFault, Verifier};

/// Token replaced with the path of the file under test.
pub const PLACEHOLDER: &str = "{filePath}";

/// How often a running child is checked for exit or cancellation.
const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// How long output is awaited once the child has exited.
const DEFAULT_OUTPUT_GRACE: Duration = Duration::from_secs(2);

/// Errors in a command template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// The template contains no program.
    #[error("verifier command is empty")]
    Empty,

    /// A double quote was opened but never closed.
    #[error("unterminated quote in verifier command: {0}")]
    UnterminatedQuote(String),

    /// The template never references the file.
    #[error("verifier command must contain the {{filePath}} placeholder: {0}")]
    MissingPlaceholder(String),
}

/// A parsed command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    program: String,
    args: Vec<String>,
}

impl CommandTemplate {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is empty, has an
    /// unbalanced quote, or lacks the `{filePath}` placeholder.
    ///
    /// # Example
    ///
    /// ```
    /// use filevet::verifier::CommandTemplate;
    ///
    /// let template = CommandTemplate::parse("ffmpeg -v error -i {filePath} -f null -").unwrap();
    /// assert_eq!(template.program(), "ffmpeg");
    /// assert_eq!(template.args().len(), 7);
    /// ```
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let tokens = tokenize(template)?;
        let mut tokens = tokens.into_iter();
        let program = tokens.next().ok_or(TemplateError::Empty)?;
        let args: Vec<String> = tokens.collect();

        if !program.contains(PLACEHOLDER) && !args.iter().any(|a| a.contains(PLACEHOLDER)) {
            return Err(TemplateError::MissingPlaceholder(template.to_string()));
        }

        Ok(Self { program, args })
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Unsubstituted argument tokens.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Substitute `path` into the template.
    ///
    /// A token that is exactly the placeholder receives the raw OS path, so
    /// non-UTF-8 names survive unchanged.
    #[must_use]
    pub fn render(&self, path: &Path) -> (OsString, Vec<OsString>) {
        (
            substitute(&self.program, path),
            self.args.iter().map(|arg| substitute(arg, path)).collect(),
        )
    }
}

fn substitute(token: &str, path: &Path) -> OsString {
    if token == PLACEHOLDER {
        path.as_os_str().to_os_string()
    } else if token.contains(PLACEHOLDER) {
        OsString::from(token.replace(PLACEHOLDER, &path.to_string_lossy()))
    } else {
        OsString::from(token)
    }
}

/// Split on whitespace, keeping double-quoted segments together.
fn tokenize(template: &str) -> Result<Vec<String>, TemplateError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in template.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err(TemplateError::UnterminatedQuote(template.to_string()));
    }
    if has_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Verifier that runs an external command per file.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    template: CommandTemplate,
    flag_nonzero_exit: bool,
    wait_interval: Duration,
    output_grace: Duration,
}

impl CommandVerifier {
    /// Create a verifier for a parsed template.
    #[must_use]
    pub fn new(template: CommandTemplate) -> Self {
        Self {
            template,
            flag_nonzero_exit: false,
            wait_interval: DEFAULT_WAIT_INTERVAL,
            output_grace: DEFAULT_OUTPUT_GRACE,
        }
    }

    /// Parse `template` and create a verifier for it.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the template is invalid.
    pub fn from_template(template: &str) -> Result<Self, TemplateError> {
        CommandTemplate::parse(template).map(Self::new)
    }

    /// Also flag files whose check exits unsuccessfully without output.
    #[must_use]
    pub fn with_flag_nonzero_exit(mut self, enabled: bool) -> Self {
        self.flag_nonzero_exit = enabled;
        self
    }

    /// Set how often a running child is polled.
    #[must_use]
    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval = interval;
        self
    }

    /// Set how long output is awaited after the child exits.
    #[must_use]
    pub fn with_output_grace(mut self, grace: Duration) -> Self {
        self.output_grace = grace;
        self
    }

    /// The template this verifier runs.
    #[must_use]
    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }

    fn wait(
        &self,
        child: &mut Child,
        path: &Path,
        cancel: &AtomicBool,
    ) -> Result<ExitStatus, InvocationFault> {
        loop {
            if cancel.load(Ordering::SeqCst) {
                log::debug!("Killing verifier for {}", path.display());
                let _ = child.kill();
                let _ = child.wait();
                return Err(InvocationFault::Cancelled(path.to_path_buf()));
            }

            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => thread::sleep(self.wait_interval),
                Err(source) => {
                    let _ = child.kill();
                    return Err(InvocationFault::Wait {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }
    }
}

impl Verifier for CommandVerifier {
    fn verify(&self, path: &Path, cancel: &AtomicBool) -> Result<String, InvocationFault> {
        let (program, args) = self.template.render(path);
        log::trace!("Running {:?} {:?}", program, args);

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| InvocationFault::Spawn {
                program: program.to_string_lossy().into_owned(),
                source,
            })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        // Dropping the receivers after a kill leaves the drain threads to
        // finish on their own.
        let status = self.wait(&mut child, path, cancel)?;

        let deadline = Instant::now() + self.output_grace;
        let stderr = collect(stderr, deadline, path);
        let stdout = collect(stdout, deadline, path);

        let mut diagnostic = stderr.trim().to_string();
        let stdout = stdout.trim();
        if !stdout.is_empty() {
            if !diagnostic.is_empty() {
                diagnostic.push('\n');
            }
            diagnostic.push_str(stdout);
        }

        if diagnostic.is_empty() && self.flag_nonzero_exit && !status.success() {
            diagnostic = format!("verifier exited with {status}");
        }

        Ok(diagnostic)
    }
}

/// Forward `reader` in chunks until EOF; the channel closes with the pipe.
fn drain<R: Read + Send + 'static>(mut reader: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Gather drained output until the pipe closes or `deadline` passes.
fn collect(chunks: Option<Receiver<Vec<u8>>>, deadline: Instant, path: &Path) -> String {
    let Some(chunks) = chunks else {
        return String::new();
    };

    let mut buf = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match chunks.recv_timeout(remaining) {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                log::debug!(
                    "Output of verifier for {} still open after exit; keeping what arrived",
                    path.display()
                );
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
