//! Offering running containers for reuse.

use std::io;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};
use tracing::{debug, info};

use crate::binding::DirectoryBinding;
use crate::engine::{ContainerHandle, EngineGateway, EngineResult};

/// Empty input, "y" or "yes", any case, surrounding whitespace ignored.
static ACCEPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:y|yes)?\s*$").expect("Invalid regex pattern for reuse answer")
});

/// The user's answer to a reuse offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    /// Anything that is not an explicit yes (or a bare Enter) declines.
    pub fn from_answer(answer: &str) -> Self {
        if ACCEPT_PATTERN.is_match(answer) {
            Decision::Accept
        } else {
            Decision::Decline
        }
    }
}

/// Line-oriented interaction with the user.
#[async_trait]
pub trait Prompt: Send {
    /// Print a line of information.
    async fn say(&mut self, message: &str) -> io::Result<()>;

    /// Show `question` and read one line. `Ok(None)` once input is closed.
    async fn ask(&mut self, question: &str) -> io::Result<Option<String>>;
}

/// Line prompt over a reader and a writer, by default stdin and stdout.
///
/// Input bytes that are not valid UTF-8 are decoded lossily, so they read as
/// an ordinary (declining) answer instead of an I/O error.
pub struct TerminalPrompt<R = BufReader<Stdin>, W = Stdout> {
    reader: R,
    writer: W,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::from_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> TerminalPrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn from_io(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

#[async_trait]
impl<R, W> Prompt for TerminalPrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn say(&mut self, message: &str) -> io::Result<()> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    async fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        self.writer.write_all(question.as_bytes()).await?;
        self.writer.flush().await?;

        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

/// Result of walking the candidate list.
#[derive(Debug)]
pub enum Negotiation {
    /// The user picked `container`; `shell` is how the attached shell ended.
    Attached {
        container: ContainerHandle,
        shell: EngineResult<()>,
    },
    /// Every candidate was declined, or there were none.
    Declined,
}

/// Offers each running candidate in turn and attaches to the first accepted.
pub struct Negotiator<'a> {
    engine: &'a dyn EngineGateway,
    prompt: &'a mut dyn Prompt,
    shell: &'a [String],
}

impl<'a> Negotiator<'a> {
    pub fn new(
        engine: &'a dyn EngineGateway,
        prompt: &'a mut dyn Prompt,
        shell: &'a [String],
    ) -> Self {
        Self {
            engine,
            prompt,
            shell,
        }
    }

    /// Each candidate is asked about exactly once. End of input declines
    /// everything that is left.
    pub async fn negotiate(
        &mut self,
        binding: &DirectoryBinding,
        candidates: &[ContainerHandle],
    ) -> io::Result<Negotiation> {
        if candidates.is_empty() {
            return Ok(Negotiation::Declined);
        }

        self.prompt
            .say(&format!(
                "{} is already mounted in {} {}.",
                binding.host_path(),
                candidates.len(),
                if candidates.len() > 1 {
                    "containers"
                } else {
                    "container"
                }
            ))
            .await?;

        for candidate in candidates {
            let question = format!(
                "New shell in {}, running for {}? [Y] ",
                candidate.id,
                candidate.running_for.to_lowercase()
            );

            let Some(answer) = self.prompt.ask(&question).await? else {
                debug!("input closed, declining remaining candidates");
                break;
            };

            match Decision::from_answer(&answer) {
                Decision::Accept => {
                    info!("attaching to running container {}", candidate.id);
                    let shell = self
                        .engine
                        .exec_interactive_shell(candidate, self.shell)
                        .await;
                    return Ok(Negotiation::Attached {
                        container: candidate.clone(),
                        shell,
                    });
                }
                Decision::Decline => debug!("declined {}", candidate.id),
            }
        }

        Ok(Negotiation::Declined)
    }
}
