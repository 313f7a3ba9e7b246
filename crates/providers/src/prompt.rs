//! Interactive prompt: one question at a time on a line-oriented terminal.

use crate::{DecisionProvider, ProviderError};
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

const MENU: &str = "[1] Never archive\n[2] Archive after 60 days\n[3] Delete after 60 days\n> ";

pub struct PromptProvider<R, W> {
    io: Mutex<(R, W)>,
}

impl PromptProvider<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> PromptProvider<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    pub fn into_inner(self) -> (R, W) {
        self.io.into_inner()
    }

    async fn say(&self, text: &str) -> Result<(), ProviderError> {
        let mut io = self.io.lock().await;
        io.1.write_all(text.as_bytes()).await?;
        io.1.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R, W> DecisionProvider for PromptProvider<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn request_classification(&self, path: &Path) -> Result<String, ProviderError> {
        let mut io = self.io.lock().await;
        let (reader, writer) = &mut *io;
        let question = format!("\nClassify '{}':\n{MENU}", path.display());
        writer.write_all(question.as_bytes()).await?;
        writer.flush().await?;

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(ProviderError::Closed);
        }
        Ok(line.trim().to_string())
    }

    async fn reject(&self, _path: &Path, _answer: &str) -> Result<(), ProviderError> {
        self.say("Invalid input. Please enter 1, 2, or 3.\n").await
    }

    async fn accepted(&self, path: &Path, code: i64, label: &str) -> Result<(), ProviderError> {
        self.say(&format!(
            "File '{}' classified as {code} ({label})\n",
            path.display()
        ))
        .await
    }

    async fn not_saved(&self, path: &Path, reason: &str) -> Result<(), ProviderError> {
        self.say(&format!(
            "Could not save decision for '{}': {reason}\n",
            path.display()
        ))
        .await
    }
}
