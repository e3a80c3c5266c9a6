use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::GenerationError;

/// Runs a generation command to completion.
///
/// Implementations feed `stdin` to the process and return its stdout when it
/// exits successfully.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &[String], stdin: Vec<u8>) -> Result<Vec<u8>, GenerationError>;
}

/// Spawns real subprocesses through `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner {
    timeout: Option<Duration>,
}

impl TokioProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &[String], stdin: Vec<u8>) -> Result<Vec<u8>, GenerationError> {
        let (program, args) = command.split_first().ok_or(GenerationError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| GenerationError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Feed stdin concurrently so a chatty child cannot fill its stdout
        // pipe while we are still writing.
        let writer = child.stdin.take().map(|mut pipe| {
            tokio::spawn(async move {
                pipe.write_all(&stdin).await?;
                pipe.shutdown().await
            })
        });

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| GenerationError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        if let Some(writer) = writer {
            match writer.await {
                Ok(Err(e)) => debug!("Generator closed stdin early: {}", e),
                Err(e) => debug!("Stdin writer task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }

        if !output.status.success() {
            return Err(GenerationError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}
