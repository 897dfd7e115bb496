use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

#[derive(Debug, thiserror::Error)]
pub enum AwaitOutputError {
    #[error("timed out after {timeout:?} waiting for '{pattern}'")]
    Timeout {
        pattern: String,
        timeout: Duration,
        output: String,
    },
    #[error("output ended before '{pattern}' appeared")]
    Closed { pattern: String, output: String },
    #[error("failed to follow workload output: {cause:#}")]
    Follow { cause: anyhow::Error },
}

impl AwaitOutputError {
    /// The output captured before the wait failed.
    pub fn output(&self) -> Option<&str> {
        match self {
            AwaitOutputError::Timeout { output, .. } | AwaitOutputError::Closed { output, .. } => {
                Some(output)
            }
            AwaitOutputError::Follow { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunToCompletionError {
    #[error("failed to launch workload: {cause:#}")]
    Launch { cause: anyhow::Error },
    #[error("workload exited with {status}")]
    Exited { status: String, output: String },
    #[error("workload did not finish within {timeout:?}")]
    TimedOut { timeout: Duration },
}

impl RunToCompletionError {
    /// The combined output of the workload, if it ran far enough to produce any.
    pub fn output(&self) -> Option<&str> {
        match self {
            RunToCompletionError::Exited { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Forward each line read from `reader` into `sender` until the reader is exhausted or the
/// receiving side goes away.
pub fn forward_lines<R>(reader: R, sender: UnboundedSender<String>) -> tokio::task::JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if sender.send(line).is_err() {
                break;
            }
        }
    })
}

/// Consume lines until one contains `pattern`, giving up after `timeout`.
///
/// Every line seen is logged under `log_target` and returned as part of the captured output, both
/// on success and inside the error.
pub async fn wait_for_pattern(
    lines: &mut UnboundedReceiver<String>,
    pattern: &str,
    timeout: Duration,
    log_target: &str,
) -> Result<String, AwaitOutputError> {
    let mut output = String::new();

    let found = tokio::time::timeout(timeout, async {
        while let Some(line) = lines.recv().await {
            log::info!(target: log_target, "{line}");
            output.push_str(&line);
            output.push('\n');
            if line.contains(pattern) {
                return true;
            }
        }
        false
    })
    .await;

    match found {
        Ok(true) => Ok(output),
        Ok(false) => Err(AwaitOutputError::Closed {
            pattern: pattern.to_string(),
            output,
        }),
        Err(_) => Err(AwaitOutputError::Timeout {
            pattern: pattern.to_string(),
            timeout,
            output,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    const READY: &str = "Uvicorn running on http://0.0.0.0:8000";

    #[tokio::test]
    async fn returns_output_up_to_pattern() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        sender.send("INFO loading model".to_string()).unwrap();
        sender
            .send(format!("INFO:     {READY} (Press CTRL+C to quit)"))
            .unwrap();
        sender.send("INFO request".to_string()).unwrap();

        let output = wait_for_pattern(&mut receiver, READY, Duration::from_secs(5), "test")
            .await
            .expect("pattern not found");

        assert_eq!(
            "INFO loading model\nINFO:     Uvicorn running on http://0.0.0.0:8000 (Press CTRL+C to quit)\n",
            output
        );
    }

    #[tokio::test]
    async fn silent_stream_times_out() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<String>();
        sender.send("INFO loading model".to_string()).unwrap();

        let timeout = Duration::from_millis(50);
        let started = Instant::now();
        let err = wait_for_pattern(&mut receiver, READY, timeout, "test")
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= timeout, "returned after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "returned after {elapsed:?}");
        match err {
            AwaitOutputError::Timeout { output, .. } => {
                assert_eq!("INFO loading model\n", output)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        drop(sender);
    }

    #[tokio::test]
    async fn closed_stream_is_not_a_timeout() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel::<String>();
        sender.send("Traceback (most recent call last):".to_string()).unwrap();
        drop(sender);

        let err = wait_for_pattern(&mut receiver, READY, Duration::from_secs(5), "test")
            .await
            .unwrap_err();

        assert!(matches!(err, AwaitOutputError::Closed { .. }), "{err:?}");
        assert_eq!(Some("Traceback (most recent call last):\n"), err.output());
    }

    #[tokio::test]
    async fn forwards_lines_from_reader() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let handle = forward_lines(&b"one\ntwo\n"[..], sender);
        handle.await.unwrap();

        assert_eq!(Some("one".to_string()), receiver.recv().await);
        assert_eq!(Some("two".to_string()), receiver.recv().await);
        assert_eq!(None, receiver.recv().await);
    }
}
