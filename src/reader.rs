/// Reads a timeline file line by line into the pipeline.
///
/// Lines are forwarded raw; the parser task decides what is an event. Empty
/// lines are dropped here so the parser's line count stays meaningful.
use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;

pub async fn run(path: PathBuf, tx: Sender<String>) -> Result<()> {
    tracing::info!("Reader starting: {:?}", path);

    let file = File::open(&path)
        .await
        .with_context(|| format!("opening timeline {:?}", path))?;
    let mut lines = BufReader::new(file).lines();
    let mut count = 0usize;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        count += 1;
        if tx.send(line).await.is_err() {
            // Receiver gone, pipeline shutting down
            break;
        }
    }

    tracing::debug!("Reader finished: {} lines from {:?}", count, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn forwards_non_empty_lines() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "line one").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "line two").unwrap();
        f.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        run(f.path().to_path_buf(), tx).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "line one");
        assert_eq!(rx.recv().await.unwrap(), "line two");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        assert!(run(dir.path().join("absent.jsonl"), tx).await.is_err());
    }
}
