//! Per-connection plumbing: the delivery task and line reading

use crate::history::HistoryError;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a connection's protocol loop stopped early
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The client's outbound side is gone; ends this session only
    #[error("Client connection closed")]
    Closed,

    /// Transcript failure; fatal for the whole server
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Read one newline-terminated line into `buf`
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected. Returns
/// `Ok(false)` on end of stream; an unterminated tail before EOF is dropped.
pub async fn read_line<R>(reader: &mut R, buf: &mut String) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut raw = Vec::new();
    reader.read_until(b'\n', &mut raw).await?;
    if raw.last() != Some(&b'\n') {
        return Ok(false);
    }

    buf.push_str(&String::from_utf8_lossy(&raw));
    Ok(true)
}

/// Write a text chunk to the client and flush it
pub async fn write_text<W>(writer: &mut W, text: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}

/// Task draining a session's delivery queue onto its socket, in FIFO order
///
/// Stops when `cancel` fires, when every queue sender is gone or when a write
/// fails. The write half is shut down on exit.
pub async fn delivery_task<W>(
    mut writer: W,
    mut queue: mpsc::Receiver<String>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = queue.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = write_text(&mut writer, &msg).await {
                        tracing::debug!("Failed to write to client: {}", e);
                        break;
                    }
                }
                None => break,
            },
        }
    }

    let _ = writer.shutdown().await;
    tracing::debug!("Delivery task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    #[tokio::test]
    async fn delivers_in_order_until_cancelled() {
        let (client, server) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(delivery_task(server, rx, cancel.clone()));

        tx.send("one\n".to_string()).await.unwrap();
        tx.send("two\n".to_string()).await.unwrap();

        let mut reader = BufReader::new(client);
        let mut line = String::new();
        assert!(read_line(&mut reader, &mut line).await.unwrap());
        assert_eq!(line, "one\n");
        assert!(read_line(&mut reader, &mut line).await.unwrap());
        assert_eq!(line, "two\n");

        cancel.cancel();
        handle.await.unwrap();

        // The queue is abandoned once the task stops
        assert!(tx.send("three\n".to_string()).await.is_err());
        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "");
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced_not_rejected() {
        let input: &[u8] = b"caf\xe9\nnext\n";
        let mut reader = BufReader::new(input);
        let mut line = String::new();

        assert!(read_line(&mut reader, &mut line).await.unwrap());
        assert_eq!(line, "caf\u{fffd}\n");
        assert!(read_line(&mut reader, &mut line).await.unwrap());
        assert_eq!(line, "next\n");
    }

    #[tokio::test]
    async fn unterminated_tail_counts_as_end_of_stream() {
        let input: &[u8] = b"whole\npartial";
        let mut reader = BufReader::new(input);
        let mut line = String::new();

        assert!(read_line(&mut reader, &mut line).await.unwrap());
        assert_eq!(line, "whole\n");
        assert!(!read_line(&mut reader, &mut line).await.unwrap());
        assert_eq!(line, "");
    }

    #[tokio::test]
    async fn stops_when_queue_closes() {
        let (_client, server) = tokio::io::duplex(64);
        let (tx, rx) = mpsc::channel::<String>(1);
        let handle = tokio::spawn(delivery_task(server, rx, CancellationToken::new()));
        drop(tx);
        handle.await.unwrap();
    }
}
