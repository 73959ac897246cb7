//! Operator console - commands typed on the server's standard input

use crate::server::SessionTable;
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Command printing the names of all joined clients
pub const LIST_NAMES_COMMAND: &str = "--clientNames";

/// Read operator commands until end of input
pub async fn run<R, W>(input: R, mut output: W, table: Arc<SessionTable>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.starts_with(LIST_NAMES_COMMAND) {
            for name in table.list_active_names() {
                output.write_all(name.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
            output.flush().await?;
        } else if !line.trim().is_empty() {
            tracing::debug!("Ignoring unknown console command: {}", line);
        }
    }

    tracing::debug!("Console input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn lists_joined_names_in_slot_order() {
        let table = Arc::new(SessionTable::default());
        let (tx, _rx) = mpsc::channel(1);
        let a = table.allocate(tx.clone()).unwrap();
        let _pending = table.allocate(tx.clone()).unwrap();
        let c = table.allocate(tx).unwrap();
        table.claim_name(c, "carol").unwrap();
        table.claim_name(a, "alice").unwrap();

        let input: &[u8] = b"hello\n--clientNames\n";
        let mut output = Vec::new();
        run(input, &mut output, table).await.unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "alice\ncarol\n");
    }
}
