//! Closable line source for the interactive REPL.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::backends::CancelHandle;

/// Reads user input one line at a time.
///
/// The source can be closed from another task through [`LineInput::closer`];
/// a read pending at that moment resolves as end of input.
pub struct LineInput<R> {
    lines: Lines<R>,
    closer: CancelHandle,
    closed: bool,
}

impl<R: AsyncBufRead + Unpin> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            closer: CancelHandle::new(),
            closed: false,
        }
    }

    /// Handle that closes this source when cancelled.
    pub fn closer(&self) -> CancelHandle {
        self.closer.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed || self.closer.is_cancelled()
    }

    /// Next line without its line ending, or `None` once the source hit EOF
    /// or was closed.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        if self.is_closed() {
            return Ok(None);
        }

        let line = tokio::select! {
            biased;
            _ = self.closer.cancelled() => None,
            line = self.lines.next_line() => line?,
        };
        if line.is_none() {
            self.closed = true;
        }
        Ok(line)
    }
}

impl LineInput<BufReader<Stdin>> {
    /// Line source over the process's standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reads_lines_until_eof() {
        let mut input = LineInput::new(&b"first\r\nsecond\n"[..]);
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(input.read_line().await.unwrap().as_deref(), Some("second"));
        assert_eq!(input.read_line().await.unwrap(), None);
        assert!(input.is_closed());
        assert_eq!(input.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn closing_resolves_pending_read() {
        let (_writer, reader) = tokio::io::duplex(64);
        let mut input = LineInput::new(BufReader::new(reader));
        let closer = input.closer();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.cancel();
        });

        let line = tokio::time::timeout(Duration::from_secs(2), input.read_line())
            .await
            .expect("read should resolve once closed")
            .unwrap();
        assert_eq!(line, None);
    }

    #[tokio::test]
    async fn closed_source_ignores_buffered_input() {
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"late\n").await.unwrap();
        let mut input = LineInput::new(BufReader::new(reader));
        input.closer().cancel();
        assert_eq!(input.read_line().await.unwrap(), None);
    }
}
