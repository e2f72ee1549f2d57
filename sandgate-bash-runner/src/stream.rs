//! Bounded capture of child process output.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 8 * 1024;

/// Collects one output stream of a child into a shared buffer, keeping at
/// most `limit` bytes and draining (but discarding) the rest so the child
/// never blocks on a full pipe.
///
/// The buffer is shared with the reader task so whatever arrived before a
/// timeout is still available after the task is abandoned.
pub struct CapturedStream {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl CapturedStream {
    pub fn spawn<R>(source: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = source.map(|source| {
            let buffer = Arc::clone(&buffer);
            tokio::spawn(read_with_limit(source, buffer, limit))
        });
        Self { buffer, reader }
    }

    /// Wait until the stream hits EOF. Safe to call again after a cancelled wait.
    pub async fn finished(&mut self) {
        if let Some(reader) = self.reader.as_mut() {
            let _ = reader.await;
            self.reader = None;
        }
    }

    /// Stop reading and return what was captured, lossily decoded as UTF-8.
    pub fn into_string(self) -> String {
        if let Some(reader) = &self.reader {
            reader.abort();
        }
        let bytes = std::mem::take(&mut *self.buffer.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

async fn read_with_limit<R>(mut source: R, buffer: Arc<Mutex<Vec<u8>>>, limit: usize)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let read = match source.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(read) => read,
        };
        let mut buffer = buffer.lock();
        let room = limit.saturating_sub(buffer.len());
        if room > 0 {
            buffer.extend(chunk.iter().take(read.min(room)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn keeps_everything_under_limit() {
        let mut stream = CapturedStream::spawn(Some(&b"hello world"[..]), 64);
        stream.finished().await;
        assert_eq!(stream.into_string(), "hello world");
    }

    #[tokio::test]
    async fn truncates_at_limit() {
        let mut stream = CapturedStream::spawn(Some(&b"hello world"[..]), 5);
        stream.finished().await;
        assert_eq!(stream.into_string(), "hello");
    }

    #[tokio::test]
    async fn missing_source_is_empty() {
        let mut stream = CapturedStream::spawn(None::<&'static [u8]>, 5);
        stream.finished().await;
        assert_eq!(stream.into_string(), "");
    }
}
