//! Chunked content streams and the copy-to-cache tee.

use anyhow::Result;
use tokio::sync::mpsc;

use super::{Cache, Output};

/// One chunk of a stream, or the error that ended it.
pub type ChunkResult = Result<Vec<u8>>;

/// Channel capacity used by the tee's downstream side.
const TEE_CAPACITY: usize = 16;

/// Ordered stream of byte chunks.
///
/// Ends when every sender is dropped. A producer that fails sends one
/// `Err` and stops.
#[derive(Debug)]
pub struct ContentStream {
    rx: mpsc::Receiver<ChunkResult>,
}

impl ContentStream {
    pub fn channel(capacity: usize) -> (mpsc::Sender<ChunkResult>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx })
    }

    /// Stream that yields `chunks` and ends.
    pub fn from_chunks(chunks: impl IntoIterator<Item = ChunkResult>) -> Self {
        let chunks: Vec<ChunkResult> = chunks.into_iter().collect();
        let (tx, stream) = Self::channel(chunks.len());
        for chunk in chunks {
            // Capacity covers every chunk.
            let _ = tx.try_send(chunk);
        }
        stream
    }

    pub async fn next(&mut self) -> Option<ChunkResult> {
        self.rx.recv().await
    }

    /// Drain into one buffer, failing on the first error chunk.
    pub async fn collect(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }
}

/// Forward `upstream` chunk by chunk while accumulating a copy for `cache`.
///
/// The copy is committed with [`Cache::set_if_current`] once upstream
/// completes, before the returned stream ends. On an upstream error the
/// error is forwarded and the cache is left untouched. A consumer that
/// hangs up early does not stop the copy.
pub fn tee_to_cache(mut upstream: ContentStream, cache: Cache<Output>, epoch: u64) -> ContentStream {
    let (tx, downstream) = ContentStream::channel(TEE_CAPACITY);

    tokio::spawn(async move {
        let mut copy = Vec::new();
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    copy.extend_from_slice(&bytes);
                    let _ = tx.send(Ok(bytes)).await;
                }
                Err(e) => {
                    crate::debug!("cache"; "stream failed, cache left unset: {:#}", e);
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
        if !cache.set_if_current(epoch, Output::from(copy)) {
            crate::debug!("cache"; "stream finished after invalidation, discarded");
        }
    });

    downstream
}
