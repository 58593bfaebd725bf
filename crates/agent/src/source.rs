//! Stock [`TokenSource`] adapters.
//!
//! Model integrations usually produce text either by pushing into a channel
//! from a background task or as a `futures::Stream`. Both can be stopped
//! early: closing the receiver makes the producer's next send fail, and
//! dropping a stream drops whatever request it owns.

use async_trait::async_trait;
use campuspilot_core::error::TokenSourceError;
use campuspilot_core::model::TokenSource;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

type Chunk = Result<String, TokenSourceError>;

/// Reads chunks from an mpsc channel fed by a producer task.
pub struct ChannelTokenSource {
    receiver: Option<mpsc::Receiver<Chunk>>,
}

impl ChannelTokenSource {
    pub fn new(receiver: mpsc::Receiver<Chunk>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }

    /// Create a source together with the sender a producer writes into.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Chunk>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl TokenSource for ChannelTokenSource {
    async fn next_chunk(&mut self) -> Option<Chunk> {
        match self.receiver.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    fn can_cancel(&self) -> bool {
        true
    }

    fn cancel(&mut self) {
        if let Some(mut rx) = self.receiver.take() {
            rx.close();
        }
    }
}

/// Reads chunks from any `Stream` of text results.
pub struct StreamTokenSource<S> {
    stream: Option<S>,
}

impl<S> StreamTokenSource<S>
where
    S: Stream<Item = Chunk> + Send + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
        }
    }
}

impl StreamTokenSource<futures::stream::Iter<std::vec::IntoIter<Chunk>>> {
    /// A finite source over prepared chunks, e.g. for replaying transcripts.
    pub fn from_chunks<I, T>(chunks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let items: Vec<Chunk> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(futures::stream::iter(items))
    }
}

#[async_trait]
impl<S> TokenSource for StreamTokenSource<S>
where
    S: Stream<Item = Chunk> + Send + Unpin,
{
    async fn next_chunk(&mut self) -> Option<Chunk> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    fn can_cancel(&self) -> bool {
        true
    }

    fn cancel(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_reads_until_sender_drops() {
        let (tx, mut source) = ChannelTokenSource::channel(4);
        tokio::spawn(async move {
            tx.send(Ok("<answer>".into())).await.unwrap();
            tx.send(Ok("hi</answer>".into())).await.unwrap();
        });

        assert_eq!(source.next_chunk().await, Some(Ok("<answer>".into())));
        assert_eq!(source.next_chunk().await, Some(Ok("hi</answer>".into())));
        assert_eq!(source.next_chunk().await, None);
    }

    #[tokio::test]
    async fn channel_cancel_stops_producer() {
        let (tx, mut source) = ChannelTokenSource::channel(1);
        tx.send(Ok("first".into())).await.unwrap();
        assert!(source.can_cancel());

        source.cancel();
        assert!(tx.send(Ok("second".into())).await.is_err());
        assert_eq!(source.next_chunk().await, None);
    }

    #[tokio::test]
    async fn stream_source_forwards_errors() {
        let items: Vec<Chunk> = vec![
            Ok("partial".into()),
            Err(TokenSourceError::StreamInterrupted("reset".into())),
        ];
        let mut source = StreamTokenSource::new(futures::stream::iter(items));
        assert_eq!(source.next_chunk().await, Some(Ok("partial".into())));
        assert!(matches!(
            source.next_chunk().await,
            Some(Err(TokenSourceError::StreamInterrupted(_)))
        ));
    }

    #[tokio::test]
    async fn stream_cancel_ends_source() {
        let mut source = StreamTokenSource::from_chunks(["a", "b"]);
        assert_eq!(source.next_chunk().await, Some(Ok("a".into())));
        source.cancel();
        assert_eq!(source.next_chunk().await, None);
    }
}
