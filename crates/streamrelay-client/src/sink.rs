use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::smoother::SmootherInput;

/// Receives assistant text as a turn streams in
#[async_trait]
pub trait TokenSink: Send {
    async fn on_token(&mut self, token: &str);
    async fn on_finish(&mut self);
}

pub struct NullSink;

#[async_trait]
impl TokenSink for NullSink {
    async fn on_token(&mut self, _token: &str) {}
    async fn on_finish(&mut self) {}
}

/// Forwards text to a [`Smoother`](crate::smoother::Smoother)
pub struct ChannelSink {
    tx: mpsc::Sender<SmootherInput>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<SmootherInput>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl TokenSink for ChannelSink {
    async fn on_token(&mut self, token: &str) {
        let _ = self.tx.send(SmootherInput::Token(token.to_string())).await;
    }

    async fn on_finish(&mut self) {
        let _ = self.tx.send(SmootherInput::Finished).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut sink = ChannelSink::new(tx);

        sink.on_token("Hel").await;
        sink.on_token("lo").await;
        sink.on_finish().await;

        assert_eq!(rx.recv().await, Some(SmootherInput::Token("Hel".to_string())));
        assert_eq!(rx.recv().await, Some(SmootherInput::Token("lo".to_string())));
        assert_eq!(rx.recv().await, Some(SmootherInput::Finished));
    }

    #[tokio::test]
    async fn test_channel_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut sink = ChannelSink::new(tx);

        sink.on_token("lost").await;
        sink.on_finish().await;
    }
}
