use async_trait::async_trait;
use std::fmt::Debug;

/// Opaque identifier of the chat a message goes to, as handed out by the
/// messaging gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Destination(pub i64);

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn send(&self, destination: Destination, text: &str) -> anyhow::Result<()>;
}
