use async_trait::async_trait;

use super::RecordError;

#[async_trait]
pub trait Recorder {
    /// Launches the interactive recorder and blocks until the user closes it,
    /// returning the raw script it emitted.
    async fn record(&self) -> Result<String, RecordError>;
}

pub type RecorderBox = Box<dyn Recorder + Send + Sync>;
