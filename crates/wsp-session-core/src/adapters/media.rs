use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Where a stream came from
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum StreamOrigin {
    Local,
    Remote,
}

/// Opaque handle to a media stream owned by the media engine
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    pub id: String,
    pub origin: StreamOrigin,
}

impl MediaStream {
    pub fn local(id: impl Into<String>) -> Self {
        Self { id: id.into(), origin: StreamOrigin::Local }
    }

    pub fn remote(id: impl Into<String>) -> Self {
        Self { id: id.into(), origin: StreamOrigin::Remote }
    }
}

/// Capture and playback are owned by the media engine; the session only
/// acquires and releases streams.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn acquire_local_stream(&self) -> Result<MediaStream>;

    async fn release_stream(&self, stream: &MediaStream) -> Result<()>;
}
