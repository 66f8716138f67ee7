// Adapters for the externally owned peer connection and media engines
pub mod media;
pub mod peer_connection;

// Re-export adapters
pub use media::{MediaEngine, MediaStream, StreamOrigin};
pub use peer_connection::{NegotiationStep, PeerConnectionEngine, PeerConnectionEvent};
