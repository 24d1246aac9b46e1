pub mod client;
pub mod logging;
pub mod mock_client;
pub mod stream;
pub mod threads;

pub use client::{ByteStream, ChatClient, ChatTransport, TransportError};
pub use stream::FrameDecoder;
pub use threads::{HttpThreadBackend, InMemoryThreadBackend, ThreadBackend, ThreadDirectory};
