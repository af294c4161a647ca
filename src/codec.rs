pub mod envelope;

pub use envelope::{
    command_frame, decode_inbound, subscribe_frame, Acknowledgement, BlockPosition, ChatMessage,
    EnvelopeError, Inbound, MessagePurpose,
};
