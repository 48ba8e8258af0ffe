//! Session protocol: the wire envelope, payload validation and framing
//! helpers shared by server and clients.

pub mod protocol;

pub use protocol::{
    error_frame, internal_error_frame, pack_outbound, unpack_inbound, Envelope, InboundPayload,
    MessageType, OutboundPayload, ProtocolError, MAX_FRAME_BYTES, PROTOCOL_VERSION,
};
