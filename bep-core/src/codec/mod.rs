//! The BEP wire format: frame headers, XDR primitives, message bodies, LZ4
//! compression, and the `tokio_util::codec` glue that ties them to a
//! `Framed` stream. `discovery` and `relay` cover the adjacent wire formats
//! from §6 that share the XDR primitives but are not BEP messages proper.

pub mod compress;
pub mod discovery;
pub mod framed;
pub mod header;
pub mod message;
pub mod relay;
pub mod xdr;

pub use framed::{BepCodec, Frame, MessageIdAllocator};
pub use header::{FrameHeader, MessageType, HEADER_LEN, PROTOCOL_VERSION};
pub use message::{Close, Message, Request, Response};
