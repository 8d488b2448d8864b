//! Wire formats.
//!
//! Two channels carry three message kinds:
//!
//! ```text
//! control channel (stream, length-prefixed frames)
//! +0  Frame Length (4 bytes LE32, excludes itself)
//! +4  Frame Type (1 byte: 0x01 handshake, 0x02 hello)
//! +5  Body
//!
//! update channel (one datagram = one message)
//! +0  Version (1 byte)
//! +1  Type (1 byte: 0x03)
//! +2  Originator, Sequence, Sent-At, Routes
//! ```
//!
//! All integers are little-endian. Strings are a one-byte length followed by
//! UTF-8 bytes.

mod codec;
mod frame;
mod message;

pub use codec::{WireReader, WireWriter};
pub use frame::{FRAME_LENGTH_SIZE, decode_frame_length, encode_frame};
pub use message::*;
