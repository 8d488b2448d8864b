//! Control and update message types.

use std::net::Ipv4Addr;
use std::time::{SystemTime, UNIX_EPOCH};

use super::codec::{WireReader, WireWriter};
use crate::core::{
    DecodeError, EncodeError, FRAME_TYPE_DV_UPDATE, FRAME_TYPE_HANDSHAKE, FRAME_TYPE_HELLO,
    INFINITY, MAX_DATAGRAM_SIZE, NeighborId, NextHop, PROTOCOL_VERSION, Prefix,
};

// Identifiers are at most MAX_ID_LEN bytes by construction, and so is the
// local sentinel.
fn put_short_str(w: &mut WireWriter, s: &str) {
    w.put_u8(s.len() as u8);
    w.put_bytes(s.as_bytes());
}

fn put_id(w: &mut WireWriter, id: &NeighborId) {
    put_short_str(w, id.as_str());
}

fn read_id(r: &mut WireReader<'_>) -> Result<NeighborId, DecodeError> {
    NeighborId::new(r.str()?)
}

/// Parameters exchanged once per control connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeParams {
    /// Identifier of the sending router.
    pub originator: NeighborId,
    /// Port the sender listens on for update datagrams.
    pub udp_port: u16,
}

/// A message on the control channel.
///
/// Body layout (inside a length-prefixed frame):
/// ```text
/// Handshake: 0x01 | Originator (str) | UDP Port (LE16)
/// Hello:     0x02 | Originator (str)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Session parameters, sent once by each side.
    Handshake(HandshakeParams),
    /// Keepalive carrying only the sender identity.
    Hello {
        /// Identifier of the sending router.
        originator: NeighborId,
    },
}

impl ControlMessage {
    /// Build a hello for `originator`.
    pub fn hello(originator: NeighborId) -> Self {
        Self::Hello { originator }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::Hello { .. } => "hello",
        }
    }

    /// Encode the frame body (type byte + fields).
    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::with_capacity(64);
        match self {
            Self::Handshake(params) => {
                w.put_u8(FRAME_TYPE_HANDSHAKE);
                put_id(&mut w, &params.originator);
                w.put_u16(params.udp_port);
            }
            Self::Hello { originator } => {
                w.put_u8(FRAME_TYPE_HELLO);
                put_id(&mut w, originator);
            }
        }
        w.into_inner()
    }

    /// Decode a frame body.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = WireReader::new(data);
        let msg = match r.u8()? {
            FRAME_TYPE_HANDSHAKE => {
                let originator = read_id(&mut r)?;
                let udp_port = r.u16()?;
                Self::Handshake(HandshakeParams {
                    originator,
                    udp_port,
                })
            }
            FRAME_TYPE_HELLO => Self::Hello {
                originator: read_id(&mut r)?,
            },
            other => return Err(DecodeError::UnknownType(other)),
        };
        r.finish()?;
        Ok(msg)
    }
}

/// One advertised destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAdvert {
    /// Destination prefix.
    pub prefix: Prefix,
    /// The sender's own next hop.
    ///
    /// Carried for wire compatibility only. Receivers never act on it and
    /// always use the datagram's originator as the candidate next hop.
    pub next_hop: NextHop,
    /// Sender's cost to the destination, 0..=16.
    pub metric: u8,
}

impl RouteAdvert {
    fn wire_size(&self) -> usize {
        4 + 1 + 1 + self.next_hop.as_wire_str().len() + 1
    }
}

/// A full-table distance-vector update (one datagram).
///
/// Wire format:
/// ```text
/// +0   Version (1 byte)
/// +1   Type (1 byte, 0x03)
/// +2   Originator (str)
/// +n   Sequence (8 bytes LE64)
/// +n+8 Sent At (8 bytes LE64, ms since Unix epoch)
/// +n+16 Route Count (2 bytes LE16)
///      Routes: Address (4) | Prefix Len (1) | Next Hop (str) | Metric (1)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DvMessage {
    /// Protocol version.
    pub version: u8,
    /// Identifier of the sending router.
    pub originator: NeighborId,
    /// Sender-owned monotonic counter, shared by one broadcast.
    pub sequence: u64,
    /// Send time in milliseconds since the Unix epoch.
    pub sent_at_ms: u64,
    /// Every entry of the sender's table, in table order.
    pub routes: Vec<RouteAdvert>,
}

impl DvMessage {
    /// Create a message stamped with the current wall-clock time.
    pub fn new(originator: NeighborId, sequence: u64, routes: Vec<RouteAdvert>) -> Self {
        let sent_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            version: PROTOCOL_VERSION,
            originator,
            sequence,
            sent_at_ms,
            routes,
        }
    }

    /// Total wire size.
    pub fn wire_size(&self) -> usize {
        let header = 1 + 1 + 1 + self.originator.as_str().len() + 8 + 8 + 2;
        header + self.routes.iter().map(RouteAdvert::wire_size).sum::<usize>()
    }

    /// Encode to a single datagram payload.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.routes.len() > u16::MAX as usize {
            return Err(EncodeError::TooManyRoutes(self.routes.len()));
        }
        let size = self.wire_size();
        if size > MAX_DATAGRAM_SIZE {
            return Err(EncodeError::TooLarge {
                size,
                limit: MAX_DATAGRAM_SIZE,
            });
        }

        let mut w = WireWriter::with_capacity(size);
        w.put_u8(self.version);
        w.put_u8(FRAME_TYPE_DV_UPDATE);
        put_id(&mut w, &self.originator);
        w.put_u64(self.sequence);
        w.put_u64(self.sent_at_ms);
        w.put_u16(self.routes.len() as u16);
        for route in &self.routes {
            w.put_bytes(&route.prefix.addr().octets());
            w.put_u8(route.prefix.prefix_len());
            put_short_str(&mut w, route.next_hop.as_wire_str());
            w.put_u8(route.metric);
        }
        Ok(w.into_inner())
    }

    /// Decode a datagram payload.
    ///
    /// Metrics above [`INFINITY`] are clamped to it.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = WireReader::new(data);
        let version = r.u8()?;
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let kind = r.u8()?;
        if kind != FRAME_TYPE_DV_UPDATE {
            return Err(DecodeError::UnknownType(kind));
        }
        let originator = read_id(&mut r)?;
        let sequence = r.u64()?;
        let sent_at_ms = r.u64()?;
        let count = r.u16()? as usize;

        let mut routes = Vec::with_capacity(count.min(r.remaining() / 7));
        for _ in 0..count {
            let addr = Ipv4Addr::from(r.array::<4>()?);
            let prefix = Prefix::new(addr, r.u8()?)?;
            let next_hop = NextHop::from_wire_str(r.str()?)?;
            let metric = r.u8()?.min(INFINITY);
            routes.push(RouteAdvert {
                prefix,
                next_hop,
                metric,
            });
        }
        r.finish()?;

        Ok(Self {
            version,
            originator,
            sequence,
            sent_at_ms,
            routes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NeighborId {
        NeighborId::new(s).unwrap()
    }

    fn advert(prefix: &str, next_hop: NextHop, metric: u8) -> RouteAdvert {
        RouteAdvert {
            prefix: prefix.parse().unwrap(),
            next_hop,
            metric,
        }
    }

    #[test]
    fn test_handshake_layout() {
        let msg = ControlMessage::Handshake(HandshakeParams {
            originator: id("R1"),
            udp_port: 5001,
        });
        let encoded = msg.encode();
        assert_eq!(encoded, vec![0x01, 2, b'R', b'1', 0x89, 0x13]);
        assert_eq!(ControlMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_hello_decode() {
        let encoded = ControlMessage::hello(id("B")).encode();
        assert_eq!(encoded, vec![0x02, 1, b'B']);
        assert!(matches!(
            ControlMessage::decode(&encoded).unwrap(),
            ControlMessage::Hello { originator } if originator == id("B")
        ));
    }

    #[test]
    fn test_control_rejects_unknown_type_and_trailing() {
        assert_eq!(
            ControlMessage::decode(&[0x09, 1, b'B']),
            Err(DecodeError::UnknownType(0x09))
        );
        assert_eq!(
            ControlMessage::decode(&[0x02, 1, b'B', 0]),
            Err(DecodeError::TrailingBytes(1))
        );
        assert_eq!(
            ControlMessage::decode(&[0x02, 0]),
            Err(DecodeError::InvalidIdentifier(String::new()))
        );
    }

    #[test]
    fn test_dv_message_roundtrip() {
        let msg = DvMessage::new(
            id("A"),
            7,
            vec![
                advert("10.0.0.0/24", NextHop::Local, 0),
                advert("10.1.0.0/16", NextHop::Neighbor(id("B")), 16),
            ],
        );
        let encoded = msg.encode().unwrap();
        assert_eq!(encoded.len(), msg.wire_size());
        assert_eq!(DvMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_dv_decode_clamps_metric() {
        let msg = DvMessage::new(id("A"), 1, vec![advert("10.0.0.0/8", NextHop::Local, 0)]);
        let mut encoded = msg.encode().unwrap();
        *encoded.last_mut().unwrap() = 200;
        let decoded = DvMessage::decode(&encoded).unwrap();
        assert_eq!(decoded.routes[0].metric, INFINITY);
    }

    #[test]
    fn test_dv_decode_rejects_bad_input() {
        let msg = DvMessage::new(id("A"), 1, vec![advert("10.0.0.0/8", NextHop::Local, 0)]);
        let encoded = msg.encode().unwrap();

        let mut bad_version = encoded.clone();
        bad_version[0] = 9;
        assert_eq!(
            DvMessage::decode(&bad_version),
            Err(DecodeError::UnsupportedVersion(9))
        );

        let truncated = &encoded[..encoded.len() - 1];
        assert_eq!(DvMessage::decode(truncated), Err(DecodeError::UnexpectedEof));

        // prefix length byte follows header (1+1+2+8+8+2) and address (4)
        let mut bad_len = encoded.clone();
        bad_len[26] = 40;
        assert_eq!(
            DvMessage::decode(&bad_len),
            Err(DecodeError::InvalidPrefixLength(40))
        );
    }

    #[test]
    fn test_dv_encode_too_large() {
        let routes = (0..=255u8)
            .flat_map(|a| (0..4u8).map(move |b| (a, b)))
            .map(|(a, b)| RouteAdvert {
                prefix: Prefix::new(Ipv4Addr::new(10, a, b, 0), 24).unwrap(),
                next_hop: NextHop::Local,
                metric: 1,
            })
            .collect();
        let msg = DvMessage::new(id("A"), 1, routes);
        assert!(matches!(msg.encode(), Err(EncodeError::TooLarge { .. })));
    }
}
