use std::net::{IpAddr, Ipv4Addr};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_SOURCE: &str = "unknown";

/// One observed datagram, as recorded and archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPacket {
    pub timestamp: String,
    pub source: String,
    pub data_length: usize,
    pub data_hex: String,
    pub data_ascii: String,
}

impl CapturedPacket {
    pub fn new(at: DateTime<Utc>, source: Option<IpAddr>, data: &[u8]) -> Self {
        Self {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Micros, true),
            source: source.map_or_else(|| UNKNOWN_SOURCE.to_string(), |ip| ip.to_string()),
            data_length: data.len(),
            data_hex: hex::encode(data),
            data_ascii: to_ascii(data),
        }
    }

    /// Raw bytes recovered from the hex field.
    pub fn bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.data_hex)
    }

    /// First four bytes as lowercase hex, if the packet is long enough.
    pub fn prefix(&self) -> Option<&str> {
        self.data_hex.get(..8)
    }
}

/// Printable ASCII kept as is, everything else shown as `.`.
pub fn to_ascii(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if (32..=126).contains(&b) { b as char } else { '.' })
        .collect()
}

/// Addresses and payload of one raw IPv4/UDP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram<'a> {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub payload: &'a [u8],
}

/// Split a raw IPv4 packet into addresses and UDP payload, or `None` for
/// anything that is not a well-formed IPv4/UDP packet.
pub fn parse_ipv4_udp(raw: &[u8]) -> Option<UdpDatagram<'_>> {
    const UDP_HEADER: usize = 8;
    let first = *raw.first()?;
    if first >> 4 != 4 {
        return None;
    }
    let ihl = usize::from(first & 0x0f) * 4;
    if ihl < 20 || raw.len() < ihl + UDP_HEADER || raw[9] != 17 {
        return None;
    }
    let src = Ipv4Addr::new(raw[12], raw[13], raw[14], raw[15]);
    let dst = Ipv4Addr::new(raw[16], raw[17], raw[18], raw[19]);
    let udp = &raw[ihl..];
    let udp_len = usize::from(u16::from_be_bytes([udp[4], udp[5]]));
    // Trust the UDP length only when it is consistent with what we got.
    let end = if (UDP_HEADER..=udp.len()).contains(&udp_len) {
        udp_len
    } else {
        udp.len()
    };
    Some(UdpDatagram {
        src,
        dst,
        payload: &udp[UDP_HEADER..end],
    })
}
