//! Minimal SNTP (RFC 4330) client packet codec
//!
//! Only what is needed to set the RTC once a day: a version 4 client request
//! and the transmit timestamp of the server reply. Round-trip delay is not
//! compensated; a few hundred milliseconds do not matter for wake alignment.

use thiserror::Error;

pub const NTP_PORT: u16 = 123;
pub const PACKET_LEN: usize = 48;

/// Seconds between 1900-01-01 (NTP era 0) and 1970-01-01
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const MODE_CLIENT: u8 = 3;
const MODE_SERVER: u8 = 4;
const VERSION: u8 = 4;
const TRANSMIT_TIMESTAMP: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SntpError {
    #[error("reply shorter than 48 bytes")]
    TooShort,
    #[error("unexpected mode {0} in reply")]
    NotServerReply(u8),
    #[error("server sent kiss-o'-death")]
    KissOfDeath,
    #[error("transmit timestamp is before 1970")]
    BeforeUnixEpoch,
}

/// Client request: LI = 0, VN = 4, mode = 3, everything else zero
pub fn request() -> [u8; PACKET_LEN] {
    let mut packet = [0u8; PACKET_LEN];
    packet[0] = (VERSION << 3) | MODE_CLIENT;
    packet
}

/// Unix seconds from a server reply
pub fn parse_reply(packet: &[u8]) -> Result<u64, SntpError> {
    if packet.len() < PACKET_LEN {
        return Err(SntpError::TooShort);
    }

    let mode = packet[0] & 0x07;
    if mode != MODE_SERVER {
        return Err(SntpError::NotServerReply(mode));
    }
    if packet[1] == 0 {
        return Err(SntpError::KissOfDeath);
    }

    let ts = &packet[TRANSMIT_TIMESTAMP..TRANSMIT_TIMESTAMP + 4];
    let ntp_secs = u64::from(u32::from_be_bytes([ts[0], ts[1], ts[2], ts[3]]));
    ntp_secs
        .checked_sub(NTP_UNIX_OFFSET)
        .ok_or(SntpError::BeforeUnixEpoch)
}
