//! Wall clock backed by the RTC, corrected over SNTP
//!
//! The RTC counter survives deep sleep, so a single correction a day keeps
//! wake alignment well inside the scheduler's drift guard.

use embassy_net::Stack;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_time::{Duration, with_timeout};
use esp_hal::rtc_cntl::Rtc;
use log::{info, warn};
use photoframe_core::clock::{LocalTime, WallClock};
use photoframe_core::sntp::{self, SntpError};
use thiserror::Error;

pub const NTP_SERVER: &str = "pool.ntp.org";

const LOCAL_PORT: u16 = 50123;
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TimeSyncError {
    #[error("could not resolve pool.ntp.org")]
    Dns,
    #[error("udp socket error")]
    Socket,
    #[error("no reply within 5s")]
    Timeout,
    #[error("bad reply: {0}")]
    Reply(#[from] SntpError),
}

/// Current Unix time from the RTC
pub fn unix_now(rtc: &Rtc<'_>) -> u64 {
    rtc.current_time_us() / 1_000_000
}

/// Query the NTP pool once and set the RTC. Returns the new Unix time.
pub async fn sync_rtc(stack: Stack<'_>, rtc: &Rtc<'_>) -> Result<u64, TimeSyncError> {
    let addrs = stack
        .dns_query(NTP_SERVER, DnsQueryType::A)
        .await
        .map_err(|_| TimeSyncError::Dns)?;
    let server = *addrs.first().ok_or(TimeSyncError::Dns)?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buf = [0u8; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buf = [0u8; 128];
    let mut socket = UdpSocket::new(stack, &mut rx_meta, &mut rx_buf, &mut tx_meta, &mut tx_buf);
    socket.bind(LOCAL_PORT).map_err(|_| TimeSyncError::Socket)?;

    socket
        .send_to(&sntp::request(), (server, sntp::NTP_PORT))
        .await
        .map_err(|_| TimeSyncError::Socket)?;

    let mut reply = [0u8; sntp::PACKET_LEN];
    let (len, _) = with_timeout(REPLY_TIMEOUT, socket.recv_from(&mut reply))
        .await
        .map_err(|_| TimeSyncError::Timeout)?
        .map_err(|_| TimeSyncError::Socket)?;

    let unix = sntp::parse_reply(&reply[..len])?;
    let before = unix_now(rtc);
    rtc.set_current_time_us(unix * 1_000_000);

    if before.abs_diff(unix) > 60 {
        warn!("RTC was off by {}s", before.abs_diff(unix));
    }
    info!("RTC set from {} to {}", NTP_SERVER, unix);
    Ok(unix)
}

/// [`WallClock`] over the RTC with a fixed UTC offset
pub struct RtcClock<'a, 'd> {
    rtc: &'a Rtc<'d>,
    utc_offset_minutes: i16,
}

impl<'a, 'd> RtcClock<'a, 'd> {
    pub fn new(rtc: &'a Rtc<'d>, utc_offset_minutes: i16) -> Self {
        Self {
            rtc,
            utc_offset_minutes,
        }
    }
}

impl WallClock for RtcClock<'_, '_> {
    fn now_local(&self) -> LocalTime {
        LocalTime::from_unix(unix_now(self.rtc), self.utc_offset_minutes)
    }
}
