//! Remote gallery download
//!
//! The remote gallery serves one pre-processed PNG at a fixed URL. It is
//! fetched into memory first so a failed transfer never clobbers the last
//! good copy on the card.

use embassy_time::{Duration, with_timeout};
use embedded_io_async::Read;
use embedded_nal_async::{Dns, TcpConnect};
use log::{info, warn};
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::Method;
use thiserror::Error;

/// TLS record buffers; 16KB is the largest record a server may send
pub const TLS_READ_BUF_SIZE: usize = 16 * 1024 + 256;
pub const TLS_WRITE_BUF_SIZE: usize = 4096;

const HEADER_BUF_SIZE: usize = 2048;

/// Whole request, connect to last body byte
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http: {0:?}")]
    Http(reqwless::Error),
    #[error("server answered {0}")]
    Status(u16),
    #[error("image larger than {0} bytes")]
    TooLarge(usize),
    #[error("timed out")]
    Timeout,
}

impl From<reqwless::Error> for FetchError {
    fn from(e: reqwless::Error) -> Self {
        FetchError::Http(e)
    }
}

/// Result of a download attempt that reached the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body of this many bytes is in the buffer
    Downloaded(usize),
    /// The gallery currently has no image
    NotFound,
}

/// TLS buffers and seed for one download
pub struct TlsBuffers<'a> {
    pub read: &'a mut [u8],
    pub write: &'a mut [u8],
    pub seed: u64,
}

/// GET `url` into `buf`. Both `http://` and `https://` are accepted;
/// certificates are not verified.
pub async fn download<T, D>(
    tcp: &T,
    dns: &D,
    tls: TlsBuffers<'_>,
    url: &str,
    buf: &mut [u8],
) -> Result<FetchOutcome, FetchError>
where
    T: TcpConnect,
    D: Dns,
{
    info!("Downloading remote image from {}", url);
    match with_timeout(FETCH_TIMEOUT, fetch(tcp, dns, tls, url, buf)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    }
}

async fn fetch<T, D>(
    tcp: &T,
    dns: &D,
    tls: TlsBuffers<'_>,
    url: &str,
    buf: &mut [u8],
) -> Result<FetchOutcome, FetchError>
where
    T: TcpConnect,
    D: Dns,
{
    let tls_config = TlsConfig::new(tls.seed, tls.read, tls.write, TlsVerify::None);
    let mut client = HttpClient::new_with_tls(tcp, dns, tls_config);

    let mut header_buf = [0u8; HEADER_BUF_SIZE];
    let mut request = client.request(Method::GET, url).await?;
    let response = request.send(&mut header_buf).await?;

    let status = response.status.0;
    if status == 404 {
        warn!("Remote gallery has no image (404)");
        return Ok(FetchOutcome::NotFound);
    }
    if !(200..300).contains(&status) {
        return Err(FetchError::Status(status));
    }

    let mut reader = response.body().reader();
    let mut len = 0;
    loop {
        if len == buf.len() {
            // Buffer full: the body must end here
            let mut probe = [0u8; 1];
            if reader.read(&mut probe).await? > 0 {
                return Err(FetchError::TooLarge(buf.len()));
            }
            break;
        }
        match reader.read(&mut buf[len..]).await? {
            0 => break,
            n => len += n,
        }
    }

    info!("Download complete: {} bytes", len);
    Ok(FetchOutcome::Downloaded(len))
}
