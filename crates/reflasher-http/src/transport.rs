//! Blocking HTTP(S) transport
//!
//! One GET request per download. The connection is made when the headers
//! are fetched; the body is then streamed through `read`.

use std::io::Read;
use std::time::Duration;

use embedded_io::ErrorType;
use reflasher_core::transport::Transport;
use reqwest::blocking::{Client, RequestBuilder, Response};

use crate::error::{HttpError, Result};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how to fetch one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// http:// or https:// URL of the image
    pub url: String,
    /// Timeout for the whole request, body included
    pub timeout: Duration,
}

impl HttpConfig {
    /// Configuration for `url` with the default timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use `timeout` instead of the default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse a URL, rejecting anything that is not http:// or https://
    pub fn parse(url: &str) -> Result<Self> {
        let lower = url.to_ascii_lowercase();
        let rest = lower
            .strip_prefix("http://")
            .or_else(|| lower.strip_prefix("https://"));
        match rest {
            Some(host) if !host.is_empty() => Ok(Self::new(url)),
            _ => Err(HttpError::InvalidUrl(url.to_string())),
        }
    }
}

/// Image transport over HTTP(S)
pub struct HttpTransport {
    client: Client,
    request: Option<RequestBuilder>,
    response: Option<Response>,
    content_length: Option<u64>,
    received: u64,
    complete: bool,
}

impl HttpTransport {
    /// Create a transport with its own HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("reflasher/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Create a transport sharing an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            request: None,
            response: None,
            content_length: None,
            received: 0,
            complete: false,
        }
    }

    /// Body bytes received on the current connection
    pub fn received(&self) -> u64 {
        self.received
    }

    fn finish_body(&mut self) {
        self.complete = match self.content_length {
            Some(len) => self.received == len,
            None => true,
        };
        if !self.complete {
            log::error!(
                "http: body ended after {} of {:?} bytes",
                self.received,
                self.content_length
            );
        }
        self.response = None;
    }
}

impl ErrorType for HttpTransport {
    type Error = HttpError;
}

impl Transport for HttpTransport {
    type Config = HttpConfig;

    fn open(&mut self, config: &HttpConfig) -> Result<()> {
        let config = HttpConfig::parse(&config.url)?.with_timeout(config.timeout);
        log::info!("http: GET {}", config.url);

        self.close();
        self.request = Some(self.client.get(&config.url).timeout(config.timeout));
        self.received = 0;
        self.complete = false;
        Ok(())
    }

    fn fetch_headers(&mut self) -> Result<u16> {
        let request = self.request.take().ok_or(HttpError::NotOpen)?;
        let response = request.send()?;
        let status = response.status().as_u16();
        self.content_length = response.content_length();
        log::debug!(
            "http: status {}, content length {:?}",
            status,
            self.content_length
        );
        self.response = Some(response);
        Ok(status)
    }

    fn content_length(&self) -> Option<u32> {
        self.content_length.and_then(|len| u32::try_from(len).ok())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(response) = self.response.as_mut() else {
            return if self.complete {
                Ok(0)
            } else {
                Err(HttpError::NotOpen)
            };
        };

        let len = response.read(buf)?;
        self.received += len as u64;
        if len == 0 && !buf.is_empty() {
            self.finish_body();
        }
        Ok(len)
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn is_connected(&self) -> bool {
        self.response.is_some() || self.request.is_some()
    }

    fn close(&mut self) {
        if self.response.take().is_some() {
            log::debug!("http: connection closed after {} bytes", self.received);
        }
        self.request = None;
    }
}
