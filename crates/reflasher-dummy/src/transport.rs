//! Scripted transport
//!
//! Serves canned responses keyed by URL. Each response is a [`Script`]: a
//! status code followed by a list of read results, so tests can reproduce
//! slow peers, dropped connections and truncated bodies.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use embedded_io::{ErrorKind, ErrorType};
use maybe_async::maybe_async;
use reflasher_core::transport::{Transport, STATUS_OK};

/// One result returned by [`ScriptedTransport`]'s `read`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Body bytes, handed out in pieces no larger than the caller's buffer
    Data(Vec<u8>),
    /// A read that returns no data while the connection stays open
    Idle,
    /// The peer goes away; the read returns no data
    Disconnect,
    /// The read fails with this error kind
    Fail(ErrorKind),
}

/// A canned response
#[derive(Debug, Clone)]
pub struct Script {
    status: u16,
    steps: VecDeque<Step>,
    complete: bool,
    content_length: Option<u32>,
}

impl Script {
    /// A 200 response whose body arrives in `chunk`-sized reads
    pub fn body(data: &[u8], chunk: usize) -> Self {
        let steps = data
            .chunks(chunk.max(1))
            .map(|piece| Step::Data(piece.to_vec()))
            .collect();
        Self {
            status: STATUS_OK,
            steps,
            complete: true,
            content_length: u32::try_from(data.len()).ok(),
        }
    }

    /// A response with no body
    pub fn empty() -> Self {
        Self::body(&[], 1)
    }

    /// Answer with `status` instead of 200
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Append a step after the body
    pub fn then(mut self, step: Step) -> Self {
        self.steps.push_back(step);
        self
    }

    /// Insert a step before the body
    pub fn first(mut self, step: Step) -> Self {
        self.steps.push_front(step);
        self
    }

    /// Never report the body as complete
    pub fn truncated(mut self) -> Self {
        self.complete = false;
        self
    }
}

/// Transport serving [`Script`]s by URL
///
/// Opening a URL without a script fails with `ErrorKind::NotFound`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Vec<(String, Script)>,
    active: Option<Script>,
    connected: bool,
    complete: bool,
    opened: Vec<String>,
    closes: usize,
}

impl ScriptedTransport {
    /// A transport without any scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `script` the next time `url` is opened
    pub fn serve(mut self, url: &str, script: Script) -> Self {
        self.add(url, script);
        self
    }

    /// Serve `script` the next time `url` is opened
    ///
    /// Scripts for the same URL are served in the order they were added.
    pub fn add(&mut self, url: &str, script: Script) {
        self.scripts.push((String::from(url), script));
    }

    /// URLs opened so far, oldest first
    pub fn opened(&self) -> &[String] {
        &self.opened
    }

    /// Number of times `close` was called
    pub fn closes(&self) -> usize {
        self.closes
    }

    fn script(&mut self) -> Result<&mut Script, ErrorKind> {
        self.active.as_mut().ok_or(ErrorKind::NotConnected)
    }
}

impl ErrorType for ScriptedTransport {
    type Error = ErrorKind;
}

#[maybe_async(AFIT)]
impl Transport for ScriptedTransport {
    type Config = String;

    async fn open(&mut self, url: &String) -> Result<(), ErrorKind> {
        let index = self
            .scripts
            .iter()
            .position(|(candidate, _)| candidate == url)
            .ok_or(ErrorKind::NotFound)?;
        let (url, script) = self.scripts.remove(index);
        log::debug!("scripted: opened {}", url);

        self.opened.push(url);
        self.active = Some(script);
        self.connected = true;
        self.complete = false;
        Ok(())
    }

    async fn fetch_headers(&mut self) -> Result<u16, ErrorKind> {
        Ok(self.script()?.status)
    }

    fn content_length(&self) -> Option<u32> {
        self.active.as_ref().and_then(|script| script.content_length)
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        if !self.connected {
            return Err(ErrorKind::NotConnected);
        }

        let script = self.script()?;
        match script.steps.pop_front() {
            Some(Step::Data(mut data)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                if len < data.len() {
                    script.steps.push_front(Step::Data(data.split_off(len)));
                }
                Ok(len)
            }
            Some(Step::Idle) => Ok(0),
            Some(Step::Disconnect) => {
                self.connected = false;
                Ok(0)
            }
            Some(Step::Fail(kind)) => Err(kind),
            None => {
                if script.complete {
                    self.complete = true;
                } else {
                    self.connected = false;
                }
                Ok(0)
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn close(&mut self) {
        self.active = None;
        self.connected = false;
        self.closes += 1;
    }
}
