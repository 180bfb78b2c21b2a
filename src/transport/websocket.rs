//! WebSocket client transport.
//!
//! For hosts that run as a long-lived daemon and listen on a WebSocket
//! instead of being spawned per connection. Each text frame carries one
//! envelope; binary frames must hold UTF-8 JSON.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future, stream};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};

use super::framing::DEFAULT_MAX_MESSAGE_SIZE;
use super::{Link, Transport};

// ============================================================================
// WebSocketTransport
// ============================================================================

/// Dials a host listening on a `ws://` or `wss://` URL.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    /// Host endpoint.
    url: Url,
    /// Inbound frame size limit.
    max_message_size: usize,
}

impl WebSocketTransport {
    /// Creates a transport for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL is invalid or not `ws`/`wss`.
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| Error::config(format!("invalid host URL {url:?}: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => Ok(Self {
                url,
                max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            }),
            other => Err(Error::config(format!(
                "host URL must use ws:// or wss://, got {other}://"
            ))),
        }
    }

    /// Sets the inbound frame size limit.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Returns the host endpoint.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<Link> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket connect to {} failed: {e}", self.url)))?;

        info!(url = %self.url, "WebSocket connection established");

        let (ws_write, ws_read) = ws_stream.split();
        let max_size = self.max_message_size;

        let sink = ws_write
            .sink_map_err(Error::from)
            .with(|frame: String| future::ready(Ok::<_, Error>(Message::Text(frame.into()))));

        let stream = stream::unfold(Some(ws_read), move |state| async move {
            let mut ws_read = state?;
            loop {
                match ws_read.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > max_size {
                            return Some((Err(Error::message_too_large(text.len(), max_size)), None));
                        }
                        return Some((Ok(text.as_str().to_owned()), Some(ws_read)));
                    }

                    Some(Ok(Message::Binary(bytes))) => {
                        if bytes.len() > max_size {
                            return Some((Err(Error::message_too_large(bytes.len(), max_size)), None));
                        }
                        return match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => Some((Ok(text), Some(ws_read))),
                            Err(e) => Some((
                                Err(Error::protocol(format!("binary frame is not valid UTF-8: {e}"))),
                                None,
                            )),
                        };
                    }

                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket closed by host");
                        return None;
                    }

                    Some(Err(e)) => return Some((Err(Error::WebSocket(e)), None)),

                    // Ignore Ping, Pong, raw frames
                    Some(Ok(_)) => {}
                }
            }
        });

        Ok(Link::new(Box::pin(sink), Box::pin(stream)).with_peer(self.url.to_string()))
    }

    fn describe(&self) -> String {
        format!("websocket host {}", self.url)
    }
}

// ============================================================================
// Tests
// ============================================================================
