// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Line-framed connection over an arbitrary byte stream.

use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use crate::error::{ConnectionError, DecodeError, Error};
use crate::message::{self, Message};

use super::PollPolicy;

/// Largest frame a connection accepts before giving up on the line.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open connection that exchanges one frame per line.
///
/// The write side emits `frame + "\n"` and flushes. The read side isolates
/// lines from the stream buffer; bytes of an incomplete line are kept until
/// the rest of it arrives.
pub struct Connection {
    peer: String,
    reader: FrameReader<BoxedReader>,
    writer: BoxedWriter,
}

impl Connection {
    /// Wraps a bidirectional stream.
    pub fn new<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            peer: peer.into(),
            reader: FrameReader::new(Box::new(read_half)),
            writer: Box::new(write_half),
        }
    }

    /// Returns the remote endpoint this connection talks to.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Writes a frame followed by a newline and flushes it.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Io`] if the stream rejects the write.
    pub async fn send_frame(&mut self, frame: &str) -> Result<(), ConnectionError> {
        tracing::trace!(peer = %self.peer, bytes = frame.len(), "Sending frame");
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Encodes and sends a message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the message cannot be serialized, or a
    /// connection error if the stream rejects the write.
    pub async fn send(&mut self, message: &Message) -> Result<(), Error> {
        let frame = message::encode(message).map_err(Error::Encode)?;
        self.send_frame(&frame).await?;
        Ok(())
    }

    /// Waits for the next frame within the bounds of `policy`.
    ///
    /// Returns `Ok(None)` when the read window closes without a complete
    /// frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or a line exceeds
    /// [`MAX_FRAME_LEN`].
    pub async fn poll_frame(&mut self, policy: &PollPolicy) -> Result<Option<String>, Error> {
        self.reader.poll_frame(policy, &self.peer).await
    }

    /// Waits for the next frame without a time bound.
    ///
    /// Returns `Ok(None)` once the peer closes the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or a line exceeds
    /// [`MAX_FRAME_LEN`].
    pub async fn next_frame(&mut self) -> Result<Option<String>, Error> {
        self.reader.next_frame().await
    }

    /// Shuts down the write side of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::Io`] if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<(), ConnectionError> {
        self.writer.shutdown().await.map_err(Into::into)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("buffered", &self.reader.buffer.len())
            .finish_non_exhaustive()
    }
}

/// Splits a byte stream into newline-terminated frames.
struct FrameReader<R> {
    inner: R,
    buffer: Vec<u8>,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    fn new(inner: R) -> Self {
        Self::with_max_frame_len(inner, MAX_FRAME_LEN)
    }

    fn with_max_frame_len(inner: R, max_frame_len: usize) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(1024),
            max_frame_len,
        }
    }

    async fn poll_frame(
        &mut self,
        policy: &PollPolicy,
        peer: &str,
    ) -> Result<Option<String>, Error> {
        let deadline = Instant::now() + policy.budget();
        let mut empty_waits = 0u32;

        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(Some(frame));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(
                    %peer,
                    attempts = empty_waits,
                    buffered = self.buffer.len(),
                    "Read window closed without a frame"
                );
                return Ok(None);
            }

            match tokio::time::timeout(remaining.min(policy.interval()), self.fill()).await {
                Ok(Ok(0)) => return Ok(self.take_remainder()?),
                Ok(Ok(read)) => tracing::trace!(%peer, bytes = read, "Received bytes"),
                Ok(Err(err)) => return Err(ConnectionError::Io(err).into()),
                Err(_) => {
                    empty_waits += 1;
                    tracing::trace!(
                        %peer,
                        attempt = empty_waits,
                        max_attempts = policy.max_attempts(),
                        "No data yet"
                    );
                }
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(Some(frame));
            }
            if self.fill().await.map_err(ConnectionError::Io)? == 0 {
                return Ok(self.take_remainder()?);
            }
        }
    }

    async fn fill(&mut self) -> std::io::Result<usize> {
        self.inner.read_buf(&mut self.buffer).await
    }

    /// Removes the first complete, non-blank line from the buffer.
    fn take_frame(&mut self) -> Result<Option<String>, DecodeError> {
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            if end > self.max_frame_len {
                self.buffer.clear();
                return Err(self.too_large());
            }
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            while line.last().is_some_and(|b| matches!(b, b'\n' | b'\r')) {
                line.pop();
            }
            let frame = String::from_utf8(line)?;
            if !frame.trim().is_empty() {
                return Ok(Some(frame));
            }
        }

        if self.buffer.len() > self.max_frame_len {
            self.buffer.clear();
            return Err(self.too_large());
        }
        Ok(None)
    }

    /// Returns whatever is left once the peer closed the stream.
    fn take_remainder(&mut self) -> Result<Option<String>, DecodeError> {
        let rest = String::from_utf8(std::mem::take(&mut self.buffer))?;
        let rest = rest.trim();
        Ok((!rest.is_empty()).then(|| rest.to_string()))
    }

    fn too_large(&self) -> DecodeError {
        DecodeError::FrameTooLarge {
            limit: self.max_frame_len,
        }
    }
}
