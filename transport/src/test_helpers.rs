//! Provides helpers for writing tests.
//!
//! Most notable are the `FakeNetworkInput` and `FakeNetworkOutput` types.

use std::{
    cmp::min,
    io::{self, ErrorKind},
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Builds an unencrypted packet with the given payload and padding length.
///
/// The padding consists of the bytes `0, 1, 2, ...`.
pub(crate) fn plain_packet(payload: &[u8], padding_len: u8) -> Vec<u8> {
    let packet_len = 1 + payload.len() + padding_len as usize;

    let mut packet = Vec::with_capacity(4 + packet_len);
    packet.extend_from_slice(&(packet_len as u32).to_be_bytes());
    packet.push(padding_len);
    packet.extend_from_slice(payload);
    packet.extend(0..padding_len);

    packet
}

/// Acts as a fake network for input to the SSH transport layer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct FakeNetworkInput {
    /// The data to be sent.
    input_data: Vec<u8>,
    /// The maximum amount of data that should be sent in one "packet".
    packet_size: usize,
}

impl FakeNetworkInput {
    /// Creates a fake network input from the given input data and the packet size.
    pub(crate) fn new(input_data: Vec<u8>, packet_size: usize) -> FakeNetworkInput {
        FakeNetworkInput {
            input_data,
            packet_size,
        }
    }
}

impl AsyncRead for FakeNetworkInput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let amount_to_copy = min(
            min(self.input_data.len(), self.packet_size),
            buf.remaining(),
        );

        buf.put_slice(&self.input_data[..amount_to_copy]);
        self.input_data.drain(..amount_to_copy);

        Poll::Ready(Ok(()))
    }
}

/// Acts as a fake network for output of the SSH transport layer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct FakeNetworkOutput {
    /// The data that was sent.
    written_data: Vec<u8>,
    /// The maximum size that can be received at once.
    packet_size: usize,
    /// Indicate whether the writer has been shut down.
    is_shutdown: bool,
    /// The index of the first byte that was not flushed.
    flushed_to: usize,
}

impl FakeNetworkOutput {
    /// Creates a fake network output with the given maximum packet size.
    pub(crate) fn new(packet_size: usize) -> FakeNetworkOutput {
        FakeNetworkOutput {
            written_data: Vec::new(),
            packet_size,
            is_shutdown: false,
            flushed_to: 0,
        }
    }

    /// Returns a reference to the flushed data.
    pub(crate) fn written(&self) -> &[u8] {
        &self.written_data[..self.flushed_to]
    }

    /// Returns `true` once the output was shut down.
    pub(crate) fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }
}

/// The error returned by a fake output after it was shut down.
fn closed() -> io::Error {
    io::Error::new(ErrorKind::NotConnected, "connection closed")
}

impl AsyncWrite for FakeNetworkOutput {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.is_shutdown {
            return Poll::Ready(Err(closed()));
        }

        let amount = min(buf.len(), self.packet_size);
        self.written_data.extend_from_slice(&buf[..amount]);

        Poll::Ready(Ok(amount))
    }

    fn poll_flush(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.is_shutdown {
            return Poll::Ready(Err(closed()));
        }

        self.flushed_to = self.written_data.len();
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.is_shutdown {
            return Poll::Ready(Err(closed()));
        }

        self.flushed_to = self.written_data.len();
        self.is_shutdown = true;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn simple_input() {
        let data: Vec<u8> = (0..175).collect();

        let mut fake_input = FakeNetworkInput::new(data.clone(), 50);

        let mut buf = [0; 100];

        assert_eq!(fake_input.read(&mut buf).await.ok(), Some(50));
        assert_eq!(&data[0..50], &buf[0..50]);

        assert_eq!(fake_input.read(&mut buf).await.ok(), Some(50));
        assert_eq!(&data[50..100], &buf[0..50]);

        assert_eq!(fake_input.read(&mut buf).await.ok(), Some(50));
        assert_eq!(&data[100..150], &buf[0..50]);

        assert_eq!(fake_input.read(&mut buf).await.ok(), Some(25));
        assert_eq!(&data[150..175], &buf[0..25]);

        assert_eq!(fake_input.read(&mut buf).await.ok(), Some(0));
    }

    #[tokio::test]
    async fn simple_output() {
        let data: Vec<u8> = (0..175).collect();

        let mut fake_output = FakeNetworkOutput::new(50);

        assert_eq!(fake_output.write(&data[0..]).await.ok(), Some(50));
        assert_eq!(fake_output.written().len(), 0);
        assert!(matches!(fake_output.flush().await, Ok(())));
        assert_eq!(&data[0..50], &fake_output.written()[0..50]);

        fake_output.write_all(&data[50..]).await.unwrap();
        assert!(matches!(fake_output.flush().await, Ok(())));
        assert_eq!(fake_output.written(), &data[..]);

        assert!(matches!(fake_output.shutdown().await, Ok(())));
        assert!(fake_output.is_shutdown());

        assert_eq!(
            fake_output.write(&data).await.unwrap_err().kind(),
            ErrorKind::NotConnected
        );
        assert_eq!(
            fake_output.flush().await.unwrap_err().kind(),
            ErrorKind::NotConnected
        );
        assert_eq!(fake_output.written().len(), 175);
    }

    #[test]
    fn plain_packets() {
        assert_eq!(
            plain_packet(b"ab", 5),
            b"\x00\x00\x00\x08\x05ab\x00\x01\x02\x03\x04"
        );
    }
}
