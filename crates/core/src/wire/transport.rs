//! Frame transports
//!
//! Frames are MessagePack-encoded with field names. On byte streams each
//! frame is preceded by its length as a big-endian `u32`.

use super::{Frame, Status};
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::{channel, Receiver, Sender};

pub trait Transport: Send {
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Next frame; `None` once the peer has closed the channel
    fn recv(&mut self) -> Result<Option<Frame>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn recv(&mut self) -> Result<Option<Frame>> {
        (**self).recv()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn recv(&mut self) -> Result<Option<Frame>> {
        (**self).recv()
    }
}

fn encode(frame: &Frame) -> Result<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(frame)?)
}

fn decode(bytes: &[u8]) -> Result<Frame> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Length-prefixed frames over a reader/writer pair, such as the stdio
/// of a plugin process
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: Read + Send, W: Write + Send> Transport for StreamTransport<R, W> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        let payload = encode(frame)?;
        let len = u32::try_from(payload.len())
            .map_err(|_| Status::internal(format!("frame too large: {} bytes", payload.len())))?;
        self.writer.write_all(&len.to_be_bytes())?;
        self.writer.write_all(&payload)?;
        self.writer.flush()?;
        log::trace!("sent {} ({} bytes)", frame.kind(), payload.len());
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<Frame>> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        }
        let mut payload = vec![0u8; u32::from_be_bytes(len) as usize];
        self.reader.read_exact(&mut payload)?;
        decode(&payload).map(Some)
    }
}

/// One end of an in-process channel pair
#[derive(Debug)]
pub struct MemoryTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

/// Two connected in-process transports
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, b_rx) = channel();
    let (b_tx, a_rx) = channel();
    (
        MemoryTransport { tx: a_tx, rx: a_rx },
        MemoryTransport { tx: b_tx, rx: b_rx },
    )
}

impl Transport for MemoryTransport {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        let payload = encode(frame)?;
        self.tx
            .send(payload)
            .map_err(|_| Status::unavailable("channel closed").into())
    }

    fn recv(&mut self) -> Result<Option<Frame>> {
        match self.rx.recv() {
            Ok(payload) => decode(&payload).map(Some),
            Err(_) => Ok(None),
        }
    }
}
