use crate::prelude::*;
use crate::protocol::encode::Raw;
use crate::protocol::wire::varint;
use crate::protocol::{var, Packet, ToWire};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Largest frame either side is allowed to send.
pub const MAX_FRAME: usize = 2 * 1024 * 1024;

/// A non-blocking connection speaking length-prefixed frames, optionally
/// zlib-compressed above a threshold.
pub struct Conn {
    stream: TcpStream,
    peer: SocketAddr,
    inbound: Vec<u8>,
    outbound: Vec<u8>,
    written: usize,
    threshold: Option<usize>,

    pub(super) waiting_for_write: bool,
}

impl Conn {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            inbound: vec![],
            outbound: vec![],
            written: 0,
            threshold: None,
            waiting_for_write: false,
        })
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn set_compression(&mut self, threshold: Option<usize>) {
        self.threshold = threshold;
    }

    /// Pull everything the socket has buffered. Fails once the peer is gone.
    pub fn receive(&mut self, scratch: &mut [u8]) -> io::Result<()> {
        loop {
            match self.stream.read(scratch) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => self.inbound.extend_from_slice(&scratch[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Split the next complete frame off the inbound buffer.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, WireError> {
        match decode_frame(&self.inbound, self.threshold)? {
            Some((packet, used)) => {
                self.inbound.drain(..used);
                Ok(Some(packet))
            }
            None => Ok(None),
        }
    }

    pub fn send(&mut self, packet: &Packet) -> io::Result<()> {
        encode_frame(packet, self.threshold, &mut self.outbound)?;
        self.waiting_for_write = true;
        Ok(())
    }

    /// Write as much of the outbound buffer as the socket takes.
    pub fn flush(&mut self) -> io::Result<()> {
        while self.written < self.outbound.len() {
            match self.stream.write(&self.outbound[self.written..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.waiting_for_write = true;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.outbound.clear();
        self.written = 0;
        self.waiting_for_write = false;
        Ok(())
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("peer", &self.peer)
            .field("threshold", &self.threshold)
            .field("pending", &(self.outbound.len() - self.written))
            .finish()
    }
}

pub fn encode_frame(packet: &Packet, threshold: Option<usize>, buf: &mut Vec<u8>) -> io::Result<()> {
    let mut body = vec![];
    (var(packet.id), Raw(&packet.payload)).encode(&mut body);
    let frame = match threshold {
        None => body,
        Some(threshold) if body.len() < threshold => {
            let mut frame = vec![0];
            frame.extend_from_slice(&body);
            frame
        }
        Some(_) => {
            let mut frame = vec![];
            var(body.len()).encode(&mut frame);
            let mut encoder = ZlibEncoder::new(frame, Compression::default());
            encoder.write_all(&body)?;
            encoder.finish()?
        }
    };
    var(frame.len()).encode(buf);
    buf.extend_from_slice(&frame);
    Ok(())
}

/// Decode one frame from the front of `buf`, returning it with the number of
/// bytes it occupied. `None` means the frame hasn't fully arrived.
pub fn decode_frame(buf: &[u8], threshold: Option<usize>) -> Result<Option<(Packet, usize)>, WireError> {
    let (len, rest) = match varint(buf) {
        Ok(v) => v,
        Err(WireError::TooShort { .. }) => return Ok(None),
        Err(e) => return Err(e),
    };
    let len = usize::try_from(len).map_err(|_| WireError::NegativeLength(len as i64))?;
    if len > MAX_FRAME {
        return Err(WireError::FrameTooLarge(len));
    }
    if rest.len() < len {
        return Ok(None);
    }
    let used = buf.len() - rest.len() + len;
    let frame = &rest[..len];

    let inflated;
    let body = match threshold {
        None => frame,
        Some(_) => {
            let (data_len, data) = varint(frame)?;
            if data_len == 0 {
                data
            } else {
                let data_len = usize::try_from(data_len).map_err(|_| WireError::NegativeLength(data_len as i64))?;
                if data_len > MAX_FRAME {
                    return Err(WireError::FrameTooLarge(data_len));
                }
                let mut out = Vec::with_capacity(data_len);
                // one byte past the declared length is enough to tell it lied
                ZlibDecoder::new(data)
                    .take(data_len as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| WireError::Decompress(e.to_string()))?;
                if out.len() != data_len {
                    return Err(WireError::Decompress(format!("expected {data_len} bytes, got {}", out.len())));
                }
                inflated = out;
                &inflated
            }
        }
    };
    let (id, payload) = varint(body)?;
    Ok(Some((Packet { id, payload: payload.to_vec() }, used)))
}
