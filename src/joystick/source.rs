//! Byte-stream sources for the read loop
//!
//! This module provides the [`PacketSource`] abstraction the decoder reads
//! from, plus the sources shipped with the crate:
//! - [`ReaderSource`] over any `std::io::Read` (device files included)
//! - [`ChannelSource`] fed in-process through a [`PacketFeeder`]

use crate::joystick::constants::DEFAULT_DEVICE_PATH;
use crate::joystick::packet::Packet;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use log::{debug, info};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Readable byte stream owned by a decoder.
///
/// `read` blocks until at least one byte is available or an error occurs, and
/// returns the number of bytes written to `buffer[offset..offset + count]`.
/// A return of `0` means the stream has ended.
///
/// `close` releases the underlying resource. The decoder calls it at most once.
pub trait PacketSource: Send + Sync + 'static {
    fn read(&self, buffer: &mut [u8], offset: usize, count: usize) -> io::Result<usize>;

    fn close(&self) -> io::Result<()>;
}

fn closed_error() -> io::Error {
    io::Error::new(ErrorKind::NotConnected, "packet source closed")
}

fn target_range(buffer: &mut [u8], offset: usize, count: usize) -> io::Result<&mut [u8]> {
    let end = offset
        .checked_add(count)
        .filter(|end| *end <= buffer.len())
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "read range exceeds buffer"))?;
    Ok(&mut buffer[offset..end])
}

// ============================================================================
// Reader Source
// ============================================================================

/// Source over any blocking reader.
///
/// A blocking read cannot be interrupted. If `close` is called while a read is
/// in flight the reader is released as soon as that read returns; otherwise it
/// is released immediately.
pub struct ReaderSource<R> {
    reader: Mutex<Option<R>>,
    closed: AtomicBool,
}

impl<R: Read + Send + 'static> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            closed: AtomicBool::new(false),
        }
    }

    /// True once `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn release(&self) {
        let mut guard = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!("Released reader after close");
        }
    }
}

impl<R: Read + Send + 'static> PacketSource for ReaderSource<R> {
    fn read(&self, buffer: &mut [u8], offset: usize, count: usize) -> io::Result<usize> {
        let target = target_range(buffer, offset, count)?;

        let result = {
            let mut guard = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
            match guard.as_mut() {
                Some(reader) if !self.is_closed() => reader.read(target),
                _ => Err(closed_error()),
            }
        };

        // `close` cannot take the reader while a read holds the lock, so the
        // flag is checked again once the lock is free
        if self.is_closed() {
            self.release();
        }

        result
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.reader.try_lock() {
            if guard.take().is_some() {
                debug!("Released idle reader");
            }
        }
        Ok(())
    }
}

/// Joystick device file (`/dev/input/jsN`)
pub type DeviceFile = ReaderSource<File>;

/// Open a joystick device, falling back to [`DEFAULT_DEVICE_PATH`]
pub fn open_device(path: Option<&str>) -> io::Result<DeviceFile> {
    let path = path.unwrap_or(DEFAULT_DEVICE_PATH);
    info!("Opening joystick device: {}", path);
    let file = File::open(path)?;
    Ok(ReaderSource::new(file))
}

// ============================================================================
// Channel Source
// ============================================================================

/// In-process source fed by a [`PacketFeeder`].
///
/// Unlike [`ReaderSource`], `close` wakes a read blocked on an empty channel.
/// Dropping every feeder ends the stream.
pub struct ChannelSource {
    chunks: Receiver<Vec<u8>>,
    close_signal: Receiver<()>,
    close_trigger: Sender<()>,
    pending: Mutex<Vec<u8>>,
    closed: AtomicBool,
    close_calls: Arc<AtomicUsize>,
}

/// Sending half of a [`ChannelSource`]
#[derive(Clone)]
pub struct PacketFeeder {
    chunks: Sender<Vec<u8>>,
    close_calls: Arc<AtomicUsize>,
}

impl ChannelSource {
    pub fn new() -> (ChannelSource, PacketFeeder) {
        let (chunk_tx, chunk_rx) = unbounded();
        let (close_tx, close_rx) = bounded(1);
        let close_calls = Arc::new(AtomicUsize::new(0));

        let source = ChannelSource {
            chunks: chunk_rx,
            close_signal: close_rx,
            close_trigger: close_tx,
            pending: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            close_calls: Arc::clone(&close_calls),
        };
        let feeder = PacketFeeder {
            chunks: chunk_tx,
            close_calls,
        };

        (source, feeder)
    }
}

impl PacketSource for ChannelSource {
    fn read(&self, buffer: &mut [u8], offset: usize, count: usize) -> io::Result<usize> {
        let target = target_range(buffer, offset, count)?;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        while pending.is_empty() {
            if self.closed.load(Ordering::SeqCst) {
                return Err(closed_error());
            }
            select! {
                recv(self.chunks) -> chunk => match chunk {
                    Ok(bytes) => *pending = bytes,
                    // All feeders dropped
                    Err(_) => return Ok(0),
                },
                recv(self.close_signal) -> _ => return Err(closed_error()),
            }
        }

        let n = target.len().min(pending.len());
        target[..n].copy_from_slice(&pending[..n]);
        pending.drain(..n);
        Ok(n)
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.close_trigger.try_send(());
        Ok(())
    }
}

impl PacketFeeder {
    /// Queue one packet. Returns false if the source is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.send_bytes(packet.as_bytes())
    }

    /// Queue raw bytes; they need not align with packet boundaries
    pub fn send_bytes(&self, bytes: &[u8]) -> bool {
        self.chunks.send(bytes.to_vec()).is_ok()
    }

    /// Number of times the source has been closed
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}
