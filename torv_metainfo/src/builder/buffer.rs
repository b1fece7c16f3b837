use std::io;

use crossbeam::channel::{self, Receiver, Sender};

// Ensures that we have enough buffers to keep workers busy.
const TOTAL_BUFFERS_MULTIPLICATIVE: usize = 2;
const TOTAL_BUFFERS_ADDITIVE: usize = 4;

/// Stores a set number of piece buffers to be used and re-used.
///
/// Checking out blocks while every buffer is in flight, which bounds the
/// memory held by the hashing pipeline.
pub struct PieceBuffers {
    checkin_send: Sender<PieceBuffer>,
    checkout_recv: Receiver<PieceBuffer>,
}

impl PieceBuffers {
    /// Create a new pool filled with a number of piece buffers based on the number of workers.
    pub fn new(piece_length: usize, num_workers: usize) -> PieceBuffers {
        let total_buffers = calculate_total_buffers(num_workers);
        let (checkin_send, checkout_recv) = channel::bounded(total_buffers);

        for _ in 0..total_buffers {
            checkin_send.send(PieceBuffer::new(piece_length))
                .expect("torv_metainfo: Failed To Fill The Piece Buffer Pool");
        }

        PieceBuffers {
            checkin_send,
            checkout_recv,
        }
    }

    /// Checkin the given piece buffer to be re-used.
    pub fn checkin(&self, mut buffer: PieceBuffer) {
        buffer.bytes_read = 0;

        self.checkin_send.send(buffer)
            .expect("torv_metainfo: Failed To Checkin A Piece Buffer");
    }

    /// Checkout a piece buffer (possibly blocking) to be used.
    pub fn checkout(&self) -> PieceBuffer {
        self.checkout_recv.recv()
            .expect("torv_metainfo: Failed To Checkout A Piece Buffer")
    }
}

/// Calculates the optimal number of piece buffers given the number of workers.
fn calculate_total_buffers(num_workers: usize) -> usize {
    num_workers * TOTAL_BUFFERS_MULTIPLICATIVE + TOTAL_BUFFERS_ADDITIVE
}

// ----------------------------------------------------------------------------//

/// Piece buffer that can be filled up until it contains a full piece.
#[derive(Debug, PartialEq, Eq)]
pub struct PieceBuffer {
    buffer: Vec<u8>,
    bytes_read: usize,
}

impl PieceBuffer {
    /// Create a new piece buffer.
    fn new(piece_length: usize) -> PieceBuffer {
        PieceBuffer {
            buffer: vec![0u8; piece_length],
            bytes_read: 0,
        }
    }

    /// Supply a closure which will be given a mutable slice of the region of unread bytes
    /// for the current piece buffer.
    ///
    /// Returns whether or not the end of file has been reached, or an error if one occurred.
    pub fn read_bytes<F>(&mut self, mut read_bytes: F) -> io::Result<bool>
        where F: FnMut(&mut [u8]) -> io::Result<usize>
    {
        let buffer_slice = &mut self.buffer[self.bytes_read..];
        let bytes_read = read_bytes(buffer_slice)?;

        self.bytes_read += bytes_read;

        Ok(bytes_read == 0)
    }

    /// Fill up to the given number of unread bytes with zeroes.
    ///
    /// Returns how many bytes were written into the buffer.
    pub fn fill_zeros(&mut self, max_bytes: usize) -> usize {
        let available = self.buffer.len() - self.bytes_read;
        let fill = available.min(max_bytes);

        for byte in &mut self.buffer[self.bytes_read..self.bytes_read + fill] {
            *byte = 0;
        }
        self.bytes_read += fill;

        fill
    }

    /// Whether or not the given piece buffer is full.
    pub fn is_whole(&self) -> bool {
        self.bytes_read == self.buffer.len()
    }

    /// Whether or not the given piece buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes_read == 0
    }

    /// Access the piece buffer as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.bytes_read]
    }
}

#[cfg(test)]
mod tests {
    use super::{PieceBuffer, PieceBuffers};

    #[test]
    fn positive_fill_until_whole() {
        let buffers = PieceBuffers::new(4, 1);
        let mut buffer = buffers.checkout();

        let eof = buffer.read_bytes(|chunk| {
            chunk[..2].copy_from_slice(b"ab");
            Ok(2)
        }).unwrap();
        assert!(!eof);
        assert!(!buffer.is_whole());

        buffer.read_bytes(|chunk| {
            chunk.copy_from_slice(b"cd");
            Ok(2)
        }).unwrap();
        assert!(buffer.is_whole());
        assert_eq!(buffer.as_slice(), b"abcd");
    }

    #[test]
    fn positive_checkin_resets_buffer() {
        let buffers = PieceBuffers::new(4, 1);
        let mut buffer = buffers.checkout();

        buffer.fill_zeros(3);
        assert_eq!(buffer.as_slice().len(), 3);

        buffers.checkin(buffer);
        let buffer = buffers.checkout();
        assert!(buffer.is_empty());
    }

    #[test]
    fn positive_fill_zeros_capped_by_capacity() {
        let mut buffer = PieceBuffer::new(4);

        assert_eq!(buffer.fill_zeros(10), 4);
        assert!(buffer.is_whole());
        assert_eq!(buffer.as_slice(), &[0u8; 4][..]);
    }
}
