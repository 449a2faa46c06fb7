//! A fixed-capacity byte ring buffer.
//!
//! Backs both the send and receive side of a [`crate::connection::Connection`].
//! Bytes are appended at the tail and consumed from the head; nothing is
//! copied on `peek`, and `trim` only ever advances the head.

/// A fixed-capacity FIFO byte buffer.
#[derive(Debug)]
pub struct ByteRing {
    buf: Vec<u8>,
    capacity: usize,
    head: usize,
    len: usize,
}

impl ByteRing {
    /// Creates an empty ring able to hold up to `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: vec![0u8; capacity], capacity, head: 0, len: 0 }
    }

    /// Bytes currently stored.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the ring holds no bytes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity this ring was created with.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free space remaining.
    #[must_use]
    pub const fn free_capacity(&self) -> usize {
        self.capacity - self.len
    }

    /// Appends `data` to the tail.
    ///
    /// Returns `false` without copying anything if `data` does not fit in
    /// the remaining free capacity - callers must check `free_capacity`
    /// first if partial writes are undesirable, or rely on the `false`
    /// return to treat this as backpressure.
    pub fn put(&mut self, data: &[u8]) -> bool {
        if data.len() > self.free_capacity() {
            return false;
        }
        let tail = (self.head + self.len) % self.capacity;
        let first_chunk = (self.capacity - tail).min(data.len());
        self.buf[tail..tail + first_chunk].copy_from_slice(&data[..first_chunk]);
        if first_chunk < data.len() {
            let remaining = data.len() - first_chunk;
            self.buf[..remaining].copy_from_slice(&data[first_chunk..]);
        }
        self.len += data.len();
        true
    }

    /// Copies up to `out.len()` bytes from the head into `out` without
    /// consuming them, returning how many bytes were written.
    pub fn peek(&self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        let first_chunk = (self.capacity - self.head).min(n);
        out[..first_chunk].copy_from_slice(&self.buf[self.head..self.head + first_chunk]);
        if first_chunk < n {
            let remaining = n - first_chunk;
            out[first_chunk..n].copy_from_slice(&self.buf[..remaining]);
        }
        n
    }

    /// Advances the head by `n` bytes, discarding them.
    ///
    /// Clamps to `len()` - trimming more than is stored simply empties the
    /// ring rather than panicking or wrapping past the tail.
    pub fn trim(&mut self, n: usize) {
        let n = n.min(self.len);
        self.head = (self.head + n) % self.capacity;
        self.len -= n;
    }

    /// Empties the ring without changing its capacity.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_peek_round_trip() {
        let mut ring = ByteRing::with_capacity(8);
        assert!(ring.put(b"hello"));
        let mut out = [0u8; 5];
        assert_eq!(ring.peek(&mut out), 5);
        assert_eq!(&out, b"hello");
        assert_eq!(ring.len(), 5, "peek does not consume");
    }

    #[test]
    fn trim_consumes_from_head() {
        let mut ring = ByteRing::with_capacity(8);
        ring.put(b"hello");
        ring.trim(2);
        let mut out = [0u8; 3];
        assert_eq!(ring.peek(&mut out), 3);
        assert_eq!(&out, b"llo");
    }

    #[test]
    fn wraps_around_the_end_of_the_buffer() {
        let mut ring = ByteRing::with_capacity(4);
        assert!(ring.put(b"ab"));
        ring.trim(2);
        assert!(ring.put(b"cdef"));
        let mut out = [0u8; 4];
        assert_eq!(ring.peek(&mut out), 4);
        assert_eq!(&out, b"cdef");
    }

    #[test]
    fn rejects_put_over_capacity() {
        let mut ring = ByteRing::with_capacity(4);
        assert!(!ring.put(b"toolong"));
        assert_eq!(ring.len(), 0, "rejected put must not partially copy");
    }

    #[test]
    fn trim_beyond_len_just_empties() {
        let mut ring = ByteRing::with_capacity(4);
        ring.put(b"ab");
        ring.trim(100);
        assert!(ring.is_empty());
    }

    proptest::proptest! {
        #[test]
        fn fifo_order_is_preserved_across_many_operations(
            ops in proptest::collection::vec((0u8..=1, proptest::collection::vec(any::<u8>(), 0..6)), 0..64),
        ) {
            use std::collections::VecDeque;
            let mut ring = ByteRing::with_capacity(32);
            let mut model: VecDeque<u8> = VecDeque::new();

            for (kind, bytes) in ops {
                if kind == 0 {
                    if bytes.len() <= ring.free_capacity() {
                        assert!(ring.put(&bytes));
                        model.extend(bytes);
                    }
                } else {
                    let n = bytes.len().min(model.len());
                    let mut out = vec![0u8; n];
                    let got = ring.peek(&mut out);
                    assert_eq!(got, n);
                    let expected: Vec<u8> = model.iter().take(n).copied().collect();
                    assert_eq!(out, expected);
                    ring.trim(n);
                    for _ in 0..n {
                        model.pop_front();
                    }
                }
            }
        }
    }

    use proptest::prelude::any;
}
