//! Bounded-chunk byte relay.
//!
//! Senders call [`ChunkReceiver::send`]; buffers longer than the receiver's
//! [`ChunkReceiver::max_message_size`] are delivered as consecutive chunks,
//! in order, all carrying the same timestamp.

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use std::sync::mpsc::Sender;
use std::time::Instant;

static CLOCK_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic nanoseconds since the first call in this process.
pub fn monotonic_nanos() -> u64 {
    CLOCK_START.elapsed().as_nanos() as u64
}

pub trait ChunkReceiver {
    /// Handle one chunk. `msg` is only valid for the duration of the call.
    fn on_receive(&mut self, msg: &[u8], timestamp: u64) -> anyhow::Result<()>;

    /// Discard anything buffered but not yet delivered.
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn max_message_size(&self) -> usize {
        usize::MAX
    }

    fn send(&mut self, msg: &[u8]) -> anyhow::Result<()> {
        self.send_with_timestamp(msg, monotonic_nanos())
    }

    fn send_with_timestamp(&mut self, msg: &[u8], timestamp: u64) -> anyhow::Result<()> {
        let size = self.max_message_size().max(1);
        for chunk in msg.chunks(size) {
            self.on_receive(chunk, timestamp)?;
        }
        Ok(())
    }

    /// Send `count` bytes of `msg` starting at `offset`.
    fn send_range(
        &mut self,
        msg: &[u8],
        offset: usize,
        count: usize,
        timestamp: u64,
    ) -> anyhow::Result<()> {
        let end = offset
            .checked_add(count)
            .filter(|end| *end <= msg.len())
            .with_context(|| {
                format!(
                    "range {offset}+{count} outside buffer of {} bytes",
                    msg.len()
                )
            })?;
        self.send_with_timestamp(&msg[offset..end], timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub data: Vec<u8>,
    pub timestamp: u64,
}

/// Forwards each chunk over a channel, rejecting chunks above its limit.
pub struct ChannelReceiver {
    tx: Sender<Chunk>,
    max_message_size: usize,
}

impl ChannelReceiver {
    pub fn new(tx: Sender<Chunk>, max_message_size: usize) -> Self {
        Self {
            tx,
            max_message_size: max_message_size.max(1),
        }
    }
}

impl ChunkReceiver for ChannelReceiver {
    fn on_receive(&mut self, msg: &[u8], timestamp: u64) -> anyhow::Result<()> {
        if msg.len() > self.max_message_size {
            bail!(
                "chunk of {} bytes exceeds maximum of {}",
                msg.len(),
                self.max_message_size
            );
        }
        self.tx
            .send(Chunk {
                data: msg.to_vec(),
                timestamp,
            })
            .context("chunk receiver disconnected")
    }

    fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Vec<u8>, u64)>,
        flushed: bool,
    }

    impl ChunkReceiver for Recorder {
        fn on_receive(&mut self, msg: &[u8], timestamp: u64) -> anyhow::Result<()> {
            self.calls.push((msg.to_vec(), timestamp));
            Ok(())
        }

        fn flush(&mut self) -> anyhow::Result<()> {
            self.flushed = true;
            Ok(())
        }

        fn max_message_size(&self) -> usize {
            64
        }
    }

    #[test]
    fn splits_oversize_buffer_in_order() {
        let data: Vec<u8> = (0..130u8).collect();
        let mut recorder = Recorder::default();
        recorder.send_with_timestamp(&data, 77).unwrap();

        let lengths: Vec<_> = recorder.calls.iter().map(|(c, _)| c.len()).collect();
        assert_eq!(lengths, vec![64, 64, 2]);
        assert!(recorder.calls.iter().all(|(_, ts)| *ts == 77));
        let joined: Vec<u8> = recorder.calls.into_iter().flat_map(|(c, _)| c).collect();
        assert_eq!(joined, data);
    }

    #[test]
    fn empty_buffer_sends_nothing() {
        let mut recorder = Recorder::default();
        recorder.send(&[]).unwrap();
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn send_range_validates_bounds() {
        let data = [1u8, 2, 3, 4, 5];
        let mut recorder = Recorder::default();
        recorder.send_range(&data, 1, 3, 5).unwrap();
        assert_eq!(recorder.calls, vec![(vec![2, 3, 4], 5)]);
        assert!(recorder.send_range(&data, 4, 2, 5).is_err());
        assert!(recorder.send_range(&data, usize::MAX, 2, 5).is_err());
    }

    #[test]
    fn flush_is_forwarded() {
        let mut recorder = Recorder::default();
        recorder.flush().unwrap();
        assert!(recorder.flushed);
    }

    #[test]
    fn channel_receiver_forwards_chunks() {
        let (tx, rx) = mpsc::channel();
        let mut receiver = ChannelReceiver::new(tx, 4);
        receiver.send_with_timestamp(b"abcdefghij", 9).unwrap();
        let chunks: Vec<Chunk> = rx.try_iter().collect();
        assert_eq!(
            chunks.iter().map(|c| c.data.as_slice()).collect::<Vec<_>>(),
            vec![&b"abcd"[..], &b"efgh"[..], &b"ij"[..]]
        );
        assert!(receiver.on_receive(b"abcde", 1).is_err());
        assert!(receiver.flush().is_ok());
    }

    #[test]
    fn disconnected_channel_is_an_error() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut receiver = ChannelReceiver::new(tx, 8);
        assert!(receiver.send(b"x").is_err());
    }

    #[test]
    fn default_receiver_is_unbounded() {
        struct Plain(usize);
        impl ChunkReceiver for Plain {
            fn on_receive(&mut self, _msg: &[u8], _timestamp: u64) -> anyhow::Result<()> {
                self.0 += 1;
                Ok(())
            }
        }
        let mut plain = Plain(0);
        plain.send(&[0u8; 10_000]).unwrap();
        assert_eq!(plain.0, 1);
        assert!(monotonic_nanos() <= monotonic_nanos());
    }
}
