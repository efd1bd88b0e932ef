//! Disguised message framing over a connection-oriented byte stream.
//!
//! A [`FramedStreamChannel`] turns discrete messages into TLS-lookalike
//! records on the way out and reassembles them on the way in. It never
//! blocks: every socket call is a single non-blocking attempt, and the
//! multiplexer's readiness notifications drive further progress.
//!
//! # Locking
//!
//! Senders on any thread and the multiplexer's write hook share the output
//! queue under one lock. The input accumulator is only touched from the read
//! hook and sits behind its own lock, which is never contended.

use crate::buffer::{InputAccumulator, OutputQueue};
use crate::config::StreamConfig;
use crate::error::{ChannelError, TransportResult, is_fatal_socket_error};
use crate::multiplexer::{ChannelId, Multiplexer, PacketHandler};
use crate::socket::StreamSocket;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace, warn};
use veil_obfuscation::{
    DisguiseRecordCodec, MAX_RECORD_PAYLOAD, RECORD_HEADER_SIZE, RecordHeader,
};

/// Per-channel counters
#[derive(Debug, Default)]
pub struct ChannelStats {
    /// Records enqueued for sending
    pub frames_sent: AtomicU64,
    /// Records decoded and dispatched
    pub frames_received: AtomicU64,
    /// Bytes accepted by the socket
    pub bytes_written: AtomicU64,
    /// Bytes read from the socket
    pub bytes_read: AtomicU64,
    /// Sends rejected for size or queue cap
    pub send_rejections: AtomicU64,
}

impl ChannelStats {
    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

struct InputState {
    accumulator: InputAccumulator,
    scratch: Box<[u8]>,
}

/// One disguised stream connection.
pub struct FramedStreamChannel {
    id: ChannelId,
    socket: Box<dyn StreamSocket>,
    remote: SocketAddr,
    multiplexer: Arc<dyn Multiplexer>,
    max_message_len: usize,
    connecting: AtomicBool,
    output: Mutex<OutputQueue>,
    input: Mutex<InputState>,
    stats: ChannelStats,
}

impl FramedStreamChannel {
    /// Wrap an outbound stream whose connect is still in progress.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidConfig` if `config` does not validate.
    pub fn connecting(
        id: ChannelId,
        socket: Box<dyn StreamSocket>,
        remote: SocketAddr,
        multiplexer: Arc<dyn Multiplexer>,
        config: &StreamConfig,
    ) -> TransportResult<Self> {
        Self::new(id, socket, remote, multiplexer, config, true)
    }

    /// Wrap an accepted, already established stream.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidConfig` if `config` does not validate.
    pub fn accepted(
        id: ChannelId,
        socket: Box<dyn StreamSocket>,
        remote: SocketAddr,
        multiplexer: Arc<dyn Multiplexer>,
        config: &StreamConfig,
    ) -> TransportResult<Self> {
        Self::new(id, socket, remote, multiplexer, config, false)
    }

    fn new(
        id: ChannelId,
        socket: Box<dyn StreamSocket>,
        remote: SocketAddr,
        multiplexer: Arc<dyn Multiplexer>,
        config: &StreamConfig,
        connecting: bool,
    ) -> TransportResult<Self> {
        config.validate()?;
        Ok(Self {
            id,
            socket,
            remote,
            multiplexer,
            max_message_len: config.max_message_len,
            connecting: AtomicBool::new(connecting),
            output: Mutex::new(OutputQueue::new(
                config.max_message_len,
                config.max_send_queue_len(),
            )),
            input: Mutex::new(InputState {
                accumulator: InputAccumulator::new(config.input_capacity()),
                scratch: vec![0u8; config.read_chunk_size].into_boxed_slice(),
            }),
            stats: ChannelStats::default(),
        })
    }

    /// Frame `data` and queue it for sending, writing immediately if the
    /// queue was idle.
    ///
    /// The stream has a single remote; `to` is accepted for symmetry with
    /// datagram transports and otherwise ignored. Empty messages succeed
    /// without sending anything.
    ///
    /// # Errors
    ///
    /// - `ChannelError::MessageTooLarge` if `data` exceeds the maximum
    /// - `ChannelError::SendQueueFull` if queuing would pass the cap; the
    ///   queue is left exactly as it was
    pub fn send(&self, to: SocketAddr, data: &[u8]) -> Result<(), ChannelError> {
        if data.len() > self.max_message_len {
            ChannelStats::add(&self.stats.send_rejections, 1);
            return Err(ChannelError::MessageTooLarge {
                len: data.len(),
                max: self.max_message_len,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        if to != self.remote {
            trace!(channel = %self.id, %to, remote = %self.remote, "stream send ignores destination");
        }

        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        let had_backlog = !output.is_empty();

        let frame = RECORD_HEADER_SIZE + data.len();
        if !output.reserve_for(frame) {
            ChannelStats::add(&self.stats.send_rejections, 1);
            debug!(channel = %self.id, queued = output.len(), frame, "send queue full, dropping message");
            return Err(ChannelError::SendQueueFull {
                queued: output.len(),
                frame,
                cap: output.cap(),
            });
        }
        if let Err(e) = output.push_record(data) {
            ChannelStats::add(&self.stats.send_rejections, 1);
            debug!(channel = %self.id, error = %e, "record encoding failed");
            return Err(ChannelError::MessageTooLarge {
                len: data.len(),
                max: MAX_RECORD_PAYLOAD,
            });
        }
        ChannelStats::add(&self.stats.frames_sent, 1);

        if !had_backlog {
            match self.socket.send(output.as_slice()) {
                Ok(n) => {
                    output.consume(n);
                    ChannelStats::add(&self.stats.bytes_written, n);
                }
                Err(e) => {
                    // Surfaced by the write hook if it persists
                    debug!(channel = %self.id, error = %e, "opportunistic write failed");
                }
            }

            if !output.is_empty() {
                self.multiplexer.start_notify_write(self.id);
                self.multiplexer.wake();
            }
        }

        Ok(())
    }

    /// Read hook. Reads one chunk and dispatches every complete record.
    ///
    /// Must only be called by the multiplexer, never concurrently for the
    /// same channel.
    ///
    /// # Errors
    ///
    /// Every error is fatal:
    /// - `ChannelError::Closed` on end of stream
    /// - `ChannelError::Socket` on a read error other than would-block or
    ///   interrupted
    /// - `ChannelError::InputOverrun` if a record outgrows the accumulator
    /// - `ChannelError::UnsupportedFraming` if a record header is not the
    ///   the application-data content type
    pub fn notify_available_for_read(
        self: &Arc<Self>,
        handler: &dyn PacketHandler,
    ) -> Result<(), ChannelError> {
        let mut guard = self.input.lock().unwrap_or_else(PoisonError::into_inner);
        let InputState {
            accumulator,
            scratch,
        } = &mut *guard;

        let n = match self.socket.recv(scratch) {
            Ok(0) => return Err(ChannelError::Closed),
            Ok(n) => n,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                trace!(channel = %self.id, "spurious read notification");
                return Ok(());
            }
            Err(e) => return Err(ChannelError::Socket(e)),
        };
        ChannelStats::add(&self.stats.bytes_read, n);

        for &byte in &scratch[..n] {
            if !accumulator.push(byte) {
                warn!(channel = %self.id, remote = %self.remote, "input overrun, aborting stream");
                return Err(ChannelError::InputOverrun {
                    capacity: accumulator.capacity(),
                });
            }

            if accumulator.frame_len().is_none() && accumulator.len() >= RECORD_HEADER_SIZE {
                match RecordHeader::parse(accumulator.filled()) {
                    Ok(header) => accumulator.set_frame_len(header.record_len()),
                    Err(e) => {
                        warn!(channel = %self.id, remote = %self.remote, error = %e, "unsupported framing");
                        return Err(ChannelError::UnsupportedFraming(e));
                    }
                }
            }

            if let Some(frame_len) = accumulator.frame_len() {
                if accumulator.len() >= frame_len {
                    let payload = DisguiseRecordCodec::new()
                        .unwrap(&accumulator.filled()[..frame_len])
                        .map_err(ChannelError::UnsupportedFraming)?;
                    trace!(channel = %self.id, len = payload.len(), "dispatching record");
                    handler.handle_received_packet(self, self.remote, payload);
                    ChannelStats::add(&self.stats.frames_received, 1);
                    accumulator.consume_front(frame_len);
                }
            }
        }

        Ok(())
    }

    /// Write hook. Flushes what the socket accepts and deregisters from
    /// write notifications once the queue is empty.
    ///
    /// # Errors
    ///
    /// `ChannelError::Socket` for a fatal socket error (see
    /// [`is_fatal_socket_error`]). Other write errors are ignored until the
    /// next notification.
    pub fn notify_available_for_write(&self) -> Result<(), ChannelError> {
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);

        if self.connecting.swap(false, Ordering::AcqRel) {
            debug!(channel = %self.id, remote = %self.remote, "stream connected");
        }

        if !output.is_empty() {
            match self.socket.send(output.as_slice()) {
                Ok(n) => {
                    output.consume(n);
                    ChannelStats::add(&self.stats.bytes_written, n);
                }
                Err(e) if is_fatal_socket_error(&e) => {
                    warn!(channel = %self.id, remote = %self.remote, error = %e, "fatal write error");
                    return Err(ChannelError::Socket(e));
                }
                Err(e) => {
                    trace!(channel = %self.id, error = %e, "transient write error");
                }
            }
        }

        if output.is_empty() {
            self.multiplexer.stop_notify_write(self.id);
        }

        Ok(())
    }

    /// Channel token.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Remote endpoint of the stream.
    #[must_use]
    pub fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    /// Whether the first write-ready notification is still outstanding.
    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.connecting.load(Ordering::Acquire)
    }

    /// Number of framed bytes not yet written.
    #[must_use]
    pub fn pending_output(&self) -> usize {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Copy of the framed bytes not yet written.
    #[must_use]
    pub fn queued_output(&self) -> Vec<u8> {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_slice()
            .to_vec()
    }

    /// Number of received bytes waiting for the rest of their record.
    #[must_use]
    pub fn accumulated_input(&self) -> usize {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accumulator
            .len()
    }

    /// Maximum payload per message.
    #[must_use]
    pub fn max_message_len(&self) -> usize {
        self.max_message_len
    }

    /// Channel counters.
    #[must_use]
    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}

impl Drop for FramedStreamChannel {
    fn drop(&mut self) {
        trace!(channel = %self.id, remote = %self.remote, "closing stream channel");
    }
}

impl std::fmt::Debug for FramedStreamChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedStreamChannel")
            .field("id", &self.id)
            .field("remote", &self.remote)
            .field("connecting", &self.is_connecting())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use veil_obfuscation::RecordError;

    /// Scripted write outcome; `Accept(n)` takes at most n bytes.
    enum WriteStep {
        Accept(usize),
        Fail(i32),
    }

    #[derive(Default)]
    struct MockSocket {
        writes: Mutex<VecDeque<WriteStep>>,
        written: Mutex<Vec<u8>>,
        reads: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    }

    impl MockSocket {
        fn script_write(&self, step: WriteStep) {
            self.writes.lock().unwrap().push_back(step);
        }

        fn script_read(&self, chunk: io::Result<Vec<u8>>) {
            self.reads.lock().unwrap().push_back(chunk);
        }
    }

    impl StreamSocket for Arc<MockSocket> {
        fn send(&self, buf: &[u8]) -> io::Result<usize> {
            // Unscripted writes accept everything
            match self.writes.lock().unwrap().pop_front() {
                None => {
                    self.written.lock().unwrap().extend_from_slice(buf);
                    Ok(buf.len())
                }
                Some(WriteStep::Accept(n)) => {
                    let n = n.min(buf.len());
                    self.written.lock().unwrap().extend_from_slice(&buf[..n]);
                    Ok(n)
                }
                Some(WriteStep::Fail(code)) => Err(io::Error::from_raw_os_error(code)),
            }
        }

        fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.lock().unwrap().pop_front() {
                None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum MuxCall {
        Start(ChannelId),
        Stop(ChannelId),
        Wake,
    }

    #[derive(Default)]
    struct MockMux {
        calls: Mutex<Vec<MuxCall>>,
    }

    impl MockMux {
        fn calls(&self) -> Vec<MuxCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Multiplexer for MockMux {
        fn start_notify_write(&self, id: ChannelId) {
            self.calls.lock().unwrap().push(MuxCall::Start(id));
        }
        fn stop_notify_write(&self, id: ChannelId) {
            self.calls.lock().unwrap().push(MuxCall::Stop(id));
        }
        fn wake(&self) {
            self.calls.lock().unwrap().push(MuxCall::Wake);
        }
    }

    #[derive(Default)]
    struct Collector {
        packets: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    }

    impl PacketHandler for Collector {
        fn handle_received_packet(
            &self,
            _channel: &Arc<FramedStreamChannel>,
            from: SocketAddr,
            payload: &[u8],
        ) {
            self.packets.lock().unwrap().push((from, payload.to_vec()));
        }
    }

    const ID: ChannelId = ChannelId(7);

    fn remote() -> SocketAddr {
        "192.0.2.10:443".parse().unwrap()
    }

    fn small_config() -> StreamConfig {
        StreamConfig {
            max_message_len: 64,
            send_queue_multiplier: 4,
            input_buffer_multiplier: 2,
            read_chunk_size: 1024,
        }
    }

    fn channel(config: &StreamConfig) -> (Arc<FramedStreamChannel>, Arc<MockSocket>, Arc<MockMux>) {
        let socket = Arc::new(MockSocket::default());
        let mux = Arc::new(MockMux::default());
        let channel = FramedStreamChannel::connecting(
            ID,
            Box::new(socket.clone()),
            remote(),
            mux.clone(),
            config,
        )
        .unwrap();
        (Arc::new(channel), socket, mux)
    }

    fn record(payload: &[u8]) -> Vec<u8> {
        let mut out = RecordHeader::application_data(payload.len() as u16)
            .encode()
            .to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_send_drains_immediately_without_registration() {
        let (channel, socket, mux) = channel(&StreamConfig::default());
        let payload = vec![0xAB; 1000];

        channel.send(remote(), &payload).unwrap();

        assert_eq!(*socket.written.lock().unwrap(), record(&payload));
        assert_eq!(channel.pending_output(), 0);
        assert!(mux.calls().is_empty());
    }

    #[test]
    fn test_partial_write_registers_and_wakes() {
        let (channel, socket, mux) = channel(&small_config());
        socket.script_write(WriteStep::Accept(3));

        channel.send(remote(), b"hello").unwrap();

        assert_eq!(*socket.written.lock().unwrap(), vec![0x17, 0x03, 0x03]);
        assert_eq!(channel.queued_output(), vec![0x00, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(mux.calls(), vec![MuxCall::Start(ID), MuxCall::Wake]);
    }

    #[test]
    fn test_backlog_skips_immediate_write() {
        let (channel, socket, mux) = channel(&small_config());
        socket.script_write(WriteStep::Accept(0));
        channel.send(remote(), b"one").unwrap();

        // Would accept everything, but must not be attempted
        channel.send(remote(), b"two").unwrap();

        assert!(socket.written.lock().unwrap().is_empty());
        let mut expected = record(b"one");
        expected.extend(record(b"two"));
        assert_eq!(channel.queued_output(), expected);
        assert_eq!(mux.calls(), vec![MuxCall::Start(ID), MuxCall::Wake]);
    }

    #[test]
    fn test_send_rejects_oversized() {
        let (channel, socket, _) = channel(&small_config());
        let err = channel.send(remote(), &[0u8; 65]).unwrap_err();

        assert!(matches!(err, ChannelError::MessageTooLarge { len: 65, max: 64 }));
        assert!(!err.is_fatal());
        assert!(socket.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_send_empty_is_noop() {
        let (channel, socket, mux) = channel(&small_config());
        channel.send(remote(), &[]).unwrap();

        assert!(socket.written.lock().unwrap().is_empty());
        assert!(mux.calls().is_empty());
    }

    #[test]
    fn test_queue_cap_rejects_and_preserves_buffer() {
        // cap = 4 * 64 = 256; each 64-byte message is a 69-byte frame
        let (channel, socket, _) = channel(&small_config());
        socket.script_write(WriteStep::Fail(libc::EAGAIN));

        for _ in 0..3 {
            channel.send(remote(), &[1u8; 64]).unwrap();
        }
        assert_eq!(channel.pending_output(), 207);
        let before = channel.queued_output();

        let err = channel.send(remote(), &[2u8; 64]).unwrap_err();
        assert!(matches!(err, ChannelError::SendQueueFull { queued: 207, frame: 69, cap: 256 }));
        assert_eq!(channel.queued_output(), before);

        // A smaller message still fits
        channel.send(remote(), &[3u8; 40]).unwrap();
        assert_eq!(channel.pending_output(), 252);
        assert_eq!(channel.stats().send_rejections.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_write_hook_flushes_and_deregisters() {
        let (channel, socket, mux) = channel(&small_config());
        socket.script_write(WriteStep::Accept(2));
        channel.send(remote(), b"abcdef").unwrap();
        assert!(channel.is_connecting());

        socket.script_write(WriteStep::Accept(4));
        channel.notify_available_for_write().unwrap();
        assert!(!channel.is_connecting());
        assert_eq!(channel.pending_output(), 5);
        assert_eq!(mux.calls(), vec![MuxCall::Start(ID), MuxCall::Wake]);

        channel.notify_available_for_write().unwrap();
        assert_eq!(channel.pending_output(), 0);
        assert_eq!(*socket.written.lock().unwrap(), record(b"abcdef"));
        assert_eq!(
            mux.calls(),
            vec![MuxCall::Start(ID), MuxCall::Wake, MuxCall::Stop(ID)]
        );
    }

    #[test]
    fn test_write_hook_on_empty_queue_clears_connecting() {
        let (channel, _, mux) = channel(&small_config());
        assert!(channel.is_connecting());

        channel.notify_available_for_write().unwrap();

        assert!(!channel.is_connecting());
        assert_eq!(mux.calls(), vec![MuxCall::Stop(ID)]);
    }

    #[test]
    fn test_write_hook_fatal_errors() {
        for code in [libc::EPIPE, libc::ECONNRESET, libc::EBADF, libc::ENETDOWN] {
            let (channel, socket, _) = channel(&small_config());
            socket.script_write(WriteStep::Accept(0));
            channel.send(remote(), b"data").unwrap();

            socket.script_write(WriteStep::Fail(code));
            let err = channel.notify_available_for_write().unwrap_err();
            assert!(matches!(err, ChannelError::Socket(_)));
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_write_hook_transient_error_keeps_registration() {
        let (channel, socket, mux) = channel(&small_config());
        socket.script_write(WriteStep::Accept(0));
        channel.send(remote(), b"data").unwrap();

        socket.script_write(WriteStep::Fail(libc::EAGAIN));
        channel.notify_available_for_write().unwrap();

        assert_eq!(channel.pending_output(), 9);
        assert!(!mux.calls().contains(&MuxCall::Stop(ID)));
    }

    #[test]
    fn test_read_single_record() {
        let (channel, socket, _) = channel(&small_config());
        let handler = Collector::default();
        socket.script_read(Ok(record(b"payload")));

        channel.notify_available_for_read(&handler).unwrap();

        let packets = handler.packets.lock().unwrap();
        assert_eq!(*packets, vec![(remote(), b"payload".to_vec())]);
        assert_eq!(channel.accumulated_input(), 0);
    }

    #[test]
    fn test_read_back_to_back_records_in_order() {
        let (channel, socket, _) = channel(&small_config());
        let handler = Collector::default();
        let mut bytes = record(b"first");
        bytes.extend(record(b"second"));
        socket.script_read(Ok(bytes));

        channel.notify_available_for_read(&handler).unwrap();

        let payloads: Vec<Vec<u8>> = handler
            .packets
            .lock()
            .unwrap()
            .iter()
            .map(|(_, p)| p.clone())
            .collect();
        assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(channel.stats().frames_received.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_read_record_split_across_reads() {
        let (channel, socket, _) = channel(&small_config());
        let handler = Collector::default();
        let bytes = record(b"split message");
        socket.script_read(Ok(bytes[..3].to_vec()));
        socket.script_read(Ok(bytes[3..9].to_vec()));
        socket.script_read(Ok(bytes[9..].to_vec()));

        channel.notify_available_for_read(&handler).unwrap();
        assert_eq!(channel.accumulated_input(), 3);
        channel.notify_available_for_read(&handler).unwrap();
        assert_eq!(channel.accumulated_input(), 9);
        assert!(handler.packets.lock().unwrap().is_empty());

        channel.notify_available_for_read(&handler).unwrap();
        assert_eq!(handler.packets.lock().unwrap()[0].1, b"split message");
        assert_eq!(channel.accumulated_input(), 0);
    }

    #[test]
    fn test_read_trailing_partial_record_kept() {
        let (channel, socket, _) = channel(&small_config());
        let handler = Collector::default();
        let mut bytes = record(b"whole");
        bytes.extend_from_slice(&record(b"partial")[..4]);
        socket.script_read(Ok(bytes));

        channel.notify_available_for_read(&handler).unwrap();

        assert_eq!(handler.packets.lock().unwrap().len(), 1);
        assert_eq!(channel.accumulated_input(), 4);
    }

    #[test]
    fn test_read_empty_record_dispatched() {
        let (channel, socket, _) = channel(&small_config());
        let handler = Collector::default();
        socket.script_read(Ok(record(b"")));

        channel.notify_available_for_read(&handler).unwrap();

        assert_eq!(*handler.packets.lock().unwrap(), vec![(remote(), Vec::new())]);
    }

    #[test]
    fn test_read_rejects_handshake_record() {
        let (channel, socket, _) = channel(&small_config());
        let handler = Collector::default();
        socket.script_read(Ok(vec![0x16, 0x03, 0x01, 0x00, 0x10]));

        let err = channel.notify_available_for_read(&handler).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::UnsupportedFraming(RecordError::UnsupportedContentType(0x16))
        ));
    }

    #[test]
    fn test_read_rejects_wrong_version() {
        let (channel, socket, _) = channel(&small_config());
        let handler = Collector::default();
        socket.script_read(Ok(vec![0x17, 0x03, 0x01, 0x00, 0x01, 0xAA]));

        let err = channel.notify_available_for_read(&handler).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::UnsupportedFraming(RecordError::UnsupportedVersion(0x0301))
        ));
        assert!(handler.packets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_read_overrun_is_fatal() {
        // capacity = 2 * 64 = 128; header announces far more than that
        let (channel, socket, _) = channel(&small_config());
        let handler = Collector::default();
        let mut bytes = vec![0x17, 0x03, 0x03, 0x10, 0x00];
        bytes.extend(vec![0u8; 200]);
        socket.script_read(Ok(bytes));

        let err = channel.notify_available_for_read(&handler).unwrap_err();
        assert!(matches!(err, ChannelError::InputOverrun { capacity: 128 }));
        assert!(handler.packets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_read_eof_is_closed() {
        let (channel, socket, _) = channel(&small_config());
        socket.script_read(Ok(Vec::new()));

        let err = channel
            .notify_available_for_read(&Collector::default())
            .unwrap_err();
        assert!(matches!(err, ChannelError::Closed));
    }

    #[test]
    fn test_read_would_block_is_transient() {
        let (channel, _, _) = channel(&small_config());
        channel
            .notify_available_for_read(&Collector::default())
            .unwrap();
    }

    #[test]
    fn test_read_reset_is_fatal() {
        let (channel, socket, _) = channel(&small_config());
        socket.script_read(Err(io::Error::from_raw_os_error(libc::ECONNRESET)));

        let err = channel
            .notify_available_for_read(&Collector::default())
            .unwrap_err();
        assert!(matches!(err, ChannelError::Socket(_)));
    }

    #[test]
    fn test_accepted_channel_not_connecting() {
        let socket = Arc::new(MockSocket::default());
        let channel = FramedStreamChannel::accepted(
            ID,
            Box::new(socket),
            remote(),
            Arc::new(MockMux::default()),
            &small_config(),
        )
        .unwrap();
        assert!(!channel.is_connecting());
        assert_eq!(channel.remote_address(), remote());
        assert_eq!(channel.id(), ID);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StreamConfig {
            max_message_len: 0,
            ..small_config()
        };
        let result = FramedStreamChannel::connecting(
            ID,
            Box::new(Arc::new(MockSocket::default())),
            remote(),
            Arc::new(MockMux::default()),
            &config,
        );
        assert!(result.is_err());
    }
}
