//! Background I/O worker for the broker client.
//!
//! A single thread multiplexes three duties over one `mio::Poll`:
//! draining the outbound queue once holdbacks elapse, emitting
//! keepalive pings ahead of the broker's grace window, and reading
//! the socket into a parse buffer from which PUBLISH frames are
//! dispatched to the publish callback. Any socket or protocol failure
//! is fatal: the worker clears the running flag and exits, and
//! subsequent publish calls fail.

use std::io::{self, Read, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use log::{debug, error, warn};
use mio::net::TcpStream;
use mio::{Events, Poll};

use crate::client::{PublishCallback, Shared, SOCKET, WAKER};
use crate::error::{ProtocolError, Result};
use crate::packet::{self, Frame};

/// Emit the keepalive ping this long before the broker's window ends.
const PING_GUARD: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 4096;

pub(crate) struct Worker {
    socket: TcpStream,
    poll: Poll,
    shared: Arc<Shared>,
    keepalive: Duration,
    on_publish: PublishCallback,
    /// Outbound frames not yet accepted by the socket.
    write_buf: Vec<u8>,
    /// Inbound bytes not yet parsed into complete frames.
    read_buf: BytesMut,
    /// When the last frame went out; drives the ping schedule.
    last_activity: Instant,
}

impl Worker {
    pub fn new(
        socket: TcpStream,
        poll: Poll,
        shared: Arc<Shared>,
        keepalive: Duration,
        on_publish: PublishCallback,
    ) -> Self {
        Self {
            socket,
            poll,
            shared,
            keepalive,
            on_publish,
            write_buf: Vec::with_capacity(READ_CHUNK),
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            last_activity: Instant::now(),
        }
    }

    pub fn run(&mut self) {
        if let Err(e) = self.io_loop() {
            error!("mqtt worker exiting: {}", e);
        }
        self.shared.running.store(false, Ordering::Release);

        // Goes through the write buffer so a partially flushed frame
        // is never split by the disconnect bytes.
        packet::encode_disconnect(&mut self.write_buf);
        if let Err(e) = self.flush_write_buf() {
            debug!("failed to send disconnect: {}", e);
        }
    }

    fn io_loop(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(8);

        while self.shared.running.load(Ordering::Acquire) {
            let now = Instant::now();
            let next_send = self.drain_outbound(now);

            let mut next_ping = self.last_activity + self.keepalive - PING_GUARD;
            if next_ping <= now {
                packet::encode_pingreq(&mut self.write_buf);
                self.last_activity = now;
                next_ping = now + self.keepalive - PING_GUARD;
            }

            self.flush_write_buf()?;

            let mut deadline = next_ping;
            if let Some(send_at) = next_send {
                deadline = deadline.min(send_at);
            }
            let timeout = deadline
                .saturating_duration_since(now)
                .max(Duration::from_millis(1));

            if let Err(e) = self.poll.poll(&mut events, Some(timeout)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            let mut readable = false;
            let mut writable = false;
            for event in events.iter() {
                match event.token() {
                    SOCKET => {
                        readable |= event.is_readable();
                        writable |= event.is_writable();
                    }
                    // A wake only means the queue or the running flag
                    // changed; the next iteration recomputes both.
                    WAKER => {}
                    _ => {}
                }
            }
            if writable {
                self.flush_write_buf()?;
            }
            if readable {
                self.handle_read()?;
            }
        }
        Ok(())
    }

    /// Encode every queued publish whose send time has passed, in
    /// enqueue order. Returns the send time of the next pending
    /// record, if any.
    fn drain_outbound(&mut self, now: Instant) -> Option<Instant> {
        let mut queue = self.shared.queue.lock();
        let mut sent = false;
        while let Some(front) = queue.front() {
            if front.send_at > now {
                break;
            }
            let msg = queue.pop_front().unwrap();
            match packet::encode_publish(msg.topic.as_bytes(), &msg.payload, &mut self.write_buf)
            {
                Ok(()) => sent = true,
                // Cannot happen for messages admitted by publish();
                // drop rather than kill the connection.
                Err(e) => warn!("dropping unencodable publish to {}: {}", msg.topic, e),
            }
        }
        if sent {
            self.last_activity = now;
        }
        queue.front().map(|m| m.send_at)
    }

    /// Push buffered frames into the socket. `WouldBlock` leaves the
    /// remainder for the next writable event; a write error or EOF is
    /// fatal.
    fn flush_write_buf(&mut self) -> Result<()> {
        if self.write_buf.is_empty() {
            return Ok(());
        }
        let mut written = 0;
        while written < self.write_buf.len() {
            match self.socket.write(&self.write_buf[written..]) {
                Ok(0) => return Err(ProtocolError::ConnectionClosed.into()),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if written > 0 {
            self.write_buf.drain(..written);
        }
        Ok(())
    }

    /// Read everything the socket has, then parse complete frames out
    /// of the buffer. A zero-byte read means the broker closed on us.
    fn handle_read(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.socket.read(&mut chunk) {
                Ok(0) => return Err(ProtocolError::ConnectionClosed.into()),
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.parse_frames()
    }

    fn parse_frames(&mut self) -> Result<()> {
        let read_buf = &mut self.read_buf;
        let on_publish = &mut self.on_publish;

        let mut cursor = 0;
        loop {
            match packet::parse_frame(&read_buf[cursor..])? {
                Some((Frame::Publish { topic, payload }, consumed)) => {
                    (on_publish)(topic, payload);
                    cursor += consumed;
                }
                Some((Frame::Skipped, consumed)) => cursor += consumed,
                // Partial frame: leave it at the buffer start for the
                // next read to complete.
                None => break,
            }
        }
        if cursor > 0 {
            read_buf.advance(cursor);
        }
        Ok(())
    }
}
