//! MQTT broker client.
//!
//! Owns the TCP connection and a background I/O worker. The
//! handshake (CONNECT/CONNACK, then a single wildcard SUBSCRIBE and
//! its SUBACK) runs synchronously on the caller's thread; everything
//! after that is driven by the worker in `worker.rs`.
//!
//! Outbound publishes are queued with a per-message earliest-send
//! timestamp (`now + holdback`) and drained by the worker in enqueue
//! order. A `mio::Waker` breaks the worker out of its wait whenever
//! the queue changes or shutdown is requested.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpStream as StdTcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::warn;
use mio::net::TcpStream;
use mio::{Interest, Poll, Token, Waker};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::packet;
use crate::varint;
use crate::worker::Worker;

pub(crate) const SOCKET: Token = Token(0);
pub(crate) const WAKER: Token = Token(1);

/// Callback invoked on the worker thread for every received PUBLISH
/// frame. Topic and payload are borrowed and valid only for the call.
pub type PublishCallback = Box<dyn FnMut(&[u8], &[u8]) + Send>;

/// Connection options for the broker client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Broker host (hostname or IP literal).
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Keep-alive interval in seconds (1..=65535).
    pub keepalive: u16,
    /// Delay between enqueueing a publish and emitting it.
    pub holdback: Duration,
    /// TCP connect (and handshake read) timeout.
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            keepalive: 60,
            holdback: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// A publish waiting out its holdback in the outbound queue.
pub(crate) struct QueuedPublish {
    pub send_at: Instant,
    pub topic: String,
    pub payload: Vec<u8>,
}

/// State shared between the client surface and the worker thread.
pub(crate) struct Shared {
    pub queue: Mutex<VecDeque<QueuedPublish>>,
    pub running: AtomicBool,
    pub waker: Waker,
}

/// Handle to a connected broker client.
///
/// Dropping the client shuts the worker down, sends a best-effort
/// DISCONNECT and closes the socket.
pub struct MqttClient {
    shared: Arc<Shared>,
    holdback: Duration,
    worker: Option<JoinHandle<()>>,
}

impl MqttClient {
    /// Connect to the broker, perform the synchronous handshake and
    /// spawn the I/O worker. On any failure everything constructed so
    /// far is torn down; no partial state escapes.
    pub fn connect(options: &ClientOptions, on_publish: PublishCallback) -> Result<Self> {
        let addr = (options.host.as_str(), options.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                Error::InvalidArgument(format!("could not resolve {}", options.host))
            })?;

        let mut stream = StdTcpStream::connect_timeout(&addr, options.connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(options.connect_timeout))?;

        let mut frame = Vec::new();
        packet::encode_connect(options.keepalive, &mut frame);
        stream.write_all(&frame)?;
        let mut connack = [0u8; 4];
        stream.read_exact(&mut connack)?;
        packet::validate_connack(&connack)?;

        frame.clear();
        packet::encode_subscribe(&mut frame);
        if let Err(e) = stream
            .write_all(&frame)
            .map_err(Error::from)
            .and_then(|_| {
                let mut suback = [0u8; 5];
                stream.read_exact(&mut suback)?;
                packet::validate_suback(&suback)?;
                Ok(())
            })
        {
            // The session is half-open; tell the broker we are gone.
            let mut disconnect = Vec::new();
            packet::encode_disconnect(&mut disconnect);
            let _ = stream.write_all(&disconnect);
            return Err(e);
        }

        stream.set_nonblocking(true)?;
        let mut socket = TcpStream::from_std(stream);
        let poll = Poll::new()?;
        poll.registry().register(
            &mut socket,
            SOCKET,
            Interest::READABLE | Interest::WRITABLE,
        )?;
        let waker = Waker::new(poll.registry(), WAKER)?;

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(true),
            waker,
        });

        let keepalive = Duration::from_secs(options.keepalive as u64);
        let mut worker = Worker::new(socket, poll, Arc::clone(&shared), keepalive, on_publish);
        let handle = std::thread::Builder::new()
            .name("mqtt-io".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            shared,
            holdback: options.holdback,
            worker: Some(handle),
        })
    }

    /// Queue a publish for emission once the holdback elapses.
    pub fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        if topic.len() > packet::MAX_TOPIC_LEN {
            return Err(Error::InvalidArgument(format!(
                "topic length {} exceeds {}",
                topic.len(),
                packet::MAX_TOPIC_LEN
            )));
        }
        if 2 + topic.len() + payload.len() > varint::MAX_VARINT {
            return Err(Error::InvalidArgument(format!(
                "message length {} exceeds {}",
                2 + topic.len() + payload.len(),
                varint::MAX_VARINT
            )));
        }
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(Error::NotRunning);
        }

        self.shared.queue.lock().push_back(QueuedPublish {
            send_at: Instant::now() + self.holdback,
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        self.shared.waker.wake()?;
        Ok(())
    }

    /// Drop every queued publish for `topic` that has not been sent
    /// yet. Frames already written to the socket cannot be recalled.
    pub fn cancel(&self, topic: &str) {
        self.shared.queue.lock().retain(|m| m.topic != topic);
    }

    /// Whether the worker is still alive.
    #[allow(dead_code)] // publish() reports NotRunning on its own
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stop the worker and wait for it to exit. The worker sends a
    /// best-effort DISCONNECT on the way out.
    pub fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Err(e) = self.shared.waker.wake() {
            warn!("failed to wake mqtt worker for shutdown: {}", e);
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
