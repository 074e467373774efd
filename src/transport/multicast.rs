//! Multicast UDP transport.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, trace, warn};

use super::config::TransportConfig;
use super::worker::{ErrorBackoff, POLL_SLICE, StopToken, Worker};
use crate::error::{NmeaError, Result};
use crate::listener::TransportListener;

/// Receive buffer size used by listening loops (largest UDP payload).
pub const RECV_BUFFER_SIZE: usize = 65536;

/// A multicast UDP socket bound to one group and port.
///
/// The transport starts closed. [`open`](Self::open) creates the socket,
/// [`start_listening`](Self::start_listening) runs a background thread that
/// reports every datagram, timeout and socket error to the registered
/// [`TransportListener`].
///
/// `send`, `receive` and the listening thread share one socket; using
/// `receive` while listening is not supported.
///
/// # Example
///
/// ```no_run
/// use nmea450::transport::{MulticastTransport, TransportConfig};
/// use nmea450::TransmissionGroup;
///
/// let config = TransportConfig::for_group(TransmissionGroup::Misc);
/// let mut transport = MulticastTransport::new(config)?;
/// transport.open()?;
/// transport.send(b"hello")?;
///
/// let mut buf = [0u8; 1500];
/// let len = transport.receive(&mut buf)?;
/// println!("{:?}", &buf[..len]);
/// # Ok::<(), nmea450::NmeaError>(())
/// ```
pub struct MulticastTransport {
    config: TransportConfig,
    socket: Option<Arc<UdpSocket>>,
    listener: Option<Arc<dyn TransportListener>>,
    worker: Option<Worker>,
}

impl MulticastTransport {
    /// Create a closed transport.
    ///
    /// Fails with [`NmeaError::InvalidAddress`] if the group address is not
    /// in 224.0.0.0/4.
    pub fn new(config: TransportConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            error!("rejecting transport config: {e}");
            return Err(e);
        }
        Ok(Self::from_valid_config(config))
    }

    /// Create a closed transport from interface, group, port and timeout.
    pub fn bind(
        interface: Ipv4Addr,
        group: Ipv4Addr,
        port: u16,
        timeout: Duration,
    ) -> Result<Self> {
        Self::new(
            TransportConfig::new(group, port)
                .with_interface(interface)
                .with_timeout(timeout),
        )
    }

    /// Create a transport from a config already known to hold a multicast group.
    pub(crate) fn from_valid_config(config: TransportConfig) -> Self {
        info!(
            "multicast transport interface={} group={}",
            config.interface,
            config.group_addr()
        );
        Self {
            config,
            socket: None,
            listener: None,
            worker: None,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Open the socket.
    ///
    /// Returns `Ok(false)` if the socket was already open. On failure the
    /// partially configured socket is released before the error is returned.
    pub fn open(&mut self) -> Result<bool> {
        if self.socket.is_some() {
            debug!("socket for {} already open", self.config.group_addr());
            return Ok(false);
        }

        let socket = open_socket(&self.config).inspect_err(|e| {
            error!("failed to open socket for {}: {e}", self.config.group_addr());
        })?;
        self.socket = Some(Arc::new(socket));
        debug!("opened socket for {}", self.config.group_addr());
        Ok(true)
    }

    /// Close the socket, stopping the listening thread first.
    ///
    /// Returns false if the socket was already closed.
    pub fn close(&mut self) -> bool {
        if self.socket.is_none() {
            return false;
        }
        self.stop_listening();
        self.socket = None;
        debug!("closed socket for {}", self.config.group_addr());
        true
    }

    /// Check if the socket is open.
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Check if the listening thread is running.
    pub fn is_listening(&self) -> bool {
        self.worker.is_some()
    }

    /// Send one datagram to the group. Returns the number of bytes sent.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or(NmeaError::NotOpen)?;
        let len = socket.send_to(data, self.config.group_addr())?;
        trace!("sent {len} bytes to {}", self.config.group_addr());
        Ok(len)
    }

    /// Receive one datagram, waiting up to the configured timeout.
    ///
    /// Returns the number of bytes written into `buf`,
    /// [`NmeaError::Timeout`] if nothing arrived in time, or another error
    /// for any socket failure.
    pub fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        self.receive_timeout(buf, self.config.timeout)
    }

    /// Receive one datagram, waiting up to `timeout`.
    pub fn receive_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let socket = self.socket.as_ref().ok_or(NmeaError::NotOpen)?;
        recv_within(socket, buf, timeout)
    }

    /// Get a receive handle onto this transport's socket.
    ///
    /// Returns `None` while the transport is closed. The handle does not keep
    /// the socket alive: after `close` it fails with [`NmeaError::NotOpen`].
    pub(crate) fn receiver(&self) -> Option<DatagramReceiver> {
        self.socket.as_ref().map(|socket| DatagramReceiver {
            socket: Arc::downgrade(socket),
            timeout: self.config.timeout,
        })
    }

    /// Set the listener. Takes effect at the next `start_listening`.
    pub fn set_listener(&mut self, listener: Arc<dyn TransportListener>) {
        self.listener = Some(listener);
    }

    /// Remove the listener. Takes effect at the next `start_listening`.
    pub fn unset_listener(&mut self) {
        self.listener = None;
    }

    /// Start the listening thread, opening the socket if needed.
    ///
    /// Returns `Ok(false)` if already listening or no listener is set.
    pub fn start_listening(&mut self) -> Result<bool> {
        if self.worker.is_some() {
            return Ok(false);
        }
        let Some(listener) = self.listener.clone() else {
            debug!("no listener set for {}", self.config.group_addr());
            return Ok(false);
        };

        self.open()?;
        let receiver = self.receiver().ok_or(NmeaError::NotOpen)?;
        let backoff = ErrorBackoff::new(self.config.error_backoff.clone());

        let name = format!("mcast-{}", self.config.port);
        let worker = Worker::spawn(name, move |stop| {
            run_listener(receiver, listener.as_ref(), backoff, stop)
        })?;
        self.worker = Some(worker);
        Ok(true)
    }

    /// Stop the listening thread and wait for it to exit.
    ///
    /// Returns false if the transport was not listening.
    pub fn stop_listening(&mut self) -> bool {
        match self.worker.take() {
            Some(worker) => {
                worker.stop();
                true
            }
            None => false,
        }
    }
}

/// Copies the configuration only. The copy starts closed and without a listener.
impl Clone for MulticastTransport {
    fn clone(&self) -> Self {
        Self::from_valid_config(self.config.clone())
    }
}

impl Drop for MulticastTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for MulticastTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MulticastTransport")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .field("listening", &self.is_listening())
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

/// Where a listening loop gets its datagrams from.
pub(crate) trait DatagramSource {
    /// Receive one datagram, giving up early once `stop` fires.
    ///
    /// Returns `None` when stopped, otherwise `Ok(len)`,
    /// `Err(NmeaError::Timeout)` or another error.
    fn receive_until(&mut self, buf: &mut [u8], stop: &StopToken) -> Option<Result<usize>>;
}

/// Receive handle onto an open transport's socket.
///
/// Holds a weak reference only, so closing the transport releases the
/// socket even while a handle is still around.
#[derive(Debug, Clone)]
pub(crate) struct DatagramReceiver {
    socket: Weak<UdpSocket>,
    timeout: Duration,
}

impl DatagramReceiver {
    /// Receive one datagram, waiting up to the configured timeout.
    #[cfg(test)]
    pub(crate) fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        let socket = self.socket.upgrade().ok_or(NmeaError::NotOpen)?;
        recv_within(&socket, buf, self.timeout)
    }
}

impl DatagramSource for DatagramReceiver {
    fn receive_until(&mut self, buf: &mut [u8], stop: &StopToken) -> Option<Result<usize>> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if stop.is_stopped() {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return Some(Err(NmeaError::Timeout));
            }
            let Some(socket) = self.socket.upgrade() else {
                return Some(Err(NmeaError::NotOpen));
            };
            match recv_within(&socket, buf, (deadline - now).min(POLL_SLICE)) {
                Err(NmeaError::Timeout) => continue,
                other => return Some(other),
            }
        }
    }
}

fn recv_within(socket: &UdpSocket, buf: &mut [u8], timeout: Duration) -> Result<usize> {
    recv_before(Instant::now() + timeout, |wait| {
        socket.set_read_timeout(Some(wait))?;
        socket.recv(&mut buf[..])
    })
}

/// Run `recv` until it succeeds, fails or `deadline` passes.
///
/// `recv` gets the time left, at least 1 ms. Interrupted calls are retried
/// with whatever remains of the window.
fn recv_before<F>(deadline: Instant, mut recv: F) -> Result<usize>
where
    F: FnMut(Duration) -> io::Result<usize>,
{
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match recv(remaining.max(Duration::from_millis(1))) {
            Ok(len) => return Ok(len),
            Err(e) if e.kind() == io::ErrorKind::Interrupted && Instant::now() < deadline => {
                trace!("receive interrupted, retrying");
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock
                        | io::ErrorKind::TimedOut
                        | io::ErrorKind::Interrupted
                ) =>
            {
                return Err(NmeaError::Timeout);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn run_listener<S: DatagramSource>(
    mut source: S,
    listener: &dyn TransportListener,
    mut backoff: ErrorBackoff,
    stop: StopToken,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    while let Some(result) = source.receive_until(&mut buf, &stop) {
        match result {
            Ok(len) if len > 0 => {
                backoff.reset();
                listener.on_data_available(&buf[..len]);
            }
            Err(NmeaError::Timeout) => {
                backoff.reset();
                listener.on_timeout();
            }
            Err(NmeaError::NotOpen) => {
                debug!("socket closed, leaving receive loop");
                break;
            }
            other => {
                match other {
                    Ok(_) => warn!("received empty datagram"),
                    Err(e) => warn!("receive failed: {e}"),
                }
                listener.on_connection_error();
                if backoff.wait(&stop) {
                    break;
                }
            }
        }
    }
}

/// Create, bind and configure the group socket.
pub(crate) fn open_socket(config: &TransportConfig) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    if let Err(e) = socket.set_reuse_address(true) {
        warn!("could not enable SO_REUSEADDR: {e}");
    }

    let bind_addr = SocketAddr::V4(config.group_addr());
    socket.bind(&bind_addr.into())?;

    socket.join_multicast_v4(&config.group, &config.interface)?;
    if !config.interface.is_unspecified() {
        socket.set_multicast_if_v4(&config.interface)?;
    }

    if let Err(e) = socket.set_multicast_loop_v4(true) {
        warn!("could not enable multicast loopback: {e}");
    }

    let rcvbuf =
        negotiate_buffer_size(config.buffer_size, |size| socket.set_recv_buffer_size(size));
    let sndbuf =
        negotiate_buffer_size(config.buffer_size, |size| socket.set_send_buffer_size(size));
    debug!("socket buffers rcvbuf={rcvbuf:?} sndbuf={sndbuf:?}");

    Ok(socket.into())
}

/// Request `size`, halving on rejection. Returns the accepted size.
pub(crate) fn negotiate_buffer_size<F>(mut size: usize, mut set: F) -> Option<usize>
where
    F: FnMut(usize) -> io::Result<()>,
{
    while size > 1 {
        if set(size).is_ok() {
            return Some(size);
        }
        size >>= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{ChannelListener, TransportEvent};
    use crate::test_util::{ScriptedSource, Step};
    use crate::transport::BackoffStrategy;
    use std::sync::mpsc::Receiver;

    const TEST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 45, 1);

    fn test_config(port: u16) -> TransportConfig {
        TransportConfig::new(TEST_GROUP, port)
            .with_interface(Ipv4Addr::LOCALHOST)
            .with_timeout(Duration::from_millis(200))
    }

    fn spawn_loop(
        source: ScriptedSource,
        strategy: BackoffStrategy,
    ) -> (Worker, Receiver<TransportEvent>) {
        let (listener, rx) = ChannelListener::new();
        let worker = Worker::spawn("test-loop".into(), move |stop| {
            run_listener(source, &listener, ErrorBackoff::new(strategy), stop)
        })
        .unwrap();
        (worker, rx)
    }

    fn next_event(rx: &Receiver<TransportEvent>) -> (TransportEvent, Instant) {
        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        (event, Instant::now())
    }

    #[test]
    fn test_rejects_non_multicast_group() {
        for addr in [
            Ipv4Addr::new(0, 0, 0, 0),
            Ipv4Addr::new(127, 0, 0, 1),
            Ipv4Addr::new(192, 168, 0, 1),
            Ipv4Addr::new(223, 255, 255, 255),
            Ipv4Addr::new(240, 0, 0, 0),
            Ipv4Addr::new(255, 255, 255, 255),
        ] {
            let result = MulticastTransport::new(TransportConfig::new(addr, 60001));
            assert!(
                matches!(result, Err(NmeaError::InvalidAddress(a)) if a == addr),
                "{addr}"
            );
        }
    }

    #[test]
    fn test_accepts_multicast_group() {
        for addr in [
            Ipv4Addr::new(224, 0, 0, 0),
            Ipv4Addr::new(224, 0, 0, 251),
            Ipv4Addr::new(239, 192, 0, 1),
            Ipv4Addr::new(239, 255, 255, 255),
        ] {
            let transport = MulticastTransport::bind(
                Ipv4Addr::UNSPECIFIED,
                addr,
                60001,
                Duration::from_millis(1000),
            )
            .unwrap();
            assert!(!transport.is_open());
            assert!(!transport.is_listening());
        }
    }

    #[test]
    fn test_negotiate_buffer_size() {
        let accepted = negotiate_buffer_size(32768, |size| {
            if size <= 4096 {
                Ok(())
            } else {
                Err(io::Error::from(io::ErrorKind::InvalidInput))
            }
        });
        assert_eq!(accepted, Some(4096));

        let mut attempts = Vec::new();
        let accepted = negotiate_buffer_size(8, |size| {
            attempts.push(size);
            Err(io::Error::from(io::ErrorKind::InvalidInput))
        });
        assert_eq!(accepted, None);
        assert_eq!(attempts, vec![8, 4, 2]);

        assert_eq!(negotiate_buffer_size(32768, |_| Ok(())), Some(32768));
    }

    #[test]
    fn test_closed_transport_operations() {
        let mut transport = MulticastTransport::new(test_config(47101)).unwrap();
        let mut buf = [0u8; 16];

        assert!(matches!(transport.send(b"x"), Err(NmeaError::NotOpen)));
        assert!(matches!(transport.receive(&mut buf), Err(NmeaError::NotOpen)));
        assert!(transport.receiver().is_none());
        assert!(!transport.close());
        assert!(!transport.stop_listening());
    }

    #[test]
    fn test_double_open_and_close() {
        let mut transport = MulticastTransport::new(test_config(47102)).unwrap();

        assert!(transport.open().unwrap());
        assert!(transport.is_open());
        assert!(!transport.open().unwrap());

        assert!(transport.close());
        assert!(!transport.is_open());
        assert!(!transport.close());
    }

    #[test]
    fn test_receive_timeout() {
        let mut transport = MulticastTransport::new(test_config(47103)).unwrap();
        transport.open().unwrap();

        let mut buf = [0u8; 64];
        let start = Instant::now();
        let result = transport.receive(&mut buf);
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(NmeaError::Timeout)));
        assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
    }

    #[test]
    fn test_loopback_send_receive() {
        let mut transport = MulticastTransport::new(test_config(47104)).unwrap();
        transport.open().unwrap();

        let sent = transport.send(b"hello group").unwrap();
        assert_eq!(sent, 11);

        let mut buf = [0u8; 64];
        let len = transport.receive(&mut buf).unwrap();
        assert_eq!(len, 11);
        assert_eq!(&buf[..len], b"hello group");
    }

    #[test]
    fn test_two_transports_same_group() {
        let mut talker = MulticastTransport::new(test_config(47105)).unwrap();
        let mut listener = talker.clone();
        listener.open().unwrap();
        talker.open().unwrap();

        talker.send(b"ping").unwrap();

        let mut buf = [0u8; 64];
        let len = listener.receive(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"ping");
    }

    #[test]
    fn test_clone_starts_closed() {
        let mut transport = MulticastTransport::new(test_config(47106)).unwrap();
        transport.open().unwrap();

        let copy = transport.clone();
        assert!(transport.is_open());
        assert!(!copy.is_open());
        assert_eq!(copy.config().group_addr(), transport.config().group_addr());
    }

    #[test]
    fn test_start_listening_without_listener() {
        let mut transport = MulticastTransport::new(test_config(47107)).unwrap();
        assert!(!transport.start_listening().unwrap());
        assert!(!transport.is_listening());
        assert!(!transport.is_open());
    }

    #[test]
    fn test_listener_receives_data_and_timeouts() {
        let mut transport = MulticastTransport::new(
            test_config(47108).with_timeout(Duration::from_millis(100)),
        )
        .unwrap();
        let (listener, rx) = ChannelListener::new();
        transport.set_listener(Arc::new(listener));

        assert!(transport.start_listening().unwrap());
        assert!(transport.is_open());
        assert!(transport.is_listening());
        assert!(!transport.start_listening().unwrap());

        transport.send(b"datagram").unwrap();

        let mut got_data = false;
        let mut got_timeout = false;
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline && !(got_data && got_timeout) {
            match rx.recv_timeout(Duration::from_millis(500)) {
                Ok(TransportEvent::Data(data)) => {
                    assert_eq!(data.as_ref(), b"datagram");
                    got_data = true;
                }
                Ok(TransportEvent::Timeout) => got_timeout = true,
                Ok(TransportEvent::ConnectionError) => panic!("unexpected connection error"),
                Err(_) => {}
            }
        }
        assert!(got_data);
        assert!(got_timeout);

        assert!(transport.stop_listening());
        assert!(!transport.is_listening());
        assert!(transport.is_open());
        assert!(!transport.stop_listening());
    }

    #[test]
    fn test_stop_listening_does_not_wait_for_timeout() {
        let mut transport = MulticastTransport::new(
            test_config(47109)
                .with_timeout(Duration::from_secs(10))
                .with_error_backoff(BackoffStrategy::None),
        )
        .unwrap();
        let (listener, _rx) = ChannelListener::new();
        transport.set_listener(Arc::new(listener));
        transport.start_listening().unwrap();

        std::thread::sleep(Duration::from_millis(100));
        let start = Instant::now();
        assert!(transport.stop_listening());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_close_while_listening() {
        let mut transport = MulticastTransport::new(test_config(47110)).unwrap();
        let (listener, _rx) = ChannelListener::new();
        transport.set_listener(Arc::new(listener));
        transport.start_listening().unwrap();

        assert!(transport.close());
        assert!(!transport.is_listening());
        assert!(!transport.is_open());
    }

    #[test]
    fn test_receiver_is_dead_after_close() {
        let mut transport = MulticastTransport::new(test_config(47112)).unwrap();
        transport.open().unwrap();
        let receiver = transport.receiver().unwrap();

        assert!(transport.close());

        let mut talker = transport.clone();
        talker.open().unwrap();
        talker.send(b"after close").unwrap();

        let mut buf = [0u8; 64];
        assert!(matches!(receiver.receive(&mut buf), Err(NmeaError::NotOpen)));

        let (_tx, stop) = StopToken::new();
        let mut receiver = receiver;
        assert!(matches!(
            receiver.receive_until(&mut buf, &stop),
            Some(Err(NmeaError::NotOpen))
        ));
    }

    #[test]
    fn test_recv_before_retries_interrupted_calls() {
        let mut calls = 0;
        let result = recv_before(Instant::now() + Duration::from_secs(5), |_| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_recv_before_keeps_the_window_across_interrupts() {
        let start = Instant::now();
        let mut waits = Vec::new();
        let result = recv_before(start + Duration::from_millis(100), |wait| {
            waits.push(wait);
            std::thread::sleep(Duration::from_millis(20));
            Err(io::Error::from(io::ErrorKind::Interrupted))
        });

        assert!(matches!(result, Err(NmeaError::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(waits.len() > 1);
        assert!(waits.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_recv_before_maps_timeouts_and_errors() {
        let deadline = Instant::now() + Duration::from_millis(10);
        assert!(matches!(
            recv_before(deadline, |_| Err(io::ErrorKind::WouldBlock.into())),
            Err(NmeaError::Timeout)
        ));
        assert!(matches!(
            recv_before(deadline, |_| Err(io::ErrorKind::TimedOut.into())),
            Err(NmeaError::Timeout)
        ));
        assert!(matches!(
            recv_before(deadline, |_| Err(io::ErrorKind::ConnectionRefused.into())),
            Err(NmeaError::Io(e)) if e.kind() == io::ErrorKind::ConnectionRefused
        ));
    }

    #[test]
    fn test_loop_reports_repeated_connection_errors_with_backoff() {
        let source = ScriptedSource::repeating(Step::Fail(io::ErrorKind::ConnectionRefused));
        let (worker, rx) = spawn_loop(source, BackoffStrategy::Fixed(Duration::from_millis(100)));

        let times: Vec<Instant> = (0..4)
            .map(|_| {
                let (event, at) = next_event(&rx);
                assert_eq!(event, TransportEvent::ConnectionError);
                at
            })
            .collect();
        for pair in times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(80), "{gap:?}");
        }

        worker.stop();
    }

    #[test]
    fn test_stop_interrupts_error_backoff() {
        let source = ScriptedSource::repeating(Step::Fail(io::ErrorKind::ConnectionRefused));
        let (worker, rx) = spawn_loop(source, BackoffStrategy::Fixed(Duration::from_secs(10)));

        assert_eq!(next_event(&rx).0, TransportEvent::ConnectionError);

        let start = Instant::now();
        worker.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn test_loop_resets_backoff_after_timeout() {
        let refused = Step::Fail(io::ErrorKind::ConnectionRefused);
        let source = ScriptedSource::new([
            refused.clone(),
            refused.clone(),
            refused.clone(),
            Step::Timeout,
            refused,
            Step::Timeout,
        ]);
        let strategy = BackoffStrategy::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_secs(10),
            multiplier: 2.0,
        };
        let (worker, rx) = spawn_loop(source, strategy);

        let events: Vec<(TransportEvent, Instant)> = (0..6).map(|_| next_event(&rx)).collect();
        let kinds: Vec<&TransportEvent> = events.iter().map(|(e, _)| e).collect();
        assert_eq!(
            kinds,
            [
                &TransportEvent::ConnectionError,
                &TransportEvent::ConnectionError,
                &TransportEvent::ConnectionError,
                &TransportEvent::Timeout,
                &TransportEvent::ConnectionError,
                &TransportEvent::Timeout,
            ]
        );

        // Third consecutive error waits 400 ms, the first one after a reset 100 ms.
        let streak_gap = events[3].1 - events[2].1;
        let reset_gap = events[5].1 - events[4].1;
        assert!(streak_gap >= Duration::from_millis(350), "{streak_gap:?}");
        assert!(reset_gap < Duration::from_millis(350), "{reset_gap:?}");

        worker.stop();
    }

    #[test]
    fn test_loop_reports_empty_datagram_as_error() {
        let source = ScriptedSource::new([Step::Data(b""), Step::Data(b"payload")]);
        let (worker, rx) = spawn_loop(source, BackoffStrategy::None);

        assert_eq!(next_event(&rx).0, TransportEvent::ConnectionError);
        assert_eq!(
            next_event(&rx).0,
            TransportEvent::Data(bytes::Bytes::from_static(b"payload"))
        );
        worker.stop();
    }

    #[test]
    fn test_loop_exits_once_socket_is_gone() {
        let source = ScriptedSource::new([Step::Timeout, Step::Closed]);
        let (worker, rx) = spawn_loop(source, BackoffStrategy::None);

        assert_eq!(next_event(&rx).0, TransportEvent::Timeout);
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_err());
        worker.stop();
    }

    #[test]
    fn test_unset_listener_applies_on_next_start() {
        let mut transport = MulticastTransport::new(test_config(47111)).unwrap();
        let (listener, _rx) = ChannelListener::new();
        transport.set_listener(Arc::new(listener));
        transport.start_listening().unwrap();

        transport.unset_listener();
        assert!(transport.is_listening());

        transport.stop_listening();
        assert!(!transport.start_listening().unwrap());
    }
}
