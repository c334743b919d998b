//! `socket::` - outbound TCP for trusted plugins.
//!
//! `connect` never blocks the host thread. It takes a numeric address,
//! starts a non-blocking connect and hands back a socket that finishes
//! connecting while scripts poll it from a `tick` hook. Every socket a
//! plugin opens is closed when the plugin is destroyed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpStream};
use std::rc::Rc;
use std::time::{Duration, Instant};

use rhai::{INT, ImmutableString};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use ember_config::SocketsSection;

use crate::binding::{Binding, NativeResult};
use crate::error::PluginResult;
use crate::module::Attachments;
use crate::plugin::{Plugin, PluginId, PluginInfo};

const READ_CHUNK: usize = 4096;

#[derive(Debug)]
enum Link {
    Connecting {
        stream: TcpStream,
        started: Instant,
        timeout: Duration,
    },
    Open(TcpStream),
    Closed,
}

#[derive(Debug)]
struct SocketInner {
    link: Link,
    peer: SocketAddr,
}

impl SocketInner {
    fn is_live(&self) -> bool {
        !matches!(self.link, Link::Closed)
    }

    /// Promote a pending connect once the peer answers. A refused or
    /// expired connect closes the socket and reports why.
    fn poll_connect(&mut self) -> Result<(), String> {
        let outcome = match &self.link {
            Link::Connecting {
                stream,
                started,
                timeout,
            } => match stream.take_error() {
                Ok(Some(e)) | Err(e) => {
                    Some(Err(format!("connect to {} failed: {e}", self.peer)))
                },
                Ok(None) if stream.peer_addr().is_ok() => Some(Ok(())),
                Ok(None) if started.elapsed() >= *timeout => {
                    Some(Err(format!("connect to {} timed out", self.peer)))
                },
                Ok(None) => None,
            },
            Link::Open(_) | Link::Closed => None,
        };
        match outcome {
            Some(Ok(())) => {
                if let Link::Connecting { stream, .. } =
                    std::mem::replace(&mut self.link, Link::Closed)
                {
                    let _ = stream.set_nodelay(true);
                    debug!(peer = %self.peer, "Socket connected");
                    self.link = Link::Open(stream);
                }
                Ok(())
            },
            Some(Err(message)) => {
                self.close();
                Err(message)
            },
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Open(stream) | Link::Connecting { stream, .. } => {
                let _ = stream.shutdown(Shutdown::Both);
                debug!(peer = %self.peer, "Socket closed");
            },
            Link::Closed => {},
        }
    }
}

/// Script handle to one TCP connection (`Socket` in scripts).
#[derive(Debug, Clone)]
pub struct ScriptSocket {
    inner: Rc<RefCell<SocketInner>>,
}

impl ScriptSocket {
    /// Bytes written. Zero while the connect is pending or the kernel
    /// buffer is full.
    fn send(&mut self, data: &str) -> NativeResult<INT> {
        let mut inner = self.inner.borrow_mut();
        inner.poll_connect()?;
        let written = match &mut inner.link {
            Link::Open(stream) => stream.write(data.as_bytes()),
            Link::Connecting { .. } => return Ok(0),
            Link::Closed => return Err("socket is closed".into()),
        };
        match written {
            Ok(n) => Ok(INT::try_from(n).unwrap_or(INT::MAX)),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                inner.close();
                Err(format!("send failed: {e}").into())
            },
        }
    }

    fn read(&mut self) -> NativeResult<String> {
        let mut inner = self.inner.borrow_mut();
        inner.poll_connect()?;
        let Link::Open(stream) = &mut inner.link else {
            return Ok(String::new());
        };
        let mut received = Vec::new();
        let mut chunk = [0_u8; READ_CHUNK];
        let mut peer_closed = false;
        let mut failure = None;
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    peer_closed = true;
                    break;
                },
                Ok(n) => received.extend_from_slice(chunk.get(..n).unwrap_or_default()),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {},
                Err(e) => {
                    failure = Some(e);
                    break;
                },
            }
        }
        if let Some(e) = failure {
            inner.close();
            return Err(format!("read failed: {e}").into());
        }
        if peer_closed {
            inner.close();
        }
        Ok(String::from_utf8_lossy(&received).into_owned())
    }

    fn is_open(&mut self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if let Err(message) = inner.poll_connect() {
            debug!("{message}");
        }
        matches!(inner.link, Link::Open(_))
    }

    fn is_connecting(&mut self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if let Err(message) = inner.poll_connect() {
            debug!("{message}");
        }
        matches!(inner.link, Link::Connecting { .. })
    }

    fn close(&mut self) {
        self.inner.borrow_mut().close();
    }
}

/// Sockets opened by one plugin.
#[derive(Debug, Default)]
struct SocketSet {
    sockets: Vec<Rc<RefCell<SocketInner>>>,
}

impl SocketSet {
    fn open_count(&self) -> usize {
        self.sockets
            .iter()
            .filter(|s| s.borrow().is_live())
            .count()
    }

    fn close_all(&mut self) {
        for socket in self.sockets.drain(..) {
            socket.borrow_mut().close();
        }
    }
}

/// TCP client sockets for trusted plugins.
#[derive(Debug)]
pub struct SocketModule {
    config: SocketsSection,
    sets: RefCell<HashMap<PluginId, Rc<RefCell<SocketSet>>>>,
    attachments: Attachments,
}

impl SocketModule {
    pub(crate) fn new(config: SocketsSection) -> Self {
        Self {
            config,
            sets: RefCell::new(HashMap::new()),
            attachments: Attachments::default(),
        }
    }

    pub(crate) fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    /// Sockets `plugin` currently has open.
    #[must_use]
    pub fn open_sockets(&self, plugin: PluginId) -> usize {
        self.sets
            .borrow()
            .get(&plugin)
            .map_or(0, |set| set.borrow().open_count())
    }

    pub(crate) fn attach(&self, plugin: &mut Plugin, binding: &mut Binding) -> PluginResult<()> {
        let set = Rc::new(RefCell::new(SocketSet::default()));
        self.sets.borrow_mut().insert(plugin.id(), Rc::clone(&set));

        let owned = Rc::clone(&set);
        plugin.register_destroy_fn(move |info| {
            let open = owned.borrow().open_count();
            owned.borrow_mut().close_all();
            if open > 0 {
                info!(plugin = %info.directory, open, "Closed plugin sockets");
            }
        });

        let sandboxed = plugin.is_sandboxed();
        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let limit = self.config.max_per_plugin;
        binding.functions().set_native_fn(
            "connect",
            move |host: ImmutableString, port: INT| -> NativeResult<ScriptSocket> {
                if sandboxed {
                    return Err("socket::connect is not available to sandboxed plugins".into());
                }
                if set.borrow().open_count() >= limit {
                    return Err(format!("socket limit of {limit} reached").into());
                }
                let port = u16::try_from(port).map_err(|_| format!("invalid port {port}"))?;
                let peer = SocketAddr::new(parse_address(&host)?, port);
                let stream =
                    start_connect(peer).map_err(|e| format!("connect to {peer} failed: {e}"))?;
                debug!(%peer, "Socket connecting");
                let inner = Rc::new(RefCell::new(SocketInner {
                    link: Link::Connecting {
                        stream,
                        started: Instant::now(),
                        timeout,
                    },
                    peer,
                }));
                set.borrow_mut().sockets.push(Rc::clone(&inner));
                Ok(ScriptSocket { inner })
            },
        );

        binding.custom_type(|engine| {
            engine
                .register_type_with_name::<ScriptSocket>("Socket")
                .register_fn("send", |s: &mut ScriptSocket, data: ImmutableString| s.send(&data))
                .register_fn("read", ScriptSocket::read)
                .register_fn("is_open", ScriptSocket::is_open)
                .register_fn("is_connecting", ScriptSocket::is_connecting)
                .register_fn("close", ScriptSocket::close);
        });

        self.attachments.add(plugin.id());
        Ok(())
    }

    pub(crate) fn on_plugin_destroyed(&self, plugin: &PluginInfo) {
        if let Some(set) = self.sets.borrow_mut().remove(&plugin.id) {
            set.borrow_mut().close_all();
        }
        self.attachments.remove(plugin.id);
    }
}

/// Numeric IPv4 or IPv6 literal, or `localhost`. Names that would need a
/// resolver are refused so `connect` cannot stall on DNS.
fn parse_address(host: &str) -> Result<IpAddr, String> {
    if host.eq_ignore_ascii_case("localhost") {
        return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|_| format!("{host} is not a numeric address; hostnames are not resolved"))
}

fn start_connect(peer: SocketAddr) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(peer), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    match socket.connect(&peer.into()) {
        Ok(()) => {},
        Err(e) if connect_in_progress(&e) => {},
        Err(e) => return Err(e),
    }
    Ok(socket.into())
}

fn connect_in_progress(err: &io::Error) -> bool {
    #[cfg(unix)]
    let in_progress = err.raw_os_error() == Some(libc::EINPROGRESS);
    #[cfg(not(unix))]
    let in_progress = false;
    in_progress || err.kind() == ErrorKind::WouldBlock
}
