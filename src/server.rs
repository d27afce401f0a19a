//! Server
//!
//! Accepts TCP connections and dispatches each one to a caller-supplied
//! handler, serially, on the accept loop's thread. The loop runs either
//! inline (blocking the caller) or on one background thread; stop() is
//! the single cooperative cancellation signal for both modes.

use std::net::{SocketAddr, TcpListener};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Result, WireError};

/// Where the accept loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Run the accept loop on the calling thread; `start` returns only
    /// after `stop` is observed.
    Blocking,
    /// Spawn the accept loop on a background thread and return
    /// immediately.
    Background,
}

/// Externally visible lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Never started (or fully reset); nothing bound
    Idle,
    /// Listener bound, accept loop active
    Listening,
    /// stop() signalled; waiting for the accept loop to observe it
    Stopping,
    /// Accept loop exited and the listener is released
    Stopped,
}

/// A serial-dispatch TCP server.
///
/// One accepted peer is handled to completion before the next accept:
/// handlers that want concurrent processing must offload work
/// themselves. The Server hands each Connection to the handler and does
/// not track it afterwards.
///
/// Interior state is behind locks so that `stop` can be called from any
/// thread (wrap the Server in an `Arc` to stop a Blocking-mode server
/// from elsewhere). Dropping a Server stops it.
pub struct Server {
    config: Config,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<ServerState>>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    /// Create an idle server; nothing is bound until [`start`](Self::start).
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(ServerState::Idle)),
            acceptor: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Bind `(config.bind_addr, port)` and run the accept loop.
    ///
    /// The handler receives the peer address and an already-Connected
    /// [`Connection`] for every accepted peer, serially. A handler that
    /// panics is logged and the loop moves on to the next peer.
    ///
    /// With [`RunMode::Blocking`] this call does not return until
    /// [`stop`](Self::stop) is invoked from a handler or another thread.
    /// With [`RunMode::Background`] it returns once the loop is running.
    ///
    /// Errors with [`WireError::AlreadyListening`] if an accept loop is
    /// already active; bind failures leave the server Idle.
    pub fn start<F>(&self, handler: F, port: u16, mode: RunMode) -> Result<()>
    where
        F: FnMut(SocketAddr, Connection) + Send + 'static,
    {
        let listener = {
            // Hold the state lock across the bind so two racing starts
            // cannot both reach Listening.
            let mut state = self.state.lock();
            match *state {
                ServerState::Listening | ServerState::Stopping => {
                    return Err(self.fail("start", WireError::AlreadyListening))
                }
                ServerState::Idle | ServerState::Stopped => {}
            }

            let listener = TcpListener::bind((self.config.bind_addr.as_str(), port))
                .map_err(|e| self.fail("start", e.into()))?;
            // Non-blocking accept lets the loop poll the stop signal.
            listener
                .set_nonblocking(true)
                .map_err(|e| self.fail("start", e.into()))?;

            *self.local_addr.lock() = listener.local_addr().ok();
            self.running.store(true, Ordering::Release);
            *state = ServerState::Listening;
            listener
        };

        let addr = *self.local_addr.lock();
        tracing::info!(?addr, ?mode, "server listening");

        let running = Arc::clone(&self.running);
        let state = Arc::clone(&self.state);
        let config = self.config.clone();

        match mode {
            RunMode::Blocking => {
                accept_loop(listener, running, state, config, handler);
                *self.local_addr.lock() = None;
            }
            RunMode::Background => {
                let spawned = thread::Builder::new()
                    .name("quietwire-accept".to_string())
                    .spawn(move || accept_loop(listener, running, state, config, handler));
                match spawned {
                    Ok(handle) => *self.acceptor.lock() = Some(handle),
                    Err(e) => {
                        // The closure (and listener) were dropped; undo
                        // the Listening transition.
                        self.running.store(false, Ordering::Release);
                        *self.state.lock() = ServerState::Idle;
                        *self.local_addr.lock() = None;
                        return Err(self.fail("start", e.into()));
                    }
                }
            }
        }

        Ok(())
    }

    /// Signal the accept loop to terminate and release the listener.
    ///
    /// Idempotent, and a no-op on a server that was never started. For a
    /// Background server this waits for the acceptor thread to exit
    /// (unless called from inside a handler, in which case it only
    /// signals and the loop winds down after the handler returns); once
    /// it returns, the port is free to rebind. For a Blocking server it
    /// only signals; the blocked `start` call returns when the loop
    /// observes the flag.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                ServerState::Idle | ServerState::Stopped => return,
                ServerState::Listening => *state = ServerState::Stopping,
                ServerState::Stopping => {}
            }
        }

        self.running.store(false, Ordering::Release);
        *self.local_addr.lock() = None;
        tracing::info!("server stopping");

        let handle = self.acceptor.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                // stop() from inside a handler: signalling is enough,
                // joining our own thread would deadlock.
                return;
            }
            let _ = handle.join();
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.state.lock()
    }

    /// Address the listener is bound to, while listening. Useful with
    /// port 0 to discover the ephemeral port.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    fn fail(&self, op: &'static str, err: WireError) -> WireError {
        if self.config.debug {
            tracing::warn!(op, error = %err, "server failure");
        } else {
            tracing::trace!(op, error = %err, "server failure");
        }
        err
    }
}

impl Drop for Server {
    /// The listener never leaks: dropping a Server signals and reaps its
    /// accept loop if one is active.
    fn drop(&mut self) {
        self.stop();
    }
}

/// The accept loop. Owns the listener; dropping it on exit is what
/// releases the port.
fn accept_loop<F>(
    listener: TcpListener,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<ServerState>>,
    config: Config,
    mut handler: F,
) where
    F: FnMut(SocketAddr, Connection) + Send,
{
    let debug = config.debug;

    while running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let connection = match Connection::from_stream(stream, &config) {
                    Ok(connection) => connection,
                    Err(err) => {
                        if debug {
                            tracing::warn!(%peer, error = %err, "failed to wrap accepted stream");
                        } else {
                            tracing::trace!(%peer, error = %err, "failed to wrap accepted stream");
                        }
                        continue;
                    }
                };

                tracing::debug!(%peer, "accepted connection");

                // Handler faults are isolated: the loop must survive to
                // serve the next peer.
                let outcome = catch_unwind(AssertUnwindSafe(|| handler(peer, connection)));
                if outcome.is_err() {
                    tracing::warn!(%peer, "handler panicked; accept loop continues");
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(config.accept_poll_interval);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                // Accept errors during shutdown are expected and stay quiet.
                if running.load(Ordering::Acquire) {
                    tracing::warn!(error = %e, "accept failed; shutting down listener");
                }
                break;
            }
        }
    }

    drop(listener);
    *state.lock() = ServerState::Stopped;
    tracing::info!("accept loop exited");
}
