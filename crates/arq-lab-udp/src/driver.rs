//! Single-threaded control loops over a real UDP transport.
//!
//! Each loop owns its endpoint, its timer table, and (receiver side) its
//! loss simulator; nothing is shared between the two processes except the
//! datagrams themselves. Every socket read is bounded by the earliest
//! outstanding timer deadline, capped so the stop signal is observed at
//! each iteration boundary.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use arq_lab_core::{ArqContext, ArqEndpoint, Frame, LossSimulator};

use crate::timers::TimerTable;
use crate::transport::{RecvOutcome, TransportError, UdpTransport};

/// Upper bound on any single wait, so a stop request never stalls behind a
/// long timer deadline.
const STOP_POLL: Duration = Duration::from_millis(250);

/// Explicit stop signal for a running loop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a stop handle and the receiver half the loops watch.
pub fn stop_channel() -> (StopHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, rx)
}

/// Effects buffered while an endpoint callback runs.
#[derive(Default)]
struct HostActions {
    outgoing: Vec<Frame>,
    timers_start: Vec<(u64, u32)>,
    timers_cancel: Vec<u32>,
    delivered: Vec<Vec<u8>>,
}

struct HostContext<'a> {
    actions: &'a mut HostActions,
    now_ms: u64,
}

impl ArqContext for HostContext<'_> {
    fn send_frame(&mut self, frame: Frame) {
        self.actions.outgoing.push(frame);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.actions.timers_start.push((delay_ms, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.actions.timers_cancel.push(timer_id);
    }

    fn deliver(&mut self, payload: &[u8]) {
        self.actions.delivered.push(payload.to_vec());
    }

    fn log(&mut self, message: &str) {
        debug!("{message}");
    }

    fn now(&self) -> u64 {
        self.now_ms
    }
}

/// Apply one callback's buffered effects: update the timer table and put
/// outbound frames on the wire. A failed send is logged and treated as a
/// lost packet; the retransmission logic recovers it.
async fn flush(
    actions: HostActions,
    transport: &UdpTransport,
    peer: SocketAddr,
    timers: &mut TimerTable,
    delivered: &mut Vec<Vec<u8>>,
) {
    for timer_id in actions.timers_cancel {
        timers.cancel(timer_id);
    }
    for (delay_ms, timer_id) in actions.timers_start {
        timers.start(timer_id, Duration::from_millis(delay_ms));
    }
    for payload in actions.delivered {
        info!("delivered {} bytes to application", payload.len());
        delivered.push(payload);
    }
    for frame in actions.outgoing {
        if let Err(err) = transport.send(&frame, peer).await {
            warn!("send failed, treating frame as lost: {err}");
        }
    }
}

fn dispatch<F>(endpoint: &mut dyn ArqEndpoint, started: Instant, callback: F) -> HostActions
where
    F: FnOnce(&mut dyn ArqEndpoint, &mut dyn ArqContext),
{
    let mut actions = HostActions::default();
    {
        let mut ctx = HostContext {
            actions: &mut actions,
            now_ms: started.elapsed().as_millis() as u64,
        };
        callback(endpoint, &mut ctx);
    }
    actions
}

fn next_wait(timers: &TimerTable) -> Duration {
    timers.until_next().unwrap_or(STOP_POLL).min(STOP_POLL)
}

/// Drive a sender endpoint until every admitted payload is acknowledged or
/// the stop signal fires. `messages` is the fixed application stream.
pub async fn run_sender(
    endpoint: &mut dyn ArqEndpoint,
    transport: &UdpTransport,
    peer: SocketAddr,
    messages: Vec<Vec<u8>>,
    stop: watch::Receiver<bool>,
) -> Result<(), TransportError> {
    let started = Instant::now();
    let mut timers = TimerTable::new();
    let mut delivered = Vec::new();

    let actions = dispatch(endpoint, started, |e, ctx| e.init(ctx));
    flush(actions, transport, peer, &mut timers, &mut delivered).await;

    for message in messages {
        let actions = dispatch(endpoint, started, |e, ctx| e.on_app_data(ctx, &message));
        flush(actions, transport, peer, &mut timers, &mut delivered).await;
    }

    while !endpoint.is_complete() {
        if *stop.borrow() {
            info!("sender stopping on request");
            break;
        }

        match transport.recv_deadline(Some(next_wait(&timers))).await {
            Ok(RecvOutcome::Frame(frame, from)) => {
                if from != peer {
                    warn!("ignoring frame from unexpected peer {from}");
                    continue;
                }
                let actions = dispatch(endpoint, started, |e, ctx| e.on_frame(ctx, frame));
                flush(actions, transport, peer, &mut timers, &mut delivered).await;
            }
            Ok(RecvOutcome::Timeout) => {
                for timer_id in timers.take_expired() {
                    let actions = dispatch(endpoint, started, |e, ctx| e.on_timer(ctx, timer_id));
                    flush(actions, transport, peer, &mut timers, &mut delivered).await;
                }
            }
            Err(err) => {
                // Treated as "no data arrived"; the timers recover.
                warn!("receive failed: {err}");
            }
        }
    }

    info!("sender done: all packets acknowledged");
    Ok(())
}

/// Drive a receiver endpoint until the fixed transfer completes or the stop
/// signal fires. Returns the payloads delivered to the application, in
/// order. `loss` simulates drops on inbound datagrams before the protocol
/// sees them.
pub async fn run_receiver(
    endpoint: &mut dyn ArqEndpoint,
    transport: &UdpTransport,
    peer: SocketAddr,
    mut loss: LossSimulator,
    stop: watch::Receiver<bool>,
) -> Result<Vec<Vec<u8>>, TransportError> {
    let started = Instant::now();
    let mut timers = TimerTable::new();
    let mut delivered = Vec::new();

    let actions = dispatch(endpoint, started, |e, ctx| e.init(ctx));
    flush(actions, transport, peer, &mut timers, &mut delivered).await;

    while !endpoint.is_complete() {
        if *stop.borrow() {
            info!("receiver stopping on request");
            break;
        }

        match transport.recv_deadline(Some(next_wait(&timers))).await {
            Ok(RecvOutcome::Frame(frame, from)) => {
                if from != peer {
                    warn!("ignoring frame from unexpected peer {from}");
                    continue;
                }
                if loss.should_drop() {
                    info!("simulated loss: dropping seq={}", frame.seq());
                    continue;
                }
                let actions = dispatch(endpoint, started, |e, ctx| e.on_frame(ctx, frame));
                flush(actions, transport, peer, &mut timers, &mut delivered).await;
            }
            Ok(RecvOutcome::Timeout) => {
                for timer_id in timers.take_expired() {
                    let actions = dispatch(endpoint, started, |e, ctx| e.on_timer(ctx, timer_id));
                    flush(actions, transport, peer, &mut timers, &mut delivered).await;
                }
            }
            Err(err) => {
                warn!("receive failed: {err}");
            }
        }
    }

    info!("receiver done: {} payloads delivered", delivered.len());
    Ok(delivered)
}
