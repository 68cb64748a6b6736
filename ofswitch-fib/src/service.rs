//! FIB service actor
//!
//! One Tokio task owns the [`FibTable`] of a datapath. Packet observations,
//! port events, timer firings and queries all reach it as commands over a
//! bounded channel, so handlers never interleave. Idle timers fire into a
//! second channel of the same task.
//!
//! Flow resets caused by expiry or port-down are sent to the [`Datapath`]
//! from inside the task. A failed reset is logged and not retried.

use crate::config::FibConfig;
use crate::datapath::{Datapath, FlowResetContext};
use crate::entry::FibEntry;
use crate::table::{FibTable, Observation, TimerOutcome};
use crate::timer::{TimerTag, TokioTimers};
use ofswitch_core::{DatapathId, Error, MacAddr, PortNo, Result, VlanId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

enum Command {
    Observe {
        mac: MacAddr,
        vlan: VlanId,
        port: PortNo,
        reply: oneshot::Sender<Result<Observation>>,
    },
    PortUpdate {
        port: PortNo,
        is_up: bool,
        reply: oneshot::Sender<usize>,
    },
    TimerExpired {
        tag: TimerTag,
        reply: oneshot::Sender<bool>,
    },
    Lookup {
        mac: MacAddr,
        vlan: VlanId,
        reply: oneshot::Sender<Option<FibEntry>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<FibEntry>>,
    },
    Dump {
        reply: oneshot::Sender<String>,
    },
    Reset {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Cloneable handle to a running FIB service
#[derive(Debug, Clone)]
pub struct FibHandle {
    dpid: DatapathId,
    commands: mpsc::Sender<Command>,
}

impl FibHandle {
    pub fn dpid(&self) -> DatapathId {
        self.dpid
    }

    /// Whether the service task has stopped
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Learn or refresh `mac` on `vlan` behind `port`
    pub async fn observe(&self, mac: MacAddr, vlan: VlanId, port: PortNo) -> Result<Observation> {
        self.request(|reply| Command::Observe {
            mac,
            vlan,
            port,
            reply,
        })
        .await?
    }

    /// Deliver a port status change; returns the number of entries removed
    pub async fn port_update(&self, port: PortNo, is_up: bool) -> Result<usize> {
        self.request(|reply| Command::PortUpdate { port, is_up, reply })
            .await
    }

    /// Deliver a timer firing from an external event source
    ///
    /// Returns whether an entry expired; a stale tag yields `false`.
    pub async fn timer_expired(&self, tag: TimerTag) -> Result<bool> {
        self.request(|reply| Command::TimerExpired { tag, reply })
            .await
    }

    pub async fn lookup(&self, mac: MacAddr, vlan: VlanId) -> Result<Option<FibEntry>> {
        self.request(|reply| Command::Lookup { mac, vlan, reply })
            .await
    }

    pub async fn port_of(&self, mac: MacAddr, vlan: VlanId) -> Result<Option<PortNo>> {
        Ok(self.lookup(mac, vlan).await?.map(|entry| entry.port))
    }

    /// Copy of every entry, ordered by key
    pub async fn snapshot(&self) -> Result<Vec<FibEntry>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Printable dump of the table
    pub async fn dump(&self) -> Result<String> {
        self.request(|reply| Command::Dump { reply }).await
    }

    /// Drop every entry without touching the datapath
    pub async fn reset(&self) -> Result<usize> {
        self.request(|reply| Command::Reset { reply }).await
    }

    /// Stop the service; pending timers are cancelled
    pub async fn shutdown(&self) {
        // Already stopped is fine
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> Error {
        Error::ChannelClosed(format!("FIB service of datapath {} stopped", self.dpid))
    }
}

/// Task owning the FIB table of one datapath
pub struct FibService {
    table: FibTable,
    datapath: Arc<dyn Datapath>,
    commands: mpsc::Receiver<Command>,
    fired: mpsc::UnboundedReceiver<TimerTag>,
    dump_interval: Option<Duration>,
}

impl FibService {
    /// Start the service for `datapath`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(datapath: Arc<dyn Datapath>, config: &FibConfig) -> (FibHandle, JoinHandle<()>) {
        let dpid = datapath.dpid();
        let (command_tx, commands) = mpsc::channel(config.command_queue.max(1));
        let (fired_tx, fired) = mpsc::unbounded_channel();

        let service = FibService {
            table: FibTable::new(dpid, config.idle_timeout, TokioTimers::new(fired_tx)),
            datapath,
            commands,
            fired,
            dump_interval: config.dump_interval,
        };
        let task = tokio::spawn(service.run());

        info!(dpid = %dpid, idle_timeout = ?config.idle_timeout, "FIB service started");
        (
            FibHandle {
                dpid,
                commands: command_tx,
            },
            task,
        )
    }

    async fn run(mut self) {
        let mut dump = self
            .dump_interval
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command).await,
                },
                Some(tag) = self.fired.recv() => {
                    self.expire(tag).await;
                }
                _ = next_tick(&mut dump) => {
                    info!(dpid = %self.table.dpid(), entries = self.table.len(), "FIB dump\n{}", self.table);
                }
            }
        }

        let dropped = self.table.clear();
        info!(dpid = %self.table.dpid(), dropped, "FIB service stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Observe {
                mac,
                vlan,
                port,
                reply,
            } => {
                let result = self.table.observe(mac, vlan, port, Instant::now());
                let _ = reply.send(result);
            }
            Command::PortUpdate { port, is_up, reply } => {
                let removed = self.table.on_port_update(port, is_up);
                let count = removed.len();
                for entry in &removed {
                    let ctx = FlowResetContext::entry(self.table.dpid(), entry);
                    reset_flows(self.datapath.as_ref(), ctx).await;
                }
                let _ = reply.send(count);
            }
            Command::TimerExpired { tag, reply } => {
                let expired = self.expire(tag).await;
                let _ = reply.send(expired);
            }
            Command::Lookup { mac, vlan, reply } => {
                let _ = reply.send(self.table.lookup(mac, vlan).cloned());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.table.entries());
            }
            Command::Dump { reply } => {
                let _ = reply.send(self.table.to_string());
            }
            Command::Reset { reply } => {
                let _ = reply.send(self.table.clear());
            }
            // Handled by the run loop
            Command::Shutdown => {}
        }
    }

    async fn expire(&mut self, tag: TimerTag) -> bool {
        match self.table.on_timer_expired(tag) {
            TimerOutcome::Expired(entry) => {
                let ctx = FlowResetContext::entry(self.table.dpid(), &entry);
                reset_flows(self.datapath.as_ref(), ctx).await;
                true
            }
            TimerOutcome::Stale => false,
        }
    }
}

async fn reset_flows(datapath: &dyn Datapath, ctx: FlowResetContext) {
    match datapath.flow_mod_reset(ctx).await {
        Ok(()) => debug!(ctx = %ctx, "flows reset"),
        Err(e) => warn!(ctx = %ctx, error = %e, "flow-mod reset failed"),
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
