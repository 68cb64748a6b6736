//! Forwarding information base for ofswitch datapaths
//!
//! This crate keeps the learned MAC/VLAN-to-port bindings of every
//! connected datapath and ages them out. It includes:
//!
//! - `FibTable`: the synchronous entry state machine (learn, refresh,
//!   idle expiry, port-down removal) with generation-tagged timers
//! - `FibService` / `FibHandle`: a Tokio actor owning one table
//! - `FibRegistry`: one service per datapath
//! - `LearningSwitch`: the packet-in policy built on top
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ofswitch_core::{DatapathId, MacAddr, VlanId};
//! use ofswitch_fib::{FibRegistry, RecordingDatapath};
//!
//! #[tokio::main]
//! async fn main() -> ofswitch_core::Result<()> {
//!     let registry = FibRegistry::default();
//!     let datapath = Arc::new(RecordingDatapath::new(DatapathId(1)));
//!
//!     let fib = registry.attach(datapath).await;
//!     let host = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
//!     fib.observe(host, VlanId::UNTAGGED, 3).await?;
//!     assert_eq!(fib.port_of(host, VlanId::UNTAGGED).await?, Some(3));
//!
//!     registry.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod datapath;
pub mod entry;
pub mod registry;
pub mod service;
pub mod switch;
pub mod table;
pub mod timer;

pub use config::FibConfig;
pub use datapath::{Datapath, FlowResetContext, RecordingDatapath, ResetScope};
pub use entry::{EntryId, EntryState, FibEntry, FibKey};
pub use registry::FibRegistry;
pub use service::{FibHandle, FibService};
pub use switch::{FlowRule, LearningSwitch, PacketAction};
pub use table::{FibTable, Observation, TimerOutcome};
pub use timer::{ManualTimers, TimerScheduler, TimerTag, TokioTimers};
