pub mod area;
pub mod config;
pub mod error;
pub mod flood;
pub mod ident;
pub mod inst;
pub mod link;
pub mod lsa;
pub mod lsdb;
pub mod neigh;
pub mod network;
pub mod nfsm;
pub mod packet;
pub mod rxmt;
pub mod show;
pub mod task;
pub mod tracing;

pub use area::OspfArea;
pub use config::{OspfConfig, OspfLinkConfig, RelayChangePolicy};
pub use error::OspfError;
pub use ident::Identity;
pub use inst::{Message, Ospf, OspfNotify};
pub use link::{LinkType, OspfLink};
pub use lsa::{Lsa, LsaKey, LsaVersion};
pub use lsdb::{Lsdb, LsdbOutcome, RejectReason};
pub use neigh::Neighbor;
pub use network::{ChannelTransport, Outbound, QueueTransport, Transport};
pub use nfsm::{NfsmEvent, NfsmState};
pub use rxmt::LsRetransmit;
pub use task::{ManualTimers, TimerHandle, TimerKind, TimerService, TimerToken, TokioTimers};
pub use crate::tracing::OspfTracing;
