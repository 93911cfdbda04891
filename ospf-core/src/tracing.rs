// OSPF conditional tracing.
//
// Every category can be switched on independently so that an operator can
// follow a single adjacency or a single packet type without drowning in the
// rest of the protocol chatter.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

// Main OSPF tracing configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfTracing {
    // Enable all OSPF tracing
    pub all: bool,
    pub packet: PacketTracing,
    pub event: EventTracing,
    pub fsm: FsmTracing,
    pub database: DatabaseTracing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketTracing {
    pub hello: PacketConfig,
    pub dd: PacketConfig,
    pub ls_req: PacketConfig,
    pub ls_update: PacketConfig,
    pub ls_ack: PacketConfig,
    pub all: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketConfig {
    pub enabled: bool,
    pub direction: PacketDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacketDirection {
    Send,
    Recv,
    #[default]
    Both,
}

impl PacketDirection {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PacketDirection::Send => "Send",
            PacketDirection::Recv => "Receive",
            PacketDirection::Both => "Both",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventTracing {
    pub lsa_originate: bool,
    pub lsa_refresh: bool,
    pub lsa_flush: bool,
    pub flooding: bool,
    pub retransmit: bool,
    pub adjacency: bool,
    pub all: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FsmTracing {
    pub nfsm: FsmConfig,
    pub all: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FsmConfig {
    pub enabled: bool,
    pub detail: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseTracing {
    pub lsdb: bool,
    pub aging: bool,
    pub all: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Display)]
pub enum PacketType {
    #[strum(serialize = "hello")]
    Hello,
    #[strum(serialize = "dd")]
    Dd,
    #[strum(serialize = "ls-request")]
    LsRequest,
    #[strum(serialize = "ls-update")]
    LsUpdate,
    #[strum(serialize = "ls-ack")]
    LsAck,
}

#[derive(Debug, Clone, Copy, PartialEq, Display)]
pub enum EventType {
    LsaOriginate,
    LsaRefresh,
    LsaFlush,
    Flooding,
    Retransmit,
    Adjacency,
}

#[derive(Debug, Clone, Copy, PartialEq, Display)]
pub enum FsmType {
    Nfsm,
}

#[derive(Debug, Clone, Copy, PartialEq, Display)]
pub enum DatabaseType {
    Lsdb,
    Aging,
}

impl OspfTracing {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Default::default()
        }
    }

    pub fn should_trace_packet(&self, packet_type: PacketType, direction: PacketDirection) -> bool {
        if self.all || self.packet.all {
            return true;
        }
        let config = match packet_type {
            PacketType::Hello => &self.packet.hello,
            PacketType::Dd => &self.packet.dd,
            PacketType::LsRequest => &self.packet.ls_req,
            PacketType::LsUpdate => &self.packet.ls_update,
            PacketType::LsAck => &self.packet.ls_ack,
        };
        if !config.enabled {
            return false;
        }
        config.direction == PacketDirection::Both || config.direction == direction
    }

    pub fn should_trace_event(&self, event_type: EventType) -> bool {
        if self.all || self.event.all {
            return true;
        }
        match event_type {
            EventType::LsaOriginate => self.event.lsa_originate,
            EventType::LsaRefresh => self.event.lsa_refresh,
            EventType::LsaFlush => self.event.lsa_flush,
            EventType::Flooding => self.event.flooding,
            EventType::Retransmit => self.event.retransmit,
            EventType::Adjacency => self.event.adjacency,
        }
    }

    pub fn should_trace_fsm(&self, fsm_type: FsmType, detail: bool) -> bool {
        if self.all || self.fsm.all {
            return true;
        }
        let config = match fsm_type {
            FsmType::Nfsm => &self.fsm.nfsm,
        };
        config.enabled && (!detail || config.detail)
    }

    pub fn should_trace_database(&self, db_type: DatabaseType) -> bool {
        if self.all || self.database.all {
            return true;
        }
        match db_type {
            DatabaseType::Lsdb => self.database.lsdb,
            DatabaseType::Aging => self.database.aging,
        }
    }
}

// Log an info-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_info {
    ($($arg:tt)*) => {
        ::tracing::info!(proto = "ospf", $($arg)*)
    };
}

// Log a warning-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_warn {
    ($($arg:tt)*) => {
        ::tracing::warn!(proto = "ospf", $($arg)*)
    };
}

// Log an error-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_error {
    ($($arg:tt)*) => {
        ::tracing::error!(proto = "ospf", $($arg)*)
    };
}

// Log a debug-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_debug {
    ($($arg:tt)*) => {
        ::tracing::debug!(proto = "ospf", $($arg)*)
    };
}

// Log a trace-level message with proto="ospf" field
#[macro_export]
macro_rules! ospf_trace {
    ($($arg:tt)*) => {
        ::tracing::trace!(proto = "ospf", $($arg)*)
    };
}

// Conditional packet tracing macro
#[macro_export]
macro_rules! ospf_packet_trace {
    ($tracing:expr, $packet_type:ident, $direction:ident, $($arg:tt)*) => {
        if $tracing.should_trace_packet(
            $crate::tracing::PacketType::$packet_type,
            $crate::tracing::PacketDirection::$direction,
        ) {
            ::tracing::info!(
                proto = "ospf",
                category = "packet",
                packet_type = %$crate::tracing::PacketType::$packet_type,
                direction = $crate::tracing::PacketDirection::$direction.as_str(),
                $($arg)*
            )
        }
    };
}

// Conditional event tracing macro
#[macro_export]
macro_rules! ospf_event_trace {
    ($tracing:expr, $event_type:ident, $($arg:tt)*) => {
        if $tracing.should_trace_event($crate::tracing::EventType::$event_type) {
            ::tracing::info!(
                proto = "ospf",
                category = "event",
                event_type = stringify!($event_type),
                $($arg)*
            )
        }
    };
}

// Conditional FSM tracing macro
#[macro_export]
macro_rules! ospf_fsm_trace {
    ($tracing:expr, $fsm_type:ident, $detail:expr, $($arg:tt)*) => {
        if $tracing.should_trace_fsm($crate::tracing::FsmType::$fsm_type, $detail) {
            ::tracing::info!(
                proto = "ospf",
                category = "fsm",
                fsm_type = stringify!($fsm_type),
                detail = $detail,
                $($arg)*
            )
        }
    };
}

// Conditional database tracing macro
#[macro_export]
macro_rules! ospf_database_trace {
    ($tracing:expr, $db_type:ident, $($arg:tt)*) => {
        if $tracing.should_trace_database($crate::tracing::DatabaseType::$db_type) {
            ::tracing::info!(
                proto = "ospf",
                category = "database",
                db_type = stringify!($db_type),
                $($arg)*
            )
        }
    };
}
