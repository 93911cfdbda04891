use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::OspfError;
use crate::link::LinkType;
use crate::lsa::MAX_AGE;

/// What an election result does to adjacencies that are no longer required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RelayChangePolicy {
    /// Bring up newly required adjacencies and tear down unneeded ones.
    #[default]
    Reevaluate,
    /// Bring up newly required adjacencies, keep established ones.
    KeepEstablished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OspfConfig {
    pub router_id: Ipv4Addr,
    pub hello_interval: u16,
    pub dead_interval: u32,
    pub rxmt_interval: u16,
    pub transmit_delay: u16,
    pub ack_delay: u16,
    pub mtu: u16,
    pub priority: u8,
    pub ls_refresh_time: u16,
    pub relay_change: RelayChangePolicy,
}

impl Default for OspfConfig {
    fn default() -> Self {
        Self {
            router_id: Ipv4Addr::UNSPECIFIED,
            hello_interval: 10,
            dead_interval: 40,
            rxmt_interval: 5,
            transmit_delay: 1,
            ack_delay: 1,
            mtu: 1500,
            priority: 1,
            ls_refresh_time: 1800,
            relay_change: RelayChangePolicy::default(),
        }
    }
}

impl OspfConfig {
    pub fn new(router_id: Ipv4Addr) -> Self {
        Self {
            router_id,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), OspfError> {
        if self.router_id.is_unspecified() {
            return Err(OspfError::config("router-id must be set"));
        }
        check_intervals(self.hello_interval, self.dead_interval, self.rxmt_interval)?;
        if self.ls_refresh_time == 0 || self.ls_refresh_time >= MAX_AGE {
            return Err(OspfError::config(format!(
                "ls-refresh-time {} must be between 1 and {}",
                self.ls_refresh_time,
                MAX_AGE - 1
            )));
        }
        if self.ack_delay >= self.rxmt_interval {
            return Err(OspfError::config(
                "ack-delay must be shorter than rxmt-interval",
            ));
        }
        Ok(())
    }
}

fn check_intervals(hello: u16, dead: u32, rxmt: u16) -> Result<(), OspfError> {
    if hello == 0 {
        return Err(OspfError::config("hello-interval must be non zero"));
    }
    if dead <= hello as u32 {
        return Err(OspfError::config(format!(
            "dead-interval {dead} must exceed hello-interval {hello}"
        )));
    }
    if rxmt == 0 {
        return Err(OspfError::config("rxmt-interval must be non zero"));
    }
    Ok(())
}

/// Per interface configuration. Unset values fall back to `OspfConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OspfLinkConfig {
    pub ifindex: u32,
    pub name: String,
    pub area: Ipv4Addr,
    pub prefix: Ipv4Net,
    #[serde(default)]
    pub link_type: LinkType,
    #[serde(default)]
    pub hello_interval: Option<u16>,
    #[serde(default)]
    pub dead_interval: Option<u32>,
    #[serde(default)]
    pub rxmt_interval: Option<u16>,
    #[serde(default)]
    pub transmit_delay: Option<u16>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub mtu: Option<u16>,
    /// Static neighbors for NBMA and virtual links.
    #[serde(default)]
    pub neighbors: Vec<Ipv4Addr>,
}

impl OspfLinkConfig {
    pub fn new(
        ifindex: u32,
        name: &str,
        area: Ipv4Addr,
        prefix: Ipv4Net,
        link_type: LinkType,
    ) -> Self {
        Self {
            ifindex,
            name: name.to_string(),
            area,
            prefix,
            link_type,
            hello_interval: None,
            dead_interval: None,
            rxmt_interval: None,
            transmit_delay: None,
            priority: None,
            mtu: None,
            neighbors: Vec::new(),
        }
    }

    pub fn validate(&self, config: &OspfConfig) -> Result<(), OspfError> {
        check_intervals(
            self.hello_interval.unwrap_or(config.hello_interval),
            self.dead_interval.unwrap_or(config.dead_interval),
            self.rxmt_interval.unwrap_or(config.rxmt_interval),
        )
        .map_err(|err| OspfError::config(format!("{}: {}", self.name, err)))?;
        if self.link_type == LinkType::Virtual && !self.area.is_unspecified() {
            return Err(OspfError::config(format!(
                "{}: virtual links belong to the backbone",
                self.name
            )));
        }
        Ok(())
    }
}
