use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// Router identity as seen on one link: our own on the interface, or the
/// neighbor's as learned from its Hello.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Identity {
    pub prefix: Ipv4Net,
    pub router_id: Ipv4Addr,
    pub d_router: Ipv4Addr,
    pub bd_router: Ipv4Addr,
    pub priority: u8,
}

impl Identity {
    pub fn new(router_id: Ipv4Addr) -> Self {
        Self {
            prefix: Ipv4Net::default(),
            router_id,
            d_router: Ipv4Addr::UNSPECIFIED,
            bd_router: Ipv4Addr::UNSPECIFIED,
            priority: 1,
        }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.prefix.addr()
    }

    pub fn is_declared_dr(&self) -> bool {
        !self.d_router.is_unspecified() && self.prefix.addr() == self.d_router
    }

    pub fn is_declared_bdr(&self) -> bool {
        !self.bd_router.is_unspecified() && self.prefix.addr() == self.bd_router
    }

    pub fn is_dr_or_bdr(&self) -> bool {
        self.is_declared_dr() || self.is_declared_bdr()
    }

    pub fn has_dr(&self) -> bool {
        !self.d_router.is_unspecified()
    }
}
