use std::fmt::{Display, Formatter, Result};

use super::*;

impl Display for Ospfv2Packet {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            r#"== OSPFv2 ==
 Type: {}
 Length: {}
 Router ID: {}
 Area ID: {}
 Checksum: {:x}
{}"#,
            self.typ, self.len, self.router_id, self.area_id, self.checksum, self.payload,
        )
    }
}

impl Display for Ospfv2Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        use Ospfv2Payload::*;
        match self {
            Hello(v) => write!(f, "{}", v),
            DbDesc(v) => write!(f, "{}", v),
            LsRequest(v) => write!(f, "{}", v),
            LsUpdate(v) => write!(f, "{}", v),
            LsAck(v) => write!(f, "{}", v),
        }
    }
}

impl Display for OspfHello {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            r#"== Hello ==
 Network mask: {}
 Hello interval: {}
 Options: {}
 Router priority: {}
 Router dead interval: {}
 DR: {}
 BDR: {}"#,
            self.netmask,
            self.hello_interval,
            self.options,
            self.priority,
            self.router_dead_interval,
            self.d_router,
            self.bd_router,
        )?;
        for nei in self.neighbors.iter() {
            write!(f, "\n Neighbor: {}", nei)?;
        }
        Ok(())
    }
}

impl Display for OspfOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let mut opts = Vec::new();
        if self.external() {
            opts.push("E");
        }
        if self.multicast() {
            opts.push("MC");
        }
        if self.nssa() {
            opts.push("N/P");
        }
        if self.demand_circuits() {
            opts.push("DC");
        }
        if self.o() {
            opts.push("O");
        }
        if self.dn() {
            opts.push("DN");
        }
        write!(f, "[{}]", opts.join("|"))
    }
}

impl Display for DbDescFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{}{}{}",
            if self.init() { "I" } else { "-" },
            if self.more() { "M" } else { "-" },
            if self.master() { "MS" } else { "-" },
        )
    }
}

impl Display for OspfDbDesc {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            r#"== Database Description ==
 Interface MTU: {}
 Options: {}
 Flags: {}
 DD sequence number: {}"#,
            self.if_mtu, self.options, self.flags, self.seqnum,
        )?;
        for h in self.lsa_headers.iter() {
            write!(f, "\n{}", h)?;
        }
        Ok(())
    }
}

impl Display for OspfLsRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "== LS Request ==")?;
        for req in self.reqs.iter() {
            write!(
                f,
                "\n Type: {} ID: {} Adv router: {}",
                req.ls_type, req.ls_id, req.adv_router
            )?;
        }
        Ok(())
    }
}

impl Display for OspfLsUpdate {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "== LS Update ==\n Number of LSAs: {}", self.lsas.len())?;
        for lsa in self.lsas.iter() {
            write!(f, "\n{}", lsa.h)?;
        }
        Ok(())
    }
}

impl Display for OspfLsAck {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "== LS Acknowledgment ==")?;
        for h in self.lsa_headers.iter() {
            write!(f, "\n{}", h)?;
        }
        Ok(())
    }
}

impl Display for OspfLsaHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            " LSA {} ID {} Adv {} Age {} Seq {:#010x} Checksum {:#06x} Length {}",
            self.ls_type,
            self.ls_id,
            self.adv_router,
            self.ls_age,
            self.ls_seq_number as u32,
            self.ls_checksum,
            self.length,
        )
    }
}
