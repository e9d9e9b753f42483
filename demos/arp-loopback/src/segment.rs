use crossbeam::crossbeam_channel::{Receiver, Sender};
use lls_packets::{ArpEndpoint, ArpFrame, ArpOp, EthernetFrame, MacAddr};
use lls_runtime::interface::PortAnnotated;
use lls_runtime::io::BufferBudget;
use std::convert::TryFrom;
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// A host on the simulated LAN segment.
#[derive(Clone, Copy, Debug)]
pub struct Host {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

impl Host {
    pub fn numbered(n: u8) -> Self {
        Host {
            ip: Ipv4Addr::new(10, 0, 0, 10 + n),
            mac: MacAddr::new([0x52, 0x54, 0, 0, 0, n]),
        }
    }
}

impl From<Host> for ArpEndpoint {
    fn from(host: Host) -> Self {
        ArpEndpoint {
            mac: host.mac,
            ip: host.ip,
        }
    }
}

/// Asks the gateway for its own address, as a host joining the segment would.
pub fn ask_gateway(host: Host, gateway: Ipv4Addr) -> EthernetFrame {
    let gateway = ArpEndpoint {
        mac: MacAddr::ZERO,
        ip: gateway,
    };
    ArpFrame::build(Vec::new(), None, ArpOp::Request as u16, host.into(), gateway).frame()
}

/// Plays every host on the segment: frames the gateway transmits arrive on `wire`, and answers
/// go back through `inbound`. Returns once the gateway's side of the wire is gone.
pub fn run(
    wire: Receiver<PortAnnotated<EthernetFrame>>,
    inbound: Sender<PortAnnotated<EthernetFrame>>,
    budget: BufferBudget,
    hosts: Vec<Host>,
) -> usize {
    let mut answered = 0;
    for sent in wire.iter() {
        let (port, queue) = (sent.port, sent.queue);
        let arp = match ArpFrame::try_from(sent.packet) {
            Ok(arp) => arp,
            Err(err) => {
                debug!(err, "not an ARP frame");
                continue;
            }
        };

        if arp.operation() != Some(ArpOp::Request) {
            info!(to = %arp.target().ip, "gateway answered");
            continue;
        }
        // requests are the only frames the gateway allocates
        budget.give_back();

        let wanted = arp.target().ip;
        let host = match hosts.iter().find(|h| h.ip == wanted) {
            Some(host) => *host,
            None => {
                debug!(%wanted, "nobody home");
                continue;
            }
        };

        let mut reply = arp;
        reply.answer(host.into());
        let reply = reply.frame();
        if inbound
            .send(PortAnnotated {
                packet: reply,
                port,
                queue,
            })
            .is_err()
        {
            break;
        }
        answered += 1;
    }
    answered
}
