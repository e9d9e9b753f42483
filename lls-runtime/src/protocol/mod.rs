//! Inbound handling shared by every resolution protocol.
//!
//! A [`ResolutionProtocol`] knows one wire format: how to validate and read it, how to answer
//! a request, and how to ask for an address. [`ProtocolHandler`] runs the pipeline common to all
//! of them: interface checks, anti-spoofing, the unconditional learn, and reply selection.

mod arp;
pub use self::arp::Arp;

mod nd;
pub use self::nd::Nd;

use crate::addr::ProtocolAddr;
use crate::channel::{ModRequest, ModSender};
use crate::error::{DropReason, LlsError};
use crate::interface::{Interface, Interfaces, PortAnnotated};
use crate::lifecycle::Lifecycle;
use crate::processor::Processor;
use lls_packets::{EthernetFrame, MacAddr, PacketData};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Request,
    Reply,
    Unknown(u16),
}

/// A message that passed validation, with the typed frame kept for building the answer.
#[derive(Clone, Debug)]
pub struct Inbound<A, M> {
    pub sender: A,
    pub sender_mac: MacAddr,
    pub target: A,
    pub operation: Operation,
    pub message: M,
}

impl<A: ProtocolAddr, M> Inbound<A, M> {
    /// An unsolicited announcement of the sender's own mapping.
    pub fn is_gratuitous(&self) -> bool {
        self.sender == self.target
    }
}

pub trait ResolutionProtocol: Clone + Send + 'static {
    type Addr: ProtocolAddr;
    type Message: Send;

    /// Short name used in logs and dumps.
    const FAMILY: &'static str;
    /// Ether type of the frames this protocol travels in.
    const ETHER_TYPE: u16;

    /// Whether `iface` has an address of this family configured.
    fn configured(&self, iface: &Interface) -> bool;

    /// Checks the protocol header and reads out the sender and target.
    fn parse(
        &self,
        frame: EthernetFrame,
    ) -> Result<Inbound<Self::Addr, Self::Message>, DropReason>;

    /// Anti-spoofing: `sender` is on a prefix configured on `iface`.
    fn in_subnet(&self, iface: &Interface, sender: &Self::Addr) -> bool;

    /// `addr` is one of the addresses `iface` answers for.
    fn is_local(&self, iface: &Interface, addr: &Self::Addr) -> bool;

    /// Turns a request for one of our addresses into the answer.
    fn reply(
        &self,
        iface: &Interface,
        inbound: Inbound<Self::Addr, Self::Message>,
    ) -> Result<EthernetFrame, LlsError>;

    /// Lays out a request for `target` in `buffer`: unicast to `dest` when given, otherwise
    /// to everyone who could own `target`.
    fn request(
        &self,
        iface: &Interface,
        buffer: PacketData,
        target: Self::Addr,
        dest: Option<MacAddr>,
    ) -> Result<EthernetFrame, LlsError>;
}

/// Processes inbound protocol frames for one family on the owning core.
///
/// Each frame results in at most one learn submitted to the cache owner and at most one
/// frame handed back for transmission.
pub struct ProtocolHandler<P: ResolutionProtocol> {
    protocol: P,
    interfaces: Interfaces,
    learned: ModSender<P::Addr>,
    lifecycle: Lifecycle,
}

impl<P: ResolutionProtocol> ProtocolHandler<P> {
    pub fn new(
        protocol: P,
        interfaces: Interfaces,
        learned: ModSender<P::Addr>,
        lifecycle: Lifecycle,
    ) -> Self {
        ProtocolHandler {
            protocol,
            interfaces,
            learned,
            lifecycle,
        }
    }

    /// Runs the pipeline on one frame. A reply leaves on the port and queue the request
    /// came in on.
    pub fn handle(
        &self,
        packet: PortAnnotated<EthernetFrame>,
    ) -> Result<Option<PortAnnotated<EthernetFrame>>, DropReason> {
        let PortAnnotated {
            packet,
            port,
            queue,
        } = packet;

        let iface = self
            .interfaces
            .get(port)
            .ok_or(DropReason::UnknownPort(port))?;
        if !iface.enabled || !self.protocol.configured(iface) {
            return Err(DropReason::Disabled(port));
        }
        if !iface.verify_l2(&packet) {
            return Err(DropReason::L2Mismatch);
        }

        let inbound = self.protocol.parse(packet)?;
        if !self.protocol.in_subnet(iface, &inbound.sender) {
            return Err(DropReason::OffSubnet);
        }

        let learn = ModRequest::Learn {
            addr: inbound.sender,
            mac: inbound.sender_mac,
            port,
            ts: self.lifecycle.now(),
        };
        if let Err(err) = self.learned.submit(learn) {
            warn!(
                family = P::FAMILY,
                addr = %inbound.sender,
                %err,
                "could not submit learned mapping"
            );
        }

        match inbound.operation {
            Operation::Unknown(op) => Err(DropReason::UnknownOperation(op)),
            Operation::Reply => Ok(None),
            Operation::Request if inbound.is_gratuitous() => {
                debug!(family = P::FAMILY, addr = %inbound.sender, "gratuitous announcement");
                Ok(None)
            }
            Operation::Request if !self.protocol.is_local(iface, &inbound.target) => Ok(None),
            Operation::Request => match self.protocol.reply(iface, inbound) {
                Ok(packet) => Ok(Some(PortAnnotated {
                    packet,
                    port,
                    queue,
                })),
                Err(err) => {
                    warn!(family = P::FAMILY, iface = %iface.name, %err, "could not build reply");
                    Ok(None)
                }
            },
        }
    }
}

impl<P: ResolutionProtocol> Processor for ProtocolHandler<P> {
    type Input = PortAnnotated<EthernetFrame>;
    type Output = PortAnnotated<EthernetFrame>;

    fn process(&mut self, packet: Self::Input) -> Option<Self::Output> {
        let port = packet.port;
        match self.handle(packet) {
            Ok(reply) => reply,
            Err(reason) => {
                debug!(family = P::FAMILY, port, %reason, "dropped");
                None
            }
        }
    }
}
