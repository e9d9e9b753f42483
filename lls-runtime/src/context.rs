use crate::addr::ProtocolAddr;
use crate::aging::AgingScheduler;
use crate::cache::{Cache, CacheEvent, CacheReader, Lookup, Resolution};
use crate::channel::{mod_channel, HolderId, ModReceiver, ModRequest, ModSender};
use crate::config::{CacheConfig, LlsConfig};
use crate::error::LlsError;
use crate::interface::{Interfaces, PortAnnotated, PortId};
use crate::io::PacketIo;
use crate::lifecycle::Lifecycle;
use crate::processor::Processor;
use crate::protocol::{Arp, Nd, ProtocolHandler, ResolutionProtocol};
use crate::transmitter::{RequestTransmitter, RetryPolicy};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use lls_packets::EthernetFrame;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A worker core's view of one family: lock-free lookups, hold and release requests, and the
/// notices resolving its holds.
pub struct LlsHandle<A: ProtocolAddr> {
    holder: HolderId,
    reader: CacheReader<A>,
    requests: ModSender<A>,
    notices: Receiver<Resolution<A>>,
}

impl<A: ProtocolAddr> LlsHandle<A> {
    pub fn holder(&self) -> HolderId {
        self.holder
    }

    pub fn lookup(&self, addr: &A) -> Lookup<A> {
        self.reader.lookup(addr)
    }

    /// Asks the owner to resolve `addr` out `port` and keep it fresh until released.
    pub fn hold(&self, addr: A, port: PortId) -> Result<(), LlsError> {
        self.requests.submit(ModRequest::Hold {
            addr,
            holder: self.holder,
            port,
        })
    }

    pub fn release(&self, addr: A) -> Result<(), LlsError> {
        self.requests.submit(ModRequest::Release {
            addr,
            holder: self.holder,
        })
    }

    pub fn notices(&self) -> &Receiver<Resolution<A>> {
        &self.notices
    }

    pub fn try_notice(&self) -> Option<Resolution<A>> {
        self.notices.try_recv().ok()
    }
}

/// Everything the owning core keeps for one protocol family.
pub struct Family<P: ResolutionProtocol> {
    cache: Cache<P::Addr>,
    requests: ModReceiver<P::Addr>,
    submit: ModSender<P::Addr>,
    handler: ProtocolHandler<P>,
    transmitter: RequestTransmitter<P>,
    holders: HashMap<HolderId, Sender<Resolution<P::Addr>>>,
    notice_capacity: usize,
}

impl<P: ResolutionProtocol> Family<P> {
    fn new(
        protocol: P,
        cache_config: CacheConfig,
        config: &LlsConfig,
        interfaces: &Interfaces,
        lifecycle: &Lifecycle,
    ) -> Result<Self, LlsError> {
        let retry = RetryPolicy::new(config.max_attempts, config.retry_interval);
        let cache = Cache::new(P::FAMILY, cache_config, retry)?;
        let (submit, requests) = mod_channel(config.mod_channel_capacity);
        Ok(Family {
            cache,
            requests,
            handler: ProtocolHandler::new(
                protocol.clone(),
                interfaces.clone(),
                submit.clone(),
                lifecycle.clone(),
            ),
            transmitter: RequestTransmitter::new(protocol, interfaces.clone()),
            submit,
            holders: HashMap::new(),
            notice_capacity: config.notice_capacity,
        })
    }

    pub fn cache(&self) -> &Cache<P::Addr> {
        &self.cache
    }

    pub fn reader(&self) -> CacheReader<P::Addr> {
        self.cache.reader()
    }

    pub fn transmitter(&self) -> &RequestTransmitter<P> {
        &self.transmitter
    }

    /// A producer end of the modification channel, for cores that only submit.
    pub fn sender(&self) -> ModSender<P::Addr> {
        self.submit.clone()
    }

    /// Registers `holder` and returns its handle. Registering again replaces the notice queue.
    pub fn handle(&mut self, holder: HolderId) -> LlsHandle<P::Addr> {
        let (tx, notices) = channel::bounded(self.notice_capacity);
        self.holders.insert(holder, tx);
        LlsHandle {
            holder,
            reader: self.cache.reader(),
            requests: self.submit.clone(),
            notices,
        }
    }

    /// Applies up to `batch` queued requests.
    fn drain<I: PacketIo>(&mut self, io: &mut I, batch: usize, now: Instant) -> usize {
        let requests: Vec<ModRequest<P::Addr>> = self.requests.drain(batch).collect();
        let applied = requests.len();
        for req in requests {
            match self.cache.apply(req, now) {
                Ok(events) => self.dispatch(io, events),
                Err(err) => {
                    warn!(family = P::FAMILY, addr = %req.addr(), %err, "request not applied");
                    if let ModRequest::Hold { addr, holder, .. } = req {
                        self.notify(holder, Resolution::Failed(addr));
                    }
                }
            }
        }
        applied
    }

    fn receive<I: PacketIo>(&mut self, io: &mut I, packet: PortAnnotated<EthernetFrame>) {
        if let Some(reply) = self.handler.process(packet) {
            let PortAnnotated {
                packet,
                port,
                queue,
            } = reply;
            // a reply lives in the received buffer, not one from alloc
            if io.tx_burst(port, queue, &mut vec![packet]) == 0 {
                warn!(family = P::FAMILY, port, "reply not transmitted");
            }
        }
    }

    fn age<I: PacketIo>(&mut self, io: &mut I, aging: &AgingScheduler, now: Instant) {
        let events = aging.sweep(&mut self.cache, now);
        self.dispatch(io, events);
    }

    fn dispatch<I: PacketIo>(&mut self, io: &mut I, events: Vec<CacheEvent<P::Addr>>) {
        for event in events {
            match event {
                CacheEvent::Resolve { addr, port, dest } => {
                    self.transmitter.send(io, port, addr, dest);
                }
                CacheEvent::Notify { holder, notice } => self.notify(holder, notice),
            }
        }
    }

    fn notify(&mut self, holder: HolderId, notice: Resolution<P::Addr>) {
        let sender = match self.holders.get(&holder) {
            Some(sender) => sender,
            None => {
                debug!(family = P::FAMILY, ?holder, "notice for unregistered holder");
                return;
            }
        };
        match sender.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(family = P::FAMILY, ?holder, "notice queue full, notice dropped");
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(family = P::FAMILY, ?holder, "holder went away");
                self.holders.remove(&holder);
            }
        }
    }

    fn log_dump(&self) {
        let dump = self.cache.dump();
        info!(family = dump.family, entries = dump.records.len(), "cache dump");
        for record in &dump.records {
            info!(family = dump.family, "{}", record);
        }
    }
}

/// State of the owning core: both resolution families, the interfaces they serve, the packet
/// I/O layer, and the timers driving aging and dumps.
pub struct LlsContext<I: PacketIo> {
    config: LlsConfig,
    io: I,
    inbound: Receiver<PortAnnotated<EthernetFrame>>,
    arp: Family<Arp>,
    nd: Family<Nd>,
    aging: AgingScheduler,
    next_dump: Option<Instant>,
    lifecycle: Lifecycle,
}

impl<I: PacketIo> LlsContext<I> {
    /// Validates `config` and builds both caches. Errors here are setup failures.
    pub fn new(
        config: LlsConfig,
        interfaces: Interfaces,
        io: I,
        inbound: Receiver<PortAnnotated<EthernetFrame>>,
        lifecycle: Lifecycle,
    ) -> Result<Self, LlsError> {
        config.validate()?;
        let arp = Family::new(Arp, config.arp.clone(), &config, &interfaces, &lifecycle)?;
        let nd = Family::new(Nd, config.nd.clone(), &config, &interfaces, &lifecycle)?;
        let now = lifecycle.now();

        Ok(LlsContext {
            aging: AgingScheduler::new(config.aging_interval, now),
            next_dump: config.dump_interval.map(|interval| now + interval),
            config,
            io,
            inbound,
            arp,
            nd,
            lifecycle,
        })
    }

    pub fn arp(&self) -> &Family<Arp> {
        &self.arp
    }

    pub fn arp_mut(&mut self) -> &mut Family<Arp> {
        &mut self.arp
    }

    pub fn nd(&self) -> &Family<Nd> {
        &self.nd
    }

    pub fn nd_mut(&mut self) -> &mut Family<Nd> {
        &mut self.nd
    }

    pub fn io(&self) -> &I {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut I {
        &mut self.io
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Lookup handles for `holder` in both families.
    pub fn register(&mut self, holder: HolderId) -> (LlsHandle<Ipv4Addr>, LlsHandle<Ipv6Addr>) {
        (self.arp.handle(holder), self.nd.handle(holder))
    }

    /// One iteration of the owning core's loop: apply queued requests, handle arrived protocol
    /// packets, then run the aging sweep and the dump when they are due. Never blocks.
    /// Returns how many requests and packets were processed.
    pub fn poll(&mut self, now: Instant) -> usize {
        let batch = self.config.drain_batch;
        let mut work = self.arp.drain(&mut self.io, batch, now);
        work += self.nd.drain(&mut self.io, batch, now);

        for packet in self.inbound.try_iter().take(self.config.rx_burst) {
            work += 1;
            match packet.packet.ether_type() {
                Arp::ETHER_TYPE => self.arp.receive(&mut self.io, packet),
                Nd::ETHER_TYPE => self.nd.receive(&mut self.io, packet),
                other => {
                    debug!(port = packet.port, ether_type = other, "not a resolution frame");
                }
            }
        }

        if self.aging.due(now) {
            self.arp.age(&mut self.io, &self.aging, now);
            self.nd.age(&mut self.io, &self.aging, now);
            self.aging.tick(now);
        }

        if let (Some(due), Some(interval)) = (self.next_dump, self.config.dump_interval) {
            if now >= due {
                self.dump();
                self.next_dump = Some(now + interval);
            }
        }
        work
    }

    /// Logs both caches, one line per entry.
    pub fn dump(&self) {
        self.arp.log_dump();
        self.nd.log_dump();
    }
}
