/// A Processor takes one packet at a time and either hands back a packet to transmit or
/// consumes it. Processors run on the owning core and never block.
pub trait Processor {
    type Input: Send + Clone;
    type Output: Send + Clone;

    fn process(&mut self, packet: Self::Input) -> Option<Self::Output>;
}
