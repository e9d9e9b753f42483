/// Interfaces and constants shared by the tests of every module.
pub mod harness;

/// PacketIo doubles that keep what was transmitted.
pub mod packet_collectors;
