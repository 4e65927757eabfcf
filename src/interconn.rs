use crate::address;

/// Operations the LLC drives onto the system bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum BusOp {
    Read,
    Write,
    Invalidate,
    /// Read with intent to modify.
    Rwim,
}

/// Replies on the snoop lines: held clean, held modified, or not held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SnoopResult {
    NoHit,
    Hit,
    HitM,
}

/// Inclusion control messages sent up to the private L1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum L1Message {
    /// Request the freshest copy of a modified line.
    GetLine,
    /// Hand the requested line to L1.
    SendLine,
    /// The line left the LLC, L1 must drop it too.
    EvictLine,
    /// The line lost write permission or validity.
    InvalidateLine,
}

/// Bridge between the LLC and its external collaborators: the system bus
/// toward peer caches and memory, and the inclusion channel toward L1.
///
/// Everything except `get_snoop_result` is outbound and side-effect only.
/// The trait is the seam that lets tests swap the address-bit snoop stub
/// for a recording oracle.
pub trait Interconnect {
    fn bus_operation(&mut self, op: BusOp, addr: address);

    fn get_snoop_result(&mut self, addr: address) -> SnoopResult;

    fn put_snoop_result(&mut self, addr: address, result: SnoopResult);

    fn message_to_cache(&mut self, msg: L1Message, addr: address);
}

/// Deterministic snoop response derived from the two address LSBs:
/// `00` HIT, `01` HITM, otherwise NOHIT.
#[inline]
#[must_use]
pub fn snoop_stub(addr: address) -> SnoopResult {
    match addr & 0b11 {
        0b00 => SnoopResult::Hit,
        0b01 => SnoopResult::HitM,
        _ => SnoopResult::NoHit,
    }
}

/// Default bridge: emits every outbound record on the verbose stream and
/// answers snoop queries from the address-bit stub.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggedInterconnect;

impl Interconnect for LoggedInterconnect {
    fn bus_operation(&mut self, op: BusOp, addr: address) {
        log::info!("BusOp: {op}, Address: {addr:#010x}");
    }

    fn get_snoop_result(&mut self, addr: address) -> SnoopResult {
        let result = snoop_stub(addr);
        log::debug!("GetSnoopResult: Address: {addr:#010x}, Snoop Result: {result}");
        result
    }

    fn put_snoop_result(&mut self, addr: address, result: SnoopResult) {
        log::info!("SnoopResult: Address: {addr:#010x}, SnoopResult: {result}");
    }

    fn message_to_cache(&mut self, msg: L1Message, addr: address) {
        log::info!("L2: {msg}, Address: {addr:#010x}");
    }
}
