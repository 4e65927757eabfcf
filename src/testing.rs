use crate::address;
use crate::interconn::{snoop_stub, BusOp, Interconnect, L1Message, SnoopResult};

/// One observable interaction with the outside world, in program order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Bus(BusOp, address),
    SnoopQuery(address, SnoopResult),
    SnoopReply(address, SnoopResult),
    L1(L1Message, address),
}

/// Interconnect that records every interaction so tests can assert on the
/// exact sequence of side effects. Snoop queries are still answered by the
/// deterministic address-bit stub.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl Recorder {
    #[must_use]
    pub fn bus_ops(&self) -> Vec<(BusOp, address)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Bus(op, addr) => Some((*op, *addr)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn l1_messages(&self) -> Vec<(L1Message, address)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::L1(msg, addr) => Some((*msg, *addr)),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn snoop_replies(&self) -> Vec<(address, SnoopResult)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::SnoopReply(addr, result) => Some((*addr, *result)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Interconnect for Recorder {
    fn bus_operation(&mut self, op: BusOp, addr: address) {
        self.events.push(Event::Bus(op, addr));
    }

    fn get_snoop_result(&mut self, addr: address) -> SnoopResult {
        let result = snoop_stub(addr);
        self.events.push(Event::SnoopQuery(addr, result));
        result
    }

    fn put_snoop_result(&mut self, addr: address, result: SnoopResult) {
        self.events.push(Event::SnoopReply(addr, result));
    }

    fn message_to_cache(&mut self, msg: L1Message, addr: address) {
        self.events.push(Event::L1(msg, addr));
    }
}
