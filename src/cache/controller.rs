use super::{Cache, State};
use crate::config::{self, Config, InvalidatePolicy};
use crate::interconn::{BusOp, Interconnect, L1Message, SnoopResult};
use crate::trace::Command;
use crate::{address, Error};
use stats::Stats;
use std::io;

/// MESI coherence controller driving the tag store.
///
/// Each command runs to completion, including all bus and L1 side effects,
/// before the next one is read. The controller is the only writer of the
/// cache array and the statistics counters.
#[derive(Debug)]
pub struct Controller<I> {
    cache: Cache,
    stats: Stats,
    interconn: I,
    invalidate_policy: InvalidatePolicy,
}

impl<I: Interconnect> Controller<I> {
    pub fn new(config: &Config, interconn: I) -> Result<Self, config::Error> {
        Ok(Self {
            cache: Cache::new(config)?,
            stats: Stats::default(),
            interconn,
            invalidate_policy: config.invalidate_policy,
        })
    }

    #[must_use]
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    #[must_use]
    pub fn interconn(&self) -> &I {
        &self.interconn
    }

    /// Execute one trace command.
    pub fn execute<W: io::Write>(&mut self, command: Command, sink: &mut W) -> Result<(), Error> {
        match command {
            Command::Read(addr) | Command::InstrRead(addr) => self.processor_read(addr),
            Command::Write(addr) => self.processor_write(addr),
            Command::SnoopRead(addr) => self.snooped_read(addr),
            Command::SnoopWrite(addr) => {
                // a peer writing back: any copy we held was already
                // downgraded or invalidated by the snoop that caused it
                log::debug!("snooped write {addr:#010x} ignored");
                Ok(())
            }
            Command::SnoopRwim(addr) => self.snooped_rwim(addr),
            Command::SnoopInvalidate(addr) => self.snooped_invalidate(addr),
            Command::Clear => {
                self.clear();
                Ok(())
            }
            Command::Print => self.print(sink).map_err(Error::from),
        }
    }

    /// Commands 0 and 2. The LLC is unified, so data and instruction reads
    /// are the same operation.
    fn processor_read(&mut self, addr: address) -> Result<(), Error> {
        self.stats.record_read();
        if let Some((way, _)) = self.cache.lookup(addr)? {
            self.stats.record_hit();
            log::debug!("pr_read({addr:#010x}): hit way {way}");
            self.cache.touch(addr, way);
            self.interconn.message_to_cache(L1Message::SendLine, addr);
            return Ok(());
        }
        self.stats.record_miss();
        log::debug!("pr_read({addr:#010x}): miss");
        self.interconn.bus_operation(BusOp::Read, addr);
        let state = match self.interconn.get_snoop_result(addr) {
            SnoopResult::Hit => State::Shared,
            // a peer holding the line modified writes it back before our
            // install completes, leaving us the only holder
            SnoopResult::HitM | SnoopResult::NoHit => State::Exclusive,
        };
        self.fill(addr, state);
        self.interconn.message_to_cache(L1Message::SendLine, addr);
        Ok(())
    }

    /// Command 1.
    fn processor_write(&mut self, addr: address) -> Result<(), Error> {
        self.stats.record_write();
        if let Some((way, state)) = self.cache.lookup(addr)? {
            self.stats.record_hit();
            log::debug!("pr_write({addr:#010x}): hit way {way} in {state}");
            self.cache.touch(addr, way);
            match state {
                State::Modified => {}
                State::Exclusive => self.cache.set_state(addr, way, State::Modified),
                State::Shared => {
                    // upgrade: peers drop their copies, no snoop response
                    self.interconn.bus_operation(BusOp::Invalidate, addr);
                    self.cache.set_state(addr, way, State::Modified);
                }
                State::Invalid => return Err(hit_on_invalid(addr)),
            }
            self.interconn.message_to_cache(L1Message::SendLine, addr);
            return Ok(());
        }
        self.stats.record_miss();
        log::debug!("pr_write({addr:#010x}): miss");
        self.interconn.bus_operation(BusOp::Rwim, addr);
        // peers invalidate or flush on RWIM; the reply cannot change the
        // install state
        let _ = self.interconn.get_snoop_result(addr);
        self.fill(addr, State::Modified);
        self.interconn.message_to_cache(L1Message::SendLine, addr);
        Ok(())
    }

    /// Install a line after a miss, discharging inclusion for the victim:
    /// L1 is told to drop every line that leaves the LLC, and modified
    /// victims are written back.
    fn fill(&mut self, addr: address, state: State) {
        if let Some(victim) = self.cache.allocate(addr, state) {
            log::debug!("evicting {:#010x} in {}", victim.addr, victim.state);
            self.interconn
                .message_to_cache(L1Message::EvictLine, victim.addr);
            if victim.state == State::Modified {
                self.interconn.bus_operation(BusOp::Write, victim.addr);
            }
        }
    }

    /// Command 3. Snoops are not accesses: the PLRU tree never moves.
    fn snooped_read(&mut self, addr: address) -> Result<(), Error> {
        let Some((way, state)) = self.cache.lookup(addr)? else {
            self.interconn.put_snoop_result(addr, SnoopResult::NoHit);
            return Ok(());
        };
        match state {
            State::Modified => {
                self.interconn.put_snoop_result(addr, SnoopResult::HitM);
                self.writeback(addr);
                self.cache.set_state(addr, way, State::Shared);
            }
            State::Exclusive => {
                self.interconn.put_snoop_result(addr, SnoopResult::Hit);
                self.cache.set_state(addr, way, State::Shared);
            }
            State::Shared => self.interconn.put_snoop_result(addr, SnoopResult::Hit),
            State::Invalid => return Err(hit_on_invalid(addr)),
        }
        Ok(())
    }

    /// Command 5.
    fn snooped_rwim(&mut self, addr: address) -> Result<(), Error> {
        let Some((way, state)) = self.cache.lookup(addr)? else {
            return Ok(());
        };
        if state == State::Modified {
            self.writeback(addr);
        }
        self.interconn
            .message_to_cache(L1Message::InvalidateLine, addr);
        self.cache.invalidate(addr, way);
        Ok(())
    }

    /// Command 6.
    fn snooped_invalidate(&mut self, addr: address) -> Result<(), Error> {
        let Some((way, state)) = self.cache.lookup(addr)? else {
            return Ok(());
        };
        match state {
            State::Shared => {
                self.interconn
                    .message_to_cache(L1Message::InvalidateLine, addr);
                self.cache.invalidate(addr, way);
            }
            State::Modified | State::Exclusive
                if self.invalidate_policy == InvalidatePolicy::Drop =>
            {
                if state == State::Modified {
                    self.writeback(addr);
                }
                self.interconn
                    .message_to_cache(L1Message::InvalidateLine, addr);
                self.cache.invalidate(addr, way);
            }
            // an invalidate against a line we own outright is stale
            State::Modified | State::Exclusive => {
                log::debug!("snooped invalidate {addr:#010x} ignored in {state}");
            }
            State::Invalid => return Err(hit_on_invalid(addr)),
        }
        Ok(())
    }

    /// Flush a modified line, pulling the freshest copy out of L1 first.
    fn writeback(&mut self, addr: address) {
        self.interconn.message_to_cache(L1Message::GetLine, addr);
        self.interconn.bus_operation(BusOp::Write, addr);
    }

    /// Command 8: the array and the counters reset as a unit.
    fn clear(&mut self) {
        log::debug!("clearing cache and statistics");
        self.cache.reset();
        self.stats.reset();
    }

    /// Command 9.
    fn print<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        self.cache.dump(sink)?;
        writeln!(sink, "{}", self.stats)
    }
}

fn hit_on_invalid(addr: address) -> Error {
    Error::Invariant(format!("lookup of {addr:#x} returned an Invalid line"))
}
