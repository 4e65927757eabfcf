use crate::cache::Controller;
use crate::config::{self, Config};
use crate::interconn::Interconnect;
use crate::trace;
use crate::Error;
use std::io::{BufRead, Write};

/// Sequential, trace-driven simulation of a single LLC.
///
/// Records are executed one at a time to completion; there is no
/// concurrency anywhere in the engine.
#[derive(Debug)]
pub struct Simulation<I> {
    controller: Controller<I>,
    address_bits: u32,
    skipped_records: u64,
}

impl<I: Interconnect> Simulation<I> {
    pub fn new(config: &Config, interconn: I) -> Result<Self, config::Error> {
        Ok(Self {
            controller: Controller::new(config, interconn)?,
            address_bits: config.address_bits,
            skipped_records: 0,
        })
    }

    /// Drain `reader`, executing every record. Malformed records are
    /// reported, counted, and skipped; engine failures abort the run.
    pub fn run<R: BufRead, W: Write>(&mut self, reader: R, sink: &mut W) -> Result<(), Error> {
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let command = match trace::parse_record(&line, self.address_bits) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    self.skipped_records += 1;
                    log::warn!("skipping trace line {}: {err}: {:?}", number + 1, line.trim());
                    continue;
                }
            };
            log::debug!("command {command:?}");
            self.controller.execute(command, sink)?;
            log::debug!("command {command:?} done: {:?}", self.controller.stats());
        }
        if self.skipped_records > 0 {
            log::warn!("skipped {} malformed trace records", self.skipped_records);
        }
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> &stats::Stats {
        self.controller.stats()
    }

    #[must_use]
    pub fn controller(&self) -> &Controller<I> {
        &self.controller
    }

    #[must_use]
    pub fn skipped_records(&self) -> u64 {
        self.skipped_records
    }
}

#[cfg(test)]
mod tests {
    use super::Simulation;
    use crate::cache::State;
    use crate::config::Config;
    use crate::interconn::{BusOp, L1Message};
    use crate::testing::{Event, Recorder};
    use std::io::Cursor;

    fn run(trace: &str) -> (Simulation<Recorder>, String) {
        let mut sim = Simulation::new(&Config::default(), Recorder::default()).unwrap();
        let mut out = Vec::new();
        sim.run(Cursor::new(trace.to_string()), &mut out).unwrap();
        (sim, String::from_utf8(out).unwrap())
    }

    #[test]
    fn shared_line_promotes_to_modified_on_write() {
        let trace = "\
8 0
0 0x1000
1 0x1000
9 0
";
        let (sim, printed) = run(trace);
        let stats = sim.stats();
        assert_eq!(
            (stats.reads, stats.writes, stats.hits, stats.misses),
            (1, 1, 1, 1)
        );
        assert!(printed.contains("MODIFIED"));
        assert!(printed.contains("hit ratio:  0.50000"));
        let bus_ops = sim.controller().interconn().bus_ops();
        assert_eq!(
            bus_ops,
            vec![(BusOp::Read, 0x1000), (BusOp::Invalidate, 0x1000)]
        );
    }

    #[test]
    fn snooped_rwim_empties_the_cache_after_writeback() {
        let trace = "\
8 0
1 0x2000
5 0x2000
9 0
";
        let (sim, printed) = run(trace);
        assert!(!printed.contains("way"));
        let events = &sim.controller().interconn().events;
        assert!(events.contains(&Event::Bus(BusOp::Write, 0x2000)));
        assert!(events.contains(&Event::L1(L1Message::InvalidateLine, 0x2000)));
    }

    #[test]
    fn snooped_invalidate_leaves_modified_lines_alone() {
        let trace = "\
8 0
1 0x3000
6 0x3000
9 0
";
        let (sim, printed) = run(trace);
        assert!(printed.contains("MODIFIED"));
        let lookup = sim.controller().cache().lookup(0x3000).unwrap();
        assert_eq!(lookup.map(|(_, state)| state), Some(State::Modified));
    }

    #[test]
    fn malformed_and_unknown_records_are_counted_not_fatal() {
        let trace = "\
# leading comment
0 0x1000
7 0x1000
bogus line
0 zzz

0 0x1000
";
        let (sim, _) = run(trace);
        assert_eq!(sim.skipped_records(), 3);
        let stats = sim.stats();
        assert_eq!((stats.reads, stats.hits, stats.misses), (2, 1, 1));
    }

    #[test]
    fn reset_then_print_reports_an_empty_cache() {
        let trace = "\
0 0x1000
1 0x2000
8 0
9 0
";
        let (sim, printed) = run(trace);
        assert!(!printed.contains("way"));
        assert!(printed.contains("hit ratio:  n/a"));
        assert_eq!(sim.stats(), &stats::Stats::default());
    }

    #[test]
    fn dump_carries_set_way_tag_plru_and_state() {
        let trace = "\
8 0
0 0x1000
9 0
";
        let (_, printed) = run(trace);
        // 0x1000: index 0x40, tag 0, snoop HIT installs Shared; the fill
        // steers every bit on the path away from way 0
        assert!(printed.contains("set 0x40 plru 000000010001011"));
        assert!(printed.contains("way  0 | tag 0x00000000 | SHARED"));
    }
}
