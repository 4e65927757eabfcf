pub mod block;
pub mod controller;
pub mod set;

pub use block::{Line, State};
pub use controller::Controller;
pub use set::{Set, Victim};

use crate::{addrdec, address, config, Error};
use std::io;

/// Replaced line with its reconstructed bus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evicted {
    pub addr: address,
    pub state: State,
}

/// Set-associative tag/state store for the LLC.
///
/// A thin dispatcher: addresses are decomposed once and every operation is
/// forwarded to the owning set.
#[derive(Debug)]
pub struct Cache {
    sets: Vec<Set>,
    translation: addrdec::Translation,
}

impl Cache {
    pub fn new(config: &config::Config) -> Result<Self, config::Error> {
        let translation = addrdec::Translation::new(config)?;
        let sets = (0..translation.num_sets())
            .map(|_| Set::new(config.associativity as usize))
            .collect();
        Ok(Self { sets, translation })
    }

    #[inline]
    #[must_use]
    pub fn translation(&self) -> &addrdec::Translation {
        &self.translation
    }

    #[must_use]
    pub fn num_sets(&self) -> usize {
        self.sets.len()
    }

    #[must_use]
    pub fn set(&self, index: usize) -> &Set {
        &self.sets[index]
    }

    /// `Some((way, state))` when a valid line holds the tag of `addr`.
    pub fn lookup(&self, addr: address) -> Result<Option<(usize, State)>, Error> {
        let fields = self.translation.decompose(addr);
        let set = &self.sets[fields.index];
        match set.lookup(fields.tag)? {
            Some(way) => {
                let state = set.line(way).state;
                if state == State::Invalid {
                    return Err(Error::Invariant(format!(
                        "lookup of {addr:#x} matched an Invalid line"
                    )));
                }
                Ok(Some((way, state)))
            }
            None => Ok(None),
        }
    }

    /// Install a line for `addr`, returning the replaced line (with its
    /// address put back together) when a valid victim was evicted.
    pub fn allocate(&mut self, addr: address, state: State) -> Option<Evicted> {
        let fields = self.translation.decompose(addr);
        let (_, victim) = self.sets[fields.index].allocate(fields.tag, state);
        victim.map(|victim| Evicted {
            addr: self.translation.line_addr(victim.tag, fields.index),
            state: victim.state,
        })
    }

    #[inline]
    pub fn touch(&mut self, addr: address, way: usize) {
        let fields = self.translation.decompose(addr);
        self.sets[fields.index].touch(way);
    }

    #[inline]
    pub fn set_state(&mut self, addr: address, way: usize, state: State) {
        let fields = self.translation.decompose(addr);
        self.sets[fields.index].set_state(way, state);
    }

    #[inline]
    pub fn invalidate(&mut self, addr: address, way: usize) {
        let fields = self.translation.decompose(addr);
        self.sets[fields.index].invalidate(way);
    }

    /// Every line Invalid, every PLRU tree zeroed. Counters live with the
    /// controller and are reset there.
    pub fn reset(&mut self) {
        for set in &mut self.sets {
            set.reset();
        }
    }

    /// Emit every valid line, sets in index order, ways in way order.
    pub fn dump<W: io::Write>(&self, sink: &mut W) -> io::Result<()> {
        for (index, set) in self.sets.iter().enumerate() {
            set.print_valid(index, sink)?;
        }
        Ok(())
    }
}
