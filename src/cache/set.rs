use super::block::{Line, State};
use crate::{address, Error};
use std::io;

/// Replaced line captured before an allocation overwrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Victim {
    pub tag: address,
    pub state: State,
}

/// An n-way associative set with tree PLRU replacement.
///
/// The PLRU tree is `ways - 1` bits packed into one integer, forming a
/// complete binary tree over the ways: bit 0 is the root, node `n` has
/// children `2n + 1` (left) and `2n + 2` (right), and the leaves map to
/// ways in order. A bit value of 0 routes to the left subtree, 1 to the
/// right. Touching a way steers every bit on its path toward the other
/// subtree, so the victim walk drains away from recently used lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Set {
    lines: Vec<Line>,
    plru: u32,
    levels: u32,
}

impl Set {
    #[must_use]
    pub fn new(ways: usize) -> Self {
        debug_assert!(ways.is_power_of_two() && ways <= 32);
        Self {
            lines: vec![Line::default(); ways],
            plru: 0,
            levels: ways.ilog2(),
        }
    }

    #[inline]
    #[must_use]
    pub fn ways(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    #[must_use]
    pub fn plru_bits(&self) -> u32 {
        self.plru
    }

    #[inline]
    #[must_use]
    pub fn line(&self, way: usize) -> &Line {
        &self.lines[way]
    }

    /// The way holding `tag`, if any valid line does.
    pub fn lookup(&self, tag: address) -> Result<Option<usize>, Error> {
        let mut found = None;
        for (way, line) in self.lines.iter().enumerate() {
            if line.is_valid() && line.tag == tag {
                if let Some(first) = found {
                    return Err(Error::Invariant(format!(
                        "tag {tag:#x} held by ways {first} and {way} of one set"
                    )));
                }
                found = Some(way);
            }
        }
        Ok(found)
    }

    /// Leaf reached by walking the tree from the root along the current
    /// bits: 0 goes left, 1 goes right.
    #[must_use]
    pub fn find_victim(&self) -> usize {
        let mut node = 0;
        for _ in 0..self.levels {
            node = if self.plru >> node & 1 == 0 {
                2 * node + 1
            } else {
                2 * node + 2
            };
        }
        node - (self.ways() - 1)
    }

    /// Walk from the leaf for `way` back to the root, pointing every node
    /// on the path away from the subtree the access came through.
    pub fn update_plru(&mut self, way: usize) {
        debug_assert!(way < self.ways());
        let mut node = way + (self.ways() - 1);
        while node > 0 {
            let parent = (node - 1) / 2;
            if node == 2 * parent + 1 {
                self.plru |= 1 << parent;
            } else {
                self.plru &= !(1 << parent);
            }
            node = parent;
        }
    }

    /// Record an access to `way`.
    #[inline]
    pub fn touch(&mut self, way: usize) {
        self.update_plru(way);
    }

    /// Install `(tag, state)`, preferring the lowest Invalid way and
    /// falling back to the PLRU victim. The caller handles write-back and
    /// inclusion for a returned victim.
    pub fn allocate(&mut self, tag: address, state: State) -> (usize, Option<Victim>) {
        if let Some(way) = self.lines.iter().position(Line::is_invalid) {
            self.lines[way] = Line { tag, state };
            self.update_plru(way);
            return (way, None);
        }
        let way = self.find_victim();
        let victim = Victim {
            tag: self.lines[way].tag,
            state: self.lines[way].state,
        };
        self.lines[way] = Line { tag, state };
        self.update_plru(way);
        (way, Some(victim))
    }

    /// Invalidation is not an access: the PLRU tree is left alone.
    #[inline]
    pub fn invalidate(&mut self, way: usize) {
        self.lines[way].invalidate();
    }

    #[inline]
    pub fn set_state(&mut self, way: usize, state: State) {
        self.lines[way].state = state;
    }

    pub fn reset(&mut self) {
        self.lines.fill(Line::default());
        self.plru = 0;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(Line::is_invalid)
    }

    /// PLRU bits rendered MSB first at the tree's full width. Direct-mapped
    /// sets have no tree and render as `-`.
    #[must_use]
    pub fn plru_string(&self) -> String {
        match self.ways() - 1 {
            0 => "-".to_string(),
            width => format!("{:0width$b}", self.plru),
        }
    }

    /// Emit every valid line of this set.
    pub fn print_valid<W: io::Write>(&self, index: usize, sink: &mut W) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        writeln!(sink, "set {:#x} plru {}", index, self.plru_string())?;
        for (way, line) in self.lines.iter().enumerate() {
            if line.is_valid() {
                writeln!(sink, "  way {:2} | tag {:#010x} | {}", way, line.tag, line.state)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Set, State, Victim};

    #[test]
    fn new_set_is_empty_with_zeroed_tree() {
        let set = Set::new(16);
        assert_eq!(set.ways(), 16);
        assert_eq!(set.plru_bits(), 0);
        assert!(set.is_empty());
        assert_eq!(set.find_victim(), 0);
    }

    #[test]
    fn allocation_prefers_the_lowest_invalid_way() {
        let mut set = Set::new(4);
        let (way, victim) = set.allocate(0xa, State::Exclusive);
        assert_eq!((way, victim), (0, None));
        let (way, victim) = set.allocate(0xb, State::Shared);
        assert_eq!((way, victim), (1, None));

        set.invalidate(0);
        let (way, victim) = set.allocate(0xc, State::Modified);
        assert_eq!((way, victim), (0, None));
    }

    #[test]
    fn touching_a_way_steers_the_tree_away_from_it() {
        // 4 ways: node 0 is the root, node 1 covers ways {0,1}, node 2
        // covers ways {2,3}
        let mut set = Set::new(4);
        set.touch(0);
        assert_eq!(set.plru_bits(), 0b011);
        set.touch(2);
        assert_eq!(set.plru_bits(), 0b110);
        assert_eq!(set.find_victim(), 1);
    }

    #[test]
    fn sequential_fill_leaves_the_first_way_as_victim() {
        let mut set = Set::new(16);
        for tag in 0..16 {
            let (way, victim) = set.allocate(tag, State::Exclusive);
            assert_eq!(way as u64, tag);
            assert_eq!(victim, None);
        }
        assert_eq!(set.plru_bits(), 0);
        assert_eq!(set.find_victim(), 0);
    }

    #[test]
    fn full_set_allocation_returns_the_plru_leaf() {
        let mut set = Set::new(4);
        for tag in 0..4 {
            set.allocate(tag, State::Shared);
        }
        let expected_way = set.find_victim();
        assert_eq!(expected_way, 0);
        let (way, victim) = set.allocate(0x10, State::Modified);
        assert_eq!(way, expected_way);
        assert_eq!(
            victim,
            Some(Victim {
                tag: 0,
                state: State::Shared,
            })
        );
        assert_eq!(set.lookup(0x10).unwrap(), Some(expected_way));
        assert_eq!(set.lookup(0).unwrap(), None);
    }

    #[test]
    fn invalidation_does_not_move_the_tree() {
        let mut set = Set::new(8);
        for tag in 0..8 {
            set.allocate(tag, State::Exclusive);
        }
        let before = set.plru_bits();
        set.invalidate(3);
        assert_eq!(set.plru_bits(), before);
        assert_eq!(set.lookup(3).unwrap(), None);
    }

    #[test]
    fn lookup_ignores_invalid_tags() {
        let mut set = Set::new(2);
        set.allocate(0x7, State::Modified);
        set.invalidate(0);
        // way 1 is still Invalid with a zeroed tag; neither may match
        assert_eq!(set.lookup(0x7).unwrap(), None);
        assert_eq!(set.lookup(0).unwrap(), None);
    }

    #[test]
    fn duplicate_tags_are_an_invariant_violation() {
        let mut set = Set::new(4);
        set.allocate(0x7, State::Exclusive);
        set.allocate(0x7, State::Shared);
        assert!(set.lookup(0x7).is_err());
    }

    #[test]
    fn reset_restores_the_initial_state() {
        let mut set = Set::new(4);
        for tag in 0..4 {
            set.allocate(tag, State::Modified);
        }
        set.reset();
        assert!(set.is_empty());
        assert_eq!(set.plru_bits(), 0);
        assert_eq!(set.find_victim(), 0);
    }

    #[test]
    fn plru_string_is_msb_first_at_full_width() {
        let mut set = Set::new(16);
        set.touch(0);
        // bits 0 (root), 1, 3, 7 point away from way 0
        assert_eq!(set.plru_bits(), 0b1000_1011);
        assert_eq!(set.plru_string(), "000000010001011");
        assert_eq!(Set::new(1).plru_string(), "-");
    }

    #[test]
    fn direct_mapped_sets_always_replace_their_only_way() {
        let mut set = Set::new(1);
        assert_eq!(set.find_victim(), 0);
        let (way, victim) = set.allocate(0x1, State::Exclusive);
        assert_eq!((way, victim), (0, None));
        let (way, victim) = set.allocate(0x2, State::Shared);
        assert_eq!(way, 0);
        assert_eq!(
            victim,
            Some(Victim {
                tag: 0x1,
                state: State::Exclusive,
            })
        );
    }
}
