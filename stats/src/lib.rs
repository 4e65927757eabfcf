use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

/// Aggregate access counters for one cache instance.
///
/// Hits and misses are recorded once per processor-side request, so
/// `hits + misses == reads + writes` holds after every command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Stats {
    pub reads: u64,
    pub writes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Serialized alongside the counters is the derived `hit_ratio`, null
/// while no access has been recorded. Deserialization ignores it; the
/// counters alone are authoritative.
impl Serialize for Stats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Stats", 5)?;
        state.serialize_field("reads", &self.reads)?;
        state.serialize_field("writes", &self.writes)?;
        state.serialize_field("hits", &self.hits)?;
        state.serialize_field("misses", &self.misses)?;
        state.serialize_field("hit_ratio", &self.hit_ratio())?;
        state.end()
    }
}

impl Stats {
    #[inline]
    pub fn record_read(&mut self) {
        self.reads += 1;
    }

    #[inline]
    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    #[inline]
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    #[inline]
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    #[must_use]
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// `hits / (hits + misses)`, or `None` before the first access.
    #[must_use]
    pub fn hit_ratio(&self) -> Option<f64> {
        match self.accesses() {
            0 => None,
            total => Some(self.hits as f64 / total as f64),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl std::ops::AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.reads += other.reads;
        self.writes += other.writes;
        self.hits += other.hits;
        self.misses += other.misses;
    }
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let ratio = match self.hit_ratio() {
            Some(ratio) => format!("{ratio:.5}"),
            None => "n/a".to_string(),
        };
        writeln!(f, "----------------------------------")?;
        writeln!(f, "         cache statistics")?;
        writeln!(f, "----------------------------------")?;
        writeln!(f, "  reads:      {:<10}", self.reads)?;
        writeln!(f, "  writes:     {:<10}", self.writes)?;
        writeln!(f, "  hits:       {:<10}", self.hits)?;
        writeln!(f, "  misses:     {:<10}", self.misses)?;
        writeln!(f, "  hit ratio:  {ratio}")?;
        write!(f, "----------------------------------")
    }
}
