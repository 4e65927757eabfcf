pub const LINE_SIZES: [u32; 5] = [4, 16, 32, 64, 128];
pub const ASSOCIATIVITIES: [u32; 6] = [1, 2, 4, 8, 16, 32];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{what} must be a power of two (got {got})")]
    NotPowerOfTwo { what: &'static str, got: u64 },

    #[error("line size must be one of {LINE_SIZES:?} bytes (got {0})")]
    UnsupportedLineSize(u32),

    #[error("associativity must be one of {ASSOCIATIVITIES:?} (got {0})")]
    UnsupportedAssociativity(u32),

    #[error("capacity of {capacity} bytes does not divide into {line_size} byte lines of {associativity} ways")]
    GeometryMismatch {
        capacity: u64,
        line_size: u32,
        associativity: u32,
    },

    #[error("a {address_bits} bit address cannot cover {offset_bits} offset and {index_bits} index bits")]
    AddressWidthTooSmall {
        address_bits: u32,
        offset_bits: u32,
        index_bits: u32,
    },

    #[error("address width must be between 1 and 64 bits (got {0})")]
    UnsupportedAddressWidth(u32),

    #[error("the {0} protocol is not implemented")]
    UnimplementedProtocol(Protocol),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
pub enum Protocol {
    #[value(name = "MESI")]
    #[strum(serialize = "MESI")]
    Mesi,
    /// Declared for command line compatibility, rejected at validation.
    #[value(name = "MSI")]
    #[strum(serialize = "MSI")]
    Msi,
}

/// What a snooped invalidate does to a line we hold in M or E.
///
/// An invalidate against a line we own outright is stale by construction,
/// so the default keeps the line. `Drop` treats the invalidate as
/// authoritative and behaves like a snooped RWIM for that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
pub enum InvalidatePolicy {
    #[strum(serialize = "keep")]
    Keep,
    #[strum(serialize = "drop")]
    Drop,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Total capacity in bytes.
    pub capacity: u64,
    /// Line size in bytes.
    pub line_size: u32,
    /// Number of ways per set.
    pub associativity: u32,
    /// Width of the simulated address space.
    pub address_bits: u32,
    pub protocol: Protocol,
    pub invalidate_policy: InvalidatePolicy,
}

impl Default for Config {
    /// 16 MiB, 64 byte lines, 16 ways, 32 bit addresses.
    fn default() -> Self {
        Self {
            capacity: 16 << 20,
            line_size: 64,
            associativity: 16,
            address_bits: 32,
            protocol: Protocol::Mesi,
            invalidate_policy: InvalidatePolicy::Keep,
        }
    }
}

impl Config {
    #[must_use]
    pub fn num_sets(&self) -> u64 {
        self.capacity / u64::from(self.line_size * self.associativity)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Protocol::Msi = self.protocol {
            return Err(Error::UnimplementedProtocol(self.protocol));
        }
        if !LINE_SIZES.contains(&self.line_size) {
            return Err(Error::UnsupportedLineSize(self.line_size));
        }
        if !ASSOCIATIVITIES.contains(&self.associativity) {
            return Err(Error::UnsupportedAssociativity(self.associativity));
        }
        if self.address_bits == 0 || self.address_bits > 64 {
            return Err(Error::UnsupportedAddressWidth(self.address_bits));
        }
        if !self.capacity.is_power_of_two() {
            return Err(Error::NotPowerOfTwo {
                what: "capacity",
                got: self.capacity,
            });
        }
        let line_bytes = u64::from(self.line_size * self.associativity);
        if self.capacity % line_bytes != 0 {
            return Err(Error::GeometryMismatch {
                capacity: self.capacity,
                line_size: self.line_size,
                associativity: self.associativity,
            });
        }
        let num_sets = self.num_sets();
        if num_sets == 0 || !num_sets.is_power_of_two() {
            return Err(Error::NotPowerOfTwo {
                what: "number of sets",
                got: num_sets,
            });
        }
        let offset_bits = self.line_size.ilog2();
        let index_bits = num_sets.ilog2();
        if offset_bits + index_bits >= self.address_bits {
            return Err(Error::AddressWidthTooSmall {
                address_bits: self.address_bits,
                offset_bits,
                index_bits,
            });
        }
        Ok(())
    }
}
