use crate::{address, config};

/// Decomposed address under a fixed cache geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressFields {
    pub tag: address,
    pub index: usize,
    pub byte_offset: u32,
}

/// Splits bus addresses into `| tag | index | byte offset |` and puts
/// victim addresses back together again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    offset_bits: u32,
    index_bits: u32,
    tag_bits: u32,
    offset_mask: address,
    index_mask: address,
}

impl Translation {
    pub fn new(config: &config::Config) -> Result<Self, config::Error> {
        config.validate()?;
        let offset_bits = config.line_size.ilog2();
        let index_bits = config.num_sets().ilog2();
        Ok(Self {
            offset_bits,
            index_bits,
            tag_bits: config.address_bits - offset_bits - index_bits,
            offset_mask: (1u64 << offset_bits) - 1,
            index_mask: (1u64 << index_bits) - 1,
        })
    }

    #[inline]
    #[must_use]
    pub fn decompose(&self, addr: address) -> AddressFields {
        AddressFields {
            tag: addr >> (self.offset_bits + self.index_bits),
            index: ((addr >> self.offset_bits) & self.index_mask) as usize,
            byte_offset: (addr & self.offset_mask) as u32,
        }
    }

    /// First byte of the line `(tag, index)` maps to.
    #[inline]
    #[must_use]
    pub fn line_addr(&self, tag: address, index: usize) -> address {
        (tag << (self.offset_bits + self.index_bits)) | ((index as address) << self.offset_bits)
    }

    #[inline]
    #[must_use]
    pub fn num_sets(&self) -> usize {
        1usize << self.index_bits
    }

    #[must_use]
    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    #[must_use]
    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    #[must_use]
    pub fn tag_bits(&self) -> u32 {
        self.tag_bits
    }
}
