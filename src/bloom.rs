use crate::hash::{read_u32, ChangeHash};

// These constants correspond to a 1% false positive rate. The values can be
// changed without breaking wire compatibility, since the parameters used for
// a particular Bloom filter are encoded alongside it (spec §3, §4.1).
const BITS_PER_ENTRY: u32 = 10;
const NUM_PROBES: u32 = 7;

/// A probabilistic set of [`ChangeHash`]es with no false negatives, used by
/// a `Have` entry to summarise "everything I hold beyond `last_sync`"
/// without transmitting the full hash list (spec §4.1).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    num_entries: u32,
    num_bits_per_entry: u32,
    num_probes: u32,
    bits: Vec<u8>,
}

fn bits_capacity(num_entries: u32, num_bits_per_entry: u32) -> usize {
    let bits = f64::from(num_entries) * f64::from(num_bits_per_entry) / 8_f64;
    bits.ceil() as usize
}

impl BloomFilter {
    /// Builds a filter from an iterator of hashes using the default
    /// parameters (10 bits/entry, 7 probes).
    pub fn from_hashes(hashes: impl Iterator<Item = ChangeHash>) -> Self {
        Self::with_params(hashes, BITS_PER_ENTRY, NUM_PROBES)
    }

    /// Builds a filter with explicit parameters; exposed for tuning and
    /// testing. Production callers should use [`BloomFilter::from_hashes`].
    pub fn with_params(
        hashes: impl Iterator<Item = ChangeHash>,
        num_bits_per_entry: u32,
        num_probes: u32,
    ) -> Self {
        let hashes: Vec<ChangeHash> = hashes.collect();
        let num_entries = hashes.len() as u32;
        let bits = vec![0u8; bits_capacity(num_entries, num_bits_per_entry)];
        let mut filter = Self {
            num_entries,
            num_bits_per_entry,
            num_probes,
            bits,
        };
        for hash in &hashes {
            filter.add_hash(hash);
        }
        filter
    }

    /// Dillinger-Manolios triple hashing: interprets bytes 0-3, 4-7, 8-11 of
    /// the hash as little-endian u32s `x,y,z` and derives `num_probes`
    /// indices via `x <- (x+y) mod m`, `y <- (y+z) mod m` (spec §4.1).
    fn get_probes(&self, hash: &ChangeHash) -> Vec<u32> {
        let b = hash.as_bytes();
        let modulo = 8 * self.bits.len() as u32;

        let mut x = u32::from_le_bytes([b[0], b[1], b[2], b[3]]) % modulo;
        let mut y = u32::from_le_bytes([b[4], b[5], b[6], b[7]]) % modulo;
        let z = u32::from_le_bytes([b[8], b[9], b[10], b[11]]) % modulo;

        let mut probes = Vec::with_capacity(self.num_probes as usize);
        probes.push(x);
        for _ in 1..self.num_probes {
            x = (x + y) % modulo;
            y = (y + z) % modulo;
            probes.push(x);
        }
        probes
    }

    fn add_hash(&mut self, hash: &ChangeHash) {
        for probe in self.get_probes(hash) {
            self.set_bit(probe as usize);
        }
    }

    fn set_bit(&mut self, probe: usize) {
        if let Some(byte) = self.bits.get_mut(probe >> 3) {
            *byte |= 1 << (probe & 7);
        }
    }

    fn get_bit(&self, probe: usize) -> Option<u8> {
        self.bits.get(probe >> 3).map(|byte| byte & (1 << (probe & 7)))
    }

    /// Whether `hash` is (probably) present. Never false-negative: every
    /// hash inserted via [`BloomFilter::from_hashes`] reports present.
    pub fn contains_hash(&self, hash: &ChangeHash) -> bool {
        if self.bits.is_empty() {
            return false;
        }
        self.get_probes(hash)
            .into_iter()
            .all(|probe| self.get_bit(probe as usize).unwrap_or(0) != 0)
    }

    /// Serializes to the wire format of spec §4.1: three little-endian u32
    /// parameter words then the raw bit array, or the empty byte string if
    /// the filter has no entries.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.num_entries == 0 {
            return Vec::new();
        }
        let mut buf = Vec::with_capacity(12 + self.bits.len());
        buf.extend_from_slice(&self.num_entries.to_le_bytes());
        buf.extend_from_slice(&self.num_bits_per_entry.to_le_bytes());
        buf.extend_from_slice(&self.num_probes.to_le_bytes());
        buf.extend_from_slice(&self.bits);
        buf
    }

    /// Inverse of [`BloomFilter::to_bytes`]. An empty input yields a
    /// zero-parameter filter for which `contains_hash` always returns false.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        let (num_entries, rest) = read_u32(bytes).unwrap_or((0, &[]));
        let (num_bits_per_entry, rest) = read_u32(rest).unwrap_or((0, &[]));
        let (num_probes, rest) = read_u32(rest).unwrap_or((0, &[]));
        let needed = bits_capacity(num_entries, num_bits_per_entry);
        let bits = rest.get(..needed).unwrap_or(rest).to_vec();
        Self {
            num_entries,
            num_bits_per_entry,
            num_probes,
            bits,
        }
    }
}

impl serde::Serialize for BloomFilter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}
