//! Bloom filter policy for table filter blocks.

use tansu_core::FilterPolicy;

/// Builds per-segment Bloom filters. Each filter is a bit array sized at
/// `bits_per_key` bits per key, followed by one byte recording the probe
/// count so readers stay compatible if the parameters change.
pub struct BloomFilterPolicy {
    bits_per_key: usize,
    num_probes: usize,
}

impl BloomFilterPolicy {
    pub fn new(bits_per_key: usize) -> Self {
        // bits_per_key * ln(2) probes minimizes the false positive rate
        let num_probes = ((bits_per_key as f64 * 0.69) as usize).clamp(1, 30);
        Self {
            bits_per_key,
            num_probes,
        }
    }

    /// 64-bit FNV-1a; the two halves drive double hashing.
    fn bloom_hash(key: &[u8]) -> u64 {
        let mut hash = 0xcbf29ce484222325u64;
        for &byte in key {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }

    fn probe_bit(hash: u64, probe: usize, num_bits: usize) -> usize {
        let h1 = hash & 0xffff_ffff;
        let h2 = hash >> 32;
        (h1.wrapping_add((probe as u64).wrapping_mul(h2)) % num_bits as u64) as usize
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &'static str {
        "tansu.BuiltinBloomFilter"
    }

    fn create_filter(&self, keys: &[&[u8]], dst: &mut Vec<u8>) {
        // Round up to a whole byte count; tiny key sets still get 64 bits to
        // keep the false positive rate from blowing up.
        let mut num_bits = keys.len() * self.bits_per_key;
        if num_bits < 64 {
            num_bits = 64;
        }
        let num_bytes = (num_bits + 7) / 8;
        let num_bits = num_bytes * 8;

        let init_size = dst.len();
        dst.resize(init_size + num_bytes, 0);
        dst.push(self.num_probes as u8);

        let bits = &mut dst[init_size..init_size + num_bytes];
        for key in keys {
            let hash = Self::bloom_hash(key);
            for probe in 0..self.num_probes {
                let bit_pos = Self::probe_bit(hash, probe, num_bits);
                bits[bit_pos / 8] |= 1 << (bit_pos % 8);
            }
        }
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        if filter.len() < 2 {
            return false;
        }
        let num_probes = filter[filter.len() - 1] as usize;
        if num_probes > 30 {
            // Reserved for future encodings; treat as a match.
            return true;
        }
        let bits = &filter[..filter.len() - 1];
        let num_bits = bits.len() * 8;

        let hash = Self::bloom_hash(key);
        for probe in 0..num_probes {
            let bit_pos = Self::probe_bit(hash, probe, num_bits);
            if bits[bit_pos / 8] & (1 << (bit_pos % 8)) == 0 {
                return false;
            }
        }
        true
    }
}
