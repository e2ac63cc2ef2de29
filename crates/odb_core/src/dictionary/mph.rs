//! Minimal perfect hashing.
//!
//! [`ChdHash`] is a hash-and-displace construction: keys are split into
//! buckets of about [`LAMBDA`] keys by one hash, and each bucket gets a pair
//! of displacements `(d1, d2)` that moves all of its keys into free slots.
//! Buckets are placed largest first.
//!
//! Serialized form (little-endian):
//!
//! ```text
//! "CHD1" | reserved u32 | seed u64 | key_count u64 | bucket_count u64
//! bucket_count × (d1 u32, d2 u32)
//! ```

use crate::error::{CoreError, CoreResult};
use std::io::{self, Write};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Average number of keys per bucket.
pub const LAMBDA: usize = 5;

/// Seeds tried before giving up.
pub const MAX_ATTEMPTS: u32 = 64;

const TAG: [u8; 4] = *b"CHD1";
const PREFIX_SIZE: usize = 4 + 4 + 8 + 8 + 8;
const INITIAL_SEED: u64 = 0x6f64_625f_6368_6431;

/// A minimal perfect hash over a fixed key set.
///
/// `search` maps every training key to a distinct slot in `[0, len)`.
/// Keys outside the training set map to an arbitrary slot in the same range.
pub trait PerfectHash: Sized {
    /// Builds a hash for `keys`.
    ///
    /// # Errors
    ///
    /// Returns an error if `keys` is empty, contains duplicates, or no hash
    /// can be found.
    fn build(keys: &[&[u8]]) -> CoreResult<Self>;

    /// Loads a hash from its serialized form.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupted`] if the bytes are malformed.
    fn from_bytes(bytes: &[u8]) -> CoreResult<Self>;

    /// Writes the serialized form.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_to(&self, sink: &mut dyn Write) -> io::Result<()>;

    /// Returns the size of the serialized form in bytes.
    fn serialized_size(&self) -> usize;

    /// Returns the slot of `key`.
    fn search(&self, key: &[u8]) -> u64;

    /// Returns the number of slots.
    fn len(&self) -> usize;

    /// Returns true if there are no slots.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash-and-displace perfect hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChdHash {
    seed: u64,
    key_count: u64,
    displacements: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Hashes {
    bucket: u32,
    f1: u32,
    f2: u32,
}

impl Hashes {
    fn of(key: &[u8], seed: u64) -> Self {
        let h1 = xxh3_64_with_seed(key, seed);
        let h2 = xxh3_64_with_seed(&h1.to_le_bytes(), !seed);
        Self {
            bucket: (h1 >> 32) as u32,
            f1: h1 as u32,
            f2: h2 as u32,
        }
    }
}

fn displace(f1: u32, f2: u32, d1: u32, d2: u32) -> u32 {
    d2.wrapping_add(f1.wrapping_mul(d1)).wrapping_add(f2)
}

enum Attempt {
    Found(Vec<(u32, u32)>),
    Retry,
}

impl ChdHash {
    /// Returns the seed the hash was built with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.displacements.len()
    }

    fn try_seed(keys: &[&[u8]], seed: u64) -> CoreResult<Attempt> {
        let n = keys.len();
        let bucket_count = n.div_ceil(LAMBDA);
        let hashes: Vec<Hashes> = keys.iter().map(|k| Hashes::of(k, seed)).collect();

        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); bucket_count];
        for (i, h) in hashes.iter().enumerate() {
            buckets[h.bucket as usize % bucket_count].push(i);
        }

        for bucket in &buckets {
            for (a, &i) in bucket.iter().enumerate() {
                for &j in &bucket[a + 1..] {
                    if hashes[i] == hashes[j] {
                        if keys[i] == keys[j] {
                            return Err(CoreError::duplicate_key(keys[i]));
                        }
                        return Ok(Attempt::Retry);
                    }
                }
            }
        }

        let mut order: Vec<usize> = (0..bucket_count).collect();
        order.sort_by(|&a, &b| buckets[b].len().cmp(&buckets[a].len()).then(a.cmp(&b)));

        let table_len = n as u32;
        let mut displacements = vec![(0u32, 0u32); bucket_count];
        // A slot is free unless taken by a placed bucket or already claimed
        // by the current trial.
        let mut taken = vec![false; n];
        let mut trial_stamp = vec![0u64; n];
        let mut generation = 0u64;
        let mut slots = Vec::with_capacity(LAMBDA * 4);

        for &b in &order {
            let bucket = &buckets[b];
            if bucket.is_empty() {
                break;
            }
            let mut placed = false;
            'search: for d1 in 0..table_len {
                'next_d2: for d2 in 0..table_len {
                    generation += 1;
                    slots.clear();
                    for &k in bucket {
                        let h = hashes[k];
                        let slot = (displace(h.f1, h.f2, d1, d2) % table_len) as usize;
                        if taken[slot] || trial_stamp[slot] == generation {
                            continue 'next_d2;
                        }
                        trial_stamp[slot] = generation;
                        slots.push(slot);
                    }
                    for &slot in &slots {
                        taken[slot] = true;
                    }
                    displacements[b] = (d1, d2);
                    placed = true;
                    break 'search;
                }
            }
            if !placed {
                return Ok(Attempt::Retry);
            }
        }
        Ok(Attempt::Found(displacements))
    }
}

impl PerfectHash for ChdHash {
    fn build(keys: &[&[u8]]) -> CoreResult<Self> {
        if keys.is_empty() {
            return Err(CoreError::invalid_input("cannot hash an empty key set"));
        }
        if u32::try_from(keys.len()).is_err() {
            return Err(CoreError::invalid_input(format!(
                "too many keys: {}",
                keys.len()
            )));
        }

        let mut state = INITIAL_SEED;
        for attempt in 1..=MAX_ATTEMPTS {
            let seed = splitmix64(&mut state);
            match Self::try_seed(keys, seed)? {
                Attempt::Found(displacements) => {
                    debug!(keys = keys.len(), attempt, "built perfect hash");
                    return Ok(Self {
                        seed,
                        key_count: keys.len() as u64,
                        displacements,
                    });
                }
                Attempt::Retry => debug!(attempt, "perfect hash seed rejected"),
            }
        }
        Err(CoreError::HashConstruction {
            keys: keys.len(),
            attempts: MAX_ATTEMPTS,
        })
    }

    fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() < PREFIX_SIZE || bytes[..4] != TAG {
            return Err(CoreError::corrupted("bad hash section tag"));
        }
        let seed = le_u64(&bytes[8..16]);
        let key_count = le_u64(&bytes[16..24]);
        let bucket_count = le_u64(&bytes[24..32]);
        if key_count == 0 || key_count > u64::from(u32::MAX) {
            return Err(CoreError::corrupted(format!(
                "hash key count {key_count} out of range"
            )));
        }
        let expected = (key_count as usize).div_ceil(LAMBDA);
        if bucket_count != expected as u64 {
            return Err(CoreError::corrupted(format!(
                "hash bucket count {bucket_count} does not match key count {key_count}"
            )));
        }
        let body = &bytes[PREFIX_SIZE..];
        if body.len() < expected * 8 {
            return Err(CoreError::corrupted("hash section truncated"));
        }
        let displacements = body[..expected * 8]
            .chunks_exact(8)
            .map(|c| (le_u32(&c[..4]), le_u32(&c[4..])))
            .collect();
        Ok(Self {
            seed,
            key_count,
            displacements,
        })
    }

    fn write_to(&self, sink: &mut dyn Write) -> io::Result<()> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        buf.extend_from_slice(&TAG);
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&self.seed.to_le_bytes());
        buf.extend_from_slice(&self.key_count.to_le_bytes());
        buf.extend_from_slice(&(self.displacements.len() as u64).to_le_bytes());
        for &(d1, d2) in &self.displacements {
            buf.extend_from_slice(&d1.to_le_bytes());
            buf.extend_from_slice(&d2.to_le_bytes());
        }
        sink.write_all(&buf)
    }

    fn serialized_size(&self) -> usize {
        PREFIX_SIZE + self.displacements.len() * 8
    }

    fn search(&self, key: &[u8]) -> u64 {
        let h = Hashes::of(key, self.seed);
        let (d1, d2) = self.displacements[h.bucket as usize % self.displacements.len()];
        u64::from(displace(h.f1, h.f2, d1, d2) % self.key_count as u32)
    }

    fn len(&self) -> usize {
        self.key_count as usize
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
