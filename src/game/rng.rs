use anyhow::{anyhow, Result};

const SEED_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SEED_LENGTH: usize = 8;

/// String -> u32 hash stream (xmur3). Hashes UTF-16 code units so a seed
/// typed in the page gives the same run everywhere.
fn xmur3(seed: &str) -> impl FnMut() -> u32 {
    let units: Vec<u16> = seed.encode_utf16().collect();
    let mut h: u32 = 1_779_033_703 ^ units.len() as u32;
    for unit in units {
        h = (h ^ u32::from(unit)).wrapping_mul(3_432_918_353);
        h = h.rotate_left(13);
    }
    move || {
        h = (h ^ (h >> 16)).wrapping_mul(2_246_822_507);
        h = (h ^ (h >> 13)).wrapping_mul(3_266_489_909);
        h ^= h >> 16;
        h
    }
}

/// Seeded generator for levels: xmur3 seeds a mulberry32 stream.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u32,
}

impl Rng {
    pub fn new(seed: &str) -> Self {
        let mut hash = xmur3(seed);
        Rng { state: hash() }
    }

    /// Float in [0, 1)
    pub fn next(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }

    /// Integer in [min, max], bounds may come in either order
    pub fn int(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = (min.min(max), min.max(max));
        (self.next() * (hi - lo + 1) as f64).floor() as i64 + lo
    }

    pub fn chance(&mut self, probability: f64) -> bool {
        self.next() < probability
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.int(0, items.len() as i64 - 1) as usize;
        items.get(index)
    }

    /// Fisher-Yates, in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.int(0, i as i64) as usize;
            items.swap(i, j);
        }
    }
}

/// Fresh 8 character base36 seed for a new run
pub fn new_run_seed() -> Result<String> {
    let mut bytes = [0u8; SEED_LENGTH];
    getrandom::getrandom(&mut bytes).map_err(|err| anyhow!("No entropy for run seed : {err}"))?;
    Ok(bytes
        .iter()
        .map(|byte| char::from(SEED_ALPHABET[usize::from(*byte) % SEED_ALPHABET.len()]))
        .collect())
}
