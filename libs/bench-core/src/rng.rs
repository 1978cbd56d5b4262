// ═══════════════════════════════════════════════════════════════
//  RNG (xorshift64)
// ═══════════════════════════════════════════════════════════════

/// Небольшой PRNG без блокировок. Each worker owns one; nothing shares a
/// generator across tasks.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed 0 = текущее время, иначе как есть.
pub fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
        | 1
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(GOLDEN);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self::from_state(splitmix64(resolve_seed(seed)))
    }

    /// Независимый поток для воркера `id`. `base` должен быть уже
    /// разрешён через [`resolve_seed`], иначе воркеры получат разные часы.
    pub fn for_worker(base: u64, id: usize) -> Self {
        Self::from_state(splitmix64(base ^ (id as u64).wrapping_mul(GOLDEN)))
    }

    fn from_state(state: u64) -> Self {
        // xorshift застревает в нуле
        Self { state: if state == 0 { GOLDEN } else { state } }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Returns f64 in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / ((1u64 << 53) as f64)
    }

    /// Uniform in `[0, n)`. `n` must be non-zero.
    pub fn next_below(&mut self, n: u64) -> u64 {
        ((self.next_u64() as u128 * n as u128) >> 64) as u64
    }

    pub fn next_intn(&mut self, n: usize) -> usize {
        self.next_below(n as u64) as usize
    }

    /// Fisher–Yates in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_intn(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn workers_get_distinct_streams() {
        let base = resolve_seed(7);
        let mut w0 = Rng::for_worker(base, 0);
        let mut w1 = Rng::for_worker(base, 1);
        let s0: Vec<u64> = (0..8).map(|_| w0.next_u64()).collect();
        let s1: Vec<u64> = (0..8).map(|_| w1.next_u64()).collect();
        assert_ne!(s0, s1);
    }

    #[test]
    fn next_below_stays_in_range_and_covers_it() {
        let mut rng = Rng::new(1);
        let mut seen = [false; 10];
        for _ in 0..10_000 {
            let v = rng.next_below(10);
            assert!(v < 10);
            seen[v as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = Rng::new(3);
        let mut items: Vec<u32> = (0..50).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, sorted);
    }

    #[test]
    fn zero_seed_resolves_to_clock() {
        assert_ne!(resolve_seed(0), 0);
        assert_eq!(resolve_seed(5), 5);
    }
}
