//! The `random` opcode's number source: seeded for reproducible playback,
//! thread-seeded otherwise.

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

pub enum RandMode {
    Predictable,
    RandomUniform,
}

pub struct ZRand {
    rng: Box<dyn RngCore>,
    rand_mode: RandMode,
}

impl ZRand {
    pub fn new(rm: RandMode) -> ZRand {
        ZRand {
            rng: Box::new(rand::thread_rng()),
            rand_mode: rm,
        }
    }

    pub fn new_uniform() -> ZRand {
        ZRand::new(RandMode::RandomUniform)
    }

    pub fn new_predictable(seed: u64) -> ZRand {
        ZRand {
            rng: Box::new(StdRng::seed_from_u64(seed)),
            rand_mode: RandMode::Predictable,
        }
    }

    fn gen_unsigned_rand(&mut self) -> u16 {
        self.rng.gen_range(0..32768)
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = Box::new(StdRng::seed_from_u64(seed));
        self.rand_mode = RandMode::Predictable;
    }

    fn reseed_unpredictable(&mut self) {
        self.rng = Box::new(rand::thread_rng());
        self.rand_mode = RandMode::RandomUniform;
    }

    /// Implements the `random` opcode: a positive range yields a uniform draw
    /// in `[1, range]`; zero or negative reseeds the generator and returns 0
    /// (negative reseeds predictably with `|range|` as the seed, zero reseeds
    /// from system entropy).
    pub fn random(&mut self, range: i16) -> u16 {
        match range.cmp(&0) {
            std::cmp::Ordering::Greater => 1 + (self.gen_unsigned_rand() % range as u16),
            std::cmp::Ordering::Less => {
                self.reseed((-range) as u64);
                0
            }
            std::cmp::Ordering::Equal => {
                self.reseed_unpredictable();
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_range_is_within_bounds() {
        let mut r = ZRand::new_predictable(1);
        for _ in 0..100 {
            let v = r.random(6);
            assert!((1..=6).contains(&v));
        }
    }

    #[test]
    fn negative_range_reseeds_and_returns_zero() {
        let mut r = ZRand::new_uniform();
        assert_eq!(r.random(-42), 0);
        assert!(matches!(r.rand_mode, RandMode::Predictable));
    }

    #[test]
    fn zero_range_reseeds_unpredictably_and_returns_zero() {
        let mut r = ZRand::new_predictable(1);
        assert_eq!(r.random(0), 0);
        assert!(matches!(r.rand_mode, RandMode::RandomUniform));
    }

    #[test]
    fn predictable_seed_is_deterministic() {
        let mut a = ZRand::new_predictable(7);
        let mut b = ZRand::new_predictable(7);
        let seq_a: Vec<u16> = (0..10).map(|_| a.random(1000)).collect();
        let seq_b: Vec<u16> = (0..10).map(|_| b.random(1000)).collect();
        assert_eq!(seq_a, seq_b);
    }
}
