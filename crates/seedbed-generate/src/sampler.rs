use rand::distr::Uniform;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use seedbed_core::Error;

/// Domains every sampler can draw placeholder emails from.
pub const DEFAULT_EMAIL_DOMAINS: [&str; 3] = ["gmail.com", "instagram.com", "spotify.com"];

/// Pool-based random value source.
///
/// Backed by a seedable ChaCha stream so runs can be replayed.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: ChaCha8Rng,
    seed: u64,
    email_domains: Vec<String>,
}

impl RandomSampler {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            email_domains: DEFAULT_EMAIL_DOMAINS
                .iter()
                .map(|domain| domain.to_string())
                .collect(),
        }
    }

    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    /// Append placeholder domains after the built-in ones.
    pub fn with_email_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.email_domains.extend(domains.into_iter().map(Into::into));
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn email_domains(&self) -> &[String] {
        &self.email_domains
    }

    /// Draw `count` integers from `[offset, offset + pool_size)`.
    ///
    /// With `no_repeat` the draws form a uniform subset of the pool, which
    /// fails with `InvalidRange` when `count > pool_size`. `sorted` returns
    /// ascending order under either policy.
    pub fn draw(
        &mut self,
        offset: i64,
        pool_size: u64,
        count: usize,
        sorted: bool,
        no_repeat: bool,
    ) -> Result<Vec<i64>, Error> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if pool_size == 0 {
            return Err(Error::InvalidRange(format!(
                "cannot draw {count} values from an empty pool"
            )));
        }
        if no_repeat && count as u64 > pool_size {
            return Err(Error::InvalidRange(format!(
                "cannot draw {count} distinct values from a pool of {pool_size}"
            )));
        }

        let mut values: Vec<i64> = if no_repeat {
            let pool = usize::try_from(pool_size).map_err(|_| {
                Error::InvalidRange(format!("pool of {pool_size} is too large to sample"))
            })?;
            rand::seq::index::sample(&mut self.rng, pool, count)
                .into_iter()
                .map(|idx| offset + idx as i64)
                .collect()
        } else {
            (0..count)
                .map(|_| offset + self.rng.random_range(0..pool_size) as i64)
                .collect()
        };

        if sorted {
            values.sort_unstable();
        }
        Ok(values)
    }

    /// Uniform integer in `[min, max]`.
    pub fn int_in(&mut self, min: i64, max: i64) -> Result<i64, Error> {
        let range = Uniform::new_inclusive(min, max).map_err(|err| {
            Error::InvalidRange(format!("cannot draw from [{min}, {max}]: {err}"))
        })?;
        Ok(self.rng.sample(range))
    }

    /// Uniform real in `[min, max)`. The span `max - min` must be finite.
    pub fn float_in(&mut self, min: f64, max: f64) -> Result<f64, Error> {
        let range = Uniform::new(min, max).map_err(|err| {
            Error::InvalidRange(format!("cannot draw from [{min}, {max}): {err}"))
        })?;
        Ok(self.rng.sample(range))
    }

    /// Random wall-clock time formatted as `HH:MM:SS`.
    pub fn random_time(&mut self) -> String {
        let hours = self.rng.random_range(0..24);
        let minutes = self.rng.random_range(0..60);
        let seconds = self.rng.random_range(0..60);
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }

    /// Placeholder address: lower-cased name with spaces as underscores, at
    /// a domain drawn from the pool.
    pub fn random_email(&mut self, name: &str) -> String {
        let local = name.to_lowercase().replace(' ', "_");
        let domain = self
            .email_domains
            .choose(&mut self.rng)
            .map(String::as_str)
            .unwrap_or(DEFAULT_EMAIL_DOMAINS[0]);
        format!("{local}@{domain}")
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_repeat_rejects_oversized_draws() {
        let mut sampler = RandomSampler::seeded(1);
        let result = sampler.draw(1, 5, 6, false, true);
        assert!(matches!(result, Err(Error::InvalidRange(_))));
    }

    #[test]
    fn full_pool_without_repeat_is_a_sorted_permutation() {
        let mut sampler = RandomSampler::seeded(2);
        let values = sampler.draw(1, 5, 5, true, true).expect("draw");
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn draws_stay_inside_the_pool() {
        let mut sampler = RandomSampler::seeded(3);
        let values = sampler.draw(10, 4, 200, false, false).expect("draw");
        assert_eq!(values.len(), 200);
        assert!(values.iter().all(|value| (10..14).contains(value)));

        let distinct = sampler.draw(0, 1000, 50, false, true).expect("draw");
        let mut deduped = distinct.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), 50);
    }

    #[test]
    fn sorted_draws_are_ascending() {
        let mut sampler = RandomSampler::seeded(4);
        let values = sampler.draw(0, 10_000, 64, true, false).expect("draw");
        assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn same_seed_replays_the_same_stream() {
        let mut a = RandomSampler::seeded(99);
        let mut b = RandomSampler::seeded(99);
        assert_eq!(
            a.draw(0, 100, 10, false, false).expect("draw a"),
            b.draw(0, 100, 10, false, false).expect("draw b")
        );
        assert_eq!(a.random_time(), b.random_time());
    }

    #[test]
    fn random_time_is_well_formed() {
        let mut sampler = RandomSampler::seeded(5);
        for _ in 0..100 {
            let time = sampler.random_time();
            let parts: Vec<u32> = time
                .split(':')
                .map(|part| part.parse().expect("numeric part"))
                .collect();
            assert_eq!(time.len(), 8);
            assert!(parts[0] < 24 && parts[1] < 60 && parts[2] < 60);
        }
    }

    #[test]
    fn random_email_uses_the_domain_pool() {
        let mut sampler = RandomSampler::seeded(6).with_email_domains(["synergypath.io"]);
        assert_eq!(sampler.email_domains().len(), 4);
        for _ in 0..20 {
            let email = sampler.random_email("Ada Lovelace");
            let (local, domain) = email.split_once('@').expect("has @");
            assert_eq!(local, "ada_lovelace");
            assert!(sampler.email_domains().iter().any(|known| known == domain));
        }
    }

    #[test]
    fn range_draws_report_unusable_bounds() {
        let mut sampler = RandomSampler::seeded(7);
        assert!(matches!(
            sampler.float_in(-1e308, 1e308),
            Err(Error::InvalidRange(_))
        ));
        assert!(matches!(sampler.int_in(3, 1), Err(Error::InvalidRange(_))));

        let value = sampler.float_in(0.5, 1.0).expect("float");
        assert!((0.5..1.0).contains(&value));
        assert_eq!(sampler.int_in(4, 4).expect("int"), 4);
    }
}
