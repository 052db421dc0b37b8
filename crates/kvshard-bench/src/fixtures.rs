//! Test data generation for benchmarks.
//!
//! Generators are seeded so a run can be reproduced from its seed.

use std::time::{SystemTime, UNIX_EPOCH};

use kvshard_core::{stringify_age, Document, Nested, NestedOb, NestedTed, Pair};
use clap::ValueEnum;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Length of generated document ids.
pub const ID_LENGTH: usize = 12;

/// Length of generated store and database names.
pub const NAME_LENGTH: usize = 10;

/// Length of [`Document::long_string`].
const LONG_STRING_LENGTH: usize = 100;

/// Number of entries in [`Document::pairs`].
const PAIR_COUNT: usize = 10;

/// Mean of normally distributed ages.
pub const AGE_MEAN: f64 = 50.0;

/// Standard deviation of normally distributed ages.
pub const AGE_STD_DEV: f64 = 20.0;

/// Highest generated age.
pub const MAX_AGE: f64 = 100.0;

/// How document ages are drawn. Ages are always whole numbers in
/// `[0, MAX_AGE]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AgeDistribution {
    /// Uniform over `[0, MAX_AGE]`.
    #[default]
    Uniform,
    /// Normal around [`AGE_MEAN`], rounded and clamped to `[0, MAX_AGE]`.
    Normal,
}

impl AgeDistribution {
    /// Draw one age.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            AgeDistribution::Uniform => f64::from(rng.gen_range(0..=MAX_AGE as u32)),
            AgeDistribution::Normal => {
                let z: f64 = rng.sample(StandardNormal);
                (AGE_MEAN + AGE_STD_DEV * z).round().clamp(0.0, MAX_AGE)
            }
        }
    }
}

/// Generate a random alphanumeric string of specified length.
pub fn random_string(rng: &mut StdRng, len: usize) -> String {
    (0..len).map(|_| rng.sample(Alphanumeric) as char).collect()
}

/// Generate a random lowercase name usable for stores and databases.
pub fn random_name(rng: &mut StdRng) -> String {
    random_string(rng, NAME_LENGTH).to_ascii_lowercase()
}

/// The first half of `items`, rounded up.
pub fn half<T: Clone>(items: &[T]) -> Vec<T> {
    items[..items.len().div_ceil(2)].to_vec()
}

/// Produces benchmark documents with strictly increasing timestamps.
pub struct DocumentGenerator {
    rng: StdRng,
    ages: AgeDistribution,
    last_timestamp: u64,
}

impl DocumentGenerator {
    /// Create a generator with a fixed seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ages: AgeDistribution::default(),
            last_timestamp: 0,
        }
    }

    /// Create a generator seeded from `seed`, or from entropy when None.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::new(seed),
            None => Self {
                rng: StdRng::from_entropy(),
                ages: AgeDistribution::default(),
                last_timestamp: 0,
            },
        }
    }

    /// Draw ages from `ages`.
    pub fn with_age_distribution(mut self, ages: AgeDistribution) -> Self {
        self.ages = ages;
        self
    }

    /// The generator's random source, for names and shuffles that must
    /// follow the same seed.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Generate one document.
    pub fn document(&mut self) -> Document {
        let id = random_string(&mut self.rng, ID_LENGTH);
        let age = self.ages.sample(&mut self.rng);
        let nr = f64::from(self.rng.gen_range(0..=1000u32));
        let timestamp = self.next_timestamp();

        Document {
            age_stringified: stringify_age(age, &id),
            id,
            age,
            nr,
            timestamp,
            flag: self.rng.gen(),
            long_string: random_string(&mut self.rng, LONG_STRING_LENGTH),
            nested: Nested {
                ted: NestedTed {
                    ob: NestedOb {
                        ject: random_string(&mut self.rng, NAME_LENGTH),
                    },
                },
            },
            pairs: (0..PAIR_COUNT)
                .map(|_| Pair {
                    s: random_string(&mut self.rng, 4),
                    n: f64::from(self.rng.gen_range(0..=100u32)),
                })
                .collect(),
        }
    }

    /// Generate `count` documents.
    pub fn documents(&mut self, count: usize) -> Vec<Document> {
        (0..count).map(|_| self.document()).collect()
    }

    /// Generate `count` distinct random names.
    pub fn names(&mut self, count: usize) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(count);
        while names.len() < count {
            let name = random_name(&mut self.rng);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn next_timestamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }
}
