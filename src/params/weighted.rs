use rand::Rng;

use super::ParamError;

/// A discrete distribution over `T`, sampled in proportion to integer weights.
#[derive(Debug, Clone)]
pub struct WeightedTable<T> {
    options: Vec<(T, u32)>,
    total: u64,
}

impl<T: Clone> WeightedTable<T> {
    pub fn new(options: Vec<(T, u32)>) -> Result<Self, ParamError> {
        let total: u64 = options.iter().map(|(_, w)| u64::from(*w)).sum();
        if total == 0 {
            return Err(ParamError::ZeroTotalWeight);
        }
        Ok(Self { options, total })
    }

    pub fn total_weight(&self) -> u64 {
        self.total
    }

    pub fn options(&self) -> &[(T, u32)] {
        &self.options
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        let mut point = rng.gen_range(0..self.total);
        for (value, weight) in &self.options {
            let weight = u64::from(*weight);
            if point < weight {
                return value.clone();
            }
            point -= weight;
        }
        // `point < total` and the weights sum to `total`.
        unreachable!("weighted sample fell outside the table")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rejects_zero_total() {
        assert_eq!(
            WeightedTable::<u8>::new(vec![]).unwrap_err(),
            ParamError::ZeroTotalWeight
        );
        assert_eq!(
            WeightedTable::new(vec![(1u8, 0), (2u8, 0)]).unwrap_err(),
            ParamError::ZeroTotalWeight
        );
    }

    #[test]
    fn zero_weight_options_are_never_drawn() {
        let table = WeightedTable::new(vec![(1u8, 0), (2u8, 5), (3u8, 0)]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            assert_eq!(table.sample(&mut rng), 2);
        }
    }

    #[test]
    fn total_weight_sums_options() {
        let table = WeightedTable::new(vec![('a', 1), ('b', 3)]).unwrap();
        assert_eq!(table.total_weight(), 4);
        assert_eq!(table.options().len(), 2);
    }
}
