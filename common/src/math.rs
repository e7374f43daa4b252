use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A probability in the range 0-1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probability(f64);

impl Probability {
    pub fn new(value: f64) -> Probability {
        assert!(
            (0.0..=1.0).contains(&value),
            "A probability needs to be in the interval [0.0, 1.0], got: {value}"
        );
        Probability(value)
    }

    pub fn log_odds(&self) -> LogOdds {
        LogOdds((self.0 / (1.0 - self.0)).ln())
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<LogOdds> for Probability {
    fn from(value: LogOdds) -> Self {
        value.probability()
    }
}

/// A probability in log-odds representation. Positive values mean "more likely occupied".
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct LogOdds(f64);

impl LogOdds {
    pub const ZERO: LogOdds = LogOdds(0.0);

    pub const fn new(value: f64) -> LogOdds {
        LogOdds(value)
    }

    /// The log-odds increment that corresponds to an odds ratio of `ratio : 1`, i.e. `ln(ratio)`.
    pub fn from_ratio(ratio: f64) -> LogOdds {
        LogOdds(ratio.ln())
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn probability(&self) -> Probability {
        Probability(1.0 - 1.0 / (1.0 + self.0.exp()))
    }

    /// Saturates the value to the interval `[min, max]`.
    pub fn clamp(self, min: LogOdds, max: LogOdds) -> LogOdds {
        LogOdds(self.0.clamp(min.0, max.0))
    }
}

impl From<Probability> for LogOdds {
    fn from(value: Probability) -> Self {
        value.log_odds()
    }
}

impl Add<LogOdds> for LogOdds {
    type Output = LogOdds;

    fn add(self, rhs: LogOdds) -> Self::Output {
        LogOdds(self.0 + rhs.0)
    }
}

impl AddAssign<LogOdds> for LogOdds {
    fn add_assign(&mut self, rhs: LogOdds) {
        self.0 += rhs.0
    }
}

impl Sub<LogOdds> for LogOdds {
    type Output = LogOdds;

    fn sub(self, rhs: LogOdds) -> Self::Output {
        LogOdds(self.0 - rhs.0)
    }
}

impl SubAssign<LogOdds> for LogOdds {
    fn sub_assign(&mut self, rhs: LogOdds) {
        self.0 -= rhs.0
    }
}

impl Neg for LogOdds {
    type Output = LogOdds;

    fn neg(self) -> Self::Output {
        LogOdds(-self.0)
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn inverse() {
        for v in 1..100 {
            let value = v as f64 / 100.0;

            assert_relative_eq!(
                Probability::new(value).log_odds().probability().value(),
                value,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn even_odds_is_zero() {
        assert_relative_eq!(Probability::new(0.5).log_odds().value(), 0.0);
        assert_relative_eq!(LogOdds::ZERO.probability().value(), 0.5);
    }

    #[test]
    fn ratio_and_clamp() {
        let delta = LogOdds::from_ratio(4.0);
        assert_relative_eq!(delta.value(), 4.0f64.ln());

        let min = LogOdds::new(-6.0);
        let max = LogOdds::new(6.0);

        let mut l = LogOdds::ZERO;
        for _ in 0..10 {
            l = (l + delta).clamp(min, max);
        }
        assert_eq!(l, max);

        for _ in 0..20 {
            l = (l - delta).clamp(min, max);
        }
        assert_eq!(l, min);
        assert_eq!(-min, max);
    }
}
