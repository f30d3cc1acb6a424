//! Exact money arithmetic in integer minor units.

use std::{fmt, iter::Sum, ops::Add};

/// An amount in minor currency units (cents for USD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    /// Providers report money as integer minor units; the value is kept as is.
    pub fn from_minor_units(amount: i64) -> Self {
        Cents(amount)
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Cents {
    /// `units.cc`, e.g. `1234.05`, with a leading `-` for negative amounts.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents::ZERO, Add::add)
    }
}

/// Product-level price fields derived from its variants' prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceRange {
    /// Set only for single-variant products.
    pub price: Cents,
    pub min_price: Cents,
    pub max_price: Cents,
}

/// Aggregate variant prices into product price fields.
///
/// - one variant: `price` is its price, min/max stay zero;
/// - several: min/max are the extremes and `price` is zero; when every
///   variant costs the same, `min_price` is zero.
pub fn price_range(prices: &[Cents]) -> PriceRange {
    match prices {
        [] => PriceRange::default(),
        [only] => PriceRange {
            price: *only,
            ..PriceRange::default()
        },
        many => {
            let min = many.iter().copied().min().unwrap_or_default();
            let max = many.iter().copied().max().unwrap_or_default();
            PriceRange {
                price: Cents::ZERO,
                min_price: if min == max { Cents::ZERO } else { min },
                max_price: max,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn formats_units_and_cents() {
        insta::assert_snapshot!(Cents(123456).to_string(), @"1234.56");
        insta::assert_snapshot!(Cents(5).to_string(), @"0.05");
        insta::assert_snapshot!(Cents(-150).to_string(), @"-1.50");
    }

    #[test]
    fn equal_variant_prices_zero_the_minimum() {
        let r = price_range(&[Cents(1000), Cents(1000)]);
        assert_eq!(r.min_price, Cents::ZERO);
        assert_eq!(r.max_price, Cents(1000));
        assert_eq!(r.price, Cents::ZERO);
    }

    #[test]
    fn single_variant_sets_price_only() {
        let r = price_range(&[Cents(500)]);
        assert_eq!(
            r,
            PriceRange {
                price: Cents(500),
                min_price: Cents::ZERO,
                max_price: Cents::ZERO
            }
        );
    }

    proptest! {
        #[test]
        fn range_brackets_every_price(prices in prop::collection::vec(0i64..1_000_000, 2..8)) {
            let cents: Vec<Cents> = prices.iter().copied().map(Cents).collect();
            let r = price_range(&cents);
            for p in &cents {
                prop_assert!(*p <= r.max_price);
                if r.min_price != Cents::ZERO {
                    prop_assert!(r.min_price <= *p);
                }
            }
            let all_equal = cents.iter().all(|p| *p == cents[0]);
            prop_assert_eq!(r.min_price == Cents::ZERO, all_equal || cents.iter().any(|p| p.0 == 0));
        }
    }
}
