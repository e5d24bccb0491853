//! Conversion rates between currencies.
//!
//! Expense amounts are captured in the currency they were incurred in and
//! converted into the company base currency at submission time. The engine
//! only knows the [`RateProvider`] seam; where rates come from (a fixed
//! table, an external feed) is the caller's business.

use crate::{Currency, EngineError, ResultEngine};

/// Exchange rate expressed as an exact `numerator / denominator` ratio
/// between **minor units** of two currencies.
///
/// Keeping the ratio rational avoids float drift: `1 EUR = 1.0843 USD`
/// becomes `Rate { numerator: 10_843, denominator: 10_000 }`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rate {
    pub numerator: i64,
    pub denominator: i64,
}

impl Rate {
    /// Identity rate (same currency on both sides).
    pub const ONE: Rate = Rate {
        numerator: 1,
        denominator: 1,
    };

    /// Applies the rate to an amount of minor units, rounding half away
    /// from zero. Intermediate math is done in `i128` so the product cannot
    /// overflow for any realistic amount.
    #[must_use]
    pub fn apply(self, amount_minor: i64) -> i64 {
        let num = i128::from(amount_minor) * i128::from(self.numerator);
        let den = i128::from(self.denominator);
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        rounded as i64
    }
}

/// Source of conversion rates.
pub trait RateProvider: Send + Sync {
    /// Returns the minor-unit rate from `from` to `to`, or `None` when the
    /// pair is not quoted.
    fn rate(&self, from: Currency, to: Currency) -> Option<Rate>;
}

/// Static rate table, quoted against EUR and derived for cross pairs.
///
/// Stand-in for a live feed; good enough for a deployment that refreshes
/// the table out of band.
#[derive(Debug, Default)]
pub struct FixedRates;

impl FixedRates {
    /// Minor units of one EUR expressed in minor units of `currency`.
    const fn per_eur(currency: Currency) -> Rate {
        match currency {
            Currency::Eur => Rate::ONE,
            Currency::Usd => Rate {
                numerator: 10_843,
                denominator: 10_000,
            },
            Currency::Gbp => Rate {
                numerator: 8_561,
                denominator: 10_000,
            },
            Currency::Inr => Rate {
                numerator: 907_510,
                denominator: 10_000,
            },
            // JPY has 0 minor units, so the denominator also absorbs the
            // two EUR fraction digits.
            Currency::Jpy => Rate {
                numerator: 16_102,
                denominator: 10_000,
            },
        }
    }
}

impl RateProvider for FixedRates {
    fn rate(&self, from: Currency, to: Currency) -> Option<Rate> {
        if from == to {
            return Some(Rate::ONE);
        }
        let from_eur = Self::per_eur(from);
        let to_eur = Self::per_eur(to);
        // from -> EUR -> to
        Some(Rate {
            numerator: to_eur.numerator * from_eur.denominator,
            denominator: to_eur.denominator * from_eur.numerator,
        })
    }
}

/// Converts an amount between currencies through the given provider.
pub(crate) fn convert(
    rates: &dyn RateProvider,
    amount_minor: i64,
    from: Currency,
    to: Currency,
) -> ResultEngine<i64> {
    if from == to {
        return Ok(amount_minor);
    }
    let rate = rates.rate(from, to).ok_or_else(|| {
        EngineError::CurrencyMismatch(format!("no rate quoted for {from} -> {to}"))
    })?;
    Ok(rate.apply(amount_minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_rate_keeps_amount() {
        assert_eq!(
            convert(&FixedRates, 1234, Currency::Eur, Currency::Eur).unwrap(),
            1234
        );
    }

    #[test]
    fn eur_to_usd_rounds_to_minor_units() {
        // 10.00 EUR at 1.0843 = 10.843 USD -> 10.84 USD
        assert_eq!(
            convert(&FixedRates, 1000, Currency::Eur, Currency::Usd).unwrap(),
            1084
        );
    }

    #[test]
    fn cross_pair_goes_through_eur() {
        let rate = FixedRates.rate(Currency::Usd, Currency::Gbp).unwrap();
        // 1 USD = 0.8561 / 1.0843 GBP ~= 0.7896 GBP
        assert_eq!(rate.apply(10_000), 7_896);
    }

    #[test]
    fn negative_amounts_round_away_from_zero() {
        let rate = Rate {
            numerator: 1,
            denominator: 3,
        };
        assert_eq!(rate.apply(5), 2);
        assert_eq!(rate.apply(-5), -2);
    }
}
