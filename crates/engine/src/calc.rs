//! Valuation calculation library.
//!
//! Pure arithmetic shared by the WQS and sale-adjustment-grid rule sets.
//! Results are rounded to 2 decimals with [`round2`] unless noted. Non-finite
//! inputs are treated as 0.

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

#[inline]
fn finite(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Round to the nearest integer with halves going toward +∞.
///
/// Differs from `f64::round` for negative halves: `-2.5` rounds to `-2`.
pub fn round_half_up(x: f64) -> f64 {
    let floor = x.floor();
    if x - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

/// `round(x * 100) / 100`. The canonical rounding used by every other function.
pub fn round2(x: f64) -> f64 {
    round_half_up(finite(x) * 100.0) / 100.0
}

/// `floor(x / 10000) * 10000`. Used for the "rounded" final/appraisal values.
pub fn floor_to_ten_thousands(x: f64) -> f64 {
    (finite(x) / 10000.0).floor() * 10000.0
}

pub fn calc_weighted_score(weight: f64, score: f64) -> f64 {
    round2(finite(weight) * finite(score))
}

/// Sum of the numeric readings of `values`; anything non-numeric counts as 0.
pub fn calc_sum(values: &[FieldValue]) -> f64 {
    round2(values.iter().map(FieldValue::as_number).sum())
}

/// Sum of plain numbers, non-finite entries count as 0.
pub fn calc_sum_numbers(values: &[f64]) -> f64 {
    round2(values.iter().copied().map(finite).sum())
}

/// Subject property value minus survey value.
pub fn calc_diff(property_value: f64, survey_value: f64) -> f64 {
    round2(finite(property_value) - finite(survey_value))
}

pub fn calc_increase_decrease(unit_price: f64, diff: f64) -> f64 {
    round2(finite(unit_price) * finite(diff))
}

pub fn calc_total_second_revision(adjusted_value: f64, building_delta: f64, land_delta: f64) -> f64 {
    round2(finite(adjusted_value) + finite(building_delta) + finite(land_delta))
}

/// Adjusted value from an offering (asking) price.
///
/// A percentage discount wins over an amount. When only an amount is given
/// the result is the amount itself, not `price - amount`; existing worksheets
/// depend on that figure.
pub fn calc_adjusted_value_from_offering_price(price: f64, pct: f64, amt: f64) -> f64 {
    let price = finite(price);
    let pct = finite(pct);
    let amt = finite(amt);
    if price == 0.0 {
        0.0
    } else if pct > 0.0 {
        round2(price - price * pct / 100.0)
    } else if amt > 0.0 {
        round2(amt)
    } else {
        round2(price)
    }
}

/// Time-adjusted value from a selling price: `pct_per_year` compounded linearly.
pub fn calc_adjusted_value_from_selling_price(price: f64, years: f64, pct_per_year: f64) -> f64 {
    let price = finite(price);
    round2(price + price * finite(years) * finite(pct_per_year) / 100.0)
}

/// `weight` is a fraction (e.g. `1 / survey_count`), not a percent.
pub fn calc_weighted_adjust_value(total_adjust_value: f64, weight: f64) -> f64 {
    round2(finite(total_adjust_value) * finite(weight))
}

/// Percentage adjustment of `base`.
pub fn calc_adjust_amount(base: f64, pct: f64) -> f64 {
    round2(finite(base) * finite(pct) / 100.0)
}

/// How column weights are entered in a worksheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScale {
    /// `0.25` means a quarter.
    Fraction,
    /// `25` means a quarter.
    #[default]
    Percent,
}

impl WeightScale {
    pub fn to_fraction(self, weight: f64) -> f64 {
        match self {
            WeightScale::Fraction => finite(weight),
            WeightScale::Percent => finite(weight) / 100.0,
        }
    }

    /// Equal share of `count` columns, expressed in this scale.
    pub fn equal_weight(self, count: usize) -> f64 {
        if count == 0 {
            return 0.0;
        }
        match self {
            WeightScale::Fraction => 1.0 / count as f64,
            WeightScale::Percent => round2(100.0 / count as f64),
        }
    }
}

/// `x.toFixed(digits)` as the data layer renders it.
///
/// Uses the exact decimal expansion of `x` and rounds ties away from zero,
/// which `format!("{:.*}")` does not (it rounds ties to even).
pub fn to_fixed(x: f64, digits: usize) -> String {
    if x.is_nan() {
        return "NaN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    // 1100 fractional digits hold the exact expansion of any f64.
    let exact = format!("{:.1100}", x.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));
    let mut digits_buf: Vec<u8> = int_part.bytes().chain(frac_part.bytes().take(digits)).collect();
    let round_up = frac_part.as_bytes().get(digits).is_some_and(|d| *d >= b'5');

    if round_up {
        let mut i = digits_buf.len();
        loop {
            if i == 0 {
                digits_buf.insert(0, b'1');
                break;
            }
            i -= 1;
            if digits_buf[i] == b'9' {
                digits_buf[i] = b'0';
            } else {
                digits_buf[i] += 1;
                break;
            }
        }
    }

    let split = digits_buf.len() - digits;
    let mut out = String::with_capacity(digits_buf.len() + 2);
    if x < 0.0 {
        out.push('-');
    }
    out.push_str(std::str::from_utf8(&digits_buf[..split]).unwrap_or("0"));
    if digits > 0 {
        out.push('.');
        out.push_str(std::str::from_utf8(&digits_buf[split..]).unwrap_or(""));
    }
    out
}
