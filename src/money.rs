//! Helpers for monetary amounts.
//!
//! Amounts are `rust_decimal::Decimal` values. They are rounded to two decimal
//! places with half-up rounding when they leave the engine, and compared
//! against each other with a fixed tolerance of one cent.

use rusqlite::types::{FromSqlError, FromSqlResult, ValueRef};
use rust_decimal::{Decimal, RoundingStrategy};

/// The number of fractional digits used for amounts and percentages at the boundary.
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// The largest difference at which two amounts (or percentage sums) are still considered equal.
pub const TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// One hundred, for percentage arithmetic.
pub const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// The smallest amount that can be expressed at the boundary, i.e. one cent.
pub const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round `value` to two decimal places, with midpoints rounded away from zero.
///
/// The result always carries exactly two fractional digits, so `50` becomes `50.00`.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_DECIMAL_PLACES);
    rounded
}

/// Whether `left` and `right` differ by no more than [TOLERANCE].
pub fn within_tolerance(left: Decimal, right: Decimal) -> bool {
    (left - right).abs() <= TOLERANCE
}

/// Whether `value` has no digits beyond whole cents, e.g. `12.5` but not `12.505`.
pub fn has_whole_cents(value: Decimal) -> bool {
    value.normalize().scale() <= MONEY_DECIMAL_PLACES
}

/// Encode an amount for storage as base-10 text with two fractional digits.
pub fn to_sql_text(value: Decimal) -> String {
    round_money(value).to_string()
}

/// Decode an amount stored by [to_sql_text].
///
/// Integer and real columns are accepted too so that hand-written rows still load.
pub fn from_sql_value(value: ValueRef<'_>) -> FromSqlResult<Decimal> {
    match value {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map_err(|error| FromSqlError::Other(Box::new(error)))?
            .parse::<Decimal>()
            .map_err(|error| FromSqlError::Other(Box::new(error))),
        ValueRef::Integer(integer) => Ok(Decimal::from(integer)),
        ValueRef::Real(real) => {
            Decimal::try_from(real).map_err(|error| FromSqlError::Other(Box::new(error)))
        }
        _ => Err(FromSqlError::InvalidType),
    }
}

/// Read a decimal column from a row.
pub fn get_decimal(row: &rusqlite::Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let value = row.get_ref(index)?;

    from_sql_value(value).map_err(|error| match error {
        FromSqlError::InvalidType => {
            rusqlite::Error::InvalidColumnType(index, "decimal".to_owned(), value.data_type())
        }
        error => rusqlite::Error::FromSqlConversionFailure(index, value.data_type(), Box::new(error)),
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{round_money, to_sql_text, within_tolerance};

    #[test]
    fn rounds_midpoint_up() {
        assert_eq!(round_money(dec!(0.125)), dec!(0.13));
        assert_eq!(round_money(dec!(33.333333)), dec!(33.33));
        assert_eq!(round_money(dec!(66.666666)), dec!(66.67));
    }

    #[test]
    fn tolerance_is_inclusive() {
        assert!(within_tolerance(dec!(99.99), dec!(100.00)));
        assert!(!within_tolerance(dec!(99.98), dec!(100.00)));
    }

    #[test]
    fn sql_text_has_two_fractional_digits() {
        assert_eq!(to_sql_text(dec!(60)), "60.00");
        assert_eq!(to_sql_text(dec!(12.345)), "12.35");
    }
}
