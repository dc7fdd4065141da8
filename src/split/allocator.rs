//! Turns the total of a shared transaction into per-member shares.
//!
//! Allocation is a pure computation: it either produces a complete, validated
//! set of shares or fails without producing anything.

use std::{collections::HashSet, fmt::Display};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    money::{CENT, ONE_HUNDRED, TOLERANCE, has_whole_cents, round_money, within_tolerance},
    user::UserID,
};

/// The algorithm used to derive the shares of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SplitType {
    /// The payer covers the whole amount.
    Single,
    /// Every family member pays the same share.
    Equal,
    /// Each participant pays an explicit percentage.
    Percentage,
    /// Each participant pays an explicit amount.
    Manual,
}

impl SplitType {
    fn as_str(&self) -> &'static str {
        match self {
            SplitType::Single => "SINGLE",
            SplitType::Equal => "EQUAL",
            SplitType::Percentage => "PERCENTAGE",
            SplitType::Manual => "MANUAL",
        }
    }
}

impl Display for SplitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for SplitType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SplitType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "SINGLE" => Ok(SplitType::Single),
            "EQUAL" => Ok(SplitType::Equal),
            "PERCENTAGE" => Ok(SplitType::Percentage),
            "MANUAL" => Ok(SplitType::Manual),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A participant's requested percentage of the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentageInput {
    /// The participating family member.
    pub user_id: UserID,
    /// Their share of the total, between 0 and 100.
    pub percentage: Decimal,
}

/// A participant's requested amount of the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualInput {
    /// The participating family member.
    pub user_id: UserID,
    /// The amount they pay.
    pub amount: Decimal,
}

/// A split strategy together with the input its algorithm needs.
///
/// Serialized with the strategy name in the `type` field, e.g.
/// `{"type": "PERCENTAGE", "shares": [{"userId": 1, "percentage": 60}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum SplitStrategy {
    /// The payer covers the whole amount.
    Single,
    /// The total is divided evenly across the family's current members.
    Equal,
    /// The total is divided by explicit percentages.
    Percentage {
        /// One entry per participating member.
        shares: Vec<PercentageInput>,
    },
    /// The total is divided by explicit amounts.
    Manual {
        /// One entry per participating member.
        shares: Vec<ManualInput>,
    },
}

impl SplitStrategy {
    /// The [SplitType] recorded on the transaction for this strategy.
    pub fn split_type(&self) -> SplitType {
        match self {
            SplitStrategy::Single => SplitType::Single,
            SplitStrategy::Equal => SplitType::Equal,
            SplitStrategy::Percentage { .. } => SplitType::Percentage,
            SplitStrategy::Manual { .. } => SplitType::Manual,
        }
    }
}

/// One member's part of a transaction's total.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    /// The member that owes this share.
    pub user_id: UserID,
    /// The amount owed, rounded to cents.
    pub amount: Decimal,
    /// The share of the total as a percentage, rounded to two decimal places.
    pub percentage: Decimal,
}

/// Divide `total` between family members according to `strategy`.
///
/// `payer` is the member who paid and `members` is the family's current
/// membership, in a stable order. The amounts of the returned shares always
/// add up to `total` within [crate::money::TOLERANCE].
///
/// # Errors
///
/// Returns a:
/// - [Error::Validation] if `total` is not positive, if the strategy input is
///   malformed (empty, repeated members, negative values, non-members), if
///   percentages do not sum to 100, or if manual amounts do not sum to `total`,
/// - [Error::InvalidState] if an equal split is requested for a family with no members.
pub fn allocate(
    total: Decimal,
    strategy: &SplitStrategy,
    payer: UserID,
    members: &[UserID],
) -> Result<Vec<Share>, Error> {
    if total <= Decimal::ZERO {
        return Err(Error::Validation("amount must be positive".to_owned()));
    }

    match strategy {
        SplitStrategy::Single => Ok(allocate_single(total, payer)),
        SplitStrategy::Equal => allocate_equal(total, members),
        SplitStrategy::Percentage { shares } => {
            validate_participants(
                shares.iter().map(|share| (share.user_id, share.percentage)),
                members,
            )?;
            allocate_by_percentage(total, shares)
        }
        SplitStrategy::Manual { shares } => {
            validate_participants(shares.iter().map(|share| (share.user_id, share.amount)), members)?;
            allocate_manually(total, shares)
        }
    }
}

fn allocate_single(total: Decimal, payer: UserID) -> Vec<Share> {
    vec![Share {
        user_id: payer,
        amount: round_money(total),
        percentage: round_money(ONE_HUNDRED),
    }]
}

fn allocate_equal(total: Decimal, members: &[UserID]) -> Result<Vec<Share>, Error> {
    if members.is_empty() {
        return Err(Error::InvalidState(
            "cannot split equally across a family with no members".to_owned(),
        ));
    }

    let member_count = Decimal::from(members.len());
    let amount = total / member_count;
    let percentage = round_money(ONE_HUNDRED / member_count);

    let mut shares: Vec<Share> = members
        .iter()
        .map(|&user_id| Share {
            user_id,
            amount: round_money(amount),
            percentage,
        })
        .collect();

    settle_rounding_residual(total, &mut shares);

    Ok(shares)
}

fn allocate_by_percentage(total: Decimal, inputs: &[PercentageInput]) -> Result<Vec<Share>, Error> {
    let percentage_sum: Decimal = inputs.iter().map(|input| input.percentage).sum();

    if !within_tolerance(percentage_sum, ONE_HUNDRED) {
        return Err(Error::Validation("percentages must sum to 100".to_owned()));
    }

    // Amounts are proportional to the given percentages, which may sum to
    // anything within tolerance of 100.
    let mut shares: Vec<Share> = inputs
        .iter()
        .map(|input| Share {
            user_id: input.user_id,
            amount: round_money(total * input.percentage / percentage_sum),
            percentage: round_money(input.percentage),
        })
        .collect();

    settle_rounding_residual(total, &mut shares);

    Ok(shares)
}

fn allocate_manually(total: Decimal, inputs: &[ManualInput]) -> Result<Vec<Share>, Error> {
    if let Some(input) = inputs.iter().find(|input| !has_whole_cents(input.amount)) {
        return Err(Error::Validation(format!(
            "the share of user {} cannot have more than two decimal places",
            input.user_id
        )));
    }

    let amount_sum: Decimal = inputs.iter().map(|input| input.amount).sum();

    if !within_tolerance(amount_sum, total) {
        return Err(Error::Validation("amounts must sum to total".to_owned()));
    }

    Ok(inputs
        .iter()
        .map(|input| Share {
            user_id: input.user_id,
            amount: round_money(input.amount),
            percentage: round_money(input.amount / total * ONE_HUNDRED),
        })
        .collect())
}

/// Check the per-member input of a percentage or manual split.
fn validate_participants(
    entries: impl Iterator<Item = (UserID, Decimal)>,
    members: &[UserID],
) -> Result<(), Error> {
    let mut seen = HashSet::new();

    for (user_id, value) in entries {
        if !members.contains(&user_id) {
            return Err(Error::Validation(format!(
                "user {user_id} is not a member of the family"
            )));
        }

        if !seen.insert(user_id) {
            return Err(Error::Validation(format!(
                "user {user_id} appears more than once in the split"
            )));
        }

        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::Validation(format!(
                "the share of user {user_id} cannot be negative"
            )));
        }
    }

    if seen.is_empty() {
        return Err(Error::Validation(
            "the split must name at least one member".to_owned(),
        ));
    }

    Ok(())
}

/// Move whole cents between `shares` until their sum is within tolerance of `total`.
///
/// Rounding every share half-up drifts by at most half a cent per share, so
/// a single pass over the shares moving at most one cent each is enough. The
/// drift is only corrected once it exceeds the tolerance, so e.g. 100.00 split
/// three ways stays at 33.33 each. Cents are only taken from shares that have
/// at least one cent, so no share becomes negative.
fn settle_rounding_residual(total: Decimal, shares: &mut [Share]) {
    let share_sum: Decimal = shares.iter().map(|share| share.amount).sum();
    let residual = round_money(total) - share_sum;

    if within_tolerance(residual, Decimal::ZERO) {
        return;
    }

    let step = if residual.is_sign_positive() { CENT } else { -CENT };
    let mut excess = residual.abs() - TOLERANCE;

    for share in shares.iter_mut() {
        if excess <= Decimal::ZERO {
            break;
        }

        if share.amount + step >= Decimal::ZERO {
            share.amount += step;
            excess -= CENT;
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{
        Error,
        money::within_tolerance,
        split::{ManualInput, PercentageInput, Share, SplitStrategy, allocate},
        user::UserID,
    };

    fn members(count: i64) -> Vec<UserID> {
        (1..=count).map(UserID::new).collect()
    }

    fn sum_amounts(shares: &[Share]) -> Decimal {
        shares.iter().map(|share| share.amount).sum()
    }

    fn percentage_split(entries: &[(i64, Decimal)]) -> SplitStrategy {
        SplitStrategy::Percentage {
            shares: entries
                .iter()
                .map(|&(user_id, percentage)| PercentageInput {
                    user_id: UserID::new(user_id),
                    percentage,
                })
                .collect(),
        }
    }

    fn manual_split(entries: &[(i64, Decimal)]) -> SplitStrategy {
        SplitStrategy::Manual {
            shares: entries
                .iter()
                .map(|&(user_id, amount)| ManualInput {
                    user_id: UserID::new(user_id),
                    amount,
                })
                .collect(),
        }
    }

    #[test]
    fn single_assigns_everything_to_payer() {
        let payer = UserID::new(2);

        let shares = allocate(dec!(87.45), &SplitStrategy::Single, payer, &members(3)).unwrap();

        assert_eq!(
            shares,
            vec![Share {
                user_id: payer,
                amount: dec!(87.45),
                percentage: dec!(100),
            }]
        );
    }

    #[test]
    fn equal_split_across_three_members() {
        let shares =
            allocate(dec!(100.00), &SplitStrategy::Equal, UserID::new(1), &members(3)).unwrap();

        let amounts: Vec<Decimal> = shares.iter().map(|share| share.amount).collect();
        assert_eq!(amounts, vec![dec!(33.33), dec!(33.33), dec!(33.33)]);
        assert!(shares.iter().all(|share| share.percentage == dec!(33.33)));
        assert!(within_tolerance(sum_amounts(&shares), dec!(100.00)));
    }

    #[test]
    fn equal_split_stays_within_tolerance_for_many_members() {
        for (total, member_count) in [
            (dec!(0.05), 9),
            (dec!(10.00), 7),
            (dec!(100.00), 6),
            (dec!(1.00), 12),
            (dec!(999.99), 11),
        ] {
            let shares =
                allocate(total, &SplitStrategy::Equal, UserID::new(1), &members(member_count))
                    .unwrap();

            assert_eq!(shares.len(), member_count as usize);
            assert!(
                within_tolerance(sum_amounts(&shares), total),
                "{total} across {member_count} members summed to {}",
                sum_amounts(&shares)
            );
            assert!(shares.iter().all(|share| share.amount >= Decimal::ZERO));
        }
    }

    #[test]
    fn equal_split_fails_without_members() {
        let result = allocate(dec!(10), &SplitStrategy::Equal, UserID::new(1), &[]);

        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[test]
    fn percentage_split_sixty_forty() {
        let strategy = percentage_split(&[(1, dec!(60)), (2, dec!(40))]);

        let shares = allocate(dec!(100.00), &strategy, UserID::new(1), &members(2)).unwrap();

        assert_eq!(shares[0].amount, dec!(60.00));
        assert_eq!(shares[1].amount, dec!(40.00));
        assert_eq!(shares[0].percentage, dec!(60));
        assert_eq!(shares[1].percentage, dec!(40));
    }

    #[test]
    fn percentage_split_must_sum_to_one_hundred() {
        let strategy = percentage_split(&[(1, dec!(50)), (2, dec!(40))]);

        let result = allocate(dec!(100.00), &strategy, UserID::new(1), &members(2));

        assert_eq!(
            result,
            Err(Error::Validation("percentages must sum to 100".to_owned()))
        );
    }

    #[test]
    fn percentage_split_accepts_sum_within_tolerance() {
        let strategy =
            percentage_split(&[(1, dec!(33.33)), (2, dec!(33.33)), (3, dec!(33.33))]);

        let shares = allocate(dec!(10.00), &strategy, UserID::new(1), &members(3)).unwrap();

        assert!(within_tolerance(sum_amounts(&shares), dec!(10.00)));
    }

    #[test]
    fn percentage_split_rejects_non_members() {
        let strategy = percentage_split(&[(1, dec!(50)), (9, dec!(50))]);

        let result = allocate(dec!(100.00), &strategy, UserID::new(1), &members(2));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn percentage_split_rejects_repeated_members() {
        let strategy = percentage_split(&[(1, dec!(50)), (1, dec!(50))]);

        let result = allocate(dec!(100.00), &strategy, UserID::new(1), &members(2));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn percentage_split_rejects_negative_percentages() {
        let strategy = percentage_split(&[(1, dec!(120)), (2, dec!(-20))]);

        let result = allocate(dec!(100.00), &strategy, UserID::new(1), &members(2));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn manual_split_derives_percentages() {
        let strategy = manual_split(&[(1, dec!(70.00)), (2, dec!(30.00))]);

        let shares = allocate(dec!(100.00), &strategy, UserID::new(1), &members(2)).unwrap();

        assert_eq!(shares[0].amount, dec!(70.00));
        assert_eq!(shares[0].percentage, dec!(70.0));
        assert_eq!(shares[1].amount, dec!(30.00));
        assert_eq!(shares[1].percentage, dec!(30.0));
    }

    #[test]
    fn manual_split_must_sum_to_total() {
        let strategy = manual_split(&[(1, dec!(30.00)), (2, dec!(30.00))]);

        let result = allocate(dec!(100.00), &strategy, UserID::new(1), &members(2));

        assert_eq!(
            result,
            Err(Error::Validation("amounts must sum to total".to_owned()))
        );
    }

    #[test]
    fn manual_split_rejects_fractions_of_a_cent() {
        let strategy =
            manual_split(&[(1, dec!(33.335)), (2, dec!(33.335)), (3, dec!(33.335))]);

        let result = allocate(dec!(100.00), &strategy, UserID::new(1), &members(3));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn manual_split_stays_within_tolerance() {
        for (total, amounts) in [
            (dec!(100.00), vec![dec!(33.33), dec!(33.33), dec!(33.33)]),
            (dec!(100.00), vec![dec!(50.01), dec!(50.00)]),
            (dec!(0.03), vec![dec!(0.01), dec!(0.01), dec!(0.01)]),
            (dec!(12345678.90), vec![dec!(12345678.89), dec!(0)]),
            (dec!(7.5), vec![dec!(2.5), dec!(2.5), dec!(2.5)]),
        ] {
            let entries: Vec<(i64, Decimal)> =
                (1..).zip(amounts.iter().copied()).collect();
            let strategy = manual_split(&entries);

            let shares =
                allocate(total, &strategy, UserID::new(1), &members(entries.len() as i64))
                    .unwrap();

            assert!(
                within_tolerance(sum_amounts(&shares), total),
                "{amounts:?} of {total} summed to {}",
                sum_amounts(&shares)
            );
        }
    }

    #[test]
    fn percentage_split_stays_within_tolerance() {
        let percentage_sets = [
            vec![dec!(50), dec!(49.99)],
            vec![dec!(50), dec!(50.01)],
            vec![dec!(33.34), dec!(33.34), dec!(33.33)],
            vec![dec!(12.5), dec!(12.5), dec!(25), dec!(49.99)],
            vec![dec!(99.99), dec!(0)],
        ];

        for percentages in &percentage_sets {
            for total in [
                dec!(0.01),
                dec!(1.00),
                dec!(99.99),
                dec!(1000000.00),
                dec!(10000000000.00),
            ] {
                let entries: Vec<(i64, Decimal)> =
                    (1..).zip(percentages.iter().copied()).collect();
                let strategy = percentage_split(&entries);

                let shares =
                    allocate(total, &strategy, UserID::new(1), &members(entries.len() as i64))
                        .unwrap();

                assert!(
                    within_tolerance(sum_amounts(&shares), total),
                    "{percentages:?} of {total} summed to {}",
                    sum_amounts(&shares)
                );
                assert!(shares.iter().all(|share| share.amount >= Decimal::ZERO));
            }
        }
    }

    #[test]
    fn percentage_split_of_large_total_is_proportional() {
        let strategy = percentage_split(&[(1, dec!(50)), (2, dec!(49.99))]);

        let shares =
            allocate(dec!(1000000.00), &strategy, UserID::new(1), &members(2)).unwrap();

        assert_eq!(shares[0].amount, dec!(500050.01));
        assert_eq!(shares[1].amount, dec!(499949.99));
        assert_eq!(shares[0].percentage, dec!(50));
        assert_eq!(sum_amounts(&shares), dec!(1000000.00));
    }

    #[test]
    fn manual_split_allows_zero_share() {
        let strategy = manual_split(&[(1, dec!(25.00)), (2, dec!(0))]);

        let shares = allocate(dec!(25.00), &strategy, UserID::new(1), &members(2)).unwrap();

        assert_eq!(shares[1].amount, dec!(0));
        assert_eq!(shares[1].percentage, dec!(0));
    }

    #[test]
    fn empty_share_list_is_rejected() {
        let strategy = manual_split(&[]);

        let result = allocate(dec!(25.00), &strategy, UserID::new(1), &members(2));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn non_positive_total_is_rejected() {
        for total in [dec!(0), dec!(-5)] {
            let result = allocate(total, &SplitStrategy::Single, UserID::new(1), &members(1));

            assert!(matches!(result, Err(Error::Validation(_))));
        }
    }

    #[test]
    fn strategy_deserializes_from_tagged_json() {
        let strategy: SplitStrategy = serde_json::from_str(
            r#"{"type": "PERCENTAGE", "shares": [{"userId": 1, "percentage": 60}, {"userId": 2, "percentage": "40"}]}"#,
        )
        .unwrap();

        assert_eq!(strategy, percentage_split(&[(1, dec!(60)), (2, dec!(40))]));

        let strategy: SplitStrategy = serde_json::from_str(r#"{"type": "EQUAL"}"#).unwrap();
        assert_eq!(strategy, SplitStrategy::Equal);
    }
}
