//! Transaction data aggregation for the dashboards.
//!
//! Provides functions to total transactions by period, build the monthly trend,
//! group amounts by category, and work out who owes what within a family.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use crate::{
    dashboard::{
        period::MonthPeriod,
        transaction::{LedgerEntry, ShareEntry},
    },
    family::FamilyMember,
    money::{ONE_HUNDRED, round_money},
    transaction::TransactionType,
    user::UserID,
};

/// The number of categories shown on the dashboards.
pub const TOP_CATEGORY_LIMIT: usize = 5;

/// Income and expense totals for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    /// The month number, 1-12.
    pub month: u8,
    /// The calendar year.
    pub year: i32,
    /// The first day of the month.
    pub start_date: Date,
    /// The last day of the month.
    pub end_date: Date,
    /// The sum of all income.
    pub total_income: Decimal,
    /// The sum of all expenses.
    pub total_expense: Decimal,
    /// Income minus expenses.
    pub balance: Decimal,
    /// The number of transactions in the month.
    pub transaction_count: usize,
}

/// One month of the dashboard trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// The month number, 1-12.
    pub month: u8,
    /// The calendar year.
    pub year: i32,
    /// Three-letter month name, e.g. "Jan".
    pub label: &'static str,
    /// The sum of all income in the month.
    pub income: Decimal,
    /// The sum of all expenses in the month.
    pub expense: Decimal,
    /// Income minus expenses.
    pub balance: Decimal,
}

/// The total spent or earned under one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    /// The category's name, or "Uncategorized".
    pub name: String,
    /// The sum of the category's transactions.
    pub total: Decimal,
    /// The category's share of all categories' totals.
    pub percentage: Decimal,
}

/// What a family member paid compared to what they should have paid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberBalance {
    /// The member's user ID.
    pub user_id: UserID,
    /// The member's name.
    pub name: String,
    /// The total of the family transactions the member paid for.
    pub paid: Decimal,
    /// The total of the member's splits.
    pub should_pay: Decimal,
    /// `paid - should_pay`: positive if the family owes the member, negative if
    /// the member owes the family.
    pub balance: Decimal,
}

fn sum_by_type<'a>(entries: impl Iterator<Item = &'a LedgerEntry>) -> (Decimal, Decimal) {
    entries.fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(income, expense), entry| match entry.kind {
            TransactionType::Income => (income + entry.amount, expense),
            TransactionType::Expense => (income, expense + entry.amount),
        },
    )
}

/// Totals the entries that fall within `period`.
pub(super) fn summarize(period: MonthPeriod, entries: &[LedgerEntry]) -> MonthlySummary {
    let in_period: Vec<&LedgerEntry> = entries
        .iter()
        .filter(|entry| period.contains(entry.date))
        .collect();
    let (income, expense) = sum_by_type(in_period.iter().copied());

    MonthlySummary {
        month: period.month(),
        year: period.year(),
        start_date: period.first_day(),
        end_date: period.last_day(),
        total_income: round_money(income),
        total_expense: round_money(expense),
        balance: round_money(income - expense),
        transaction_count: in_period.len(),
    }
}

/// Builds one trend point per month in `months`, in the same order.
///
/// Months without transactions get zero totals.
pub(super) fn monthly_trend(months: &[MonthPeriod], entries: &[LedgerEntry]) -> Vec<TrendPoint> {
    months
        .iter()
        .map(|month| {
            let (income, expense) =
                sum_by_type(entries.iter().filter(|entry| month.contains(entry.date)));

            TrendPoint {
                month: month.month(),
                year: month.year(),
                label: month.short_label(),
                income: round_money(income),
                expense: round_money(expense),
                balance: round_money(income - expense),
            }
        })
        .collect()
}

/// Groups entries by category name and returns the `limit` largest groups,
/// largest first.
///
/// Percentages are taken over the totals of all categories, not just the
/// returned ones. Categories with equal totals keep the order in which they
/// first appear in `entries`.
pub(super) fn top_categories(entries: &[LedgerEntry], limit: usize) -> Vec<CategoryTotal> {
    let mut totals: Vec<(&str, Decimal)> = Vec::new();
    let mut index_by_name: HashMap<&str, usize> = HashMap::new();

    for entry in entries {
        let index = *index_by_name
            .entry(entry.category.as_str())
            .or_insert_with(|| {
                totals.push((entry.category.as_str(), Decimal::ZERO));
                totals.len() - 1
            });
        totals[index].1 += entry.amount;
    }

    let grand_total: Decimal = totals.iter().map(|(_, total)| *total).sum();

    // `sort_by` is stable, so ties keep their first-seen order.
    totals.sort_by(|(_, a), (_, b)| b.cmp(a));
    totals.truncate(limit);

    totals
        .into_iter()
        .map(|(name, total)| {
            let percentage = if grand_total.is_zero() {
                Decimal::ZERO
            } else {
                total / grand_total * ONE_HUNDRED
            };

            CategoryTotal {
                name: name.to_owned(),
                total: round_money(total),
                percentage: round_money(percentage),
            }
        })
        .collect()
}

/// Works out each member's balance from who paid for the family's transactions
/// and how they were split.
///
/// Only split transactions count towards what a member paid, since nobody
/// owes a share of an unsplit one. Amounts paid by, or split to, users that
/// are no longer members are ignored.
pub(super) fn member_balances(
    members: &[FamilyMember],
    entries: &[LedgerEntry],
    splits: &[ShareEntry],
) -> Vec<MemberBalance> {
    let mut paid: HashMap<UserID, Decimal> = HashMap::new();
    for entry in entries.iter().filter(|entry| entry.is_split) {
        *paid.entry(entry.payer).or_default() += entry.amount;
    }

    let mut should_pay: HashMap<UserID, Decimal> = HashMap::new();
    for split in splits {
        *should_pay.entry(split.user_id).or_default() += split.amount;
    }

    members
        .iter()
        .map(|member| {
            let paid = paid.get(&member.user_id).copied().unwrap_or_default();
            let should_pay = should_pay.get(&member.user_id).copied().unwrap_or_default();

            MemberBalance {
                user_id: member.user_id,
                name: member.name.clone(),
                paid: round_money(paid),
                should_pay: round_money(should_pay),
                balance: round_money(paid - should_pay),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::{
        Date,
        macros::{date, datetime},
    };

    use crate::{
        dashboard::{
            aggregation::{member_balances, monthly_trend, summarize, top_categories},
            period::{MonthPeriod, trailing_months},
            transaction::{LedgerEntry, ShareEntry},
        },
        family::{FamilyMember, FamilyRole},
        money::within_tolerance,
        transaction::TransactionType,
        user::UserID,
    };

    fn entry(kind: TransactionType, amount: Decimal, date: Date, category: &str) -> LedgerEntry {
        LedgerEntry {
            kind,
            amount,
            date,
            category: category.to_owned(),
            payer: UserID::new(1),
            is_split: true,
        }
    }

    fn expense(amount: Decimal, category: &str) -> LedgerEntry {
        entry(TransactionType::Expense, amount, date!(2025 - 03 - 10), category)
    }

    fn member(id: i64, name: &str) -> FamilyMember {
        FamilyMember {
            user_id: UserID::new(id),
            name: name.to_owned(),
            role: FamilyRole::Member,
            joined_at: datetime!(2025-01-01 0:00 UTC),
        }
    }

    #[test]
    fn summary_totals_income_and_expense() {
        let period = MonthPeriod::new(2025, 3).unwrap();
        let entries = vec![
            entry(TransactionType::Income, dec!(3000), date!(2025 - 03 - 01), "Salary"),
            expense(dec!(1200), "Rent"),
            expense(dec!(45.99), "Groceries"),
            // Outside the period.
            entry(TransactionType::Expense, dec!(99), date!(2025 - 04 - 01), "Rent"),
        ];

        let summary = summarize(period, &entries);

        assert_eq!(summary.total_income, dec!(3000.00));
        assert_eq!(summary.total_expense, dec!(1245.99));
        assert_eq!(summary.balance, dec!(1754.01));
        assert_eq!(summary.transaction_count, 3);
        assert_eq!(summary.start_date, date!(2025 - 03 - 01));
        assert_eq!(summary.end_date, date!(2025 - 03 - 31));
    }

    #[test]
    fn empty_summary_is_zero() {
        let summary = summarize(MonthPeriod::new(2025, 3).unwrap(), &[]);

        assert_eq!(summary.total_income, Decimal::ZERO);
        assert_eq!(summary.balance, Decimal::ZERO);
        assert_eq!(summary.transaction_count, 0);
    }

    #[test]
    fn trend_has_one_point_per_month_zero_filled() {
        let months = trailing_months(date!(2025 - 03 - 15), 6).unwrap();
        let entries = vec![
            entry(TransactionType::Income, dec!(100), date!(2024 - 12 - 31), ""),
            entry(TransactionType::Expense, dec!(40), date!(2025 - 03 - 01), ""),
        ];

        let trend = monthly_trend(&months, &entries);

        assert_eq!(trend.len(), 6);
        assert_eq!((trend[0].year, trend[0].month), (2024, 10));
        assert_eq!((trend[5].year, trend[5].month), (2025, 3));
        assert_eq!(trend[2].income, dec!(100));
        assert_eq!(trend[5].balance, dec!(-40));
        assert_eq!(trend[1].balance, Decimal::ZERO);
    }

    #[test]
    fn top_categories_sorted_limited_and_stable() {
        let entries = vec![
            expense(dec!(10), "A"),
            expense(dec!(50), "B"),
            expense(dec!(10), "C"),
            expense(dec!(30), "D"),
            expense(dec!(20), "E"),
            expense(dec!(10), "F"),
            expense(dec!(20), "B"),
        ];

        let top = top_categories(&entries, 5);

        let names: Vec<&str> = top.iter().map(|category| category.name.as_str()).collect();
        assert_eq!(names, vec!["B", "D", "E", "A", "C"]);
        assert_eq!(top[0].total, dec!(70));
        assert_eq!(top[0].percentage, dec!(46.67));
    }

    #[test]
    fn all_category_percentages_sum_to_one_hundred() {
        let entries = vec![
            expense(dec!(1), "A"),
            expense(dec!(1), "B"),
            expense(dec!(1), "C"),
        ];

        let top = top_categories(&entries, 5);
        let sum: Decimal = top.iter().map(|category| category.percentage).sum();

        assert!(within_tolerance(sum, dec!(100)), "got {sum}");
    }

    #[test]
    fn zero_total_gives_zero_percentages() {
        assert!(top_categories(&[], 5).is_empty());
    }

    #[test]
    fn member_balances_sum_to_zero_when_fully_split() {
        let members = vec![member(1, "Alice"), member(2, "Bob"), member(3, "Cleo")];
        let entries = vec![
            LedgerEntry {
                payer: UserID::new(1),
                ..expense(dec!(100), "Groceries")
            },
            LedgerEntry {
                payer: UserID::new(2),
                ..expense(dec!(60), "Fuel")
            },
        ];
        let splits = vec![
            ShareEntry {
                user_id: UserID::new(1),
                amount: dec!(33.33),
            },
            ShareEntry {
                user_id: UserID::new(2),
                amount: dec!(33.33),
            },
            ShareEntry {
                user_id: UserID::new(3),
                amount: dec!(33.34),
            },
            ShareEntry {
                user_id: UserID::new(1),
                amount: dec!(30),
            },
            ShareEntry {
                user_id: UserID::new(2),
                amount: dec!(30),
            },
        ];

        let balances = member_balances(&members, &entries, &splits);

        assert_eq!(balances[0].paid, dec!(100));
        assert_eq!(balances[0].should_pay, dec!(63.33));
        assert_eq!(balances[0].balance, dec!(36.67));
        assert_eq!(balances[1].balance, dec!(-3.33));
        assert_eq!(balances[2].balance, dec!(-33.34));
        let total: Decimal = balances.iter().map(|balance| balance.balance).sum();
        assert!(within_tolerance(total, Decimal::ZERO));
    }

    #[test]
    fn unsplit_family_transactions_do_not_count_as_paid() {
        let members = vec![member(1, "Alice"), member(2, "Bob")];
        let entries = vec![
            LedgerEntry {
                payer: UserID::new(1),
                ..expense(dec!(40), "Groceries")
            },
            LedgerEntry {
                payer: UserID::new(1),
                is_split: false,
                ..expense(dec!(50), "Gifts")
            },
        ];
        let splits = vec![
            ShareEntry {
                user_id: UserID::new(1),
                amount: dec!(20),
            },
            ShareEntry {
                user_id: UserID::new(2),
                amount: dec!(20),
            },
        ];

        let balances = member_balances(&members, &entries, &splits);

        assert_eq!(balances[0].paid, dec!(40));
        assert_eq!(balances[0].balance, dec!(20));
        assert_eq!(balances[1].balance, dec!(-20));
    }

    #[test]
    fn member_without_activity_has_zero_balance() {
        let balances = member_balances(&[member(7, "Gus")], &[], &[]);

        assert_eq!(balances[0].paid, Decimal::ZERO);
        assert_eq!(balances[0].balance, Decimal::ZERO);
    }
}
