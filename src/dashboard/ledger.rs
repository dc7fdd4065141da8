//! The ledger aggregator: monthly summaries, trends, category breakdowns and
//! the personal and family dashboards built from them.
//!
//! Nothing here is cached, every call reads the transactions it needs.

use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    dashboard::{
        aggregation::{
            CategoryTotal, MemberBalance, MonthlySummary, TOP_CATEGORY_LIMIT, TrendPoint,
            member_balances, summarize,
        },
        period::{MonthPeriod, TREND_MONTHS, trailing_months},
        transaction::{
            Scope, ScopeKind, get_family_splits_in_date_range, get_transactions_in_date_range,
        },
    },
    database_id::FamilyId,
    family::{get_active_membership, get_family_members},
    user::UserID,
};

/// A user's personal finances for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDashboard {
    /// Totals for the selected month.
    pub summary: MonthlySummary,
    /// The six months ending with the current month, oldest first.
    pub trend: Vec<TrendPoint>,
    /// The largest categories of the selected month.
    pub top_categories: Vec<CategoryTotal>,
}

/// A family's shared finances for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDashboard {
    /// The ID of the family.
    pub family_id: FamilyId,
    /// The name of the family.
    pub family_name: String,
    /// Totals for the selected month.
    pub summary: MonthlySummary,
    /// The six months ending with the current month, oldest first.
    pub trend: Vec<TrendPoint>,
    /// The largest categories of the selected month.
    pub top_categories: Vec<CategoryTotal>,
    /// What each member paid and owes for the selected month.
    pub member_balances: Vec<MemberBalance>,
}

/// Resolve the scope a request asks for, using the active family of `user_id`
/// for [ScopeKind::Family].
///
/// # Errors
/// Returns [Error::NotFound] if a family scope is requested by a user without a family.
pub fn resolve_scope(
    user_id: UserID,
    kind: ScopeKind,
    connection: &Connection,
) -> Result<Scope, Error> {
    match kind {
        ScopeKind::Personal => Ok(Scope::Personal(user_id)),
        ScopeKind::Family => {
            get_active_membership(user_id, connection).map(|family| Scope::Family(family.family_id))
        }
    }
}

/// Income, expense and balance of `scope` for `period`.
pub fn monthly_summary(
    scope: Scope,
    period: MonthPeriod,
    connection: &Connection,
) -> Result<MonthlySummary, Error> {
    let entries = get_transactions_in_date_range(scope, period.date_range(), connection)?;
    tracing::debug!("summarizing {} transaction(s) for {scope:?}", entries.len());

    Ok(summarize(period, &entries))
}

/// Income, expense and balance of `scope` for each of the six months ending
/// with the month of `today`, oldest first.
pub fn monthly_trend(
    scope: Scope,
    today: Date,
    connection: &Connection,
) -> Result<Vec<TrendPoint>, Error> {
    let months = trailing_months(today, TREND_MONTHS)?;
    let (Some(first), Some(last)) = (months.first(), months.last()) else {
        return Ok(Vec::new());
    };

    let entries =
        get_transactions_in_date_range(scope, first.first_day()..=last.last_day(), connection)?;

    Ok(super::aggregation::monthly_trend(&months, &entries))
}

/// The largest categories of `scope` in `period`, at most `limit` of them.
pub fn top_categories(
    scope: Scope,
    period: MonthPeriod,
    limit: usize,
    connection: &Connection,
) -> Result<Vec<CategoryTotal>, Error> {
    let entries = get_transactions_in_date_range(scope, period.date_range(), connection)?;

    Ok(super::aggregation::top_categories(&entries, limit))
}

/// The personal dashboard of `user_id`.
pub fn personal_dashboard(
    user_id: UserID,
    period: MonthPeriod,
    today: Date,
    connection: &Connection,
) -> Result<PersonalDashboard, Error> {
    let scope = Scope::Personal(user_id);

    Ok(PersonalDashboard {
        summary: monthly_summary(scope, period, connection)?,
        trend: monthly_trend(scope, today, connection)?,
        top_categories: top_categories(scope, period, TOP_CATEGORY_LIMIT, connection)?,
    })
}

/// The dashboard of the active family of `user_id`.
///
/// # Errors
/// Returns [Error::NotFound] if the user does not belong to a family.
pub fn family_dashboard(
    user_id: UserID,
    period: MonthPeriod,
    today: Date,
    connection: &Connection,
) -> Result<FamilyDashboard, Error> {
    let membership = get_active_membership(user_id, connection)?;
    let scope = Scope::Family(membership.family_id);

    let entries = get_transactions_in_date_range(scope, period.date_range(), connection)?;
    let splits =
        get_family_splits_in_date_range(membership.family_id, period.date_range(), connection)?;
    let members = get_family_members(membership.family_id, connection)?;

    Ok(FamilyDashboard {
        family_id: membership.family_id,
        family_name: membership.family_name,
        summary: summarize(period, &entries),
        trend: monthly_trend(scope, today, connection)?,
        top_categories: super::aggregation::top_categories(&entries, TOP_CATEGORY_LIMIT),
        member_balances: member_balances(&members, &entries, &splits),
    })
}
