//! Dashboard HTTP handlers.
//!
//! This module contains:
//! - Route handlers for the monthly summary and the personal and family dashboards
//! - State and query types used by the handlers

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    Actor, AppState, Error,
    dashboard::{
        aggregation::MonthlySummary,
        ledger::{
            FamilyDashboard, PersonalDashboard, family_dashboard, monthly_summary,
            personal_dashboard, resolve_scope,
        },
        period::MonthPeriod,
        transaction::ScopeKind,
    },
    timezone::get_local_today,
};

/// The state needed for the dashboards and summaries.
///
/// Contains the database connection and timezone information required
/// by dashboard handlers.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The month to show. Missing fields default to the current month.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    /// The month number, 1-12.
    pub month: Option<u8>,
    /// The calendar year.
    pub year: Option<i32>,
}

/// The query parameters for the monthly summary.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    /// The month number, 1-12.
    pub month: Option<u8>,
    /// The calendar year.
    pub year: Option<i32>,
    /// Whether to summarize personal or family transactions, defaults to personal.
    pub scope: Option<ScopeKind>,
}

fn local_today(local_timezone: &str) -> Result<Date, Error> {
    get_local_today(local_timezone).ok_or_else(|| {
        tracing::error!("Invalid timezone {}", local_timezone);
        Error::InvalidTimezone(local_timezone.to_owned())
    })
}

fn resolve_period(month: Option<u8>, year: Option<i32>, today: Date) -> Result<MonthPeriod, Error> {
    MonthPeriod::new(
        year.unwrap_or(today.year()),
        month.unwrap_or(today.month() as u8),
    )
}

/// Income, expense and balance for one month of the acting user's personal
/// or family transactions.
pub async fn get_monthly_summary_endpoint(
    State(state): State<DashboardState>,
    actor: Actor,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<MonthlySummary>, Error> {
    let today = local_today(&state.local_timezone)?;
    let period = resolve_period(query.month, query.year, today)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    let scope = resolve_scope(
        actor.user_id(),
        query.scope.unwrap_or_default(),
        &connection,
    )?;

    monthly_summary(scope, period, &connection).map(Json)
}

/// The acting user's personal dashboard.
pub async fn get_personal_dashboard_endpoint(
    State(state): State<DashboardState>,
    actor: Actor,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<PersonalDashboard>, Error> {
    let today = local_today(&state.local_timezone)?;
    let period = resolve_period(query.month, query.year, today)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    personal_dashboard(actor.user_id(), period, today, &connection).map(Json)
}

/// The dashboard of the acting user's active family.
pub async fn get_family_dashboard_endpoint(
    State(state): State<DashboardState>,
    actor: Actor,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<FamilyDashboard>, Error> {
    let today = local_today(&state.local_timezone)?;
    let period = resolve_period(query.month, query.year, today)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)?;

    family_dashboard(actor.user_id(), period, today, &connection).map(Json)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query, State};
    use rusqlite::Connection;
    use time::macros::date;

    use super::{
        DashboardState, PeriodQuery, SummaryQuery, get_family_dashboard_endpoint,
        get_monthly_summary_endpoint, get_personal_dashboard_endpoint, resolve_period,
    };
    use crate::{
        Actor, Error,
        dashboard::ScopeKind,
        db::initialize,
        user::{User, create_user},
    };

    fn get_test_state() -> (DashboardState, User) {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let user = create_user("Kai", None, "kai@example.com", &conn).unwrap();

        let state = DashboardState {
            db_connection: Arc::new(Mutex::new(conn)),
            local_timezone: "Pacific/Auckland".to_owned(),
        };

        (state, user)
    }

    #[test]
    fn period_defaults_to_month_of_today() {
        let period = resolve_period(None, None, date!(2025 - 07 - 19)).unwrap();

        assert_eq!((period.year(), period.month()), (2025, 7));
    }

    #[test]
    fn period_uses_given_month_and_year() {
        let period = resolve_period(Some(2), Some(2024), date!(2025 - 07 - 19)).unwrap();

        assert_eq!(period.last_day(), date!(2024 - 02 - 29));
    }

    #[tokio::test]
    async fn summary_rejects_invalid_month() {
        let (state, user) = get_test_state();

        let result = get_monthly_summary_endpoint(
            State(state),
            Actor::new(user.id),
            Query(SummaryQuery {
                month: Some(13),
                ..Default::default()
            }),
        )
        .await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn family_summary_without_family_is_not_found() {
        let (state, user) = get_test_state();

        let result = get_monthly_summary_endpoint(
            State(state),
            Actor::new(user.id),
            Query(SummaryQuery {
                scope: Some(ScopeKind::Family),
                ..Default::default()
            }),
        )
        .await;

        assert_eq!(result.err(), Some(Error::NotFound));
    }

    #[tokio::test]
    async fn personal_dashboard_always_has_six_trend_points() {
        let (state, user) = get_test_state();

        let dashboard = get_personal_dashboard_endpoint(
            State(state),
            Actor::new(user.id),
            Query(PeriodQuery::default()),
        )
        .await
        .unwrap();

        assert_eq!(dashboard.trend.len(), 6);
        assert!(dashboard.top_categories.is_empty());
    }

    #[tokio::test]
    async fn dashboards_fail_on_invalid_timezone() {
        let (mut state, user) = get_test_state();
        state.local_timezone = "Middle/Earth".to_owned();

        let result = get_family_dashboard_endpoint(
            State(state),
            Actor::new(user.id),
            Query(PeriodQuery::default()),
        )
        .await;

        assert_eq!(
            result.err(),
            Some(Error::InvalidTimezone("Middle/Earth".to_owned()))
        );
    }
}
