//! Dashboard module
//!
//! Aggregates transactions into monthly summaries, a six month trend, the
//! largest categories and, for families, what each member paid and owes.

mod aggregation;
mod handlers;
mod ledger;
mod period;
mod transaction;

pub use aggregation::{
    CategoryTotal, MemberBalance, MonthlySummary, TOP_CATEGORY_LIMIT, TrendPoint,
};
pub use handlers::{
    DashboardState, PeriodQuery, SummaryQuery, get_family_dashboard_endpoint,
    get_monthly_summary_endpoint, get_personal_dashboard_endpoint,
};
pub use ledger::{
    FamilyDashboard, PersonalDashboard, family_dashboard, monthly_summary, monthly_trend,
    personal_dashboard, resolve_scope, top_categories,
};
pub use period::{MonthPeriod, TREND_MONTHS, trailing_months};
pub use transaction::{Scope, ScopeKind};
