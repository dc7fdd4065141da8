//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/transactions/{transaction_id}', use [format_endpoint].

/// The route to create and list transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route for the monthly income and expense summary.
pub const TRANSACTIONS_SUMMARY: &str = "/api/transactions/summary";
/// The route to get, update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route for the acting user's personal dashboard.
pub const PERSONAL_DASHBOARD: &str = "/api/dashboard/personal";
/// The route for the dashboard of the acting user's family.
pub const FAMILY_DASHBOARD: &str = "/api/dashboard/family";
/// The route for the acting user's profile.
pub const ME: &str = "/api/me";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is the text between the first pair of braces, for example
/// '{transaction_id}' in '/api/transactions/{transaction_id}'.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{id}{}",
        &endpoint_path[..param_start],
        &endpoint_path[param_end..]
    )
}
