//! Application router configuration.

use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState, Error,
    dashboard::{
        get_family_dashboard_endpoint, get_monthly_summary_endpoint,
        get_personal_dashboard_endpoint,
    },
    endpoints,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        list_transactions_endpoint, update_transaction_endpoint,
    },
    user::get_profile_endpoint,
};

/// Return a router with all the app's routes.
///
/// Every route identifies the acting user with the [crate::ACTOR_HEADER] header.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::TRANSACTIONS,
            post(create_transaction_endpoint).get(list_transactions_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_SUMMARY,
            get(get_monthly_summary_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .patch(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::PERSONAL_DASHBOARD,
            get(get_personal_dashboard_endpoint),
        )
        .route(
            endpoints::FAMILY_DASHBOARD,
            get(get_family_dashboard_endpoint),
        )
        .route(endpoints::ME, get(get_profile_endpoint))
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}

#[cfg(test)]
mod router_tests {
    use axum::http::{HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use time::macros::datetime;

    use crate::{
        ACTOR_HEADER, AppState, build_router,
        endpoints::{self, format_endpoint},
        family::{FamilyRole, add_family_member, create_family},
        user::{UserID, create_user},
    };

    struct TestApp {
        server: TestServer,
        alice: UserID,
        bob: UserID,
        family_id: i64,
    }

    fn get_test_app() -> TestApp {
        let state = AppState::new(Connection::open_in_memory().unwrap(), "Pacific/Auckland")
            .expect("Could not create app state.");

        let (alice, bob, family_id) = {
            let conn = state.db_connection.lock().unwrap();
            let alice = create_user("Alice", None, "alice@example.com", &conn).unwrap();
            let bob = create_user("Bob", None, "bob@example.com", &conn).unwrap();
            let family =
                create_family("Home", alice.id, datetime!(2025-01-01 0:00 UTC), &conn).unwrap();
            add_family_member(
                family.id,
                bob.id,
                FamilyRole::Member,
                datetime!(2025-01-02 0:00 UTC),
                &conn,
            )
            .unwrap();

            (alice.id, bob.id, family.id)
        };

        let server = TestServer::try_new(build_router(state)).expect("Could not create test server.");

        TestApp {
            server,
            alice,
            bob,
            family_id,
        }
    }

    fn actor_header(user_id: UserID) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static(ACTOR_HEADER),
            HeaderValue::from(user_id.as_i64()),
        )
    }

    #[tokio::test]
    async fn requests_without_actor_are_unauthenticated() {
        let app = get_test_app();

        let response = app.server.get(endpoints::PERSONAL_DASHBOARD).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.json::<Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = get_test_app();

        app.server
            .get("/api/nope")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn equal_split_shows_up_in_family_dashboard() {
        let app = get_test_app();
        let (name, value) = actor_header(app.alice);
        let body = json!({
            "type": "EXPENSE",
            "amount": "100.00",
            "description": "Groceries",
            "date": "2025-03-10",
            "familyId": app.family_id,
            "split": { "type": "EQUAL" },
            "localId": "phone-7",
        });

        let created = app
            .server
            .post(endpoints::TRANSACTIONS)
            .add_header(name.clone(), value.clone())
            .json(&body)
            .await;
        created.assert_status(StatusCode::CREATED);
        let created = created.json::<Value>();
        assert_eq!(created["isPersonal"], json!(false));
        assert_eq!(created["splitType"], json!("EQUAL"));
        assert_eq!(created["splits"].as_array().map(Vec::len), Some(2));
        assert_eq!(created["splits"][0]["amount"], json!("50.00"));

        let replayed = app
            .server
            .post(endpoints::TRANSACTIONS)
            .add_header(name.clone(), value.clone())
            .json(&body)
            .await;
        replayed.assert_status(StatusCode::OK);
        assert_eq!(replayed.json::<Value>()["id"], created["id"]);

        let (bob_name, bob_value) = actor_header(app.bob);
        let dashboard = app
            .server
            .get(endpoints::FAMILY_DASHBOARD)
            .add_query_param("month", 3)
            .add_query_param("year", 2025)
            .add_header(bob_name, bob_value)
            .await;
        dashboard.assert_status_ok();
        let dashboard = dashboard.json::<Value>();
        assert_eq!(dashboard["summary"]["totalExpense"], json!("100.00"));
        assert_eq!(dashboard["trend"].as_array().map(Vec::len), Some(6));
        assert_eq!(dashboard["memberBalances"][0]["balance"], json!("50.00"));
        assert_eq!(dashboard["memberBalances"][1]["balance"], json!("-50.00"));
    }

    #[tokio::test]
    async fn invalid_percentages_are_rejected() {
        let app = get_test_app();
        let (name, value) = actor_header(app.alice);

        let response = app
            .server
            .post(endpoints::TRANSACTIONS)
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "type": "EXPENSE",
                "amount": 100,
                "description": "Holiday",
                "familyId": app.family_id,
                "split": {
                    "type": "PERCENTAGE",
                    "shares": [
                        { "userId": app.alice.as_i64(), "percentage": 50 },
                        { "userId": app.bob.as_i64(), "percentage": 40 },
                    ],
                },
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["error"],
            json!("percentages must sum to 100")
        );
        let listed = app
            .server
            .get(endpoints::TRANSACTIONS)
            .add_header(name, value)
            .await
            .json::<Value>();
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn summary_update_and_delete_round_trip() {
        let app = get_test_app();
        let (name, value) = actor_header(app.alice);
        let created = app
            .server
            .post(endpoints::TRANSACTIONS)
            .add_header(name.clone(), value.clone())
            .json(&json!({
                "type": "INCOME",
                "amount": "2500",
                "description": "Salary",
                "date": "2025-04-01",
            }))
            .await
            .json::<Value>();
        let id = created["id"].as_i64().unwrap();
        let path = format_endpoint(endpoints::TRANSACTION, id);

        let summary = app
            .server
            .get(endpoints::TRANSACTIONS_SUMMARY)
            .add_query_param("month", 4)
            .add_query_param("year", 2025)
            .add_header(name.clone(), value.clone())
            .await
            .json::<Value>();
        assert_eq!(summary["totalIncome"], json!("2500.00"));
        assert_eq!(summary["startDate"], json!("2025-04-01"));
        assert_eq!(summary["endDate"], json!("2025-04-30"));

        let updated = app
            .server
            .patch(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({ "amount": "2600" }))
            .await;
        updated.assert_status_ok();
        assert_eq!(updated.json::<Value>()["splitsStale"], json!(false));

        let (bob_name, bob_value) = actor_header(app.bob);
        app.server
            .delete(&path)
            .add_header(bob_name, bob_value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
        app.server
            .delete(&path)
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.server
            .get(&path)
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn profile_reports_active_family() {
        let app = get_test_app();
        let (name, value) = actor_header(app.bob);

        let profile = app
            .server
            .get(endpoints::ME)
            .add_header(name, value)
            .await
            .json::<Value>();

        assert_eq!(profile["displayName"], json!("Bob"));
        assert_eq!(profile["hasFamily"], json!(true));
        assert_eq!(profile["activeFamily"]["familyId"], json!(app.family_id));
        assert_eq!(profile["activeFamily"]["role"], json!("MEMBER"));
    }
}
