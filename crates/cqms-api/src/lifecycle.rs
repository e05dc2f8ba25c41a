//! Query lifecycle controller.
//!
//! ```text
//! LISTING --select--> DETAIL   --back / successful update--> LISTING
//! LISTING --add-----> CREATING --back / successful insert--> LISTING
//! ```
//!
//! Every operation takes the caller's [`Session`] explicitly and returns a
//! typed result; failed operations leave the session untouched.

use chrono::{DateTime, Utc};
use tracing::info;

use cqms_db::{Database, StatusUpdate};
use cqms_types::api::{ListParams, QueryForm};
use cqms_types::models::{Query, QueryStatus, QuerySummary, View};

use crate::capability::{self, Capability};
use crate::error::{ApiError, ApiResult, ValidationError};
use crate::session::Session;
use crate::validation;

pub const PAGE_SIZES: [usize; 4] = [5, 10, 20, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Result of a state-changing operation: the view the session ended up in,
/// plus whatever the operation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub view: View,
    pub value: T,
}

impl<T> Outcome<T> {
    fn new(session: &Session, value: T) -> Self {
        Self {
            view: session.view(),
            value,
        }
    }
}

/// One page of the filtered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPage {
    pub rows: Vec<QuerySummary>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

fn expect_view(session: &Session, allowed: impl Fn(View) -> bool, action: &'static str) -> ApiResult<()> {
    let view = session.view();
    if allowed(view) {
        Ok(())
    } else {
        Err(ApiError::InvalidTransition { view, action })
    }
}

/// Case-insensitive substring match against every column.
pub fn matches_search(row: &QuerySummary, term: &str) -> bool {
    let needle = term.to_lowercase();
    row.columns().iter().any(|col| col.to_lowercase().contains(&needle))
}

/// Status filter, then free-text search, then pagination.
pub fn filter_and_paginate(rows: Vec<QuerySummary>, params: &ListParams) -> ApiResult<QueryPage> {
    let per_page = params.per_page.unwrap_or(DEFAULT_PAGE_SIZE);
    if !PAGE_SIZES.contains(&per_page) {
        return Err(ValidationError::PageSize.into());
    }

    let term = params.search.as_deref().map(str::trim).unwrap_or_default();
    let filtered: Vec<QuerySummary> = rows
        .into_iter()
        .filter(|row| params.status.is_none_or(|status| row.status == status))
        .filter(|row| term.is_empty() || matches_search(row, term))
        .collect();

    let total = filtered.len();
    let total_pages = total.div_ceil(per_page);
    let page = params.page.unwrap_or(1).clamp(1, total_pages.max(1));
    let rows = filtered
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    Ok(QueryPage {
        rows,
        total,
        page,
        per_page,
        total_pages,
    })
}

/// Queries visible to the session, filtered and paginated.
pub fn list(session: &Session, db: &Database, params: &ListParams) -> ApiResult<QueryPage> {
    let user = session.require_user()?;
    let rows = db.list_queries(capability::visible_owner(user))?;
    filter_and_paginate(rows, params)
}

/// LISTING -> DETAIL. Support only.
pub fn select(session: &mut Session, db: &Database, query_id: i64) -> ApiResult<Outcome<Query>> {
    let user = session.require_user()?;
    capability::require(user.role, Capability::EditQuery)?;
    expect_view(session, |v| v == View::Listing, "select a query")?;

    let query = db.get_query(query_id)?.ok_or(ApiError::NotFound)?;
    session.select_query(query_id);
    Ok(Outcome::new(session, query))
}

/// The query behind the current DETAIL view.
pub fn selected(session: &Session, db: &Database) -> ApiResult<Query> {
    let user = session.require_user()?;
    capability::require(user.role, Capability::EditQuery)?;
    let View::Detail(query_id) = session.view() else {
        return Err(ApiError::InvalidTransition {
            view: session.view(),
            action: "open the query detail",
        });
    };
    db.get_query(query_id)?.ok_or(ApiError::NotFound)
}

/// DETAIL or CREATING -> LISTING. A no-op when already listing.
pub fn back(session: &mut Session) -> ApiResult<Outcome<()>> {
    session.require_user()?;
    session.return_to_listing();
    Ok(Outcome::new(session, ()))
}

/// LISTING -> CREATING. Client only.
pub fn begin_create(session: &mut Session) -> ApiResult<Outcome<()>> {
    let user = session.require_user()?;
    capability::require(user.role, Capability::CreateQuery)?;
    expect_view(session, |v| v == View::Listing, "add a query")?;

    session.enter_add_mode();
    Ok(Outcome::new(session, ()))
}

/// Submits the add form. On success the new query id is returned and the
/// session goes back to LISTING.
pub fn submit_new(
    session: &mut Session,
    db: &Database,
    form: &QueryForm,
    attachment: Option<&str>,
    now: DateTime<Utc>,
) -> ApiResult<Outcome<i64>> {
    let user = session.require_user()?;
    capability::require(user.role, Capability::CreateQuery)?;
    expect_view(session, |v| v == View::Creating, "submit a new query")?;

    let form = validation::validate_form(form)?;
    let attachment = validation::decode_attachment(attachment)?;

    let id = db.insert_query(user.id, &form, attachment.as_deref(), now)?;
    info!(query_id = id, user_id = user.id, "Query created");

    session.return_to_listing();
    Ok(Outcome::new(session, id))
}

/// Submits the detail form for the selected query. On success the session
/// goes back to LISTING.
pub fn submit_update(
    session: &mut Session,
    db: &Database,
    form: &QueryForm,
    status: QueryStatus,
    now: DateTime<Utc>,
) -> ApiResult<Outcome<()>> {
    let user = session.require_user()?;
    capability::require(user.role, Capability::EditQuery)?;
    let View::Detail(query_id) = session.view() else {
        return Err(ApiError::InvalidTransition {
            view: session.view(),
            action: "update a query",
        });
    };

    let form = validation::validate_form(form)?;

    match db.update_query(query_id, &form, status, now)? {
        StatusUpdate::Updated => {
            info!(query_id, user_id = user.id, status = %status, "Query updated");
            session.return_to_listing();
            Ok(Outcome::new(session, ()))
        }
        StatusUpdate::NotFound => Err(ApiError::NotFound),
        StatusUpdate::Rejected { from, to } => {
            Err(ValidationError::StatusTransition { from, to }.into())
        }
    }
}

/// Screenshot bytes of a query the session may see.
pub fn attachment(session: &Session, db: &Database, query_id: i64) -> ApiResult<Vec<u8>> {
    let user = session.require_user()?;
    let query = db.get_query(query_id)?.ok_or(ApiError::NotFound)?;
    // Hidden queries look the same as missing ones.
    if !capability::can_view(user, query.record.owner_user_id) {
        return Err(ApiError::NotFound);
    }
    query.attachment.ok_or(ApiError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cqms_types::models::{Role, User};

    use crate::error::AuthError;

    struct Fixture {
        db: Database,
        alice: User,
        bob: User,
        sam: User,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let make = |name: &str, role: Role| {
            let digest = cqms_crypto::password_digest("pw");
            let id = db.register_user(name, &digest, role).unwrap().unwrap();
            User {
                id,
                username: name.into(),
                role,
            }
        };
        let alice = make("alice", Role::Client);
        let bob = make("bob", Role::Client);
        let sam = make("sam", Role::Support);
        Fixture { db, alice, bob, sam }
    }

    fn logged_in(user: &User) -> Session {
        let mut session = Session::default();
        session.login(user.clone());
        session
    }

    fn form(heading: &str) -> QueryForm {
        QueryForm {
            email: "client@example.com".into(),
            mobile: "9876543210".into(),
            heading: heading.into(),
            description: "It broke".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn create(f: &Fixture, session: &mut Session, heading: &str) -> i64 {
        begin_create(session).unwrap();
        submit_new(session, &f.db, &form(heading), None, now()).unwrap().value
    }

    #[test]
    fn client_creates_query_and_returns_to_listing() {
        let f = fixture();
        let mut session = logged_in(&f.alice);

        let outcome = begin_create(&mut session).unwrap();
        assert_eq!(outcome.view, View::Creating);

        let outcome = submit_new(&mut session, &f.db, &form("Login issue"), None, now()).unwrap();
        assert_eq!(outcome.view, View::Listing);

        let page = list(&session, &f.db, &ListParams::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].id, outcome.value);
        assert_eq!(page.rows[0].status, QueryStatus::Open);

        let stored = f.db.get_query(outcome.value).unwrap().unwrap();
        assert_eq!(stored.record.owner_user_id, f.alice.id);
        assert_eq!(stored.record.closed_at, None);
    }

    #[test]
    fn invalid_form_stays_in_creating_without_writing() {
        let f = fixture();
        let mut session = logged_in(&f.alice);
        begin_create(&mut session).unwrap();

        let mut bad = form("Login issue");
        bad.email = "alice.example.com".into();
        let err = submit_new(&mut session, &f.db, &bad, None, now()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ValidationError::InvalidEmail)));

        bad.mobile = String::new();
        let err = submit_new(&mut session, &f.db, &bad, None, now()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ValidationError::MissingFields)));

        assert_eq!(session.view(), View::Creating);
        assert!(f.db.list_queries(None).unwrap().is_empty());
    }

    #[test]
    fn submit_requires_creating_view() {
        let f = fixture();
        let mut session = logged_in(&f.alice);
        let err = submit_new(&mut session, &f.db, &form("x"), None, now()).unwrap_err();
        assert!(matches!(
            err,
            ApiError::InvalidTransition {
                view: View::Listing,
                ..
            }
        ));
    }

    #[test]
    fn support_cannot_create_and_client_cannot_select() {
        let f = fixture();
        let mut alice = logged_in(&f.alice);
        let id = create(&f, &mut alice, "Billing");

        let mut sam = logged_in(&f.sam);
        assert!(matches!(begin_create(&mut sam), Err(ApiError::Forbidden { .. })));

        assert!(matches!(select(&mut alice, &f.db, id), Err(ApiError::Forbidden { .. })));
        assert_eq!(alice.view(), View::Listing);
    }

    #[test]
    fn client_cannot_update_even_with_a_forged_selection() {
        let f = fixture();
        let mut alice = logged_in(&f.alice);
        let id = create(&f, &mut alice, "Billing");
        alice.select_query(id);

        let err = submit_update(&mut alice, &f.db, &form("Billing"), QueryStatus::Closed, now())
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden { .. }));
        assert_eq!(
            f.db.get_query(id).unwrap().unwrap().record.status,
            QueryStatus::Open
        );
    }

    #[test]
    fn support_selects_closes_and_returns_to_listing() {
        let f = fixture();
        let mut alice = logged_in(&f.alice);
        let id = create(&f, &mut alice, "Billing");

        let mut sam = logged_in(&f.sam);
        let outcome = select(&mut sam, &f.db, id).unwrap();
        assert_eq!(outcome.view, View::Detail(id));
        assert_eq!(outcome.value.record.heading, "Billing");
        assert_eq!(selected(&sam, &f.db).unwrap().record.id, id);

        let outcome = submit_update(&mut sam, &f.db, &form("Billing"), QueryStatus::Closed, now())
            .unwrap();
        assert_eq!(outcome.view, View::Listing);

        let record = f.db.get_query(id).unwrap().unwrap().record;
        assert_eq!(record.status, QueryStatus::Closed);
        assert_eq!(record.closed_at, Some(now()));
    }

    #[test]
    fn failed_update_stays_in_detail() {
        let f = fixture();
        let mut alice = logged_in(&f.alice);
        let id = create(&f, &mut alice, "Billing");

        let mut sam = logged_in(&f.sam);
        select(&mut sam, &f.db, id).unwrap();

        let mut bad = form("Billing");
        bad.email = "nobody@nowhere".into();
        assert!(submit_update(&mut sam, &f.db, &bad, QueryStatus::Closed, now()).is_err());
        assert_eq!(sam.view(), View::Detail(id));

        submit_update(&mut sam, &f.db, &form("Billing"), QueryStatus::Closed, now()).unwrap();
        select(&mut sam, &f.db, id).unwrap();
        let err = submit_update(&mut sam, &f.db, &form("Billing"), QueryStatus::Open, now())
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::StatusTransition { .. })
        ));
        assert_eq!(sam.view(), View::Detail(id));
    }

    #[test]
    fn selecting_unknown_query_leaves_state_unchanged() {
        let f = fixture();
        let mut sam = logged_in(&f.sam);
        assert!(matches!(select(&mut sam, &f.db, 404), Err(ApiError::NotFound)));
        assert_eq!(sam.view(), View::Listing);
    }

    #[test]
    fn back_clears_both_flags() {
        let f = fixture();
        let mut alice = logged_in(&f.alice);
        begin_create(&mut alice).unwrap();
        assert_eq!(back(&mut alice).unwrap().view, View::Listing);
        assert_eq!(alice, logged_in(&f.alice));

        let mut sam = logged_in(&f.sam);
        let id = create(&f, &mut alice, "Refund");
        select(&mut sam, &f.db, id).unwrap();
        assert_eq!(back(&mut sam).unwrap().view, View::Listing);
        assert_eq!(sam, logged_in(&f.sam));
    }

    #[test]
    fn listing_respects_ownership() {
        let f = fixture();
        let mut alice = logged_in(&f.alice);
        let mut bob = logged_in(&f.bob);
        let a = create(&f, &mut alice, "Login issue");
        let b = create(&f, &mut bob, "Billing");

        let ids = |s: &Session| -> Vec<i64> {
            list(s, &f.db, &ListParams::default())
                .unwrap()
                .rows
                .iter()
                .map(|r| r.id)
                .collect()
        };
        assert_eq!(ids(&alice), vec![a]);
        assert_eq!(ids(&bob), vec![b]);
        assert_eq!(ids(&logged_in(&f.sam)), vec![b, a]);
    }

    #[test]
    fn logged_out_session_is_rejected() {
        let f = fixture();
        let session = Session::default();
        assert!(matches!(
            list(&session, &f.db, &ListParams::default()),
            Err(ApiError::Auth(AuthError::Unauthenticated))
        ));
    }

    #[test]
    fn attachments_are_only_served_to_viewers() {
        let f = fixture();
        let mut alice = logged_in(&f.alice);
        begin_create(&mut alice).unwrap();
        let jpeg = "/9j/4AAQ"; // FF D8 FF E0 00 10
        let id = submit_new(&mut alice, &f.db, &form("Crash"), Some(jpeg), now())
            .unwrap()
            .value;

        assert_eq!(attachment(&alice, &f.db, id).unwrap()[..3], [0xFF, 0xD8, 0xFF]);
        assert!(attachment(&logged_in(&f.sam), &f.db, id).is_ok());
        assert!(matches!(
            attachment(&logged_in(&f.bob), &f.db, id),
            Err(ApiError::NotFound)
        ));
    }

    fn summary(id: i64, heading: &str, status: QueryStatus) -> QuerySummary {
        QuerySummary {
            id,
            email: format!("user{id}@example.com"),
            mobile: "555".into(),
            heading: heading.into(),
            description: "desc".into(),
            status,
        }
    }

    #[test]
    fn search_is_case_insensitive_over_all_columns() {
        let rows = vec![
            summary(1, "Login issue", QueryStatus::Open),
            summary(2, "Billing", QueryStatus::Open),
        ];
        let params = ListParams {
            search: Some("log".into()),
            ..Default::default()
        };
        let page = filter_and_paginate(rows.clone(), &params).unwrap();
        assert_eq!(page.rows, vec![rows[0].clone()]);

        assert!(matches_search(&rows[1], "USER2@"));
        assert!(matches_search(&rows[1], "open"));
        assert!(!matches_search(&rows[1], "closed"));
    }

    #[test]
    fn status_filter_and_pages() {
        let rows: Vec<QuerySummary> = (1..=12)
            .rev()
            .map(|id| {
                let status = if id % 3 == 0 { QueryStatus::Closed } else { QueryStatus::Open };
                summary(id, "h", status)
            })
            .collect();

        let page = filter_and_paginate(rows.clone(), &ListParams::default()).unwrap();
        assert_eq!((page.total, page.total_pages, page.rows.len()), (12, 2, 10));

        let params = ListParams {
            page: Some(9),
            per_page: Some(5),
            ..Default::default()
        };
        let page = filter_and_paginate(rows.clone(), &params).unwrap();
        assert_eq!((page.page, page.total_pages, page.rows.len()), (3, 3, 2));

        let params = ListParams {
            status: Some(QueryStatus::Closed),
            ..Default::default()
        };
        let page = filter_and_paginate(rows.clone(), &params).unwrap();
        let ids: Vec<i64> = page.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![12, 9, 6, 3]);

        let params = ListParams {
            per_page: Some(7),
            ..Default::default()
        };
        assert!(matches!(
            filter_and_paginate(rows, &params),
            Err(ApiError::Validation(ValidationError::PageSize))
        ));
    }

    #[test]
    fn empty_list_has_zero_pages() {
        let page = filter_and_paginate(Vec::new(), &ListParams::default()).unwrap();
        assert_eq!((page.total, page.page, page.total_pages), (0, 1, 0));
    }
}
