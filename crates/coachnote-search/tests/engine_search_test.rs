//! Engine behaviour over the in-memory store.

mod helpers;

use std::collections::HashSet;
use std::time::Duration;

use coachnote_core::allowed_levels;
use coachnote_search::{
    AccessLevel, AuditAction, CoachNoteRepository, CreateCoachNoteRequest, Error,
    InMemoryNoteStore, NoteSearchEngine, SearchConfig, SearchOptions, SortBy, SortOrder,
};
use helpers::{admin, coach, day, supervisor, Fixture};
use uuid::Uuid;

// =============================================================================
// ACCESS SCOPING
// =============================================================================

#[tokio::test]
async fn test_non_admin_sees_only_owned_shared_or_allowed_levels() {
    let f = Fixture::new();
    let mut n = 0;
    for owner in ["coach1", "coach2", "sup1"] {
        for level in AccessLevel::ALL {
            f.note(owner, level, n).await;
            n += 1;
        }
    }
    let shared = f
        .add(CreateCoachNoteRequest::new("coach2", "shared private").shared_with(["coach1"]))
        .await;

    for requester in [coach("coach1"), supervisor("sup1"), coach("nobody")] {
        let allowed = allowed_levels(&requester.role);
        let result = f
            .engine
            .search_notes(&requester, &SearchOptions::new().with_limit(100))
            .await
            .unwrap();
        assert!(!result.notes.is_empty());
        for hit in &result.notes {
            let note = &hit.note;
            assert!(
                note.coach_id == requester.user_id
                    || note.is_shared_with(&requester.user_id)
                    || allowed.contains(&note.access_level),
                "{} must not see {:?}",
                requester.user_id,
                note
            );
        }
        let ids: HashSet<Uuid> = result.notes.iter().map(|h| h.note.id).collect();
        assert_eq!(ids.contains(&shared), requester.user_id == "coach1");
    }
}

#[tokio::test]
async fn test_admin_is_unrestricted() {
    let f = Fixture::new();
    for (i, level) in AccessLevel::ALL.iter().enumerate() {
        f.note("coach2", *level, i as i64).await;
    }
    let result = f
        .engine
        .search_notes(&admin(), &SearchOptions::new())
        .await
        .unwrap();
    assert_eq!(result.total_count, AccessLevel::ALL.len() as i64);
}

#[tokio::test]
async fn test_unknown_role_sees_only_own_and_shared() {
    let f = Fixture::new();
    f.note("coach2", AccessLevel::Organization, 1).await;
    let own = f.note("client7", AccessLevel::Private, 2).await;

    let requester = coachnote_search::Requester::new("client7", "client");
    let result = f
        .engine
        .search_notes(&requester, &SearchOptions::new())
        .await
        .unwrap();
    assert_eq!(result.total_count, 1);
    assert_eq!(result.notes[0].note.id, own);
}

#[tokio::test]
async fn test_team_level_note_of_another_coach_is_visible_to_coach() {
    let f = Fixture::new();
    let team = f.note("coach2", AccessLevel::Team, 1).await;
    let result = f
        .engine
        .search_notes(&coach("coach1"), &SearchOptions::new())
        .await
        .unwrap();
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].note.id, team);
}

/// Owner coach1 private note vs. another coach's note at a level outside
/// the coach set; sharing brings the second in, newest first.
#[tokio::test]
async fn test_owner_and_share_example() {
    let f = Fixture::new();
    let note1 = f
        .add(
            CreateCoachNoteRequest::new("coach1", "first")
                .with_tags(["x"])
                .created_at(day(1)),
        )
        .await;
    let note2 = f
        .add(
            CreateCoachNoteRequest::new("coach2", "second")
                .with_tags(["x"])
                .with_access_level(AccessLevel::Supervisor)
                .created_at(day(2)),
        )
        .await;

    let opts = SearchOptions::new().with_tags(["x"]);
    let result = f.engine.search_notes(&coach("coach1"), &opts).await.unwrap();
    let ids: Vec<Uuid> = result.notes.iter().map(|h| h.note.id).collect();
    assert_eq!(ids, vec![note1]);

    f.store.share_with(note2, "coach2", "coach1").await.unwrap();
    let result = f.engine.search_notes(&coach("coach1"), &opts).await.unwrap();
    let ids: Vec<Uuid> = result.notes.iter().map(|h| h.note.id).collect();
    assert_eq!(ids, vec![note2, note1]);
}

// =============================================================================
// FILTERS
// =============================================================================

#[tokio::test]
async fn test_tag_filter_is_any_of() {
    let f = Fixture::new();
    let a = f
        .add(CreateCoachNoteRequest::new("c1", "a").with_tags(["a"]).created_at(day(1)))
        .await;
    let ab = f
        .add(CreateCoachNoteRequest::new("c1", "ab").with_tags(["a", "b"]).created_at(day(2)))
        .await;
    let b = f
        .add(CreateCoachNoteRequest::new("c1", "b").with_tags(["b"]).created_at(day(3)))
        .await;
    f.add(CreateCoachNoteRequest::new("c1", "c").with_tags(["c"]).created_at(day(4)))
        .await;

    let result = f
        .engine
        .search_notes(&admin(), &SearchOptions::new().with_tags(["a", "b"]))
        .await
        .unwrap();
    let ids: Vec<Uuid> = result.notes.iter().map(|h| h.note.id).collect();
    assert_eq!(ids, vec![b, ab, a]);
}

#[tokio::test]
async fn test_empty_filters_impose_no_constraint() {
    let f = Fixture::new();
    f.note("c1", AccessLevel::Team, 1).await;
    f.note("c1", AccessLevel::Private, 2).await;

    let opts = SearchOptions::new()
        .with_tags(Vec::<String>::new())
        .with_access_levels([])
        .with_date_range(None, None);
    let result = f.engine.search_notes(&admin(), &opts).await.unwrap();
    assert_eq!(result.total_count, 2);
    assert!(result.search_metadata.filters.is_empty());
}

#[tokio::test]
async fn test_structured_filters_are_and_combined() {
    let f = Fixture::new();
    let wanted = f
        .add(
            CreateCoachNoteRequest::new("c1", "match")
                .with_client("client-a")
                .with_session("s1")
                .with_access_level(AccessLevel::Team)
                .created_at(day(5)),
        )
        .await;
    f.add(
        CreateCoachNoteRequest::new("c1", "wrong session")
            .with_client("client-a")
            .with_session("s2")
            .with_access_level(AccessLevel::Team)
            .created_at(day(5)),
    )
    .await;
    f.add(
        CreateCoachNoteRequest::new("c2", "wrong coach")
            .with_client("client-a")
            .with_session("s1")
            .with_access_level(AccessLevel::Team)
            .created_at(day(5)),
    )
    .await;
    f.add(
        CreateCoachNoteRequest::new("c1", "too early")
            .with_client("client-a")
            .with_session("s1")
            .with_access_level(AccessLevel::Team)
            .created_at(day(1)),
    )
    .await;

    let opts = SearchOptions::new()
        .with_coach("c1")
        .with_client("client-a")
        .with_session("s1")
        .with_access_levels([AccessLevel::Team])
        .with_date_range(Some(day(3)), Some(day(5)));
    let result = f.engine.search_notes(&admin(), &opts).await.unwrap();
    assert_eq!(result.total_count, 1);
    assert_eq!(result.notes[0].note.id, wanted);
    assert_eq!(result.search_metadata.filters.active_count(), 5);
}

// =============================================================================
// TEXT SEARCH
// =============================================================================

#[tokio::test]
async fn test_phrase_with_exclusion() {
    let f = Fixture::new();
    let keep = f
        .add(CreateCoachNoteRequest::new("c1", "We agreed on a session plan for March").created_at(day(1)))
        .await;
    f.add(CreateCoachNoteRequest::new("c1", "Session plan, first draft").created_at(day(2)))
        .await;
    f.add(CreateCoachNoteRequest::new("c1", "Plan for the next session").created_at(day(3)))
        .await;

    let opts = SearchOptions::new().with_query(r#""session plan" -draft"#);
    let result = f.engine.search_notes(&admin(), &opts).await.unwrap();
    assert_eq!(result.total_count, 1);
    assert_eq!(result.notes[0].note.id, keep);
    assert!(result.notes[0].score.is_some());
    assert_eq!(
        result.search_metadata.query.as_deref(),
        Some(r#""session plan" -draft"#)
    );
}

#[tokio::test]
async fn test_text_match_ignores_case_and_accents() {
    let f = Fixture::new();
    let id = f
        .add(CreateCoachNoteRequest::new("c1", "Reflections from the Café meeting"))
        .await;
    let result = f
        .engine
        .search_notes(&admin(), &SearchOptions::new().with_query("CAFE"))
        .await
        .unwrap();
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.notes[0].note.id, id);
}

#[tokio::test]
async fn test_query_that_parses_empty_applies_no_text_filter() {
    let f = Fixture::new();
    f.note("c1", AccessLevel::Team, 1).await;
    f.note("c1", AccessLevel::Team, 2).await;

    for query in ["", "   ", "\"\"", "-"] {
        let opts = SearchOptions::new()
            .with_query(query)
            .sorted_by(SortBy::Relevance, SortOrder::Desc);
        let result = f.engine.search_notes(&admin(), &opts).await.unwrap();
        assert_eq!(result.total_count, 2, "query {:?}", query);
        assert!(result.notes.iter().all(|h| h.score.is_none()));
        // Relevance without text falls back to newest first.
        assert!(result.notes[0].note.created_at > result.notes[1].note.created_at);
    }
}

#[tokio::test]
async fn test_relevance_sort_prefers_title_then_newest() {
    let f = Fixture::new();
    let body_old = f
        .add(CreateCoachNoteRequest::new("c1", "goals discussed").created_at(day(1)))
        .await;
    let body_new = f
        .add(CreateCoachNoteRequest::new("c1", "more goals").created_at(day(2)))
        .await;
    let titled = f
        .add(
            CreateCoachNoteRequest::new("c1", "nothing here")
                .with_title("Goals")
                .created_at(day(0)),
        )
        .await;

    let opts = SearchOptions::new()
        .with_query("goals")
        .sorted_by(SortBy::Relevance, SortOrder::Asc);
    let result = f.engine.search_notes(&admin(), &opts).await.unwrap();
    let ids: Vec<Uuid> = result.notes.iter().map(|h| h.note.id).collect();
    assert_eq!(ids, vec![titled, body_new, body_old]);
}

// =============================================================================
// SORT AND PAGINATION
// =============================================================================

async fn titled_fixture() -> Fixture {
    let f = Fixture::new();
    let titles = [
        Some("delta"),
        None,
        Some("alpha"),
        Some("charlie"),
        Some("bravo"),
        None,
        Some("alpha"),
    ];
    for (i, title) in titles.iter().enumerate() {
        let mut req = CreateCoachNoteRequest::new("c1", "body").created_at(day(i as i64));
        if let Some(title) = title {
            req = req.with_title(*title);
        }
        f.add(req).await;
    }
    f
}

#[tokio::test]
async fn test_title_sort_is_monotonic_both_directions() {
    let f = titled_fixture().await;

    let asc = f
        .engine
        .search_notes(&admin(), &SearchOptions::new().sorted_by(SortBy::Title, SortOrder::Asc))
        .await
        .unwrap();
    let titles: Vec<Option<String>> = asc.notes.iter().map(|h| h.note.title.clone()).collect();
    assert!(titles.windows(2).all(|w| w[0] <= w[1]), "{:?}", titles);
    assert_eq!(titles[0], None);

    let desc = f
        .engine
        .search_notes(&admin(), &SearchOptions::new().sorted_by(SortBy::Title, SortOrder::Desc))
        .await
        .unwrap();
    let titles: Vec<Option<String>> = desc.notes.iter().map(|h| h.note.title.clone()).collect();
    assert!(titles.windows(2).all(|w| w[0] >= w[1]), "{:?}", titles);
    assert_eq!(titles.last().unwrap(), &None);

    // Equal titles break on newest first.
    let alphas: Vec<_> = desc
        .notes
        .iter()
        .filter(|h| h.note.title.as_deref() == Some("alpha"))
        .collect();
    assert!(alphas[0].note.created_at > alphas[1].note.created_at);
}

#[tokio::test]
async fn test_last_access_sort() {
    let f = Fixture::new();
    let never = f.note("c1", AccessLevel::Team, 3).await;
    let viewed = f.note("c1", AccessLevel::Team, 1).await;
    f.store
        .record_access(viewed, "c1", AuditAction::Viewed)
        .await
        .unwrap();

    let result = f
        .engine
        .search_notes(
            &admin(),
            &SearchOptions::new().sorted_by(SortBy::LastAccess, SortOrder::Desc),
        )
        .await
        .unwrap();
    let ids: Vec<Uuid> = result.notes.iter().map(|h| h.note.id).collect();
    assert_eq!(ids, vec![viewed, never]);
    assert_eq!(result.notes[0].audit_count, 2);
}

#[tokio::test]
async fn test_pages_partition_results_and_total_is_stable() {
    let f = titled_fixture().await;
    let all = f
        .engine
        .search_notes(
            &admin(),
            &SearchOptions::new()
                .sorted_by(SortBy::Title, SortOrder::Asc)
                .with_limit(100),
        )
        .await
        .unwrap();
    let expected: Vec<Uuid> = all.notes.iter().map(|h| h.note.id).collect();
    assert_eq!(all.total_count, 7);

    for limit in 1..=8 {
        let mut collected = Vec::new();
        let mut page = 1;
        loop {
            let opts = SearchOptions::new()
                .sorted_by(SortBy::Title, SortOrder::Asc)
                .with_page(page)
                .with_limit(limit);
            let result = f.engine.search_notes(&admin(), &opts).await.unwrap();
            assert_eq!(result.total_count, 7);
            assert_eq!(result.total_pages, (7 + limit - 1) / limit);
            assert_eq!(result.page, page);
            if result.notes.is_empty() {
                break;
            }
            collected.extend(result.notes.iter().map(|h| h.note.id));
            page += 1;
        }
        assert_eq!(collected, expected, "limit {}", limit);
    }
}

#[tokio::test]
async fn test_page_and_limit_are_clamped() {
    let f = Fixture::new();
    for i in 0..3 {
        f.note("c1", AccessLevel::Team, i).await;
    }

    let result = f
        .engine
        .search_notes(&admin(), &SearchOptions::new().with_page(0).with_limit(0))
        .await
        .unwrap();
    assert_eq!(result.page, 1);
    assert_eq!(result.notes.len(), 1);
    assert_eq!(result.total_pages, 3);

    let result = f
        .engine
        .search_notes(&admin(), &SearchOptions::new().with_page(-3).with_limit(1000))
        .await
        .unwrap();
    assert_eq!(result.page, 1);
    assert_eq!(result.notes.len(), 3);
    assert_eq!(result.total_pages, 1);
}

#[tokio::test]
async fn test_zero_results_is_not_an_error() {
    let f = Fixture::new();
    let result = f
        .engine
        .search_notes(&coach("coach1"), &SearchOptions::new().with_query("anything"))
        .await
        .unwrap();
    assert!(result.notes.is_empty());
    assert_eq!(result.total_count, 0);
    assert_eq!(result.total_pages, 0);
}

// =============================================================================
// COMPUTED FIELDS, SERIALIZATION, DEADLINES
// =============================================================================

#[tokio::test]
async fn test_computed_fields_and_wire_shape() {
    let f = Fixture::new();
    f.add(
        CreateCoachNoteRequest::new("c1", "body")
            .with_title("Check-in")
            .with_tags(["goals", "q1"])
            .with_audio("https://cdn.example/a.mp3")
            .with_access_level(AccessLevel::Team),
    )
    .await;

    let result = f
        .engine
        .search_notes(&admin(), &SearchOptions::new().with_tags(["goals"]))
        .await
        .unwrap();
    let hit = &result.notes[0];
    assert!(hit.has_audio);
    assert_eq!(hit.tag_count, 2);
    assert_eq!(hit.audit_count, 1);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["totalCount"], 1);
    assert_eq!(json["totalPages"], 1);
    assert_eq!(json["notes"][0]["accessLevel"], "team");
    assert_eq!(json["notes"][0]["hasAudio"], true);
    assert_eq!(json["searchMetadata"]["filters"]["tags"][0], "goals");
    assert!(json["searchMetadata"]["executionTime"].is_u64());
}

#[tokio::test(start_paused = true)]
async fn test_slow_store_times_out() {
    let store = InMemoryNoteStore::new().with_latency(Duration::from_secs(30));
    let config = SearchConfig::default().with_query_timeout(Some(Duration::from_millis(200)));
    let engine = NoteSearchEngine::with_config(store, config);

    let err = engine
        .search_notes(&admin(), &SearchOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(200)));

    let err = engine
        .get_search_suggestions(&admin(), "goals", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(200)));
}

#[tokio::test]
async fn test_concurrent_searches_share_one_engine() {
    let f = Fixture::new();
    for i in 0..10 {
        f.note("c1", AccessLevel::Team, i).await;
    }
    let engine = std::sync::Arc::new(f.engine);

    let tasks: Vec<_> = (1..=5)
        .map(|page| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .search_notes(&admin(), &SearchOptions::new().with_page(page).with_limit(2))
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(tasks).await;
    let mut ids = HashSet::new();
    for result in results {
        let result = result.unwrap().unwrap();
        assert_eq!(result.total_count, 10);
        ids.extend(result.notes.into_iter().map(|h| h.note.id));
    }
    assert_eq!(ids.len(), 10);
}
