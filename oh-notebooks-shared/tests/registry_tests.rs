/// Integration tests for the notebook registry
///
/// Require PostgreSQL at DATABASE_URL; skipped otherwise. Notebook names,
/// usernames and data source names carry a random suffix so assertions only
/// see rows created by the test itself.

mod common;

use chrono::{Duration, Utc};
use oh_notebooks_shared::clock::FixedClock;
use oh_notebooks_shared::models::notebook::{Notebook, SearchField};
use oh_notebooks_shared::openhumans::mock::MockOpenHumans;
use oh_notebooks_shared::registry::{NotebookRegistry, NotebookSubmission, Upserted};
use sqlx::PgPool;
use std::sync::Arc;

fn registry(pool: &PgPool, clock: &FixedClock) -> NotebookRegistry {
    NotebookRegistry::new(pool.clone(), Arc::new(MockOpenHumans::new()), Arc::new(clock.clone()))
}

fn submission(oh_member_id: &str, name: &str) -> NotebookSubmission {
    NotebookSubmission {
        oh_member_id: oh_member_id.to_string(),
        notebook_name: name.to_string(),
        content: r#"{"cells": []}"#.to_string(),
        description: "Steps per day".to_string(),
        tags: "fitbit, steps".to_string(),
        data_sources: "Fitbit Connection".to_string(),
    }
}

#[tokio::test]
async fn test_upsert_twice_updates_same_record() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let clock = FixedClock::new(Utc::now());
    let registry = registry(&pool, &clock);
    let member = common::create_member(&pool, "alice", common::fresh_expiry()).await;
    let name = format!("{}.ipynb", common::unique());

    let (first, outcome) = registry.upsert_notebook(submission(&member.oh_id, &name)).await.unwrap();
    assert_eq!(outcome, Upserted::Created);
    assert_eq!(first.tags.0, vec!["fitbit", "steps"]);
    assert_eq!(first.data_sources.0, vec!["Fitbit Connection"]);
    assert_eq!(first.oh_username, "alice");
    assert!(first.is_master());

    clock.advance(Duration::minutes(5));
    let mut changed = submission(&member.oh_id, &name);
    changed.description = "Steps per week".to_string();
    changed.tags = String::new();

    let (second, outcome) = registry.upsert_notebook(changed).await.unwrap();
    assert_eq!(outcome, Upserted::Updated);
    assert_eq!(second.id, first.id);
    assert_eq!(second.description, "Steps per week");
    assert_eq!(second.tags.0, vec![""]);
    assert_eq!(second.created_at.timestamp(), first.created_at.timestamp());
    assert!(second.updated_at > first.updated_at);

    // Same inputs again change nothing but the update time
    let (third, outcome) = registry
        .upsert_notebook(NotebookSubmission {
            description: "Steps per week".to_string(),
            tags: String::new(),
            ..submission(&member.oh_id, &name)
        })
        .await
        .unwrap();
    assert_eq!(outcome, Upserted::Updated);
    assert_eq!(third.id, first.id);
    assert_eq!(third.description, second.description);
    assert_eq!(third.tags.0, second.tags.0);
    assert_eq!(third.data_sources.0, second.data_sources.0);
    assert_eq!(third.master_notebook_id, second.master_notebook_id);
}

#[tokio::test]
async fn test_master_is_earliest_record_by_someone_else() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let clock = FixedClock::new(Utc::now());
    let registry = registry(&pool, &clock);
    let u1 = common::create_member(&pool, "alice", common::fresh_expiry()).await;
    let u2 = common::create_member(&pool, "bob", common::fresh_expiry()).await;
    let u3 = common::create_member(&pool, "carol", common::fresh_expiry()).await;
    let name = format!("{}.ipynb", common::unique());

    let (a, _) = registry.upsert_notebook(submission(&u1.oh_id, &name)).await.unwrap();
    clock.advance(Duration::seconds(1));
    let (b, _) = registry.upsert_notebook(submission(&u2.oh_id, &name)).await.unwrap();

    assert!(a.is_master());
    assert_eq!(b.master_notebook_id, Some(a.id));

    let master = registry.identify_master(&name, &u2.oh_id).await.unwrap();
    assert_eq!(master.map(|m| m.id), Some(a.id));
    assert!(registry.identify_master(&name, &u1.oh_id).await.unwrap().is_none());

    // The first uploader stays master when updating
    clock.advance(Duration::seconds(1));
    let (a_again, _) = registry.upsert_notebook(submission(&u1.oh_id, &name)).await.unwrap();
    assert!(a_again.is_master());

    clock.advance(Duration::seconds(1));
    let (c, _) = registry.upsert_notebook(submission(&u3.oh_id, &name)).await.unwrap();
    assert_eq!(c.master_notebook_id, Some(a.id));

    let derived: Vec<_> = Notebook::list_derived(&pool, a.id)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(derived, vec![b.id, c.id]);
}

#[tokio::test]
async fn test_same_instant_uploads_keep_one_master() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    // Clock never advances: both records share created_at
    let clock = FixedClock::new(Utc::now());
    let registry = registry(&pool, &clock);
    let u1 = common::create_member(&pool, "alice", common::fresh_expiry()).await;
    let u2 = common::create_member(&pool, "bob", common::fresh_expiry()).await;
    let name = format!("{}.ipynb", common::unique());

    let (a, _) = registry.upsert_notebook(submission(&u1.oh_id, &name)).await.unwrap();
    let (b, _) = registry.upsert_notebook(submission(&u2.oh_id, &name)).await.unwrap();
    assert_eq!(a.created_at, b.created_at);
    assert_eq!(b.master_notebook_id, Some(a.id));

    let (b_again, outcome) = registry.upsert_notebook(submission(&u2.oh_id, &name)).await.unwrap();
    assert_eq!(outcome, Upserted::Updated);
    assert_eq!(b_again.master_notebook_id, Some(a.id));

    let (a_again, _) = registry.upsert_notebook(submission(&u1.oh_id, &name)).await.unwrap();
    assert!(a_again.is_master());

    let masters = Notebook::list_masters(&pool)
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.notebook_name == name)
        .count();
    assert_eq!(masters, 1);
}

#[tokio::test]
async fn test_search_by_username_returns_masters_by_update_time() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let clock = FixedClock::new(Utc::now());
    let registry = registry(&pool, &clock);
    let suffix = common::unique();
    let term = format!("open_humans_{suffix}");

    let alice = common::create_member(&pool, &format!("{term}_alice"), common::fresh_expiry()).await;
    let bob = common::create_member(&pool, &format!("{term}_bob"), common::fresh_expiry()).await;
    let other = common::create_member(&pool, "someone_else", common::fresh_expiry()).await;

    let first_name = format!("{suffix}-first.ipynb");
    let second_name = format!("{suffix}-second.ipynb");

    let (first, _) = registry.upsert_notebook(submission(&alice.oh_id, &first_name)).await.unwrap();
    clock.advance(Duration::seconds(1));
    let (second, _) = registry.upsert_notebook(submission(&bob.oh_id, &second_name)).await.unwrap();
    clock.advance(Duration::seconds(1));
    // Derived copy by a matching owner is not a master
    registry.upsert_notebook(submission(&bob.oh_id, &first_name)).await.unwrap();
    registry.upsert_notebook(submission(&other.oh_id, &format!("{suffix}-x.ipynb"))).await.unwrap();

    clock.advance(Duration::seconds(1));
    registry.upsert_notebook(submission(&alice.oh_id, &first_name)).await.unwrap();

    let ids: Vec<_> = registry
        .search(&term, Some(SearchField::Username))
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_search_without_field_matches_any_column_once() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let clock = FixedClock::new(Utc::now());
    let registry = registry(&pool, &clock);
    let term = format!("kw{}", common::unique());
    let member = common::create_member(&pool, "alice", common::fresh_expiry()).await;

    let mut by_everything = submission(&member.oh_id, &format!("{term}.ipynb"));
    by_everything.description = format!("about {term}");
    by_everything.tags = term.clone();
    let (matched, _) = registry.upsert_notebook(by_everything).await.unwrap();

    let mut by_source = submission(&member.oh_id, &format!("{}.ipynb", common::unique()));
    by_source.data_sources = format!("Source {term}");
    clock.advance(Duration::seconds(1));
    let (source_match, _) = registry.upsert_notebook(by_source).await.unwrap();

    let ids: Vec<_> = registry
        .search(&term, None)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec![matched.id, source_match.id]);

    let tags_only = registry.search(&term, Some(SearchField::Tags)).await.unwrap();
    assert_eq!(tags_only.len(), 1);
    assert_eq!(tags_only[0].id, matched.id);

    // Case sensitive
    assert!(registry.search(&term.to_uppercase(), None).await.unwrap().is_empty());

    assert!(registry.search(&format!("{term}-missing"), None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_aggregate_counts_master_data_sources() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let clock = FixedClock::new(Utc::now());
    let registry = registry(&pool, &clock);
    let suffix = common::unique();
    let (a, b, c) = (format!("A-{suffix}"), format!("B-{suffix}"), format!("C-{suffix}"));
    let u1 = common::create_member(&pool, "alice", common::fresh_expiry()).await;
    let u2 = common::create_member(&pool, "bob", common::fresh_expiry()).await;

    for (name, sources) in [
        ("one", format!("{a},{b}")),
        ("two", a.clone()),
        ("three", format!("{b}, {c}")),
    ] {
        let mut s = submission(&u1.oh_id, &format!("{suffix}-{name}.ipynb"));
        s.data_sources = sources;
        registry.upsert_notebook(s).await.unwrap();
        clock.advance(Duration::seconds(1));
    }

    // Derived notebooks are not counted
    let mut derived = submission(&u2.oh_id, &format!("{suffix}-three.ipynb"));
    derived.data_sources = c.clone();
    registry.upsert_notebook(derived).await.unwrap();

    let ours: Vec<(String, i64)> = registry
        .aggregate_data_source_counts()
        .await
        .unwrap()
        .into_iter()
        .filter(|(name, _)| name.ends_with(&suffix))
        .collect();
    assert_eq!(ours, vec![(a.clone(), 2), (b.clone(), 2), (c.clone(), 1)]);

    let names: Vec<String> = registry
        .data_source_names()
        .await
        .unwrap()
        .into_iter()
        .filter(|name| name.ends_with(&suffix))
        .collect();
    assert_eq!(names, vec![a, b, c]);
}
