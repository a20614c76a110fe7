// ABOUTME: Integration tests for the SQLite history store
// ABOUTME: Covers owner isolation, newest-first cursor pagination, lookups, and statistics
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use thumbanana_core::errors::ErrorCode;
use thumbanana_core::models::{
    ArtifactRef, GenerationResult, HistoryStats, Identity, RequestSummary, StoredReference,
    StylePreset, VariantFailure, VariantFailureKind,
};
use thumbanana_core::pagination::{Cursor, PaginationParams};
use thumbanana_server::history::{HistoryStore, SqliteHistoryStore};
use uuid::Uuid;

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn result_at(minutes: i64, images: u32, failed: u32) -> GenerationResult {
    let id = Uuid::new_v4();
    let created_at = at(minutes);
    let artifacts = (0..images)
        .map(|variant_index| ArtifactRef {
            variant_index,
            location: format!("originals/{id}-{variant_index}.png"),
            mime_type: "image/png".to_owned(),
            byte_len: 42,
        })
        .collect();
    let failures = (images..images + failed)
        .map(|variant_index| VariantFailure {
            variant_index,
            kind: VariantFailureKind::RateLimited,
            message: "quota".to_owned(),
        })
        .collect();

    GenerationResult::from_outcomes(
        id,
        RequestSummary {
            title: format!("Video {minutes}"),
            style: StylePreset::Bold,
            variant_count: images + failed,
            reference_count: 0,
        },
        artifacts,
        failures,
        created_at,
    )
}

async fn store() -> SqliteHistoryStore {
    SqliteHistoryStore::new(common::create_test_database().await.history())
}

#[tokio::test]
async fn test_history_is_isolated_between_identities() {
    let store = store().await;
    let alice = Identity::registered(Uuid::new_v4());
    let guest = Identity::guest("guest-session");

    let alice_entry = store.append(&alice, result_at(0, 1, 0)).await.unwrap();
    store.append(&guest, result_at(1, 1, 0)).await.unwrap();

    let page = store
        .list_for(&guest, &PaginationParams::first_page())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(page.items.iter().all(|entry| entry.identity == guest));

    assert!(store
        .get_for(&guest, alice_entry.id())
        .await
        .unwrap()
        .is_none());
    assert!(store
        .get_for(&alice, alice_entry.id())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_pages_are_newest_first_and_complete() {
    let store = store().await;
    let identity = Identity::registered(Uuid::new_v4());
    for minute in 0..5 {
        store.append(&identity, result_at(minute, 1, 0)).await.unwrap();
    }

    let first = store
        .list_for(&identity, &PaginationParams::new(None, Some(2)))
        .await
        .unwrap();
    assert!(first.has_more);
    assert_eq!(
        first
            .items
            .iter()
            .map(|entry| entry.result.summary.title.as_str())
            .collect::<Vec<_>>(),
        vec!["Video 4", "Video 3"]
    );

    let mut titles: Vec<String> = first
        .items
        .iter()
        .map(|entry| entry.result.summary.title.clone())
        .collect();
    let mut cursor = first.next_cursor;
    while let Some(next) = cursor {
        let page = store
            .list_for(&identity, &PaginationParams::new(Some(next), Some(2)))
            .await
            .unwrap();
        titles.extend(page.items.iter().map(|entry| entry.result.summary.title.clone()));
        cursor = page.next_cursor;
    }

    assert_eq!(
        titles,
        vec!["Video 4", "Video 3", "Video 2", "Video 1", "Video 0"]
    );
}

#[tokio::test]
async fn test_garbage_cursor_is_invalid_input() {
    let store = store().await;
    let identity = Identity::guest("g");
    let error = store
        .list_for(
            &identity,
            &PaginationParams::new(Some(Cursor::from_string("%%%".to_owned())), None),
        )
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_entries_round_trip_failures_and_notes() {
    let store = store().await;
    let identity = Identity::registered(Uuid::new_v4());
    let result = result_at(0, 2, 1);
    let note = result.partial_failure_note.clone();

    let entry = store.append(&identity, result).await.unwrap();
    let loaded = store.get_for(&identity, entry.id()).await.unwrap().unwrap();

    assert_eq!(loaded.result.artifacts.len(), 2);
    assert_eq!(loaded.result.failures.len(), 1);
    assert_eq!(loaded.result.partial_failure_note, note);
    assert_eq!(loaded.created_at(), entry.created_at());
}

#[tokio::test]
async fn test_references_are_returned_to_the_owner_only() {
    let store = store().await;
    let identity = Identity::registered(Uuid::new_v4());
    let result = result_at(0, 1, 0);
    let id = result.id;
    let references = vec![StoredReference {
        position: 0,
        file_name: "face.png".to_owned(),
        mime_type: "image/png".to_owned(),
        location: format!("{id}-ref0.png"),
    }];
    store
        .append(&identity, result.with_references(references.clone()))
        .await
        .unwrap();

    let loaded = store.get_for(&identity, id).await.unwrap().unwrap();
    assert_eq!(loaded.result.references, references);
    assert!(store
        .get_for(&Identity::guest("other"), id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_stats_count_only_the_owner() {
    let store = store().await;
    let identity = Identity::registered(Uuid::new_v4());
    store.append(&identity, result_at(0, 3, 0)).await.unwrap();
    store.append(&identity, result_at(1, 0, 2)).await.unwrap();
    store
        .append(&Identity::guest("someone-else"), result_at(2, 1, 0))
        .await
        .unwrap();

    let stats = store.stats_for(&identity).await.unwrap();
    assert_eq!(stats.total_generations, 2);
    assert_eq!(stats.successful_generations, 1);
    assert!((stats.success_rate - 50.0).abs() < f64::EPSILON);
    assert_eq!(stats.total_images, 3);
    assert_eq!(stats.first_generation, Some(at(0)));
    assert_eq!(stats.last_generation, Some(at(1)));
}

#[tokio::test]
async fn test_stats_for_empty_history() {
    let store = store().await;
    let stats = store.stats_for(&Identity::guest("new")).await.unwrap();
    assert_eq!(stats, HistoryStats::default());
}
