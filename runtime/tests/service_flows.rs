//! End-to-end service flows over the in-memory store.
//!
//! Walks the operations the way a client would: create a conference, add
//! sessions, register users, curate wishlists, read the cached
//! announcements.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use conference_core::environment::Notification;
use conference_core::error::ErrorKind;
use conference_core::filter::FilterSpec;
use conference_core::forms::{ConferenceForm, ConferenceQueryForms, ProfileMiniForm};
use conference_core::keys::ConferenceKey;
use conference_core::model::TeeShirtSize;
use conference_core::registration::{ALREADY_REGISTERED, NO_SEATS_AVAILABLE};
use conference_runtime::{ConferenceService, InMemoryAnnouncementCache, RetryPolicy};
use conference_testing::{
    InMemoryEntityStore, RecordingNotificationQueue, fixtures, init_test_tracing, test_clock,
};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

struct World {
    service: ConferenceService,
    store: Arc<InMemoryEntityStore>,
    queue: Arc<RecordingNotificationQueue>,
}

fn world() -> World {
    init_test_tracing();
    let store = Arc::new(InMemoryEntityStore::new());
    let queue = Arc::new(RecordingNotificationQueue::new());
    let service = ConferenceService::new(
        store.clone(),
        Arc::new(test_clock()),
        queue.clone(),
        Arc::new(InMemoryAnnouncementCache::new()),
    )
    .with_retry_policy(
        RetryPolicy::builder()
            .max_retries(20)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build(),
    );
    World {
        service,
        store,
        queue,
    }
}

async fn create(world: &World, name: &str, max_attendees: i64) -> String {
    world
        .service
        .create_conference(
            &fixtures::caller("organizer"),
            fixtures::conference_form(name, max_attendees),
        )
        .await
        .expect("conference created")
        .websafe_key
        .expect("key assigned")
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn two_seat_conference_admits_exactly_two() {
    let world = world();
    let key = create(&world, "Cozy", 2).await;

    let u1 = fixtures::caller("u1");
    let u2 = fixtures::caller("u2");
    let u3 = fixtures::caller("u3");

    assert!(world.service.register_for_conference(&u1, &key).await.unwrap());
    assert!(world.service.register_for_conference(&u2, &key).await.unwrap());

    let err = world
        .service
        .register_for_conference(&u3, &key)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), NO_SEATS_AVAILABLE);

    let conference = world.service.get_conference(&key).await.unwrap();
    assert_eq!(conference.seats_available, Some(0));

    let err = world
        .service
        .register_for_conference(&u1, &key)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), ALREADY_REGISTERED);

    // freeing a seat lets the waiting user in
    assert!(world.service.unregister_from_conference(&u2, &key).await.unwrap());
    assert!(world.service.register_for_conference(&u3, &key).await.unwrap());

    let attending = world.service.get_conferences_to_attend(&u3).await.unwrap();
    assert_eq!(attending.items.len(), 1);
    assert_eq!(attending.items[0].websafe_key.as_deref(), Some(key.as_str()));
}

#[tokio::test]
async fn zero_capacity_conference_is_always_full() {
    let world = world();
    let key = create(&world, "Closed", 0).await;
    let err = world
        .service
        .register_for_conference(&fixtures::caller("ada"), &key)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), NO_SEATS_AVAILABLE);
}

#[tokio::test]
async fn registration_creates_the_profile_lazily() {
    let world = world();
    let key = create(&world, "RustConf", 10).await;
    let newcomer = fixtures::caller("newcomer");

    world
        .service
        .register_for_conference(&newcomer, &key)
        .await
        .unwrap();

    let profile = world.service.get_profile(&newcomer).await.unwrap();
    assert_eq!(profile.display_name, "newcomer");
    assert_eq!(profile.tee_shirt_size, TeeShirtSize::NotSpecified);
    assert_eq!(profile.conference_keys_to_attend, vec![key]);
}

#[tokio::test]
async fn profile_edits_survive_registration() {
    let world = world();
    let key = create(&world, "RustConf", 10).await;
    let ada = fixtures::caller("ada");

    world
        .service
        .save_profile(
            &ada,
            ProfileMiniForm {
                display_name: Some("Ada L.".to_string()),
                tee_shirt_size: Some("XL_W".to_string()),
            },
        )
        .await
        .unwrap();
    world.service.register_for_conference(&ada, &key).await.unwrap();

    let profile = world.service.get_profile(&ada).await.unwrap();
    assert_eq!(profile.display_name, "Ada L.");
    assert_eq!(profile.tee_shirt_size, TeeShirtSize::XlW);
    assert_eq!(profile.conference_keys_to_attend.len(), 1);
}

// ============================================================================
// Conferences
// ============================================================================

#[tokio::test]
async fn query_filters_are_conjunctive() {
    let world = world();
    let organizer = fixtures::caller("organizer");
    for (name, city, max) in [
        ("Paris small", "Paris", 20),
        ("Paris big", "Paris", 500),
        ("London big", "London", 500),
    ] {
        world
            .service
            .create_conference(
                &organizer,
                ConferenceForm {
                    city: Some(city.to_string()),
                    ..fixtures::conference_form(name, max)
                },
            )
            .await
            .unwrap();
    }

    let result = world
        .service
        .query_conferences(ConferenceQueryForms {
            filters: vec![
                FilterSpec::new("CITY", "EQ", "Paris"),
                FilterSpec::new("MAX_ATTENDEES", "GT", "100"),
            ],
        })
        .await
        .unwrap();
    let names: Vec<_> = result.items.iter().filter_map(|c| c.name.clone()).collect();
    assert_eq!(names, ["Paris big"]);

    let everything = world
        .service
        .query_conferences(ConferenceQueryForms::default())
        .await
        .unwrap();
    let names: Vec<_> = everything.items.iter().filter_map(|c| c.name.clone()).collect();
    assert_eq!(names, ["London big", "Paris big", "Paris small"]);
}

#[tokio::test]
async fn invalid_filter_tokens_are_rejected() {
    let world = world();
    let err = world
        .service
        .query_conferences(ConferenceQueryForms {
            filters: vec![FilterSpec::new("SPEAKER", "EQ", "Ferris")],
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert_eq!(err.to_string(), "Filter contains invalid field or operator.");
}

#[tokio::test]
async fn creation_queues_a_confirmation() {
    let world = world();
    create(&world, "RustConf", 10).await;
    let queued = world.queue.notifications();
    assert_eq!(queued.len(), 1);
    assert!(matches!(&queued[0], Notification::ConferenceCreated { conference, .. } if conference.name == "RustConf"));
    assert_eq!(world.store.conference_count().await, 1);
}

#[tokio::test]
async fn unknown_conference_lookups_are_not_found() {
    let world = world();
    let missing = ConferenceKey::new().to_string();
    let err = world.service.get_conference(&missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), format!("No conference found with key: {missing}"));
}

// ============================================================================
// Sessions, wishlist, announcements
// ============================================================================

#[tokio::test]
async fn wishlist_and_featured_speaker_flow() {
    let world = world();
    let organizer = fixtures::caller("organizer");
    let key: ConferenceKey = create(&world, "RustConf", 100).await.parse().unwrap();

    for (name, kind) in [("Borrowing", "Lecture"), ("Lifetimes lab", "Workshop")] {
        world
            .service
            .create_session(
                &organizer,
                fixtures::session_form(key, name, "Ferris", &[kind], Some("10:00")),
            )
            .await
            .unwrap();
    }
    let featured = world
        .queue
        .notifications()
        .into_iter()
        .filter(|n| matches!(n, Notification::FeaturedSpeaker { .. }))
        .count();
    assert_eq!(featured, 1);

    let ada = fixtures::caller("ada");
    world
        .service
        .add_session_to_wishlist(&ada, "Borrowing")
        .await
        .unwrap();
    let err = world
        .service
        .add_session_to_wishlist(&ada, "Borrowing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    world
        .service
        .add_session_to_wishlist(&ada, "Lifetimes lab")
        .await
        .unwrap();

    let wishlist = world.service.get_sessions_in_wishlist(&ada).await.unwrap();
    assert_eq!(wishlist.items.len(), 2);
    let lectures = world.service.return_wishlist_type(&ada, "Lecture").await.unwrap();
    assert_eq!(lectures.items.len(), 1);
    let by_ferris = world.service.return_wishlist_speaker(&ada, "Ferris").await.unwrap();
    assert_eq!(by_ferris.items.len(), 2);
    let by_nobody = world.service.return_wishlist_speaker(&ada, "Nobody").await.unwrap();
    assert!(by_nobody.items.is_empty());

    world.service.refresh_featured_speaker("Ferris").await.unwrap();
    let message = world.service.get_featured_speaker().await.data;
    assert!(message.starts_with("Featured speaker: Ferris. Sessions: "));
}

#[tokio::test]
async fn announcement_tracks_remaining_seats() {
    let world = world();
    let key = create(&world, "Almost", 6).await;

    assert_eq!(world.service.refresh_announcements().await.unwrap(), None);

    world
        .service
        .register_for_conference(&fixtures::caller("ada"), &key)
        .await
        .unwrap();
    let announcement = world.service.refresh_announcements().await.unwrap();
    assert_eq!(
        announcement.as_deref(),
        Some("Last chance to attend! The following conferences are nearly sold out: Almost")
    );
}
