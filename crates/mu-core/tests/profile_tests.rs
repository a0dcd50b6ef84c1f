//! Profile resolution, collapsing and notification tests

use mu_core::store::save_cache;
use mu_core::{CacheStore, CachedProfile, MemoryStore, MergeError, MergedUsers, ProfileInfo};
use mu_test_utils::{joined, merge_config, room_with, setup_users, FakeClient};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn child_resolves_to_parent_profile() {
    let (users, client, _) = setup_users(merge_config());
    client.link("bob", "@bob:x.org");
    client.set_profile("@bob:x.org", ProfileInfo::named("Bob"));

    let profile = users.get_profile("@bob:bridge.irc", None).await.unwrap();
    assert_eq!(profile, ProfileInfo::named("Bob"));
    assert_eq!(
        users.cached_profile("@bob:bridge.irc", None),
        CachedProfile::Cached(ProfileInfo::named("Bob"))
    );

    // Served from the cache from here on.
    let again = users.get_profile("@bob:bridge.matrix", None).await.unwrap();
    assert_eq!(again, profile);
    assert_eq!(FakeClient::count(&client.profile_lookups), 1);
}

#[tokio::test]
async fn room_specific_profile_wins() {
    let (users, client, _) = setup_users(merge_config());
    client.link("bob", "@bob:x.org");
    client.set_profile("@bob:x.org", ProfileInfo::named("Bob"));
    client.set_membership_profile(
        "!team:x.org",
        "@bob:x.org",
        ProfileInfo::new(Some("Bob (work)".into()), Some("mxc://x.org/work".into())),
    );

    let profile = users
        .get_profile("@bob:bridge.irc", Some("!team:x.org"))
        .await
        .unwrap();
    assert_eq!(profile.displayname.as_deref(), Some("Bob (work)"));
    assert_eq!(FakeClient::count(&client.profile_lookups), 0);

    // Another room has no membership event and falls back to global.
    let profile = users
        .get_profile("@bob:bridge.irc", Some("!other:x.org"))
        .await
        .unwrap();
    assert_eq!(profile, ProfileInfo::named("Bob"));
    assert_eq!(
        users.get_profile_fast("@bob:bridge.irc", Some("!team:x.org")).displayname.as_deref(),
        Some("Bob (work)")
    );
}

#[tokio::test]
async fn global_profile_still_fetched_after_room_profile() {
    let (users, client, _) = setup_users(merge_config());
    client.link("bob", "@bob:x.org");
    client.set_profile("@bob:x.org", ProfileInfo::named("Bob"));
    client.set_membership_profile("!team:x.org", "@bob:x.org", ProfileInfo::named("Bob (work)"));

    let room = users
        .get_profile("@bob:bridge.irc", Some("!team:x.org"))
        .await
        .unwrap();
    assert_eq!(room, ProfileInfo::named("Bob (work)"));
    assert_eq!(users.cached_profile("@bob:bridge.irc", None), CachedProfile::NotCached);

    let global = users.get_profile("@bob:bridge.irc", None).await.unwrap();
    assert_eq!(global, ProfileInfo::named("Bob"));
    assert_eq!(FakeClient::count(&client.profile_lookups), 1);
}

#[tokio::test]
async fn failed_global_fetch_is_retried() {
    let (users, client, _) = setup_users(merge_config());
    client.link("bob", "@bob:x.org");

    assert!(users.get_profile("@bob:bridge.irc", Some("!r:x.org")).await.is_err());

    client.set_profile("@bob:x.org", ProfileInfo::named("Bob"));
    let profile = users
        .get_profile("@bob:bridge.irc", Some("!r:x.org"))
        .await
        .unwrap();
    assert_eq!(profile, ProfileInfo::named("Bob"));
    assert_eq!(FakeClient::count(&client.profile_lookups), 2);
}

#[tokio::test]
async fn room_state_failure_uses_global_profile() {
    let (users, client, _) = setup_users(merge_config());
    client.link("bob", "@bob:x.org");
    client.set_profile("@bob:x.org", ProfileInfo::named("Bob"));
    client.fail_room_state(true);

    let profile = users
        .get_profile("@bob:bridge.irc", Some("!team:x.org"))
        .await
        .unwrap();
    assert_eq!(profile, ProfileInfo::named("Bob"));
}

#[tokio::test]
async fn missing_global_profile_is_an_error() {
    let (users, client, _) = setup_users(merge_config());
    client.link("bob", "@bob:x.org");

    let err = users.get_profile("@bob:bridge.irc", None).await.unwrap_err();
    assert!(matches!(err, MergeError::ProfileLookup { ref user_id, .. } if user_id == "@bob:x.org"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn effective_parents_collapse_room_members() {
    let (users, client, _) = setup_users(merge_config());
    client.link("alice", "@alice:x.org");
    users.track_user("@alice:bridge.irc").await;

    let members = vec![
        (Some("@alice:bridge.irc".to_string()), "alice-irc"),
        (Some("@alice:x.org".to_string()), "alice"),
        (Some("@bob:x.org".to_string()), "bob"),
        (None, "anonymous"),
    ];
    assert_eq!(
        users.get_effective_parents(members.clone(), false),
        vec!["alice", "bob"]
    );
    assert_eq!(
        users.get_effective_parents(members, true),
        vec!["alice", "bob", "anonymous"]
    );

    // The parent is absent, so the child stands in for it.
    let orphans = vec![
        (Some("@alice:bridge.irc".to_string()), "alice-irc"),
        (Some("@bob:x.org".to_string()), "bob"),
    ];
    assert_eq!(
        users.get_effective_parents(orphans, false),
        vec!["bob", "alice-irc"]
    );
}

#[tokio::test]
async fn profile_of_member_prefers_parent_member() {
    let (users, client, _) = setup_users(merge_config());
    client.link("bob", "@bob:x.org");
    client.add_room(room_with(
        "!r:x.org",
        vec![
            joined("!r:x.org", "@bob:x.org", "Bob"),
            joined("!r:x.org", "@bob:bridge.irc", "bob_irc"),
        ],
    ));
    users.track_user("@bob:bridge.irc").await;

    let child = joined("!r:x.org", "@bob:bridge.irc", "bob_irc");
    assert_eq!(users.get_profile_of(&child).displayname.as_deref(), Some("Bob"));

    let stranger = joined("!r:x.org", "@zed:nowhere.net", "Zed");
    assert_eq!(users.get_profile_of(&stranger), ProfileInfo::named("Zed"));
}

#[tokio::test]
async fn listeners_fire_for_their_user() {
    let (users, client, _) = setup_users(merge_config());
    client.link("bob", "@bob:x.org");
    client.set_profile("@bob:x.org", ProfileInfo::named("Bob"));

    let bob_updates = Arc::new(AtomicUsize::new(0));
    let counter = bob_updates.clone();
    let id = users.on_identity_updated("@bob:bridge.irc", move |update| {
        assert_eq!(update.namespace_user_id, "@bob:bridge.irc");
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let others = Arc::new(AtomicUsize::new(0));
    let counter = others.clone();
    users.on_identity_updated("@carol:x.org", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    users.track_user("@bob:bridge.irc").await;
    assert_eq!(bob_updates.load(Ordering::SeqCst), 1);
    assert_eq!(others.load(Ordering::SeqCst), 0);

    assert!(users.notifier().remove_listener(id));
    users.track_user("@bob:bridge.slack").await;
    assert_eq!(bob_updates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn corrupt_persisted_cache_starts_empty() {
    let store = Arc::new(MemoryStore::new());
    let config = merge_config();
    store.set_item(&config.storage_key, "{not json").unwrap();

    let client = Arc::new(FakeClient::logged_in("@me:x.org"));
    let users = MergedUsers::new(client.clone(), store.clone(), config.clone());
    users.init();
    assert_eq!(users.stats().localparts, 0);

    client.link("bob", "@bob:x.org");
    users.track_user("@bob:bridge.irc").await;
    assert!(users.is_child_cached("@bob:bridge.irc"));

    // The next write replaced the corrupt document.
    let reloaded = MergedUsers::new(client, store, config);
    reloaded.init();
    assert_eq!(reloaded.get_parent("@bob:bridge.irc"), "@bob:x.org");
}

#[tokio::test]
async fn persisted_profiles_are_served_fast() {
    let store = Arc::new(MemoryStore::new());
    let config = merge_config();
    let mut cache = mu_core::MergeCache::default();
    cache
        .localparts
        .insert("bob".into(), mu_core::LocalpartRecord::new("@bob:x.org", "@bob:bridge.irc"));
    cache.profiles.entry("@bob:x.org".into()).or_default().global = Some(ProfileInfo::named("Bob"));
    save_cache(store.as_ref(), &config.storage_key, &cache).unwrap();

    let users = MergedUsers::new(Arc::new(FakeClient::logged_in("@me:x.org")), store, config);
    users.init();
    assert_eq!(
        users.get_profile_fast("@bob:bridge.irc", None),
        ProfileInfo::named("Bob")
    );
}
