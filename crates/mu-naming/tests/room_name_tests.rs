//! Room naming scenarios over a fake homeserver

use mu_core::{Membership, ProfileInfo, Room};
use mu_naming::calculate_room_name;
use mu_test_utils::{joined, member, merge_config, room_with, setup_users};
use pretty_assertions::assert_eq;

const ROOM: &str = "!room:x.org";

fn me() -> mu_core::RoomMember {
    joined(ROOM, "@me:x.org", "Me")
}

#[tokio::test]
async fn explicit_name_wins() {
    let (users, _, _) = setup_users(merge_config());
    let mut room = room_with(ROOM, vec![me(), joined(ROOM, "@alice:x.org", "Alice")]);
    room.name = Some("Team Chat".into());
    room.canonical_alias = Some("#team:x.org".into());

    assert_eq!(calculate_room_name(&users, &room), "Team Chat");
}

#[tokio::test]
async fn alias_when_unnamed() {
    let (users, _, _) = setup_users(merge_config());
    let mut room = room_with(ROOM, vec![me()]);
    room.name = Some(String::new());
    room.alt_aliases = vec!["#alt:x.org".into()];
    assert_eq!(calculate_room_name(&users, &room), "#alt:x.org");

    room.canonical_alias = Some("#main:x.org".into());
    assert_eq!(calculate_room_name(&users, &room), "#main:x.org");
}

#[tokio::test]
async fn two_other_members() {
    let (users, _, _) = setup_users(merge_config());
    let room = room_with(
        ROOM,
        vec![
            me(),
            joined(ROOM, "@alice:x.org", "Alice"),
            member(ROOM, "@bob:x.org", "Bob", Membership::Invite),
        ],
    );

    assert_eq!(calculate_room_name(&users, &room), "Alice and Bob");
}

#[tokio::test]
async fn many_members_summarised() {
    let (users, _, _) = setup_users(merge_config());
    let mut members = vec![me(), joined(ROOM, "@alice:x.org", "Alice")];
    for name in ["bob", "carol", "dan", "erin", "frank"] {
        members.push(joined(ROOM, &format!("@{name}:x.org"), name));
    }
    let room = room_with(ROOM, members);

    assert_eq!(calculate_room_name(&users, &room), "Alice and 5 others");
}

#[tokio::test]
async fn bridged_accounts_count_once() {
    let (users, client, _) = setup_users(merge_config());
    client.link("alice", "@alice:x.org");
    client.link("me", "@me:x.org");
    users.track_user("@alice:bridge.irc").await;
    users.track_user("@me:bridge.irc").await;

    let room = room_with(
        ROOM,
        vec![
            me(),
            joined(ROOM, "@me:bridge.irc", "me_irc"),
            joined(ROOM, "@alice:x.org", "Alice"),
            joined(ROOM, "@alice:bridge.irc", "alice_irc"),
            joined(ROOM, "@bob:x.org", "Bob"),
        ],
    );

    assert_eq!(calculate_room_name(&users, &room), "Alice and Bob");
}

#[tokio::test]
async fn child_without_parent_uses_parent_profile() {
    let (users, client, _) = setup_users(merge_config());
    client.link("alice", "@alice:x.org");
    users.track_user("@alice:bridge.irc").await;
    users.cache_profile("@alice:x.org", Some(ROOM), Some(ProfileInfo::named("Alice")));

    let room = room_with(ROOM, vec![me(), joined(ROOM, "@alice:bridge.irc", "alice_irc")]);

    assert_eq!(calculate_room_name(&users, &room), "Alice");
}

#[tokio::test]
async fn summary_heroes_preferred() {
    let (users, _, _) = setup_users(merge_config());
    let mut room = room_with(
        ROOM,
        vec![
            me(),
            joined(ROOM, "@alice:x.org", "Alice"),
            joined(ROOM, "@zed:x.org", "Zed"),
        ],
    );
    room.summary_heroes = Some(vec!["@zed:x.org".into(), "@alice:x.org".into()]);

    assert_eq!(calculate_room_name(&users, &room), "Zed and Alice");
}

#[tokio::test]
async fn empty_room_remembers_who_left() {
    let (users, _, _) = setup_users(merge_config());
    let room = room_with(
        ROOM,
        vec![me(), member(ROOM, "@carol:x.org", "Carol", Membership::Leave)],
    );

    assert_eq!(calculate_room_name(&users, &room), "Empty room (was Carol)");
}

#[tokio::test]
async fn empty_room_without_history() {
    let (users, _, _) = setup_users(merge_config());
    let room = room_with(ROOM, vec![me()]);

    assert_eq!(calculate_room_name(&users, &room), "Empty room");
}

#[tokio::test]
async fn pending_third_party_invite() {
    let (users, _, _) = setup_users(merge_config());
    let mut room = room_with(ROOM, vec![me()]);
    room.third_party_invites = vec!["carol@example.com".into()];

    assert_eq!(calculate_room_name(&users, &room), "Inviting carol@example.com");
}

#[tokio::test]
async fn unknown_when_never_a_member() {
    let (users, _, _) = setup_users(merge_config());
    let room = Room::new(ROOM);

    assert_eq!(calculate_room_name(&users, &room), "Unknown Room");
}
