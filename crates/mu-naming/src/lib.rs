//! Merged Users Naming
//!
//! Derives a display name for a room. Members are collapsed to one entry
//! per logical identity first, so a user present through several bridged
//! accounts is counted and named once.
//!
//! # Example
//!
//! ```rust,ignore
//! use mu_naming::calculate_room_name;
//!
//! # fn example(users: &mu_core::MergedUsers, room: &mu_core::Room) {
//! let name = calculate_room_name(users, room);
//! println!("{name}");
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

use mu_core::{Membership, MergedUsers, Room, RoomMember};
use tracing::trace;

/// Most member names considered when no summary heroes are available
pub const MAX_NAMED_MEMBERS: usize = 5;

/// Name shown for rooms the local user has never been part of
pub const UNKNOWN_ROOM: &str = "Unknown Room";

/// Name shown for rooms without anybody else in them
pub const EMPTY_ROOM: &str = "Empty room";

/// Compute the display name of `room`
///
/// Order of preference: explicit room name, canonical alias (or any
/// alias), then a summary of the other members.
#[must_use]
pub fn calculate_room_name(users: &MergedUsers, room: &Room) -> String {
    if let Some(name) = room.name.as_deref().filter(|n| !n.is_empty()) {
        trace!(room_id = %room.room_id, "explicit room name");
        return name.to_string();
    }
    if let Some(alias) = room.any_alias() {
        trace!(room_id = %room.room_id, "room alias as name");
        return alias.to_string();
    }

    let others: Vec<&RoomMember> = effective_members(
        users,
        room.members.iter().filter(|m| m.membership.is_current()),
    )
    .into_iter()
    .filter(|m| !users.is_self(&m.user_id))
    .collect();

    if !others.is_empty() {
        let names = other_names(users, room, &others);
        return member_names_to_room_name(&names, Some(others.len()));
    }

    let my_member = users
        .client()
        .session()
        .and_then(|s| room.member(&s.user_id).cloned());
    let Some(me) = my_member else {
        return UNKNOWN_ROOM.to_string();
    };

    if me.membership == Membership::Join && !room.third_party_invites.is_empty() {
        return format!(
            "Inviting {}",
            member_names_to_room_name(&room.third_party_invites, None)
        );
    }

    let left: Vec<String> = effective_members(
        users,
        room.members
            .iter()
            .filter(|m| !m.membership.is_current() && !users.is_self(&m.user_id)),
    )
    .into_iter()
    .map(|m| display_name(users, m))
    .collect();

    if left.is_empty() {
        EMPTY_ROOM.to_string()
    } else {
        format!("{EMPTY_ROOM} (was {})", member_names_to_room_name(&left, None))
    }
}

/// Render member names as a room name
///
/// `count` is the number of members the names stand for and defaults to
/// the number of names. Only the first name is spelled out once there are
/// more than two members.
#[must_use]
pub fn member_names_to_room_name<S: AsRef<str>>(names: &[S], count: Option<usize>) -> String {
    let count = count.unwrap_or(names.len());
    let rest = count.saturating_sub(1);

    match names {
        [] => EMPTY_ROOM.to_string(),
        [only] if rest <= 1 => only.as_ref().to_string(),
        [first, second] if rest <= 2 => format!("{} and {}", first.as_ref(), second.as_ref()),
        [first, ..] if rest > 1 => format!("{} and {rest} others", first.as_ref()),
        [first, ..] => format!("{} and 1 other", first.as_ref()),
    }
}

/// Collapse members to one per logical identity, preserving input order
fn effective_members<'a>(
    users: &MergedUsers,
    members: impl Iterator<Item = &'a RoomMember>,
) -> Vec<&'a RoomMember> {
    let tuples: Vec<_> = members.map(|m| (Some(m.user_id.clone()), m)).collect();
    users.get_effective_parents(tuples, false)
}

fn other_names(users: &MergedUsers, room: &Room, others: &[&RoomMember]) -> Vec<String> {
    let heroes = room.summary_heroes.as_deref().filter(|h| !h.is_empty());

    let named: Vec<RoomMember> = match heroes {
        Some(heroes) => heroes
            .iter()
            .map(|id| {
                room.member(id)
                    .cloned()
                    .unwrap_or_else(|| RoomMember::new(id.as_str(), room.room_id.as_str(), Membership::Join))
            })
            .collect(),
        None => {
            let mut sorted: Vec<RoomMember> = others.iter().map(|m| (*m).clone()).collect();
            sorted.sort_by(|a, b| a.user_id.cmp(&b.user_id));
            sorted.truncate(MAX_NAMED_MEMBERS);
            sorted
        }
    };

    effective_members(users, named.iter())
        .into_iter()
        .map(|m| display_name(users, m))
        .collect()
}

fn display_name(users: &MergedUsers, member: &RoomMember) -> String {
    let profile = users.get_profile_of(member);
    profile
        .displayname
        .filter(|n| !n.is_empty())
        .or_else(|| Some(member.name.clone()).filter(|n| !n.is_empty()))
        .unwrap_or_else(|| member.user_id.clone())
}
