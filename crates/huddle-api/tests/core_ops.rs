//! Integration tests driving the operation layer directly against an
//! in-memory store, covering authorization gating, the poll cursor, read
//! state, reactions, pinning, admin management and uploads.

use uuid::Uuid;

use huddle_api::error::ApiError;
use huddle_api::uploads::{Upload, UploadTarget};
use huddle_api::{admin, auth, dms, messages, pins, presence, reactions, read_state, typing, uploads};
use huddle_db::Database;
use huddle_types::api::{CreateChannelRequest, UpdateStatusRequest, UpdateUserRequest};

fn store() -> Database {
    Database::open_in_memory().unwrap()
}

fn register(db: &Database, email: &str) -> Uuid {
    auth::register_op(db, email, "not-a-real-hash", Some("Test User"))
        .unwrap()
        .id
}

/// Bootstrap an admin and have them create a channel; returns (admin, channel).
fn admin_with_channel(db: &Database, name: &str) -> (Uuid, Uuid) {
    let admin_id = register(db, &format!("admin-{name}@example.com"));
    auth::bootstrap_op(db, admin_id).unwrap();
    let channel = admin::create_channel_op(
        db,
        admin_id,
        CreateChannelRequest {
            name: name.to_string(),
            description: None,
        },
    )
    .unwrap();
    (admin_id, channel.id)
}

#[test]
fn duplicate_email_is_rejected() {
    let db = store();
    register(&db, "dup@example.com");
    let err = auth::register_op(&db, "dup@example.com", "h", None).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // Email comparison is case-insensitive.
    let err = auth::register_op(&db, "DUP@example.com", "h", None).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[test]
fn bootstrap_promotes_only_while_no_admin_exists() {
    let db = store();
    let first = register(&db, "first@example.com");
    let second = register(&db, "second@example.com");

    let promoted = auth::bootstrap_op(&db, first).unwrap();
    assert!(promoted.is_admin);

    let err = auth::bootstrap_op(&db, second).unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[test]
fn membership_gates_channel_access() {
    let db = store();
    let (_admin, channel) = admin_with_channel(&db, "eng");
    let outsider = Uuid::new_v4(); // never registered, never a member

    let err = messages::list_messages_op(&db, outsider, channel, None).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = messages::send_message_op(&db, outsider, channel, "hi", None).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // Unknown channel reports not-found, not forbidden.
    let err = messages::list_messages_op(&db, outsider, Uuid::new_v4(), None).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn poll_cursor_returns_strictly_newer_messages() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "eng");

    for content in ["one", "two", "three"] {
        messages::send_message_op(&db, admin_id, channel, content, None).unwrap();
    }

    let all = messages::list_messages_op(&db, admin_id, channel, None).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].seq < w[1].seq));

    let newer = messages::list_messages_op(&db, admin_id, channel, Some(all[1].seq)).unwrap();
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].content, "three");

    // At the head of the stream the poll comes back empty.
    let none = messages::list_messages_op(&db, admin_id, channel, Some(all[2].seq)).unwrap();
    assert!(none.is_empty());
}

#[test]
fn only_the_sender_may_edit() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "eng");
    let other = register(&db, "other@example.com");
    admin::add_member_op(&db, admin_id, channel, other).unwrap();

    let msg = messages::send_message_op(&db, other, channel, "draft", None).unwrap();

    let err = messages::edit_message_op(&db, admin_id, msg.id, "hijacked").unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let edited = messages::edit_message_op(&db, other, msg.id, "final").unwrap();
    assert!(edited.is_edited);
    assert_eq!(edited.content, "final");
}

#[test]
fn delete_allows_sender_or_admin() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "eng");
    let alice = register(&db, "alice@example.com");
    let bob = register(&db, "bob@example.com");
    admin::add_member_op(&db, admin_id, channel, alice).unwrap();
    admin::add_member_op(&db, admin_id, channel, bob).unwrap();

    let msg = messages::send_message_op(&db, alice, channel, "temp", None).unwrap();
    let err = messages::delete_message_op(&db, bob, msg.id).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // Admin moderation overrides ownership.
    messages::delete_message_op(&db, admin_id, msg.id).unwrap();
    let err = messages::delete_message_op(&db, alice, msg.id).unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[test]
fn reaction_toggle_is_an_involution() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "eng");
    let msg = messages::send_message_op(&db, admin_id, channel, "react to me", None).unwrap();

    let groups = reactions::toggle_reaction_op(&db, admin_id, msg.id, "👍").unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 1);
    assert_eq!(groups[0].user_ids, vec![admin_id]);

    let groups = reactions::toggle_reaction_op(&db, admin_id, msg.id, "👍").unwrap();
    assert!(groups.is_empty());
}

#[test]
fn reply_target_must_live_in_the_same_channel() {
    let db = store();
    let (admin_id, channel_a) = admin_with_channel(&db, "alpha");
    let channel_b = admin::create_channel_op(
        &db,
        admin_id,
        CreateChannelRequest {
            name: "beta".into(),
            description: None,
        },
    )
    .unwrap()
    .id;

    let origin = messages::send_message_op(&db, admin_id, channel_a, "origin", None).unwrap();
    let err =
        messages::send_message_op(&db, admin_id, channel_b, "cross", Some(origin.id)).unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    let reply =
        messages::send_message_op(&db, admin_id, channel_a, "reply", Some(origin.id)).unwrap();
    assert_eq!(reply.reply_to.unwrap().id, origin.id);
}

#[test]
fn dm_listing_flags_incoming_as_read() {
    let db = store();
    let alice = register(&db, "alice@example.com");
    let bob = register(&db, "bob@example.com");

    let sent = dms::send_dm_op(&db, alice, bob, "hey bob", None).unwrap();
    assert!(!sent.is_read);

    // Bob opening the conversation marks Alice's message read.
    let bobs_view = dms::list_dms_op(&db, bob, alice, None).unwrap();
    assert_eq!(bobs_view.len(), 1);
    assert!(bobs_view[0].is_read);
}

#[test]
fn dm_reactions_are_party_gated() {
    let db = store();
    let alice = register(&db, "alice@example.com");
    let bob = register(&db, "bob@example.com");
    let eve = register(&db, "eve@example.com");

    let dm = dms::send_dm_op(&db, alice, bob, "private", None).unwrap();

    let err = reactions::toggle_dm_reaction_op(&db, eve, dm.id, "👀").unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let groups = reactions::toggle_dm_reaction_op(&db, bob, dm.id, "❤️").unwrap();
    assert_eq!(groups[0].count, 1);
}

#[test]
fn dm_edit_has_no_admin_override() {
    let db = store();
    let (admin_id, _channel) = admin_with_channel(&db, "eng");
    let bob = register(&db, "bob@example.com");

    let dm = dms::send_dm_op(&db, bob, admin_id, "mine", None).unwrap();
    let err = dms::edit_dm_op(&db, admin_id, dm.id, "not yours").unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let err = dms::delete_dm_op(&db, admin_id, dm.id).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[test]
fn unread_counts_reset_on_mark_read() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "eng");
    let reader = register(&db, "reader@example.com");
    admin::add_member_op(&db, admin_id, channel, reader).unwrap();

    messages::send_message_op(&db, admin_id, channel, "one", None).unwrap();
    messages::send_message_op(&db, admin_id, channel, "two", None).unwrap();

    let counts = read_state::unread_counts_op(&db, reader).unwrap();
    assert_eq!(counts.unread_counts.get(&channel), Some(&2));

    read_state::mark_read_op(&db, reader, channel).unwrap();
    let counts = read_state::unread_counts_op(&db, reader).unwrap();
    assert_eq!(counts.unread_counts.get(&channel), Some(&0));

    // Own messages never count.
    messages::send_message_op(&db, reader, channel, "mine", None).unwrap();
    let counts = read_state::unread_counts_op(&db, reader).unwrap();
    assert_eq!(counts.unread_counts.get(&channel), Some(&0));
}

#[test]
fn typing_indicator_excludes_the_caller() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "eng");
    let watcher = register(&db, "watcher@example.com");
    admin::add_member_op(&db, admin_id, channel, watcher).unwrap();

    typing::set_typing_op(&db, admin_id, channel).unwrap();

    let seen = typing::get_typing_op(&db, watcher, channel).unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, admin_id);

    // The typist does not see themselves.
    let own = typing::get_typing_op(&db, admin_id, channel).unwrap();
    assert!(own.is_empty());
}

#[test]
fn channel_creation_backfills_active_users_only() {
    let db = store();
    let admin_id = register(&db, "admin@example.com");
    auth::bootstrap_op(&db, admin_id).unwrap();
    let active = register(&db, "active@example.com");
    let dormant = register(&db, "dormant@example.com");
    admin::update_user_op(
        &db,
        admin_id,
        dormant,
        UpdateUserRequest {
            is_active: Some(false),
            is_admin: None,
        },
    )
    .unwrap();

    let channel = admin::create_channel_op(
        &db,
        admin_id,
        CreateChannelRequest {
            name: "all-hands".into(),
            description: Some("everyone".into()),
        },
    )
    .unwrap();

    let member_ids: Vec<Uuid> = channel
        .members
        .unwrap()
        .iter()
        .map(|m| m.user_id)
        .collect();
    assert!(member_ids.contains(&admin_id));
    assert!(member_ids.contains(&active));
    assert!(!member_ids.contains(&dormant));
}

#[test]
fn admins_cannot_demote_themselves() {
    let db = store();
    let admin_id = register(&db, "admin@example.com");
    auth::bootstrap_op(&db, admin_id).unwrap();

    let err = admin::update_user_op(
        &db,
        admin_id,
        admin_id,
        UpdateUserRequest {
            is_active: None,
            is_admin: Some(false),
        },
    )
    .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));

    // The flag is untouched afterwards.
    let users = admin::list_users_op(&db, admin_id).unwrap();
    assert!(users.iter().find(|u| u.id == admin_id).unwrap().is_admin);
}

#[test]
fn admin_routes_require_the_flag() {
    let db = store();
    let (_admin, _channel) = admin_with_channel(&db, "eng");
    let pleb = register(&db, "pleb@example.com");

    let err = admin::list_channels_op(&db, pleb).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let err = admin::list_users_op(&db, pleb).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[test]
fn setup_creates_general_once_and_backfills() {
    let db = store();
    let admin_id = register(&db, "admin@example.com");
    auth::bootstrap_op(&db, admin_id).unwrap();

    let first = admin::setup_op(&db, admin_id).unwrap();
    assert_eq!(first.name, admin::DEFAULT_CHANNEL);

    // Running setup again reuses the channel and picks up new users.
    let late = register(&db, "late@example.com");
    let second = admin::setup_op(&db, admin_id).unwrap();
    assert_eq!(second.id, first.id);
    assert!(second.members.unwrap().iter().any(|m| m.user_id == late));
}

#[test]
fn registration_after_setup_joins_general() {
    let db = store();
    let admin_id = register(&db, "admin@example.com");
    auth::bootstrap_op(&db, admin_id).unwrap();
    let general = admin::setup_op(&db, admin_id).unwrap().id;

    let newcomer = register(&db, "new@example.com");
    messages::list_messages_op(&db, newcomer, general, None).unwrap();
}

#[test]
fn pin_round_trip() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "eng");
    let msg = messages::send_message_op(&db, admin_id, channel, "important", None).unwrap();

    let pinned = pins::set_pinned_op(&db, admin_id, msg.id, true).unwrap();
    assert!(pinned.is_pinned);
    let listed = pins::list_pinned_op(&db, admin_id, channel).unwrap();
    assert_eq!(listed.len(), 1);

    pins::set_pinned_op(&db, admin_id, msg.id, false).unwrap();
    assert!(pins::list_pinned_op(&db, admin_id, channel).unwrap().is_empty());
}

#[test]
fn upload_creates_message_with_inline_attachment() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "eng");

    let upload = Upload {
        filename: "notes.txt".into(),
        mime_type: "text/plain".into(),
        bytes: b"hello world".to_vec(),
        target: UploadTarget::Channel(channel),
    };
    let msg = uploads::upload_to_channel_op(&db, admin_id, channel, upload).unwrap();

    assert_eq!(msg.content, "[Uploaded: notes.txt]");
    assert_eq!(msg.attachments.len(), 1);
    let att = &msg.attachments[0];
    assert_eq!(att.filename, "notes.txt");
    assert_eq!(att.size, 11);
    assert!(att.data_url.starts_with("data:text/plain;base64,"));
}

#[test]
fn status_is_settable_and_clearable() {
    let db = store();
    let user = register(&db, "status@example.com");

    let updated = presence::update_status_op(
        &db,
        user,
        UpdateStatusRequest {
            status: Some("in a meeting".into()),
        },
    )
    .unwrap();
    assert_eq!(updated.status.as_deref(), Some("in a meeting"));

    let cleared =
        presence::update_status_op(&db, user, UpdateStatusRequest { status: None }).unwrap();
    assert_eq!(cleared.status, None);
}

#[test]
fn heartbeat_marks_user_online() {
    let db = store();
    let user = register(&db, "alive@example.com");

    assert!(presence::online_users_op(&db, 60).unwrap().is_empty());

    presence::heartbeat_op(&db, user).unwrap();
    assert_eq!(presence::online_users_op(&db, 60).unwrap(), vec![user]);
}

/// End to end: a small workspace going through its first day.
#[test]
fn workspace_first_day() {
    let db = store();

    let founder = register(&db, "founder@example.com");
    auth::bootstrap_op(&db, founder).unwrap();
    let general = admin::setup_op(&db, founder).unwrap().id;

    let teammate = register(&db, "teammate@example.com");

    let hello = messages::send_message_op(&db, founder, general, "welcome!", None).unwrap();
    let counts = read_state::unread_counts_op(&db, teammate).unwrap();
    assert_eq!(counts.unread_counts.get(&general), Some(&1));

    let reply =
        messages::send_message_op(&db, teammate, general, "glad to be here", Some(hello.id))
            .unwrap();
    assert_eq!(reply.reply_to.as_ref().unwrap().id, hello.id);

    reactions::toggle_reaction_op(&db, founder, reply.id, "🎉").unwrap();
    read_state::mark_read_op(&db, teammate, general).unwrap();
    assert_eq!(
        read_state::unread_counts_op(&db, teammate)
            .unwrap()
            .unread_counts
            .get(&general),
        Some(&0)
    );

    let dm = dms::send_dm_op(&db, founder, teammate, "lunch?", None).unwrap();
    let inbox = dms::list_dms_op(&db, teammate, founder, None).unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].id, dm.id);
    assert!(inbox[0].is_read);

    // Poll from the reply onward: the channel has nothing newer.
    let poll = messages::list_messages_op(&db, teammate, general, Some(reply.seq)).unwrap();
    assert!(poll.is_empty());
}

#[test]
fn message_pages_are_capped() {
    let db = store();
    let (admin_id, channel) = admin_with_channel(&db, "firehose");

    let backlog = huddle_db::INITIAL_FETCH_LIMIT as usize + 20;
    for i in 0..backlog {
        messages::send_message_op(&db, admin_id, channel, &format!("m{i}"), None).unwrap();
    }

    // Without a cursor: the latest 100, oldest of the page first.
    let initial = messages::list_messages_op(&db, admin_id, channel, None).unwrap();
    assert_eq!(initial.len(), huddle_db::INITIAL_FETCH_LIMIT as usize);
    assert_eq!(initial.first().unwrap().content, "m20");
    assert_eq!(initial.last().unwrap().content, format!("m{}", backlog - 1));
    assert!(initial.windows(2).all(|w| w[0].seq < w[1].seq));

    // With a cursor below the backlog: capped at 50, resuming from the start.
    let page = messages::list_messages_op(&db, admin_id, channel, Some(0)).unwrap();
    assert_eq!(page.len(), huddle_db::POLL_FETCH_LIMIT as usize);
    assert_eq!(page.first().unwrap().content, "m0");
    assert_eq!(page.last().unwrap().content, "m49");
}
