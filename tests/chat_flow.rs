//! Store-level integration tests against a real PostgreSQL instance.
//!
//! Gated on TEST_DATABASE_URL; without it every test is a silent skip so
//! the suite stays green on machines without a database.

use db_pool::{create_pool, DbConfig};
use deadpool_postgres::Pool;
use marketplace_chat_service::db;
use marketplace_chat_service::error::AppError;
use marketplace_chat_service::models::message::MessageStatus;
use marketplace_chat_service::presence::PresenceTable;
use marketplace_chat_service::services::ChatStore;
use marketplace_chat_service::websocket::events;
use uuid::Uuid;

async fn test_pool() -> Option<Pool> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };
    let cfg = DbConfig {
        service_name: "chat-flow-tests".into(),
        database_url: url,
        ..DbConfig::default()
    };
    let pool = create_pool(cfg).await.expect("pool");
    db::run_migrations(&pool).await.expect("migrations");
    Some(pool)
}

#[tokio::test]
async fn conversation_creation_is_idempotent_across_participant_order() {
    let Some(pool) = test_pool().await else { return };
    let product = Uuid::new_v4();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let first = ChatStore::find_or_create_conversation(&pool, product, alice, bob)
        .await
        .expect("create");
    let second = ChatStore::find_or_create_conversation(&pool, product, bob, alice)
        .await
        .expect("find");

    assert_eq!(first.id, second.id);
    assert!(first.is_participant(alice));
    assert!(first.is_participant(bob));

    // Fresh counters for both sides.
    assert_eq!(ChatStore::unread_count(&pool, first.id, alice).await.unwrap(), 0);
    assert_eq!(ChatStore::unread_count(&pool, first.id, bob).await.unwrap(), 0);
}

#[tokio::test]
async fn self_conversation_is_rejected() {
    let Some(pool) = test_pool().await else { return };
    let user = Uuid::new_v4();

    let err = ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), user, user)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn each_message_increments_only_the_recipients_unread_count() {
    let Some(pool) = test_pool().await else { return };
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, bob)
        .await
        .unwrap();

    for n in 1..=3 {
        ChatStore::append_message(&pool, conv.id, alice, &format!("hello {n}"))
            .await
            .unwrap();
        assert_eq!(
            ChatStore::unread_count(&pool, conv.id, bob).await.unwrap(),
            n
        );
    }
    assert_eq!(ChatStore::unread_count(&pool, conv.id, alice).await.unwrap(), 0);

    let (conv2, updated) = {
        let c = ChatStore::conversation_for_participant(&pool, conv.id, alice)
            .await
            .unwrap();
        (c.clone(), c.updated_at)
    };
    assert!(conv2.last_message_id.is_some());
    assert!(updated >= conv.updated_at);
}

#[tokio::test]
async fn mark_read_zeroes_the_reader_and_never_touches_their_own_messages() {
    let Some(pool) = test_pool().await else { return };
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, bob)
        .await
        .unwrap();

    ChatStore::append_message(&pool, conv.id, alice, "from alice").await.unwrap();
    ChatStore::append_message(&pool, conv.id, bob, "from bob").await.unwrap();

    let (_, flipped) = ChatStore::mark_read(&pool, conv.id, bob).await.unwrap();
    assert_eq!(flipped, 1, "only alice's message flips for bob");
    assert_eq!(ChatStore::unread_count(&pool, conv.id, bob).await.unwrap(), 0);
    // Alice has not read; bob's message stays unread for her.
    assert_eq!(ChatStore::unread_count(&pool, conv.id, alice).await.unwrap(), 1);

    let messages = ChatStore::list_messages(&pool, conv.id).await.unwrap();
    let from_alice = messages.iter().find(|m| m.sender_id == alice).unwrap();
    let from_bob = messages.iter().find(|m| m.sender_id == bob).unwrap();
    assert_eq!(from_alice.status, MessageStatus::Read);
    assert_eq!(from_bob.status, MessageStatus::Sent);

    // Sweeping again finds nothing new; read status never regresses.
    let (_, flipped_again) = ChatStore::mark_read(&pool, conv.id, bob).await.unwrap();
    assert_eq!(flipped_again, 0);
    let messages = ChatStore::list_messages(&pool, conv.id).await.unwrap();
    assert_eq!(
        messages.iter().find(|m| m.sender_id == alice).unwrap().status,
        MessageStatus::Read
    );
}

#[tokio::test]
async fn blank_content_is_rejected_and_nothing_is_persisted() {
    let Some(pool) = test_pool().await else { return };
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let conv = ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, bob)
        .await
        .unwrap();

    for content in ["", "   ", "\n\t"] {
        let err = ChatStore::append_message(&pool, conv.id, alice, content)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "{content:?}");
    }

    assert!(ChatStore::list_messages(&pool, conv.id).await.unwrap().is_empty());
    assert_eq!(ChatStore::unread_count(&pool, conv.id, bob).await.unwrap(), 0);
}

#[tokio::test]
async fn strangers_cannot_see_or_touch_a_conversation() {
    let Some(pool) = test_pool().await else { return };
    let (alice, bob, mallory) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let conv = ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, bob)
        .await
        .unwrap();

    let err = ChatStore::conversation_for_participant(&pool, conv.id, mallory)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = ChatStore::append_message(&pool, conv.id, mallory, "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = ChatStore::mark_read(&pool, conv.id, mallory).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Missing ids and excluded callers are indistinguishable.
    let missing = ChatStore::conversation_for_participant(&pool, Uuid::new_v4(), alice)
        .await
        .unwrap_err();
    assert_eq!(missing.public_message(), err.public_message());
}

#[tokio::test]
async fn listing_orders_by_recency_and_carries_previews() {
    let Some(pool) = test_pool().await else { return };
    let alice = Uuid::new_v4();
    let (bob, carol) = (Uuid::new_v4(), Uuid::new_v4());

    let with_bob = ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, bob)
        .await
        .unwrap();
    let with_carol = ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, carol)
        .await
        .unwrap();

    ChatStore::append_message(&pool, with_carol.id, carol, "first").await.unwrap();
    ChatStore::append_message(&pool, with_bob.id, bob, "second").await.unwrap();

    let summaries = ChatStore::list_conversations(&pool, alice).await.unwrap();
    let ours: Vec<_> = summaries
        .iter()
        .filter(|s| s.id == with_bob.id || s.id == with_carol.id)
        .collect();

    assert_eq!(ours.len(), 2);
    assert_eq!(ours[0].id, with_bob.id, "latest activity first");
    assert_eq!(ours[0].last_message.as_deref(), Some("second"));
    assert_eq!(ours[0].other_user_id, bob);
    assert_eq!(ours[0].unread_count, 1);
    assert_eq!(ours[1].last_message.as_deref(), Some("first"));
}

#[tokio::test]
async fn partners_cover_every_shared_conversation_exactly_once() {
    let Some(pool) = test_pool().await else { return };
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    // Two conversations with the same partner over different products.
    ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, bob)
        .await
        .unwrap();
    ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, bob)
        .await
        .unwrap();

    let partners = ChatStore::conversation_partners(&pool, alice).await.unwrap();
    assert_eq!(partners, vec![bob]);
}

#[tokio::test]
async fn status_broadcast_reaches_conversation_partners_only() {
    let Some(pool) = test_pool().await else { return };
    let (alice, bob, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    ChatStore::find_or_create_conversation(&pool, Uuid::new_v4(), alice, bob)
        .await
        .unwrap();

    let presence = PresenceTable::new();
    let (_, mut bob_rx) = presence.register(bob).await;
    let (_, mut stranger_rx) = presence.register(stranger).await;

    events::notify_user_status(&pool, &presence, alice, true)
        .await
        .unwrap();

    let frame = bob_rx.try_recv().expect("partner notified");
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["type"], "userStatus");
    assert_eq!(value["userId"], alice.to_string());
    assert_eq!(value["isOnline"], true);

    assert!(
        stranger_rx.try_recv().is_err(),
        "users with no shared conversation are not notified"
    );
}
