mod common;

use common::{test_db, user};
use sportmatch::{
    chat::{
        conversations::{scan_conversations, ConversationIndex},
        live::LiveRouter,
        log::MessageLog,
        send_message,
    },
    CoreError,
};

struct Chat {
    log: MessageLog,
    index: ConversationIndex,
    live: LiveRouter,
}

fn chat(pool: &sqlx::SqlitePool) -> Chat {
    Chat {
        log: MessageLog::new(pool.clone(), 2000),
        index: ConversationIndex::new(pool.clone()),
        live: LiveRouter::new(16),
    }
}

#[tokio::test]
async fn conversations_track_last_message_and_unread() {
    let db = test_db().await;
    let chat = chat(&db.pool);
    let (a, b, c) = (user("a"), user("b"), user("c"));

    chat.log.append(&a, &b, "hi").await.unwrap();
    chat.log.append(&b, &a, "yo").await.unwrap();
    chat.log.append(&a, &c, "hey").await.unwrap();

    let of_a = chat.index.list_conversations(&a).await.unwrap();
    assert_eq!(of_a.len(), 2);
    assert_eq!(of_a[0].counterpart_id, c);
    assert_eq!(of_a[0].last_message, "hey");
    assert_eq!(of_a[0].unread_count, 0);
    assert_eq!(of_a[1].counterpart_id, b);
    assert_eq!(of_a[1].last_message, "yo");
    assert_eq!(of_a[1].unread_count, 1);

    let of_b = chat.index.list_conversations(&b).await.unwrap();
    assert_eq!(of_b.len(), 1);
    assert_eq!(of_b[0].counterpart_id, a);
    assert_eq!(of_b[0].last_message, "yo");
    assert_eq!(of_b[0].unread_count, 1);

    assert_eq!(chat.log.mark_read(&a, &b).await.unwrap(), 1);
    let of_a = chat.index.list_conversations(&a).await.unwrap();
    assert_eq!(of_a[1].unread_count, 0);
    // b has not read anything yet
    assert_eq!(chat.index.list_conversations(&b).await.unwrap()[0].unread_count, 1);

    for user_id in [&a, &b, &c] {
        assert_eq!(
            chat.index.list_conversations(user_id).await.unwrap(),
            scan_conversations(&chat.log, user_id).await.unwrap(),
        );
    }
}

#[tokio::test]
async fn mark_read_is_idempotent() {
    let db = test_db().await;
    let chat = chat(&db.pool);
    let (a, b) = (user("a"), user("b"));

    for text in ["one", "two", "three"] {
        chat.log.append(&b, &a, text).await.unwrap();
    }
    chat.log.append(&a, &b, "reply").await.unwrap();

    assert_eq!(chat.log.mark_read(&a, &b).await.unwrap(), 3);
    assert_eq!(chat.log.mark_read(&a, &b).await.unwrap(), 0);

    let history = chat.log.messages_between(&a, &b, None, None).await.unwrap();
    let unread: Vec<_> = history.iter().filter(|m| !m.read).map(|m| m.text.as_str()).collect();
    assert_eq!(unread, vec!["reply"]);
}

#[tokio::test]
async fn invalid_messages_are_rejected_and_not_stored() {
    let db = test_db().await;
    let chat = chat(&db.pool);
    let (a, b) = (user("a"), user("b"));

    let too_long = "x".repeat(2001);
    for (to, text) in [(&a, "to myself"), (&b, "   "), (&b, too_long.as_str())] {
        let err = chat.log.append(&a, to, text).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }), "{err}");
    }

    assert!(chat.log.involving(&a).await.unwrap().is_empty());
    assert!(chat.index.list_conversations(&a).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_is_ordered_and_paged() {
    let db = test_db().await;
    let chat = chat(&db.pool);
    let (a, b) = (user("a"), user("b"));

    let mut sent = Vec::new();
    for i in 0..6 {
        let (from, to) = if i % 2 == 0 { (&a, &b) } else { (&b, &a) };
        sent.push(chat.log.append(from, to, &format!("m{i}")).await.unwrap());
    }
    // unrelated traffic stays out of the pair's history
    chat.log.append(&a, &user("c"), "elsewhere").await.unwrap();

    let all = chat.log.messages_between(&b, &a, None, None).await.unwrap();
    assert_eq!(all, sent);

    let latest = chat.log.messages_between(&a, &b, None, Some(2)).await.unwrap();
    assert_eq!(latest, sent[4..].to_vec());

    let after = chat
        .log
        .messages_between(&a, &b, Some(sent[1].created_at), Some(3))
        .await
        .unwrap();
    assert!(after.iter().all(|m| m.created_at > sent[1].created_at));
    assert!(after.len() <= 3);
    assert_eq!(after.last().map(|m| m.created_at), after.iter().map(|m| m.created_at).max());
}

#[tokio::test]
async fn offline_receiver_reads_from_the_log_without_replay() {
    let db = test_db().await;
    let chat = chat(&db.pool);
    let (a, b) = (user("a"), user("b"));

    let offline = send_message(&chat.log, &chat.live, &a, &b, "while away").await.unwrap();

    let mut sub = chat.live.register(&b);
    let online = send_message(&chat.log, &chat.live, &a, &b, "now online").await.unwrap();

    // only the message sent after registering is pushed
    assert_eq!(sub.receiver.recv().await, Some(online.clone()));
    assert!(sub.receiver.try_recv().is_err());

    let history = chat.log.messages_between(&b, &a, None, None).await.unwrap();
    assert_eq!(history, vec![offline, online]);
    assert_eq!(chat.index.list_conversations(&b).await.unwrap()[0].unread_count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_keep_the_index_exact() {
    let db = test_db().await;
    let chat = chat(&db.pool);
    let hub = user("hub");

    let sends: Vec<_> = (0..24)
        .map(|i| {
            let log = chat.log.clone();
            let hub = hub.clone();
            tokio::spawn(async move {
                let peer = user(&format!("peer{}", i % 4));
                if i % 3 == 0 {
                    log.append(&hub, &peer, &format!("out {i}")).await
                } else {
                    log.append(&peer, &hub, &format!("in {i}")).await
                }
            })
        })
        .collect();
    for send in sends {
        send.await.unwrap().unwrap();
    }

    let indexed = chat.index.list_conversations(&hub).await.unwrap();
    assert_eq!(indexed.len(), 4);
    assert_eq!(indexed, scan_conversations(&chat.log, &hub).await.unwrap());
    assert_eq!(indexed.iter().map(|c| c.unread_count).sum::<u32>(), 16);

    for i in 0..4 {
        let peer = user(&format!("peer{i}"));
        assert_eq!(
            chat.index.list_conversations(&peer).await.unwrap(),
            scan_conversations(&chat.log, &peer).await.unwrap(),
        );
    }
}

#[tokio::test]
async fn reading_a_page_leaves_the_rest_unread() {
    let db = test_db().await;
    let chat = chat(&db.pool);
    let (a, b) = (user("a"), user("b"));

    let mut sent = Vec::new();
    for i in 0..5 {
        sent.push(chat.log.append(&b, &a, &format!("m{i}")).await.unwrap());
    }

    let latest = chat.log.messages_between(&a, &b, None, Some(2)).await.unwrap();
    assert_eq!(chat.log.mark_page_read(&a, &b, &latest).await.unwrap(), 2);
    assert_eq!(chat.index.list_conversations(&a).await.unwrap()[0].unread_count, 3);

    let middle = &sent[1..3];
    assert_eq!(chat.log.mark_page_read(&a, &b, middle).await.unwrap(), 2);
    assert_eq!(chat.log.mark_page_read(&a, &b, &[]).await.unwrap(), 0);

    let history = chat.log.messages_between(&a, &b, None, None).await.unwrap();
    let unread: Vec<_> = history.iter().filter(|m| !m.read).map(|m| m.text.as_str()).collect();
    assert_eq!(unread, vec!["m0"]);
    assert_eq!(
        chat.index.list_conversations(&a).await.unwrap(),
        scan_conversations(&chat.log, &a).await.unwrap(),
    );
}
