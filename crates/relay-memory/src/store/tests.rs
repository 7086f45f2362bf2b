use super::*;
use std::time::Duration;

#[tokio::test]
async fn test_get_unseen_key_is_empty() {
    let store = ConversationStore::new(10);
    assert!(store.get("5511999998888").await.is_empty());
}

#[tokio::test]
async fn test_append_preserves_order() {
    let store = ConversationStore::new(10);
    store.append("1", Turn::user("Hello")).await;
    store.append("1", Turn::assistant("Hi!")).await;
    assert_eq!(
        store.get("1").await,
        vec![Turn::user("Hello"), Turn::assistant("Hi!")]
    );
}

#[tokio::test]
async fn test_eleven_appends_keep_most_recent_ten() {
    let store = ConversationStore::new(10);
    for i in 0..11 {
        store.append("1", Turn::user(format!("m{i}"))).await;
    }
    let turns = store.get("1").await;
    assert_eq!(turns.len(), 10);
    let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
    let expected: Vec<String> = (1..11).map(|i| format!("m{i}")).collect();
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn test_clear_empties_and_is_idempotent() {
    let store = ConversationStore::new(10);
    store.append("1", Turn::user("a")).await;
    store.append("1", Turn::assistant("b")).await;
    store.clear("1").await;
    assert!(store.get("1").await.is_empty());
    store.clear("1").await;
    assert!(store.get("1").await.is_empty());
    // Clearing a never-seen key is fine too.
    store.clear("2").await;
    assert!(store.get("2").await.is_empty());
}

#[tokio::test]
async fn test_keys_are_independent() {
    let store = ConversationStore::new(10);
    store.append("1", Turn::user("one")).await;
    store.append("2", Turn::user("two")).await;
    store.clear("1").await;
    assert!(store.get("1").await.is_empty());
    assert_eq!(store.get("2").await, vec![Turn::user("two")]);
    assert_eq!(store.conversation_count(), 2);
}

#[tokio::test]
async fn test_zero_capacity_is_bumped_to_one() {
    let store = ConversationStore::new(0);
    assert_eq!(store.max_turns(), 1);
    store.append("1", Turn::user("a")).await;
    store.append("1", Turn::user("b")).await;
    assert_eq!(store.get("1").await, vec![Turn::user("b")]);
}

#[tokio::test]
async fn test_session_serializes_same_key() {
    let store = ConversationStore::new(10);
    let mut held = store.session("1").await;

    let waiter = {
        let store = store.clone();
        tokio::spawn(async move {
            store.append("1", Turn::user("second")).await;
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "same-key append must wait for the session");

    held.append(Turn::user("first"));
    drop(held);
    waiter.await.unwrap();

    assert_eq!(
        store.get("1").await,
        vec![Turn::user("first"), Turn::user("second")]
    );
}

#[tokio::test]
async fn test_session_does_not_block_other_keys() {
    let store = ConversationStore::new(10);
    let _held = store.session("1").await;

    let result = tokio::time::timeout(Duration::from_secs(1), store.append("2", Turn::user("x"))).await;
    assert!(result.is_ok(), "different key must not wait");
    assert_eq!(store.get("2").await.len(), 1);
}
