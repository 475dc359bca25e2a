//! WebSocket chat integration tests.
//!
//! Each test drives real clients against in-process servers. Tests with two
//! servers attach both to one broker so messages must cross the channel layer.

mod fixtures;

use fixtures::{TestServer, assert_silent, recv_json, send_chat, wait_for_room_status};
use futures_util::SinkExt;
use hiroba_server::{
    domain::RoomId,
    infrastructure::pubsub::InMemoryBroker,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};

#[tokio::test]
async fn test_message_is_echoed_to_sender_and_room() {
    // テスト項目: 送信者自身を含むルーム全員にメッセージが届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("lobby", "alice").await;
    let mut bob = server.connect("lobby", "bob").await;

    // when (操作):
    send_chat(&mut alice, "hi").await;

    // then (期待する結果):
    let expected = serde_json::json!({"message": "hi", "username": "alice"});
    assert_eq!(recv_json(&mut alice).await, expected);
    assert_eq!(recv_json(&mut bob).await, expected);
}

#[tokio::test]
async fn test_rooms_do_not_leak() {
    // テスト項目: 別ルームのメンバーにはメッセージが届かない
    // given (前提条件):
    let server = TestServer::start().await;
    let mut c1 = server.connect("a", "alice").await;
    let mut c2 = server.connect("b", "bob").await;

    // when (操作):
    send_chat(&mut c1, "only for a").await;

    // then (期待する結果):
    assert_eq!(recv_json(&mut c1).await["message"], "only for a");
    assert_silent(&mut c2).await;
}

#[tokio::test]
async fn test_remaining_member_still_receives_after_peer_leaves() {
    // テスト項目: 切断したメンバーには配送されず、残ったメンバーには自分の送信が届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut c1 = server.connect("lobby", "alice").await;
    let mut c2 = server.connect("lobby", "bob").await;

    // when (操作):
    c1.close(None).await.expect("Failed to close");
    drop(c1);
    let room = RoomId::new("lobby".to_string()).unwrap();
    let mut left = false;
    for _ in 0..40 {
        if server.state().registry.members_of(&room).len() == 1 {
            left = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert!(left, "alice should have left the room");
    send_chat(&mut c2, "anyone?").await;

    // then (期待する結果):
    assert_eq!(
        recv_json(&mut c2).await,
        serde_json::json!({"message": "anyone?", "username": "bob"})
    );
    assert_eq!(server.state().broadcaster.subscription_count().await, 1);
}

#[tokio::test]
async fn test_malformed_message_is_dropped_and_connection_stays_open() {
    // テスト項目: 不正な形式のメッセージは誰にも配送されず、接続は維持される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = server.connect("lobby", "alice").await;
    let mut bob = server.connect("lobby", "bob").await;

    // when (操作):
    alice
        .send(Message::text(r#"{"msg":"hi"}"#))
        .await
        .expect("Failed to send");
    alice
        .send(Message::text("not json"))
        .await
        .expect("Failed to send");

    // then (期待する結果):
    assert_silent(&mut bob).await;
    assert_silent(&mut alice).await;

    // 同じ接続で正しいメッセージを送れる
    send_chat(&mut alice, "still here").await;
    assert_eq!(recv_json(&mut bob).await["message"], "still here");
}

#[tokio::test]
async fn test_message_crosses_processes_sharing_a_broker() {
    // テスト項目: 同じブローカーに接続した別プロセスのメンバーにも届く
    // given (前提条件):
    let broker = InMemoryBroker::default();
    let node_a = TestServer::start_with_broker(broker.clone()).await;
    let node_b = TestServer::start_with_broker(broker.clone()).await;
    let mut alice = node_a.connect("lobby", "alice").await;
    let mut bob = node_b.connect("lobby", "bob").await;
    let mut carol = node_b.connect("other", "carol").await;

    // when (操作):
    send_chat(&mut alice, "hello from a").await;
    send_chat(&mut bob, "hello from b").await;

    // then (期待する結果):
    let from_a = serde_json::json!({"message": "hello from a", "username": "alice"});
    let from_b = serde_json::json!({"message": "hello from b", "username": "bob"});
    let alice_got = [recv_json(&mut alice).await, recv_json(&mut alice).await];
    let bob_got = [recv_json(&mut bob).await, recv_json(&mut bob).await];
    assert!(alice_got.contains(&from_a) && alice_got.contains(&from_b));
    assert!(bob_got.contains(&from_a) && bob_got.contains(&from_b));
    assert_silent(&mut carol).await;
}

#[tokio::test]
async fn test_messages_from_one_sender_keep_order() {
    // テスト項目: 同じ送信者のメッセージは送信順に届く
    // given (前提条件):
    let broker = InMemoryBroker::default();
    let node_a = TestServer::start_with_broker(broker.clone()).await;
    let node_b = TestServer::start_with_broker(broker).await;
    let mut alice = node_a.connect("lobby", "alice").await;
    let mut bob = node_b.connect("lobby", "bob").await;

    // when (操作):
    for i in 0..20 {
        send_chat(&mut alice, &format!("m{i}")).await;
    }

    // then (期待する結果):
    for i in 0..20 {
        assert_eq!(recv_json(&mut bob).await["message"], format!("m{i}"));
    }
}

#[tokio::test]
async fn test_invalid_room_name_is_rejected() {
    // テスト項目: 不正なルーム名での接続は 400 で拒否される
    // given (前提条件):
    let server = TestServer::start().await;

    // when (操作):
    let result = connect_async(server.ws_url("bad%20room", "alice")).await;

    // then (期待する結果):
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 400),
        other => panic!("Expected HTTP 400, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_missing_identity_is_rejected() {
    // テスト項目: ユーザー名なしの接続は 401 で拒否され、ルームに登録されない
    // given (前提条件):
    let server = TestServer::start().await;
    let url = format!("{}/ws/chat/lobby", server.base_url().replace("http", "ws"));

    // when (操作):
    let result = connect_async(url).await;

    // then (期待する結果):
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("Expected HTTP 401, got {:?}", other.map(|_| ())),
    }
    assert!(wait_for_room_status(&server, "lobby", 404).await);
    assert_eq!(server.state().broadcaster.subscription_count().await, 0);
}

#[tokio::test]
async fn test_broker_outage_rejects_new_connections() {
    // テスト項目: ブローカーが利用できない場合は 503 で拒否され、登録は取り消される
    // given (前提条件):
    let broker = InMemoryBroker::default();
    let server = TestServer::start_with_broker(broker.clone()).await;
    broker.close();

    // when (操作):
    let result = connect_async(server.ws_url("lobby", "alice")).await;

    // then (期待する結果):
    match result {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 503),
        other => panic!("Expected HTTP 503, got {:?}", other.map(|_| ())),
    }
    assert!(wait_for_room_status(&server, "lobby", 404).await);
}

#[tokio::test]
async fn test_shutdown_releases_subscriptions() {
    // テスト項目: サーバー停止時にすべてのチャネル購読が解除される
    // given (前提条件):
    let broker = InMemoryBroker::default();
    let server = TestServer::start_with_broker(broker.clone()).await;
    let state = server.state().clone();
    let mut alice = server.connect("a", "alice").await;
    let _bob = server.connect("b", "bob").await;
    assert_eq!(state.broadcaster.subscription_count().await, 2);

    // when (操作):
    alice.close(None).await.expect("Failed to close");
    server.stop().await;

    // then (期待する結果):
    assert_eq!(state.broadcaster.subscription_count().await, 0);
}
