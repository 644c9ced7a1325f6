mod common;

use common::{mock_server, Reply};
use redesk::{dispatch, execute, spawn_dispatch, ConnectOptions, ConnectionManager, Error, Status};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn connected(addr: std::net::SocketAddr) -> ConnectionManager {
    let manager = ConnectionManager::new();
    manager
        .connect(&addr.to_string(), ConnectOptions::default())
        .await
        .unwrap();
    manager
}

#[tokio::test]
async fn set_returns_ok() {
    let addr = mock_server(|args| match args[0].as_str() {
        "SET" if args[1..] == ["a", "b"] => Some(Reply::Raw(b"+OK\r\n")),
        _ => None,
    })
    .await;
    let manager = connected(addr).await;

    assert_eq!(dispatch("SET a b", &manager).await, "OK");
}

#[tokio::test]
async fn missing_key_renders_nil() {
    let addr = mock_server(|args| match args[0].as_str() {
        "GET" => Some(Reply::Raw(b"$-1\r\n")),
        _ => None,
    })
    .await;
    let manager = connected(addr).await;

    assert_eq!(dispatch("GET missing", &manager).await, "(nil)");
}

#[tokio::test]
async fn integer_and_arrays_render_as_text() {
    let addr = mock_server(|args| match args[0].as_str() {
        "INCR" => Some(Reply::Raw(b":-3\r\n")),
        "LRANGE" => Some(Reply::Raw(b"*3\r\n$1\r\na\r\n:2\r\n*2\r\n+x\r\n$-1\r\n")),
        "KEYS" => Some(Reply::Raw(b"*0\r\n")),
        _ => None,
    })
    .await;
    let manager = connected(addr).await;

    assert_eq!(dispatch("INCR n", &manager).await, "-3");
    assert_eq!(dispatch("LRANGE l 0 -1", &manager).await, "[a,2,[x,(nil)]]");
    assert_eq!(dispatch("KEYS *", &manager).await, "[]");
}

#[tokio::test]
async fn server_and_client_errors_are_distinct() {
    let addr = mock_server(|_| None).await;
    let manager = connected(addr).await;

    assert_eq!(
        dispatch("NOSUCH", &manager).await,
        "(error) ERR unknown command"
    );
    assert_eq!(
        dispatch("GET \"unterminated", &manager).await,
        "(client error) invalid command line: unbalanced quotes"
    );
    assert_eq!(manager.status(), Status::Connected);
}

#[tokio::test]
async fn empty_line_is_not_sent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let addr = mock_server(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        None
    })
    .await;
    let manager = connected(addr).await;

    let res = execute("", &manager).await;
    assert!(matches!(res, Err(Error::EmptyCommand)));

    let res = execute("   \t ", &manager).await;
    assert!(matches!(res, Err(Error::EmptyCommand)));

    assert_eq!(dispatch("", &manager).await, "(client error) empty command");

    // Only the PING issued while connecting reached the server.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dispatch_while_disconnected() {
    let manager = ConnectionManager::new();

    assert_eq!(
        dispatch("GET a", &manager).await,
        "(client error) not connected"
    );
}

#[tokio::test]
async fn quoted_argument_reaches_server_whole() {
    let addr = mock_server(|args| match args[0].as_str() {
        "SET" if args[2] == "hello world" => Some(Reply::Raw(b"+OK\r\n")),
        "SET" => Some(Reply::Raw(b"-ERR syntax error\r\n")),
        _ => None,
    })
    .await;
    let manager = connected(addr).await;

    assert_eq!(dispatch("SET k \"hello world\"", &manager).await, "OK");
}

#[tokio::test]
async fn background_dispatch() {
    let addr = mock_server(|args| match args[0].as_str() {
        "ECHO" => Some(Reply::Raw(b"$2\r\nhi\r\n")),
        _ => None,
    })
    .await;
    let manager = Arc::new(connected(addr).await);

    let first = spawn_dispatch("ECHO hi".to_string(), manager.clone());
    let second = spawn_dispatch("ECHO hi".to_string(), manager.clone());

    assert_eq!(first.await.unwrap(), "hi");
    assert_eq!(second.await.unwrap(), "hi");
}
