use respite::command::{Engine, SharedEngine};
use respite::config::Config;
use respite::persistence::aof::{self, Aof, FsyncPolicy};
use respite::store::DataStore;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

fn new_engine() -> Engine {
    Engine::new(Arc::new(RwLock::new(DataStore::new())))
}

fn start_server(port: u16, engine: SharedEngine) -> CancellationToken {
    let config = Config {
        port,
        ..Default::default()
    };
    let config = Arc::new(RwLock::new(config));
    let shutdown = CancellationToken::new();

    let token = shutdown.clone();
    tokio::spawn(async move {
        let _ = respite::server::run_server(engine, config, token).await;
    });
    shutdown
}

fn get_client(port: u16) -> redis::Connection {
    let client = redis::Client::open(format!("redis://127.0.0.1:{port}/")).unwrap();
    // Retry connection a few times
    for i in 0..50 {
        match client.get_connection() {
            Ok(conn) => return conn,
            Err(_) if i < 49 => {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            Err(e) => panic!("Failed to connect: {e}"),
        }
    }
    unreachable!()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ping() {
    let port = 17379;
    let _shutdown = start_server(port, Arc::new(new_engine()));

    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let result: String = redis::cmd("PING").query(&mut conn).unwrap();
        assert_eq!(result, "PONG");
        let result: String = redis::cmd("ping").arg("hello").query(&mut conn).unwrap();
        assert_eq!(result, "hello");
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_get() {
    let port = 17380;
    let _shutdown = start_server(port, Arc::new(new_engine()));

    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);

        let ok: String = redis::cmd("SET").arg("foo").arg("bar").query(&mut conn).unwrap();
        assert_eq!(ok, "OK");
        let val: String = redis::cmd("GET").arg("foo").query(&mut conn).unwrap();
        assert_eq!(val, "bar");

        let missing: Option<String> = redis::cmd("GET").arg("nope").query(&mut conn).unwrap();
        assert_eq!(missing, None);

        let binary = b"line1\r\nline2\0end".to_vec();
        let _: String = redis::cmd("SET").arg("bin").arg(&binary).query(&mut conn).unwrap();
        let val: Vec<u8> = redis::cmd("GET").arg("bin").query(&mut conn).unwrap();
        assert_eq!(val, binary);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hset_hget() {
    let port = 17381;
    let _shutdown = start_server(port, Arc::new(new_engine()));

    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);

        let ok: String = redis::cmd("HSET")
            .arg("user:1")
            .arg("name")
            .arg("ada")
            .query(&mut conn)
            .unwrap();
        assert_eq!(ok, "OK");

        let name: String = redis::cmd("HGET").arg("user:1").arg("name").query(&mut conn).unwrap();
        assert_eq!(name, "ada");
        let email: Option<String> =
            redis::cmd("HGET").arg("user:1").arg("email").query(&mut conn).unwrap();
        assert_eq!(email, None);
        let other: Option<String> =
            redis::cmd("HGET").arg("user:2").arg("name").query(&mut conn).unwrap();
        assert_eq!(other, None);
        let plain: Option<String> = redis::cmd("GET").arg("user:1").query(&mut conn).unwrap();
        assert_eq!(plain, None);
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_replies() {
    let port = 17382;
    let _shutdown = start_server(port, Arc::new(new_engine()));

    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);

        let err = redis::cmd("NOSUCHCMD").query::<String>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("unknown command"), "{err}");

        let err = redis::cmd("SET").arg("k").query::<String>(&mut conn).unwrap_err();
        assert!(err.to_string().contains("wrong number of arguments"), "{err}");

        let err = redis::cmd("PING")
            .arg("admin")
            .arg("ahmed")
            .query::<String>(&mut conn)
            .unwrap_err();
        assert!(err.to_string().contains("wrong number of arguments"), "{err}");

        // Connection is still usable
        let result: String = redis::cmd("PING").query(&mut conn).unwrap();
        assert_eq!(result, "PONG");
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_clients() {
    let port = 17383;
    let _shutdown = start_server(port, Arc::new(new_engine()));

    let mut handles = Vec::new();
    for client_id in 0..8 {
        handles.push(tokio::task::spawn_blocking(move || {
            let mut conn = get_client(port);
            for i in 0..50 {
                let key = format!("c{client_id}:k{i}");
                let _: String = redis::cmd("SET").arg(&key).arg(i).query(&mut conn).unwrap();
            }
            for i in 0..50 {
                let key = format!("c{client_id}:k{i}");
                let val: i64 = redis::cmd("GET").arg(&key).query(&mut conn).unwrap();
                assert_eq!(val, i);
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_aof_survives_restart() {
    let port = 17384;
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("appendonly.aof");

    let writer = Arc::new(Aof::open(&path, FsyncPolicy::Always).unwrap());
    let engine = Arc::new(new_engine().with_aof(writer.clone()));
    let shutdown = start_server(port, engine);

    tokio::task::spawn_blocking(move || {
        let mut conn = get_client(port);
        let _: String = redis::cmd("SET").arg("k").arg("v1").query(&mut conn).unwrap();
        let _: String = redis::cmd("SET").arg("k").arg("v2").query(&mut conn).unwrap();
        let _: String = redis::cmd("HSET").arg("h").arg("f").arg("x").query(&mut conn).unwrap();
        let _: Option<String> = redis::cmd("GET").arg("k").query(&mut conn).unwrap();
    })
    .await
    .unwrap();

    shutdown.cancel();
    writer.close().await.unwrap();

    let restored = new_engine();
    assert_eq!(aof::replay(&path, &restored).await.unwrap().commands, 3);
    let store = restored.store().read().await;
    assert_eq!(store.get(b"k"), Some(&b"v2".to_vec()));
    assert_eq!(store.hget(b"h", b"f"), Some(&b"x".to_vec()));
}
