mod support;

use std::time::Duration;

use bytes::Bytes;
use kvwire_client::{Client, ClientError, ClientOptions, ClientTtl, Connection, ConnectionParameters, Value};

use support::{bulk, error, integer, ok, spawn_server};

fn parameters(port: u16) -> ConnectionParameters {
    let mut parameters = ConnectionParameters::tcp("127.0.0.1", port);
    parameters.timeout = Some(Duration::from_secs(1));
    parameters.read_write_timeout = Some(Duration::from_secs(2));
    parameters
}

fn client(port: u16, options: ClientOptions) -> Client {
    Client::with_options(vec![parameters(port)], options).expect("client")
}

#[test]
fn client_set_get_roundtrip() {
    let server = spawn_server(1, |parts| match &parts[0][..] {
        b"SET" => ok(parts),
        b"GET" => bulk(b"value"),
        _ => error("ERR unexpected"),
    });
    let mut client = client(server.port(), ClientOptions::default());

    client.set("key", "value").expect("set");
    assert_eq!(client.get("key").expect("get"), Some(Bytes::from_static(b"value")));
    assert_eq!(server.received(), vec!["SET key value", "GET key"]);
}

#[test]
fn client_get_missing_and_ttl_states() {
    let server = spawn_server(1, |parts| match &parts[0][..] {
        b"GET" => b"$-1\r\n".to_vec(),
        b"TTL" if &parts[1][..] == b"gone" => integer(-2),
        b"TTL" => integer(12),
        _ => error("ERR unexpected"),
    });
    let mut client = client(server.port(), ClientOptions::default());

    assert_eq!(client.get("nope").expect("get"), None);
    assert_eq!(client.ttl("gone").expect("ttl"), ClientTtl::Missing);
    assert_eq!(client.ttl("live").expect("ttl"), ClientTtl::ExpiresIn(Duration::from_secs(12)));
}

#[test]
fn client_from_uri_connects_lazily() {
    let server = spawn_server(1, |_| b"+PONG\r\n".to_vec());
    let mut client = Client::from_uri(&format!("tcp://127.0.0.1:{}", server.port())).expect("client");

    assert!(!client.is_connected());
    assert_eq!(client.ping().expect("ping"), "PONG");
    assert!(client.is_connected());
}

#[test]
fn error_policy_is_configurable() {
    let server = spawn_server(2, |_| error("WRONGTYPE Operation against a key holding the wrong kind of value"));

    let mut raising = client(server.port(), ClientOptions::default());
    let cmd = raising.create_command("LPUSH", ["str", "x"]).expect("command");
    match raising.execute(&cmd) {
        Err(ClientError::Server(reply)) => {
            assert_eq!(reply.message(), "WRONGTYPE Operation against a key holding the wrong kind of value")
        }
        other => panic!("expected server error, got {other:?}"),
    }
    // Error replies do not break the connection.
    assert!(raising.is_connected());
    raising.disconnect();

    let options = ClientOptions {
        exceptions: false,
        ..Default::default()
    };
    let mut quiet = client(server.port(), options);
    let value = quiet.execute(&cmd).expect("error value");
    assert_eq!(value.as_error().and_then(|e| e.category()), Some("WRONGTYPE"));
}

#[test]
fn init_commands_run_after_connect() {
    let server = spawn_server(1, |parts| match &parts[0][..] {
        b"AUTH" | b"SELECT" => ok(parts),
        b"DBSIZE" => integer(5),
        _ => error("ERR unexpected"),
    });
    let mut parameters = parameters(server.port());
    parameters.password = Some("secret".to_string());
    parameters.database = Some(2);
    let mut client = Client::new(parameters).expect("client");

    assert_eq!(client.dbsize().expect("dbsize"), 5);
    assert_eq!(server.received(), vec!["AUTH secret", "SELECT 2", "DBSIZE"]);
}

#[test]
fn failing_init_command_aborts_connect() {
    let server = spawn_server(1, |_| error("ERR invalid password"));
    let mut parameters = parameters(server.port());
    parameters.password = Some("wrong".to_string());
    let mut client = Client::new(parameters).expect("client");

    let err = client.connect().unwrap_err();
    assert_eq!(err.server_error().map(|e| e.message()), Some("ERR invalid password"));
    assert!(!client.is_connected());
}

#[test]
fn connection_is_reset_after_failure() {
    // First connection is dropped without a reply; the second one answers.
    let server = spawn_server(2, |parts| {
        if &parts[1][..] == b"first" {
            Vec::new()
        } else {
            bulk(b"second")
        }
    });
    let mut client = client(server.port(), ClientOptions::default());

    let err = client.get("first").unwrap_err();
    assert!(matches!(err, ClientError::Communication { .. }), "{err:?}");
    assert!(err.to_string().contains(&format!("tcp://127.0.0.1:{}", server.port())));
    assert!(!client.is_connected());

    assert_eq!(client.get("again").expect("get"), Some(Bytes::from_static(b"second")));
    assert!(client.is_connected());
}

#[test]
fn protocol_errors_reset_connection() {
    let server = spawn_server(1, |_| b"!weird\r\n".to_vec());
    let mut client = client(server.port(), ClientOptions::default());

    let err = client.ping().unwrap_err();
    assert!(matches!(err, ClientError::Protocol { .. }), "{err:?}");
    assert!(!client.is_connected());
}

#[test]
fn cached_scripts_fall_back_to_eval() {
    let server = spawn_server(1, |parts| match &parts[0][..] {
        b"SCRIPT" => bulk(b"a42059b356c875f0717db19a51f6aaca9ae659ea"),
        b"EVALSHA" => error("NOSCRIPT No matching script. Please use EVAL."),
        b"EVAL" => integer(1),
        _ => error("ERR unexpected"),
    });
    let mut client = client(server.port(), ClientOptions::default());

    let script = client.load_script("return 1").expect("load");
    assert_eq!(script.sha(), "a42059b356c875f0717db19a51f6aaca9ae659ea");

    let value = client.eval_script(&script, &["k"], &["v"]).expect("eval");
    assert_eq!(value, Value::Int(1));
    assert_eq!(
        server.received(),
        vec![
            "SCRIPT LOAD return 1",
            "EVALSHA a42059b356c875f0717db19a51f6aaca9ae659ea 1 k v",
            "EVAL return 1 1 k v",
        ]
    );
}

#[test]
fn single_connection_rejects_targeted_execution() {
    let server = spawn_server(1, ok);
    let mut client = client(server.port(), ClientOptions::default());
    let cmd = client.create_command::<_, Bytes>("PING", []).expect("command");
    assert!(matches!(client.execute_on("any", &cmd), Err(ClientError::NotSupported(_))));
    assert!(!client.connection().is_connected());
}
