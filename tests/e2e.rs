//! End-to-end scenarios driving a real client/server pair of bridges over an
//! in-memory `tokio::io::duplex` stream, standing in for `goatns`'s lack of a
//! loopback-socket test harness the same way `tokio::io::duplex` stands in for any
//! concrete transport.

use std::sync::Arc;

use async_trait::async_trait;
use remcall::naming::IdentityNameConverter;
use remcall::{
    Bridge, Declared, Enum, Implementation, Interface, Method, Primitive, Result, RmcError, Role,
    Schema, Type,
};
use remcall::{EnumValue, ObjectHandle, Value};

fn init_logging() {
    let _ = env_logger::try_init();
}

fn not_available(name: &str) -> RmcError {
    RmcError::MethodNotAvailable {
        method: name.to_string(),
        resolved_name: name.to_string(),
    }
}

fn ping_main() -> Interface {
    Interface::new(
        "Main",
        vec![Method::new("Ping", vec![], Type::Primitive(Primitive::Void)).unwrap()],
    )
    .unwrap()
}

struct PingMain;

#[async_trait]
impl Implementation for PingMain {
    async fn call_method(&self, method_name: &str, _args: Vec<Value>) -> Result<Value> {
        match method_name {
            "Ping" => Ok(Value::Void),
            other => Err(not_available(other)),
        }
    }
}

#[tokio::test]
async fn unknown_command_tag_terminates_the_receive_loop() {
    init_logging();
    let schema = Arc::new(Schema::new("demo", vec![], vec![], vec![ping_main()], 4, 4).unwrap());

    let (client_io, mut raw_peer) = tokio::io::duplex(8192);
    let bridge = Bridge::connect(schema, client_io, Role::Client, None, Arc::new(IdentityNameConverter))
        .await
        .unwrap();

    // Drain whatever the bridge already wrote (its own SEND_SCHEMA handshake) so it
    // doesn't get mistaken for part of the injected frame below.
    let mut drain = [0u8; 8192];
    let _ = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        tokio::io::AsyncReadExt::read(&mut raw_peer, &mut drain),
    )
    .await;

    tokio::io::AsyncWriteExt::write_all(&mut raw_peer, &[0xFF]).await.unwrap();
    tokio::io::AsyncWriteExt::flush(&mut raw_peer).await.unwrap();

    // The receive loop should have died on the unknown tag; disconnect() must not
    // hang waiting for a loop that's already gone.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(1), bridge.disconnect())
        .await
        .expect("disconnect must not hang once the receive loop has exited");
}

#[tokio::test]
async fn graceful_shutdown_rejects_further_calls() {
    init_logging();
    let schema = Arc::new(Schema::new("demo", vec![], vec![], vec![ping_main()], 4, 4).unwrap());

    let (client_io, server_io) = tokio::io::duplex(8192);
    let client = Bridge::connect(
        schema.clone(),
        client_io,
        Role::Client,
        None,
        Arc::new(IdentityNameConverter),
    )
    .await
    .unwrap();
    let _server = Bridge::connect(
        schema,
        server_io,
        Role::Server,
        Some(Arc::new(PingMain) as Arc<dyn Implementation>),
        Arc::new(IdentityNameConverter),
    )
    .await
    .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let main_proxy = client.server_proxy().await.unwrap();
    main_proxy.call("Ping", vec![]).await.unwrap();

    client.disconnect().await.unwrap();

    let err = main_proxy.call("Ping", vec![]).await.unwrap_err();
    assert!(matches!(err, RmcError::TransportClosed));
}

/// Builds a schema with `User { GetAge(): uint32, GetStatus(): Status }` and
/// `Main { GetUser(): User, GetFirstUser(): User, AddFriend(user: User, degree: float32): uint32 }`.
/// `AddFriend` returns the age it reads back from calling `user.GetAge()` rather than
/// `void`, so the reverse-callback scenario below has something to assert on.
fn user_bridge_schema() -> Arc<Schema> {
    let status = Arc::new(
        Enum::new(
            "Status",
            vec!["Registered".to_string(), "Activated".to_string(), "Locked".to_string()],
        )
        .unwrap(),
    );

    let user = Arc::new(Interface::new_uninit("User").unwrap());
    user.set_methods(vec![
        Method::new("GetAge", vec![], Type::Primitive(Primitive::UInt32)).unwrap(),
        Method::new(
            "GetStatus",
            vec![],
            Type::Declared(Declared::Enum(status.clone())),
        )
        .unwrap(),
    ]);

    let main = Arc::new(Interface::new_uninit("Main").unwrap());
    main.set_methods(vec![
        Method::new("GetUser", vec![], Type::Declared(Declared::Interface(user.clone()))).unwrap(),
        Method::new(
            "GetFirstUser",
            vec![],
            Type::Declared(Declared::Interface(user.clone())),
        )
        .unwrap(),
        Method::new(
            "AddFriend",
            vec![
                (Type::Declared(Declared::Interface(user.clone())), "user".to_string()),
                (Type::Primitive(Primitive::Float32), "degree".to_string()),
            ],
            Type::Primitive(Primitive::UInt32),
        )
        .unwrap(),
    ]);

    Arc::new(Schema::from_arcs("demo", vec![status], vec![], vec![main, user], 4, 4).unwrap())
}

struct ServerUser {
    age: u32,
    status: EnumValue,
}

#[async_trait]
impl Implementation for ServerUser {
    async fn call_method(&self, method_name: &str, _args: Vec<Value>) -> Result<Value> {
        match method_name {
            "GetAge" => Ok(Value::UInt32(self.age)),
            "GetStatus" => Ok(Value::Enum(self.status.clone())),
            other => Err(not_available(other)),
        }
    }
}

struct ServerMain {
    brian: Arc<dyn Implementation>,
    first_user: Arc<dyn Implementation>,
}

#[async_trait]
impl Implementation for ServerMain {
    async fn call_method(&self, method_name: &str, mut args: Vec<Value>) -> Result<Value> {
        match method_name {
            "GetUser" => Ok(Value::Object(Some(ObjectHandle::Local(self.brian.clone())))),
            "GetFirstUser" => Ok(Value::Object(Some(ObjectHandle::Local(self.first_user.clone())))),
            "AddFriend" => {
                let handle = match args.remove(0) {
                    Value::Object(Some(handle)) => handle,
                    _ => return Err(RmcError::InvalidSchema("AddFriend requires a non-null user".to_string())),
                };
                match handle {
                    ObjectHandle::Local(obj) => obj.call_method("GetAge", vec![]).await,
                    ObjectHandle::Remote(proxy) => proxy.call("GetAge", vec![]).await,
                }
            }
            other => Err(not_available(other)),
        }
    }
}

struct ClientUser;

#[async_trait]
impl Implementation for ClientUser {
    async fn call_method(&self, method_name: &str, _args: Vec<Value>) -> Result<Value> {
        match method_name {
            "GetAge" => Ok(Value::UInt32(666)),
            other => Err(not_available(other)),
        }
    }
}

#[tokio::test]
async fn basic_call_main_bootstrap_and_enum_round_trip() {
    init_logging();
    let schema = user_bridge_schema();

    let brian = Arc::new(ServerUser {
        age: 29,
        status: EnumValue {
            type_name: "Status".to_string(),
            ordinal: 1, // Activated
        },
    });
    let first_user = Arc::new(ServerUser {
        age: u32::MAX,
        status: EnumValue {
            type_name: "Status".to_string(),
            ordinal: 0,
        },
    });
    let main = Arc::new(ServerMain {
        brian: brian.clone(),
        first_user: first_user.clone(),
    });

    let (client_io, server_io) = tokio::io::duplex(16384);
    let client = Bridge::connect(
        schema.clone(),
        client_io,
        Role::Client,
        None,
        Arc::new(IdentityNameConverter),
    )
    .await
    .unwrap();
    let _server = Bridge::connect(
        schema,
        server_io,
        Role::Server,
        Some(main as Arc<dyn Implementation>),
        Arc::new(IdentityNameConverter),
    )
    .await
    .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let main_proxy = client.server_proxy().await.unwrap();

    // Scenario: basic call.
    let brian_value = main_proxy.call("GetUser", vec![]).await.unwrap();
    let brian_proxy = match brian_value {
        Value::Object(Some(ObjectHandle::Remote(proxy))) => proxy,
        other => panic!("expected a remote object handle, got {other:?}"),
    };
    let age = brian_proxy.call("GetAge", vec![]).await.unwrap();
    assert!(matches!(age, Value::UInt32(29)));

    // Scenario: enum round-trip.
    let status = brian_proxy.call("GetStatus", vec![]).await.unwrap();
    match status {
        Value::Enum(ev) => {
            assert_eq!(ev.type_name, "Status");
            assert_eq!(ev.ordinal, 1);
        }
        other => panic!("expected an enum value, got {other:?}"),
    }

    // Scenario: Main bootstrap.
    let first_user_value = main_proxy.call("GetFirstUser", vec![]).await.unwrap();
    let first_user_proxy = match first_user_value {
        Value::Object(Some(ObjectHandle::Remote(proxy))) => proxy,
        other => panic!("expected a remote object handle, got {other:?}"),
    };
    let age = first_user_proxy.call("GetAge", vec![]).await.unwrap();
    assert!(matches!(age, Value::UInt32(u32::MAX)));
}

#[tokio::test]
async fn reverse_callback_invokes_the_original_callers_implementation() {
    init_logging();
    let schema = user_bridge_schema();

    let brian = Arc::new(ServerUser {
        age: 29,
        status: EnumValue {
            type_name: "Status".to_string(),
            ordinal: 0,
        },
    });
    let main = Arc::new(ServerMain {
        brian: brian.clone(),
        first_user: brian,
    });

    let (client_io, server_io) = tokio::io::duplex(16384);
    let client = Bridge::connect(
        schema.clone(),
        client_io,
        Role::Client,
        None,
        Arc::new(IdentityNameConverter),
    )
    .await
    .unwrap();
    let _server = Bridge::connect(
        schema,
        server_io,
        Role::Server,
        Some(main as Arc<dyn Implementation>),
        Arc::new(IdentityNameConverter),
    )
    .await
    .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let main_proxy = client.server_proxy().await.unwrap();
    let client_user: Arc<dyn Implementation> = Arc::new(ClientUser);

    let result = main_proxy
        .call(
            "AddFriend",
            vec![
                Value::Object(Some(ObjectHandle::Local(client_user))),
                Value::Float32(0.5),
            ],
        )
        .await
        .unwrap();

    assert!(matches!(result, Value::UInt32(666)));
}
