//! Parent and child registries kept in step through the relay.

use anyhow::Result;
use bytes::Bytes;

use didhub::sync::{MessageKind, SYNCHRONIZE_FN};
use didhub::{
    Contract, Did, MethodManager, RecordInfo, RegistryContract, RegistryError, Status,
    DEFAULT_RELAY_BROKER,
};
use didhub_testkit::{anchor, Federation, Identity, TestFixture};

fn app(name: &str) -> Did {
    Did::method_of("bitxhub", name)
}

async fn register(federation: &Federation, owner: &Identity, id: &Did) -> Result<()> {
    let parent = &federation.parent;
    parent.apply(&owner.caller, id).await?;
    parent.audit_apply(&federation.admin.caller, id, true).await?;
    parent
        .register(&owner.caller, id, anchor(&format!("ipfs://{id}")))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_register_emits_one_message_per_child() -> Result<()> {
    let federation = Federation::new(3).await?;
    let alice = Identity::new(&Did::relay_root(), "0xalice");
    register(&federation, &alice, &app("app")).await?;

    let outbox = federation.parent_relay.take().await;
    assert_eq!(outbox.len(), 1);
    let (broker, batch) = &outbox[0];
    assert_eq!(broker, DEFAULT_RELAY_BROKER);
    assert_eq!(batch.destinations(), vec!["relay-0", "relay-1", "relay-2"]);

    let mut last = i64::MIN;
    for message in batch.iter() {
        assert_eq!(message.from, "relay-root");
        assert_eq!(message.kind, MessageKind::Propagate);
        assert_eq!(&message.proof[..], b"1");
        assert_eq!(message.payload.function, SYNCHRONIZE_FN);
        assert!(message.timestamp > last);
        last = message.timestamp;
    }
    Ok(())
}

#[tokio::test]
async fn test_children_converge_after_delivery() -> Result<()> {
    let federation = Federation::new(2).await?;
    let users = didhub_testkit::identities(&Did::relay_root(), 3);
    for (i, user) in users.iter().enumerate() {
        register(&federation, user, &app(&format!("app{i}"))).await?;
    }
    assert!(!federation.converged().await?);

    assert_eq!(federation.deliver().await?, 6);
    assert!(federation.converged().await?);

    for (_, _, child) in &federation.children {
        let record = child.resolve(&app("app1")).await?.expect("mirrored");
        assert_eq!(&record.owner, users[1].did());
        assert_eq!(record.status, Status::Registered);
    }
    Ok(())
}

#[tokio::test]
async fn test_removed_child_stops_receiving() -> Result<()> {
    let federation = Federation::new(2).await?;
    let admin = &federation.admin.caller;
    let (gone, _, _) = &federation.children[1];
    assert!(federation.parent.remove_child(admin, gone).await?);

    register(
        &federation,
        &Identity::new(&Did::relay_root(), "0xalice"),
        &app("app"),
    )
    .await?;
    assert_eq!(federation.deliver().await?, 1);

    let (_, _, kept) = &federation.children[0];
    let (_, _, dropped) = &federation.children[1];
    assert!(kept.resolve(&app("app")).await?.is_some());
    assert!(dropped.resolve(&app("app")).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_delivery_failure_is_reported_not_rolled_back() -> Result<()> {
    let federation = Federation::new(1).await?;
    federation.parent_relay.set_failing(true);

    let err = register(
        &federation,
        &Identity::new(&Did::relay_root(), "0xalice"),
        &app("app"),
    )
    .await
    .expect_err("relay down");
    let err = err.downcast::<RegistryError>()?;
    assert!(matches!(err, RegistryError::DownstreamDeliveryFailure { .. }));

    let record = federation.parent.resolve(&app("app")).await?.expect("kept");
    assert_eq!(record.status, Status::Registered);
    assert_eq!(federation.deliver().await?, 0);
    assert!(!federation.converged().await?);
    Ok(())
}

#[tokio::test]
async fn test_later_freeze_mirrors_through_synchronize() -> Result<()> {
    let federation = Federation::new(1).await?;
    let alice = Identity::new(&Did::relay_root(), "0xalice");
    register(&federation, &alice, &app("app")).await?;
    federation.deliver().await?;

    // Freeze does not fan out; a host forwards the record explicitly.
    let frozen = federation
        .parent
        .freeze(&federation.admin.caller, &app("app"))
        .await?;
    let (_, _, child) = &federation.children[0];
    child
        .synchronize(
            didhub::core::RELAY_ROOT,
            &didhub::core::record_bytes(&frozen),
        )
        .await?;
    assert_eq!(
        child.resolve(&app("app")).await?.expect("mirrored").status,
        Status::Frozen
    );
    assert!(federation.converged().await?);
    Ok(())
}

#[tokio::test]
async fn test_contract_surface_fans_out() -> Result<()> {
    let fixture = TestFixture::new();
    let contract: MethodManager<_, _> = RegistryContract::new(fixture.method_registry());
    let admin = fixture.admin.did().as_str().to_string();
    let alice = fixture.user("0xalice");
    let alice_did = alice.did().as_str().to_string();
    let id = app("app").as_str().to_string();
    let b = |s: &str| Bytes::copy_from_slice(s.as_bytes());

    let calls: Vec<(&str, &str, Vec<Bytes>)> = vec![
        ("0xadmin", "Init", vec![b(&admin)]),
        ("0xadmin", "AddChild", vec![b(&admin), b("did:bitxhub:relay0:.")]),
        (
            "0xadmin",
            "SetConvertMap",
            vec![b(&admin), b("did:bitxhub:relay0:."), b("relay-0")],
        ),
        ("0xalice", "Apply", vec![b(&alice_did), b(&id)]),
        ("0xadmin", "AuditApply", vec![b(&admin), b(&id), b("1")]),
        (
            "0xalice",
            "Register",
            vec![b(&alice_did), b(&id), b("ipfs://app"), Bytes::from(vec![9u8; 32])],
        ),
    ];
    for (invoker, function, args) in calls {
        let response = contract.invoke(invoker, function, &args).await;
        assert!(response.ok, "{function}: {}", response.message());
    }

    let routed = fixture.relay.messages_for("relay-0").await;
    assert_eq!(routed.len(), 1);

    let response = contract
        .invoke("0xanyone", "GetConvertMap", &[b("did:bitxhub:relay0:.")])
        .await;
    assert_eq!(response.message(), "relay-0");

    let response = contract.invoke("0xanyone", "Resolve", &[b(&id)]).await;
    let info: RecordInfo = serde_json::from_slice(&response.result)?;
    assert_eq!(info.owner, alice_did);
    assert_eq!(info.status, "registered");
    Ok(())
}
