//! End-to-end journeys through the linking state machine.

mod common;

use common::{service_with, StubPlatform};
use crosslink_types::{LinkStatus, PrimaryId};

const STEVE_ID: &str = "069a79f4-44e9-4726-a5be-fca90e38aaf5";
const ALEX_ID: &str = "853c80ef-3c37-49fd-aa49-938b674adae6";

#[tokio::test]
async fn a_requester_walks_from_no_link_to_linked_and_back() {
    let (service, _storage) =
        service_with(StubPlatform::with_accounts(&[(STEVE_ID, "Steve")]));
    let u1 = PrimaryId::new("u1");

    assert_eq!(service.status(&u1).await.unwrap(), LinkStatus::NoLink);

    let started = service.initiate_link(&u1, "user#1", "Steve").await.unwrap();
    assert_eq!(
        service.status(&u1).await.unwrap(),
        LinkStatus::Pending {
            target_name: "Steve".to_string()
        }
    );

    let completed = service
        .complete_link(&u1, started.code.as_str())
        .await
        .unwrap();
    assert!(completed.identity.linked);
    assert!(matches!(
        service.status(&u1).await.unwrap(),
        LinkStatus::Linked { .. }
    ));

    let unlinked = service.unlink(&u1).await.unwrap();
    assert_eq!(unlinked.previous_name, "Steve");
    assert_eq!(service.status(&u1).await.unwrap(), LinkStatus::NoLink);

    // The same requester can start over immediately.
    service.initiate_link(&u1, "user#1", "Steve").await.unwrap();
}

#[tokio::test]
async fn two_requesters_link_two_different_accounts() {
    let (service, _storage) = service_with(StubPlatform::with_accounts(&[
        (STEVE_ID, "Steve"),
        (ALEX_ID, "Alex"),
    ]));
    let u1 = PrimaryId::new("u1");
    let u2 = PrimaryId::new("u2");

    let s1 = service.initiate_link(&u1, "one", "Steve").await.unwrap();
    let s2 = service.initiate_link(&u2, "two", "Alex").await.unwrap();

    service.complete_link(&u1, s1.code.as_str()).await.unwrap();
    service.complete_link(&u2, s2.code.as_str()).await.unwrap();

    let admin = PrimaryId::new("u-admin");
    // Default config has no admin list; stats go through storage directly.
    assert!(service.admin_stats(&admin, &[]).await.is_err());

    let status = service
        .secondary_status(&crosslink_types::SecondaryId::new(STEVE_ID))
        .await
        .unwrap();
    assert!(status.linked);
    assert_eq!(status.display_tag.as_deref(), Some("one"));
}
