//! Queue policy tests: FIFO replay versus per-identity collapse.

mod common;

use common::{id, user, Fixture};
use relation_session::{
    ObjectKey, OperationKind, QueuePolicy, Session, SessionConfig, State, Tuple, Value,
};

fn collapsing() -> Fixture {
    Fixture::new(Session::new(SessionConfig {
        queue_policy: QueuePolicy::Collapse,
        ..Default::default()
    }))
}

fn key(n: i64) -> ObjectKey {
    ObjectKey::new("users", id(n))
}

#[test]
fn test_fifo_replays_every_operation() {
    let fx = Fixture::new(Session::default());
    let a = user(1, "Ann");

    fx.users.save(&a).unwrap();
    fx.users
        .update_attributes(&a, Tuple::new().with("name", "Anna"))
        .unwrap();
    fx.users
        .update_attributes(&a, Tuple::new().with("email", "anna@example.com"))
        .unwrap();

    assert_eq!(fx.session.pending(), 3);
    fx.session.commit().unwrap();
    assert_eq!(
        fx.calls(),
        vec![
            "insert users[1]",
            "update users[1] name",
            "update users[1] email"
        ]
    );
}

#[test]
fn test_collapse_folds_updates_into_insert() {
    let fx = collapsing();
    let a = user(1, "Ann");
    let b = user(2, "Ben");

    fx.users.save(&a).unwrap();
    fx.users.save(&b).unwrap();
    fx.users
        .update_attributes(&a, Tuple::new().with("name", "Anna"))
        .unwrap();

    assert_eq!(
        fx.session.tracker().pending_operations(),
        vec![(key(1), OperationKind::Insert), (key(2), OperationKind::Insert)]
    );

    fx.session.commit().unwrap();
    assert_eq!(fx.calls(), vec!["insert users[1]", "insert users[2]"]);
    assert_eq!(fx.stored(1).unwrap().get("name"), Some(&Value::from("Anna")));
    assert!(fx.users.state(&a).unwrap().is_persisted());
}

#[test]
fn test_collapse_merges_updates_last_write_wins() {
    let fx = collapsing();
    let a = user(1, "Ann");
    fx.users.save(&a).unwrap();
    fx.session.commit().unwrap();

    fx.users
        .update_attributes(&a, Tuple::new().with("name", "Anna"))
        .unwrap();
    fx.users
        .update_attributes(&a, Tuple::new().with("name", "Annie").with("email", "x@y.z"))
        .unwrap();

    assert_eq!(fx.session.pending(), 1);
    match fx.users.state(&a).unwrap() {
        State::Updated { changes, .. } => {
            assert_eq!(changes, Tuple::new().with("name", "Annie").with("email", "x@y.z"));
        }
        other => panic!("Expected Updated, got {:?}", other),
    }

    fx.session.commit().unwrap();
    assert_eq!(
        fx.calls(),
        vec!["insert users[1]", "update users[1] email,name"]
    );
    assert_eq!(fx.stored(1).unwrap().get("name"), Some(&Value::from("Annie")));
}

#[test]
fn test_collapse_insert_then_delete_touches_nothing() {
    let fx = collapsing();
    let a = user(1, "Ann");

    fx.users.save(&a).unwrap();
    fx.users.delete(&a).unwrap();

    assert_eq!(
        fx.session.tracker().pending_operations(),
        vec![(key(1), OperationKind::Discard)]
    );

    let summary = fx.session.commit().unwrap();
    assert_eq!(summary.discarded, 1);
    assert!(fx.calls().is_empty());
    assert!(!fx.users.is_tracking(&a).unwrap());
}

#[test]
fn test_collapse_update_then_delete_keeps_position() {
    let fx = collapsing();
    let a = user(1, "Ann");
    let b = user(2, "Ben");
    fx.users.save(&a).unwrap();
    fx.users.save(&b).unwrap();
    fx.session.commit().unwrap();

    fx.users
        .update_attributes(&a, Tuple::new().with("name", "Anna"))
        .unwrap();
    fx.users
        .update_attributes(&b, Tuple::new().with("name", "Benny"))
        .unwrap();
    fx.users.delete(&a).unwrap();

    assert_eq!(
        fx.session.tracker().pending_operations(),
        vec![(key(1), OperationKind::Delete), (key(2), OperationKind::Update)]
    );

    fx.session.commit().unwrap();
    assert_eq!(
        fx.calls(),
        vec![
            "insert users[1]",
            "insert users[2]",
            "delete users[1]",
            "update users[2] name"
        ]
    );
}
