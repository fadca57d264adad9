use crate::commands::{Command, Dispatcher, Reply, parse_line};
use crate::store::{ConnectionProfile, ProfileStore, SecurityProtocol};
use crate::testing::{HandleKind, MockConnector, collect_until_finished, fast_settings, next_event};
use crate::utils::error::ClientError;
use crate::worker::WorkerEvent;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn setup(mock: &MockConnector) -> (Dispatcher, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut profiles = ProfileStore::load(dir.path().join("servers.conf")).unwrap();
    profiles
        .add(ConnectionProfile::new("t1", "x").with_security(SecurityProtocol::Plaintext))
        .unwrap();
    let mut dispatcher = Dispatcher::new(Arc::new(mock.clone()), fast_settings(), profiles);
    dispatcher
        .dispatch(Command::Connect {
            profile: "t1".to_string(),
        })
        .unwrap();
    (dispatcher, dir)
}

#[test]
fn scenario_connect_list_and_publish() {
    let mock = MockConnector::with_topics(&["orders"]);
    let (mut dispatcher, _dir) = setup(&mock);

    match dispatcher
        .dispatch(parse_line("listTopics").unwrap())
        .unwrap()
    {
        Reply::Topics(topics) => assert_eq!(topics, vec!["orders"]),
        other => panic!("unexpected reply: {other}"),
    }
    match dispatcher
        .dispatch(parse_line("publish orders hello").unwrap())
        .unwrap()
    {
        Reply::Published(receipt) => assert!(receipt.offset >= 0),
        other => panic!("unexpected reply: {other}"),
    }
}

#[test]
fn scenario_stream_two_records_then_stop() {
    let mock = MockConnector::with_topics(&["orders"]);
    let (mut dispatcher, _dir) = setup(&mock);
    mock.push_record("orders", b"a");
    mock.push_record("orders", b"b");

    let Reply::Streaming { mut events, .. } = dispatcher
        .dispatch(parse_line("startStreaming orders").unwrap())
        .unwrap()
    else {
        panic!("expected a streaming reply");
    };
    let first = next_event(&mut events, WAIT).unwrap();
    let second = next_event(&mut events, WAIT).unwrap();
    dispatcher
        .dispatch(parse_line("stopStreaming").unwrap())
        .unwrap();
    let rest = collect_until_finished(&mut events, WAIT);

    let offsets: Vec<(i64, String)> = [first, second]
        .into_iter()
        .map(|e| match e {
            WorkerEvent::Record(view) => (view.offset, view.value),
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();
    assert_eq!(offsets, vec![(0, "a".to_string()), (1, "b".to_string())]);
    assert_eq!(rest, vec![WorkerEvent::Finished]);
    assert_eq!(mock.opened(HandleKind::Stream), 1);
    assert_eq!(mock.closed(HandleKind::Stream), 1);
}

#[test]
fn scenario_overview_of_empty_topic() {
    let mock = MockConnector::with_topics(&["empty"]);
    let (mut dispatcher, _dir) = setup(&mock);

    let started = Instant::now();
    let Reply::Overview {
        handle, mut events, ..
    } = dispatcher
        .dispatch(parse_line("fetchOverview empty").unwrap())
        .unwrap()
    else {
        panic!("expected an overview reply");
    };
    assert_eq!(
        collect_until_finished(&mut events, WAIT),
        vec![WorkerEvent::Finished]
    );
    handle.join();
    assert!(started.elapsed() < WAIT);
}

#[test]
fn scenario_delete_with_empty_listing() {
    let mock = MockConnector::new();
    let (mut dispatcher, _dir) = setup(&mock);

    assert!(matches!(
        dispatcher.dispatch(parse_line("deleteTopic orders").unwrap()),
        Err(ClientError::NoTopics)
    ));
    assert!(!mock.calls().iter().any(|c| c.starts_with("delete:")));
}

#[test]
fn property_reconnects_close_every_session() {
    let mock = MockConnector::new();
    let (mut dispatcher, _dir) = setup(&mock);
    for _ in 0..4 {
        dispatcher
            .dispatch(parse_line("connect t1").unwrap())
            .unwrap();
    }
    drop(dispatcher);

    assert_eq!(mock.opened(HandleKind::Producer), 5);
    for kind in [HandleKind::Producer, HandleKind::Consumer, HandleKind::Admin] {
        assert_eq!(mock.closed(kind), mock.opened(kind), "{kind:?}");
    }
}

#[test]
fn property_publish_with_empty_listing_is_no_topics() {
    let mock = MockConnector::new();
    let (mut dispatcher, _dir) = setup(&mock);

    let err = dispatcher
        .dispatch(parse_line("publish orders x").unwrap())
        .err()
        .unwrap();
    assert!(matches!(err, ClientError::NoTopics));
}

#[test]
fn property_overview_never_exceeds_cap() {
    let mock = MockConnector::with_topics(&["orders"]);
    let (mut dispatcher, _dir) = setup(&mock);

    for produced in [0usize, 3, 10, 40] {
        for i in 0..produced {
            mock.push_record("orders", format!("{i}").as_bytes());
        }
        let Reply::Overview {
            handle, mut events, ..
        } = dispatcher
            .dispatch(parse_line("overview orders").unwrap())
            .unwrap()
        else {
            panic!("expected an overview reply");
        };
        let collected = collect_until_finished(&mut events, WAIT);
        handle.join();

        let records = collected
            .iter()
            .filter(|e| matches!(e, WorkerEvent::Record(_)))
            .count();
        let finished = collected
            .iter()
            .filter(|e| **e == WorkerEvent::Finished)
            .count();
        assert!(records <= 10);
        assert_eq!(finished, 1);
    }
}
