//! End-to-end tests: client pool, dispatcher and the in-memory cluster.

use kvmux_core::{
    Admin, Client, ClientError, ConnectionState, MapAttribute, MapOp, MutateOp, Predicate,
    SortOrder, Status, Value,
};
use kvmux_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[test]
fn put_then_get_round_trips_every_type() {
    with_memory_client(|client| {
        let written = attrs([
            ("v", Value::from("hello")),
            ("n", Value::Int(-7)),
            ("f", Value::Float(2.5)),
            ("l", Value::list(["b", "a"])),
            ("s", Value::set(["z", "x", "y"])),
            ("m", Value::map([("one", 1i64), ("two", 2)])),
        ]);
        client.put("kv", "obj", &written).unwrap().wait().unwrap();

        let read = client.get("kv", "obj").unwrap().wait().unwrap();
        assert_eq!(read["v"], Value::from("hello"));
        assert_eq!(read["n"], Value::Int(-7));
        assert_eq!(read["f"], Value::Float(2.5));
        assert_eq!(read["l"], Value::list(["b", "a"]));
        assert_eq!(read["s"], Value::set(["x", "y", "z"]));
        assert_eq!(read["m"].get(&"two".into()), Some(&Value::Int(2)));
        assert!(!read.contains_key("k"));
    });
}

#[test]
fn get_partial_returns_requested_attributes() {
    with_memory_client(|client| {
        client
            .put("kv", "a", &attrs([("v", Value::from("x")), ("n", Value::Int(3))]))
            .unwrap()
            .wait()
            .unwrap();
        let read = client.get_partial("kv", "a", &["n"]).unwrap().wait().unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read["n"], Value::Int(3));
    });
}

#[test]
fn missing_object_is_not_found() {
    with_memory_client(|client| {
        let err = client.get("kv", "missing").unwrap().wait().unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status(), Status::NotFound);
    });
}

#[test]
fn unknown_space_is_rejected_at_submit() {
    with_memory_client(|client| {
        let err = client.get("nope", "a").err().unwrap();
        assert!(matches!(
            err,
            ClientError::Rejected {
                status: Status::UnknownSpace,
                ..
            }
        ));
        assert_eq!(client.pending_len(), 0);
    });
}

#[test]
fn wrong_type_is_rejected_at_submit() {
    with_memory_client(|client| {
        let err = client
            .put("kv", "a", &attrs([("n", "not a number")]))
            .err()
            .unwrap();
        assert_eq!(err.status(), Status::WrongType);

        let err = client
            .atomic_add("kv", "a", &attrs([("v", 1i64)]))
            .err()
            .unwrap();
        assert_eq!(err.status(), Status::WrongType);
    });
}

#[test]
fn put_if_not_exist_and_conditional_put() {
    with_memory_client(|client| {
        let lock = attrs([("v", "owner-1")]);
        client.put_if_not_exist("kv", "lock", &lock).unwrap().wait().unwrap();

        let again = client
            .put_if_not_exist("kv", "lock", &attrs([("v", "owner-2")]))
            .unwrap()
            .wait()
            .unwrap_err();
        assert!(again.is_cmp_fail());

        let stolen = client
            .cond_put(
                "kv",
                "lock",
                &[Predicate::equals("v", "owner-2")],
                &attrs([("v", "owner-3")]),
            )
            .unwrap()
            .wait()
            .unwrap_err();
        assert!(stolen.is_cmp_fail());

        client
            .cond_put(
                "kv",
                "lock",
                &[Predicate::equals("v", "owner-1")],
                &attrs([("v", "owner-3")]),
            )
            .unwrap()
            .wait()
            .unwrap();
        let read = client.get("kv", "lock").unwrap().wait().unwrap();
        assert_eq!(read["v"], Value::from("owner-3"));

        let missing = client
            .cond_put("kv", "ghost", &[Predicate::equals("v", "x")], &lock)
            .unwrap()
            .wait()
            .unwrap_err();
        assert!(missing.is_not_found());
    });
}

#[test]
fn atomic_operations() {
    with_memory_client(|client| {
        client
            .put("kv", "c", &attrs([("n", Value::Int(10)), ("v", Value::from("b"))]))
            .unwrap()
            .wait()
            .unwrap();

        client.atomic_add("kv", "c", &attrs([("n", 5i64)])).unwrap().wait().unwrap();
        client
            .mutate(MutateOp::AtomicMul, "kv", "c", &attrs([("n", 3i64)]))
            .unwrap()
            .wait()
            .unwrap();
        client.string_append("kv", "c", &attrs([("v", "c")])).unwrap().wait().unwrap();
        client
            .mutate(MutateOp::StringPrepend, "kv", "c", &attrs([("v", "a")]))
            .unwrap()
            .wait()
            .unwrap();

        let read = client.get("kv", "c").unwrap().wait().unwrap();
        assert_eq!(read["n"], Value::Int(45));
        assert_eq!(read["v"], Value::from("abc"));

        let overflow = client
            .mutate(MutateOp::AtomicMul, "kv", "c", &attrs([("n", i64::MAX)]))
            .unwrap()
            .wait()
            .unwrap_err();
        assert_eq!(overflow.status(), Status::Overflow);
        let read = client.get("kv", "c").unwrap().wait().unwrap();
        assert_eq!(read["n"], Value::Int(45));

        let missing = client
            .atomic_add("kv", "nobody", &attrs([("n", 1i64)]))
            .unwrap()
            .wait()
            .unwrap_err();
        assert!(missing.is_not_found());
    });
}

#[test]
fn collection_operations() {
    with_memory_client(|client| {
        client.put("kv", "c", &attrs([("v", "x")])).unwrap().wait().unwrap();

        client.list_rpush("kv", "c", &attrs([("l", "b")])).unwrap().wait().unwrap();
        client
            .mutate(MutateOp::ListLpush, "kv", "c", &attrs([("l", "a")]))
            .unwrap()
            .wait()
            .unwrap();
        client.set_add("kv", "c", &attrs([("s", "q")])).unwrap().wait().unwrap();
        client.set_add("kv", "c", &attrs([("s", "p")])).unwrap().wait().unwrap();
        client
            .mutate(MutateOp::SetRemove, "kv", "c", &attrs([("s", "q")]))
            .unwrap()
            .wait()
            .unwrap();
        client
            .map_add("kv", "c", &[MapAttribute::new("m", "hits", 2i64)])
            .unwrap()
            .wait()
            .unwrap();
        client
            .map_mutate(MapOp::AtomicAdd, "kv", "c", &[MapAttribute::new("m", "hits", 3i64)])
            .unwrap()
            .wait()
            .unwrap();
        client
            .map_mutate(MapOp::AtomicAdd, "kv", "c", &[MapAttribute::new("m", "new", 1i64)])
            .unwrap()
            .wait()
            .unwrap();

        let read = client.get("kv", "c").unwrap().wait().unwrap();
        assert_eq!(read["l"], Value::list(["a", "b"]));
        assert_eq!(read["s"], Value::set(["p"]));
        assert_eq!(read["m"], Value::map([("hits", 5i64), ("new", 1)]));
    });
}

#[test]
fn search_count_and_sorted_search() {
    let fixture = scenarios::populated_cluster(20, 2);

    let found = fixture
        .search("kv", &[Predicate::greater_equal("n", 15i64)])
        .unwrap()
        .collect_all()
        .unwrap();
    assert_eq!(found.len(), 5);
    assert!(found.iter().all(|o| o.contains_key("k")));

    assert_eq!(
        fixture
            .count("kv", &[Predicate::less_than("n", 4i64)])
            .unwrap()
            .wait(),
        Ok(4)
    );

    let top: Vec<i64> = fixture
        .sorted_search("kv", &[], "n", 3, SortOrder::Descending)
        .unwrap()
        .collect_all()
        .unwrap()
        .iter()
        .filter_map(|o| o["n"].as_int())
        .collect();
    assert_eq!(top, vec![19, 18, 17]);

    let description = fixture
        .search_describe("kv", &[Predicate::equals("n", 1i64)])
        .unwrap()
        .wait()
        .unwrap();
    assert!(description.contains("kv"));
}

#[test]
fn regex_search() {
    with_memory_client(|client| {
        for (key, v) in [("a", "apple"), ("b", "banana"), ("c", "avocado")] {
            client.put("kv", key, &attrs([("v", v)])).unwrap().wait().unwrap();
        }
        let found = client
            .search("kv", &[Predicate::regex("v", "^a")])
            .unwrap()
            .collect_all()
            .unwrap();
        assert_eq!(found.len(), 2);

        let bad = client.search("kv", &[Predicate::regex("v", "(")]).err().unwrap();
        assert_eq!(bad.status(), Status::WrongType);
    });
}

#[test]
fn group_operations() {
    let fixture = scenarios::populated_cluster(10, 1);

    let bumped = fixture
        .group_mutate(
            MutateOp::AtomicAdd,
            "kv",
            &[Predicate::less_than("n", 3i64)],
            &attrs([("n", 100i64)]),
        )
        .unwrap()
        .wait();
    assert_eq!(bumped, Ok(3));

    let removed = fixture
        .group_del("kv", &[Predicate::greater_equal("n", 100i64)])
        .unwrap()
        .wait();
    assert_eq!(removed, Ok(3));
    assert_eq!(fixture.cluster.object_count("kv"), Some(7));

    let deleted = fixture
        .cond_del("kv", "key-0005", &[Predicate::equals("n", 4i64)])
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(deleted.is_cmp_fail());
    fixture.del("kv", "key-0005").unwrap().wait().unwrap();
    assert_eq!(fixture.cluster.object_count("kv"), Some(6));
}

#[test]
fn admin_space_lifecycle() {
    let fixture = TestCluster::new(1);
    let admin = fixture.admin();
    let description = "space profiles key username attributes string name, int visits";

    admin.validate_space(description).unwrap().wait().unwrap();
    let invalid = admin
        .validate_space("space broken attributes")
        .unwrap()
        .wait()
        .unwrap_err();
    assert_eq!(invalid.status(), Status::ServerError);

    admin.add_space(description).unwrap().wait().unwrap();
    let dupe = admin.add_space(description).unwrap().wait().unwrap_err();
    assert_eq!(dupe.status(), Status::ServerError);

    let mut spaces = admin.list_spaces().unwrap().collect_all().unwrap();
    spaces.sort();
    assert_eq!(spaces, vec!["kv".to_string(), "profiles".to_string()]);

    let config = admin.dump_config().unwrap().wait().unwrap();
    assert!(config.contains("space profiles"));
    assert!(config.contains("int visits"));

    fixture
        .put("profiles", "jsmith", &attrs([("visits", 1i64)]))
        .unwrap()
        .wait()
        .unwrap();

    admin.rm_space("profiles").unwrap().wait().unwrap();
    let gone = admin.rm_space("profiles").unwrap().wait().unwrap_err();
    assert!(gone.is_not_found());
    assert!(fixture.get("profiles", "jsmith").is_err());
    admin.close();
}

#[test]
fn pool_spreads_work_over_connections() {
    let fixture = TestCluster::new(4);
    assert_eq!(fixture.workers(), 4);
    assert_eq!(fixture.cluster.engines_opened(), 4);

    let pending: Vec<_> = (0..40)
        .map(|i| {
            fixture
                .put("kv", format!("p{i}"), &attrs([("n", i as i64)]))
                .unwrap()
        })
        .collect();
    for p in pending {
        p.wait().unwrap();
    }

    for conn in fixture.connections() {
        assert_eq!(conn.stats().submitted, 10);
    }
    let stats = fixture.stats();
    assert_eq!(stats.submitted, 40);
    assert_eq!(stats.completions, 40);
    assert_eq!(stats.pending, 0);
}

#[test]
fn shuffled_completions_resolve_correctly() {
    let fixture = TestCluster::shuffled(3, 42);
    let pending: Vec<_> = (0..60)
        .map(|i| {
            fixture
                .put("kv", format!("s{i:02}"), &attrs([("n", i as i64)]))
                .unwrap()
        })
        .collect();
    let streams: Vec<_> = (0..3)
        .map(|_| fixture.search("kv", &[]).unwrap())
        .collect();
    for p in pending {
        p.wait().unwrap();
    }
    for stream in streams {
        assert!(stream.collect_all().is_ok());
    }

    let reads: Vec<_> = (0..60)
        .map(|i| (i, fixture.get("kv", format!("s{i:02}")).unwrap()))
        .collect();
    for (i, read) in reads {
        assert_eq!(read.wait().unwrap()["n"], Value::Int(i));
    }
}

#[test]
fn engine_failure_fails_pending_and_later_calls() {
    let fixture = TestCluster::new(1);
    fixture.cluster.inject_fatal(Status::CoordFail);

    let err = fixture.get("kv", "a").unwrap().wait().unwrap_err();
    assert!(matches!(
        err,
        ClientError::ConnectionLost {
            status: Status::CoordFail,
            ..
        }
    ));

    let conn = &fixture.connections()[0];
    let deadline = Instant::now() + Duration::from_secs(5);
    while conn.state() != ConnectionState::Failed {
        assert!(Instant::now() < deadline, "connection never failed");
        std::thread::sleep(Duration::from_millis(1));
    }
    let later = fixture.search("kv", &[]).err().unwrap();
    assert_eq!(later.status(), Status::CoordFail);
    assert_eq!(fixture.pending_len(), 0);
}

#[test]
fn unavailable_cluster_fails_to_connect() {
    let cluster = MemoryCluster::new();
    cluster.set_unavailable(true);
    let err = Client::connect(&cluster, test_config(2)).err().unwrap();
    assert_eq!(err.status(), Status::CoordFail);
    assert!(Admin::connect(&cluster, test_config(1)).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn async_callers_share_the_pool() {
    let fixture = TestCluster::new(2);
    let mut tasks = Vec::new();
    for i in 0..8i64 {
        let pending = fixture.put("kv", format!("t{i}"), &attrs([("n", i)])).unwrap();
        tasks.push(tokio::spawn(pending));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    let total = fixture.count("kv", &[]).unwrap().await;
    assert_eq!(total, Ok(8));

    let mut stream = fixture.search("kv", &[Predicate::greater_than("n", 5i64)]).unwrap();
    let mut seen = 0;
    while let Some(item) = stream.recv().await {
        item.unwrap();
        seen += 1;
    }
    assert_eq!(seen, 2);
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    /// The cluster agrees with a plain map model under any workload.
    #[test]
    fn matches_map_model(ops in kv_operation_sequence_strategy(1, 40)) {
        let fixture = TestCluster::new(2);
        let mut model: BTreeMap<String, i64> = BTreeMap::new();

        for op in ops {
            match op {
                KvOperation::Put { key, n } => {
                    fixture.put("kv", key.as_str(), &attrs([("n", n)])).unwrap().wait().unwrap();
                    model.insert(key, n);
                }
                KvOperation::PutIfNotExist { key, n } => {
                    let result = fixture
                        .put_if_not_exist("kv", key.as_str(), &attrs([("n", n)]))
                        .unwrap()
                        .wait();
                    if model.contains_key(&key) {
                        prop_assert!(result.unwrap_err().is_cmp_fail());
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(key, n);
                    }
                }
                KvOperation::Add { key, delta } => {
                    let result = fixture
                        .atomic_add("kv", key.as_str(), &attrs([("n", delta)]))
                        .unwrap()
                        .wait();
                    match model.get_mut(&key) {
                        Some(n) => {
                            prop_assert!(result.is_ok());
                            *n += delta;
                        }
                        None => {
                            prop_assert!(result.unwrap_err().is_not_found());
                        }
                    }
                }
                KvOperation::Del { key } => {
                    let result = fixture.del("kv", key.as_str()).unwrap().wait();
                    prop_assert_eq!(result.is_ok(), model.remove(&key).is_some());
                }
                KvOperation::Get { key } => {
                    let result = fixture.get("kv", key.as_str()).unwrap().wait();
                    match model.get(&key) {
                        Some(n) => {
                            prop_assert_eq!(&result.unwrap()["n"], &Value::Int(*n));
                        }
                        None => {
                            prop_assert!(result.unwrap_err().is_not_found());
                        }
                    }
                }
            }
        }

        prop_assert_eq!(fixture.count("kv", &[]).unwrap().wait(), Ok(model.len() as u64));
    }
}
