//! End-to-end batch behavior against the in-memory depot.

mod common;

use common::SharedBuf;
use curator::{
    BatchOptions, CheckChecksumsOptions, Curator, MemoryJournal, RecordPolicy,
    RepairMetadataOptions, RepairReplicasOptions,
};
use depot::{DepotClient, MemoryDepot, ObjectPath};

fn path(s: &str) -> ObjectPath {
    ObjectPath::parse(s).expect("test path")
}

fn curator(depot: &MemoryDepot) -> Curator {
    Curator::with_journal(depot.factory(), MemoryJournal::new())
}

fn repair_options(tasks: usize) -> RepairReplicasOptions {
    RepairReplicasOptions {
        batch: BatchOptions {
            num_clients: 2,
            num_tasks: tasks,
            retries: 2,
        },
        num_replicas: 2,
        resources: vec!["res-a".to_string(), "res-b".to_string(), "res-c".to_string()],
        print_repair: true,
        print_fail: false,
    }
}

/// The three-path repair scenario: a surplus object passes untouched, a
/// degraded object is repaired, a missing path fails, and the counters
/// account for all of them.
#[tokio::test]
async fn test_repair_replicas_mixed_scenario() {
    let depot = MemoryDepot::new();
    // A: three valid identical replicas, above the target of two.
    depot
        .put_object(&path("/z/a"), b"aaa", &["res-a", "res-b", "res-c"])
        .await
        .expect("put");
    // B: one valid and one invalid replica.
    depot
        .put_object(&path("/z/b"), b"bbb", &["res-a", "res-b"])
        .await
        .expect("put");
    depot.invalidate_replica(&path("/z/b"), 1).await.expect("invalidate");
    // C: absent.

    let out = SharedBuf::new();
    let summary = curator(&depot)
        .repair_replicas(&b"/z/a\n/z/b\n/z/c\n"[..], out.clone(), repair_options(2))
        .await
        .expect("run");

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.passed, 2);
    assert_eq!(summary.repaired, 1);
    assert_eq!(summary.errors, 1);

    // Only the repaired path was printed.
    assert_eq!(out.lines(), ["/z/b"]);

    // A's surplus replicas were not deleted.
    let client = depot.client();
    assert_eq!(client.get_replicas(&path("/z/a")).await.expect("get").len(), 3);

    // B now satisfies the invariant: two valid replicas, equal checksums.
    let replicas = client.get_replicas(&path("/z/b")).await.expect("get");
    assert_eq!(replicas.len(), 2);
    assert!(replicas.iter().all(|r| r.valid));
    assert_eq!(replicas[0].checksum, replicas[1].checksum);
}

/// Re-running a repair batch over an unchanged store repairs nothing.
#[tokio::test]
async fn test_repair_replicas_idempotent_across_runs() {
    let depot = MemoryDepot::new();
    for (name, invalidate) in [("x", true), ("y", false), ("z", true)] {
        let obj = path(&format!("/run/{name}"));
        depot
            .put_object(&obj, name.as_bytes(), &["res-a", "res-b"])
            .await
            .expect("put");
        if invalidate {
            depot.invalidate_replica(&obj, 1).await.expect("invalidate");
        }
    }
    let input = b"/run/x\n/run/y\n/run/z\n";

    let engine = curator(&depot);
    let first = engine
        .repair_replicas(&input[..], Vec::new(), repair_options(4))
        .await
        .expect("first run");
    assert_eq!(first.repaired, 2);
    assert_eq!(first.errors, 0);

    let second = engine
        .repair_replicas(&input[..], Vec::new(), repair_options(4))
        .await
        .expect("second run");
    assert_eq!(second.processed, 3);
    assert_eq!(second.repaired, 0);
    assert_eq!(second.passed, 3);
}

/// Counters are a fixed function of the input regardless of worker count.
#[tokio::test]
async fn test_concurrency_does_not_change_counters() {
    let depot = MemoryDepot::new();
    let mut input = String::new();
    for i in 0..20 {
        let obj = path(&format!("/bulk/obj{i}"));
        depot
            .put_object(&obj, format!("content{i}").as_bytes(), &["res-a", "res-b"])
            .await
            .expect("put");
        if i % 3 == 0 {
            depot.corrupt_replica(&obj, 1, b"drift").await.expect("corrupt");
        }
        input.push_str(obj.as_str());
        input.push('\n');
    }
    input.push_str("/bulk/missing\n");

    let engine = curator(&depot);
    let mut summaries = Vec::new();
    for tasks in [1, 8] {
        let options = CheckChecksumsOptions {
            batch: BatchOptions {
                num_clients: 3,
                num_tasks: tasks,
                retries: 2,
            },
            record_policy: RecordPolicy::Lenient,
            print_pass: false,
            print_fail: false,
        };
        let summary = engine
            .check_checksums(input.as_bytes(), Vec::new(), options)
            .await
            .expect("run");
        summaries.push(summary);
    }

    assert_eq!(summaries[0], summaries[1]);
    assert_eq!(summaries[0].processed, 21);
    // 7 corrupted + 1 missing
    assert_eq!(summaries[0].errors, 8);
    assert_eq!(
        summaries[0].processed,
        summaries[0].passed + summaries[0].errors
    );
}

/// Empty input is a clean, empty summary.
#[tokio::test]
async fn test_empty_input() {
    let depot = MemoryDepot::new();
    let summary = curator(&depot)
        .check_checksums(&b""[..], Vec::new(), CheckChecksumsOptions::default())
        .await
        .expect("run");
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.passed, 0);
    assert_eq!(summary.errors, 0);
}

/// Print flags select pass and fail line sets independently.
#[tokio::test]
async fn test_print_flag_selection() {
    let depot = MemoryDepot::new();
    depot.put_object(&path("/p/good"), b"ok", &["res-a"]).await.expect("put");
    let input = b"/p/good\n/p/missing\n";

    let engine = curator(&depot);

    let passes = SharedBuf::new();
    let _ = engine
        .check_checksums(
            &input[..],
            passes.clone(),
            CheckChecksumsOptions {
                print_pass: true,
                print_fail: false,
                ..CheckChecksumsOptions::default()
            },
        )
        .await
        .expect("run");
    assert_eq!(passes.lines(), ["/p/good"]);

    let fails = SharedBuf::new();
    let _ = engine
        .check_checksums(
            &input[..],
            fails.clone(),
            CheckChecksumsOptions {
                print_pass: false,
                print_fail: true,
                ..CheckChecksumsOptions::default()
            },
        )
        .await
        .expect("run");
    assert_eq!(fails.lines(), ["/p/missing"]);
}

/// Metadata repair succeeds overall only when no path errored.
#[tokio::test]
async fn test_repair_common_metadata_success_semantics() {
    let depot = MemoryDepot::new();
    depot.put_object(&path("/m/a.cram"), b"1", &["res-a"]).await.expect("put");
    depot.put_object(&path("/m/b.cram"), b"2", &["res-a"]).await.expect("put");

    let engine = curator(&depot);
    let options = RepairMetadataOptions {
        creator: Some("svc-archive".to_string()),
        ..RepairMetadataOptions::default()
    };

    let summary = engine
        .repair_common_metadata(&b"/m/a.cram\n/m/b.cram\n"[..], Vec::new(), options.clone())
        .await
        .expect("run");
    assert!(summary.is_clean());
    assert_eq!(summary.repaired, 2);

    // A denied write turns the overall result unclean.
    depot.put_object(&path("/m/c.cram"), b"3", &["res-a"]).await.expect("put");
    depot.deny_metadata_writes(&path("/m/c.cram")).await;
    let summary = engine
        .repair_common_metadata(&b"/m/c.cram\n"[..], Vec::new(), options)
        .await
        .expect("run");
    assert!(!summary.is_clean());
}

/// After a successful replica repair, valid replicas agree and match the
/// checksum record when one exists.
#[tokio::test]
async fn test_post_repair_checksum_invariant() {
    let depot = MemoryDepot::new();
    let obj = path("/inv/obj");
    depot.put_object(&obj, b"payload", &["res-a", "res-b"]).await.expect("put");
    depot
        .set_checksum_record(&obj, &depot::sha256_hex(b"payload"))
        .await
        .expect("record");
    depot.invalidate_replica(&obj, 1).await.expect("invalidate");

    let summary = curator(&depot)
        .repair_replicas(&b"/inv/obj\n"[..], Vec::new(), repair_options(1))
        .await
        .expect("run");
    assert_eq!(summary.repaired, 1);

    let client = depot.client();
    let replicas = client.get_replicas(&obj).await.expect("get");
    let record = client
        .get_checksum_record(&obj)
        .await
        .expect("record")
        .expect("present");
    assert_eq!(replicas.len(), 2);
    for replica in &replicas {
        assert!(replica.valid);
        assert_eq!(replica.checksum.as_deref(), Some(record.value.as_str()));
    }
}
