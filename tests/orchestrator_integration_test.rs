//! End-to-end runs of the orchestrator against in-memory nodes

use hadoop_bootstrap::config::HadoopSettings;
use hadoop_bootstrap::network::{IngressRule, SecurityGroup};
use hadoop_bootstrap::orchestrator::{HadoopSetup, Phase, StartupStep};
use hadoop_bootstrap::pool::WorkerPool;
use hadoop_bootstrap::testing::mocks::{MockNetworkPolicy, MockTransport, RecordedOp};
use hadoop_bootstrap::testing::MockCluster;
use hadoop_bootstrap::SetupError;
use std::time::Duration;

const EXPECTED_FILES: [&str; 7] = [
    "/etc/hadoop/mapred-site.xml",
    "/etc/hadoop/core-site.xml",
    "/etc/hadoop/hdfs-site.xml",
    "/etc/hadoop/masters",
    "/etc/hadoop/slaves",
    "/etc/hadoop/excludes",
    "/etc/dumbo.conf",
];

fn cluster_group() -> SecurityGroup {
    SecurityGroup {
        id: "sg-1234".to_string(),
        name: "@sc-analytics".to_string(),
        permissions: vec![IngressRule::tcp_from_anywhere(22)],
    }
}

#[tokio::test]
async fn test_full_run_configures_every_node() {
    let cluster = MockCluster::with_workers(4).unwrap();
    let policy = MockNetworkPolicy::new(vec![cluster_group()]);

    let summary = HadoopSetup::new(HadoopSettings::default())
        .with_max_parallel(3)
        .run(&cluster.topology, "alice", Some(&policy))
        .await
        .unwrap();

    for transport in &cluster.transports {
        let mut written = transport.written_paths();
        written.sort();
        let mut expected: Vec<String> = EXPECTED_FILES.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(written, expected, "files on {}", transport.alias());

        assert_eq!(
            transport.file("/etc/hadoop/slaves").as_deref(),
            Some("node001\nnode002\nnode003\nnode004")
        );
        assert_eq!(transport.file("/etc/hadoop/masters").as_deref(), Some("master"));
    }

    assert_eq!(summary.config.worker_count, 4);
    assert_eq!(summary.config.dfs_replication, 2);
    assert_eq!(summary.phases_completed, Phase::ALL.to_vec());
    assert_eq!(
        summary.authorized_rules,
        vec![
            IngressRule::tcp_from_anywhere(50070),
            IngressRule::tcp_from_anywhere(50030),
        ]
    );
}

#[tokio::test]
async fn test_startup_runs_on_master_only_after_all_phases() {
    let cluster = MockCluster::with_workers(2).unwrap();

    HadoopSetup::new(HadoopSettings::default())
        .run(&cluster.topology, "alice", None)
        .await
        .unwrap();

    let master = cluster.master();
    let startup: Vec<String> = master
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("su "))
        .collect();
    let expected: Vec<String> = StartupStep::ALL
        .iter()
        .map(|s| s.command("hadoop", "alice"))
        .collect();
    assert_eq!(startup, expected);

    for worker in ["node001", "node002"] {
        let commands = cluster.node(worker).unwrap().commands();
        assert!(commands.iter().all(|c| !c.starts_with("su ")));
    }

    // The last dumbo write on any node precedes the namenode format
    let format_seq = master
        .first_seq(|op| matches!(op, RecordedOp::Execute(c) if c.contains("namenode -format")))
        .unwrap();
    for transport in &cluster.transports {
        let dumbo_seq = transport
            .first_seq(|op| matches!(op, RecordedOp::Write { path, .. } if path == "/etc/dumbo.conf"))
            .unwrap();
        assert!(dumbo_seq < format_seq);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_phases_never_overlap_across_nodes() {
    let transports = ["master", "node001", "node002", "node003"]
        .iter()
        .enumerate()
        .map(|(i, alias)| {
            MockTransport::new(alias).with_delay(Duration::from_millis(2 * (4 - i as u64)))
        })
        .collect();
    let cluster = MockCluster::from_transports(transports).unwrap();

    HadoopSetup::new(HadoopSettings::default())
        .run(&cluster.topology, "alice", None)
        .await
        .unwrap();

    // Every write of file N on every node happens before any write of file N+1
    for pair in EXPECTED_FILES.windows(2) {
        let last_of_first = cluster
            .transports
            .iter()
            .filter_map(|t| t.first_seq(|op| matches!(op, RecordedOp::Write { path, .. } if path == pair[0])))
            .max()
            .unwrap();
        let first_of_next = cluster
            .transports
            .iter()
            .filter_map(|t| t.first_seq(|op| matches!(op, RecordedOp::Write { path, .. } if path == pair[1])))
            .min()
            .unwrap();
        assert!(
            last_of_first < first_of_next,
            "{} overlapped {}",
            pair[0],
            pair[1]
        );
    }
}

#[tokio::test]
async fn test_phase_failure_aborts_run_and_shuts_pool() {
    let cluster = MockCluster::from_transports(vec![
        MockTransport::new("master"),
        MockTransport::new("node001"),
        MockTransport::new("node002").fail_write("/etc/hadoop/hdfs-site.xml"),
    ])
    .unwrap();
    let pool = WorkerPool::new(20);

    let err = HadoopSetup::new(HadoopSettings::default())
        .run_with_pool(&pool, &cluster.topology, "alice", None)
        .await
        .unwrap_err();

    assert!(pool.is_shut_down());
    assert_eq!(err.exit_code(), 3);
    assert_eq!(err.failed_nodes(), vec!["node002"]);
    assert!(err
        .to_string()
        .contains("Failed to write /etc/hadoop/hdfs-site.xml on node002"));

    for transport in &cluster.transports {
        // Siblings finished the failing phase, nothing after it started
        assert!(transport.written_paths().contains(&"/etc/hadoop/hdfs-site.xml".to_string()));
        assert!(!transport.written_paths().contains(&"/etc/hadoop/masters".to_string()));
        assert!(transport.commands().is_empty());
    }
}

#[tokio::test]
async fn test_format_failure_never_starts_hdfs() {
    let cluster = MockCluster::from_transports(vec![
        MockTransport::new("master").fail_command("namenode -format", 1, "Cannot lock storage"),
        MockTransport::new("node001"),
    ])
    .unwrap();
    let policy = MockNetworkPolicy::new(vec![cluster_group()]);

    let err = HadoopSetup::new(HadoopSettings::default())
        .run(&cluster.topology, "alice", Some(&policy))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SetupError::StartupStep {
            step: StartupStep::FormatNamenode,
            ..
        }
    ));
    assert!(!cluster
        .master()
        .commands()
        .iter()
        .any(|c| c.contains("start-dfs.sh")));
    assert!(policy.authorizations().is_empty());
}

#[tokio::test]
async fn test_replication_follows_worker_count() {
    let small = MockCluster::with_workers(7).unwrap();
    let large = MockCluster::with_workers(9).unwrap();
    let setup = HadoopSetup::new(HadoopSettings::default());

    let small_summary = setup.run(&small.topology, "alice", None).await.unwrap();
    let large_summary = setup.run(&large.topology, "alice", None).await.unwrap();

    assert_eq!(small_summary.config.dfs_replication, 2);
    assert_eq!(large_summary.config.dfs_replication, 3);
    assert!(large
        .master()
        .file("/etc/hadoop/hdfs-site.xml")
        .unwrap()
        .contains("<value>3</value>"));
}

#[tokio::test]
async fn test_single_node_cluster() {
    let cluster = MockCluster::with_workers(0).unwrap();

    let summary = HadoopSetup::new(HadoopSettings::default())
        .run(&cluster.topology, "alice", None)
        .await
        .unwrap();

    assert_eq!(summary.config.mapred_reduce_tasks, 0);
    assert_eq!(
        cluster.master().file("/etc/hadoop/slaves").as_deref(),
        Some("")
    );
}

#[tokio::test]
async fn test_repeated_runs_open_ports_once() {
    let policy = MockNetworkPolicy::new(vec![cluster_group()]);
    let setup = HadoopSetup::new(HadoopSettings::default());

    let first = MockCluster::with_workers(1).unwrap();
    let first = setup.run(&first.topology, "alice", Some(&policy)).await.unwrap();
    let second = MockCluster::with_workers(1).unwrap();
    let second = setup.run(&second.topology, "alice", Some(&policy)).await.unwrap();

    assert_eq!(first.authorized_rules.len(), 2);
    assert!(second.authorized_rules.is_empty());
    assert_eq!(policy.authorizations().len(), 2);
}

#[tokio::test]
async fn test_firewall_failure_is_network_policy_error() {
    let cluster = MockCluster::with_workers(1).unwrap();
    let policy = MockNetworkPolicy::new(vec![cluster_group()]).failing_query();

    let err = HadoopSetup::new(HadoopSettings::default())
        .run(&cluster.topology, "alice", Some(&policy))
        .await
        .unwrap_err();

    assert!(matches!(err, SetupError::NetworkPolicy(_)));
    assert_eq!(err.exit_code(), 5);
    // Services were already started before the firewall step
    assert_eq!(cluster.master().commands().iter().filter(|c| c.starts_with("su ")).count(), 5);
}

#[tokio::test]
async fn test_summary_serializes() {
    let cluster = MockCluster::with_workers(1).unwrap();
    let summary = HadoopSetup::new(HadoopSettings::default())
        .run(&cluster.topology, "alice", None)
        .await
        .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["phases_completed"][0], "mapred_site");
    assert_eq!(json["config"]["worker_count"], 1);
    assert!(json["run_id"].is_string());
}
