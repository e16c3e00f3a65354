use kube_pvc_usage::{
    aggregate, load_config_with_env, load_static_labels, scheduler, ApiClient, MetricSink, MockEnvironment,
    PvcRef, StaticLabels, StatsCollector, VolumeRecord,
};
use kube_pvc_usage::server::serve_on;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

const NODES: &str = r#"{"kind": "NodeList", "apiVersion": "v1", "items": [
    {"metadata": {"name": "node-a"}},
    {"metadata": {"name": "node-b"}}
]}"#;

const NODE_A_SUMMARY: &str = r#"{"node": {"nodeName": "node-a"}, "pods": [
    {"podRef": {"name": "db-0", "namespace": "ns1"}, "volume": [
        {"name": "data", "time": "2024-05-01T10:00:00Z",
         "availableBytes": 750, "capacityBytes": 1000, "usedBytes": 250,
         "inodesFree": 90, "inodes": 100, "inodesUsed": 10,
         "pvcRef": {"name": "pvc-a", "namespace": "ns1"}},
        {"name": "kube-api-access-xyz", "availableBytes": 4096, "capacityBytes": 4096, "usedBytes": 0}
    ]},
    {"podRef": {"name": "cache-0", "namespace": "ns2"}, "volume": [
        {"name": "scratch", "capacityBytes": 0, "usedBytes": 0,
         "pvcRef": {"name": "pvc-empty", "namespace": "ns2"}}
    ]}
]}"#;

async fn mock_cluster(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
    let nodes = server
        .mock("GET", "/api/v1/nodes")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(NODES)
        .create_async()
        .await;
    let node_a = server
        .mock("GET", "/api/v1/nodes/node-a/proxy/stats/summary")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(NODE_A_SUMMARY)
        .create_async()
        .await;
    let node_b = server
        .mock("GET", "/api/v1/nodes/node-b/proxy/stats/summary")
        .with_status(502)
        .with_body("proxy error")
        .create_async()
        .await;
    vec![nodes, node_a, node_b]
}

fn collector(server: &mockito::ServerGuard) -> StatsCollector {
    let client = ApiClient::builder(format!("{}/api/v1", server.url()), "test-token")
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    StatsCollector::new(client)
}

#[test]
fn test_aggregation_examples() {
    let backed = VolumeRecord {
        pvc_ref: Some(PvcRef { name: "pvc-a".to_string(), namespace: "ns1".to_string() }),
        capacity_bytes: 1000.0,
        used_bytes: 250.0,
        available_bytes: 750.0,
        ..Default::default()
    };
    let unbacked = VolumeRecord {
        pvc_ref: None,
        capacity_bytes: 1000.0,
        used_bytes: 250.0,
        ..Default::default()
    };

    let out = aggregate(&[backed]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "pvc-a");
    assert_eq!(out[0].namespace, "ns1");
    assert_eq!(out[0].usage_percent(), 25.0);
    assert_eq!(out[0].avail_percent(), 75.0);

    assert!(aggregate(&[unbacked]).is_empty());
}

#[tokio::test]
async fn test_collected_stats_are_exported_with_static_labels() {
    let mut api = mockito::Server::new_async().await;
    let _mocks = mock_cluster(&mut api).await;

    let mut annotations = tempfile::NamedTempFile::new().unwrap();
    writeln!(annotations, r#"k8s-pvc-usage/cluster="east-1""#).unwrap();
    writeln!(annotations, r#"prometheus.io/scrape="true""#).unwrap();
    let labels = load_static_labels(annotations.path(), "k8s-pvc-usage/");

    let sink = Arc::new(MetricSink::new(labels).unwrap());
    let stats = collector(&api).fetch_all_pvc_stats(&CancellationToken::new()).await;
    assert_eq!(stats.len(), 1);
    assert_eq!(sink.publish(&stats).await, 1);

    let text = sink.render().await.unwrap();
    let usage = text
        .lines()
        .find(|l| l.starts_with("k8s_pvc_usage_percent{"))
        .unwrap();
    assert!(usage.contains(r#"cluster="east-1""#));
    assert!(usage.contains(r#"name="pvc-a""#));
    assert!(usage.ends_with(" 25"));
    assert!(!text.contains("pvc-empty"));
    assert!(!text.contains("scrape"));
}

#[tokio::test]
async fn test_exporter_end_to_end() {
    let mut api = mockito::Server::new_async().await;
    let _mocks = mock_cluster(&mut api).await;

    let env = MockEnvironment::new()
        .with_var("SCRAPE_INTERVAL", "200ms")
        .with_var("RESET_INTERVAL", "1s")
        .with_var("DEBOUNCE_DELAY", "20ms");
    let cfg = assert_ok!(load_config_with_env(&env));

    let sink = Arc::new(MetricSink::new(StaticLabels::new()).unwrap());
    let cancel = CancellationToken::new();
    let schedulers = scheduler::spawn(collector(&api), sink.clone(), &cfg.schedule, cancel.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(serve_on(listener, sink.clone(), cancel.clone()));

    // Wait for the first scrape to land, then keep reading across several
    // reset cycles: the PVC must be present and complete whenever it is shown
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut seen = 0;
    while seen < 5 {
        assert!(tokio::time::Instant::now() < deadline, "exporter never reported pvc-a");
        let body = reqwest::get(format!("http://{}/metrics", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let series = body.lines().filter(|l| l.starts_with("k8s_pvc_")).count();
        assert!(series == 0 || series == 4, "partial exposition:\n{}", body);
        if series == 4 {
            assert!(body.contains(r#"k8s_pvc_avail_bytes{name="pvc-a",namespace="ns1"} 750"#));
            seen += 1;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), schedulers.join())
        .await
        .unwrap();
    server.await.unwrap().unwrap();
}
