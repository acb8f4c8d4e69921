#![allow(clippy::unwrap_used, clippy::panic)]

use std::fs;
use std::path::Path;

use lbsweep::aggregate::AggregationContext;
use lbsweep::commands::{
    run_cluster, run_filter, run_lb, run_queue, run_user, CLIENT_DISTRIBUTIONS_DIR,
    CLIENT_ERRORS_DIR, CLIENT_SERVICE_TIMES_DIR, IDLE_TIMES_DIR, INVESTIGATION_DIR,
    LB_TABLES_DIR, NODE_REQUEST_COUNTS_DIR,
};
use lbsweep::config::Config;
use lbsweep::descriptor::LogKind;
use lbsweep::ingest::ingest;
use lbsweep::investigate::LogFilter;
use lbsweep::report::{report, Grouping, Metric};

const CONFIG: &str = "\
cluster_size: 2
histogram_bins: 4
design:
  algorithms: [rr, lc]
  latencies_ms: [0]
  homogeneity: [true]
  file_sizes: [s]
  rates: [50, 10]
  interval_s: 20
";

const LB_HEADER: &str = "event,node_id,peer_id,start_time,duration,bytes,queue\n";
const CLUSTER_HEADER: &str = "node-id,overhead,event,peer,timestamp,duration,bytes\n";

fn load_config(dir: &Path) -> Config {
    let path = dir.join("lbsweep.yaml");
    fs::write(&path, CONFIG).unwrap();
    Config::load(&path).unwrap()
}

fn write(dir: &Path, name: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn client_tree(dir: &Path) {
    let files = [
        ("rr", 10, "1000,10\n3000,10\n"),
        ("rr", 50, "2000,10\n"),
        ("lc", 10, "500,10\n"),
        ("lc", 50, "1000,10\n0,0\n"),
    ];
    for (alg, rate, body) in files {
        let name = format!("client-exp-{alg}-lat-0-homog-true-int-20-fsz-s-rate-{rate}.csv");
        write(dir, &name, &format!("duration,bytes\n{body}"));
    }
}

#[test]
fn test_user_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    let source = tmp.path().join("user");
    let output = tmp.path().join("out");
    client_tree(&source);

    let run = run_user(&cfg, &source, &output).unwrap();
    // Four histograms plus one algorithm table and two file-size tables per metric.
    assert_eq!(run.written.len(), 10);
    assert_eq!(run.dropped_groups, 0);

    let service = read(
        &output
            .join(CLIENT_SERVICE_TIMES_DIR)
            .join("algs-compare-homog-true-fsz-s-delay-0.csv"),
    );
    assert_eq!(
        service,
        "Algorithm,10(req/sec),50(req/sec)\nrr,2,2\nlc,0.5,1\n"
    );

    let errors = read(
        &output
            .join(CLIENT_ERRORS_DIR)
            .join("algs-compare-homog-true-fsz-s-delay-0.csv"),
    );
    assert_eq!(errors, "Algorithm,10(req/sec),50(req/sec)\nrr,0,0\nlc,0,0.5\n");

    let by_size = read(
        &output
            .join(CLIENT_SERVICE_TIMES_DIR)
            .join("vary-fsz-alg-lc-homog-true-delay-0.csv"),
    );
    assert_eq!(by_size, "File Size,10(req/sec),50(req/sec)\ns,0.5,1\n");

    let hist = output
        .join(CLIENT_DISTRIBUTIONS_DIR)
        .join("hist-client-exp-rr-lat-0-homog-true-int-20-fsz-s-rate-10.csv");
    let hist = read(&hist);
    assert!(hist.starts_with("bucket_start_s,bucket_end_s,count\n"));
    assert_eq!(hist.lines().count(), 5);
}

#[test]
fn test_missing_rate_drops_configuration() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    let source = tmp.path().join("user");
    client_tree(&source);
    fs::remove_file(source.join("client-exp-lc-lat-0-homog-true-int-20-fsz-s-rate-50.csv"))
        .unwrap();

    let mut ctx = AggregationContext::from_config(&cfg);
    let ingested = ingest(&source, LogKind::Client, &mut ctx).unwrap();

    let by_alg = report(
        ingested.clients(),
        Grouping::ByAlgorithm,
        &cfg.design,
        Metric::MeanServiceTime,
    );
    assert!(by_alg.tables.is_empty());
    assert_eq!(by_alg.dropped_groups, 1);

    // The round-robin file-size table is still complete.
    let by_size = report(
        ingested.clients(),
        Grouping::ByFileSize,
        &cfg.design,
        Metric::MeanServiceTime,
    );
    assert_eq!(by_size.tables.len(), 1);
    assert_eq!(by_size.tables[0].name, "vary-fsz-alg-rr-homog-true-delay-0");
    assert_eq!(by_size.dropped_groups, 1);
}

#[test]
fn test_lb_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    let source = tmp.path().join("lb");
    let output = tmp.path().join("out");

    for alg in ["rr", "lc"] {
        for (rate, second_duration) in [(10, 1_000_000_000u64), (50, 3_000_000_000)] {
            let name = format!("lb-exp-{alg}-lat-0-homog-true-int-20-fsz-s-rate-{rate}.csv");
            let body = format!(
                "{LB_HEADER}\
                 node-joined,0,n0,0,0,0,\n\
                 user-joined,0,u1,0,1000000000,10,\"(0,1),(1,0)\"\n\
                 user-joined,1,u2,1000000000,{second_duration},10,\"(0,1),(1,1)\"\n"
            );
            write(&source, &name, &body);
        }
    }
    // A log without any user-joined event reports zero throughput.
    write(
        &source,
        "lb-exp-rr-lat-25-homog-true-int-20-fsz-s-rate-10.csv",
        &format!("{LB_HEADER}node-joined,0,n0,0,0,0,\n"),
    );

    let run = run_lb(&cfg, &source, &output).unwrap();
    assert_eq!(run.written.len(), 3);
    assert_eq!(run.diagnostics, 1);

    let table = read(
        &output
            .join(LB_TABLES_DIR)
            .join("algs-compare-homog-true-fsz-s-delay-0.csv"),
    );
    assert_eq!(
        table,
        "Algorithm,10(req/sec),50(req/sec)\nrr,1,0.5\nlc,1,0.5\n"
    );
}

#[test]
fn test_cluster_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    let source = tmp.path().join("cluster");
    let output = tmp.path().join("out");

    for rate in [10, 50] {
        let name = format!("cluster-exp-rr-lat-0-homog-true-int-20-fsz-s-rate-{rate}.csv");
        let body = format!(
            "{CLUSTER_HEADER}\
             1,300,node-online,,0,0,0\n\
             0,200,file-transfer,lb,5,5,10\n\
             1,100,file-transfer,lb,6,2,10\n\
             0,200,file-transfer,lb,20,5,10\n\
             1,100,file-transfer,lb,{},2,10\n",
            8 + rate
        );
        write(&source, &name, &body);
    }

    let run = run_cluster(&cfg, &source, &output).unwrap();
    // Two request-count tables and one idle table; the lc configuration is absent.
    assert_eq!(run.written.len(), 3);
    assert_eq!(run.dropped_groups, 1);

    let counts = read(
        &output
            .join(NODE_REQUEST_COUNTS_DIR)
            .join("node-req-count-cluster-exp-rr-lat-0-homog-true-int-20-fsz-s-rate-10.csv"),
    );
    assert_eq!(counts, "node-id,count,overhead\n1,2,100\n0,2,200\n");

    let idle = read(&output.join(IDLE_TIMES_DIR).join("idle-rr-lat-0-homog-true-fsz-s.csv"));
    // Node 1 spans 6..(8+rate+2) with 4ns of transfers.
    assert_eq!(
        idle,
        "Node,10(req/sec),50(req/sec)\nNode 0,10,10\nNode 1,10,50\n"
    );
}

#[test]
fn test_queue_and_filter_investigations() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    let output = tmp.path().join("out");
    let logs = tmp.path().join("lb");
    let name = "lb-exp-lc-lat-0-homog-true-int-20-fsz-s-rate-10.csv";
    write(
        &logs,
        name,
        &format!(
            "{LB_HEADER}\
             user-joined,0,u1,100,5,10,\"(0,1),(1,0)\"\n\
             health-check,1,lb,150,1,0,\n\
             user-joined,1,u2,200,5,10,\"(0,1),(1,2)\"\n"
        ),
    );

    let queue = run_queue(&cfg, &logs.join(name), &output).unwrap();
    assert_eq!(
        queue,
        output
            .join(INVESTIGATION_DIR)
            .join("lb-queue-lb-exp-lc-lat-0-homog-true-int-20-fsz-s-rate-10.csv")
    );
    assert_eq!(read(&queue), "timestamp_ns,node-0,node-1\n100,1,0\n200,1,2\n");

    let filter = LogFilter {
        node: None,
        since: Some(150),
    };
    let filtered = run_filter(&cfg, &logs.join(name), &output, filter).unwrap();
    assert_eq!(
        read(&filtered),
        format!("{LB_HEADER}user-joined,1,u2,200,5,10,\"(0,1),(1,2)\"\n")
    );
}

#[test]
fn test_queue_rejects_client_log() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    let logs = tmp.path().join("user");
    client_tree(&logs);

    let file = logs.join("client-exp-rr-lat-0-homog-true-int-20-fsz-s-rate-10.csv");
    let err = run_queue(&cfg, &file, &tmp.path().join("out")).unwrap_err();
    assert!(err.to_string().contains("client log"));
}

#[test]
fn test_missing_source_directory_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    assert!(run_lb(&cfg, &tmp.path().join("absent"), &tmp.path().join("out")).is_err());
}

#[test]
fn test_user_counts_each_dropped_configuration_once() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    let source = tmp.path().join("user");
    client_tree(&source);
    fs::remove_file(source.join("client-exp-lc-lat-0-homog-true-int-20-fsz-s-rate-50.csv"))
        .unwrap();

    let run = run_user(&cfg, &source, &tmp.path().join("out")).unwrap();
    // The algorithm comparison and the lc file-size table.
    assert_eq!(run.dropped_groups, 2);
}

#[test]
fn test_filter_leaves_no_output_for_malformed_log() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = load_config(tmp.path());
    let output = tmp.path().join("out");
    let logs = tmp.path().join("lb");
    let name = "lb-exp-rr-lat-0-homog-true-int-20-fsz-s-rate-10.csv";
    write(
        &logs,
        name,
        &format!(
            "{LB_HEADER}\
             user-joined,0,u1,100,5,10,\"(0,1),(1,0)\"\n\
             user-joined,1,u2,later,5,10,\"(0,1),(1,2)\"\n"
        ),
    );

    assert!(run_filter(&cfg, &logs.join(name), &output, LogFilter::default()).is_err());
    assert!(!output
        .join(INVESTIGATION_DIR)
        .join(format!("filtered-{name}"))
        .exists());
}
