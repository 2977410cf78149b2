//! Benchmarks for the inspection pipeline.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use modsecurity::{Action, Engine, Phase, PhaseData, Rule, RuleBuilder, RuleSet, Severity, Variable};

// ============================================================================
// Test Data
// ============================================================================

const CLEAN_REQUESTS: &[(&str, &str)] = &[
    ("/", "GET"),
    ("/api/users", "GET"),
    ("/api/users/123", "GET"),
    ("/search?q=hello+world", "GET"),
    ("/products?category=electronics&page=1", "GET"),
    ("/api/orders", "POST"),
];

const SQLI_PAYLOADS: &[&str] = &[
    "/api/users?id=1%20UNION%20SELECT%20password%20FROM%20users",
    "/search?q=1'%20union%20select%201,2--",
    "/login?user=admin&id=1%20UnIoN%20SeLeCt%20*",
];

const BODY_SIZES: &[usize] = &[0, 100, 1_000, 10_000, 100_000];

fn crs_like_rules() -> Vec<RuleBuilder> {
    vec![
        Rule::builder(1, Phase::Uri)
            .target(Variable::RequestFilename)
            .transform("lowercase")
            .operator("@beginsWith", "/admin")
            .msg("admin area")
            .action(Action::Deny),
        Rule::builder(920280, Phase::RequestHeaders)
            .target_spec("&REQUEST_HEADERS:Host")
            .operator("@eq", "0")
            .severity(Severity::Warning)
            .action(Action::ScoreBySeverity)
            .action(Action::Pass),
        Rule::builder(942100, Phase::RequestHeaders)
            .target(Variable::ArgsGet)
            .transform("urlDecodeUni")
            .transform("lowercase")
            .operator("@rx", r"union\s+(all\s+)?select")
            .severity(Severity::Critical)
            .action(Action::ScoreBySeverity)
            .action(Action::Pass),
        Rule::builder(949110, Phase::RequestHeaders)
            .target_spec("TX:anomaly_score")
            .operator("@ge", "5")
            .msg("Inbound anomaly score exceeded")
            .action(Action::Deny),
        Rule::builder(942200, Phase::RequestBody)
            .target(Variable::RequestBody)
            .transform("urlDecode")
            .operator("@pm", "union select insert delete drop")
            .severity(Severity::Critical)
            .action(Action::Deny),
    ]
}

fn generate_body(size: usize) -> Vec<u8> {
    let mut body = Vec::with_capacity(size);
    while body.len() < size {
        body.extend_from_slice(b"field=value&");
    }
    body.truncate(size);
    body
}

/// Drive one request through the request phases.
fn run_request(engine: &Engine, uri: &str, method: &str, body: Option<&[u8]>) -> bool {
    let mut tx = match engine.new_transaction() {
        Ok(tx) => tx,
        Err(_) => return false,
    };
    let mut steps = vec![
        (Phase::Connection, PhaseData::connection("203.0.113.7", 51000, "198.51.100.1", 443)),
        (Phase::Uri, PhaseData::uri(uri, method, "HTTP/1.1")),
        (
            Phase::RequestHeaders,
            PhaseData::request_headers([("Host", "example.com"), ("User-Agent", "Mozilla/5.0")]),
        ),
    ];
    if let Some(body) = body {
        steps.push((Phase::RequestBody, PhaseData::RequestBody(body.to_vec())));
    }

    let mut disrupted = false;
    for (phase, data) in steps {
        match tx.advance(phase, data) {
            Ok(outcome) if outcome.disrupted => {
                disrupted = true;
                break;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    let _ = tx.advance(Phase::Logging, PhaseData::Empty);
    disrupted
}

// ============================================================================
// Benchmark: Rule Compilation
// ============================================================================

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    group.bench_function("crs_like", |b| {
        b.iter(|| RuleSet::compile(black_box(crs_like_rules())).unwrap())
    });

    group.finish();
}

// ============================================================================
// Benchmark: Transaction Processing
// ============================================================================

fn bench_transaction(c: &mut Criterion) {
    let engine = Engine::with_ruleset(RuleSet::compile(crs_like_rules()).unwrap());

    let mut group = c.benchmark_group("transaction");

    group.bench_function("clean_request", |b| {
        b.iter(|| run_request(&engine, black_box("/api/users"), "GET", None))
    });

    group.bench_function("sqli_request", |b| {
        b.iter(|| run_request(&engine, black_box(SQLI_PAYLOADS[0]), "GET", None))
    });

    group.bench_function("admin_request", |b| {
        b.iter(|| run_request(&engine, black_box("/Admin/panel"), "GET", None))
    });

    group.finish();
}

fn bench_body_processing(c: &mut Criterion) {
    let engine = Engine::with_ruleset(RuleSet::compile(crs_like_rules()).unwrap());

    let mut group = c.benchmark_group("body_processing");

    for &size in BODY_SIZES {
        let body = generate_body(size);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("clean", size), &body, |b, body| {
            b.iter(|| run_request(&engine, "/api/data", "POST", Some(black_box(body))))
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Operators and Transformations
// ============================================================================

fn bench_operators(c: &mut Criterion) {
    use modsecurity::operators::{create_operator, Operator};

    let mut group = c.benchmark_group("operators");

    let rx = create_operator("@rx", r"(?i)select.*from").unwrap();
    group.bench_function("rx_match", |b| b.iter(|| rx.execute(black_box("SELECT * FROM users"))));
    group.bench_function("rx_no_match", |b| b.iter(|| rx.execute(black_box("hello world"))));

    let pm = create_operator("@pm", "select union insert delete").unwrap();
    group.bench_function("pm_match", |b| {
        b.iter(|| pm.execute(black_box("trying to union the data")))
    });
    group.bench_function("pm_no_match", |b| {
        b.iter(|| pm.execute(black_box("normal user input here")))
    });

    let ip = create_operator("@ipMatch", "10.0.0.0/8,192.168.0.0/16,2001:db8::/32").unwrap();
    group.bench_function("ip_match", |b| b.iter(|| ip.execute(black_box("192.168.10.4"))));

    group.finish();
}

fn bench_transformations(c: &mut Criterion) {
    use modsecurity::transformations::{create_transformation, Transformation};

    let mut group = c.benchmark_group("transformations");

    let cases = [
        ("urlDecodeUni", "hello%20world%u0021"),
        ("base64Decode", "SGVsbG8gV29ybGQh"),
        ("htmlEntityDecode", "&lt;script&gt;alert(1)&lt;/script&gt;"),
        ("lowercase", "HELLO WORLD"),
        ("normalizePath", "/foo/../bar/./baz"),
    ];
    for (name, input) in cases {
        let t = create_transformation(name).unwrap();
        group.bench_function(name, |b| b.iter(|| t.transform(black_box(input)).len()));
    }

    group.finish();
}

// ============================================================================
// Benchmark: Throughput
// ============================================================================

fn bench_throughput(c: &mut Criterion) {
    let engine = Engine::with_ruleset(RuleSet::compile(crs_like_rules()).unwrap());

    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(1));

    group.bench_function("clean_traffic", |b| {
        let mut idx = 0;
        b.iter(|| {
            let (uri, method) = CLEAN_REQUESTS[idx % CLEAN_REQUESTS.len()];
            idx += 1;
            run_request(&engine, black_box(uri), method, None)
        })
    });

    group.bench_function("attack_traffic", |b| {
        let mut idx = 0;
        b.iter(|| {
            let uri = SQLI_PAYLOADS[idx % SQLI_PAYLOADS.len()];
            idx += 1;
            run_request(&engine, black_box(uri), "GET", None)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_transaction,
    bench_body_processing,
    bench_operators,
    bench_transformations,
    bench_throughput,
);
criterion_main!(benches);
