use criterion::{Criterion, black_box, criterion_group, criterion_main};

use hcl2_eval::{Scope, evaluate_body, lexer, parse_file, parser};

const CONFIG: &str = r#"
environment = "prod"

defaults {
    replicas = 2
    port     = 8080
}

service "web" {
    image    = "registry/web:latest"
    replicas = 2 * 2
    labels   = {for i, name in ["a", "b", "c"]: name => i}
    hosts    = [for i in [1, 2, 3]: "web-${i}" if i > 1]
}

service "worker" {
    image  = "registry/worker:latest"
    public = false
    ratio  = 7 / 2.0
}
"#;

fn bench_frontend(c: &mut Criterion) {
    c.bench_function("frontend_tokenize", |b| {
        b.iter(|| {
            let out = lexer::tokenize(black_box(CONFIG)).expect("tokenize");
            black_box(out);
        })
    });

    c.bench_function("frontend_parse", |b| {
        b.iter(|| {
            let out = parser::parse_file(black_box(CONFIG)).expect("parse");
            black_box(out);
        })
    });

    c.bench_function("frontend_parse_eval", |b| {
        let scope = Scope::new();
        b.iter(|| {
            let body = parse_file(black_box(CONFIG)).expect("parse");
            let out = evaluate_body(&body, &scope).expect("eval");
            black_box(out);
        })
    });
}

criterion_group!(benches, bench_frontend);
criterion_main!(benches);
