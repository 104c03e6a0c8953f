//! Benchmarks for the C front-end.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SOURCE: &str = r#"
typedef struct Node { int key; struct Node *next; } Node;

enum Color { RED, GREEN = 4, BLUE };

static int table[] = {1, 2, 3, 4, 5, 6, 7, 8};

int lookup(Node *head, int key) {
    Node *cur;
    for (cur = head; cur != 0; cur = cur->next) {
        if (cur->key == key) {
            return 1;
        }
    }
    return 0;
}

unsigned hash(char *s, unsigned n) {
    unsigned h;
    unsigned i;
    h = 0;
    for (i = 0; i < n; i++) {
        h = h * 31 + (unsigned)s[i];
    }
    return h % (sizeof(table) / sizeof(int));
}
"#;

/// Benchmark lexing speed.
fn bench_lexing(c: &mut Criterion) {
    c.bench_function("lex_list_module", |b| {
        b.iter(|| {
            cfront::frontend::Lexer::new(black_box(SOURCE))
                .tokenize()
                .unwrap()
        })
    });
}

/// Benchmark parsing speed.
fn bench_parsing(c: &mut Criterion) {
    c.bench_function("parse_list_module", |b| {
        b.iter(|| cfront::parse(black_box(SOURCE)).unwrap())
    });
}

/// Benchmark the full pipeline including the type-transform pass.
fn bench_analyze(c: &mut Criterion) {
    c.bench_function("analyze_list_module", |b| {
        b.iter(|| cfront::analyze(black_box(SOURCE)).unwrap())
    });
}

criterion_group!(benches, bench_lexing, bench_parsing, bench_analyze);
criterion_main!(benches);
