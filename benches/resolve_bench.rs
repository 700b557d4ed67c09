//! Benchmarks for the CPU-bound resolution stages.
//!
//! Measures token discovery over player pages, servers-listing parsing,
//! ajax link splitting and salted source decryption.
//!
//! Run with: `cargo bench --bench resolve_bench`

use anistream::servers::ServerCatalog;
use anistream::stream::cipher::decrypt_sources;
use anistream::stream::fallback::extract_data_id;
use anistream::stream::{find_token, AjaxLink};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

#[path = "../tests/common/salted.rs"]
mod salted;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const KEY: &str = "bench-passphrase-0001";

/// Player page where the token sits in the first strategy.
const META_PAGE: &str = r#"<!DOCTYPE html><html><head>
<meta charset="utf-8"><meta name="_gg_fb" content="Tok3nInMetaTag_abc">
<title>Player</title></head><body><div id="megacloud-player"></div>
<script src="/js/player/a/v2/pro/embed-1.min.js?v=1717"></script></body></html>"#;

/// Player page that only yields to the window-object strategy.
const WINDOW_OBJECT_PAGE: &str = r#"<!DOCTYPE html><html><head><title>Player</title></head>
<body><div id="megacloud-player" data-fileid="x"></div>
<script>var settings = {autoplay: 0};</script>
<script>window._xy_ws = { a: "q7Zr8", b: "Lm2Pw9", c: "tY4nB6", d: "vC1kX3" };</script>
</body></html>"#;

fn listing_markup(servers: usize) -> String {
    let mut html = String::new();
    for kind in ["sub", "dub", "raw"] {
        html.push_str(&format!(
            r#"<div class="ps_-block ps_-block-sub servers-{kind}"><div class="ps__-list">"#
        ));
        for i in 0..servers {
            html.push_str(&format!(
                r#"<div class="item server-item" data-id="{i}{i}"><a class="btn">HD-{}</a></div>"#,
                i + 1
            ));
        }
        html.push_str("</div></div>");
    }
    html
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_token_discovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_token");
    group.bench_function("meta", |b| b.iter(|| find_token(black_box(META_PAGE))));
    group.bench_function("window_object", |b| {
        b.iter(|| find_token(black_box(WINDOW_OBJECT_PAGE)))
    });
    group.finish();
}

fn bench_catalog(c: &mut Criterion) {
    let markup = listing_markup(4);
    c.bench_function("catalog_from_markup", |b| {
        b.iter(|| ServerCatalog::from_markup(black_box(&markup)))
    });
}

fn bench_links(c: &mut Criterion) {
    let link = "https://megacloud.blog/embed-2/v3/e-1/G3sQ9fPz1xYt?k=1";
    c.bench_function("ajax_link_parse", |b| {
        b.iter(|| AjaxLink::parse(black_box(link)))
    });
    let embed = r#"<html><body><div id="megaplay-player" data-id="553311" data-realid="107257"></div></body></html>"#;
    c.bench_function("extract_data_id", |b| {
        b.iter(|| extract_data_id(black_box(embed)))
    });
}

fn bench_decrypt(c: &mut Criterion) {
    let payload = salted::salted_export(
        r#"[{"file":"https://cdn.example/_v7/aa/bb/master.m3u8","type":"hls"}]"#,
        KEY.as_bytes(),
        *b"benchslt",
    );
    let mut group = c.benchmark_group("decrypt_sources");
    group.bench_function("raw_key", |b| {
        b.iter(|| decrypt_sources(black_box(&payload), black_box(KEY)))
    });
    group.bench_function("wrong_key", |b| {
        b.iter(|| decrypt_sources(black_box(&payload), black_box("0badc0ffee")))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_token_discovery,
    bench_catalog,
    bench_links,
    bench_decrypt
);
criterion_main!(benches);
