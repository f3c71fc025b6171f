//! End-to-end parsing of request bodies

mod common;

use bossaddr::{BossConfig, BossError, CutoutParser, RequestParams};
use common::{blosc, fixture, fixture_with, pattern, Fixture};
use futures::future::join_all;

fn parser(fx: &Fixture) -> CutoutParser {
    CutoutParser::new(fx.catalog.clone(), fx.keys.clone(), fx.config.clone())
}

fn params() -> RequestParams {
    RequestParams::new("col1", "exp1", "channel1")
        .resolution(0)
        .ranges("0:6", "0:10", "0:2")
}

#[tokio::test]
async fn test_parse_blosc_body() {
    let fx = fixture().await;
    let parser = parser(&fx);

    let raw = pattern(120);
    let payload = blosc(&raw);
    let mut body: &[u8] = &payload;
    let cutout = parser
        .parse("application/blosc", &params(), &mut body)
        .await
        .unwrap();

    assert_eq!(cutout.data.shape(), &[2, 10, 6]);
    assert_eq!(cutout.data.to_le_bytes(), raw);
    assert_eq!(cutout.request.boss_key().as_str(), "col1&exp1&channel1");
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_body_drained_on_every_failure() {
    let fx = fixture_with(BossConfig::default().with_cutout_max_size(100)).await;
    let parser = parser(&fx);
    let junk = pattern(2048);

    let cases = [
        ("application/json", params()),
        ("application/blosc", params().ranges("0:6", "0:10", "0:2000")),
        ("application/blosc", RequestParams::new("col1", "exp1", "missing")),
        // 120 bytes against a 100 byte ceiling
        ("application/blosc", params()),
        ("application/npygz", params().ranges("0:5", "0:10", "0:2")),
    ];
    for (media_type, request) in cases {
        let mut body: &[u8] = &junk;
        assert!(parser.parse(media_type, &request, &mut body).await.is_err());
        assert!(body.is_empty(), "{media_type} {request:?}");
    }
}

#[tokio::test]
async fn test_oversized_body_rejected_and_drained() {
    let fx = fixture().await;
    let parser = parser(&fx);

    let junk = pattern(4 << 20);
    for media_type in ["application/blosc", "application/npygz"] {
        let mut body: &[u8] = &junk;
        let err = parser
            .parse(media_type, &params(), &mut body)
            .await
            .unwrap_err();
        assert!(matches!(err, BossError::ShapeMismatch(_)), "{media_type}: {err:?}");
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn test_validation_errors_surface_unchanged() {
    let fx = fixture().await;
    let parser = parser(&fx);
    let junk = pattern(16);

    let mut body: &[u8] = &junk;
    let err = parser
        .parse(
            "application/blosc",
            &params().ranges("0:6", "0:10", "0:2000"),
            &mut body,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BossError::OutOfBounds { .. }));

    let mut body: &[u8] = &junk;
    let err = parser
        .parse("application/blosc", &params().resolution(15), &mut body)
        .await
        .unwrap_err();
    assert!(matches!(err, BossError::InvalidResolution { .. }));

    let mut body: &[u8] = &junk;
    let err = parser
        .parse("text/plain", &params(), &mut body)
        .await
        .unwrap_err();
    assert!(matches!(err, BossError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_time_series_body() {
    let fx = fixture().await;
    let parser = parser(&fx);

    let raw = pattern(3 * 120);
    let payload = blosc(&raw);
    let mut body: &[u8] = &payload;
    let cutout = parser
        .parse("application/blosc", &params().time("1:4"), &mut body)
        .await
        .unwrap();
    assert_eq!(cutout.data.shape(), &[3, 2, 10, 6]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_parses() {
    let fx = fixture_with(BossConfig::default().with_decode_workers(2)).await;
    let parser = parser(&fx);

    let bodies: Vec<Vec<u8>> = (0..16)
        .map(|i| {
            let raw: Vec<u8> = pattern(120).iter().map(|b| b.wrapping_add(i)).collect();
            blosc(&raw)
        })
        .collect();

    let results = join_all(bodies.iter().map(|payload| {
        let parser = parser.clone();
        async move {
            let mut body: &[u8] = payload;
            parser.parse("application/blosc", &params(), &mut body).await
        }
    }))
    .await;

    for (i, result) in results.into_iter().enumerate() {
        let cutout = result.unwrap();
        let expected: Vec<u8> = pattern(120).iter().map(|b| b.wrapping_add(i as u8)).collect();
        assert_eq!(cutout.data.to_le_bytes(), expected);
    }
}
