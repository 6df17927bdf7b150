//! Integration tests for driver exchanges against an in-memory fake renderer.

use std::time::{Duration, Instant};

use clichart_driver::models::options::ChartRequestOptions;
use clichart_driver::protocol::command::Verb;
use clichart_driver::transport::stream::open_stream;
use clichart_driver::transport::TransportKind;
use clichart_driver::{AppError, ExchangeState, RendererDriver};

use super::test_helpers::{driver_with_fake, spawn_fake_renderer, test_config, Behaviour};

fn csv_chart(output: &str) -> ChartRequestOptions {
    ChartRequestOptions::new()
        .set("inputPath", "/tmp/data.csv")
        .set("columnList", vec![0_i64, 1, 2])
        .set("isCsv", true)
        .set("hasHeader", true)
        .set("outputPath", output)
}

// ── Successful exchanges ────────────────────────────────────────────────────

/// A full chart request reaches the renderer as clear, options in order, go.
#[tokio::test]
async fn generate_chart_sends_full_sequence() {
    let config = test_config(2.0);
    let (mut driver, log, handle) = driver_with_fake(Behaviour::default(), &config).await;

    driver
        .generate_chart(true, &csv_chart("/tmp/chart.png"))
        .await
        .expect("chart must succeed");
    driver.close().await.expect("close must succeed");
    handle.await.expect("fake renderer task");

    let log = log.lock().await;
    assert_eq!(
        log.lines,
        vec![
            "clear",
            "inputpath /tmp/data.csv",
            "columnlist 0,1,2",
            "csv",
            "hasheader",
            "outputpath /tmp/chart.png",
            "go",
            "quit",
        ]
    );
    assert_eq!(log.charts.len(), 1);
    assert!(log.quit);
}

#[tokio::test]
async fn driver_reports_stream_transport() {
    let config = test_config(2.0);
    let (mut driver, _log, _handle) = driver_with_fake(Behaviour::default(), &config).await;
    assert_eq!(driver.transport_kind(), TransportKind::Stream);
    assert_eq!(driver.state(), ExchangeState::Idle);
    assert_eq!(driver.response_timeout(), Duration::from_secs(2));
    driver.close().await.expect("close");
}

/// Without `clear_first`, options from the previous chart still apply.
#[tokio::test]
async fn options_accumulate_without_clear() {
    let config = test_config(2.0);
    let (mut driver, log, _handle) = driver_with_fake(Behaviour::default(), &config).await;

    driver
        .generate_chart(true, &csv_chart("/tmp/first.png"))
        .await
        .expect("first chart");
    driver
        .generate_chart(
            false,
            &ChartRequestOptions::new().set("outputPath", "/tmp/second.png"),
        )
        .await
        .expect("second chart reuses the first chart's input");

    let log = log.lock().await;
    assert_eq!(log.charts.len(), 2);
    assert!(log.charts[1].contains(&"inputpath /tmp/data.csv".to_owned()));
    assert!(log.charts[1].contains(&"outputpath /tmp/second.png".to_owned()));
}

/// With `clear_first`, nothing from the previous chart survives.
#[tokio::test]
async fn clear_first_resets_accumulated_options() {
    let config = test_config(2.0);
    let (mut driver, log, _handle) = driver_with_fake(Behaviour::default(), &config).await;

    driver
        .generate_chart(true, &csv_chart("/tmp/first.png"))
        .await
        .expect("first chart");
    let err = driver
        .generate_chart(
            true,
            &ChartRequestOptions::new().set("outputPath", "/tmp/second.png"),
        )
        .await
        .expect_err("input path was cleared, so go must fail");

    assert!(matches!(err, AppError::Protocol(_)));
    assert_eq!(log.lock().await.charts.len(), 1);
}

/// A cleared chart is rendered from exactly its own options, with nothing
/// carried over from the chart before it.
#[tokio::test]
async fn cleared_chart_holds_only_its_own_options() {
    let config = test_config(2.0);
    let (mut driver, log, _handle) = driver_with_fake(Behaviour::default(), &config).await;

    driver
        .generate_chart(
            true,
            &csv_chart("/tmp/first.png")
                .set("title", "First")
                .set("width", 640_i64),
        )
        .await
        .expect("first chart");
    driver
        .generate_chart(
            true,
            &ChartRequestOptions::new()
                .set("inputPath", "/tmp/other.txt")
                .set("columnList", vec![3_i64])
                .set("outputPath", "/tmp/second.png"),
        )
        .await
        .expect("second chart");

    let log = log.lock().await;
    assert_eq!(log.charts.len(), 2);
    assert_eq!(
        log.charts[1],
        vec![
            "inputpath /tmp/other.txt",
            "columnlist 3",
            "outputpath /tmp/second.png",
        ]
    );
}

#[tokio::test]
async fn set_server_timeout_sends_timeout_command() {
    let config = test_config(2.0);
    let (mut driver, log, _handle) = driver_with_fake(Behaviour::default(), &config).await;

    driver.set_server_timeout(30).await.expect("timeout accepted");

    let log = log.lock().await;
    assert_eq!(log.lines, vec!["timeout 30"]);
    assert_eq!(log.idle_timeout, Some(Duration::from_secs(30)));
}

// ── Rejections ──────────────────────────────────────────────────────────────

/// An unknown key fails before a single byte is written, including `clear`.
#[tokio::test]
async fn unknown_option_sends_nothing() {
    let config = test_config(2.0);
    let (mut driver, log, _handle) = driver_with_fake(Behaviour::default(), &config).await;

    let options = csv_chart("/tmp/chart.png").set("colour", "red");
    let err = driver
        .generate_chart(true, &options)
        .await
        .expect_err("unknown key must fail");

    assert_eq!(err.message(), "Invalid argument: colour");
    assert!(matches!(err, AppError::Config(_)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(log.lock().await.lines.is_empty());
}

/// A non-OK line from the renderer comes back verbatim and stops the
/// sequence at that command.
#[tokio::test]
async fn renderer_failure_line_is_returned_verbatim() {
    let config = test_config(2.0);
    let message = "Error reading chart data: java.io.FileNotFoundException: /tmp/data.csv";
    let behaviour = Behaviour {
        reject: Some((Verb::Go, message.to_owned())),
        ..Behaviour::default()
    };
    let (mut driver, log, _handle) = driver_with_fake(behaviour, &config).await;

    let err = driver
        .generate_chart(true, &csv_chart("/tmp/chart.png"))
        .await
        .expect_err("go must fail");

    match err {
        AppError::Protocol(msg) => assert_eq!(msg, message),
        other => panic!("expected Protocol error, got {other}"),
    }
    assert!(log.lock().await.charts.is_empty());
}

#[tokio::test]
async fn failure_midway_stops_remaining_commands() {
    let config = test_config(2.0);
    let behaviour = Behaviour {
        reject: Some((Verb::ColumnList, "Invalid argument: bad column".to_owned())),
        ..Behaviour::default()
    };
    let (mut driver, log, _handle) = driver_with_fake(behaviour, &config).await;

    driver
        .generate_chart(true, &csv_chart("/tmp/chart.png"))
        .await
        .expect_err("columnlist must fail");

    assert_eq!(
        log.lock().await.lines,
        vec!["clear", "inputpath /tmp/data.csv", "columnlist 0,1,2"]
    );
}

/// The driver is still usable after a server-reported failure.
#[tokio::test]
async fn driver_recovers_after_failure() {
    let config = test_config(2.0);
    let (mut driver, log, _handle) = driver_with_fake(Behaviour::default(), &config).await;

    driver
        .generate_chart(true, &ChartRequestOptions::new())
        .await
        .expect_err("go without paths must fail");
    driver
        .generate_chart(true, &csv_chart("/tmp/chart.png"))
        .await
        .expect("next chart must succeed");

    assert_eq!(log.lock().await.charts.len(), 1);
}

// ── Timeouts ────────────────────────────────────────────────────────────────

/// A silent renderer yields "No response received" after roughly the
/// configured timeout.
#[tokio::test]
async fn silent_renderer_times_out() {
    let config = test_config(0.3);
    let behaviour = Behaviour {
        silent: Some(Verb::Go),
        ..Behaviour::default()
    };
    let (mut driver, _log, _handle) = driver_with_fake(behaviour, &config).await;

    let started = Instant::now();
    let err = driver
        .generate_chart(true, &csv_chart("/tmp/chart.png"))
        .await
        .expect_err("silent go must time out");
    let elapsed = started.elapsed();

    match err {
        AppError::Protocol(msg) => assert_eq!(msg, "No response received"),
        other => panic!("expected Protocol error, got {other}"),
    }
    assert!(elapsed >= Duration::from_millis(300), "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "returned too late: {elapsed:?}");
}

/// A response that arrives after its exchange timed out is discarded
/// before the next command, so the next exchange reads its own answer.
#[tokio::test]
async fn late_response_is_not_read_by_next_exchange() {
    let config = test_config(0.2);
    let behaviour = Behaviour {
        late: Some((
            Verb::Title,
            Duration::from_millis(500),
            "Error: late answer for title".to_owned(),
        )),
        ..Behaviour::default()
    };
    let (mut driver, log, _handle) = driver_with_fake(behaviour, &config).await;

    let err = driver
        .generate_chart(false, &ChartRequestOptions::new().set("title", "Slow"))
        .await
        .expect_err("title answer arrives after the timeout");
    assert_eq!(err.message(), "No response received");

    tokio::time::sleep(Duration::from_millis(700)).await;

    driver
        .generate_chart(true, &csv_chart("/tmp/chart.png"))
        .await
        .expect("stale line must not be taken as the answer to clear");
    assert_eq!(log.lock().await.charts.len(), 1);
}

/// A timeout too large for a `Duration` is a config error, never a panic,
/// even when the session is assembled by hand.
#[tokio::test]
async fn oversized_timeout_is_rejected_at_startup() {
    let (driver_side, renderer_side) = tokio::io::duplex(1024);
    let (_log, _handle) = spawn_fake_renderer(renderer_side, Behaviour::default());
    let config = test_config(1e20);

    let session = open_stream(driver_side, TransportKind::Stream);
    let err = RendererDriver::from_session(session, &config)
        .await
        .expect_err("timeout out of range");
    assert!(matches!(err, AppError::Config(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn missing_greeting_fails_startup() {
    let (driver_side, renderer_side) = tokio::io::duplex(1024);
    let behaviour = Behaviour {
        greet: false,
        ..Behaviour::default()
    };
    let (_log, _handle) = spawn_fake_renderer(renderer_side, behaviour);

    let err = RendererDriver::from_stream(driver_side, &test_config(0.2))
        .await
        .expect_err("startup must fail without a greeting");
    assert_eq!(err.message(), "No response received");
}

#[tokio::test]
async fn greeting_can_be_skipped() {
    let (driver_side, renderer_side) = tokio::io::duplex(1024);
    let behaviour = Behaviour {
        greet: false,
        ..Behaviour::default()
    };
    let (log, _handle) = spawn_fake_renderer(renderer_side, behaviour);

    let mut config = test_config(2.0);
    config.expect_greeting = false;
    let mut driver = RendererDriver::from_stream(driver_side, &config)
        .await
        .expect("startup without greeting");
    driver
        .generate_chart(true, &csv_chart("/tmp/chart.png"))
        .await
        .expect("chart must succeed");
    assert_eq!(log.lock().await.charts.len(), 1);
}

// ── Close ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn close_is_idempotent() {
    let config = test_config(2.0);
    let (mut driver, log, handle) = driver_with_fake(Behaviour::default(), &config).await;

    driver.close().await.expect("first close");
    driver.close().await.expect("second close is a no-op");
    handle.await.expect("fake renderer task");

    assert_eq!(driver.state(), ExchangeState::Closed);
    assert_eq!(log.lock().await.lines, vec!["quit"]);
}

#[tokio::test]
async fn operations_after_close_fail_fast() {
    let config = test_config(2.0);
    let (mut driver, _log, _handle) = driver_with_fake(Behaviour::default(), &config).await;
    driver.close().await.expect("close");

    let err = driver
        .generate_chart(true, &csv_chart("/tmp/chart.png"))
        .await
        .expect_err("closed driver must refuse work");
    match err {
        AppError::Transport(msg) => assert_eq!(msg, "driver is closed"),
        other => panic!("expected Transport error, got {other}"),
    }
}

/// Closing never waits for a response, even from a renderer that has
/// stopped answering.
#[tokio::test]
async fn close_does_not_wait_for_silent_renderer() {
    let config = test_config(5.0);
    let behaviour = Behaviour {
        silent: Some(Verb::Go),
        ..Behaviour::default()
    };
    let (mut driver, _log, _handle) = driver_with_fake(behaviour, &config).await;

    let started = Instant::now();
    driver.close().await.expect("close");
    assert!(started.elapsed() < Duration::from_secs(2));
}
