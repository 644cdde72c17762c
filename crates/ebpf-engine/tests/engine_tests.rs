//! 통합 테스트 -- 어태치 → 폴링 → 인터럽트 → 정리 플로우 검증
//!
//! 모의 백엔드로 세션을 열고 실제 tokio 타이머로 루프를 돌려
//! 합계 보고, 실패 복구, 정리 횟수를 확인합니다.

use std::time::{Duration, Instant};

use pktcount_core::error::{PktcountError, RuntimeError, StartupError};
use pktcount_ebpf_engine::testing::MockBackend;
use pktcount_ebpf_engine::{CounterEngine, CounterSession, EngineConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const IFACE: &str = "veth-test";

fn config(poll_ms: u64, timeout_ms: u64) -> EngineConfig {
    EngineConfig {
        interface: IFACE.to_owned(),
        poll_interval: Duration::from_millis(poll_ms),
        read_timeout: Duration::from_millis(timeout_ms),
        per_cpu_detail: true,
        ..EngineConfig::default()
    }
}

fn engine(
    config: EngineConfig,
    token: &CancellationToken,
) -> (CounterEngine, mpsc::Receiver<pktcount_core::TickReport>) {
    let (tx, rx) = mpsc::channel(16);
    let engine = CounterEngine::builder()
        .config(config)
        .report_sender(tx)
        .cancel_token(token.clone())
        .build()
        .unwrap();
    (engine, rx)
}

// =============================================================================
// 정상 플로우
// =============================================================================

#[tokio::test]
async fn two_ticks_then_interrupt_reports_totals_and_cleans_up() {
    let backend = MockBackend::new()
        .with_interface(IFACE, 4)
        .with_reads([Ok(vec![10, 20, 0, 5]), Ok(vec![12, 20, 0, 7])]);
    let calls = backend.calls();
    let session = CounterSession::open(backend, IFACE).unwrap();

    let token = CancellationToken::new();
    let (engine, mut rx) = engine(config(30, 15), &token);
    let handle = tokio::spawn(engine.run(session));

    let tick1 = rx.recv().await.unwrap();
    assert_eq!(tick1.tick, 1);
    assert_eq!(tick1.total, 35);
    assert_eq!(tick1.per_cpu, vec![10, 20, 0, 5]);

    let tick2 = rx.recv().await.unwrap();
    assert_eq!(tick2.tick, 2);
    assert_eq!(tick2.total, 39);
    assert_eq!(tick2.delta, 4);

    token.cancel();
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.interface, IFACE);
    assert!(summary.ticks >= 2);
    assert_eq!(summary.failed_reads, 0);
    assert_eq!(summary.last_total, Some(39));
    assert_eq!(calls.attach(), 1);
    assert_eq!(calls.detach(), 1);
    assert_eq!(calls.close(), 1);
}

#[tokio::test]
async fn totals_never_decrease_across_ticks() {
    let reads: Vec<Result<Vec<u64>, String>> = (0..6u64)
        .map(|i| Ok(vec![i * 3, i, 0, i * 7]))
        .collect();
    let backend = MockBackend::new().with_interface(IFACE, 4).with_reads(reads);
    let session = CounterSession::open(backend, IFACE).unwrap();

    let token = CancellationToken::new();
    let (engine, mut rx) = engine(config(20, 10), &token);
    let handle = tokio::spawn(engine.run(session));

    let mut previous = 0;
    for _ in 0..6 {
        let report = rx.recv().await.unwrap();
        assert!(report.total >= previous);
        previous = report.total;
    }
    token.cancel();
    handle.await.unwrap().unwrap();
    assert_eq!(previous, 5 * 11);
}

// =============================================================================
// 읽기 실패
// =============================================================================

#[tokio::test]
async fn failed_read_is_skipped_and_next_tick_succeeds() {
    let backend = MockBackend::new().with_interface(IFACE, 4).with_reads([
        Ok(vec![1, 1]),
        Err("map removed".to_owned()),
        Ok(vec![4, 4]),
    ]);
    let calls = backend.calls();
    let session = CounterSession::open(backend, IFACE).unwrap();

    let token = CancellationToken::new();
    let (engine, mut rx) = engine(config(20, 10), &token);
    let handle = tokio::spawn(engine.run(session));

    let first = rx.recv().await.unwrap();
    let after_failure = rx.recv().await.unwrap();
    token.cancel();
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(first.tick, 1);
    assert_eq!(first.total, 2);
    // 실패한 틱 2를 건너뛰고 틱 3에서 회복
    assert_eq!(after_failure.tick, 3);
    assert_eq!(after_failure.total, 8);
    assert_eq!(after_failure.delta, 6);
    assert_eq!(summary.failed_reads, 1);
    assert_eq!(calls.detach(), 1);
}

#[tokio::test]
async fn slow_read_result_is_collected_on_next_tick() {
    // 틱 100ms, 제한 60ms, 읽기 120ms: 첫 틱은 시간 초과, 두 번째 틱에서 결과 수거
    let backend = MockBackend::new()
        .with_interface(IFACE, 4)
        .with_reads([Ok(vec![9])])
        .with_read_delay(Duration::from_millis(120));
    let calls = backend.calls();
    let session = CounterSession::open(backend, IFACE).unwrap();

    let token = CancellationToken::new();
    let (engine, mut rx) = engine(config(100, 60), &token);
    let handle = tokio::spawn(engine.run(session));

    let report = rx.recv().await.expect("late read is reported");
    token.cancel();
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(report.total, 9);
    assert_eq!(report.tick, 2);
    assert_eq!(summary.failed_reads, 1);
    assert_eq!(calls.reads(), 1, "timed-out read is awaited again, not restarted");
}

#[tokio::test]
async fn stuck_read_is_never_duplicated() {
    let backend = MockBackend::new()
        .with_interface(IFACE, 4)
        .with_read_delay(Duration::from_millis(600));
    let calls = backend.calls();
    let session = CounterSession::open(backend, IFACE).unwrap();

    let token = CancellationToken::new();
    let (engine, _rx) = engine(config(20, 10), &token);
    let handle = tokio::spawn(engine.run(session));

    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();
    let summary = handle.await.unwrap().unwrap();

    // 모든 틱이 시간 초과로 기록되지만 블로킹 읽기는 하나뿐
    assert!(summary.failed_reads >= 3);
    assert_eq!(summary.successful_reads, 0);
    assert_eq!(calls.reads(), 1);
    assert_eq!(calls.detach(), 1);
}

// =============================================================================
// 종료
// =============================================================================

#[tokio::test]
async fn interrupt_during_stuck_read_is_served_promptly() {
    let backend = MockBackend::new()
        .with_interface(IFACE, 4)
        .with_read_delay(Duration::from_millis(400));
    let calls = backend.calls();
    let session = CounterSession::open(backend, IFACE).unwrap();

    let token = CancellationToken::new();
    let (engine, _rx) = engine(config(50, 40), &token);
    let handle = tokio::spawn(engine.run(session));

    // 첫 틱(50ms)의 읽기가 진행 중일 때 인터럽트
    tokio::time::sleep(Duration::from_millis(60)).await;
    let cancelled_at = Instant::now();
    token.cancel();
    handle.await.unwrap().unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_millis(50));
    assert_eq!(calls.detach(), 1);
    assert_eq!(calls.close(), 1);
}

#[tokio::test]
async fn detach_failure_is_returned_after_release() {
    let backend = MockBackend::new()
        .with_interface(IFACE, 4)
        .fail_detach("link vanished");
    let calls = backend.calls();
    let session = CounterSession::open(backend, IFACE).unwrap();

    let token = CancellationToken::new();
    let (engine, _rx) = engine(config(30, 15), &token);
    token.cancel();

    let err = engine.run(session).await.unwrap_err();
    assert!(matches!(
        err,
        PktcountError::Runtime(RuntimeError::Detach(_))
    ));
    assert_eq!(calls.detach(), 1);
    assert_eq!(calls.close(), 1);
}

#[test]
fn attach_failure_never_detaches_and_never_ticks() {
    let backend = MockBackend::new()
        .with_interface(IFACE, 4)
        .fail_attach("permission denied");
    let calls = backend.calls();

    let err = CounterSession::open(backend, IFACE).err().unwrap();
    assert!(matches!(
        err,
        PktcountError::Startup(StartupError::Attach { .. })
    ));
    assert_eq!(calls.attach(), 1);
    assert_eq!(calls.detach(), 0);
    assert_eq!(calls.close(), 1);
    assert_eq!(calls.reads(), 0);
}

#[test]
fn load_failure_releases_nothing() {
    let backend = MockBackend::new()
        .with_interface(IFACE, 4)
        .fail_load("invalid ELF");
    let calls = backend.calls();

    assert!(CounterSession::open(backend, IFACE).is_err());
    assert_eq!(calls.attach(), 0);
    assert_eq!(calls.close(), 0);
}

#[test]
fn repeated_shutdown_detaches_once() {
    let backend = MockBackend::new().with_interface(IFACE, 4);
    let calls = backend.calls();

    let mut session = CounterSession::open(backend, IFACE).unwrap();
    for _ in 0..3 {
        session.shutdown().unwrap();
    }
    drop(session);

    assert_eq!(calls.detach(), 1);
    assert_eq!(calls.close(), 1);
}
