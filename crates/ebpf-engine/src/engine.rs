//! 카운터 엔진 — 고정 주기 폴링 및 인터럽트 기반 종료 루프
//!
//! [`CounterEngine`]은 어태치가 끝난 [`CounterSession`]을 받아
//! 주기적으로 카운터 맵을 읽고, 취소 토큰이 발동하면 세션을 정리한 뒤 종료합니다.
//! 빌더 패턴([`CounterEngineBuilder`])으로 생성합니다.
//!
//! # 아키텍처
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌───────────────┐
//! │  XDP Program │────▶│ PerCpuArray │────▶│ CounterEngine │
//! │  (kernel)    │     │ (PKT_COUNT) │     │ (userspace)   │
//! └──────────────┘     └─────────────┘     └───────┬───────┘
//!                                                  │
//!                              ┌───────────────────┼──────────────┐
//!                              ▼                   ▼              ▼
//!                        tracing (info)      CounterStats    mpsc::Sender
//!                        (total per tick)    (delta, rate)   (TickReport)
//! ```
//!
//! # 상태 전이
//! ```text
//! Running ──tick──▶ Running          (읽기 성공/실패 모두)
//! Running ──cancel──▶ ShuttingDown   (detach → close → RunSummary)
//! ```
//!
//! # 사용 예시
//! ```ignore
//! let engine = CounterEngine::builder()
//!     .config(engine_config)
//!     .cancel_token(token.clone())
//!     .build()?;
//!
//! let session = CounterSession::open(backend, &interface)?;
//! let summary = engine.run(session).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pktcount_core::error::{ConfigError, PktcountError, RuntimeError, StartupError};
use pktcount_core::event::TickReport;
use pktcount_core::pipeline::{CounterBackend, CounterSource};

use crate::config::EngineConfig;
use crate::counter::{CounterStats, PerCpuSnapshot};
use crate::session::CounterSession;

/// 폴링 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// 어태치 완료, 폴링 중
    Running,
    /// 인터럽트 수신, 정리 중 (종료 상태)
    ShuttingDown,
}

/// 루프 종료 시 반환되는 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// 대상 인터페이스
    pub interface: String,
    /// 발생한 틱 수
    pub ticks: u64,
    /// 성공한 읽기 수
    pub successful_reads: u64,
    /// 실패한 읽기 수
    pub failed_reads: u64,
    /// 마지막으로 보고한 합계
    pub last_total: Option<u64>,
}

impl From<&CounterStats> for RunSummary {
    fn from(stats: &CounterStats) -> Self {
        Self {
            interface: stats.interface.clone(),
            ticks: stats.ticks,
            successful_reads: stats.successful_reads,
            failed_reads: stats.failed_reads,
            last_total: stats.last_total,
        }
    }
}

/// 카운터 폴링 엔진
///
/// `run()`이 엔진을 소비하므로 종료 후 재시작할 수 없습니다.
pub struct CounterEngine {
    config: EngineConfig,
    report_tx: Option<mpsc::Sender<TickReport>>,
    cancel: CancellationToken,
    state: LoopState,
}

/// 카운터 엔진 빌더
pub struct CounterEngineBuilder {
    config: Option<EngineConfig>,
    report_tx: Option<mpsc::Sender<TickReport>>,
    cancel: Option<CancellationToken>,
}

impl CounterEngineBuilder {
    fn new() -> Self {
        Self {
            config: None,
            report_tx: None,
            cancel: None,
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// 틱 보고를 받을 채널을 지정합니다.
    ///
    /// 채널이 가득 차면 해당 보고는 버려집니다. 루프는 소비자를 기다리지 않습니다.
    pub fn report_sender(mut self, tx: mpsc::Sender<TickReport>) -> Self {
        self.report_tx = Some(tx);
        self
    }

    /// 종료 신호로 사용할 취소 토큰을 지정합니다.
    ///
    /// 지정하지 않으면 새 토큰을 생성하며, [`CounterEngine::cancel_token`]으로 얻을 수 있습니다.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 엔진을 생성합니다.
    ///
    /// # 에러
    /// - `ConfigError::InvalidValue`: 설정이 누락되었거나 유효하지 않은 경우
    pub fn build(self) -> Result<CounterEngine, PktcountError> {
        let config = self.config.ok_or_else(|| ConfigError::InvalidValue {
            field: "engine".to_owned(),
            reason: "config is required".to_owned(),
        })?;
        config.validate()?;

        Ok(CounterEngine {
            config,
            report_tx: self.report_tx,
            cancel: self.cancel.unwrap_or_default(),
            state: LoopState::Running,
        })
    }
}

/// 블로킹 풀에서 실행 중인 카운터 읽기
type ReadTask = JoinHandle<Result<Vec<u64>, PktcountError>>;

/// 한 번의 읽기 결과
enum PollOutcome {
    Read(Result<PerCpuSnapshot, PktcountError>),
    Cancelled,
}

impl CounterEngine {
    /// 빌더를 반환합니다.
    pub fn builder() -> CounterEngineBuilder {
        CounterEngineBuilder::new()
    }

    /// 현재 루프 상태
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// 종료 신호 토큰 (복제본)
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 취소 토큰이 발동할 때까지 카운터를 폴링합니다.
    ///
    /// 종료 시 세션을 디태치·해제하고 요약을 반환합니다.
    /// 읽기 실패는 경고만 남기고 루프를 계속합니다.
    ///
    /// # 에러
    /// - `StartupError::Load`: 세션에 카운터 맵이 없는 경우
    /// - `RuntimeError::Detach`: 종료 시 디태치에 실패한 경우
    pub async fn run<B: CounterBackend>(
        mut self,
        mut session: CounterSession<B>,
    ) -> Result<RunSummary, PktcountError> {
        let source = session
            .counter_map()
            .ok_or_else(|| StartupError::Load("counter map is not available".to_owned()))?;

        let mut stats = CounterStats::new(session.interface().name());
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interface = session.interface().name(),
            poll_interval_ms = duration_millis(period),
            read_timeout_ms = duration_millis(self.config.read_timeout),
            "counter polling started"
        );

        // 제한 시간을 넘긴 읽기는 버리지 않고 다음 틱에서 이어서 기다림
        let mut in_flight: Option<ReadTask> = None;

        while self.state == LoopState::Running {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.state = LoopState::ShuttingDown;
                }
                _ = ticker.tick() => {
                    let tick = stats.begin_tick();
                    match self.poll_once(&source, &mut in_flight).await {
                        PollOutcome::Cancelled => self.state = LoopState::ShuttingDown,
                        PollOutcome::Read(Ok(snapshot)) => {
                            let report = stats.record(&snapshot);
                            self.emit(report);
                        }
                        PollOutcome::Read(Err(e)) => {
                            let timed_out = matches!(
                                e,
                                PktcountError::Runtime(RuntimeError::ReadTimeout { .. })
                            );
                            let consecutive = stats.record_failure(timed_out);
                            if e.is_transient() {
                                warn!(
                                    interface = stats.interface.as_str(),
                                    tick,
                                    consecutive_failures = consecutive,
                                    error = %e,
                                    "counter read failed, retrying on next tick"
                                );
                            } else {
                                error!(
                                    interface = stats.interface.as_str(),
                                    tick,
                                    consecutive_failures = consecutive,
                                    error = %e,
                                    "counter read failed with unexpected error, retrying on next tick"
                                );
                            }
                        }
                    }
                }
            }
        }

        info!(
            interface = session.interface().name(),
            ticks = stats.ticks,
            "interrupt received, shutting down"
        );
        if in_flight.is_some() {
            warn!(
                interface = session.interface().name(),
                "abandoning counter read still in flight"
            );
        }
        session.shutdown()?;

        let summary = RunSummary::from(&stats);
        info!(
            interface = summary.interface.as_str(),
            ticks = summary.ticks,
            successful_reads = summary.successful_reads,
            failed_reads = summary.failed_reads,
            "counter engine stopped"
        );
        Ok(summary)
    }

    /// 카운터를 한 번 읽습니다.
    ///
    /// 읽기는 블로킹 풀에서 `read_timeout` 안에 끝나야 하며,
    /// 진행 중에도 취소 토큰을 우선 확인합니다.
    /// 이전 틱의 읽기가 아직 끝나지 않았다면 새로 시작하지 않고 그 읽기를 다시 기다립니다.
    /// 동시에 진행되는 읽기는 최대 하나입니다.
    async fn poll_once(
        &self,
        source: &Arc<dyn CounterSource>,
        in_flight: &mut Option<ReadTask>,
    ) -> PollOutcome {
        let mut read = match in_flight.take() {
            Some(read) => {
                debug!("previous counter read still in flight, not starting another");
                read
            }
            None => {
                let source = Arc::clone(source);
                let key = self.config.counter_key;
                tokio::task::spawn_blocking(move || source.read_slots(key))
            }
        };

        let waited = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            result = tokio::time::timeout(self.config.read_timeout, &mut read) => Some(result),
        };

        let outcome = match waited {
            None => {
                *in_flight = Some(read);
                return PollOutcome::Cancelled;
            }
            Some(Ok(Ok(Ok(slots)))) => Ok(PerCpuSnapshot::from(slots)),
            Some(Ok(Ok(Err(e)))) => Err(e),
            Some(Ok(Err(join))) => Err(RuntimeError::ReadTask(join.to_string()).into()),
            Some(Err(_)) => {
                *in_flight = Some(read);
                Err(RuntimeError::ReadTimeout {
                    timeout_ms: duration_millis(self.config.read_timeout),
                }
                .into())
            }
        };
        PollOutcome::Read(outcome)
    }

    /// 틱 보고를 로그와 채널로 내보냅니다.
    fn emit(&self, report: TickReport) {
        info!(
            interface = report.interface.as_str(),
            tick = report.tick,
            total = report.total,
            delta = report.delta,
            pps = report.packets_per_second,
            "packets counted"
        );

        if self.config.per_cpu_detail {
            for (cpu, count) in report.per_cpu.iter().enumerate() {
                info!(
                    interface = report.interface.as_str(),
                    tick = report.tick,
                    cpu,
                    count,
                    "per-cpu packet count"
                );
            }
        }

        if let Some(tx) = &self.report_tx {
            match tx.try_send(report) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(report)) => {
                    debug!(tick = report.tick, "report channel full, dropping tick report");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("report channel closed");
                }
            }
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
