//! 카운터 집계 — PerCpuArray 기반 패킷 수 합산
//!
//! [`PerCpuSnapshot`]은 한 번의 폴링에서 읽은 CPU별 슬롯 값이고,
//! [`CounterStats`]는 연속된 스냅샷으로부터 delta/rate와 읽기 성공·실패를 관리합니다.
//!
//! # 데이터 흐름
//! ```text
//! PerCpuArray (kernel) ──read──▶ PerCpuSnapshot ──record──▶ CounterStats ──▶ TickReport
//!                                (CPU별 값 합산)             (delta, rate 계산)
//! ```

use std::time::{Instant, SystemTime};

use pktcount_core::TickReport;
use pktcount_core::metrics as m;
use serde::Serialize;
use tracing::warn;

/// 한 시점의 CPU별 카운터 값
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerCpuSnapshot {
    slots: Vec<u64>,
}

impl PerCpuSnapshot {
    /// 읽어 온 슬롯 값으로 스냅샷을 생성합니다.
    pub fn new(slots: Vec<u64>) -> Self {
        Self { slots }
    }

    /// CPU별 값
    pub fn slots(&self) -> &[u64] {
        &self.slots
    }

    /// CPU 수 (슬롯 수)
    pub fn cpu_count(&self) -> usize {
        self.slots.len()
    }

    /// 모든 CPU 슬롯의 합
    ///
    /// 슬롯이 없으면 0입니다. u64 범위를 넘으면 `u64::MAX`에서 포화합니다.
    pub fn total(&self) -> u64 {
        self.slots
            .iter()
            .fold(0u64, |acc, &v| acc.saturating_add(v))
    }
}

impl From<Vec<u64>> for PerCpuSnapshot {
    fn from(slots: Vec<u64>) -> Self {
        Self::new(slots)
    }
}

/// 폴링 루프 누적 통계
///
/// `record()`를 호출할 때마다 이전 성공 스냅샷과의 차이(delta)를 시간으로 나누어
/// 초당 패킷 수를 계산합니다.
#[derive(Debug, Clone, Serialize)]
pub struct CounterStats {
    /// 대상 인터페이스 이름
    pub interface: String,
    /// 경과한 틱 수 (실패 포함)
    pub ticks: u64,
    /// 성공한 읽기 수
    pub successful_reads: u64,
    /// 실패한 읽기 수
    pub failed_reads: u64,
    /// 연속 실패 수 (성공 시 0으로 리셋)
    pub consecutive_failures: u64,
    /// 전체 합계가 이전보다 작아진 횟수
    pub regressions: u64,
    /// 마지막 성공 합계
    pub last_total: Option<u64>,
    /// 마지막 성공 읽기 시각 (rate 계산용, 직렬화 제외)
    #[serde(skip)]
    last_read: Option<Instant>,
}

impl CounterStats {
    /// 제로 초기화된 통계를 생성합니다.
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ticks: 0,
            successful_reads: 0,
            failed_reads: 0,
            consecutive_failures: 0,
            regressions: 0,
            last_total: None,
            last_read: None,
        }
    }

    /// 새 틱의 시작을 기록하고 틱 번호를 반환합니다.
    pub fn begin_tick(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }

    /// 성공한 스냅샷을 기록하고 틱 보고를 만듭니다.
    pub fn record(&mut self, snapshot: &PerCpuSnapshot) -> TickReport {
        self.record_at(snapshot, Instant::now())
    }

    fn record_at(&mut self, snapshot: &PerCpuSnapshot, now: Instant) -> TickReport {
        let total = snapshot.total();

        let delta = match self.last_total {
            Some(prev) if total < prev => {
                // 맵 교체나 재로드 외에는 일어나지 않아야 함
                self.regressions += 1;
                metrics::counter!(m::COUNTER_REGRESSIONS_TOTAL).increment(1);
                warn!(
                    interface = self.interface.as_str(),
                    previous = prev,
                    current = total,
                    "aggregate packet count decreased"
                );
                0
            }
            Some(prev) => total - prev,
            None => 0,
        };

        let pps = match self.last_read {
            Some(last) if self.last_total.is_some() => {
                let elapsed = now.duration_since(last).as_secs_f64();
                if elapsed > 0.0 {
                    // 폴링 간 delta는 실용적으로 2^53 미만이므로 정밀도 손실은 무시
                    #[allow(clippy::cast_precision_loss)]
                    let delta = delta as f64;
                    delta / elapsed
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };

        self.successful_reads += 1;
        self.consecutive_failures = 0;
        self.last_total = Some(total);
        self.last_read = Some(now);

        metrics::counter!(m::PACKETS_TOTAL, m::LABEL_INTERFACE => self.interface.clone())
            .absolute(total);
        metrics::gauge!(m::PACKETS_PER_SECOND, m::LABEL_INTERFACE => self.interface.clone())
            .set(pps);
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::CPU_SLOTS).set(snapshot.cpu_count() as f64);
        metrics::counter!(m::COUNTER_READS_TOTAL, m::LABEL_RESULT => "success").increment(1);

        TickReport {
            timestamp: SystemTime::now(),
            tick: self.ticks,
            interface: self.interface.clone(),
            total,
            per_cpu: snapshot.slots().to_vec(),
            delta,
            packets_per_second: pps,
        }
    }

    /// 실패한 읽기를 기록하고 연속 실패 수를 반환합니다.
    pub fn record_failure(&mut self, timed_out: bool) -> u64 {
        self.failed_reads += 1;
        self.consecutive_failures += 1;
        let result = if timed_out { "timeout" } else { "failure" };
        metrics::counter!(m::COUNTER_READS_TOTAL, m::LABEL_RESULT => result).increment(1);
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use proptest::prelude::*;

    // =============================================================================
    // PerCpuSnapshot 테스트
    // =============================================================================

    #[test]
    fn total_sums_all_cpus() {
        let snapshot = PerCpuSnapshot::new(vec![10, 20, 0, 5]);
        assert_eq!(snapshot.total(), 35);
        assert_eq!(snapshot.cpu_count(), 4);
    }

    #[test]
    fn total_of_zero_cpus_is_zero() {
        let snapshot = PerCpuSnapshot::new(Vec::new());
        assert_eq!(snapshot.total(), 0);
        assert_eq!(snapshot.cpu_count(), 0);
    }

    #[test]
    fn single_slot_is_scalar_counter() {
        // 단일 스칼라 카운터는 CPU 하나짜리 배열과 같음
        let snapshot = PerCpuSnapshot::from(vec![42]);
        assert_eq!(snapshot.total(), 42);
    }

    #[test]
    fn total_saturates_instead_of_overflowing() {
        let snapshot = PerCpuSnapshot::new(vec![u64::MAX, 1]);
        assert_eq!(snapshot.total(), u64::MAX);
    }

    proptest! {
        #[test]
        fn total_equals_exact_sum(slots in prop::collection::vec(0u64..=u64::from(u32::MAX), 0..256)) {
            let expected: u128 = slots.iter().map(|&v| u128::from(v)).sum();
            let snapshot = PerCpuSnapshot::new(slots);
            prop_assert_eq!(u128::from(snapshot.total()), expected);
        }

        #[test]
        fn total_is_order_independent(slots in prop::collection::vec(0u64..=u64::from(u32::MAX), 0..64)) {
            let mut reversed = slots.clone();
            reversed.reverse();
            let mut sorted = slots.clone();
            sorted.sort_unstable();

            let total = PerCpuSnapshot::new(slots).total();
            prop_assert_eq!(PerCpuSnapshot::new(reversed).total(), total);
            prop_assert_eq!(PerCpuSnapshot::new(sorted).total(), total);
        }

        #[test]
        fn totals_never_decrease_while_slots_grow(
            initial in prop::collection::vec(0u64..1_000_000, 1..16),
            steps in prop::collection::vec(prop::collection::vec(0u64..1_000, 16), 1..32),
        ) {
            // 각 CPU 슬롯이 단조 증가하면 합계도 단조 증가해야 함
            let mut stats = CounterStats::new("veth-test");
            let mut slots = initial;
            let mut previous = stats.record(&PerCpuSnapshot::new(slots.clone())).total;

            for increments in steps {
                for (slot, inc) in slots.iter_mut().zip(increments) {
                    *slot += inc;
                }
                let report = stats.record(&PerCpuSnapshot::new(slots.clone()));
                prop_assert!(report.total >= previous);
                prop_assert_eq!(report.delta, report.total - previous);
                previous = report.total;
            }
            prop_assert_eq!(stats.regressions, 0);
        }
    }

    // =============================================================================
    // CounterStats 테스트
    // =============================================================================

    #[test]
    fn new_stats_are_zeroed() {
        let stats = CounterStats::new("eth0");
        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.successful_reads, 0);
        assert_eq!(stats.failed_reads, 0);
        assert!(stats.last_total.is_none());
        assert!(stats.last_read.is_none());
    }

    #[test]
    fn first_record_has_zero_delta_and_rate() {
        let mut stats = CounterStats::new("veth-test");
        stats.begin_tick();
        let report = stats.record(&PerCpuSnapshot::new(vec![10, 20, 0, 5]));

        assert_eq!(report.tick, 1);
        assert_eq!(report.total, 35);
        assert_eq!(report.delta, 0);
        assert_eq!(report.packets_per_second, 0.0);
        assert_eq!(report.per_cpu, vec![10, 20, 0, 5]);
        assert_eq!(stats.last_total, Some(35));
    }

    #[test]
    fn second_record_calculates_delta_and_rate() {
        let mut stats = CounterStats::new("veth-test");
        let start = Instant::now();

        stats.begin_tick();
        stats.record_at(&PerCpuSnapshot::new(vec![10, 20, 0, 5]), start);
        stats.begin_tick();
        let report = stats.record_at(
            &PerCpuSnapshot::new(vec![12, 20, 0, 7]),
            start + Duration::from_secs(2),
        );

        assert_eq!(report.tick, 2);
        assert_eq!(report.total, 39);
        assert_eq!(report.delta, 4);
        assert!((report.packets_per_second - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn regression_clamps_delta_and_is_counted() {
        let mut stats = CounterStats::new("eth0");
        let start = Instant::now();
        stats.record_at(&PerCpuSnapshot::new(vec![100]), start);
        let report = stats.record_at(&PerCpuSnapshot::new(vec![40]), start + Duration::from_secs(1));

        // 감소 시 delta는 0, 누적값은 현재 값
        assert_eq!(report.delta, 0);
        assert_eq!(report.total, 40);
        assert_eq!(report.packets_per_second, 0.0);
        assert_eq!(stats.regressions, 1);
    }

    #[test]
    fn zero_elapsed_time_skips_rate() {
        let mut stats = CounterStats::new("eth0");
        let now = Instant::now();
        stats.record_at(&PerCpuSnapshot::new(vec![1]), now);
        let report = stats.record_at(&PerCpuSnapshot::new(vec![5]), now);
        assert_eq!(report.delta, 4);
        assert_eq!(report.packets_per_second, 0.0);
    }

    #[test]
    fn failure_then_success_resets_consecutive_failures() {
        let mut stats = CounterStats::new("eth0");
        assert_eq!(stats.record_failure(false), 1);
        assert_eq!(stats.record_failure(true), 2);
        assert_eq!(stats.failed_reads, 2);

        stats.record(&PerCpuSnapshot::new(vec![3]));
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.successful_reads, 1);
        assert_eq!(stats.failed_reads, 2);
    }

    #[test]
    fn stats_serialize_without_read_instant() {
        let mut stats = CounterStats::new("veth-test");
        stats.begin_tick();
        stats.record(&PerCpuSnapshot::new(vec![10, 20, 0, 5]));

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["interface"], "veth-test");
        assert_eq!(json["last_total"], 35);
        assert!(json.get("last_read").is_none());
    }

    #[test]
    fn rate_after_failure_uses_last_successful_read() {
        let mut stats = CounterStats::new("eth0");
        let start = Instant::now();
        stats.record_at(&PerCpuSnapshot::new(vec![0]), start);
        stats.record_failure(false);
        let report = stats.record_at(&PerCpuSnapshot::new(vec![20]), start + Duration::from_secs(2));

        // 실패한 틱을 건너뛰어도 스냅샷 기반이므로 자연히 보정됨
        assert_eq!(report.delta, 20);
        assert!((report.packets_per_second - 10.0).abs() < f64::EPSILON);
    }
}
