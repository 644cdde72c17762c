//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `pktcount_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 인터페이스 레이블 키
pub const LABEL_INTERFACE: &str = "interface";

/// 결과 레이블 키 (success, failure, timeout)
pub const LABEL_RESULT: &str = "result";

// ─── 카운터 엔진 메트릭 ────────────────────────────────────────────

/// 인터페이스를 통과한 전체 패킷 수 (counter, absolute)
pub const PACKETS_TOTAL: &str = "pktcount_packets_total";

/// 초당 패킷 수 (gauge)
pub const PACKETS_PER_SECOND: &str = "pktcount_packets_per_second";

/// 카운터 맵 읽기 시도 수 (counter, label: result)
pub const COUNTER_READS_TOTAL: &str = "pktcount_counter_reads_total";

/// 카운터 맵이 보고한 CPU 슬롯 수 (gauge)
pub const CPU_SLOTS: &str = "pktcount_cpu_slots";

/// 전체 합계가 이전보다 작아진 횟수 (counter)
pub const COUNTER_REGRESSIONS_TOTAL: &str = "pktcount_counter_regressions_total";

/// 모든 메트릭 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다. 레코더가 없어도 panic하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        PACKETS_TOTAL,
        "Total packets observed by the XDP counting program"
    );
    describe_gauge!(PACKETS_PER_SECOND, "Packets per second between polls");
    describe_counter!(
        COUNTER_READS_TOTAL,
        "Counter map reads by result (success, failure, timeout)"
    );
    describe_gauge!(CPU_SLOTS, "Number of per-CPU slots in the counter map");
    describe_counter!(
        COUNTER_REGRESSIONS_TOTAL,
        "Polls where the aggregate total was lower than the previous one"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn metric_names_use_prefix() {
        for name in [
            PACKETS_TOTAL,
            PACKETS_PER_SECOND,
            COUNTER_READS_TOTAL,
            CPU_SLOTS,
            COUNTER_REGRESSIONS_TOTAL,
        ] {
            assert!(name.starts_with("pktcount_"), "{name} missing prefix");
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in [PACKETS_TOTAL, COUNTER_READS_TOTAL, COUNTER_REGRESSIONS_TOTAL] {
            assert!(name.ends_with("_total"), "{name} should end with _total");
        }
    }
}
