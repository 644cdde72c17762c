//! 이벤트 — 폴링 루프가 매 틱마다 내보내는 보고
//!
//! [`TickReport`]는 한 번의 성공적인 카운터 읽기 결과입니다.
//! 로그 라인, 메트릭, 그리고 선택적 보고 채널로 전달됩니다.

use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

/// 틱 보고 — 한 시점의 전체 패킷 수 스냅샷
///
/// `total`은 모든 CPU 슬롯의 합이며 누적값입니다 (delta가 아님).
/// 틱을 놓쳐도 다음 보고에서 자연스럽게 보정됩니다.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    /// 읽기 시각
    pub timestamp: SystemTime,
    /// 틱 번호 (1부터 시작, 실패한 틱 포함)
    pub tick: u64,
    /// 대상 인터페이스 이름
    pub interface: String,
    /// 전체 패킷 수 (모든 CPU 합산)
    pub total: u64,
    /// CPU별 패킷 수
    pub per_cpu: Vec<u64>,
    /// 직전 성공 보고 대비 증가량 (감소 시 0)
    pub delta: u64,
    /// 초당 패킷 수 (첫 보고에서는 0)
    pub packets_per_second: f64,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} iface={} total={} delta={} pps={:.1}",
            self.tick, self.interface, self.total, self.delta, self.packets_per_second
        )
    }
}
