//! eBPF 커널/유저스페이스 공유 상수
//!
//! 커널 프로그램(`pktcount-ebpf`)과 유저스페이스 로더가 같은 이름과 키를
//! 사용하도록 보장합니다. `#![no_std]` 환경에서 사용 가능합니다.
//!
//! # 맵 타입 선택 근거
//! - **PerCpuArray** (`PKT_COUNT`): CPU별 독립 카운터 — 각 CPU가 자기 슬롯만
//!   증가시키므로 원자 연산이나 락이 필요 없습니다.
//!   유저스페이스에서 모든 CPU의 값을 합산하여 전체 패킷 수를 계산합니다.

#![no_std]

/// 패킷 카운터 PerCpuArray 맵 이름
pub const MAP_PKT_COUNT: &str = "PKT_COUNT";

/// 패킷 카운팅 XDP 프로그램 이름
pub const PROGRAM_COUNT_PACKETS: &str = "count_packets";

/// 추적하는 단일 논리 카운터의 키
pub const COUNTER_KEY: u32 = 0;

/// PerCpuArray 최대 엔트리 수
pub const COUNTER_MAX_ENTRIES: u32 = 1;

// 커널 쪽 조회가 항상 성공하려면 키가 맵 범위 안이어야 함
const _: () = assert!(COUNTER_KEY < COUNTER_MAX_ENTRIES);
