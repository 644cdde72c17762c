#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//! - [`config`]: core 설정을 검증된 엔진 설정으로 변환
//! - [`counter`]: CPU별 슬롯 합산과 delta/rate 통계
//! - [`session`]: CounterSession — memlock, 로드, 어태치, 디태치, 해제의 단일 소유자
//! - [`engine`]: CounterEngine — 고정 주기 폴링과 취소 토큰 기반 종료 루프
//! - [`loader`]: aya 백엔드 (Linux 전용, 다른 플랫폼은 Unsupported)
//!
//! # 공유 상수
//! 커널/유저스페이스 공유 상수는 [`pktcount_ebpf_common`] 크레이트에 정의되어 있습니다.

pub mod config;
pub mod counter;
pub mod engine;
pub mod loader;
pub mod session;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// --- 주요 타입 re-export ---

// 엔진
pub use engine::{CounterEngine, CounterEngineBuilder, LoopState, RunSummary};

// 세션
pub use session::CounterSession;

// 설정
pub use config::EngineConfig;

// 집계
pub use counter::{CounterStats, PerCpuSnapshot};

// 백엔드
pub use loader::AyaBackend;

// 공유 상수 (커널/유저스페이스 공통)
pub use pktcount_ebpf_common;
