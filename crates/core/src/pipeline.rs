//! 경계 trait — 커널 아티팩트와 유저스페이스 제어 루프 사이의 확장 포인트
//!
//! 카운팅 프로그램과 공유 카운터 맵은 외부 로더가 만들어 주는
//! 불투명한 핸들로만 다룹니다.
//!
//! ```text
//! CounterBackend::load() ──▶ LoadedObjects { program, counter_map }
//!                                 │              │
//!                 CounterProgram::attach     CounterSource::read_slots
//!                 CounterProgram::detach
//! CounterBackend::close(objects)
//! ```
//!
//! 실제 구현은 `pktcount-ebpf-engine`의 aya 백엔드이며,
//! 테스트에서는 스크립트 기반 모의 백엔드를 사용합니다.

use std::fmt;
use std::sync::Arc;

use crate::error::PktcountError;
use crate::types::InterfaceRef;

/// 공유 카운터 맵 읽기 핸들
///
/// CPU별 슬롯은 각 CPU만 쓰므로 읽기 측에 동기화가 필요 없습니다.
/// 폴링 루프는 블로킹 풀에서 호출하므로 `Send + Sync`여야 합니다.
pub trait CounterSource: Send + Sync {
    /// 고정 키의 CPU별 슬롯 값을 읽습니다.
    fn read_slots(&self, key: u32) -> Result<Vec<u64>, PktcountError>;
}

/// 검증이 끝난 카운팅 프로그램 핸들
pub trait CounterProgram: Send {
    /// 어태치 결과 핸들 (디태치에 필요)
    type Link: Send;

    /// 프로그램을 인터페이스의 XDP 훅에 어태치합니다.
    ///
    /// 실패 시 아무것도 어태치되지 않은 상태여야 합니다.
    fn attach(&mut self, interface: &InterfaceRef) -> Result<Self::Link, PktcountError>;

    /// 어태치를 해제합니다. 링크당 정확히 한 번 호출됩니다.
    fn detach(&mut self, link: Self::Link) -> Result<(), PktcountError>;
}

/// 로더가 만들어 낸 두 개의 핸들
pub struct LoadedObjects<P> {
    /// 카운팅 프로그램
    pub program: P,
    /// 공유 카운터 맵
    pub counter_map: Arc<dyn CounterSource>,
}

impl<P> fmt::Debug for LoadedObjects<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedObjects").finish_non_exhaustive()
    }
}

/// 카운터 아티팩트 로더 + 프로세스/인터페이스 경계
pub trait CounterBackend: Send {
    /// 로드되는 프로그램 타입
    type Program: CounterProgram;

    /// 백엔드 이름 (로그용)
    fn name(&self) -> &str;

    /// locked memory 한도를 올립니다. 실패는 치명적입니다.
    fn raise_memlock_limit(&mut self) -> Result<(), PktcountError>;

    /// 인터페이스 이름을 인덱스로 해석합니다.
    fn resolve_interface(&self, name: &str) -> Result<InterfaceRef, PktcountError>;

    /// 카운팅 프로그램과 카운터 맵을 로드합니다. 시작 시 한 번 호출됩니다.
    fn load(&mut self) -> Result<LoadedObjects<Self::Program>, PktcountError>;

    /// 로더가 소유한 리소스를 해제합니다. 디태치 이후 정확히 한 번 호출됩니다.
    fn close(&mut self, objects: LoadedObjects<Self::Program>);
}
