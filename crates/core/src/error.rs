//! 에러 타입 — 도메인별 에러 정의
//!
//! - [`StartupError`]: 시작 단계의 치명적 에러 (프로세스 종료)
//! - [`RuntimeError`]: 폴링 루프 중 발생하는 에러 (대부분 일시적)
//! - [`ConfigError`]: 설정 파싱/검증 에러

/// pktcount 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum PktcountError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 시작 단계 에러 (memlock, 로드, 인터페이스, 어태치)
    #[error("startup error: {0}")]
    Startup(#[from] StartupError),

    /// 런타임 에러 (카운터 읽기, 디태치)
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PktcountError {
    /// 폴링 루프를 중단하지 않아도 되는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Runtime(e) if e.is_transient())
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 시작 단계 에러
///
/// 모두 치명적이며, 이미 획득한 리소스를 해제한 뒤 프로세스를 종료합니다.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// locked memory 한도 조정 실패 (권한 부족 등)
    #[error("failed to raise memlock limit: {0}")]
    MemlockLimit(String),

    /// 카운터 오브젝트 로드 실패
    #[error("failed to load counter objects: {0}")]
    Load(String),

    /// 네트워크 인터페이스를 찾을 수 없음
    #[error("interface '{name}' not found: {reason}")]
    InterfaceNotFound { name: String, reason: String },

    /// XDP 어태치 실패
    #[error("failed to attach counting program to '{interface}': {reason}")]
    Attach { interface: String, reason: String },

    /// 지원하지 않는 플랫폼
    #[error("unsupported platform: {0}")]
    Unsupported(String),
}

/// 런타임 에러
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// eBPF 맵 읽기 실패
    #[error("counter map read failed: {0}")]
    MapRead(String),

    /// 카운터 읽기가 제한 시간 안에 끝나지 않음
    #[error("counter read timed out after {timeout_ms}ms")]
    ReadTimeout { timeout_ms: u64 },

    /// 읽기 태스크 실행 실패 (panic, 취소)
    #[error("counter read task failed: {0}")]
    ReadTask(String),

    /// XDP 디태치 실패
    #[error("failed to detach counting program: {0}")]
    Detach(String),
}

impl RuntimeError {
    /// 다음 틱에서 재시도하면 되는 에러인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::MapRead(_) | Self::ReadTimeout { .. } | Self::ReadTask(_)
        )
    }
}
