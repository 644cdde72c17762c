//! 설정 관리 — pktcount.toml 파싱 및 런타임 설정
//!
//! [`PktcountConfig`]는 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PKTCOUNT_COUNTER_INTERFACE=eth0`, `IFACE=eth0` 형식)
//! 3. 설정 파일 (`pktcount.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), pktcount_core::error::PktcountError> {
//! use pktcount_core::config::PktcountConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PktcountConfig::load("pktcount.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PktcountConfig::parse("[counter]\ninterface = \"eth0\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PktcountError};
use crate::types::{MAX_INTERFACE_NAME_LEN, XdpMode};

/// 인터페이스 이름 단축 환경변수
pub const ENV_IFACE: &str = "IFACE";

/// pktcount 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PktcountConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 카운터 엔진 설정
    #[serde(default)]
    pub counter: CounterConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl PktcountConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PktcountError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PktcountError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PktcountError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PktcountError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PktcountError> {
        toml::from_str(toml_str).map_err(|e| {
            PktcountError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PKTCOUNT_{SECTION}_{FIELD}`
    /// 예: `PKTCOUNT_COUNTER_POLL_INTERVAL_MS=500`
    ///
    /// 인터페이스는 `IFACE`로도 지정할 수 있으며,
    /// `PKTCOUNT_COUNTER_INTERFACE`가 있으면 그쪽이 우선합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PKTCOUNT_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PKTCOUNT_GENERAL_LOG_FORMAT");

        // Counter
        override_string(&mut self.counter.interface, ENV_IFACE);
        override_string(&mut self.counter.interface, "PKTCOUNT_COUNTER_INTERFACE");
        override_parsed(
            &mut self.counter.poll_interval_ms,
            "PKTCOUNT_COUNTER_POLL_INTERVAL_MS",
        );
        override_parsed(
            &mut self.counter.read_timeout_ms,
            "PKTCOUNT_COUNTER_READ_TIMEOUT_MS",
        );
        override_string(&mut self.counter.xdp_mode, "PKTCOUNT_COUNTER_XDP_MODE");
        override_string(&mut self.counter.object_path, "PKTCOUNT_COUNTER_OBJECT_PATH");
        override_parsed(
            &mut self.counter.per_cpu_detail,
            "PKTCOUNT_COUNTER_PER_CPU_DETAIL",
        );

        // Metrics
        override_parsed(&mut self.metrics.enabled, "PKTCOUNT_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "PKTCOUNT_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "PKTCOUNT_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PktcountError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        // interface 검증
        if self.counter.interface.is_empty() {
            return Err(invalid("counter.interface", "must not be empty"));
        }
        if self.counter.interface.len() > MAX_INTERFACE_NAME_LEN {
            return Err(invalid(
                "counter.interface",
                format!("must be at most {MAX_INTERFACE_NAME_LEN} bytes"),
            ));
        }

        // 폴링 주기 / 읽기 타임아웃 검증
        if self.counter.poll_interval_ms == 0 {
            return Err(invalid("counter.poll_interval_ms", "must be greater than 0"));
        }
        if self.counter.read_timeout_ms == 0 {
            return Err(invalid("counter.read_timeout_ms", "must be greater than 0"));
        }
        // 멈춘 읽기가 인터럽트 처리를 한 틱 이상 늦추지 않도록
        if self.counter.read_timeout_ms >= self.counter.poll_interval_ms {
            return Err(invalid(
                "counter.read_timeout_ms",
                "must be less than counter.poll_interval_ms",
            ));
        }

        self.counter
            .xdp_mode
            .parse::<XdpMode>()
            .map_err(PktcountError::Config)?;

        if self.counter.object_path.is_empty() {
            return Err(invalid("counter.object_path", "must not be empty"));
        }

        // metrics 검증
        if self.metrics.enabled {
            if self.metrics.endpoint != "/metrics" {
                return Err(invalid(
                    "metrics.endpoint",
                    "only '/metrics' is supported",
                ));
            }
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must be greater than 0"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> PktcountError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 카운터 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// 카운팅 프로그램을 어태치할 네트워크 인터페이스
    pub interface: String,
    /// 카운터 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 카운터 읽기 제한 시간 (밀리초, 폴링 주기보다 짧아야 함)
    pub read_timeout_ms: u64,
    /// XDP 모드 (default, skb, native, hw)
    pub xdp_mode: String,
    /// 컴파일된 eBPF 오브젝트 경로
    pub object_path: String,
    /// CPU별 카운트도 로그로 출력할지 여부
    pub per_cpu_detail: bool,
}

impl CounterConfig {
    /// 폴링 주기
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 읽기 제한 시간
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            interface: "enp0s3".to_owned(),
            poll_interval_ms: 1000,
            read_timeout_ms: 250,
            xdp_mode: "default".to_owned(),
            object_path: "target/bpfel-unknown-none/release/pktcount-ebpf".to_owned(),
            per_cpu_detail: false,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

/// 파싱 가능한 환경변수만 반영하고, 실패 시 경고 후 기존 값을 유지합니다.
fn override_parsed<T: FromStr>(target: &mut T, env_key: &str) {
    let Ok(val) = std::env::var(env_key) else {
        return;
    };
    match val.parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(
            env_key,
            value = val.as_str(),
            expected = std::any::type_name::<T>(),
            "ignoring unparsable env override"
        ),
    }
}
