//! 카운터 엔진 설정
//!
//! [`EngineConfig`]는 core의 [`CounterConfig`]를 검증된 타입으로 변환한 것입니다.
//! 문자열 필드는 이 시점에 파싱되므로 엔진 내부에서는 실패하지 않습니다.

use std::path::PathBuf;
use std::time::Duration;

use pktcount_core::config::CounterConfig;
use pktcount_core::error::{ConfigError, PktcountError};
use pktcount_core::types::XdpMode;
use pktcount_ebpf_common::COUNTER_KEY;

/// 카운터 엔진 설정
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 대상 인터페이스 이름
    pub interface: String,
    /// 폴링 주기
    pub poll_interval: Duration,
    /// 카운터 읽기 제한 시간
    pub read_timeout: Duration,
    /// XDP 어태치 모드
    pub xdp_mode: XdpMode,
    /// 컴파일된 eBPF 오브젝트 경로
    pub object_path: PathBuf,
    /// CPU별 카운트 로그 출력 여부
    pub per_cpu_detail: bool,
    /// 읽을 카운터 키
    pub counter_key: u32,
}

impl EngineConfig {
    /// core 설정에서 엔진 설정을 생성합니다.
    pub fn from_core(config: &CounterConfig) -> Result<Self, PktcountError> {
        let engine = Self {
            interface: config.interface.clone(),
            poll_interval: config.poll_interval(),
            read_timeout: config.read_timeout(),
            xdp_mode: config.xdp_mode.parse()?,
            object_path: PathBuf::from(&config.object_path),
            per_cpu_detail: config.per_cpu_detail,
            counter_key: COUNTER_KEY,
        };
        engine.validate()?;
        Ok(engine)
    }

    /// 폴링 루프 불변식을 확인합니다.
    pub fn validate(&self) -> Result<(), PktcountError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }
        if self.read_timeout.is_zero() || self.read_timeout >= self.poll_interval {
            return Err(ConfigError::InvalidValue {
                field: "read_timeout".to_owned(),
                reason: "must be greater than 0 and less than poll_interval".to_owned(),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        // CounterConfig 기본값은 항상 유효함
        let base = CounterConfig::default();
        Self {
            interface: base.interface.clone(),
            poll_interval: base.poll_interval(),
            read_timeout: base.read_timeout(),
            xdp_mode: XdpMode::Default,
            object_path: PathBuf::from(&base.object_path),
            per_cpu_detail: base.per_cpu_detail,
            counter_key: COUNTER_KEY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_core_parses_xdp_mode() {
        let mut core = CounterConfig::default();
        core.xdp_mode = "skb".to_owned();
        let config = EngineConfig::from_core(&core).unwrap();
        assert_eq!(config.xdp_mode, XdpMode::Skb);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.counter_key, COUNTER_KEY);
    }

    #[test]
    fn from_core_rejects_unknown_xdp_mode() {
        let mut core = CounterConfig::default();
        core.xdp_mode = "bogus".to_owned();
        assert!(EngineConfig::from_core(&core).is_err());
    }

    #[test]
    fn validate_rejects_timeout_longer_than_interval() {
        let config = EngineConfig {
            poll_interval: Duration::from_millis(100),
            read_timeout: Duration::from_millis(200),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_is_valid() {
        EngineConfig::default().validate().unwrap();
    }
}
