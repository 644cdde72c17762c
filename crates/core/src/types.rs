//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 리눅스 인터페이스 이름 최대 길이 (IFNAMSIZ - 1)
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// 네트워크 인터페이스 참조
///
/// 시작 시 한 번 이름을 인덱스로 해석한 뒤 프로세스 수명 동안 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InterfaceRef {
    name: String,
    index: u32,
}

impl InterfaceRef {
    /// 해석된 인터페이스 참조를 생성합니다.
    pub fn new(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// 인터페이스 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 커널 인터페이스 인덱스
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ifindex {})", self.name, self.index)
    }
}

/// XDP 어태치 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XdpMode {
    /// 커널이 선택 (드라이버 지원 시 native, 아니면 generic)
    #[default]
    Default,
    /// generic XDP (SKB 모드)
    Skb,
    /// 드라이버 native XDP
    Native,
    /// NIC 하드웨어 오프로드
    Hw,
}

impl XdpMode {
    /// 설정 파일에서 사용하는 문자열 표현
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Skb => "skb",
            Self::Native => "native",
            Self::Hw => "hw",
        }
    }

    /// 허용되는 모든 값
    pub const VALID: [&'static str; 4] = ["default", "skb", "native", "hw"];
}

impl fmt::Display for XdpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XdpMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "skb" | "generic" => Ok(Self::Skb),
            "native" | "driver" | "drv" => Ok(Self::Native),
            "hw" | "offload" => Ok(Self::Hw),
            other => Err(ConfigError::InvalidValue {
                field: "counter.xdp_mode".to_owned(),
                reason: format!(
                    "unknown mode '{other}', must be one of: {}",
                    Self::VALID.join(", ")
                ),
            }),
        }
    }
}
