#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, PktcountError, RuntimeError, StartupError};

// 설정
pub use config::PktcountConfig;

// 이벤트
pub use event::TickReport;

// 경계 trait
pub use pipeline::{CounterBackend, CounterProgram, CounterSource, LoadedObjects};

// 도메인 타입
pub use types::{InterfaceRef, XdpMode};
