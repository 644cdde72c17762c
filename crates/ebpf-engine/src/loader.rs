//! aya 기반 카운터 백엔드
//!
//! 컴파일된 eBPF 오브젝트 파일을 로드하고 `count_packets` XDP 프로그램과
//! `PKT_COUNT` PerCpuArray 맵을 [`CounterBackend`] 경계 뒤로 감춥니다.
//!
//! # Linux 전용
//! aya는 Linux에서만 동작합니다. 다른 플랫폼에서는 모든 시작 단계가
//! `StartupError::Unsupported`를 반환합니다.

use std::path::PathBuf;

use pktcount_core::types::XdpMode;
#[cfg(not(target_os = "linux"))]
use pktcount_core::{
    error::{PktcountError, StartupError},
    pipeline::{CounterBackend, CounterProgram, LoadedObjects},
    types::InterfaceRef,
};

#[cfg(target_os = "linux")]
pub use linux::{AyaCounterMap, AyaProgram};

/// aya 로더 백엔드
#[derive(Debug, Clone)]
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub struct AyaBackend {
    object_path: PathBuf,
    xdp_mode: XdpMode,
}

impl AyaBackend {
    /// 오브젝트 파일 경로와 어태치 모드로 백엔드를 생성합니다.
    pub fn new(object_path: impl Into<PathBuf>, xdp_mode: XdpMode) -> Self {
        Self {
            object_path: object_path.into(),
            xdp_mode,
        }
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::ffi::CString;
    use std::io;
    use std::sync::Arc;

    use aya::Ebpf;
    use aya::maps::{MapData, PerCpuArray};
    use aya::programs::xdp::XdpLinkId;
    use aya::programs::{Xdp, XdpFlags};
    use tracing::debug;

    use pktcount_core::error::{PktcountError, RuntimeError, StartupError};
    use pktcount_core::pipeline::{CounterBackend, CounterProgram, CounterSource, LoadedObjects};
    use pktcount_core::types::{InterfaceRef, XdpMode};
    use pktcount_ebpf_common::{MAP_PKT_COUNT, PROGRAM_COUNT_PACKETS};

    use super::AyaBackend;

    /// 로드된 aya 오브젝트와 XDP 어태치 플래그
    pub struct AyaProgram {
        bpf: Ebpf,
        flags: XdpFlags,
    }

    impl AyaProgram {
        fn xdp(&mut self) -> Result<&mut Xdp, String> {
            self.bpf
                .program_mut(PROGRAM_COUNT_PACKETS)
                .ok_or_else(|| format!("program {PROGRAM_COUNT_PACKETS} not found"))?
                .try_into()
                .map_err(|e| format!("program {PROGRAM_COUNT_PACKETS} has wrong type: {e}"))
        }
    }

    impl CounterProgram for AyaProgram {
        type Link = XdpLinkId;

        fn attach(&mut self, interface: &InterfaceRef) -> Result<XdpLinkId, PktcountError> {
            let flags = self.flags;
            let attach_err = |reason: String| StartupError::Attach {
                interface: interface.name().to_owned(),
                reason,
            };
            let program = self.xdp().map_err(attach_err)?;
            program
                .attach_to_if_index(interface.index(), flags)
                .map_err(|e| attach_err(e.to_string()).into())
        }

        fn detach(&mut self, link: XdpLinkId) -> Result<(), PktcountError> {
            let program = self.xdp().map_err(RuntimeError::Detach)?;
            program
                .detach(link)
                .map_err(|e| RuntimeError::Detach(e.to_string()).into())
        }
    }

    /// `PKT_COUNT` PerCpuArray 읽기 핸들
    pub struct AyaCounterMap(PerCpuArray<MapData, u64>);

    impl CounterSource for AyaCounterMap {
        fn read_slots(&self, key: u32) -> Result<Vec<u64>, PktcountError> {
            let values = self
                .0
                .get(&key, 0)
                .map_err(|e| RuntimeError::MapRead(e.to_string()))?;
            Ok(values.iter().copied().collect())
        }
    }

    fn xdp_flags(mode: XdpMode) -> XdpFlags {
        match mode {
            XdpMode::Default => XdpFlags::default(),
            XdpMode::Skb => XdpFlags::SKB_MODE,
            XdpMode::Native => XdpFlags::DRV_MODE,
            XdpMode::Hw => XdpFlags::HW_MODE,
        }
    }

    impl CounterBackend for AyaBackend {
        type Program = AyaProgram;

        fn name(&self) -> &str {
            "aya"
        }

        fn raise_memlock_limit(&mut self) -> Result<(), PktcountError> {
            // memcg 기반 계정이 없는 구형 커널에서 맵 생성에 필요
            let rlim = libc::rlimit {
                rlim_cur: libc::RLIM_INFINITY,
                rlim_max: libc::RLIM_INFINITY,
            };
            // SAFETY: 유효한 rlimit 구조체의 포인터만 전달함
            let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
            if ret != 0 {
                return Err(StartupError::MemlockLimit(io::Error::last_os_error().to_string()).into());
            }
            debug!("raised memlock limit to infinity");
            Ok(())
        }

        fn resolve_interface(&self, name: &str) -> Result<InterfaceRef, PktcountError> {
            let not_found = |reason: String| StartupError::InterfaceNotFound {
                name: name.to_owned(),
                reason,
            };
            let ifname = CString::new(name).map_err(|e| not_found(e.to_string()))?;
            // SAFETY: ifname은 NUL 종료 문자열이며 호출 동안 살아 있음
            let index = unsafe { libc::if_nametoindex(ifname.as_ptr()) };
            if index == 0 {
                return Err(not_found(io::Error::last_os_error().to_string()).into());
            }
            Ok(InterfaceRef::new(name, index))
        }

        fn load(&mut self) -> Result<LoadedObjects<AyaProgram>, PktcountError> {
            let load_err = StartupError::Load;

            let mut bpf = Ebpf::load_file(&self.object_path).map_err(|e| {
                load_err(format!(
                    "failed to load {}: {e}",
                    self.object_path.display()
                ))
            })?;

            let program: &mut Xdp = bpf
                .program_mut(PROGRAM_COUNT_PACKETS)
                .ok_or_else(|| load_err(format!("program {PROGRAM_COUNT_PACKETS} not found")))?
                .try_into()
                .map_err(|e| load_err(format!("program {PROGRAM_COUNT_PACKETS} is not XDP: {e}")))?;
            program
                .load()
                .map_err(|e| load_err(format!("verifier rejected {PROGRAM_COUNT_PACKETS}: {e}")))?;

            let map = bpf
                .take_map(MAP_PKT_COUNT)
                .ok_or_else(|| load_err(format!("map {MAP_PKT_COUNT} not found")))?;
            let counter = PerCpuArray::<MapData, u64>::try_from(map)
                .map_err(|e| load_err(format!("map {MAP_PKT_COUNT} has wrong type: {e}")))?;

            debug!(
                object = %self.object_path.display(),
                program = PROGRAM_COUNT_PACKETS,
                map = MAP_PKT_COUNT,
                "counter objects loaded"
            );

            Ok(LoadedObjects {
                program: AyaProgram {
                    bpf,
                    flags: xdp_flags(self.xdp_mode),
                },
                counter_map: Arc::new(AyaCounterMap(counter)),
            })
        }

        fn close(&mut self, objects: LoadedObjects<AyaProgram>) {
            // Ebpf drop 시 프로그램 fd와 남은 링크가 정리됨
            drop(objects);
            debug!("counter objects closed");
        }
    }

}

/// 비-Linux 플레이스홀더 프로그램
#[cfg(not(target_os = "linux"))]
pub struct AyaProgram;

#[cfg(not(target_os = "linux"))]
fn unsupported() -> PktcountError {
    StartupError::Unsupported("XDP counting requires Linux".to_owned()).into()
}

#[cfg(not(target_os = "linux"))]
impl CounterProgram for AyaProgram {
    type Link = ();

    fn attach(&mut self, _interface: &InterfaceRef) -> Result<(), PktcountError> {
        Err(unsupported())
    }

    fn detach(&mut self, _link: ()) -> Result<(), PktcountError> {
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl CounterBackend for AyaBackend {
    type Program = AyaProgram;

    fn name(&self) -> &str {
        "aya"
    }

    fn raise_memlock_limit(&mut self) -> Result<(), PktcountError> {
        Err(unsupported())
    }

    fn resolve_interface(&self, _name: &str) -> Result<InterfaceRef, PktcountError> {
        Err(unsupported())
    }

    fn load(&mut self) -> Result<LoadedObjects<AyaProgram>, PktcountError> {
        Err(unsupported())
    }

    fn close(&mut self, _objects: LoadedObjects<AyaProgram>) {}
}
