//! 카운터 세션 — 로드/어태치된 리소스의 단일 소유자
//!
//! [`CounterSession`]은 시작 시 획득한 모든 리소스(백엔드, 인터페이스 참조,
//! 로드된 오브젝트, XDP 링크)를 소유하는 최상위 컨텍스트입니다.
//!
//! # 획득 / 해제 순서
//! ```text
//! memlock ─▶ resolve ─▶ load ─▶ attach        (open)
//!                        close ◀─ detach      (shutdown / Drop)
//! ```
//!
//! `shutdown()`은 멱등이며, 호출되지 않은 채 세션이 drop되면
//! `Drop`이 같은 정리를 수행합니다. 어떤 경로로 종료하든 디태치와 해제는
//! 각각 최대 한 번만 일어납니다.

use std::sync::Arc;

use tracing::{info, warn};

use pktcount_core::error::{PktcountError, StartupError};
use pktcount_core::pipeline::{CounterBackend, CounterProgram, CounterSource, LoadedObjects};
use pktcount_core::types::InterfaceRef;

type LinkOf<B> = <<B as CounterBackend>::Program as CounterProgram>::Link;

/// 어태치된 카운팅 프로그램 세션
pub struct CounterSession<B: CounterBackend> {
    backend: B,
    interface: InterfaceRef,
    objects: Option<LoadedObjects<B::Program>>,
    link: Option<LinkOf<B>>,
}

impl<B: CounterBackend> CounterSession<B> {
    /// 리소스를 순서대로 획득하고 프로그램을 인터페이스에 어태치합니다.
    ///
    /// 중간 단계가 실패하면 그때까지 획득한 리소스를 모두 해제한 뒤 에러를 반환합니다.
    /// 어태치가 실패하면 디태치는 호출되지 않습니다.
    pub fn open(mut backend: B, interface_name: &str) -> Result<Self, PktcountError> {
        backend.raise_memlock_limit()?;

        let interface = backend.resolve_interface(interface_name)?;
        info!(
            interface = interface.name(),
            ifindex = interface.index(),
            "resolved network interface"
        );

        let objects = backend.load()?;
        info!(backend = backend.name(), "loaded counting program");

        // 여기부터는 실패 시 Drop이 close를 호출함
        let mut session = Self {
            backend,
            interface,
            objects: Some(objects),
            link: None,
        };
        session.attach()?;
        Ok(session)
    }

    fn attach(&mut self) -> Result<(), PktcountError> {
        let objects = self
            .objects
            .as_mut()
            .ok_or_else(|| StartupError::Load("counter objects already released".to_owned()))?;

        let link = objects.program.attach(&self.interface)?;
        self.link = Some(link);
        info!(
            interface = self.interface.name(),
            ifindex = self.interface.index(),
            "attached counting program"
        );
        Ok(())
    }

    /// 대상 인터페이스
    pub fn interface(&self) -> &InterfaceRef {
        &self.interface
    }

    /// 현재 어태치 상태
    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }

    /// 공유 카운터 맵 핸들 (해제 후에는 `None`)
    pub fn counter_map(&self) -> Option<Arc<dyn CounterSource>> {
        self.objects
            .as_ref()
            .map(|objects| Arc::clone(&objects.counter_map))
    }

    /// 디태치 후 로더 리소스를 해제합니다.
    ///
    /// 두 번째 호출부터는 아무 일도 하지 않습니다. 디태치가 실패해도
    /// 로더 리소스는 해제되며, 디태치 에러를 반환합니다.
    pub fn shutdown(&mut self) -> Result<(), PktcountError> {
        let detached = match (self.link.take(), self.objects.as_mut()) {
            (Some(link), Some(objects)) => {
                let result = objects.program.detach(link);
                match &result {
                    Ok(()) => info!(
                        interface = self.interface.name(),
                        "detached counting program"
                    ),
                    Err(e) => warn!(
                        interface = self.interface.name(),
                        error = %e,
                        "failed to detach counting program"
                    ),
                }
                result
            }
            _ => Ok(()),
        };

        if let Some(objects) = self.objects.take() {
            self.backend.close(objects);
            info!(backend = self.backend.name(), "released counter objects");
        }

        detached
    }
}

impl<B: CounterBackend> Drop for CounterSession<B> {
    fn drop(&mut self) {
        if self.link.is_none() && self.objects.is_none() {
            return;
        }
        warn!(
            interface = self.interface.name(),
            "counter session dropped without shutdown, releasing resources"
        );
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "cleanup during drop failed");
        }
    }
}
