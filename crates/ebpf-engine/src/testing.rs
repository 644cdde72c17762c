//! 테스트용 모의 백엔드
//!
//! 커널 없이 세션과 폴링 루프를 검증하기 위한 [`MockBackend`]입니다.
//! 각 경계 호출 횟수는 [`CallLog`]에 기록되어, 디태치·해제가 정확히
//! 한 번 일어났는지 확인할 수 있습니다.
//!
//! ```ignore
//! let backend = MockBackend::new()
//!     .with_interface("veth-test", 7)
//!     .with_reads([Ok(vec![10, 20, 0, 5]), Ok(vec![12, 20, 0, 7])]);
//! let calls = backend.calls();
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pktcount_core::error::{PktcountError, RuntimeError, StartupError};
use pktcount_core::pipeline::{CounterBackend, CounterProgram, CounterSource, LoadedObjects};
use pktcount_core::types::InterfaceRef;

/// 경계 호출 횟수 기록
#[derive(Debug, Default)]
pub struct CallLog {
    memlock: AtomicUsize,
    resolve: AtomicUsize,
    load: AtomicUsize,
    attach: AtomicUsize,
    detach: AtomicUsize,
    close: AtomicUsize,
    reads: AtomicUsize,
}

impl CallLog {
    pub fn memlock(&self) -> usize {
        self.memlock.load(Ordering::SeqCst)
    }

    pub fn resolve(&self) -> usize {
        self.resolve.load(Ordering::SeqCst)
    }

    pub fn load(&self) -> usize {
        self.load.load(Ordering::SeqCst)
    }

    pub fn attach(&self) -> usize {
        self.attach.load(Ordering::SeqCst)
    }

    pub fn detach(&self) -> usize {
        self.detach.load(Ordering::SeqCst)
    }

    pub fn close(&self) -> usize {
        self.close.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// 스크립트된 읽기 결과
///
/// 큐가 비면 마지막 결과를 반복합니다. 한 번도 설정하지 않았다면 빈 슬롯을 반환합니다.
#[derive(Debug)]
struct ReadScript {
    queue: VecDeque<Result<Vec<u64>, String>>,
    last: Result<Vec<u64>, String>,
}

/// 모의 카운터 맵
#[derive(Debug)]
pub struct MockCounterMap {
    script: Mutex<ReadScript>,
    delay: Option<Duration>,
    calls: Arc<CallLog>,
}

impl CounterSource for MockCounterMap {
    fn read_slots(&self, _key: u32) -> Result<Vec<u64>, PktcountError> {
        CallLog::bump(&self.calls.reads);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let mut script = self
            .script
            .lock()
            .map_err(|e| RuntimeError::MapRead(e.to_string()))?;
        if let Some(next) = script.queue.pop_front() {
            script.last = next;
        }
        script.last.clone().map_err(|e| RuntimeError::MapRead(e).into())
    }
}

/// 모의 카운팅 프로그램
#[derive(Debug)]
pub struct MockProgram {
    calls: Arc<CallLog>,
    attach_error: Option<String>,
    detach_error: Option<String>,
    next_link: u64,
}

/// 모의 어태치 링크
#[derive(Debug, PartialEq, Eq)]
pub struct MockLink(pub u64);

impl CounterProgram for MockProgram {
    type Link = MockLink;

    fn attach(&mut self, interface: &InterfaceRef) -> Result<MockLink, PktcountError> {
        CallLog::bump(&self.calls.attach);
        if let Some(reason) = &self.attach_error {
            return Err(StartupError::Attach {
                interface: interface.name().to_owned(),
                reason: reason.clone(),
            }
            .into());
        }
        self.next_link += 1;
        Ok(MockLink(self.next_link))
    }

    fn detach(&mut self, _link: MockLink) -> Result<(), PktcountError> {
        CallLog::bump(&self.calls.detach);
        match &self.detach_error {
            Some(reason) => Err(RuntimeError::Detach(reason.clone()).into()),
            None => Ok(()),
        }
    }
}

/// 스크립트 기반 모의 백엔드
#[derive(Debug)]
pub struct MockBackend {
    calls: Arc<CallLog>,
    interfaces: HashMap<String, u32>,
    reads: VecDeque<Result<Vec<u64>, String>>,
    read_delay: Option<Duration>,
    memlock_error: Option<String>,
    load_error: Option<String>,
    attach_error: Option<String>,
    detach_error: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(CallLog::default()),
            interfaces: HashMap::new(),
            reads: VecDeque::new(),
            read_delay: None,
            memlock_error: None,
            load_error: None,
            attach_error: None,
            detach_error: None,
        }
    }

    /// 호출 기록 핸들 (백엔드가 세션으로 이동한 뒤에도 유효)
    pub fn calls(&self) -> Arc<CallLog> {
        Arc::clone(&self.calls)
    }

    /// 해석 가능한 인터페이스를 추가합니다.
    pub fn with_interface(mut self, name: &str, index: u32) -> Self {
        self.interfaces.insert(name.to_owned(), index);
        self
    }

    /// 틱마다 돌려줄 읽기 결과를 설정합니다.
    pub fn with_reads<I>(mut self, reads: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<u64>, String>>,
    {
        self.reads.extend(reads);
        self
    }

    /// 매 읽기마다 블로킹 지연을 넣습니다.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn fail_memlock(mut self, reason: &str) -> Self {
        self.memlock_error = Some(reason.to_owned());
        self
    }

    pub fn fail_load(mut self, reason: &str) -> Self {
        self.load_error = Some(reason.to_owned());
        self
    }

    pub fn fail_attach(mut self, reason: &str) -> Self {
        self.attach_error = Some(reason.to_owned());
        self
    }

    pub fn fail_detach(mut self, reason: &str) -> Self {
        self.detach_error = Some(reason.to_owned());
        self
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterBackend for MockBackend {
    type Program = MockProgram;

    fn name(&self) -> &str {
        "mock"
    }

    fn raise_memlock_limit(&mut self) -> Result<(), PktcountError> {
        CallLog::bump(&self.calls.memlock);
        match &self.memlock_error {
            Some(reason) => Err(StartupError::MemlockLimit(reason.clone()).into()),
            None => Ok(()),
        }
    }

    fn resolve_interface(&self, name: &str) -> Result<InterfaceRef, PktcountError> {
        CallLog::bump(&self.calls.resolve);
        self.interfaces
            .get(name)
            .map(|&index| InterfaceRef::new(name, index))
            .ok_or_else(|| {
                StartupError::InterfaceNotFound {
                    name: name.to_owned(),
                    reason: "No such device".to_owned(),
                }
                .into()
            })
    }

    fn load(&mut self) -> Result<LoadedObjects<MockProgram>, PktcountError> {
        CallLog::bump(&self.calls.load);
        if let Some(reason) = &self.load_error {
            return Err(StartupError::Load(reason.clone()).into());
        }

        let counter_map = MockCounterMap {
            script: Mutex::new(ReadScript {
                queue: std::mem::take(&mut self.reads),
                last: Ok(Vec::new()),
            }),
            delay: self.read_delay,
            calls: Arc::clone(&self.calls),
        };
        Ok(LoadedObjects {
            program: MockProgram {
                calls: Arc::clone(&self.calls),
                attach_error: self.attach_error.clone(),
                detach_error: self.detach_error.clone(),
                next_link: 0,
            },
            counter_map: Arc::new(counter_map),
        })
    }

    fn close(&mut self, objects: LoadedObjects<MockProgram>) {
        CallLog::bump(&self.calls.close);
        drop(objects);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reads_repeat_last_value() {
        let mut backend = MockBackend::new().with_reads([Ok(vec![1]), Err("gone".to_owned())]);
        let objects = backend.load().unwrap();

        assert_eq!(objects.counter_map.read_slots(0).unwrap(), vec![1]);
        assert!(objects.counter_map.read_slots(0).is_err());
        assert!(objects.counter_map.read_slots(0).is_err());
        assert_eq!(backend.calls().reads(), 3);
    }

    #[test]
    fn unscripted_reads_return_no_slots() {
        let mut backend = MockBackend::new();
        let objects = backend.load().unwrap();
        assert!(objects.counter_map.read_slots(0).unwrap().is_empty());
    }

    #[test]
    fn load_failure_is_reported() {
        let mut backend = MockBackend::new().fail_load("bad object");
        assert!(matches!(
            backend.load(),
            Err(PktcountError::Startup(StartupError::Load(_)))
        ));
    }
}
