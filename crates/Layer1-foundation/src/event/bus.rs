//! Event Bus - 타입 키 기반 발행/구독 디스패처
//!
//! 구독 저장소는 버스가 단독 소유합니다. 타입별 핸들러 테이블은
//! copy-on-write 스냅샷(`Arc<[Subscription]>`)으로 게시되고, 발행 중인
//! 디스패치는 자신이 복제한 스냅샷 하나를 끝까지 순회합니다. 따라서
//! 디스패치 도중의 구독/해지는 진행 중인 발행에 영향을 주지 않습니다.
//!
//! - 핸들러는 호출 스레드에서 동기 실행됩니다 (전용 스레드/이벤트 루프 없음)
//! - 핸들러 패닉은 격리되어 로그만 남기고, 나머지 핸들러는 계속 실행됩니다
//! - 발행 전체를 덮는 전역 락은 없습니다 (스냅샷 복제 동안만 read 락)

use super::metrics::{BusMetrics, BusMetricsSnapshot};
use super::types::{EntityId, EntityScoped, Event, TileCoord, TileScoped};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

// ============================================================================
// HandlerId
// ============================================================================

/// 핸들러 고유 ID
///
/// 프로세스 전역 단조 증가 카운터로 발급되어 동시 등록에서도 항상
/// 유일합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

// ============================================================================
// SubscriptionHandle
// ============================================================================

/// 구독 핸들 - 해지를 위한 키 전용 역참조
///
/// 핸들러 자체를 소유하지 않고 `(이벤트 타입, HandlerId)`만 보관합니다.
/// [`EventBus::unsubscribe`]에 넘겨 해지하며, 반복 해지나 이미 비워진
/// 타입에 대한 해지도 항상 안전합니다 (no-op).
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    type_id: TypeId,
    type_name: &'static str,
    id: HandlerId,
}

impl SubscriptionHandle {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn event_type(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }
}

// ============================================================================
// SubscribeOptions
// ============================================================================

/// 구독 옵션 (메타데이터)
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// 구독 주체 라벨 (디버깅/감사용)
    pub source: Option<String>,

    /// 예약 메타데이터. 디스패치 순서는 등록 순서를 따르며 priority는
    /// 아직 순서에 반영되지 않습니다.
    pub priority: i32,
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 패턴: 소스 라벨 설정
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// 빌더 패턴: priority 설정 (예약)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

// ============================================================================
// 내부 저장 구조
// ============================================================================

type ErasedHandler = dyn Fn(&mut dyn Any) + Send + Sync;

/// 구독 항목. 테이블과 스냅샷이 공유합니다.
#[derive(Clone)]
struct Subscription {
    id: HandlerId,
    callback: Arc<ErasedHandler>,
    #[allow(dead_code)]
    source: Option<Arc<str>>,
    #[allow(dead_code)]
    priority: i32,
}

/// 이벤트 타입 하나의 구독 상태
struct TypeEntry {
    name: &'static str,

    /// 권위 테이블 (등록 순서 유지)
    table: Vec<Subscription>,

    /// 디스패치용 불변 스냅샷. 테이블이 바뀔 때마다 새로 만들어
    /// 통째로 교체합니다 (기존 스냅샷은 변형하지 않음).
    snapshot: Arc<[Subscription]>,
}

impl TypeEntry {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            table: Vec::new(),
            snapshot: Vec::new().into(),
        }
    }

    fn rebuild_snapshot(&mut self) {
        self.snapshot = self.table.clone().into();
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// 이벤트 버스 설정
#[derive(Debug, Clone, Default)]
pub struct EventBusConfig {
    /// 디스패치 계측 수집 (디버깅 모드)
    pub collect_metrics: bool,
}

/// 이벤트 버스
///
/// 조립 루트에서 명시적으로 생성하여 발행자/구독자에게 `Arc`로
/// 전달합니다. 숨은 전역 싱글톤은 없습니다.
///
/// ## 사용법
///
/// ```
/// use modkit_foundation::event::EventBus;
///
/// struct Footstep { steps: u32 }
///
/// let bus = EventBus::new();
/// let handle = bus.subscribe(|event: &mut Footstep| {
///     event.steps += 1;
/// });
///
/// let mut event = Footstep { steps: 0 };
/// bus.publish(&mut event);
/// assert_eq!(event.steps, 1);
///
/// bus.unsubscribe(&handle);
/// ```
pub struct EventBus {
    /// 타입별 구독 테이블
    entries: RwLock<HashMap<TypeId, TypeEntry>>,

    /// HandlerId 카운터
    handler_counter: AtomicU64,

    /// 계측 활성화 여부
    metrics_enabled: AtomicBool,

    /// 계측 누산기
    metrics: BusMetrics,
}

impl EventBus {
    /// 기본 설정으로 버스 생성
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// 커스텀 설정으로 버스 생성
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            handler_counter: AtomicU64::new(0),
            metrics_enabled: AtomicBool::new(config.collect_metrics),
            metrics: BusMetrics::new(),
        }
    }

    // ========================================================================
    // 구독 / 해지
    // ========================================================================

    /// 핸들러 등록
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionHandle
    where
        E: Event,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        self.subscribe_with(SubscribeOptions::default(), handler)
    }

    /// 옵션과 함께 핸들러 등록
    pub fn subscribe_with<E, F>(&self, options: SubscribeOptions, handler: F) -> SubscriptionHandle
    where
        E: Event,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        let id = HandlerId(self.handler_counter.fetch_add(1, Ordering::SeqCst));
        let type_id = TypeId::of::<E>();
        let name = std::any::type_name::<E>();

        // 타입 소거: 디스패치 키가 TypeId이므로 downcast는 실패하지 않음
        let callback: Arc<ErasedHandler> = Arc::new(move |payload: &mut dyn Any| {
            if let Some(event) = payload.downcast_mut::<E>() {
                handler(event);
            }
        });

        let subscription = Subscription {
            id,
            callback,
            source: options.source.map(Arc::from),
            priority: options.priority,
        };

        {
            let mut entries = self.entries.write();
            let entry = entries
                .entry(type_id)
                .or_insert_with(|| TypeEntry::new(name));
            entry.table.push(subscription);
            entry.rebuild_snapshot();
        }

        if self.metrics_enabled.load(Ordering::Relaxed) {
            self.metrics.for_type(type_id, name);
        }

        debug!(event_type = name, handler_id = %id, "Registered event handler");

        SubscriptionHandle {
            type_id,
            type_name: name,
            id,
        }
    }

    /// 특정 엔티티의 이벤트만 받는 구독
    ///
    /// 별도 인덱스를 두지 않고 핸들러를 조건자로 감싼 일반 구독입니다.
    /// 타입당 구독자 수는 수십 수준이라 O(n) 조건 검사로 충분합니다.
    pub fn subscribe_entity<E, F>(&self, target: EntityId, handler: F) -> SubscriptionHandle
    where
        E: Event + EntityScoped,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        self.subscribe(move |event: &mut E| {
            if event.entity() == target {
                handler(event);
            }
        })
    }

    /// 특정 타일의 이벤트만 받는 구독
    pub fn subscribe_tile<E, F>(&self, target: TileCoord, handler: F) -> SubscriptionHandle
    where
        E: Event + TileScoped,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        self.subscribe(move |event: &mut E| {
            if event.tile() == target {
                handler(event);
            }
        })
    }

    /// 구독 해지
    ///
    /// 멱등: 이미 해지되었거나 타입 테이블이 비워진 뒤라도 항상 성공하며
    /// `false`만 반환합니다.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut entries = self.entries.write();

        let mut now_empty = false;
        let removed = match entries.get_mut(&handle.type_id) {
            Some(entry) => {
                let before = entry.table.len();
                entry.table.retain(|s| s.id != handle.id);
                if entry.table.len() < before {
                    now_empty = entry.table.is_empty();
                    if !now_empty {
                        entry.rebuild_snapshot();
                    }
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        // 마지막 구독자가 빠진 타입은 테이블에서 제거 (감사 시 빈 레지스트리)
        if now_empty {
            entries.remove(&handle.type_id);
        }
        drop(entries);

        if removed {
            debug!(
                event_type = handle.type_name,
                handler_id = %handle.id,
                "Unregistered event handler"
            );
        }

        removed
    }

    // ========================================================================
    // 발행
    // ========================================================================

    /// 이벤트 발행
    ///
    /// 구독자가 없으면 할당 없이 즉시 반환합니다 (fast path). 핸들러는
    /// 스냅샷 순서(= 스냅샷 생성 시점의 등록 순서)대로 호출 스레드에서
    /// 동기 실행되며, 패닉한 핸들러는 로그만 남기고 건너뜁니다.
    /// 취소 상태는 이벤트 자신이 들고 있으므로 이후 핸들러와 발행자가
    /// 그대로 관찰합니다.
    pub fn publish<E: Event>(&self, event: &mut E) {
        let type_id = TypeId::of::<E>();

        let snapshot = {
            let entries = self.entries.read();
            match entries.get(&type_id) {
                Some(entry) if !entry.snapshot.is_empty() => Arc::clone(&entry.snapshot),
                _ => return,
            }
        };

        let metrics = self
            .metrics_enabled
            .load(Ordering::Relaxed)
            .then(|| self.metrics.for_type(type_id, std::any::type_name::<E>()));
        let publish_started = metrics.as_ref().map(|_| Instant::now());

        for subscription in snapshot.iter() {
            let handler_started = metrics.as_ref().map(|_| Instant::now());

            // 핸들러 경계는 언제나 fallible: 패닉을 잡아 버스를 보호한다
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                (subscription.callback)(&mut *event);
            }));

            if let (Some(m), Some(started)) = (&metrics, handler_started) {
                m.record_handler(started.elapsed());
            }

            if let Err(payload) = outcome {
                if let Some(m) = &metrics {
                    m.record_fault();
                }
                error!(
                    event_type = std::any::type_name::<E>(),
                    handler_id = %subscription.id,
                    "Event handler panicked: {}",
                    panic_message(&*payload)
                );
            }
        }

        if let (Some(m), Some(started)) = (&metrics, publish_started) {
            m.record_publish(started.elapsed());
        }
    }

    // ========================================================================
    // 조회 (읽기 전용 introspection)
    // ========================================================================

    /// 구독자가 있는 이벤트 타입 이름 목록 (정렬됨)
    pub fn registered_event_types(&self) -> Vec<&'static str> {
        let entries = self.entries.read();
        let mut names: Vec<_> = entries.values().map(|e| e.name).collect();
        names.sort_unstable();
        names
    }

    /// 타입의 핸들러 ID 목록 (등록 순서)
    pub fn handler_ids<E: Event>(&self) -> Vec<HandlerId> {
        self.entries
            .read()
            .get(&TypeId::of::<E>())
            .map(|entry| entry.table.iter().map(|s| s.id).collect())
            .unwrap_or_default()
    }

    /// 타입의 구독자 수
    pub fn subscriber_count<E: Event>(&self) -> usize {
        self.entries
            .read()
            .get(&TypeId::of::<E>())
            .map(|entry| entry.table.len())
            .unwrap_or(0)
    }

    /// 전체 구독자 수
    pub fn total_subscriber_count(&self) -> usize {
        self.entries.read().values().map(|e| e.table.len()).sum()
    }

    /// 핸들이 가리키는 구독이 아직 살아있는지 확인 (teardown 감사용)
    pub fn is_registered(&self, handle: &SubscriptionHandle) -> bool {
        self.entries
            .read()
            .get(&handle.type_id())
            .map_or(false, |entry| {
                entry.table.iter().any(|s| s.id == handle.id)
            })
    }

    // ========================================================================
    // 계측
    // ========================================================================

    /// 계측 수집 on/off
    pub fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_enabled.load(Ordering::Relaxed)
    }

    /// 계측 스냅샷 (비활성 시 None)
    pub fn metrics_snapshot(&self) -> Option<BusMetricsSnapshot> {
        if !self.metrics_enabled.load(Ordering::Relaxed) {
            return None;
        }

        let counts: HashMap<TypeId, usize> = {
            let entries = self.entries.read();
            entries.iter().map(|(k, e)| (*k, e.table.len())).collect()
        };

        Some(
            self.metrics
                .snapshot(|type_id| counts.get(&type_id).copied().unwrap_or(0)),
        )
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 패닉 페이로드에서 메시지 추출
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

// ============================================================================
// 테스트
// ============================================================================
