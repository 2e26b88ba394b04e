//! Dispatch Metrics - 디스패치 계측 (디버깅 모드)
//!
//! 비활성 상태의 비용은 publish당 AtomicBool 로드 1회입니다.
//! 활성화하면 타입별 누산기(원자 카운터)에 발행 횟수, 핸들러 호출 횟수,
//! 패닉 횟수, 나노초 단위 소요 시간을 기록합니다.

use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// TypeMetrics - 타입별 누산기
// ============================================================================

/// 이벤트 타입 하나의 누산기. 경합은 계측이 켜진 경우에만 발생합니다.
pub(crate) struct TypeMetrics {
    name: &'static str,
    publishes: AtomicU64,
    handler_calls: AtomicU64,
    handler_faults: AtomicU64,
    publish_nanos: AtomicU64,
    handler_nanos: AtomicU64,
}

impl TypeMetrics {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            publishes: AtomicU64::new(0),
            handler_calls: AtomicU64::new(0),
            handler_faults: AtomicU64::new(0),
            publish_nanos: AtomicU64::new(0),
            handler_nanos: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_publish(&self, elapsed: Duration) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        self.publish_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_handler(&self, elapsed: Duration) {
        self.handler_calls.fetch_add(1, Ordering::Relaxed);
        self.handler_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.handler_faults.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// BusMetrics - 버스 전체 계측 저장소
// ============================================================================

pub(crate) struct BusMetrics {
    per_type: RwLock<HashMap<TypeId, Arc<TypeMetrics>>>,
}

impl BusMetrics {
    pub(crate) fn new() -> Self {
        Self {
            per_type: RwLock::new(HashMap::new()),
        }
    }

    /// 타입별 누산기 조회 (없으면 생성)
    pub(crate) fn for_type(&self, type_id: TypeId, name: &'static str) -> Arc<TypeMetrics> {
        if let Some(metrics) = self.per_type.read().get(&type_id) {
            return Arc::clone(metrics);
        }

        let mut per_type = self.per_type.write();
        Arc::clone(
            per_type
                .entry(type_id)
                .or_insert_with(|| Arc::new(TypeMetrics::new(name))),
        )
    }

    /// 현재 누적값의 스냅샷 생성
    ///
    /// `subscriber_count`는 버스가 타입별 현재 구독자 수를 공급합니다.
    pub(crate) fn snapshot(
        &self,
        subscriber_count: impl Fn(TypeId) -> usize,
    ) -> BusMetricsSnapshot {
        let per_type = self.per_type.read();

        let mut entries: Vec<EventTypeMetrics> = per_type
            .iter()
            .map(|(type_id, m)| EventTypeMetrics {
                event_type: m.name,
                publishes: m.publishes.load(Ordering::Relaxed),
                handler_calls: m.handler_calls.load(Ordering::Relaxed),
                handler_faults: m.handler_faults.load(Ordering::Relaxed),
                total_publish_nanos: m.publish_nanos.load(Ordering::Relaxed),
                total_handler_nanos: m.handler_nanos.load(Ordering::Relaxed),
                subscribers: subscriber_count(*type_id),
            })
            .collect();

        // 출력 순서를 결정적으로
        entries.sort_by_key(|e| e.event_type);

        BusMetricsSnapshot {
            publishes: entries.iter().map(|e| e.publishes).sum(),
            handler_calls: entries.iter().map(|e| e.handler_calls).sum(),
            handler_faults: entries.iter().map(|e| e.handler_faults).sum(),
            per_type: entries,
        }
    }
}

// ============================================================================
// 스냅샷 타입 (공개)
// ============================================================================

/// 이벤트 타입 하나의 계측 스냅샷
#[derive(Debug, Clone)]
pub struct EventTypeMetrics {
    pub event_type: &'static str,
    pub publishes: u64,
    pub handler_calls: u64,
    pub handler_faults: u64,
    pub total_publish_nanos: u64,
    pub total_handler_nanos: u64,
    /// 스냅샷 시점의 구독자 수
    pub subscribers: usize,
}

/// 버스 전체 계측 스냅샷
#[derive(Debug, Clone, Default)]
pub struct BusMetricsSnapshot {
    pub publishes: u64,
    pub handler_calls: u64,
    pub handler_faults: u64,
    pub per_type: Vec<EventTypeMetrics>,
}
