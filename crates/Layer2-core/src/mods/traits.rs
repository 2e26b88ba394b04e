//! Mod traits - 핵심 mod 인터페이스
//!
//! mod는 `on_load`에서 [`ModContext`]를 통해 구독을 등록합니다. 컨텍스트가
//! 발급된 핸들을 전부 기록하므로, 어떤 mod가 어떤 핸들을 소유하는지의
//! 장부는 호스트 측에 남습니다 (버스는 소유자를 모릅니다).

use async_trait::async_trait;
use modkit_foundation::event::{
    EntityId, EntityScoped, Event, EventBus, SubscribeOptions, SubscriptionHandle, TileCoord,
    TileScoped,
};
use modkit_foundation::Result;
use parking_lot::Mutex;
use std::sync::Arc;

use super::manifest::ModManifest;

// ============================================================================
// ModState - 라이프사이클 상태
// ============================================================================

/// Mod 라이프사이클 상태
///
/// `Discovered → DependenciesResolved → Loading → Active
///  → (Reloading → Active | Unloading → Unloaded)`
///
/// 의존성 해석이 실패하면 배치 전체가 `Aborted`가 되고 어느 mod도
/// 활성화되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModState {
    /// 발견됨 (해석 전)
    Discovered,

    /// 의존성 순서 확정
    DependenciesResolved,

    /// `on_load` 실행 중
    Loading,

    /// 활성 (구독 등록 완료)
    Active,

    /// 단일 mod 핫 리로드 진행 중
    Reloading,

    /// teardown 진행 중
    Unloading,

    /// 해제 완료
    Unloaded,

    /// 배치 해석 실패로 중단됨
    Aborted,
}

impl std::fmt::Display for ModState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::DependenciesResolved => write!(f, "dependencies_resolved"),
            Self::Loading => write!(f, "loading"),
            Self::Active => write!(f, "active"),
            Self::Reloading => write!(f, "reloading"),
            Self::Unloading => write!(f, "unloading"),
            Self::Unloaded => write!(f, "unloaded"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

// ============================================================================
// ModContext - mod에 제공되는 컨텍스트
// ============================================================================

/// Mod 컨텍스트 - mod가 런타임과 상호작용하는 인터페이스
///
/// 구독은 반드시 이 컨텍스트를 거칩니다. 발급된 핸들은 내부에 기록되고
/// 호스트가 `take_handles`로 회수하여 언로드/리로드 시 전부 해지합니다.
pub struct ModContext {
    /// 공유 이벤트 버스
    bus: Arc<EventBus>,

    /// 이 컨텍스트를 통해 발급된 구독 핸들
    handles: Mutex<Vec<SubscriptionHandle>>,
}

impl ModContext {
    /// 새 컨텍스트 생성
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// 이벤트 버스 접근 (발행용)
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ========================================================================
    // 구독 (핸들 기록)
    // ========================================================================

    /// 핸들러 등록
    pub fn subscribe<E, F>(&self, handler: F) -> SubscriptionHandle
    where
        E: Event,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        let handle = self.bus.subscribe(handler);
        self.handles.lock().push(handle.clone());
        handle
    }

    /// 옵션과 함께 핸들러 등록
    pub fn subscribe_with<E, F>(&self, options: SubscribeOptions, handler: F) -> SubscriptionHandle
    where
        E: Event,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        let handle = self.bus.subscribe_with(options, handler);
        self.handles.lock().push(handle.clone());
        handle
    }

    /// 특정 엔티티의 이벤트만 받는 구독
    pub fn subscribe_entity<E, F>(&self, target: EntityId, handler: F) -> SubscriptionHandle
    where
        E: Event + EntityScoped,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        let handle = self.bus.subscribe_entity(target, handler);
        self.handles.lock().push(handle.clone());
        handle
    }

    /// 특정 타일의 이벤트만 받는 구독
    pub fn subscribe_tile<E, F>(&self, target: TileCoord, handler: F) -> SubscriptionHandle
    where
        E: Event + TileScoped,
        F: Fn(&mut E) + Send + Sync + 'static,
    {
        let handle = self.bus.subscribe_tile(target, handler);
        self.handles.lock().push(handle.clone());
        handle
    }

    // ========================================================================
    // 핸들 회수 (호스트 전용)
    // ========================================================================

    /// 기록된 핸들을 전부 회수
    pub fn take_handles(&self) -> Vec<SubscriptionHandle> {
        std::mem::take(&mut *self.handles.lock())
    }

    /// 기록된 핸들 수
    pub fn handle_count(&self) -> usize {
        self.handles.lock().len()
    }
}

// ============================================================================
// Mod Trait - 모든 mod가 구현해야 하는 인터페이스
// ============================================================================

/// Mod 트레이트
///
/// 스크립트 호스트나 네이티브 콘텐츠 유닛이 구현합니다.
#[async_trait]
pub trait Mod: Send + Sync {
    /// Mod 매니페스트 반환
    fn manifest(&self) -> ModManifest;

    /// 로드 시 호출
    ///
    /// 여기서 컨텍스트를 통해 구독을 등록합니다.
    async fn on_load(&self, ctx: &ModContext) -> Result<()>;

    /// 언로드 시 호출 (구독 해지는 호스트가 수행)
    async fn on_unload(&self, _ctx: &ModContext) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bumped {
        count: u32,
    }

    #[test]
    fn test_context_records_issued_handles() {
        let bus = Arc::new(EventBus::new());
        let ctx = ModContext::new(Arc::clone(&bus));

        ctx.subscribe(|event: &mut Bumped| {
            event.count += 1;
        });
        ctx.subscribe(|event: &mut Bumped| {
            event.count += 10;
        });

        assert_eq!(ctx.handle_count(), 2);
        assert_eq!(bus.subscriber_count::<Bumped>(), 2);

        let handles = ctx.take_handles();
        assert_eq!(handles.len(), 2);
        assert_eq!(ctx.handle_count(), 0);

        for handle in &handles {
            assert!(bus.unsubscribe(handle));
        }
        assert_eq!(bus.subscriber_count::<Bumped>(), 0);
    }

    #[test]
    fn test_mod_state_display() {
        assert_eq!(ModState::Active.to_string(), "active");
        assert_eq!(
            ModState::DependenciesResolved.to_string(),
            "dependencies_resolved"
        );
        assert_eq!(ModState::Aborted.to_string(), "aborted");
    }
}
