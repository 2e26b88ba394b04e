//! Mod Host - mod 라이프사이클 조정
//!
//! 배치 로드(의존성 순서), 단일 mod 핫 리로드, 역순 teardown을 담당합니다.
//! 해석 실패는 배치 전체를 `Aborted`로 만들고 어떤 mod도 활성화하지
//! 않습니다. 언로드/리로드 시에는 장부의 핸들을 전부 해지한 뒤 버스
//! introspection으로 누수 없음을 감사합니다.

use super::manifest::ModManifest;
use super::registry::ModRegistry;
use super::resolver::resolve_load_order;
use super::traits::{Mod, ModContext, ModState};
use modkit_foundation::event::EventBus;
use modkit_foundation::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Mod 호스트 설정
#[derive(Debug, Clone)]
pub struct ModHostConfig {
    /// `on_load` 실패 시 해당 mod만 건너뛰고 배치를 계속 진행
    ///
    /// 의존성 해석 실패에는 적용되지 않습니다 (항상 배치 중단).
    pub continue_on_error: bool,
}

impl Default for ModHostConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
        }
    }
}

/// Mod 호스트 - 전체 mod 라이프사이클 관리
pub struct ModHost {
    /// Mod 레지스트리
    registry: Arc<ModRegistry>,

    /// 공유 이벤트 버스
    bus: Arc<EventBus>,

    /// 설정
    config: ModHostConfig,
}

impl ModHost {
    /// 새 호스트 생성
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_config(bus, ModHostConfig::default())
    }

    /// 설정으로 생성
    pub fn with_config(bus: Arc<EventBus>, config: ModHostConfig) -> Self {
        Self {
            registry: Arc::new(ModRegistry::new()),
            bus,
            config,
        }
    }

    /// Mod 레지스트리 접근
    pub fn registry(&self) -> &Arc<ModRegistry> {
        &self.registry
    }

    /// 이벤트 버스 접근
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    // ========================================================================
    // 배치 로드
    // ========================================================================

    /// Mod 배치 로드
    ///
    /// 전부 `Discovered`로 등록 → 의존성 해석 → 성공 시 순서대로
    /// `Loading → Active`. 해석 실패 시 배치 전체가 `Aborted`가 되고
    /// 에러가 반환됩니다.
    pub async fn load_batch(&self, mods: Vec<Arc<dyn Mod>>) -> Result<Vec<String>> {
        let manifests: Vec<ModManifest> = mods.iter().map(|m| m.manifest()).collect();

        // 이전 배치와의 id 충돌은 등록 전에 거부
        for manifest in &manifests {
            if self.registry.contains(&manifest.id).await {
                return Err(Error::InvalidInput(format!(
                    "mod already loaded: {}",
                    manifest.id
                )));
            }
        }

        for module in &mods {
            self.registry.register(Arc::clone(module)).await;
        }
        let batch_ids: Vec<String> = manifests.iter().map(|m| m.id.clone()).collect();

        // 의존성 해석 (fail-fast)
        let order = match resolve_load_order(&manifests) {
            Ok(order) => order,
            Err(err) => {
                self.registry
                    .set_state_all(&batch_ids, ModState::Aborted)
                    .await;
                error!("Mod batch aborted: {}", err);
                return Err(Error::Dependency(err.to_string()));
            }
        };

        self.registry
            .set_state_all(&batch_ids, ModState::DependenciesResolved)
            .await;

        for (position, id) in order.iter().enumerate() {
            if let Err(err) = self.load_one(id).await {
                if self.config.continue_on_error {
                    warn!("Mod {} failed to load: {}. Continuing batch.", id, err);
                    continue;
                }

                // 아직 시작하지 않은 나머지는 Aborted
                let remaining: Vec<String> = order[position + 1..].to_vec();
                self.registry
                    .set_state_all(&remaining, ModState::Aborted)
                    .await;
                return Err(err);
            }
        }

        info!(count = order.len(), "Mod batch loaded");
        Ok(order)
    }

    /// 단일 mod 활성화: `Loading → Active`
    async fn load_one(&self, id: &str) -> Result<()> {
        let module = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| Error::ModNotFound(id.to_string()))?;

        self.registry.set_state(id, ModState::Loading).await;

        let ctx = ModContext::new(Arc::clone(&self.bus));
        if let Err(err) = module.on_load(&ctx).await {
            // 부분 등록된 구독은 즉시 해지
            for handle in ctx.take_handles() {
                self.bus.unsubscribe(&handle);
            }
            self.registry.unregister(id).await;
            error!("Mod {} failed to load: {}", id, err);
            return Err(Error::mod_load(id, err.to_string()));
        }

        let handles = ctx.take_handles();
        debug!(
            mod_id = id,
            subscriptions = handles.len(),
            "Mod registered subscriptions"
        );
        self.registry.store_handles(id, handles).await;
        self.registry.set_state(id, ModState::Active).await;
        // teardown 역순 계산은 활성화 순서를 기준으로 한다
        self.registry.mark_loaded(id).await;

        info!("Mod {} active", id);
        Ok(())
    }

    // ========================================================================
    // 언로드 / 리로드
    // ========================================================================

    /// 장부의 핸들을 전부 해지하고 버스 introspection으로 누수 감사
    async fn dispose_subscriptions(&self, id: &str) -> usize {
        let handles = self.registry.take_handles(id).await;
        for handle in &handles {
            self.bus.unsubscribe(handle);
        }

        let leaked = handles
            .iter()
            .filter(|handle| self.bus.is_registered(handle))
            .count();
        if leaked > 0 {
            warn!(mod_id = id, leaked, "Subscriptions survived teardown");
        }

        handles.len()
    }

    /// Mod 언로드: `Unloading → Unloaded`, 레지스트리에서 제거
    pub async fn unload(&self, id: &str) -> Result<()> {
        let module = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| Error::ModNotFound(id.to_string()))?;

        info!("Unloading mod: {}", id);
        self.registry.set_state(id, ModState::Unloading).await;

        let disposed = self.dispose_subscriptions(id).await;
        debug!(mod_id = id, disposed, "Disposed subscriptions");

        let ctx = ModContext::new(Arc::clone(&self.bus));
        if let Err(err) = module.on_unload(&ctx).await {
            warn!("Mod {} on_unload failed: {}", id, err);
            // 계속 진행
        }
        // on_unload 중 등록된 구독도 남기지 않음
        for handle in ctx.take_handles() {
            self.bus.unsubscribe(&handle);
        }

        self.registry.set_state(id, ModState::Unloaded).await;
        self.registry.unregister(id).await;

        info!("Mod {} unloaded", id);
        Ok(())
    }

    /// 전체 언로드 - 로드의 역순 (의존자 먼저 teardown)
    pub async fn unload_all(&self) -> Result<()> {
        let mut order = self.registry.load_order().await;
        order.reverse();

        for id in order {
            self.unload(&id).await?;
        }
        Ok(())
    }

    /// 단일 mod 핫 리로드: `Active → Reloading → Active`
    ///
    /// 이전 핸들이 전부 해지된 것을 확인한 뒤에만 재등록합니다. 다른
    /// 활성 mod의 구독은 건드리지 않습니다.
    pub async fn reload(&self, id: &str) -> Result<()> {
        let module = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| Error::ModNotFound(id.to_string()))?;

        if self.registry.state(id).await != Some(ModState::Active) {
            return Err(Error::Mod(format!("mod {} is not active", id)));
        }

        info!("Reloading mod: {}", id);
        self.registry.set_state(id, ModState::Reloading).await;

        let disposed = self.dispose_subscriptions(id).await;
        debug!(mod_id = id, disposed, "Disposed subscriptions for reload");

        let unload_ctx = ModContext::new(Arc::clone(&self.bus));
        if let Err(err) = module.on_unload(&unload_ctx).await {
            warn!("Mod {} on_unload failed during reload: {}", id, err);
        }
        for handle in unload_ctx.take_handles() {
            self.bus.unsubscribe(&handle);
        }

        self.registry.set_state(id, ModState::Loading).await;

        let ctx = ModContext::new(Arc::clone(&self.bus));
        if let Err(err) = module.on_load(&ctx).await {
            for handle in ctx.take_handles() {
                self.bus.unsubscribe(&handle);
            }
            self.registry.unregister(id).await;
            error!("Mod {} failed to reload: {}", id, err);
            return Err(Error::mod_load(id, err.to_string()));
        }

        self.registry.store_handles(id, ctx.take_handles()).await;
        self.registry.set_state(id, ModState::Active).await;

        info!("Mod {} reloaded", id);
        Ok(())
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// id별 현재 상태
    pub async fn mod_states(&self) -> HashMap<String, ModState> {
        self.registry.states().await
    }

    /// Active 상태인 mod id 목록 (로드 순서대로)
    pub async fn active_mods(&self) -> Vec<String> {
        self.registry.active_ids().await
    }

    /// mod별 구독 장부와 버스의 실제 등록 수 대조
    pub async fn subscription_audit(&self) -> Vec<ModSubscriptionAudit> {
        let mut audits = Vec::new();
        for id in self.registry.load_order().await {
            let handles = self.registry.handles_of(&id).await;
            let live = handles
                .iter()
                .filter(|handle| self.bus.is_registered(handle))
                .count();
            audits.push(ModSubscriptionAudit {
                id,
                handle_count: handles.len(),
                live_count: live,
            });
        }
        audits
    }

    /// 호스트 요약 정보
    pub async fn summary(&self) -> HostSummary {
        HostSummary {
            total: self.registry.len().await,
            active: self.registry.active_ids().await.len(),
            bus_subscribers: self.bus.total_subscriber_count(),
        }
    }
}

/// mod 하나의 구독 감사 결과
#[derive(Debug, Clone)]
pub struct ModSubscriptionAudit {
    pub id: String,
    /// 장부에 기록된 핸들 수
    pub handle_count: usize,
    /// 그중 버스에 실제로 살아있는 수
    pub live_count: usize,
}

/// Mod 시스템 요약
#[derive(Debug, Clone)]
pub struct HostSummary {
    pub total: usize,
    pub active: usize,
    pub bus_subscribers: usize,
}

// ============================================================================
// 테스트
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping;

    struct ScriptedMod {
        manifest: ModManifest,
        subscriptions: usize,
        fail_on_load: bool,
        load_calls: AtomicUsize,
        lifecycle_log: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedMod {
        fn new(manifest: ModManifest, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                manifest,
                subscriptions: 2,
                fail_on_load: false,
                load_calls: AtomicUsize::new(0),
                lifecycle_log: log,
            })
        }

        fn failing(manifest: ModManifest, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                manifest,
                subscriptions: 0,
                fail_on_load: true,
                load_calls: AtomicUsize::new(0),
                lifecycle_log: log,
            })
        }
    }

    #[async_trait]
    impl Mod for ScriptedMod {
        fn manifest(&self) -> ModManifest {
            self.manifest.clone()
        }

        async fn on_load(&self, ctx: &ModContext) -> Result<()> {
            if self.fail_on_load {
                return Err(Error::Internal("scripted load failure".into()));
            }

            self.load_calls.fetch_add(1, Ordering::SeqCst);
            self.lifecycle_log
                .lock()
                .push(format!("load:{}", self.manifest.id));

            for _ in 0..self.subscriptions {
                ctx.subscribe(|_: &mut Ping| {});
            }
            Ok(())
        }

        async fn on_unload(&self, _ctx: &ModContext) -> Result<()> {
            self.lifecycle_log
                .lock()
                .push(format!("unload:{}", self.manifest.id));
            Ok(())
        }
    }

    fn manifest(id: &str, deps: &[&str]) -> ModManifest {
        let mut m = ModManifest::new(id, id);
        for dep in deps {
            m = m.with_dependency(*dep);
        }
        m
    }

    #[tokio::test]
    async fn test_load_batch_activates_in_dependency_order() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::new(Arc::clone(&bus));
        let log = Arc::new(Mutex::new(Vec::new()));

        // 의존성이 입력 순서를 뒤집는 배치
        let mods: Vec<Arc<dyn Mod>> = vec![
            ScriptedMod::new(manifest("c", &["b"]), Arc::clone(&log)),
            ScriptedMod::new(manifest("a", &[]), Arc::clone(&log)),
            ScriptedMod::new(manifest("b", &["a"]), Arc::clone(&log)),
        ];

        let order = host.load_batch(mods).await.unwrap();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(*log.lock(), vec!["load:a", "load:b", "load:c"]);

        // 활성화 순서가 장부의 로드 순서가 된다
        assert_eq!(host.active_mods().await, vec!["a", "b", "c"]);
        assert_eq!(bus.subscriber_count::<Ping>(), 6);
    }

    #[tokio::test]
    async fn test_resolution_failure_aborts_whole_batch() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::new(Arc::clone(&bus));
        let log = Arc::new(Mutex::new(Vec::new()));

        let mods: Vec<Arc<dyn Mod>> = vec![
            ScriptedMod::new(manifest("innocent", &[]), Arc::clone(&log)),
            ScriptedMod::new(manifest("a", &["b"]), Arc::clone(&log)),
            ScriptedMod::new(manifest("b", &["a"]), Arc::clone(&log)),
        ];

        let err = host.load_batch(mods).await.unwrap_err();
        assert!(matches!(err, Error::Dependency(_)));

        // 순환에 참여하지 않은 mod까지 전부 Aborted, 아무것도 활성화되지 않음
        let states = host.mod_states().await;
        assert_eq!(states.len(), 3);
        assert!(states.values().all(|s| *s == ModState::Aborted));
        assert!(log.lock().is_empty());
        assert_eq!(bus.total_subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_dependency_aborts_whole_batch() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::new(Arc::clone(&bus));
        let log = Arc::new(Mutex::new(Vec::new()));

        let mods: Vec<Arc<dyn Mod>> =
            vec![ScriptedMod::new(manifest("x", &["y"]), Arc::clone(&log))];

        let err = host.load_batch(mods).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains('x') && message.contains('y'));
        assert_eq!(host.mod_states().await["x"], ModState::Aborted);
    }

    #[tokio::test]
    async fn test_reload_replaces_only_that_mods_subscriptions() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::new(Arc::clone(&bus));
        let log = Arc::new(Mutex::new(Vec::new()));

        let target = ScriptedMod::new(manifest("target", &[]), Arc::clone(&log));
        let other = ScriptedMod::new(manifest("other", &[]), Arc::clone(&log));
        let mods: Vec<Arc<dyn Mod>> = vec![target.clone(), other.clone()];
        host.load_batch(mods).await.unwrap();

        let other_handles = host.registry().handles_of("other").await;
        assert_eq!(bus.subscriber_count::<Ping>(), 4);

        host.reload("target").await.unwrap();

        // target은 재등록, other의 구독은 그대로
        assert_eq!(target.load_calls.load(Ordering::SeqCst), 2);
        assert_eq!(bus.subscriber_count::<Ping>(), 4);
        for handle in &other_handles {
            assert!(bus.is_registered(handle));
        }

        let audit = host.subscription_audit().await;
        assert!(audit
            .iter()
            .all(|entry| entry.handle_count == entry.live_count));
    }

    #[tokio::test]
    async fn test_unload_all_tears_down_in_reverse_order() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::new(Arc::clone(&bus));
        let log = Arc::new(Mutex::new(Vec::new()));

        let mods: Vec<Arc<dyn Mod>> = vec![
            ScriptedMod::new(manifest("base", &[]), Arc::clone(&log)),
            ScriptedMod::new(manifest("mid", &["base"]), Arc::clone(&log)),
            ScriptedMod::new(manifest("top", &["mid"]), Arc::clone(&log)),
        ];
        host.load_batch(mods).await.unwrap();
        log.lock().clear();

        host.unload_all().await.unwrap();

        // 의존자 먼저 teardown
        assert_eq!(
            *log.lock(),
            vec!["unload:top", "unload:mid", "unload:base"]
        );
        assert_eq!(bus.total_subscriber_count(), 0);
        assert!(host.registry().is_empty().await);
        assert!(bus.registered_event_types().is_empty());
    }

    #[tokio::test]
    async fn test_on_load_failure_aborts_remaining_by_default() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::new(Arc::clone(&bus));
        let log = Arc::new(Mutex::new(Vec::new()));

        let mods: Vec<Arc<dyn Mod>> = vec![
            ScriptedMod::new(manifest("a", &[]), Arc::clone(&log)),
            ScriptedMod::failing(manifest("b", &["a"]), Arc::clone(&log)),
            ScriptedMod::new(manifest("c", &["b"]), Arc::clone(&log)),
        ];

        let err = host.load_batch(mods).await.unwrap_err();
        assert!(matches!(err, Error::ModLoad { .. }));

        let states = host.mod_states().await;
        assert_eq!(states["a"], ModState::Active);
        assert!(!states.contains_key("b"));
        assert_eq!(states["c"], ModState::Aborted);
    }

    #[tokio::test]
    async fn test_on_load_failure_can_continue_batch() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::with_config(
            Arc::clone(&bus),
            ModHostConfig {
                continue_on_error: true,
            },
        );
        let log = Arc::new(Mutex::new(Vec::new()));

        let mods: Vec<Arc<dyn Mod>> = vec![
            ScriptedMod::new(manifest("a", &[]), Arc::clone(&log)),
            ScriptedMod::failing(manifest("b", &[]), Arc::clone(&log)),
            ScriptedMod::new(manifest("c", &[]), Arc::clone(&log)),
        ];

        host.load_batch(mods).await.unwrap();

        let states = host.mod_states().await;
        assert_eq!(states["a"], ModState::Active);
        assert_eq!(states["c"], ModState::Active);
        assert!(!states.contains_key("b"));
    }

    #[tokio::test]
    async fn test_second_batch_cannot_reuse_loaded_id() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::new(Arc::clone(&bus));
        let log = Arc::new(Mutex::new(Vec::new()));

        host.load_batch(vec![
            ScriptedMod::new(manifest("a", &[]), Arc::clone(&log)) as Arc<dyn Mod>
        ])
        .await
        .unwrap();

        let err = host
            .load_batch(vec![
                ScriptedMod::new(manifest("a", &[]), Arc::clone(&log)) as Arc<dyn Mod>
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_reload_requires_active_mod() {
        let bus = Arc::new(EventBus::new());
        let host = ModHost::new(bus);

        let err = host.reload("ghost").await.unwrap_err();
        assert!(matches!(err, Error::ModNotFound(_)));
    }
}
