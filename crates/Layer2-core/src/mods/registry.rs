//! Mod Registry - mod 저장소
//!
//! mod 인스턴스, 상태, 발급된 구독 핸들의 장부를 보관합니다.

use super::manifest::ModManifest;
use super::traits::{Mod, ModState};
use modkit_foundation::event::SubscriptionHandle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Mod 정보
pub struct ModInfo {
    /// Mod 인스턴스
    pub module: Arc<dyn Mod>,

    /// 매니페스트 (발견 시점에 고정)
    pub manifest: ModManifest,

    /// 현재 상태
    pub state: ModState,

    /// 이 mod가 발급받은 구독 핸들 (소유권 장부)
    pub handles: Vec<SubscriptionHandle>,

    /// 로드 순서
    pub load_order: usize,
}

/// Mod 레지스트리 - 모든 mod 관리
pub struct ModRegistry {
    /// Mod 저장소 (id -> ModInfo)
    mods: RwLock<HashMap<String, ModInfo>>,

    /// 로드 카운터
    load_counter: RwLock<usize>,
}

impl ModRegistry {
    /// 새 레지스트리 생성
    pub fn new() -> Self {
        Self {
            mods: RwLock::new(HashMap::new()),
            load_counter: RwLock::new(0),
        }
    }

    /// Mod 등록 (상태: Discovered)
    pub async fn register(&self, module: Arc<dyn Mod>) -> bool {
        let manifest = module.manifest();
        let id = manifest.id.clone();

        let mut mods = self.mods.write().await;

        if mods.contains_key(&id) {
            warn!("Mod {} is already registered", id);
            return false;
        }

        let mut counter = self.load_counter.write().await;
        *counter += 1;
        let load_order = *counter;

        info!("Registered mod: {} (v{})", id, manifest.version);

        mods.insert(
            id,
            ModInfo {
                module,
                manifest,
                state: ModState::Discovered,
                handles: Vec::new(),
                load_order,
            },
        );

        true
    }

    /// Mod 등록 해제
    pub async fn unregister(&self, id: &str) -> Option<Arc<dyn Mod>> {
        let mut mods = self.mods.write().await;

        if let Some(info) = mods.remove(id) {
            info!("Unregistered mod: {}", id);
            Some(info.module)
        } else {
            None
        }
    }

    /// Mod 조회
    pub async fn get(&self, id: &str) -> Option<Arc<dyn Mod>> {
        let mods = self.mods.read().await;
        mods.get(id).map(|info| Arc::clone(&info.module))
    }

    /// Mod 매니페스트 조회
    pub async fn get_manifest(&self, id: &str) -> Option<ModManifest> {
        let mods = self.mods.read().await;
        mods.get(id).map(|info| info.manifest.clone())
    }

    /// Mod 상태 조회
    pub async fn state(&self, id: &str) -> Option<ModState> {
        let mods = self.mods.read().await;
        mods.get(id).map(|info| info.state)
    }

    /// Mod 상태 설정
    pub async fn set_state(&self, id: &str, state: ModState) -> bool {
        let mut mods = self.mods.write().await;
        if let Some(info) = mods.get_mut(id) {
            info.state = state;
            debug!("Set mod {} state to {}", id, state);
            true
        } else {
            false
        }
    }

    /// 활성화 시점의 순서를 장부에 반영
    ///
    /// teardown은 이 순서의 역순으로 진행되므로, 등록 순서가 아니라
    /// 실제 활성화 순서가 기록되어야 합니다.
    pub async fn mark_loaded(&self, id: &str) -> bool {
        let order = {
            let mut counter = self.load_counter.write().await;
            *counter += 1;
            *counter
        };

        let mut mods = self.mods.write().await;
        if let Some(info) = mods.get_mut(id) {
            info.load_order = order;
            true
        } else {
            false
        }
    }

    /// 배치 전체 상태 설정 (해석 실패 시 Aborted 처리용)
    pub async fn set_state_all(&self, ids: &[String], state: ModState) {
        let mut mods = self.mods.write().await;
        for id in ids {
            if let Some(info) = mods.get_mut(id) {
                info.state = state;
            }
        }
    }

    // ========================================================================
    // 구독 핸들 장부
    // ========================================================================

    /// 발급된 핸들 보관
    pub async fn store_handles(&self, id: &str, handles: Vec<SubscriptionHandle>) -> bool {
        let mut mods = self.mods.write().await;
        if let Some(info) = mods.get_mut(id) {
            info.handles = handles;
            true
        } else {
            false
        }
    }

    /// 보관된 핸들 회수 (해지용)
    pub async fn take_handles(&self, id: &str) -> Vec<SubscriptionHandle> {
        let mut mods = self.mods.write().await;
        mods.get_mut(id)
            .map(|info| std::mem::take(&mut info.handles))
            .unwrap_or_default()
    }

    /// 보관된 핸들 수
    pub async fn handle_count(&self, id: &str) -> usize {
        let mods = self.mods.read().await;
        mods.get(id).map(|info| info.handles.len()).unwrap_or(0)
    }

    /// 보관된 핸들 복제 (감사용, 장부는 유지)
    pub async fn handles_of(&self, id: &str) -> Vec<SubscriptionHandle> {
        let mods = self.mods.read().await;
        mods.get(id).map(|info| info.handles.clone()).unwrap_or_default()
    }

    // ========================================================================
    // 조회
    // ========================================================================

    /// 모든 mod 매니페스트 목록
    pub async fn list(&self) -> Vec<ModManifest> {
        let mods = self.mods.read().await;
        mods.values().map(|info| info.manifest.clone()).collect()
    }

    /// id별 현재 상태
    pub async fn states(&self) -> HashMap<String, ModState> {
        let mods = self.mods.read().await;
        mods.iter()
            .map(|(id, info)| (id.clone(), info.state))
            .collect()
    }

    /// 로드 순서에 따라 정렬된 mod id 목록
    pub async fn load_order(&self) -> Vec<String> {
        let mods = self.mods.read().await;
        let mut ordered: Vec<_> = mods.iter().collect();
        ordered.sort_by_key(|(_, info)| info.load_order);
        ordered.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Active 상태인 mod id 목록 (로드 순서대로)
    pub async fn active_ids(&self) -> Vec<String> {
        let mods = self.mods.read().await;
        let mut active: Vec<_> = mods
            .iter()
            .filter(|(_, info)| info.state == ModState::Active)
            .collect();
        active.sort_by_key(|(_, info)| info.load_order);
        active.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Mod 존재 여부 확인
    pub async fn contains(&self, id: &str) -> bool {
        let mods = self.mods.read().await;
        mods.contains_key(id)
    }

    /// Mod 수
    pub async fn len(&self) -> usize {
        let mods = self.mods.read().await;
        mods.len()
    }

    /// 비어있는지 확인
    pub async fn is_empty(&self) -> bool {
        let mods = self.mods.read().await;
        mods.is_empty()
    }
}

impl Default for ModRegistry {
    fn default() -> Self {
        Self::new()
    }
}
