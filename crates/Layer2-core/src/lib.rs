//! # modkit-core
//!
//! Core runtime for ModKit:
//! - Manifest: mod 메타데이터 (id, 버전, 의존성)
//! - Resolver: 의존성 그래프 위상 정렬 (fail-fast)
//! - Lifecycle: `Discovered → ... → Active → (Reloading | Unloading)`
//! - Host: 배치 로드/핫 리로드/teardown 조정
//!
//! 이벤트 계약과 버스는 `modkit-foundation`이 제공하며, 이 크레이트는
//! mod가 등록한 구독의 소유권 장부를 관리합니다 (버스는 소유자를
//! 추적하지 않습니다).

pub mod mods;

pub use mods::{
    DependencyError, DependencyGraph, HostSummary, Mod, ModContext, ModDependency, ModHost,
    ModHostConfig, ModManifest, ModRegistry, ModState, ModSubscriptionAudit, ModVersion,
    resolve_load_order,
};
