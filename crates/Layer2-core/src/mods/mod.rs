//! # Mod System
//!
//! ModKit의 콘텐츠/동작 확장 단위인 mod의 라이프사이클 시스템
//!
//! ## 개요
//!
//! mod는 매니페스트로 의존성을 선언하고 배치 단위로 활성화/해제됩니다:
//! - 의존성 위상 정렬로 활성화 순서 확정 (실패 시 배치 전체 중단)
//! - `on_load`에서 이벤트 구독 등록, 핸들은 호스트가 장부로 관리
//! - 단일 mod 핫 리로드 (이전 구독 전부 해지 확인 후 재등록)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ModHost                              │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                    ModRegistry                        │  │
//! │  │  ┌────────────┬────────────┬─────────────────────┐    │  │
//! │  │  │ mod A      │ mod B      │ mod C               │    │  │
//! │  │  │ (active)   │ (active)   │ (reloading)         │    │  │
//! │  │  │ handles[]  │ handles[]  │ handles[]           │    │  │
//! │  │  └────────────┴────────────┴─────────────────────┘    │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! │        │ resolve_load_order          │ subscribe/dispose    │
//! │        ▼                             ▼                      │
//! │  DependencyGraph               EventBus (foundation)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 예시
//!
//! ```ignore
//! struct StormMod;
//!
//! #[async_trait]
//! impl Mod for StormMod {
//!     fn manifest(&self) -> ModManifest {
//!         ModManifest::new("weather.storms", "Storm Weather")
//!             .with_dependency("core.weather")
//!     }
//!
//!     async fn on_load(&self, ctx: &ModContext) -> Result<()> {
//!         ctx.subscribe(|event: &mut WeatherTick| { /* ... */ });
//!         Ok(())
//!     }
//! }
//!
//! // 배치 로드
//! let host = ModHost::new(bus);
//! host.load_batch(vec![Arc::new(StormMod)]).await?;
//! ```

mod host;
mod manifest;
mod registry;
mod resolver;
mod traits;

pub use host::{HostSummary, ModHost, ModHostConfig, ModSubscriptionAudit};
pub use manifest::{ModDependency, ModManifest, ModVersion};
pub use registry::{ModInfo, ModRegistry};
pub use resolver::{resolve_load_order, DependencyError, DependencyGraph};
pub use traits::{Mod, ModContext, ModState};
