//! Event System - 타입 키 기반 발행/구독
//!
//! 모든 서브시스템(이동, 충돌, 대화, 날씨, 렌더링 훅)과 mod가 이 버스를
//! 통해 통신합니다.
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EventBus                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  publish::<E>(&mut event)                           │    │
//! │  │      │  TypeId(E)로 스냅샷 조회 (없으면 fast path)  │    │
//! │  │      ▼                                              │    │
//! │  │  HandlerSnapshot (불변, copy-on-write)              │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │         │ 등록 순서대로, 호출 스레드에서 동기 실행          │
//! │         ▼                                                   │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │  handler-0   │  │  handler-3   │  │  handler-7   │       │
//! │  │  (패닉 격리) │  │  (필터 구독) │  │  (계측 옵션) │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 사용법
//!
//! ```ignore
//! use modkit_foundation::event::{EventBus, Cancellable, CancelState};
//!
//! struct DoorOpening { cancel: CancelState }
//! impl Cancellable for DoorOpening { /* cancel_state 접근자 */ }
//!
//! let bus = Arc::new(EventBus::new());
//!
//! // 1. 구독 (핸들은 hot-reload 시 해지에 사용)
//! let handle = bus.subscribe(|event: &mut DoorOpening| {
//!     event.prevent_default("locked");
//! });
//!
//! // 2. 발행 후 취소 여부 확인은 발행자 책임
//! let mut event = DoorOpening { cancel: CancelState::new() };
//! bus.publish(&mut event);
//! if event.is_cancelled() {
//!     // 기본 동작 대신 차단 동작 수행
//! }
//!
//! // 3. 해지 (멱등)
//! bus.unsubscribe(&handle);
//! ```

pub mod bus;
pub mod metrics;
pub mod types;

// Re-exports
pub use bus::{EventBus, EventBusConfig, HandlerId, SubscribeOptions, SubscriptionHandle};
pub use metrics::{BusMetricsSnapshot, EventTypeMetrics};
pub use types::{CancelState, Cancellable, EntityId, EntityScoped, Event, TileCoord, TileScoped};
