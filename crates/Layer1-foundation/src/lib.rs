//! # modkit-foundation
//!
//! Foundation layer for ModKit:
//! - Error: 중앙 에러 타입 (`Error`, `Result`)
//! - Event: 이벤트 계약 타입 (Cancellable, Entity/Tile 스코프)
//! - EventBus: 타입 키 기반 발행/구독 디스패처
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Publisher (movement, collision, dialogue, weather...)  │
//! │                     │ publish::<E>(&mut event)          │
//! │                     ▼                                   │
//! │  EventBus                                               │
//! │  ├── TypeId(E) ──► HandlerSnapshot (copy-on-write)      │
//! │  │                 ├── handler-0  (mod A)               │
//! │  │                 ├── handler-3  (mod B, entity 필터)  │
//! │  │                 └── handler-7  (mod C)               │
//! │  └── 핸들러 패닉 격리 (catch_unwind + 로그)             │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod event;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Event (계약 타입 및 버스)
// ============================================================================
pub use event::{
    BusMetricsSnapshot, CancelState, Cancellable, EntityId, EntityScoped, Event, EventBus,
    EventBusConfig, EventTypeMetrics, HandlerId, SubscribeOptions, SubscriptionHandle, TileCoord,
    TileScoped,
};
