//! Mod 라이프사이클 통합 테스트 - 핫 리로드 스트레스 / 누수 / 취소 흐름 검증
//!
//! `cargo test -p modkit-core --test lifecycle`

use async_trait::async_trait;
use modkit_core::{Mod, ModContext, ModHost, ModManifest};
use modkit_foundation::event::{CancelState, Cancellable, EntityId, EntityScoped, EventBus};
use modkit_foundation::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct WeatherTick {
    intensity: u32,
}

struct DoorOpening {
    entity: EntityId,
    cancel: CancelState,
}

impl EntityScoped for DoorOpening {
    fn entity(&self) -> EntityId {
        self.entity
    }
}

impl Cancellable for DoorOpening {
    fn cancel_state(&self) -> &CancelState {
        &self.cancel
    }

    fn cancel_state_mut(&mut self) -> &mut CancelState {
        &mut self.cancel
    }
}

/// 날씨 핸들러 여러 개를 등록하는 mod
struct WeatherMod {
    handlers: usize,
    ticks: Arc<AtomicUsize>,
}

#[async_trait]
impl Mod for WeatherMod {
    fn manifest(&self) -> ModManifest {
        ModManifest::new("weather.core", "Core Weather")
    }

    async fn on_load(&self, ctx: &ModContext) -> Result<()> {
        for _ in 0..self.handlers {
            let ticks = Arc::clone(&self.ticks);
            ctx.subscribe(move |event: &mut WeatherTick| {
                event.intensity = event.intensity.wrapping_add(1);
                ticks.fetch_add(1, Ordering::SeqCst);
            });
        }
        Ok(())
    }
}

/// 엔티티 7의 문 열기를 차단하는 mod
struct GuardMod {
    blocked: Arc<AtomicUsize>,
}

#[async_trait]
impl Mod for GuardMod {
    fn manifest(&self) -> ModManifest {
        ModManifest::new("guard.doors", "Door Guard")
    }

    async fn on_load(&self, ctx: &ModContext) -> Result<()> {
        let blocked = Arc::clone(&self.blocked);
        ctx.subscribe_entity(EntityId(7), move |event: &mut DoorOpening| {
            blocked.fetch_add(1, Ordering::SeqCst);
            event.prevent_default("guarded door");
        });
        Ok(())
    }
}

#[tokio::test]
async fn test_hot_reload_stress_leaves_no_leaked_subscriptions() {
    let bus = Arc::new(EventBus::new());
    let host = ModHost::new(Arc::clone(&bus));

    let weather: Arc<dyn Mod> = Arc::new(WeatherMod {
        handlers: 5,
        ticks: Arc::new(AtomicUsize::new(0)),
    });
    host.load_batch(vec![weather]).await.unwrap();
    assert_eq!(bus.subscriber_count::<WeatherTick>(), 5);

    for _ in 0..1000 {
        host.reload("weather.core").await.unwrap();
        assert_eq!(bus.subscriber_count::<WeatherTick>(), 5);
    }

    let audit = host.subscription_audit().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].handle_count, 5);
    assert_eq!(audit[0].live_count, 5);

    host.unload("weather.core").await.unwrap();
    assert_eq!(bus.total_subscriber_count(), 0);
    assert!(bus.registered_event_types().is_empty());
}

#[tokio::test]
async fn test_publisher_observes_mod_cancellation() {
    let bus = Arc::new(EventBus::new());
    let host = ModHost::new(Arc::clone(&bus));

    let blocked = Arc::new(AtomicUsize::new(0));
    let guard: Arc<dyn Mod> = Arc::new(GuardMod {
        blocked: Arc::clone(&blocked),
    });
    host.load_batch(vec![guard]).await.unwrap();

    // 스코프 밖의 엔티티는 통과
    let mut open_other = DoorOpening {
        entity: EntityId(3),
        cancel: CancelState::new(),
    };
    bus.publish(&mut open_other);
    assert!(!open_other.is_cancelled());

    // 지키는 엔티티는 발행자가 취소를 관찰하고 기본 동작을 대체해야 함
    let mut open_guarded = DoorOpening {
        entity: EntityId(7),
        cancel: CancelState::new(),
    };
    bus.publish(&mut open_guarded);
    assert!(open_guarded.is_cancelled());
    assert_eq!(open_guarded.cancellation_reason(), Some("guarded door"));
    assert_eq!(blocked.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_publishing_concurrently_with_reload_is_safe() {
    let bus = Arc::new(EventBus::new());
    let host = ModHost::new(Arc::clone(&bus));

    let ticks = Arc::new(AtomicUsize::new(0));
    let weather: Arc<dyn Mod> = Arc::new(WeatherMod {
        handlers: 3,
        ticks: Arc::clone(&ticks),
    });
    host.load_batch(vec![weather]).await.unwrap();

    // 발행은 동기이므로 블로킹 스레드에서 수행
    let publisher_bus = Arc::clone(&bus);
    let publisher = std::thread::spawn(move || {
        for i in 0..2000 {
            let mut event = WeatherTick { intensity: i };
            publisher_bus.publish(&mut event);
        }
    });

    for _ in 0..100 {
        host.reload("weather.core").await.unwrap();
    }

    publisher.join().expect("publisher thread panicked");

    // 리로드가 끼어들어도 구독자 수는 일정하게 유지된다
    assert_eq!(bus.subscriber_count::<WeatherTick>(), 3);
    let audit = host.subscription_audit().await;
    assert_eq!(audit[0].live_count, 3);

    host.unload_all().await.unwrap();
    assert_eq!(bus.total_subscriber_count(), 0);
}
