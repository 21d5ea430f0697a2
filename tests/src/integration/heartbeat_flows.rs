//! # Heartbeat Flows
//!
//! Poll and discovery cadence measured against the tick counter.

#[cfg(test)]
mod tests {
    use super::super::support::*;
    use iot_publisher::PublisherRuntime;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    async fn run_with_poll_interval(interval: u32) -> (u64, u64) {
        let bus = new_bus();
        let runtime = runtime(&bus, "pub1");
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        runtime.on_poll(Arc::new(move |_: &PublisherRuntime| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        runtime.set_poll_interval(interval).unwrap();

        runtime.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        runtime.stop().await;

        (runtime.stats().ticks, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_poll_cadence() {
        for interval in [1_u32, 2, 5] {
            let (ticks, polls) = run_with_poll_interval(interval).await;
            let interval = u64::from(interval);
            assert!(ticks >= 1);
            // polled on the first tick, then once per interval
            assert_eq!(polls, (ticks + interval - 1) / interval, "interval {interval}");
        }
    }

    #[tokio::test]
    async fn test_no_ticks_after_stop() {
        let bus = new_bus();
        let runtime = runtime(&bus, "pub1");
        runtime.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        runtime.stop().await;

        let ticks = runtime.stats().ticks;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(runtime.stats().ticks, ticks);
    }

    #[tokio::test]
    async fn test_discovery_republishes_identity() {
        let bus = new_bus();
        let identities = record(&bus, "test/pub1/$identity");
        let nodes = record(&bus, "test/pub1/+/$node");
        let runtime = runtime(&bus, "pub1");
        add_switch(&runtime);
        runtime.set_discovery_interval(2).unwrap();

        let discovered = Arc::new(AtomicU64::new(0));
        let counter = discovered.clone();
        runtime.on_discovery(Arc::new(move |_: &PublisherRuntime| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        runtime.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        runtime.stop().await;

        let stats = runtime.stats();
        assert_eq!(stats.discoveries, (stats.ticks + 1) / 2);

        // one announcement at start plus at most one per discovery
        let published = identities.lock().len() as u64;
        assert!(published >= stats.discoveries);
        assert!(published <= stats.discoveries + 1);
        assert_eq!(nodes.lock().len(), identities.lock().len());

        // the discovery hook is not awaited; give it a moment to finish
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(discovered.load(Ordering::SeqCst), stats.discoveries);
    }
}
