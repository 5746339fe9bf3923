use super::*;

fn timer(policy: AlertClearPolicy) -> (Arc<StateStore>, AlertTimer) {
    let store = Arc::new(StateStore::default());
    let timer = AlertTimer::new(Arc::clone(&store), DEFAULT_ALERT_DELAY, policy);
    (store, timer)
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn alert_is_visible_then_cleared_after_delay() {
    let (store, timer) = timer(AlertClearPolicy::Unconditional);

    timer.raise(Alert::info("x")).await;
    assert_eq!(store.snapshot().await.alert, Some(Alert::info("x")));

    tokio::time::advance(Duration::from_millis(2999)).await;
    settle().await;
    assert_eq!(store.snapshot().await.alert, Some(Alert::info("x")));

    tokio::time::advance(Duration::from_millis(2)).await;
    settle().await;
    assert_eq!(store.snapshot().await.alert, None);
}

#[tokio::test(start_paused = true)]
async fn earlier_timer_clears_later_alert() {
    let (store, timer) = timer(AlertClearPolicy::Unconditional);

    timer.raise(Alert::info("a")).await;
    tokio::time::advance(Duration::from_millis(1000)).await;
    settle().await;
    timer.raise(Alert::error("b")).await;
    assert_eq!(store.snapshot().await.alert, Some(Alert::error("b")));

    // The first timer fires two seconds into the second alert's lifetime.
    tokio::time::advance(Duration::from_millis(2001)).await;
    settle().await;
    assert_eq!(store.snapshot().await.alert, None);
}

#[tokio::test(start_paused = true)]
async fn latest_only_policy_keeps_newer_alert() {
    let (store, timer) = timer(AlertClearPolicy::LatestOnly);

    timer.raise(Alert::info("a")).await;
    tokio::time::advance(Duration::from_millis(1000)).await;
    settle().await;
    timer.raise(Alert::error("b")).await;

    tokio::time::advance(Duration::from_millis(2001)).await;
    settle().await;
    assert_eq!(store.snapshot().await.alert, Some(Alert::error("b")));

    tokio::time::advance(Duration::from_millis(1000)).await;
    settle().await;
    assert_eq!(store.snapshot().await.alert, None);
}

#[tokio::test(start_paused = true)]
async fn new_alert_overwrites_visible_one() {
    let (store, timer) = timer(AlertClearPolicy::Unconditional);

    timer.raise(Alert::info("first")).await;
    timer.raise(Alert::info("second")).await;
    assert_eq!(store.snapshot().await.alert, Some(Alert::info("second")));
}
