use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use piecework_kv::{InMemoryKvStore, KvError, KvStore};
use piecework_polling::{
  DedupeStrategy, FetchError, ManualClock, PollContext, PollError, PollInput, PolledItem, Poller,
  PollingConfig, PollingCursor, PollingTrigger, TriggerState, poller_fn,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Returns whatever batch it currently holds, or fails when told to.
#[derive(Default)]
struct ScriptedPoller {
  batch: Mutex<Vec<PolledItem>>,
  fail: AtomicBool,
  calls: AtomicUsize,
  seen: Mutex<Vec<PollContext>>,
}

impl ScriptedPoller {
  fn set_batch(&self, batch: Vec<PolledItem>) {
    *self.batch.lock().unwrap() = batch;
  }
}

#[async_trait]
impl Poller for ScriptedPoller {
  async fn items(&self, ctx: PollContext) -> Result<Vec<PolledItem>, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.seen.lock().unwrap().push(ctx);
    if self.fail.load(Ordering::SeqCst) {
      return Err(FetchError::new("upstream returned 503"));
    }
    Ok(self.batch.lock().unwrap().clone())
  }
}

/// A store whose writes can be made to fail.
struct FlakyStore {
  inner: InMemoryKvStore,
  fail_puts: AtomicBool,
}

#[async_trait]
impl KvStore for FlakyStore {
  async fn get(&self, key: &str) -> Result<Option<Value>, KvError> {
    self.inner.get(key).await
  }

  async fn put(&self, key: &str, value: Value) -> Result<(), KvError> {
    if self.fail_puts.load(Ordering::SeqCst) {
      return Err(KvError::backend("disk full"));
    }
    self.inner.put(key, value).await
  }

  async fn delete(&self, key: &str) -> Result<(), KvError> {
    self.inner.delete(key).await
  }
}

fn timebased(poller: Arc<ScriptedPoller>, clock: Arc<ManualClock>) -> PollingTrigger {
  PollingTrigger::new(
    "flow-1/new-row",
    DedupeStrategy::Timebased,
    poller,
    Arc::new(InMemoryKvStore::new()),
  )
  .with_clock(clock)
}

fn input() -> PollInput {
  PollInput::new(
    Some(json!({ "token": "t" })),
    json!({ "sheet": "s1" }).as_object().cloned().unwrap(),
  )
}

#[tokio::test]
async fn test_timebased_scenario() {
  let poller = Arc::new(ScriptedPoller::default());
  let clock = Arc::new(ManualClock::new(1000));
  let trigger = timebased(poller.clone(), clock);
  let cancel = CancellationToken::new();

  assert_eq!(trigger.state().await.unwrap(), TriggerState::Disabled);
  trigger.on_enable(&input(), &cancel).await.unwrap();
  assert_eq!(trigger.state().await.unwrap(), TriggerState::Enabled);
  // Enabling stores the clock, without fetching.
  assert_eq!(poller.calls.load(Ordering::SeqCst), 0);
  assert_eq!(
    trigger.cursor().await.unwrap(),
    Some(PollingCursor::timebased(1000))
  );

  poller.set_batch(vec![
    PolledItem::at(900, json!("A")),
    PolledItem::at(1500, json!("B")),
    PolledItem::at(2000, json!("C")),
  ]);

  let items = trigger.run(&input(), &cancel).await.unwrap();
  assert_eq!(items, vec![json!("B"), json!("C")]);
  assert_eq!(
    trigger.cursor().await.unwrap(),
    Some(PollingCursor::timebased(2000))
  );

  let seen = poller.seen.lock().unwrap();
  assert_eq!(seen[0].last_fetch_epoch_ms, Some(1000));
  assert_eq!(seen[0].props_value["sheet"], json!("s1"));
  drop(seen);

  // Same batch again: nothing new, and no redelivery.
  let items = trigger.run(&input(), &cancel).await.unwrap();
  assert!(items.is_empty());
}

#[tokio::test]
async fn test_cursor_is_non_decreasing() {
  let poller = Arc::new(ScriptedPoller::default());
  let trigger = timebased(poller.clone(), Arc::new(ManualClock::new(0)));
  let cancel = CancellationToken::new();
  trigger.on_enable(&input(), &cancel).await.unwrap();

  let batches = [vec![500, 300], vec![100], vec![], vec![700, 650], vec![10]];
  let mut previous = 0;
  for batch in batches {
    poller.set_batch(
      batch
        .iter()
        .map(|epoch| PolledItem::at(*epoch, json!(epoch)))
        .collect(),
    );
    let items = trigger.run(&input(), &cancel).await.unwrap();
    for item in &items {
      assert!(item.as_i64().unwrap() > previous);
    }

    let cursor = trigger.cursor().await.unwrap().unwrap();
    let current = cursor.last_fetch_epoch_ms.unwrap();
    assert!(current >= previous);
    previous = current;
  }
  assert_eq!(previous, 700);
}

#[tokio::test]
async fn test_test_never_mutates_cursor() {
  let poller = Arc::new(ScriptedPoller::default());
  let trigger = timebased(poller.clone(), Arc::new(ManualClock::new(1000)));
  let cancel = CancellationToken::new();
  trigger.on_enable(&input(), &cancel).await.unwrap();

  poller.set_batch(vec![PolledItem::at(5000, json!("new"))]);
  for _ in 0..3 {
    let items = trigger.test(&input(), &cancel).await.unwrap();
    assert_eq!(items, vec![json!("new")]);
  }
  assert_eq!(
    trigger.cursor().await.unwrap(),
    Some(PollingCursor::timebased(1000))
  );
}

#[tokio::test]
async fn test_failed_fetch_keeps_cursor() {
  let poller = Arc::new(ScriptedPoller::default());
  let trigger = timebased(poller.clone(), Arc::new(ManualClock::new(1000)));
  let cancel = CancellationToken::new();
  trigger.on_enable(&input(), &cancel).await.unwrap();

  poller.fail.store(true, Ordering::SeqCst);
  let result = trigger.run(&input(), &cancel).await;
  assert!(matches!(result, Err(PollError::Fetch(_))));
  assert_eq!(
    trigger.cursor().await.unwrap(),
    Some(PollingCursor::timebased(1000))
  );

  // The items are still delivered once the source recovers.
  poller.fail.store(false, Ordering::SeqCst);
  poller.set_batch(vec![PolledItem::at(1200, json!("late"))]);
  let items = trigger.run(&input(), &cancel).await.unwrap();
  assert_eq!(items, vec![json!("late")]);
}

#[tokio::test]
async fn test_failed_cursor_write_delivers_nothing() {
  let poller = Arc::new(ScriptedPoller::default());
  let store = Arc::new(FlakyStore {
    inner: InMemoryKvStore::new(),
    fail_puts: AtomicBool::new(false),
  });
  let trigger = PollingTrigger::new(
    "flow-1/new-row",
    DedupeStrategy::Timebased,
    poller.clone(),
    store.clone(),
  )
  .with_clock(Arc::new(ManualClock::new(1000)));
  let cancel = CancellationToken::new();
  trigger.on_enable(&input(), &cancel).await.unwrap();

  poller.set_batch(vec![PolledItem::at(1500, json!("B"))]);
  store.fail_puts.store(true, Ordering::SeqCst);
  let result = trigger.run(&input(), &cancel).await;
  assert!(matches!(result, Err(PollError::Store(_))));

  store.fail_puts.store(false, Ordering::SeqCst);
  let items = trigger.run(&input(), &cancel).await.unwrap();
  assert_eq!(items, vec![json!("B")]);
}

#[tokio::test]
async fn test_cancelled_poll_keeps_cursor() {
  let slow = poller_fn(|_ctx| async {
    tokio::time::sleep(Duration::from_secs(60)).await;
    Ok(vec![PolledItem::at(5000, json!("never"))])
  });
  let trigger = PollingTrigger::new(
    "flow-1/slow",
    DedupeStrategy::Timebased,
    slow,
    Arc::new(InMemoryKvStore::new()),
  )
  .with_clock(Arc::new(ManualClock::new(1000)));

  trigger
    .on_enable(&input(), &CancellationToken::new())
    .await
    .unwrap();

  let cancel = CancellationToken::new();
  let canceller = cancel.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(20)).await;
    canceller.cancel();
  });

  let result = trigger.run(&input(), &cancel).await;
  assert!(matches!(result, Err(PollError::Cancelled)));
  assert_eq!(
    trigger.cursor().await.unwrap(),
    Some(PollingCursor::timebased(1000))
  );
}

#[tokio::test]
async fn test_timeout_aborts_poll() {
  let slow = poller_fn(|_ctx| async {
    tokio::time::sleep(Duration::from_secs(60)).await;
    Ok(vec![])
  });
  let trigger = PollingTrigger::new(
    "flow-1/slow",
    DedupeStrategy::Timebased,
    slow,
    Arc::new(InMemoryKvStore::new()),
  )
  .with_config(PollingConfig {
    timeout_ms: Some(20),
    ..Default::default()
  });

  let result = trigger.run(&input(), &CancellationToken::new()).await;
  assert!(matches!(result, Err(PollError::TimedOut { timeout_ms: 20 })));
}

#[tokio::test]
async fn test_max_items_caps_delivery_but_advances_cursor() {
  let poller = Arc::new(ScriptedPoller::default());
  let trigger = timebased(poller.clone(), Arc::new(ManualClock::new(0))).with_config(
    PollingConfig {
      max_items_to_poll: Some(2),
      ..Default::default()
    },
  );
  let cancel = CancellationToken::new();
  trigger.on_enable(&input(), &cancel).await.unwrap();

  poller.set_batch((1..=5).map(|i| PolledItem::at(i * 100, json!(i))).collect());
  let items = trigger.run(&input(), &cancel).await.unwrap();
  assert_eq!(items, vec![json!(1), json!(2)]);
  assert_eq!(
    trigger.cursor().await.unwrap(),
    Some(PollingCursor::timebased(500))
  );
}

#[tokio::test]
async fn test_last_item_lifecycle() {
  let poller = Arc::new(ScriptedPoller::default());
  let trigger = PollingTrigger::new(
    "flow-2/new-email",
    DedupeStrategy::LastItem,
    poller.clone(),
    Arc::new(InMemoryKvStore::new()),
  );
  let cancel = CancellationToken::new();

  poller.set_batch(vec![
    PolledItem::with_id("m2", json!("m2")),
    PolledItem::with_id("m1", json!("m1")),
  ]);
  trigger.on_enable(&input(), &cancel).await.unwrap();
  assert_eq!(poller.calls.load(Ordering::SeqCst), 1);
  assert_eq!(
    trigger.cursor().await.unwrap(),
    Some(PollingCursor::last_item(Some(json!("m2"))))
  );

  poller.set_batch(vec![
    PolledItem::with_id("m4", json!("m4")),
    PolledItem::with_id("m3", json!("m3")),
    PolledItem::with_id("m2", json!("m2")),
  ]);
  let items = trigger.run(&input(), &cancel).await.unwrap();
  assert_eq!(items, vec![json!("m4"), json!("m3")]);
  assert_eq!(
    poller.seen.lock().unwrap()[1].last_item_id,
    Some(json!("m2"))
  );

  let items = trigger.run(&input(), &cancel).await.unwrap();
  assert!(items.is_empty());

  trigger.on_disable().await.unwrap();
  trigger.on_disable().await.unwrap();
  assert_eq!(trigger.state().await.unwrap(), TriggerState::Disabled);
}

#[tokio::test]
async fn test_last_item_enable_on_empty_feed() {
  let poller = Arc::new(ScriptedPoller::default());
  let trigger = PollingTrigger::new(
    "flow-2/new-email",
    DedupeStrategy::LastItem,
    poller.clone(),
    Arc::new(InMemoryKvStore::new()),
  );
  let cancel = CancellationToken::new();

  trigger.on_enable(&input(), &cancel).await.unwrap();
  assert_eq!(trigger.state().await.unwrap(), TriggerState::Enabled);

  poller.set_batch(vec![PolledItem::with_id("m1", json!("first"))]);
  let items = trigger.run(&input(), &cancel).await.unwrap();
  assert_eq!(items, vec![json!("first")]);
}

#[tokio::test]
async fn test_instances_do_not_share_cursors() {
  let store: Arc<dyn KvStore> = Arc::new(InMemoryKvStore::new());
  let poller = Arc::new(ScriptedPoller::default());
  let clock = Arc::new(ManualClock::new(1000));

  let first = PollingTrigger::new("flow-1/t", DedupeStrategy::Timebased, poller.clone(), store.clone())
    .with_clock(clock.clone());
  let second = PollingTrigger::new("flow-2/t", DedupeStrategy::Timebased, poller, store)
    .with_clock(clock);

  first.on_enable(&input(), &CancellationToken::new()).await.unwrap();
  assert_eq!(first.state().await.unwrap(), TriggerState::Enabled);
  assert_eq!(second.state().await.unwrap(), TriggerState::Disabled);
}
