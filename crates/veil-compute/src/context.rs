//! Per-call ledger context.
//!
//! A [`Context`] is what the ledger hands the keeper for one message: the
//! state store, the block header, the raw transaction, a gas meter and an
//! event sink. Clones share all of them.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use veil_storage::{CacheStore, KvStore};
use veil_types::Event;

use crate::{KeeperError, KeeperResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: u64,
    /// Unix seconds
    pub time: u64,
}

impl BlockHeader {
    pub fn new(chain_id: impl Into<String>, height: u64, time: u64) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
        }
    }
}

/// Ledger gas meter
#[derive(Debug)]
pub struct GasMeter {
    limit: u64,
    consumed: AtomicU64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            consumed: AtomicU64::new(0),
        }
    }

    pub fn infinite() -> Self {
        Self::new(u64::MAX)
    }

    /// Charge `amount`. On overflow the meter is left exhausted beyond its
    /// limit and the call must abort.
    pub fn consume(&self, amount: u64, descriptor: &str) -> KeeperResult<()> {
        let consumed = self.consumed.load(Ordering::SeqCst).saturating_add(amount);
        self.consumed.store(consumed, Ordering::SeqCst);
        if consumed > self.limit {
            return Err(KeeperError::OutOfGas {
                limit: self.limit,
                consumed,
                descriptor: descriptor.to_string(),
            });
        }
        Ok(())
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed())
    }
}

/// Ordered event sink
#[derive(Debug, Default)]
pub struct EventManager {
    events: Mutex<Vec<Event>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = Event>) {
        self.events.lock().extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Events emitted after the first `from`
    pub fn events_since(&self, from: usize) -> Vec<Event> {
        self.events.lock().iter().skip(from).cloned().collect()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }
}

#[derive(Clone)]
pub struct Context {
    store: Arc<dyn KvStore>,
    header: BlockHeader,
    tx_bytes: Arc<[u8]>,
    gas_meter: Arc<GasMeter>,
    events: Arc<EventManager>,
}

impl Context {
    /// Context with no transaction and an infinite gas meter
    pub fn new(store: Arc<dyn KvStore>, header: BlockHeader) -> Self {
        Self {
            store,
            header,
            tx_bytes: Arc::from(Vec::new()),
            gas_meter: Arc::new(GasMeter::infinite()),
            events: Arc::new(EventManager::new()),
        }
    }

    pub fn with_tx_bytes(mut self, tx_bytes: Vec<u8>) -> Self {
        self.tx_bytes = tx_bytes.into();
        self
    }

    /// Sibling context sharing everything but the gas meter
    pub fn with_gas_meter(&self, meter: GasMeter) -> Self {
        Self {
            gas_meter: Arc::new(meter),
            ..self.clone()
        }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    pub fn block_height(&self) -> u64 {
        self.header.height
    }

    pub fn block_time(&self) -> u64 {
        self.header.time
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn gas_meter(&self) -> &GasMeter {
        &self.gas_meter
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    /// Branch this context. Writes and events stay in the branch until
    /// [`CacheContext::commit`]; the gas meter is shared.
    pub fn cache_context(&self) -> CacheContext {
        let cache = Arc::new(CacheStore::new(self.store.clone()));
        let ctx = Self {
            store: cache.clone(),
            events: Arc::new(EventManager::new()),
            ..self.clone()
        };
        CacheContext {
            cache,
            ctx,
            parent_events: self.events.clone(),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("header", &self.header)
            .field("tx_bytes", &self.tx_bytes.len())
            .field("gas_meter", &self.gas_meter)
            .finish()
    }
}

/// A branched context. Dropping it without committing discards the branch.
pub struct CacheContext {
    cache: Arc<CacheStore>,
    ctx: Context,
    parent_events: Arc<EventManager>,
}

impl CacheContext {
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn commit(self) -> KeeperResult<()> {
        self.cache.write()?;
        self.parent_events.emit_all(self.ctx.events.take());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_storage::MemoryStore;

    fn ctx() -> Context {
        Context::new(Arc::new(MemoryStore::new()), BlockHeader::new("veil-test", 1, 100))
    }

    #[test]
    fn test_gas_meter_out_of_gas() {
        let meter = GasMeter::new(10);
        meter.consume(4, "a").unwrap();
        assert_eq!(meter.remaining(), 6);
        let err = meter.consume(7, "b").unwrap_err();
        assert!(matches!(err, KeeperError::OutOfGas { limit: 10, consumed: 11, .. }));
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn test_infinite_meter_saturates() {
        let meter = GasMeter::infinite();
        meter.consume(u64::MAX, "all").unwrap();
        assert!(meter.consume(1, "more").is_ok());
        assert_eq!(meter.consumed(), u64::MAX);
    }

    #[test]
    fn test_cache_context_commit() {
        let parent = ctx();
        let cache = parent.cache_context();
        cache.context().store().set(b"k", b"v").unwrap();
        cache.context().events().emit(Event::new("test"));
        assert_eq!(parent.store().get(b"k").unwrap(), None);
        assert!(parent.events().is_empty());

        cache.commit().unwrap();
        assert_eq!(parent.store().get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(parent.events().len(), 1);
    }

    #[test]
    fn test_cache_context_drop_discards() {
        let parent = ctx();
        {
            let cache = parent.cache_context();
            cache.context().store().set(b"k", b"v").unwrap();
            cache.context().gas_meter().consume(5, "shared").unwrap();
        }
        assert_eq!(parent.store().get(b"k").unwrap(), None);
        assert_eq!(parent.gas_meter().consumed(), 5);
    }

    #[test]
    fn test_with_gas_meter_keeps_store() {
        let parent = ctx();
        let sibling = parent.with_gas_meter(GasMeter::new(50));
        sibling.store().set(b"k", b"v").unwrap();
        assert_eq!(parent.store().get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(sibling.gas_meter().limit(), 50);
        assert_eq!(parent.gas_meter().limit(), u64::MAX);
    }
}
