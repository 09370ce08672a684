//! In-memory broker for topology tests

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{QueueError, QueueResult};
use crate::topology::{BindingSpec, Declare, ExchangeSpec, QueueSpec};

/// Broker model enforcing AMQP's "redeclare must match" rule
#[derive(Default)]
pub(crate) struct FakeBroker {
    pub(crate) exchanges: Mutex<HashMap<String, ExchangeSpec>>,
    pub(crate) queues: Mutex<HashMap<String, QueueSpec>>,
    pub(crate) bindings: Mutex<HashSet<(String, String, String)>>,
}

#[async_trait]
impl Declare for FakeBroker {
    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> QueueResult<()> {
        let mut exchanges = self.exchanges.lock();
        match exchanges.get(&exchange.name) {
            Some(existing) if existing != exchange => Err(QueueError::Mismatch {
                kind: "exchange",
                name: exchange.name.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                exchanges.insert(exchange.name.clone(), exchange.clone());
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, queue: &QueueSpec) -> QueueResult<()> {
        let mut queues = self.queues.lock();
        match queues.get(&queue.name) {
            Some(existing) if existing != queue => Err(QueueError::Mismatch {
                kind: "queue",
                name: queue.name.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                queues.insert(queue.name.clone(), queue.clone());
                Ok(())
            }
        }
    }

    async fn bind_queue(&self, binding: &BindingSpec) -> QueueResult<()> {
        if !self.queues.lock().contains_key(&binding.queue)
            || !self.exchanges.lock().contains_key(&binding.exchange)
        {
            return Err(QueueError::NotConnected);
        }
        self.bindings.lock().insert((
            binding.queue.clone(),
            binding.exchange.clone(),
            binding.routing_key.clone(),
        ));
        Ok(())
    }
}
