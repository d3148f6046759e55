//! Transport adapter
//!
//! The core only needs a way to push a JSON payload toward a peer address;
//! real network transports implement `Transport` out of tree. `Router` is
//! the in-process implementation used by tests and the REPL: `send` only
//! enqueues, and `deliver_all` drains the queue one message at a time, so
//! every document mutation stays on one logical thread.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::warn;

use crate::owner::Owner;
use crate::ProtocolResult;

/// Outbound message sink keyed by peer address.
pub trait Transport {
    fn send(&self, from: &str, to: &str, payload: &str) -> ProtocolResult<()>;
}

struct Envelope {
    from: String,
    to: String,
    payload: String,
}

/// In-process message bus connecting owners by address.
#[derive(Default)]
pub struct Router {
    clients: RefCell<HashMap<String, Rc<RefCell<Owner>>>>,
    queue: RefCell<VecDeque<Envelope>>,
}

impl Router {
    pub fn new() -> Rc<Router> {
        Rc::new(Router::default())
    }

    /// Attach an owner at its address.
    pub fn register(&self, address: impl Into<String>, owner: Rc<RefCell<Owner>>) {
        self.clients.borrow_mut().insert(address.into(), owner);
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Drain the queue, dispatching each payload to the owner registered at
    /// its destination. Messages sent during dispatch land on the same
    /// queue and are drained in the same call. Returns the delivery count.
    pub fn deliver_all(&self) -> usize {
        let mut delivered = 0;
        loop {
            let envelope = match self.queue.borrow_mut().pop_front() {
                Some(envelope) => envelope,
                None => break,
            };
            let client = self.clients.borrow().get(&envelope.to).cloned();
            match client {
                Some(owner) => {
                    if let Err(err) = owner
                        .borrow_mut()
                        .on_message(&envelope.from, &envelope.payload)
                    {
                        warn!(to = %envelope.to, error = %err, "message handling failed");
                    }
                    delivered += 1;
                }
                None => {
                    warn!(to = %envelope.to, "no client at address, dropping message");
                }
            }
        }
        delivered
    }
}

impl Transport for Router {
    fn send(&self, from: &str, to: &str, payload: &str) -> ProtocolResult<()> {
        self.queue.borrow_mut().push_back(Envelope {
            from: from.to_string(),
            to: to.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
