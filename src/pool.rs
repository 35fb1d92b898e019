//! Client pool (C4, §4.4).
//!
//! A slab of live `Client`s indexed by `mio::Token`, plus the replenishment
//! loop that brings the pool back up to its target size after clients are
//! disposed. Grounded in `roughenough-server::backend::mio_backend`'s
//! token-indexed connection table.

use std::io;
use std::time::Duration;

use mio::{Interest, Registry, Token};

use crate::client::Client;

/// Pause briefly every this many connects so a large `-c` doesn't open
/// thousands of sockets in one poll-loop turn (§4.4).
const CONNECT_BATCH: usize = 64;
const CONNECT_PAUSE: Duration = Duration::from_millis(50);

pub struct ClientPool {
    slots: Vec<Option<Client>>,
    free: Vec<usize>,
    live: usize,
}

impl ClientPool {
    pub fn with_capacity(capacity: usize) -> Self {
        ClientPool {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Client> {
        self.slots.get_mut(token.0).and_then(|s| s.as_mut())
    }

    /// Registers `client` for write readiness and stores it, reusing a
    /// vacated slot when one exists so tokens stay dense.
    pub fn insert(&mut self, registry: &Registry, mut client: Client) -> io::Result<Token> {
        let token = if let Some(idx) = self.free.pop() {
            Token(idx)
        } else {
            self.slots.push(None);
            Token(self.slots.len() - 1)
        };
        let interest = client.initial_interest();
        registry.register(client.register_interest(), token, interest)?;
        self.slots[token.0] = Some(client);
        self.live += 1;
        Ok(token)
    }

    /// Removes and drops the client at `token`, deregistering it first.
    pub fn remove(&mut self, registry: &Registry, token: Token) {
        if let Some(mut client) = self.slots.get_mut(token.0).and_then(Option::take) {
            let _ = registry.deregister(client.register_interest());
            self.free.push(token.0);
            self.live -= 1;
        }
    }

    pub fn reregister(&mut self, registry: &Registry, token: Token, interest: Interest) -> io::Result<()> {
        if let Some(client) = self.get_mut(token) {
            registry.reregister(client.register_interest(), token, interest)?;
        }
        Ok(())
    }

    pub fn iter_tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| Token(i)))
    }
}

/// Tops the pool back up to `target` live clients by calling `construct`
/// repeatedly, pausing every [`CONNECT_BATCH`] connects (§4.4).
pub fn replenish<F>(
    pool: &mut ClientPool,
    registry: &Registry,
    target: usize,
    mut construct: F,
) -> io::Result<()>
where
    F: FnMut() -> io::Result<Client>,
{
    let mut connected_this_call = 0;
    while pool.live_count() < target {
        let client = construct()?;
        pool.insert(registry, client)?;
        connected_this_call += 1;
        if connected_this_call % CONNECT_BATCH == 0 {
            std::thread::sleep(CONNECT_PAUSE);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_freed_slots_before_growing() {
        // insert/remove exercised at the eventloop level via a live mio
        // Registry; here we just check the free-list bookkeeping directly.
        let mut pool = ClientPool::with_capacity(4);
        pool.slots.push(None);
        pool.free.push(0);
        assert_eq!(pool.free.pop(), Some(0));
    }
}
