use log::{debug, warn};

use crate::{
    callback::Callback,
    components::Components,
    hook::{Hook, HookSet, Op},
    learner::State,
    signal::Flow,
};

/// Identifies a callback registered in a `CallbackSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

struct Entry<T: Components> {
    id: CallbackId,
    order: i32,
    hooks: HookSet,
    exclusive: HookSet,
    cb: Box<dyn Callback<T>>,
}

/// Who runs when a hook is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Exclusive(usize),
    Ordered(Vec<usize>),
}

/// The callbacks of a learner, kept in registration order.
///
/// Since the handlers of a hook only change when callbacks come and go, each hook's dispatch
/// plan is computed on registration and removal rather than on every dispatch.
pub struct CallbackSet<T: Components> {
    entries: Vec<Entry<T>>,
    plans: Vec<Plan>,
    next_id: u64,
}

impl<T: Components> Default for CallbackSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Components> CallbackSet<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            plans: vec![Plan::Ordered(Vec::new()); Hook::ALL.len()],
            next_id: 0,
        }
    }

    /// Registers `cb` with its own order.
    pub fn add(&mut self, cb: Box<dyn Callback<T>>) -> CallbackId {
        let order = cb.order();
        self.add_with_order(cb, order)
    }

    /// Registers `cb`, overriding its order.
    pub fn add_with_order(&mut self, cb: Box<dyn Callback<T>>, order: i32) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;

        let exclusive = cb.exclusive();
        let hooks = cb.hooks() | exclusive;
        debug!(callback = cb.name(), order = order; "registering callback");

        self.entries.push(Entry {
            id,
            order,
            hooks,
            exclusive,
            cb,
        });
        self.replan();
        id
    }

    /// Unregisters the callback with the given `id`, handing it back.
    pub fn remove(&mut self, id: CallbackId) -> Option<Box<dyn Callback<T>>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(pos);
        self.replan();
        Some(entry.cb)
    }

    pub fn contains(&self, id: CallbackId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The names of the registered callbacks, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.cb.name()).collect()
    }

    /// Whether any callback handles the hook of `op`.
    pub fn provides(&self, op: Op) -> bool {
        match &self.plans[Hook::from(op).index()] {
            Plan::Exclusive(_) => true,
            Plan::Ordered(order) => !order.is_empty(),
        }
    }

    /// Runs every handler of `hook` following its plan.
    ///
    /// # Returns
    /// The first interruption raised by a handler, the remaining ones being skipped.
    pub fn dispatch(&mut self, hook: Hook, learn: &mut State<T>) -> Flow {
        let Self { entries, plans, .. } = self;
        debug!(hook = hook.name(); "dispatching");

        match &plans[hook.index()] {
            Plan::Exclusive(i) => entries[*i].cb.call(hook, learn),
            Plan::Ordered(order) => {
                for &i in order {
                    entries[i].cb.call(hook, learn)?;
                }

                Ok(())
            }
        }
    }

    fn replan(&mut self) {
        self.plans = Hook::ALL.iter().map(|&hook| self.plan(hook)).collect();
    }

    fn plan(&self, hook: Hook) -> Plan {
        let mut claims = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.exclusive.contains(hook));

        if let Some((winner, entry)) = claims.next() {
            let others: Vec<_> = claims.map(|(_, e)| e.cb.name()).collect();
            if !others.is_empty() {
                warn!(
                    "`{hook}` is claimed exclusively by {} and {others:?}, only the former runs",
                    entry.cb.name()
                );
            }

            return Plan::Exclusive(winner);
        }

        let mut order: Vec<_> = (0..self.entries.len())
            .filter(|&i| self.entries[i].hooks.contains(hook))
            .collect();

        order.sort_by_key(|&i| self.entries[i].order);
        Plan::Ordered(order)
    }
}
