//! Command hooks around each phase of a tick
//!
//! Hooks are invoked in reverse registration order. The controller
//! snapshots the list before invoking, so a hook may add or remove hooks
//! (including itself) without disturbing the current pass.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::state::Controller;

/// Points in the tick where hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookPoint {
    BeforeForces,
    AfterForces,
    BeforeMovement,
    AfterMovement,
    BeforeCollisions,
    AfterCollisions,
}

impl HookPoint {
    pub const ALL: [HookPoint; 6] = [
        HookPoint::BeforeForces,
        HookPoint::AfterForces,
        HookPoint::BeforeMovement,
        HookPoint::AfterMovement,
        HookPoint::BeforeCollisions,
        HookPoint::AfterCollisions,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Handle returned when a hook is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u64);

/// A hook callback
pub type Hook = Rc<dyn Fn(&mut Controller)>;

/// Registered hooks, one list per point
#[derive(Default, Clone)]
pub struct Hooks {
    lists: [Vec<(HookId, Hook)>; 6],
    next_id: u64,
}

impl Hooks {
    pub fn add(&mut self, point: HookPoint, hook: Hook) -> HookId {
        let id = HookId(self.next_id);
        self.next_id += 1;
        self.lists[point.index()].push((id, hook));
        id
    }

    /// Remove a hook wherever it is registered
    pub fn remove(&mut self, id: HookId) -> bool {
        for list in &mut self.lists {
            if let Some(pos) = list.iter().position(|(hook_id, _)| *hook_id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn len(&self, point: HookPoint) -> usize {
        self.lists[point.index()].len()
    }

    pub fn is_empty(&self, point: HookPoint) -> bool {
        self.lists[point.index()].is_empty()
    }

    /// Hooks for a point, already in invocation order
    pub fn snapshot(&self, point: HookPoint) -> Vec<Hook> {
        self.lists[point.index()]
            .iter()
            .rev()
            .map(|(_, hook)| hook.clone())
            .collect()
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(HookPoint, usize)> = HookPoint::ALL.iter().map(|&p| (p, self.len(p))).collect();
        f.debug_struct("Hooks").field("counts", &counts).finish()
    }
}
