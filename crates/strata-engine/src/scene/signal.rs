/// Handle returned by [`PaintSignal::connect`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SlotId(u64);

struct Slot<T, C> {
    id: SlotId,
    priority: i32,
    listener: Box<dyn FnMut(&T, &mut C)>,
}

/// Prioritized listener list.
///
/// Higher priorities run first; equal priorities run in connection order.
/// Every listener receives the emitted value and a mutable context.
pub struct PaintSignal<T, C = ()> {
    slots: Vec<Slot<T, C>>,
    next_id: u64,
}

impl<T, C> PaintSignal<T, C> {
    pub fn new() -> Self {
        Self { slots: Vec::new(), next_id: 0 }
    }

    pub fn connect(&mut self, priority: i32, listener: impl FnMut(&T, &mut C) + 'static) -> SlotId {
        let id = SlotId(self.next_id);
        self.next_id += 1;

        let at = self.slots.partition_point(|s| s.priority >= priority);
        self.slots.insert(at, Slot { id, priority, listener: Box::new(listener) });
        id
    }

    /// Returns `false` if `id` was not connected.
    pub fn disconnect(&mut self, id: SlotId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.id != id);
        self.slots.len() != before
    }

    pub fn emit(&mut self, value: &T, ctx: &mut C) {
        for slot in &mut self.slots {
            (slot.listener)(value, ctx);
        }
    }

    /// Emits, calling `at` as if it were a listener connected at `priority`
    /// before any of the current listeners.
    pub fn emit_around<R>(
        &mut self,
        value: &T,
        ctx: &mut C,
        priority: i32,
        at: impl FnOnce(&mut C) -> R,
    ) -> R {
        let split = self.slots.partition_point(|s| s.priority > priority);
        let (before, after) = self.slots.split_at_mut(split);
        for slot in before {
            (slot.listener)(value, ctx);
        }
        let result = at(ctx);
        for slot in after {
            (slot.listener)(value, ctx);
        }
        result
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<T, C> Default for PaintSignal<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C> std::fmt::Debug for PaintSignal<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let priorities: Vec<i32> = self.slots.iter().map(|s| s.priority).collect();
        f.debug_struct("PaintSignal").field("priorities", &priorities).finish()
    }
}
