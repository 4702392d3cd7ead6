use super::NodeId;
use crate::config::Limit;

/// An ordered or unordered container of records and sub-groups. The
/// runtime cursor walks the distinct `order` ranks of its children;
/// occurrence counters track started iterations of the whole group.
pub(crate) struct Group {
    pub name: String,
    pub min_occurs: u32,
    pub max_occurs: Limit,
    pub ordered: bool,
    /// Children in declaration order, with their order ranks alongside.
    pub children: Vec<NodeId>,
    pub child_orders: Vec<u32>,
    /// Distinct order ranks, ascending.
    pub orders: Vec<u32>,
    pub count: u32,
    pub pos_idx: usize,
    /// Whether the current iteration has matched anything yet.
    pub started: bool,
}

impl Group {
    pub fn new(
        name: String,
        min_occurs: u32,
        max_occurs: Limit,
        ordered: bool,
        children: Vec<NodeId>,
        child_orders: Vec<u32>,
    ) -> Self {
        let mut orders: Vec<u32> = child_orders.clone();
        orders.sort_unstable();
        orders.dedup();
        Self {
            name,
            min_occurs,
            max_occurs,
            ordered,
            children,
            child_orders,
            orders,
            count: 0,
            pos_idx: 0,
            started: false,
        }
    }

    /// Children at the given order rank, in declaration order.
    pub fn children_at(&self, order: u32) -> Vec<NodeId> {
        self.children
            .iter()
            .zip(&self.child_orders)
            .filter(|(_, o)| **o == order)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Rewinds the cursor for a fresh iteration of the group.
    pub fn rewind(&mut self) {
        self.pos_idx = 0;
        self.started = false;
    }
}
