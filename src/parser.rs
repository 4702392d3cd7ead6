pub(crate) mod field;
pub(crate) mod group;
pub(crate) mod property;
pub(crate) mod record;
pub(crate) mod segment;

use crate::context::UnmarshallingContext;
use crate::value::Value;
use crate::{Error, Result};

use fxhash::FxHashMap;
use group::Group;
use record::Record;

/// Arena index of a selector node. Selectors refer to each other by
/// index instead of owning references, so the tree has a single owner.
pub(crate) type NodeId = usize;

pub(crate) enum Selector {
    Group(Group),
    Record(Record),
}

impl Selector {
    pub fn name(&self) -> &str {
        match self {
            Selector::Group(g) => &g.name,
            Selector::Record(r) => &r.name,
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            Selector::Group(g) => g.count,
            Selector::Record(r) => r.count,
        }
    }

    fn set_count(&mut self, count: u32) {
        match self {
            Selector::Group(g) => g.count = count,
            Selector::Record(r) => r.count = count,
        }
    }

    fn min_occurs(&self) -> u32 {
        match self {
            Selector::Group(g) => g.min_occurs,
            Selector::Record(r) => r.min_occurs,
        }
    }
}

/// Outcome of advancing the selector state machine by one record.
pub(crate) enum Match {
    /// The record definition that consumed the event.
    Hit(NodeId),
    /// A definition matched but its maximum occurrences are exhausted.
    Exhausted(NodeId),
    Miss,
}

/// The runtime parser tree: a flat arena of selectors rooted at the
/// stream's group.
pub(crate) struct ParserTree {
    nodes: Vec<Selector>,
    root: NodeId,
}

impl ParserTree {
    pub fn new(nodes: Vec<Selector>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Selector {
        &self.nodes[id]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Selector {
        &mut self.nodes[id]
    }

    pub fn record(&self, id: NodeId) -> &Record {
        match &self.nodes[id] {
            Selector::Record(r) => r,
            Selector::Group(_) => unreachable!("expected a record node"),
        }
    }

    fn record_mut(&mut self, id: NodeId) -> &mut Record {
        match &mut self.nodes[id] {
            Selector::Record(r) => r,
            Selector::Group(_) => unreachable!("expected a record node"),
        }
    }

    fn group(&self, id: NodeId) -> &Group {
        match &self.nodes[id] {
            Selector::Group(g) => g,
            Selector::Record(_) => unreachable!("expected a group node"),
        }
    }

    fn group_mut(&mut self, id: NodeId) -> &mut Group {
        match &mut self.nodes[id] {
            Selector::Group(g) => g,
            Selector::Record(_) => unreachable!("expected a group node"),
        }
    }

    // ---- read-side matching ------------------------------------------------

    /// Advances the state machine for the raw record installed on the
    /// context.
    pub fn match_next_read(&mut self, ctx: &mut UnmarshallingContext) -> Match {
        self.match_read(self.root, ctx)
    }

    fn match_read(&mut self, id: NodeId, ctx: &mut UnmarshallingContext) -> Match {
        match &self.nodes[id] {
            Selector::Record(_) => self.match_record_read(id, ctx),
            Selector::Group(_) => self.match_group_read(id, ctx),
        }
    }

    fn match_record_read(&mut self, id: NodeId, ctx: &mut UnmarshallingContext) -> Match {
        if !self.record(id).matches(ctx.raw()) {
            return Match::Miss;
        }
        if self.record(id).is_max_occurs_reached() {
            return Match::Exhausted(id);
        }
        self.record_mut(id).count += 1;
        Match::Hit(id)
    }

    /// Ordered groups walk a cursor over the distinct order ranks:
    /// children at the current rank are tried in declaration order, and
    /// the cursor may only advance once every child at the rank has
    /// satisfied its minimum occurrences. The cursor commits on a hit;
    /// a miss leaves the group untouched. When every rank is exhausted
    /// and the group may repeat, its children reset and matching
    /// retries from the first rank.
    fn match_group_read(&mut self, id: NodeId, ctx: &mut UnmarshallingContext) -> Match {
        let ordered = self.group(id).ordered;
        let mut local = self.group(id).pos_idx;
        let mut exhausted: Option<NodeId> = None;
        let mut wrapped = false;

        loop {
            let candidates: Vec<NodeId> = if ordered {
                match self.group(id).orders.get(local).copied() {
                    Some(order) => self.group(id).children_at(order),
                    None => Vec::new(),
                }
            } else {
                self.group(id).children.clone()
            };

            for child in &candidates {
                match self.match_read(*child, ctx) {
                    Match::Hit(record) => {
                        let group = self.group_mut(id);
                        group.pos_idx = local;
                        if !group.started {
                            group.started = true;
                            group.count += 1;
                        }
                        return Match::Hit(record);
                    }
                    Match::Exhausted(record) => {
                        if exhausted.is_none() {
                            exhausted = Some(record);
                        }
                    }
                    Match::Miss => {}
                }
            }

            if ordered {
                if let Some(order) = self.group(id).orders.get(local).copied() {
                    if self.children_satisfied_at(id, order) {
                        local += 1;
                        continue;
                    }
                    break;
                }
            }

            // every rank exhausted: repeat the group when it may occur
            // again and the next iteration is known to accept the record
            if wrapped {
                break;
            }
            let can_wrap = {
                let group = self.group(id);
                group.started
                    && group.max_occurs.allows(group.count)
                    && self.children_satisfied(id)
            };
            if can_wrap && self.probe_children_fresh(id, ctx) {
                self.reset_children(id);
                self.group_mut(id).rewind();
                local = 0;
                wrapped = true;
                continue;
            }
            break;
        }

        match exhausted {
            Some(record) => Match::Exhausted(record),
            None => Match::Miss,
        }
    }

    /// Relaxed identifier match ignoring ordering and occurrence state,
    /// used to classify a record on an error path.
    pub fn match_any(&self, ctx: &UnmarshallingContext) -> Option<NodeId> {
        self.nodes.iter().enumerate().find_map(|(id, node)| {
            match node {
                Selector::Record(r) if r.matches(ctx.raw()) => Some(id),
                _ => None,
            }
        })
    }

    fn satisfied(&self, id: NodeId) -> bool {
        match self.node(id) {
            Selector::Record(r) => r.is_satisfied(),
            Selector::Group(g) => {
                if g.count < g.min_occurs {
                    return false;
                }
                !g.started || self.children_satisfied(id)
            }
        }
    }

    fn children_satisfied(&self, id: NodeId) -> bool {
        self.group(id)
            .children
            .iter()
            .all(|child| self.satisfied(*child))
    }

    fn children_satisfied_at(&self, id: NodeId, order: u32) -> bool {
        self.group(id)
            .children_at(order)
            .iter()
            .all(|child| self.satisfied(*child))
    }

    /// Whether this selector, with all occurrence counters zeroed,
    /// would accept the current raw record.
    fn probe_fresh(&self, id: NodeId, ctx: &UnmarshallingContext) -> bool {
        match self.node(id) {
            Selector::Record(r) => r.max_occurs.allows(0) && r.matches(ctx.raw()),
            Selector::Group(_) => self.probe_children_fresh(id, ctx),
        }
    }

    fn probe_children_fresh(&self, id: NodeId, ctx: &UnmarshallingContext) -> bool {
        let group = self.group(id);
        if !group.ordered {
            return group.children.iter().any(|c| self.probe_fresh(*c, ctx));
        }
        for order in &group.orders {
            let children = group.children_at(*order);
            if children.iter().any(|c| self.probe_fresh(*c, ctx)) {
                return true;
            }
            if !children.iter().all(|c| self.node(*c).min_occurs() == 0) {
                return false;
            }
        }
        false
    }

    // ---- write-side matching -----------------------------------------------

    /// Dispatches an outbound value to a record definition, honoring
    /// the same ordering machinery as the read side. Exact name/class
    /// matches win over class-unbound records.
    pub fn match_next_write(&mut self, requested: Option<&str>, value: &Value) -> Match {
        self.match_write(self.root, requested, value, true)
    }

    fn match_write(
        &mut self,
        id: NodeId,
        requested: Option<&str>,
        value: &Value,
        exact: bool,
    ) -> Match {
        match &self.nodes[id] {
            Selector::Record(_) => self.match_record_write(id, requested, value, exact),
            // nested groups run their own two-pass during the exact pass
            Selector::Group(_) if exact => self.match_group_write(id, requested, value),
            Selector::Group(_) => Match::Miss,
        }
    }

    fn match_record_write(
        &mut self,
        id: NodeId,
        requested: Option<&str>,
        value: &Value,
        exact: bool,
    ) -> Match {
        if !self.record(id).defines(requested, value, exact) {
            return Match::Miss;
        }
        if self.record(id).is_max_occurs_reached() {
            return Match::Exhausted(id);
        }
        self.record_mut(id).count += 1;
        Match::Hit(id)
    }

    fn match_group_write(
        &mut self,
        id: NodeId,
        requested: Option<&str>,
        value: &Value,
    ) -> Match {
        let ordered = self.group(id).ordered;
        let mut local = self.group(id).pos_idx;
        let mut exhausted: Option<NodeId> = None;
        let mut wrapped = false;

        loop {
            let candidates: Vec<NodeId> = if ordered {
                match self.group(id).orders.get(local).copied() {
                    Some(order) => self.group(id).children_at(order),
                    None => Vec::new(),
                }
            } else {
                self.group(id).children.clone()
            };

            for exact in &[true, false] {
                for child in &candidates {
                    match self.match_write(*child, requested, value, *exact) {
                        Match::Hit(record) => {
                            let group = self.group_mut(id);
                            group.pos_idx = local;
                            if !group.started {
                                group.started = true;
                                group.count += 1;
                            }
                            return Match::Hit(record);
                        }
                        Match::Exhausted(record) => {
                            if exhausted.is_none() {
                                exhausted = Some(record);
                            }
                        }
                        Match::Miss => {}
                    }
                }
            }

            if ordered {
                if let Some(order) = self.group(id).orders.get(local).copied() {
                    if self.children_satisfied_at(id, order) {
                        local += 1;
                        continue;
                    }
                    break;
                }
            }

            if wrapped {
                break;
            }
            let can_wrap = {
                let group = self.group(id);
                group.started
                    && group.max_occurs.allows(group.count)
                    && self.children_satisfied(id)
            };
            if can_wrap && self.probe_children_fresh_write(id, requested, value) {
                self.reset_children(id);
                self.group_mut(id).rewind();
                local = 0;
                wrapped = true;
                continue;
            }
            break;
        }

        match exhausted {
            Some(record) => Match::Exhausted(record),
            None => Match::Miss,
        }
    }

    fn probe_fresh_write(&self, id: NodeId, requested: Option<&str>, value: &Value) -> bool {
        match self.node(id) {
            Selector::Record(r) => {
                r.max_occurs.allows(0)
                    && (r.defines(requested, value, true) || r.defines(requested, value, false))
            }
            Selector::Group(_) => self.probe_children_fresh_write(id, requested, value),
        }
    }

    fn probe_children_fresh_write(
        &self,
        id: NodeId,
        requested: Option<&str>,
        value: &Value,
    ) -> bool {
        let group = self.group(id);
        if !group.ordered {
            return group
                .children
                .iter()
                .any(|c| self.probe_fresh_write(*c, requested, value));
        }
        for order in &group.orders {
            let children = group.children_at(*order);
            if children
                .iter()
                .any(|c| self.probe_fresh_write(*c, requested, value))
            {
                return true;
            }
            if !children.iter().all(|c| self.node(*c).min_occurs() == 0) {
                return false;
            }
        }
        false
    }

    // ---- lifecycle ---------------------------------------------------------

    /// Finalization check: the first selector in document order whose
    /// minimum occurrences are unsatisfied, if any.
    pub fn close(&self) -> Option<&str> {
        self.close_node(self.root).map(|id| self.node(id).name())
    }

    fn close_node(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id) {
            Selector::Record(r) => {
                if r.count < r.min_occurs {
                    Some(id)
                } else {
                    None
                }
            }
            Selector::Group(g) => {
                if g.started {
                    for child in &g.children {
                        if let Some(unsatisfied) = self.close_node(*child) {
                            return Some(unsatisfied);
                        }
                    }
                }
                if g.count < g.min_occurs {
                    return Some(self.first_required(id).unwrap_or(id));
                }
                None
            }
        }
    }

    fn first_required(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id) {
            Selector::Record(r) => {
                if r.min_occurs > 0 {
                    Some(id)
                } else {
                    None
                }
            }
            Selector::Group(g) => g
                .children
                .iter()
                .find_map(|child| self.first_required(*child)),
        }
    }

    /// Zeroes occurrence counters depth-first.
    pub fn reset(&mut self) {
        self.reset_subtree(self.root);
    }

    fn reset_subtree(&mut self, id: NodeId) {
        let children = match self.node_mut(id) {
            Selector::Record(r) => {
                r.count = 0;
                return;
            }
            Selector::Group(g) => {
                g.count = 0;
                g.rewind();
                g.children.clone()
            }
        };
        for child in children {
            self.reset_subtree(child);
        }
    }

    fn reset_children(&mut self, id: NodeId) {
        let children = self.group(id).children.clone();
        for child in children {
            self.reset_subtree(child);
        }
    }

    // ---- checkpoint state --------------------------------------------------

    /// Writes every selector's occurrence count into the state map,
    /// keyed `<namespace>.<selector>.count`.
    pub fn snapshot_state(&self, namespace: &str, state: &mut FxHashMap<String, String>) {
        for node in &self.nodes {
            state.insert(
                format!("{}.{}.count", namespace, node.name()),
                node.count().to_string(),
            );
        }
    }

    /// Restores selector counts from a snapshot. Every selector's key
    /// must be present; unknown keys are ignored.
    pub fn restore_state(
        &mut self,
        namespace: &str,
        state: &FxHashMap<String, String>,
    ) -> Result<()> {
        for id in 0..self.nodes.len() {
            let key = format!("{}.{}.count", namespace, self.node(id).name());
            let raw = state
                .get(&key)
                .ok_or_else(|| Error::MissingStateKey(key.clone()))?;
            let count = raw
                .parse::<u32>()
                .map_err(|_| Error::InvalidStateValue(key.clone()))?;
            self.node_mut(id).set_count(count);
        }
        self.rebuild_cursors(self.root);
        Ok(())
    }

    /// Re-derives group cursors from restored counts: the cursor points
    /// at the highest rank with any occurrences, and a group with
    /// occupied children is mid-iteration.
    fn rebuild_cursors(&mut self, id: NodeId) {
        if let Selector::Record(_) = self.node(id) {
            return;
        }
        let children = self.group(id).children.clone();
        for child in &children {
            self.rebuild_cursors(*child);
        }

        let started = children.iter().any(|c| self.node(*c).count() > 0);
        let pos_idx = {
            let group = self.group(id);
            group
                .orders
                .iter()
                .enumerate()
                .filter(|(_, order)| {
                    group
                        .children_at(**order)
                        .iter()
                        .any(|c| self.node(*c).count() > 0)
                })
                .map(|(idx, _)| idx)
                .last()
                .unwrap_or(0)
        };
        let group = self.group_mut(id);
        group.started = started;
        group.pos_idx = pos_idx;
    }
}
