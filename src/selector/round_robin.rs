use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::Result;
use crate::membership::{MembershipService, WorkerGroupId, WorkerId};

/// Last worker handed out per group.
///
/// Entries are only written by a successful selection and never removed. A
/// cursor that no longer matches a group member is ignored by the next walk.
#[derive(Debug, Default)]
pub struct FairnessState {
    last_chosen: HashMap<WorkerGroupId, WorkerId>,
}

impl FairnessState {
    pub fn cursor(&self, group: WorkerGroupId) -> Option<WorkerId> {
        self.last_chosen.get(&group).copied()
    }

    fn advance(&mut self, group: WorkerGroupId, last: WorkerId) {
        self.last_chosen.insert(group, last);
    }

    pub fn len(&self) -> usize {
        self.last_chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_chosen.is_empty()
    }
}

/// Walk `members` cyclically, starting right after `cursor`, and collect up to
/// `count` distinct ids.
///
/// The walk covers at most two laps and stops at the first id it has already
/// collected. The result is shorter than `count` when the group cannot
/// supply that many distinct members.
fn walk(members: &[WorkerId], cursor: Option<WorkerId>, count: usize) -> Vec<WorkerId> {
    let mut chosen = Vec::with_capacity(count.min(members.len()));
    if members.is_empty() {
        return chosen;
    }

    let start = cursor
        .and_then(|last| members.iter().position(|id| *id == last))
        .map_or(0, |index| index + 1);
    let bound = 2 * members.len();

    for position in start..=bound {
        if chosen.len() >= count {
            break;
        }
        let id = members[position % members.len()];
        if chosen.contains(&id) {
            break;
        }
        chosen.push(id);
    }

    chosen
}

/// Round-robin chooser of workers within a group.
///
/// Selections are serialized process-wide: the cursor read, the walk and the
/// cursor update happen under one lock. Membership is fetched before the lock
/// is taken.
#[derive(Debug, Default)]
pub struct WorkerSelector {
    state: Mutex<FairnessState>,
}

impl WorkerSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choose `count` distinct workers from the current members of `group`.
    ///
    /// Returns an empty list when the group cannot supply `count` workers.
    /// Callers must check the length; a short list is never returned.
    pub async fn choose<M>(
        &self,
        membership: &M,
        group: WorkerGroupId,
        count: usize,
    ) -> Result<Vec<WorkerId>>
    where
        M: MembershipService + ?Sized,
    {
        let members: Vec<WorkerId> = membership
            .workers_in_group(group)
            .await?
            .into_iter()
            .map(|w| w.id)
            .collect();

        Ok(self.select(group, &members, count).await)
    }

    /// Run the selection against an already fetched member list.
    pub async fn select(
        &self,
        group: WorkerGroupId,
        members: &[WorkerId],
        count: usize,
    ) -> Vec<WorkerId> {
        let mut state = self.state.lock().await;

        let chosen = walk(members, state.cursor(group), count);
        if chosen.len() != count {
            tracing::warn!(
                group = group.0,
                requested = count,
                members = members.len(),
                "Not enough workers in group to satisfy selection"
            );
            return Vec::new();
        }

        if let Some(&last) = chosen.last() {
            state.advance(group, last);
            tracing::debug!(group = group.0, count, cursor = last.0, "Selected workers");
        }
        chosen
    }

    /// Current cursor of `group`, if any selection has succeeded for it.
    pub async fn cursor(&self, group: WorkerGroupId) -> Option<WorkerId> {
        self.state.lock().await.cursor(group)
    }

    /// Number of groups with a cursor.
    pub async fn tracked_groups(&self) -> usize {
        self.state.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<WorkerId> {
        raw.iter().copied().map(WorkerId).collect()
    }

    #[test]
    fn walk_from_start_without_cursor() {
        assert_eq!(walk(&ids(&[1, 2, 3]), None, 2), ids(&[1, 2]));
    }

    #[test]
    fn walk_wraps_after_cursor() {
        assert_eq!(walk(&ids(&[1, 2, 3]), Some(WorkerId(2)), 2), ids(&[3, 1]));
    }

    #[test]
    fn walk_stops_at_first_duplicate() {
        assert_eq!(walk(&ids(&[1, 2, 3]), Some(WorkerId(1)), 4), ids(&[2, 3, 1]));
    }

    #[test]
    fn walk_unknown_cursor_starts_at_zero() {
        assert_eq!(walk(&ids(&[4, 5, 6]), Some(WorkerId(99)), 2), ids(&[4, 5]));
    }

    #[test]
    fn walk_cursor_at_end_wraps() {
        assert_eq!(walk(&ids(&[4, 5, 6]), Some(WorkerId(6)), 3), ids(&[4, 5, 6]));
    }

    #[test]
    fn walk_empty_group() {
        assert!(walk(&[], None, 3).is_empty());
        assert!(walk(&[], Some(WorkerId(1)), 0).is_empty());
    }

    #[test]
    fn walk_zero_count() {
        assert!(walk(&ids(&[1, 2]), None, 0).is_empty());
    }

    #[tokio::test]
    async fn select_sequence() {
        let selector = WorkerSelector::new();
        let group = WorkerGroupId(1);
        let members = ids(&[1, 2, 3]);

        assert_eq!(selector.select(group, &members, 2).await, ids(&[1, 2]));
        assert_eq!(selector.cursor(group).await, Some(WorkerId(2)));

        assert_eq!(selector.select(group, &members, 2).await, ids(&[3, 1]));
        assert_eq!(selector.cursor(group).await, Some(WorkerId(1)));

        assert!(selector.select(group, &members, 4).await.is_empty());
        assert_eq!(selector.cursor(group).await, Some(WorkerId(1)));
    }

    #[tokio::test]
    async fn zero_count_leaves_cursor_untouched() {
        let selector = WorkerSelector::new();
        let group = WorkerGroupId(3);
        let members = ids(&[1, 2, 3]);

        assert!(selector.select(group, &members, 0).await.is_empty());
        assert_eq!(selector.cursor(group).await, None);
        assert_eq!(selector.tracked_groups().await, 0);
    }

    #[tokio::test]
    async fn groups_keep_separate_cursors() {
        let selector = WorkerSelector::new();
        let a = WorkerGroupId(1);
        let b = WorkerGroupId(2);

        selector.select(a, &ids(&[1, 2, 3]), 1).await;
        selector.select(b, &ids(&[7, 8]), 1).await;
        selector.select(a, &ids(&[1, 2, 3]), 1).await;

        assert_eq!(selector.cursor(a).await, Some(WorkerId(2)));
        assert_eq!(selector.cursor(b).await, Some(WorkerId(7)));
        assert_eq!(selector.tracked_groups().await, 2);
    }
}
