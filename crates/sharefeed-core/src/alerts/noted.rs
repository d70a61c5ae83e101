//! Per-share accumulators for node events noted during one batch
//!
//! The live noted map and the deleted-node stash have the same shape; the
//! role marker keeps one from being passed where the other is expected.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::models::{Handle, NodeEventKind};

/// Bucket key: who touched the nodes and under which incoming share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub user: Handle,
    pub share_root: Handle,
}

/// Handles touched under one (user, share root)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotedShareBucket {
    /// Newest event time seen for this bucket
    pub timestamp: i64,
    pub file_handles: BTreeMap<Handle, NodeEventKind>,
    pub folder_handles: BTreeMap<Handle, NodeEventKind>,
}

impl NotedShareBucket {
    pub fn is_empty(&self) -> bool {
        self.file_handles.is_empty() && self.folder_handles.is_empty()
    }

    pub fn kind_of(&self, handle: Handle) -> Option<NodeEventKind> {
        self.file_handles
            .get(&handle)
            .or_else(|| self.folder_handles.get(&handle))
            .copied()
    }

    /// Files first, then folders
    pub fn entries(&self) -> impl Iterator<Item = (Handle, NodeEventKind)> + '_ {
        self.file_handles
            .iter()
            .chain(&self.folder_handles)
            .map(|(handle, event)| (*handle, *event))
    }

    fn remove(&mut self, handle: Handle) -> bool {
        let file = self.file_handles.remove(&handle).is_some();
        let folder = self.folder_handles.remove(&handle).is_some();
        file || folder
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut NodeEventKind> {
        if let Some(event) = self.file_handles.get_mut(&handle) {
            return Some(event);
        }
        self.folder_handles.get_mut(&handle)
    }

    fn split_off(&mut self, event: NodeEventKind) -> Self {
        let mut moved = Self {
            timestamp: self.timestamp,
            ..Self::default()
        };
        self.file_handles.retain(|handle, noted| {
            if *noted == event {
                moved.file_handles.insert(*handle, *noted);
                false
            } else {
                true
            }
        });
        self.folder_handles.retain(|handle, noted| {
            if *noted == event {
                moved.folder_handles.insert(*handle, *noted);
                false
            } else {
                true
            }
        });
        moved
    }

    fn absorb(&mut self, other: Self) {
        self.timestamp = self.timestamp.max(other.timestamp);
        self.file_handles.extend(other.file_handles);
        self.folder_handles.extend(other.folder_handles);
    }
}

/// Role of a [`NotedShareMap`]
pub trait BucketRole {
    /// Label used in log lines
    const NAME: &'static str;
}

/// Events of the batch currently being noted
#[derive(Debug)]
pub enum Live {}

/// Removals held back until the matching addition has been converted
#[derive(Debug)]
pub enum Stash {}

impl BucketRole for Live {
    const NAME: &'static str = "noted";
}

impl BucketRole for Stash {
    const NAME: &'static str = "stash";
}

/// Noted node events keyed by (user, share root)
pub struct NotedShareMap<R: BucketRole> {
    buckets: BTreeMap<BucketKey, NotedShareBucket>,
    role: PhantomData<R>,
}

impl<R: BucketRole> Default for NotedShareMap<R> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            role: PhantomData,
        }
    }
}

impl<R: BucketRole> fmt::Debug for NotedShareMap<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotedShareMap")
            .field("role", &R::NAME)
            .field("buckets", &self.buckets)
            .finish()
    }
}

impl<R: BucketRole> NotedShareMap<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// No handle noted in any bucket
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(NotedShareBucket::is_empty)
    }

    /// Number of noted handles across all buckets
    pub fn len(&self) -> usize {
        self.buckets
            .values()
            .map(|bucket| bucket.file_handles.len() + bucket.folder_handles.len())
            .sum()
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&BucketKey, &NotedShareBucket)> {
        self.buckets.iter()
    }

    pub fn into_buckets(self) -> impl Iterator<Item = (BucketKey, NotedShareBucket)> {
        self.buckets.into_iter()
    }

    /// Record an event, replacing whatever was noted for the handle in that bucket
    pub fn note(
        &mut self,
        key: BucketKey,
        timestamp: i64,
        handle: Handle,
        is_folder: bool,
        event: NodeEventKind,
    ) {
        let bucket = self.buckets.entry(key).or_default();
        bucket.timestamp = bucket.timestamp.max(timestamp);
        let handles = if is_folder {
            &mut bucket.folder_handles
        } else {
            &mut bucket.file_handles
        };
        handles.insert(handle, event);
        tracing::trace!("{} {handle} as {event:?} under {}", R::NAME, key.share_root);
    }

    /// Event noted for `handle` in any bucket
    pub fn kind_of(&self, handle: Handle) -> Option<NodeEventKind> {
        self.buckets
            .values()
            .find_map(|bucket| bucket.kind_of(handle))
    }

    /// Forget `handle` everywhere; empty buckets go with it
    pub fn remove_handle(&mut self, handle: Handle) -> bool {
        let mut removed = false;
        for bucket in self.buckets.values_mut() {
            removed |= bucket.remove(handle);
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        removed
    }

    /// Re-label `handle` from `from` to `to`
    pub fn set_kind(&mut self, handle: Handle, from: NodeEventKind, to: NodeEventKind) -> bool {
        let mut changed = false;
        for bucket in self.buckets.values_mut() {
            if let Some(event) = bucket.slot_mut(handle) {
                if *event == from {
                    *event = to;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Move every entry of `event` into a map of another role
    pub fn extract<T: BucketRole>(&mut self, event: NodeEventKind) -> NotedShareMap<T> {
        let mut moved = NotedShareMap::<T>::default();
        for (key, bucket) in &mut self.buckets {
            let split = bucket.split_off(event);
            if !split.is_empty() {
                moved.buckets.insert(*key, split);
            }
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        moved
    }

    /// Fold another map in; later entries win per handle
    pub fn absorb<S: BucketRole>(&mut self, other: NotedShareMap<S>) {
        for (key, bucket) in other.buckets {
            self.buckets.entry(key).or_default().absorb(bucket);
        }
    }

    /// Reinterpret the buckets under another role
    pub fn into_role<T: BucketRole>(self) -> NotedShareMap<T> {
        NotedShareMap {
            buckets: self.buckets,
            role: PhantomData,
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
