//! Bidirectional tag registry.
//!
//! Tracks which fragments carry which tags so that a changed entity can be
//! mapped to every stored fragment built from it.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

use super::keys::FragmentKey;
use super::lock::{rw_read, rw_write};
use super::tags::Tag;

const SOURCE: &str = "cache::registry";

/// Tracks tag → fragment keys and fragment key → tags mappings.
pub struct TagRegistry {
    tag_to_keys: RwLock<HashMap<Tag, HashSet<FragmentKey>>>,
    key_to_tags: RwLock<HashMap<FragmentKey, BTreeSet<Tag>>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self {
            tag_to_keys: RwLock::new(HashMap::new()),
            key_to_tags: RwLock::new(HashMap::new()),
        }
    }

    /// Register a fragment with its tags, replacing earlier tags for the key.
    pub fn register(&self, key: FragmentKey, tags: BTreeSet<Tag>) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "key_to_tags");

        if let Some(previous) = k2t.remove(&key) {
            detach(&mut t2k, &key, previous);
        }

        for tag in &tags {
            t2k.entry(tag.clone()).or_default().insert(key.clone());
        }
        k2t.insert(key, tags);
    }

    /// Remove a fragment key and its tag mappings.
    pub fn unregister(&self, key: &FragmentKey) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "key_to_tags");

        if let Some(tags) = k2t.remove(key) {
            detach(&mut t2k, key, tags);
        }
    }

    /// Remove every fragment carrying `tag`.
    ///
    /// Returns the affected fragment keys; their other tag mappings are
    /// dropped too since the fragments are about to be evicted.
    pub fn unregister_tag(&self, tag: &Tag) -> HashSet<FragmentKey> {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "key_to_tags");

        let affected = t2k.remove(tag).unwrap_or_default();
        for key in &affected {
            if let Some(tags) = k2t.remove(key) {
                detach(&mut t2k, key, tags);
            }
        }

        affected
    }

    pub fn clear(&self) {
        rw_write(&self.tag_to_keys, SOURCE, "tag_to_keys").clear();
        rw_write(&self.key_to_tags, SOURCE, "key_to_tags").clear();
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.tag_to_keys, SOURCE, "tag_to_keys").len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.key_to_tags, SOURCE, "key_to_tags").len()
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn detach(
    t2k: &mut HashMap<Tag, HashSet<FragmentKey>>,
    key: &FragmentKey,
    tags: BTreeSet<Tag>,
) {
    for tag in tags {
        if let Some(keys) = t2k.get_mut(&tag) {
            keys.remove(key);
            if keys.is_empty() {
                t2k.remove(&tag);
            }
        }
    }
}
