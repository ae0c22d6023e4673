use std::collections::{HashMap, HashSet};

use crate::{EntryId, QueueEntry, QueueError, QueueFilter, TrackId};

/// A member's queue in a room.
///
/// Entries form a doubly linked list through their ids, so inserting or
/// removing anywhere only touches the direct neighbours. Played entries always
/// form a prefix of the list, and the next-to-serve pointer marks where the
/// unplayed part starts.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    entries: HashMap<EntryId, QueueEntry>,
    head: Option<EntryId>,
    next_to_serve: Option<EntryId>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a queue from stored entries, rejecting anything that isn't a well-formed list.
    pub fn from_entries(
        entries: Vec<QueueEntry>,
        next_to_serve: Option<EntryId>,
    ) -> Result<Self, QueueError> {
        let mut map = HashMap::with_capacity(entries.len());
        let mut heads = vec![];

        for entry in entries {
            if entry.previous.is_none() {
                heads.push(entry.id.clone());
            }

            if let Some(duplicate) = map.insert(entry.id.clone(), entry) {
                return Err(QueueError::DuplicateEntry(duplicate.id));
            }
        }

        if heads.len() > 1 {
            return Err(QueueError::Corrupt(format!(
                "{} entries claim to be the head",
                heads.len()
            )));
        }

        let queue = Self {
            entries: map,
            head: heads.pop(),
            next_to_serve,
        };

        queue.validate()?;
        Ok(queue)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &EntryId) -> Option<&QueueEntry> {
        self.entries.get(id)
    }

    pub fn head(&self) -> Option<&QueueEntry> {
        self.head.as_ref().and_then(|id| self.entries.get(id))
    }

    /// The first unplayed entry, if there is one
    pub fn next_to_serve(&self) -> Option<&QueueEntry> {
        self.next_to_serve
            .as_ref()
            .and_then(|id| self.entries.get(id))
    }

    /// Walks the queue from the head
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            queue: self,
            current: self.head.as_ref(),
        }
    }

    /// Lists entries in queue order
    pub fn entries(&self, filter: QueueFilter) -> Vec<&QueueEntry> {
        self.iter().filter(|e| filter.matches(e.played)).collect()
    }

    /// Inserts a new entry after `after`, or at the head if `after` is `None`.
    pub fn insert_after(
        &mut self,
        after: Option<&EntryId>,
        id: EntryId,
        track_id: TrackId,
    ) -> Result<&QueueEntry, QueueError> {
        if self.entries.contains_key(&id) {
            return Err(QueueError::DuplicateEntry(id));
        }

        let next = match after {
            Some(after) => self
                .entries
                .get(after)
                .ok_or_else(|| QueueError::EntryNotFound(after.clone()))?
                .next
                .clone(),
            None => self.head.clone(),
        };

        if let Some(next) = next.as_ref().and_then(|n| self.entries.get(n)) {
            if next.played {
                return Err(QueueError::InsertBeforePlayed(next.id.clone()));
            }
        }

        match after.and_then(|a| self.entries.get_mut(a)) {
            Some(previous) => previous.next = Some(id.clone()),
            None => self.head = Some(id.clone()),
        }

        if let Some(next) = next.as_ref().and_then(|n| self.entries.get_mut(n)) {
            next.previous = Some(id.clone());
        }

        // Everything was played, or the new entry now precedes the first unplayed one
        if self.next_to_serve.is_none() || self.next_to_serve == next {
            self.next_to_serve = Some(id.clone());
        }

        let entry = QueueEntry {
            id: id.clone(),
            track_id,
            played: false,
            previous: after.cloned(),
            next,
        };

        Ok(&*self.entries.entry(id).or_insert(entry))
    }

    /// Splices an unplayed entry out of the queue.
    pub fn remove(&mut self, id: &EntryId) -> Result<QueueEntry, QueueError> {
        match self.entries.get(id) {
            None => return Err(QueueError::EntryNotFound(id.clone())),
            Some(entry) if entry.played => return Err(QueueError::RemovePlayed(id.clone())),
            _ => {}
        }

        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| QueueError::EntryNotFound(id.clone()))?;

        match entry
            .previous
            .as_ref()
            .and_then(|p| self.entries.get_mut(p))
        {
            Some(previous) => previous.next = entry.next.clone(),
            None => self.head = entry.next.clone(),
        }

        if let Some(next) = entry.next.as_ref().and_then(|n| self.entries.get_mut(n)) {
            next.previous = entry.previous.clone();
        }

        if self.next_to_serve.as_ref() == Some(id) {
            self.next_to_serve = entry.next.clone();
        }

        Ok(entry)
    }

    /// Marks the next-to-serve entry played and moves the pointer along.
    pub fn take_next(&mut self) -> Option<QueueEntry> {
        let id = self.next_to_serve.clone()?;
        let entry = self.entries.get_mut(&id)?;

        entry.played = true;
        self.next_to_serve = entry.next.clone();

        Some(entry.clone())
    }

    /// Checks that walking from the head visits every entry exactly once,
    /// that the links agree in both directions, and that played entries come first.
    pub fn validate(&self) -> Result<(), QueueError> {
        let mut seen = HashSet::with_capacity(self.entries.len());
        let mut previous: Option<&EntryId> = None;
        let mut current = self.head.as_ref();
        let mut first_unplayed = None;

        while let Some(id) = current {
            if !seen.insert(id) {
                return Err(QueueError::Corrupt(format!("{} is part of a cycle", id)));
            }

            let entry = self
                .entries
                .get(id)
                .ok_or_else(|| QueueError::Corrupt(format!("{} is linked but missing", id)))?;

            if entry.previous.as_ref() != previous {
                return Err(QueueError::Corrupt(format!(
                    "{} doesn't link back to its predecessor",
                    id
                )));
            }

            match (entry.played, first_unplayed) {
                (true, Some(_)) => {
                    return Err(QueueError::Corrupt(format!(
                        "{} was played after an unplayed entry",
                        id
                    )))
                }
                (false, None) => first_unplayed = Some(id),
                _ => {}
            }

            previous = Some(id);
            current = entry.next.as_ref();
        }

        if seen.len() != self.entries.len() {
            return Err(QueueError::Corrupt(format!(
                "{} entries can't be reached from the head",
                self.entries.len() - seen.len()
            )));
        }

        if self.next_to_serve.as_ref() != first_unplayed {
            return Err(QueueError::Corrupt(
                "next to serve isn't the first unplayed entry".to_string(),
            ));
        }

        Ok(())
    }
}

pub struct Iter<'a> {
    queue: &'a Queue,
    current: Option<&'a EntryId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a QueueEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.queue.entries.get(self.current?)?;
        self.current = entry.next.as_ref();

        Some(entry)
    }
}
