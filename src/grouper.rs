//! Collapses albums (items sent together under one platform group id) into a
//! single share token.

use crate::db::Token;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Sweep expired entries once the map grows past this size
const SWEEP_THRESHOLD: usize = 256;

#[derive(Debug, Clone)]
struct GroupEntry {
    token: Token,
    created_at: Instant,
    announced: bool,
}

impl GroupEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Outcome of assigning a submission to a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAssignment {
    /// First member seen: a fresh token was minted for it
    First(Token),
    /// Later member of a known group: reuse the token silently
    Continuation(Token),
}

impl GroupAssignment {
    pub fn token(&self) -> &Token {
        match self {
            Self::First(token) | Self::Continuation(token) => token,
        }
    }

    pub fn is_first(&self) -> bool {
        matches!(self, Self::First(_))
    }
}

/// In-memory `group_key -> token` map with a bounded entry lifetime.
#[derive(Debug)]
pub struct BatchGrouper {
    groups: DashMap<String, GroupEntry>,
    ttl: Duration,
}

impl BatchGrouper {
    pub fn new(ttl: Duration) -> Self {
        Self {
            groups: DashMap::new(),
            ttl,
        }
    }

    /// Decide the token for a submission.
    ///
    /// The check-then-insert runs under the map's shard lock, so two
    /// near-simultaneous first members of one group cannot both mint.
    pub fn assign(&self, group_key: Option<&str>) -> GroupAssignment {
        let Some(key) = group_key else {
            return GroupAssignment::First(Token::generate());
        };

        if self.groups.len() >= SWEEP_THRESHOLD {
            self.evict_expired();
        }

        match self.groups.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(self.ttl) {
                    let token = Token::generate();
                    occupied.insert(GroupEntry {
                        token: token.clone(),
                        created_at: Instant::now(),
                        announced: false,
                    });
                    debug!(group_key = key, "Group entry expired, minted a new token");
                    GroupAssignment::First(token)
                } else {
                    GroupAssignment::Continuation(occupied.get().token.clone())
                }
            }
            Entry::Vacant(vacant) => {
                let token = Token::generate();
                vacant.insert(GroupEntry {
                    token: token.clone(),
                    created_at: Instant::now(),
                    announced: false,
                });
                GroupAssignment::First(token)
            }
        }
    }

    /// Claim the right to show the operator the share link for a group.
    ///
    /// Returns `true` exactly once per group: for the first member whose
    /// storage succeeded. Ungrouped submissions always announce.
    pub fn claim_announcement(&self, group_key: Option<&str>) -> bool {
        let Some(key) = group_key else {
            return true;
        };
        match self.groups.get_mut(key) {
            Some(mut entry) if !entry.announced => {
                entry.announced = true;
                true
            }
            Some(_) => false,
            None => true,
        }
    }

    /// Remove entries older than the group TTL
    pub fn evict_expired(&self) {
        let ttl = self.ttl;
        self.groups.retain(|_, entry| !entry.is_expired(ttl));
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
