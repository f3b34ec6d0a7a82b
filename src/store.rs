//! Canonical in-memory bracket storage with per-tournament locking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::broadcast::UpdateBroadcaster;
use crate::error::{EngineError, Result};
use crate::types::Bracket;

/// Owns the canonical bracket per tournament. All mutation goes through
/// `mutate`, which serializes writers per tournament, applies the mutation
/// to a working copy (a failed mutation leaves the stored bracket
/// untouched), and publishes the new snapshot after releasing the
/// tournament lock. Reads always return copies, never live references.
pub struct BracketStore {
    brackets: Mutex<HashMap<String, Arc<Mutex<Bracket>>>>,
    broadcaster: Arc<UpdateBroadcaster>,
}

impl BracketStore {
    pub fn new(broadcaster: Arc<UpdateBroadcaster>) -> Self {
        BracketStore {
            brackets: Mutex::new(HashMap::new()),
            broadcaster,
        }
    }

    pub fn create(&self, bracket: Bracket) -> Result<Bracket> {
        let tournament_id = bracket.tournament_id.clone();
        {
            let mut registry = self.brackets.lock().unwrap_or_else(|e| e.into_inner());
            if registry.contains_key(&tournament_id) {
                return Err(EngineError::BracketAlreadyExists(tournament_id));
            }
            registry.insert(tournament_id.clone(), Arc::new(Mutex::new(bracket.clone())));
        }
        self.broadcaster.publish(&tournament_id, &bracket);
        Ok(bracket)
    }

    pub fn contains(&self, tournament_id: &str) -> bool {
        let registry = self.brackets.lock().unwrap_or_else(|e| e.into_inner());
        registry.contains_key(tournament_id)
    }

    /// Snapshot read. Blocks writers only for the duration of the copy.
    pub fn get(&self, tournament_id: &str) -> Result<Bracket> {
        let cell = self.cell(tournament_id)?;
        let guard = cell.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    pub fn mutate<R>(
        &self,
        tournament_id: &str,
        mutation: impl FnOnce(&mut Bracket) -> Result<R>,
    ) -> Result<R> {
        let cell = self.cell(tournament_id)?;
        let (out, snapshot) = {
            let mut guard = cell.lock().unwrap_or_else(|e| e.into_inner());
            let mut working = guard.clone();
            let out = mutation(&mut working)?;
            *guard = working.clone();
            (out, working)
        };
        // Deliver outside the tournament lock so a slow subscriber cannot
        // stall writers.
        self.broadcaster.publish(tournament_id, &snapshot);
        Ok(out)
    }

    pub fn remove(&self, tournament_id: &str) -> Result<()> {
        let mut registry = self.brackets.lock().unwrap_or_else(|e| e.into_inner());
        registry
            .remove(tournament_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::BracketNotFound(tournament_id.to_string()))
    }

    fn cell(&self, tournament_id: &str) -> Result<Arc<Mutex<Bracket>>> {
        let registry = self.brackets.lock().unwrap_or_else(|e| e.into_inner());
        registry
            .get(tournament_id)
            .cloned()
            .ok_or_else(|| EngineError::BracketNotFound(tournament_id.to_string()))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
