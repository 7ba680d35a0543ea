//! In-memory registry of tools and their invocation details.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::models::{InvocationDetails, Tool};

struct RegistryEntry {
    tool: Tool,
    details: Arc<InvocationDetails>,
}

/// Name-keyed store of registered tools.
///
/// Sync passes write, tool lookups read. Re-registering a name replaces
/// the previous entry atomically from the perspective of any subsequent
/// lookup; tools are never removed in this version, so entries from a
/// source that later drops an operation stay registered.
///
/// No critical section leaves the map partially updated, so a poisoned
/// lock is recovered rather than propagated.
#[derive(Default)]
pub struct ToolRegistry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tool: Tool, details: Arc<InvocationDetails>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(tool.name.clone(), RegistryEntry { tool, details });
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(name).map(|e| e.tool.clone())
    }

    pub fn details(&self, name: &str) -> Option<Arc<InvocationDetails>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(name).map(|e| Arc::clone(&e.details))
    }

    /// All registered tools, sorted by name for stable listings.
    pub fn list(&self) -> Vec<Tool> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut tools: Vec<Tool> = entries.values().map(|e| e.tool.clone()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
