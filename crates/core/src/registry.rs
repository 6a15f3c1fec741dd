//! The tool catalog.
//!
//! The agent loop uses the registry to:
//! 1. Advertise tool definitions to the LLM
//! 2. Resolve requested names (or aliases) to tools
//!
//! Name, alias, category and tag indices live behind a single `RwLock`, so
//! readers always see them consistent with each other.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use crate::error::{RegistryError, ToolError};
use crate::provider::ToolDefinition;
use crate::tool::Tool;

#[derive(Default)]
struct Indices {
    tools: HashMap<String, Arc<dyn Tool>>,
    aliases: HashMap<String, String>,
    categories: HashMap<String, Vec<Arc<dyn Tool>>>,
    tags: HashMap<String, Vec<Arc<dyn Tool>>>,
}

impl Indices {
    fn owner_of(&self, key: &str) -> Option<String> {
        if self.tools.contains_key(key) {
            Some(key.to_string())
        } else {
            self.aliases.get(key).cloned()
        }
    }

    fn aliases_of(&self, name: &str) -> Vec<String> {
        let mut aliases: Vec<String> = self
            .aliases
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.clone())
            .collect();
        aliases.sort();
        aliases
    }
}

/// Counts of registered entries per index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub tools: usize,
    pub aliases: usize,
    pub categories: usize,
    pub tags: usize,
}

/// A thread-safe registry of tools with alias, category and tag lookup.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Indices>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Indices> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Indices> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a tool under its name plus the given aliases.
    ///
    /// Fails without touching any index if the name or an alias is taken.
    pub fn register(&self, tool: Arc<dyn Tool>, aliases: &[&str]) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        let mut idx = self.write();

        if idx.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        if let Some(owner) = idx.aliases.get(&name) {
            return Err(RegistryError::AliasInUse {
                alias: name,
                owner: owner.clone(),
            });
        }
        let mut seen = BTreeSet::new();
        for alias in aliases {
            let owner = if *alias == name || !seen.insert(*alias) {
                Some(name.clone())
            } else {
                idx.owner_of(alias)
            };
            if let Some(owner) = owner {
                return Err(RegistryError::AliasInUse {
                    alias: alias.to_string(),
                    owner,
                });
            }
        }

        let info = tool.info().clone();
        for alias in aliases {
            idx.aliases.insert(alias.to_string(), name.clone());
        }
        idx.categories
            .entry(info.category.clone())
            .or_default()
            .push(Arc::clone(&tool));
        for tag in &info.tags {
            idx.tags.entry(tag.clone()).or_default().push(Arc::clone(&tool));
        }
        idx.tools.insert(name.clone(), tool);

        debug!(tool = %name, aliases = aliases.len(), category = %info.category, "Tool registered");
        Ok(())
    }

    /// Remove a tool from every index, dropping buckets that become empty.
    pub fn unregister(&self, name: &str) -> Result<(), ToolError> {
        let mut idx = self.write();
        let tool = idx
            .tools
            .remove(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        idx.aliases.retain(|_, target| target.as_str() != name);

        let info = tool.info();
        prune(&mut idx.categories, &info.category, name);
        for tag in &info.tags {
            prune(&mut idx.tags, tag, name);
        }

        debug!(tool = %name, "Tool unregistered");
        Ok(())
    }

    /// Resolve a literal name first, then an alias.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        let idx = self.read();
        if let Some(tool) = idx.tools.get(name) {
            return Ok(Arc::clone(tool));
        }
        idx.aliases
            .get(name)
            .and_then(|target| idx.tools.get(target))
            .map(Arc::clone)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.read().owner_of(name).is_some()
    }

    /// The tool name an alias points at.
    pub fn resolve_alias(&self, alias: &str) -> Option<String> {
        self.read().aliases.get(alias).cloned()
    }

    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        self.read().aliases_of(name)
    }

    /// Case-insensitive substring search over names, aliases, descriptions
    /// and tags. Each tool appears at most once.
    pub fn find(&self, query: &str) -> Vec<Arc<dyn Tool>> {
        let needle = query.to_lowercase();
        let idx = self.read();
        let mut matches: Vec<Arc<dyn Tool>> = idx
            .tools
            .iter()
            .filter(|(name, tool)| {
                let info = tool.info();
                name.to_lowercase().contains(&needle)
                    || info.description.to_lowercase().contains(&needle)
                    || info.tags.iter().any(|t| t.to_lowercase().contains(&needle))
                    || idx
                        .aliases_of(name)
                        .iter()
                        .any(|a| a.to_lowercase().contains(&needle))
            })
            .map(|(_, tool)| Arc::clone(tool))
            .collect();
        matches.sort_by(|a, b| a.name().cmp(b.name()));
        matches
    }

    /// Snapshot of the tools in a category; empty if the category is unknown.
    pub fn get_by_category(&self, category: &str) -> Vec<Arc<dyn Tool>> {
        self.read()
            .categories
            .get(category)
            .cloned()
            .unwrap_or_default()
    }

    /// Tools carrying every one of the given tags. No tags yields nothing.
    pub fn get_by_tags(&self, tags: &[&str]) -> Vec<Arc<dyn Tool>> {
        let Some((first, rest)) = tags.split_first() else {
            return Vec::new();
        };
        let idx = self.read();
        let Some(candidates) = idx.tags.get(*first) else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter(|tool| {
                rest.iter().all(|tag| {
                    idx.tags
                        .get(*tag)
                        .is_some_and(|bucket| bucket.iter().any(|t| t.name() == tool.name()))
                })
            })
            .map(Arc::clone)
            .collect()
    }

    /// All tools, sorted by name.
    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self.read().tools.values().map(Arc::clone).collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self.read().categories.keys().cloned().collect();
        categories.sort();
        categories
    }

    /// Tool definitions advertised to the LLM, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.all().iter().map(|t| t.to_definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.all().iter().map(|t| t.name().to_string()).collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let idx = self.read();
        RegistryStats {
            tools: idx.tools.len(),
            aliases: idx.aliases.len(),
            categories: idx.categories.len(),
            tags: idx.tags.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.read().tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn prune(index: &mut HashMap<String, Vec<Arc<dyn Tool>>>, key: &str, name: &str) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.retain(|t| t.name() != name);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}
