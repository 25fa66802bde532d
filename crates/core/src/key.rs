//! Hierarchical keys
//!
//! A key addresses an entity by a path of `(kind, id | name)` elements,
//! scoped to a project and an optional namespace.
//!
//! ## Key Shapes
//!
//! | Type | Leaf | Used for |
//! |------|------|----------|
//! | [`IncompleteKey`] | may lack id/name | nested entities, id allocation |
//! | [`Key`] | always has id or name | addressing persisted entities |
//!
//! ## Invariants
//!
//! - The path is never empty and holds at most [`MAX_PATH_LEN`] elements
//! - Every kind is non-empty, every name is non-empty
//! - Every ancestor (all elements but the leaf) is complete
//! - An empty namespace means "no namespace"

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of elements in a key path (ancestors plus leaf).
pub const MAX_PATH_LEN: usize = 100;

// =============================================================================
// PathElement
// =============================================================================

/// Numeric id or string name of a path element.
///
/// Ids order before names, matching the backend key ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdOrName {
    /// Numeric id (usually allocated by the backend)
    Id(i64),
    /// Caller-chosen name
    Name(String),
}

impl fmt::Display for IdOrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdOrName::Id(id) => write!(f, "{}", id),
            IdOrName::Name(name) => write!(f, "{:?}", name),
        }
    }
}

/// One `(kind, id | name)` step of a key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathElement {
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_or_name: Option<IdOrName>,
}

impl PathElement {
    /// Element with neither id nor name.
    pub fn of(kind: impl Into<String>) -> Self {
        PathElement {
            kind: kind.into(),
            id_or_name: None,
        }
    }

    /// Element addressed by numeric id.
    pub fn with_id(kind: impl Into<String>, id: i64) -> Self {
        PathElement {
            kind: kind.into(),
            id_or_name: Some(IdOrName::Id(id)),
        }
    }

    /// Element addressed by name.
    pub fn with_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        PathElement {
            kind: kind.into(),
            id_or_name: Some(IdOrName::Name(name.into())),
        }
    }

    /// Element from a kind and an optional id/name.
    pub fn new(kind: impl Into<String>, id_or_name: Option<IdOrName>) -> Self {
        PathElement {
            kind: kind.into(),
            id_or_name,
        }
    }

    /// The element's kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The id or name, if any.
    pub fn id_or_name(&self) -> Option<&IdOrName> {
        self.id_or_name.as_ref()
    }

    /// The numeric id, if this element has one.
    pub fn id(&self) -> Option<i64> {
        match self.id_or_name {
            Some(IdOrName::Id(id)) => Some(id),
            _ => None,
        }
    }

    /// The name, if this element has one.
    pub fn name(&self) -> Option<&str> {
        match &self.id_or_name {
            Some(IdOrName::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// True if the element has an id or a name.
    pub fn is_complete(&self) -> bool {
        self.id_or_name.is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.kind.is_empty() {
            return Err(Error::invalid_request("Key kind must not be empty"));
        }
        if let Some(IdOrName::Name(name)) = &self.id_or_name {
            if name.is_empty() {
                return Err(Error::invalid_request("Key name must not be empty"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id_or_name {
            Some(id_or_name) => write!(f, "{}:{}", self.kind, id_or_name),
            None => write!(f, "{}:?", self.kind),
        }
    }
}

// =============================================================================
// KeyPath
// =============================================================================

/// Read access shared by every key shape.
pub trait KeyPath {
    /// Project the key belongs to.
    fn project_id(&self) -> &str;

    /// Namespace, empty when absent.
    fn namespace(&self) -> &str;

    /// Full path, ancestors first, leaf last. Never empty.
    fn path(&self) -> &[PathElement];

    /// Kind of the leaf element.
    fn kind(&self) -> &str {
        self.leaf().kind()
    }

    /// The leaf element.
    fn leaf(&self) -> &PathElement {
        // The path is validated non-empty at construction.
        &self.path()[self.path().len() - 1]
    }

    /// Ancestor elements, outermost first.
    fn ancestors(&self) -> &[PathElement] {
        &self.path()[..self.path().len() - 1]
    }

    /// True if a namespace is set.
    fn has_namespace(&self) -> bool {
        !self.namespace().is_empty()
    }
}

// =============================================================================
// IncompleteKey
// =============================================================================

/// A key whose leaf may not have an id or name yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncompleteKey {
    project_id: String,
    namespace: String,
    path: Vec<PathElement>,
}

impl IncompleteKey {
    /// Build a key from its parts, validating every path invariant.
    pub fn new(
        project_id: impl Into<String>,
        namespace: impl Into<String>,
        path: Vec<PathElement>,
    ) -> Result<Self> {
        let key = IncompleteKey {
            project_id: project_id.into(),
            namespace: namespace.into(),
            path,
        };
        key.validate()?;
        Ok(key)
    }

    fn validate(&self) -> Result<()> {
        if self.project_id.is_empty() {
            return Err(Error::invalid_request("Key project id must not be empty"));
        }
        if self.path.is_empty() {
            return Err(Error::invalid_request("Key path must not be empty"));
        }
        if self.path.len() > MAX_PATH_LEN {
            return Err(Error::invalid_request(format!(
                "Key path has {} elements, at most {} allowed",
                self.path.len(),
                MAX_PATH_LEN
            )));
        }
        for element in &self.path {
            element.validate()?;
        }
        if let Some(incomplete) = self.ancestors().iter().find(|e| !e.is_complete()) {
            return Err(Error::invalid_request(format!(
                "Ancestor {} has neither id nor name",
                incomplete.kind()
            )));
        }
        Ok(())
    }

    /// Complete the leaf with an allocated id.
    pub fn complete_with_id(self, id: i64) -> Result<Key> {
        self.complete(IdOrName::Id(id))
    }

    /// Complete the leaf with a name.
    pub fn complete_with_name(self, name: impl Into<String>) -> Result<Key> {
        self.complete(IdOrName::Name(name.into()))
    }

    fn complete(mut self, id_or_name: IdOrName) -> Result<Key> {
        if let Some(leaf) = self.path.last_mut() {
            leaf.id_or_name = Some(id_or_name);
        }
        Key::from_incomplete(self)
    }

    /// True if the leaf has an id or a name.
    pub fn is_complete(&self) -> bool {
        self.leaf().is_complete()
    }
}

impl KeyPath for IncompleteKey {
    fn project_id(&self) -> &str {
        &self.project_id
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn path(&self) -> &[PathElement] {
        &self.path
    }
}

impl fmt::Display for IncompleteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({}/{}, ", self.project_id, self.namespace)?;
        for (i, element) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, " > ")?;
            }
            write!(f, "{}", element)?;
        }
        write!(f, ")")
    }
}

// =============================================================================
// Key
// =============================================================================

/// A complete key: the leaf always has an id or a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    inner: IncompleteKey,
}

impl Key {
    /// Build a complete key from its parts.
    pub fn new(
        project_id: impl Into<String>,
        namespace: impl Into<String>,
        path: Vec<PathElement>,
    ) -> Result<Self> {
        Key::from_incomplete(IncompleteKey::new(project_id, namespace, path)?)
    }

    /// Promote an incomplete key whose leaf turns out to be complete.
    ///
    /// Fails if the leaf has neither id nor name.
    pub fn from_incomplete(key: IncompleteKey) -> Result<Self> {
        if !key.is_complete() {
            return Err(Error::invalid_request(format!(
                "Key {} has neither id nor name",
                key
            )));
        }
        Ok(Key { inner: key })
    }

    /// Start a builder for a key of `kind` in `project_id`.
    pub fn builder(project_id: impl Into<String>, kind: impl Into<String>) -> KeyBuilder {
        KeyBuilder::new(project_id, kind)
    }

    /// The leaf id or name.
    pub fn id_or_name(&self) -> &IdOrName {
        match self.leaf().id_or_name() {
            Some(id_or_name) => id_or_name,
            None => unreachable!("complete key leaf always has an id or name"),
        }
    }

    /// The leaf id, if the key is id-addressed.
    pub fn id(&self) -> Option<i64> {
        self.leaf().id()
    }

    /// The leaf name, if the key is name-addressed.
    pub fn name(&self) -> Option<&str> {
        self.leaf().name()
    }

    /// Key of the nearest ancestor, if any.
    pub fn parent(&self) -> Option<Key> {
        if self.inner.path.len() < 2 {
            return None;
        }
        let path = self.inner.path[..self.inner.path.len() - 1].to_vec();
        Some(Key {
            inner: IncompleteKey {
                project_id: self.inner.project_id.clone(),
                namespace: self.inner.namespace.clone(),
                path,
            },
        })
    }

    /// Borrow as an incomplete key.
    pub fn as_incomplete(&self) -> &IncompleteKey {
        &self.inner
    }

    /// Convert into an incomplete key.
    pub fn into_incomplete(self) -> IncompleteKey {
        self.inner
    }
}

impl KeyPath for Key {
    fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    fn path(&self) -> &[PathElement] {
        &self.inner.path
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl From<Key> for IncompleteKey {
    fn from(key: Key) -> Self {
        key.inner
    }
}

// =============================================================================
// EntityKey
// =============================================================================

/// The key of a [`FullEntity`](crate::FullEntity): complete or not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// Leaf has an id or name
    Complete(Key),
    /// Leaf may lack an id or name
    Incomplete(IncompleteKey),
}

impl EntityKey {
    /// Return the complete key, if this is one.
    pub fn as_complete(&self) -> Option<&Key> {
        match self {
            EntityKey::Complete(key) => Some(key),
            EntityKey::Incomplete(_) => None,
        }
    }

    /// Normalize: an incomplete key with a complete leaf becomes complete.
    pub fn normalize(self) -> Self {
        match self {
            EntityKey::Incomplete(key) if key.is_complete() => EntityKey::Complete(Key { inner: key }),
            other => other,
        }
    }
}

impl KeyPath for EntityKey {
    fn project_id(&self) -> &str {
        match self {
            EntityKey::Complete(key) => key.project_id(),
            EntityKey::Incomplete(key) => key.project_id(),
        }
    }

    fn namespace(&self) -> &str {
        match self {
            EntityKey::Complete(key) => key.namespace(),
            EntityKey::Incomplete(key) => key.namespace(),
        }
    }

    fn path(&self) -> &[PathElement] {
        match self {
            EntityKey::Complete(key) => key.path(),
            EntityKey::Incomplete(key) => key.path(),
        }
    }
}

impl From<Key> for EntityKey {
    fn from(key: Key) -> Self {
        EntityKey::Complete(key)
    }
}

impl From<IncompleteKey> for EntityKey {
    fn from(key: IncompleteKey) -> Self {
        EntityKey::Incomplete(key).normalize()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Complete(key) => key.fmt(f),
            EntityKey::Incomplete(key) => key.fmt(f),
        }
    }
}

// =============================================================================
// KeyBuilder
// =============================================================================

/// Builder for [`Key`] and [`IncompleteKey`].
///
/// ```
/// use canonstore_core::{KeyBuilder, KeyPath, PathElement};
///
/// let key = KeyBuilder::new("test-project", "Task")
///     .namespace("tenant-a")
///     .ancestor(PathElement::with_name("TaskList", "default"))
///     .build_with_id(7)
///     .unwrap();
///
/// assert_eq!(key.kind(), "Task");
/// assert_eq!(key.id(), Some(7));
/// assert_eq!(key.ancestors().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    project_id: String,
    namespace: String,
    ancestors: Vec<PathElement>,
    kind: String,
}

impl KeyBuilder {
    /// Start a key of `kind` in `project_id`.
    pub fn new(project_id: impl Into<String>, kind: impl Into<String>) -> Self {
        KeyBuilder {
            project_id: project_id.into(),
            namespace: String::new(),
            ancestors: Vec::new(),
            kind: kind.into(),
        }
    }

    /// Start from an existing key: same project, namespace, ancestors and kind.
    pub fn from_key<K: KeyPath>(key: &K) -> Self {
        KeyBuilder {
            project_id: key.project_id().to_string(),
            namespace: key.namespace().to_string(),
            ancestors: key.ancestors().to_vec(),
            kind: key.kind().to_string(),
        }
    }

    /// Set the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the leaf kind.
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Append one ancestor.
    pub fn ancestor(mut self, element: PathElement) -> Self {
        self.ancestors.push(element);
        self
    }

    /// Append several ancestors, outermost first.
    pub fn ancestors(mut self, elements: impl IntoIterator<Item = PathElement>) -> Self {
        self.ancestors.extend(elements);
        self
    }

    /// Make the key a child of `parent`, replacing any ancestors set so far.
    pub fn parent(mut self, parent: &Key) -> Self {
        self.ancestors = parent.path().to_vec();
        self
    }

    /// Build a key whose leaf has no id or name.
    pub fn build_incomplete(self) -> Result<IncompleteKey> {
        self.build_leaf(None)
    }

    /// Build a complete key with a numeric id.
    pub fn build_with_id(self, id: i64) -> Result<Key> {
        Key::from_incomplete(self.build_leaf(Some(IdOrName::Id(id)))?)
    }

    /// Build a complete key with a name.
    pub fn build_with_name(self, name: impl Into<String>) -> Result<Key> {
        Key::from_incomplete(self.build_leaf(Some(IdOrName::Name(name.into())))?)
    }

    fn build_leaf(self, id_or_name: Option<IdOrName>) -> Result<IncompleteKey> {
        let mut path = self.ancestors;
        path.push(PathElement::new(self.kind, id_or_name));
        IncompleteKey::new(self.project_id, self.namespace, path)
    }
}

// =============================================================================
// KeyFactory
// =============================================================================

/// Produces keys scoped to one project and namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFactory {
    project_id: String,
    namespace: String,
}

impl KeyFactory {
    /// Factory for `project_id` with no namespace.
    pub fn new(project_id: impl Into<String>) -> Self {
        KeyFactory {
            project_id: project_id.into(),
            namespace: String::new(),
        }
    }

    /// Set the namespace every produced key carries.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Project id of produced keys.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Builder for a key of `kind`, pre-scoped to this factory.
    pub fn new_key(&self, kind: impl Into<String>) -> KeyBuilder {
        KeyBuilder::new(self.project_id.clone(), kind).namespace(self.namespace.clone())
    }

    /// Top-level key with a numeric id.
    pub fn new_key_with_id(&self, kind: impl Into<String>, id: i64) -> Result<Key> {
        self.new_key(kind).build_with_id(id)
    }

    /// Top-level key with a name.
    pub fn new_key_with_name(
        &self,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Key> {
        self.new_key(kind).build_with_name(name)
    }

    /// Top-level key with no id or name.
    pub fn new_incomplete_key(&self, kind: impl Into<String>) -> Result<IncompleteKey> {
        self.new_key(kind).build_incomplete()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod key_construction_tests {
        use super::*;

        #[test]
        fn test_build_with_id() {
            let key = KeyBuilder::new("p", "Task").build_with_id(5).unwrap();
            assert_eq!(key.project_id(), "p");
            assert_eq!(key.namespace(), "");
            assert_eq!(key.kind(), "Task");
            assert_eq!(key.id(), Some(5));
            assert_eq!(key.name(), None);
            assert_eq!(key.id_or_name(), &IdOrName::Id(5));
        }

        #[test]
        fn test_build_with_name_and_ancestors() {
            let key = KeyBuilder::new("p", "Task")
                .namespace("ns")
                .ancestor(PathElement::with_name("List", "inbox"))
                .ancestor(PathElement::with_id("Folder", 3))
                .build_with_name("t1")
                .unwrap();

            assert_eq!(key.namespace(), "ns");
            assert!(key.has_namespace());
            assert_eq!(key.path().len(), 3);
            assert_eq!(key.ancestors()[0], PathElement::with_name("List", "inbox"));
            assert_eq!(key.ancestors()[1], PathElement::with_id("Folder", 3));
            assert_eq!(key.name(), Some("t1"));
        }

        #[test]
        fn test_incomplete_key_has_no_leaf_id() {
            let key = KeyBuilder::new("p", "Task").build_incomplete().unwrap();
            assert!(!key.is_complete());
            assert!(Key::from_incomplete(key).unwrap_err().is_invalid_request());
        }

        #[test]
        fn test_complete_with_id() {
            let key = KeyBuilder::new("p", "Task").build_incomplete().unwrap();
            let key = key.complete_with_id(42).unwrap();
            assert_eq!(key.id(), Some(42));
        }

        #[test]
        fn test_empty_kind_rejected() {
            assert!(KeyBuilder::new("p", "").build_with_id(1).is_err());
        }

        #[test]
        fn test_empty_name_rejected() {
            assert!(KeyBuilder::new("p", "Task").build_with_name("").is_err());
        }

        #[test]
        fn test_empty_project_rejected() {
            assert!(KeyBuilder::new("", "Task").build_with_id(1).is_err());
        }

        #[test]
        fn test_incomplete_ancestor_rejected() {
            let result = KeyBuilder::new("p", "Task")
                .ancestor(PathElement::of("List"))
                .build_with_id(1);
            assert!(result.unwrap_err().is_invalid_request());
        }

        #[test]
        fn test_empty_path_rejected() {
            assert!(IncompleteKey::new("p", "", vec![]).is_err());
        }
    }

    mod path_limit_tests {
        use super::*;

        fn ancestors(n: usize) -> Vec<PathElement> {
            (0..n).map(|i| PathElement::with_id("A", i as i64 + 1)).collect()
        }

        #[test]
        fn test_path_at_limit_accepted() {
            let key = KeyBuilder::new("p", "Leaf")
                .ancestors(ancestors(MAX_PATH_LEN - 1))
                .build_with_id(1)
                .unwrap();
            assert_eq!(key.path().len(), MAX_PATH_LEN);
        }

        #[test]
        fn test_path_over_limit_rejected() {
            let result = KeyBuilder::new("p", "Leaf")
                .ancestors(ancestors(MAX_PATH_LEN))
                .build_incomplete();
            assert!(result.unwrap_err().is_invalid_request());
        }

        #[test]
        fn test_complete_key_over_limit_rejected() {
            let result = KeyBuilder::new("p", "Leaf")
                .ancestors(ancestors(MAX_PATH_LEN))
                .build_with_name("x");
            assert!(result.is_err());
        }
    }

    mod key_navigation_tests {
        use super::*;

        #[test]
        fn test_parent() {
            let key = KeyBuilder::new("p", "Task")
                .namespace("ns")
                .ancestor(PathElement::with_name("List", "inbox"))
                .build_with_id(9)
                .unwrap();
            let parent = key.parent().unwrap();
            assert_eq!(parent.kind(), "List");
            assert_eq!(parent.name(), Some("inbox"));
            assert_eq!(parent.namespace(), "ns");
            assert!(parent.parent().is_none());
        }

        #[test]
        fn test_builder_parent_and_from_key() {
            let parent = KeyBuilder::new("p", "List").build_with_name("inbox").unwrap();
            let child = KeyBuilder::new("p", "Task")
                .parent(&parent)
                .build_with_id(1)
                .unwrap();
            assert_eq!(child.parent().unwrap(), parent);

            let sibling = KeyBuilder::from_key(&child).build_with_id(2).unwrap();
            assert_eq!(sibling.parent().unwrap(), parent);
            assert_eq!(sibling.kind(), "Task");
        }

        #[test]
        fn test_ids_order_before_names() {
            let by_id = KeyBuilder::new("p", "K").build_with_id(i64::MAX).unwrap();
            let by_name = KeyBuilder::new("p", "K").build_with_name("a").unwrap();
            assert!(by_id < by_name);
        }

        #[test]
        fn test_display() {
            let key = KeyBuilder::new("p", "Task")
                .ancestor(PathElement::with_name("List", "inbox"))
                .build_with_id(3)
                .unwrap();
            assert_eq!(key.to_string(), "Key(p/, List:\"inbox\" > Task:3)");
        }
    }

    mod key_factory_tests {
        use super::*;

        #[test]
        fn test_factory_scopes_keys() {
            let factory = KeyFactory::new("p").namespace("ns");
            let key = factory.new_key_with_name("Task", "a").unwrap();
            assert_eq!(key.project_id(), "p");
            assert_eq!(key.namespace(), "ns");

            let incomplete = factory.new_incomplete_key("Task").unwrap();
            assert_eq!(incomplete.namespace(), "ns");
            assert!(!incomplete.is_complete());
        }

        #[test]
        fn test_entity_key_normalizes() {
            let incomplete = IncompleteKey::new("p", "", vec![PathElement::with_id("K", 1)]).unwrap();
            let entity_key = EntityKey::from(incomplete);
            assert!(entity_key.as_complete().is_some());

            let incomplete = IncompleteKey::new("p", "", vec![PathElement::of("K")]).unwrap();
            assert!(EntityKey::from(incomplete).as_complete().is_none());
        }
    }
}
