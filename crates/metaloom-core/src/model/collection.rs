use crate::{
    api::{Api, QueryParams},
    error::Error,
    model::entity::Entity,
};
use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use thiserror::Error as ThisError;

///
/// CollectionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CollectionError {
    #[error("collection members must carry a non-empty identifier")]
    MissingIdentifier,

    #[error("collection property is not attached to a saved parent entity")]
    DetachedParent,
}

///
/// Pager
/// Paging metadata attached to a listed collection.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pager {
    pub page: u32,
    pub page_count: u32,
    pub total: u64,
    pub page_size: Option<u32>,
    pub next_page: Option<String>,
    pub prev_page: Option<String>,
}

///
/// IdSet
///
/// Canonical set of entity identifiers. Ordering is ascending and does
/// not reflect insertion history.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[repr(transparent)]
pub struct IdSet(Vec<String>);

impl IdSet {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert an identifier, returning `true` if it was newly inserted.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();

        match self.0.binary_search(&id) {
            Ok(_) => false,
            Err(index) => {
                self.0.insert(index, id);
                true
            }
        }
    }

    /// Remove an identifier, returning `true` if it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.0.binary_search_by(|candidate| candidate.as_str().cmp(id)) {
            Ok(index) => {
                self.0.remove(index);
                true
            }
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0
            .binary_search_by(|candidate| candidate.as_str().cmp(id))
            .is_ok()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Render the set as the wire's `[{"id": ...}]` shape.
    #[must_use]
    pub fn to_id_objects(&self) -> JsonValue {
        JsonValue::Array(self.0.iter().map(|id| json!({ "id": id })).collect())
    }
}

impl<'a> IntoIterator for &'a IdSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

///
/// Collection
///
/// Insertion-ordered container of entities keyed by identifier. Listing
/// operations attach the pager metadata and the effective query that
/// produced the page.
///

#[derive(Clone, Debug, Default)]
pub struct Collection {
    entries: Vec<(String, Entity)>,
    pager: Option<Pager>,
    query: QueryParams,
}

impl Collection {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            pager: None,
            query: QueryParams::new(),
        }
    }

    /// Build a collection from members, replacing duplicates by id.
    pub fn from_members(members: impl IntoIterator<Item = Entity>) -> Result<Self, CollectionError> {
        let mut collection = Self::new();
        for member in members {
            collection.add(member)?;
        }

        Ok(collection)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.find_index(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.find_index(id).map(|index| &self.entries[index].1)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.find_index(id).map(|index| &mut self.entries[index].1)
    }

    /// Insert or replace a member keyed by its identifier. A member
    /// without a non-empty identifier is rejected.
    pub fn add(&mut self, member: Entity) -> Result<(), CollectionError> {
        let id = member_id(&member)?;

        match self.find_index(&id) {
            Some(index) => self.entries[index].1 = member,
            None => self.entries.push((id, member)),
        }

        Ok(())
    }

    /// Remove the member for `id`, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        self.find_index(id)
            .map(|index| self.entries.remove(index).1)
    }

    /// Iterate members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entries.iter().map(|(_, member)| member)
    }

    /// Iterate identifiers in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    #[must_use]
    pub const fn pager(&self) -> Option<&Pager> {
        self.pager.as_ref()
    }

    pub fn set_pager(&mut self, pager: Pager) {
        self.pager = Some(pager);
    }

    #[must_use]
    pub const fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn set_query(&mut self, query: QueryParams) {
        self.query = query;
    }

    /// Consume the collection, yielding members in insertion order.
    #[must_use]
    pub fn into_members(self) -> Vec<Entity> {
        self.entries.into_iter().map(|(_, member)| member).collect()
    }

    fn find_index(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == id)
    }
}

///
/// CollectionProperty
///
/// A collection that is itself a property of a parent entity. Tracks the
/// identifiers added and removed since the last successful save and
/// persists that delta with one batched request, rather than replacing
/// the whole membership.
///

#[derive(Clone, Debug, Default, Deref, DerefMut)]
pub struct CollectionProperty {
    #[deref]
    #[deref_mut]
    members: Collection,
    plural: String,
    parent_href: Option<String>,
    added: IdSet,
    removed: IdSet,
}

impl CollectionProperty {
    /// Create an empty collection property for the named plural segment.
    #[must_use]
    pub fn empty(plural: impl Into<String>, parent_href: Option<String>) -> Self {
        Self {
            members: Collection::new(),
            plural: plural.into(),
            parent_href,
            added: IdSet::new(),
            removed: IdSet::new(),
        }
    }

    /// Wrap existing members without recording them as pending additions.
    #[must_use]
    pub fn with_members(
        plural: impl Into<String>,
        parent_href: Option<String>,
        members: Collection,
    ) -> Self {
        Self {
            members,
            plural: plural.into(),
            parent_href,
            added: IdSet::new(),
            removed: IdSet::new(),
        }
    }

    #[must_use]
    pub fn plural(&self) -> &str {
        &self.plural
    }

    #[must_use]
    pub fn parent_href(&self) -> Option<&str> {
        self.parent_href.as_deref()
    }

    pub fn set_parent_href(&mut self, href: impl Into<String>) {
        self.parent_href = Some(href.into());
    }

    /// Identifiers pending addition.
    #[must_use]
    pub const fn added(&self) -> &IdSet {
        &self.added
    }

    /// Identifiers pending removal.
    #[must_use]
    pub const fn removed(&self) -> &IdSet {
        &self.removed
    }

    /// Returns `true` if any membership delta is pending persistence.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }

    /// Add a member. A no-op when the member is already present. Removing
    /// and re-adding the same identifier within one unsaved window cancels
    /// out to no pending change.
    pub fn add(&mut self, member: Entity) -> Result<(), CollectionError> {
        let id = member_id(&member)?;

        if self.members.contains(&id) {
            return Ok(());
        }

        if !self.removed.remove(&id) {
            self.added.insert(id.clone());
        }
        self.members.add(member)
    }

    /// Remove the member for `id`, symmetric to [`Self::add`].
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        let member = self.members.remove(id)?;

        if !self.added.remove(id) {
            self.removed.insert(id);
        }

        Some(member)
    }

    /// Flush the pending membership delta with one batched request.
    ///
    /// Fails without a transport call when nothing is pending or the
    /// property is detached from a saved parent. The delta survives a
    /// transport failure so a retry reattempts the same diff.
    pub async fn save(&mut self, api: &dyn Api) -> Result<JsonValue, Error> {
        if !self.is_dirty() {
            return Err(Error::NothingToSave);
        }

        let parent_href = self
            .parent_href
            .as_deref()
            .ok_or(CollectionError::DetachedParent)?;

        let body = json!({
            "additions": self.added.to_id_objects(),
            "deletions": self.removed.to_id_objects(),
        });

        let response = api
            .post(&format!("{parent_href}/{}", self.plural), body)
            .await?;

        self.added.clear();
        self.removed.clear();

        Ok(response)
    }
}

fn member_id(member: &Entity) -> Result<String, CollectionError> {
    member
        .id()
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .ok_or(CollectionError::MissingIdentifier)
}
