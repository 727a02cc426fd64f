//! The claimable item, its public view and the request payloads that act on it.
//!
//! An [`Item`] keeps its claimant and claim time together in one
//! `Option<Claim>`, so "claimed" can never be half set. [`ItemView`] is the
//! flat, camelCase shape handed to callers and persisted by row-oriented
//! backends; `isClaimed` is computed whenever a view is serialized.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::{RegistryError, Storable, Timestamp};

/// Version assigned to every newly created item, whichever path created it.
pub const INITIAL_VERSION: u64 = 0;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_GUEST_NAME_LEN: usize = 100;

/// Store-assigned item identifier. Never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        ItemId(id)
    }
}

/// Who claimed an item, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub guest_name: String,
    pub claimed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemView", into = "ItemView")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: Option<String>,
    pub claim: Option<Claim>,
    pub version: u64,
}

impl Item {
    pub fn is_claimed(&self) -> bool {
        self.claim.is_some()
    }

    pub fn claimed_by(&self) -> Option<&str> {
        self.claim.as_ref().map(|c| c.guest_name.as_str())
    }

    pub fn claimed_at(&self) -> Option<Timestamp> {
        self.claim.as_ref().map(|c| c.claimed_at)
    }

    /// Next version of this item, claimed by `guest_name` at `at`.
    pub fn claimed(&self, guest_name: String, at: Timestamp) -> Result<Item, RegistryError> {
        Ok(Item {
            claim: Some(Claim {
                guest_name,
                claimed_at: at,
            }),
            version: self.next_version()?,
            ..self.clone()
        })
    }

    /// Next version of this item with the claim cleared.
    pub fn released(&self) -> Result<Item, RegistryError> {
        Ok(Item {
            claim: None,
            version: self.next_version()?,
            ..self.clone()
        })
    }

    /// Next version of this item with `patch` applied, or `None` when the
    /// patch would leave every field as it is.
    pub fn patched(&self, patch: &ItemPatch) -> Result<Option<Item>, RegistryError> {
        let name = patch.name.as_ref().unwrap_or(&self.name);
        let description = match &patch.description {
            Some(d) => non_empty(d.clone()),
            None => self.description.clone(),
        };

        if *name == self.name && description == self.description {
            return Ok(None);
        }

        Ok(Some(Item {
            name: name.clone(),
            description,
            version: self.next_version()?,
            ..self.clone()
        }))
    }

    fn next_version(&self) -> Result<u64, RegistryError> {
        self.version
            .checked_add(1)
            .ok_or(RegistryError::VersionExhausted(self.id))
    }

    pub fn view(&self) -> ItemView {
        ItemView::from(self)
    }
}

impl Storable for Item {
    fn table_name() -> &'static str {
        "items"
    }

    fn columns() -> &'static [&'static str] {
        &[
            "id",
            "name",
            "description",
            "claimed_by",
            "claimed_at",
            "version",
        ]
    }

    fn column_types() -> &'static [&'static str] {
        &["bigint", "text", "text", "text", "datetime", "bigint"]
    }

    fn json_keys() -> &'static [&'static str] {
        &[
            "id",
            "name",
            "description",
            "claimedBy",
            "claimedAt",
            "version",
        ]
    }

    fn key_column() -> &'static str {
        "id"
    }
}

/// Flat, caller-facing snapshot of an item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub claimed_by: Option<String>,
    #[serde(default)]
    pub claimed_at: Option<Timestamp>,
    pub version: u64,
}

impl ItemView {
    pub fn is_claimed(&self) -> bool {
        self.claimed_by.as_deref().is_some_and(|g| !g.is_empty())
    }
}

impl Serialize for ItemView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ItemView", 7)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("claimedBy", &self.claimed_by)?;
        s.serialize_field("claimedAt", &self.claimed_at)?;
        s.serialize_field("isClaimed", &self.is_claimed())?;
        s.serialize_field("version", &self.version)?;
        s.end()
    }
}

impl From<&Item> for ItemView {
    fn from(item: &Item) -> Self {
        ItemView {
            id: item.id,
            name: item.name.clone(),
            description: item.description.clone(),
            claimed_by: item.claimed_by().map(str::to_string),
            claimed_at: item.claimed_at(),
            version: item.version,
        }
    }
}

impl From<Item> for ItemView {
    fn from(item: Item) -> Self {
        ItemView::from(&item)
    }
}

impl TryFrom<ItemView> for Item {
    type Error = String;

    fn try_from(view: ItemView) -> Result<Self, Self::Error> {
        let claim = match (view.claimed_by.and_then(non_empty), view.claimed_at) {
            (Some(guest_name), Some(claimed_at)) => Some(Claim {
                guest_name,
                claimed_at,
            }),
            (None, None) => None,
            (Some(guest), None) => {
                return Err(format!(
                    "item {} claimed by {guest} without a claim time",
                    view.id
                ));
            }
            (None, Some(at)) => {
                return Err(format!(
                    "item {} has claim time {at} but no claimant",
                    view.id
                ));
            }
        };

        Ok(Item {
            id: view.id,
            name: view.name,
            description: view.description.and_then(non_empty),
            claim,
            version: view.version,
        })
    }
}

/// Payload for creating (or seeding) an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewItem {
    pub fn new(name: impl Into<String>) -> Self {
        NewItem {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks bounds and returns the normalized payload.
    pub fn validated(self) -> Result<NewItem, RegistryError> {
        Ok(NewItem {
            name: validate_name(&self.name)?,
            description: validate_description(self.description)?,
        })
    }
}

/// Payload for claiming an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub guest_name: String,
    /// When set, the claim only succeeds against exactly this version.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

impl ClaimRequest {
    pub fn new(guest_name: impl Into<String>) -> Self {
        ClaimRequest {
            guest_name: guest_name.into(),
            expected_version: None,
        }
    }

    pub fn at_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Partial update of an item's descriptive fields. Claim state is never
/// touched by a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    /// `Some("")` clears the description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ItemPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validated(self) -> Result<ItemPatch, RegistryError> {
        let name = self.name.as_deref().map(validate_name).transpose()?;
        let description = match self.description {
            Some(d) => Some(validate_description(Some(d))?.unwrap_or_default()),
            None => None,
        };
        Ok(ItemPatch { name, description })
    }
}

pub(crate) fn validate_name(name: &str) -> Result<String, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RegistryError::validation("name", "must not be empty"));
    }
    check_len("name", name, MAX_NAME_LEN)?;
    Ok(name.to_string())
}

pub(crate) fn validate_description(
    description: Option<String>,
) -> Result<Option<String>, RegistryError> {
    match description.and_then(non_empty) {
        Some(d) => {
            check_len("description", &d, MAX_DESCRIPTION_LEN)?;
            Ok(Some(d))
        }
        None => Ok(None),
    }
}

pub(crate) fn validate_guest_name(guest_name: &str) -> Result<String, RegistryError> {
    let guest_name = guest_name.trim();
    if guest_name.is_empty() {
        return Err(RegistryError::validation("guestName", "must not be empty"));
    }
    check_len("guestName", guest_name, MAX_GUEST_NAME_LEN)?;
    Ok(guest_name.to_string())
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), RegistryError> {
    let len = value.chars().count();
    if len > max {
        return Err(RegistryError::validation(
            field,
            format!("{len} characters exceeds the limit of {max}"),
        ));
    }
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
