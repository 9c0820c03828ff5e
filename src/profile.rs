//! User profile attached to outgoing prompts
//!
//! A profile is a flat, order-preserving map of field names to values.
//! Before it is sent, blank fields are dropped and known field names are
//! replaced by their display labels.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};

/// Fields the profile form knows about, keyed by their stored name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ProfileField {
    FullName,
    PersonalNumber,
    Department,
    Contact,
}

impl ProfileField {
    /// Stored key, e.g. `fullName`.
    pub fn key(self) -> &'static str {
        self.into()
    }

    /// Label used when the profile is attached to a prompt.
    pub fn label(self) -> &'static str {
        FIELD_LABELS.get(self.key()).copied().unwrap_or(self.key())
    }

    /// Short caption used when showing the profile to the user.
    pub fn caption(self) -> &'static str {
        match self {
            ProfileField::FullName => "Jméno",
            ProfileField::PersonalNumber => "Osobní číslo",
            ProfileField::Department => "Útvar",
            ProfileField::Contact => "Kontakt",
        }
    }

    /// Accepts the stored key in any case, with or without `-`/`_` separators.
    pub fn parse(input: &str) -> Option<ProfileField> {
        let wanted: String = input
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        ProfileField::iter().find(|field| field.key().to_lowercase() == wanted)
    }
}

/// Translation of stored field names into prompt labels
pub static FIELD_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert("fullName", "Jméno a příjmení");
    map.insert("personalNumber", "Osobní číslo");
    map.insert("department", "Útvar / oddělení");
    map.insert("contact", "Telefon / e-mail");
    map
});

const PROMPT_LEAD: &str = "Uživatel s následujícími přihlašovacími údaji: ";
const PROMPT_TAIL: &str = " odesílá následující zprávu: ";

/// Ordered field map, serialized as a flat JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    fields: Vec<(String, String)>,
}

impl Profile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut profile = Self::new();
        for (key, value) in pairs {
            profile.set(key, value);
        }
        profile
    }

    /// Insert a field, or overwrite it in place when it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Drop blank fields and translate known keys to their labels.
///
/// Unknown keys pass through unchanged and the input order is kept. When two
/// input keys end up with the same label the later value wins, in the
/// position of the first.
pub fn compose(profile: &Profile) -> Profile {
    let mut composed = Profile::new();
    for (key, value) in profile.iter() {
        if value.trim().is_empty() {
            continue;
        }
        let label = FIELD_LABELS.get(key).copied().unwrap_or(key);
        composed.set(label, value);
    }
    composed
}

/// Header put in front of the user's text, empty when nothing is set.
pub fn prompt_prefix(profile: &Profile) -> String {
    let composed = compose(profile);
    if composed.is_empty() {
        return String::new();
    }
    // A string-keyed map of strings always serializes.
    let json = serde_json::to_string(&composed).unwrap_or_default();
    format!("{PROMPT_LEAD}{json}{PROMPT_TAIL}")
}

/// Full prompt sent to the assistant for `text`.
pub fn compose_prompt(profile: &Profile, text: &str) -> String {
    let mut prompt = prompt_prefix(profile);
    prompt.push_str(text);
    prompt
}

impl Serialize for Profile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A stored value: text, null, or anything else, which is skipped
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredValue {
    Text(String),
    Null(()),
    Other(IgnoredAny),
}

struct ProfileVisitor;

impl<'de> Visitor<'de> for ProfileVisitor {
    type Value = Profile;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a flat map of profile fields")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Profile, M::Error> {
        let mut profile = Profile::new();
        while let Some((key, value)) = access.next_entry::<String, StoredValue>()? {
            match value {
                StoredValue::Text(text) => profile.set(key, text),
                StoredValue::Null(()) => profile.set(key, ""),
                StoredValue::Other(_) => tracing::warn!(%key, "Skipping non-text profile field"),
            }
        }
        Ok(profile)
    }
}

impl<'de> Deserialize<'de> for Profile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Profile, D::Error> {
        deserializer.deserialize_map(ProfileVisitor)
    }
}
