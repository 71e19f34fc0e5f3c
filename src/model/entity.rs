//! Entity labels, tagger units, and merged spans.

use serde::{Deserialize, Serialize};

/// Category of personal information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityLabel {
    /// Person name
    Name,
    /// Resident registration number
    NationalId,
    /// Phone number
    Phone,
    /// Email address
    Email,
    /// Payment card number
    CardNumber,
    /// Postal address
    Address,
    /// Bank account number (regex only; the model has no such label)
    AccountNumber,
}

impl EntityLabel {
    /// All labels, in report order.
    pub const ALL: [EntityLabel; 7] = [
        EntityLabel::Name,
        EntityLabel::NationalId,
        EntityLabel::Phone,
        EntityLabel::Email,
        EntityLabel::CardNumber,
        EntityLabel::Address,
        EntityLabel::AccountNumber,
    ];

    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Name => "name",
            EntityLabel::NationalId => "national_id",
            EntityLabel::Phone => "phone",
            EntityLabel::Email => "email",
            EntityLabel::CardNumber => "card_number",
            EntityLabel::Address => "address",
            EntityLabel::AccountNumber => "account_number",
        }
    }

    /// Human-readable Korean name used in reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityLabel::Name => "이름",
            EntityLabel::NationalId => "주민번호",
            EntityLabel::Phone => "전화번호",
            EntityLabel::Email => "이메일",
            EntityLabel::CardNumber => "카드번호",
            EntityLabel::Address => "주소",
            EntityLabel::AccountNumber => "계좌번호",
        }
    }

    /// Parse a label name as written in a model's label set.
    ///
    /// Accepts the snake_case identifiers and the Korean display names.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        EntityLabel::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(name) || l.display_name() == name)
            .or(match name {
                "주민등록번호" => Some(EntityLabel::NationalId),
                "PER" | "PERSON" => Some(EntityLabel::Name),
                _ => None,
            })
    }

    /// Whether the tagger can produce this label.
    pub fn is_taggable(&self) -> bool {
        !matches!(self, EntityLabel::AccountNumber)
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Begin/inside/outside tag for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// First unit of an entity
    Begin(EntityLabel),
    /// Continuation of an entity
    Inside(EntityLabel),
    /// Not part of any entity
    Outside,
}

impl Tag {
    /// Parse a model label such as `B-이름`, `I-email` or `O`.
    ///
    /// Unknown entity names parse as [`Tag::Outside`].
    pub fn parse(label: &str) -> Self {
        let (prefix, entity) = match label.split_once('-') {
            Some(parts) => parts,
            None => return Tag::Outside,
        };
        let entity = match EntityLabel::parse(entity) {
            Some(e) if e.is_taggable() => e,
            _ => return Tag::Outside,
        };
        match prefix {
            "B" | "b" => Tag::Begin(entity),
            "I" | "i" => Tag::Inside(entity),
            _ => Tag::Outside,
        }
    }

    /// Entity label carried by the tag, if any.
    pub fn label(&self) -> Option<EntityLabel> {
        match self {
            Tag::Begin(l) | Tag::Inside(l) => Some(*l),
            Tag::Outside => None,
        }
    }
}

/// One unit of tagger output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedUnit {
    /// Unit text (one character)
    pub text: String,
    /// Predicted tag
    pub tag: Tag,
    /// Character offset in the tagged text
    pub position: usize,
}

impl TaggedUnit {
    /// Create a unit.
    pub fn new(text: impl Into<String>, tag: Tag, position: usize) -> Self {
        Self {
            text: text.into(),
            tag,
            position,
        }
    }
}

/// A contiguous run of text carrying one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    /// Span text
    pub text: String,
    /// Entity label
    pub label: EntityLabel,
    /// Character offset of the first unit
    pub start: usize,
}

impl EntitySpan {
    /// Create a span.
    pub fn new(text: impl Into<String>, label: EntityLabel, start: usize) -> Self {
        Self {
            text: text.into(),
            label,
            start,
        }
    }

    /// Character offset one past the last unit.
    pub fn end(&self) -> usize {
        self.start + self.text.chars().count()
    }

    /// Whether the span is whitespace only.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
