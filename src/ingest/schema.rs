// src/ingest/schema.rs
//! Declarative mapping from heterogeneous source columns to the canonical
//! mention fields. The table is data: each entry lists the accepted source
//! keys in priority order, the coercion to apply, and the fallback.

use crate::ingest::types::{
    RawRow, RawValue, DEFAULT_CATEGORY, DEFAULT_CHANNEL, DEFAULT_CONTENT_TYPE, DEFAULT_SENTIMENT,
    DEFAULT_SPEAKER, DEFAULT_SUB_CATEGORY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Content,
    Sentiment,
    Channel,
    ContentType,
    TotalEngagement,
    Username,
    Category,
    SubCategory,
    TypeOfSpeaker,
    Comments,
    Reactions,
    Shares,
}

impl Field {
    /// Canonical (serialized) name.
    pub fn name(self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Content => "content",
            Field::Sentiment => "sentiment",
            Field::Channel => "channel",
            Field::ContentType => "content_type",
            Field::TotalEngagement => "total_engagement",
            Field::Username => "username",
            Field::Category => "category",
            Field::SubCategory => "sub_category",
            Field::TypeOfSpeaker => "type_of_speaker",
            Field::Comments => "comments",
            Field::Reactions => "reactions",
            Field::Shares => "shares",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Calendar date, processing date on failure.
    Date,
    /// Trimmed string.
    Text,
    /// Leading integer, 0 on failure.
    Integer,
    /// Untyped categorical pass-through.
    Label,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: Field,
    pub aliases: &'static [&'static str],
    pub coercion: Coercion,
    /// Fallback for absent values. Empty for `Date`, where the fallback is the
    /// processing date.
    pub default: &'static str,
}

impl FieldSpec {
    /// First alias (in priority order) whose value is present in `row`.
    pub fn resolve<'r>(&self, row: &'r RawRow) -> Option<&'r RawValue> {
        self.aliases
            .iter()
            .filter_map(|k| row.get(*k))
            .find(|v| v.is_present())
    }
}

pub const MENTION_SCHEMA: &[FieldSpec] = &[
    FieldSpec {
        field: Field::Date,
        aliases: &["date", "Date", "DATE"],
        coercion: Coercion::Date,
        default: "",
    },
    FieldSpec {
        field: Field::Content,
        aliases: &["content", "Content", "CONTENT"],
        coercion: Coercion::Text,
        default: "",
    },
    FieldSpec {
        field: Field::Sentiment,
        aliases: &["sentiment", "Sentiment", "SENTIMENT"],
        coercion: Coercion::Label,
        default: DEFAULT_SENTIMENT,
    },
    FieldSpec {
        field: Field::Channel,
        aliases: &["Channel", "channel", "CHANNEL"],
        coercion: Coercion::Label,
        default: DEFAULT_CHANNEL,
    },
    FieldSpec {
        field: Field::ContentType,
        aliases: &["content_type", "Content Type", "contentType"],
        coercion: Coercion::Label,
        default: DEFAULT_CONTENT_TYPE,
    },
    FieldSpec {
        field: Field::TotalEngagement,
        aliases: &["total_engagement", "Total Engagement", "totalEngagement"],
        coercion: Coercion::Integer,
        default: "0",
    },
    FieldSpec {
        field: Field::Username,
        aliases: &["username", "Username", "USERNAME", "user"],
        coercion: Coercion::Text,
        default: "",
    },
    FieldSpec {
        field: Field::Category,
        aliases: &["Category", "category", "CATEGORY"],
        coercion: Coercion::Label,
        default: DEFAULT_CATEGORY,
    },
    FieldSpec {
        field: Field::SubCategory,
        aliases: &["Sub_Category", "Sub Category", "subCategory", "Sub_category"],
        coercion: Coercion::Label,
        default: DEFAULT_SUB_CATEGORY,
    },
    FieldSpec {
        field: Field::TypeOfSpeaker,
        aliases: &["type_of_speaker", "Type of Speaker", "speakerType"],
        coercion: Coercion::Label,
        default: DEFAULT_SPEAKER,
    },
    FieldSpec {
        field: Field::Comments,
        aliases: &["Comment", "Comments", "comment"],
        coercion: Coercion::Integer,
        default: "0",
    },
    FieldSpec {
        field: Field::Reactions,
        aliases: &["Reactions", "reactions", "Reaction"],
        coercion: Coercion::Integer,
        default: "0",
    },
    FieldSpec {
        field: Field::Shares,
        aliases: &["Share", "Shares", "shares"],
        coercion: Coercion::Integer,
        default: "0",
    },
];

/// Look up a field's spec in [`MENTION_SCHEMA`].
pub fn spec_for(field: Field) -> &'static FieldSpec {
    MENTION_SCHEMA
        .iter()
        .find(|s| s.field == field)
        .unwrap_or_else(|| unreachable!("every Field has a schema entry"))
}

/// Every source column name the schema recognizes (for upload help text).
pub fn known_columns() -> Vec<&'static str> {
    MENTION_SCHEMA
        .iter()
        .flat_map(|s| s.aliases.iter().copied())
        .collect()
}
