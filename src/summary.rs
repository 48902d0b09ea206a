//! # Summary views
//! Aggregates behind the dashboard views (overview, sentiment, performance,
//! influencer, content), computed over the filtered mentions.
//!
//! Categorical values are grouped exactly as imported; no case folding or
//! validation happens here. Maps are `BTreeMap` so output order is stable.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ingest::types::Mention;

const TOP_USERS: usize = 10;
const TOP_POSTS: usize = 5;
const SNIPPET_CHARS: usize = 140;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Overview,
    Sentiment,
    Performance,
    Influencer,
    Content,
}

/// Engagement totals for a group of mentions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tally {
    pub mentions: usize,
    pub total_engagement: i64,
    pub comments: i64,
    pub reactions: i64,
    pub shares: i64,
}

impl Tally {
    fn add(&mut self, m: &Mention) {
        self.mentions += 1;
        self.total_engagement = self.total_engagement.saturating_add(m.total_engagement);
        self.comments = self.comments.saturating_add(m.comments);
        self.reactions = self.reactions.saturating_add(m.reactions);
        self.shares = self.shares.saturating_add(m.shares);
    }

    pub fn avg_engagement(&self) -> f64 {
        if self.mentions == 0 {
            0.0
        } else {
            self.total_engagement as f64 / self.mentions as f64
        }
    }
}

fn group_by<'a, F>(mentions: &'a [Mention], key: F) -> BTreeMap<String, Tally>
where
    F: Fn(&'a Mention) -> &'a str,
{
    let mut out: BTreeMap<String, Tally> = BTreeMap::new();
    for m in mentions {
        out.entry(key(m).to_string()).or_default().add(m);
    }
    out
}

fn counts(groups: &BTreeMap<String, Tally>) -> BTreeMap<String, usize> {
    groups.iter().map(|(k, t)| (k.clone(), t.mentions)).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub totals: Tally,
    pub sentiment: BTreeMap<String, usize>,
    pub channels: BTreeMap<String, usize>,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentView {
    pub totals: BTreeMap<String, usize>,
    /// date -> sentiment -> mentions
    pub by_date: BTreeMap<String, BTreeMap<String, usize>>,
    /// channel -> sentiment -> mentions
    pub by_channel: BTreeMap<String, BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelPerformance {
    pub channel: String,
    #[serde(flatten)]
    pub tally: Tally,
    pub avg_engagement: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceView {
    pub channels: Vec<ChannelPerformance>,
    /// date -> engagement
    pub engagement_by_date: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Influencer {
    pub username: String,
    #[serde(flatten)]
    pub tally: Tally,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfluencerView {
    pub top_users: Vec<Influencer>,
    pub speaker_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopPost {
    pub id: u64,
    pub username: String,
    pub channel: String,
    pub snippet: String,
    pub total_engagement: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentView {
    pub content_types: BTreeMap<String, Tally>,
    pub categories: BTreeMap<String, usize>,
    pub sub_categories: BTreeMap<String, usize>,
    pub top_posts: Vec<TopPost>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum ViewSummary {
    Overview(Overview),
    Sentiment(SentimentView),
    Performance(PerformanceView),
    Influencer(InfluencerView),
    Content(ContentView),
}

pub fn summarize(view: View, mentions: &[Mention]) -> ViewSummary {
    match view {
        View::Overview => ViewSummary::Overview(overview(mentions)),
        View::Sentiment => ViewSummary::Sentiment(sentiment(mentions)),
        View::Performance => ViewSummary::Performance(performance(mentions)),
        View::Influencer => ViewSummary::Influencer(influencer(mentions)),
        View::Content => ViewSummary::Content(content(mentions)),
    }
}

pub fn overview(mentions: &[Mention]) -> Overview {
    let mut totals = Tally::default();
    mentions.iter().for_each(|m| totals.add(m));
    Overview {
        totals,
        sentiment: counts(&group_by(mentions, |m| m.sentiment.as_str())),
        channels: counts(&group_by(mentions, |m| m.channel.as_str())),
        first_date: mentions.iter().map(|m| m.date.clone()).min(),
        last_date: mentions.iter().map(|m| m.date.clone()).max(),
    }
}

fn nested_counts<'a>(
    mentions: &'a [Mention],
    outer: impl Fn(&'a Mention) -> &'a str,
) -> BTreeMap<String, BTreeMap<String, usize>> {
    let mut out: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for m in mentions {
        *out.entry(outer(m).to_string())
            .or_default()
            .entry(m.sentiment.clone())
            .or_default() += 1;
    }
    out
}

pub fn sentiment(mentions: &[Mention]) -> SentimentView {
    SentimentView {
        totals: counts(&group_by(mentions, |m| m.sentiment.as_str())),
        by_date: nested_counts(mentions, |m| m.date.as_str()),
        by_channel: nested_counts(mentions, |m| m.channel.as_str()),
    }
}

pub fn performance(mentions: &[Mention]) -> PerformanceView {
    let mut channels: Vec<ChannelPerformance> = group_by(mentions, |m| m.channel.as_str())
        .into_iter()
        .map(|(channel, tally)| ChannelPerformance {
            channel,
            avg_engagement: tally.avg_engagement(),
            tally,
        })
        .collect();
    channels.sort_by(|a, b| b.tally.total_engagement.cmp(&a.tally.total_engagement));

    let mut engagement_by_date: BTreeMap<String, i64> = BTreeMap::new();
    for m in mentions {
        let e = engagement_by_date.entry(m.date.clone()).or_default();
        *e = e.saturating_add(m.total_engagement);
    }
    PerformanceView {
        channels,
        engagement_by_date,
    }
}

pub fn influencer(mentions: &[Mention]) -> InfluencerView {
    // Anonymous mentions (blank username) are not anyone's influence.
    let mut by_user: HashMap<&str, Tally> = HashMap::new();
    for m in mentions.iter().filter(|m| !m.username.is_empty()) {
        by_user.entry(m.username.as_str()).or_default().add(m);
    }
    let mut top_users: Vec<Influencer> = by_user
        .into_iter()
        .map(|(u, tally)| Influencer {
            username: u.to_string(),
            tally,
        })
        .collect();
    top_users.sort_by(|a, b| {
        b.tally
            .total_engagement
            .cmp(&a.tally.total_engagement)
            .then_with(|| a.username.cmp(&b.username))
    });
    top_users.truncate(TOP_USERS);

    InfluencerView {
        top_users,
        speaker_types: counts(&group_by(mentions, |m| m.type_of_speaker.as_str())),
    }
}

pub fn content(mentions: &[Mention]) -> ContentView {
    let mut ranked: Vec<&Mention> = mentions.iter().collect();
    ranked.sort_by(|a, b| {
        b.total_engagement
            .cmp(&a.total_engagement)
            .then(a.id.cmp(&b.id))
    });
    let top_posts = ranked
        .into_iter()
        .take(TOP_POSTS)
        .map(|m| TopPost {
            id: m.id,
            username: m.username.clone(),
            channel: m.channel.clone(),
            snippet: m.content.chars().take(SNIPPET_CHARS).collect(),
            total_engagement: m.total_engagement,
        })
        .collect();

    ContentView {
        content_types: group_by(mentions, |m| m.content_type.as_str()),
        categories: counts(&group_by(mentions, |m| m.category.as_str())),
        sub_categories: counts(&group_by(mentions, |m| m.sub_category.as_str())),
        top_posts,
    }
}
