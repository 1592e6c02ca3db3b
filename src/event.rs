//! Gerrit stream event parsing - typed records and derived predicates

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Username of the CI account that posts build results.
pub const CI_USERNAME: &str = "hudson";

/// Accounts whose comments are machine-generated, never relayed as human comments.
pub const BOT_USERNAMES: &[&str] = &["hudson", "firework"];

/// Kind of review event, derived once at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PatchsetCreated,
    CommentAdded,
    ChangeMerged,
    Other,
}

/// Raw event as emitted by `gerrit stream-events`, one JSON object per line.
///
/// Every nested object is optional: a comment event carries no `patchSet`,
/// a merge event identifies the actor via `submitter` instead of `author`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub change: Option<RawChange>,
    #[serde(rename = "patchSet")]
    pub patch_set: Option<RawPatchSet>,
    pub author: Option<RawAccount>,
    pub approvals: Option<Vec<RawApproval>>,
    pub comment: Option<String>,
    pub submitter: Option<RawAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawChange {
    pub project: Option<String>,
    pub subject: Option<String>,
    pub url: Option<String>,
    pub owner: Option<RawAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPatchSet {
    #[serde(default, deserialize_with = "deserialize_patchset_number")]
    pub number: Option<u64>,
    pub author: Option<RawAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAccount {
    pub name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawApproval {
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub value: Option<String>,
}

/// Gerrit encodes patch set numbers as JSON strings in stream-events; newer
/// versions emit plain integers. Accept both.
fn deserialize_patchset_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::String(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// One review event, parsed and immutable. All predicates are pure reads.
#[derive(Debug, Clone)]
pub struct Event {
    kind: EventKind,
    raw: RawEvent,
}

fn wip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bwip\b").unwrap())
}

fn patch_set_boilerplate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Patch Set \d+").unwrap())
}

fn reviewer_check_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Reviewer (DID NOT )?check").unwrap())
}

impl Event {
    /// Parse one raw stream line. Fails on malformed JSON; the caller is
    /// expected to skip the line and keep the stream alive.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let raw: RawEvent = serde_json::from_str(line)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_raw(raw: RawEvent) -> Self {
        let kind = match raw.event_type.as_deref() {
            Some("patchset-created") => EventKind::PatchsetCreated,
            Some("comment-added") => EventKind::CommentAdded,
            Some("change-merged") => EventKind::ChangeMerged,
            _ => EventKind::Other,
        };
        Self { kind, raw }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn raw(&self) -> &RawEvent {
        &self.raw
    }

    pub fn project(&self) -> Option<&str> {
        self.raw.change.as_ref()?.project.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.raw.change.as_ref()?.subject.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.raw.change.as_ref()?.url.as_deref()
    }

    /// Change owner display name. Merge events carry the owner under
    /// `submitter` rather than `change.owner`.
    pub fn owner(&self) -> Option<&str> {
        self.raw
            .change
            .as_ref()
            .and_then(|c| c.owner.as_ref())
            .and_then(|o| o.name.as_deref())
            .or_else(|| self.raw.submitter.as_ref().and_then(|s| s.name.as_deref()))
    }

    /// Display name of whoever triggered the event, falling back to the
    /// patch set uploader when no top-level author is present.
    pub fn author(&self) -> Option<&str> {
        self.raw
            .author
            .as_ref()
            .and_then(|a| a.name.as_deref())
            .or_else(|| {
                self.raw
                    .patch_set
                    .as_ref()
                    .and_then(|p| p.author.as_ref())
                    .and_then(|a| a.name.as_deref())
            })
    }

    fn author_username(&self) -> Option<&str> {
        self.raw.author.as_ref().and_then(|a| a.username.as_deref())
    }

    pub fn patchset_number(&self) -> Option<u64> {
        self.raw.patch_set.as_ref().and_then(|p| p.number)
    }

    pub fn is_comment_added(&self) -> bool {
        self.kind == EventKind::CommentAdded
    }

    pub fn is_merged(&self) -> bool {
        self.kind == EventKind::ChangeMerged
    }

    /// First patch set of a change.
    pub fn is_new_change(&self) -> bool {
        self.kind == EventKind::PatchsetCreated && self.patchset_number() == Some(1)
    }

    /// A later patch set on an existing change.
    pub fn is_updated_change(&self) -> bool {
        self.kind == EventKind::PatchsetCreated
            && matches!(self.patchset_number(), Some(n) if n != 1)
    }

    /// Comment posted by the CI account (a build result).
    pub fn is_ci_comment(&self) -> bool {
        self.is_comment_added() && self.author_username() == Some(CI_USERNAME)
    }

    pub fn is_human_author(&self) -> bool {
        match self.author_username() {
            Some(username) => !BOT_USERNAMES.contains(&username),
            None => false,
        }
    }

    pub fn build_successful(&self) -> bool {
        self.raw_comment().contains("Build Successful")
    }

    pub fn build_failed(&self) -> bool {
        self.raw_comment().contains("Build Failed")
    }

    pub fn build_aborted(&self) -> bool {
        self.raw_comment().contains("ABORTED")
    }

    /// Work-in-progress change, flagged via "wip" in the subject.
    pub fn is_wip(&self) -> bool {
        self.subject().is_some_and(|s| wip_re().is_match(s))
    }

    fn raw_comment(&self) -> &str {
        self.raw.comment.as_deref().unwrap_or("")
    }

    /// Comment text with Gerrit boilerplate stripped.
    ///
    /// Paragraphs are blank-line separated. "Patch Set N" paragraphs are
    /// dropped; everything from the first "Reviewer checked..." trailer
    /// onward is discarded. Returns the empty string when nothing survives.
    pub fn comment(&self) -> String {
        let mut kept: Vec<&str> = Vec::new();
        for paragraph in self.raw_comment().split("\n\n") {
            if patch_set_boilerplate_re().is_match(paragraph) {
                continue;
            }
            if reviewer_check_re().is_match(paragraph) {
                break;
            }
            kept.push(paragraph);
        }
        kept.join("\n\n")
    }

    pub fn has_approval(&self, category: &str, value: &str) -> bool {
        self.raw.approvals.as_ref().is_some_and(|approvals| {
            approvals
                .iter()
                .any(|a| a.category.as_deref() == Some(category) && a.value.as_deref() == Some(value))
        })
    }

    pub fn code_review_approved(&self) -> bool {
        self.has_approval("Code-Review", "2")
    }

    pub fn code_review_tentatively_approved(&self) -> bool {
        self.has_approval("Code-Review", "1")
    }

    pub fn code_review_rejected(&self) -> bool {
        self.has_approval("Code-Review", "-1")
    }

    pub fn qa_approved(&self) -> bool {
        self.has_approval("QA-Review", "1")
    }

    pub fn qa_rejected(&self) -> bool {
        self.has_approval("QA-Review", "-1")
    }

    pub fn product_approved(&self) -> bool {
        self.has_approval("Product-Review", "1")
    }

    pub fn product_rejected(&self) -> bool {
        self.has_approval("Product-Review", "-1")
    }

    /// Any weak rejection across the three review categories.
    pub fn weak_rejection(&self) -> bool {
        self.code_review_rejected() || self.qa_rejected() || self.product_rejected()
    }

    pub fn strong_rejection(&self) -> bool {
        self.has_approval("Code-Review", "-2")
    }

    /// Slack-style link to the change with the owner appended.
    pub fn commit(&self) -> String {
        format!("{} (by {})", self.commit_without_owner(), self.owner().unwrap_or("unknown"))
    }

    /// Slack-style link to the change, subject escaped for markup safety.
    pub fn commit_without_owner(&self) -> String {
        format!(
            "<{}| {}>",
            self.url().unwrap_or(""),
            escape_markup(self.subject().unwrap_or(""))
        )
    }
}

/// Escape `&`, `<`, `>` so user-supplied subjects cannot break Slack links.
/// Ampersands first, so the entities themselves are not re-escaped.
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
