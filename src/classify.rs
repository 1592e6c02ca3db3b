//! Event classification - maps one review event to zero or more notifications

use crate::event::Event;

/// Which classification rule produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    BuildPassed,
    BuildFailed,
    CodeReviewPlusTwo,
    CodeReviewPlusOne,
    QaProductApproved,
    QaApproved,
    ProductApproved,
    Rejected,
    CommentAdded,
    ChangePushed,
    ChangeUpdated,
    ChangeMerged,
}

/// Who a notification goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every channel subscribed to the event's project/owner.
    Broadcast,
    /// Direct message to the named change owner.
    Direct(String),
}

/// One fully formatted notification, ready for buffering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub rule: Rule,
    pub audience: Audience,
    pub text: String,
    /// Optional emoji or marker the routing layer may prepend.
    pub decoration: Option<String>,
}

impl Notification {
    fn broadcast(rule: Rule, text: String) -> Self {
        Self {
            rule,
            audience: Audience::Broadcast,
            text,
            decoration: None,
        }
    }

    fn direct(rule: Rule, owner: &str, text: String) -> Self {
        Self {
            rule,
            audience: Audience::Direct(owner.to_string()),
            text,
            decoration: None,
        }
    }
}

/// Classify one event into its notifications.
///
/// Pure and stateless: the same event always yields the same sequence.
/// Rules are independent; every matching rule fires, in a fixed order, so a
/// single event can produce several notifications.
pub fn classify(event: &Event) -> Vec<Notification> {
    let mut out = Vec::new();
    let project = event.project().unwrap_or("unknown");

    // CI build results
    if event.is_ci_comment() {
        if event.build_successful() && !event.is_wip() {
            out.push(Notification::broadcast(
                Rule::BuildPassed,
                format!(
                    "*[{}]* {} *passed* the build and is ready for *code review*",
                    project,
                    event.commit()
                ),
            ));
        } else if event.build_failed() && !event.build_aborted() {
            if let Some(owner) = event.owner() {
                out.push(Notification::direct(
                    Rule::BuildFailed,
                    owner,
                    format!(
                        "*[{}]* {} *failed* on CI",
                        project,
                        event.commit_without_owner()
                    ),
                ));
            }
        }
    }

    let author = event.author().unwrap_or("someone");

    // Code review +2
    if event.code_review_approved() {
        out.push(Notification::broadcast(
            Rule::CodeReviewPlusTwo,
            format!(
                "*[{}]* {} has *+2'd* {}: ready for *QA*",
                project,
                author,
                event.commit()
            ),
        ));
    }

    // Code review +1
    if event.code_review_tentatively_approved() {
        out.push(Notification::broadcast(
            Rule::CodeReviewPlusOne,
            format!(
                "*[{}]* {} has *+1'd* {}: needs another set of eyes for *code review*",
                project,
                author,
                event.commit()
            ),
        ));
    }

    // QA / Product approvals, combined when both land in one event
    if event.qa_approved() && event.product_approved() {
        out.push(Notification::broadcast(
            Rule::QaProductApproved,
            format!(
                "*[{}]* {} has *QA/Product-approved* {}!",
                project,
                author,
                event.commit()
            ),
        ));
    } else if event.qa_approved() {
        out.push(Notification::broadcast(
            Rule::QaApproved,
            format!("*[{}]* {} has *QA-approved* {}!", project, author, event.commit()),
        ));
    } else if event.product_approved() {
        out.push(Notification::broadcast(
            Rule::ProductApproved,
            format!(
                "*[{}]* {} has *Product-approved* {}!",
                project,
                author,
                event.commit()
            ),
        ));
    }

    // Rejections across all categories. The verb follows the weak rejection
    // whenever one exists, even alongside a -2 in another category.
    if event.weak_rejection() || event.strong_rejection() {
        let verb = if event.weak_rejection() { "-1'd" } else { "-2'd" };
        out.push(Notification::broadcast(
            Rule::Rejected,
            format!("*[{}]* {} has *{}* {}", project, author, verb, event.commit()),
        ));
    }

    // Human comments, minus Gerrit boilerplate
    if event.is_comment_added() && event.is_human_author() {
        let comment = event.comment();
        if !comment.is_empty() {
            out.push(Notification::broadcast(
                Rule::CommentAdded,
                format!(
                    "*[{}]* {} has left comments on {}: \"{}\"",
                    project,
                    author,
                    event.commit(),
                    comment
                ),
            ));
        }
    }

    // New change pushed
    if event.is_new_change() {
        out.push(Notification::broadcast(
            Rule::ChangePushed,
            format!("*[{}]* {} has *pushed* {}", project, author, event.commit()),
        ));
    }

    // Follow-up patch set
    if event.is_updated_change() {
        out.push(Notification::broadcast(
            Rule::ChangeUpdated,
            format!(
                "*[{}]* {} has *updated* {}: Patch Set {}",
                project,
                author,
                event.commit(),
                event.patchset_number().unwrap_or(0)
            ),
        ));
    }

    // Merge
    if event.is_merged() {
        out.push(Notification::broadcast(
            Rule::ChangeMerged,
            format!("{} was merged!", event.commit()),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: &str) -> Event {
        Event::parse(json).expect("test event should parse")
    }

    fn rules(event: &Event) -> Vec<Rule> {
        classify(event).into_iter().map(|n| n.rule).collect()
    }

    #[test]
    fn test_unmatched_event_yields_nothing() {
        let e = event(r#"{"type": "ref-updated"}"#);
        assert!(classify(&e).is_empty());
    }

    #[test]
    fn test_classification_is_idempotent() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Lee", "username": "lee"},
                "approvals": [{"type": "Code-Review", "value": "2"}]}"#,
        );
        assert_eq!(classify(&e), classify(&e));
    }

    #[test]
    fn test_multiple_rules_fire_for_one_event() {
        // A +1 together with a human comment produces both notifications,
        // in rule order.
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Lee", "username": "lee"},
                "comment": "Patch Set 2: Code-Review+1\n\nMinor nits inline",
                "approvals": [{"type": "Code-Review", "value": "1"}]}"#,
        );
        assert_eq!(rules(&e), vec![Rule::CodeReviewPlusOne, Rule::CommentAdded]);
    }

    #[test]
    fn test_combined_qa_product_approval_is_single_fact() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Lee", "username": "lee"},
                "approvals": [{"type": "QA-Review", "value": "1"},
                              {"type": "Product-Review", "value": "1"}]}"#,
        );
        let notifications = classify(&e);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].rule, Rule::QaProductApproved);
        assert!(notifications[0].text.contains("QA/Product-approved"));
    }

    #[test]
    fn test_single_category_approval() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Lee", "username": "lee"},
                "approvals": [{"type": "Product-Review", "value": "1"}]}"#,
        );
        let notifications = classify(&e);
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].text.contains("*Product-approved*"));
    }

    #[test]
    fn test_rejection_verb_prefers_weak_when_both_present() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Lee", "username": "lee"},
                "approvals": [{"type": "QA-Review", "value": "-1"},
                              {"type": "Code-Review", "value": "-2"}]}"#,
        );
        let notifications = classify(&e);
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].text.contains("-1'd"));
    }

    #[test]
    fn test_strong_rejection_alone_uses_minus_two_verb() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Lee", "username": "lee"},
                "approvals": [{"type": "Code-Review", "value": "-2"}]}"#,
        );
        let notifications = classify(&e);
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].text.contains("-2'd"));
    }

    #[test]
    fn test_ci_success_on_wip_change_is_silent() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "WIP: half done", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Hudson CI", "username": "hudson"},
                "comment": "Patch Set 1: Build Successful"}"#,
        );
        assert!(classify(&e).is_empty());
    }

    #[test]
    fn test_ci_aborted_build_is_silent() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Hudson CI", "username": "hudson"},
                "comment": "Patch Set 1: Build Failed ABORTED"}"#,
        );
        assert!(classify(&e).is_empty());
    }

    #[test]
    fn test_bot_comment_is_not_relayed() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Firework", "username": "firework"},
                "comment": "automated noise"}"#,
        );
        assert!(classify(&e).is_empty());
    }

    #[test]
    fn test_boilerplate_only_comment_is_suppressed() {
        let e = event(
            r#"{"type": "comment-added",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "author": {"name": "Lee", "username": "lee"},
                "comment": "Patch Set 4:\n\nReviewer DID NOT check the style guide"}"#,
        );
        assert!(classify(&e).is_empty());
    }

    #[test]
    fn test_merge_notification() {
        let e = event(
            r#"{"type": "change-merged",
                "change": {"project": "api", "subject": "Fix", "url": "http://g/1",
                           "owner": {"name": "Kim"}},
                "submitter": {"name": "Kim", "username": "kim"}}"#,
        );
        let notifications = classify(&e);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].rule, Rule::ChangeMerged);
        assert!(notifications[0].text.ends_with("was merged!"));
    }
}
