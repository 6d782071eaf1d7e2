//! Subject naming (spec §4.7): `thread.<thread_id>.<role>`.

/// The role suffixes every envelope kind publishes under, one per
/// `EnvelopeKind` variant in snake_case. The reference design subscribes
/// per-subject with broker-side `*`/`>` wildcards (one thread's traffic
/// distinguished from another's); gossipsub topics are exact strings with
/// no wildcard matching, so `crate::network` subscribes its peers to this
/// fixed, bounded set of role-only topics instead of one topic per
/// `thread_id` — thread scoping still happens, just one layer up, via
/// `thread_id` carried in the envelope body rather than in the gossip
/// topic string.
pub const KNOWN_ROLES: &[&str] =
    &["need", "propose", "decide", "commit", "attest", "challenge", "heartbeat", "yield", "release", "plan", "finalize"];

/// Builds the bus subject a given thread/role pair publishes and
/// subscribes under.
pub fn thread_subject(thread_id: &str, role: &str) -> String {
    format!("thread.{thread_id}.{role}")
}

/// Splits `thread.<thread_id>.<role>` back into its parts. Returns `None`
/// for anything that isn't a well-formed 3-segment subject (wildcards are
/// a transport-level concern, handled by the gossipsub topic string
/// itself, not by this parser).
pub fn parse_subject(subject: &str) -> Option<(&str, &str)> {
    let mut parts = subject.splitn(3, '.');
    let head = parts.next()?;
    let thread_id = parts.next()?;
    let role = parts.next()?;
    if head != "thread" || thread_id.is_empty() || role.is_empty() {
        return None;
    }
    Some((thread_id, role))
}

/// The gossipsub topic a subject actually travels on: `swarmx.<role>`,
/// `thread_id` stripped (see `KNOWN_ROLES`). Used on the receive side to
/// recover which role an inbound message arrived under before the
/// envelope itself (carrying the real `thread_id`) has been decoded.
pub fn role_from_gossip_topic(topic: &str) -> Option<&str> {
    topic.strip_prefix("swarmx.").filter(|r| !r.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_round_trips() {
        let subject = thread_subject("t1", "propose");
        assert_eq!(subject, "thread.t1.propose");
        assert_eq!(parse_subject(&subject), Some(("t1", "propose")));
    }

    #[test]
    fn malformed_subject_rejected() {
        assert_eq!(parse_subject("not-a-subject"), None);
        assert_eq!(parse_subject("thread.t1"), None);
    }
}
