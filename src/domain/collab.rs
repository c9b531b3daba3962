//! Collaboration detection heuristic
//!
//! A video counts as a collaboration when the display name of any *other*
//! known member appears verbatim in the video's combined title and
//! description. Substring matching only; short or overlapping names can
//! false-positive, which is accepted behavior.

/// Returns true iff any of `other_names` occurs as a literal substring of
/// `text`. The caller is responsible for excluding the feed owner's own name.
pub fn is_collaboration<'a, I>(text: &str, other_names: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    other_names
        .into_iter()
        .any(|name| !name.is_empty() && text.contains(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_other_member_in_title() {
        let others = ["Bob"];
        assert!(is_collaboration(
            "Bob and Alice play a game",
            others.iter().copied()
        ));
    }

    #[test]
    fn owner_only_roster_is_not_a_collab() {
        // Alice's own video with no other known member mentioned.
        let others: [&str; 0] = [];
        assert!(!is_collaboration(
            "Alice plays a game alone",
            others.iter().copied()
        ));
    }

    #[test]
    fn unrelated_names_do_not_match() {
        let others = ["Carol", "Dave"];
        assert!(!is_collaboration(
            "Bob and Alice play a game",
            others.iter().copied()
        ));
    }

    #[test]
    fn substring_matching_has_no_word_boundaries() {
        // Known limitation: "Ame" matches inside "Amelia".
        let others = ["Ame"];
        assert!(is_collaboration("Amelia solo stream", others.iter().copied()));
    }
}
