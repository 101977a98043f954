//! Text helpers for resolution diagnostics.
//!
//! Keeps failure output readable: fully qualified type names are shortened
//! to their last path segment, and near-miss registrations are surfaced as
//! "did you mean" candidates.

/// Strips module paths from a fully qualified type name.
///
/// Works through generic parameters, references and tuples, so composite
/// names stay legible.
///
/// # Examples
/// ```
/// use ambry_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::services::UserService"), "UserService");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
///     "Arc<dyn Logger>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut pending_colon = false;

    for ch in full_name.chars() {
        match ch {
            ':' if pending_colon => {
                // "::" ends a path component; everything before it was a
                // module prefix we do not want.
                segment.clear();
                pending_colon = false;
            }
            ':' => pending_colon = true,
            '<' | '>' | '(' | ')' | '[' | ']' | ',' | ' ' | '&' => {
                if pending_colon {
                    segment.push(':');
                    pending_colon = false;
                }
                result.push_str(&segment);
                segment.clear();
                result.push(ch);
            }
            _ => {
                if pending_colon {
                    segment.push(':');
                    pending_colon = false;
                }
                segment.push(ch);
            }
        }
    }

    result.push_str(&segment);
    result
}

/// Picks up to `max_suggestions` registered type names that look like what
/// the caller asked for.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter_map(|&candidate| {
            let score = affinity(requested, candidate);
            (score > 0).then_some((candidate, score))
        })
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Rough similarity score between the requested name and one candidate.
/// Substring containment beats a shared prefix; zero means no resemblance.
fn affinity(requested: &str, candidate: &str) -> usize {
    let requested_full = requested.to_lowercase();
    let candidate_full = candidate.to_lowercase();

    if requested_full == candidate_full {
        return 0; // the exact key already failed to match; suggesting it back helps nobody
    }

    if candidate_full.contains(&requested_full) || requested_full.contains(&candidate_full) {
        return 100;
    }

    let requested_short = shorten_type_name(requested).to_lowercase();
    let candidate_short = shorten_type_name(candidate).to_lowercase();

    if candidate_short.contains(&requested_short) || requested_short.contains(&candidate_short) {
        return 80;
    }

    let common_prefix = requested_short
        .chars()
        .zip(candidate_short.chars())
        .take_while(|(a, b)| a == b)
        .count();

    if common_prefix >= 3 { common_prefix * 10 } else { 0 }
}
