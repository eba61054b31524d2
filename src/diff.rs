//! Colored unified diffs of pseudocode before and after an action.

use colored::Colorize;
use similar::{ChangeTag, TextDiff};

/// Colored unified diff of one function's pseudocode.
///
/// Deletions are red, additions green. Returns an empty string when the two
/// versions are identical.
pub fn pseudocode_diff(old: &str, new: &str, name: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    if diff.ratio() == 1.0 {
        return String::new();
    }
    let mut output = String::new();
    output.push_str(&format!("--- a/{name}\n"));
    output.push_str(&format!("+++ b/{name}\n"));

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        output.push_str(&hunk.header().to_string());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{change}").red().to_string(),
                ChangeTag::Insert => format!("+{change}").green().to_string(),
                ChangeTag::Equal => format!(" {change}"),
            };
            output.push_str(&line);
            if change.missing_newline() {
                output.push('\n');
            }
        }
    }
    output
}

/// Diffs of every function whose text changed between two snapshots.
///
/// Both snapshots list functions in the same order; the newer name labels
/// the diff.
pub fn changed_functions(before: &[(String, String)], after: &[(String, String)]) -> Vec<String> {
    before
        .iter()
        .zip(after)
        .filter(|((_, old), (_, new))| old != new)
        .map(|((_, old), (name, new))| pseudocode_diff(old, new, name))
        .collect()
}
