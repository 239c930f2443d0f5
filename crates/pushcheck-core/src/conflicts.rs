//! HTML rendering of the `conflicts` field.

use minijinja::HtmlEscape;

use crate::request::RequestId;

/// A sibling pickme that failed to merge alongside the one under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingConflict {
    pub id: RequestId,
    pub title: String,
    pub stdout: String,
    pub stderr: String,
}

/// Escape git output and keep its line breaks.
fn escape_output(text: &str) -> String {
    HtmlEscape(text.trim_end())
        .to_string()
        .replace('\n', "<br/>")
}

/// Conflict description for a pickme that does not merge onto the main branch.
#[must_use]
pub fn master_conflict(output: &str) -> String {
    format!(
        "<strong>Conflict with master:</strong><br/>{}",
        escape_output(output)
    )
}

/// Conflict description listing every conflicting sibling.
#[must_use]
pub fn pickme_conflicts(conflicts: &[SiblingConflict]) -> String {
    conflicts
        .iter()
        .map(|c| {
            format!(
                "<strong>Conflict with <a href=\"/request?id={}\">{}</a>: </strong><br/>{}<br/>{}<br/><br/>",
                c.id,
                HtmlEscape(&c.title),
                escape_output(&c.stdout),
                escape_output(&c.stderr),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_conflict_escapes_output() {
        let html = master_conflict("CONFLICT (content): Merge conflict in <a.txt>\n");
        assert!(html.starts_with("<strong>Conflict with master:</strong><br/>"));
        assert!(html.contains("&lt;a.txt&gt;"));
        assert!(!html.ends_with("<br/>"));
    }

    #[test]
    fn test_pickme_conflicts_lists_each_sibling() {
        let html = pickme_conflicts(&[
            SiblingConflict {
                id: RequestId(3),
                title: "Fix <b>bold</b> & stuff".into(),
                stdout: "CONFLICT one\nCONFLICT two".into(),
                stderr: String::new(),
            },
            SiblingConflict {
                id: RequestId(4),
                title: "Other".into(),
                stdout: "CONFLICT three".into(),
                stderr: "error: merge failed".into(),
            },
        ]);

        assert!(html.contains("href=\"/request?id=3\""));
        assert!(html.contains("href=\"/request?id=4\""));
        assert!(html.contains("Fix &lt;b&gt;bold"));
        assert!(html.contains("&amp; stuff"));
        assert!(html.contains("CONFLICT one<br/>CONFLICT two"));
        assert!(html.contains("error: merge failed"));
        assert_eq!(html.matches("<strong>Conflict with").count(), 2);
    }

    #[test]
    fn test_empty_list() {
        assert!(pickme_conflicts(&[]).is_empty());
    }
}
