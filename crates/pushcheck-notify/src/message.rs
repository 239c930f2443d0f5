//! Message composition.
//!
//! Email bodies are minijinja templates with HTML auto-escaping, so every
//! request field is escaped. The conflicts block is already HTML and is
//! the one value rendered as `safe`.

use minijinja::{Environment, Value, context};
use pushcheck_core::config::Config;
use pushcheck_core::{Outcome, PushRequest};

use crate::error::Result;

const REQUEST_BLOCK: &str = r#"<p>
    <strong>{{ user }} - {{ title }}</strong><br />
    <em>{{ repo }}/{{ branch }}</em><br />
    <a href="{{ app_url|safe }}/request?id={{ id }}">{{ app_url|safe }}/request?id={{ id }}</a>
</p>
{% if reviewid %}<p>
    Review #: <a href="https://{{ reviewboard|safe }}/r/{{ reviewid }}">{{ reviewid }}</a>
</p>
{% endif %}"#;

const REVISION_BLOCK: &str = r"<p>
    {{ revision_label }}<code>{{ revision }}</code><br/>
    <em>(If this is <strong>not</strong> the revision you expected,
    make sure you've pushed your latest version to the correct repo!)</em>
</p>
<p>
    Regards,<br/>
    pushcheck
</p>
";

const VERIFIED: &str = r#"<p>
    pushcheck has verified the branch for your request.
</p>
{% include "request.html" %}{% with revision_label = "Verified revision: " %}{% include "revision.html" %}{% endwith %}"#;

const VERIFY_FAILED: &str = r#"<p>
    <em>pushcheck could <strong>not</strong> verify the branch for your request.</em>
</p>
{% include "request.html" %}<p>
    <strong>Error message</strong>:<br />
    {{ failure_msg }}
</p>
{% with revision_label = "Recorded revision: " %}{% include "revision.html" %}{% endwith %}"#;

const CONFLICT: &str = r#"<p>
    pushcheck has detected that your pickme contains conflicts with {{ conflicts_with }}.
</p>
{% include "request.html" %}<p>
    {{ conflicts|safe }}
</p>
{% with revision_label = "" %}{% include "revision.html" %}{% endwith %}"#;

const CONFLICT_CHAT: &str = "pushcheck has detected that your pickme for {{ branch }} contains \
conflicts with {{ conflicts_with }}\n{{ app_url }}/request?id={{ id }}";

/// A composed email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub html: String,
}

/// Where links in messages point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links {
    /// Base URL of the push manager, such as `https://push.example.com`.
    pub app_url: String,
    /// Host of the review board.
    pub reviewboard: String,
}

impl Links {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            app_url: config.main_app.base_url(),
            reviewboard: config.reviewboard.servername.clone(),
        }
    }
}

/// Renders notification messages for job outcomes.
#[derive(Debug)]
pub struct MessageFormatter {
    env: Environment<'static>,
    links: Links,
}

impl MessageFormatter {
    /// Compile the message templates.
    ///
    /// # Errors
    /// Returns error if a template fails to compile.
    pub fn new(links: Links) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("request.html", REQUEST_BLOCK)?;
        env.add_template("revision.html", REVISION_BLOCK)?;
        env.add_template("verified.html", VERIFIED)?;
        env.add_template("verify_failed.html", VERIFY_FAILED)?;
        env.add_template("conflict.html", CONFLICT)?;
        env.add_template("conflict.txt", CONFLICT_CHAT)?;
        Ok(Self { env, links })
    }

    fn request_context(&self, request: &PushRequest, outcome: &Outcome) -> Value {
        let (failure_msg, conflicts_with) = match outcome {
            Outcome::VerifyFailed(failure) => (Some(failure.to_string()), None),
            Outcome::MasterConflict => (None, Some("master")),
            Outcome::PickmeConflict => (None, Some("another pickme")),
            Outcome::Verified => (None, None),
        };
        context! {
            id => request.id.0,
            user => &request.user,
            title => &request.title,
            repo => &request.repo,
            branch => &request.branch,
            revision => request.revision.as_str(),
            reviewid => request.reviewid.as_deref().filter(|r| !r.is_empty()),
            conflicts => &request.conflicts,
            app_url => &self.links.app_url,
            reviewboard => &self.links.reviewboard,
            failure_msg,
            conflicts_with,
        }
    }

    /// Email for `outcome`, addressed to the request's owner and watchers.
    ///
    /// # Errors
    /// Returns error if rendering fails.
    pub fn email(&self, request: &PushRequest, outcome: &Outcome) -> Result<Email> {
        let (template, tag) = match outcome {
            Outcome::Verified => ("verified.html", "push"),
            Outcome::VerifyFailed(_) => ("verify_failed.html", "push error"),
            Outcome::MasterConflict | Outcome::PickmeConflict => ("conflict.html", "push conflict"),
        };
        let html = self
            .env
            .get_template(template)?
            .render(self.request_context(request, outcome))?;
        Ok(Email {
            subject: format!("[{tag}] {} - {}", request.user, request.title),
            html,
        })
    }

    /// Chat message for conflict outcomes; `None` for everything else.
    ///
    /// # Errors
    /// Returns error if rendering fails.
    pub fn chat(&self, request: &PushRequest, outcome: &Outcome) -> Result<Option<String>> {
        if !matches!(outcome, Outcome::MasterConflict | Outcome::PickmeConflict) {
            return Ok(None);
        }
        let text = self
            .env
            .get_template("conflict.txt")?
            .render(self.request_context(request, outcome))?;
        Ok(Some(text))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pushcheck_core::{RequestId, Revision, VerifyFailure};

    fn formatter() -> MessageFormatter {
        MessageFormatter::new(Links {
            app_url: "https://push.example.com".into(),
            reviewboard: "reviews.example.com".into(),
        })
        .unwrap()
    }

    fn request() -> PushRequest {
        let mut req = PushRequest::new(RequestId(42), "alice", "Fix <everything>", "alice", "fix-a");
        req.revision = Revision::parse("0123456789abcdef0123456789abcdef01234567").unwrap();
        req
    }

    #[test]
    fn test_verified_email() {
        let email = formatter().email(&request(), &Outcome::Verified).unwrap();
        assert_eq!(email.subject, "[push] alice - Fix <everything>");
        assert!(email.html.contains("has verified the branch"));
        assert!(email.html.contains("https://push.example.com/request?id=42"));
        assert!(email.html.contains("Fix &lt;everything&gt;"));
        assert!(email.html.contains("Verified revision: <code>0123456789abcdef"));
        assert!(!email.html.contains("Review #"));
    }

    #[test]
    fn test_review_link_when_present() {
        let mut req = request();
        req.reviewid = Some("1234".into());
        let email = formatter().email(&req, &Outcome::Verified).unwrap();
        assert!(email.html.contains("https://reviews.example.com/r/1234"));
    }

    #[test]
    fn test_failure_email() {
        let outcome = Outcome::VerifyFailed(VerifyFailure::BranchNotFound {
            repo: "alice".into(),
            branch: "fix-a".into(),
        });
        let email = formatter().email(&request(), &outcome).unwrap();
        assert_eq!(email.subject, "[push error] alice - Fix <everything>");
        assert!(email.html.contains("could <strong>not</strong> verify"));
        assert!(email.html.contains("Branch fix-a not found in repository alice"));
    }

    #[test]
    fn test_conflict_email_keeps_conflicts_html() {
        let mut req = request();
        req.conflicts = "<strong>Conflict with master:</strong><br/>CONFLICT &amp; more".into();
        let email = formatter().email(&req, &Outcome::MasterConflict).unwrap();

        assert_eq!(email.subject, "[push conflict] alice - Fix <everything>");
        assert!(email.html.contains("conflicts with master."));
        assert!(email.html.contains("<strong>Conflict with master:</strong><br/>CONFLICT &amp; more"));
    }

    #[test]
    fn test_chat_only_for_conflicts() {
        let f = formatter();
        assert!(f.chat(&request(), &Outcome::Verified).unwrap().is_none());

        let text = f.chat(&request(), &Outcome::PickmeConflict).unwrap().unwrap();
        assert!(text.contains("your pickme for fix-a contains conflicts with another pickme"));
        assert!(text.ends_with("https://push.example.com/request?id=42"));
    }
}
