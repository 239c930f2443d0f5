//! Remote URL construction for the main and developer repositories.

use secrecy::{ExposeSecret, SecretString};

/// Name git gives the remote a mirror was cloned from.
pub const ORIGIN: &str = "origin";

/// Where repositories live on the git server.
///
/// The main repository sits at the server root; developer repositories are
/// found under `dev_repositories_dir`.
#[derive(Debug, Clone)]
pub struct RemoteLayout {
    /// URL scheme (`https`, `ssh`, `git`, `file`).
    pub scheme: String,
    /// Host name of the git server. May be empty for `file` URLs.
    pub servername: String,
    /// Optional port.
    pub port: Option<u16>,
    /// Optional credential, placed before the host as `auth@host`.
    pub auth: Option<SecretString>,
    /// Name of the main repository.
    pub main_repository: String,
    /// Sub-path holding developer repositories.
    pub dev_repositories_dir: String,
}

impl RemoteLayout {
    /// Whether `repo` names the main repository.
    #[must_use]
    pub fn is_main(&self, repo: &str) -> bool {
        repo == self.main_repository || repo == ORIGIN
    }

    /// The git remote name used inside the mirror for `repo`.
    #[must_use]
    pub fn remote_name<'a>(&self, repo: &'a str) -> &'a str {
        if self.is_main(repo) { ORIGIN } else { repo }
    }

    /// Full URL of `repo` on the git server.
    #[must_use]
    pub fn url(&self, repo: &str) -> String {
        let mut netloc = String::new();
        if let Some(auth) = &self.auth {
            netloc.push_str(auth.expose_secret());
            netloc.push('@');
        }
        netloc.push_str(&self.servername);
        if let Some(port) = self.port {
            netloc.push(':');
            netloc.push_str(&port.to_string());
        }

        if self.is_main(repo) {
            format!("{}://{netloc}/{}", self.scheme, self.main_repository)
        } else {
            format!(
                "{}://{netloc}/{}/{repo}",
                self.scheme, self.dev_repositories_dir
            )
        }
    }
}
