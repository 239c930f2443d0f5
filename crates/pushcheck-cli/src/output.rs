//! Terminal output formatting utilities.

use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;
use pushcheck_core::PushRequest;
use pushcheck_core::tags::{CONFLICT_MASTER, CONFLICT_PICKME, GIT_ERROR, GIT_OK};

static QUIET_MODE: AtomicBool = AtomicBool::new(false);

/// Set quiet mode globally. Call once at startup.
pub fn set_quiet(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

/// Print a success message (suppressed in quiet mode).
pub fn success(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "✓".green(), msg);
    }
}

/// Print an error message (always prints to stderr).
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a warning message (always prints to stderr).
pub fn warn(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Print an info message (suppressed in quiet mode).
pub fn info(msg: &str) {
    if !is_quiet() {
        println!("{} {}", "→".blue(), msg);
    }
}

/// Print a detail line without prefix (suppressed in quiet mode).
pub fn detail(msg: &str) {
    if !is_quiet() {
        println!("{msg}");
    }
}

/// Print essential machine-readable output (always prints).
pub fn essential(msg: &str) {
    println!("{msg}");
}

/// Short label for what the queue last concluded about a request.
#[must_use]
pub fn conflict_label(request: &PushRequest) -> String {
    if request.tags.contains(CONFLICT_MASTER) {
        "conflicts with master".red().to_string()
    } else if request.tags.contains(CONFLICT_PICKME) {
        "conflicts with another pickme".yellow().to_string()
    } else {
        "clean".green().to_string()
    }
}

/// Short label for a request's verification tags.
#[must_use]
pub fn verify_label(request: &PushRequest) -> String {
    if request.tags.contains(GIT_ERROR) {
        "git-error".red().to_string()
    } else if request.tags.contains(GIT_OK) {
        "git-ok".green().to_string()
    } else {
        "unverified".dimmed().to_string()
    }
}

/// One-line summary of a request: `#id user - title (repo/branch)`.
#[must_use]
pub fn request_line(request: &PushRequest) -> String {
    format!(
        "#{} {} - {} ({}/{})",
        request.id,
        request.user,
        request.title.bold(),
        request.repo,
        request.branch
    )
}
