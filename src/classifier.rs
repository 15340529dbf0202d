// SPDX-License-Identifier: MIT
//! Stage classification heuristics.
//!
//! A pure, step-keyed mapping from raw installer output to the coarse
//! [`InstallStage`] ladder and a human-readable message. Matching is
//! case-insensitive substring search against a fixed vocabulary per step,
//! scanned over the tail of the accumulated log, newest line first.
//!
//! The classifier never produces `Error` — terminal failure comes only from
//! backend `error`/`done` events, not from log text. It also never regresses:
//! a match below the current stage is discarded, while forward jumps are
//! allowed (an already-installed tool goes straight to `Done`).

use crate::prereq::PrerequisiteKind;
use crate::state::InstallStage;
use InstallStage::{Done, Downloading, Finishing, Installing};

/// How many trailing log lines are considered when classifying.
const TAIL_WINDOW: usize = 4;

struct VocabEntry {
    needle: &'static str,
    stage: InstallStage,
    message: &'static str,
}

const fn entry(needle: &'static str, stage: InstallStage, message: &'static str) -> VocabEntry {
    VocabEntry {
        needle,
        stage,
        message,
    }
}

static TOOLCHAIN_VOCAB: &[VocabEntry] = &[
    entry("already installed", Done, "Already installed!"),
    entry("downloading", Downloading, "Downloading build toolchain…"),
    entry("fetching", Downloading, "Downloading build toolchain…"),
    entry("unpacking", Installing, "Installing build toolchain…"),
    entry("extracting", Installing, "Installing build toolchain…"),
    entry("installing", Installing, "Installing build toolchain…"),
    entry("verifying", Finishing, "Verifying install…"),
    entry("successfully installed", Finishing, "Almost done…"),
];

static PACKAGE_MANAGER_VOCAB: &[VocabEntry] = &[
    entry("already installed", Done, "Already installed!"),
    entry("downloading", Downloading, "Downloading package manager…"),
    entry("fetching", Downloading, "Downloading package manager…"),
    entry("installing", Installing, "Installing package manager…"),
    entry("setting up", Finishing, "Setting things up…"),
    entry("installation successful", Finishing, "Almost done…"),
];

static RUNTIME_VOCAB: &[VocabEntry] = &[
    entry("already installed", Done, "Already installed!"),
    entry("downloading", Downloading, "Downloading language runtime…"),
    entry("fetching", Downloading, "Downloading language runtime…"),
    entry("installing", Installing, "Installing language runtime…"),
    entry("extracting", Installing, "Installing language runtime…"),
    entry("linking", Finishing, "Linking runtime…"),
];

static AGENT_CLI_VOCAB: &[VocabEntry] = &[
    entry("already installed", Done, "Already installed!"),
    entry("up to date", Done, "Already installed!"),
    entry("downloading", Downloading, "Downloading agent CLI…"),
    entry("fetching", Downloading, "Downloading agent CLI…"),
    entry("resolving", Downloading, "Downloading agent CLI…"),
    entry("installing", Installing, "Installing agent CLI…"),
    entry("added", Installing, "Installing agent CLI…"),
    entry("audited", Finishing, "Finishing up…"),
];

static AGENT_AUTH_VOCAB: &[VocabEntry] = &[
    entry("already logged in", Done, "Already signed in!"),
    entry("already authenticated", Done, "Already signed in!"),
    entry("not logged in", Installing, "Waiting for sign-in…"),
    entry(
        "opening browser",
        Installing,
        "Waiting for sign-in in your browser…",
    ),
    entry("visit", Installing, "Waiting for sign-in in your browser…"),
    entry("waiting", Installing, "Waiting for sign-in…"),
    entry("logged in", Finishing, "Wrapping up sign-in…"),
    entry("authenticated", Finishing, "Wrapping up sign-in…"),
];

/// Per-step vocabulary, ordered most-specific first — the first matching
/// entry for a line wins, so "already installed" must be checked before the
/// bare "installing"/"installed" stems.
fn vocabulary(step: PrerequisiteKind) -> &'static [VocabEntry] {
    match step {
        PrerequisiteKind::Toolchain => TOOLCHAIN_VOCAB,
        PrerequisiteKind::PackageManager => PACKAGE_MANAGER_VOCAB,
        PrerequisiteKind::Runtime => RUNTIME_VOCAB,
        PrerequisiteKind::AgentCli => AGENT_CLI_VOCAB,
        PrerequisiteKind::AgentAuth => AGENT_AUTH_VOCAB,
    }
}

/// Classify the tail of `log` for `step`, given the session's `current`
/// stage.
///
/// Returns the most recent matching (stage, message), or `None` when nothing
/// in the tail matches or the match would regress below `current`.
/// Deterministic: identical inputs always yield identical output.
pub fn classify(
    step: PrerequisiteKind,
    log: &[String],
    current: InstallStage,
) -> Option<(InstallStage, String)> {
    let vocab = vocabulary(step);
    for line in log.iter().rev().take(TAIL_WINDOW) {
        let lowered = line.to_lowercase();
        for entry in vocab {
            if lowered.contains(entry.needle) {
                if entry.stage.rank() < current.rank() {
                    return None;
                }
                return Some((entry.stage, entry.message.to_string()));
            }
        }
    }
    None
}

// ─── Tests ───────────────────────────────────────────────────────────────────
