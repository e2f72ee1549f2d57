//! Command vetting applied before anything is spawned.
//!
//! [`DenylistPolicy`] matches the literal command string against regex rules
//! for known high-risk primitives. It is pattern matching over free-form shell
//! text, so it cannot catch encoded payloads, alternate interpreters, or
//! chains of individually harmless commands. Treat it as one layer of defense,
//! not as a sandbox.

use crate::executor::CommandInvocation;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Why a command was refused.
#[derive(Debug, Error)]
pub enum PolicyViolation {
    #[error("command matches denied pattern `{pattern}` ({category})")]
    Denied {
        category: DenyCategory,
        pattern: String,
    },
    #[error("working directory `{}` escapes the sandbox root `{}`", working_dir.display(), root.display())]
    OutsideSandbox { working_dir: PathBuf, root: PathBuf },
}

pub trait CommandPolicy: Send + Sync {
    fn check(&self, invocation: &CommandInvocation) -> Result<(), PolicyViolation>;
}

/// Requires commands to run from inside the sandbox root.
#[derive(Debug, Clone)]
pub struct SandboxGuardPolicy {
    root: PathBuf,
}

impl SandboxGuardPolicy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CommandPolicy for SandboxGuardPolicy {
    fn check(&self, invocation: &CommandInvocation) -> Result<(), PolicyViolation> {
        if !invocation.working_dir.starts_with(&self.root) {
            return Err(PolicyViolation::OutsideSandbox {
                working_dir: invocation.working_dir.clone(),
                root: self.root.clone(),
            });
        }
        Ok(())
    }
}

/// Families of dangerous command shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyCategory {
    OutboundFetch,
    RawNetwork,
    DestructiveDelete,
    PowerState,
    Persistence,
    PrivilegeEscalation,
    DownloadExecute,
    CryptoMiner,
    Custom,
}

impl fmt::Display for DenyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::OutboundFetch => "outbound fetch",
            Self::RawNetwork => "raw network / reverse shell",
            Self::DestructiveDelete => "destructive deletion",
            Self::PowerState => "power state change",
            Self::Persistence => "persistence mechanism",
            Self::PrivilegeEscalation => "privilege escalation",
            Self::DownloadExecute => "download and execute",
            Self::CryptoMiner => "cryptocurrency miner",
            Self::Custom => "operator rule",
        };
        f.write_str(label)
    }
}

/// (category, pattern, case-insensitive)
const BUILTIN_RULES: &[(DenyCategory, &str, bool)] = &[
    (DenyCategory::OutboundFetch, r"\bcurl\b", true),
    (DenyCategory::OutboundFetch, r"\bwget\b", true),
    (DenyCategory::RawNetwork, r"\bnc\s", true),
    (DenyCategory::RawNetwork, r"\bncat\b", true),
    (DenyCategory::RawNetwork, r"\bnetcat\b", true),
    (DenyCategory::RawNetwork, r"\bbash\s+-i\b", false),
    (DenyCategory::RawNetwork, r"/dev/tcp/", false),
    (DenyCategory::RawNetwork, r"\bmkfifo\b", false),
    (DenyCategory::DestructiveDelete, r"\brm\s+-rf\s+/", false),
    (DenyCategory::DestructiveDelete, r"\bformat\b.*[a-zA-Z]:", true),
    (DenyCategory::PowerState, r"\b(shutdown|reboot|halt|poweroff)\b", true),
    (DenyCategory::Persistence, r"\breg\s+(add|delete)\b", true),
    (DenyCategory::Persistence, r"\bschtasks\b", true),
    (DenyCategory::PrivilegeEscalation, r"\bsudo\b", false),
    (DenyCategory::PrivilegeEscalation, r"\brunas\b", true),
    (
        DenyCategory::DownloadExecute,
        r"powershell.*\b(IEX|Invoke-Expression|downloadstring|webclient|Start-Process)\b",
        true,
    ),
    (DenyCategory::DownloadExecute, r"\bcertutil\b.*-urlcache", true),
    (DenyCategory::DownloadExecute, r"\bbitsadmin\b.*/transfer", true),
    (DenyCategory::CryptoMiner, r"\bxmrig\b", true),
    (DenyCategory::CryptoMiner, r"\bminerd\b", true),
];

#[derive(Debug, Clone)]
pub struct DenyRule {
    pub category: DenyCategory,
    pattern: Regex,
}

impl DenyRule {
    pub fn new(category: DenyCategory, pattern: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self { category, pattern })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn is_match(&self, command: &str) -> bool {
        self.pattern.is_match(command)
    }
}

/// Rejects commands whose text matches any rule.
#[derive(Debug, Clone)]
pub struct DenylistPolicy {
    rules: Vec<DenyRule>,
}

impl DenylistPolicy {
    /// The built-in rule set.
    pub fn builtin() -> Self {
        let rules = BUILTIN_RULES
            .iter()
            .filter_map(|(category, pattern, case_insensitive)| {
                DenyRule::new(*category, pattern, *case_insensitive)
                    .inspect_err(|err| error!(%err, pattern, "invalid built-in deny pattern"))
                    .ok()
            })
            .collect();
        Self { rules }
    }

    /// Add operator-supplied patterns (matched case-insensitively).
    pub fn with_extra_patterns<I, S>(mut self, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            self.rules
                .push(DenyRule::new(DenyCategory::Custom, pattern.as_ref(), true)?);
        }
        Ok(self)
    }

    pub fn rules(&self) -> &[DenyRule] {
        &self.rules
    }

    /// The first rule the command matches, if any.
    pub fn matching_rule(&self, command: &str) -> Option<&DenyRule> {
        self.rules.iter().find(|rule| rule.is_match(command))
    }

    pub fn is_blocked(&self, command: &str) -> bool {
        self.matching_rule(command).is_some()
    }
}

impl Default for DenylistPolicy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CommandPolicy for DenylistPolicy {
    fn check(&self, invocation: &CommandInvocation) -> Result<(), PolicyViolation> {
        match self.matching_rule(&invocation.command) {
            Some(rule) => Err(PolicyViolation::Denied {
                category: rule.category,
                pattern: rule.pattern().to_owned(),
            }),
            None => Ok(()),
        }
    }
}

/// Runs policies in order; the first violation wins.
#[derive(Clone, Default)]
pub struct PolicyChain {
    policies: Vec<Arc<dyn CommandPolicy>>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, policy: impl CommandPolicy + 'static) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }
}

impl CommandPolicy for PolicyChain {
    fn check(&self, invocation: &CommandInvocation) -> Result<(), PolicyViolation> {
        self.policies
            .iter()
            .try_for_each(|policy| policy.check(invocation))
    }
}
