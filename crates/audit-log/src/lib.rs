//! Bounded audit trail of admission decisions.
//!
//! Every decision the control plane makes lands here exactly once: in the
//! ring buffer (for inspection), in the cumulative counters (for stats that
//! survive eviction), and on the broadcast stream (for UI consumers).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use toolgate_core_types::{DecisionOutcome, GuardrailViolation, RoleId, ViolationKind};

/// Ring-buffer capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 1000;

const EVENT_CHANNEL_CAPACITY: usize = 128;
const TOP_TOOLS_LIMIT: usize = 10;

/// One admission decision, as recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub role: RoleId,
    pub tool: String,
    pub args: serde_json::Value,
    pub decision: DecisionOutcome,
    pub violation: Option<GuardrailViolation>,
}

/// Filters for querying the audit trail. Empty filter returns everything
/// still in the buffer.
#[derive(Clone, Debug, Default)]
pub struct AuditFilter {
    pub tool: Option<String>,
    pub decision: Option<DecisionOutcome>,
    pub since: Option<DateTime<Utc>>,
}

impl AuditFilter {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(tool) = &self.tool {
            if &entry.tool != tool {
                return false;
            }
        }
        if let Some(decision) = self.decision {
            if entry.decision != decision {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool: String,
    pub count: u64,
}

/// Cumulative statistics over every decision ever recorded, independent of
/// ring-buffer eviction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardrailStats {
    pub total_requests: u64,
    pub allowed: u64,
    pub blocked: u64,
    pub requires_approval: u64,
    pub violations: HashMap<ViolationKind, u64>,
    pub top_tools: Vec<ToolUsage>,
}

#[derive(Default)]
struct Totals {
    total: u64,
    allowed: u64,
    blocked: u64,
    requires_approval: u64,
    violations: HashMap<ViolationKind, u64>,
    tools: HashMap<String, u64>,
}

/// Append-only bounded log. Oldest entries are evicted on overflow; the
/// counters keep the full history.
pub struct AuditLog {
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
    totals: Mutex<Totals>,
    events: broadcast::Sender<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            totals: Mutex::new(Totals::default()),
            events,
        }
    }

    /// Live stream of appended entries. Slow receivers observe lag, never
    /// block the writer.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEntry> {
        self.events.subscribe()
    }

    pub fn append(&self, entry: AuditEntry) {
        {
            let mut totals = self.totals.lock();
            totals.total += 1;
            match entry.decision {
                DecisionOutcome::Allowed => totals.allowed += 1,
                DecisionOutcome::Blocked => totals.blocked += 1,
                DecisionOutcome::RequiresApproval => totals.requires_approval += 1,
            }
            if let Some(violation) = &entry.violation {
                *totals.violations.entry(violation.kind).or_insert(0) += 1;
            }
            *totals.tools.entry(entry.tool.clone()).or_insert(0) += 1;
        }

        {
            let mut entries = self.entries.lock();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        let _ = self.events.send(entry);
    }

    /// Entries still in the buffer matching `filter`, oldest first.
    pub fn entries(&self, filter: &AuditFilter) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> GuardrailStats {
        let totals = self.totals.lock();
        let mut top_tools: Vec<ToolUsage> = totals
            .tools
            .iter()
            .map(|(tool, count)| ToolUsage {
                tool: tool.clone(),
                count: *count,
            })
            .collect();
        top_tools.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tool.cmp(&b.tool)));
        top_tools.truncate(TOP_TOOLS_LIMIT);

        GuardrailStats {
            total_requests: totals.total,
            allowed: totals.allowed,
            blocked: totals.blocked,
            requires_approval: totals.requires_approval,
            violations: totals.violations.clone(),
            top_tools,
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
