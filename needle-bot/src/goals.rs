//! Plan progress: congratulate the owner when an entry completes a plan.

use async_trait::async_trait;
use needle::OwnerId;
use needle::commit::CommitHook;
use needle::error::HookError;
use needle::format::format_number;
use needle::record::{Plan, ProgressEntry, Record, RecordKind};
use needle::store::RecordStore;
use needle::transport::Transport;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Commit hook checking the owner's plans after every new entry.
///
/// A plan counts the owner's entries carrying its hashtag, or all entries if
/// it has none. A plan is reported once, by the entry that moves its total
/// from below the target to at least the target.
pub struct PlanProgressHook {
    records: Arc<dyn RecordStore>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for PlanProgressHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanProgressHook").finish_non_exhaustive()
    }
}

impl PlanProgressHook {
    /// Create a hook reading from `records` and notifying through `transport`.
    #[must_use]
    pub fn new(records: Arc<dyn RecordStore>, transport: Arc<dyn Transport>) -> Self {
        Self { records, transport }
    }
}

/// Sum of the entries counting toward `plan`.
#[must_use]
pub fn plan_progress(plan: &Plan, entries: &[ProgressEntry]) -> f64 {
    entries
        .iter()
        .filter(|e| plan.hashtag.is_none() || e.hashtag == plan.hashtag)
        .map(|e| e.count)
        .sum()
}

/// Congratulation for a completed plan.
#[must_use]
pub fn completion_message(plan: &Plan, progress: f64) -> String {
    format!(
        "🎉 **Поздравляем!**\n\nПлан «{}» выполнен: {} / {} крестиков",
        plan.name,
        format_number(progress),
        format_number(plan.target_count as f64)
    )
}

#[async_trait]
impl CommitHook for PlanProgressHook {
    fn name(&self) -> &str {
        "plan_progress"
    }

    async fn on_record_committed(
        &self,
        owner: OwnerId,
        kind: RecordKind,
        record: &Record,
    ) -> Result<(), HookError> {
        let Record::Entry(added) = record else {
            debug!(owner = %owner, kind = %kind, "not an entry, skipping plan check");
            return Ok(());
        };

        let plans: Vec<Plan> = self
            .records
            .list(owner, RecordKind::Plan)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                Record::Plan(p) => Some(p),
                _ => None,
            })
            .collect();
        if plans.is_empty() {
            return Ok(());
        }

        let entries: Vec<ProgressEntry> = self
            .records
            .list(owner, RecordKind::Entry)
            .await?
            .into_iter()
            .filter_map(|r| match r {
                Record::Entry(e) => Some(e),
                _ => None,
            })
            .collect();

        for plan in plans
            .iter()
            .filter(|p| p.hashtag.is_none() || p.hashtag == added.hashtag)
        {
            let target = plan.target_count as f64;
            let current = plan_progress(plan, &entries);
            let previous = current - added.count;
            if previous < target && current >= target {
                info!(owner = %owner, plan = %plan.id, "plan completed");
                self.transport
                    .acknowledge(owner, &completion_message(plan, current))
                    .await?;
            }
        }
        Ok(())
    }
}
