// src/bot/dispatcher.rs - Ordered moderation chain run against every inbound message

use anyhow::Result;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

use super::filters::{FilterChain, FilterKind};
use super::flood::{FloodDecision, FloodGuard};
use super::state::ModerationState;
use crate::config::{AutoMuteConfig, EngineConfig};
use crate::error::{humanize_seconds, ActionStatus, TransportError};
use crate::platforms::ChatTransport;
use crate::types::{InboundMessage, UserId};

/// Which step of the chain ended processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Exempt,
    GlobalBan,
    FloodMute,
    Filtered(FilterKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Ban,
    Restrict { duration: Duration },
    Delete,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub action: ModerationAction,
    pub status: ActionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub verdict: Verdict,
    pub actions: Vec<ActionRecord>,
}

impl DispatchReport {
    fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            actions: Vec::new(),
        }
    }

    /// True when the message survived moderation and may be handled further
    pub fn allows_commands(&self) -> bool {
        matches!(self.verdict, Verdict::Passed | Verdict::Exempt)
    }

    pub fn failed_actions(&self) -> usize {
        self.actions.iter().filter(|a| !a.status.is_applied()).count()
    }
}

pub struct ModerationDispatcher {
    state: ModerationState,
    flood: FloodGuard,
    filters: FilterChain,
    auto_mute: AutoMuteConfig,
    reset_window_on_mute: bool,
    owners: Vec<UserId>,
    transport: Arc<dyn ChatTransport>,
}

impl ModerationDispatcher {
    pub fn new(config: &EngineConfig, state: ModerationState, transport: Arc<dyn ChatTransport>) -> Result<Self> {
        Ok(Self {
            flood: FloodGuard::from_config(&config.flood, state.activity.clone()),
            filters: FilterChain::from_config(&config.filters)?,
            auto_mute: config.auto_mute.clone(),
            reset_window_on_mute: config.flood.reset_window_on_mute,
            owners: config.owners.clone(),
            state,
            transport,
        })
    }

    /// Run the chain: global ban, admin exemption, flood guard, content filters.
    /// The first step that acts ends processing. Transport failures are recorded in the
    /// report and never returned as errors.
    pub async fn handle(&self, message: &InboundMessage) -> DispatchReport {
        // Every received message counts, whatever happens to it below
        let seen = self.state.stats.record(message.user_id, &message.display_name).await;

        if self.state.gbans.is_banned(message.user_id).await {
            let mut report = DispatchReport::new(Verdict::GlobalBan);
            let result = self.transport.ban(message.chat_id, message.user_id).await;
            self.track(&mut report, ModerationAction::Ban, result, message);
            info!("Enforced global ban on user {} in chat {}", message.user_id, message.chat_id);
            return report;
        }

        if message.is_admin || self.owners.contains(&message.user_id) {
            return DispatchReport::new(Verdict::Exempt);
        }

        if let FloodDecision::Mute { duration } = self.flood.evaluate(message.user_id, message.timestamp).await {
            let mut report = DispatchReport::new(Verdict::FloodMute);
            self.restrict(&mut report, message, duration).await;

            let notice = format!(
                "{} has been muted for {} for flooding.",
                message.sender_name(),
                humanize_seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
            );
            let result = self.transport.send_notice(message.chat_id, &notice).await;
            self.track(&mut report, ModerationAction::Notice, result, message);

            if self.reset_window_on_mute {
                self.state.activity.clear(message.user_id).await;
            }
            info!("Flood mute for user {} in chat {}", message.user_id, message.chat_id);
            return report;
        }

        if let Some(hit) = self.filters.first_match(message) {
            let mut report = DispatchReport::new(Verdict::Filtered(hit.kind));
            let result = self.transport.delete_message(message.chat_id, message.message_id).await;
            self.track(&mut report, ModerationAction::Delete, result, message);

            if hit.kind.notifies() {
                let notice = hit.kind.notice(&message.sender_name());
                let result = self.transport.send_notice(message.chat_id, &notice).await;
                self.track(&mut report, ModerationAction::Notice, result, message);

                if self.auto_mute.enabled && seen <= self.auto_mute.min_messages {
                    debug!("User {} has only {} messages, applying low-activity mute", message.user_id, seen);
                    self.restrict(&mut report, message, Duration::from_secs(self.auto_mute.mute_seconds))
                        .await;
                }
            }

            info!("Removed message {} in chat {} ({})", message.message_id, message.chat_id, hit.reason);
            return report;
        }

        DispatchReport::new(Verdict::Passed)
    }

    async fn restrict(&self, report: &mut DispatchReport, message: &InboundMessage, duration: Duration) {
        let result = self.transport.restrict(message.chat_id, message.user_id, duration).await;
        self.track(report, ModerationAction::Restrict { duration }, result, message);
    }

    fn track<T>(
        &self,
        report: &mut DispatchReport,
        action: ModerationAction,
        result: Result<T, TransportError>,
        message: &InboundMessage,
    ) {
        if let Err(e) = &result {
            warn!(
                "{:?} failed for user {} in chat {} on {}: {}",
                action,
                message.user_id,
                message.chat_id,
                self.transport.platform_name(),
                e
            );
        }
        report.actions.push(ActionRecord {
            action,
            status: ActionStatus::from_result(&result),
        });
    }
}
