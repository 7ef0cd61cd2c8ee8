// src/bot/commands.rs - Moderator and member commands on top of the moderation state

use chrono::Duration;
use log::{error, info, warn};
use std::sync::Arc;

use super::auto_delete::AutoDeleteTarget;
use super::delayed_queue::EntryId;
use super::duration::parse_bounded;
use super::scheduled::ScheduledMessage;
use super::snapshot::StateSnapshot;
use super::state::ModerationState;
use super::warns::WarnOutcome;
use crate::config::EngineConfig;
use crate::error::{humanize_seconds, CommandError, TransportError};
use crate::platforms::ChatTransport;
use crate::types::{InboundMessage, UserId};

const REMINDER_MAX_SECONDS: i64 = 86_400;
const LEADERBOARD_SIZE: usize = 5;

/// Reply produced by a command. `auto_delete_after` queues the posted reply for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub text: String,
    pub auto_delete_after: Option<Duration>,
}

impl CommandResponse {
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            auto_delete_after: None,
        }
    }

    pub fn self_destructing(text: impl Into<String>, after: Duration) -> Self {
        Self {
            text: text.into(),
            auto_delete_after: Some(after),
        }
    }
}

type CommandResult = Result<CommandResponse, CommandError>;

struct Target {
    user_id: UserId,
    name: String,
}

pub struct ModerationCommands {
    config: EngineConfig,
    state: ModerationState,
    transport: Arc<dyn ChatTransport>,
}

impl ModerationCommands {
    pub fn new(config: EngineConfig, state: ModerationState, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            config,
            state,
            transport,
        }
    }

    /// Handle a `/command` message. Returns `None` when the message is not a command
    /// this layer knows; otherwise the reply has already been sent.
    pub async fn process_command(&self, message: &InboundMessage) -> Option<CommandResponse> {
        let (command, args) = message.command()?;

        let result = match command.as_str() {
            "mute" => self.handle_mute(message, &args).await,
            "tmute" => self.handle_timed_mute(message, &args).await,
            "unmute" => self.handle_unmute(message, &args).await,
            "kick" => self.handle_kick(message, &args).await,
            "ban" => self.handle_ban(message, &args).await,
            "unban" => self.handle_unban(message, &args).await,
            "warn" => self.handle_warn(message, &args).await,
            "resetwarns" => self.handle_reset_warns(message, &args).await,
            "warns" => self.handle_warns(message, &args).await,
            "schedule" => self.handle_schedule(message, &args).await,
            "scheduled" => self.handle_list_scheduled(message).await,
            "unschedule" => self.handle_unschedule(message, &args).await,
            "remindme" => self.handle_remind_me(message, &args).await,
            "autodelete" => self.handle_auto_delete(message, &args).await,
            "gban" => self.handle_gban(message, &args).await,
            "ungban" => self.handle_ungban(message, &args).await,
            "backup" => self.handle_backup(message).await,
            "restore" => self.handle_restore(message).await,
            "rep" => self.handle_rep(message, &args).await,
            "reps" => self.handle_reps().await,
            "stats" => self.handle_stats().await,
            "mydata" => self.handle_my_data(message).await,
            "deletedata" => self.handle_delete_data(message).await,
            "note" => self.handle_note(message, &args).await,
            "notes" => self.handle_list_notes(message).await,
            "delnote" => self.handle_delete_note(message, &args).await,
            _ => return None,
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                info!("Rejected /{} from user {}: {}", command, message.user_id, e);
                CommandResponse::reply(e.user_message())
            }
        };

        self.deliver(message, &response).await;
        Some(response)
    }

    async fn deliver(&self, message: &InboundMessage, response: &CommandResponse) {
        match self.transport.send_text(message.chat_id, &response.text).await {
            Ok(reply_id) => {
                if let Some(after) = response.auto_delete_after {
                    self.state
                        .auto_delete
                        .enqueue(message.chat_id, message.timestamp + after, AutoDeleteTarget { message_id: reply_id })
                        .await;
                }
            }
            Err(e) => warn!("Failed to send command reply to chat {}: {}", message.chat_id, e),
        }
    }

    fn is_moderator(&self, message: &InboundMessage) -> bool {
        message.is_admin || self.config.is_owner(message.user_id)
    }

    fn require_moderator(&self, message: &InboundMessage) -> Result<(), CommandError> {
        if self.is_moderator(message) {
            Ok(())
        } else {
            Err(CommandError::NotAuthorized)
        }
    }

    fn require_owner(&self, message: &InboundMessage) -> Result<(), CommandError> {
        if self.config.is_owner(message.user_id) {
            Ok(())
        } else {
            Err(CommandError::NotAuthorized)
        }
    }

    /// Target is the author of the replied-to message, or a numeric id in the first argument
    fn resolve_target<'a, 'b>(
        message: &InboundMessage,
        args: &'a [&'b str],
    ) -> Result<(Target, &'a [&'b str]), CommandError> {
        if let Some(reply) = &message.reply_target {
            if let Some(user_id) = reply.user_id {
                let name = reply
                    .display_name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| user_id.to_string());
                return Ok((Target { user_id, name }, args));
            }
        }

        let user_id = args
            .first()
            .and_then(|raw| raw.parse::<UserId>().ok())
            .ok_or(CommandError::UnknownTarget)?;
        Ok((
            Target {
                user_id,
                name: user_id.to_string(),
            },
            &args[1..],
        ))
    }

    /// Post an audit line to the configured log chat
    async fn log_action(&self, message: &InboundMessage, action: &str, target: &Target) {
        let Some(log_chat) = self.config.moderation.log_chat_id else {
            return;
        };
        let line = format!(
            "Admin log | action: {} | admin: {} ({}) | target: {} ({}) | chat: {}",
            action,
            message.sender_name(),
            message.user_id,
            target.name,
            target.user_id,
            message.chat_id
        );
        if let Err(e) = self.transport.send_notice(log_chat, &line).await {
            warn!("Failed to send admin log to chat {}: {}", log_chat, e);
        }
    }

    /// Log the outcome of a manual moderation call and turn a failure into a user-facing error
    async fn finish_action(
        &self,
        message: &InboundMessage,
        target: &Target,
        action: &str,
        result: Result<(), TransportError>,
        failure: &'static str,
    ) -> Result<(), CommandError> {
        match result {
            Ok(()) => {
                info!("{} applied to user {} in chat {} by {}", action, target.user_id, message.chat_id, message.user_id);
                self.log_action(message, action, target).await;
                Ok(())
            }
            Err(e) => {
                error!("{} of user {} in chat {} failed: {}", action, target.user_id, message.chat_id, e);
                Err(CommandError::ActionFailed(failure))
            }
        }
    }

    /// A bare number is minutes; anything else uses the compound duration syntax
    fn parse_mute_length(&self, raw: &str) -> Result<Duration, CommandError> {
        let max = self.config.moderation.max_mute_seconds;
        match raw.parse::<i64>() {
            Ok(minutes) => parse_bounded(&format!("{}m", minutes), max),
            Err(_) => parse_bounded(raw, max),
        }
    }

    async fn mute_for(&self, message: &InboundMessage, target: &Target, length: Duration, action: &str) -> Result<(), CommandError> {
        let seconds = u64::try_from(length.num_seconds()).unwrap_or_default();
        let result = self
            .transport
            .restrict(message.chat_id, target.user_id, std::time::Duration::from_secs(seconds))
            .await;
        self.finish_action(message, target, action, result, "mute that user").await
    }

    /// `/mute [time]`; without a time the mute lasts until `/unmute`
    async fn handle_mute(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let (target, rest) = Self::resolve_target(message, args)?;

        match rest.first() {
            Some(raw) => {
                let length = self.parse_mute_length(raw)?;
                let label = humanize_seconds(length.num_seconds());
                self.mute_for(message, &target, length, &format!("Mute ({})", label)).await?;
                Ok(CommandResponse::reply(format!("{} has been muted for {}.", target.name, label)))
            }
            None => {
                let length = Duration::try_seconds(self.config.moderation.max_mute_seconds)
                    .ok_or(CommandError::ActionFailed("mute that user"))?;
                self.mute_for(message, &target, length, "Mute").await?;
                Ok(CommandResponse::reply(format!("{} has been muted.", target.name)))
            }
        }
    }

    /// `/tmute <minutes|time>`
    async fn handle_timed_mute(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let (target, rest) = Self::resolve_target(message, args)?;
        let raw = rest
            .first()
            .ok_or(CommandError::MissingArgument("/tmute <minutes>"))?;

        let length = self.parse_mute_length(raw)?;
        let label = humanize_seconds(length.num_seconds());
        self.mute_for(message, &target, length, &format!("Temporary mute ({})", label))
            .await?;
        Ok(CommandResponse::reply(format!("{} has been muted for {}.", target.name, label)))
    }

    async fn handle_unmute(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let (target, _) = Self::resolve_target(message, args)?;

        let result = self.transport.unrestrict(message.chat_id, target.user_id).await;
        self.finish_action(message, &target, "Unmute", result, "unmute that user").await?;
        Ok(CommandResponse::reply(format!("{} can send messages again.", target.name)))
    }

    /// A kick is a ban that is lifted right away, so the user may rejoin
    async fn handle_kick(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let (target, _) = Self::resolve_target(message, args)?;

        if let Err(e) = self.transport.ban(message.chat_id, target.user_id).await {
            error!("Kick of user {} in chat {} failed: {}", target.user_id, message.chat_id, e);
            return Err(CommandError::ActionFailed("kick that user"));
        }
        let result = self.transport.unban(message.chat_id, target.user_id).await;
        self.finish_action(message, &target, "Kick", result, "let that user rejoin").await?;
        Ok(CommandResponse::reply(format!("{} has been kicked from the chat.", target.name)))
    }

    async fn handle_ban(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let (target, _) = Self::resolve_target(message, args)?;

        let result = self.transport.ban(message.chat_id, target.user_id).await;
        self.finish_action(message, &target, "Ban", result, "ban that user").await?;
        Ok(CommandResponse::reply(format!("{} has been banned from the chat.", target.name)))
    }

    async fn handle_unban(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let (target, _) = Self::resolve_target(message, args)?;

        let result = self.transport.unban(message.chat_id, target.user_id).await;
        self.finish_action(message, &target, "Unban", result, "unban that user").await?;
        Ok(CommandResponse::reply(format!("{} has been unbanned.", target.name)))
    }

    async fn handle_warn(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let (target, rest) = Self::resolve_target(message, args)?;
        let reason = if rest.is_empty() {
            None
        } else {
            Some(rest.join(" "))
        };

        match self.state.warns.warn(target.user_id, reason.as_deref()).await {
            WarnOutcome::Warned { count, threshold } => {
                info!("User {} warned by {} ({}/{})", target.user_id, message.user_id, count, threshold);
                self.log_action(message, &format!("Warn ({}/{})", count, threshold), &target).await;
                Ok(CommandResponse::reply(format!(
                    "{} has been warned ({}/{}). Reason: {}",
                    target.name,
                    count,
                    threshold,
                    reason.as_deref().unwrap_or("No reason provided.")
                )))
            }
            WarnOutcome::Banned => {
                let threshold = self.state.warns.threshold();
                match self.transport.ban(message.chat_id, target.user_id).await {
                    Ok(()) => {
                        info!("User {} banned in chat {} after {} warnings", target.user_id, message.chat_id, threshold);
                        self.log_action(message, "Ban (warn limit)", &target).await;
                        Ok(CommandResponse::reply(format!(
                            "{} has been banned after {} warnings.",
                            target.name, threshold
                        )))
                    }
                    Err(e) => {
                        error!("Warn escalation ban of user {} in chat {} failed: {}", target.user_id, message.chat_id, e);
                        Err(CommandError::ActionFailed("ban that user"))
                    }
                }
            }
        }
    }

    async fn handle_reset_warns(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let (target, _) = Self::resolve_target(message, args)?;

        if self.state.warns.reset(target.user_id).await {
            self.log_action(message, "Reset warnings", &target).await;
            Ok(CommandResponse::reply(format!("Warnings for {} have been reset.", target.name)))
        } else {
            Err(CommandError::NothingToDo("that user has no warnings"))
        }
    }

    async fn handle_warns(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        let target = match Self::resolve_target(message, args) {
            Ok((target, _)) => target,
            Err(_) => Target {
                user_id: message.user_id,
                name: message.sender_name(),
            },
        };
        let count = self.state.warns.count(target.user_id).await;
        Ok(CommandResponse::reply(format!(
            "{} has {}/{} warnings.",
            target.name,
            count,
            self.state.warns.threshold()
        )))
    }

    async fn handle_schedule(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        if args.len() < 2 {
            return Err(CommandError::MissingArgument("/schedule <time> <message>"));
        }

        let delay = parse_bounded(args[0], self.config.schedule.max_delay_seconds)?;
        let send_time = message.timestamp + delay;
        let id = self
            .state
            .scheduled
            .enqueue(message.chat_id, send_time, ScheduledMessage::new(args[1..].join(" ")))
            .await;

        Ok(CommandResponse::reply(format!(
            "Message #{} scheduled for {} UTC.",
            id.ordinal,
            send_time.format("%Y-%m-%d %H:%M:%S")
        )))
    }

    async fn handle_list_scheduled(&self, message: &InboundMessage) -> CommandResult {
        self.require_moderator(message)?;
        let pending = self.state.scheduled.pending_for(message.chat_id).await;
        if pending.is_empty() {
            return Ok(CommandResponse::reply("No scheduled messages for this chat."));
        }

        let lines: Vec<String> = pending
            .iter()
            .map(|entry| {
                format!(
                    "#{} at {} UTC: {}",
                    entry.id.ordinal,
                    entry.fire_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.payload.text
                )
            })
            .collect();
        Ok(CommandResponse::reply(format!(
            "Scheduled messages ({}):\n{}",
            pending.len(),
            lines.join("\n")
        )))
    }

    async fn handle_unschedule(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let ordinal = args
            .first()
            .and_then(|raw| raw.trim_start_matches('#').parse::<u64>().ok())
            .ok_or(CommandError::MissingArgument("/unschedule <number>"))?;

        let id = EntryId {
            chat_id: message.chat_id,
            ordinal,
        };
        if self.state.scheduled.cancel(id).await {
            Ok(CommandResponse::reply(format!("Scheduled message #{} cancelled.", ordinal)))
        } else {
            Err(CommandError::NothingToDo("no scheduled message with that number"))
        }
    }

    /// `/remindme [in] <time> <text>`
    async fn handle_remind_me(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        let args = match args.first() {
            Some(first) if first.eq_ignore_ascii_case("in") => &args[1..],
            _ => args,
        };
        if args.len() < 2 {
            return Err(CommandError::MissingArgument("/remindme in <time> <message>"));
        }

        let delay = parse_bounded(args[0], REMINDER_MAX_SECONDS)?;
        let text = format!("Reminder for {}: {}", message.sender_name(), args[1..].join(" "));
        self.state
            .scheduled
            .enqueue(message.chat_id, message.timestamp + delay, ScheduledMessage::new(text))
            .await;

        Ok(CommandResponse::reply(format!(
            "Reminder set for {}.",
            humanize_seconds(delay.num_seconds())
        )))
    }

    async fn handle_auto_delete(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let raw = args
            .first()
            .ok_or(CommandError::MissingArgument("/autodelete <time>"))?;
        let delay = parse_bounded(raw, self.config.auto_delete.max_delay_seconds)?;

        if let Some(reply) = &message.reply_target {
            self.state
                .auto_delete
                .enqueue(
                    reply.chat_id,
                    message.timestamp + delay,
                    AutoDeleteTarget {
                        message_id: reply.message_id,
                    },
                )
                .await;
        }

        Ok(CommandResponse::self_destructing(
            format!("This message will be deleted in {}.", humanize_seconds(delay.num_seconds())),
            delay,
        ))
    }

    async fn handle_gban(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_owner(message)?;
        let (target, _) = Self::resolve_target(message, args)?;

        if !self.state.gbans.ban(target.user_id).await {
            return Err(CommandError::NothingToDo("that user is already globally banned"));
        }
        if let Err(e) = self.transport.ban(message.chat_id, target.user_id).await {
            warn!("Global ban of user {} not applied in chat {}: {}", target.user_id, message.chat_id, e);
        }
        self.log_action(message, "Global ban", &target).await;

        Ok(CommandResponse::reply(format!("{} has been globally banned.", target.name)))
    }

    async fn handle_ungban(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_owner(message)?;
        let (target, _) = Self::resolve_target(message, args)?;

        if self.state.gbans.unban(target.user_id).await {
            self.log_action(message, "Global unban", &target).await;
            Ok(CommandResponse::reply(format!("{} has been removed from the global ban list.", target.name)))
        } else {
            Err(CommandError::NothingToDo("that user is not globally banned"))
        }
    }

    async fn handle_backup(&self, message: &InboundMessage) -> CommandResult {
        self.require_owner(message)?;
        let snapshot = self.state.export().await;

        match snapshot.save(&self.config.snapshot.path).await {
            Ok(()) => Ok(CommandResponse::reply(format!("Backup saved: {}.", snapshot.summary()))),
            Err(e) => {
                error!("Backup failed: {:#}", e);
                Err(CommandError::ActionFailed("save the backup"))
            }
        }
    }

    async fn handle_restore(&self, message: &InboundMessage) -> CommandResult {
        self.require_owner(message)?;

        match StateSnapshot::load(&self.config.snapshot.path).await {
            Ok(snapshot) => {
                let summary = snapshot.summary();
                self.state.restore(snapshot).await;
                Ok(CommandResponse::reply(format!("Backup restored: {}.", summary)))
            }
            Err(e) => {
                error!("Restore failed: {:#}", e);
                Err(CommandError::ActionFailed("restore the backup"))
            }
        }
    }

    async fn handle_rep(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        let (target, _) = Self::resolve_target(message, args)?;
        let points = self.state.reputation.give(message.user_id, target.user_id).await?;
        Ok(CommandResponse::reply(format!(
            "{} received +1 reputation and now has {} points.",
            target.name, points
        )))
    }

    async fn handle_reps(&self) -> CommandResult {
        let board = self.state.reputation.leaderboard(LEADERBOARD_SIZE).await;
        if board.is_empty() {
            return Ok(CommandResponse::reply("Nobody has any reputation yet."));
        }

        let mut text = String::from("Reputation leaderboard:");
        for (rank, (user_id, points)) in board.iter().enumerate() {
            let name = self
                .state
                .stats
                .get(*user_id)
                .await
                .map(|s| s.display_name)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| user_id.to_string());
            text.push_str(&format!("\n{}. {}: {} points", rank + 1, name, points));
        }
        Ok(CommandResponse::reply(text))
    }

    async fn handle_stats(&self) -> CommandResult {
        let top = self.state.stats.top(LEADERBOARD_SIZE).await;
        let mut text = format!(
            "Messages seen: {} | Global bans: {} | Scheduled: {} | Pending deletions: {}",
            self.state.stats.total_messages().await,
            self.state.gbans.len().await,
            self.state.scheduled.len().await,
            self.state.auto_delete.len().await
        );
        for (rank, (user_id, stats)) in top.iter().enumerate() {
            let name = if stats.display_name.is_empty() {
                user_id.to_string()
            } else {
                stats.display_name.clone()
            };
            text.push_str(&format!("\n{}. {}: {} messages", rank + 1, name, stats.messages));
        }
        Ok(CommandResponse::reply(text))
    }

    async fn handle_my_data(&self, message: &InboundMessage) -> CommandResult {
        let stats = self.state.stats.get(message.user_id).await;
        let points = self.state.reputation.points(message.user_id).await;
        if stats.is_none() && points == 0 {
            return Ok(CommandResponse::reply("No data is stored about you."));
        }

        Ok(CommandResponse::reply(format!(
            "You have sent {} messages and have {} reputation points. Use /deletedata to remove this record.",
            stats.map_or(0, |s| s.messages),
            points
        )))
    }

    async fn handle_delete_data(&self, message: &InboundMessage) -> CommandResult {
        let removed_stats = self.state.stats.remove(message.user_id).await;
        let removed_reputation = self.state.reputation.remove(message.user_id).await;
        if removed_stats || removed_reputation {
            info!("Deleted stored data for user {}", message.user_id);
            Ok(CommandResponse::reply("Your data has been deleted."))
        } else {
            Err(CommandError::NothingToDo("no data is stored about you"))
        }
    }

    /// `/note <name>` shows a note; `/note <name> <text>` saves one (moderators only)
    async fn handle_note(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        let name = args
            .first()
            .ok_or(CommandError::MissingArgument("/note <name> [text]"))?;

        if args.len() == 1 {
            return match self.state.notes.get(message.chat_id, name).await {
                Some(text) => Ok(CommandResponse::reply(text)),
                None => Err(CommandError::NothingToDo("no note with that name")),
            };
        }

        self.require_moderator(message)?;
        let replaced = self
            .state
            .notes
            .save(message.chat_id, name, &args[1..].join(" "))
            .await;
        let verb = if replaced { "updated" } else { "saved" };
        Ok(CommandResponse::reply(format!("Note '{}' {}.", name.to_lowercase(), verb)))
    }

    async fn handle_list_notes(&self, message: &InboundMessage) -> CommandResult {
        let names = self.state.notes.list(message.chat_id).await;
        if names.is_empty() {
            Ok(CommandResponse::reply("No notes in this chat."))
        } else {
            Ok(CommandResponse::reply(format!("Notes: {}", names.join(", "))))
        }
    }

    async fn handle_delete_note(&self, message: &InboundMessage, args: &[&str]) -> CommandResult {
        self.require_moderator(message)?;
        let name = args
            .first()
            .ok_or(CommandError::MissingArgument("/delnote <name>"))?;

        if self.state.notes.remove(message.chat_id, name).await {
            Ok(CommandResponse::reply(format!("Note '{}' deleted.", name.to_lowercase())))
        } else {
            Err(CommandError::NothingToDo("no note with that name"))
        }
    }
}
