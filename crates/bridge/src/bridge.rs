// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workspace message loop
//!
//! poll → debouncer → router → scheduler → turn driver. One cooperative
//! task owns the loop; turns run as spawned tasks, serialized per session
//! by the scheduler.

use crate::commands::{handle_admin_command, CommandBackend, CommandContext};
use crate::debounce::{MessageBatch, TopicDebouncer};
use crate::driver::{run_turn, RunningTasks, TurnEnv, TurnRequest};
use crate::manager::WorkspaceManager;
use crate::orchestrator::prepend_orchestrator_context;
use crate::ralph::{parse_ralph_command, ActiveLoop, RalphManager, RALPH_DONE_MARKER};
use crate::render::ChatPresenter;
use crate::router::{is_general_slash_command, parse_slash_command, WorkspaceRouter};
use crate::scheduler::{ThreadJob, ThreadScheduler};
use indexmap::IndexMap;
use parking_lot::Mutex;
use relay_adapters::worktrees::{ensure_worktree, sanitize_branch_name};
use relay_adapters::{
    BotClient, BotCommand, ChatApi, ChatUpdate, SendRequest, TransportError, UpdateKind,
};
use relay_config::{ConfigError, FolderConfig, WorkspaceConfig};
use relay_core::{EngineId, ResumeToken, RunContext};
use relay_engines::{AutoRouter, Runner};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Errors that end the workspace loop
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything the workspace loop needs to run
pub struct BridgeConfig<A: ChatApi> {
    pub bot: BotClient<A>,
    /// The workspace's chat channel
    pub channel_id: i64,
    pub workspace: WorkspaceConfig,
    /// Configured engines
    pub engines: Arc<AutoRouter>,
    /// Command plugins by ID
    pub commands: IndexMap<String, Arc<dyn CommandBackend>>,
    pub startup_msg: Option<String>,
    pub progress_edit_every: Duration,
    /// Cooperative shutdown (Ctrl-C)
    pub shutdown: CancellationToken,
}

/// Strip a leading `/engine` command, returning the rest and the override.
pub fn strip_engine_command(text: &str, engine_ids: &[EngineId]) -> (String, Option<EngineId>) {
    match parse_slash_command(text) {
        (Some(command), args) if engine_ids.iter().any(|id| id.as_str() == command) => {
            (args, Some(EngineId::new(command)))
        }
        _ => (text.to_string(), None),
    }
}

struct Bridge<A: ChatApi> {
    bot: BotClient<A>,
    channel_id: i64,
    engines: Arc<AutoRouter>,
    manager: WorkspaceManager<A>,
    ws_router: Mutex<WorkspaceRouter>,
    ralph: RalphManager,
    env: TurnEnv<A>,
    scheduler: ThreadScheduler,
    commands: IndexMap<String, Arc<dyn CommandBackend>>,
}

/// Run the workspace loop until shutdown or transport closure.
pub async fn run_workspace_loop<A: ChatApi>(cfg: BridgeConfig<A>) -> Result<(), BridgeError> {
    let running_tasks: RunningTasks = Arc::new(Mutex::new(HashMap::new()));
    let env = TurnEnv {
        bot: cfg.bot.clone(),
        router: Arc::clone(&cfg.engines),
        presenter: Arc::new(ChatPresenter::default()),
        running_tasks,
        progress_edit_every: cfg.progress_edit_every,
        final_notify: cfg.workspace.final_notify,
    };

    let job_env = env.clone();
    let scheduler = ThreadScheduler::new(Arc::new(move |job: ThreadJob| {
        let env = job_env.clone();
        Box::pin(async move { run_scheduled_job(env, job).await })
    }));

    let bridge = Arc::new(Bridge {
        bot: cfg.bot.clone(),
        channel_id: cfg.channel_id,
        engines: Arc::clone(&cfg.engines),
        manager: WorkspaceManager::new(cfg.bot.clone(), cfg.channel_id, cfg.workspace.clone()),
        ws_router: Mutex::new(WorkspaceRouter::new(cfg.workspace.clone())),
        ralph: RalphManager::new(),
        env,
        scheduler,
        commands: cfg.commands,
    });

    let mut offset = drain_backlog(&bridge.bot).await;
    set_command_menu(&bridge).await;
    if let Some(startup_msg) = &cfg.startup_msg {
        let _ = bridge.manager.send_to_topic(None, startup_msg.clone()).await;
    }
    let created = bridge.manager.process_pending_topics().await;
    if !created.is_empty() {
        bridge.reload_router();
    }

    let mut debouncer = TopicDebouncer::new(Duration::from_millis(
        cfg.workspace.message_batch_window_ms,
    ));

    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            _ = cfg.shutdown.cancelled() => {
                tracing::info!("shutdown requested, draining");
                for batch in debouncer.flush_all() {
                    bridge.dispatch_batch(batch).await;
                }
                bridge.bot.flush(Duration::from_secs(5)).await;
                return Ok(());
            }
            _ = sleep_until_deadline(deadline) => {
                for batch in debouncer.check_expired(Instant::now()) {
                    bridge.dispatch_batch(batch).await;
                }
            }
            result = bridge.bot.get_updates(offset, 50) => {
                match result {
                    Err(TransportError::Closed) => {
                        tracing::info!("transport closed, stopping");
                        bridge.bot.flush(Duration::from_secs(5)).await;
                        return Ok(());
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "get_updates failed");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                    Ok(updates) => {
                        for update in updates {
                            offset = Some(update.update_id + 1);
                            bridge.handle_update(&mut debouncer, update).await;
                        }
                    }
                }
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Swallow whatever accumulated while the process was down.
async fn drain_backlog<A: ChatApi>(bot: &BotClient<A>) -> Option<i64> {
    let mut offset = None;
    for _ in 0..20 {
        match bot.get_updates(offset, 0).await {
            Ok(updates) if updates.is_empty() => break,
            Ok(updates) => {
                if let Some(last) = updates.last() {
                    offset = Some(last.update_id + 1);
                }
                tracing::debug!(count = updates.len(), "dropped backlog updates");
            }
            Err(_) => break,
        }
    }
    offset
}

async fn set_command_menu<A: ChatApi>(bridge: &Bridge<A>) {
    let mut commands = vec![
        BotCommand {
            command: "help".to_string(),
            description: "show workspace commands".to_string(),
        },
        BotCommand {
            command: "list".to_string(),
            description: "list folders".to_string(),
        },
        BotCommand {
            command: "status".to_string(),
            description: "workspace overview".to_string(),
        },
        BotCommand {
            command: "cancel".to_string(),
            description: "cancel the replied-to run".to_string(),
        },
        BotCommand {
            command: "ralph".to_string(),
            description: "self-continuing loop in a worker topic".to_string(),
        },
    ];
    for engine in bridge.engines.engine_ids() {
        commands.push(BotCommand {
            command: engine.to_string(),
            description: format!("run this message with {engine}"),
        });
    }
    if let Err(err) = bridge.bot.set_my_commands(commands).await {
        tracing::debug!(error = %err, "set_my_commands failed");
    }
}

async fn run_scheduled_job<A: ChatApi>(env: TurnEnv<A>, job: ThreadJob) {
    let runner = match env.router.runner_for(Some(&job.resume_token)) {
        Ok(runner) => runner,
        Err(err) => {
            let _ = env
                .bot
                .send_message(SendRequest {
                    channel_id: job.channel_id,
                    text: format!("error: {err}"),
                    thread_id: job.thread_id,
                    reply_to_message_id: Some(job.user_msg_id),
                    disable_notification: false,
                    reply_markup: None,
                })
                .await;
            return;
        }
    };
    let request = TurnRequest {
        channel_id: job.channel_id,
        thread_id: job.thread_id,
        user_msg_id: job.user_msg_id,
        prompt: job.text,
        resume: Some(job.resume_token),
        cwd: job.cwd,
        run_ctx: job.run_ctx,
        notify_scheduler: false,
        cancel: None,
    };
    run_turn(&env, None, runner, request).await;
}

impl<A: ChatApi> Bridge<A> {
    fn reload_router(&self) {
        self.ws_router.lock().reload(self.manager.config());
    }

    async fn reply(&self, thread_id: Option<i64>, reply_to: i64, text: impl Into<String>) {
        let _ = self.manager.send_reply(thread_id, reply_to, text).await;
    }

    async fn handle_update(self: &Arc<Self>, debouncer: &mut TopicDebouncer, update: ChatUpdate) {
        match update.kind {
            UpdateKind::CallbackQuery => self.handle_callback(update).await,
            UpdateKind::Message => {
                if update.channel_id != self.channel_id || update.text.is_empty() {
                    return;
                }
                let thread_id = update.thread_id;
                let batches = debouncer.add_message(thread_id, &update, Instant::now());
                for batch in batches {
                    self.dispatch_batch(batch).await;
                }
            }
        }
    }

    async fn handle_callback(&self, update: ChatUpdate) {
        let Some(callback_id) = update.callback_data.as_deref().and(update.callback_id.clone())
        else {
            if let Some(id) = &update.callback_id {
                let _ = self.bot.answer_callback_query(id, None).await;
            }
            return;
        };
        let data = update.callback_data.unwrap_or_default();

        // ralph:cancel:<topic>:<loop_id>
        let mut parts = data.split(':');
        let is_ralph_cancel = parts.next() == Some("ralph") && parts.next() == Some("cancel");
        let topic_id = parts.next().and_then(|p| p.parse::<i64>().ok());
        let loop_id = parts.next();
        if let (true, Some(topic_id), Some(loop_id)) = (is_ralph_cancel, topic_id, loop_id) {
            let answer = if self.ralph.cancel_loop_id(topic_id, loop_id) {
                "Loop cancelled"
            } else {
                "No active loop"
            };
            let _ = self
                .bot
                .answer_callback_query(&callback_id, Some(answer.to_string()))
                .await;
            if let Some(message_id) = update.callback_message_id {
                let _ = self
                    .bot
                    .edit_reply_markup(
                        self.channel_id,
                        message_id,
                        serde_json::json!({"inline_keyboard": []}),
                    )
                    .await;
            }
            return;
        }
        let _ = self.bot.answer_callback_query(&callback_id, None).await;
    }

    async fn dispatch_batch(self: &Arc<Self>, batch: MessageBatch) {
        let thread_id = batch.topic_id;
        let text = batch.combined_text.clone();
        if batch.message_ids.len() > 1 {
            tracing::info!(
                count = batch.message_ids.len(),
                ?thread_id,
                "dispatching debounced batch"
            );
        }

        let route = {
            let router = self.ws_router.lock();
            router.route(thread_id, &text, batch.first_reply_to_text.as_deref())
        };

        // /cancel short-circuits everything else.
        if route.is_slash_command && route.command.as_deref() == Some("cancel") {
            self.handle_cancel(&batch).await;
            return;
        }

        if is_general_slash_command(&route) {
            let reply = handle_admin_command(&self.manager, &route).await;
            self.reload_router();
            self.reply(thread_id, batch.last_message_id, reply).await;
            return;
        }

        // Command plugins may claim slash commands anywhere.
        if route.is_slash_command {
            let plugin = route
                .command
                .as_deref()
                .and_then(|command| self.commands.get(command).cloned());
            if let Some(plugin) = plugin {
                let ctx = CommandContext {
                    workspace: self.manager.config(),
                    folder: route.folder.as_ref().map(|f| f.name.clone()),
                };
                let reply = plugin.handle(&route.command_args, &ctx).await;
                self.reply(thread_id, batch.last_message_id, reply).await;
                return;
            }
        }

        let is_ralph = {
            let router = self.ws_router.lock();
            router.is_ralph_command(&route)
        };
        if is_ralph {
            if let (Some(folder), Some(topic_id)) = (route.folder.clone(), thread_id) {
                self.start_ralph(&batch, topic_id, folder, &route.command_args)
                    .await;
            } else {
                self.reply(
                    thread_id,
                    batch.last_message_id,
                    "Usage: /ralph <task> [--max-iterations N] (in a worker topic)",
                )
                .await;
            }
            return;
        }

        // While a ralph loop runs, its topic takes no other work.
        if let Some(topic_id) = thread_id {
            if self.ralph.has_active_loop(topic_id) {
                self.reply(
                    thread_id,
                    batch.last_message_id,
                    "A Ralph loop is running here. Use /cancel to stop it first.",
                )
                .await;
                return;
            }
        }

        if route.is_unbound_topic {
            self.manager
                .send_unbound_topic_error(thread_id, batch.last_message_id)
                .await;
            return;
        }

        self.run_engine_turn(batch, route).await;
    }

    async fn handle_cancel(&self, batch: &MessageBatch) {
        if let Some(reply_id) = batch.first_reply_to_message_id {
            let task = self.env.running_tasks.lock().get(&reply_id).cloned();
            if let Some(task) = task {
                tracing::info!(progress_id = reply_id, "cancel requested");
                task.cancel.cancel();
                return;
            }
        }
        if let Some(topic_id) = batch.topic_id {
            if self.ralph.cancel_loop(topic_id) {
                self.reply(
                    batch.topic_id,
                    batch.last_message_id,
                    "Cancelling Ralph loop…",
                )
                .await;
                return;
            }
        }
        self.reply(
            batch.topic_id,
            batch.last_message_id,
            "No active run to cancel. Reply to a progress message to cancel it.",
        )
        .await;
    }

    async fn start_ralph(
        self: &Arc<Self>,
        batch: &MessageBatch,
        topic_id: i64,
        folder: FolderConfig,
        args: &str,
    ) {
        let (task, max_override) = parse_ralph_command(args);
        if task.trim().is_empty() {
            self.reply(
                Some(topic_id),
                batch.last_message_id,
                "Usage: /ralph <task> [--max-iterations N]",
            )
            .await;
            return;
        }
        let config = self.manager.config();
        let max_iterations = max_override.unwrap_or(config.ralph.default_max_iterations).max(1);

        let runner = match self.engines.runner_for(None) {
            Ok(runner) => runner,
            Err(err) => {
                self.reply(Some(topic_id), batch.last_message_id, format!("error: {err}"))
                    .await;
                return;
            }
        };

        let Some(active) = self.ralph.begin(topic_id) else {
            self.reply(
                Some(topic_id),
                batch.last_message_id,
                "A Ralph loop is already running here. Use /cancel first.",
            )
            .await;
            return;
        };

        let markup = serde_json::json!({
            "inline_keyboard": [[{
                "text": "Cancel loop",
                "callback_data": format!("ralph:cancel:{topic_id}:{}", active.loop_id),
            }]]
        });
        let _ = self
            .bot
            .send_message(SendRequest {
                channel_id: self.channel_id,
                text: format!("🔁 Ralph loop started (max {max_iterations} iterations)"),
                thread_id: Some(topic_id),
                reply_to_message_id: Some(batch.last_message_id),
                disable_notification: true,
                reply_markup: Some(markup),
            })
            .await;

        let bridge = Arc::clone(self);
        let cwd = folder.absolute_path(&config.root);
        let run_ctx = RunContext::new(folder.name.clone(), None);
        let user_msg_id = batch.last_message_id;
        tokio::spawn(async move {
            bridge
                .run_ralph_loop(topic_id, user_msg_id, cwd, run_ctx, task, max_iterations, runner, active)
                .await;
        });
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_ralph_loop(
        self: Arc<Self>,
        topic_id: i64,
        user_msg_id: i64,
        cwd: std::path::PathBuf,
        run_ctx: RunContext,
        task: String,
        max_iterations: u32,
        runner: Arc<dyn Runner>,
        active: ActiveLoop,
    ) {
        let mut resume: Option<ResumeToken> = None;
        let mut iterations = 0;
        let mut done = false;
        let prompt = format!(
            "{task}\n\nWhen the task is fully complete, include the word {RALPH_DONE_MARKER} \
             in your final answer. Otherwise keep going."
        );

        for iteration in 1..=max_iterations {
            if active.cancel.is_cancelled() {
                break;
            }
            iterations = iteration;
            tracing::info!(topic_id, iteration, max_iterations, "ralph iteration");
            let request = TurnRequest {
                channel_id: self.channel_id,
                thread_id: Some(topic_id),
                user_msg_id,
                prompt: prompt.clone(),
                resume: resume.clone(),
                cwd: Some(cwd.clone()),
                run_ctx: Some(run_ctx.clone()),
                notify_scheduler: false,
                cancel: Some(active.cancel.child_token()),
            };
            let outcome = run_turn(&self.env, None, Arc::clone(&runner), request).await;
            resume = outcome.resume.clone().or(resume);
            if outcome.status == "cancelled" || outcome.status == "error" {
                break;
            }
            if outcome.answer.contains(RALPH_DONE_MARKER) {
                done = true;
                break;
            }
        }

        self.ralph.finish(topic_id, &active.loop_id);
        let summary = if active.cancel.is_cancelled() {
            format!("🔁 Ralph loop cancelled after {iterations} iteration(s)")
        } else if done {
            format!("🔁 Ralph loop finished after {iterations} iteration(s)")
        } else {
            format!("🔁 Ralph loop stopped after {iterations} iteration(s)")
        };
        let _ = self.manager.send_to_topic(Some(topic_id), summary).await;
    }

    async fn run_engine_turn(self: &Arc<Self>, batch: MessageBatch, route: crate::router::RouteResult) {
        let thread_id = batch.topic_id;
        let text = batch.combined_text.clone();
        let engine_ids = self.engines.engine_ids();

        // Engine selection inputs: /engine command, @engine directive.
        let (prompt_base, mut engine_override, mut branch) = if route.is_slash_command {
            match route.command.as_deref() {
                Some(command) if engine_ids.iter().any(|id| id.as_str() == command) => (
                    route.prompt_text.clone(),
                    Some(EngineId::new(command)),
                    route.branch.clone(),
                ),
                // Unknown slash commands go to the orchestrator verbatim.
                _ => (text.clone(), None, None),
            }
        } else {
            (route.prompt_text.clone(), None, route.branch.clone())
        };
        if engine_override.is_none() {
            if let Some(candidate) = &branch {
                if engine_ids.iter().any(|id| id.as_str() == candidate) {
                    engine_override = Some(EngineId::new(candidate.clone()));
                    branch = None;
                }
            }
        }

        // Resume: message text, then the replied-to text, then a reply to a
        // still-running progress message.
        let mut resume = self
            .engines
            .resolve_resume(&text, batch.first_reply_to_text.as_deref());
        if resume.is_none() {
            if let Some(reply_id) = batch.first_reply_to_message_id {
                let task = self.env.running_tasks.lock().get(&reply_id).cloned();
                if let Some(task) = task {
                    let known = task.resume.lock().clone();
                    match known {
                        Some(token) => resume = Some(token),
                        None => {
                            self.reply(
                                thread_id,
                                batch.last_message_id,
                                "resume token not ready yet; try replying to the final message.",
                            )
                            .await;
                            return;
                        }
                    }
                }
            }
        }

        // Engine precedence: resume token > explicit override > default.
        let entry = if let Some(resume) = &resume {
            self.engines.entry_for(Some(resume))
        } else {
            self.engines.entry_for_engine(engine_override.as_ref())
        };
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                self.reply(thread_id, batch.last_message_id, format!("error: {err}"))
                    .await;
                return;
            }
        };
        if !entry.available {
            let issue = entry.issue.as_deref().unwrap_or("engine unavailable");
            self.reply(
                thread_id,
                batch.last_message_id,
                format!("error: engine {} unavailable: {issue}", entry.engine),
            )
            .await;
            return;
        }
        let runner = Arc::clone(&entry.runner);
        let engine = entry.engine.clone();

        // Working directory and context footer.
        let config = self.manager.config();
        let (cwd, run_ctx) = match &route.folder {
            Some(folder) => {
                let folder_abs = folder.absolute_path(&config.root);
                match &branch {
                    Some(raw_branch) => {
                        let branch_name = match sanitize_branch_name(raw_branch) {
                            Ok(name) => name,
                            Err(err) => {
                                self.reply(
                                    thread_id,
                                    batch.last_message_id,
                                    format!("error: {err}"),
                                )
                                .await;
                                return;
                            }
                        };
                        let worktree = ensure_worktree(
                            &folder_abs,
                            &branch_name,
                            &config.worktrees_dir,
                            config.worktree_base.as_deref(),
                        )
                        .await;
                        match worktree {
                            Ok(path) => (
                                Some(path),
                                Some(RunContext::new(folder.name.clone(), Some(branch_name))),
                            ),
                            Err(err) => {
                                self.reply(
                                    thread_id,
                                    batch.last_message_id,
                                    format!("error: {err}"),
                                )
                                .await;
                                return;
                            }
                        }
                    }
                    None => (
                        Some(folder_abs),
                        Some(RunContext::new(folder.name.clone(), None)),
                    ),
                }
            }
            None => (Some(config.root.clone()), None),
        };

        // Engines never see resume signatures; an emptied prompt becomes
        // "continue".
        let mut prompt = self.engines.strip_resume_lines(&prompt_base);
        if route.is_general && resume.is_none() {
            prompt = prepend_orchestrator_context(&config, &prompt);
        }

        match resume {
            Some(resume_token) => {
                self.scheduler.enqueue(ThreadJob {
                    channel_id: self.channel_id,
                    thread_id,
                    user_msg_id: batch.last_message_id,
                    text: prompt,
                    resume_token,
                    engine,
                    cwd,
                    run_ctx,
                });
            }
            None => {
                let env = self.env.clone();
                let scheduler = self.scheduler.clone();
                let request = TurnRequest {
                    channel_id: self.channel_id,
                    thread_id,
                    user_msg_id: batch.last_message_id,
                    prompt,
                    resume: None,
                    cwd,
                    run_ctx,
                    notify_scheduler: true,
                    cancel: None,
                };
                tokio::spawn(async move {
                    run_turn(&env, Some(&scheduler), runner, request).await;
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
