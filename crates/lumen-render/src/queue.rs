// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The cross-thread render command queue.
//!
//! The simulation thread enqueues [`RenderCommand`]s through a
//! [`RenderCommandSender`]; the render thread drains them once per frame with
//! [`RenderCommandQueue::execute`]. Commands targeting the same asset run in
//! arrival order, and a command that cannot run yet (a dependency's GPU state
//! is not loaded) returns [`CommandStatus::Deferred`] and blocks the commands
//! queued behind it for that target until a later frame.
//!
//! A command marked [`RenderCommand::superseding`] carries the whole state of
//! its target. It replaces every earlier command with the same label that has
//! not run yet, so a stale command waiting on a released dependency cannot
//! block the target. The replacement inherits the `Initialize` kind when it
//! replaces one.

use crate::config::DeferralPolicy;
use crate::context::RenderContext;
use lumen_core::renderer::RenderError;
use lumen_core::EntityId;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// The outcome of running a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The command completed and is removed from the queue.
    Done,
    /// A precondition failed; the command is retried next frame.
    Deferred,
}

/// The lifecycle step a command performs on its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Creates the target's GPU state.
    Initialize,
    /// Changes an existing GPU state.
    Update,
    /// Destroys the target's GPU state.
    Uninitialize,
}

/// The result of running a command.
pub type CommandResult = Result<CommandStatus, RenderError>;

type Operation = Box<dyn FnMut(&mut RenderContext) -> CommandResult + Send>;

/// A deferred GPU operation on one target asset.
///
/// The operation only captures plain data prepared by the simulation thread.
pub struct RenderCommand {
    target: EntityId,
    kind: CommandKind,
    label: &'static str,
    supersedes: bool,
    operation: Operation,
}

impl RenderCommand {
    /// Creates a command.
    pub fn new<F>(target: EntityId, kind: CommandKind, label: &'static str, operation: F) -> Self
    where
        F: FnMut(&mut RenderContext) -> CommandResult + Send + 'static,
    {
        Self {
            target,
            kind,
            label,
            supersedes: false,
            operation: Box::new(operation),
        }
    }

    /// Marks the command as replacing pending commands with the same label
    /// for the same target.
    pub fn superseding(mut self) -> Self {
        self.supersedes = true;
        self
    }

    /// The target asset.
    pub fn target(&self) -> EntityId {
        self.target
    }

    /// The lifecycle step.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// A short description used in logs.
    pub fn label(&self) -> &'static str {
        self.label
    }

    fn run(&mut self, ctx: &mut RenderContext) -> CommandResult {
        (self.operation)(ctx)
    }
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCommand")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .finish()
    }
}

/// The simulation-side end of the queue.
#[derive(Debug, Clone)]
pub struct RenderCommandSender {
    sender: flume::Sender<RenderCommand>,
}

impl RenderCommandSender {
    /// Enqueues a command. Logs an error if the render thread is gone.
    pub fn send(&self, command: RenderCommand) {
        if let Err(e) = self.sender.send(command) {
            let command = e.into_inner();
            log::error!(
                "Render queue disconnected; dropping '{}' for {}",
                command.label,
                command.target
            );
        }
    }
}

/// Counters for one [`RenderCommandQueue::execute`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Commands that completed.
    pub executed: usize,
    /// Commands that failed; they are logged and treated as done.
    pub failed: usize,
    /// Targets whose head command deferred.
    pub deferred: usize,
    /// Commands dropped by coalescing or by the deferral policy.
    pub dropped: usize,
    /// Commands still pending after the call.
    pub pending: usize,
}

#[derive(Default)]
struct TargetQueue {
    commands: VecDeque<RenderCommand>,
    deferred_frames: u32,
}

/// The render-thread end of the queue.
pub struct RenderCommandQueue {
    receiver: flume::Receiver<RenderCommand>,
    targets: HashMap<EntityId, TargetQueue>,
    order: Vec<EntityId>,
    policy: DeferralPolicy,
    coalesced: usize,
}

/// Creates a connected sender and queue.
pub fn command_channel(policy: DeferralPolicy) -> (RenderCommandSender, RenderCommandQueue) {
    let (sender, receiver) = flume::unbounded();
    (
        RenderCommandSender { sender },
        RenderCommandQueue {
            receiver,
            targets: HashMap::new(),
            order: Vec::new(),
            policy,
            coalesced: 0,
        },
    )
}

impl RenderCommandQueue {
    /// Moves every command sent so far into the per-target queues, applying
    /// coalescing.
    pub fn receive(&mut self) {
        while let Ok(command) = self.receiver.try_recv() {
            self.push(command);
        }
    }

    fn push(&mut self, mut command: RenderCommand) {
        let target = command.target;
        let queue = self.targets.entry(target).or_default();
        if queue.commands.is_empty() && !self.order.contains(&target) {
            self.order.push(target);
        }

        if command.kind == CommandKind::Uninitialize {
            let pending_init = queue
                .commands
                .iter()
                .rposition(|c| c.kind == CommandKind::Initialize);
            match pending_init {
                Some(position) => {
                    // The GPU state was never created: forget both ends.
                    let dropped = queue.commands.len() - position + 1;
                    queue.commands.truncate(position);
                    self.coalesced += dropped;
                    log::trace!("Coalesced {dropped} commands for {target}");
                    return;
                }
                None => {
                    let before = queue.commands.len();
                    queue.commands.retain(|c| c.kind != CommandKind::Update);
                    self.coalesced += before - queue.commands.len();
                }
            }
        } else if command.supersedes {
            // Only commands after the last teardown describe the live state.
            let first = queue
                .commands
                .iter()
                .rposition(|c| c.kind == CommandKind::Uninitialize)
                .map_or(0, |position| position + 1);
            let label = command.label;
            let mut position = first;
            while position < queue.commands.len() {
                let stale = &queue.commands[position];
                if stale.supersedes && stale.label == label {
                    if stale.kind == CommandKind::Initialize {
                        command.kind = CommandKind::Initialize;
                    }
                    queue.commands.remove(position);
                    self.coalesced += 1;
                    if position == 0 {
                        queue.deferred_frames = 0;
                    }
                    log::trace!("'{label}' for {target} replaced a pending command");
                } else {
                    position += 1;
                }
            }
        }
        queue.commands.push_back(command);
    }

    /// Runs pending commands in arrival order, FIFO per target.
    ///
    /// Errors are logged and the failing command is treated as done.
    pub fn execute(&mut self, ctx: &mut RenderContext) -> QueueStats {
        self.receive();
        let mut stats = QueueStats {
            dropped: std::mem::take(&mut self.coalesced),
            ..Default::default()
        };

        let order = std::mem::take(&mut self.order);
        let mut still_pending = Vec::with_capacity(order.len());
        for target in order {
            let Some(queue) = self.targets.get_mut(&target) else {
                continue;
            };
            let mut deferred = false;
            while let Some(command) = queue.commands.front_mut() {
                match command.run(ctx) {
                    Ok(CommandStatus::Done) => {
                        stats.executed += 1;
                        queue.commands.pop_front();
                        queue.deferred_frames = 0;
                    }
                    Ok(CommandStatus::Deferred) => {
                        deferred = true;
                        break;
                    }
                    Err(e) => {
                        log::error!("Render command '{}' for {target} failed: {e}", command.label);
                        stats.failed += 1;
                        queue.commands.pop_front();
                        queue.deferred_frames = 0;
                    }
                }
            }

            if deferred {
                stats.deferred += 1;
                queue.deferred_frames += 1;
                let frames = queue.deferred_frames;
                let label = queue.commands.front().map_or("", |c| c.label);
                if frames == self.policy.warn_after_frames {
                    log::warn!(
                        "Render command '{label}' for {target} has been deferred for {frames} frames"
                    );
                }
                if self.policy.drop_after_frames.is_some_and(|limit| frames >= limit) {
                    log::error!(
                        "Dropping {} render commands for {target}: '{label}' deferred for {frames} frames",
                        queue.commands.len()
                    );
                    stats.dropped += queue.commands.len();
                    queue.commands.clear();
                }
            }

            if queue.commands.is_empty() {
                self.targets.remove(&target);
            } else {
                still_pending.push(target);
            }
        }

        self.order = still_pending;
        stats.pending = self.pending_count();
        stats
    }

    /// Number of commands waiting, including ones not yet received.
    pub fn pending_count(&self) -> usize {
        self.targets.values().map(|q| q.commands.len()).sum::<usize>() + self.receiver.len()
    }

    /// Number of received commands waiting for `target`.
    pub fn pending_for(&self, target: EntityId) -> usize {
        self.targets.get(&target).map_or(0, |q| q.commands.len())
    }

    /// The policy applied to deferred commands.
    pub fn policy(&self) -> DeferralPolicy {
        self.policy
    }
}

impl fmt::Debug for RenderCommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCommandQueue")
            .field("targets", &self.targets.len())
            .field("pending", &self.pending_count())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use lumen_infra::HeadlessDevice;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Journal(Vec<(u32, &'static str)>);

    fn context() -> RenderContext {
        let mut ctx = RenderContext::new(Arc::new(HeadlessDevice::new()), &RenderConfig::default());
        ctx.addons.insert(Journal::default());
        ctx
    }

    fn journal(ctx: &RenderContext) -> Vec<(u32, &'static str)> {
        ctx.addons.get::<Journal>().map(|j| j.0.clone()).unwrap_or_default()
    }

    fn record(target: u32, kind: CommandKind, label: &'static str) -> RenderCommand {
        RenderCommand::new(EntityId::new(target, 0), kind, label, move |ctx| {
            if let Some(journal) = ctx.addons.get_mut::<Journal>() {
                journal.0.push((target, label));
            }
            Ok(CommandStatus::Done)
        })
    }

    fn gated(target: u32, label: &'static str, gate: Arc<AtomicBool>) -> RenderCommand {
        RenderCommand::new(EntityId::new(target, 0), CommandKind::Initialize, label, move |ctx| {
            if !gate.load(Ordering::SeqCst) {
                return Ok(CommandStatus::Deferred);
            }
            if let Some(journal) = ctx.addons.get_mut::<Journal>() {
                journal.0.push((target, label));
            }
            Ok(CommandStatus::Done)
        })
    }

    #[test]
    fn runs_in_arrival_order() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        sender.send(record(1, CommandKind::Initialize, "a"));
        sender.send(record(2, CommandKind::Initialize, "b"));
        sender.send(record(1, CommandKind::Update, "c"));

        let stats = queue.execute(&mut ctx);
        assert_eq!(stats.executed, 3);
        assert_eq!(journal(&ctx), vec![(1, "a"), (1, "c"), (2, "b")]);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn deferred_head_blocks_only_its_target() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        let gate = Arc::new(AtomicBool::new(false));
        sender.send(gated(1, "init", gate.clone()));
        sender.send(record(1, CommandKind::Update, "update"));
        sender.send(record(2, CommandKind::Initialize, "other"));

        let stats = queue.execute(&mut ctx);
        assert_eq!(stats.deferred, 1);
        assert_eq!(journal(&ctx), vec![(2, "other")]);
        assert_eq!(queue.pending_for(EntityId::new(1, 0)), 2);

        gate.store(true, Ordering::SeqCst);
        queue.execute(&mut ctx);
        assert_eq!(
            journal(&ctx),
            vec![(2, "other"), (1, "init"), (1, "update")]
        );
    }

    #[test]
    fn uninitialize_cancels_pending_initialize() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        let gate = Arc::new(AtomicBool::new(false));
        sender.send(gated(1, "init", gate));
        queue.execute(&mut ctx);

        sender.send(record(1, CommandKind::Update, "update"));
        sender.send(record(1, CommandKind::Uninitialize, "teardown"));
        let stats = queue.execute(&mut ctx);
        assert_eq!(stats.dropped, 3);
        assert!(journal(&ctx).is_empty());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn uninitialize_discards_pending_updates_of_loaded_state() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        sender.send(record(1, CommandKind::Initialize, "init"));
        queue.execute(&mut ctx);

        let gate = Arc::new(AtomicBool::new(false));
        let blocked = gate.clone();
        sender.send(RenderCommand::new(
            EntityId::new(1, 0),
            CommandKind::Update,
            "blocked update",
            move |_| {
                Ok(if blocked.load(Ordering::SeqCst) {
                    CommandStatus::Done
                } else {
                    CommandStatus::Deferred
                })
            },
        ));
        queue.execute(&mut ctx);
        sender.send(record(1, CommandKind::Uninitialize, "teardown"));
        let stats = queue.execute(&mut ctx);

        assert_eq!(stats.dropped, 1);
        assert_eq!(journal(&ctx), vec![(1, "init"), (1, "teardown")]);
    }

    fn waiting(target: u32, kind: CommandKind, label: &'static str) -> RenderCommand {
        RenderCommand::new(EntityId::new(target, 0), kind, label, |_| {
            Ok(CommandStatus::Deferred)
        })
        .superseding()
    }

    #[test]
    fn superseding_command_replaces_a_waiting_one() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        sender.send(waiting(1, CommandKind::Initialize, "place"));
        sender.send(record(1, CommandKind::Update, "transform"));
        queue.execute(&mut ctx);
        assert_eq!(queue.pending_for(EntityId::new(1, 0)), 2);

        sender.send(record(1, CommandKind::Update, "place").superseding());
        let stats = queue.execute(&mut ctx);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(journal(&ctx), vec![(1, "transform"), (1, "place")]);
    }

    #[test]
    fn replacement_keeps_the_initialize_kind() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        sender.send(waiting(1, CommandKind::Initialize, "place"));
        sender.send(waiting(1, CommandKind::Update, "place"));
        sender.send(record(1, CommandKind::Uninitialize, "teardown"));
        let stats = queue.execute(&mut ctx);

        // The surviving command stood for creation, so teardown cancels it.
        assert_eq!(stats.dropped, 3);
        assert!(journal(&ctx).is_empty());
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn superseding_stops_at_the_last_teardown() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        sender.send(record(1, CommandKind::Initialize, "init"));
        queue.execute(&mut ctx);

        sender.send(waiting(1, CommandKind::Update, "place"));
        sender.send(record(1, CommandKind::Uninitialize, "teardown"));
        sender.send(record(1, CommandKind::Initialize, "place").superseding());
        let stats = queue.execute(&mut ctx);
        assert_eq!(stats.dropped, 1);
        assert_eq!(journal(&ctx), vec![(1, "init"), (1, "teardown"), (1, "place")]);
    }

    #[test]
    fn failures_are_logged_and_consumed() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        sender.send(RenderCommand::new(
            EntityId::new(1, 0),
            CommandKind::Initialize,
            "broken",
            |_| Err(RenderError::Internal("boom".to_owned())),
        ));
        sender.send(record(1, CommandKind::Update, "after"));
        let stats = queue.execute(&mut ctx);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.executed, 1);
        assert_eq!(journal(&ctx), vec![(1, "after")]);
    }

    #[test]
    fn drop_policy_discards_stuck_targets() {
        let policy = DeferralPolicy {
            warn_after_frames: 1,
            drop_after_frames: Some(3),
        };
        let (sender, mut queue) = command_channel(policy);
        let mut ctx = context();
        sender.send(gated(1, "stuck", Arc::new(AtomicBool::new(false))));
        sender.send(record(1, CommandKind::Update, "behind"));

        assert_eq!(queue.execute(&mut ctx).dropped, 0);
        assert_eq!(queue.execute(&mut ctx).dropped, 0);
        assert_eq!(queue.execute(&mut ctx).dropped, 2);
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn unbounded_policy_retries_forever() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        sender.send(gated(1, "stuck", Arc::new(AtomicBool::new(false))));
        for _ in 0..300 {
            queue.execute(&mut ctx);
        }
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn commands_are_sent_across_threads() {
        let (sender, mut queue) = command_channel(DeferralPolicy::default());
        let mut ctx = context();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let sender = sender.clone();
                let seen = seen.clone();
                std::thread::spawn(move || {
                    sender.send(RenderCommand::new(
                        EntityId::new(i, 0),
                        CommandKind::Initialize,
                        "threaded",
                        move |_| {
                            seen.lock().unwrap().push(i);
                            Ok(CommandStatus::Done)
                        },
                    ));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.execute(&mut ctx).executed, 4);
        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
