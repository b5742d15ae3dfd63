use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::{
    catalog::Flashcard,
    core::{progress::LevelProgress, scheduler::Scheduler},
    enrollment::{EnrollmentRecord, Recall, RecallOutcome},
    error::{SchedulerError, SchedulerResult},
    op::StoredOp,
    persist::{OpSink, PersistError, PersistResult},
    quiz::{QuizQuestion, QuizSampler},
    types::{DifficultyTier, FlashcardId, OpSeq, Timestamp, UserId},
};

use super::events::SchedulerEvent;

/// When queued journal ops reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Each op is written and synced before the writer takes the next one.
    EveryOp,
    /// Ops are grouped into one transaction once `max_ops` are waiting or
    /// the oldest has waited `max_latency_ms`.
    Batched {
        /// Group size that forces a write.
        max_ops: usize,
        /// Longest an op may wait for company.
        max_latency_ms: u64,
    },
}

/// Tuning for [`spawn_scheduler`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Write policy for the journal writer.
    pub durability: Durability,
    /// Journal ops that may wait for the writer before mutations are refused.
    pub persist_queue_bound: usize,
    /// Upper bound on a single request, queueing included.
    pub request_timeout_ms: u64,
    /// Fixed seed for quiz sampling; entropy-seeded when `None`.
    pub quiz_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            durability: Durability::EveryOp,
            persist_queue_bound: 64,
            request_timeout_ms: 5_000,
            quiz_seed: None,
        }
    }
}

/// Cloneable front door to the scheduler task.
///
/// All commands run one at a time on the task that owns the ledger, so two
/// submissions for the same card can never interleave their read-modify-write.
#[derive(Clone)]
pub struct SchedulerHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SchedulerEvent>,
    timeout: Duration,
}

enum Command {
    Enroll {
        user: UserId,
        flashcard: FlashcardId,
        now: Timestamp,
        resp: oneshot::Sender<SchedulerResult<EnrollmentRecord>>,
    },
    Review {
        user: UserId,
        flashcard: FlashcardId,
        recall: Recall,
        now: Timestamp,
        resp: oneshot::Sender<SchedulerResult<RecallOutcome>>,
    },
    Learnable {
        user: UserId,
        resp: oneshot::Sender<Vec<Flashcard>>,
    },
    Due {
        user: UserId,
        now: Timestamp,
        resp: oneshot::Sender<Vec<Flashcard>>,
    },
    Record {
        user: UserId,
        flashcard: FlashcardId,
        resp: oneshot::Sender<SchedulerResult<EnrollmentRecord>>,
    },
    Progress {
        user: UserId,
        resp: oneshot::Sender<LevelProgress>,
    },
    NextQuestion {
        tier: DifficultyTier,
        resp: oneshot::Sender<SchedulerResult<QuizQuestion>>,
    },
    Flush {
        resp: oneshot::Sender<SchedulerResult<OpSeq>>,
    },
    Shutdown {
        resp: oneshot::Sender<SchedulerResult<()>>,
    },
}

enum JournalMsg {
    Op(StoredOp),
    Sync {
        resp: oneshot::Sender<PersistResult<OpSeq>>,
    },
    Close {
        resp: oneshot::Sender<PersistResult<()>>,
    },
}

type JournalPermit<'a> = mpsc::Permit<'a, JournalMsg>;

struct LoopState {
    scheduler: Scheduler,
    sampler: QuizSampler<StdRng>,
}

/// Moves `scheduler` onto its own task and returns a handle to it.
///
/// With a sink, every mutation is journaled through a bounded queue drained by
/// a writer task; without one, mutations are reported durable immediately.
/// Must be called inside a tokio runtime.
pub fn spawn_scheduler(
    scheduler: Scheduler,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> SchedulerHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<SchedulerEvent>(1024);

    let (journal_tx, mut durable_rx) = match sink {
        Some(sink) => {
            let (journal_tx, journal_rx) = mpsc::channel::<JournalMsg>(config.persist_queue_bound.max(1));
            let (durable_tx, durable_rx) = mpsc::unbounded_channel();
            let writer = JournalWriter {
                sink: Some(sink),
                pending: Vec::new(),
                durable: scheduler.ledger().latest_op_seq(),
                durable_tx,
            };
            tokio::spawn(writer.run(journal_rx, config.durability));
            (Some(journal_tx), Some(durable_rx))
        }
        None => (None, None),
    };

    let rng = match config.quiz_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut state = LoopState {
        sampler: QuizSampler::new(Arc::clone(scheduler.catalog()), rng),
        scheduler,
    };

    let events_tx_loop = events_tx.clone();
    let timeout = Duration::from_millis(config.request_timeout_ms);

    tokio::spawn(async move {
        loop {
            let cmd = match durable_rx.as_mut() {
                Some(rx) => tokio::select! {
                    cmd = cmd_rx.recv() => cmd,
                    Some(durable) = rx.recv() => {
                        match durable {
                            Ok(op_seq) => {
                                let _ = events_tx_loop.send(SchedulerEvent::DurableUpTo { op_seq });
                            }
                            Err(err) => warn!(error = %err, "journal write failed"),
                        }
                        continue;
                    }
                },
                None => cmd_rx.recv().await,
            };
            let Some(cmd) = cmd else { break };
            if handle_command(cmd, &mut state, &events_tx_loop, journal_tx.as_ref()).await {
                break;
            }
        }
        debug!("scheduler runtime stopped");
    });

    SchedulerHandle {
        cmd_tx,
        events_tx,
        timeout,
    }
}

impl SchedulerHandle {
    /// Receives events for mutations committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.events_tx.subscribe()
    }

    /// See [`Scheduler::enroll`].
    pub async fn enroll(
        &self,
        user: UserId,
        flashcard: FlashcardId,
        now: Timestamp,
    ) -> SchedulerResult<EnrollmentRecord> {
        self.request(|resp| Command::Enroll {
            user,
            flashcard,
            now,
            resp,
        })
        .await?
    }

    /// Not idempotent. A [`SchedulerError::Timeout`] leaves the outcome
    /// unknown; re-read the record before resubmitting.
    pub async fn mark_correct(
        &self,
        user: UserId,
        flashcard: FlashcardId,
        now: Timestamp,
    ) -> SchedulerResult<RecallOutcome> {
        self.review(user, flashcard, Recall::Correct, now).await
    }

    /// Not idempotent; see [`SchedulerHandle::mark_correct`].
    pub async fn mark_incorrect(
        &self,
        user: UserId,
        flashcard: FlashcardId,
        now: Timestamp,
    ) -> SchedulerResult<RecallOutcome> {
        self.review(user, flashcard, Recall::Incorrect, now).await
    }

    /// Applies either recall outcome.
    pub async fn review(
        &self,
        user: UserId,
        flashcard: FlashcardId,
        recall: Recall,
        now: Timestamp,
    ) -> SchedulerResult<RecallOutcome> {
        self.request(|resp| Command::Review {
            user,
            flashcard,
            recall,
            now,
            resp,
        })
        .await?
    }

    /// See [`Scheduler::learnable`].
    pub async fn learnable(&self, user: UserId) -> SchedulerResult<Vec<Flashcard>> {
        self.request(|resp| Command::Learnable { user, resp }).await
    }

    /// See [`Scheduler::due_for_review`].
    pub async fn due_for_review(
        &self,
        user: UserId,
        now: Timestamp,
    ) -> SchedulerResult<Vec<Flashcard>> {
        self.request(|resp| Command::Due { user, now, resp }).await
    }

    /// Current record for the pair.
    pub async fn record(
        &self,
        user: UserId,
        flashcard: FlashcardId,
    ) -> SchedulerResult<EnrollmentRecord> {
        self.request(|resp| Command::Record {
            user,
            flashcard,
            resp,
        })
        .await?
    }

    /// Experience and level for `user`.
    pub async fn progress(&self, user: UserId) -> SchedulerResult<LevelProgress> {
        self.request(|resp| Command::Progress { user, resp }).await
    }

    /// Draws a multiple-choice question from `tier`.
    pub async fn next_question(&self, tier: DifficultyTier) -> SchedulerResult<QuizQuestion> {
        self.request(|resp| Command::NextQuestion { tier, resp })
            .await?
    }

    /// Writes and syncs everything queued so far; returns the durable sequence.
    pub async fn flush(&self) -> SchedulerResult<OpSeq> {
        self.request(|resp| Command::Flush { resp }).await?
    }

    /// Drains the journal queue and stops the runtime.
    pub async fn shutdown(&self) -> SchedulerResult<()> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> SchedulerResult<T> {
        let (tx, rx) = oneshot::channel();
        let exchange = async {
            self.cmd_tx
                .send(make(tx))
                .await
                .map_err(|_| runtime_closed())?;
            rx.await.map_err(|_| runtime_closed())
        };
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| SchedulerError::Timeout)?
    }
}

fn runtime_closed() -> SchedulerError {
    SchedulerError::Unavailable("scheduler runtime closed".to_string())
}

async fn handle_command(
    cmd: Command,
    state: &mut LoopState,
    events_tx: &broadcast::Sender<SchedulerEvent>,
    journal_tx: Option<&mpsc::Sender<JournalMsg>>,
) -> bool {
    match cmd {
        Command::Enroll {
            user,
            flashcard,
            now,
            resp,
        } => {
            let res = reserve_journal_slot(journal_tx).and_then(|permit| {
                let record = state.scheduler.enroll(user, flashcard, now)?;
                commit_pending(state, events_tx, permit);
                let _ = events_tx.send(SchedulerEvent::Enrolled { user, flashcard });
                Ok(record)
            });
            let _ = resp.send(res);
        }
        Command::Review {
            user,
            flashcard,
            recall,
            now,
            resp,
        } => {
            let res = reserve_journal_slot(journal_tx).and_then(|permit| {
                let outcome = state.scheduler.apply_recall(user, flashcard, recall, now)?;
                commit_pending(state, events_tx, permit);
                let _ = events_tx.send(SchedulerEvent::Reviewed {
                    user,
                    flashcard,
                    recall,
                    next_review_at: outcome.record.next_review_at,
                });
                if outcome.experience_granted > 0 {
                    let _ = events_tx.send(SchedulerEvent::ExperienceGranted {
                        user,
                        amount: outcome.experience_granted,
                        total: outcome.experience_total,
                    });
                }
                Ok(outcome)
            });
            let _ = resp.send(res);
        }
        Command::Learnable { user, resp } => {
            let _ = resp.send(state.scheduler.learnable(user));
        }
        Command::Due { user, now, resp } => {
            let _ = resp.send(state.scheduler.due_for_review(user, now));
        }
        Command::Record {
            user,
            flashcard,
            resp,
        } => {
            let _ = resp.send(state.scheduler.record(user, flashcard));
        }
        Command::Progress { user, resp } => {
            let _ = resp.send(state.scheduler.progress(user));
        }
        Command::NextQuestion { tier, resp } => {
            let _ = resp.send(state.sampler.next_question(tier));
        }
        Command::Flush { resp } => {
            let out = match journal_tx {
                Some(tx) => ask_writer(tx, |resp| JournalMsg::Sync { resp }).await,
                None => Ok(state.scheduler.ledger().latest_op_seq()),
            };
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = match journal_tx {
                Some(tx) => ask_writer(tx, |resp| JournalMsg::Close { resp }).await,
                None => Ok(()),
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

/// Claims room for one journal op before the ledger is touched, so a full
/// queue refuses the mutation instead of dropping its op.
fn reserve_journal_slot(
    journal_tx: Option<&mpsc::Sender<JournalMsg>>,
) -> SchedulerResult<Option<JournalPermit<'_>>> {
    let Some(tx) = journal_tx else {
        return Ok(None);
    };
    tx.try_reserve().map(Some).map_err(|err| {
        warn!(error = %err, "journal queue refused mutation");
        SchedulerError::Unavailable(format!("journal queue: {err}"))
    })
}

/// Hands the op queued by the last mutation to the writer.
fn commit_pending(
    state: &mut LoopState,
    events_tx: &broadcast::Sender<SchedulerEvent>,
    permit: Option<JournalPermit<'_>>,
) {
    let mut ops = state.scheduler.drain_pending_ops();
    debug_assert_eq!(ops.len(), 1, "each mutation queues exactly one op");

    match (permit, ops.pop()) {
        (Some(permit), Some(stored)) => permit.send(JournalMsg::Op(stored)),
        (Some(_), None) => {}
        (None, _) => {
            let _ = events_tx.send(SchedulerEvent::DurableUpTo {
                op_seq: state.scheduler.ledger().latest_op_seq(),
            });
        }
    }
}

async fn ask_writer<T>(
    tx: &mpsc::Sender<JournalMsg>,
    make: impl FnOnce(oneshot::Sender<PersistResult<T>>) -> JournalMsg,
) -> SchedulerResult<T> {
    let (reply_tx, reply_rx) = oneshot::channel();
    tx.send(make(reply_tx)).await.map_err(|_| runtime_closed())?;
    reply_rx
        .await
        .map_err(|_| runtime_closed())?
        .map_err(SchedulerError::from)
}

/// Owns the sink and writes queued ops in sequence order.
///
/// Ops arrive in the order the scheduler committed them, and a record's
/// reviews each carry the version they were computed from, so writing the
/// queue front to back keeps every card's history in order on disk.
struct JournalWriter {
    sink: Option<Box<dyn OpSink>>,
    pending: Vec<StoredOp>,
    durable: OpSeq,
    durable_tx: mpsc::UnboundedSender<PersistResult<OpSeq>>,
}

impl JournalWriter {
    async fn run(mut self, mut rx: mpsc::Receiver<JournalMsg>, durability: Durability) {
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(JournalMsg::Op(stored)) => {
                        self.pending.push(stored);
                        match durability {
                            Durability::EveryOp => {
                                let _ = self.write(true).await;
                            }
                            Durability::Batched { max_ops, max_latency_ms } => {
                                if self.pending.len() >= max_ops.max(1) {
                                    let _ = self.write(true).await;
                                    deadline = None;
                                } else if deadline.is_none() {
                                    deadline = Some(Instant::now() + Duration::from_millis(max_latency_ms));
                                }
                            }
                        }
                    }
                    Some(JournalMsg::Sync { resp }) => {
                        let _ = resp.send(self.write(true).await);
                        deadline = None;
                    }
                    Some(JournalMsg::Close { resp }) => {
                        let _ = resp.send(self.write(true).await.map(|_| ()));
                        break;
                    }
                    None => {
                        let _ = self.write(true).await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let _ = self.write(false).await;
                    deadline = None;
                }
            }
        }
        debug!(durable = self.durable, "journal writer stopped");
    }

    /// Appends everything pending in one call, optionally syncing after.
    async fn write(&mut self, sync: bool) -> PersistResult<OpSeq> {
        let Some(mut sink) = self.sink.take() else {
            return Err(PersistError::Message("journal sink lost".to_string()));
        };
        let ops = std::mem::take(&mut self.pending);

        let (sink, res) = tokio::task::spawn_blocking(move || {
            let res = append_then_sync(sink.as_mut(), &ops, sync);
            (sink, res)
        })
        .await
        .map_err(|e| PersistError::Message(format!("journal write aborted: {e}")))?;
        self.sink = Some(sink);

        match res {
            Ok(seq) => {
                self.durable = self.durable.max(seq);
                let _ = self.durable_tx.send(Ok(self.durable));
                Ok(self.durable)
            }
            Err(err) => {
                let _ = self
                    .durable_tx
                    .send(Err(PersistError::Message(err.to_string())));
                Err(err)
            }
        }
    }
}

fn append_then_sync(sink: &mut dyn OpSink, ops: &[StoredOp], sync: bool) -> PersistResult<OpSeq> {
    let seq = if ops.is_empty() { 0 } else { sink.append_ops(ops)? };
    if sync {
        sink.flush()?;
    }
    Ok(seq)
}
