//! Integration tests for stage progression and rule automation.
//!
//! These tests verify the end-to-end flow:
//! 1. A user command changes an entry's stage through the transition manager
//! 2. The `lead.stage_changed` event is published on the in-memory bus
//! 3. The stage-change bridge turns it into a trigger event for the dispatcher
//! 4. Matching rules run their actions and land in the execution ledger
//! 5. Automation moves publish further events, bounded by the cascade limit
//!
//! Uses in-memory adapters so no external systems are needed.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use lead_pipeline::adapters::{
    InMemoryAppointmentBook, InMemoryAutomationRuleRepository, InMemoryEventBus,
    InMemoryExecutionLedger, InMemoryLeadEntryRepository, InMemoryLeadFields,
    InMemoryNotificationSink, InMemoryPipelineCatalog, YamlRuleFile,
};
use lead_pipeline::application::{
    ActionExecutor, AdvanceStageCommand, ArchiveEntryCommand, AutomationDispatcher,
    AutomationRuleStore, AutomationScheduler, AutomationSchedulerConfig, EnrollLeadCommand,
    SetChecklistItemCommand, StageChangeTriggerBridge, StageTransitionManager,
    STAGE_CHANGED_EVENT,
};
use lead_pipeline::domain::automation::{
    Action, Condition, ContextValue, ExecutionStatus, NotificationPriority, RuleDefinition,
    StepOutcome, Trigger, TriggerType,
};
use lead_pipeline::domain::foundation::{
    AppointmentId, CommandMetadata, DomainError, EntryId, ErrorCode, LeadId, PipelineId,
    Timestamp, UserId,
};
use lead_pipeline::domain::pipeline::{
    ChecklistItem, LeadPipelineEntry, LeadStageChanged, Pipeline, PipelineError, PipelineStage,
    TransitionKind,
};
use lead_pipeline::ports::{
    AppointmentRequest, AppointmentScheduler, AutomationRuleRepository, EventSubscriber,
    LeadEntryRepository,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Calendar that rejects every booking.
struct UnavailableCalendar {
    calls: AtomicUsize,
}

impl UnavailableCalendar {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AppointmentScheduler for UnavailableCalendar {
    async fn create_appointment(
        &self,
        _request: AppointmentRequest,
    ) -> Result<AppointmentId, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DomainError::new(
            ErrorCode::ActionFailed,
            "calendar rejected the booking",
        ))
    }
}

/// Calendar that takes `slow` to book appointments titled "Slow" and
/// `fast` for everything else.
struct LaggingCalendar {
    fast: Duration,
    slow: Duration,
    booked: AtomicUsize,
}

#[async_trait]
impl AppointmentScheduler for LaggingCalendar {
    async fn create_appointment(
        &self,
        request: AppointmentRequest,
    ) -> Result<AppointmentId, DomainError> {
        let delay = if request.title == "Slow" { self.slow } else { self.fast };
        tokio::time::sleep(delay).await;
        self.booked.fetch_add(1, Ordering::SeqCst);
        Ok(AppointmentId::new())
    }
}

/// Fully wired engine over in-memory adapters.
struct World {
    pipeline: Pipeline,
    catalog: Arc<InMemoryPipelineCatalog>,
    entries: Arc<InMemoryLeadEntryRepository>,
    bus: Arc<InMemoryEventBus>,
    transitions: Arc<StageTransitionManager>,
    dispatcher: Arc<AutomationDispatcher>,
    rules: AutomationRuleStore,
    fields: Arc<InMemoryLeadFields>,
    book: Arc<InMemoryAppointmentBook>,
    sink: Arc<InMemoryNotificationSink>,
    ledger: Arc<InMemoryExecutionLedger>,
}

impl World {
    async fn new() -> Self {
        Self::build(None, Arc::new(InMemoryAutomationRuleRepository::new()), None).await
    }

    async fn build(
        calendar: Option<Arc<dyn AppointmentScheduler>>,
        rule_repository: Arc<dyn AutomationRuleRepository>,
        execution_timeout: Option<Duration>,
    ) -> Self {
        let id = PipelineId::new();
        let pipeline = Pipeline::new(
            id,
            "Sales",
            vec![
                PipelineStage::new(id, "New", 1).with_sla_days(5),
                PipelineStage::new(id, "Qualified", 2)
                    .with_exit_criteria("Decision maker identified"),
                PipelineStage::new(id, "Proposal", 3),
                PipelineStage::new(id, "Won", 4),
            ],
        )
        .unwrap();

        let catalog = Arc::new(InMemoryPipelineCatalog::new());
        catalog.add_pipeline(pipeline.clone()).await;
        let entries = Arc::new(InMemoryLeadEntryRepository::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let transitions = Arc::new(StageTransitionManager::new(
            catalog.clone(),
            entries.clone(),
            bus.clone(),
        ));

        let fields = Arc::new(InMemoryLeadFields::new());
        let book = Arc::new(InMemoryAppointmentBook::new());
        let sink = Arc::new(InMemoryNotificationSink::new());
        let ledger = Arc::new(InMemoryExecutionLedger::new());
        let appointments = calendar.unwrap_or_else(|| book.clone() as Arc<dyn AppointmentScheduler>);

        let executor = Arc::new(
            ActionExecutor::new(
                transitions.clone(),
                entries.clone(),
                catalog.clone(),
                fields.clone(),
                appointments,
                sink.clone(),
                ledger.clone(),
            )
            .with_execution_timeout(execution_timeout),
        );
        let dispatcher = Arc::new(AutomationDispatcher::new(rule_repository.clone(), executor));
        bus.subscribe(
            STAGE_CHANGED_EVENT,
            Arc::new(StageChangeTriggerBridge::new(dispatcher.clone())),
        );

        Self {
            pipeline,
            catalog,
            entries,
            bus,
            transitions,
            dispatcher,
            rules: AutomationRuleStore::new(rule_repository),
            fields,
            book,
            sink,
            ledger,
        }
    }

    fn stage(&self, name: &str) -> &PipelineStage {
        self.pipeline
            .stages()
            .iter()
            .find(|s| s.name == name)
            .unwrap()
    }

    async fn enroll(&self) -> (EntryId, LeadId) {
        let lead_id = LeadId::new();
        let result = self
            .transitions
            .enroll(
                EnrollLeadCommand {
                    lead_id,
                    pipeline_id: *self.pipeline.id(),
                },
                rep(),
            )
            .await
            .unwrap();
        (*result.entry.id(), lead_id)
    }

    async fn advance(
        &self,
        entry_id: EntryId,
        to: &str,
        acknowledged: bool,
    ) -> Result<(), PipelineError> {
        self.transitions
            .advance(
                AdvanceStageCommand {
                    entry_id,
                    target_stage_id: self.stage(to).id,
                    criteria_acknowledged: acknowledged,
                    expected_version: None,
                },
                rep(),
            )
            .await
            .map(|_| ())
    }

    async fn current_stage_name(&self, entry_id: EntryId) -> String {
        let entry = self.find_entry(entry_id).await;
        let stage_id = entry.current_stage_id().copied().unwrap();
        self.pipeline.stage(&stage_id).unwrap().name.clone()
    }

    async fn find_entry(&self, entry_id: EntryId) -> LeadPipelineEntry {
        self.entries.find_by_id(&entry_id).await.unwrap().unwrap()
    }

    fn stage_changes(&self) -> Vec<LeadStageChanged> {
        self.bus
            .events_of_type(STAGE_CHANGED_EVENT)
            .iter()
            .map(|e| e.payload_as::<LeadStageChanged>().unwrap())
            .collect()
    }
}

fn rep() -> CommandMetadata {
    CommandMetadata::new(UserId::new("rep-1").unwrap())
}

fn entering(stage: &str) -> Trigger {
    Trigger::new(TriggerType::StageChange)
        .with_condition("to_stage", Condition::Equals(ContextValue::from(stage)))
}

// =============================================================================
// Stage-change automation
// =============================================================================

#[tokio::test]
async fn stage_change_rule_fires_after_user_advance() {
    let world = World::new().await;
    world
        .rules
        .create(RuleDefinition::new(
            "Book intro call",
            entering("Qualified"),
            vec![
                Action::CreateAppointment {
                    title: Some("Intro call".into()),
                    start_at: None,
                    offset_hours: Some(24),
                    duration_minutes: Some(30),
                },
                Action::SendNotification {
                    priority: NotificationPriority::High,
                    title: "Lead qualified".into(),
                    message: "Prepare the intro call".into(),
                },
            ],
        ))
        .await
        .unwrap();
    let (entry_id, lead_id) = world.enroll().await;

    world.advance(entry_id, "Qualified", false).await.unwrap();

    let appointments = world.book.appointments().await;
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].1.lead_id, lead_id);
    assert_eq!(appointments[0].1.title, "Intro call");
    assert_eq!(
        appointments[0]
            .1
            .end_at
            .duration_since(&appointments[0].1.start_at)
            .num_minutes(),
        30
    );
    assert_eq!(world.sink.sent().await.len(), 1);

    let executions = world.ledger.all().await;
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status(), ExecutionStatus::Completed);
    assert_eq!(executions[0].entry_id(), Some(&entry_id));
}

#[tokio::test]
async fn rule_for_other_stage_does_not_fire() {
    let world = World::new().await;
    world
        .rules
        .create(RuleDefinition::new(
            "Celebrate",
            entering("Won"),
            vec![Action::UpdateField {
                field: "status".into(),
                value: ContextValue::from("customer"),
            }],
        ))
        .await
        .unwrap();
    let (entry_id, lead_id) = world.enroll().await;

    world.advance(entry_id, "Qualified", false).await.unwrap();

    assert!(world.ledger.all().await.is_empty());
    assert!(world.fields.field(&lead_id, "status").await.is_none());
}

#[tokio::test]
async fn failing_action_skips_the_rest_and_keeps_earlier_effects() {
    let calendar = Arc::new(UnavailableCalendar::new());
    let world = World::build(
        Some(calendar.clone()),
        Arc::new(InMemoryAutomationRuleRepository::new()),
        None,
    )
    .await;
    world
        .rules
        .create(RuleDefinition::new(
            "Qualified follow-up",
            entering("Qualified"),
            vec![
                Action::UpdateField {
                    field: "status".into(),
                    value: ContextValue::from("qualified"),
                },
                Action::CreateAppointment {
                    title: None,
                    start_at: None,
                    offset_hours: None,
                    duration_minutes: None,
                },
                Action::SendNotification {
                    priority: NotificationPriority::Normal,
                    title: "Follow up".into(),
                    message: "Call booked".into(),
                },
            ],
        ))
        .await
        .unwrap();
    let (entry_id, lead_id) = world.enroll().await;

    // The user move still succeeds; rule failures never surface here
    world.advance(entry_id, "Qualified", false).await.unwrap();

    assert_eq!(
        world.fields.field(&lead_id, "status").await,
        Some(ContextValue::from("qualified"))
    );
    assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);
    assert!(world.sink.sent().await.is_empty());

    let executions = world.ledger.all().await;
    assert_eq!(executions.len(), 1);
    let execution = &executions[0];
    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert!(execution.error().is_some());
    let outcomes: Vec<StepOutcome> = execution.steps().iter().map(|s| s.outcome).collect();
    assert_eq!(
        outcomes,
        vec![StepOutcome::Succeeded, StepOutcome::Failed, StepOutcome::Skipped]
    );
    assert_eq!(world.current_stage_name(entry_id).await, "Qualified");
}

#[tokio::test]
async fn automation_move_fires_follow_on_rules() {
    let world = World::new().await;
    let proposal = world.stage("Proposal").id;
    world
        .rules
        .create(RuleDefinition::new(
            "Fast track",
            entering("Qualified"),
            vec![Action::MoveStage { stage_id: proposal }],
        ))
        .await
        .unwrap();
    world
        .rules
        .create(RuleDefinition::new(
            "Proposal owner",
            entering("Proposal"),
            vec![Action::AssignUser {
                user_id: UserId::new("closer-7").unwrap(),
            }],
        ))
        .await
        .unwrap();
    let (entry_id, lead_id) = world.enroll().await;

    world.advance(entry_id, "Qualified", false).await.unwrap();

    assert_eq!(world.current_stage_name(entry_id).await, "Proposal");
    assert_eq!(
        world.fields.assignee(&lead_id).await,
        Some(UserId::new("closer-7").unwrap())
    );

    let changes = world.stage_changes();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].cascade_depth, 0);
    assert_eq!(changes[1].cascade_depth, 1);
    assert_eq!(changes[1].kind, TransitionKind::AutomationMove);
    assert!(changes[1].origin.is_automation());
}

#[tokio::test]
async fn rule_loop_stops_at_cascade_limit() {
    let world = World::new().await;
    let qualified = world.stage("Qualified").id;
    let proposal = world.stage("Proposal").id;
    world
        .rules
        .create(RuleDefinition::new(
            "Forward",
            entering("Qualified"),
            vec![Action::MoveStage { stage_id: proposal }],
        ))
        .await
        .unwrap();
    world
        .rules
        .create(RuleDefinition::new(
            "Back",
            entering("Proposal"),
            vec![Action::MoveStage { stage_id: qualified }],
        ))
        .await
        .unwrap();
    let (entry_id, _) = world.enroll().await;

    world.advance(entry_id, "Qualified", false).await.unwrap();

    // depth 0 user move, then automation moves at depths 1..=4; the event
    // at depth 4 exceeds the limit of 3 and triggers nothing
    let depths: Vec<u32> = world.stage_changes().iter().map(|c| c.cascade_depth).collect();
    assert_eq!(depths, vec![0, 1, 2, 3, 4]);
    assert_eq!(world.dispatcher.max_cascade_depth(), 3);
    assert_eq!(world.ledger.all().await.len(), 4);
    assert!(world
        .ledger
        .all()
        .await
        .iter()
        .all(|e| e.status() == ExecutionStatus::Completed));
    assert_eq!(world.current_stage_name(entry_id).await, "Qualified");
}

#[tokio::test]
async fn timeout_in_follow_on_rule_leaves_every_execution_finished() {
    let calendar = Arc::new(LaggingCalendar {
        fast: Duration::from_millis(10),
        slow: Duration::from_millis(500),
        booked: AtomicUsize::new(0),
    });
    let world = World::build(
        Some(calendar.clone()),
        Arc::new(InMemoryAutomationRuleRepository::new()),
        Some(Duration::from_millis(100)),
    )
    .await;
    let proposal = world.stage("Proposal").id;
    world
        .rules
        .create(RuleDefinition::new(
            "Prep and forward",
            entering("Qualified"),
            vec![
                Action::CreateAppointment {
                    title: Some("Prep".into()),
                    start_at: None,
                    offset_hours: None,
                    duration_minutes: None,
                },
                Action::MoveStage { stage_id: proposal },
            ],
        ))
        .await
        .unwrap();
    world
        .rules
        .create(RuleDefinition::new(
            "Book proposal review",
            entering("Proposal"),
            vec![Action::CreateAppointment {
                title: Some("Slow".into()),
                start_at: None,
                offset_hours: None,
                duration_minutes: None,
            }],
        ))
        .await
        .unwrap();
    let (entry_id, _) = world.enroll().await;

    world.advance(entry_id, "Qualified", false).await.unwrap();

    assert_eq!(world.current_stage_name(entry_id).await, "Proposal");
    assert_eq!(calendar.booked.load(Ordering::SeqCst), 1);

    let executions = world.ledger.all().await;
    assert_eq!(executions.len(), 2);
    assert!(executions.iter().all(|e| e.is_finished()));

    let forward = executions
        .iter()
        .find(|e| e.rule_name() == "Prep and forward")
        .unwrap();
    assert_eq!(forward.status(), ExecutionStatus::Completed);
    let outcomes: Vec<StepOutcome> = forward.steps().iter().map(|s| s.outcome).collect();
    assert_eq!(outcomes, vec![StepOutcome::Succeeded, StepOutcome::Succeeded]);

    let review = executions
        .iter()
        .find(|e| e.rule_name() == "Book proposal review")
        .unwrap();
    assert_eq!(review.status(), ExecutionStatus::Failed);
    assert_eq!(review.steps().len(), 1);
    assert_eq!(review.steps()[0].outcome, StepOutcome::Failed);
    assert!(review.error().unwrap().contains("timed out"));
}

// =============================================================================
// Gating and lifecycle
// =============================================================================

#[tokio::test]
async fn checklist_gate_blocks_until_required_items_are_checked() {
    let world = World::new().await;
    let new_stage = world.stage("New").id;
    let budget = ChecklistItem::required(new_stage, "Budget confirmed", 1);
    let notes = ChecklistItem::optional(new_stage, "Notes captured", 2);
    world.catalog.add_checklist_item(budget.clone()).await;
    world.catalog.add_checklist_item(notes).await;
    let (entry_id, _) = world.enroll().await;

    let blocked = world.advance(entry_id, "Qualified", false).await;
    assert_eq!(
        blocked,
        Err(PipelineError::ChecklistIncomplete {
            missing_titles: vec!["Budget confirmed".into()],
            criteria_pending: false,
        })
    );
    assert!(world.stage_changes().is_empty());

    world
        .transitions
        .set_checklist_item(
            SetChecklistItemCommand {
                entry_id,
                item_id: budget.id,
                checked: true,
            },
            rep(),
        )
        .await
        .unwrap();
    world.advance(entry_id, "Qualified", false).await.unwrap();

    assert_eq!(world.current_stage_name(entry_id).await, "Qualified");
    assert!(world.find_entry(entry_id).await.is_item_checked(&budget.id));
}

#[tokio::test]
async fn exit_criteria_need_acknowledgement() {
    let world = World::new().await;
    let (entry_id, _) = world.enroll().await;
    world.advance(entry_id, "Qualified", false).await.unwrap();

    let blocked = world.advance(entry_id, "Proposal", false).await;
    assert!(matches!(
        blocked,
        Err(PipelineError::ChecklistIncomplete {
            criteria_pending: true,
            ..
        })
    ));

    world.advance(entry_id, "Proposal", true).await.unwrap();
    assert_eq!(world.current_stage_name(entry_id).await, "Proposal");
}

#[tokio::test]
async fn archiving_twice_publishes_once() {
    let world = World::new().await;
    let (entry_id, _) = world.enroll().await;
    let archive = || ArchiveEntryCommand {
        entry_id,
        reason: "Lost to competitor".into(),
    };

    let first = world.transitions.archive(archive(), rep()).await.unwrap();
    let second = world.transitions.archive(archive(), rep()).await.unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert!(second.event.is_none());
    assert_eq!(world.bus.events_of_type("lead.archived").len(), 1);

    let moved = world.advance(entry_id, "Qualified", false).await;
    assert!(moved.is_err());
}

// =============================================================================
// Scheduled triggers
// =============================================================================

#[tokio::test]
async fn scheduler_raises_time_elapsed_once_per_day_count() {
    let world = World::new().await;
    world
        .rules
        .create(RuleDefinition::new(
            "Stale lead nudge",
            Trigger::new(TriggerType::TimeElapsed)
                .with_condition("days_in_stage", Condition::GreaterThan(ContextValue::from(2i64))),
            vec![Action::SendNotification {
                priority: NotificationPriority::Urgent,
                title: "Lead is stalling".into(),
                message: "No movement for a few days".into(),
            }],
        ))
        .await
        .unwrap();
    world.enroll().await;
    let scheduler = AutomationScheduler::new(
        world.entries.clone(),
        world.catalog.clone(),
        world.transitions.clone(),
        world.dispatcher.clone(),
        AutomationSchedulerConfig::default().with_refresh_health(false),
    );
    let later = Timestamp::now().plus_days(3);

    let first = scheduler.tick(later).await.unwrap();
    let repeat = scheduler.tick(later).await.unwrap();

    assert_eq!(first.time_elapsed, 1);
    assert_eq!(first.executions.len(), 1);
    assert_eq!(repeat.time_elapsed, 0);
    assert_eq!(world.sink.sent().await.len(), 1);
    assert_eq!(world.sink.sent().await[0].priority, NotificationPriority::Urgent);
}

// =============================================================================
// Rule persistence
// =============================================================================

#[tokio::test]
async fn rules_survive_reopening_the_rule_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.yaml");

    let created = {
        let file = Arc::new(YamlRuleFile::open(&path).await.unwrap());
        let store = AutomationRuleStore::new(file);
        store
            .create(
                RuleDefinition::new(
                    "Book intro call",
                    entering("Qualified"),
                    vec![Action::CreateAppointment {
                        title: None,
                        start_at: None,
                        offset_hours: Some(48),
                        duration_minutes: None,
                    }],
                )
                .with_priority(10),
            )
            .await
            .unwrap()
    };

    let reopened = YamlRuleFile::open(&path).await.unwrap();
    let rules = reopened.load_all().await.unwrap();

    assert_eq!(rules, vec![created]);
}

#[tokio::test]
async fn rules_from_file_drive_the_engine() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.yaml");
    let file = Arc::new(YamlRuleFile::open(&path).await.unwrap());
    let world = World::build(None, file, None).await;
    world
        .rules
        .import_yaml(
            r#"
rules:
  - name: Mark qualified
    trigger:
      type: stage_change
      conditions:
        to_stage: Qualified
    actions:
      - type: update_field
        field: status
        value: qualified
"#,
        )
        .await
        .unwrap();
    let (entry_id, lead_id) = world.enroll().await;

    world.advance(entry_id, "Qualified", false).await.unwrap();

    assert_eq!(
        world.fields.field(&lead_id, "status").await,
        Some(ContextValue::from("qualified"))
    );
    assert!(tokio::fs::read_to_string(&path)
        .await
        .unwrap()
        .contains("Mark qualified"));
}
