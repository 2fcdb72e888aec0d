//! Integration tests for the model lifecycle: create, partial save, forced
//! save, delete, batch save and comments

use airtable_kit::orm::{
    CheckboxField, CreatedTimeField, FieldSpec, LinkField, Model, ModelMeta, OrmError,
    RecordState, RequiredTextField, SaveOptions, TextField,
};
use airtable_kit::client::Method;
use airtable_kit::testing::MockTransport;
use airtable_kit::{Api, ApiConfig};
use serde_json::json;
use std::sync::Arc;

struct Project {
    state: RecordState,
}

impl Project {
    const NAME: TextField = TextField::new("name", "Name");
}

impl Model for Project {
    const FIELDS: &'static [&'static dyn FieldSpec] = &[&Project::NAME];

    fn meta() -> ModelMeta {
        ModelMeta::new("appWork", "Projects")
    }
    fn state(&self) -> &RecordState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }
    fn from_state(state: RecordState) -> Self {
        Self { state }
    }
}

struct Task {
    state: RecordState,
}

impl Task {
    const NAME: RequiredTextField = RequiredTextField::new("name", "Name");
    const NOTES: TextField = TextField::new("notes", "Notes");
    const DONE: CheckboxField = CheckboxField::new("done", "Done");
    const PROJECT: LinkField<Project> = LinkField::new("project", "Project").lazy();
    const CREATED: CreatedTimeField = CreatedTimeField::new("created", "Created");
}

impl Model for Task {
    const FIELDS: &'static [&'static dyn FieldSpec] = &[
        &Task::NAME,
        &Task::NOTES,
        &Task::DONE,
        &Task::PROJECT,
        &Task::CREATED,
    ];

    fn meta() -> ModelMeta {
        ModelMeta::new("appWork", "Tasks").with_typecast(false)
    }
    fn state(&self) -> &RecordState {
        &self.state
    }
    fn state_mut(&mut self) -> &mut RecordState {
        &mut self.state
    }
    fn from_state(state: RecordState) -> Self {
        Self { state }
    }
}

fn api(mock: &Arc<MockTransport>) -> Api {
    Api::with_transport(mock.clone(), ApiConfig::default().with_requests_per_second(0)).unwrap()
}

fn stored_task() -> serde_json::Value {
    json!({
        "id": "recT1",
        "createdTime": "2024-01-01T00:00:00.000Z",
        "fields": {
            "Name": "Ship it",
            "Notes": "before friday",
            "Done": true,
            "Project": ["recP1"],
            "Created": "2024-01-01T00:00:00.000Z"
        }
    })
}

#[tokio::test]
async fn test_create_then_noop_save() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(
        200,
        json!({"id": "recNew", "createdTime": "2024-02-01T10:00:00.000Z", "fields": {"Name": "Draft"}}),
    );
    let api = api(&mock);

    let mut task = Task::new();
    Task::NAME.set(&mut task, "Draft").unwrap();
    let result = task.save(&api).await.unwrap();
    assert!(result.created);
    assert_eq!(result.record_id, "recNew");
    assert_eq!(task.id(), "recNew");
    assert!(task.created_time().is_some());
    assert!(!task.is_dirty());

    let request = mock.last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(
        request.body.unwrap(),
        json!({"fields": {"Name": "Draft"}, "typecast": false})
    );

    let again = task.save(&api).await.unwrap();
    assert!(again.is_noop());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_fetched_record_without_changes_makes_no_call() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, stored_task());
    let api = api(&mock);

    let mut task = Task::from_id(&api, "recT1").await.unwrap();
    assert!(!Task::PROJECT.is_resolved(&task));
    let result = task.save(&api).await.unwrap();
    assert!(result.is_noop());
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_save_sends_only_changed_fields() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, stored_task());
    mock.push_json(200, stored_task());
    let api = api(&mock);

    let mut task = Task::from_id(&api, "recT1").await.unwrap();
    Task::NOTES.set(&mut task, "after friday").unwrap();
    let result = task.save(&api).await.unwrap();
    assert_eq!(result.field_names.len(), 1);
    assert!(result.field_names.contains("Notes"));

    let request = mock.last_request().unwrap();
    assert_eq!(request.method, Method::Patch);
    assert!(request.url.ends_with("/appWork/Tasks/recT1"));
    assert_eq!(request.body.unwrap()["fields"], json!({"Notes": "after friday"}));
    assert!(!task.is_dirty());
}

#[tokio::test]
async fn test_forced_save_sends_every_writable_field() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, stored_task());
    mock.push_json(200, stored_task());
    let api = api(&mock);

    let mut task = Task::from_id(&api, "recT1").await.unwrap();
    let result = task.save_with(&api, SaveOptions::force()).await.unwrap();
    assert!(result.forced);

    let fields = mock.last_request().unwrap().body.unwrap()["fields"].clone();
    assert_eq!(
        fields,
        json!({
            "Name": "Ship it",
            "Notes": "before friday",
            "Done": true,
            "Project": ["recP1"]
        })
    );
}

#[tokio::test]
async fn test_cleared_field_is_sent_as_null() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, stored_task());
    mock.push_json(200, stored_task());
    let api = api(&mock);

    let mut task = Task::from_id(&api, "recT1").await.unwrap();
    Task::NOTES.clear(&mut task).unwrap();
    assert_eq!(Task::NOTES.get(&task), "");
    task.save(&api).await.unwrap();
    assert_eq!(
        mock.last_request().unwrap().body.unwrap()["fields"],
        json!({"Notes": null})
    );
}

#[tokio::test]
async fn test_unsaved_link_blocks_save() {
    let mock = Arc::new(MockTransport::new());
    let api = api(&mock);

    let mut task = Task::new();
    Task::NAME.set(&mut task, "Linked").unwrap();
    Task::PROJECT.set(&mut task, &[Project::new()]).unwrap();
    let err = task.save(&api).await.unwrap_err();
    assert!(matches!(err, OrmError::UnsavedLink { ref field } if field == "Project"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_linking_saved_record_sends_its_id() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"id": "recT9", "fields": {}}));
    let api = api(&mock);

    let project = Project::with_id("recP7");
    let mut task = Task::new();
    Task::NAME.set(&mut task, "Linked").unwrap();
    Task::PROJECT.push(&mut task, &project).unwrap();
    task.save(&api).await.unwrap();
    assert_eq!(
        mock.last_request().unwrap().body.unwrap()["fields"]["Project"],
        json!(["recP7"])
    );
}

#[tokio::test]
async fn test_link_picks_up_id_when_target_is_saved_later() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"id": "recP8", "fields": {"Name": "Launch"}}));
    mock.push_json(200, json!({"id": "recT8", "fields": {}}));
    let api = api(&mock);

    let mut project = Project::new();
    Project::NAME.set(&mut project, "Launch").unwrap();
    let mut task = Task::new();
    Task::NAME.set(&mut task, "Plan").unwrap();
    Task::PROJECT.set(&mut task, std::slice::from_ref(&project)).unwrap();

    project.save(&api).await.unwrap();
    assert_eq!(Task::PROJECT.ids(&task), vec!["recP8".to_string()]);

    task.save(&api).await.unwrap();
    assert_eq!(mock.call_count(), 2);
    assert_eq!(
        mock.last_request().unwrap().body.unwrap()["fields"]["Project"],
        json!(["recP8"])
    );
}

#[tokio::test]
async fn test_deleted_instance_rejects_further_operations() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, stored_task());
    mock.push_json(200, json!({"id": "recT1", "deleted": true}));
    let api = api(&mock);

    let mut task = Task::from_id(&api, "recT1").await.unwrap();
    assert!(task.delete(&api).await.unwrap());
    assert!(task.is_deleted());

    assert!(matches!(
        task.delete(&api).await,
        Err(OrmError::Deleted { ref id }) if id == "recT1"
    ));
    assert!(matches!(task.save(&api).await, Err(OrmError::Deleted { .. })));
    assert!(matches!(task.fetch(&api).await, Err(OrmError::Deleted { .. })));
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_batch_save_creates_and_updates() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(
        200,
        json!({"records": [
            {"id": "recA", "createdTime": "2024-03-01T00:00:00.000Z", "fields": {"Name": "A"}},
            {"id": "recB", "createdTime": "2024-03-01T00:00:00.000Z", "fields": {"Name": "B"}}
        ]}),
    );
    mock.push_json(200, json!({"records": [stored_task()]}));
    let api = api(&mock);

    let mut first = Task::new();
    Task::NAME.set(&mut first, "A").unwrap();
    let mut existing = Task::from_record(serde_json::from_value(stored_task()).unwrap()).unwrap();
    Task::DONE.set(&mut existing, false).unwrap();
    let mut second = Task::new();
    Task::NAME.set(&mut second, "B").unwrap();
    let mut tasks = vec![first, existing, second];

    Task::batch_save(&api, &mut tasks).await.unwrap();
    assert_eq!(tasks[0].id(), "recA");
    assert_eq!(tasks[1].id(), "recT1");
    assert_eq!(tasks[2].id(), "recB");
    assert!(tasks.iter().all(|task| !task.is_dirty()));

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(
        requests[0].body.as_ref().unwrap()["records"],
        json!([{"fields": {"Name": "A"}}, {"fields": {"Name": "B"}}])
    );
    assert_eq!(requests[1].method, Method::Patch);
    let update = &requests[1].body.as_ref().unwrap()["records"][0];
    assert_eq!(update["id"], json!("recT1"));
    assert_eq!(update["fields"]["Done"], json!(false));
    assert_eq!(update["fields"]["Name"], json!("Ship it"));
}

#[tokio::test]
async fn test_lazy_link_resolves_on_request() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, stored_task());
    mock.push_json(200, json!({"records": [{"id": "recP1", "fields": {"Name": "Launch"}}]}));
    let api = api(&mock);

    let mut task = Task::from_id(&api, "recT1").await.unwrap();
    assert_eq!(mock.call_count(), 1);
    let placeholder = Task::PROJECT.get(&task);
    assert_eq!(placeholder[0].id(), "recP1");
    assert_eq!(Project::NAME.get(&placeholder[0]), "");

    Task::PROJECT.resolve(&api, &mut task).await.unwrap();
    assert_eq!(mock.call_count(), 2);
    assert_eq!(Project::NAME.get(&Task::PROJECT.get(&task)[0]), "Launch");
    assert!(!task.is_dirty());
}

#[tokio::test]
async fn test_comments_on_saved_record() {
    let mock = Arc::new(MockTransport::new());
    mock.push_json(
        200,
        json!({"comments": [{
            "id": "com1",
            "text": "Looks good",
            "createdTime": "2024-01-02T00:00:00.000Z",
            "author": {"id": "usr1", "email": "a@example.com"}
        }]}),
    );
    mock.push_json(
        200,
        json!({
            "id": "com2",
            "text": "Thanks",
            "createdTime": "2024-01-03T00:00:00.000Z",
            "author": {"id": "usr2"}
        }),
    );
    let api = api(&mock);
    let task = Task::with_id("recT1");

    let comments = task.comments(&api).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].author.email.as_deref(), Some("a@example.com"));
    assert!(mock.requests()[0].url.ends_with("/recT1/comments"));

    let added = task.add_comment(&api, "Thanks").await.unwrap();
    assert_eq!(added.id, "com2");
    assert_eq!(mock.last_request().unwrap().body.unwrap(), json!({"text": "Thanks"}));

    let unsaved = Task::new();
    assert!(matches!(
        unsaved.comments(&api).await,
        Err(OrmError::Unsaved { .. })
    ));
    assert_eq!(mock.call_count(), 2);
}
