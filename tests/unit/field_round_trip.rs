//! Round-trip law for field conversions and descriptor behaviour

use airtable_kit::orm::fields::{
    Currency, Date, Datetime, DurationKind, FieldKind, Integer, Percent, Text,
};
use airtable_kit::orm::{
    CheckboxField, CreatedTimeField, CurrencyField, DateField, DatetimeField, FieldSpec,
    IntegerField, Model, ModelMeta, OrmError, RatingField, RecordState, RequiredTextField,
    TextField,
};
use airtable_kit::RecordDict;
use chrono::{NaiveDate, SubsecRound, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

struct Sample {
    state: RecordState,
}

impl Sample {
    const NAME: RequiredTextField = RequiredTextField::new("name", "Name");
    const NOTES: TextField = TextField::new("notes", "Notes");
    const DONE: CheckboxField = CheckboxField::new("done", "Done");
    const DUE: DateField = DateField::new("due", "Due");
    const COUNT: IntegerField = IntegerField::new("count", "Count");
    const RAW: IntegerField = IntegerField::new("raw", "Raw").unvalidated();
    const STARS: RatingField = RatingField::new("stars", "Stars");
    const CREATED: CreatedTimeField = CreatedTimeField::new("created", "Created");
    const AMOUNT: CurrencyField = CurrencyField::new("amount", "Amount");
    const AT: DatetimeField = DatetimeField::new("at", "At");
    const LABEL: RequiredTextField = RequiredTextField::new("label", "Label").unvalidated();
}

impl Model for Sample {
    const FIELDS: &'static [&'static dyn FieldSpec] = &[
        &Sample::NAME,
        &Sample::NOTES,
        &Sample::DONE,
        &Sample::DUE,
        &Sample::COUNT,
        &Sample::RAW,
        &Sample::STARS,
        &Sample::CREATED,
        &Sample::AMOUNT,
        &Sample::AT,
        &Sample::LABEL,
    ];

    fn meta() -> ModelMeta {
        ModelMeta::new("appSample", "Samples")
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

fn internal_round_trip<K: FieldKind>(values: Vec<K::Value>) {
    for value in values {
        let wire = K::to_record_value(&value);
        assert_eq!(K::to_internal_value(&wire).unwrap(), value, "{}", K::TYPE_NAME);
    }
}

fn wire_round_trip<K: FieldKind>(wires: Vec<Value>) {
    for wire in wires {
        let internal = K::to_internal_value(&wire).unwrap();
        assert_eq!(K::to_record_value(&internal), wire, "{}", K::TYPE_NAME);
    }
}

#[test]
fn test_internal_values_survive_the_wire() {
    internal_round_trip::<Text>(vec![String::new(), "héllo 'quoted'".into()]);
    internal_round_trip::<Integer>(vec![0, -7, i64::from(i32::MAX)]);
    internal_round_trip::<Date>(vec![
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        NaiveDate::from_ymd_opt(1999, 12, 31).unwrap(),
    ]);
    internal_round_trip::<Datetime>(vec![
        Utc.with_ymd_and_hms(2023, 6, 1, 12, 30, 0).unwrap(),
        Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
    ]);
    internal_round_trip::<DurationKind>(vec![
        chrono::Duration::seconds(90),
        chrono::Duration::milliseconds(1500),
        chrono::Duration::zero(),
    ]);
    internal_round_trip::<Currency>(vec![
        Decimal::new(1999, 2),
        Decimal::new(-5, 0),
        Decimal::new(1, 1),
    ]);
}

#[test]
fn test_wire_values_survive_conversion() {
    wire_round_trip::<Date>(vec![json!("2023-01-31")]);
    wire_round_trip::<Datetime>(vec![json!("2023-01-31T23:59:59.999Z")]);
    wire_round_trip::<DurationKind>(vec![json!(0), json!(5400), json!(1.5)]);
    wire_round_trip::<Percent>(vec![json!(0.25), json!(1)]);
    wire_round_trip::<Currency>(vec![json!(19.99), json!(100)]);
}

#[test]
fn test_record_round_trip_through_model() {
    let fields = json!({
        "Name": "Write tests",
        "Done": true,
        "Due": "2024-03-01",
        "Count": 3,
        "Stars": 4,
        "Created": "2024-01-01T00:00:00.000Z"
    });
    let record = RecordDict {
        id: "recA".into(),
        created_time: "2024-01-01T00:00:00.000Z".into(),
        fields: fields.as_object().cloned().unwrap(),
    };
    let sample = Sample::from_record(record.clone()).unwrap();
    assert_eq!(sample.to_record().unwrap(), record);
    assert_eq!(Sample::DUE.get(&sample), NaiveDate::from_ymd_opt(2024, 3, 1));
    assert!(Sample::DONE.get(&sample));
}

#[test]
fn test_missing_values_use_sentinels() {
    let sample = Sample::new();
    assert_eq!(Sample::NOTES.get(&sample), "");
    assert!(!Sample::DONE.get(&sample));
    assert_eq!(Sample::COUNT.get(&sample), None);
    assert!(matches!(
        Sample::NAME.get(&sample),
        Err(OrmError::MissingValue { .. })
    ));
}

#[test]
fn test_required_field_rejects_empty_writes() {
    let mut sample = Sample::new();
    assert!(matches!(
        Sample::NAME.set(&mut sample, ""),
        Err(OrmError::MissingValue { .. })
    ));
    assert!(sample.assign("name", Value::Null).is_err());
    Sample::NAME.set(&mut sample, "ok").unwrap();
    assert_eq!(Sample::NAME.get(&sample).unwrap(), "ok");
}

#[test]
fn test_readonly_field_rejects_writes() {
    let mut sample = Sample::new();
    let err = sample
        .assign("created", json!("2024-01-01T00:00:00.000Z"))
        .unwrap_err();
    assert!(matches!(err, OrmError::Readonly { .. }));
    assert!(!sample.is_dirty());
}

#[test]
fn test_assign_validates_type_unless_disabled() {
    let mut sample = Sample::new();
    let err = sample.assign("count", json!("three")).unwrap_err();
    assert!(matches!(
        err,
        OrmError::InvalidType {
            expected: "integer",
            found: "string",
            ..
        }
    ));

    sample.assign("raw", json!("anything")).unwrap();
    assert_eq!(sample.writable_fields(true).unwrap()["Raw"], json!("anything"));
}

#[test]
fn test_rating_range_is_checked() {
    let mut sample = Sample::new();
    assert!(matches!(
        Sample::STARS.set(&mut sample, 0),
        Err(OrmError::InvalidValue { .. })
    ));
    Sample::STARS.set(&mut sample, 5).unwrap();
}

#[test]
fn test_load_rejects_wrong_wire_type() {
    let record = RecordDict {
        id: "recB".into(),
        created_time: String::new(),
        fields: json!({"Name": "x", "Count": "many"}).as_object().cloned().unwrap(),
    };
    assert!(matches!(
        Sample::from_record(record),
        Err(OrmError::InvalidType { .. })
    ));
}

#[test]
fn test_set_rejects_values_the_wire_would_alter() {
    let mut sample = Sample::new();

    let precise = Utc.timestamp_nanos(1_700_000_000_123_456_789);
    assert!(matches!(
        Sample::AT.set(&mut sample, precise),
        Err(OrmError::InvalidValue { .. })
    ));
    let amount = Decimal::from_str("12345678901.1234567").unwrap();
    assert!(matches!(
        Sample::AMOUNT.set(&mut sample, amount),
        Err(OrmError::InvalidValue { .. })
    ));
    assert!(!sample.is_dirty());

    Sample::AT.set(&mut sample, precise.trunc_subsecs(3)).unwrap();
    assert_eq!(Sample::AT.get(&sample), Some(precise.trunc_subsecs(3)));
    Sample::AMOUNT.set(&mut sample, Decimal::new(1999, 2)).unwrap();
    assert_eq!(Sample::AMOUNT.get(&sample), Some(Decimal::new(1999, 2)));
}

#[test]
fn test_unvalidated_required_field_still_rejects_empty() {
    let mut sample = Sample::new();
    for empty in [json!(""), Value::Null] {
        assert!(matches!(
            sample.assign("label", empty),
            Err(OrmError::MissingValue { .. })
        ));
    }
    assert!(!sample.is_dirty());

    sample.assign("label", json!(7)).unwrap();
    assert_eq!(sample.writable_fields(true).unwrap()["Label"], json!(7));
}
