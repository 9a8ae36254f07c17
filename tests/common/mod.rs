#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use moments_lib::{
    db::Database,
    moments::{MomentFields, MomentsService, StepInput, WriteOutcome, WriteRequest, WriteVariant},
    settings::AppConfig,
};

pub const USER: &str = "user-1";

pub fn service(page_size: u32) -> MomentsService {
    let db = Database::in_memory().expect("in-memory database");
    let config = AppConfig {
        page_size,
        ..AppConfig::default()
    };
    MomentsService::new(db, &config)
}

/// 2024-01-01 at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
}

pub fn minutes_after(base: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    base + Duration::minutes(minutes)
}

pub fn steps(durations: &[u32]) -> Vec<StepInput> {
    durations
        .iter()
        .enumerate()
        .map(|(index, duration)| StepInput {
            order_id: index as u32 + 1,
            name: format!("Step {}", index + 1),
            description: String::new(),
            duration: *duration,
        })
        .collect()
}

pub fn fields(name: &str, start: DateTime<Utc>) -> MomentFields {
    MomentFields {
        activity: "Sport".into(),
        name: name.into(),
        is_indispensable: false,
        description: String::new(),
        start_date_and_time: start,
        destination_name: "Park".into(),
    }
}

pub fn create_request(name: &str, start: DateTime<Utc>, durations: &[u32]) -> WriteRequest {
    WriteRequest {
        variant: WriteVariant::Creating,
        fields: fields(name, start),
        steps: steps(durations),
        target_id: None,
    }
}

/// Creates a moment and returns its id, failing the test on any other outcome.
pub async fn seed(
    service: &MomentsService,
    user_id: &str,
    name: &str,
    start: DateTime<Utc>,
    durations: &[u32],
) -> String {
    let outcome = service
        .write_moment(user_id, &create_request(name, start, durations))
        .await;
    match outcome {
        WriteOutcome::Success(success) => success.moment_id,
        other => panic!("seeding {name} failed: {other:?}"),
    }
}
