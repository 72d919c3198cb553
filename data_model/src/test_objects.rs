pub mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use crate::{ObjectKey, StepState};

    pub const TEST_BUCKET: &str = "alice-report-service";
    pub const TEST_OBJECT_KEY: &str = "sales_202401011200/sales.xlsx";

    pub fn mock_object_key() -> ObjectKey {
        ObjectKey::from(TEST_OBJECT_KEY)
    }

    pub fn mock_upload_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    pub fn mock_step_state_body(status: &str) -> Vec<u8> {
        serde_json::to_vec(&StepState {
            status: status.to_string(),
        })
        .unwrap()
    }
}
