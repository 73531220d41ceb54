diesel::table! {
    schedules (schedule_id) {
        schedule_id -> Integer,
        run_time -> BigInt,
        message -> Text,
        created_at -> BigInt,
    }
}
