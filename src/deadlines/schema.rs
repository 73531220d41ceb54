diesel::table! {
    deadlines (deadline_id) {
        deadline_id -> Integer,
        title -> Text,
        chat_id -> BigInt,
        message_id -> BigInt,
        file_id -> Text,
        created_at -> BigInt,
    }
}

diesel::table! {
    completions (deadline_id, user_id) {
        deadline_id -> Integer,
        user_id -> BigInt,
        completed_at -> BigInt,
    }
}
