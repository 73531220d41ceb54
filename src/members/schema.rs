diesel::table! {
    members (user_id) {
        user_id -> BigInt,
        first_name -> Text,
        registered_at -> BigInt,
    }
}
