use crate::interfaces::chat::ChatApi;
use crate::telegram::types::Message;

pub mod commands;
pub mod deadline;
pub mod delivery;

/// Privilege check against the originating group. A failed lookup reads as
/// not-admin rather than an error.
pub(crate) async fn is_admin(api: &dyn ChatApi, message: &Message) -> bool {
    let Some(from) = &message.from else {
        return false;
    };
    match api.chat_member_status(message.chat.id, from.id).await {
        Ok(status) => matches!(status.as_str(), "administrator" | "creator"),
        Err(err) => {
            tracing::warn!(user_id = from.id, error = %err, "admin status check failed");
            false
        }
    }
}
