use std::collections::BTreeMap;
use std::sync::Arc;

use crate::members::MemberStore;

/// The group roster as shipped; auto-registration layers newer sightings on
/// top of this list.
pub const SEED_MEMBERS: &[(i64, &str)] = &[
    (1387393147, "Vamsee"),
    (8095569186, "Umesh"),
    (6931175630, "Chetan"),
    (6544711761, "Yashwanth"),
    (5477604530, "Karthik"),
    (6643208192, "Sanjith"),
    (5801384729, "Raghunandan"),
    (103419413, "Pavan"),
];

/// Read-through merge of the static seed list and the members table.
/// Store rows win on name conflicts; nothing is cached between calls.
pub struct RosterResolver {
    seed: Vec<(i64, String)>,
    members: Arc<MemberStore>,
}

impl RosterResolver {
    pub fn new(seed: Vec<(i64, String)>, members: Arc<MemberStore>) -> Self {
        Self { seed, members }
    }

    pub fn seed_from_static() -> Vec<(i64, String)> {
        SEED_MEMBERS
            .iter()
            .map(|(id, name)| (*id, name.to_string()))
            .collect()
    }

    /// Deterministically ordered by user id. A store failure degrades to the
    /// seed list alone.
    pub async fn resolve_all(&self) -> Vec<(i64, String)> {
        let mut merged: BTreeMap<i64, String> = self.seed.iter().cloned().collect();
        match self.members.list().await {
            Ok(rows) => {
                for member in rows {
                    merged.insert(member.user_id, member.first_name);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "member store read failed, using seed roster only");
            }
        }
        merged.into_iter().collect()
    }

    pub async fn member_count(&self) -> usize {
        self.resolve_all().await.len()
    }
}

pub fn mention_line(members: &[(i64, String)]) -> String {
    members
        .iter()
        .map(|(id, name)| format!("[{name}](tg://user?id={id})"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_line_uses_user_link_format() {
        let members = vec![(1, "A".to_string()), (2, "B".to_string())];
        assert_eq!(
            mention_line(&members),
            "[A](tg://user?id=1) [B](tg://user?id=2)"
        );
    }
}
