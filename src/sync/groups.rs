use serde::Serialize;

use crate::common::{ClientError, ClientResult, Conversation, UserProfile};

/// Body of `POST /chat/group`. Only constructible through [`NewGroup::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGroup {
    #[serde(rename = "chatName")]
    name: String,
    users: Vec<String>,
}

impl NewGroup {
    pub fn new(name: &str, members: impl IntoIterator<Item = String>) -> ClientResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::validation("Group name is required"));
        }

        let mut users: Vec<String> = Vec::new();
        for member in members {
            if !users.contains(&member) {
                users.push(member);
            }
        }
        if users.len() < 2 {
            return Err(ClientError::validation(
                "Please select at least 2 users for the group",
            ));
        }

        Ok(Self {
            name: name.to_string(),
            users,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.users
    }
}

/// The trimmed new name, or `None` when a rename would be a no-op.
pub fn rename_target(conversation: &Conversation, name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || conversation.name.as_deref() == Some(name) {
        return None;
    }
    Some(name.to_string())
}

pub fn validate_removal(conversation: &Conversation, user_id: &str) -> ClientResult<()> {
    if conversation.is_admin(user_id) {
        return Err(ClientError::validation("Cannot remove group admin"));
    }
    Ok(())
}

/// Users that are not yet members of `conversation`.
pub fn addable_users<'a>(conversation: &Conversation, users: &'a [UserProfile]) -> Vec<&'a UserProfile> {
    users
        .iter()
        .filter(|user| !conversation.users.iter().any(|member| member.id == user.id))
        .collect()
}

/// Case-insensitive match on name or email, as used by the member pickers.
pub fn matches_search(user: &UserProfile, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    term.is_empty()
        || user.name.to_lowercase().contains(&term)
        || user.email.to_lowercase().contains(&term)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user(id: &str, name: &str) -> UserProfile {
        UserProfile {
            id: id.into(),
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn group() -> Conversation {
        serde_json::from_value(json!({
            "_id": "g1",
            "isGroupChat": true,
            "chatName": "Team",
            "users": [{ "_id": "u1", "name": "An" }, { "_id": "u2", "name": "Binh" }],
            "groupAdmin": { "_id": "u1", "name": "An" }
        }))
        .unwrap()
    }

    #[test]
    fn new_group_requires_name_and_two_members() {
        let err = NewGroup::new("  ", ["u1".to_string(), "u2".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Group name is required");

        let err = NewGroup::new("Team", ["u1".to_string(), "u1".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Please select at least 2 users for the group");

        let group = NewGroup::new(" Team ", ["u1".to_string(), "u2".to_string()]).unwrap();
        assert_eq!(
            serde_json::to_value(&group).unwrap(),
            json!({ "chatName": "Team", "users": ["u1", "u2"] })
        );
    }

    #[test]
    fn rename_skips_blank_and_unchanged_names() {
        let group = group();
        assert_eq!(rename_target(&group, " "), None);
        assert_eq!(rename_target(&group, " Team "), None);
        assert_eq!(rename_target(&group, "Crew ").as_deref(), Some("Crew"));
    }

    #[test]
    fn admin_cannot_be_removed() {
        let group = group();
        assert_eq!(
            validate_removal(&group, "u1").unwrap_err().to_string(),
            "Cannot remove group admin"
        );
        assert!(validate_removal(&group, "u2").is_ok());
    }

    #[test]
    fn addable_users_and_search() {
        let users = vec![user("u1", "An"), user("u3", "Chi")];
        let addable = addable_users(&group(), &users);
        assert_eq!(addable.len(), 1);
        assert_eq!(addable[0].id, "u3");

        assert!(matches_search(&users[1], "CHI"));
        assert!(matches_search(&users[1], "chi@"));
        assert!(!matches_search(&users[1], "an"));
        assert!(matches_search(&users[1], ""));
    }
}
