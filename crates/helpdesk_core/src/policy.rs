//! Chat access rules.
//!
//! Owners can always see their chats. Agents and admins can see a chat when
//! it is assigned to them or still unassigned.

use crate::error::{HelpdeskError, HelpdeskResult};
use crate::types::{Chat, Identity};

/// Authorization decisions for chat operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn can_view(&self, identity: &Identity, chat: &Chat) -> bool {
        Self::is_owner(identity, chat) || Self::agent_can_access(identity, chat)
    }

    pub fn can_update(&self, identity: &Identity, chat: &Chat) -> bool {
        self.can_view(identity, chat)
    }

    pub fn can_assign(&self, identity: &Identity, _chat: &Chat) -> bool {
        identity.is_helpdesk_agent()
    }

    pub fn can_close(&self, identity: &Identity, _chat: &Chat) -> bool {
        identity.is_admin()
    }

    pub fn authorize_view(&self, identity: &Identity, chat: &Chat) -> HelpdeskResult<()> {
        if self.can_view(identity, chat) {
            Ok(())
        } else {
            Err(HelpdeskError::Forbidden(format!(
                "{} cannot view chat {}",
                identity.name, chat.id
            )))
        }
    }

    pub fn authorize_update(&self, identity: &Identity, chat: &Chat) -> HelpdeskResult<()> {
        if self.can_update(identity, chat) {
            Ok(())
        } else {
            Err(HelpdeskError::Forbidden(format!(
                "{} cannot write to chat {}",
                identity.name, chat.id
            )))
        }
    }

    pub fn authorize_assign(&self, identity: &Identity, chat: &Chat) -> HelpdeskResult<()> {
        if self.can_assign(identity, chat) {
            Ok(())
        } else {
            Err(HelpdeskError::Forbidden(format!(
                "{} cannot claim chat {}",
                identity.name, chat.id
            )))
        }
    }

    pub fn authorize_close(&self, identity: &Identity, chat: &Chat) -> HelpdeskResult<()> {
        if self.can_close(identity, chat) {
            Ok(())
        } else {
            Err(HelpdeskError::Forbidden(format!(
                "{} cannot close chat {}",
                identity.name, chat.id
            )))
        }
    }

    /// Agent-only actions: assignment, replies, resolution.
    pub fn require_agent(&self, identity: &Identity) -> HelpdeskResult<()> {
        if identity.is_helpdesk_agent() {
            Ok(())
        } else {
            Err(HelpdeskError::Forbidden(
                "Helpdesk agent privileges required.".to_string(),
            ))
        }
    }

    pub fn require_admin(&self, identity: &Identity) -> HelpdeskResult<()> {
        if identity.is_admin() {
            Ok(())
        } else {
            Err(HelpdeskError::Forbidden(
                "Administrator privileges required.".to_string(),
            ))
        }
    }

    fn is_owner(identity: &Identity, chat: &Chat) -> bool {
        chat.user_id == identity.id
    }

    fn agent_can_access(identity: &Identity, chat: &Chat) -> bool {
        identity.is_helpdesk_agent()
            && (chat.assigned_agent_id.is_none() || chat.assigned_agent_id == Some(identity.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatId, ChatStatus, UserId};
    use chrono::Utc;

    fn chat(owner: u64, agent: Option<u64>) -> Chat {
        let now = Utc::now();
        Chat {
            id: ChatId(1),
            user_id: UserId(owner),
            assigned_agent_id: agent.map(UserId),
            status: ChatStatus::Open,
            subject: "s".into(),
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_owner_can_view() {
        let policy = AccessPolicy;
        assert!(policy.can_view(&Identity::user(1, "Ann"), &chat(1, None)));
        assert!(!policy.can_view(&Identity::user(2, "Ben"), &chat(1, None)));
    }

    #[test]
    fn test_agent_access_follows_assignment() {
        let policy = AccessPolicy;
        let agent = Identity::agent(10, "Ada");
        assert!(policy.can_view(&agent, &chat(1, None)));
        assert!(policy.can_view(&agent, &chat(1, Some(10))));
        assert!(!policy.can_view(&agent, &chat(1, Some(11))));
        assert!(policy.authorize_update(&agent, &chat(1, Some(11))).is_err());
    }

    #[test]
    fn test_assign_and_close_rights() {
        let policy = AccessPolicy;
        let c = chat(1, None);
        assert!(!policy.can_assign(&Identity::user(1, "Ann"), &c));
        assert!(policy.can_assign(&Identity::agent(10, "Ada"), &c));
        assert!(!policy.can_close(&Identity::agent(10, "Ada"), &c));
        assert!(policy.can_close(&Identity::admin(99, "Root"), &c));
        assert_eq!(
            policy.require_agent(&Identity::user(1, "Ann")).unwrap_err().status_code(),
            403
        );
    }
}
