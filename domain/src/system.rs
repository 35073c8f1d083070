use crate::error::Error;
use crate::user::require_non_empty;
use crate::{DomainEvent, EventPublisher, Id, Role};
use entity_api::user;
use log::*;
use sea_orm::DatabaseConnection;

/// Sends a notice to everyone connected, or only to users with `role`.
pub async fn broadcast_notice(
    event_publisher: &EventPublisher,
    message: String,
    role: Option<Role>,
) -> Result<(), Error> {
    require_non_empty(&message, "notice")?;

    info!("Broadcasting system notice to {}", match role {
        Some(role) => role.to_string(),
        None => "everyone".to_string(),
    });

    event_publisher
        .publish(DomainEvent::NoticeBroadcast { message, role })
        .await;

    Ok(())
}

/// Ends the user's live session on every client they have open.
pub async fn force_logout(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    user_id: Id,
    reason: String,
) -> Result<(), Error> {
    let user = user::find_by_id(db, user_id).await?;

    warn!("Forcing logout of user {}: {reason}", user.id);

    event_publisher
        .publish(DomainEvent::SessionRevoked {
            user_id: user.id,
            reason,
        })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, RejectionKind};

    #[tokio::test]
    async fn empty_notices_are_rejected() {
        let result = broadcast_notice(&EventPublisher::new(), "   ".to_string(), None).await;

        assert!(matches!(
            result.unwrap_err().error_kind,
            DomainErrorKind::Rejected(RejectionKind::Precondition(_))
        ));
    }
}
