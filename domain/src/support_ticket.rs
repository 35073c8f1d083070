use crate::error::Error;
use crate::user::{require_customer, require_non_empty, require_staff};
use crate::{
    DomainEvent, EventPublisher, Id, Priority, TicketMessageView, TicketStatus, TicketView,
};
use chrono::Utc;
use entity_api::support_ticket::TicketChange;
use entity_api::{support_ticket, support_tickets, ticket_message, user, SenderType};
use events::TicketTransition;
use log::*;
use sea_orm::{DatabaseConnection, TransactionTrait};

/// The fields a customer fills in to open a ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub subject: String,
    pub category: String,
    pub priority: Priority,
    /// Body of the ticket's first message.
    pub message: String,
}

/// Opens a ticket together with its first message.
///
/// The customer row is locked for the duration of the transaction, so two
/// concurrent requests from the same customer are counted one after the
/// other and the cap of `max_open_tickets` non-terminal tickets holds.
pub async fn create(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    max_open_tickets: u64,
    customer_id: Id,
    new_ticket: NewTicket,
) -> Result<TicketView, Error> {
    require_non_empty(&new_ticket.subject, "subject")?;
    require_non_empty(&new_ticket.message, "message")?;

    let txn = db.begin().await?;

    let customer = user::find_for_update(&txn, customer_id).await?;
    require_customer(&customer, "open support tickets")?;

    let open_tickets = support_ticket::count_open_by_customer(&txn, customer_id).await?;
    if open_tickets >= max_open_tickets {
        warn!(
            "Customer {customer_id} already has {open_tickets} open tickets, rejecting new ticket"
        );
        txn.rollback().await?;
        return Err(Error::policy(format!(
            "a customer may have at most {max_open_tickets} open tickets"
        )));
    }

    let ticket = support_ticket::create(
        &txn,
        customer_id,
        new_ticket.subject,
        new_ticket.category,
        new_ticket.priority,
    )
    .await?;
    ticket_message::create(
        &txn,
        ticket.id,
        SenderType::Customer,
        Some(customer_id),
        new_ticket.message,
    )
    .await?;

    txn.commit().await?;

    let ticket: TicketView = ticket.into();
    info!("Support ticket {} opened by customer {customer_id}", ticket.id);

    event_publisher
        .publish(DomainEvent::TicketOpened {
            ticket: ticket.clone(),
        })
        .await;

    Ok(ticket)
}

/// Assigns an open ticket to the agent. Competing claims resolve to exactly
/// one winner; the others get a conflict.
pub async fn claim(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    ticket_id: Id,
    agent_id: Id,
) -> Result<TicketView, Error> {
    let agent = user::find_by_id(db, agent_id).await?;
    require_staff(&agent, "claim a ticket")?;

    let ticket = support_ticket::find_by_id(db, ticket_id).await?;
    if let Some(current) = ticket.agent_id {
        return if current == agent_id {
            Ok(ticket.into())
        } else {
            Err(Error::conflict("ticket was already claimed by another agent"))
        };
    }

    let agent_id = agent.id;
    transition(
        db,
        event_publisher,
        ticket,
        agent_id,
        Some(agent_id),
        TicketTransition::Claim,
    )
    .await
}

/// Moves a ticket the agent is assigned to toward `target`.
pub async fn update_status(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    ticket_id: Id,
    agent_id: Id,
    target: TicketStatus,
) -> Result<TicketView, Error> {
    let ticket = support_ticket::find_by_id(db, ticket_id).await?;
    let step = TicketTransition::toward(target).ok_or_else(|| {
        Error::from(events::TransitionError {
            from: ticket.status.to_string(),
            attempted: format!("move to {target}"),
        })
    })?;

    if ticket.agent_id != Some(agent_id) {
        return Err(Error::precondition(
            "only the agent assigned to this ticket may change its status",
        ));
    }

    let assigned = ticket.agent_id;
    transition(db, event_publisher, ticket, agent_id, assigned, step).await
}

async fn transition(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    ticket: support_tickets::Model,
    actor_id: Id,
    agent_id: Option<Id>,
    transition: TicketTransition,
) -> Result<TicketView, Error> {
    let status = ticket.status.apply(transition)?;
    let resolved_at = if status == TicketStatus::Resolved {
        Some(Utc::now().into())
    } else {
        ticket.resolved_at
    };
    let previous_status = ticket.status;

    let updated = support_ticket::compare_and_set(
        db,
        &ticket,
        TicketChange {
            status,
            agent_id,
            resolved_at,
        },
    )
    .await?;
    let ticket: TicketView = updated.into();

    info!(
        "Support ticket {} moved from {previous_status} to {} by {actor_id}",
        ticket.id, ticket.status
    );

    event_publisher
        .publish(DomainEvent::TicketTransitioned {
            ticket: ticket.clone(),
            transition,
            previous_status,
            actor_id,
        })
        .await;

    Ok(ticket)
}

pub async fn post_message(
    db: &DatabaseConnection,
    event_publisher: &EventPublisher,
    ticket_id: Id,
    sender_id: Id,
    message: String,
) -> Result<TicketMessageView, Error> {
    require_non_empty(&message, "message")?;

    let sender = user::find_by_id(db, sender_id).await?;
    let ticket = support_ticket::find_by_id(db, ticket_id).await?;
    if ticket.status == TicketStatus::Closed {
        return Err(Error::precondition("ticket is closed"));
    }

    let sender_type = if sender.role.is_staff() {
        if ticket.agent_id != Some(sender_id) {
            return Err(Error::precondition(
                "only the agent assigned to this ticket may reply",
            ));
        }
        SenderType::Agent
    } else {
        if ticket.customer_id != sender_id {
            return Err(Error::precondition("ticket belongs to another customer"));
        }
        SenderType::Customer
    };

    let message: TicketMessageView =
        ticket_message::create(db, ticket.id, sender_type, Some(sender_id), message)
            .await?
            .into();

    event_publisher
        .publish(DomainEvent::TicketMessagePosted {
            ticket: ticket.into(),
            message: message.clone(),
        })
        .await;

    Ok(message)
}

pub async fn messages(
    db: &DatabaseConnection,
    ticket_id: Id,
    viewer_id: Id,
) -> Result<Vec<TicketMessageView>, Error> {
    let viewer = user::find_by_id(db, viewer_id).await?;
    let ticket = support_ticket::find_by_id(db, ticket_id).await?;
    if !viewer.role.is_staff() && viewer.id != ticket.customer_id {
        return Err(Error::precondition("ticket belongs to another customer"));
    }

    Ok(ticket_message::find_by_ticket(db, ticket.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Customers see their own tickets, staff see every ticket.
pub async fn find_for_user(
    db: &DatabaseConnection,
    user_id: Id,
) -> Result<Vec<TicketView>, Error> {
    let viewer = user::find_by_id(db, user_id).await?;

    let tickets = if viewer.role.is_staff() {
        support_ticket::find_all(db).await?
    } else {
        support_ticket::find_by_customer(db, viewer.id).await?
    };

    Ok(tickets.into_iter().map(Into::into).collect())
}

#[cfg(test)]
// We need to gate seaORM's mock feature behind conditional compilation because
// the feature removes the Clone trait implementation from seaORM's DatabaseConnection.
// see https://github.com/SeaQL/sea-orm/issues/830
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use crate::error::{DomainErrorKind, RejectionKind};
    use crate::test_support::recording_publisher;
    use crate::Role;
    use entity_api::{ticket_messages, users};
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn user_with_role(role: Role) -> users::Model {
        let now = Utc::now();
        users::Model {
            id: Id::new_v4(),
            email: format!("{role}@example.com"),
            display_name: None,
            role,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn ticket(customer_id: Id, status: TicketStatus, agent_id: Option<Id>) -> support_tickets::Model {
        let now = Utc::now();
        support_tickets::Model {
            id: Id::new_v4(),
            customer_id,
            agent_id,
            status,
            subject: "Wrong size".to_owned(),
            priority: Priority::Normal,
            category: "returns".to_owned(),
            created_at: now.into(),
            modified_at: now.into(),
            resolved_at: None,
        }
    }

    fn new_ticket() -> NewTicket {
        NewTicket {
            subject: "Wrong size".to_owned(),
            category: "returns".to_owned(),
            priority: Priority::Normal,
            message: "The shoes are a size too small".to_owned(),
        }
    }

    fn count_row(count: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(count)))])
    }

    #[tokio::test]
    async fn create_rejects_a_ticket_over_the_cap_without_writing() {
        let customer = user_with_role(Role::Customer);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![customer.clone()]])
            .append_query_results(vec![vec![count_row(5)]])
            .into_connection();
        let (publisher, recorder) = recording_publisher();

        let result = create(&db, &publisher, 5, customer.id, new_ticket()).await;

        assert!(matches!(
            result.unwrap_err().error_kind,
            DomainErrorKind::Rejected(RejectionKind::Policy(_))
        ));
        assert!(recorder.events.lock().unwrap().is_empty());
        let log = format!("{:?}", db.into_transaction_log());
        assert!(!log.contains("INSERT"));
    }

    #[tokio::test]
    async fn create_inserts_ticket_and_opening_message_then_publishes() -> Result<(), Error> {
        let customer = user_with_role(Role::Customer);
        let created = ticket(customer.id, TicketStatus::Open, None);
        let opening = ticket_messages::Model {
            id: Id::new_v4(),
            ticket_id: created.id,
            sender_type: SenderType::Customer,
            sender_id: Some(customer.id),
            message: "The shoes are a size too small".to_owned(),
            created_at: Utc::now().into(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![customer.clone()]])
            .append_query_results(vec![vec![count_row(4)]])
            .append_query_results(vec![vec![created.clone()]])
            .append_query_results(vec![vec![opening]])
            .into_connection();
        let (publisher, recorder) = recording_publisher();

        let view = create(&db, &publisher, 5, customer.id, new_ticket()).await?;

        assert_eq!(view.id, created.id);
        assert_eq!(view.status, TicketStatus::Open);
        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], DomainEvent::TicketOpened { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn claim_of_an_assigned_ticket_is_a_conflict() {
        let agent = user_with_role(Role::Agent);
        let taken = ticket(Id::new_v4(), TicketStatus::InProgress, Some(Id::new_v4()));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![agent.clone()]])
            .append_query_results(vec![vec![taken.clone()]])
            .into_connection();
        let (publisher, recorder) = recording_publisher();

        let result = claim(&db, &publisher, taken.id, agent.id).await;

        assert!(matches!(
            result.unwrap_err().error_kind,
            DomainErrorKind::Rejected(RejectionKind::Conflict(_))
        ));
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_status_resolves_and_reports_previous_status() -> Result<(), Error> {
        let agent_id = Id::new_v4();
        let working = ticket(Id::new_v4(), TicketStatus::InProgress, Some(agent_id));
        let resolved = support_tickets::Model {
            status: TicketStatus::Resolved,
            resolved_at: Some(Utc::now().into()),
            ..working.clone()
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![working.clone()], vec![resolved]])
            .into_connection();
        let (publisher, recorder) = recording_publisher();

        let view = update_status(&db, &publisher, working.id, agent_id, TicketStatus::Resolved)
            .await?;

        assert_eq!(view.status, TicketStatus::Resolved);
        assert!(view.resolved_at.is_some());
        let events = recorder.events.lock().unwrap();
        assert!(matches!(
            &events[0],
            DomainEvent::TicketTransitioned {
                previous_status: TicketStatus::InProgress,
                transition: TicketTransition::Resolve,
                ..
            }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn update_status_refuses_to_reopen() {
        let agent_id = Id::new_v4();
        let resolved = ticket(Id::new_v4(), TicketStatus::Resolved, Some(agent_id));
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![resolved.clone()]])
            .into_connection();
        let (publisher, _) = recording_publisher();

        let result =
            update_status(&db, &publisher, resolved.id, agent_id, TicketStatus::Open).await;

        assert!(matches!(
            result.unwrap_err().error_kind,
            DomainErrorKind::Rejected(RejectionKind::InvalidTransition(_))
        ));
    }
}
