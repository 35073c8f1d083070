use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const ENUM_TYPES: &[(&str, &str)] = &[
    ("role", "'customer', 'agent', 'admin'"),
    ("room_status", "'waiting', 'active', 'concluded'"),
    (
        "ticket_status",
        "'open', 'in_progress', 'waiting_customer', 'resolved', 'closed'",
    ),
    ("priority", "'low', 'normal', 'high', 'urgent'"),
    ("sender_type", "'customer', 'agent', 'system', 'ai'"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for (name, values) in ENUM_TYPES {
            db.execute_unprepared(&format!(
                "CREATE TYPE support_desk.{name} AS ENUM ({values})"
            ))
            .await?;
        }

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS support_desk.users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email VARCHAR(255) NOT NULL UNIQUE,
                display_name VARCHAR(255),
                role support_desk.role NOT NULL DEFAULT 'customer',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .await?;

        // agent_id is only populated while a room is active
        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS support_desk.chat_rooms (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                customer_id UUID NOT NULL
                    REFERENCES support_desk.users(id) ON DELETE CASCADE,
                agent_id UUID REFERENCES support_desk.users(id) ON DELETE SET NULL,
                status support_desk.room_status NOT NULL DEFAULT 'waiting',
                priority support_desk.priority NOT NULL DEFAULT 'normal',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                modified_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                closed_at TIMESTAMPTZ,
                CONSTRAINT chat_rooms_agent_only_when_active
                    CHECK ((status = 'active') = (agent_id IS NOT NULL))
            )
        "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS support_desk.chat_messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                room_id UUID NOT NULL
                    REFERENCES support_desk.chat_rooms(id) ON DELETE CASCADE,
                sender_type support_desk.sender_type NOT NULL,
                sender_id UUID REFERENCES support_desk.users(id) ON DELETE SET NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS support_desk.ai_messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                room_id UUID NOT NULL
                    REFERENCES support_desk.chat_rooms(id) ON DELETE CASCADE,
                sender_type support_desk.sender_type NOT NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS support_desk.support_tickets (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                customer_id UUID NOT NULL
                    REFERENCES support_desk.users(id) ON DELETE CASCADE,
                agent_id UUID REFERENCES support_desk.users(id) ON DELETE SET NULL,
                status support_desk.ticket_status NOT NULL DEFAULT 'open',
                subject VARCHAR(255) NOT NULL,
                priority support_desk.priority NOT NULL DEFAULT 'normal',
                category VARCHAR(64) NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                modified_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                resolved_at TIMESTAMPTZ
            )
        "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE TABLE IF NOT EXISTS support_desk.ticket_messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                ticket_id UUID NOT NULL
                    REFERENCES support_desk.support_tickets(id) ON DELETE CASCADE,
                sender_type support_desk.sender_type NOT NULL,
                sender_id UUID REFERENCES support_desk.users(id) ON DELETE SET NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS chat_rooms_status_idx ON support_desk.chat_rooms (status, modified_at DESC)",
            "CREATE INDEX IF NOT EXISTS chat_rooms_customer_idx ON support_desk.chat_rooms (customer_id)",
            "CREATE INDEX IF NOT EXISTS chat_messages_room_idx ON support_desk.chat_messages (room_id, created_at)",
            "CREATE INDEX IF NOT EXISTS ai_messages_room_idx ON support_desk.ai_messages (room_id, created_at)",
            "CREATE INDEX IF NOT EXISTS support_tickets_customer_status_idx ON support_desk.support_tickets (customer_id, status)",
            "CREATE INDEX IF NOT EXISTS ticket_messages_ticket_idx ON support_desk.ticket_messages (ticket_id, created_at)",
        ] {
            db.execute_unprepared(index).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for table in [
            "ticket_messages",
            "support_tickets",
            "ai_messages",
            "chat_messages",
            "chat_rooms",
            "users",
        ] {
            db.execute_unprepared(&format!("DROP TABLE IF EXISTS support_desk.{table}"))
                .await?;
        }

        for (name, _) in ENUM_TYPES.iter().rev() {
            db.execute_unprepared(&format!("DROP TYPE IF EXISTS support_desk.{name}"))
                .await?;
        }

        Ok(())
    }
}
