use colored::*;
use events::schema::{RoomView, TicketView};
use events::Incoming;
use serde_json::Value;
use support_client::{ConnectionState, SupportStore};

pub fn print_event(incoming: &Incoming) {
    let payload = match incoming {
        Incoming::Event(event) => serde_json::to_value(event).unwrap_or(Value::Null),
        Incoming::Unrecognized { payload, .. } => payload.clone(),
        Incoming::Handshake => return,
    };

    println!(
        "\n[{}] {} event received",
        incoming.category().as_str().bright_blue().bold(),
        incoming.event_type().yellow()
    );

    if let Ok(pretty) = serde_json::to_string_pretty(&payload) {
        println!("   {}", pretty.dimmed());
    }
}

pub fn print_state(state: &ConnectionState) {
    let line = match state {
        ConnectionState::Disconnected => "disconnected".normal(),
        ConnectionState::Connecting => "connecting...".blue(),
        ConnectionState::Connected => "connected".green().bold(),
        ConnectionState::Reconnecting { attempt, delay } => {
            format!("reconnecting in {}ms (attempt {attempt})", delay.as_millis()).yellow()
        }
        ConnectionState::Failed => "gave up reconnecting".red().bold(),
    };
    println!("{} {}", "→".blue(), line);
}

fn print_rooms(store: &SupportStore, title: &str, rooms: &[RoomView]) {
    println!("\n{} ({})", title.bright_white().bold(), rooms.len());
    for room in rooms {
        println!(
            "  {} customer {} priority {:?} {}",
            room.id,
            store.customer_label(room.customer_id),
            room.priority,
            room.modified_at.to_rfc3339().dimmed()
        );
    }
}

fn print_tickets(store: &SupportStore, title: &str, tickets: &[TicketView]) {
    println!("\n{} ({})", title.bright_white().bold(), tickets.len());
    for ticket in tickets {
        println!(
            "  {} [{}] {} from {} {}",
            ticket.id,
            ticket.status.to_string().cyan(),
            ticket.subject,
            store.customer_label(ticket.customer_id),
            ticket.modified_at.to_rfc3339().dimmed()
        );
    }
}

pub fn print_queue(store: &SupportStore) {
    let rooms = store.room_partitions();
    let tickets = store.ticket_partitions();
    print_rooms(store, "My active chats", &rooms.active);
    print_rooms(store, "Waiting chats", &rooms.waiting);
    print_rooms(store, "Concluded chats", &rooms.concluded);
    print_tickets(store, "Unassigned tickets", &tickets.unassigned);
    print_tickets(store, "My tickets", &tickets.mine);
    print_tickets(store, "Resolved tickets", &tickets.resolved);
}

pub fn print_outcome(label: &str, success: bool, message: Option<&str>) {
    let status = if success {
        "WON".green().bold()
    } else {
        "LOST".red().bold()
    };
    println!("[{}] {}", status, label);
    if let Some(message) = message {
        println!("      {}", message.dimmed());
    }
}
