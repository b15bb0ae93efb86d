//! Unit tests for storage types.

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Category
// ============================================================================

#[test]
fn test_category_from_str_case_insensitive() {
    assert_eq!("Hardware".parse::<Category>().unwrap(), Category::Hardware);
    assert_eq!("  email ".parse::<Category>().unwrap(), Category::Email);
    assert_eq!("SECURITY".parse::<Category>().unwrap(), Category::Security);
    assert!("plumbing".parse::<Category>().is_err());
}

#[test]
fn test_category_display_round_trips_through_from_str() {
    for category in Category::ALL {
        assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
    }
}

#[test]
fn test_category_serde_accepts_lowercase_alias() {
    let category: Category = serde_json::from_value(json!("network")).unwrap();
    assert_eq!(category, Category::Network);
    assert_eq!(serde_json::to_value(Category::Network).unwrap(), json!("Network"));
}

#[test]
fn test_category_default_is_other() {
    assert_eq!(Category::default(), Category::Other);
}

// ============================================================================
// Priority / Status
// ============================================================================

#[test]
fn test_priority_ordering() {
    assert!(Priority::Critical > Priority::High);
    assert!(Priority::High > Priority::Medium);
    assert!(Priority::Medium > Priority::Low);
}

#[test]
fn test_priority_serde_snake_case() {
    assert_eq!(serde_json::to_value(Priority::Critical).unwrap(), json!("critical"));
    let p: Priority = serde_json::from_value(json!("low")).unwrap();
    assert_eq!(p, Priority::Low);
    assert!("urgent".parse::<Priority>().is_err());
}

#[test]
fn test_status_from_str_and_terminal() {
    assert_eq!("in_progress".parse::<Status>().unwrap(), Status::InProgress);
    assert_eq!(Status::InProgress.to_string(), "in_progress");
    assert!(Status::Resolved.is_terminal());
    assert!(Status::Closed.is_terminal());
    assert!(!Status::Open.is_terminal());
}

// ============================================================================
// Ticket
// ============================================================================

#[test]
fn test_ticket_new_defaults() {
    let ticket = Ticket::new("Laptop won't boot", "Black screen after update");

    assert!(!ticket.id.is_empty());
    assert_eq!(ticket.category, Category::Other);
    assert_eq!(ticket.status, Status::Open);
    assert!(ticket.priority.is_none());
    assert!(ticket.resolution.is_none());
    assert_eq!(ticket.created_at, ticket.updated_at);
}

#[test]
fn test_ticket_ids_are_unique() {
    assert_ne!(Ticket::new("a", "").id, Ticket::new("a", "").id);
}

#[test]
fn test_ticket_builders() {
    let ticket = Ticket::new("Printer offline", "Third floor printer")
        .with_category(Category::Hardware)
        .with_priority(Priority::High)
        .with_department("Finance")
        .with_requester("Jo", "jo@example.com")
        .resolved("Power cycled the printer");

    assert_eq!(ticket.category, Category::Hardware);
    assert_eq!(ticket.priority, Some(Priority::High));
    assert_eq!(ticket.department.as_deref(), Some("Finance"));
    assert_eq!(ticket.requester_email.as_deref(), Some("jo@example.com"));
    assert_eq!(ticket.status, Status::Resolved);
    assert_eq!(ticket.resolution.as_deref(), Some("Power cycled the printer"));
}

#[test]
fn test_ticket_text_joins_title_and_description() {
    let ticket = Ticket::new("VPN down", "Cannot reach intranet");
    assert_eq!(ticket.text(), "VPN down Cannot reach intranet");
}

#[test]
fn test_inline_ticket_deserializes_with_defaults() {
    let ticket: Ticket = serde_json::from_value(json!({
        "title": "Outlook crashes",
        "category": "email"
    }))
    .unwrap();

    assert_eq!(ticket.title, "Outlook crashes");
    assert_eq!(ticket.description, "");
    assert_eq!(ticket.category, Category::Email);
    assert_eq!(ticket.status, Status::Open);
}

#[test]
fn test_inline_ticket_tolerates_unknown_priority_and_category() {
    let ticket: Ticket = serde_json::from_value(json!({
        "title": "VPN won't connect",
        "priority": "urgent",
        "category": "Plumbing"
    }))
    .unwrap();

    assert_eq!(ticket.priority, None);
    assert_eq!(ticket.category, Category::Other);

    let ticket: Ticket = serde_json::from_value(json!({
        "title": "VPN won't connect",
        "priority": "High",
        "category": 7
    }))
    .unwrap();
    assert_eq!(ticket.priority, Some(Priority::High));
    assert_eq!(ticket.category, Category::Other);
}

// ============================================================================
// NewTicket
// ============================================================================

#[test]
fn test_new_ticket_uses_given_category() {
    let new = NewTicket {
        title: "  Password reset  ".to_string(),
        category: Some(Category::Access),
        priority: Some(Priority::Low),
        ..Default::default()
    };

    let ticket = new.into_ticket(Category::Other).unwrap();
    assert_eq!(ticket.title, "Password reset");
    assert_eq!(ticket.category, Category::Access);
    assert_eq!(ticket.priority, Some(Priority::Low));
}

#[test]
fn test_new_ticket_falls_back_to_inferred_category() {
    let new = NewTicket {
        title: "Wifi keeps dropping".to_string(),
        ..Default::default()
    };

    let ticket = new.into_ticket(Category::Network).unwrap();
    assert_eq!(ticket.category, Category::Network);
}

#[test]
fn test_new_ticket_rejects_blank_title() {
    let new = NewTicket {
        title: "   ".to_string(),
        ..Default::default()
    };

    match new.into_ticket(Category::Other) {
        Err(ToolError::Validation { field, .. }) => assert_eq!(field, "title"),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_new_ticket_rejects_bad_email() {
    let new = NewTicket {
        title: "Monitor flicker".to_string(),
        requester_email: Some("not-an-email".to_string()),
        ..Default::default()
    };

    match new.into_ticket(Category::Hardware) {
        Err(ToolError::Validation { field, .. }) => assert_eq!(field, "requester_email"),
        other => panic!("expected validation error, got {:?}", other),
    }
}

// ============================================================================
// TicketUpdate
// ============================================================================

#[test]
fn test_update_moves_status_and_assignee() {
    let ticket = Ticket::new("Outlook crashes", "");
    let before = ticket.updated_at;

    let updated = TicketUpdate {
        status: Some(Status::InProgress),
        assigned_to: Some(" Alice Johnson ".to_string()),
        ..Default::default()
    }
    .apply(ticket)
    .unwrap();

    assert_eq!(updated.status, Status::InProgress);
    assert_eq!(updated.assigned_to.as_deref(), Some("Alice Johnson"));
    assert!(updated.updated_at >= before);
}

#[test]
fn test_update_resolution_requires_finished_status() {
    let open = Ticket::new("Printer jam", "");
    let result = TicketUpdate {
        resolution: Some("Cleared tray".to_string()),
        ..Default::default()
    }
    .apply(open.clone());
    match result {
        Err(ToolError::Validation { field, .. }) => assert_eq!(field, "resolution"),
        other => panic!("expected validation error, got {:?}", other),
    }

    let closed = TicketUpdate {
        status: Some(Status::Closed),
        resolution: Some("Cleared tray".to_string()),
        ..Default::default()
    }
    .apply(open)
    .unwrap();
    assert_eq!(closed.resolution.as_deref(), Some("Cleared tray"));
}

#[test]
fn test_update_resolution_allowed_on_already_resolved_ticket() {
    let resolved = Ticket::new("Printer jam", "").resolved("Cleared tray");
    let updated = TicketUpdate {
        resolution: Some("Replaced the pickup roller".to_string()),
        ..Default::default()
    }
    .apply(resolved)
    .unwrap();
    assert_eq!(updated.status, Status::Resolved);
    assert_eq!(updated.resolution.as_deref(), Some("Replaced the pickup roller"));
}

#[test]
fn test_reopening_drops_resolution() {
    let resolved = Ticket::new("Printer jam", "").resolved("Cleared tray");
    let reopened = TicketUpdate {
        status: Some(Status::Open),
        ..Default::default()
    }
    .apply(resolved)
    .unwrap();

    assert_eq!(reopened.status, Status::Open);
    assert!(reopened.resolution.is_none());
}

#[test]
fn test_update_validation() {
    assert!(TicketUpdate::default().validate().is_err());
    assert!(TicketUpdate {
        assigned_to: Some("  ".to_string()),
        ..Default::default()
    }
    .validate()
    .is_err());

    let update: TicketUpdate =
        serde_json::from_value(json!({"category": "network", "priority": "low"})).unwrap();
    assert!(update.validate().is_ok());
    assert_eq!(update.category, Some(Category::Network));
}

// ============================================================================
// TicketFilter
// ============================================================================

#[test]
fn test_ticket_filter_defaults() {
    let filter = TicketFilter::default();
    assert_eq!(filter.limit, 50);
    assert!(filter.status.is_none());
    assert!(filter.category.is_none());

    let parsed: TicketFilter = serde_json::from_value(json!({"status": "open"})).unwrap();
    assert_eq!(parsed.limit, 50);
    assert_eq!(parsed.status, Some(Status::Open));
}
