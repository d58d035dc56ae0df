use super::*;

fn position(scroll_top: f64) -> ScrollPosition {
    ScrollPosition {
        scroll_top,
        scroll_height: 2000.0,
        client_height: 800.0,
        scroll_percentage: scroll_top / 2000.0 * 100.0,
    }
}

fn update(user_id: i64, username: &str, scroll_top: f64) -> ServerFrame {
    ServerFrame::UserScrollPosition {
        user_id,
        username: username.into(),
        scroll_position: position(scroll_top),
        current_message_index: None,
        current_message_id: None,
    }
}

#[test]
fn first_update_creates_entry_with_exact_position() {
    let mut presence = PresenceAggregator::new();
    let user = presence.apply(update(456, "otheruser", 500.0), 1_000);

    assert_eq!(user.user_id, 456);
    assert_eq!(user.username, "otheruser");
    assert_eq!(user.scroll_position, position(500.0));
    assert_eq!(user.joined_at, 1_000);
    assert_eq!(user.last_seen, Some(1_000));
    assert_eq!(presence.get(456), Some(&user));
}

#[test]
fn later_update_wins_and_keeps_joined_at() {
    let mut presence = PresenceAggregator::new();
    presence.apply(update(1, "ada", 100.0), 1_000);
    let user = presence.apply(update(1, "ada", 900.0), 2_500);

    assert_eq!(user.scroll_position, position(900.0));
    assert_eq!(user.joined_at, 1_000);
    assert_eq!(user.last_seen, Some(2_500));
    assert_eq!(presence.len(), 1);
}

#[test]
fn viewport_fields_follow_latest_frame() {
    let mut presence = PresenceAggregator::new();
    presence.apply(
        ServerFrame::UserScrollPosition {
            user_id: 1,
            username: "ada".into(),
            scroll_position: position(100.0),
            current_message_index: Some(3),
            current_message_id: Some("m3".into()),
        },
        1,
    );
    let user = presence.apply(update(1, "ada", 120.0), 2);
    assert!(user.current_message_index.is_none());
}

#[test]
fn list_orders_by_joined_at_not_update_order() {
    let mut presence = PresenceAggregator::new();
    presence.apply(update(3, "c", 0.0), 300);
    presence.apply(update(1, "a", 0.0), 100);
    presence.apply(update(2, "b", 0.0), 200);
    presence.apply(update(1, "a", 50.0), 400);

    let order: Vec<i64> = presence.list().iter().map(|u| u.user_id).collect();
    assert_eq!(order, vec![1, 2, 3]);
}

#[test]
fn same_join_time_keeps_arrival_order() {
    let mut presence = PresenceAggregator::new();
    for id in [9, 4, 7] {
        presence.apply(update(id, "x", 0.0), 500);
    }
    let order: Vec<i64> = presence.list().iter().map(|u| u.user_id).collect();
    assert_eq!(order, vec![9, 4, 7]);
}

#[test]
fn remove_and_clear() {
    let mut presence = PresenceAggregator::new();
    presence.apply(update(1, "a", 0.0), 1);
    presence.apply(update(2, "b", 0.0), 2);

    assert!(presence.remove(1));
    assert!(!presence.remove(1));
    assert_eq!(presence.len(), 1);

    presence.clear();
    assert!(presence.is_empty());
}
