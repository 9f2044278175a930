//! Collection paths of the remote document store

/// Top-level room collection; document id = room id
pub const ROOMS: &str = "rooms";

pub fn room_messages(room_id: &str) -> String {
    format!("{}/{}/messages", ROOMS, room_id)
}

pub fn room_entered_users(room_id: &str) -> String {
    format!("{}/{}/enteredUsers", ROOMS, room_id)
}

pub fn user_favorites(nickname: &str) -> String {
    format!("users/{}/favorites", nickname)
}

/// Path segments must be non-empty and must not contain `/`.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(room_messages("abc"), "rooms/abc/messages");
        assert_eq!(room_entered_users("abc"), "rooms/abc/enteredUsers");
        assert_eq!(user_favorites("kim"), "users/kim/favorites");
    }

    #[test]
    fn test_segment_validation() {
        assert!(is_valid_segment("family"));
        assert!(!is_valid_segment(""));
        assert!(!is_valid_segment("a/b"));
    }
}
