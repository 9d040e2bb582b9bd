use serde::{Deserialize, Serialize};

use super::access_request::AccessRequestStatus;

/// Difficulty of the beginner level, which every user can open without a request.
pub const BEGINNER_DIFFICULTY: i32 = 1;

/// Catalog entry from the `levels` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: String,
    pub name: String,
    pub difficulty_level: i32,
}

impl Level {
    pub fn is_beginner(&self) -> bool {
        self.difficulty_level == BEGINNER_DIFFICULTY
    }
}

/// Trims and lower-cases a level name for catalog lookup.
pub fn normalize_level_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Level as shown in a student's level picker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelAccessView {
    pub id: String,
    pub name: String,
    pub difficulty_level: i32,
    pub accessible: bool,
    pub request_status: Option<AccessRequestStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level_name() {
        assert_eq!(normalize_level_name(" MOVERS "), "movers");
        assert_eq!(normalize_level_name("Flyers"), "flyers");
        assert_eq!(normalize_level_name("\t\n"), "");
    }

    #[test]
    fn test_is_beginner() {
        let level = Level {
            id: "L1".to_string(),
            name: "Beginner".to_string(),
            difficulty_level: 1,
        };
        assert!(level.is_beginner());

        let level = Level {
            difficulty_level: 3,
            ..level
        };
        assert!(!level.is_beginner());
    }
}
