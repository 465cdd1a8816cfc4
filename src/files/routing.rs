// src/files/routing.rs

/// Keyword → folder id, checked in declaration order; first hit wins.
pub static FOLDER_ROUTES: &[(&str, &str)] = &[
    ("sales order", "1lA9LqQFDTALlMNAtiUGeJjb82TV4_MxS"),
    ("purchase order", "1FMz09LHGNEUS-VjNKlSzIHvVs8lWyKEC"),
    ("ticket", "1e_-Rujp6wcOXH3AptJF4lEWEpoOabxpa"),
    ("return", "1lNMjcM81iY-l41QYVVTCpO8c9oY998Mx"),
    ("damage", "13z5Odm48_EoHnINYc5_lvtpLSyUEYPRw"),
    ("booking", "1Q7SPz-x3NzdpjVWR6pENTUm4cNu8zSml"),
    ("misc", "13sny-GOGWw5od74oWu6xlc6duQ9crZtb"),
];

pub const DEFAULT_FOLDER_ID: &str = "15OAwN8yyMhUJFCeGK11_h7mptvSYWukN";

/// Picks the destination folder for an uploaded file from its name.
#[derive(Debug, Clone)]
pub struct FolderRouter {
    routes: Vec<(String, String)>,
    default_folder: String,
}

impl Default for FolderRouter {
    fn default() -> Self {
        Self::new(DEFAULT_FOLDER_ID)
    }
}

impl FolderRouter {
    /// The built-in keyword table with a custom fallback folder.
    pub fn new(default_folder: impl Into<String>) -> Self {
        Self {
            routes: FOLDER_ROUTES
                .iter()
                .map(|(k, f)| (k.to_string(), f.to_string()))
                .collect(),
            default_folder: default_folder.into(),
        }
    }

    pub fn default_folder(&self) -> &str {
        &self.default_folder
    }

    /// Case-insensitive substring match of each keyword against `filename`.
    pub fn detect(&self, filename: &str) -> &str {
        let name = filename.to_lowercase();
        self.routes
            .iter()
            .find(|(keyword, _)| name.contains(keyword.as_str()))
            .map(|(_, folder)| folder.as_str())
            .unwrap_or(&self.default_folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder_for(keyword: &str) -> &'static str {
        FOLDER_ROUTES
            .iter()
            .find(|(k, _)| *k == keyword)
            .map(|(_, f)| *f)
            .unwrap()
    }

    #[test]
    fn routes_by_keyword() {
        let router = FolderRouter::default();
        assert_eq!(router.detect("Sales Order 1042.pdf"), folder_for("sales order"));
        assert_eq!(router.detect("misc_note.txt"), folder_for("misc"));
        assert_eq!(router.detect("DAMAGE-photo.JPG"), folder_for("damage"));
    }

    #[test]
    fn falls_back_to_default() {
        let router = FolderRouter::default();
        assert_eq!(router.detect("report.txt"), DEFAULT_FOLDER_ID);

        let custom = FolderRouter::new("elsewhere");
        assert_eq!(custom.detect("report.txt"), "elsewhere");
        assert_eq!(custom.default_folder(), "elsewhere");
    }

    #[test]
    fn first_declared_keyword_wins() {
        let router = FolderRouter::default();
        // "ticket" is declared before "return"
        assert_eq!(router.detect("return ticket.pdf"), folder_for("ticket"));
        // "sales order" beats "misc" even when both appear
        assert_eq!(router.detect("misc sales order.csv"), folder_for("sales order"));
    }
}
