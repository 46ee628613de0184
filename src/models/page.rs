//! Paginated list response wrapper

use serde::Deserialize;

/// One page of a directory listing.
///
/// The directory names the item array after the resource (`departments`,
/// `users`), so both spellings map onto `items`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(alias = "departments", alias = "users")]
    pub items: Vec<T>,

    #[serde(default = "first_page")]
    pub page: u32,

    #[serde(default = "first_page")]
    pub pages: u32,

    #[serde(default)]
    pub per_page: Option<u32>,

    #[serde(default)]
    pub total: Option<u64>,
}

fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    /// Whether the listing ends with this page, `requested` being the
    /// page number that was asked for.
    ///
    /// The echoed `page` is not trusted; an empty page also ends the listing.
    pub fn is_last(&self, requested: u32) -> bool {
        self.items.is_empty() || requested >= self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RemoteDepartment;

    #[test]
    fn test_department_page_parses() {
        let json = r#"{
            "departments": [{"id": 1, "name": "All", "parentId": 0}],
            "page": 1,
            "pages": 3,
            "perPage": 100,
            "total": 250
        }"#;
        let page: Page<RemoteDepartment> = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "All");
        assert!(!page.is_last(1));
        assert!(page.is_last(3));
    }

    #[test]
    fn test_missing_pagination_means_single_page() {
        let page: Page<RemoteDepartment> = serde_json::from_str(r#"{"departments": []}"#).unwrap();
        assert!(page.is_last(1));
    }

    #[test]
    fn test_missing_page_number_uses_requested_page() {
        let page: Page<RemoteDepartment> = serde_json::from_str(
            r#"{"departments": [{"id": 1, "name": "All"}], "pages": 2}"#,
        )
        .unwrap();
        assert!(!page.is_last(1));
        assert!(page.is_last(2));
    }

    #[test]
    fn test_empty_page_ends_listing() {
        let page: Page<RemoteDepartment> =
            serde_json::from_str(r#"{"departments": [], "pages": 5}"#).unwrap();
        assert!(page.is_last(2));
    }
}
