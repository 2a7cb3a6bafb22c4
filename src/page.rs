use serde::Deserialize;

/// One page of a cursor-paginated list response.
///
/// `next` is an opaque URL (absolute or relative); `None` signals the last
/// page.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_middle_page() {
        let json = r#"{
            "count": 110,
            "next": "http://backend/api/visitors/?page=3",
            "previous": "http://backend/api/visitors/?page=1",
            "results": [{"id": 51}, {"id": 52}]
        }"#;
        let page: Page<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(page.count, 110);
        assert_eq!(
            page.next.as_deref(),
            Some("http://backend/api/visitors/?page=3")
        );
        assert_eq!(page.results.len(), 2);
    }

    #[test]
    fn deserialize_last_page() {
        let json = r#"{"count": 1, "next": null, "previous": null, "results": [7]}"#;
        let page: Page<u64> = serde_json::from_str(json).unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.results, vec![7]);
    }

    #[test]
    fn missing_previous_is_tolerated() {
        let json = r#"{"count": 0, "next": null, "results": []}"#;
        let page: Page<u64> = serde_json::from_str(json).unwrap();
        assert!(page.previous.is_none());
        assert!(page.results.is_empty());
    }
}
