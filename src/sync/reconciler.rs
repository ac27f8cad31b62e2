use crate::integrity::FileHashMap;
use crate::sync::types::SyncReport;
use std::collections::BTreeSet;

/// Set difference between a fresh server scan and a client declaration.
///
/// Pure and deterministic; never touches the filesystem. Deleting
/// `extra_on_server` is left to the caller.
pub struct Reconciler;

impl Reconciler {
    pub fn reconcile(server: &FileHashMap, client: &FileHashMap) -> SyncReport {
        let server_keys: BTreeSet<&String> = server.keys().collect();
        let client_keys: BTreeSet<&String> = client.keys().collect();

        let missing_on_server: Vec<String> = client_keys
            .difference(&server_keys)
            .map(|key| (*key).clone())
            .collect();

        let extra_on_server: Vec<String> = server_keys
            .difference(&client_keys)
            .map(|key| (*key).clone())
            .collect();

        let mismatched: Vec<String> = client_keys
            .intersection(&server_keys)
            .filter(|key| client[key.as_str()] != server[key.as_str()])
            .map(|key| (*key).clone())
            .collect();

        let needs_update = missing_on_server.len() + mismatched.len();

        SyncReport {
            is_up_to_date: missing_on_server.is_empty() && mismatched.is_empty(),
            needs_update,
            missing_on_server,
            extra_on_server,
            mismatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> FileHashMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_identity() {
        let m = map(&[("/a", "h1"), ("/dir/b", "h2")]);
        let report = Reconciler::reconcile(&m, &m);

        assert_eq!(report, SyncReport::up_to_date());
        assert_eq!(report.needs_update, 0);
    }

    #[test]
    fn test_both_empty_is_up_to_date() {
        let report = Reconciler::reconcile(&FileHashMap::new(), &FileHashMap::new());
        assert!(report.is_up_to_date);
        assert_eq!(report.needs_update, 0);
    }

    #[test]
    fn test_missing_and_extra() {
        let server = map(&[("/a", "h1"), ("/b", "h2")]);
        let client = map(&[("/a", "h1"), ("/c", "h3")]);

        let report = Reconciler::reconcile(&server, &client);

        assert_eq!(report.missing_on_server, vec!["/c"]);
        assert_eq!(report.extra_on_server, vec!["/b"]);
        assert!(report.mismatched.is_empty());
        assert!(!report.is_up_to_date);
        assert_eq!(report.needs_update, 1);
    }

    #[test]
    fn test_mismatch() {
        let server = map(&[("/a", "h1")]);
        let client = map(&[("/a", "h2")]);

        let report = Reconciler::reconcile(&server, &client);

        assert_eq!(report.mismatched, vec!["/a"]);
        assert_eq!(report.needs_update, 1);
        assert!(!report.is_up_to_date);
    }

    #[test]
    fn test_extras_alone_keep_up_to_date() {
        let server = map(&[("/a", "h1"), ("/stale", "h9")]);
        let client = map(&[("/a", "h1")]);

        let report = Reconciler::reconcile(&server, &client);

        assert!(report.is_up_to_date);
        assert_eq!(report.extra_on_server, vec!["/stale"]);
        assert_eq!(report.needs_update, 0);
    }

    #[test]
    fn test_output_sorted() {
        let server = map(&[("/z", "1"), ("/m", "1"), ("/b", "1")]);
        let client = map(&[("/y", "1"), ("/c", "1"), ("/m", "2"), ("/b", "2")]);

        let report = Reconciler::reconcile(&server, &client);

        assert_eq!(report.missing_on_server, vec!["/c", "/y"]);
        assert_eq!(report.extra_on_server, vec!["/z"]);
        assert_eq!(report.mismatched, vec!["/b", "/m"]);
        assert_eq!(report.needs_update, 4);
    }

    #[test]
    fn test_report_wire_format() {
        let report = Reconciler::reconcile(&map(&[("/a", "h1")]), &map(&[("/a", "h2")]));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["mismatched_hashes"][0], "/a");
        assert_eq!(json["needs_update"], 1);
        assert_eq!(json["is_up_to_date"], false);
    }
}
