use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{sort_newest_first, ReportStore, StoreError};
use crate::models::{ClaimReport, FinalVerdict, NewReport};

/// JSON-lines file store: one report per line.
///
/// Inserts append a line; verdict updates rewrite the file through a temp file
/// and rename. The in-memory copy and the file change under one mutex, so
/// writers are serialized and ids never collide.
pub struct JsonlReportStore {
    path: PathBuf,
    state: Mutex<JsonlState>,
}

struct JsonlState {
    reports: Vec<ClaimReport>,
    next_id: i64,
}

impl JsonlReportStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let reports = match fs::read_to_string(&path).await {
            Ok(content) => load_content(&path, &content).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let next_id = reports.iter().map(|r| r.id).max().unwrap_or(0) + 1;

        tracing::debug!(path = %path.display(), count = reports.len(), "Opened JSONL report store");

        Ok(Self {
            path,
            state: Mutex::new(JsonlState { reports, next_id }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append_line(&self, report: &ClaimReport) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(report)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let committed_len = file.metadata().await?.len();

        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            // drop any partial line so the next append starts on a clean boundary
            if let Err(trunc) = file.set_len(committed_len).await {
                tracing::error!(path = %self.path.display(), error = %trunc, "Failed to roll back partial append");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn rewrite(&self, reports: &[ClaimReport]) -> Result<(), StoreError> {
        let mut content = String::new();
        for report in reports {
            content.push_str(&serde_json::to_string(report)?);
            content.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Parse the file, recovering from a torn final line.
///
/// A last line without its newline is the remains of an interrupted append.
/// If it still parses it is kept and terminated; otherwise it is cut off.
async fn load_content(path: &Path, content: &str) -> Result<Vec<ClaimReport>, StoreError> {
    if content.is_empty() || content.ends_with('\n') {
        return parse_lines(content);
    }

    let complete_len = content.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let (complete, tail) = content.split_at(complete_len);
    let mut reports = parse_lines(complete)?;

    match serde_json::from_str::<ClaimReport>(tail.trim()) {
        Ok(report) => {
            let mut file = OpenOptions::new().append(true).open(path).await?;
            file.write_all(b"\n").await?;
            file.flush().await?;
            reports.push(report);
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                bytes = tail.len(),
                error = %e,
                "Discarding torn trailing line"
            );
            let file = OpenOptions::new().write(true).open(path).await?;
            file.set_len(complete_len as u64).await?;
        }
    }
    Ok(reports)
}

fn parse_lines(content: &str) -> Result<Vec<ClaimReport>, StoreError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| StoreError::Corrupt { line: i + 1, source })
        })
        .collect()
}

#[async_trait]
impl ReportStore for JsonlReportStore {
    async fn insert(&self, report: NewReport) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        let record = ClaimReport {
            id: state.next_id,
            text: report.text,
            timestamp: Utc::now(),
            score: report.score.clamp(0, 100),
            verdict: report.verdict,
            justification: report.justification,
            final_verdict: None,
        };

        self.append_line(&record).await?;

        let id = record.id;
        state.next_id += 1;
        state.reports.push(record);
        tracing::debug!(id, "Appended report");
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<ClaimReport>, StoreError> {
        let mut reports = self.state.lock().await.reports.clone();
        sort_newest_first(&mut reports);
        Ok(reports)
    }

    async fn get(&self, id: i64) -> Result<Option<ClaimReport>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.reports.iter().find(|r| r.id == id).cloned())
    }

    async fn update_final_verdict(&self, id: i64, verdict: FinalVerdict) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let index = state
            .reports
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;

        let mut updated = state.reports.clone();
        updated[index].final_verdict = Some(verdict);
        self.rewrite(&updated).await?;
        state.reports = updated;
        Ok(())
    }

    async fn health(&self) -> Result<String, StoreError> {
        let count = self.state.lock().await.reports.len();
        Ok(format!("jsonl {} ({} reports)", self.path.display(), count))
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn new_report(text: &str, score: i32) -> NewReport {
        NewReport {
            text: text.to_string(),
            score,
            verdict: "মিথ্যা".to_string(),
            justification: "কোনো সরকারি ঘোষণা নেই".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_list_sees_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlReportStore::open(dir.path().join("reports.jsonl")).await.unwrap();

        let id = store.insert(new_report("ভোটের তারিখ পেছানো হয়েছে", 82)).await.unwrap();
        let all = store.list_all().await.unwrap();

        assert_eq!(all.len(), 1);
        let r = &all[0];
        assert_eq!(r.id, id);
        assert_eq!(r.text, "ভোটের তারিখ পেছানো হয়েছে");
        assert_eq!(r.score, 82);
        assert_eq!(r.verdict, "মিথ্যা");
        assert_eq!(r.justification, "কোনো সরকারি ঘোষণা নেই");
        assert!(r.final_verdict.is_none());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlReportStore::open(dir.path().join("reports.jsonl")).await.unwrap();
        let first = store.insert(new_report("a", 10)).await.unwrap();
        let second = store.insert(new_report("b", 20)).await.unwrap();

        let ids: Vec<i64> = store.list_all().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn pending_queue_tracks_final_verdict() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlReportStore::open(dir.path().join("reports.jsonl")).await.unwrap();
        let a = store.insert(new_report("a", 80)).await.unwrap();
        let b = store.insert(new_report("b", 30)).await.unwrap();

        assert_eq!(store.list_pending().await.unwrap().len(), 2);

        store.update_final_verdict(a, FinalVerdict::False).await.unwrap();
        let pending: Vec<i64> = store.list_pending().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(pending, vec![b]);

        let resolved = store.get(a).await.unwrap().unwrap();
        assert_eq!(resolved.final_verdict, Some(FinalVerdict::False));

        // a later review may overwrite, never clear
        store.update_final_verdict(a, FinalVerdict::Misleading).await.unwrap();
        let resolved = store.get(a).await.unwrap().unwrap();
        assert_eq!(resolved.final_verdict, Some(FinalVerdict::Misleading));
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlReportStore::open(dir.path().join("reports.jsonl")).await.unwrap();
        assert!(matches!(
            store.update_final_verdict(99, FinalVerdict::True).await,
            Err(StoreError::NotFound(99))
        ));
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");

        let (a, b) = {
            let store = JsonlReportStore::open(&path).await.unwrap();
            let a = store.insert(new_report("a", 90)).await.unwrap();
            let b = store.insert(new_report("b", 40)).await.unwrap();
            store.update_final_verdict(a, FinalVerdict::False).await.unwrap();
            (a, b)
        };

        let reopened = JsonlReportStore::open(&path).await.unwrap();
        let all = reopened.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            reopened.get(a).await.unwrap().unwrap().final_verdict,
            Some(FinalVerdict::False)
        );

        let c = reopened.insert(new_report("c", 5)).await.unwrap();
        assert!(c > a && c > b, "ids are never reused after reopen");
    }

    #[tokio::test]
    async fn concurrent_inserts_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            JsonlReportStore::open(dir.path().join("reports.jsonl")).await.unwrap(),
        );

        let tasks = (0..20).map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.insert(new_report(&format!("claim {i}"), i)).await })
        });
        let mut ids: Vec<i64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 20);

        let reopened = JsonlReportStore::open(store.path()).await.unwrap();
        assert_eq!(reopened.list_all().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn torn_trailing_line_is_dropped_and_inserts_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");
        {
            let store = JsonlReportStore::open(&path).await.unwrap();
            store.insert(new_report("a", 70)).await.unwrap();
        }
        // an append cut short after a few bytes
        let mut file = OpenOptions::new().append(true).open(&path).await.unwrap();
        file.write_all(r#"{"id":2,"text":"ভো"#.as_bytes()).await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let store = JsonlReportStore::open(&path).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);
        let id = store.insert(new_report("b", 20)).await.unwrap();
        assert_eq!(id, 2);

        let reopened = JsonlReportStore::open(&path).await.unwrap();
        let texts: Vec<String> = reopened.list_all().await.unwrap().into_iter().map(|r| r.text).collect();
        assert_eq!(texts, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn complete_record_missing_newline_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");
        {
            let store = JsonlReportStore::open(&path).await.unwrap();
            store.insert(new_report("a", 70)).await.unwrap();
        }
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        tokio::fs::write(&path, content.trim_end()).await.unwrap();

        let store = JsonlReportStore::open(&path).await.unwrap();
        store.insert(new_report("b", 20)).await.unwrap();

        let reopened = JsonlReportStore::open(&path).await.unwrap();
        assert_eq!(reopened.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn corrupt_line_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.jsonl");
        tokio::fs::write(&path, "{not json}\n").await.unwrap();
        assert!(matches!(
            JsonlReportStore::open(&path).await,
            Err(StoreError::Corrupt { line: 1, .. })
        ));
    }
}
