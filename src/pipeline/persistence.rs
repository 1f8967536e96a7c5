// Fragment storage. The real app keeps fragments in a hosted document store;
// locally they're one JSON file each under <project_dir>/.padloop/fragments/.

use std::path::{Path, PathBuf};

use super::fragment::FragmentRecord;
use crate::config::PADLOOP_DIR;
use crate::error::{StoreError, StoreResult};

const FRAGMENTS_DIR: &str = "fragments";
const ID_PREFIX: &str = "frag-";

pub trait FragmentRepository {
    /// Store a fragment, returning its id. A record that already has an id
    /// overwrites that fragment.
    fn save(&mut self, record: &FragmentRecord) -> StoreResult<String>;

    fn load(&self, id: &str) -> StoreResult<FragmentRecord>;

    /// Newest first. Pass the returned cursor back in to get the next page;
    /// `None` means there is nothing after this page.
    fn list(&self, limit: usize, cursor: Option<&str>)
        -> StoreResult<(Vec<FragmentRecord>, Option<String>)>;
}

pub struct JsonFragmentStore {
    dir: PathBuf,
}

impl JsonFragmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    // <project_dir>/.padloop/fragments
    pub fn in_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join(PADLOOP_DIR).join(FRAGMENTS_DIR))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    // oldest first, in the order they were issued
    fn ids(&self) -> StoreResult<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().into_string().ok()?;
                let id = name.strip_suffix(".json")?;
                id.starts_with(ID_PREFIX).then(|| id.to_string())
            })
            .collect();
        ids.sort_by(|a, b| issue_order(a).cmp(&issue_order(b)));
        Ok(ids)
    }

    fn next_id(&self) -> StoreResult<String> {
        let last = self.ids()?.iter().filter_map(|id| sequence(id)).max().unwrap_or(0);
        Ok(format!("{ID_PREFIX}{:06}", last + 1))
    }
}

// the number after the prefix; the padding stops at six digits, so the
// text alone doesn't sort
fn sequence(id: &str) -> Option<u64> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

// ids that aren't ours sort before every issued one
fn issue_order(id: &str) -> (u64, &str) {
    (sequence(id).unwrap_or(0), id)
}

impl FragmentRepository for JsonFragmentStore {
    fn save(&mut self, record: &FragmentRecord) -> StoreResult<String> {
        std::fs::create_dir_all(&self.dir)?;
        let id = match &record.id {
            Some(id) => id.clone(),
            None => self.next_id()?,
        };
        let mut record = record.clone();
        record.id = Some(id.clone());
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(self.path_for(&id), json)?;
        log::info!("saved fragment {id}");
        Ok(id)
    }

    fn load(&self, id: &str) -> StoreResult<FragmentRecord> {
        let path = self.path_for(id);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut record: FragmentRecord = serde_json::from_str(&data)?;
        record.id = Some(id.to_string());
        Ok(record)
    }

    fn list(
        &self,
        limit: usize,
        cursor: Option<&str>,
    ) -> StoreResult<(Vec<FragmentRecord>, Option<String>)> {
        let older: Vec<String> = self
            .ids()?
            .into_iter()
            .rev()
            .filter(|id| cursor.is_none_or(|c| issue_order(id) < issue_order(c)))
            .collect();

        let mut page = Vec::new();
        for id in older.iter().take(limit) {
            match self.load(id) {
                Ok(record) => page.push(record),
                Err(e) => log::warn!("skipping unreadable fragment {id}: {e}"),
            }
        }
        let next = if older.len() > limit && limit > 0 {
            older.get(limit - 1).cloned()
        } else {
            None
        };
        Ok((page, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::grid::PadGrid;
    use crate::shared::PadId;

    fn record(title: &str) -> FragmentRecord {
        FragmentRecord::from_grid(&PadGrid::new(4, 4).toggle_active(PadId(1)), 100.0, title)
    }

    #[test]
    fn save_load_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFragmentStore::in_project(dir.path());

        let id = store.save(&record("first")).unwrap();
        assert_eq!(id, "frag-000001");
        let mut loaded = store.load(&id).unwrap();
        assert_eq!(loaded.title, "first");
        assert!(loaded.pad_states["1"].is_active);

        loaded.title = "renamed".into();
        assert_eq!(store.save(&loaded).unwrap(), id);
        assert_eq!(store.load(&id).unwrap().title, "renamed");
    }

    #[test]
    fn missing_fragment_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFragmentStore::new(dir.path());
        assert!(matches!(store.load("frag-000042"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn pages_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFragmentStore::new(dir.path());
        for i in 0..5 {
            store.save(&record(&format!("f{i}"))).unwrap();
        }

        let (page, cursor) = store.list(2, None).unwrap();
        let titles: Vec<_> = page.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["f4", "f3"]);

        let (page, cursor) = store.list(2, cursor.as_deref()).unwrap();
        let titles: Vec<_> = page.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["f2", "f1"]);

        let (page, cursor) = store.list(2, cursor.as_deref()).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(cursor, None);
    }

    #[test]
    fn order_goes_by_number_past_six_digits() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFragmentStore::new(dir.path());
        for (id, title) in [("frag-999999", "older"), ("frag-1000000", "newer")] {
            store.save(&FragmentRecord { id: Some(id.into()), ..record(title) }).unwrap();
        }

        let (page, cursor) = store.list(1, None).unwrap();
        assert_eq!(page[0].title, "newer");
        let (page, _) = store.list(1, cursor.as_deref()).unwrap();
        assert_eq!(page[0].title, "older");

        assert_eq!(store.save(&record("next")).unwrap(), "frag-1000001");
        assert_eq!(store.list(1, None).unwrap().0[0].title, "next");
    }

    #[test]
    fn empty_store_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFragmentStore::new(dir.path().join("nothing-here"));
        let (page, cursor) = store.list(10, None).unwrap();
        assert!(page.is_empty());
        assert!(cursor.is_none());
    }
}
