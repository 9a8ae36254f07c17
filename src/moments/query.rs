//! Protocol-agnostic view parameters: whatever carries them (URL query, CLI
//! arguments, IPC payload) hands them over as key/value pairs.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::temporal::Partition;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewSelector {
    #[default]
    Read,
    Create,
    Update,
}

impl ViewSelector {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(ViewSelector::Read),
            "create" => Some(ViewSelector::Create),
            "update" => Some(ViewSelector::Update),
            _ => None,
        }
    }
}

/// Requested page per partition, 1-based. Out-of-range values are clamped
/// later, against the real totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionPages {
    pub all: u32,
    pub past: u32,
    pub current: u32,
    pub future: u32,
}

impl Default for PartitionPages {
    fn default() -> Self {
        Self {
            all: 1,
            past: 1,
            current: 1,
            future: 1,
        }
    }
}

impl PartitionPages {
    pub fn get(&self, partition: Partition) -> u32 {
        match partition {
            Partition::All => self.all,
            Partition::Past => self.past,
            Partition::Current => self.current,
            Partition::Future => self.future,
        }
    }

    pub fn set(&mut self, partition: Partition, page: u32) {
        match partition {
            Partition::All => self.all = page,
            Partition::Past => self.past = page,
            Partition::Current => self.current = page,
            Partition::Future => self.future = page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewQuery {
    /// Case-sensitive name filter shared by all partitions; empty disables it.
    pub search: String,
    pub pages: PartitionPages,
    /// Partition the user is looking at.
    pub partition: Partition,
    pub view: ViewSelector,
    /// Moment to open straight into the edit view.
    pub moment_id: Option<String>,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            pages: PartitionPages::default(),
            partition: Partition::All,
            view: ViewSelector::Read,
            moment_id: None,
        }
    }
}

fn page_key(key: &str) -> Option<Partition> {
    match key {
        "allPage" => Some(Partition::All),
        "pastPage" => Some(Partition::Past),
        "currentPage" => Some(Partition::Current),
        "futurePage" => Some(Partition::Future),
        _ => None,
    }
}

impl ViewQuery {
    /// Lenient parse: malformed values keep their defaults and are logged.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = ViewQuery::default();

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "search" => query.search = value.to_string(),
                "partition" => match value.parse::<Partition>() {
                    Ok(partition) => query.partition = partition,
                    Err(err) => warn!("Ignoring partition selector: {err}"),
                },
                "view" => match ViewSelector::parse(value) {
                    Some(view) => query.view = view,
                    None => warn!("Ignoring unknown view '{value}'"),
                },
                "momentId" => {
                    let id = value.trim();
                    query.moment_id = (!id.is_empty()).then(|| id.to_string());
                }
                other => match page_key(other) {
                    Some(partition) => match value.trim().parse::<u32>() {
                        Ok(page) => query.pages.set(partition, page),
                        Err(_) => warn!("Ignoring non-numeric {other}='{value}'"),
                    },
                    None => debug!("Ignoring unknown query key '{other}'"),
                },
            }
        }

        query
    }

    /// Parses `key=value` tokens, e.g. command-line arguments.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pairs: Vec<(String, String)> = args
            .into_iter()
            .filter_map(|arg| {
                let arg = arg.as_ref();
                match arg.split_once('=') {
                    Some((key, value)) => Some((key.to_string(), value.to_string())),
                    None => {
                        warn!("Ignoring argument without '=': {arg}");
                        None
                    }
                }
            })
            .collect();

        Self::from_pairs(pairs)
    }
}
