//! Topic conversations: where they come from and how they are fetched off
//! the event loop.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use serde::{Deserialize, Serialize};

use crate::components::Character;
use crate::error::{self, LoadError, Result};

/// One generated conversation: a title and three lines per character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicConversation {
    pub topic: String,
    pub characters: Vec<Character>,
}

impl TopicConversation {
    /// Parse and validate a conversation document.
    pub fn from_json(json: &str) -> Result<Self> {
        let conversation: TopicConversation = serde_json::from_str(json)?;
        conversation.validate()?;
        Ok(conversation)
    }

    fn validate(&self) -> Result<()> {
        if self.characters.is_empty() {
            return Err(LoadError::malformed(format!(
                "topic '{}' has no characters",
                self.topic
            )));
        }
        let mut seen = HashSet::new();
        for c in &self.characters {
            if !seen.insert(&c.id) {
                return Err(LoadError::malformed(format!(
                    "topic '{}' lists '{}' twice",
                    self.topic, c.id
                )));
            }
        }
        Ok(())
    }
}

/// Anything that can produce topic conversations.
pub trait ConversationSource: Send + Sync {
    /// Topic names available for selection, in display order.
    fn list_topics(&self) -> Vec<String>;

    fn fetch(&self, topic: &str) -> Result<TopicConversation>;
}

/// Conversations stored as `<dir>/<slug>.json`.
#[derive(Debug, Clone)]
pub struct TopicDirectory {
    dir: PathBuf,
}

impl TopicDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slug(topic)))
    }
}

impl ConversationSource for TopicDirectory {
    fn list_topics(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("failed to list topics in {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };
        let mut topics: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        topics.sort();
        topics
    }

    fn fetch(&self, topic: &str) -> Result<TopicConversation> {
        let path = self.path_for(topic);
        if !path.exists() {
            return Err(LoadError::UnknownTopic(topic.to_string()));
        }
        TopicConversation::from_json(&error::read_to_string(&path)?)
    }
}

/// File-name form of a topic: lowercase ASCII alphanumerics, everything else
/// collapsed to single underscores.
pub fn slug(topic: &str) -> String {
    let mut out = String::with_capacity(topic.len());
    for ch in topic.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

struct FetchJob {
    generation: u64,
    topic: String,
}

/// Outcome of one fetch, delivered on the event loop.
#[derive(Debug)]
pub struct FetchResult {
    pub topic: String,
    pub result: Result<TopicConversation>,
}

/// Runs fetches on a worker thread. Only the newest request counts: results
/// for anything older are dropped when polled.
pub struct ConversationLoader {
    jobs: Option<Sender<FetchJob>>,
    results: Receiver<(u64, FetchResult)>,
    generation: u64,
    in_flight: Option<String>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ConversationLoader {
    pub fn spawn(source: Arc<dyn ConversationSource>) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<FetchJob>();
        let (result_tx, result_rx) = mpsc::channel();

        let worker = thread::spawn(move || {
            while let Ok(mut job) = job_rx.recv() {
                // Skip straight to the newest queued request.
                while let Ok(newer) = job_rx.try_recv() {
                    job = newer;
                }
                log::debug!("fetching topic '{}' (gen {})", job.topic, job.generation);
                let result = source.fetch(&job.topic);
                let delivered = result_tx.send((
                    job.generation,
                    FetchResult {
                        topic: job.topic,
                        result,
                    },
                ));
                if delivered.is_err() {
                    break;
                }
            }
        });

        Self {
            jobs: Some(job_tx),
            results: result_rx,
            generation: 0,
            in_flight: None,
            worker: Some(worker),
        }
    }

    /// Queue a fetch, superseding any request still in flight.
    pub fn request(&mut self, topic: &str) {
        self.generation += 1;
        self.in_flight = Some(topic.to_string());
        let job = FetchJob {
            generation: self.generation,
            topic: topic.to_string(),
        };
        let sent = self.jobs.as_ref().map(|tx| tx.send(job));
        if !matches!(sent, Some(Ok(()))) {
            log::error!("conversation worker is gone, cannot fetch '{}'", topic);
        }
    }

    /// Topic currently being fetched, if any.
    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    /// Drain finished fetches. Returns the result for the newest request once
    /// it arrives; stale results are discarded.
    pub fn poll(&mut self) -> Option<FetchResult> {
        let mut latest = None;
        loop {
            match self.results.try_recv() {
                Ok((generation, fetched)) => {
                    if generation != self.generation {
                        log::debug!(
                            "dropping stale result for '{}' (gen {}, current {})",
                            fetched.topic,
                            generation,
                            self.generation
                        );
                        continue;
                    }
                    self.in_flight = None;
                    latest = Some(fetched);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if let Some(topic) = self.in_flight.take() {
                        latest = Some(FetchResult {
                            topic,
                            result: Err(LoadError::Disconnected),
                        });
                    }
                    break;
                }
            }
        }
        latest
    }

    /// Block until the in-flight request resolves. Returns `None` if nothing
    /// is in flight.
    pub fn wait(&mut self) -> Option<FetchResult> {
        while self.in_flight.is_some() {
            match self.results.recv() {
                Ok((generation, fetched)) if generation == self.generation => {
                    self.in_flight = None;
                    return Some(fetched);
                }
                Ok(_) => continue,
                Err(_) => {
                    let topic = self.in_flight.take()?;
                    return Some(FetchResult {
                        topic,
                        result: Err(LoadError::Disconnected),
                    });
                }
            }
        }
        None
    }
}

impl Drop for ConversationLoader {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::error!("conversation worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const DOC: &str = r#"{
        "topic": "Launch",
        "characters": [
            {"id": "lee", "name": "Lee", "position": "PM", "dialogues": ["a", "b", "c"]}
        ]
    }"#;

    struct Scripted {
        calls: Mutex<Vec<String>>,
    }

    impl ConversationSource for Scripted {
        fn list_topics(&self) -> Vec<String> {
            vec!["launch".into(), "broken".into()]
        }

        fn fetch(&self, topic: &str) -> Result<TopicConversation> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(topic.to_string());
            }
            match topic {
                "launch" => TopicConversation::from_json(DOC),
                other => Err(LoadError::UnknownTopic(other.to_string())),
            }
        }
    }

    fn scripted() -> Arc<Scripted> {
        Arc::new(Scripted {
            calls: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn parses_and_validates() {
        let c = TopicConversation::from_json(DOC).expect("valid");
        assert_eq!(c.topic, "Launch");
        assert_eq!(c.characters[0].dialogues[1], "b");

        let empty = TopicConversation::from_json(r#"{"topic":"x","characters":[]}"#);
        assert!(matches!(empty, Err(LoadError::Malformed(_))));

        let dup = r#"{"topic":"x","characters":[
            {"id":"a","name":"A","dialogues":["1","2","3"]},
            {"id":"a","name":"A","dialogues":["1","2","3"]}]}"#;
        assert!(matches!(
            TopicConversation::from_json(dup),
            Err(LoadError::Malformed(_))
        ));

        let short = r#"{"topic":"x","characters":[{"id":"a","name":"A","dialogues":["1"]}]}"#;
        assert!(matches!(
            TopicConversation::from_json(short),
            Err(LoadError::Json(_))
        ));
    }

    #[test]
    fn slugs_are_file_safe() {
        assert_eq!(slug("Product Launch!"), "product_launch");
        assert_eq!(slug("  Q3 -- review "), "q3_review");
        assert_eq!(slug("daily"), "daily");
    }

    #[test]
    fn loader_delivers_result() {
        let mut loader = ConversationLoader::spawn(scripted());
        loader.request("launch");
        assert_eq!(loader.in_flight(), Some("launch"));
        let fetched = loader.wait().expect("result arrives");
        assert_eq!(fetched.topic, "launch");
        assert!(fetched.result.is_ok());
        assert_eq!(loader.in_flight(), None);
        assert!(loader.poll().is_none());
    }

    #[test]
    fn loader_reports_failure() {
        let mut loader = ConversationLoader::spawn(scripted());
        loader.request("broken");
        let fetched = loader.wait().expect("result arrives");
        assert!(matches!(fetched.result, Err(LoadError::UnknownTopic(_))));
    }

    #[test]
    fn newer_request_supersedes_older() {
        let mut loader = ConversationLoader::spawn(scripted());
        loader.request("broken");
        loader.request("launch");
        let fetched = loader.wait().expect("result arrives");
        assert_eq!(fetched.topic, "launch");
        assert!(loader.poll().is_none());
    }

    #[test]
    fn wait_without_request_is_none() {
        let mut loader = ConversationLoader::spawn(scripted());
        assert!(loader.wait().is_none());
    }

    #[test]
    fn missing_topic_file_is_unknown() {
        let dir = TopicDirectory::new("nonexistent_topics");
        assert!(matches!(
            dir.fetch("anything"),
            Err(LoadError::UnknownTopic(_))
        ));
        assert!(dir.list_topics().is_empty());
    }

    #[test]
    fn bundled_topics_load() {
        let dir = TopicDirectory::new("data/topics");
        let topics = dir.list_topics();
        assert!(!topics.is_empty());
        for topic in topics {
            let c = dir.fetch(&topic).expect("bundled topic is valid");
            assert!(!c.characters.is_empty());
        }
    }
}
