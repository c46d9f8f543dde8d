//! Social task catalog

use serde::{Deserialize, Serialize};
use tamra_core::constants::SOCIAL_TASK_REWARD;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialTask {
    pub id: String,
    pub name: String,
    pub reward: u64,
    #[serde(default)]
    pub link: String,
}

impl SocialTask {
    fn new(id: &str, name: &str, link: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            reward: SOCIAL_TASK_REWARD,
            link: link.to_string(),
        }
    }
}

pub fn default_tasks() -> Vec<SocialTask> {
    vec![
        SocialTask::new("join-telegram", "Join Telegram", "https://t.me/tamravault"),
        SocialTask::new("follow-x", "Follow on X", "https://x.com/tamravault"),
        SocialTask::new("retweet-post", "Retweet Post", "https://x.com/tamravault"),
        SocialTask::new("join-discord", "Join Discord", "https://discord.gg/tamravault"),
    ]
}

#[derive(Debug, Clone)]
pub struct TaskCatalog {
    tasks: Vec<SocialTask>,
}

impl TaskCatalog {
    pub fn new(tasks: Vec<SocialTask>) -> Self {
        Self { tasks }
    }

    pub fn get(&self, id: &str) -> Option<&SocialTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SocialTask> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskCatalog {
    fn default() -> Self {
        Self::new(default_tasks())
    }
}
