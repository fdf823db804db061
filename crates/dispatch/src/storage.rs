use std::fs;
use std::path::PathBuf;

use curbside_store::{RatingRecord, RideRecord, UserProfile};

pub struct Storage {
    base: PathBuf,
}

impl Storage {
    pub fn new(base: &str) -> anyhow::Result<Self> {
        let path = PathBuf::from(base);
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(Self { base: path })
    }

    pub fn load_users(&self) -> anyhow::Result<Vec<UserProfile>> {
        self.load_json("users.json")
    }

    pub fn load_rides(&self) -> anyhow::Result<Vec<RideRecord>> {
        self.load_json("rides.json")
    }

    pub fn load_ratings(&self) -> anyhow::Result<Vec<RatingRecord>> {
        self.load_json("ratings.json")
    }

    pub fn save_rides(&self, rides: impl IntoIterator<Item = RideRecord>) -> anyhow::Result<()> {
        self.save_json("rides.json", rides)
    }

    pub fn save_ratings(
        &self,
        ratings: impl IntoIterator<Item = RatingRecord>,
    ) -> anyhow::Result<()> {
        self.save_json("ratings.json", ratings)
    }

    pub async fn save_rides_async(&self, rides: Vec<RideRecord>) -> anyhow::Result<()> {
        let base = self.base.clone();
        tokio::task::spawn_blocking(move || {
            let storage = Storage { base };
            storage.save_rides(rides)
        })
        .await??;
        Ok(())
    }

    pub async fn save_ratings_async(&self, ratings: Vec<RatingRecord>) -> anyhow::Result<()> {
        let base = self.base.clone();
        tokio::task::spawn_blocking(move || {
            let storage = Storage { base };
            storage.save_ratings(ratings)
        })
        .await??;
        Ok(())
    }

    fn load_json<T: serde::de::DeserializeOwned>(&self, file: &str) -> anyhow::Result<Vec<T>> {
        let path = self.base.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let data = serde_json::from_str(&content)?;
        Ok(data)
    }

    fn save_json<T: serde::Serialize>(
        &self,
        file: &str,
        items: impl IntoIterator<Item = T>,
    ) -> anyhow::Result<()> {
        let path = self.base.join(file);
        let items: Vec<T> = items.into_iter().collect();
        let content = serde_json::to_string_pretty(&items)?;
        fs::write(path, content)?;
        Ok(())
    }
}
