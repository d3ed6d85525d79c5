use serde_json::{Map, Value};
use std::sync::Arc;

use crate::clients::{ClientResult, DocumentStore, SetMode, SERVER_TIMESTAMP};
use crate::domain::{AuthUser, UserProfile};

pub const USERS: &str = "users";

/// Repository for user profile documents, keyed by uid
#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Stored profile, or `None` when the user never saved one
    pub async fn get(&self, user: &AuthUser) -> ClientResult<Option<UserProfile>> {
        let doc = self.store.get(USERS, &user.uid).await?;
        Ok(doc.map(|doc| UserProfile::from_document(user, &doc.data)))
    }

    pub async fn get_raw(&self, uid: &str) -> ClientResult<Option<Value>> {
        Ok(self.store.get(USERS, uid).await?.map(|doc| doc.data))
    }

    /// Merge `fields` into the profile, creating it on first write
    pub async fn upsert(&self, uid: &str, mut fields: Map<String, Value>) -> ClientResult<()> {
        fields.insert("updatedAt".to_string(), Value::from(SERVER_TIMESTAMP));
        self.store
            .set(USERS, uid, Value::Object(fields), SetMode::Merge)
            .await
    }

    /// Put back a document read with `get_raw`
    pub async fn restore(&self, uid: &str, previous: Option<Value>) -> ClientResult<()> {
        match previous {
            Some(data) => self.store.set(USERS, uid, data, SetMode::Replace).await,
            None => self.store.delete(USERS, uid).await.map(|_| ()),
        }
    }
}
