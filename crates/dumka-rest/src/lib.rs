//! Hosted REST implementation of the Dumka notes backend.
//!
//! Speaks the PostgREST-style row API the hosted service exposes: filtered
//! reads (`user_id=eq.{id}`), single-row inserts returning the new row,
//! field-scoped PATCHes, and batch deletes via `id=in.(...)`. Every request
//! is one round trip with no retry; errors carry the raw response body.

use dumka_core::{
    Error, Invite, NewInvite, NewNote, NotePatch, NoteRow, NotesBackend,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

const NOTE_COLUMNS: &str = "id,user_id,text,date,is_task,completed,is_question,answer,position";

/// REST-backed notes store.
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    bearer: String,
}

impl RestBackend {
    /// `base_url` is the service's REST root, e.g.
    /// `https://project.example.co/rest/v1`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer: api_key.clone(),
            api_key,
        }
    }

    /// Use a session token for authorization instead of the bare API key.
    /// Establishing that session happens upstream of this client.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = token.into();
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
            .header("Prefer", "return=representation")
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!("{}: {}", status, body)));
        }
        Ok(response)
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T, Error> {
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Backend(e.to_string()))
    }
}

#[derive(Deserialize)]
struct InsertedRow {
    id: String,
}

/// PATCH body for a field-scoped update. `Some(None)` fields become
/// explicit JSON nulls so the column is cleared, untouched fields are
/// omitted entirely.
fn patch_body(patch: &NotePatch) -> Map<String, Value> {
    let mut body = Map::new();
    if let Some(text) = &patch.text {
        body.insert("text".into(), json!(text));
    }
    if let Some(is_task) = patch.is_task {
        body.insert("is_task".into(), json!(is_task));
    }
    if let Some(completed) = patch.completed {
        body.insert("completed".into(), json!(completed));
    }
    if let Some(is_question) = patch.is_question {
        body.insert("is_question".into(), json!(is_question));
    }
    if let Some(answer) = &patch.answer {
        body.insert("answer".into(), json!(answer));
    }
    if let Some(position) = &patch.position {
        body.insert("position".into(), json!(position));
    }
    body
}

#[async_trait::async_trait(?Send)]
impl NotesBackend for RestBackend {
    async fn fetch_notes(&self, user_id: &str) -> Result<Vec<NoteRow>, Error> {
        let user_filter = format!("eq.{}", user_id);
        let request = self
            .request(reqwest::Method::GET, "notes")
            .query(&[
                ("select", NOTE_COLUMNS),
                ("user_id", user_filter.as_str()),
                ("order", "date.asc,id.asc"),
            ]);
        Self::decode(Self::send(request).await?).await
    }

    async fn insert_note(&self, user_id: &str, note: NewNote) -> Result<String, Error> {
        let body = json!({
            "user_id": user_id,
            "text": note.text,
            "date": note.date,
            "is_task": note.is_task,
            "completed": note.completed,
            "is_question": note.is_question,
            "answer": note.answer,
        });
        let request = self.request(reqwest::Method::POST, "notes").json(&body);
        let rows: Vec<InsertedRow> = Self::decode(Self::send(request).await?).await?;
        rows.into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| Error::Backend("insert returned no row".into()))
    }

    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        patch: NotePatch,
    ) -> Result<bool, Error> {
        let body = patch_body(&patch);
        if body.is_empty() {
            return Ok(true);
        }
        let id_filter = format!("eq.{}", id);
        let user_filter = format!("eq.{}", user_id);
        let request = self
            .request(reqwest::Method::PATCH, "notes")
            .query(&[("id", id_filter.as_str()), ("user_id", user_filter.as_str())])
            .json(&body);
        let rows: Vec<Value> = Self::decode(Self::send(request).await?).await?;
        Ok(!rows.is_empty())
    }

    async fn delete_notes(&self, user_id: &str, ids: &[String]) -> Result<u64, Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let id_filter = format!("in.({})", ids.join(","));
        let user_filter = format!("eq.{}", user_id);
        let request = self
            .request(reqwest::Method::DELETE, "notes")
            .query(&[("id", id_filter.as_str()), ("user_id", user_filter.as_str())]);
        let rows: Vec<Value> = Self::decode(Self::send(request).await?).await?;
        Ok(rows.len() as u64)
    }

    async fn create_invite(&self, invite: NewInvite) -> Result<Invite, Error> {
        let body = json!({
            "code": invite.code,
            "created_by": invite.created_by,
            "used_at": null,
            "used_by": null,
        });
        let request = self.request(reqwest::Method::POST, "invites").json(&body);
        let rows: Vec<Invite> = Self::decode(Self::send(request).await?).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| Error::Backend("insert returned no row".into()))
    }

    async fn list_invites(&self) -> Result<Vec<Invite>, Error> {
        let request = self
            .request(reqwest::Method::GET, "invites")
            .query(&[
                ("select", "id,code,created_at,created_by,used_at,used_by"),
                ("order", "created_at.desc"),
                ("limit", "200"),
            ]);
        Self::decode(Self::send(request).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_body_emits_nulls_for_cleared_columns() {
        let patch = NotePatch {
            text: Some("buy milk".into()),
            is_task: Some(false),
            completed: Some(false),
            answer: Some(None),
            ..Default::default()
        };
        let body = patch_body(&patch);
        assert_eq!(body.get("text"), Some(&json!("buy milk")));
        assert_eq!(body.get("is_task"), Some(&json!(false)));
        assert_eq!(body.get("answer"), Some(&Value::Null));
        // untouched columns stay out of the request entirely
        assert!(!body.contains_key("is_question"));
        assert!(!body.contains_key("position"));
    }

    #[test]
    fn test_patch_body_empty_when_nothing_set() {
        assert!(patch_body(&NotePatch::default()).is_empty());
    }

    #[test]
    fn test_table_url_joins_cleanly() {
        let backend = RestBackend::new("https://api.example.com/rest/v1/", "key");
        assert_eq!(
            backend.table_url("notes"),
            "https://api.example.com/rest/v1/notes"
        );
    }
}
