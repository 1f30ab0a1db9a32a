//! Contact payload parsing and an in-process [`ContactStore`].

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;

use crate::{domain::Contact, errors::StoreError, ports::ContactStore};

/// Column widths of the `contacts` table, in characters.
pub const EMAIL_MAX_CHARS: usize = 255;
pub const PHONE_MAX_CHARS: usize = 20;

/// Split an add-contact payload into `(email, phone)`.
///
/// Returns `None` unless the text has exactly two whitespace-separated tokens.
/// No format validation happens here.
pub fn parse_contact_pair(text: &str) -> Option<(&str, &str)> {
    let mut parts = text.split_whitespace();
    let email = parts.next()?;
    let phone = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((email, phone))
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\+7|8)?\d{10}$").expect("valid regex"))
}

/// Whether the value has the usual `user@domain.tld` shape.
///
/// Informational only: inserts accept any value.
pub fn looks_like_email(s: &str) -> bool {
    email_re().is_match(s)
}

/// Whether the value looks like a (Russian-format) phone number.
///
/// Informational only: inserts accept any value.
pub fn looks_like_phone(s: &str) -> bool {
    phone_re().is_match(s)
}

#[derive(Debug, Default)]
struct MemoryInner {
    schema_ready: bool,
    rows: Vec<Contact>,
    next_id: i32,
    unavailable: bool,
}

/// In-process contact store with the same uniqueness rules as the SQL schema.
///
/// Like the real table, it must be created with
/// [`ContactStore::ensure_schema`] before use.
#[derive(Debug, Default)]
pub struct MemoryContactStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows in insertion order.
    pub async fn rows(&self) -> Vec<Contact> {
        self.inner.lock().await.rows.clone()
    }

    /// Make every subsequent call fail with a backend error (or recover).
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.lock().await.unavailable = unavailable;
    }
}

impl MemoryInner {
    fn ready(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Backend("connection refused".to_string()));
        }
        if !self.schema_ready {
            return Err(StoreError::Backend(
                "relation \"contacts\" does not exist".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_width(column: &str, value: &str, max: usize) -> Result<(), StoreError> {
    if value.chars().count() > max {
        return Err(StoreError::Rejected(format!(
            "{column} is longer than {max} characters"
        )));
    }
    Ok(())
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.unavailable {
            return Err(StoreError::Backend("connection refused".to_string()));
        }
        inner.schema_ready = true;
        Ok(())
    }

    async fn find(&self, term: &str) -> Result<Option<Contact>, StoreError> {
        let inner = self.inner.lock().await;
        inner.ready()?;
        Ok(inner
            .rows
            .iter()
            .find(|c| c.email == term || c.phone == term)
            .cloned())
    }

    async fn insert(&self, email: &str, phone: &str) -> Result<Contact, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.ready()?;
        check_width("email", email, EMAIL_MAX_CHARS)?;
        check_width("phone", phone, PHONE_MAX_CHARS)?;
        if inner
            .rows
            .iter()
            .any(|c| c.email == email || c.phone == phone)
        {
            return Err(StoreError::Conflict);
        }
        inner.next_id += 1;
        let contact = Contact {
            id: inner.next_id,
            email: email.to_string(),
            phone: phone.to_string(),
        };
        inner.rows.push(contact.clone());
        Ok(contact)
    }
}
