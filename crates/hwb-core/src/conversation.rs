//! Per-conversant state machine binding chat turns to the bot's services.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    catalog,
    contacts::{looks_like_email, looks_like_phone, parse_contact_pair},
    domain::ChatId,
    errors::StoreError,
    password,
    ports::{ContactStore, RemoteExecutor, StateStore},
    security::may_monitor,
    state::ConversationState,
    Result,
};

pub const WELCOME: &str =
    "Welcome! Available commands: /monitor, /find, /add_contact, /verify_password.";
pub const UNRECOGNIZED_COMMAND: &str =
    "Unrecognized command. Please use one of the supported commands.";
pub const ASK_SEARCH_TERM: &str = "Please send an email or phone number to look up.";
pub const ASK_CONTACT_PAIR: &str = "Please send an email and a phone number separated by a space.";
pub const CONTACT_PAIR_FORMAT_ERROR: &str =
    "Invalid format. Please send an email and a phone number separated by a space.";
pub const ASK_PASSWORD: &str = "Please send the password to check.";
pub const STORE_UNAVAILABLE: &str =
    "The contact database is unavailable right now. Please try again later.";
pub const MONITOR_NOT_PERMITTED: &str = "You are not permitted to run remote diagnostics.";
pub const CANCELLED: &str = "Cancelled.";
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";
pub const NO_OUTPUT: &str = "(no output)";

/// A single outgoing reply.
///
/// `output` carries raw command output, rendered preformatted by the messenger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub output: Option<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            output: None,
        }
    }

    pub fn with_output(text: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            output: Some(output.into()),
        }
    }
}

/// Parse `/cmd@botname args` into the lowercase command word.
///
/// Returns `None` for text that is not a slash command.
pub fn parse_command(text: &str) -> Option<String> {
    let first = text.trim().split_whitespace().next()?;
    let name = first.strip_prefix('/')?.split('@').next().unwrap_or("");
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

pub struct Controller {
    executor: Arc<dyn RemoteExecutor>,
    contacts: Arc<dyn ContactStore>,
    states: Arc<dyn StateStore>,
    monitor_allowed_users: Vec<i64>,
}

impl Controller {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        contacts: Arc<dyn ContactStore>,
        states: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            executor,
            contacts,
            states,
            monitor_allowed_users: Vec::new(),
        }
    }

    /// Restrict `/monitor` to the listed chats (empty = everyone).
    pub fn with_monitor_allow_list(mut self, allowed: Vec<i64>) -> Self {
        self.monitor_allowed_users = allowed;
        self
    }

    pub async fn state(&self, chat: ChatId) -> Result<ConversationState> {
        self.states.get(chat).await
    }

    /// Handle one incoming text turn.
    ///
    /// `Ok(None)` means the turn is not addressed to this controller and the
    /// caller should stay silent. Callers must serialize turns per chat.
    pub async fn handle(&self, chat: ChatId, text: &str) -> Result<Option<Reply>> {
        let command = parse_command(text);
        let state = self.states.get(chat).await?;

        if command.as_deref() == Some("cancel") {
            self.states.clear(chat).await?;
            let msg = if state == ConversationState::Idle {
                NOTHING_TO_CANCEL
            } else {
                CANCELLED
            };
            return Ok(Some(Reply::text(msg)));
        }

        let reply = match state {
            ConversationState::Idle => return self.handle_idle(chat, command.as_deref()).await,
            ConversationState::AwaitingCommand => self.run_catalog_command(chat, text).await,
            ConversationState::AwaitingSearchTerm => self.search_contact(text.trim()).await,
            ConversationState::AwaitingContactPair => {
                let Some((email, phone)) = parse_contact_pair(text) else {
                    // Stay in place so the conversant can retry.
                    return Ok(Some(Reply::text(CONTACT_PAIR_FORMAT_ERROR)));
                };
                self.add_contact(email, phone).await
            }
            ConversationState::AwaitingPassword => {
                Reply::text(password::check(text).message())
            }
        };

        self.states.clear(chat).await?;
        Ok(Some(reply))
    }

    async fn handle_idle(&self, chat: ChatId, command: Option<&str>) -> Result<Option<Reply>> {
        let (next, reply) = match command {
            Some("start") => return Ok(Some(Reply::text(WELCOME))),
            Some("monitor") => {
                if !may_monitor(chat, &self.monitor_allowed_users) {
                    warn!(chat = chat.0, "monitor refused: chat not on allow-list");
                    return Ok(Some(Reply::text(MONITOR_NOT_PERMITTED)));
                }
                (ConversationState::AwaitingCommand, catalog::menu())
            }
            Some("find") => (
                ConversationState::AwaitingSearchTerm,
                ASK_SEARCH_TERM.to_string(),
            ),
            Some("add_contact") => (
                ConversationState::AwaitingContactPair,
                ASK_CONTACT_PAIR.to_string(),
            ),
            Some("verify_password") => {
                (ConversationState::AwaitingPassword, ASK_PASSWORD.to_string())
            }
            _ => return Ok(None),
        };

        self.states.set(chat, next).await?;
        Ok(Some(Reply::text(reply)))
    }

    async fn run_catalog_command(&self, chat: ChatId, text: &str) -> Reply {
        let Some(entry) = catalog::lookup(text) else {
            return Reply::text(UNRECOGNIZED_COMMAND);
        };

        info!(chat = chat.0, token = entry.token, command = entry.command, "running remote command");
        match self.executor.execute(entry.command).await {
            Ok(stdout) if stdout.trim().is_empty() => {
                Reply::text(format!("Command result: {NO_OUTPUT}"))
            }
            Ok(stdout) => Reply::with_output("Command result:", stdout),
            Err(e) => {
                warn!(chat = chat.0, token = entry.token, "remote command failed: {e}");
                Reply::with_output("Command result: Error:", e.to_string())
            }
        }
    }

    async fn search_contact(&self, term: &str) -> Reply {
        match self.contacts.find(term).await {
            Ok(Some(_)) => Reply::text(format!(
                "Contact with email or phone '{term}' was found in the database."
            )),
            Ok(None) => Reply::text(format!(
                "Contact with email or phone '{term}' was not found in the database."
            )),
            Err(e) => {
                error!("contact lookup failed: {e}");
                Reply::text(STORE_UNAVAILABLE)
            }
        }
    }

    async fn add_contact(&self, email: &str, phone: &str) -> Reply {
        if !looks_like_email(email) || !looks_like_phone(phone) {
            debug!(email, phone, "storing contact without format validation");
        }

        match self.contacts.insert(email, phone).await {
            Ok(contact) => {
                info!(id = contact.id, "contact added");
                Reply::text(format!(
                    "Contact with email '{email}' and phone '{phone}' was added to the database."
                ))
            }
            Err(StoreError::Conflict) => {
                info!("contact insert rejected: already exists");
                Reply::text(format!(
                    "Contact with email '{email}' or phone '{phone}' already exists in the database."
                ))
            }
            Err(StoreError::Rejected(reason)) => {
                info!("contact insert rejected: {reason}");
                Reply::text(format!(
                    "Contact with email '{email}' and phone '{phone}' was not stored: {reason}."
                ))
            }
            Err(e) => {
                error!("contact insert failed: {e}");
                Reply::text(STORE_UNAVAILABLE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        catalog::CATALOG, contacts::MemoryContactStore, errors::ExecError,
        password::Verdict, state::MemoryStateStore,
    };

    #[derive(Clone)]
    enum Outcome {
        Stdout(String),
        Stderr(String),
    }

    struct FakeExecutor {
        calls: Mutex<Vec<String>>,
        outcome: Mutex<Outcome>,
    }

    impl FakeExecutor {
        fn new(outcome: Outcome) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                outcome: Mutex::new(outcome),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn set_outcome(&self, outcome: Outcome) {
            *self.outcome.lock().unwrap() = outcome;
        }
    }

    #[async_trait]
    impl RemoteExecutor for FakeExecutor {
        async fn execute(&self, command: &str) -> std::result::Result<String, ExecError> {
            self.calls.lock().unwrap().push(command.to_string());
            match self.outcome.lock().unwrap().clone() {
                Outcome::Stdout(s) => Ok(s),
                Outcome::Stderr(s) => Err(ExecError::Stderr(s)),
            }
        }
    }

    struct Harness {
        ctl: Controller,
        exec: Arc<FakeExecutor>,
        store: Arc<MemoryContactStore>,
    }

    async fn harness() -> Harness {
        let exec = Arc::new(FakeExecutor::new(Outcome::Stdout("ok\n".to_string())));
        let store = Arc::new(MemoryContactStore::new());
        store.ensure_schema().await.unwrap();
        let ctl = Controller::new(
            exec.clone(),
            store.clone(),
            Arc::new(MemoryStateStore::new()),
        );
        Harness { ctl, exec, store }
    }

    const CHAT: ChatId = ChatId(42);

    async fn say(h: &Harness, text: &str) -> Reply {
        h.ctl
            .handle(CHAT, text)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no reply to {text:?}"))
    }

    async fn state(h: &Harness) -> ConversationState {
        h.ctl.state(CHAT).await.unwrap()
    }

    #[test]
    fn parse_command_handles_mentions_and_args() {
        assert_eq!(parse_command("/find"), Some("find".to_string()));
        assert_eq!(parse_command("/Find@hwb_bot extra"), Some("find".to_string()));
        assert_eq!(parse_command("  /start  "), Some("start".to_string()));
        assert_eq!(parse_command("find"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command(""), None);
    }

    #[tokio::test]
    async fn start_welcomes_and_stays_idle() {
        let h = harness().await;
        assert_eq!(say(&h, "/start").await, Reply::text(WELCOME));
        assert_eq!(state(&h).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn idle_plain_text_and_unknown_commands_are_ignored() {
        let h = harness().await;
        assert_eq!(h.ctl.handle(CHAT, "hello").await.unwrap(), None);
        assert_eq!(h.ctl.handle(CHAT, "/get_uptime").await.unwrap(), None);
        assert!(h.exec.calls().is_empty());
    }

    #[tokio::test]
    async fn monitor_shows_menu_and_awaits_command() {
        let h = harness().await;
        let r = say(&h, "/monitor").await;
        for e in &CATALOG {
            assert!(r.text.contains(e.token));
        }
        assert_eq!(state(&h).await, ConversationState::AwaitingCommand);
    }

    #[tokio::test]
    async fn every_catalog_token_runs_its_command_and_returns_idle() {
        let h = harness().await;
        for (i, e) in CATALOG.iter().enumerate() {
            // Alternate success and failure; both must end idle.
            if i % 2 == 0 {
                h.exec.set_outcome(Outcome::Stdout(format!("out {i}")));
            } else {
                h.exec.set_outcome(Outcome::Stderr(format!("err {i}")));
            }

            say(&h, "/monitor").await;
            let r = say(&h, e.token).await;

            assert_eq!(h.exec.calls().last().map(String::as_str), Some(e.command));
            if i % 2 == 0 {
                assert_eq!(r, Reply::with_output("Command result:", format!("out {i}")));
            } else {
                assert_eq!(
                    r,
                    Reply::with_output("Command result: Error:", format!("err {i}"))
                );
            }
            assert_eq!(state(&h).await, ConversationState::Idle);
        }
        assert_eq!(h.exec.calls().len(), CATALOG.len());
    }

    #[tokio::test]
    async fn tokens_match_case_insensitively() {
        let h = harness().await;
        say(&h, "/monitor").await;
        say(&h, "/GET_FREE").await;
        assert_eq!(h.exec.calls(), vec!["free -m".to_string()]);
    }

    #[tokio::test]
    async fn empty_stdout_gets_a_placeholder() {
        let h = harness().await;
        h.exec.set_outcome(Outcome::Stdout("  \n".to_string()));
        say(&h, "/monitor").await;
        let r = say(&h, "/get_critical").await;
        assert_eq!(r, Reply::text(format!("Command result: {NO_OUTPUT}")));
    }

    #[tokio::test]
    async fn unknown_token_is_unrecognized_and_returns_idle() {
        let h = harness().await;
        say(&h, "/monitor").await;
        assert_eq!(say(&h, "rm -rf /").await, Reply::text(UNRECOGNIZED_COMMAND));
        assert_eq!(state(&h).await, ConversationState::Idle);
        assert!(h.exec.calls().is_empty());
    }

    #[tokio::test]
    async fn other_commands_are_payload_while_awaiting_selection() {
        let h = harness().await;
        say(&h, "/monitor").await;
        assert_eq!(say(&h, "/find").await, Reply::text(UNRECOGNIZED_COMMAND));
        assert_eq!(state(&h).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn find_reports_found_and_not_found() {
        let h = harness().await;
        h.store.insert("a@x.io", "111").await.unwrap();

        assert_eq!(say(&h, "/find").await, Reply::text(ASK_SEARCH_TERM));
        assert_eq!(state(&h).await, ConversationState::AwaitingSearchTerm);
        let r = say(&h, "111").await;
        assert!(r.text.contains("'111' was found"), "{}", r.text);
        assert_eq!(state(&h).await, ConversationState::Idle);

        say(&h, "/find").await;
        let r = say(&h, "nobody@x.io").await;
        assert!(r.text.contains("'nobody@x.io' was not found"), "{}", r.text);
        assert_eq!(state(&h).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn disjoint_contacts_are_added_and_found_by_either_field() {
        let h = harness().await;
        for (email, phone) in [("a@x.io", "111"), ("b@x.io", "222")] {
            say(&h, "/add_contact").await;
            let r = say(&h, &format!("{email} {phone}")).await;
            assert!(r.text.contains("was added"), "{}", r.text);
            assert_eq!(state(&h).await, ConversationState::Idle);
        }

        for term in ["a@x.io", "111", "b@x.io", "222"] {
            say(&h, "/find").await;
            assert!(say(&h, term).await.text.contains("was found"));
        }
    }

    #[tokio::test]
    async fn conflicting_contact_is_rejected_without_partial_write() {
        let h = harness().await;
        say(&h, "/add_contact").await;
        say(&h, "a@x.io 111").await;
        let before = h.store.rows().await;

        for payload in ["a@x.io 999", "z@x.io 111"] {
            say(&h, "/add_contact").await;
            let r = say(&h, payload).await;
            assert!(r.text.contains("already exists"), "{}", r.text);
            assert_eq!(state(&h).await, ConversationState::Idle);
        }

        assert_eq!(h.store.rows().await, before);
    }

    #[tokio::test]
    async fn malformed_pair_keeps_awaiting_contact_pair() {
        let h = harness().await;
        say(&h, "/add_contact").await;

        for payload in ["onlyone", "a b c"] {
            assert_eq!(say(&h, payload).await, Reply::text(CONTACT_PAIR_FORMAT_ERROR));
            assert_eq!(state(&h).await, ConversationState::AwaitingContactPair);
        }
        assert!(h.store.rows().await.is_empty());

        // The retry lands in the same state.
        assert!(say(&h, "a@x.io 111").await.text.contains("was added"));
        assert_eq!(state(&h).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn overlong_phone_is_rejected_not_reported_as_outage() {
        let h = harness().await;
        say(&h, "/add_contact").await;
        let r = say(&h, "long@x.io 8999123456712345678901").await;
        assert!(r.text.contains("was not stored"), "{}", r.text);
        assert!(r.text.contains("phone"), "{}", r.text);
        assert_ne!(r, Reply::text(STORE_UNAVAILABLE));
        assert_eq!(state(&h).await, ConversationState::Idle);
        assert!(h.store.rows().await.is_empty());
    }

    #[tokio::test]
    async fn insert_accepts_values_that_are_not_email_or_phone() {
        let h = harness().await;
        say(&h, "/add_contact").await;
        let r = say(&h, "not-an-email 12-ab").await;
        assert!(r.text.contains("was added"), "{}", r.text);
        assert_eq!(h.store.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn password_verdicts_are_reported_and_return_idle() {
        let h = harness().await;
        let cases = [
            ("short", Verdict::TooShort),
            ("alllowercase1!", Verdict::MissingUppercase),
            ("ALLUPPERCASE1!", Verdict::MissingLowercase),
            ("NoDigitsHere!", Verdict::MissingDigit),
            ("NoSpecial123", Verdict::MissingSpecial),
            ("Valid123!", Verdict::Strong),
        ];
        for (pw, verdict) in cases {
            assert_eq!(say(&h, "/verify_password").await, Reply::text(ASK_PASSWORD));
            assert_eq!(say(&h, pw).await, Reply::text(verdict.message()));
            assert_eq!(state(&h).await, ConversationState::Idle);
        }
    }

    #[tokio::test]
    async fn cancel_leaves_any_state() {
        let h = harness().await;
        assert_eq!(say(&h, "/cancel").await, Reply::text(NOTHING_TO_CANCEL));

        for cmd in ["/monitor", "/find", "/add_contact", "/verify_password"] {
            say(&h, cmd).await;
            assert_ne!(state(&h).await, ConversationState::Idle);
            assert_eq!(say(&h, "/cancel").await, Reply::text(CANCELLED));
            assert_eq!(state(&h).await, ConversationState::Idle);
        }
    }

    #[tokio::test]
    async fn store_outage_is_reported_and_returns_idle() {
        let h = harness().await;
        h.store.set_unavailable(true).await;

        say(&h, "/find").await;
        assert_eq!(say(&h, "a@x.io").await, Reply::text(STORE_UNAVAILABLE));
        assert_eq!(state(&h).await, ConversationState::Idle);

        say(&h, "/add_contact").await;
        assert_eq!(say(&h, "a@x.io 111").await, Reply::text(STORE_UNAVAILABLE));
        assert_eq!(state(&h).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn monitor_allow_list_blocks_unlisted_chats() {
        let exec = Arc::new(FakeExecutor::new(Outcome::Stdout("ok".to_string())));
        let ctl = Controller::new(
            exec,
            Arc::new(MemoryContactStore::new()),
            Arc::new(MemoryStateStore::new()),
        )
        .with_monitor_allow_list(vec![1]);

        let r = ctl.handle(ChatId(2), "/monitor").await.unwrap().unwrap();
        assert_eq!(r, Reply::text(MONITOR_NOT_PERMITTED));
        assert_eq!(ctl.state(ChatId(2)).await.unwrap(), ConversationState::Idle);

        ctl.handle(ChatId(1), "/monitor").await.unwrap().unwrap();
        assert_eq!(
            ctl.state(ChatId(1)).await.unwrap(),
            ConversationState::AwaitingCommand
        );
    }

    #[tokio::test]
    async fn conversants_do_not_share_state() {
        let h = harness().await;
        say(&h, "/verify_password").await;
        h.ctl.handle(ChatId(7), "/monitor").await.unwrap();

        assert_eq!(state(&h).await, ConversationState::AwaitingPassword);
        assert_eq!(
            h.ctl.state(ChatId(7)).await.unwrap(),
            ConversationState::AwaitingCommand
        );
    }
}
