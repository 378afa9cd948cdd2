//! Property-based tests for the session store
//!
//! Random operation sequences are replayed against the store and against a
//! tiny reference model of the transcript.

use super::*;
use crate::persistence::MemoryStore;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    AddUser(String),
    Upsert(String),
    Finish,
    SetStreaming(bool),
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[a-zA-Z ]{0,12}".prop_map(Op::AddUser),
        5 => "[a-zA-Z ]{0,12}".prop_map(Op::Upsert),
        1 => Just(Op::Finish),
        1 => any::<bool>().prop_map(Op::SetStreaming),
        1 => Just(Op::Clear),
    ]
}

/// Reference model: (role, content) pairs plus the index of the active message
#[derive(Default)]
struct Model {
    messages: Vec<(Role, String)>,
    active: Option<usize>,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match op {
            Op::AddUser(text) => {
                if !text.trim().is_empty() {
                    self.messages.push((Role::User, text.clone()));
                    self.active = None;
                }
            }
            Op::Upsert(text) => {
                if let Some(index) = self.active {
                    self.messages[index].1.clone_from(text);
                } else {
                    self.messages.push((Role::Assistant, text.clone()));
                    self.active = Some(self.messages.len() - 1);
                }
            }
            Op::Finish => self.active = None,
            Op::SetStreaming(_) => {}
            Op::Clear => {
                self.messages.clear();
                self.active = None;
            }
        }
    }
}

fn run(store: &SessionStore, op: &Op) {
    match op {
        Op::AddUser(text) => {
            let result = store.add_user_message(text);
            assert_eq!(result.is_ok(), !text.trim().is_empty());
        }
        Op::Upsert(text) => {
            store.upsert_assistant_message(text).unwrap();
        }
        Op::Finish => {
            store.finish_assistant_message();
        }
        Op::SetStreaming(flag) => store.set_streaming(*flag),
        Op::Clear => {
            store.clear_session();
        }
    }
}

fn new_store() -> SessionStore {
    SessionStore::new(Arc::new(MemoryStore::new()))
}

proptest! {
    #[test]
    fn prop_transcript_matches_call_order(ops in proptest::collection::vec(arb_op(), 0..60)) {
        let store = new_store();
        let mut model = Model::default();

        for op in &ops {
            run(&store, op);
            model.apply(op);
        }

        let actual: Vec<(Role, String)> = store
            .messages()
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect();
        prop_assert_eq!(actual, model.messages);
    }

    #[test]
    fn prop_message_ids_never_repeat(ops in proptest::collection::vec(arb_op(), 0..60)) {
        let store = new_store();
        let mut seen_ever: HashSet<String> = HashSet::new();
        let mut live_ids: Vec<String> = Vec::new();

        for op in &ops {
            run(&store, op);
            let messages = store.messages();

            let unique: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();
            prop_assert_eq!(unique.len(), messages.len());

            // A message keeps its id for as long as it exists
            for (index, id) in live_ids.iter().enumerate() {
                if let Some(m) = messages.get(index) {
                    prop_assert_eq!(&m.id, id);
                }
            }
            for m in messages.iter().skip(live_ids.len().min(messages.len())) {
                prop_assert!(seen_ever.insert(m.id.clone()), "id reused: {}", m.id);
            }
            live_ids = messages.into_iter().map(|m| m.id).collect();
        }
    }

    #[test]
    fn prop_active_pointer_is_valid(ops in proptest::collection::vec(arb_op(), 0..60)) {
        let store = new_store();

        for op in &ops {
            run(&store, op);
            let snapshot = store.snapshot();
            if let Some(id) = &snapshot.active_assistant_message_id {
                let active: Vec<&Message> =
                    snapshot.messages.iter().filter(|m| &m.id == id).collect();
                prop_assert_eq!(active.len(), 1);
                prop_assert_eq!(active[0].role, Role::Assistant);
            }
        }
    }

    #[test]
    fn prop_consecutive_upserts_do_not_append(
        prefix in proptest::collection::vec(arb_op(), 0..20),
        first in "[a-z]{0,10}",
        second in "[a-z]{0,10}",
    ) {
        let store = new_store();
        for op in &prefix {
            run(&store, op);
        }

        let a = store.upsert_assistant_message(&first).unwrap();
        let count = store.messages().len();
        let b = store.upsert_assistant_message(&second).unwrap();

        prop_assert_eq!(&a.id, &b.id);
        prop_assert_eq!(store.messages().len(), count);
        prop_assert_eq!(store.message(&a.id).map(|m| m.content), Some(second));
    }
}
